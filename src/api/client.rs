//! HTTP client for the todo service's REST API.
//!
//! `ApiClient` is the request authenticator: it holds the current bearer
//! token and builds the `Authorization` header per request, so there is no
//! hidden global header state. `set_token`/`clear_token` is the single
//! mutation point, driven by the session operations.
//!
//! No request is ever retried; a failure is terminal for that attempt and
//! the user re-runs the command.

// Allow dead code: response structs keep fields for wire completeness
#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, multipart, Client, Method};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::models::{NewTodo, Todo, TodoUpdate, UserProfile};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// The hosted instance cold-starts, so allow a generous window.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Upload limit the service enforces for profile pictures (5 MB)
const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

/// Public sample catalog used by the `import` command
const IMPORT_SOURCE_URL: &str = "https://dummyjson.com/todos";

/// Successful login/register response
#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// Account-creation payload for `POST /register`
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Serialize)]
struct PasswordChangeRequest<'a> {
    #[serde(rename = "currentPassword")]
    current_password: &'a str,
    #[serde(rename = "newPassword")]
    new_password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct AvatarResponse {
    #[serde(rename = "profilePicture")]
    pub profile_picture: String,
}

/// One entry of the sample catalog (`{"todos": [{"id", "todo", "completed"}]}`)
#[derive(Debug, Clone, Deserialize)]
pub struct ImportItem {
    pub id: i64,
    #[serde(rename = "todo")]
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Deserialize)]
struct ImportCatalog {
    #[serde(default)]
    todos: Vec<ImportItem>,
}

/// API client for the todo service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Set the bearer token attached to subsequent requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// Detach the token; subsequent requests go out unauthenticated
    pub fn clear_token(&mut self) {
        self.token = None;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Browser URL that starts the Google sign-in redirect flow
    pub fn oauth_url(&self) -> String {
        self.url("/auth/google")
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref token) = self.token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }
        Ok(headers)
    }

    /// Check if a response is successful, mapping failures through ApiError
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .headers(self.auth_headers()?)
            .send()
            .await
            .with_context(|| format!("Failed to send GET request to {}", url))?;

        let response = Self::check_response(response).await?;

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }

    async fn send_json<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        url: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .client
            .request(method.clone(), url)
            .headers(self.auth_headers()?)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request to {}", method, url))?;

        let response = Self::check_response(response).await?;

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }

    // ===== Auth =====

    /// `POST /login` - exchange credentials for a token and profile
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthResponse> {
        self.send_json(
            Method::POST,
            &self.url("/login"),
            &LoginRequest { username, password },
        )
        .await
    }

    /// `POST /register` - create an account; responds like login
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse> {
        self.send_json(Method::POST, &self.url("/register"), request)
            .await
    }

    /// `POST /logout` - tell the service to invalidate the token.
    /// Best-effort from the caller's perspective; the local session is
    /// cleared whether or not this succeeds.
    pub async fn logout(&self) -> Result<()> {
        let url = self.url("/logout");
        let response = self
            .client
            .post(&url)
            .headers(self.auth_headers()?)
            .send()
            .await
            .context("Failed to send logout request")?;

        Self::check_response(response).await?;
        Ok(())
    }

    /// `GET /auth/me` - verify the current token and fetch the profile
    pub async fn me(&self) -> Result<UserProfile> {
        self.get_json(&self.url("/auth/me")).await
    }

    // ===== Todos =====

    /// `GET /todos?keyword=` - list todos, optionally filtered server-side.
    /// The keyword parameter is always sent; empty means "all".
    pub async fn fetch_todos(&self, keyword: Option<&str>) -> Result<Vec<Todo>> {
        let url = format!(
            "{}/todos?keyword={}",
            self.base_url,
            urlencoding::encode(keyword.unwrap_or(""))
        );

        let response = self
            .client
            .get(&url)
            .headers(self.auth_headers()?)
            .send()
            .await
            .context("Failed to fetch todos")?;

        let response = Self::check_response(response).await?;
        let text = response.text().await.context("Failed to read todos response")?;

        Self::parse_todo_list(&text)
    }

    /// `GET /todos/completed?completed=` - list by completion state
    pub async fn fetch_by_completion(&self, completed: bool) -> Result<Vec<Todo>> {
        let url = format!("{}/todos/completed?completed={}", self.base_url, completed);

        let response = self
            .client
            .get(&url)
            .headers(self.auth_headers()?)
            .send()
            .await
            .context("Failed to fetch todos by completion")?;

        let response = Self::check_response(response).await?;
        let text = response.text().await.context("Failed to read todos response")?;

        Self::parse_todo_list(&text)
    }

    /// `GET /spesific-todo/:id` - fetch one todo.
    /// The path spelling is the service's, not ours.
    pub async fn fetch_todo(&self, id: i64) -> Result<Todo> {
        self.get_json(&format!("{}/spesific-todo/{}", self.base_url, id))
            .await
    }

    /// `POST /addtodo` - create a todo
    pub async fn create_todo(&self, todo: &NewTodo) -> Result<Todo> {
        let url = self.url("/addtodo");
        let response = self
            .client
            .post(&url)
            .headers(self.auth_headers()?)
            .json(todo)
            .send()
            .await
            .context("Failed to send add-todo request")?;

        let response = Self::check_response(response).await?;
        let text = response.text().await.context("Failed to read add-todo response")?;

        Self::parse_todo(&text)
    }

    /// `PUT /todos/:id` - replace a todo's editable fields
    pub async fn update_todo(&self, id: i64, update: &TodoUpdate) -> Result<Todo> {
        let url = format!("{}/todos/{}", self.base_url, id);
        let response = self
            .client
            .put(&url)
            .headers(self.auth_headers()?)
            .json(update)
            .send()
            .await
            .context("Failed to send update request")?;

        let response = Self::check_response(response).await?;
        let text = response.text().await.context("Failed to read update response")?;

        Self::parse_todo(&text)
    }

    /// `PATCH /utodo/:id` - partial update; used for the completion toggle
    pub async fn set_completed(&self, id: i64, completed: bool) -> Result<Todo> {
        let url = format!("{}/utodo/{}", self.base_url, id);
        let response = self
            .client
            .patch(&url)
            .headers(self.auth_headers()?)
            .json(&serde_json::json!({ "completed": completed }))
            .send()
            .await
            .context("Failed to send completion update")?;

        let response = Self::check_response(response).await?;
        let text = response
            .text()
            .await
            .context("Failed to read completion response")?;

        Self::parse_todo(&text)
    }

    /// `DELETE /dtodo/:id`
    pub async fn delete_todo(&self, id: i64) -> Result<()> {
        let url = format!("{}/dtodo/{}", self.base_url, id);
        let response = self
            .client
            .delete(&url)
            .headers(self.auth_headers()?)
            .send()
            .await
            .context("Failed to send delete request")?;

        Self::check_response(response).await?;
        Ok(())
    }

    // ===== Profile =====

    /// `PATCH /api/profile` - update names; returns the replacement profile
    pub async fn update_profile(&self, first_name: &str, last_name: &str) -> Result<UserProfile> {
        self.send_json(
            Method::PATCH,
            &self.url("/api/profile"),
            &serde_json::json!({
                "first_name": first_name,
                "last_name": last_name,
            }),
        )
        .await
    }

    /// `PATCH /api/profile/password`
    pub async fn change_password(&self, current: &str, new: &str) -> Result<()> {
        let url = self.url("/api/profile/password");
        let response = self
            .client
            .patch(&url)
            .headers(self.auth_headers()?)
            .json(&PasswordChangeRequest {
                current_password: current,
                new_password: new,
            })
            .send()
            .await
            .context("Failed to send password change")?;

        Self::check_response(response).await?;
        Ok(())
    }

    /// `POST /api/profile/picture` - multipart upload, field `profilePicture`.
    /// The service accepts jpeg/png/gif up to 5 MB; both limits are checked
    /// here before any bytes go over the wire.
    pub async fn upload_avatar(&self, path: &Path) -> Result<AvatarResponse> {
        let mime = match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("png") => "image/png",
            Some("gif") => "image/gif",
            _ => {
                return Err(anyhow::anyhow!(
                    "Unsupported image type for {} - use jpg, png, or gif",
                    path.display()
                ))
            }
        };

        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read image {}", path.display()))?;
        if bytes.len() > MAX_AVATAR_BYTES {
            return Err(anyhow::anyhow!(
                "Image is {} bytes; the service accepts at most 5 MB",
                bytes.len()
            ));
        }

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("avatar")
            .to_string();
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime)?;
        let form = multipart::Form::new().part("profilePicture", part);

        let url = self.url("/api/profile/picture");
        let response = self
            .client
            .post(&url)
            .headers(self.auth_headers()?)
            .multipart(form)
            .send()
            .await
            .context("Failed to upload profile picture")?;

        let response = Self::check_response(response).await?;

        response
            .json()
            .await
            .context("Failed to parse upload response")
    }

    /// `DELETE /api/profile/picture`
    pub async fn delete_avatar(&self) -> Result<()> {
        let url = self.url("/api/profile/picture");
        let response = self
            .client
            .delete(&url)
            .headers(self.auth_headers()?)
            .send()
            .await
            .context("Failed to send picture delete request")?;

        Self::check_response(response).await?;
        Ok(())
    }

    // ===== Import =====

    /// Fetch the public sample catalog. Unauthenticated and on a different
    /// host, so no bearer header goes out with it.
    pub async fn fetch_import_catalog(&self) -> Result<Vec<ImportItem>> {
        let response = self
            .client
            .get(IMPORT_SOURCE_URL)
            .send()
            .await
            .context("Failed to fetch sample catalog")?;

        let response = Self::check_response(response).await?;
        let catalog: ImportCatalog = response
            .json()
            .await
            .context("Failed to parse sample catalog")?;

        debug!(count = catalog.todos.len(), "Sample catalog fetched");
        Ok(catalog.todos)
    }

    // ===== Response shapes =====

    /// The service has answered list endpoints both as a bare array and as a
    /// wrapped object; accept either.
    fn parse_todo_list(text: &str) -> Result<Vec<Todo>> {
        if let Ok(todos) = serde_json::from_str::<Vec<Todo>>(text) {
            return Ok(todos);
        }

        #[derive(Deserialize)]
        struct TodosWrapper {
            #[serde(default)]
            todos: Vec<Todo>,
        }

        if let Ok(wrapper) = serde_json::from_str::<TodosWrapper>(text) {
            return Ok(wrapper.todos);
        }

        Err(ApiError::InvalidResponse(format!(
            "Unexpected todo list shape: {}",
            &text[..text.len().min(200)]
        ))
        .into())
    }

    /// Single-todo responses: bare object or `{"todo": {...}}`
    fn parse_todo(text: &str) -> Result<Todo> {
        if let Ok(todo) = serde_json::from_str::<Todo>(text) {
            return Ok(todo);
        }

        #[derive(Deserialize)]
        struct TodoWrapper {
            todo: Todo,
        }

        if let Ok(wrapper) = serde_json::from_str::<TodoWrapper>(text) {
            return Ok(wrapper.todo);
        }

        Err(ApiError::InvalidResponse(format!(
            "Unexpected todo shape: {}",
            &text[..text.len().min(200)]
        ))
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ApiClient {
        ApiClient::new("https://todo.test/".to_string()).expect("client builds")
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let api = client();
        assert_eq!(api.url("/todos"), "https://todo.test/todos");
        assert_eq!(api.oauth_url(), "https://todo.test/auth/google");
    }

    #[test]
    fn test_token_set_and_clear() {
        let mut api = client();
        assert!(api.token().is_none());
        api.set_token("abc".to_string());
        assert_eq!(api.token(), Some("abc"));
        api.clear_token();
        assert!(api.token().is_none());
    }

    #[test]
    fn test_auth_headers_reflect_token() {
        let mut api = client();
        assert!(api
            .auth_headers()
            .expect("headers")
            .get(header::AUTHORIZATION)
            .is_none());

        api.set_token("abc".to_string());
        let headers = api.auth_headers().expect("headers");
        assert_eq!(
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok()),
            Some("Bearer abc")
        );
    }

    #[test]
    fn test_parse_todo_list_shapes() {
        let bare = r#"[{"id": 1, "title": "a", "completed": false}]"#;
        assert_eq!(ApiClient::parse_todo_list(bare).expect("parses").len(), 1);

        let wrapped = r#"{"todos": [{"id": 1, "title": "a"}, {"id": 2, "title": "b"}]}"#;
        assert_eq!(ApiClient::parse_todo_list(wrapped).expect("parses").len(), 2);

        assert!(ApiClient::parse_todo_list("\"nope\"").is_err());
    }

    #[test]
    fn test_parse_todo_shapes() {
        let bare = r#"{"id": 5, "title": "x", "completed": true}"#;
        assert_eq!(ApiClient::parse_todo(bare).expect("parses").id, 5);

        let wrapped = r#"{"todo": {"id": 9, "title": "y"}}"#;
        assert_eq!(ApiClient::parse_todo(wrapped).expect("parses").id, 9);
    }

    #[test]
    fn test_parse_import_catalog_entry() {
        let json = r#"{"todos": [{"id": 1, "todo": "Do the dishes", "completed": false,
                       "userId": 26}], "total": 150, "skip": 0, "limit": 30}"#;
        let catalog: ImportCatalog = serde_json::from_str(json).expect("catalog parses");
        assert_eq!(catalog.todos.len(), 1);
        assert_eq!(catalog.todos[0].title, "Do the dishes");
    }
}
