//! Application wiring and command handlers.
//!
//! `App` owns the three moving parts - config, session, API client - and
//! funnels every auth-state change through the session's operations. Command
//! handlers are thin: call the API, print the result. Each command is a
//! single awaited request/response; there is no background work to
//! coordinate and nothing is retried.

use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use tracing::{debug, error, warn};

use crate::api::{ApiClient, ApiError, AuthResponse, RegisterRequest};
use crate::auth::{parse_callback_token, CredentialStore, Session, TokenStore};
use crate::cli::{AddArgs, EditArgs, LoginArgs};
use crate::config::Config;
use crate::models::{NewTodo, Todo, TodoUpdate, UserProfile};
use crate::utils::format::{format_date, format_optional, truncate_string};

/// Maximum concurrent requests during a bulk import.
/// Keeps the hosted instance comfortable while still overlapping the waits.
const MAX_CONCURRENT_IMPORTS: usize = 5;

/// Column width for titles in the list view
const TITLE_COLUMN_WIDTH: usize = 48;

pub struct App {
    pub config: Config,
    pub session: Session,
    pub api: ApiClient,
}

impl App {
    pub fn new(api_url_override: Option<String>) -> Result<Self> {
        let config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };

        let api_url = config.resolve_api_url(api_url_override);
        debug!(api_url = %api_url, "Service URL resolved");

        let api = ApiClient::new(api_url)?;
        let session = Session::new(TokenStore::new(Config::config_dir()?));

        Ok(Self {
            config,
            session,
            api,
        })
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Verify any persisted token before a protected command runs. The
    /// restore is awaited here, so no authenticated request can race ahead
    /// of an unverified token.
    pub async fn require_session(&mut self) -> Result<()> {
        if self.session.restore(&mut self.api).await {
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "Not logged in (or the session expired). Run `todoterm login` first."
            ))
        }
    }

    /// Throw away the local session after the server rejected the token
    pub fn drop_session(&mut self) {
        self.api.clear_token();
        self.session.clear();
    }

    pub async fn login(&mut self, args: LoginArgs) -> Result<()> {
        let username = match args.username.or_else(|| self.config.last_username.clone()) {
            Some(u) => u,
            None => Self::prompt("Username: ")?,
        };

        let password = if CredentialStore::exists(&username) {
            match CredentialStore::lookup(&username) {
                Ok(p) => {
                    debug!("Using password from keychain");
                    p
                }
                Err(e) => {
                    warn!(error = %e, "Keychain lookup failed, prompting instead");
                    rpassword::prompt_password("Password: ")?
                }
            }
        } else {
            rpassword::prompt_password("Password: ")?
        };

        match self.api.login(&username, &password).await {
            Ok(AuthResponse { token, user }) => {
                if args.remember {
                    if let Err(e) = CredentialStore::save(&username, &password) {
                        warn!(error = %e, "Failed to save password in keychain");
                    }
                }

                self.config.last_username = Some(username);
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }

                self.api.set_token(token.clone());
                self.session.establish(token, user);

                if let Some(user) = self.session.user() {
                    println!("Logged in as {}.", user.display_name());
                }
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Login failed");
                Err(anyhow::anyhow!(Self::auth_failure_message(&e)))
            }
        }
    }

    pub async fn register(&mut self) -> Result<()> {
        println!("Create a new account\n");
        let username = Self::prompt("Username: ")?;
        let email = Self::prompt("Email: ")?;
        let first_name = Self::prompt("First name: ")?;
        let last_name = Self::prompt("Last name: ")?;
        let password = rpassword::prompt_password("Password: ")?;
        let confirm = rpassword::prompt_password("Confirm password: ")?;

        if password != confirm {
            return Err(anyhow::anyhow!("Passwords do not match"));
        }

        let request = RegisterRequest {
            username: username.clone(),
            email,
            password,
            first_name,
            last_name,
        };

        match self.api.register(&request).await {
            Ok(AuthResponse { token, user }) => {
                self.config.last_username = Some(username);
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }

                self.api.set_token(token.clone());
                self.session.establish(token, user);

                if let Some(user) = self.session.user() {
                    println!("Account created. Logged in as {}.", user.display_name());
                }
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Registration failed");
                Err(anyhow::anyhow!(Self::auth_failure_message(&e)))
            }
        }
    }

    /// Best-effort logout: tell the service, then clear local state no
    /// matter what the network did.
    pub async fn logout(&mut self, forget: bool) -> Result<()> {
        if let Some(token) = self.session.stored_token() {
            self.api.set_token(token);
            if let Err(e) = self.api.logout().await {
                warn!(error = %e, "Logout request failed; clearing local session anyway");
            }
        }

        self.drop_session();

        if forget {
            if let Some(username) = self.config.last_username.clone() {
                match CredentialStore::forget(&username) {
                    Ok(()) => println!("Removed saved password for {}.", username),
                    Err(e) => debug!(error = %e, "No saved password to remove"),
                }
            }
        }

        println!("Logged out.");
        Ok(())
    }

    pub fn print_auth_url(&self) {
        println!("Open this URL in a browser to sign in with Google:\n");
        println!("  {}", self.api.oauth_url());
        println!("\nAfter the redirect, finish with:");
        println!("  todoterm auth callback '<redirect-url>'");
    }

    pub async fn auth_callback(&mut self, url: &str) -> Result<()> {
        let token = parse_callback_token(url)
            .ok_or_else(|| anyhow::anyhow!("No token parameter found in the callback URL"))?;

        if self.session.complete_oauth_callback(&mut self.api, token).await {
            if let Some(user) = self.session.user() {
                println!("Signed in as {}.", user.display_name());
                self.config.last_username = Some(user.username.clone());
            }
            if let Err(e) = self.config.save() {
                warn!(error = %e, "Failed to save config");
            }
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "Sign-in failed - the callback token was rejected. Run `todoterm auth url` to start over."
            ))
        }
    }

    /// Map auth errors to something friendlier than a status code
    fn auth_failure_message(e: &anyhow::Error) -> String {
        if let Some(api_err) = e.downcast_ref::<ApiError>() {
            return match api_err {
                ApiError::Unauthorized => "Invalid username or password".to_string(),
                other => other.to_string(),
            };
        }

        // Transport failures arrive as context-wrapped reqwest errors
        if let Some(req_err) = e.downcast_ref::<reqwest::Error>() {
            return if req_err.is_timeout() {
                "Connection timed out. Please try again.".to_string()
            } else {
                "Unable to connect to the server. Check your internet connection.".to_string()
            };
        }

        e.to_string()
    }

    // =========================================================================
    // Todos
    // =========================================================================

    pub async fn list(&mut self, keyword: Option<&str>) -> Result<()> {
        let todos = self.api.fetch_todos(keyword).await?;

        if todos.is_empty() {
            match keyword {
                Some(k) => println!("No todos match \"{}\".", k),
                None => println!("No todos yet. Add one with `todoterm add`."),
            }
            return Ok(());
        }

        Self::print_todo_table(&todos);
        let done = todos.iter().filter(|t| t.completed).count();
        println!("\n{} todos, {} completed", todos.len(), done);
        Ok(())
    }

    pub async fn completed(&mut self, completed: bool) -> Result<()> {
        let todos = self.api.fetch_by_completion(completed).await?;

        if todos.is_empty() {
            if completed {
                println!("Nothing completed yet.");
            } else {
                println!("Nothing pending - all caught up.");
            }
            return Ok(());
        }

        Self::print_todo_table(&todos);
        Ok(())
    }

    pub async fn show(&mut self, id: i64) -> Result<()> {
        let todo = self.api.fetch_todo(id).await?;
        Self::print_todo_detail(&todo);
        Ok(())
    }

    pub async fn add(&mut self, args: AddArgs) -> Result<()> {
        let due_date = args.due.as_deref().map(Self::validate_due_date).transpose()?;

        let todo = NewTodo {
            title: args.title,
            description: args.description,
            completed: None,
            priority: args.priority,
            due_date,
        };

        let created = self.api.create_todo(&todo).await?;
        println!("Added #{}: {}", created.id, created.title);
        Ok(())
    }

    /// Full edit: fetch the current todo, overlay the provided fields, and
    /// PUT the merged result back (the edit endpoint replaces, it does not
    /// patch).
    pub async fn edit(&mut self, args: EditArgs) -> Result<()> {
        let current = self.api.fetch_todo(args.id).await?;

        let due_date = args.due.as_deref().map(Self::validate_due_date).transpose()?;

        let update = TodoUpdate {
            title: args.title.unwrap_or(current.title),
            description: args.description.unwrap_or(current.description),
            completed: args.completed.unwrap_or(current.completed),
            priority: args.priority.or(current.priority),
            due_date: due_date.or(current.due_date),
        };

        let updated = self.api.update_todo(args.id, &update).await?;
        println!("Updated #{}: {}", updated.id, updated.title);
        Ok(())
    }

    pub async fn set_completed(&mut self, id: i64, completed: bool) -> Result<()> {
        let todo = self.api.set_completed(id, completed).await?;
        println!("#{} {} is now {}.", todo.id, todo.title, todo.status_label().to_lowercase());
        Ok(())
    }

    pub async fn delete(&mut self, id: i64) -> Result<()> {
        self.api.delete_todo(id).await?;
        println!("Deleted #{}.", id);
        Ok(())
    }

    /// Pull the public sample catalog and re-post every entry to the todo
    /// service, overlapping requests up to a small cap.
    pub async fn import(&mut self) -> Result<()> {
        let items = self.api.fetch_import_catalog().await?;
        if items.is_empty() {
            println!("Sample catalog is empty, nothing to import.");
            return Ok(());
        }

        println!("Importing {} sample todos...", items.len());

        let api = self.api.clone();
        let results: Vec<Result<String>> = stream::iter(items)
            .map(|item| {
                let api = api.clone();
                async move {
                    let todo = NewTodo {
                        title: item.title.clone(),
                        description: String::new(),
                        completed: Some(item.completed),
                        priority: None,
                        due_date: None,
                    };
                    api.create_todo(&todo).await.map(|created| created.title)
                }
            })
            .buffer_unordered(MAX_CONCURRENT_IMPORTS)
            .collect()
            .await;

        let mut imported = 0usize;
        let mut failed = 0usize;
        for result in results {
            match result {
                Ok(title) => {
                    imported += 1;
                    debug!(title = %title, "Imported");
                }
                Err(e) => {
                    failed += 1;
                    warn!(error = %e, "Failed to import one item");
                }
            }
        }

        if failed > 0 {
            println!("Imported {} todos ({} failed).", imported, failed);
        } else {
            println!("Imported {} todos.", imported);
        }
        Ok(())
    }

    // =========================================================================
    // Profile
    // =========================================================================

    pub fn profile_show(&self) -> Result<()> {
        let user = self
            .session
            .user()
            .ok_or_else(|| anyhow::anyhow!("No active session"))?;
        Self::print_profile(user);
        Ok(())
    }

    pub async fn profile_update(
        &mut self,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Result<()> {
        let current = self
            .session
            .user()
            .ok_or_else(|| anyhow::anyhow!("No active session"))?;

        let first = first_name
            .or_else(|| current.first_name.clone())
            .unwrap_or_default();
        let last = last_name
            .or_else(|| current.last_name.clone())
            .unwrap_or_default();

        if first.trim().is_empty() && last.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "Nothing to update - pass --first-name and/or --last-name"
            ));
        }

        let updated = self.api.update_profile(first.trim(), last.trim()).await?;
        self.session.replace_user(updated);
        println!("Profile updated.");
        Ok(())
    }

    pub async fn profile_password(&mut self) -> Result<()> {
        let current = rpassword::prompt_password("Current password: ")?;
        let new = rpassword::prompt_password("New password: ")?;
        let confirm = rpassword::prompt_password("Confirm new password: ")?;

        if new != confirm {
            return Err(anyhow::anyhow!("Passwords do not match"));
        }

        self.api.change_password(&current, &new).await?;
        println!("Password updated.");
        Ok(())
    }

    pub async fn avatar_set(&mut self, path: &Path) -> Result<()> {
        let response = self.api.upload_avatar(path).await?;

        if let Some(mut user) = self.session.user().cloned() {
            user.profile_picture = Some(response.profile_picture.clone());
            self.session.replace_user(user);
        }

        println!("Profile picture updated: {}", response.profile_picture);
        Ok(())
    }

    pub async fn avatar_clear(&mut self) -> Result<()> {
        self.api.delete_avatar().await?;

        if let Some(mut user) = self.session.user().cloned() {
            user.profile_picture = None;
            self.session.replace_user(user);
        }

        println!("Profile picture removed.");
        Ok(())
    }

    // =========================================================================
    // Output and input helpers
    // =========================================================================

    fn print_todo_table(todos: &[Todo]) {
        println!(
            "{:>5}  {:<9}  {:<7}  {:<10}  {}",
            "ID", "STATUS", "PRI", "DUE", "TITLE"
        );
        for todo in todos {
            let priority = todo.priority.map(|p| p.display_name()).unwrap_or("-");
            let due = todo
                .due_date
                .as_deref()
                .map(format_date)
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:>5}  {:<9}  {:<7}  {:<10}  {}",
                todo.id,
                todo.status_label(),
                priority,
                due,
                truncate_string(&todo.title, TITLE_COLUMN_WIDTH)
            );
        }
    }

    fn print_todo_detail(todo: &Todo) {
        println!("#{} {} [{}]", todo.id, todo.title, todo.status_label());
        if !todo.description.is_empty() {
            println!("\n{}", todo.description);
        }
        println!();
        if let Some(priority) = todo.priority {
            println!("priority:  {}", priority);
        }
        if let Some(due) = &todo.due_date {
            println!("due:       {}", format_date(due));
        }
        if let Some(completed_at) = &todo.completed_at {
            println!("completed: {}", format_date(completed_at));
        }
        if let Some(created) = &todo.created_at {
            println!("created:   {}", format_date(created));
        }
        if let Some(updated) = &todo.updated_at {
            println!("updated:   {}", format_date(updated));
        }
    }

    fn print_profile(user: &UserProfile) {
        println!("{}", user.display_name());
        println!("  id:       {}", user.id);
        println!("  username: {}", user.username);
        println!("  email:    {}", format_optional(&user.email, "(none)"));
        println!(
            "  picture:  {}",
            format_optional(&user.profile_picture, "(none)")
        );
    }

    fn validate_due_date(raw: &str) -> Result<String> {
        chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(|d| d.format("%Y-%m-%d").to_string())
            .with_context(|| format!("Invalid due date '{}' - expected YYYY-MM-DD", raw))
    }

    fn prompt(label: &str) -> Result<String> {
        print!("{}", label);
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        Ok(input.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_due_date() {
        assert_eq!(
            App::validate_due_date("2026-08-10").expect("valid date"),
            "2026-08-10"
        );
        assert!(App::validate_due_date("10/08/2026").is_err());
        assert!(App::validate_due_date("2026-13-40").is_err());
    }

    #[test]
    fn test_auth_failure_message_for_bad_credentials() {
        let err = anyhow::Error::from(ApiError::Unauthorized);
        assert_eq!(
            App::auth_failure_message(&err),
            "Invalid username or password"
        );
    }

    #[test]
    fn test_auth_failure_message_passes_validation_through() {
        let err = anyhow::Error::from(ApiError::Validation("Username already taken".to_string()));
        assert_eq!(App::auth_failure_message(&err), "Username already taken");
    }
}
