use serde::{Deserialize, Serialize};

/// Account profile as returned by the auth and profile endpoints.
/// Replaced wholesale whenever a profile endpoint responds with a new one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, alias = "profilePicture")]
    pub profile_picture: Option<String>,
}

impl UserProfile {
    /// Human-facing name, falling back to the username when no name is set
    pub fn display_name(&self) -> String {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.to_string(),
            (None, Some(last)) => last.to_string(),
            (None, None) => self.username.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_profile() {
        let json = r#"{"id": 1, "username": "bob", "email": "bob@example.com",
                       "first_name": "Bob", "last_name": "Jones",
                       "profile_picture": "https://cdn.example.com/bob.png"}"#;
        let user: UserProfile = serde_json::from_str(json).expect("profile should parse");
        assert_eq!(user.id, 1);
        assert_eq!(user.display_name(), "Bob Jones");
        assert!(user.profile_picture.is_some());
    }

    #[test]
    fn test_parse_minimal_profile() {
        // OAuth accounts may come back with nothing but id and username
        let json = r#"{"id": 7, "username": "carol"}"#;
        let user: UserProfile = serde_json::from_str(json).expect("profile should parse");
        assert_eq!(user.display_name(), "carol");
        assert!(user.first_name.is_none());
        assert!(user.profile_picture.is_none());
    }

    #[test]
    fn test_partial_name() {
        let json = r#"{"id": 2, "username": "dee", "first_name": "Dee"}"#;
        let user: UserProfile = serde_json::from_str(json).expect("profile should parse");
        assert_eq!(user.display_name(), "Dee");
    }
}
