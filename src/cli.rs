//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::models::Priority;

#[derive(Debug, Parser)]
#[command(name = "todoterm", version, about, long_about = None)]
pub struct Cli {
    /// Base URL of the todo service
    #[arg(long, env = "TODOTERM_API_URL", global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in with username and password
    Login(LoginArgs),

    /// Create a new account
    Register,

    /// Log out and clear the stored token
    Logout {
        /// Also remove the password saved in the OS keychain
        #[arg(long)]
        forget: bool,
    },

    /// Show the currently authenticated account
    Whoami,

    /// Google sign-in helpers
    #[command(subcommand)]
    Auth(AuthCommand),

    /// List todos, optionally filtered by keyword
    List {
        /// Keyword to search for
        #[arg(long, short)]
        keyword: Option<String>,
    },

    /// Show one todo in full
    Show {
        /// Todo id
        id: i64,
    },

    /// Add a new todo
    Add(AddArgs),

    /// Edit a todo's fields
    Edit(EditArgs),

    /// Mark a todo as completed
    Done {
        /// Todo id
        id: i64,
    },

    /// Mark a completed todo as pending again
    Reopen {
        /// Todo id
        id: i64,
    },

    /// Delete a todo
    Delete {
        /// Todo id
        id: i64,
    },

    /// List todos by completion state (completed by default)
    Completed {
        /// Show pending todos instead
        #[arg(long)]
        pending: bool,
    },

    /// Import the public sample catalog into your todo list
    Import,

    /// View and edit the account profile
    #[command(subcommand)]
    Profile(ProfileCommand),
}

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Username (defaults to the last one used)
    #[arg(long, short)]
    pub username: Option<String>,

    /// Save the password in the OS keychain for next time
    #[arg(long)]
    pub remember: bool,
}

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Title of the new todo
    pub title: String,

    /// Longer description
    #[arg(long, short, default_value = "")]
    pub description: String,

    /// Priority: low, medium, or high
    #[arg(long, short)]
    pub priority: Option<Priority>,

    /// Due date (YYYY-MM-DD)
    #[arg(long)]
    pub due: Option<String>,
}

#[derive(Debug, Args)]
pub struct EditArgs {
    /// Todo id
    pub id: i64,

    /// New title
    #[arg(long)]
    pub title: Option<String>,

    /// New description
    #[arg(long, short)]
    pub description: Option<String>,

    /// New priority: low, medium, or high
    #[arg(long, short)]
    pub priority: Option<Priority>,

    /// New due date (YYYY-MM-DD)
    #[arg(long)]
    pub due: Option<String>,

    /// Completion state
    #[arg(long)]
    pub completed: Option<bool>,
}

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Print the Google sign-in URL to open in a browser
    Url,

    /// Complete sign-in with the redirect URL the browser landed on
    Callback {
        /// Full callback URL (contains ?token=...)
        url: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    /// Show the current profile
    Show,

    /// Update first and last name
    Update {
        /// New first name
        #[arg(long)]
        first_name: Option<String>,

        /// New last name
        #[arg(long)]
        last_name: Option<String>,
    },

    /// Change the account password
    Password,

    /// Profile picture operations
    #[command(subcommand)]
    Avatar(AvatarCommand),
}

#[derive(Debug, Subcommand)]
pub enum AvatarCommand {
    /// Upload a profile picture (jpg, png, or gif, up to 5 MB)
    Set {
        /// Path to the image file
        path: PathBuf,
    },

    /// Remove the profile picture
    Clear,
}

impl Command {
    /// Whether this command needs a verified session before it may issue any
    /// request. Commands that establish or tear down the session manage auth
    /// state themselves.
    pub fn requires_session(&self) -> bool {
        !matches!(
            self,
            Command::Login(_) | Command::Register | Command::Logout { .. } | Command::Auth(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_session_gate_classification() {
        let login = Cli::parse_from(["todoterm", "login"]);
        assert!(!login.command.requires_session());

        let callback = Cli::parse_from(["todoterm", "auth", "callback", "https://x/cb?token=t"]);
        assert!(!callback.command.requires_session());

        let list = Cli::parse_from(["todoterm", "list"]);
        assert!(list.command.requires_session());

        let avatar = Cli::parse_from(["todoterm", "profile", "avatar", "clear"]);
        assert!(avatar.command.requires_session());
    }

    #[test]
    fn test_priority_parses_through_clap() {
        let cli = Cli::parse_from(["todoterm", "add", "buy milk", "--priority", "high"]);
        match cli.command {
            Command::Add(args) => assert_eq!(args.priority, Some(Priority::High)),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
