//! todoterm - a terminal client for the Todo API.
//!
//! Talks to the remote todo service for everything: tasks, search, account
//! auth (password and Google sign-in), and profile management. The only
//! state kept on this machine is the config file and the bearer token.

mod api;
mod app;
mod auth;
mod cli;
mod config;
mod models;
mod utils;

use std::io;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use api::ApiError;
use app::App;
use cli::{AuthCommand, AvatarCommand, Cli, Command, ProfileCommand};

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG to control log level (e.g. RUST_LOG=debug); diagnostics
    // go to stderr so command output on stdout stays clean
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    info!("todoterm starting");

    let cli = Cli::parse();
    let mut app = App::new(cli.api_url)?;

    run(cli.command, &mut app).await
}

async fn run(command: Command, app: &mut App) -> Result<()> {
    // Protected commands wait for the persisted token to be verified before
    // any of their requests go out; a failed restore stops them here.
    if command.requires_session() {
        app.require_session().await?;
    }

    let result = match command {
        Command::Login(args) => app.login(args).await,
        Command::Register => app.register().await,
        Command::Logout { forget } => app.logout(forget).await,
        Command::Whoami => app.profile_show(),
        Command::Auth(AuthCommand::Url) => {
            app.print_auth_url();
            Ok(())
        }
        Command::Auth(AuthCommand::Callback { url }) => app.auth_callback(&url).await,
        Command::List { keyword } => app.list(keyword.as_deref()).await,
        Command::Show { id } => app.show(id).await,
        Command::Add(args) => app.add(args).await,
        Command::Edit(args) => app.edit(args).await,
        Command::Done { id } => app.set_completed(id, true).await,
        Command::Reopen { id } => app.set_completed(id, false).await,
        Command::Delete { id } => app.delete(id).await,
        Command::Completed { pending } => app.completed(!pending).await,
        Command::Import => app.import().await,
        Command::Profile(ProfileCommand::Show) => app.profile_show(),
        Command::Profile(ProfileCommand::Update {
            first_name,
            last_name,
        }) => app.profile_update(first_name, last_name).await,
        Command::Profile(ProfileCommand::Password) => app.profile_password().await,
        Command::Profile(ProfileCommand::Avatar(AvatarCommand::Set { path })) => {
            app.avatar_set(&path).await
        }
        Command::Profile(ProfileCommand::Avatar(AvatarCommand::Clear)) => app.avatar_clear().await,
    };

    // A 401 mid-command means the server expired the token; drop the broken
    // session so the next run starts clean
    match result {
        Err(e) if e.downcast_ref::<ApiError>().is_some_and(ApiError::is_auth_failure) => {
            app.drop_session();
            Err(e.context("Session expired - run `todoterm login` and try again"))
        }
        other => other,
    }
}
