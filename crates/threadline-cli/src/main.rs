mod cli;
mod render;

use std::io::{self, BufRead, Write};

use anyhow::{Context, bail};
use clap::Parser;
use tokio::sync::broadcast;
use tracing::debug;

use threadline_client::{ClientConfig, Credentials, Threadline};
use threadline_types::events::SessionEvent;

use crate::cli::{Cli, Commands};
use crate::render::render_forest;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "threadline=info".into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    // Config
    let config = ClientConfig::from_env();
    debug!("Using API at {}", config.api_url);

    let app = Threadline::open(&config)?;
    let mut events = app.session.events();

    let result = run(&app, cli.command).await;
    report_events(&mut events);
    result
}

async fn run(app: &Threadline, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Signup {
            username,
            email,
            password,
        } => {
            let password = password_or_prompt(password)?;
            let user = app.session.signup(&username, &email, &password).await?;
            println!("Welcome, {} (id {})", user.username, user.id);
        }
        Commands::Login {
            identifier,
            password,
            remember,
        } => {
            let password = password_or_prompt(password)?;
            let user = app
                .session
                .login(&Credentials::new(identifier, password, remember))
                .await?;
            println!("Logged in as {}", user.username);
        }
        Commands::Logout => {
            app.session.logout();
            println!("Logged out");
        }
        Commands::Whoami => match app.session.current_user() {
            Some(user) if app.session.is_authenticated() => {
                println!("{} (id {})", user.username, user.id)
            }
            _ => println!("Not logged in"),
        },
        Commands::List => {
            let forest = app.comments.fetch_comments().await?;
            print!("{}", render_forest(&forest, app.session.user_id()));
        }
        Commands::Post { text } => {
            let comment = app
                .comments
                .create_comment(&text, app.session.user_id(), None)
                .await?;
            println!("Posted #{}", comment.id);
            refresh_view(app).await?;
        }
        Commands::Reply { parent_id, text } => {
            let comment = app
                .comments
                .create_comment(&text, app.session.user_id(), Some(parent_id))
                .await?;
            println!("Replied #{} under #{}", comment.id, parent_id);
            refresh_view(app).await?;
        }
        Commands::Delete { id, yes } => {
            if !yes && !confirm(&format!("Delete comment #{} and all its replies?", id))? {
                println!("Cancelled");
                return Ok(());
            }
            app.comments.delete_comment(id).await?;
            println!("Deleted #{}", id);
            refresh_view(app).await?;
        }
    }

    Ok(())
}

/// Re-read the authoritative tree after a mutation.
async fn refresh_view(app: &Threadline) -> anyhow::Result<()> {
    let forest = app.comments.fetch_comments().await?;
    print!("{}", render_forest(&forest, app.session.user_id()));
    Ok(())
}

fn report_events(events: &mut broadcast::Receiver<SessionEvent>) {
    while let Ok(event) = events.try_recv() {
        if event == SessionEvent::LoginRequired {
            eprintln!("Your session has expired. Run `threadline login` to sign in again.");
        }
    }
}

fn password_or_prompt(password: Option<String>) -> anyhow::Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    let line = prompt("Password: ")?;
    if line.is_empty() {
        bail!("Password is required");
    }
    Ok(line)
}

fn confirm(question: &str) -> anyhow::Result<bool> {
    let answer = prompt(&format!("{} [y/N] ", question))?;
    Ok(matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn prompt(label: &str) -> anyhow::Result<String> {
    let mut stdout = io::stdout();
    stdout.write_all(label.as_bytes())?;
    stdout.flush()?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
