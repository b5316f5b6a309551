mod app;
mod commands;
mod handler;
mod logging;
mod tui;
mod ui;

use std::io;
use std::path::PathBuf;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use opschat_core::{FileStore, Session};
use app::App;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "opschat")]
#[command(about = "Chat with a pipeline operations agent from the terminal")]
#[command(version)]
struct Cli {
    /// Storage file holding settings and conversation history
    #[arg(long, global = true)]
    storage: Option<PathBuf>,

    /// Log level, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message and print the agent's reply
    Ask {
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
        /// Print the reply as HTML instead of plain text
        #[arg(long)]
        html: bool,
    },
    /// Run a quick action (analyze, logs, errors)
    Quick {
        action: String,
        #[arg(long)]
        html: bool,
    },
    /// Show recent conversation history
    History {
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let storage_path = match cli.storage {
        Some(path) => path,
        None => FileStore::default_path()?,
    };
    // Keep the handle alive so the file writer is flushed on exit
    let _logger = logging::init_logging(&cli.log_level, &logging::logs_dir(&storage_path))
        .context("Failed to start logging")?;

    let store = Box::new(FileStore::open(storage_path.clone()));

    match cli.command {
        None => run_tui(App::new(store)).await,
        Some(Commands::Ask { message, html }) => {
            let mut session = Session::new(store);
            let text = message.join(" ");
            commands::ask(&mut session, &text, html, &mut io::stdout(), &mut io::stderr()).await
        }
        Some(Commands::Quick { action, html }) => {
            let mut session = Session::new(store);
            commands::quick(&mut session, &action, html, &mut io::stdout(), &mut io::stderr()).await
        }
        Some(Commands::History { limit }) => {
            let session = Session::new(store);
            commands::write_history(&session, limit, &mut io::stdout())
        }
    }
}

async fn run_tui(mut app: App) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;

            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event).await?,
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    result
}
