use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use crate::{
    settings::{default_data_dir, Settings, SettingsStore, UserSettings, SETTINGS_FILE_NAME},
    tracker::{commands, format_history},
    utils::logging::init_logging,
    AppState,
};

/// Track sleep sessions and rate how well you slept.
#[derive(Parser, Debug)]
#[command(name = "sleeptrack", version)]
pub struct Args {
    /// Database file
    #[arg(long, env = "SLEEPTRACK_DB_PATH")]
    pub db: Option<PathBuf>,

    /// Settings file (defaults to settings.json in the data directory)
    #[arg(long, env = "SLEEPTRACK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(long, env = "SLEEPTRACK_DEBUG")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Start a sleep session now
    Start,
    /// Stop the open sleep session
    Stop,
    /// Rate a finished session from 0 (very bad) to 5 (excellent)
    Rate { id: i64, quality: i32 },
    /// Delete the whole history
    Clear,
    /// Print the history, newest first
    List,
    /// Print the tracker state
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Store the database path in the settings file
    SetDb { path: PathBuf },
}

impl Args {
    pub fn settings_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| default_data_dir().join(SETTINGS_FILE_NAME))
    }
}

pub async fn run(args: Args) -> Result<()> {
    let store = SettingsStore::new(args.settings_path())?;
    let file_settings = store.user_settings();
    let settings = Settings::resolve(
        &file_settings,
        args.db.clone(),
        args.debug,
        &default_data_dir(),
    );

    init_logging(settings.debug);

    if let Command::SetDb { path } = &args.command {
        store.update(UserSettings {
            db_path: Some(path.clone()),
            ..file_settings
        })?;
        println!("Database path set to {} in {}", path.display(), store.path().display());
        return Ok(());
    }

    info!("Using sleep history at {}", settings.db_path.display());
    let state = AppState::init(&settings)
        .await
        .context("failed to open sleep history")?;

    let outcome = execute(&state, &args.command).await;
    state.shutdown().await?;
    outcome
}

async fn execute(state: &AppState, command: &Command) -> Result<()> {
    match command {
        Command::Start => match commands::start_session(state).await.map_err(|e| anyhow!(e))? {
            Some(session) => println!("Started sleep session #{}", session.id),
            None => println!("A sleep session is already in progress"),
        },
        Command::Stop => match commands::stop_session(state).await.map_err(|e| anyhow!(e))? {
            Some(session) => {
                let minutes = session.duration_ms() / 60_000;
                println!(
                    "Stopped sleep session #{} after {}:{:02}",
                    session.id,
                    minutes / 60,
                    minutes % 60
                );
                println!(
                    "How did you sleep? Run `sleeptrack rate {} <0-5>`",
                    session.id
                );
                commands::acknowledge_rating(state).await.map_err(|e| anyhow!(e))?;
            }
            None => println!("No sleep session is in progress"),
        },
        Command::Rate { id, quality } => {
            let session = commands::rate_session(state, *id, *quality)
                .await
                .map_err(|e| anyhow!(e))?;
            let label = session.rating().map(|q| q.label()).unwrap_or("not rated");
            println!("Rated sleep session #{} as {}", session.id, label);
        }
        Command::Clear => {
            commands::clear_history(state).await.map_err(|e| anyhow!(e))?;
            if commands::get_tracker_state(state)
                .await
                .map_err(|e| anyhow!(e))?
                .notice
            {
                println!("Sleep history cleared");
                commands::acknowledge_notice(state).await.map_err(|e| anyhow!(e))?;
            }
        }
        Command::List => {
            let sessions = commands::list_sessions(state).await.map_err(|e| anyhow!(e))?;
            print!("{}", format_history(&sessions));
        }
        Command::Status { json } => {
            let snapshot = commands::get_tracker_state(state)
                .await
                .map_err(|e| anyhow!(e))?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                match &snapshot.current_open_session {
                    Some(open) => println!("Sleeping since session #{} began", open.id),
                    None => println!("Awake"),
                }
                println!("Sessions recorded: {}", snapshot.history.len());
            }
        }
        Command::SetDb { .. } => {}
    }
    Ok(())
}
