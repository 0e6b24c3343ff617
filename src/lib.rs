pub mod cli;
pub mod db;
pub mod settings;
pub mod tracker;
pub mod utils;

use std::sync::Arc;

use anyhow::Result;
use log::info;

use db::Database;
use settings::Settings;
use tracker::{Clock, SleepTracker, SystemClock};

/// Everything the process owns for its lifetime. Built once at startup by
/// [`AppState::init`] and torn down with [`AppState::shutdown`].
pub struct AppState {
    pub db: Database,
    pub tracker: SleepTracker,
}

impl AppState {
    pub async fn init(settings: &Settings) -> Result<Self> {
        Self::init_with_clock(settings, Arc::new(SystemClock)).await
    }

    pub async fn init_with_clock(settings: &Settings, clock: Arc<dyn Clock>) -> Result<Self> {
        let db = Database::new(settings.db_path.clone())?;
        let tracker = SleepTracker::new(db.clone(), clock).await?;

        Ok(Self { db, tracker })
    }

    pub async fn shutdown(self) -> Result<()> {
        self.tracker.shutdown().await?;
        info!("Closing sleep history at {}", self.db.path().display());
        // Dropping the last database handle joins the worker thread.
        drop(self.tracker);
        drop(self.db);
        Ok(())
    }
}

pub use cli::run;
