use std::sync::{Arc, Mutex as StdMutex};

use anyhow::{bail, Context, Result};
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::db::{Database, SleepQuality, SleepSession};

use super::{
    clock::Clock,
    observable::Observable,
    state::{open_session_from_latest, TrackerCells, TrackerState},
};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Copies the store's live history into the `history` cell.
///
/// Both the background forwarder and the tracker's own operations go through
/// [`HistoryMirror::sync`]; the lock makes every write carry the newest
/// snapshot, so the cell never moves backwards.
#[derive(Clone)]
struct HistoryMirror {
    source: Arc<StdMutex<watch::Receiver<Vec<SleepSession>>>>,
    target: Observable<Vec<SleepSession>>,
}

impl HistoryMirror {
    fn sync(&self) {
        let mut source = match self.source.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let sessions = source.borrow_and_update().clone();
        self.target.set(sessions);
    }
}

/// Owns every sleep session transition and publishes the derived state.
///
/// Operations are expected to be issued one at a time by a single caller.
/// Store I/O runs on the database thread; the cells are updated once the
/// write has committed.
#[derive(Clone)]
pub struct SleepTracker {
    db: Database,
    clock: Arc<dyn Clock>,
    cells: TrackerCells,
    history: HistoryMirror,
    forwarder: Arc<Mutex<Option<JoinHandle<()>>>>,
    cancel_token: CancellationToken,
}

impl SleepTracker {
    pub async fn new(db: Database, clock: Arc<dyn Clock>) -> Result<Self> {
        let mut source = db.watch_sleep_sessions();
        let history = source.borrow_and_update().clone();
        let cells = TrackerCells::new(history);

        let mirror = HistoryMirror {
            source: Arc::new(StdMutex::new(source)),
            target: cells.history.clone(),
        };

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(forward_history(
            db.watch_sleep_sessions(),
            mirror.clone(),
            cancel_token.clone(),
        ));

        if let Some(open) = cells.current_open_session.get() {
            log_info!("Resuming sleep session {} started at {}", open.id, open.start_time_ms);
        }

        Ok(Self {
            db,
            clock,
            cells,
            history: mirror,
            forwarder: Arc::new(Mutex::new(Some(handle))),
            cancel_token,
        })
    }

    pub fn cells(&self) -> &TrackerCells {
        &self.cells
    }

    pub fn snapshot(&self) -> TrackerState {
        self.cells.snapshot()
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    async fn load_open_session(&self) -> Result<Option<SleepSession>> {
        let latest = self
            .db
            .latest_sleep_session()
            .await
            .context("failed to load the latest sleep session")?;
        Ok(open_session_from_latest(latest))
    }

    /// Opens a new session at the current time.
    ///
    /// Returns `None` without touching the store when a session is already
    /// open.
    pub async fn start_session(&self) -> Result<Option<SleepSession>> {
        if let Some(open) = self.load_open_session().await? {
            self.history.sync();
            log_warn!("Ignoring start, sleep session {} is still open", open.id);
            return Ok(None);
        }

        let inserted = self
            .db
            .insert_sleep_session(&SleepSession::begin(self.clock.now_ms()))
            .await?;
        self.history.sync();

        log_info!("Started sleep session {}", inserted.id);
        Ok(Some(inserted))
    }

    /// Closes the open session and raises `rating_requested` with it.
    ///
    /// A no-op returning `None` when nothing is open.
    pub async fn stop_session(&self) -> Result<Option<SleepSession>> {
        let Some(mut session) = self.cells.current_open_session.get() else {
            log_info!("Ignoring stop, no sleep session is open");
            return Ok(None);
        };

        let now = self.clock.now_ms();
        // A closed session must end after it started or it would read as open again.
        session.end_time_ms = now.max(session.start_time_ms + 1);
        if session.end_time_ms != now {
            log_warn!(
                "Clock reads {} for session {} started at {}, ending it at {}",
                now,
                session.id,
                session.start_time_ms,
                session.end_time_ms
            );
        }

        self.db.update_sleep_session(&session).await?;

        self.history.sync();
        self.cells.rating_requested.raise(Some(session.clone()));

        log_info!(
            "Stopped sleep session {} after {} ms",
            session.id,
            session.duration_ms()
        );
        Ok(Some(session))
    }

    /// Wipes the whole history and raises `notice`.
    pub async fn clear_history(&self) -> Result<()> {
        let removed = self.db.clear_sleep_sessions().await?;

        self.history.sync();
        self.cells.notice.raise(true);

        log_info!("Cleared {} sleep sessions", removed);
        Ok(())
    }

    /// Records a quality rating for a closed session.
    ///
    /// Returns `None` when no session has that id.
    pub async fn rate_session(
        &self,
        id: i64,
        quality: SleepQuality,
    ) -> Result<Option<SleepSession>> {
        let Some(mut session) = self.db.get_sleep_session(id).await? else {
            return Ok(None);
        };
        if session.is_open() {
            bail!("sleep session {id} is still in progress and cannot be rated");
        }

        session.quality = quality.as_i32();
        if !self.db.update_sleep_quality(id, session.quality).await? {
            return Ok(None);
        }
        self.history.sync();

        log_info!("Rated sleep session {} as {}", id, quality);
        Ok(Some(session))
    }

    pub fn acknowledge_rating(&self) {
        self.cells.rating_requested.set(None);
    }

    pub fn acknowledge_notice(&self) {
        self.cells.notice.set(false);
    }

    /// Stops the background history forwarder and waits for it to exit.
    pub async fn shutdown(&self) -> Result<()> {
        self.cancel_token.cancel();

        if let Some(handle) = self.forwarder.lock().await.take() {
            handle
                .await
                .context("history forwarder task failed to join")?;
        }
        Ok(())
    }
}

async fn forward_history(
    mut changes: watch::Receiver<Vec<SleepSession>>,
    mirror: HistoryMirror,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    log_error!("sleep history feed closed, forwarder exiting");
                    break;
                }
                let _ = changes.borrow_and_update();
                mirror.sync();
            }
            _ = cancel_token.cancelled() => {
                break;
            }
        }
    }
}
