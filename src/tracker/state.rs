use serde::{Deserialize, Serialize};

use crate::db::SleepSession;

use super::observable::Observable;

/// Point-in-time copy of every cell the tracker publishes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerState {
    pub current_open_session: Option<SleepSession>,
    pub history: Vec<SleepSession>,
    pub can_start: bool,
    pub can_stop: bool,
    pub can_clear: bool,
    pub rating_requested: Option<SleepSession>,
    pub notice: bool,
}

/// The observable cells behind [`TrackerState`].
///
/// Only `history` and the two one-shot cells are ever written. The open
/// session is derived from the newest history row, the same row `latest()`
/// returns, and the flags are derived from those. Derived cells subscribe
/// first, so any other observer of `history` sees them already updated.
#[derive(Clone)]
pub struct TrackerCells {
    pub current_open_session: Observable<Option<SleepSession>>,
    pub history: Observable<Vec<SleepSession>>,
    pub can_start: Observable<bool>,
    pub can_stop: Observable<bool>,
    pub can_clear: Observable<bool>,
    pub rating_requested: Observable<Option<SleepSession>>,
    pub notice: Observable<bool>,
}

impl TrackerCells {
    pub fn new(history: Vec<SleepSession>) -> Self {
        let history = Observable::new(history);
        let current_open_session =
            history.map(|sessions| open_session_from_latest(sessions.first().cloned()));

        Self {
            can_start: current_open_session.map(|session| session.is_none()),
            can_stop: current_open_session.map(|session| session.is_some()),
            can_clear: history.map(|sessions| !sessions.is_empty()),
            current_open_session,
            history,
            rating_requested: Observable::new(None),
            notice: Observable::new(false),
        }
    }

    pub fn snapshot(&self) -> TrackerState {
        TrackerState {
            current_open_session: self.current_open_session.get(),
            history: self.history.get(),
            can_start: self.can_start.get(),
            can_stop: self.can_stop.get(),
            can_clear: self.can_clear.get(),
            rating_requested: self.rating_requested.get(),
            notice: self.notice.get(),
        }
    }
}

/// The open session, if `latest` is one.
pub fn open_session_from_latest(latest: Option<SleepSession>) -> Option<SleepSession> {
    latest.filter(SleepSession::is_open)
}
