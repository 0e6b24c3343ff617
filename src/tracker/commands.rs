use crate::{
    db::{SleepQuality, SleepSession},
    tracker::{SleepTracker, TrackerState},
    AppState,
};

fn tracker_from_state(state: &AppState) -> SleepTracker {
    state.tracker.clone()
}

pub async fn get_tracker_state(state: &AppState) -> Result<TrackerState, String> {
    Ok(tracker_from_state(state).snapshot())
}

pub async fn start_session(state: &AppState) -> Result<Option<SleepSession>, String> {
    let tracker = tracker_from_state(state);
    tracker.start_session().await.map_err(|e| e.to_string())
}

pub async fn stop_session(state: &AppState) -> Result<Option<SleepSession>, String> {
    let tracker = tracker_from_state(state);
    tracker.stop_session().await.map_err(|e| e.to_string())
}

pub async fn rate_session(
    state: &AppState,
    session_id: i64,
    quality: i32,
) -> Result<SleepSession, String> {
    let quality = SleepQuality::try_from(quality).map_err(|e| e.to_string())?;
    let tracker = tracker_from_state(state);
    tracker
        .rate_session(session_id, quality)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("Sleep session {session_id} not found"))
}

pub async fn clear_history(state: &AppState) -> Result<(), String> {
    let tracker = tracker_from_state(state);
    tracker.clear_history().await.map_err(|e| e.to_string())
}

pub async fn list_sessions(state: &AppState) -> Result<Vec<SleepSession>, String> {
    state
        .db
        .list_sleep_sessions()
        .await
        .map_err(|e| e.to_string())
}

pub async fn acknowledge_rating(state: &AppState) -> Result<(), String> {
    tracker_from_state(state).acknowledge_rating();
    Ok(())
}

pub async fn acknowledge_notice(state: &AppState) -> Result<(), String> {
    tracker_from_state(state).acknowledge_notice();
    Ok(())
}
