use anyhow::{Context, Result};
use log::{debug, error};
use rusqlite::{params, Connection, Row};
use tokio::sync::watch;

use crate::db::{
    connection::Database,
    helpers::{check_time_range, parse_quality},
    models::{SleepSession, UNSAVED_ID},
};

const SELECT_COLUMNS: &str = "SELECT id, start_time_ms, end_time_ms, quality_rating
     FROM daily_sleep_quality";

fn row_to_sleep_session(row: &Row) -> Result<SleepSession> {
    let start_time_ms: i64 = row.get("start_time_ms")?;
    let end_time_ms: i64 = row.get("end_time_ms")?;
    let quality: i32 = row.get("quality_rating")?;

    Ok(SleepSession {
        id: row.get("id")?,
        start_time_ms,
        end_time_ms,
        quality: parse_quality(quality, "quality_rating")?,
    })
}

pub(crate) fn query_all_descending(conn: &Connection) -> Result<Vec<SleepSession>> {
    let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY id DESC"))?;

    let mut rows = stmt.query([])?;
    let mut sessions = Vec::new();
    while let Some(row) = rows.next()? {
        sessions.push(row_to_sleep_session(row)?);
    }

    Ok(sessions)
}

fn query_one(conn: &Connection, sql: &str, id: Option<i64>) -> Result<Option<SleepSession>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = match id {
        Some(id) => stmt.query(params![id])?,
        None => stmt.query([])?,
    };
    match rows.next()? {
        Some(row) => Ok(Some(row_to_sleep_session(row)?)),
        None => Ok(None),
    }
}

fn publish(feed: &watch::Sender<Vec<SleepSession>>, conn: &Connection) {
    // The write has already committed; a failed re-read leaves the previous
    // snapshot in place and the next successful write replaces it.
    match query_all_descending(conn) {
        Ok(sessions) => {
            feed.send_replace(sessions);
        }
        Err(err) => error!("Failed to refresh sleep history after write: {err:?}"),
    }
}

impl Database {
    /// Run a write on the DB thread and refresh the live history when the
    /// task reports that it touched the table.
    async fn write_sleep_sessions<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<(T, bool)> + Send + 'static,
        T: Send + 'static,
    {
        let feed = self.sleep_session_feed();
        self.execute(move |conn| {
            let (value, changed) = task(conn)?;
            if changed {
                publish(&feed, conn);
            }
            Ok(value)
        })
        .await
    }

    /// Appends a row. The id is assigned by SQLite unless the record already
    /// carries one.
    pub async fn insert_sleep_session(&self, session: &SleepSession) -> Result<SleepSession> {
        let mut record = session.clone();
        check_time_range(record.start_time_ms, record.end_time_ms)?;
        parse_quality(record.quality, "quality")?;

        self.write_sleep_sessions(move |conn| {
            if record.id == UNSAVED_ID {
                conn.execute(
                    "INSERT INTO daily_sleep_quality (start_time_ms, end_time_ms, quality_rating)
                     VALUES (?1, ?2, ?3)",
                    params![record.start_time_ms, record.end_time_ms, record.quality],
                )
                .with_context(|| "failed to insert sleep session")?;
                record.id = conn.last_insert_rowid();
            } else {
                conn.execute(
                    "INSERT INTO daily_sleep_quality (id, start_time_ms, end_time_ms, quality_rating)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        record.id,
                        record.start_time_ms,
                        record.end_time_ms,
                        record.quality
                    ],
                )
                .with_context(|| format!("failed to insert sleep session {}", record.id))?;
            }
            Ok((record, true))
        })
        .await
    }

    /// Overwrites the row matching `session.id`. Unknown ids are ignored.
    pub async fn update_sleep_session(&self, session: &SleepSession) -> Result<()> {
        let record = session.clone();
        check_time_range(record.start_time_ms, record.end_time_ms)?;
        parse_quality(record.quality, "quality")?;

        self.write_sleep_sessions(move |conn| {
            let rows_affected = conn
                .execute(
                    "UPDATE daily_sleep_quality
                     SET start_time_ms = ?1,
                         end_time_ms = ?2,
                         quality_rating = ?3
                     WHERE id = ?4",
                    params![
                        record.start_time_ms,
                        record.end_time_ms,
                        record.quality,
                        record.id
                    ],
                )
                .with_context(|| format!("failed to update sleep session {}", record.id))?;

            if rows_affected == 0 {
                debug!("Update skipped, no sleep session with id {}", record.id);
            }
            Ok(((), rows_affected > 0))
        })
        .await
    }

    /// Sets only the quality column. Returns whether a row matched.
    pub async fn update_sleep_quality(&self, id: i64, quality: i32) -> Result<bool> {
        parse_quality(quality, "quality")?;

        self.write_sleep_sessions(move |conn| {
            let rows_affected = conn
                .execute(
                    "UPDATE daily_sleep_quality SET quality_rating = ?1 WHERE id = ?2",
                    params![quality, id],
                )
                .with_context(|| format!("failed to rate sleep session {id}"))?;
            Ok((rows_affected > 0, rows_affected > 0))
        })
        .await
    }

    pub async fn get_sleep_session(&self, id: i64) -> Result<Option<SleepSession>> {
        self.execute(move |conn| {
            query_one(conn, &format!("{SELECT_COLUMNS} WHERE id = ?1"), Some(id))
        })
        .await
    }

    /// The most recently inserted session, open or not.
    pub async fn latest_sleep_session(&self) -> Result<Option<SleepSession>> {
        self.execute(|conn| {
            query_one(conn, &format!("{SELECT_COLUMNS} ORDER BY id DESC LIMIT 1"), None)
        })
        .await
    }

    /// Every session, newest first.
    pub async fn list_sleep_sessions(&self) -> Result<Vec<SleepSession>> {
        self.execute(|conn| query_all_descending(conn)).await
    }

    /// Live view of [`Database::list_sleep_sessions`]. The receiver observes a
    /// new snapshot after each committed write.
    pub fn watch_sleep_sessions(&self) -> watch::Receiver<Vec<SleepSession>> {
        self.sleep_session_feed().subscribe()
    }

    /// Deletes every row. Returns how many were removed.
    pub async fn clear_sleep_sessions(&self) -> Result<usize> {
        self.write_sleep_sessions(|conn| {
            let removed = conn
                .execute("DELETE FROM daily_sleep_quality", [])
                .with_context(|| "failed to clear sleep history")?;
            Ok((removed, true))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn open_db() -> (TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("sleep.db")).unwrap();
        (dir, db)
    }

    fn closed(start: i64, end: i64) -> SleepSession {
        SleepSession {
            end_time_ms: end,
            ..SleepSession::begin(start)
        }
    }

    #[tokio::test]
    async fn latest_is_none_on_empty_store() {
        let (_dir, db) = open_db();
        assert_eq!(db.latest_sleep_session().await.unwrap(), None);
        assert!(db.list_sleep_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn latest_returns_the_only_inserted_record() {
        let (_dir, db) = open_db();
        let inserted = db
            .insert_sleep_session(&SleepSession::begin(1_000))
            .await
            .unwrap();

        assert_eq!(inserted.id, 1);
        assert_eq!(db.latest_sleep_session().await.unwrap(), Some(inserted));
    }

    #[tokio::test]
    async fn get_returns_record_equal_in_all_fields() {
        let (_dir, db) = open_db();
        let inserted = db
            .insert_sleep_session(&SleepSession {
                quality: 4,
                ..closed(1_000, 9_000)
            })
            .await
            .unwrap();

        let fetched = db.get_sleep_session(inserted.id).await.unwrap();
        assert_eq!(fetched, Some(inserted));
        assert_eq!(db.get_sleep_session(42).await.unwrap(), None);
    }

    #[tokio::test]
    async fn insert_keeps_an_explicit_id() {
        let (_dir, db) = open_db();
        let inserted = db
            .insert_sleep_session(&SleepSession {
                id: 10,
                ..SleepSession::begin(1_000)
            })
            .await
            .unwrap();
        assert_eq!(inserted.id, 10);

        let next = db
            .insert_sleep_session(&SleepSession::begin(2_000))
            .await
            .unwrap();
        assert_eq!(next.id, 11);
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let (_dir, db) = open_db();
        let first = db.insert_sleep_session(&closed(1_000, 2_000)).await.unwrap();
        let second = db.insert_sleep_session(&closed(3_000, 4_000)).await.unwrap();

        let listed = db.list_sleep_sessions().await.unwrap();
        assert_eq!(listed, vec![second, first]);
    }

    #[tokio::test]
    async fn update_overwrites_matching_row() {
        let (_dir, db) = open_db();
        let mut session = db
            .insert_sleep_session(&SleepSession::begin(1_000))
            .await
            .unwrap();

        session.end_time_ms = 5_000;
        db.update_sleep_session(&session).await.unwrap();

        assert_eq!(db.get_sleep_session(session.id).await.unwrap(), Some(session));
    }

    #[tokio::test]
    async fn update_of_unknown_id_is_silent() {
        let (_dir, db) = open_db();
        let ghost = SleepSession {
            id: 99,
            ..closed(1_000, 2_000)
        };

        db.update_sleep_session(&ghost).await.unwrap();
        assert!(db.list_sleep_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_rows_are_rejected_before_writing() {
        let (_dir, db) = open_db();
        assert!(db.insert_sleep_session(&closed(5_000, 1_000)).await.is_err());
        assert!(db
            .insert_sleep_session(&SleepSession {
                quality: 7,
                ..SleepSession::begin(1_000)
            })
            .await
            .is_err());
        assert!(db.list_sleep_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn quality_update_reports_whether_row_matched() {
        let (_dir, db) = open_db();
        let session = db.insert_sleep_session(&closed(1_000, 2_000)).await.unwrap();

        assert!(db.update_sleep_quality(session.id, 3).await.unwrap());
        assert!(!db.update_sleep_quality(session.id + 1, 3).await.unwrap());
        assert_eq!(
            db.get_sleep_session(session.id).await.unwrap().unwrap().quality,
            3
        );
    }

    #[tokio::test]
    async fn clear_empties_table_and_ids_are_not_reused() {
        let (_dir, db) = open_db();
        db.insert_sleep_session(&closed(1_000, 2_000)).await.unwrap();
        db.insert_sleep_session(&closed(3_000, 4_000)).await.unwrap();

        assert_eq!(db.clear_sleep_sessions().await.unwrap(), 2);
        assert!(db.list_sleep_sessions().await.unwrap().is_empty());

        let after = db
            .insert_sleep_session(&SleepSession::begin(5_000))
            .await
            .unwrap();
        assert_eq!(after.id, 3);
    }

    #[tokio::test]
    async fn watchers_see_committed_writes() {
        let (_dir, db) = open_db();
        let mut rx = db.watch_sleep_sessions();
        assert!(rx.borrow_and_update().is_empty());

        let inserted = db
            .insert_sleep_session(&SleepSession::begin(1_000))
            .await
            .unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), vec![inserted]);

        db.clear_sleep_sessions().await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_empty());
    }

    #[tokio::test]
    async fn history_survives_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sleep.db");

        let inserted = {
            let db = Database::new(path.clone()).unwrap();
            db.insert_sleep_session(&closed(1_000, 2_000)).await.unwrap()
        };

        let reopened = Database::new(path).unwrap();
        assert_eq!(*reopened.watch_sleep_sessions().borrow(), vec![inserted]);
    }
}
