pub mod sleep_session;

pub use sleep_session::{SleepQuality, SleepSession, UNRATED, UNSAVED_ID};
