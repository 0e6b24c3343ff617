pub mod sleep_sessions;
