pub mod clock;
pub mod commands;
pub mod controller;
pub mod format;
pub mod observable;
pub mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::SleepTracker;
pub use format::format_history;
pub use observable::{Observable, SubscriptionId};
pub use state::{TrackerCells, TrackerState};
