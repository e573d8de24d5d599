//! Calendar-window trigger scheduling.

pub mod clock;
pub mod scheduler;
pub mod service;
pub mod validation;
pub mod window;

pub use clock::{Clock, FixedClock, LocalClock};
pub use scheduler::{SchedulerConfig, TickOutcome, TriggerScheduler};
pub use service::ScheduleService;
pub use validation::{ScheduleValidationError, validate_windows};
pub use window::{
    anchor_date, date_key, nominal_start_date, schedule_key, window_is_open,
    within_window,
};
