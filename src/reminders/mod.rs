pub mod dispatcher;
pub mod schedule;
pub mod scheduler;
pub mod store;

pub use dispatcher::{LogNotifier, ReminderDispatcher, ReminderNotifier};
pub use scheduler::{reminder_message, ReminderScheduler, DEFAULT_REMINDER_HOUR};
pub use store::{ReminderJob, ReminderKey, ReminderStore};
