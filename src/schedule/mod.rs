pub mod calendar;
pub mod generator;
pub mod periodicity;

pub use calendar::today;
pub use generator::{generate_due_dates, DueDates};
pub use periodicity::{IntervalType, Periodicity};
