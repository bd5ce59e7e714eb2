// File: ./src/model/mod.rs
pub mod calendar;
pub mod display;
pub mod item;
pub mod recurrence;

pub use display::RuleDisplay;
pub use item::Task;
pub use recurrence::{Frequency, ParseError, RecurrenceRule, WeekdayNum};
