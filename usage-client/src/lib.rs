pub mod api;
pub mod calendar;
pub mod domain;
pub mod timefmt;

pub use calendar::{HolidayCalendar, UsFederalHolidayCalendar};
