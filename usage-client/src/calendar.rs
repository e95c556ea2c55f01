use std::collections::BTreeSet;

use time::{Date, Duration, Month, Weekday};

/// A source of observed public holidays.
pub trait HolidayCalendar: Send + Sync {
    /// Observed holidays falling in `start..=end`.
    fn holidays(&self, start: Date, end: Date) -> BTreeSet<Date>;
}

/// US federal holidays, with fixed-date holidays shifted to the nearest
/// workday (Saturday to Friday, Sunday to Monday).
#[derive(Debug, Clone, Copy, Default)]
pub struct UsFederalHolidayCalendar;

impl UsFederalHolidayCalendar {
    /// Observed holidays whose rule belongs to `year`.
    ///
    /// New Year's Day of `year` may be observed on 31 December of the
    /// previous year.
    pub fn holidays_for_year(year: i32) -> Vec<Date> {
        let mut out = Vec::with_capacity(11);

        let mut fixed = |month: Month, day: u8| {
            if let Ok(d) = Date::from_calendar_date(year, month, day) {
                out.push(nearest_workday(d));
            }
        };
        fixed(Month::January, 1);
        if year >= 2021 {
            fixed(Month::June, 19);
        }
        fixed(Month::July, 4);
        fixed(Month::November, 11);
        fixed(Month::December, 25);

        let weekday_rules: [(Option<i32>, Month, Weekday, Ordinal); 6] = [
            (Some(1986), Month::January, Weekday::Monday, Ordinal::Nth(3)),
            (None, Month::February, Weekday::Monday, Ordinal::Nth(3)),
            (None, Month::May, Weekday::Monday, Ordinal::Last),
            (None, Month::September, Weekday::Monday, Ordinal::Nth(1)),
            (None, Month::October, Weekday::Monday, Ordinal::Nth(2)),
            (None, Month::November, Weekday::Thursday, Ordinal::Nth(4)),
        ];
        for (since, month, weekday, ordinal) in weekday_rules {
            if since.is_some_and(|first| year < first) {
                continue;
            }
            if let Some(d) = nth_weekday(year, month, weekday, ordinal) {
                out.push(d);
            }
        }

        out.sort();
        out
    }
}

impl HolidayCalendar for UsFederalHolidayCalendar {
    fn holidays(&self, start: Date, end: Date) -> BTreeSet<Date> {
        if start > end {
            return BTreeSet::new();
        }

        // The following year's New Year's Day can be observed inside `end`'s year.
        (start.year()..=end.year() + 1)
            .flat_map(Self::holidays_for_year)
            .filter(|d| *d >= start && *d <= end)
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
enum Ordinal {
    Nth(u8),
    Last,
}

fn nearest_workday(d: Date) -> Date {
    match d.weekday() {
        Weekday::Saturday => d - Duration::days(1),
        Weekday::Sunday => d + Duration::days(1),
        _ => d,
    }
}

fn nth_weekday(year: i32, month: Month, weekday: Weekday, ordinal: Ordinal) -> Option<Date> {
    match ordinal {
        Ordinal::Nth(n) => {
            let first = Date::from_calendar_date(year, month, 1).ok()?;
            let offset = (7 + weekday.number_days_from_monday() as i64
                - first.weekday().number_days_from_monday() as i64)
                % 7;
            let d = first + Duration::days(offset + 7 * (i64::from(n) - 1));
            (d.month() == month).then_some(d)
        }
        Ordinal::Last => {
            let last_day = time::util::days_in_year_month(year, month);
            let last = Date::from_calendar_date(year, month, last_day).ok()?;
            let back = (7 + last.weekday().number_days_from_monday() as i64
                - weekday.number_days_from_monday() as i64)
                % 7;
            Some(last - Duration::days(back))
        }
    }
}
