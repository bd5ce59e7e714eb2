// File: ./src/model/display.rs
use crate::model::recurrence::{Frequency, RecurrenceRule, WeekdayNum};
use chrono::Weekday;

pub trait RuleDisplay {
    /// Human-readable sentence, e.g. "Every month on the last Friday, 5 times".
    fn describe(&self) -> String;
}

fn unit_names(freq: Frequency) -> Option<(&'static str, &'static str)> {
    match freq {
        Frequency::None => None,
        Frequency::Minutely => Some(("minute", "minutes")),
        Frequency::Hourly => Some(("hour", "hours")),
        Frequency::Daily => Some(("day", "days")),
        Frequency::Weekly => Some(("week", "weeks")),
        Frequency::Monthly => Some(("month", "months")),
        Frequency::Yearly => Some(("year", "years")),
    }
}

fn short_day(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}

fn long_day(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn ordinal(n: i8) -> &'static str {
    match n {
        1 => "first",
        2 => "second",
        3 => "third",
        4 => "fourth",
        5 => "fifth",
        _ => "last",
    }
}

fn describe_days(freq: Frequency, days: &[WeekdayNum]) -> String {
    // Monthly anchors read as "the second Tuesday"; plain weekdays as a list.
    if freq == Frequency::Monthly
        && let [day] = days
        && let Some(n) = day.occurrence()
    {
        return format!(" on the {} {}", ordinal(n), long_day(day.weekday()));
    }
    let names: Vec<String> = days
        .iter()
        .map(|d| match d.occurrence() {
            Some(n) => format!("{} {}", ordinal(n), short_day(d.weekday())),
            None => short_day(d.weekday()).to_string(),
        })
        .collect();
    format!(" on {}", names.join(", "))
}

impl RuleDisplay for RecurrenceRule {
    fn describe(&self) -> String {
        let Some((one, many)) = unit_names(self.frequency()) else {
            return "Does not repeat".to_string();
        };

        let mut out = if self.interval() == 1 {
            format!("Every {}", one)
        } else {
            format!("Every {} {}", self.interval(), many)
        };

        if !self.by_day().is_empty() {
            out.push_str(&describe_days(self.frequency(), self.by_day()));
        }
        if let Some(until) = self.until() {
            out.push_str(&format!(", until {}", until.format("%Y-%m-%d")));
        }
        match self.count() {
            0 => {}
            1 => out.push_str(", once"),
            n => out.push_str(&format!(", {} times", n)),
        }
        if self.from_completion() {
            out.push_str(" (after completion)");
        }
        out
    }
}
