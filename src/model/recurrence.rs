// File: ./src/model/recurrence.rs
//! Structured RRULE model: "repeat every N units, optionally on an Nth
//! weekday, optionally bounded by a date or a count".
//!
//! The textual form is the iCalendar RRULE subset stored on tasks:
//! `FREQ=MONTHLY;INTERVAL=2;BYDAY=-1FR;COUNT=6`, with an optional trailing
//! `;FROM=COMPLETION` marker for rules anchored to completion.
use chrono::{NaiveDate, Weekday};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use strum::EnumIter;
use thiserror::Error;

pub const FROM_COMPLETION: &str = "FROM=COMPLETION";
const RRULE_PREFIX: &str = "RRULE:";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed rule part '{0}'")]
    MalformedPart(String),
    #[error("duplicate rule part '{0}'")]
    DuplicateKey(String),
    #[error("unknown frequency '{0}'")]
    UnknownFrequency(String),
    #[error("invalid interval '{0}'")]
    InvalidInterval(String),
    #[error("invalid count '{0}'")]
    InvalidCount(String),
    #[error("invalid weekday '{0}'")]
    InvalidWeekday(String),
    #[error("invalid until date '{0}'")]
    InvalidUntil(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumIter)]
pub enum Frequency {
    #[default]
    None,
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    /// RRULE token, `None` for a rule without a frequency.
    pub fn token(&self) -> Option<&'static str> {
        match self {
            Frequency::None => None,
            Frequency::Minutely => Some("MINUTELY"),
            Frequency::Hourly => Some("HOURLY"),
            Frequency::Daily => Some("DAILY"),
            Frequency::Weekly => Some("WEEKLY"),
            Frequency::Monthly => Some("MONTHLY"),
            Frequency::Yearly => Some("YEARLY"),
        }
    }

    fn from_token(token: &str) -> Result<Self, ParseError> {
        match token.to_ascii_uppercase().as_str() {
            "MINUTELY" => Ok(Frequency::Minutely),
            "HOURLY" => Ok(Frequency::Hourly),
            "DAILY" => Ok(Frequency::Daily),
            "WEEKLY" => Ok(Frequency::Weekly),
            "MONTHLY" => Ok(Frequency::Monthly),
            "YEARLY" => Ok(Frequency::Yearly),
            _ => Err(ParseError::UnknownFrequency(token.to_string())),
        }
    }
}

pub fn weekday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

fn weekday_from_code(code: &str) -> Option<Weekday> {
    match code.to_ascii_uppercase().as_str() {
        "MO" => Some(Weekday::Mon),
        "TU" => Some(Weekday::Tue),
        "WE" => Some(Weekday::Wed),
        "TH" => Some(Weekday::Thu),
        "FR" => Some(Weekday::Fri),
        "SA" => Some(Weekday::Sat),
        "SU" => Some(Weekday::Sun),
        _ => None,
    }
}

/// A BYDAY entry. `occurrence` is the position within the month
/// (1..=5, or -1 for the last one); `None` means "every such weekday".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeekdayNum {
    occurrence: Option<i8>,
    weekday: Weekday,
}

impl WeekdayNum {
    pub const LAST: i8 = -1;

    pub fn every(weekday: Weekday) -> Self {
        Self {
            occurrence: None,
            weekday,
        }
    }

    /// `None` unless `occurrence` is 1..=5 or [`Self::LAST`].
    pub fn nth(occurrence: i8, weekday: Weekday) -> Option<Self> {
        (occurrence == Self::LAST || (1..=5).contains(&occurrence)).then_some(Self {
            occurrence: Some(occurrence),
            weekday,
        })
    }

    pub fn last(weekday: Weekday) -> Self {
        Self {
            occurrence: Some(Self::LAST),
            weekday,
        }
    }

    pub fn occurrence(&self) -> Option<i8> {
        self.occurrence
    }

    pub fn weekday(&self) -> Weekday {
        self.weekday
    }

    pub fn is_last(&self) -> bool {
        self.occurrence == Some(Self::LAST)
    }
}

impl fmt::Display for WeekdayNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(n) = self.occurrence {
            write!(f, "{}", n)?;
        }
        f.write_str(weekday_code(self.weekday))
    }
}

impl FromStr for WeekdayNum {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        let invalid = || ParseError::InvalidWeekday(s.to_string());
        if token.len() < 2 || !token.is_char_boundary(token.len() - 2) {
            return Err(invalid());
        }
        let (prefix, code) = token.split_at(token.len() - 2);
        let weekday = weekday_from_code(code).ok_or_else(invalid)?;
        if prefix.is_empty() {
            return Ok(Self::every(weekday));
        }
        let occurrence: i8 = prefix.parse().map_err(|_| invalid())?;
        Self::nth(occurrence, weekday).ok_or_else(invalid)
    }
}

/// Immutable recurrence rule value. Every `with_*` call returns a new rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    frequency: Frequency,
    interval: u32,
    by_day: Vec<WeekdayNum>,
    until: Option<NaiveDate>,
    count: u32,
    from_completion: bool,
    // Parts we don't model (BYMONTHDAY, WKST, ...), kept verbatim in order.
    extra: Vec<(String, String)>,
}

impl Default for RecurrenceRule {
    fn default() -> Self {
        Self {
            frequency: Frequency::None,
            interval: 1,
            by_day: Vec::new(),
            until: None,
            count: 0,
            from_completion: false,
            extra: Vec::new(),
        }
    }
}

impl RecurrenceRule {
    /// A plain rule of the given frequency with interval 1.
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            ..Self::default()
        }
    }

    pub fn parse(text: &str) -> Result<Self, ParseError> {
        text.parse()
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    pub fn by_day(&self) -> &[WeekdayNum] {
        &self.by_day
    }

    pub fn until(&self) -> Option<NaiveDate> {
        self.until
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn from_completion(&self) -> bool {
        self.from_completion
    }

    pub fn extra_parts(&self) -> &[(String, String)] {
        &self.extra
    }

    pub fn with_frequency(self, frequency: Frequency) -> Self {
        Self { frequency, ..self }
    }

    /// Intervals below 1 are raised to 1.
    pub fn with_interval(self, interval: u32) -> Self {
        Self {
            interval: interval.max(1),
            ..self
        }
    }

    pub fn with_by_day(self, by_day: Vec<WeekdayNum>) -> Self {
        Self { by_day, ..self }
    }

    pub fn with_until(self, until: Option<NaiveDate>) -> Self {
        Self { until, ..self }
    }

    pub fn with_count(self, count: u32) -> Self {
        Self { count, ..self }
    }

    pub fn with_from_completion(self, from_completion: bool) -> Self {
        Self {
            from_completion,
            ..self
        }
    }

    /// True when none of the one-click presets (plain daily, weekly, monthly,
    /// yearly) can express this rule.
    pub fn is_custom(&self) -> bool {
        let anchored = matches!(self.frequency, Frequency::Weekly | Frequency::Monthly)
            && !self.by_day.is_empty();
        anchored
            || matches!(self.frequency, Frequency::Hourly | Frequency::Minutely)
            || self.until.is_some()
            || self.interval != 1
            || self.count != 0
            || !self.extra.is_empty()
    }

    /// The rule text without the completion marker.
    pub fn body(&self) -> String {
        let mut parts = Vec::new();
        if let Some(token) = self.frequency.token() {
            parts.push(format!("FREQ={}", token));
        }
        if self.interval != 1 {
            parts.push(format!("INTERVAL={}", self.interval));
        }
        if !self.by_day.is_empty() {
            let days: Vec<String> = self.by_day.iter().map(|d| d.to_string()).collect();
            parts.push(format!("BYDAY={}", days.join(",")));
        }
        if let Some(until) = self.until {
            parts.push(format!("UNTIL={}", until.format("%Y%m%d")));
        }
        if self.count > 0 {
            parts.push(format!("COUNT={}", self.count));
        }
        for (key, value) in &self.extra {
            parts.push(format!("{}={}", key, value));
        }
        parts.join(";")
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = self.body();
        f.write_str(&body)?;
        if self.from_completion && !body.is_empty() {
            write!(f, ";{}", FROM_COMPLETION)?;
        }
        Ok(())
    }
}

fn parse_until(value: &str) -> Result<NaiveDate, ParseError> {
    let invalid = || ParseError::InvalidUntil(value.to_string());
    // Date-times (20261231T235959Z) keep only their date.
    let date_part = value.get(..8).ok_or_else(invalid)?;
    let rest = &value[8..];
    if !rest.is_empty() && !rest.starts_with(['T', 't']) {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(date_part, "%Y%m%d").map_err(|_| invalid())
}

impl FromStr for RecurrenceRule {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut body = s.trim();
        if body
            .get(..RRULE_PREFIX.len())
            .is_some_and(|p| p.eq_ignore_ascii_case(RRULE_PREFIX))
        {
            body = &body[RRULE_PREFIX.len()..];
        }

        let mut rule = RecurrenceRule::default();
        let mut seen = HashSet::new();

        for part in body.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| ParseError::MalformedPart(part.to_string()))?;
            let key = key.trim().to_ascii_uppercase();
            let value = value.trim();
            if key.is_empty() {
                return Err(ParseError::MalformedPart(part.to_string()));
            }
            if !seen.insert(key.clone()) {
                return Err(ParseError::DuplicateKey(key));
            }

            match key.as_str() {
                "FREQ" => rule.frequency = Frequency::from_token(value)?,
                "INTERVAL" => {
                    rule.interval = value
                        .parse::<u32>()
                        .ok()
                        .filter(|n| *n >= 1)
                        .ok_or_else(|| ParseError::InvalidInterval(value.to_string()))?;
                }
                "BYDAY" => {
                    rule.by_day = value
                        .split(',')
                        .map(str::parse)
                        .collect::<Result<Vec<WeekdayNum>, _>>()?;
                }
                "UNTIL" => rule.until = Some(parse_until(value)?),
                "COUNT" => {
                    rule.count = value
                        .parse()
                        .map_err(|_| ParseError::InvalidCount(value.to_string()))?;
                }
                "FROM" => {
                    if value.eq_ignore_ascii_case("COMPLETION") {
                        rule.from_completion = true;
                    } else {
                        return Err(ParseError::MalformedPart(part.to_string()));
                    }
                }
                _ => rule.extra.push((key, value.to_string())),
            }
        }

        Ok(rule)
    }
}
