// File: ./src/session.rs
//! Editing state for a task's recurrence.
//!
//! A presentation layer owns one `RecurrenceSession` per open editor. It reads
//! the current rule, due date and preset index, and mutates them only through
//! the methods below. Rendering is left to a `SessionListener`.
use crate::config::Config;
use crate::model::calendar;
use crate::model::display::RuleDisplay;
use crate::model::recurrence::{Frequency, RecurrenceRule, WeekdayNum};
use crate::model::Task;
use crate::store::TaskStore;
use anyhow::{Context, Result};
use chrono::{Datelike, Local, TimeZone};
use serde::{Deserialize, Serialize};
use strum::EnumIter;

/// The one-click choices offered next to the custom editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum Preset {
    DoesNotRepeat,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Custom,
}

impl Preset {
    pub fn frequency(&self) -> Option<Frequency> {
        match self {
            Preset::Daily => Some(Frequency::Daily),
            Preset::Weekly => Some(Frequency::Weekly),
            Preset::Monthly => Some(Frequency::Monthly),
            Preset::Yearly => Some(Frequency::Yearly),
            Preset::DoesNotRepeat | Preset::Custom => None,
        }
    }
}

/// Receives display notifications. Both methods default to no-ops.
pub trait SessionListener: Send {
    fn repeat_changed(&mut self, _repeats: bool) {}
    fn refresh(&mut self, _rule: Option<&RecurrenceRule>) {}
}

/// Parses the task's stored rule. The UNTIL bound comes from `repeat_until`,
/// not from the text. Unparsable text means "does not repeat".
pub fn rule_from_task<Tz: TimeZone>(task: &Task, tz: &Tz) -> Option<RecurrenceRule> {
    let text = task.recurrence_without_from();
    if text.trim().is_empty() {
        return None;
    }
    match RecurrenceRule::parse(&text) {
        Ok(rule) => {
            let until = (task.repeat_until > 0).then(|| calendar::date_value(task.repeat_until, tz));
            Some(
                rule.with_until(until)
                    .with_from_completion(task.repeat_after_completion()),
            )
        }
        Err(e) => {
            log::warn!("Ignoring unparsable recurrence on task {}: {}", task.id, e);
            None
        }
    }
}

/// Text stored on the task: the rule without UNTIL, plus the completion marker.
pub fn recurrence_value(rule: Option<&RecurrenceRule>) -> String {
    rule.map(|r| r.clone().with_until(None).to_string())
        .unwrap_or_default()
}

/// `repeat_until` for the rule: midnight of the UNTIL date, or 0.
pub fn repeat_until_millis<Tz: TimeZone>(rule: Option<&RecurrenceRule>, tz: &Tz) -> i64 {
    rule.and_then(RecurrenceRule::until)
        .map(|d| calendar::start_of_day_millis(d, tz))
        .unwrap_or(0)
}

pub fn apply_rule<Tz: TimeZone>(rule: Option<&RecurrenceRule>, task: &mut Task, tz: &Tz) {
    task.repeat_until = repeat_until_millis(rule, tz);
    task.recurrence = recurrence_value(rule);
}

pub fn rule_has_changed<Tz: TimeZone>(
    rule: Option<&RecurrenceRule>,
    original: &Task,
    tz: &Tz,
) -> bool {
    recurrence_value(rule) != original.recurrence
        || original.repeat_until != repeat_until_millis(rule, tz)
}

/// Editor state that survives a teardown/recreate cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Rule text including UNTIL, without the completion marker.
    pub recurrence: String,
    pub due_date: i64,
    pub repeat_after_completion: bool,
}

pub struct RecurrenceSession<Tz: TimeZone = Local> {
    tz: Tz,
    rule: Option<RecurrenceRule>,
    due_date: i64,
    default_repeat_after_completion: bool,
    listener: Option<Box<dyn SessionListener>>,
}

impl RecurrenceSession<Local> {
    pub fn for_task(task: &Task) -> Self {
        Self::initialize(task, Local)
    }
}

impl<Tz: TimeZone> RecurrenceSession<Tz> {
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            rule: None,
            due_date: 0,
            default_repeat_after_completion: false,
            listener: None,
        }
    }

    pub fn initialize(task: &Task, tz: Tz) -> Self {
        let rule = rule_from_task(task, &tz);
        Self {
            rule,
            due_date: task.due_date,
            ..Self::new(tz)
        }
    }

    pub fn restore(snapshot: &SessionSnapshot, tz: Tz) -> Self {
        let rule = if snapshot.recurrence.trim().is_empty() {
            None
        } else {
            RecurrenceRule::parse(&snapshot.recurrence)
                .ok()
                .map(|r| r.with_from_completion(snapshot.repeat_after_completion))
        };
        Self {
            rule,
            due_date: snapshot.due_date,
            ..Self::new(tz)
        }
    }

    pub fn with_config(mut self, config: &Config) -> Self {
        self.default_repeat_after_completion = config.default_repeat_after_completion;
        self
    }

    pub fn with_listener(mut self, listener: Box<dyn SessionListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn rule(&self) -> Option<&RecurrenceRule> {
        self.rule.as_ref()
    }

    pub fn due_date(&self) -> i64 {
        self.due_date
    }

    pub fn repeats(&self) -> bool {
        self.rule.is_some()
    }

    pub fn repeat_after_completion(&self) -> bool {
        self.rule.as_ref().is_some_and(RecurrenceRule::from_completion)
    }

    pub fn is_custom(&self) -> bool {
        self.rule.as_ref().is_some_and(RecurrenceRule::is_custom)
    }

    /// 0 for no rule or a custom one, then 1..=4 for daily..yearly.
    pub fn preset_index(&self) -> usize {
        match &self.rule {
            Some(rule) if !rule.is_custom() => match rule.frequency() {
                Frequency::Daily => 1,
                Frequency::Weekly => 2,
                Frequency::Monthly => 3,
                Frequency::Yearly => 4,
                _ => 0,
            },
            _ => 0,
        }
    }

    pub fn preset(&self) -> Preset {
        match (&self.rule, self.preset_index()) {
            (None, _) => Preset::DoesNotRepeat,
            (Some(_), 1) => Preset::Daily,
            (Some(_), 2) => Preset::Weekly,
            (Some(_), 3) => Preset::Monthly,
            (Some(_), 4) => Preset::Yearly,
            (Some(_), _) => Preset::Custom,
        }
    }

    pub fn description(&self) -> String {
        match &self.rule {
            Some(rule) => rule.describe(),
            None => "Does not repeat".to_string(),
        }
    }

    fn refresh(&mut self) {
        if let Some(listener) = self.listener.as_mut() {
            listener.refresh(self.rule.as_ref());
        }
    }

    /// Picking a preset replaces the rule outright. `Custom` is left to the
    /// caller's own editor, which reports back through `set_custom_rule`.
    pub fn select_preset(&mut self, preset: Preset) {
        match preset {
            Preset::Custom => return,
            Preset::DoesNotRepeat => self.rule = None,
            _ => {
                let from_completion =
                    self.rule.is_none() && self.default_repeat_after_completion;
                self.rule = preset
                    .frequency()
                    .map(|f| RecurrenceRule::new(f).with_from_completion(from_completion));
            }
        }
        log::debug!("Recurrence preset {:?} -> '{}'", preset, recurrence_value(self.rule()));
        let repeats = self.repeats();
        if let Some(listener) = self.listener.as_mut() {
            listener.repeat_changed(repeats);
        }
        self.refresh();
    }

    pub fn set_custom_rule(&mut self, rule: RecurrenceRule) {
        log::debug!("Custom recurrence '{}'", rule);
        self.rule = Some(rule);
        self.refresh();
    }

    pub fn set_repeat_after_completion(&mut self, after_completion: bool) {
        if let Some(rule) = self.rule.take() {
            self.rule = Some(rule.with_from_completion(after_completion));
            self.refresh();
        }
    }

    /// Records the new due date and, for a monthly rule anchored on a weekday,
    /// moves the anchor to the weekday position the new date falls on.
    ///
    /// A previous "last" anchor, or a date that is the 5th such weekday,
    /// becomes -1 when the date is the month's final occurrence of that
    /// weekday and the plain ordinal otherwise.
    pub fn on_due_date_changed(&mut self, due_date: i64) {
        self.due_date = due_date;
        let Some(rule) = &self.rule else {
            return;
        };
        if rule.frequency() != Frequency::Monthly {
            return;
        }
        let Some(anchor) = rule.by_day().first() else {
            return;
        };

        let date = calendar::date_value(due_date, &self.tz);
        let occurrence = calendar::day_of_week_in_month(date) as i8;
        let max = calendar::max_day_of_week_in_month(date) as i8;
        let num = if anchor.is_last() || occurrence == 5 {
            if occurrence == max {
                WeekdayNum::LAST
            } else {
                occurrence
            }
        } else {
            occurrence
        };

        let Some(day) = WeekdayNum::nth(num, date.weekday()) else {
            return;
        };
        self.rule = Some(rule.clone().with_by_day(vec![day]));
        self.refresh();
    }

    pub fn apply(&self, task: &mut Task) {
        apply_rule(self.rule(), task, &self.tz);
    }

    pub fn has_changes(&self, original: &Task) -> bool {
        rule_has_changed(self.rule(), original, &self.tz)
    }

    /// Writes the edited rule to `store` when it differs from `original`.
    /// Returns whether a write happened.
    pub fn commit(&self, store: &dyn TaskStore, original: &Task) -> Result<bool> {
        if !self.has_changes(original) {
            return Ok(false);
        }
        let mut task = original.clone();
        self.apply(&mut task);
        store
            .save_task(&task)
            .with_context(|| format!("Failed to save recurrence for task {}", task.id))?;
        log::info!("Saved recurrence '{}' on task {}", task.recurrence, task.id);
        Ok(true)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            recurrence: self
                .rule
                .as_ref()
                .map(|r| r.clone().with_from_completion(false).to_string())
                .unwrap_or_default(),
            due_date: self.due_date,
            repeat_after_completion: self.repeat_after_completion(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn millis(y: i32, m: u32, d: u32) -> i64 {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis()
    }

    #[test]
    fn test_preset_index_follows_frequency() {
        let mut session = RecurrenceSession::new(Utc);
        assert_eq!(session.preset_index(), 0);
        for (preset, index) in [
            (Preset::Daily, 1),
            (Preset::Weekly, 2),
            (Preset::Monthly, 3),
            (Preset::Yearly, 4),
        ] {
            session.select_preset(preset);
            assert_eq!(session.preset_index(), index);
            assert_eq!(session.preset(), preset);
        }
        session.set_custom_rule(RecurrenceRule::new(Frequency::Daily).with_interval(2));
        assert_eq!(session.preset_index(), 0);
        assert_eq!(session.preset(), Preset::Custom);
    }

    #[test]
    fn test_initialize_takes_until_from_task_field() {
        let mut task = Task::new(1, "Report");
        task.recurrence = "FREQ=WEEKLY;UNTIL=20200101;FROM=COMPLETION".to_string();
        task.repeat_until = millis(2026, 3, 31);

        let session = RecurrenceSession::initialize(&task, Utc);
        let rule = session.rule().unwrap();
        assert_eq!(rule.until(), NaiveDate::from_ymd_opt(2026, 3, 31));
        assert!(rule.from_completion());
    }

    #[test]
    fn test_non_monthly_rule_ignores_due_date_change() {
        let mut task = Task::new(1, "Standup");
        task.recurrence = "FREQ=WEEKLY;BYDAY=MO".to_string();
        let mut session = RecurrenceSession::initialize(&task, Utc);
        session.on_due_date_changed(millis(2025, 7, 29));
        assert_eq!(session.due_date(), millis(2025, 7, 29));
        assert_eq!(session.rule().unwrap().body(), "FREQ=WEEKLY;BYDAY=MO");
    }
}
