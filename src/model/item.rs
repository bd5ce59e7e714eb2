// File: ./src/model/item.rs
use crate::model::recurrence::FROM_COMPLETION;
use serde::{Deserialize, Serialize};

/// The slice of a task record that recurrence editing reads and writes.
/// Dates are epoch milliseconds; 0 means unset.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub due_date: i64,
    #[serde(default)]
    pub repeat_until: i64,
    /// Stored RRULE text, possibly ending in `;FROM=COMPLETION`.
    #[serde(default)]
    pub recurrence: String,
}

impl Task {
    pub fn new(id: i64, title: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
            ..Self::default()
        }
    }

    pub fn has_due_date(&self) -> bool {
        self.due_date > 0
    }

    pub fn is_recurring(&self) -> bool {
        !self.recurrence.trim().is_empty()
    }

    pub fn repeat_after_completion(&self) -> bool {
        self.recurrence.contains(FROM_COMPLETION)
    }

    /// The rule text with every `FROM=...` part removed.
    pub fn recurrence_without_from(&self) -> String {
        self.recurrence
            .split(';')
            .filter(|part| {
                !part
                    .trim()
                    .get(..5)
                    .is_some_and(|k| k.eq_ignore_ascii_case("FROM="))
            })
            .collect::<Vec<_>>()
            .join(";")
    }
}
