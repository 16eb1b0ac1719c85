//! Checklist model.
//!
//! A booking has two independent checklist snapshots, one per [`Mode`].
//! The entry snapshot records what was on board at check-in; the exit
//! snapshot records the check-out inspection and inherits the entry flags
//! (see [`crate::sync::merge`]).

use serde::{Deserialize, Serialize};

use super::key::{Key, Mode};
use super::Entity;
use crate::error::Result;

/// Outcome of the check-out inspection of one item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitCheck {
    #[default]
    Unset,
    Ok,
    NotOk,
}

/// Reference to a photo or document attached to an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// One line of a checklist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    /// Stable identifier, shared by the entry and exit copy of the item.
    pub key: String,
    pub label: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub unit_price: f64,
    /// Present at check-in. Carried forward into the exit snapshot.
    #[serde(default)]
    pub checked_at_entry: bool,
    /// Check-out result. Only meaningful in exit mode.
    #[serde(default)]
    pub checked_at_exit: ExitCheck,
    /// Units to replace at check-out.
    #[serde(default)]
    pub replacement_quantity: u32,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub attached_media: Vec<MediaRef>,
    /// Added by the crew rather than coming from the vessel template.
    #[serde(default)]
    pub is_user_added: bool,
}

fn default_quantity() -> u32 {
    1
}

impl ChecklistItem {
    /// Create an item with template defaults: nothing checked, no comments.
    #[must_use]
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            quantity: default_quantity(),
            unit_price: 0.0,
            checked_at_entry: false,
            checked_at_exit: ExitCheck::Unset,
            replacement_quantity: 0,
            comments: String::new(),
            attached_media: Vec::new(),
            is_user_added: false,
        }
    }

    /// Copy of this item with every exit-side field cleared.
    #[must_use]
    pub fn without_exit_state(&self) -> Self {
        Self {
            checked_at_exit: ExitCheck::Unset,
            replacement_quantity: 0,
            comments: String::new(),
            attached_media: Vec::new(),
            ..self.clone()
        }
    }

    /// Cost of the replacements recorded at check-out.
    #[must_use]
    pub fn replacement_cost(&self) -> f64 {
        f64::from(self.replacement_quantity) * self.unit_price
    }
}

/// A titled group of items (e.g. "Engine room", "Safety").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistSection {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub items: Vec<ChecklistItem>,
}

/// The checklist snapshot of one booking in one mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checklist {
    pub booking: String,
    pub mode: Mode,
    #[serde(default)]
    pub sections: Vec<ChecklistSection>,
}

impl Checklist {
    /// Empty checklist for a booking.
    #[must_use]
    pub fn new(booking: impl Into<String>, mode: Mode) -> Self {
        Self {
            booking: booking.into(),
            mode,
            sections: Vec::new(),
        }
    }

    /// Iterate over every item of every section.
    pub fn items(&self) -> impl Iterator<Item = &ChecklistItem> {
        self.sections.iter().flat_map(|s| s.items.iter())
    }

    /// Find an item by key across sections.
    #[must_use]
    pub fn item(&self, key: &str) -> Option<&ChecklistItem> {
        self.items().find(|i| i.key == key)
    }

    /// Total replacement cost of an exit checklist.
    #[must_use]
    pub fn replacement_total(&self) -> f64 {
        self.items().map(ChecklistItem::replacement_cost).sum()
    }
}

impl Entity for Checklist {
    fn key(&self) -> Result<Key> {
        Key::checklist(&self.booking, self.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_defaults_from_sparse_json() {
        let item: ChecklistItem =
            serde_json::from_str(r#"{"key":"engine","label":"Engine","checked_at_entry":true}"#)
                .unwrap();
        assert!(item.checked_at_entry);
        assert_eq!(item.checked_at_exit, ExitCheck::Unset);
        assert_eq!(item.quantity, 1);
        assert!(item.attached_media.is_empty());
    }

    #[test]
    fn test_exit_check_wire_names() {
        assert_eq!(serde_json::to_string(&ExitCheck::NotOk).unwrap(), "\"not_ok\"");
        assert_eq!(serde_json::to_string(&ExitCheck::Unset).unwrap(), "\"unset\"");
    }

    #[test]
    fn test_replacement_total() {
        let mut rope = ChecklistItem::new("rope", "Mooring rope");
        rope.unit_price = 25.0;
        rope.replacement_quantity = 2;
        let mut checklist = Checklist::new("NAY-001", Mode::Exit);
        checklist.sections.push(ChecklistSection {
            id: "deck".into(),
            title: "Deck".into(),
            items: vec![rope, ChecklistItem::new("fender", "Fender")],
        });

        assert!((checklist.replacement_total() - 50.0).abs() < f64::EPSILON);
        assert_eq!(checklist.key().unwrap().canonical(), "checklist:NAY-001:exit");
    }
}
