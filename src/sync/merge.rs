//! Reconciliation rules.
//!
//! Pure functions over already-fetched snapshots. Nothing here does I/O.

use std::collections::{HashMap, HashSet};

use crate::model::{Checklist, ChecklistItem, ChecklistSection, Mode, SyncMetadata};

/// Which version of a record survives a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    Local,
    Remote,
}

/// Last-write-wins between a cached version and a remote version.
///
/// The remote version wins ties.
#[must_use]
pub const fn resolve(local: &SyncMetadata, remote: &SyncMetadata) -> Winner {
    if local.updated_at > remote.updated_at {
        Winner::Local
    } else {
        Winner::Remote
    }
}

/// Build the exit-mode items of a booking from its entry-mode items.
///
/// Every entry item yields one exit item carrying the entry's
/// `checked_at_entry`. Exit-side fields come from `exit_items` when the key
/// already exists there, otherwise they start unset. Exit items with no
/// entry counterpart (added during check-out) follow, in their original
/// order.
#[must_use]
pub fn merge_exit_from_entry(
    entry_items: &[ChecklistItem],
    exit_items: Option<&[ChecklistItem]>,
) -> Vec<ChecklistItem> {
    let exit_items = exit_items.unwrap_or_default();
    let existing: HashMap<&str, &ChecklistItem> =
        exit_items.iter().map(|item| (item.key.as_str(), item)).collect();

    let mut merged = Vec::with_capacity(entry_items.len().max(exit_items.len()));
    let mut from_entry = HashSet::new();

    for entry in entry_items {
        let item = match existing.get(entry.key.as_str()) {
            Some(exit) => ChecklistItem {
                checked_at_entry: entry.checked_at_entry,
                ..(*exit).clone()
            },
            None => entry.without_exit_state(),
        };
        from_entry.insert(entry.key.as_str());
        merged.push(item);
    }

    merged.extend(
        exit_items
            .iter()
            .filter(|item| !from_entry.contains(item.key.as_str()))
            .cloned(),
    );
    merged
}

/// Build the exit checklist of a booking from both snapshots.
///
/// Sections are matched by id and their items merged with
/// [`merge_exit_from_entry`]. Sections only present in the exit snapshot are
/// kept after the entry-derived ones.
#[must_use]
pub fn merge_exit_checklist(
    booking: &str,
    entry: Option<&Checklist>,
    exit: Option<&Checklist>,
) -> Checklist {
    let mut merged = Checklist::new(booking, Mode::Exit);
    let exit_sections = exit.map_or(&[][..], |c| c.sections.as_slice());

    let Some(entry) = entry else {
        merged.sections = exit_sections.to_vec();
        return merged;
    };

    let existing: HashMap<&str, &ChecklistSection> =
        exit_sections.iter().map(|s| (s.id.as_str(), s)).collect();

    for section in &entry.sections {
        let exit_section = existing.get(section.id.as_str());
        merged.sections.push(ChecklistSection {
            id: section.id.clone(),
            title: exit_section.map_or_else(|| section.title.clone(), |s| s.title.clone()),
            items: merge_exit_from_entry(
                &section.items,
                exit_section.map(|s| s.items.as_slice()),
            ),
        });
    }

    let entry_ids: HashSet<&str> = entry.sections.iter().map(|s| s.id.as_str()).collect();
    merged.sections.extend(
        exit_sections
            .iter()
            .filter(|s| !entry_ids.contains(s.id.as_str()))
            .cloned(),
    );
    merged
}
