//! Fleet and booking records.
//!
//! These are opaque to the sync layer apart from their identity key; the
//! fields exist so callers get typed access through
//! [`crate::sync::SyncOrchestrator::read_entity`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::checklist::{Checklist, ChecklistSection};
use super::key::{EntityType, Key};
use super::Entity;
use crate::error::Result;

/// A vessel of the fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vessel {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_port: Option<String>,
}

impl Entity for Vessel {
    fn key(&self) -> Result<Key> {
        Key::new(EntityType::Vessel, &self.id)
    }
}

/// Booking lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    #[default]
    Option,
    Confirmed,
    CheckedIn,
    CheckedOut,
    Cancelled,
}

/// One charter of a vessel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    /// Booking code, e.g. `NAY-001`.
    pub code: String,
    pub vessel_id: String,
    pub client_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub status: BookingStatus,
}

impl Booking {
    /// Whether the charter covers `date` (both ends inclusive).
    #[must_use]
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

/// All bookings of one vessel, stored as a single record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VesselBookings {
    pub vessel_id: String,
    #[serde(default)]
    pub bookings: Vec<Booking>,
}

impl VesselBookings {
    /// The non-cancelled booking running on `date`, if any.
    #[must_use]
    pub fn active_on(&self, date: NaiveDate) -> Option<&Booking> {
        self.bookings
            .iter()
            .find(|b| b.status != BookingStatus::Cancelled && b.covers(date))
    }
}

impl Entity for VesselBookings {
    fn key(&self) -> Result<Key> {
        Key::new(EntityType::Bookings, &self.vessel_id)
    }
}

/// Deck plan of a vessel with positioned equipment markers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Floorplan {
    pub vessel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_uri: Option<String>,
    #[serde(default)]
    pub markers: Vec<FloorplanMarker>,
}

/// An item placed on a floorplan, in image-relative coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorplanMarker {
    pub item_key: String,
    pub x: f64,
    pub y: f64,
}

impl Entity for Floorplan {
    fn key(&self) -> Result<Key> {
        Key::new(EntityType::Floorplan, &self.vessel_id)
    }
}

/// A closed booking with both checklist snapshots frozen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub booking_code: String,
    pub vessel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<Checklist>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit: Option<Checklist>,
    /// Unix milliseconds.
    pub archived_at: i64,
}

impl Entity for ArchiveRecord {
    fn key(&self) -> Result<Key> {
        Key::new(EntityType::Archive, &self.booking_code)
    }
}

/// End-of-season checklist of a vessel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinterizationChecklist {
    pub vessel_id: String,
    pub season: i32,
    #[serde(default)]
    pub sections: Vec<ChecklistSection>,
}

impl Entity for WinterizationChecklist {
    fn key(&self) -> Result<Key> {
        Key::new(EntityType::Winterization, &self.vessel_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking(code: &str, start: (i32, u32, u32), end: (i32, u32, u32)) -> Booking {
        Booking {
            code: code.into(),
            vessel_id: "7".into(),
            client_name: "Client".into(),
            start_date: NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
            end_date: NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
            status: BookingStatus::Confirmed,
        }
    }

    #[test]
    fn test_active_booking_lookup() {
        let mut cancelled = booking("NAY-000", (2026, 7, 1), (2026, 7, 10));
        cancelled.status = BookingStatus::Cancelled;
        let list = VesselBookings {
            vessel_id: "7".into(),
            bookings: vec![cancelled, booking("NAY-001", (2026, 7, 5), (2026, 7, 12))],
        };

        let day = NaiveDate::from_ymd_opt(2026, 7, 6).unwrap();
        assert_eq!(list.active_on(day).unwrap().code, "NAY-001");
        let after = NaiveDate::from_ymd_opt(2026, 7, 13).unwrap();
        assert!(list.active_on(after).is_none());
    }

    #[test]
    fn test_identity_keys() {
        let record = ArchiveRecord {
            booking_code: "NAY-001".into(),
            vessel_id: "7".into(),
            entry: None,
            exit: None,
            archived_at: 0,
        };
        assert_eq!(record.key().unwrap().canonical(), "archive:NAY-001");

        let vessel = Vessel {
            id: "7".into(),
            name: "Sea Breeze".into(),
            model: None,
            home_port: None,
        };
        assert_eq!(vessel.key().unwrap().canonical(), "vessel:7");
    }
}
