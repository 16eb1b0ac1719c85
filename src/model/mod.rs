//! Data models for Charter Sync.
//!
//! This module contains the domain records that flow through the sync layer:
//! - Key, EntityType, Mode (cache/remote identity)
//! - SyncMetadata, WriteSource (write provenance)
//! - Checklist, ChecklistSection, ChecklistItem
//! - Vessel, VesselBookings, Floorplan, ArchiveRecord, WinterizationChecklist

pub mod checklist;
pub mod fleet;
pub mod key;
pub mod meta;

pub use checklist::{Checklist, ChecklistItem, ChecklistSection, ExitCheck, MediaRef};
pub use fleet::{
    ArchiveRecord, Booking, BookingStatus, Floorplan, FloorplanMarker, Vessel, VesselBookings,
    WinterizationChecklist,
};
pub use key::{EntityType, Key, Mode};
pub use meta::{SyncMetadata, WriteSource};

use crate::error::Result;

/// A record with a stable identity key.
pub trait Entity {
    /// The key this record is cached and stored under.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if the record's identifier cannot form a key.
    fn key(&self) -> Result<Key>;
}
