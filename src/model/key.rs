//! Typed cache keys.
//!
//! Every synchronizable record is addressed by a [`Key`]: entity type,
//! identifier, and an optional entry/exit [`Mode`]. The canonical string form
//! `type:id[:mode]` is the only key format written to the local cache, so a
//! writer and a reader can never derive different keys for the same record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Separator between key segments in the canonical form.
const SEPARATOR: char = ':';

/// The kinds of record the sync layer knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A vessel of the fleet.
    Vessel,
    /// All bookings of one vessel.
    Bookings,
    /// Check-in/check-out checklist of one booking.
    Checklist,
    /// Deck plan of one vessel.
    Floorplan,
    /// Closed booking archived by its booking code.
    Archive,
    /// Winterization checklist of one vessel.
    Winterization,
}

impl EntityType {
    /// Every entity type, in display order.
    pub const ALL: [Self; 6] = [
        Self::Vessel,
        Self::Bookings,
        Self::Checklist,
        Self::Floorplan,
        Self::Archive,
        Self::Winterization,
    ];

    /// Get the string representation used in keys and storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Vessel => "vessel",
            Self::Bookings => "bookings",
            Self::Checklist => "checklist",
            Self::Floorplan => "floorplan",
            Self::Archive => "archive",
            Self::Winterization => "winterization",
        }
    }

    /// Whether keys of this type must carry a mode.
    #[must_use]
    pub const fn requires_mode(&self) -> bool {
        matches!(self, Self::Checklist)
    }

    /// Prefix of the pre-canonical cache keys for this type.
    ///
    /// Legacy keys were underscore-joined: `checklist_<id>_<mode>`,
    /// `archive_<code>`, and so on.
    #[must_use]
    pub fn legacy_prefix(&self) -> String {
        format!("{}_", self.as_str())
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "vessel" => Ok(Self::Vessel),
            "bookings" => Ok(Self::Bookings),
            "checklist" => Ok(Self::Checklist),
            "floorplan" => Ok(Self::Floorplan),
            "archive" => Ok(Self::Archive),
            "winterization" => Ok(Self::Winterization),
            _ => Err(Error::InvalidArgument(format!("Unknown entity type: {s}"))),
        }
    }
}

/// Entry (check-in) or exit (check-out) partition of checklist state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Entry,
    Exit,
}

impl Mode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Exit => "exit",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "entry" => Ok(Self::Entry),
            "exit" => Ok(Self::Exit),
            _ => Err(Error::InvalidArgument(format!(
                "Unknown mode: {s} (expected entry or exit)"
            ))),
        }
    }
}

/// Identity of one record in the cache and in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Key {
    entity_type: EntityType,
    id: String,
    mode: Option<Mode>,
}

impl Key {
    /// Build a key without a mode.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if the id is empty or contains `:`, or if the
    /// entity type requires a mode.
    pub fn new(entity_type: EntityType, id: impl Into<String>) -> Result<Self> {
        Self::build(entity_type, id.into(), None)
    }

    /// Build a key with an entry/exit mode.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if the id is empty or contains `:`.
    pub fn with_mode(entity_type: EntityType, id: impl Into<String>, mode: Mode) -> Result<Self> {
        Self::build(entity_type, id.into(), Some(mode))
    }

    /// Key of the checklist of `booking` in `mode`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if the booking code is not a valid id.
    pub fn checklist(booking: &str, mode: Mode) -> Result<Self> {
        Self::with_mode(EntityType::Checklist, booking, mode)
    }

    fn build(entity_type: EntityType, id: String, mode: Option<Mode>) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidKey {
            key: format!("{entity_type}{SEPARATOR}{id}"),
            reason: reason.to_string(),
        };

        if id.trim().is_empty() {
            return Err(invalid("id is empty"));
        }
        if id.contains(SEPARATOR) {
            return Err(invalid("id must not contain ':'"));
        }
        if id == "." || id == ".." {
            return Err(invalid("id must not be a relative path segment"));
        }
        if id.chars().any(char::is_control) {
            return Err(invalid("id must not contain control characters"));
        }
        if entity_type.requires_mode() && mode.is_none() {
            return Err(invalid("this entity type needs an entry/exit mode"));
        }

        Ok(Self {
            entity_type,
            id,
            mode,
        })
    }

    #[must_use]
    pub const fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn mode(&self) -> Option<Mode> {
        self.mode
    }

    /// The same record in the other mode, if this key has one.
    #[must_use]
    pub fn counterpart(&self) -> Option<Self> {
        let mode = match self.mode? {
            Mode::Entry => Mode::Exit,
            Mode::Exit => Mode::Entry,
        };
        Some(Self {
            entity_type: self.entity_type,
            id: self.id.clone(),
            mode: Some(mode),
        })
    }

    /// Canonical string form, `type:id[:mode]`.
    #[must_use]
    pub fn canonical(&self) -> String {
        self.to_string()
    }

    /// Resource path segments of this record on the remote store.
    ///
    /// The id is always a single segment, whatever characters it holds, so
    /// records of different types can never address the same resource.
    #[must_use]
    pub fn remote_segments(&self) -> Vec<&str> {
        let id = self.id.as_str();
        let mut segments = match self.entity_type {
            EntityType::Vessel => vec!["vessels", id],
            EntityType::Bookings => vec!["vessels", id, "bookings"],
            EntityType::Checklist => vec!["checklists", id],
            EntityType::Floorplan => vec!["vessels", id, "floorplan"],
            EntityType::Archive => vec!["archive", id],
            EntityType::Winterization => vec!["vessels", id, "winterization"],
        };
        if let Some(mode) = self.mode {
            segments.push(mode.as_str());
        }
        segments
    }

    /// Resource path of this record on the remote store, unencoded.
    #[must_use]
    pub fn remote_path(&self) -> String {
        self.remote_segments()
            .into_iter()
            .fold(String::new(), |path, segment| path + "/" + segment)
    }

    /// Parse a pre-canonical cache key of the given type.
    ///
    /// Returns `None` if the legacy key does not belong to `entity_type` or
    /// cannot be mapped to a valid canonical key.
    #[must_use]
    pub fn from_legacy(entity_type: EntityType, legacy: &str) -> Option<Self> {
        let rest = legacy.strip_prefix(&entity_type.legacy_prefix())?;

        if entity_type.requires_mode() {
            let (id, mode) = rest.rsplit_once('_')?;
            let mode = mode.parse().ok()?;
            return Self::with_mode(entity_type, id, mode).ok();
        }

        Self::new(entity_type, rest).ok()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.entity_type, self.id)?;
        if let Some(mode) = self.mode {
            write!(f, "{SEPARATOR}{mode}")?;
        }
        Ok(())
    }
}

impl FromStr for Key {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidKey {
            key: s.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = s.split(SEPARATOR);
        let entity_type = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| invalid("missing entity type"))?
            .parse::<EntityType>()
            .map_err(|_| invalid("unknown entity type"))?;
        let id = parts.next().ok_or_else(|| invalid("missing id"))?;
        let mode = parts
            .next()
            .map(|m| m.parse::<Mode>().map_err(|_| invalid("mode must be entry or exit")))
            .transpose()?;

        if parts.next().is_some() {
            return Err(invalid("too many segments"));
        }

        Self::build(entity_type, id.to_string(), mode)
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.canonical()
    }
}

impl TryFrom<String> for Key {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_form_round_trips() {
        let key = Key::checklist("NAY-001", Mode::Exit).unwrap();
        assert_eq!(key.canonical(), "checklist:NAY-001:exit");
        assert_eq!("checklist:NAY-001:exit".parse::<Key>().unwrap(), key);

        let vessel: Key = "vessel:7:entry".parse().unwrap();
        assert_eq!(vessel.entity_type(), EntityType::Vessel);
        assert_eq!(vessel.id(), "7");
        assert_eq!(vessel.mode(), Some(Mode::Entry));
    }

    #[test]
    fn test_rejects_malformed_keys() {
        assert!("".parse::<Key>().is_err());
        assert!("boat:7".parse::<Key>().is_err());
        assert!("vessel:".parse::<Key>().is_err());
        assert!("vessel:7:sideways".parse::<Key>().is_err());
        assert!("vessel:7:entry:extra".parse::<Key>().is_err());
        // checklists are always mode-partitioned
        assert!("checklist:NAY-001".parse::<Key>().is_err());
        assert!("vessel:..".parse::<Key>().is_err());
        assert!("vessel:.".parse::<Key>().is_err());
        assert!("archive:A\nB".parse::<Key>().is_err());
    }

    #[test]
    fn test_id_is_one_remote_segment() {
        let nested: Key = "vessel:7/bookings".parse().unwrap();
        let bookings: Key = "bookings:7".parse().unwrap();
        assert_eq!(nested.remote_segments(), vec!["vessels", "7/bookings"]);
        assert_eq!(bookings.remote_segments(), vec!["vessels", "7", "bookings"]);
        assert_ne!(nested.remote_segments(), bookings.remote_segments());
    }

    #[test]
    fn test_remote_paths() {
        let key = Key::checklist("NAY-001", Mode::Entry).unwrap();
        assert_eq!(key.remote_path(), "/checklists/NAY-001/entry");

        let key = Key::new(EntityType::Bookings, "12").unwrap();
        assert_eq!(key.remote_path(), "/vessels/12/bookings");
    }

    #[test]
    fn test_counterpart_flips_mode() {
        let entry = Key::checklist("B-9", Mode::Entry).unwrap();
        let exit = entry.counterpart().unwrap();
        assert_eq!(exit.mode(), Some(Mode::Exit));
        assert_eq!(exit.counterpart().unwrap(), entry);

        let archive = Key::new(EntityType::Archive, "A1").unwrap();
        assert!(archive.counterpart().is_none());
    }

    #[test]
    fn test_from_legacy() {
        let key = Key::from_legacy(EntityType::Checklist, "checklist_sea_breeze_exit").unwrap();
        assert_eq!(key.id(), "sea_breeze");
        assert_eq!(key.mode(), Some(Mode::Exit));

        let key = Key::from_legacy(EntityType::Archive, "archive_NAY-001").unwrap();
        assert_eq!(key.canonical(), "archive:NAY-001");

        assert!(Key::from_legacy(EntityType::Archive, "floorplan_3").is_none());
        assert!(Key::from_legacy(EntityType::Checklist, "checklist_3_sideways").is_none());
    }

    #[test]
    fn test_serde_uses_canonical_string() {
        let key = Key::new(EntityType::Floorplan, "3").unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"floorplan:3\"");
        let back: Key = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
