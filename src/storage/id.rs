use std::fmt;

use uuid::Uuid;

/// Opaque, URL-safe identifier of an uploaded image.
///
/// Ids are random v4 UUIDs rendered in hyphenated lowercase form. Anything
/// that does not parse as a UUID is not an id, so user-supplied path segments
/// can never escape the storage directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageId(Uuid);

impl ImageId {
    /// Generate a fresh, globally unique id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an id received from a client.
    ///
    /// Only the canonical hyphenated lowercase form is accepted, the same
    /// form used for directory names and asset URLs.
    pub fn parse(value: &str) -> Option<Self> {
        let uuid = Uuid::parse_str(value).ok()?;
        let id = Self(uuid);
        (id.to_string() == value).then_some(id)
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}
