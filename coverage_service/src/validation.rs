//! Input Validation
//!
//! Shape checks applied to every value before it can become part of an entity:
//! ids, commit hashes, project URLs, coverage values and commit timestamps.
//!
//! The newtypes in this module can only be obtained through these checks (both
//! from code and through serde), so an entity holding them is valid by
//! construction and nothing malformed ever reaches the store.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub const SHA_LENGTH: usize = 40;
pub const ID_MIN_LENGTH: usize = 24;
pub const ID_MAX_LENGTH: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    InvalidId(String),
    InvalidSha(String),
    InvalidUrl(String),
    InvalidTimestamp(String),
    InvalidCoverage(f64),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidId(value) => write!(
                f,
                "Invalid id '{}': expected {} to {} characters",
                value, ID_MIN_LENGTH, ID_MAX_LENGTH
            ),
            ValidationError::InvalidSha(value) => write!(
                f,
                "Invalid commit sha '{}': expected exactly {} characters",
                value, SHA_LENGTH
            ),
            ValidationError::InvalidUrl(msg) => write!(f, "Invalid url: {}", msg),
            ValidationError::InvalidTimestamp(value) => {
                write!(f, "Invalid timestamp '{}': expected ISO-8601", value)
            }
            ValidationError::InvalidCoverage(value) => {
                write!(f, "Invalid coverage value {}: must be a finite number", value)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier of a stored entity, or a reference to one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(String);

impl EntityId {
    pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        let length = value.chars().count();
        if !(ID_MIN_LENGTH..=ID_MAX_LENGTH).contains(&length) {
            return Err(ValidationError::InvalidId(value));
        }
        Ok(Self(value))
    }

    /// Digests produced by the identity deriver are always 32 hex characters.
    pub(crate) fn from_digest(digest: String) -> Self {
        debug_assert_eq!(digest.len(), ID_MAX_LENGTH);
        Self(digest)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EntityId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Full git commit hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommitSha(String);

impl CommitSha {
    pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.chars().count() != SHA_LENGTH {
            return Err(ValidationError::InvalidSha(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CommitSha {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<CommitSha> for String {
    fn from(sha: CommitSha) -> Self {
        sha.0
    }
}

impl fmt::Display for CommitSha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Absolute http(s) URL, kept in its normalized serialization.
///
/// The normalized form takes part in the project id, so `https://host` and
/// `https://host/` name the same project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectUrl(String);

impl ProjectUrl {
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let parsed = url::Url::parse(value)
            .map_err(|e| ValidationError::InvalidUrl(format!("'{}': {}", value, e)))?;

        match parsed.scheme() {
            "http" | "https" if parsed.has_host() => Ok(Self(parsed.to_string())),
            scheme => Err(ValidationError::InvalidUrl(format!(
                "'{}': expected an absolute http(s) url, got scheme '{}'",
                value, scheme
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProjectUrl {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProjectUrl> for String {
    fn from(url: ProjectUrl) -> Self {
        url.0
    }
}

impl fmt::Display for ProjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn validate_coverage(value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValidationError::InvalidCoverage(value))
    }
}

// ============================================================================
// Timestamps
// ============================================================================

/// A commit timestamp as submitted, before normalization.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "String")]
pub enum RawTimestamp {
    Aware(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
    Text(String),
}

impl From<DateTime<FixedOffset>> for RawTimestamp {
    fn from(value: DateTime<FixedOffset>) -> Self {
        RawTimestamp::Aware(value)
    }
}

impl From<DateTime<Utc>> for RawTimestamp {
    fn from(value: DateTime<Utc>) -> Self {
        RawTimestamp::Aware(value.fixed_offset())
    }
}

impl From<NaiveDateTime> for RawTimestamp {
    fn from(value: NaiveDateTime) -> Self {
        RawTimestamp::Naive(value)
    }
}

impl From<String> for RawTimestamp {
    fn from(value: String) -> Self {
        RawTimestamp::Text(value)
    }
}

impl From<&str> for RawTimestamp {
    fn from(value: &str) -> Self {
        RawTimestamp::Text(value.to_string())
    }
}

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Turn a submitted timestamp into a UTC instant.
///
/// Values without an offset are read as UTC wall-clock time: the numeric
/// fields are kept and the UTC offset is attached. Values with an offset keep
/// their instant.
pub fn normalize_timestamp(raw: impl Into<RawTimestamp>) -> Result<DateTime<Utc>, ValidationError> {
    match raw.into() {
        RawTimestamp::Aware(value) => Ok(value.with_timezone(&Utc)),
        RawTimestamp::Naive(value) => Ok(Utc.from_utc_datetime(&value)),
        RawTimestamp::Text(value) => parse_iso8601(&value),
    }
}

fn parse_iso8601(value: &str) -> Result<DateTime<Utc>, ValidationError> {
    let trimmed = value.trim();

    if let Ok(aware) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(aware.with_timezone(&Utc));
    }
    if let Ok(aware) = DateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Ok(aware.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| ValidationError::InvalidTimestamp(value.to_string()))
}

/// Stored form of commit timestamps: RFC 3339 in UTC with fixed microsecond
/// precision, so string order is chronological order.
pub(crate) mod stored_timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::normalize_timestamp(raw).map_err(serde::de::Error::custom)
    }
}
