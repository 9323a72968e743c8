//! Core types for the location subsystem.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// A geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Both coordinates must be real numbers. NaN and infinities are what a
    /// broken source hands back instead of a number.
    pub fn is_well_formed(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }

    /// Check the position, attributing any shape error to `provider`.
    pub fn validate(self, provider: &str) -> Result<Self, LocationError> {
        if self.is_well_formed() {
            Ok(self)
        } else {
            Err(LocationError::DataShape {
                provider: provider.to_string(),
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ns = if self.latitude >= 0.0 { 'N' } else { 'S' };
        let ew = if self.longitude >= 0.0 { 'E' } else { 'W' };
        write!(
            f,
            "{:.4}\u{00B0}{}, {:.4}\u{00B0}{}",
            self.latitude.abs(),
            ns,
            self.longitude.abs(),
            ew
        )
    }
}

/// Where a resolved position came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum PositionSource {
    Cache,
    Provider(String),
}

impl fmt::Display for PositionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cache => write!(f, "Cache"),
            Self::Provider(name) => write!(f, "{}", name),
        }
    }
}

/// A resolved position together with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    #[serde(flatten)]
    pub position: Position,
    pub source: PositionSource,
}

/// The single cached coordinate record.
///
/// Stored as the comma-joined triple `"<latitude>,<longitude>,<timestampMillis>"`.
/// Floats are written with Rust's shortest round-trip formatting, so a value
/// read back is bit-identical to the value written.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CachedRecord {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp_millis: i64,
}

impl CachedRecord {
    pub fn new(position: Position, timestamp_millis: i64) -> Self {
        Self {
            latitude: position.latitude,
            longitude: position.longitude,
            timestamp_millis,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.latitude, self.longitude)
    }

    /// Age of the record at `now`. Negative when the record claims a future time.
    /// Saturates, so an absurd stored timestamp reads as very old or very new.
    pub fn age_millis(&self, now_millis: i64) -> i64 {
        now_millis.saturating_sub(self.timestamp_millis)
    }
}

impl fmt::Display for CachedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.latitude, self.longitude, self.timestamp_millis)
    }
}

/// Why a stored value could not be read back as a [`CachedRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed cached record: {0}")]
pub struct RecordParseError(pub String);

impl FromStr for CachedRecord {
    type Err = RecordParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split(',').map(str::trim).collect();
        let [lat, lon, ts] = fields.as_slice() else {
            return Err(RecordParseError(format!("expected 3 fields, got {}", fields.len())));
        };

        let latitude = parse_coordinate(lat)?;
        let longitude = parse_coordinate(lon)?;
        let timestamp_millis = ts
            .parse::<i64>()
            .map_err(|_| RecordParseError(format!("timestamp '{}' is not an integer", ts)))?;

        Ok(Self { latitude, longitude, timestamp_millis })
    }
}

fn parse_coordinate(raw: &str) -> Result<f64, RecordParseError> {
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(RecordParseError(format!("coordinate '{}' is not a number", raw))),
    }
}

/// Failure reported by a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("position unavailable: {0}")]
    Unavailable(String),

    #[error("permission denied: {0}")]
    Denied(String),

    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("{0}")]
    Other(String),
}

/// Failure of the local key/value store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store contents are not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Location resolution errors.
#[derive(Debug, Error)]
pub enum LocationError {
    /// The last provider tried refused or failed.
    #[error("provider '{provider}' failed: {source}")]
    Provider {
        provider: String,
        source: ProviderError,
    },

    /// The last provider tried answered with something that is not a position.
    #[error("provider '{provider}' returned a malformed position (latitude={latitude}, longitude={longitude})")]
    DataShape {
        provider: String,
        latitude: f64,
        longitude: f64,
    },

    #[error("no providers configured")]
    NoProviders,

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown provider '{0}'")]
    UnknownProvider(String),
}

impl LocationError {
    pub fn is_data_shape(&self) -> bool {
        matches!(self, Self::DataShape { .. })
    }

    pub fn is_provider_failure(&self) -> bool {
        matches!(self, Self::Provider { .. })
    }
}
