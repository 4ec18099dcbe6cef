//! Shared error type for the qmag-nav workspace.

use serde::Serialize;
use thiserror::Error;

/// Result type alias using [`NavError`].
pub type NavResult<T> = Result<T, NavError>;

/// Primary error type for navigation-pipeline operations.
///
/// Each variant corresponds to one of the error kinds named in the
/// system's error handling design: domain violations and config errors
/// are caller-visible and mutate no state; map I/O and format errors are
/// fatal at load time; out-of-map queries and numeric warnings degrade
/// the EKF update to a no-op rather than propagating as a hard failure.
#[derive(Debug, Error)]
pub enum NavError {
    /// Non-finite input, out-of-range latitude/longitude, or negative dt.
    #[error("domain error: {0}")]
    Domain(String),

    /// Invalid configuration at construction time (window size, matrix shape, ...).
    #[error("configuration error: {0}")]
    Config(String),

    /// The raster source could not be read.
    #[error("map I/O error: {0}")]
    MapIo(String),

    /// The raster source was readable but malformed (non-uniform grid, missing coordinates).
    #[error("map format error: {0}")]
    MapFormat(String),

    /// A query fell outside the interpolation stencil's bounds.
    #[error("out of map bounds: lat={lat}, lon={lon}")]
    OutOfMap { lat: f64, lon: f64 },

    /// Innovation covariance was ill-conditioned, or a stencil cell was NaN.
    #[error("numeric warning: {0}")]
    Numeric(String),

    /// No map is currently loaded.
    #[error("map not loaded")]
    MapNotLoaded,
}

impl NavError {
    /// HTTP status code this error should surface as.
    pub fn http_status_code(&self) -> u16 {
        match self {
            NavError::Domain(_) | NavError::Config(_) => 400,
            NavError::OutOfMap { .. } => 400,
            NavError::MapNotLoaded => 503,
            NavError::MapIo(_) | NavError::MapFormat(_) => 503,
            NavError::Numeric(_) => 422,
        }
    }

    /// Machine-readable tag for the tool-call surface's structured error payload.
    pub fn kind(&self) -> &'static str {
        match self {
            NavError::Domain(_) => "DomainError",
            NavError::Config(_) => "ConfigError",
            NavError::MapIo(_) => "MapIOError",
            NavError::MapFormat(_) => "MapFormatError",
            NavError::OutOfMap { .. } => "OutOfMapError",
            NavError::Numeric(_) => "NumericWarning",
            NavError::MapNotLoaded => "MapNotLoaded",
        }
    }

    /// Structured payload for the tool-call surface.
    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            kind: self.kind(),
            message: self.to_string(),
            details: match self {
                NavError::OutOfMap { lat, lon } => {
                    Some(serde_json::json!({ "lat": lat, "lon": lon }))
                }
                _ => None,
            },
        }
    }
}

/// Structured error body shared by the tool-call surface.
#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<std::io::Error> for NavError {
    fn from(err: std::io::Error) -> Self {
        NavError::MapIo(err.to_string())
    }
}

impl From<serde_json::Error> for NavError {
    fn from(err: serde_json::Error) -> Self {
        NavError::Domain(format!("JSON error: {}", err))
    }
}
