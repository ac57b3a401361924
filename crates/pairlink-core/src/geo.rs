//! Geolocation provider abstraction
//!
//! The session task asks a [`GeoProvider`] for a single position fix when the
//! user starts sharing. Acquisition can fail (permission denied, no fix);
//! callers surface that as a failed toggle rather than an error of the
//! session itself.

use async_trait::async_trait;

use crate::error::GeoError;

// ----------------------------------------------------------------------------
// Position
// ----------------------------------------------------------------------------

/// A single position fix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

// ----------------------------------------------------------------------------
// Provider Trait
// ----------------------------------------------------------------------------

/// Source of position fixes
#[async_trait]
pub trait GeoProvider: Send + Sync {
    /// Acquire one position fix
    async fn current_position(&self) -> Result<Position, GeoError>;
}

// ----------------------------------------------------------------------------
// Fixed Provider
// ----------------------------------------------------------------------------

/// Provider that always returns the same position, or always fails.
/// Used by tests and the demo CLI.
#[derive(Debug, Clone)]
pub struct FixedPosition(Result<Position, GeoError>);

impl FixedPosition {
    /// Always yields the given coordinates
    pub fn at(latitude: f64, longitude: f64) -> Self {
        Self(Ok(Position::new(latitude, longitude)))
    }

    /// Always fails with the given error
    pub fn failing(error: GeoError) -> Self {
        Self(Err(error))
    }
}

#[async_trait]
impl GeoProvider for FixedPosition {
    async fn current_position(&self) -> Result<Position, GeoError> {
        self.0.clone()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_position_yields_coordinates() {
        let provider = FixedPosition::at(51.5074, -0.1278);
        let position = provider.current_position().await.unwrap();
        assert_eq!(position.latitude, 51.5074);
        assert_eq!(position.longitude, -0.1278);
    }

    #[tokio::test]
    async fn test_failing_provider_errors() {
        let provider = FixedPosition::failing(GeoError::Denied);
        assert!(provider.current_position().await.is_err());
    }
}
