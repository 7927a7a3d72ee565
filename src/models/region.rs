//! Regions give alerts their source point and relevance radius.

use serde::{Deserialize, Serialize};

use super::geo::GeoPoint;
use crate::loader::{Loadable, LoaderError};

/// An administrative or agro-ecological region signals are reported for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Stable identifier used by upstream signals.
    pub id: String,
    /// Human-readable name used in alert text.
    pub name: String,
    /// Representative point for distance checks.
    #[serde(default)]
    pub center: Option<GeoPoint>,
    /// Relevance radius around `center`. Without both, alerts for this
    /// region are region-only.
    #[serde(default)]
    pub radius_km: Option<f64>,
}

impl Region {
    /// Relevance circle of the region, when both center and radius are set.
    pub fn radius_constraint(&self) -> Option<(GeoPoint, f64)> {
        self.center.zip(self.radius_km)
    }
}

impl Loadable for Region {
    type Error = LoaderError;

    const KEY: &'static str = "regions";

    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&mut self) -> Result<(), Self::Error> {
        if self.id.trim().is_empty() {
            return Err(LoaderError::ValidationError("Region id cannot be empty".into()));
        }
        if self.name.trim().is_empty() {
            self.name = self.id.clone();
        }
        if let Some(center) = &self.center
            && !center.is_valid()
        {
            return Err(LoaderError::ValidationError(format!(
                "Region {} has an out-of-range center ({}, {})",
                self.id, center.lat, center.lon
            )));
        }
        if let Some(radius) = self.radius_km
            && !(radius.is_finite() && radius > 0.0)
        {
            return Err(LoaderError::ValidationError(format!(
                "Region {} radius_km must be a positive number",
                self.id
            )));
        }
        Ok(())
    }
}
