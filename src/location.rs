use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::constants::{GEOCODE_TIMEOUT, LOCATION_ERROR_MARKER, PLACEHOLDER_ZONE};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// A resolved garden location, built fresh for every submission.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationContext {
    pub address: String,
    pub coordinates: Coordinates,
    pub zone: String,
}

impl LocationContext {
    /// Text appended verbatim to the system instructions.
    pub fn annotation(&self) -> String {
        format!(
            "\n\n[Location: {} | Hardiness Zone: {}]",
            self.address, self.zone
        )
    }
}

/// Maps coordinates to a hardiness zone label. Must be deterministic.
pub trait ZoneLookup: Send + Sync {
    fn zone(&self, coordinates: Coordinates) -> String;
}

/// Returns the same zone for every location.
#[derive(Debug, Clone)]
pub struct FixedZone(pub String);

impl Default for FixedZone {
    fn default() -> Self {
        Self(PLACEHOLDER_ZONE.to_string())
    }
}

impl ZoneLookup for FixedZone {
    fn zone(&self, _coordinates: Coordinates) -> String {
        self.0.clone()
    }
}

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("geocoding request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed coordinates in geocoding response: {0:?}")]
    MalformedCoordinates(Vec<f64>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found(LocationContext),
    /// No usable location. `diagnostic` is set when the lookup itself failed
    /// and the user should be told about it.
    NotFound { diagnostic: Option<String> },
}

impl Resolution {
    pub fn into_context(self) -> Option<LocationContext> {
        match self {
            Resolution::Found(context) => Some(context),
            Resolution::NotFound { .. } => None,
        }
    }
}

// Only the parts of the GeoJSON response we need
#[derive(Deserialize, Debug)]
struct GeocodeResponse {
    features: Vec<Feature>,
}

#[derive(Deserialize, Debug)]
struct Feature {
    geometry: Geometry,
}

#[derive(Deserialize, Debug)]
struct Geometry {
    // [longitude, latitude]
    coordinates: Vec<f64>,
}

#[derive(Clone)]
pub struct LocationResolver {
    client: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
    zones: Arc<dyn ZoneLookup>,
}

impl LocationResolver {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: GEOCODE_TIMEOUT,
            zones: Arc::new(FixedZone::default()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_zone_lookup(mut self, zones: impl ZoneLookup + 'static) -> Self {
        self.zones = Arc::new(zones);
        self
    }

    fn search_url(&self) -> String {
        format!("{}/geocode/search", self.base_url.trim_end_matches('/'))
    }

    /// Geocodes `address`. `Ok(None)` means the service answered but had no
    /// usable match (empty result or a non-success status).
    #[instrument(skip(self))]
    pub async fn lookup(&self, address: &str) -> Result<Option<Coordinates>, LocationError> {
        let response = self
            .client
            .get(self.search_url())
            .header("Authorization", &self.api_key)
            .query(&[("text", address), ("size", "1")])
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            debug!(status = %response.status(), "Geocoding returned no result");
            return Ok(None);
        }

        let body = response.json::<GeocodeResponse>().await?;
        let Some(feature) = body.features.into_iter().next() else {
            debug!("Geocoding returned an empty feature list");
            return Ok(None);
        };

        match feature.geometry.coordinates.as_slice() {
            [longitude, latitude, ..] => Ok(Some(Coordinates {
                latitude: *latitude,
                longitude: *longitude,
            })),
            other => Err(LocationError::MalformedCoordinates(other.to_vec())),
        }
    }

    /// Resolves `address` to a location context. Never fails: every problem
    /// degrades to `NotFound`. The address is geocoded and annotated as given.
    pub async fn resolve(&self, address: &str) -> Resolution {
        if address.trim().is_empty() {
            return Resolution::NotFound { diagnostic: None };
        }

        match self.lookup(address).await {
            Ok(Some(coordinates)) => {
                let zone = self.zones.zone(coordinates);
                debug!(?coordinates, %zone, "Resolved garden location");
                Resolution::Found(LocationContext {
                    address: address.to_string(),
                    coordinates,
                    zone,
                })
            }
            Ok(None) => Resolution::NotFound { diagnostic: None },
            Err(e) => {
                warn!("Location lookup failed: {}", e);
                Resolution::NotFound {
                    diagnostic: Some(format!("{} Location Error: {}", LOCATION_ERROR_MARKER, e)),
                }
            }
        }
    }
}
