//! Routing gateway contract and the OpenRouteService client.
//!
//! The composition engine only depends on the [`RoutingGateway`] trait:
//! an ordered waypoint list plus a profile in, an ordered point sequence
//! out, or a failure with a human-readable reason. Failures are never fatal
//! to committed segment state; the store keeps last-known-good geometry.
//!
//! The concrete [`OrsClient`] (feature `http`) talks to the
//! OpenRouteService directions API with retry and exponential backoff on
//! 429 responses.

use crate::GeoPoint;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Routing profile selector, forwarded verbatim to the routing backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RoutingProfile {
    #[default]
    #[serde(rename = "cycling-mountain")]
    CyclingMountain,
    #[serde(rename = "cycling-regular")]
    CyclingRegular,
    #[serde(rename = "foot-hiking")]
    FootHiking,
}

impl RoutingProfile {
    /// All selectable profiles, in display order.
    pub const ALL: [RoutingProfile; 3] = [
        RoutingProfile::CyclingMountain,
        RoutingProfile::CyclingRegular,
        RoutingProfile::FootHiking,
    ];

    /// The backend profile string.
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingProfile::CyclingMountain => "cycling-mountain",
            RoutingProfile::CyclingRegular => "cycling-regular",
            RoutingProfile::FootHiking => "foot-hiking",
        }
    }

    /// Human-readable label for profile pickers.
    pub fn label(&self) -> &'static str {
        match self {
            RoutingProfile::CyclingMountain => "Cycling — Off-road / MTB",
            RoutingProfile::CyclingRegular => "Cycling — Road / Touring",
            RoutingProfile::FootHiking => "Hiking",
        }
    }
}

impl std::fmt::Display for RoutingProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RoutingProfile {
    type Err = RoutingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cycling-mountain" => Ok(RoutingProfile::CyclingMountain),
            "cycling-regular" => Ok(RoutingProfile::CyclingRegular),
            "foot-hiking" => Ok(RoutingProfile::FootHiking),
            _ => Err(RoutingError::UnknownProfile(s.to_string())),
        }
    }
}

/// Routing gateway failures.
///
/// All variants are recoverable: the caller keeps prior committed geometry
/// and may retry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoutingError {
    #[error("Need at least 2 waypoints")]
    TooFewWaypoints,
    #[error("No API key set — add your OpenRouteService key in Settings.")]
    MissingApiKey,
    #[error("Unknown routing profile: {0}")]
    UnknownProfile(String),
    #[error("No route found")]
    NoRoute,
    #[error("{0}")]
    Gateway(String),
}

/// The routing gateway contract consumed by the composition engine.
///
/// Implementations must fail fast with [`RoutingError::TooFewWaypoints`]
/// when given fewer than 2 waypoints and with
/// [`RoutingError::MissingApiKey`] when no credential is configured.
pub trait RoutingGateway {
    /// Compute a path through the ordered waypoints for the given profile.
    fn route(
        &self,
        waypoints: &[GeoPoint],
        profile: RoutingProfile,
    ) -> Result<Vec<GeoPoint>, RoutingError>;
}

// =============================================================================
// OpenRouteService Client (feature "http")
// =============================================================================

#[cfg(feature = "http")]
mod ors {
    use super::*;
    use log::{info, warn};
    use reqwest::Client;
    use std::time::{Duration, Instant};

    const ORS_BASE: &str = "https://api.openrouteservice.org/v2/directions";
    const MAX_RETRIES: u32 = 3;

    #[derive(Debug, Serialize)]
    struct DirectionsRequest {
        coordinates: Vec<[f64; 2]>,
    }

    #[derive(Debug, Deserialize)]
    struct DirectionsResponse {
        features: Option<Vec<Feature>>,
    }

    #[derive(Debug, Deserialize)]
    struct Feature {
        geometry: Geometry,
    }

    #[derive(Debug, Deserialize)]
    struct Geometry {
        coordinates: Vec<[f64; 2]>,
    }

    #[derive(Debug, Deserialize)]
    struct ApiError {
        error: Option<ApiErrorDetail>,
    }

    #[derive(Debug, Deserialize)]
    struct ApiErrorDetail {
        message: Option<String>,
    }

    /// OpenRouteService directions client.
    ///
    /// Holds a pooled HTTP client; safe to reuse across requests.
    pub struct OrsClient {
        client: Client,
        api_key: String,
        base_url: String,
    }

    impl OrsClient {
        /// Create a client with the given API key.
        pub fn new(api_key: &str) -> Result<Self, RoutingError> {
            let client = Client::builder()
                .pool_idle_timeout(Duration::from_secs(60))
                .timeout(Duration::from_secs(30))
                .build()
                .map_err(|e| RoutingError::Gateway(format!("Failed to create HTTP client: {e}")))?;

            Ok(Self {
                client,
                api_key: api_key.to_string(),
                base_url: ORS_BASE.to_string(),
            })
        }

        /// Override the API base URL (test servers, self-hosted ORS).
        pub fn with_base_url(mut self, base_url: &str) -> Self {
            self.base_url = base_url.trim_end_matches('/').to_string();
            self
        }

        /// Async variant of [`RoutingGateway::route`].
        pub async fn route_async(
            &self,
            waypoints: &[GeoPoint],
            profile: RoutingProfile,
        ) -> Result<Vec<GeoPoint>, RoutingError> {
            if waypoints.len() < 2 {
                return Err(RoutingError::TooFewWaypoints);
            }
            if self.api_key.is_empty() {
                return Err(RoutingError::MissingApiKey);
            }

            let url = format!("{}/{}/geojson", self.base_url, profile.as_str());
            let body = DirectionsRequest {
                // ORS expects [lng, lat] pairs
                coordinates: waypoints.iter().map(|p| [p.lng, p.lat]).collect(),
            };

            let start = Instant::now();
            let mut retries = 0;

            loop {
                let response = self
                    .client
                    .post(&url)
                    .header("Authorization", &self.api_key)
                    .json(&body)
                    .send()
                    .await;

                match response {
                    Ok(resp) => {
                        let status = resp.status();

                        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                            retries += 1;
                            if retries > MAX_RETRIES {
                                return Err(RoutingError::Gateway(
                                    "Max retries exceeded (429)".to_string(),
                                ));
                            }
                            let wait = Duration::from_millis(500 * (1 << retries.min(3)));
                            warn!(
                                "[OrsClient] 429 Too Many Requests, retry {} with {:?} backoff",
                                retries, wait
                            );
                            tokio::time::sleep(wait).await;
                            continue;
                        }

                        if !status.is_success() {
                            let message = resp
                                .json::<ApiError>()
                                .await
                                .ok()
                                .and_then(|e| e.error)
                                .and_then(|e| e.message)
                                .unwrap_or_else(|| format!("ORS request failed: {status}"));
                            return Err(RoutingError::Gateway(message));
                        }

                        let data: DirectionsResponse = resp
                            .json()
                            .await
                            .map_err(|e| RoutingError::Gateway(format!("JSON parse error: {e}")))?;

                        let coords = data
                            .features
                            .and_then(|mut f| if f.is_empty() { None } else { Some(f.remove(0)) })
                            .map(|f| f.geometry.coordinates)
                            .ok_or(RoutingError::NoRoute)?;

                        info!(
                            "[OrsClient] {} waypoints -> {} points ({}) in {:?}",
                            waypoints.len(),
                            coords.len(),
                            profile,
                            start.elapsed()
                        );

                        return Ok(coords
                            .into_iter()
                            .map(|[lng, lat]| GeoPoint::new(lat, lng))
                            .collect());
                    }
                    Err(e) => {
                        retries += 1;
                        if retries > MAX_RETRIES {
                            return Err(RoutingError::Gateway(format!("Request error: {e}")));
                        }
                        let wait = Duration::from_millis(200 * (1 << retries));
                        warn!("[OrsClient] Error: {}, retry {} after {:?}", e, retries, wait);
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }
    }

    impl RoutingGateway for OrsClient {
        /// Blocking wrapper around [`OrsClient::route_async`] on a local
        /// tokio runtime.
        fn route(
            &self,
            waypoints: &[GeoPoint],
            profile: RoutingProfile,
        ) -> Result<Vec<GeoPoint>, RoutingError> {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| RoutingError::Gateway(format!("Runtime error: {e}")))?;
            rt.block_on(self.route_async(waypoints, profile))
        }
    }
}

#[cfg(feature = "http")]
pub use ors::OrsClient;

// =============================================================================
// Unit Tests
// =============================================================================
