//! Reverse geocoding through a Nominatim-compatible HTTP endpoint.

use crate::config::GeocoderConfig;
use crate::models::{Place, ADDRESS_NOT_AVAILABLE, DEFAULT_PLACE_NAME};
use async_trait::async_trait;
use color_eyre::Result;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Turns coordinates into a readable place.
///
/// Implementations may fail; callers that need a value regardless fall back
/// to the raw coordinates.
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<Place>;
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    display_name: Option<String>,
    address: Option<NominatimAddress>,
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    building: Option<String>,
    road: Option<String>,
}

impl From<NominatimResponse> for Place {
    fn from(body: NominatimResponse) -> Self {
        let place_name = body
            .address
            .and_then(|a| a.building.or(a.road))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_PLACE_NAME.to_string());

        Place {
            address: body
                .display_name
                .unwrap_or_else(|| ADDRESS_NOT_AVAILABLE.to_string()),
            place_name,
        }
    }
}

pub struct NominatimGeocoder {
    client: Client,
    endpoint: String,
    zoom: u8,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocoderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/reverse", config.base_url.trim_end_matches('/')),
            zoom: config.zoom,
        })
    }

    /// Looks up `(latitude, longitude)`. Never fails: any network, status or
    /// body problem yields [`Place::unavailable`].
    pub async fn resolve_address(&self, latitude: f64, longitude: f64) -> Place {
        match self.fetch(latitude, longitude).await {
            Ok(place) => {
                debug!("Reverse geocoded ({}, {}) to {}", latitude, longitude, place.address);
                place
            }
            Err(e) => {
                warn!(
                    "Reverse geocode failed for ({}, {}): {}",
                    latitude, longitude, e
                );
                Place::unavailable()
            }
        }
    }

    async fn fetch(&self, latitude: f64, longitude: f64) -> Result<Place> {
        let body = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("format", "json".to_string()),
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("zoom", self.zoom.to_string()),
                ("addressdetails", "1".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<NominatimResponse>()
            .await?;

        Ok(Place::from(body))
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<Place> {
        Ok(self.resolve_address(latitude, longitude).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn geocoder_for(server_uri: &str) -> NominatimGeocoder {
        let config = GeocoderConfig {
            base_url: server_uri.to_string(),
            ..GeocoderConfig::default()
        };
        NominatimGeocoder::new(&config).unwrap()
    }

    #[tokio::test]
    async fn prefers_building_over_road() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .and(query_param("format", "json"))
            .and(query_param("zoom", "18"))
            .and(query_param("addressdetails", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "display_name": "Ferry Building, 1 Embarcadero, San Francisco",
                "address": { "building": "Ferry Building", "road": "The Embarcadero" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let place = geocoder_for(&server.uri())
            .resolve_address(37.7955, -122.3937)
            .await;

        assert_eq!(place.address, "Ferry Building, 1 Embarcadero, San Francisco");
        assert_eq!(place.place_name, "Ferry Building");
    }

    #[tokio::test]
    async fn falls_back_to_road_then_default_label() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .and(query_param("lat", "1.5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "display_name": "Market Street",
                "address": { "road": "Market Street" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .and(query_param("lat", "2.5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "display_name": "Somewhere",
                "address": {}
            })))
            .mount(&server)
            .await;

        let geocoder = geocoder_for(&server.uri());

        let road = geocoder.resolve_address(1.5, 3.0).await;
        assert_eq!(road.place_name, "Market Street");

        let bare = geocoder.resolve_address(2.5, 3.0).await;
        assert_eq!(bare.address, "Somewhere");
        assert_eq!(bare.place_name, "Location");
    }

    #[tokio::test]
    async fn missing_display_name_uses_placeholder() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "error": "Unable to geocode" })),
            )
            .mount(&server)
            .await;

        let place = geocoder_for(&server.uri()).resolve_address(0.0, 0.0).await;
        assert_eq!(place, Place::unavailable());
    }

    #[tokio::test]
    async fn server_error_degrades_to_placeholder() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let place = geocoder_for(&server.uri()).resolve_address(10.0, 10.0).await;
        assert_eq!(place, Place::unavailable());
    }

    #[tokio::test]
    async fn malformed_body_degrades_to_placeholder() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
            .mount(&server)
            .await;

        let place = geocoder_for(&server.uri()).resolve_address(10.0, 10.0).await;
        assert_eq!(place, Place::unavailable());
    }

    #[tokio::test]
    async fn refused_connection_never_errors() {
        // Nothing listens on the discard port.
        let geocoder = geocoder_for("http://127.0.0.1:9");
        let place = geocoder.reverse(45.0, 7.0).await.unwrap();
        assert_eq!(place, Place::unavailable());
    }
}
