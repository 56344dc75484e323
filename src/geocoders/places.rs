//! Text-search geocoding client, the last-resort fallback after every AI
//! attempt has failed.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::GeocodeError;
use crate::traits::geocoder::Geocoder;
use crate::types::venue::VenueRecord;

const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api/place/textsearch/json";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct TextSearchResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    results: Vec<TextSearchResult>,
}

#[derive(Debug, Deserialize)]
struct TextSearchResult {
    #[serde(default)]
    name: String,
    #[serde(default)]
    formatted_address: String,
    #[serde(default)]
    place_id: String,
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Option<Location>,
}

#[derive(Debug, Deserialize)]
struct Location {
    lat: f64,
    lng: f64,
}

/// Places-style text-search client.
pub struct PlacesClient {
    http: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    region_hint: String,
}

impl PlacesClient {
    /// Create a client with the given API key and region hint.
    pub fn new(api_key: impl Into<String>, region_hint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("http client"),
            api_key: SecretString::from(api_key.into()),
            base_url: DEFAULT_BASE_URL.to_string(),
            region_hint: region_hint.into(),
        }
    }

    /// Override the endpoint (tests, alternative providers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Geocoder for PlacesClient {
    async fn geocode(&self, query: &str) -> Result<Option<VenueRecord>, GeocodeError> {
        let full_query = format!("{query} {}", self.region_hint);
        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("query", full_query.as_str()),
                ("key", self.api_key.expose_secret()),
            ])
            .send()
            .await?;

        let body: TextSearchResponse = response.json().await?;
        if body.status != "OK" {
            debug!(status = %body.status, query, "text search returned no usable results");
            return Ok(None);
        }

        let Some(best) = body.results.into_iter().next() else {
            return Ok(None);
        };
        let Some(location) = best.geometry.and_then(|g| g.location) else {
            return Ok(None);
        };

        let map_url = if best.place_id.is_empty() {
            String::new()
        } else {
            format!(
                "https://www.google.com/maps/place/?q=place_id:{}",
                best.place_id
            )
        };

        info!(query, name = %best.name, "geocoding API fallback hit");
        Ok(Some(
            VenueRecord::new(best.name, location.lat, location.lng)
                .with_map_url(map_url)
                .with_address(best.formatted_address),
        ))
    }
}
