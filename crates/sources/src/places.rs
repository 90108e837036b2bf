use datewise_core::{Coordinates, DateRequest, PriceTier, Venue, VenueSetting};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::SourceError;
use crate::VenueSource;

pub const PLACES_SEARCH_URL: &str = "https://places.googleapis.com/v1/places:searchText";

const FIELD_MASK: &str = "places.displayName,places.formattedAddress,places.rating,places.userRatingCount,places.priceLevel,places.currentOpeningHours,places.outdoorSeating,places.types";
const MAX_RESULTS: u32 = 10;
const SEARCH_RADIUS_METERS: f64 = 5_000.0;

const OUTDOOR_ONLY_TYPES: &[&str] = &[
    "park",
    "national_park",
    "amusement_park",
    "botanical_garden",
    "beach",
    "hiking_area",
    "campground",
];

const INDOOR_TYPES: &[&str] = &[
    "restaurant",
    "cafe",
    "bar",
    "bakery",
    "movie_theater",
    "bowling_alley",
    "museum",
    "shopping_mall",
];

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    places: Vec<Place>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Place {
    display_name: Option<LocalizedText>,
    formatted_address: Option<String>,
    rating: Option<f32>,
    user_rating_count: Option<u32>,
    price_level: Option<String>,
    current_opening_hours: Option<OpeningHours>,
    outdoor_seating: Option<bool>,
    #[serde(default)]
    types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LocalizedText {
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpeningHours {
    open_now: Option<bool>,
}

/// Google Places (New) text search.
#[derive(Debug, Clone)]
pub struct PlacesClient {
    http: Client,
    api_key: String,
    endpoint: String,
}

impl PlacesClient {
    pub fn new(http: Client, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            endpoint: PLACES_SEARCH_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl VenueSource for PlacesClient {
    async fn fetch_venues(
        &self,
        request: &DateRequest,
        coordinates: Option<Coordinates>,
    ) -> Result<Vec<Venue>, SourceError> {
        let query = search_query(&request.date_type, &request.city);
        let mut body = json!({
            "textQuery": query,
            "maxResultCount": MAX_RESULTS,
        });
        if let Some(center) = coordinates {
            body["locationBias"] = json!({
                "circle": {
                    "center": { "latitude": center.latitude, "longitude": center.longitude },
                    "radius": SEARCH_RADIUS_METERS
                }
            });
        }

        let response = self
            .http
            .post(&self.endpoint)
            .header("X-Goog-Api-Key", self.api_key.as_str())
            .header("X-Goog-FieldMask", FIELD_MASK)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), query = %query, "places search failed");
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload = response.text().await?;
        let venues = parse_places(&payload)?;
        debug!(query = %query, count = venues.len(), "places search returned");
        Ok(venues)
    }
}

/// Search text for a date type, e.g. "romantic fine dining restaurant in Mumbai".
pub fn search_query(date_type: &str, city: &str) -> String {
    let keyword = match date_type.trim().to_lowercase().as_str() {
        "romantic" => "romantic fine dining restaurant",
        "casual" => "casual restaurant cafe",
        "cozy" => "cozy cafe restaurant",
        "budget" | "budget-friendly" => "budget friendly restaurant",
        "formal" => "fine dining restaurant",
        "fun" => "fun date activity",
        _ => "restaurant",
    };
    format!("{keyword} in {city}")
}

pub fn parse_places(payload: &str) -> Result<Vec<Venue>, SourceError> {
    let response: SearchResponse = serde_json::from_str(payload)
        .map_err(|error| SourceError::InvalidResponse(error.to_string()))?;

    Ok(response
        .places
        .into_iter()
        .map(|place| Venue {
            name: place
                .display_name
                .map(|name| name.text)
                .unwrap_or_else(|| "Unknown".to_string()),
            rating: place.rating,
            review_count: place.user_rating_count.unwrap_or(0),
            price_tier: place
                .price_level
                .as_deref()
                .map(PriceTier::from_places_level)
                .unwrap_or(PriceTier::Unspecified),
            address: place
                .formatted_address
                .unwrap_or_else(|| "Address not available".to_string()),
            setting: venue_setting(place.outdoor_seating, &place.types),
            open_now: place.current_opening_hours.and_then(|hours| hours.open_now),
        })
        .collect())
}

fn venue_setting(outdoor_seating: Option<bool>, types: &[String]) -> VenueSetting {
    if has_any_type(types, OUTDOOR_ONLY_TYPES) {
        return VenueSetting::Outdoor;
    }
    match outdoor_seating {
        Some(true) => VenueSetting::IndoorOutdoor,
        Some(false) => VenueSetting::Indoor,
        None if has_any_type(types, INDOOR_TYPES) => VenueSetting::Indoor,
        None => VenueSetting::Unknown,
    }
}

fn has_any_type(types: &[String], candidates: &[&str]) -> bool {
    types.iter().any(|kind| candidates.contains(&kind.as_str()))
}
