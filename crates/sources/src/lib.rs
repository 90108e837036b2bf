mod error;
mod places;
mod weather;

use std::env;
use std::time::Duration;

use chrono::NaiveDate;
use datewise_core::{Coordinates, DateRequest, ResolvedDate, Venue, WeatherSummary};
use reqwest::Client;
use tracing::info;

pub use error::SourceError;
pub use places::{parse_places, search_query, PlacesClient, PLACES_SEARCH_URL};
pub use weather::{summarize_forecast, OpenWeatherClient, FORECAST_HORIZON_DAYS, OPEN_WEATHER_URL};

pub trait VenueSource: Send + Sync {
    async fn fetch_venues(
        &self,
        request: &DateRequest,
        coordinates: Option<Coordinates>,
    ) -> Result<Vec<Venue>, SourceError>;
}

pub trait WeatherSource: Send + Sync {
    async fn fetch_weather(
        &self,
        city: &str,
        coordinates: Option<Coordinates>,
        date: &ResolvedDate,
        reference_date: NaiveDate,
    ) -> Result<WeatherSummary, SourceError>;
}

/// Live clients for whichever API keys are present. A missing key turns that
/// source into a recorded failure instead of an error at startup.
#[derive(Debug, Clone, Default)]
pub struct Sources {
    places: Option<PlacesClient>,
    weather: Option<OpenWeatherClient>,
}

impl Sources {
    pub fn from_env() -> Result<Self, SourceError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, SourceError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let key = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let places_key = key("GOOGLE_PLACES_API");
        let weather_key = key("OPEN_WEATHER_API");
        if places_key.is_none() && weather_key.is_none() {
            return Ok(Self::offline());
        }

        let http = http_client()?;
        let sources = Self {
            places: places_key.map(|api_key| PlacesClient::new(http.clone(), api_key)),
            weather: weather_key.map(|api_key| OpenWeatherClient::new(http, api_key)),
        };
        info!(
            venues = sources.has_venues(),
            weather = sources.has_weather(),
            "data sources configured"
        );
        Ok(sources)
    }

    pub fn offline() -> Self {
        Self::default()
    }

    pub fn with_places(mut self, places: PlacesClient) -> Self {
        self.places = Some(places);
        self
    }

    pub fn with_weather(mut self, weather: OpenWeatherClient) -> Self {
        self.weather = Some(weather);
        self
    }

    pub fn has_venues(&self) -> bool {
        self.places.is_some()
    }

    pub fn has_weather(&self) -> bool {
        self.weather.is_some()
    }
}

impl VenueSource for Sources {
    async fn fetch_venues(
        &self,
        request: &DateRequest,
        coordinates: Option<Coordinates>,
    ) -> Result<Vec<Venue>, SourceError> {
        match &self.places {
            Some(places) => places.fetch_venues(request, coordinates).await,
            None => Err(SourceError::NotConfigured("Google Places")),
        }
    }
}

impl WeatherSource for Sources {
    async fn fetch_weather(
        &self,
        city: &str,
        coordinates: Option<Coordinates>,
        date: &ResolvedDate,
        reference_date: NaiveDate,
    ) -> Result<WeatherSummary, SourceError> {
        match &self.weather {
            Some(weather) => {
                weather
                    .fetch_weather(city, coordinates, date, reference_date)
                    .await
            }
            None => Err(SourceError::NotConfigured("OpenWeather")),
        }
    }
}

pub fn http_client() -> Result<Client, SourceError> {
    Ok(Client::builder()
        .connect_timeout(Duration::from_secs(6))
        .timeout(Duration::from_secs(20))
        .build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> DateRequest {
        DateRequest {
            city: "Pune".to_string(),
            budget: 2_000,
            date_type: "casual".to_string(),
            timing_phrase: "tomorrow".to_string(),
            special_requirements: None,
        }
    }

    #[test]
    fn keys_select_clients() {
        let none = Sources::from_lookup(|_| None).unwrap();
        assert!(!none.has_venues());
        assert!(!none.has_weather());

        let weather_only =
            Sources::from_lookup(|key| (key == "OPEN_WEATHER_API").then(|| "abc".to_string()))
                .unwrap();
        assert!(!weather_only.has_venues());
        assert!(weather_only.has_weather());
    }

    #[tokio::test]
    async fn offline_sources_report_not_configured() {
        let sources = Sources::offline();
        let date = ResolvedDate::new(NaiveDate::from_ymd_opt(2026, 2, 11).unwrap(), None);
        let reference = NaiveDate::from_ymd_opt(2026, 2, 10).unwrap();

        let venues = sources.fetch_venues(&request(), None).await;
        assert!(matches!(venues, Err(SourceError::NotConfigured(_))));

        let weather = sources.fetch_weather("Pune", None, &date, reference).await;
        assert!(matches!(weather, Err(SourceError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn far_dates_skip_the_forecast_call() {
        let client = OpenWeatherClient::new(http_client().unwrap(), "key")
            .with_base_url("http://127.0.0.1:9");
        let date = ResolvedDate::new(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(), None);
        let reference = NaiveDate::from_ymd_opt(2026, 2, 10).unwrap();

        let result = client.fetch_weather("Pune", None, &date, reference).await;
        assert!(matches!(
            result,
            Err(SourceError::ForecastOutOfRange { days_ahead: 19 })
        ));
    }
}
