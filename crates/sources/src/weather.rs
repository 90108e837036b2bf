use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};
use datewise_core::{Coordinates, ResolvedDate, TimeOfDay, WeatherSummary};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::SourceError;
use crate::WeatherSource;

pub const OPEN_WEATHER_URL: &str = "https://api.openweathermap.org/data/2.5";

/// The free 5-day / 3-hour forecast never reaches further than this.
pub const FORECAST_HORIZON_DAYS: i64 = 5;

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    list: Vec<ForecastSlot>,
    city: Option<ForecastCity>,
}

#[derive(Debug, Deserialize)]
struct ForecastCity {
    #[serde(default)]
    timezone: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct ForecastSlot {
    dt: i64,
    main: SlotReadings,
    #[serde(default)]
    weather: Vec<SlotCondition>,
    #[serde(default)]
    pop: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct SlotReadings {
    temp: f64,
    feels_like: f64,
    humidity: u8,
}

#[derive(Debug, Clone, Deserialize)]
struct SlotCondition {
    main: String,
    description: String,
}

#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl OpenWeatherClient {
    pub fn new(http: Client, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            base_url: OPEN_WEATHER_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

impl WeatherSource for OpenWeatherClient {
    async fn fetch_weather(
        &self,
        city: &str,
        _coordinates: Option<Coordinates>,
        date: &ResolvedDate,
        reference_date: NaiveDate,
    ) -> Result<WeatherSummary, SourceError> {
        let days_ahead = date.days_ahead(reference_date);
        if days_ahead > FORECAST_HORIZON_DAYS {
            return Err(SourceError::ForecastOutOfRange { days_ahead });
        }

        let location = format!("{city},IN");
        let response = self
            .http
            .get(format!("{}/forecast", self.base_url))
            .query(&[
                ("q", location.as_str()),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), city, "forecast request failed");
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload = response.text().await?;
        let summary = summarize_forecast(&payload, date)?
            .ok_or(SourceError::ForecastOutOfRange { days_ahead })?;
        debug!(city, condition = %summary.condition, "forecast selected");
        Ok(summary)
    }
}

/// Picks the slot for the requested day part (evening when unset), or the
/// first slot that day. `Ok(None)` when the forecast does not cover the date.
pub fn summarize_forecast(
    payload: &str,
    date: &ResolvedDate,
) -> Result<Option<WeatherSummary>, SourceError> {
    let forecast: ForecastResponse = serde_json::from_str(payload)
        .map_err(|error| SourceError::InvalidResponse(error.to_string()))?;
    let offset = forecast.city.map(|city| city.timezone).unwrap_or(0);

    let same_day = forecast
        .list
        .iter()
        .filter_map(|slot| local_time(slot.dt, offset).map(|time| (time, slot)))
        .filter(|(time, _)| time.date() == date.date)
        .collect::<Vec<_>>();

    let (start, end) = date.time_of_day.unwrap_or(TimeOfDay::Evening).hour_window();
    let chosen = same_day
        .iter()
        .find(|(time, _)| (start..=end).contains(&time.hour()))
        .or_else(|| same_day.first())
        .map(|(_, slot)| *slot);

    Ok(chosen.map(slot_summary))
}

fn local_time(timestamp: i64, offset_seconds: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(timestamp.checked_add(offset_seconds)?, 0).map(|time| time.naive_utc())
}

fn slot_summary(slot: &ForecastSlot) -> WeatherSummary {
    let (condition, description) = slot
        .weather
        .first()
        .map(|weather| (weather.main.clone(), capitalize(&weather.description)))
        .unwrap_or_else(|| ("Unknown".to_string(), "No description".to_string()));

    WeatherSummary::from_observation(
        condition,
        description,
        slot.main.temp,
        slot.main.feels_like,
        slot.main.humidity,
        slot.pop * 100.0,
    )
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
