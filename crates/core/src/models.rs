use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::config::DEFAULT_RAIN_THRESHOLD_PCT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "morning" | "breakfast" => Some(Self::Morning),
            "afternoon" | "lunch" | "brunch" => Some(Self::Afternoon),
            "evening" | "dinner" => Some(Self::Evening),
            "night" | "tonight" => Some(Self::Night),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Night => "night",
        }
    }

    /// Inclusive local-hour window used to pick a forecast slot.
    pub fn hour_window(self) -> (u32, u32) {
        match self {
            Self::Morning => (6, 11),
            Self::Afternoon => (12, 16),
            Self::Evening => (17, 20),
            Self::Night => (21, 23),
        }
    }
}

/// Loosely typed validator input. Any field may be absent or malformed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDateRequest {
    #[serde(default, deserialize_with = "lenient_text")]
    pub city: Option<String>,
    #[serde(default)]
    pub budget: Option<Value>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub date_type: Option<String>,
    #[serde(default, alias = "timing", deserialize_with = "lenient_text")]
    pub timing_phrase: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub special_requirements: Option<String>,
}

impl RawDateRequest {
    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    pub fn with_budget(mut self, budget: impl Into<Value>) -> Self {
        self.budget = Some(budget.into());
        self
    }

    pub fn with_date_type(mut self, date_type: impl Into<String>) -> Self {
        self.date_type = Some(date_type.into());
        self
    }

    pub fn with_timing(mut self, timing_phrase: impl Into<String>) -> Self {
        self.timing_phrase = Some(timing_phrase.into());
        self
    }

    pub fn with_special_requirements(mut self, requirements: impl Into<String>) -> Self {
        self.special_requirements = Some(requirements.into());
        self
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) => Some(text),
        Some(Value::Number(number)) => Some(number.to_string()),
        Some(Value::Bool(flag)) => Some(flag.to_string()),
        _ => None,
    })
}

/// A request after validation. Immutable downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRequest {
    pub city: String,
    pub budget: i64,
    pub date_type: String,
    pub timing_phrase: String,
    pub special_requirements: Option<String>,
}

impl DateRequest {
    pub fn wants_indoor(&self) -> bool {
        self.special_requirements
            .as_deref()
            .map(|value| value.to_lowercase().contains("indoor"))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDate {
    #[serde(rename = "resolved_date")]
    pub date: NaiveDate,
    pub time_of_day: Option<TimeOfDay>,
}

impl ResolvedDate {
    pub fn new(date: NaiveDate, time_of_day: Option<TimeOfDay>) -> Self {
        Self { date, time_of_day }
    }

    pub fn days_ahead(&self, reference: NaiveDate) -> i64 {
        (self.date - reference).num_days()
    }
}

impl fmt::Display for ResolvedDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date.format("%A, %d %B %Y"))?;
        if let Some(part) = self.time_of_day {
            write!(f, " ({})", part.as_str())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceTier {
    Inexpensive,
    Moderate,
    Expensive,
    VeryExpensive,
    Unspecified,
}

impl PriceTier {
    pub fn from_places_level(value: &str) -> Self {
        match value {
            "PRICE_LEVEL_INEXPENSIVE" | "PRICE_LEVEL_FREE" => Self::Inexpensive,
            "PRICE_LEVEL_MODERATE" => Self::Moderate,
            "PRICE_LEVEL_EXPENSIVE" => Self::Expensive,
            "PRICE_LEVEL_VERY_EXPENSIVE" => Self::VeryExpensive,
            _ => Self::Unspecified,
        }
    }

    /// Most expensive tier a budget can reasonably cover.
    pub fn ceiling_for_budget(budget: i64) -> Self {
        if budget < 1_000 {
            Self::Inexpensive
        } else if budget < 2_000 {
            Self::Moderate
        } else if budget < 4_000 {
            Self::Expensive
        } else {
            Self::VeryExpensive
        }
    }

    fn rank(self) -> Option<u8> {
        match self {
            Self::Inexpensive => Some(1),
            Self::Moderate => Some(2),
            Self::Expensive => Some(3),
            Self::VeryExpensive => Some(4),
            Self::Unspecified => None,
        }
    }

    /// Unspecified tiers always fit.
    pub fn fits_within(self, ceiling: Self) -> bool {
        match (self.rank(), ceiling.rank()) {
            (Some(own), Some(limit)) => own <= limit,
            _ => true,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Inexpensive => "₹",
            Self::Moderate => "₹₹",
            Self::Expensive => "₹₹₹",
            Self::VeryExpensive => "₹₹₹₹",
            Self::Unspecified => "price n/a",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VenueSetting {
    Indoor,
    Outdoor,
    IndoorOutdoor,
    Unknown,
}

impl VenueSetting {
    pub fn suits_rain(self) -> bool {
        !matches!(self, Self::Outdoor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    pub name: String,
    pub rating: Option<f32>,
    pub review_count: u32,
    pub price_tier: PriceTier,
    pub address: String,
    pub setting: VenueSetting,
    pub open_now: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSummary {
    pub condition: String,
    pub description: String,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub humidity_pct: u8,
    pub rain_probability_pct: f64,
    pub will_rain: bool,
    pub suitable_for_outdoor: bool,
}

impl WeatherSummary {
    pub fn from_observation(
        condition: impl Into<String>,
        description: impl Into<String>,
        temperature_c: f64,
        feels_like_c: f64,
        humidity_pct: u8,
        rain_probability_pct: f64,
    ) -> Self {
        Self {
            condition: condition.into(),
            description: description.into(),
            temperature_c: round_one(temperature_c),
            feels_like_c: round_one(feels_like_c),
            humidity_pct,
            rain_probability_pct: round_one(rain_probability_pct),
            will_rain: false,
            suitable_for_outdoor: false,
        }
        .with_rain_threshold(DEFAULT_RAIN_THRESHOLD_PCT)
    }

    /// Recomputes the rain and outdoor flags against `threshold_pct`.
    pub fn with_rain_threshold(mut self, threshold_pct: f64) -> Self {
        self.will_rain =
            self.rain_probability_pct > threshold_pct || is_wet_condition(&self.condition);
        self.suitable_for_outdoor =
            !self.will_rain && (15.0..=35.0).contains(&self.temperature_c);
        self
    }
}

pub fn is_wet_condition(condition: &str) -> bool {
    matches!(
        condition.trim().to_lowercase().as_str(),
        "rain" | "drizzle" | "thunderstorm"
    )
}

fn round_one(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Venues,
    Weather,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub source: SourceKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchOutcome {
    pub venues: Vec<Venue>,
    pub weather: Option<WeatherSummary>,
    pub failures: Vec<SourceFailure>,
}

impl FetchOutcome {
    pub fn failed(&self, source: SourceKind) -> bool {
        self.failures.iter().any(|failure| failure.source == source)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatePlan {
    pub request: DateRequest,
    #[serde(flatten)]
    pub resolved_date: ResolvedDate,
    pub venues: Vec<Venue>,
    pub weather: Option<WeatherSummary>,
    pub indoor_only: bool,
    pub advisories: Vec<String>,
    pub warnings: Vec<String>,
    pub source_failures: Vec<SourceFailure>,
    pub narrative: String,
    pub narrative_fallback: bool,
}

impl DatePlan {
    pub fn with_narrative(mut self, narrative: String) -> Self {
        self.narrative = narrative;
        self.narrative_fallback = false;
        self
    }
}
