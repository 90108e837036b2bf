use std::env;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use crate::cities::CityTable;

pub const DEFAULT_MIN_BUDGET: i64 = 500;
pub const DEFAULT_MAX_BUDGET: i64 = 50_000;
pub const DEFAULT_CITY: &str = "Bangalore";
pub const DEFAULT_DATE_TYPE: &str = "casual";
pub const RECOGNIZED_DATE_TYPES: [&str; 6] =
    ["romantic", "casual", "cozy", "budget-friendly", "formal", "fun"];
pub const DEFAULT_RAIN_THRESHOLD_PCT: f64 = 50.0;
pub const DEFAULT_MAX_VENUES: usize = 5;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("minimum budget {min} exceeds maximum budget {max}")]
    InvertedBudgetBounds { min: i64, max: i64 },
    #[error("no supported cities configured")]
    NoCities,
    #[error("default city '{0}' is not a supported city")]
    UnsupportedDefaultCity(String),
    #[error("no recognized date types configured")]
    NoDateTypes,
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
}

/// Bounds and lookup tables the validator checks against.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    pub min_budget: i64,
    pub max_budget: i64,
    pub default_city: String,
    pub cities: Arc<CityTable>,
    pub date_types: Vec<String>,
    pub default_date_type: String,
    pub fuzzy_city_matching: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_budget: DEFAULT_MIN_BUDGET,
            max_budget: DEFAULT_MAX_BUDGET,
            default_city: DEFAULT_CITY.to_string(),
            cities: Arc::new(CityTable::builtin().clone()),
            date_types: RECOGNIZED_DATE_TYPES.iter().map(|tag| tag.to_string()).collect(),
            default_date_type: DEFAULT_DATE_TYPE.to_string(),
            fuzzy_city_matching: false,
        }
    }
}

impl ValidatorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads `DATEWISE_*` settings through `lookup`; unset keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let mut config = Self {
            min_budget: parse_or(&lookup, "DATEWISE_MIN_BUDGET", defaults.min_budget)?,
            max_budget: parse_or(&lookup, "DATEWISE_MAX_BUDGET", defaults.max_budget)?,
            fuzzy_city_matching: parse_or(
                &lookup,
                "DATEWISE_FUZZY_CITIES",
                defaults.fuzzy_city_matching,
            )?,
            ..defaults
        };

        if let Some(city) = non_empty(lookup("DATEWISE_DEFAULT_CITY")) {
            config.default_city = city;
        }
        if let Some(cities) = non_empty(lookup("DATEWISE_SUPPORTED_CITIES")) {
            config = config.with_cities(split_list(&cities));
        }
        if let Some(types) = non_empty(lookup("DATEWISE_DATE_TYPES")) {
            config = config.with_date_types(split_list(&types));
        }

        config.check()?;
        Ok(config)
    }

    pub fn with_budget_bounds(mut self, min: i64, max: i64) -> Self {
        self.min_budget = min;
        self.max_budget = max;
        self
    }

    pub fn with_cities<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.cities = Arc::new(CityTable::from_names(names));
        self
    }

    pub fn with_default_city(mut self, city: impl Into<String>) -> Self {
        self.default_city = city.into();
        self
    }

    pub fn with_date_types<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.date_types = tags
            .into_iter()
            .map(|tag| tag.as_ref().trim().to_lowercase())
            .filter(|tag| !tag.is_empty())
            .collect();
        self
    }

    pub fn with_fuzzy_city_matching(mut self, enabled: bool) -> Self {
        self.fuzzy_city_matching = enabled;
        self
    }

    pub fn midpoint_budget(&self) -> i64 {
        self.min_budget + (self.max_budget - self.min_budget) / 2
    }

    pub fn check(&self) -> Result<(), ConfigError> {
        if self.min_budget > self.max_budget {
            return Err(ConfigError::InvertedBudgetBounds {
                min: self.min_budget,
                max: self.max_budget,
            });
        }
        if self.cities.is_empty() {
            return Err(ConfigError::NoCities);
        }
        if self.cities.canonical(&self.default_city).is_none() {
            return Err(ConfigError::UnsupportedDefaultCity(
                self.default_city.clone(),
            ));
        }
        if self.date_types.is_empty() {
            return Err(ConfigError::NoDateTypes);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComposerConfig {
    pub rain_threshold_pct: f64,
    pub max_venues: usize,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            rain_threshold_pct: DEFAULT_RAIN_THRESHOLD_PCT,
            max_venues: DEFAULT_MAX_VENUES,
        }
    }
}

impl ComposerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            rain_threshold_pct: parse_or(
                &lookup,
                "DATEWISE_RAIN_THRESHOLD",
                defaults.rain_threshold_pct,
            )?,
            max_venues: parse_or(&lookup, "DATEWISE_MAX_VENUES", defaults.max_venues)?,
        })
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match non_empty(lookup(key)) {
        Some(value) => value.parse::<T>().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = ValidatorConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.min_budget, 500);
        assert_eq!(config.max_budget, 50_000);
        assert_eq!(config.default_city, "Bangalore");
        assert_eq!(config.midpoint_budget(), 25_250);
        assert_eq!(config.date_types.len(), 6);
        assert!(!config.fuzzy_city_matching);
    }

    #[test]
    fn environment_overrides_bounds_and_cities() {
        let config = ValidatorConfig::from_lookup(lookup_from(&[
            ("DATEWISE_MIN_BUDGET", "100"),
            ("DATEWISE_SUPPORTED_CITIES", "Pune, Mumbai"),
            ("DATEWISE_DEFAULT_CITY", "Pune"),
        ]))
        .unwrap();

        assert_eq!(config.min_budget, 100);
        assert_eq!(config.cities.canonical_names(), vec!["Mumbai", "Pune"]);
        assert_eq!(config.default_city, "Pune");
    }

    #[test]
    fn rejects_inconsistent_settings() {
        let inverted = ValidatorConfig::from_lookup(lookup_from(&[
            ("DATEWISE_MIN_BUDGET", "9000"),
            ("DATEWISE_MAX_BUDGET", "1000"),
        ]));
        assert!(matches!(inverted, Err(ConfigError::InvertedBudgetBounds { .. })));

        let missing_default = ValidatorConfig::from_lookup(lookup_from(&[(
            "DATEWISE_SUPPORTED_CITIES",
            "Mumbai",
        )]));
        assert!(matches!(
            missing_default,
            Err(ConfigError::UnsupportedDefaultCity(_))
        ));

        let garbage = ValidatorConfig::from_lookup(lookup_from(&[("DATEWISE_MAX_BUDGET", "lots")]));
        assert!(matches!(garbage, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn composer_threshold_from_environment() {
        let config =
            ComposerConfig::from_lookup(lookup_from(&[("DATEWISE_RAIN_THRESHOLD", "70")])).unwrap();
        assert_eq!(config.rain_threshold_pct, 70.0);
        assert_eq!(config.max_venues, 5);
    }
}
