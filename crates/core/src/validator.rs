use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::{ConfigError, ValidatorConfig};
use crate::models::{DateRequest, RawDateRequest, ResolvedDate};
use crate::timing::{resolve_timing, upcoming_saturday, ParseError};

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RangeError {
    #[error("budget missing or not a number")]
    NotANumber,
    #[error("budget {value} is below the minimum of {min}")]
    BelowMinimum { value: String, min: i64 },
    #[error("budget {value} is above the maximum of {max}")]
    AboveMaximum { value: String, max: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum LookupError {
    #[error("city not specified")]
    MissingCity,
    #[error("city '{input}' not supported")]
    UnsupportedCity { input: String },
    #[error("date type not specified")]
    MissingDateType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionClass {
    Parse,
    Range,
    Lookup,
}

/// One applied fix. Its `Display` text is the user-facing warning.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Correction {
    #[error("{error}; planning for {substitute} instead")]
    TimingDefaulted { error: ParseError, substitute: NaiveDate },
    #[error("'{requested}' has already passed; date adjusted to {adjusted}")]
    DateRolledForward { requested: String, adjusted: NaiveDate },
    #[error("{error}; budget adjusted to {adjusted}")]
    Budget { error: RangeError, adjusted: i64 },
    #[error("{error}, using {substitute}")]
    CitySubstituted { error: LookupError, substitute: String },
    #[error("city '{input}' interpreted as {matched}")]
    CityInterpreted { input: String, matched: String },
    #[error("{error}, using '{substitute}'")]
    DateTypeDefaulted { error: LookupError, substitute: String },
}

impl Correction {
    pub fn class(&self) -> CorrectionClass {
        match self {
            Self::TimingDefaulted { .. } | Self::DateRolledForward { .. } => CorrectionClass::Parse,
            Self::Budget { .. } => CorrectionClass::Range,
            Self::CitySubstituted { .. }
            | Self::CityInterpreted { .. }
            | Self::DateTypeDefaulted { .. } => CorrectionClass::Lookup,
        }
    }

    pub fn field(&self) -> &'static str {
        match self {
            Self::TimingDefaulted { .. } | Self::DateRolledForward { .. } => "date",
            Self::Budget { .. } => "budget",
            Self::CitySubstituted { .. } | Self::CityInterpreted { .. } => "city",
            Self::DateTypeDefaulted { .. } => "date_type",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    #[serde(flatten)]
    pub request: DateRequest,
    #[serde(flatten)]
    pub resolved_date: ResolvedDate,
    pub warnings: Vec<String>,
    pub corrections: Vec<Correction>,
}

impl ValidationResult {
    pub fn is_clean(&self) -> bool {
        self.corrections.is_empty()
    }
}

/// Normalizes raw requests. Every input yields a usable result.
#[derive(Debug, Clone)]
pub struct Validator {
    config: ValidatorConfig,
    default_city: String,
}

impl Validator {
    pub fn new(config: ValidatorConfig) -> Result<Self, ConfigError> {
        config.check()?;
        let default_city = config
            .cities
            .canonical(&config.default_city)
            .map(|city| city.name.clone())
            .ok_or_else(|| ConfigError::UnsupportedDefaultCity(config.default_city.clone()))?;

        Ok(Self {
            config,
            default_city,
        })
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn validate_date(
        &self,
        raw_timing_phrase: Option<&str>,
        reference_date: NaiveDate,
    ) -> (ResolvedDate, Option<Correction>) {
        let phrase = raw_timing_phrase.unwrap_or_default();
        match resolve_timing(phrase, reference_date) {
            Ok(timing) => {
                let correction = (timing.years_advanced > 0).then(|| Correction::DateRolledForward {
                    requested: phrase.trim().to_string(),
                    adjusted: timing.resolved.date,
                });
                (timing.resolved, correction)
            }
            Err(error) => {
                let substitute = upcoming_saturday(reference_date);
                (
                    ResolvedDate::new(substitute, None),
                    Some(Correction::TimingDefaulted { error, substitute }),
                )
            }
        }
    }

    pub fn validate_budget(&self, raw_budget: Option<&Value>) -> (i64, Option<Correction>) {
        let Some((raw, amount)) = raw_budget.and_then(|raw| parse_budget(raw).map(|amount| (raw, amount)))
        else {
            let adjusted = self.config.midpoint_budget();
            return (
                adjusted,
                Some(Correction::Budget {
                    error: RangeError::NotANumber,
                    adjusted,
                }),
            );
        };

        if amount < self.config.min_budget as f64 {
            let adjusted = self.config.min_budget;
            return (
                adjusted,
                Some(Correction::Budget {
                    error: RangeError::BelowMinimum {
                        value: budget_label(raw),
                        min: adjusted,
                    },
                    adjusted,
                }),
            );
        }

        if amount > self.config.max_budget as f64 {
            let adjusted = self.config.max_budget;
            return (
                adjusted,
                Some(Correction::Budget {
                    error: RangeError::AboveMaximum {
                        value: budget_label(raw),
                        max: adjusted,
                    },
                    adjusted,
                }),
            );
        }

        (amount as i64, None)
    }

    pub fn validate_city(&self, raw_city: Option<&str>) -> (String, Option<Correction>) {
        let Some(input) = raw_city.map(str::trim).filter(|value| !value.is_empty()) else {
            return (
                self.default_city.clone(),
                Some(Correction::CitySubstituted {
                    error: LookupError::MissingCity,
                    substitute: self.default_city.clone(),
                }),
            );
        };

        if let Some(city) = self.config.cities.lookup(input) {
            return (city.name.clone(), None);
        }

        if self.config.fuzzy_city_matching {
            if let Some(city) = self.config.cities.fuzzy_lookup(input) {
                return (
                    city.name.clone(),
                    Some(Correction::CityInterpreted {
                        input: input.to_string(),
                        matched: city.name.clone(),
                    }),
                );
            }
        }

        (
            self.default_city.clone(),
            Some(Correction::CitySubstituted {
                error: LookupError::UnsupportedCity {
                    input: input.to_string(),
                },
                substitute: self.default_city.clone(),
            }),
        )
    }

    pub fn validate_date_type(&self, raw_type: Option<&str>) -> (String, Option<Correction>) {
        let Some(raw) = raw_type.filter(|value| !value.trim().is_empty()) else {
            let substitute = self.config.default_date_type.clone();
            return (
                substitute.clone(),
                Some(Correction::DateTypeDefaulted {
                    error: LookupError::MissingDateType,
                    substitute,
                }),
            );
        };

        let canonical = canonical_date_type(raw);
        if self.config.date_types.iter().any(|tag| *tag == canonical) {
            (canonical, None)
        } else {
            (raw.to_string(), None)
        }
    }

    /// Checks date, budget, city and date type in that order without
    /// short-circuiting.
    pub fn validate(&self, raw: &RawDateRequest, reference_date: NaiveDate) -> ValidationResult {
        let mut corrections = Vec::new();

        let (resolved_date, correction) =
            self.validate_date(raw.timing_phrase.as_deref(), reference_date);
        corrections.extend(correction);

        let (budget, correction) = self.validate_budget(raw.budget.as_ref());
        corrections.extend(correction);

        let (city, correction) = self.validate_city(raw.city.as_deref());
        corrections.extend(correction);

        let (date_type, correction) = self.validate_date_type(raw.date_type.as_deref());
        corrections.extend(correction);

        ValidationResult {
            request: DateRequest {
                city,
                budget,
                date_type,
                timing_phrase: raw.timing_phrase.clone().unwrap_or_default(),
                special_requirements: raw.special_requirements.clone(),
            },
            resolved_date,
            warnings: corrections.iter().map(ToString::to_string).collect(),
            corrections,
        }
    }
}

/// Accepts integers, floats and money-like strings ("₹2,500", "Rs. 1200", "2k"),
/// rounded to whole rupees. Kept as `f64` so oversized input is never wrapped.
pub fn parse_budget(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => parse_budget_text(text),
        _ => None,
    }
    .filter(|value| value.is_finite())
    .map(f64::round)
}

fn parse_budget_text(text: &str) -> Option<f64> {
    let cleaned = text
        .trim()
        .to_lowercase()
        .replace(['₹', ',', '_'], "")
        .replace("/-", "");
    let mut amount = cleaned.trim();
    for prefix in ["inr", "rs.", "rs"] {
        if let Some(rest) = amount.strip_prefix(prefix) {
            amount = rest.trim();
            break;
        }
    }
    for suffix in ["rupees", "inr"] {
        if let Some(rest) = amount.strip_suffix(suffix) {
            amount = rest.trim();
            break;
        }
    }

    let (number, multiplier) = match amount.strip_suffix('k') {
        Some(rest) => (rest.trim(), 1_000.0),
        None => (amount, 1.0),
    };

    number.parse::<f64>().ok().map(|value| value * multiplier)
}

/// The amount as the caller wrote it, for warning text.
fn budget_label(raw: &Value) -> String {
    match raw {
        Value::String(text) => text.trim().to_string(),
        other => other.to_string(),
    }
}

fn canonical_date_type(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase().replace(['_', ' '], "-");
    match lowered.as_str() {
        "budget" | "budget-friendly" | "cheap" | "affordable" => "budget-friendly".to_string(),
        "cosy" => "cozy".to_string(),
        _ => lowered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn validator() -> Validator {
        Validator::new(ValidatorConfig::default()).unwrap()
    }

    #[test]
    fn clamps_low_budget_in_feb_14_scenario() {
        let raw = RawDateRequest::default()
            .with_city("Mumbai")
            .with_budget(100)
            .with_date_type("romantic")
            .with_timing("Feb 14");

        let result = validator().validate(&raw, date(2026, 2, 10));

        assert_eq!(result.request.city, "Mumbai");
        assert_eq!(result.request.budget, 500);
        assert_eq!(result.request.date_type, "romantic");
        assert_eq!(result.resolved_date.date, date(2026, 2, 14));
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("budget adjusted to 500"));
        assert_eq!(result.corrections[0].class(), CorrectionClass::Range);
    }

    #[test]
    fn unsupported_city_falls_back_to_bangalore() {
        let raw = RawDateRequest::default()
            .with_city("XYZ City")
            .with_budget(2000)
            .with_date_type("casual")
            .with_timing("tomorrow");

        let result = validator().validate(&raw, date(2026, 2, 10));

        assert_eq!(result.request.city, "Bangalore");
        assert_eq!(result.request.budget, 2000);
        assert_eq!(result.resolved_date.date, date(2026, 2, 11));
        assert_eq!(
            result.warnings,
            vec!["city 'XYZ City' not supported, using Bangalore".to_string()]
        );
    }

    #[test]
    fn past_day_month_rolls_into_next_year_with_warning() {
        let (resolved, correction) = validator().validate_date(Some("January 5th"), date(2026, 2, 10));
        assert_eq!(resolved.date, date(2027, 1, 5));
        let warning = correction.unwrap().to_string();
        assert!(warning.contains("2027-01-05"), "{warning}");
    }

    #[test]
    fn weekend_from_wednesday_needs_no_warning() {
        let (resolved, correction) = validator().validate_date(Some("this weekend"), date(2026, 2, 11));
        assert_eq!(resolved.date, date(2026, 2, 14));
        assert!(correction.is_none());
    }

    #[test]
    fn unparseable_timing_defaults_to_next_saturday() {
        let (resolved, correction) = validator().validate_date(Some("someday"), date(2026, 2, 10));
        assert_eq!(resolved.date, date(2026, 2, 14));
        assert!(matches!(
            correction,
            Some(Correction::TimingDefaulted {
                error: ParseError::Unrecognized { .. },
                ..
            })
        ));
    }

    #[test]
    fn budget_parsing_and_defaults() {
        let validator = validator();
        assert_eq!(validator.validate_budget(Some(&json!("₹2,500"))), (2_500, None));
        assert_eq!(validator.validate_budget(Some(&json!("Rs. 1200"))), (1_200, None));
        assert_eq!(validator.validate_budget(Some(&json!("3k"))), (3_000, None));
        assert_eq!(validator.validate_budget(Some(&json!(1999.6))), (2_000, None));

        let (budget, correction) = validator.validate_budget(None);
        assert_eq!(budget, 25_250);
        assert!(matches!(
            correction,
            Some(Correction::Budget {
                error: RangeError::NotANumber,
                ..
            })
        ));

        let (budget, correction) = validator.validate_budget(Some(&json!(true)));
        assert_eq!(budget, 25_250);
        assert!(correction.is_some());

        let (budget, correction) = validator.validate_budget(Some(&json!(90_000)));
        assert_eq!(budget, 50_000);
        assert!(correction.unwrap().to_string().contains("above the maximum"));
    }

    #[test]
    fn oversized_budget_keeps_caller_amount_in_warning() {
        let validator = validator();
        let (budget, correction) = validator.validate_budget(Some(&json!("99999999999999999999")));
        assert_eq!(budget, 50_000);
        assert_eq!(
            correction.unwrap().to_string(),
            "budget 99999999999999999999 is above the maximum of 50000; budget adjusted to 50000"
        );

        let (budget, correction) = validator.validate_budget(Some(&json!(-1e30)));
        assert_eq!(budget, 500);
        assert!(correction.unwrap().to_string().contains("below the minimum"));
    }

    #[test]
    fn city_matching_is_case_and_whitespace_insensitive() {
        let validator = validator();
        assert_eq!(validator.validate_city(Some("  mUMBAI ")), ("Mumbai".to_string(), None));
        assert_eq!(validator.validate_city(Some("bengaluru")), ("Bangalore".to_string(), None));

        let (city, correction) = validator.validate_city(Some("Mumbay"));
        assert_eq!(city, "Bangalore");
        assert_eq!(correction.unwrap().field(), "city");

        let (city, correction) = validator.validate_city(Some("   "));
        assert_eq!(city, "Bangalore");
        assert!(correction.unwrap().to_string().contains("not specified"));
    }

    #[test]
    fn unsupported_real_cities_are_not_rerouted() {
        let validator = validator();
        for city in ["Udaipur", "Raipur", "Nagaur"] {
            let (resolved, correction) = validator.validate_city(Some(city));
            assert_eq!(resolved, "Bangalore", "{city}");
            assert!(matches!(
                correction,
                Some(Correction::CitySubstituted {
                    error: LookupError::UnsupportedCity { .. },
                    ..
                })
            ));
        }
    }

    #[test]
    fn fuzzy_matching_is_opt_in() {
        let validator =
            Validator::new(ValidatorConfig::default().with_fuzzy_city_matching(true)).unwrap();
        let (city, correction) = validator.validate_city(Some("Mumbay"));
        assert_eq!(city, "Mumbai");
        assert!(matches!(correction, Some(Correction::CityInterpreted { .. })));
    }

    #[test]
    fn date_types_canonicalize_or_pass_through() {
        let validator = validator();
        assert_eq!(validator.validate_date_type(Some(" Romantic ")), ("romantic".to_string(), None));
        assert_eq!(validator.validate_date_type(Some("budget")), ("budget-friendly".to_string(), None));
        assert_eq!(
            validator.validate_date_type(Some("Stargazing")),
            ("Stargazing".to_string(), None)
        );

        let (date_type, correction) = validator.validate_date_type(None);
        assert_eq!(date_type, "casual");
        assert!(correction.is_some());
    }

    #[test]
    fn empty_request_reports_four_warnings_in_field_order() {
        let result = validator().validate(&RawDateRequest::default(), date(2026, 2, 10));

        let fields = result.corrections.iter().map(Correction::field).collect::<Vec<_>>();
        assert_eq!(fields, vec!["date", "budget", "city", "date_type"]);
        assert_eq!(result.warnings.len(), 4);
        assert_eq!(result.request.city, "Bangalore");
        assert_eq!(result.request.date_type, "casual");
        assert_eq!(result.resolved_date.date, date(2026, 2, 14));
    }

    #[test]
    fn custom_bounds_come_from_config() {
        let validator =
            Validator::new(ValidatorConfig::default().with_budget_bounds(100, 5_000)).unwrap();
        assert_eq!(validator.validate_budget(Some(&json!(100))), (100, None));
        assert_eq!(validator.validate_budget(Some(&json!(6_000))).0, 5_000);
    }

    #[test]
    fn serializes_flat_output_record() {
        let raw = RawDateRequest::default()
            .with_city("Pune")
            .with_budget(1500)
            .with_date_type("fun")
            .with_timing("tomorrow evening");
        let value = serde_json::to_value(validator().validate(&raw, date(2026, 2, 10))).unwrap();

        assert_eq!(value["city"], "Pune");
        assert_eq!(value["budget"], 1500);
        assert_eq!(value["resolved_date"], "2026-02-11");
        assert_eq!(value["time_of_day"], "evening");
        assert_eq!(value["warnings"], json!([]));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn reference_dates() -> impl Strategy<Value = NaiveDate> {
            (2020i32..2040, 1u32..=12, 1u32..=28).prop_map(|(y, m, d)| date(y, m, d))
        }

        proptest! {
            #[test]
            fn resolved_date_never_precedes_reference(
                reference in reference_dates(),
                phrase in prop_oneof![
                    Just("today".to_string()),
                    Just("this weekend".to_string()),
                    Just("next friday".to_string()),
                    Just("29 Feb".to_string()),
                    (1u32..=31, 1u32..=12).prop_map(|(d, m)| format!("{d}/{m}")),
                    "[a-z ]{0,12}",
                ],
            ) {
                let (resolved, _) = validator().validate_date(Some(&phrase), reference);
                prop_assert!(resolved.date >= reference);
            }

            #[test]
            fn budget_is_clamped_and_idempotent(value in -1_000_000i64..1_000_000) {
                let validator = validator();
                let (budget, correction) = validator.validate_budget(Some(&Value::from(value)));
                prop_assert!((500..=50_000).contains(&budget));
                if value < 500 {
                    prop_assert_eq!(budget, 500);
                    prop_assert!(correction.is_some());
                } else if value > 50_000 {
                    prop_assert_eq!(budget, 50_000);
                    prop_assert!(correction.is_some());
                } else {
                    prop_assert_eq!(budget, value);
                    prop_assert!(correction.is_none());
                }
                prop_assert_eq!(validator.validate_budget(Some(&Value::from(budget))), (budget, None));
            }

            #[test]
            fn unknown_city_yields_default_and_one_warning(name in "[a-z]{3,10}( [a-z]{2,6})?") {
                let validator = validator();
                prop_assume!(validator.config().cities.lookup(&name).is_none());
                let raw = RawDateRequest::default()
                    .with_city(name)
                    .with_budget(2_000)
                    .with_date_type("casual")
                    .with_timing("tomorrow");
                let result = validator.validate(&raw, date(2026, 2, 10));
                prop_assert_eq!(result.request.city.as_str(), "Bangalore");
                prop_assert_eq!(result.warnings.len(), 1);
            }
        }
    }
}
