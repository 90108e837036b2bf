use std::cmp::Ordering;
use std::fmt::Write as _;

use crate::config::ComposerConfig;
use crate::models::{
    is_wet_condition, DatePlan, DateRequest, FetchOutcome, PriceTier, TimeOfDay, Venue,
    WeatherSummary,
};
use crate::validator::ValidationResult;

const HOT_ABOVE_C: f64 = 35.0;
const COLD_BELOW_C: f64 = 15.0;
const NARRATED_VENUES: usize = 3;

/// Builds the plan from validated input and whatever the sources returned.
/// The narrative starts as the template text; callers may replace it.
pub fn compose_plan(
    validation: &ValidationResult,
    fetched: &FetchOutcome,
    config: &ComposerConfig,
) -> DatePlan {
    let weather = fetched
        .weather
        .clone()
        .map(|weather| weather.with_rain_threshold(config.rain_threshold_pct));
    let indoor_only = needs_indoor(weather.as_ref(), &validation.request, config);

    let mut plan = DatePlan {
        request: validation.request.clone(),
        resolved_date: validation.resolved_date,
        venues: rank_venues(
            &fetched.venues,
            validation.request.budget,
            indoor_only,
            config.max_venues,
        ),
        advisories: weather_advisories(weather.as_ref(), config),
        weather,
        indoor_only,
        warnings: validation.warnings.clone(),
        source_failures: fetched.failures.clone(),
        narrative: String::new(),
        narrative_fallback: true,
    };
    plan.narrative = fallback_narrative(&plan);
    plan
}

pub fn needs_indoor(
    weather: Option<&WeatherSummary>,
    request: &DateRequest,
    config: &ComposerConfig,
) -> bool {
    request.wants_indoor() || weather.is_some_and(|weather| rain_expected(weather, config))
}

fn rain_expected(weather: &WeatherSummary, config: &ComposerConfig) -> bool {
    weather.rain_probability_pct > config.rain_threshold_pct || is_wet_condition(&weather.condition)
}

/// Budget and setting filters, then best rated first with review count as the
/// tie-break.
pub fn rank_venues(venues: &[Venue], budget: i64, indoor_only: bool, limit: usize) -> Vec<Venue> {
    let ceiling = PriceTier::ceiling_for_budget(budget);
    let mut ranked = venues
        .iter()
        .filter(|venue| venue.price_tier.fits_within(ceiling))
        .filter(|venue| !indoor_only || venue.setting.suits_rain())
        .cloned()
        .collect::<Vec<_>>();

    ranked.sort_by(|a, b| {
        let by_rating = b
            .rating
            .unwrap_or(0.0)
            .partial_cmp(&a.rating.unwrap_or(0.0))
            .unwrap_or(Ordering::Equal);
        by_rating.then_with(|| b.review_count.cmp(&a.review_count))
    });
    ranked.truncate(limit);
    ranked
}

pub fn weather_advisories(weather: Option<&WeatherSummary>, config: &ComposerConfig) -> Vec<String> {
    let Some(weather) = weather else {
        return vec!["Weather data unavailable; plan for both indoor and outdoor options".to_string()];
    };

    let mut advisories = Vec::new();
    if rain_expected(weather, config) {
        advisories.push(format!(
            "Rain expected ({}% chance); showing indoor venues only",
            weather.rain_probability_pct
        ));
    }
    if weather.temperature_c > HOT_ABOVE_C {
        advisories.push(format!(
            "Very hot ({}°C); air-conditioned venues recommended",
            weather.temperature_c
        ));
    } else if weather.temperature_c < COLD_BELOW_C {
        advisories.push(format!(
            "Cold weather ({}°C); cozy indoor venues recommended",
            weather.temperature_c
        ));
    }
    advisories
}

/// Context handed to the narrator model.
pub fn narration_brief(plan: &DatePlan) -> String {
    let request = &plan.request;
    let mut brief = format!(
        "User request: plan a {} date in {} with a budget of ₹{}\nDate: {}\nSpecial requirements: {}\n\nWeather forecast:\n",
        request.date_type,
        request.city,
        request.budget,
        plan.resolved_date,
        request.special_requirements.as_deref().unwrap_or("none"),
    );

    match &plan.weather {
        Some(weather) => {
            let _ = writeln!(
                brief,
                "- Temperature: {}°C (feels like {}°C)\n- Condition: {}\n- Rain probability: {}%\n- Suitable for outdoor: {}",
                weather.temperature_c,
                weather.feels_like_c,
                weather.description,
                weather.rain_probability_pct,
                if weather.suitable_for_outdoor { "yes" } else { "no" },
            );
        }
        None => brief.push_str("- Weather data unavailable\n"),
    }

    brief.push_str("\nTop venue recommendations:\n");
    if plan.venues.is_empty() {
        brief.push_str("No venues found matching the criteria.\n");
    }
    for (index, venue) in plan.venues.iter().take(NARRATED_VENUES).enumerate() {
        let _ = writeln!(
            brief,
            "{}. {}\n   - Rating: {}\n   - Price level: {}\n   - Address: {}",
            index + 1,
            venue.name,
            rating_label(venue),
            venue.price_tier.symbol(),
            venue.address,
        );
    }

    if !plan.advisories.is_empty() {
        brief.push_str("\nImportant notes:\n");
        for advisory in &plan.advisories {
            let _ = writeln!(brief, "- {advisory}");
        }
    }

    brief
}

/// Deterministic plan text used whenever the narrator is unavailable.
pub fn fallback_narrative(plan: &DatePlan) -> String {
    let mut text = format!(
        "Date plan for {} on {}\n\n",
        plan.request.city, plan.resolved_date
    );

    if let Some(weather) = &plan.weather {
        let _ = writeln!(
            text,
            "Weather: {}, {}°C with a {}% chance of rain",
            weather.description, weather.temperature_c, weather.rain_probability_pct
        );
    }
    for advisory in &plan.advisories {
        let _ = writeln!(text, "Note: {advisory}");
    }
    text.push('\n');

    text.push_str("Top recommendations:\n");
    if plan.venues.is_empty() {
        text.push_str("No venues found. Try adjusting your budget or location.\n");
    }
    for (index, venue) in plan.venues.iter().take(NARRATED_VENUES).enumerate() {
        let _ = writeln!(
            text,
            "{}. {} ({} | {})\n   {}",
            index + 1,
            venue.name,
            rating_label(venue),
            venue.price_tier.symbol(),
            venue.address,
        );
    }

    let _ = write!(
        text,
        "\nSuggested timing: {}\nBudget: ₹{}\n",
        suggested_timing(plan.resolved_date.time_of_day),
        plan.request.budget
    );
    text
}

fn rating_label(venue: &Venue) -> String {
    match venue.rating {
        Some(rating) => format!("{rating:.1}/5 from {} reviews", venue.review_count),
        None => "unrated".to_string(),
    }
}

fn suggested_timing(time_of_day: Option<TimeOfDay>) -> &'static str {
    match time_of_day {
        Some(TimeOfDay::Morning) => "morning (9-11 AM)",
        Some(TimeOfDay::Afternoon) => "afternoon (12-3 PM)",
        Some(TimeOfDay::Night) => "night (9-11 PM)",
        Some(TimeOfDay::Evening) | None => "evening (6-8 PM)",
    }
}
