use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use datewise_core::{
    compose_plan, normalize_text, ComposerConfig, Coordinates, DatePlan, FetchOutcome,
    RawDateRequest, SourceFailure, SourceKind, ValidationResult, Validator,
};
use datewise_llm::{IntentExtractor, Narrator};
use datewise_observability::AppMetrics;
use datewise_sources::{SourceError, VenueSource, WeatherSource};
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Serialize)]
pub struct PlannedDate {
    pub plan_id: Uuid,
    pub reference_date: NaiveDate,
    pub extracted: RawDateRequest,
    #[serde(flatten)]
    pub plan: DatePlan,
}

/// Runs one request through extract, validate, fetch, compose and narrate.
#[derive(Clone)]
pub struct DatePlannerAgent<L, S>
where
    L: IntentExtractor + Narrator,
    S: VenueSource + WeatherSource,
{
    language: Arc<L>,
    sources: Arc<S>,
    validator: Validator,
    composer: ComposerConfig,
    metrics: Arc<AppMetrics>,
    retry_backoff: Duration,
}

impl<L, S> DatePlannerAgent<L, S>
where
    L: IntentExtractor + Narrator,
    S: VenueSource + WeatherSource,
{
    pub fn new(
        language: Arc<L>,
        sources: Arc<S>,
        validator: Validator,
        composer: ComposerConfig,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        Self {
            language,
            sources,
            validator,
            composer,
            metrics,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn metrics(&self) -> &Arc<AppMetrics> {
        &self.metrics
    }

    pub fn validate(&self, raw: &RawDateRequest, reference_date: NaiveDate) -> ValidationResult {
        let result = self.validator.validate(raw, reference_date);
        self.metrics.record_validation(result.warnings.len());
        if !result.is_clean() {
            info!(
                city = %result.request.city,
                corrections = result.corrections.len(),
                "request corrected during validation"
            );
        }
        result
    }

    #[instrument(skip(self, text), fields(chars = text.len()))]
    pub async fn plan(&self, text: &str, reference_date: NaiveDate) -> Result<PlannedDate> {
        let started = Instant::now();
        self.metrics.inc_request();

        let normalized = normalize_text(text);
        let extracted = self
            .language
            .extract(&normalized)
            .await
            .context("could not extract a date request")?;

        let validation = self.validate(&extracted, reference_date);
        let fetched = self.fetch(&validation, reference_date).await;
        let plan = self.narrate(compose_plan(&validation, &fetched, &self.composer)).await;

        self.metrics.observe_latency(started.elapsed());
        info!(
            city = %plan.request.city,
            date = %plan.resolved_date.date,
            venues = plan.venues.len(),
            failures = plan.source_failures.len(),
            fallback = plan.narrative_fallback,
            "date planned"
        );

        Ok(PlannedDate {
            plan_id: Uuid::new_v4(),
            reference_date,
            extracted,
            plan,
        })
    }

    /// Venue and weather lookups run concurrently and fail independently.
    pub async fn fetch(&self, validation: &ValidationResult, reference_date: NaiveDate) -> FetchOutcome {
        let request = &validation.request;
        let resolved = &validation.resolved_date;
        let coordinates = self.coordinates_for(&request.city);
        let sources = &*self.sources;
        let backoff = self.retry_backoff;

        let (venues, weather) = futures::join!(
            with_retry(SourceKind::Venues, backoff, move || {
                sources.fetch_venues(request, coordinates)
            }),
            with_retry(SourceKind::Weather, backoff, move || {
                sources.fetch_weather(&request.city, coordinates, resolved, reference_date)
            }),
        );

        let mut outcome = FetchOutcome::default();
        match venues {
            Ok(venues) => outcome.venues = venues,
            Err(error) => outcome.failures.push(self.source_failure(SourceKind::Venues, &error)),
        }
        match weather {
            Ok(weather) => outcome.weather = Some(weather),
            Err(error) => outcome.failures.push(self.source_failure(SourceKind::Weather, &error)),
        }
        outcome
    }

    async fn narrate(&self, plan: DatePlan) -> DatePlan {
        match self.language.narrate(&plan).await {
            Ok(narrative) => plan.with_narrative(narrative),
            Err(error) => {
                if !error.is_unconfigured() {
                    warn!(error = %error, "narration failed, keeping template narrative");
                }
                self.metrics.inc_fallback_narrative();
                plan
            }
        }
    }

    fn coordinates_for(&self, city: &str) -> Option<Coordinates> {
        self.validator
            .config()
            .cities
            .canonical(city)
            .and_then(|city| city.coordinates)
    }

    fn source_failure(&self, source: SourceKind, error: &SourceError) -> SourceFailure {
        let label = match source {
            SourceKind::Venues => "venues",
            SourceKind::Weather => "weather",
        };
        self.metrics.inc_source_failure(label);
        warn!(source = label, error = %error, "source fetch failed");
        SourceFailure {
            source,
            message: error.to_string(),
        }
    }
}

async fn with_retry<T, F, Fut>(source: SourceKind, backoff: Duration, mut attempt: F) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    match attempt().await {
        Err(error) if error.is_retryable() => {
            warn!(source = ?source, error = %error, "retrying after backoff");
            tokio::time::sleep(backoff).await;
            attempt().await
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use datewise_core::{
        PriceTier, ResolvedDate, ValidatorConfig, Venue, VenueSetting, WeatherSummary,
    };
    use datewise_llm::{ExtractionError, LlmError, NarrationError};

    use super::*;

    struct StubLanguage {
        extracted: Option<RawDateRequest>,
        narrative: Option<String>,
    }

    impl IntentExtractor for StubLanguage {
        async fn extract(&self, _text: &str) -> Result<RawDateRequest, ExtractionError> {
            self.extracted.clone().ok_or(ExtractionError::EmptyInput)
        }
    }

    impl Narrator for StubLanguage {
        async fn narrate(&self, _plan: &DatePlan) -> Result<String, NarrationError> {
            self.narrative
                .clone()
                .ok_or(NarrationError::Llm(LlmError::RateLimited))
        }
    }

    #[derive(Default)]
    struct ScriptedSources {
        venue_failures_left: AtomicUsize,
        venue_calls: AtomicUsize,
        weather_calls: AtomicUsize,
        weather_configured: bool,
    }

    impl VenueSource for ScriptedSources {
        async fn fetch_venues(
            &self,
            request: &datewise_core::DateRequest,
            coordinates: Option<Coordinates>,
        ) -> Result<Vec<Venue>, SourceError> {
            self.venue_calls.fetch_add(1, Ordering::SeqCst);
            assert!(coordinates.is_some(), "{} should have coordinates", request.city);
            let remaining = self.venue_failures_left.load(Ordering::SeqCst);
            if remaining > 0 {
                self.venue_failures_left.store(remaining - 1, Ordering::SeqCst);
                return Err(SourceError::Status {
                    status: 503,
                    body: "try later".to_string(),
                });
            }
            Ok(vec![Venue {
                name: format!("{} Social", request.city),
                rating: Some(4.4),
                review_count: 800,
                price_tier: PriceTier::Inexpensive,
                address: "MG Road".to_string(),
                setting: VenueSetting::Indoor,
                open_now: None,
            }])
        }
    }

    impl WeatherSource for ScriptedSources {
        async fn fetch_weather(
            &self,
            _city: &str,
            _coordinates: Option<Coordinates>,
            _date: &ResolvedDate,
            _reference_date: NaiveDate,
        ) -> Result<WeatherSummary, SourceError> {
            self.weather_calls.fetch_add(1, Ordering::SeqCst);
            if self.weather_configured {
                Ok(WeatherSummary::from_observation(
                    "Clear", "Clear sky", 26.0, 27.0, 50, 0.0,
                ))
            } else {
                Err(SourceError::NotConfigured("OpenWeather"))
            }
        }
    }

    fn agent(
        language: StubLanguage,
        sources: Arc<ScriptedSources>,
    ) -> DatePlannerAgent<StubLanguage, ScriptedSources> {
        DatePlannerAgent::new(
            Arc::new(language),
            sources,
            Validator::new(ValidatorConfig::default()).unwrap(),
            ComposerConfig::default(),
            AppMetrics::shared(),
        )
        .with_retry_backoff(Duration::ZERO)
    }

    fn tuesday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 10).unwrap()
    }

    fn mumbai_request() -> RawDateRequest {
        RawDateRequest::default()
            .with_city("Mumbai")
            .with_budget(100)
            .with_date_type("romantic")
            .with_timing("Feb 14")
    }

    #[tokio::test]
    async fn retries_transient_venue_failure_once() {
        let sources = Arc::new(ScriptedSources {
            venue_failures_left: AtomicUsize::new(1),
            weather_configured: true,
            ..ScriptedSources::default()
        });
        let agent = agent(
            StubLanguage {
                extracted: Some(mumbai_request()),
                narrative: Some("Have fun!".to_string()),
            },
            sources.clone(),
        );

        let planned = agent.plan("romantic date in Mumbai", tuesday()).await.unwrap();

        assert_eq!(sources.venue_calls.load(Ordering::SeqCst), 2);
        assert!(planned.plan.source_failures.is_empty());
        assert_eq!(planned.plan.venues.len(), 1);
        assert_eq!(planned.plan.request.budget, 500);
        assert_eq!(planned.plan.resolved_date.date, NaiveDate::from_ymd_opt(2026, 2, 14).unwrap());
        assert_eq!(planned.plan.warnings.len(), 1);
        assert_eq!(planned.plan.narrative, "Have fun!");
        assert!(!planned.plan.narrative_fallback);
    }

    #[tokio::test]
    async fn persistent_failures_are_recorded_without_retry() {
        let sources = Arc::new(ScriptedSources {
            venue_failures_left: AtomicUsize::new(5),
            weather_configured: false,
            ..ScriptedSources::default()
        });
        let agent = agent(
            StubLanguage {
                extracted: Some(mumbai_request()),
                narrative: None,
            },
            sources.clone(),
        );

        let planned = agent.plan("anything", tuesday()).await.unwrap();

        assert_eq!(sources.venue_calls.load(Ordering::SeqCst), 2);
        assert_eq!(sources.weather_calls.load(Ordering::SeqCst), 1);
        let failed = planned
            .plan
            .source_failures
            .iter()
            .map(|failure| failure.source)
            .collect::<Vec<_>>();
        assert_eq!(failed, vec![SourceKind::Venues, SourceKind::Weather]);
        assert!(planned.plan.narrative_fallback);
        assert!(planned.plan.narrative.contains("No venues found"));

        let snapshot = agent.metrics().snapshot();
        assert_eq!(snapshot.source_failures_total, 2);
        assert_eq!(snapshot.fallback_narratives_total, 1);
    }

    #[tokio::test]
    async fn extraction_failure_aborts_the_pipeline() {
        let sources = Arc::new(ScriptedSources::default());
        let agent = agent(
            StubLanguage {
                extracted: None,
                narrative: None,
            },
            sources.clone(),
        );

        let error = agent.plan("", tuesday()).await.unwrap_err();
        assert!(error.downcast_ref::<ExtractionError>().is_some());
        assert_eq!(sources.venue_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn validate_counts_warnings() {
        let agent = agent(
            StubLanguage {
                extracted: None,
                narrative: None,
            },
            Arc::new(ScriptedSources::default()),
        );
        let result = agent.validate(&RawDateRequest::default().with_city("XYZ City"), tuesday());
        assert_eq!(result.request.city, "Bangalore");
        assert_eq!(agent.metrics().snapshot().warnings_total, 4);
    }

    #[tokio::test]
    async fn planned_date_serializes_flat() {
        let agent = agent(
            StubLanguage {
                extracted: Some(mumbai_request()),
                narrative: Some("ok".to_string()),
            },
            Arc::new(ScriptedSources {
                weather_configured: true,
                ..ScriptedSources::default()
            }),
        );
        let planned = agent.plan("x", tuesday()).await.unwrap();
        let value = serde_json::to_value(&planned).unwrap();
        assert_eq!(value["resolved_date"], "2026-02-14");
        assert_eq!(value["request"]["city"], "Mumbai");
        assert_eq!(value["extracted"]["budget"], 100);
        assert!(value["plan_id"].is_string());
    }
}
