mod rate_limit;

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Local, NaiveDate, Utc};
use datewise_agents::{DatePlannerAgent, PlannedDate};
use datewise_core::{ComposerConfig, RawDateRequest, ValidationResult, Validator, ValidatorConfig};
use datewise_llm::{ExtractionError, LanguageStack};
use datewise_observability::{AppMetrics, MetricsSnapshot};
use datewise_sources::Sources;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

pub use rate_limit::{IpRateLimiter, RateDecision};

pub const DEFAULT_API_KEY: &str = "dev-datewise-key";
const MAX_BODY_BYTES: usize = 16 * 1024;

pub type PlannerAgent = DatePlannerAgent<LanguageStack, Sources>;

/// HTTP-facing settings; everything else comes from the pipeline crates.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub api_key: String,
    pub rate_limit_window: Duration,
    pub rate_limit_max: usize,
    pub allowed_origins: Vec<String>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            api_key: DEFAULT_API_KEY.to_string(),
            rate_limit_window: Duration::from_secs(60),
            rate_limit_max: 60,
            allowed_origins: default_origins(),
        }
    }
}

impl ApiSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let window_secs = lookup("DATEWISE_RATE_LIMIT_WINDOW_SECONDS")
            .and_then(|value| value.trim().parse::<u64>().ok())
            .unwrap_or(defaults.rate_limit_window.as_secs());

        Self {
            api_key: lookup("DATEWISE_API_KEY")
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or(defaults.api_key),
            rate_limit_window: Duration::from_secs(window_secs.max(1)),
            rate_limit_max: lookup("DATEWISE_RATE_LIMIT_MAX")
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(defaults.rate_limit_max)
                .max(1),
            allowed_origins: lookup("DATEWISE_ALLOWED_ORIGINS")
                .map(|raw| parse_allowed_origins(&raw))
                .filter(|origins| !origins.is_empty())
                .unwrap_or(defaults.allowed_origins),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Capabilities {
    pub language_model: String,
    pub venue_search: bool,
    pub weather_forecast: bool,
}

#[derive(Clone)]
pub struct ApiState {
    pub agent: Arc<PlannerAgent>,
    pub metrics: Arc<AppMetrics>,
    pub limiter: IpRateLimiter,
    pub settings: Arc<ApiSettings>,
    pub capabilities: Capabilities,
}

impl ApiState {
    pub fn new(
        validator_config: ValidatorConfig,
        composer: ComposerConfig,
        language: LanguageStack,
        sources: Sources,
        settings: ApiSettings,
    ) -> Result<Self> {
        let validator = Validator::new(validator_config).context("invalid validator configuration")?;
        let capabilities = Capabilities {
            language_model: language.model_name().to_string(),
            venue_search: sources.has_venues(),
            weather_forecast: sources.has_weather(),
        };
        let metrics = AppMetrics::shared();
        let agent = DatePlannerAgent::new(
            Arc::new(language),
            Arc::new(sources),
            validator,
            composer,
            metrics.clone(),
        );

        Ok(Self {
            agent: Arc::new(agent),
            metrics,
            limiter: IpRateLimiter::new(settings.rate_limit_window, settings.rate_limit_max),
            settings: Arc::new(settings),
            capabilities,
        })
    }

    /// Rule-based extraction, template narration and no outbound calls.
    pub fn offline(settings: ApiSettings) -> Result<Self> {
        let validator_config = ValidatorConfig::default();
        let language = LanguageStack::offline(validator_config.cities.clone());
        Self::new(
            validator_config,
            ComposerConfig::default(),
            language,
            Sources::offline(),
            settings,
        )
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    metrics: MetricsSnapshot,
    capabilities: Capabilities,
}

#[derive(Debug, Serialize)]
struct CitiesResponse {
    cities: Vec<String>,
    default_city: String,
}

#[derive(Debug, Deserialize)]
struct ValidateRequest {
    #[serde(flatten)]
    raw: RawDateRequest,
    #[serde(default)]
    reference_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct PlanRequest {
    #[serde(default)]
    text: String,
    #[serde(default)]
    reference_date: Option<NaiveDate>,
}

pub fn build_app() -> Result<Router> {
    let validator_config = ValidatorConfig::from_env().context("invalid validator configuration")?;
    let composer = ComposerConfig::from_env().context("invalid composer configuration")?;
    let language = LanguageStack::from_env(validator_config.cities.clone())
        .context("failed to build language model client")?;
    let sources = Sources::from_env().context("failed to build venue and weather clients")?;

    let state = ApiState::new(validator_config, composer, language, sources, ApiSettings::from_env())?;
    info!(
        language_model = %state.capabilities.language_model,
        venue_search = state.capabilities.venue_search,
        weather_forecast = state.capabilities.weather_forecast,
        "datewise pipeline ready"
    );
    Ok(build_router(state))
}

pub fn build_offline_app() -> Result<Router> {
    Ok(build_router(ApiState::offline(ApiSettings::default())?))
}

pub fn build_router(state: ApiState) -> Router {
    let cors = build_cors_layer(&state.settings.allowed_origins);

    Router::new()
        .route("/health", get(health))
        .route("/v1/cities", get(cities))
        .route("/v1/validate", post(validate))
        .route("/v1/plan", post(plan))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), api_key_middleware))
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp_utc: Utc::now().to_rfc3339(),
        metrics: state.metrics.snapshot(),
        capabilities: state.capabilities.clone(),
    })
}

async fn cities(State(state): State<ApiState>) -> Json<CitiesResponse> {
    let config = state.agent.validator().config();
    Json(CitiesResponse {
        cities: config.cities.canonical_names(),
        default_city: config.default_city.clone(),
    })
}

async fn validate(
    State(state): State<ApiState>,
    Json(body): Json<ValidateRequest>,
) -> Json<ValidationResult> {
    let reference = body.reference_date.unwrap_or_else(today);
    Json(state.agent.validate(&body.raw, reference))
}

async fn plan(
    State(state): State<ApiState>,
    Json(body): Json<PlanRequest>,
) -> Result<Json<PlannedDate>, (StatusCode, Json<serde_json::Value>)> {
    let reference = body.reference_date.unwrap_or_else(today);

    match state.agent.plan(&body.text, reference).await {
        Ok(planned) => Ok(Json(planned)),
        Err(err) if err.downcast_ref::<ExtractionError>().is_some() => {
            warn!(error = %format!("{err:#}"), "date request could not be extracted");
            Err((
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({
                    "error": "extraction_failed",
                    "message": format!("{err:#}"),
                })),
            ))
        }
        Err(err) => {
            error!(error = %format!("{err:#}"), "date planning failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "plan_failed",
                    "message": "could not build a date plan",
                })),
            ))
        }
    }
}

async fn api_key_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || is_public_endpoint(request.uri().path()) {
        return next.run(request).await;
    }

    let provided = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok());

    if provided == Some(state.settings.api_key.as_str()) {
        return next.run(request).await;
    }

    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": "unauthorized",
            "message": "missing or invalid x-api-key",
        })),
    )
        .into_response()
}

async fn rate_limit_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || is_public_endpoint(request.uri().path()) {
        return next.run(request).await;
    }

    let ip = request_ip(&request);
    match state.limiter.check(&ip) {
        RateDecision::Allowed { remaining } => {
            let mut response = next.run(request).await;
            response
                .headers_mut()
                .insert("x-ratelimit-remaining", HeaderValue::from(remaining));
            response
        }
        RateDecision::Limited { retry_after } => {
            let seconds = retry_after.as_secs().max(1);
            warn!(ip = %ip, retry_after = seconds, "rate limit exceeded");
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "error": "rate_limited",
                    "message": "too many requests, retry later",
                })),
            )
                .into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
            response
        }
    }
}

fn is_public_endpoint(path: &str) -> bool {
    matches!(path, "/health")
}

fn request_ip(request: &Request<Body>) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "local".to_string())
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn default_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://127.0.0.1:3000".to_string(),
    ]
}

fn parse_allowed_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allowed = origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-api-key"),
        ])
}
