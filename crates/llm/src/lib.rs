mod error;
mod fallback;
mod openrouter;

use std::sync::Arc;

use datewise_core::{CityTable, DatePlan, RawDateRequest};
use tracing::info;

pub use error::{ExtractionError, LlmError, NarrationError};
pub use fallback::{NoNarrator, RuleIntentExtractor};
pub use openrouter::{parse_request_json, LlmSettings, OpenRouterClient, DEFAULT_BASE_URL, DEFAULT_MODEL};

pub trait IntentExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<RawDateRequest, ExtractionError>;
}

pub trait Narrator: Send + Sync {
    async fn narrate(&self, plan: &DatePlan) -> Result<String, NarrationError>;
}

/// Remote model when an API key is configured, keyword rules otherwise.
#[derive(Debug, Clone)]
pub enum LanguageStack {
    Remote(OpenRouterClient),
    Offline(RuleIntentExtractor),
}

impl LanguageStack {
    pub fn from_env(cities: Arc<CityTable>) -> Result<Self, LlmError> {
        match LlmSettings::from_env() {
            Some(settings) => {
                let client = OpenRouterClient::new(settings)?;
                info!(model = client.model(), "using remote language model");
                Ok(Self::Remote(client))
            }
            None => {
                info!("no language model key configured, using rule-based extraction");
                Ok(Self::offline(cities))
            }
        }
    }

    pub fn offline(cities: Arc<CityTable>) -> Self {
        Self::Offline(RuleIntentExtractor::new(cities))
    }

    pub fn model_name(&self) -> &str {
        match self {
            LanguageStack::Remote(client) => client.model(),
            LanguageStack::Offline(_) => "rules",
        }
    }
}

impl IntentExtractor for LanguageStack {
    async fn extract(&self, text: &str) -> Result<RawDateRequest, ExtractionError> {
        match self {
            LanguageStack::Remote(client) => client.extract(text).await,
            LanguageStack::Offline(rules) => rules.extract(text).await,
        }
    }
}

impl Narrator for LanguageStack {
    async fn narrate(&self, plan: &DatePlan) -> Result<String, NarrationError> {
        match self {
            LanguageStack::Remote(client) => client.narrate(plan).await,
            LanguageStack::Offline(_) => NoNarrator.narrate(plan).await,
        }
    }
}
