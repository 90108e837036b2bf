use std::sync::Arc;

use datewise_core::{extract_request_rules, CityTable, DatePlan, RawDateRequest};

use crate::error::{ExtractionError, LlmError, NarrationError};
use crate::{IntentExtractor, Narrator};

/// Keyword heuristics over the supported city table.
#[derive(Debug, Clone)]
pub struct RuleIntentExtractor {
    cities: Arc<CityTable>,
}

impl RuleIntentExtractor {
    pub fn new(cities: Arc<CityTable>) -> Self {
        Self { cities }
    }
}

impl Default for RuleIntentExtractor {
    fn default() -> Self {
        Self::new(Arc::new(CityTable::builtin().clone()))
    }
}

impl IntentExtractor for RuleIntentExtractor {
    async fn extract(&self, text: &str) -> Result<RawDateRequest, ExtractionError> {
        if text.trim().is_empty() {
            return Err(ExtractionError::EmptyInput);
        }
        Ok(extract_request_rules(text, &self.cities))
    }
}

/// Has no model to call; the plan keeps its template narrative.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNarrator;

impl Narrator for NoNarrator {
    async fn narrate(&self, _plan: &DatePlan) -> Result<String, NarrationError> {
        Err(LlmError::NotConfigured.into())
    }
}
