pub mod cities;
pub mod composer;
pub mod config;
pub mod intent;
pub mod models;
pub mod timing;
pub mod validator;

pub use cities::{City, CityTable, Coordinates};
pub use composer::{compose_plan, fallback_narrative, narration_brief, rank_venues};
pub use config::{ComposerConfig, ConfigError, ValidatorConfig};
pub use intent::{extract_request_rules, normalize_text};
pub use models::*;
pub use timing::{resolve_timing, upcoming_saturday, ParseError};
pub use validator::{
    Correction, CorrectionClass, LookupError, RangeError, ValidationResult, Validator,
};
