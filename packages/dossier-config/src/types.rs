use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	#[serde(default)]
	pub service: Service,
	#[serde(default)]
	pub investigation: Investigation,
	#[serde(default)]
	pub planner: Planner,
	#[serde(default)]
	pub fusion: Fusion,
	#[serde(default)]
	pub validation: Validation,
	#[serde(default)]
	pub convergence: Convergence,
	#[serde(default)]
	pub retry: Retry,
	pub providers: Providers,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Service {
	pub log_level: String,
	/// Reports land in `<output_dir>/reports`, audit logs in `<output_dir>/logs`.
	pub output_dir: PathBuf,
}
impl Default for Service {
	fn default() -> Self {
		Self { log_level: "info".to_string(), output_dir: PathBuf::from("output") }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Investigation {
	/// Hard cap on search iterations. The CLI may override it per run.
	pub max_iterations: u32,
	pub queries_per_iteration: u32,
	pub max_results_per_query: u32,
	pub max_documents_per_iteration: u32,
	pub max_document_chars: u32,
}
impl Default for Investigation {
	fn default() -> Self {
		Self {
			max_iterations: 10,
			queries_per_iteration: 3,
			max_results_per_query: 10,
			max_documents_per_iteration: 30,
			max_document_chars: 1_200,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Planner {
	/// A finding category counts as covered once it holds this many corroborated findings.
	pub min_corroboration: u32,
	pub low_confidence: f32,
	pub max_known_entities: u32,
}
impl Default for Planner {
	fn default() -> Self {
		Self { min_corroboration: 2, low_confidence: 0.5, max_known_entities: 3 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Fusion {
	pub corroboration_weight: f32,
	pub contradiction_penalty: f32,
	/// Floor applied by the contradiction penalty. Must be greater than zero.
	pub min_confidence: f32,
	/// Stem similarity at which two statements are treated as the same claim family.
	pub family_threshold: f32,
	/// Full-text similarity at which a same-family candidate corroborates instead of
	/// contradicting.
	pub similarity_threshold: f32,
	/// Used when an extractor omits the provisional confidence.
	pub default_candidate_confidence: f32,
}
impl Default for Fusion {
	fn default() -> Self {
		Self {
			corroboration_weight: 0.4,
			contradiction_penalty: 0.2,
			min_confidence: 0.05,
			family_threshold: 0.6,
			similarity_threshold: 0.85,
			default_candidate_confidence: 0.5,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Validation {
	pub high_confidence: f32,
	pub medium_confidence: f32,
	pub min_independent_sources: u32,
	pub recency_half_life_days: f32,
}
impl Default for Validation {
	fn default() -> Self {
		Self {
			high_confidence: 0.7,
			medium_confidence: 0.45,
			min_independent_sources: 2,
			recency_half_life_days: 365.0,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Convergence {
	/// An iteration that adds or materially updates fewer entities than this stalls.
	pub marginal_gain_threshold: u32,
	/// Consecutive stalled iterations before the run converges.
	pub patience: u32,
	pub verified_fraction_saturation: f32,
	pub min_findings_for_saturation: u32,
	pub broaden_below_entities: u32,
	pub narrow_low_confidence_fraction: f32,
}
impl Default for Convergence {
	fn default() -> Self {
		Self {
			marginal_gain_threshold: 2,
			patience: 2,
			verified_fraction_saturation: 0.8,
			min_findings_for_saturation: 5,
			broaden_below_entities: 6,
			narrow_low_confidence_fraction: 0.4,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Retry {
	pub max_attempts: u32,
	pub base_backoff_ms: u64,
	pub max_backoff_ms: u64,
	pub call_timeout_ms: u64,
}
impl Default for Retry {
	fn default() -> Self {
		Self { max_attempts: 3, base_backoff_ms: 250, max_backoff_ms: 4_000, call_timeout_ms: 30_000 }
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct Providers {
	pub search: SearchProviderConfig,
	pub llm_extractor: LlmProviderConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SearchProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	#[serde(default)]
	pub api_key: String,
	pub path: String,
	/// Header carrying the API key, e.g. "x-api-key". Bearer auth is used when unset.
	#[serde(default)]
	pub api_key_header: Option<String>,
	#[serde(default = "default_country")]
	pub country: String,
	#[serde(default = "default_language")]
	pub language: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	#[serde(default)]
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

fn default_country() -> String {
	"us".to_string()
}

fn default_language() -> String {
	"en".to_string()
}
