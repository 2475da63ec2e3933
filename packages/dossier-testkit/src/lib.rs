//! Fixtures shared by the workspace test suites.

use std::path::PathBuf;

use serde_json::Map;
use time::{Duration, OffsetDateTime};

use dossier_config::{
	Config, Convergence, Fusion, Investigation, LlmProviderConfig, Planner, Providers, Retry,
	SearchProviderConfig, Service, Validation,
};
use dossier_domain::{
	candidate::{CandidateBatch, ConnectionCandidate, FindingCandidate, RiskCandidate},
	model::{EntityType, FindingCategory, Source},
};

/// A fixed instant so recency decay is deterministic in tests.
pub fn fixed_now() -> OffsetDateTime {
	OffsetDateTime::UNIX_EPOCH + Duration::days(20_000)
}

pub fn sample_config() -> Config {
	Config {
		service: Service { log_level: "info".to_string(), output_dir: PathBuf::from("output") },
		investigation: Investigation {
			max_iterations: 3,
			queries_per_iteration: 3,
			max_results_per_query: 5,
			max_documents_per_iteration: 20,
			max_document_chars: 800,
		},
		planner: Planner::default(),
		fusion: Fusion::default(),
		validation: Validation::default(),
		convergence: Convergence::default(),
		retry: Retry { max_attempts: 2, base_backoff_ms: 1, max_backoff_ms: 4, call_timeout_ms: 1_000 },
		providers: Providers {
			search: SearchProviderConfig {
				provider_id: "test-search".to_string(),
				api_base: "http://localhost".to_string(),
				api_key: "search-key".to_string(),
				path: "/search".to_string(),
				api_key_header: Some("x-api-key".to_string()),
				country: "us".to_string(),
				language: "en".to_string(),
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			llm_extractor: LlmProviderConfig {
				provider_id: "test-llm".to_string(),
				api_base: "http://localhost".to_string(),
				api_key: "llm-key".to_string(),
				path: "/chat/completions".to_string(),
				model: "m".to_string(),
				temperature: 0.1,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
		},
	}
}

pub fn source(url: &str, trust: f32) -> Source {
	Source::new(url, url, "fixture", trust, fixed_now(), 1)
}

pub fn finding(
	statement: &str,
	category: FindingCategory,
	confidence: f32,
	source: &Source,
) -> FindingCandidate {
	FindingCandidate { statement: statement.to_string(), category, confidence, source: source.id }
}

pub fn risk(
	category: &str,
	description: &str,
	severity: f32,
	evidence: &[&str],
	source: &Source,
) -> RiskCandidate {
	RiskCandidate {
		category: category.to_string(),
		description: description.to_string(),
		severity,
		evidence: evidence.iter().map(|item| item.to_string()).collect(),
		confidence: 0.6,
		source: source.id,
	}
}

pub fn connection(
	relation: &str,
	object: &str,
	entity_type: EntityType,
	confidence: f32,
	source: &Source,
) -> ConnectionCandidate {
	ConnectionCandidate {
		subject: None,
		relation: relation.to_string(),
		object: object.to_string(),
		entity_type,
		timeframe: None,
		confidence,
		source: source.id,
	}
}

/// A batch carrying `sources` and `findings` only.
pub fn batch(sources: &[&Source], findings: Vec<FindingCandidate>) -> CandidateBatch {
	CandidateBatch {
		sources: sources.iter().map(|source| (*source).clone()).collect(),
		findings,
		..CandidateBatch::default()
	}
}
