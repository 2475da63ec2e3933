mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, Convergence, Fusion, Investigation, LlmProviderConfig, Planner, Providers, Retry,
	SearchProviderConfig, Service, Validation,
};

use std::{env, fs, path::Path};

pub const SEARCH_API_KEY_ENV: &str = "DOSSIER_SEARCH_API_KEY";
pub const LLM_API_KEY_ENV: &str = "DOSSIER_LLM_API_KEY";

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg, |key| env::var(key).ok());

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.investigation.max_iterations == 0 {
		return Err(Error::Validation {
			message: "investigation.max_iterations must be greater than zero.".to_string(),
		});
	}

	for (label, value) in [
		("investigation.queries_per_iteration", cfg.investigation.queries_per_iteration),
		("investigation.max_results_per_query", cfg.investigation.max_results_per_query),
		(
			"investigation.max_documents_per_iteration",
			cfg.investigation.max_documents_per_iteration,
		),
		("investigation.max_document_chars", cfg.investigation.max_document_chars),
		("planner.min_corroboration", cfg.planner.min_corroboration),
		("validation.min_independent_sources", cfg.validation.min_independent_sources),
		("convergence.patience", cfg.convergence.patience),
		("retry.max_attempts", cfg.retry.max_attempts),
	] {
		if value == 0 {
			return Err(Error::Validation { message: format!("{label} must be greater than zero.") });
		}
	}

	for (label, value) in [
		("planner.low_confidence", cfg.planner.low_confidence),
		("fusion.corroboration_weight", cfg.fusion.corroboration_weight),
		("fusion.contradiction_penalty", cfg.fusion.contradiction_penalty),
		("fusion.min_confidence", cfg.fusion.min_confidence),
		("fusion.family_threshold", cfg.fusion.family_threshold),
		("fusion.similarity_threshold", cfg.fusion.similarity_threshold),
		("fusion.default_candidate_confidence", cfg.fusion.default_candidate_confidence),
		("validation.high_confidence", cfg.validation.high_confidence),
		("validation.medium_confidence", cfg.validation.medium_confidence),
		("convergence.verified_fraction_saturation", cfg.convergence.verified_fraction_saturation),
		(
			"convergence.narrow_low_confidence_fraction",
			cfg.convergence.narrow_low_confidence_fraction,
		),
	] {
		check_unit_range(label, value)?;
	}

	if cfg.fusion.min_confidence <= 0.0 {
		return Err(Error::Validation {
			message: "fusion.min_confidence must be greater than zero.".to_string(),
		});
	}
	if cfg.fusion.family_threshold <= 0.0 {
		return Err(Error::Validation {
			message: "fusion.family_threshold must be greater than zero.".to_string(),
		});
	}
	if cfg.fusion.family_threshold > cfg.fusion.similarity_threshold {
		return Err(Error::Validation {
			message: "fusion.family_threshold must not exceed fusion.similarity_threshold."
				.to_string(),
		});
	}
	if cfg.validation.medium_confidence > cfg.validation.high_confidence {
		return Err(Error::Validation {
			message: "validation.medium_confidence must not exceed validation.high_confidence."
				.to_string(),
		});
	}
	if !cfg.validation.recency_half_life_days.is_finite()
		|| cfg.validation.recency_half_life_days <= 0.0
	{
		return Err(Error::Validation {
			message: "validation.recency_half_life_days must be a finite number greater than zero."
				.to_string(),
		});
	}
	if cfg.retry.base_backoff_ms > cfg.retry.max_backoff_ms {
		return Err(Error::Validation {
			message: "retry.base_backoff_ms must not exceed retry.max_backoff_ms.".to_string(),
		});
	}
	if cfg.retry.call_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "retry.call_timeout_ms must be greater than zero.".to_string(),
		});
	}

	for (label, value) in [
		("providers.search.api_base", &cfg.providers.search.api_base),
		("providers.llm_extractor.api_base", &cfg.providers.llm_extractor.api_base),
		("providers.llm_extractor.model", &cfg.providers.llm_extractor.model),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if cfg.providers.search.api_key.trim().is_empty() {
		return Err(Error::MissingSecret {
			key: "providers.search.api_key",
			env: SEARCH_API_KEY_ENV,
		});
	}
	if cfg.providers.llm_extractor.api_key.trim().is_empty() {
		return Err(Error::MissingSecret {
			key: "providers.llm_extractor.api_key",
			env: LLM_API_KEY_ENV,
		});
	}
	if cfg.providers.search.timeout_ms == 0 || cfg.providers.llm_extractor.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "Provider timeout_ms must be greater than zero.".to_string(),
		});
	}
	if !cfg.providers.llm_extractor.temperature.is_finite()
		|| cfg.providers.llm_extractor.temperature < 0.0
	{
		return Err(Error::Validation {
			message: "providers.llm_extractor.temperature must be a finite number zero or greater."
				.to_string(),
		});
	}

	Ok(())
}

/// Trims free-form fields and fills empty API keys from the environment lookup.
pub fn normalize<F>(cfg: &mut Config, lookup_env: F)
where
	F: Fn(&str) -> Option<String>,
{
	cfg.service.log_level = cfg.service.log_level.trim().to_string();
	cfg.providers.search.api_key = cfg.providers.search.api_key.trim().to_string();
	cfg.providers.llm_extractor.api_key = cfg.providers.llm_extractor.api_key.trim().to_string();

	if cfg
		.providers
		.search
		.api_key_header
		.as_deref()
		.map(|header| header.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.providers.search.api_key_header = None;
	}
	if cfg.providers.search.api_key.is_empty()
		&& let Some(key) = lookup_env(SEARCH_API_KEY_ENV)
	{
		cfg.providers.search.api_key = key.trim().to_string();
	}
	if cfg.providers.llm_extractor.api_key.is_empty()
		&& let Some(key) = lookup_env(LLM_API_KEY_ENV)
	{
		cfg.providers.llm_extractor.api_key = key.trim().to_string();
	}
}

fn check_unit_range(label: &str, value: f32) -> Result<()> {
	if !value.is_finite() {
		return Err(Error::Validation { message: format!("{label} must be a finite number.") });
	}
	if !(0.0..=1.0).contains(&value) {
		return Err(Error::Validation {
			message: format!("{label} must be in the range 0.0-1.0."),
		});
	}

	Ok(())
}
