use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use dossier_config::{Config, Error, LLM_API_KEY_ENV, SEARCH_API_KEY_ENV};

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_value() -> Value {
	toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.")
}

fn set_key(value: &mut Value, section: &[&str], key: &str, new_value: Value) {
	let mut table = value.as_table_mut().expect("Template config must be a table.");

	for name in section {
		table = table
			.get_mut(*name)
			.and_then(Value::as_table_mut)
			.unwrap_or_else(|| panic!("Template config must include [{name}]."));
	}

	table.insert(key.to_string(), new_value);
}

fn parse(value: &Value) -> Config {
	let raw = toml::to_string(value).expect("Failed to render template config.");

	toml::from_str(&raw).expect("Failed to parse config.")
}

fn validation_message(cfg: &Config) -> String {
	match dossier_config::validate(cfg) {
		Err(Error::Validation { message }) => message,
		other => panic!("Expected a validation error, got {other:?}."),
	}
}

fn write_temp_config(payload: &str) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now().duration_since(UNIX_EPOCH).expect("Clock drift.").as_nanos();
	let seq = COUNTER.fetch_add(1, Ordering::SeqCst);
	let path = env::temp_dir().join(format!("dossier_config_{nanos}_{seq}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

#[test]
fn sample_config_is_valid() {
	let cfg = parse(&sample_value());

	dossier_config::validate(&cfg).expect("Sample config must validate.");
	assert_eq!(cfg.investigation.max_iterations, 10);
	assert_eq!(cfg.providers.search.api_key_header.as_deref(), Some("x-api-key"));
}

#[test]
fn tunable_sections_fall_back_to_defaults() {
	let mut value = sample_value();
	let root = value.as_table_mut().expect("Template config must be a table.");

	for section in ["service", "investigation", "planner", "fusion", "validation", "convergence"] {
		root.remove(section);
	}

	root.remove("retry");

	let cfg = parse(&value);

	dossier_config::validate(&cfg).expect("Defaults must validate.");
	assert_eq!(cfg.investigation.queries_per_iteration, 3);
	assert_eq!(cfg.convergence.patience, 2);
	assert!((cfg.fusion.similarity_threshold - 0.85).abs() < f32::EPSILON);
	assert_eq!(cfg.service.output_dir, PathBuf::from("output"));
}

#[test]
fn rejects_zero_iteration_budget() {
	let mut value = sample_value();

	set_key(&mut value, &["investigation"], "max_iterations", Value::Integer(0));

	assert_eq!(
		validation_message(&parse(&value)),
		"investigation.max_iterations must be greater than zero."
	);
}

#[test]
fn rejects_out_of_range_fusion_weight() {
	let mut value = sample_value();

	set_key(&mut value, &["fusion"], "corroboration_weight", Value::Float(1.5));

	assert_eq!(
		validation_message(&parse(&value)),
		"fusion.corroboration_weight must be in the range 0.0-1.0."
	);
}

#[test]
fn rejects_zero_contradiction_floor() {
	let mut value = sample_value();

	set_key(&mut value, &["fusion"], "min_confidence", Value::Float(0.0));

	assert_eq!(
		validation_message(&parse(&value)),
		"fusion.min_confidence must be greater than zero."
	);
}

#[test]
fn rejects_family_threshold_above_similarity_threshold() {
	let mut value = sample_value();

	set_key(&mut value, &["fusion"], "family_threshold", Value::Float(0.9));

	assert_eq!(
		validation_message(&parse(&value)),
		"fusion.family_threshold must not exceed fusion.similarity_threshold."
	);
}

#[test]
fn rejects_inverted_tier_thresholds() {
	let mut value = sample_value();

	set_key(&mut value, &["validation"], "medium_confidence", Value::Float(0.8));

	assert_eq!(
		validation_message(&parse(&value)),
		"validation.medium_confidence must not exceed validation.high_confidence."
	);
}

#[test]
fn rejects_inverted_backoff_bounds() {
	let mut value = sample_value();

	set_key(&mut value, &["retry"], "base_backoff_ms", Value::Integer(10_000));

	assert_eq!(
		validation_message(&parse(&value)),
		"retry.base_backoff_ms must not exceed retry.max_backoff_ms."
	);
}

#[test]
fn missing_api_key_reports_env_fallback() {
	let mut value = sample_value();

	set_key(&mut value, &["providers", "search"], "api_key", Value::String("  ".to_string()));

	let mut cfg = parse(&value);

	dossier_config::normalize(&mut cfg, |_| None);

	let err = dossier_config::validate(&cfg).expect_err("Expected missing secret.");

	assert!(matches!(err, Error::MissingSecret { env: name, .. } if name == SEARCH_API_KEY_ENV));
	assert!(err.to_string().contains(SEARCH_API_KEY_ENV));
}

#[test]
fn normalize_fills_api_keys_from_lookup() {
	let mut value = sample_value();

	set_key(&mut value, &["providers", "search"], "api_key", Value::String(String::new()));
	set_key(&mut value, &["providers", "llm_extractor"], "api_key", Value::String(String::new()));

	let mut cfg = parse(&value);

	dossier_config::normalize(&mut cfg, |key| match key {
		SEARCH_API_KEY_ENV => Some(" from-env-search ".to_string()),
		LLM_API_KEY_ENV => Some("from-env-llm".to_string()),
		_ => None,
	});

	assert_eq!(cfg.providers.search.api_key, "from-env-search");
	assert_eq!(cfg.providers.llm_extractor.api_key, "from-env-llm");
	dossier_config::validate(&cfg).expect("Filled config must validate.");
}

#[test]
fn normalize_drops_blank_api_key_header() {
	let mut value = sample_value();

	set_key(
		&mut value,
		&["providers", "search"],
		"api_key_header",
		Value::String(" ".to_string()),
	);

	let mut cfg = parse(&value);

	dossier_config::normalize(&mut cfg, |_| None);

	assert!(cfg.providers.search.api_key_header.is_none());
}

#[test]
fn load_reads_and_validates_file() {
	let path = write_temp_config(SAMPLE_CONFIG_TEMPLATE_TOML);
	let cfg = dossier_config::load(&path).expect("Failed to load config.");

	assert_eq!(cfg.providers.llm_extractor.model, "llama-3.3-70b-versatile");

	fs::remove_file(path).ok();
}

#[test]
fn load_reports_parse_errors_with_path() {
	let path = write_temp_config("[investigation\nmax_iterations = 3");
	let err = dossier_config::load(&path).expect_err("Expected parse failure.");

	assert!(matches!(err, Error::ParseConfig { .. }));
	assert!(err.to_string().contains("dossier_config_"));

	fs::remove_file(path).ok();
}
