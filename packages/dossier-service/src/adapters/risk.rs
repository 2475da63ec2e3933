//! Risk analyzer: legal, financial, reputational and similar red flags.

use serde::Deserialize;
use serde_json::Value;

use dossier_config::Config;
use dossier_domain::candidate::RiskCandidate;

use crate::{
	Providers, Result,
	adapters::{self, AdapterInput, AdapterOutput},
};

const ADAPTER: &str = "risk_analyzer";
const KEY: &str = "risks";
const MAX_SEVERITY: f32 = 10.0;

#[derive(Debug, Deserialize)]
struct RawRisk {
	#[serde(alias = "type")]
	category: Option<String>,
	description: Option<String>,
	severity: Option<f32>,
	#[serde(default)]
	evidence: Vec<String>,
	confidence: Option<f32>,
	#[serde(alias = "url", alias = "source")]
	source_url: Option<String>,
	source_index: Option<usize>,
}

pub async fn extract(
	cfg: &Config,
	providers: &Providers,
	input: AdapterInput<'_>,
) -> Result<AdapterOutput<RiskCandidate>> {
	let messages = build_messages(&input)?;
	let default_confidence = cfg.fusion.default_candidate_confidence;

	Ok(adapters::run(cfg, providers, ADAPTER, messages, |payload| {
		parse(payload, &input, default_confidence)
	})
	.await)
}

fn build_messages(input: &AdapterInput<'_>) -> Result<Vec<Value>> {
	let schema = serde_json::json!({
		"risks": [
			{
				"category": "legal|financial|regulatory|reputational|other",
				"description": "One English sentence describing the risk",
				"severity": 0.0,
				"evidence": ["Known finding statement or quote supporting the risk"],
				"confidence": 0.0,
				"source_url": "URL of the document the risk comes from",
				"source_index": "number|null"
			}
		]
	});
	let known: Vec<&str> =
		input.snapshot.findings.iter().map(|finding| finding.statement.as_str()).collect();
	let system_prompt = "You are a risk analysis engine for a due-diligence research system. \
Output must be valid JSON only and must match the provided schema exactly. \
Identify legal, financial, regulatory and reputational red flags concerning the target in the given documents. \
Severity ranges from 0.0 (negligible) to 10.0 (critical). \
Evidence entries should repeat a known finding statement verbatim when one supports the risk, otherwise quote the document. \
Do not speculate beyond what the documents state. \
If there is no risk, return an empty risks array.";
	let constraints = format!(
		"- Severity must be within [0, {MAX_SEVERITY}]\n- Known findings: {}",
		Value::from(known)
	);

	adapters::build_messages(system_prompt, &schema, &constraints, input)
}

fn parse(payload: &Value, input: &AdapterInput<'_>, default_confidence: f32) -> AdapterOutput<RiskCandidate> {
	adapters::parse_items(ADAPTER, payload, KEY, |raw: RawRisk| {
		let category = adapters::non_empty(raw.category)?;
		let description = adapters::non_empty(raw.description)?;
		let severity = raw.severity.filter(|severity| (0.0..=MAX_SEVERITY).contains(severity))?;
		let confidence = adapters::confidence(raw.confidence, default_confidence)?;
		let source = adapters::resolve_source(
			input.documents,
			raw.source_url.as_deref(),
			raw.source_index,
		)?;
		let evidence = raw
			.evidence
			.into_iter()
			.map(|item| item.trim().to_string())
			.filter(|item| !item.is_empty())
			.collect();

		Some(RiskCandidate { category, description, severity, evidence, confidence, source })
	})
}
