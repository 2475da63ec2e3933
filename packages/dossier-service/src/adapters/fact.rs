//! Fact extractor: discrete, verifiable statements about the target.

use serde::Deserialize;

use dossier_config::Config;
use dossier_domain::{
	candidate::FindingCandidate,
	model::FindingCategory,
};

use crate::{
	Providers, Result,
	adapters::{self, AdapterInput, AdapterOutput},
};

const ADAPTER: &str = "fact_extractor";
const KEY: &str = "findings";

#[derive(Debug, Deserialize)]
struct RawFinding {
	#[serde(alias = "fact", alias = "text")]
	statement: Option<String>,
	category: Option<String>,
	confidence: Option<f32>,
	#[serde(alias = "url", alias = "source")]
	source_url: Option<String>,
	source_index: Option<usize>,
}

pub async fn extract(
	cfg: &Config,
	providers: &Providers,
	input: AdapterInput<'_>,
) -> Result<AdapterOutput<FindingCandidate>> {
	let messages = build_messages(&input)?;
	let default_confidence = cfg.fusion.default_candidate_confidence;

	Ok(adapters::run(cfg, providers, ADAPTER, messages, |payload| {
		parse(payload, &input, default_confidence)
	})
	.await)
}

fn build_messages(input: &AdapterInput<'_>) -> Result<Vec<serde_json::Value>> {
	let schema = serde_json::json!({
		"findings": [
			{
				"statement": "One self-contained English sentence about the target",
				"category": "biography|professional|association|other",
				"confidence": 0.0,
				"source_url": "URL of the document the statement comes from",
				"source_index": "number|null"
			}
		]
	});
	let known: Vec<&str> =
		input.snapshot.findings.iter().map(|finding| finding.statement.as_str()).collect();
	let system_prompt = "You are a fact extraction engine for a due-diligence research system. \
Output must be valid JSON only and must match the provided schema exactly. \
Extract discrete, verifiable facts about the target person from the given documents. \
Each statement must be a single sentence that names the target and keeps dates, places, amounts and titles exactly as written. \
Every fact must cite the document it was taken from. \
Confidence reflects how directly the document supports the statement, from 0.0 to 1.0. \
Ignore facts about other people with a similar name. \
If the documents contain nothing about the target, return an empty findings array.";
	let constraints = format!(
		"- Skip statements already known unless a document adds a detail: {}",
		serde_json::Value::from(known)
	);

	adapters::build_messages(system_prompt, &schema, &constraints, input)
}

fn parse(
	payload: &serde_json::Value,
	input: &AdapterInput<'_>,
	default_confidence: f32,
) -> AdapterOutput<FindingCandidate> {
	adapters::parse_items(ADAPTER, payload, KEY, |raw: RawFinding| {
		let statement = adapters::non_empty(raw.statement)?;
		let confidence = adapters::confidence(raw.confidence, default_confidence)?;
		let source = adapters::resolve_source(
			input.documents,
			raw.source_url.as_deref(),
			raw.source_index,
		)?;
		let category =
			raw.category.as_deref().map(FindingCategory::parse).unwrap_or(FindingCategory::Other);

		Some(FindingCandidate { statement, category, confidence, source })
	})
}
