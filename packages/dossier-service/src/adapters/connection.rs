//! Connection mapper: people, organizations and events linked to the target.

use serde::Deserialize;
use serde_json::Value;

use dossier_config::Config;
use dossier_domain::{candidate::ConnectionCandidate, model::EntityType};

use crate::{
	Providers, Result,
	adapters::{self, AdapterInput, AdapterOutput},
};

const ADAPTER: &str = "connection_mapper";
const KEY: &str = "connections";

#[derive(Debug, Deserialize)]
struct RawConnection {
	subject: Option<String>,
	#[serde(alias = "relationship")]
	relation: Option<String>,
	#[serde(alias = "entity", alias = "name")]
	object: Option<String>,
	#[serde(alias = "type")]
	entity_type: Option<String>,
	timeframe: Option<String>,
	confidence: Option<f32>,
	#[serde(alias = "url", alias = "source")]
	source_url: Option<String>,
	source_index: Option<usize>,
}

pub async fn extract(
	cfg: &Config,
	providers: &Providers,
	input: AdapterInput<'_>,
) -> Result<AdapterOutput<ConnectionCandidate>> {
	let messages = build_messages(&input)?;
	let default_confidence = cfg.fusion.default_candidate_confidence;

	Ok(adapters::run(cfg, providers, ADAPTER, messages, |payload| {
		parse(payload, &input, default_confidence)
	})
	.await)
}

fn build_messages(input: &AdapterInput<'_>) -> Result<Vec<Value>> {
	let schema = serde_json::json!({
		"connections": [
			{
				"subject": "string|null (null means the target)",
				"relation": "short relation label, e.g. ceo_of, board_member, spouse",
				"object": "Name of the connected person, organization or event",
				"entity_type": "person|organization|event|other",
				"timeframe": "string|null",
				"confidence": 0.0,
				"source_url": "URL of the document the connection comes from",
				"source_index": "number|null"
			}
		]
	});
	let known: Vec<String> = input
		.snapshot
		.connections
		.iter()
		.map(|connection| format!("{} {} {}", connection.subject, connection.relation, connection.object))
		.collect();
	let system_prompt = "You are a relationship mapping engine for a due-diligence research system. \
Output must be valid JSON only and must match the provided schema exactly. \
Map the people, organizations and events the target is connected to in the given documents. \
Use a null subject for connections of the target itself. \
Keep names exactly as written and give a timeframe only when the document states one. \
If there is no connection, return an empty connections array.";
	let constraints = format!("- Already mapped: {}", Value::from(known));

	adapters::build_messages(system_prompt, &schema, &constraints, input)
}

fn parse(
	payload: &Value,
	input: &AdapterInput<'_>,
	default_confidence: f32,
) -> AdapterOutput<ConnectionCandidate> {
	adapters::parse_items(ADAPTER, payload, KEY, |raw: RawConnection| {
		let relation = adapters::non_empty(raw.relation)?;
		let object = adapters::non_empty(raw.object)?;
		let confidence = adapters::confidence(raw.confidence, default_confidence)?;
		let source = adapters::resolve_source(
			input.documents,
			raw.source_url.as_deref(),
			raw.source_index,
		)?;
		let entity_type =
			raw.entity_type.as_deref().map(EntityType::parse).unwrap_or(EntityType::Other);

		Some(ConnectionCandidate {
			subject: adapters::non_empty(raw.subject),
			relation,
			object,
			entity_type,
			timeframe: adapters::non_empty(raw.timeframe),
			confidence,
			source,
		})
	})
}

#[cfg(test)]
mod tests {
	use time::OffsetDateTime;

	use dossier_domain::model::{Investigation, Target};

	use super::*;
	use crate::adapters::test_support;

	#[test]
	fn aliases_and_optional_fields_are_accepted() {
		let snapshot = Investigation::new(Target::new("Jane Doe"), 3)
			.expect("Investigation should be valid.")
			.snapshot(OffsetDateTime::UNIX_EPOCH);
		let documents = test_support::documents(&["https://a.example/1"]);
		let input = AdapterInput { snapshot: &snapshot, documents: &documents };
		let payload = serde_json::json!([
			{ "relationship": "CEO of", "entity": "Acme Corp", "type": "company", "timeframe": "2015-2020", "confidence": 0.7, "url": "https://a.example/1" },
			{ "subject": "", "relation": "spouse", "object": "John Doe", "entity_type": "person", "source_index": 0 },
			{ "relation": "board_member", "source_index": 0 },
			{ "relation": "advisor", "object": "Beta LLC", "source_index": 3 }
		]);
		let output = parse(&payload, &input, 0.5);

		assert_eq!(output.candidates.len(), 2);
		assert_eq!(output.malformed, 2);

		let ceo = &output.candidates[0];

		assert_eq!(ceo.subject, None);
		assert_eq!(ceo.relation, "CEO of");
		assert_eq!(ceo.entity_type, EntityType::Organization);
		assert_eq!(ceo.timeframe.as_deref(), Some("2015-2020"));
		assert_eq!(output.candidates[1].subject, None);
		assert_eq!(output.candidates[1].entity_type, EntityType::Person);
	}
}
