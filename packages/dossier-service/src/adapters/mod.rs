//! The three extraction passes. Each turns retrieved text plus the current snapshot into
//! typed candidates; nothing here touches the investigation itself.

pub mod connection;
pub mod fact;
pub mod risk;

use serde::de::DeserializeOwned;
use serde_json::Value;

use dossier_config::Config;
use dossier_domain::{model::SourceId, snapshot::InvestigationSnapshot};

use crate::{Error, Providers, Result, retrieval::RetrievedDocument, retry};

/// What every adapter reads: an immutable snapshot and the iteration's documents.
#[derive(Clone, Copy, Debug)]
pub struct AdapterInput<'a> {
	pub snapshot: &'a InvestigationSnapshot,
	pub documents: &'a [RetrievedDocument],
}

#[derive(Clone, Debug, PartialEq)]
pub struct AdapterOutput<T> {
	pub candidates: Vec<T>,
	/// Items dropped by schema validation.
	pub malformed: u32,
	/// The extractor call failed after all retries.
	pub degraded: bool,
}
impl<T> AdapterOutput<T> {
	pub(crate) fn degraded() -> Self {
		Self { candidates: Vec::new(), malformed: 0, degraded: true }
	}
}

/// Calls the extractor with retries and hands the payload to `parse`.
/// Exhausted retries yield an empty, degraded output.
pub(crate) async fn run<T>(
	cfg: &Config,
	providers: &Providers,
	adapter: &'static str,
	messages: Vec<Value>,
	parse: impl FnOnce(&Value) -> AdapterOutput<T>,
) -> AdapterOutput<T> {
	let extractor = providers.extractor.as_ref();
	let llm = &cfg.providers.llm_extractor;
	let messages = messages.as_slice();
	let result =
		retry::with_retry(&cfg.retry, adapter, move || extractor.extract(llm, messages)).await;

	match result {
		Ok(payload) => parse(&payload),
		Err(err) => {
			tracing::warn!(adapter, error = %err, "Extractor degraded after retries.");

			AdapterOutput::degraded()
		},
	}
}

pub(crate) fn build_messages(
	system_prompt: &str,
	schema: &Value,
	constraints: &str,
	input: &AdapterInput<'_>,
) -> Result<Vec<Value>> {
	let target = &input.snapshot.target;
	let documents: Vec<Value> = input
		.documents
		.iter()
		.enumerate()
		.map(|(index, document)| {
			serde_json::json!({
				"index": index,
				"url": document.source.url,
				"text": document.text,
			})
		})
		.collect();
	let documents_json = serde_json::to_string(&documents).map_err(|_| Error::InvalidRequest {
		message: "Failed to serialize documents for extractor.".to_string(),
	})?;
	let target_json = serde_json::to_string(target).map_err(|_| Error::InvalidRequest {
		message: "Failed to serialize target for extractor.".to_string(),
	})?;
	let user_prompt = format!(
		"Return JSON matching this exact schema:\n{schema}\nConstraints:\n{constraints}\nThe target:\n{target_json}\nHere are the documents as JSON:\n{documents_json}"
	);

	Ok(vec![
		serde_json::json!({ "role": "system", "content": system_prompt }),
		serde_json::json!({ "role": "user", "content": user_prompt }),
	])
}

/// Accepts `{ "<key>": [...] }` or a bare array. Anything else is uninterpretable.
pub(crate) fn items<'a>(payload: &'a Value, key: &str) -> Option<&'a [Value]> {
	match payload {
		Value::Array(items) => Some(items),
		Value::Object(map) => map.get(key).and_then(Value::as_array).map(Vec::as_slice),
		_ => None,
	}
}

/// Deserializes every item on its own so one bad item never sinks the rest.
pub(crate) fn parse_items<R, T>(
	adapter: &str,
	payload: &Value,
	key: &str,
	mut convert: impl FnMut(R) -> Option<T>,
) -> AdapterOutput<T>
where
	R: DeserializeOwned,
{
	let Some(items) = items(payload, key) else {
		tracing::warn!(adapter, "Extractor payload has no usable item list.");

		return AdapterOutput { candidates: Vec::new(), malformed: 1, degraded: false };
	};
	let mut output = AdapterOutput { candidates: Vec::new(), malformed: 0, degraded: false };

	for (index, item) in items.iter().enumerate() {
		let candidate = serde_json::from_value::<R>(item.clone()).ok().and_then(&mut convert);

		match candidate {
			Some(candidate) => output.candidates.push(candidate),
			None => {
				tracing::warn!(adapter, index, "Dropped malformed candidate.");

				output.malformed += 1;
			},
		}
	}

	output
}

/// Resolves a candidate's source by URL first, then by document index.
pub(crate) fn resolve_source(
	documents: &[RetrievedDocument],
	url: Option<&str>,
	index: Option<usize>,
) -> Option<SourceId> {
	if let Some(url) = url.map(str::trim).filter(|url| !url.is_empty()) {
		let id = SourceId::for_url(url);

		return documents.iter().find(|document| document.source.id == id).map(|_| id);
	}

	index.and_then(|index| documents.get(index)).map(|document| document.source.id)
}

/// A confidence in `[0, 1]`, the default when absent, `None` when out of range.
pub(crate) fn confidence(raw: Option<f32>, default: f32) -> Option<f32> {
	match raw {
		None => Some(default),
		Some(value) if (0.0..=1.0).contains(&value) => Some(value),
		Some(_) => None,
	}
}

pub(crate) fn non_empty(raw: Option<String>) -> Option<String> {
	raw.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

#[cfg(test)]
pub(crate) mod test_support {
	use time::OffsetDateTime;

	use dossier_domain::model::Source;

	use crate::retrieval::RetrievedDocument;

	pub(crate) fn documents(urls: &[&str]) -> Vec<RetrievedDocument> {
		urls.iter()
			.map(|url| RetrievedDocument {
				source: Source::new(url, "Title", "query", 0.6, OffsetDateTime::UNIX_EPOCH, 1),
				text: "Jane Doe is the CEO of Acme Corp.".to_string(),
			})
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn items_accepts_keyed_objects_and_bare_arrays() {
		let keyed = serde_json::json!({ "findings": [1, 2] });
		let bare = serde_json::json!([1]);
		let wrong_key = serde_json::json!({ "risks": [1] });

		assert_eq!(items(&keyed, "findings").map(<[Value]>::len), Some(2));
		assert_eq!(items(&bare, "findings").map(<[Value]>::len), Some(1));
		assert!(items(&wrong_key, "findings").is_none());
		assert!(items(&Value::String("x".to_string()), "findings").is_none());
	}

	#[test]
	fn sources_resolve_by_url_then_index() {
		let documents = test_support::documents(&["https://a.example/1", "https://b.example/2"]);

		assert_eq!(
			resolve_source(&documents, Some(" https://b.example/2 "), None),
			Some(documents[1].source.id)
		);
		assert_eq!(resolve_source(&documents, None, Some(0)), Some(documents[0].source.id));
		assert_eq!(resolve_source(&documents, Some("https://c.example/"), Some(0)), None);
		assert_eq!(resolve_source(&documents, None, Some(5)), None);
	}

	#[test]
	fn confidence_rejects_out_of_range_values() {
		assert_eq!(confidence(None, 0.5), Some(0.5));
		assert_eq!(confidence(Some(0.9), 0.5), Some(0.9));
		assert_eq!(confidence(Some(1.5), 0.5), None);
		assert_eq!(confidence(Some(-0.1), 0.5), None);
	}
}
