use std::{sync::LazyLock, time::Duration};

use color_eyre::{Result, eyre};
use regex::Regex;
use reqwest::{Client, header::HeaderMap};
use serde_json::Value;

/// Model output wrapped in a Markdown code fence.
static CODE_FENCE: LazyLock<Option<Regex>> =
	LazyLock::new(|| Regex::new(r"(?s)^\s*```[A-Za-z]*\s*(.*?)\s*```\s*$").ok());

const PARSE_ATTEMPTS: usize = 3;

/// Chat-completion call whose reply must be JSON. Unparseable replies are re-requested, and the
/// last parse failure is returned once every attempt is spent.
pub async fn extract(cfg: &dossier_config::LlmProviderConfig, messages: &[Value]) -> Result<Value> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let headers = crate::auth_headers(&cfg.api_key, &cfg.default_headers)?;
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": messages,
	});
	let mut last_err = eyre::eyre!("Extractor made no attempts.");

	for attempt in 1..=PARSE_ATTEMPTS {
		let reply = request_completion(&client, &url, &headers, &body).await?;

		match parse_extractor_json(reply) {
			Ok(parsed) => return Ok(parsed),
			Err(err) => last_err = err.wrap_err(format!("Attempt {attempt} of {PARSE_ATTEMPTS}.")),
		}
	}

	Err(last_err.wrap_err("Extractor response is not valid JSON."))
}

async fn request_completion(
	client: &Client,
	url: &str,
	headers: &HeaderMap,
	body: &Value,
) -> Result<Value> {
	let res = client.post(url).headers(headers.clone()).json(body).send().await?;

	Ok(res.error_for_status()?.json().await?)
}

fn parse_extractor_json(json: Value) -> Result<Value> {
	if let Some(content) = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
	{
		let parsed: Value = serde_json::from_str(strip_code_fence(content))
			.map_err(|_| eyre::eyre!("Extractor content is not valid JSON."))?;

		return Ok(parsed);
	}

	if json.is_object() || json.is_array() {
		return Ok(json);
	}

	Err(eyre::eyre!("Extractor response is missing JSON content."))
}

fn strip_code_fence(content: &str) -> &str {
	CODE_FENCE
		.as_ref()
		.and_then(|re| re.captures(content))
		.and_then(|caps| caps.get(1))
		.map_or_else(|| content.trim(), |m| m.as_str())
}
