use std::{collections::HashSet, time::Duration};

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::trust;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
	pub title: String,
	pub url: String,
	pub snippet: String,
	pub source_trust: f32,
}

/// Serper-compatible web search. An empty list is a valid answer.
pub async fn search(
	cfg: &dossier_config::SearchProviderConfig,
	query: &str,
	limit: u32,
) -> Result<Vec<SearchHit>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let headers = match cfg.api_key_header.as_deref() {
		Some(header) => crate::api_key_headers(header, &cfg.api_key, &cfg.default_headers)?,
		None => crate::auth_headers(&cfg.api_key, &cfg.default_headers)?,
	};
	let body = serde_json::json!({
		"q": query,
		"gl": cfg.country,
		"hl": cfg.language,
		"num": limit,
	});
	let res = client.post(url).headers(headers).json(&body).send().await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_search_response(json, limit as usize)
}

fn parse_search_response(json: Value, limit: usize) -> Result<Vec<SearchHit>> {
	if !json.is_object() {
		return Err(eyre::eyre!("Search response must be a JSON object."));
	}

	let mut hits = Vec::new();
	let mut seen = HashSet::new();

	if let Some(graph) = json.get("knowledgeGraph").and_then(|v| v.as_object()) {
		let link = graph
			.get("website")
			.or_else(|| graph.get("descriptionLink"))
			.and_then(|v| v.as_str());

		if let Some(link) = link {
			push_hit(
				&mut hits,
				&mut seen,
				link,
				graph.get("title").and_then(|v| v.as_str()).unwrap_or("Knowledge Graph"),
				graph.get("description").and_then(|v| v.as_str()).unwrap_or_default(),
			);
		}
	}

	let organic = json.get("organic").and_then(|v| v.as_array()).map(Vec::as_slice).unwrap_or(&[]);

	for item in organic {
		let Some(link) = item.get("link").and_then(|v| v.as_str()) else {
			continue;
		};

		push_hit(
			&mut hits,
			&mut seen,
			link,
			item.get("title").and_then(|v| v.as_str()).unwrap_or_default(),
			item.get("snippet").and_then(|v| v.as_str()).unwrap_or_default(),
		);
	}

	hits.truncate(limit.max(1));

	Ok(hits)
}

fn push_hit(
	hits: &mut Vec<SearchHit>,
	seen: &mut HashSet<String>,
	link: &str,
	title: &str,
	snippet: &str,
) {
	let url = link.trim();

	if !(url.starts_with("http://") || url.starts_with("https://")) || !seen.insert(url.to_string()) {
		return;
	}

	hits.push(SearchHit {
		title: title.trim().to_string(),
		url: url.to_string(),
		snippet: snippet.trim().to_string(),
		source_trust: trust::trust_for_url(url),
	});
}
