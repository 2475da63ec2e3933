//! Concurrent search for one iteration's query batch.

use std::{collections::HashSet, sync::Arc};

use time::OffsetDateTime;
use tokio::task::JoinSet;

use dossier_config::Config;
use dossier_domain::{
	model::{RunCounters, Source, SourceId},
	normalize,
};
use dossier_providers::search::SearchHit;

use crate::{Providers, retry};

/// One deduplicated search hit, ready for the extraction adapters.
#[derive(Clone, Debug, PartialEq)]
pub struct RetrievedDocument {
	pub source: Source,
	/// Title and snippet, capped to the configured document length.
	pub text: String,
}

#[derive(Clone, Debug, Default)]
pub struct Retrieval {
	pub documents: Vec<RetrievedDocument>,
	pub counters: RunCounters,
	/// Queries whose retries were exhausted, with the last error.
	pub failures: Vec<(String, String)>,
}

/// Issues every query concurrently. Failed queries contribute nothing; the rest proceed.
pub async fn retrieve(
	cfg: &Config,
	providers: &Providers,
	queries: &[String],
	iteration: u32,
) -> Retrieval {
	let mut tasks = JoinSet::new();
	let search_cfg = Arc::new(cfg.providers.search.clone());
	let retry_cfg = Arc::new(cfg.retry.clone());
	let limit = cfg.investigation.max_results_per_query;

	for (index, query) in queries.iter().enumerate() {
		let provider = providers.search.clone();
		let search_cfg = search_cfg.clone();
		let retry_cfg = retry_cfg.clone();
		let query = query.clone();

		tasks.spawn(async move {
			let result = {
				let provider = provider.as_ref();
				let search_cfg = search_cfg.as_ref();
				let query = query.as_str();

				retry::with_retry(&retry_cfg, "search", move || provider.search(search_cfg, query, limit))
					.await
			};

			(index, query, result)
		});
	}

	let mut results = Vec::with_capacity(queries.len());

	while let Some(joined) = tasks.join_next().await {
		match joined {
			Ok(result) => results.push(result),
			Err(err) => tracing::error!(error = %err, "Search task panicked or was aborted."),
		}
	}

	results.sort_by_key(|(index, _, _)| *index);

	let mut retrieval = Retrieval::default();
	let mut dedup = Dedup::default();
	let now = OffsetDateTime::now_utc();
	let max_documents = cfg.investigation.max_documents_per_iteration as usize;
	let max_chars = cfg.investigation.max_document_chars as usize;

	for (_, query, result) in results {
		let hits = match result {
			Ok(hits) => hits,
			Err(err) => {
				tracing::warn!(iteration, query = %query, error = %err, "Search failed after retries.");

				retrieval.counters.searches_failed += 1;
				retrieval.counters.degraded_calls += 1;

				retrieval.failures.push((query, err.to_string()));

				continue;
			},
		};

		tracing::debug!(iteration, query = %query, hits = hits.len(), "Search returned.");

		for hit in hits {
			if retrieval.documents.len() >= max_documents {
				break;
			}
			if !dedup.admit(&hit) {
				retrieval.counters.duplicate_documents += 1;

				continue;
			}

			let source = Source::new(&hit.url, &hit.title, &query, hit.source_trust, now, iteration);

			retrieval.documents.push(RetrievedDocument { source, text: document_text(&hit, max_chars) });
		}
	}

	retrieval.counters.documents_retrieved = retrieval.documents.len() as u32;

	retrieval
}

/// Drops repeated URLs and syndicated copies that carry the same text.
#[derive(Default)]
struct Dedup {
	urls: HashSet<SourceId>,
	digests: HashSet<blake3::Hash>,
}
impl Dedup {
	fn admit(&mut self, hit: &SearchHit) -> bool {
		if !self.urls.insert(SourceId::for_url(&hit.url)) {
			return false;
		}

		let folded = normalize::fold_text(&format!("{} {}", hit.title, hit.snippet));

		folded.is_empty() || self.digests.insert(blake3::hash(folded.as_bytes()))
	}
}

fn document_text(hit: &SearchHit, max_chars: usize) -> String {
	let text = if hit.title.is_empty() {
		hit.snippet.clone()
	} else {
		format!("{}\n{}", hit.title, hit.snippet)
	};

	match text.char_indices().nth(max_chars) {
		Some((cut, _)) => text[..cut].to_string(),
		None => text,
	}
}
