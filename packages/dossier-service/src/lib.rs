//! Async orchestration of an investigation: retrieval, extraction, fusion, convergence.

pub mod adapters;
pub mod audit;
pub mod investigate;
pub mod retrieval;
pub mod retry;

mod error;

pub use error::{Error, Result};
pub use investigate::{CancelToken, InvestigateRequest};

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;

use dossier_config::{Config, LlmProviderConfig, SearchProviderConfig};
use dossier_providers::{
	extractor,
	search::{self, SearchHit},
};

use crate::audit::{AuditSink, NullSink};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait SearchProvider
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		cfg: &'a SearchProviderConfig,
		query: &'a str,
		limit: u32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<SearchHit>>>;
}

pub trait ExtractorProvider
where
	Self: Send + Sync,
{
	fn extract<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<Value>>;
}

#[derive(Clone)]
pub struct Providers {
	pub search: Arc<dyn SearchProvider>,
	pub extractor: Arc<dyn ExtractorProvider>,
}
impl Providers {
	pub fn new(search: Arc<dyn SearchProvider>, extractor: Arc<dyn ExtractorProvider>) -> Self {
		Self { search, extractor }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { search: provider.clone(), extractor: provider }
	}
}

pub struct DossierService {
	pub cfg: Config,
	pub providers: Providers,
	pub audit: Arc<dyn AuditSink>,
}
impl DossierService {
	pub fn new(cfg: Config) -> Self {
		Self::with_providers(cfg, Providers::default())
	}

	pub fn with_providers(cfg: Config, providers: Providers) -> Self {
		Self { cfg, providers, audit: Arc::new(NullSink) }
	}

	pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
		self.audit = audit;

		self
	}
}

struct DefaultProviders;
impl SearchProvider for DefaultProviders {
	fn search<'a>(
		&'a self,
		cfg: &'a SearchProviderConfig,
		query: &'a str,
		limit: u32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<SearchHit>>> {
		Box::pin(search::search(cfg, query, limit))
	}
}
impl ExtractorProvider for DefaultProviders {
	fn extract<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<Value>> {
		Box::pin(extractor::extract(cfg, messages))
	}
}
