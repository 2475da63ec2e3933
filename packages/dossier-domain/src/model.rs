use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Error, Result, normalize,
	snapshot::{InvestigationSnapshot, ReportSummary},
	validator::ValidationMetrics,
};

/// Stable identity of a retrieved document, derived from its URL.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(pub Uuid);
impl SourceId {
	pub fn for_url(url: &str) -> Self {
		Self(Uuid::new_v5(&Uuid::NAMESPACE_URL, url.trim().as_bytes()))
	}
}

/// Shared by every entity that takes part in one contradiction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConflictGroupId(pub Uuid);
impl ConflictGroupId {
	pub fn for_family(family: &str) -> Self {
		Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, family.as_bytes()))
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvestigationStatus {
	Running,
	Converged,
	Exhausted,
	Failed,
}
impl InvestigationStatus {
	pub fn is_terminal(self) -> bool {
		!matches!(self, Self::Running)
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationTier {
	Low,
	Medium,
	High,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingCategory {
	Biography,
	Professional,
	Association,
	Other,
}
impl FindingCategory {
	pub const GAP_CATEGORIES: [Self; 3] = [Self::Biography, Self::Professional, Self::Association];

	/// Lenient mapping of model output; anything unrecognized is `Other`.
	pub fn parse(raw: &str) -> Self {
		match normalize::fold_text(raw).as_str() {
			"biography" | "biographical" | "personal" | "background" | "education" => Self::Biography,
			"professional" | "career" | "employment" | "work" => Self::Professional,
			"association" | "associations" | "affiliation" | "relationship" => Self::Association,
			_ => Self::Other,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Biography => "biography",
			Self::Professional => "professional",
			Self::Association => "association",
			Self::Other => "other",
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
	Person,
	Organization,
	Event,
	Other,
}
impl EntityType {
	pub fn parse(raw: &str) -> Self {
		match normalize::fold_text(raw).as_str() {
			"person" | "people" | "individual" => Self::Person,
			"organization" | "organisation" | "company" | "institution" => Self::Organization,
			"event" => Self::Event,
			_ => Self::Other,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
	Finding,
	Risk,
	Connection,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub context: Option<String>,
	#[serde(default)]
	pub aliases: Vec<String>,
}
impl Target {
	pub fn new(name: impl Into<String>) -> Self {
		Self { name: name.into(), context: None, aliases: Vec::new() }
	}

	pub fn with_context(mut self, context: impl Into<String>) -> Self {
		self.context = Some(context.into());

		self
	}

	pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
		self.aliases.push(alias.into());

		self
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Source {
	pub id: SourceId,
	pub url: String,
	/// Publisher host used to judge independence.
	pub origin: String,
	pub title: String,
	pub query: String,
	/// Domain-derived reliability in `[0, 1]`.
	pub trust: f32,
	#[serde(with = "crate::time_serde")]
	pub retrieved_at: OffsetDateTime,
	pub iteration: u32,
}
impl Source {
	pub fn new(
		url: &str,
		title: &str,
		query: &str,
		trust: f32,
		retrieved_at: OffsetDateTime,
		iteration: u32,
	) -> Self {
		Self {
			id: SourceId::for_url(url),
			url: url.trim().to_string(),
			origin: normalize::origin_of(url),
			title: title.trim().to_string(),
			query: query.to_string(),
			trust: normalize::clamp_unit(trust),
			retrieved_at,
			iteration,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Finding {
	pub key: String,
	pub statement: String,
	pub category: FindingCategory,
	pub confidence: f32,
	pub tier: VerificationTier,
	pub sources: Vec<SourceId>,
	pub contradicted: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub conflict_group: Option<ConflictGroupId>,
	pub first_seen: u32,
	pub last_updated: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Risk {
	pub key: String,
	pub category: String,
	pub description: String,
	/// Clamped to `[0, 10]`; the highest severity ever observed.
	pub severity: f32,
	/// Keys of the findings backing this risk.
	pub evidence: Vec<String>,
	/// Evidence text that matched no finding.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub evidence_notes: Vec<String>,
	pub confidence: f32,
	pub tier: VerificationTier,
	pub sources: Vec<SourceId>,
	pub contradicted: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub conflict_group: Option<ConflictGroupId>,
	pub first_seen: u32,
	pub last_updated: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Connection {
	pub key: String,
	pub subject: String,
	pub relation: String,
	pub object: String,
	pub entity_type: EntityType,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub timeframe: Option<String>,
	pub confidence: f32,
	pub tier: VerificationTier,
	pub sources: Vec<SourceId>,
	pub first_seen: u32,
	pub last_updated: u32,
}

pub trait Keyed {
	fn key(&self) -> &str;
}
impl Keyed for Finding {
	fn key(&self) -> &str {
		&self.key
	}
}
impl Keyed for Risk {
	fn key(&self) -> &str {
		&self.key
	}
}
impl Keyed for Connection {
	fn key(&self) -> &str {
		&self.key
	}
}

/// Insertion-ordered entries with a unique key index. Fuzzy merges add alias keys.
#[derive(Clone, Debug)]
pub struct Ledger<T> {
	entries: Vec<T>,
	index: HashMap<String, usize>,
}
impl<T> Default for Ledger<T> {
	fn default() -> Self {
		Self { entries: Vec::new(), index: HashMap::new() }
	}
}
impl<T> Ledger<T>
where
	T: Keyed,
{
	pub fn get(&self, key: &str) -> Option<&T> {
		self.position(key).and_then(|idx| self.entries.get(idx))
	}

	pub fn position(&self, key: &str) -> Option<usize> {
		self.index.get(key).copied()
	}

	pub fn iter(&self) -> std::slice::Iter<'_, T> {
		self.entries.iter()
	}

	pub fn as_slice(&self) -> &[T] {
		&self.entries
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub(crate) fn entry_mut(&mut self, idx: usize) -> Option<&mut T> {
		self.entries.get_mut(idx)
	}

	pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
		self.entries.iter_mut()
	}

	/// Callers check the key is absent first; an existing key is returned untouched.
	pub(crate) fn insert(&mut self, entry: T) -> usize {
		if let Some(idx) = self.position(entry.key()) {
			return idx;
		}

		let idx = self.entries.len();

		self.index.insert(entry.key().to_string(), idx);
		self.entries.push(entry);

		idx
	}

	pub(crate) fn alias(&mut self, key: String, idx: usize) {
		if idx < self.entries.len() {
			self.index.entry(key).or_insert(idx);
		}
	}
}

/// Run-level counters reported with every snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
	pub searches_issued: u32,
	pub searches_failed: u32,
	pub documents_retrieved: u32,
	pub duplicate_documents: u32,
	pub degraded_calls: u32,
	pub malformed_items: u32,
}
impl RunCounters {
	pub(crate) fn absorb(&mut self, other: &RunCounters) {
		self.searches_issued = self.searches_issued.saturating_add(other.searches_issued);
		self.searches_failed = self.searches_failed.saturating_add(other.searches_failed);
		self.documents_retrieved = self.documents_retrieved.saturating_add(other.documents_retrieved);
		self.duplicate_documents = self.duplicate_documents.saturating_add(other.duplicate_documents);
		self.degraded_calls = self.degraded_calls.saturating_add(other.degraded_calls);
		self.malformed_items = self.malformed_items.saturating_add(other.malformed_items);
	}
}

/// The single mutable state of one investigation.
///
/// Only the convergence controller and the fusion/validation passes in this crate write to it;
/// everything else reads snapshots.
#[derive(Clone, Debug)]
pub struct Investigation {
	pub(crate) target: Target,
	pub(crate) budget: u32,
	pub(crate) iteration: u32,
	pub(crate) status: InvestigationStatus,
	pub(crate) failure: Option<String>,
	pub(crate) version: u64,
	pub(crate) sources: Vec<Source>,
	pub(crate) source_index: HashMap<SourceId, usize>,
	pub(crate) findings: Ledger<Finding>,
	pub(crate) risks: Ledger<Risk>,
	pub(crate) connections: Ledger<Connection>,
	pub(crate) attempted_queries: Vec<String>,
	pub(crate) attempted_index: HashSet<String>,
	pub(crate) counters: RunCounters,
	pub(crate) metrics: ValidationMetrics,
	pub(crate) target_tokens: HashSet<String>,
	pub(crate) target_names: HashSet<String>,
}
impl Investigation {
	pub fn new(target: Target, budget: u32) -> Result<Self> {
		let name = target.name.trim().to_string();

		if name.is_empty() {
			return Err(Error::InvalidTarget { message: "target name must be non-empty.".to_string() });
		}
		if normalize::name_tokens(&name).is_empty() {
			return Err(Error::InvalidTarget {
				message: "target name must contain letters or digits.".to_string(),
			});
		}
		if budget == 0 {
			return Err(Error::InvalidBudget);
		}

		let aliases: Vec<String> = target
			.aliases
			.iter()
			.map(|alias| alias.trim().to_string())
			.filter(|alias| !alias.is_empty())
			.collect();
		let context = target
			.context
			.map(|context| context.trim().to_string())
			.filter(|context| !context.is_empty());
		let mut target_tokens = HashSet::new();
		let mut target_names = HashSet::new();

		for label in std::iter::once(&name).chain(aliases.iter()) {
			target_tokens.extend(normalize::name_tokens(label));
			target_names.insert(normalize::normalize_name(label));
		}

		Ok(Self {
			target: Target { name, context, aliases },
			budget,
			iteration: 0,
			status: InvestigationStatus::Running,
			failure: None,
			version: 0,
			sources: Vec::new(),
			source_index: HashMap::new(),
			findings: Ledger::default(),
			risks: Ledger::default(),
			connections: Ledger::default(),
			attempted_queries: Vec::new(),
			attempted_index: HashSet::new(),
			counters: RunCounters::default(),
			metrics: ValidationMetrics::default(),
			target_tokens,
			target_names,
		})
	}

	pub fn target(&self) -> &Target {
		&self.target
	}

	pub fn budget(&self) -> u32 {
		self.budget
	}

	pub fn iteration(&self) -> u32 {
		self.iteration
	}

	pub fn status(&self) -> InvestigationStatus {
		self.status
	}

	pub fn failure(&self) -> Option<&str> {
		self.failure.as_deref()
	}

	/// Bumped on every committed fusion pass.
	pub fn version(&self) -> u64 {
		self.version
	}

	pub fn sources(&self) -> &[Source] {
		&self.sources
	}

	pub fn source(&self, id: SourceId) -> Option<&Source> {
		self.source_index.get(&id).and_then(|idx| self.sources.get(*idx))
	}

	pub fn findings(&self) -> &Ledger<Finding> {
		&self.findings
	}

	pub fn risks(&self) -> &Ledger<Risk> {
		&self.risks
	}

	pub fn connections(&self) -> &Ledger<Connection> {
		&self.connections
	}

	pub fn entity_count(&self) -> usize {
		self.findings.len() + self.risks.len() + self.connections.len()
	}

	pub fn attempted_queries(&self) -> &[String] {
		&self.attempted_queries
	}

	pub fn has_attempted(&self, query: &str) -> bool {
		self.attempted_index.contains(&normalize::normalize_query(query))
	}

	pub fn counters(&self) -> &RunCounters {
		&self.counters
	}

	pub fn metrics(&self) -> &ValidationMetrics {
		&self.metrics
	}

	pub fn is_target_name(&self, name: &str) -> bool {
		self.target_names.contains(&normalize::normalize_name(name))
	}

	pub fn snapshot(&self, taken_at: OffsetDateTime) -> InvestigationSnapshot {
		let findings = self.findings.as_slice().to_vec();
		let risks = self.risks.as_slice().to_vec();
		let connections = self.connections.as_slice().to_vec();
		let summary = ReportSummary::build(&findings, &risks, &connections);

		InvestigationSnapshot {
			version: self.version,
			taken_at,
			target: self.target.clone(),
			status: self.status,
			failure: self.failure.clone(),
			iteration: self.iteration,
			budget: self.budget,
			findings,
			risks,
			connections,
			sources: self.sources.clone(),
			metrics: self.metrics.clone(),
			counters: self.counters.clone(),
			attempted_queries: self.attempted_queries.clone(),
			summary,
		}
	}

	/// Returns false when the source was already known.
	pub(crate) fn register_source(&mut self, source: Source) -> bool {
		if self.source_index.contains_key(&source.id) {
			return false;
		}

		self.source_index.insert(source.id, self.sources.len());
		self.sources.push(source);

		true
	}

	pub(crate) fn record_query(&mut self, query: &str) {
		let normalized = normalize::normalize_query(query);

		if self.attempted_index.insert(normalized) {
			self.attempted_queries.push(query.trim().to_string());
		}
	}

	pub(crate) fn source_trust(&self, id: SourceId) -> Option<f32> {
		self.source(id).map(|source| source.trust)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_blank_target_and_zero_budget() {
		assert!(matches!(
			Investigation::new(Target::new("  "), 3),
			Err(Error::InvalidTarget { .. })
		));
		assert!(matches!(Investigation::new(Target::new("..."), 3), Err(Error::InvalidTarget { .. })));
		assert!(matches!(Investigation::new(Target::new("Jane Doe"), 0), Err(Error::InvalidBudget)));
	}

	#[test]
	fn aliases_count_as_target_names() {
		let investigation =
			Investigation::new(Target::new("Jane Doe").with_alias("J. Doe").with_alias(" "), 2)
				.expect("Investigation should be created.");

		assert!(investigation.is_target_name("Dr. Jane Doe"));
		assert!(investigation.is_target_name("j doe"));
		assert!(!investigation.is_target_name("John Doe"));
		assert_eq!(investigation.target().aliases, vec!["J. Doe".to_string()]);
	}

	#[test]
	fn source_ids_follow_the_url() {
		let now = OffsetDateTime::UNIX_EPOCH;
		let first = Source::new("https://example.com/a", "A", "q", 0.5, now, 1);
		let again = Source::new(" https://example.com/a ", "A", "other", 0.5, now, 2);

		assert_eq!(first.id, again.id);
		assert_eq!(first.origin, "example.com");
	}

	#[test]
	fn repeated_queries_are_recorded_once() {
		let mut investigation =
			Investigation::new(Target::new("Jane Doe"), 2).expect("Investigation should be created.");

		investigation.record_query("Jane Doe biography");
		investigation.record_query("  jane doe, BIOGRAPHY ");

		assert_eq!(investigation.attempted_queries().len(), 1);
		assert!(investigation.has_attempted("JANE DOE biography"));
	}

	#[test]
	fn parses_categories_leniently() {
		assert_eq!(FindingCategory::parse("Professional"), FindingCategory::Professional);
		assert_eq!(FindingCategory::parse("hobbies"), FindingCategory::Other);
		assert_eq!(EntityType::parse("Organisation"), EntityType::Organization);
	}
}
