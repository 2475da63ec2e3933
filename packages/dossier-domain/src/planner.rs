//! Chooses the next batch of search queries.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use dossier_config::Planner;

use crate::{
	model::{EntityType, FindingCategory},
	normalize,
	snapshot::InvestigationSnapshot,
};

const SNIPPET_WORDS: usize = 6;

/// Hint carried from the convergence controller into the next plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
	Initial,
	/// Explore: fill category gaps and follow known entities.
	Broaden,
	/// Verify: re-query weakly supported entities first.
	Narrow,
}

pub struct QueryPlanner<'a> {
	config: &'a Planner,
	limit: usize,
}
impl<'a> QueryPlanner<'a> {
	pub fn new(config: &'a Planner, queries_per_iteration: u32) -> Self {
		Self { config, limit: queries_per_iteration as usize }
	}

	/// An empty result means no unexplored gap remains.
	pub fn plan(&self, snapshot: &InvestigationSnapshot, direction: Direction) -> Vec<String> {
		let context = PlanContext::new(snapshot);
		let groups = match direction {
			Direction::Initial => vec![context.initial()],
			Direction::Broaden => vec![
				self.category_gaps(&context),
				context.risk_probe(),
				self.known_entities(&context),
				context.risks_without_evidence(),
				self.weak_connections(&context),
				self.weak_findings(&context),
			],
			Direction::Narrow => vec![
				self.weak_findings(&context),
				self.weak_connections(&context),
				context.risks_without_evidence(),
				self.category_gaps(&context),
				context.risk_probe(),
				self.known_entities(&context),
			],
		};
		let attempted: HashSet<String> =
			snapshot.attempted_queries.iter().map(|query| normalize::normalize_query(query)).collect();
		let mut seen = HashSet::new();
		let mut queries = Vec::new();

		for query in groups.into_iter().flatten() {
			if queries.len() >= self.limit {
				break;
			}

			let query = query.split_whitespace().collect::<Vec<_>>().join(" ");
			let normalized = normalize::normalize_query(&query);

			if normalized.is_empty() || attempted.contains(&normalized) || !seen.insert(normalized) {
				continue;
			}

			queries.push(query);
		}

		queries
	}

	fn category_gaps(&self, context: &PlanContext<'_>) -> Vec<String> {
		let name = context.name();
		let needed = self.config.min_corroboration as usize;

		FindingCategory::GAP_CATEGORIES
			.into_iter()
			.filter(|category| {
				context
					.snapshot
					.findings
					.iter()
					.filter(|finding| {
						finding.category == *category && finding.sources.len() >= needed
					})
					.count() < needed
			})
			.map(|category| match category {
				FindingCategory::Biography => format!("{name} early life education family"),
				FindingCategory::Professional => format!("{name} career positions companies"),
				_ => format!("{name} associates partners board memberships"),
			})
			.collect()
	}

	fn weak_findings(&self, context: &PlanContext<'_>) -> Vec<String> {
		let mut weak: Vec<_> = context
			.snapshot
			.findings
			.iter()
			.filter(|finding| finding.contradicted || finding.confidence < self.config.low_confidence)
			.collect();

		weak.sort_by(|left, right| {
			right.contradicted.cmp(&left.contradicted).then(left.confidence.total_cmp(&right.confidence))
		});

		weak.into_iter()
			.map(|finding| format!("{} {}", context.name(), context.snippet(&finding.statement)))
			.collect()
	}

	fn weak_connections(&self, context: &PlanContext<'_>) -> Vec<String> {
		let mut weak: Vec<_> = context
			.snapshot
			.connections
			.iter()
			.filter(|connection| connection.confidence < self.config.low_confidence)
			.collect();

		weak.sort_by(|left, right| left.confidence.total_cmp(&right.confidence));

		weak.into_iter()
			.map(|connection| {
				format!(
					"{} {} {}",
					context.name(),
					connection.object,
					connection.relation.replace('_', " ")
				)
			})
			.collect()
	}

	/// Second-order queries about organizations and people already linked to the target.
	fn known_entities(&self, context: &PlanContext<'_>) -> Vec<String> {
		let name = context.name();
		let mut known: Vec<_> = context
			.snapshot
			.connections
			.iter()
			.filter(|connection| {
				matches!(connection.entity_type, EntityType::Organization | EntityType::Person)
			})
			.collect();

		known.sort_by(|left, right| right.confidence.total_cmp(&left.confidence));
		known.truncate(self.config.max_known_entities as usize);

		let mut queries: Vec<String> = known
			.iter()
			.map(|connection| match connection.entity_type {
				EntityType::Organization => format!("{} {name} role", connection.object),
				_ => format!("{name} {} relationship", connection.object),
			})
			.collect();
		let organizations: Vec<&str> = known
			.iter()
			.filter(|connection| connection.entity_type == EntityType::Organization)
			.map(|connection| connection.object.as_str())
			.collect();

		if let [first, second, ..] = organizations.as_slice() {
			queries.push(format!("{first} {second} connection"));
		}

		queries
	}
}

struct PlanContext<'a> {
	snapshot: &'a InvestigationSnapshot,
	target_tokens: HashSet<String>,
}
impl<'a> PlanContext<'a> {
	fn new(snapshot: &'a InvestigationSnapshot) -> Self {
		let target = &snapshot.target;
		let target_tokens = std::iter::once(&target.name)
			.chain(target.aliases.iter())
			.flat_map(|label| normalize::name_tokens(label))
			.collect();

		Self { snapshot, target_tokens }
	}

	fn name(&self) -> &str {
		&self.snapshot.target.name
	}

	fn initial(&self) -> Vec<String> {
		let name = self.name();
		let mut queries = vec![name.to_string()];

		if let Some(context) = self.snapshot.target.context.as_deref() {
			queries.push(format!("{name} {context}"));
		}

		queries.push(format!("{name} biography background"));
		queries.push(format!("{name} career professional history"));

		queries
	}

	fn risk_probe(&self) -> Vec<String> {
		if self.snapshot.risks.len() >= 2 {
			return Vec::new();
		}

		vec![format!("{} lawsuit investigation controversy", self.name())]
	}

	fn risks_without_evidence(&self) -> Vec<String> {
		self.snapshot
			.risks
			.iter()
			.filter(|risk| risk.evidence.is_empty())
			.map(|risk| {
				format!(
					"{} {} {}",
					self.name(),
					risk.category.replace('_', " "),
					self.snippet(&risk.description)
				)
			})
			.collect()
	}

	/// The first few words of a statement with the target's own name removed.
	fn snippet(&self, text: &str) -> String {
		text.split_whitespace()
			.filter(|word| !self.target_tokens.contains(&normalize::fold_text(word)))
			.map(|word| word.trim_matches(|ch: char| !ch.is_alphanumeric()))
			.filter(|word| !word.is_empty())
			.take(SNIPPET_WORDS)
			.collect::<Vec<_>>()
			.join(" ")
	}
}

#[cfg(test)]
mod tests {
	use time::OffsetDateTime;

	use super::*;
	use crate::{
		candidate::{CandidateBatch, ConnectionCandidate, FindingCandidate},
		fusion,
		model::{Investigation, Source, Target},
	};

	fn snapshot_with(batch: CandidateBatch, attempted: &[&str]) -> InvestigationSnapshot {
		let mut investigation =
			Investigation::new(Target::new("Jane Doe").with_context("tech executive"), 5)
				.expect("Investigation should be created.");

		for query in attempted {
			investigation.record_query(query);
		}

		investigation.iteration = 1;

		fusion::fuse(&mut investigation, batch, &dossier_config::Fusion::default());

		investigation.snapshot(OffsetDateTime::UNIX_EPOCH)
	}

	#[test]
	fn initial_plan_uses_identity_and_context() {
		let snapshot = snapshot_with(CandidateBatch::default(), &[]);
		let config = Planner::default();
		let queries = QueryPlanner::new(&config, 5).plan(&snapshot, Direction::Initial);

		assert_eq!(
			queries,
			vec![
				"Jane Doe".to_string(),
				"Jane Doe tech executive".to_string(),
				"Jane Doe biography background".to_string(),
				"Jane Doe career professional history".to_string(),
			]
		);
	}

	#[test]
	fn default_limit_keeps_the_context_query() {
		let investigation = Investigation::new(Target::new("Jane Doe").with_context("Acme Corp CFO"), 5)
			.expect("Investigation should be created.");
		let snapshot = investigation.snapshot(OffsetDateTime::UNIX_EPOCH);
		let config = Planner::default();
		let limit = dossier_config::Investigation::default().queries_per_iteration;
		let queries = QueryPlanner::new(&config, limit).plan(&snapshot, Direction::Initial);

		assert_eq!(queries.len(), limit as usize);
		assert!(queries.iter().any(|query| query.contains("Acme Corp CFO")));
	}

	#[test]
	fn never_repeats_attempted_queries() {
		let snapshot = snapshot_with(CandidateBatch::default(), &["jane doe", "JANE DOE biography, background"]);
		let config = Planner::default();
		let queries = QueryPlanner::new(&config, 2).plan(&snapshot, Direction::Initial);

		assert_eq!(
			queries,
			vec!["Jane Doe tech executive".to_string(), "Jane Doe career professional history".to_string()]
		);
	}

	#[test]
	fn narrow_puts_verification_first() {
		let source = Source::new("https://a.example/x", "", "", 0.5, OffsetDateTime::UNIX_EPOCH, 1);
		let batch = CandidateBatch {
			sources: vec![source.clone()],
			findings: vec![FindingCandidate {
				statement: "Jane Doe served on the Initech board".to_string(),
				category: FindingCategory::Association,
				confidence: 0.6,
				source: source.id,
			}],
			..CandidateBatch::default()
		};
		let snapshot = snapshot_with(batch, &[]);
		let config = Planner::default();
		let planner = QueryPlanner::new(&config, 3);
		let narrow = planner.plan(&snapshot, Direction::Narrow);
		let broaden = planner.plan(&snapshot, Direction::Broaden);

		assert_eq!(narrow[0], "Jane Doe served on the Initech board");
		assert_eq!(broaden[0], "Jane Doe early life education family");
		assert_eq!(broaden.len(), 3);
	}

	#[test]
	fn follows_known_organizations() {
		let source = Source::new("https://a.example/x", "", "", 1.0, OffsetDateTime::UNIX_EPOCH, 1);
		let connection = |object: &str| ConnectionCandidate {
			subject: None,
			relation: "director".to_string(),
			object: object.to_string(),
			entity_type: EntityType::Organization,
			timeframe: None,
			confidence: 0.9,
			source: source.id,
		};
		let batch = CandidateBatch {
			sources: vec![source.clone()],
			connections: vec![connection("Acme Corp"), connection("Initech")],
			..CandidateBatch::default()
		};
		let snapshot = snapshot_with(batch, &[]);
		let config = Planner::default();
		let queries = QueryPlanner::new(&config, 10).plan(&snapshot, Direction::Broaden);

		assert!(queries.contains(&"Acme Corp Jane Doe role".to_string()));
		assert!(queries.contains(&"Acme Corp Initech connection".to_string()));
	}
}
