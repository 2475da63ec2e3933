//! Unverified output of the extraction adapters, awaiting fusion.

use serde::{Deserialize, Serialize};

use crate::model::{EntityType, FindingCategory, RunCounters, Source, SourceId};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FindingCandidate {
	pub statement: String,
	pub category: FindingCategory,
	pub confidence: f32,
	pub source: SourceId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskCandidate {
	pub category: String,
	pub description: String,
	pub severity: f32,
	/// Free-text evidence; resolved against finding keys during fusion.
	pub evidence: Vec<String>,
	pub confidence: f32,
	pub source: SourceId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnectionCandidate {
	/// Defaults to the target when absent.
	pub subject: Option<String>,
	pub relation: String,
	pub object: String,
	pub entity_type: EntityType,
	pub timeframe: Option<String>,
	pub confidence: f32,
	pub source: SourceId,
}

/// Everything one iteration hands to fusion.
#[derive(Clone, Debug, Default)]
pub struct CandidateBatch {
	pub sources: Vec<Source>,
	pub findings: Vec<FindingCandidate>,
	pub risks: Vec<RiskCandidate>,
	pub connections: Vec<ConnectionCandidate>,
	pub counters: RunCounters,
}
impl CandidateBatch {
	pub fn candidate_count(&self) -> usize {
		self.findings.len() + self.risks.len() + self.connections.len()
	}
}
