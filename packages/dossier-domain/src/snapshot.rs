//! The frozen investigation state handed to report rendering.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
	model::{
		Connection, EntityType, Finding, FindingCategory, InvestigationStatus, Risk, RunCounters,
		Source, SourceId, Target, VerificationTier,
	},
	validator::ValidationMetrics,
};

const CRITICAL_SEVERITY: f32 = 7.0;
const RISK_SCORE_SCALE: f32 = 1.2;

/// Immutable, versioned copy of an investigation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvestigationSnapshot {
	pub version: u64,
	#[serde(with = "crate::time_serde")]
	pub taken_at: OffsetDateTime,
	pub target: Target,
	pub status: InvestigationStatus,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub failure: Option<String>,
	pub iteration: u32,
	pub budget: u32,
	pub findings: Vec<Finding>,
	pub risks: Vec<Risk>,
	pub connections: Vec<Connection>,
	pub sources: Vec<Source>,
	pub metrics: ValidationMetrics,
	pub counters: RunCounters,
	pub attempted_queries: Vec<String>,
	pub summary: ReportSummary,
}
impl InvestigationSnapshot {
	pub fn source(&self, id: SourceId) -> Option<&Source> {
		self.sources.iter().find(|source| source.id == id)
	}

	pub fn findings_in(&self, category: FindingCategory) -> impl Iterator<Item = &Finding> {
		self.findings.iter().filter(move |finding| finding.category == category)
	}

	pub fn critical_risks(&self) -> impl Iterator<Item = &Risk> {
		self.risks.iter().filter(|risk| risk.severity >= CRITICAL_SEVERITY)
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
	Low,
	Medium,
	High,
}
impl RiskLevel {
	fn for_score(score: f32) -> Self {
		if score >= 7.0 {
			Self::High
		} else if score >= 4.0 {
			Self::Medium
		} else {
			Self::Low
		}
	}
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryRisk {
	pub count: u32,
	pub max_severity: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskSummary {
	/// `min(10, mean(severity × confidence) × 1.2)`.
	pub score: f32,
	pub level: RiskLevel,
	pub critical: u32,
	pub by_category: BTreeMap<String, CategoryRisk>,
}
impl RiskSummary {
	pub fn build(risks: &[Risk]) -> Self {
		let score = if risks.is_empty() {
			0.0
		} else {
			let weighted: f32 = risks.iter().map(|risk| risk.severity * risk.confidence).sum();

			(weighted / risks.len() as f32 * RISK_SCORE_SCALE).clamp(0.0, 10.0)
		};
		let mut by_category: BTreeMap<String, CategoryRisk> = BTreeMap::new();

		for risk in risks {
			let entry = by_category.entry(risk.category.clone()).or_default();

			entry.count += 1;
			entry.max_severity = entry.max_severity.max(risk.severity);
		}

		Self {
			score,
			level: RiskLevel::for_score(score),
			critical: risks.iter().filter(|risk| risk.severity >= CRITICAL_SEVERITY).count() as u32,
			by_category,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkEntry {
	pub name: String,
	pub relation: String,
	pub confidence: f32,
	pub tier: VerificationTier,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkSummary {
	pub organizations: Vec<NetworkEntry>,
	pub people: Vec<NetworkEntry>,
}
impl NetworkSummary {
	pub fn build(connections: &[Connection]) -> Self {
		let mut summary = Self::default();

		for connection in connections {
			let entry = NetworkEntry {
				name: connection.object.clone(),
				relation: connection.relation.clone(),
				confidence: connection.confidence,
				tier: connection.tier,
			};

			match connection.entity_type {
				EntityType::Organization => summary.organizations.push(entry),
				EntityType::Person => summary.people.push(entry),
				EntityType::Event | EntityType::Other => {},
			}
		}

		summary.organizations.sort_by(|left, right| right.confidence.total_cmp(&left.confidence));
		summary.people.sort_by(|left, right| right.confidence.total_cmp(&left.confidence));

		summary
	}
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationSummary {
	pub verified: u32,
	pub total: u32,
	pub by_tier: BTreeMap<String, u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
	pub risk: RiskSummary,
	pub network: NetworkSummary,
	pub verification: VerificationSummary,
}
impl ReportSummary {
	pub fn build(findings: &[Finding], risks: &[Risk], connections: &[Connection]) -> Self {
		let mut verification = VerificationSummary { total: findings.len() as u32, ..Default::default() };

		for finding in findings {
			let tier = match finding.tier {
				VerificationTier::High => "HIGH",
				VerificationTier::Medium => "MEDIUM",
				VerificationTier::Low => "LOW",
			};

			*verification.by_tier.entry(tier.to_string()).or_default() += 1;

			if finding.tier == VerificationTier::High {
				verification.verified += 1;
			}
		}

		Self {
			risk: RiskSummary::build(risks),
			network: NetworkSummary::build(connections),
			verification,
		}
	}
}
