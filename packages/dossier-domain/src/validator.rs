//! Assigns verification tiers and computes run metrics.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use dossier_config::Validation;

use crate::model::{Investigation, Source, SourceId, VerificationTier};

const SECONDS_PER_DAY: f32 = 86_400.0;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
	pub total_findings: u32,
	pub high: u32,
	pub medium: u32,
	pub low: u32,
	/// HIGH findings over all findings; zero when there are none.
	pub verified_fraction: f32,
	pub average_confidence: f32,
	pub contradicted: u32,
	pub total_risks: u32,
	pub total_connections: u32,
	pub total_sources: u32,
	/// Entities of any kind still at LOW.
	pub low_confidence_entities: u32,
}

/// Trust discounted by age; a source loses half its weight every `half_life_days`.
pub fn effective_trust(source: &Source, now: OffsetDateTime, half_life_days: f32) -> f32 {
	let age_days = ((now - source.retrieved_at).as_seconds_f32() / SECONDS_PER_DAY).max(0.0);
	let decay = 0.5_f32.powf(age_days / half_life_days.max(f32::EPSILON));
	let trust = source.trust * decay;

	if trust.is_finite() { trust.clamp(0.0, 1.0) } else { 0.0 }
}

/// Re-tiers every entity and stores the resulting metrics on the investigation.
pub fn validate(
	investigation: &mut Investigation,
	config: &Validation,
	now: OffsetDateTime,
) -> ValidationMetrics {
	let weights = TrustView::new(investigation, config, now);
	let findings: Vec<VerificationTier> = investigation
		.findings
		.iter()
		.map(|finding| weights.tier(finding.confidence, &finding.sources))
		.collect();
	let risks: Vec<VerificationTier> =
		investigation.risks.iter().map(|risk| weights.tier(risk.confidence, &risk.sources)).collect();
	let connections: Vec<VerificationTier> = investigation
		.connections
		.iter()
		.map(|connection| weights.tier(connection.confidence, &connection.sources))
		.collect();

	drop(weights);

	for (finding, tier) in investigation.findings.iter_mut().zip(findings) {
		finding.tier = tier;
	}
	for (risk, tier) in investigation.risks.iter_mut().zip(risks) {
		risk.tier = tier;
	}
	for (connection, tier) in investigation.connections.iter_mut().zip(connections) {
		connection.tier = tier;
	}

	let metrics = metrics(investigation);

	investigation.metrics = metrics.clone();

	metrics
}

fn metrics(investigation: &Investigation) -> ValidationMetrics {
	let mut metrics = ValidationMetrics {
		total_findings: investigation.findings.len() as u32,
		total_risks: investigation.risks.len() as u32,
		total_connections: investigation.connections.len() as u32,
		total_sources: investigation.sources.len() as u32,
		..ValidationMetrics::default()
	};
	let mut confidence_sum = 0.0;

	for finding in investigation.findings.iter() {
		match finding.tier {
			VerificationTier::High => metrics.high += 1,
			VerificationTier::Medium => metrics.medium += 1,
			VerificationTier::Low => metrics.low += 1,
		}

		if finding.contradicted {
			metrics.contradicted += 1;
		}

		confidence_sum += finding.confidence;
	}

	if metrics.total_findings > 0 {
		metrics.verified_fraction = metrics.high as f32 / metrics.total_findings as f32;
		metrics.average_confidence = confidence_sum / metrics.total_findings as f32;
	}

	metrics.low_confidence_entities = metrics.low
		+ investigation.risks.iter().filter(|risk| risk.tier == VerificationTier::Low).count() as u32
		+ investigation
			.connections
			.iter()
			.filter(|connection| connection.tier == VerificationTier::Low)
			.count() as u32;

	metrics
}

struct TrustView<'a> {
	investigation: &'a Investigation,
	config: &'a Validation,
	now: OffsetDateTime,
	average: f32,
}
impl<'a> TrustView<'a> {
	fn new(investigation: &'a Investigation, config: &'a Validation, now: OffsetDateTime) -> Self {
		let sources = investigation.sources();
		let average = if sources.is_empty() {
			0.0
		} else {
			sources
				.iter()
				.map(|source| effective_trust(source, now, config.recency_half_life_days))
				.sum::<f32>()
				/ sources.len() as f32
		};

		Self { investigation, config, now, average }
	}

	fn tier(&self, confidence: f32, sources: &[SourceId]) -> VerificationTier {
		let known: Vec<&Source> =
			sources.iter().filter_map(|id| self.investigation.source(*id)).collect();
		let origins: HashSet<&str> = known.iter().map(|source| source.origin.as_str()).collect();
		let independent = origins.len() as u32;

		if confidence >= self.config.high_confidence
			&& independent >= self.config.min_independent_sources
		{
			return VerificationTier::High;
		}
		if confidence >= self.config.medium_confidence {
			return VerificationTier::Medium;
		}

		let strongest = known
			.iter()
			.map(|source| effective_trust(source, self.now, self.config.recency_half_life_days))
			.fold(0.0_f32, f32::max);

		if independent == 1 && self.average > 0.0 && strongest >= self.average {
			VerificationTier::Medium
		} else {
			VerificationTier::Low
		}
	}
}
