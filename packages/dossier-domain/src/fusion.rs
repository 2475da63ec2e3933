//! Merges candidates into the investigation ledgers.
//!
//! Fusion is the only writer of entity confidence. It never drops an entity: contradicted claims
//! stay in the ledger, flagged and grouped, so the report can show both sides.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use dossier_config::Fusion;

use crate::{
	candidate::{CandidateBatch, ConnectionCandidate, FindingCandidate, RiskCandidate},
	model::{
		ConflictGroupId, Connection, EntityKind, EntityType, Finding, Investigation, Keyed, Ledger,
		Risk, SourceId, VerificationTier,
	},
	normalize::{self, StatementTokens},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeAction {
	Inserted,
	Corroborated,
	VariantMerged,
	Contradicted,
	Unchanged,
	Rejected,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MergeEvent {
	pub kind: EntityKind,
	pub key: String,
	pub action: MergeAction,
	pub confidence: f32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeOutcome {
	pub inserted: u32,
	pub corroborated: u32,
	pub variants_merged: u32,
	pub contradicted: u32,
	pub unchanged: u32,
	pub rejected: u32,
	pub events: Vec<MergeEvent>,
}
impl MergeOutcome {
	/// Entities added or materially updated by the pass.
	pub fn gain(&self) -> u32 {
		self.inserted + self.corroborated + self.variants_merged + self.contradicted
	}

	fn record(&mut self, event: MergeEvent) {
		let counter = match event.action {
			MergeAction::Inserted => &mut self.inserted,
			MergeAction::Corroborated => &mut self.corroborated,
			MergeAction::VariantMerged => &mut self.variants_merged,
			MergeAction::Contradicted => &mut self.contradicted,
			MergeAction::Unchanged => &mut self.unchanged,
			MergeAction::Rejected => &mut self.rejected,
		};

		*counter += 1;

		self.events.push(event);
	}
}

/// Confidence after an independent source agrees.
pub fn reinforce(confidence: f32, weight: f32) -> f32 {
	let confidence = normalize::clamp_unit(confidence);

	normalize::clamp_unit(confidence + (1.0 - confidence) * normalize::clamp_unit(weight))
}

/// Confidence after a contradiction. Never raises a value and never drops below `floor`
/// unless it already sat there.
pub fn penalize(confidence: f32, penalty: f32, floor: f32) -> f32 {
	let confidence = normalize::clamp_unit(confidence);

	if confidence <= floor {
		return confidence;
	}

	normalize::clamp_unit((confidence - normalize::clamp_unit(penalty)).max(floor)).min(confidence)
}

/// Applies one batch and commits it as a new version.
pub fn fuse(investigation: &mut Investigation, batch: CandidateBatch, config: &Fusion) -> MergeOutcome {
	let CandidateBatch { sources, findings, risks, connections, counters } = batch;
	let mut outcome = MergeOutcome::default();

	for source in sources {
		investigation.register_source(source);
	}

	investigation.counters.absorb(&counters);

	// Findings first so risk evidence can resolve against this batch too.
	for candidate in findings {
		outcome.record(merge_finding(investigation, candidate, config));
	}
	for candidate in risks {
		outcome.record(merge_risk(investigation, candidate, config));
	}
	for candidate in connections {
		outcome.record(merge_connection(investigation, candidate, config));
	}

	investigation.version += 1;

	outcome
}

trait Claim: Keyed {
	fn scope(&self) -> &str;

	fn text(&self) -> &str;

	fn set_text(&mut self, text: &str);

	fn confidence_mut(&mut self) -> &mut f32;

	fn sources_mut(&mut self) -> &mut Vec<SourceId>;

	fn conflict_group(&self) -> Option<ConflictGroupId>;

	fn mark_contradicted(&mut self, group: ConflictGroupId);

	fn touch(&mut self, iteration: u32);
}
impl Claim for Finding {
	fn scope(&self) -> &str {
		self.category.as_str()
	}

	fn text(&self) -> &str {
		&self.statement
	}

	fn set_text(&mut self, text: &str) {
		self.statement = text.to_string();
	}

	fn confidence_mut(&mut self) -> &mut f32 {
		&mut self.confidence
	}

	fn sources_mut(&mut self) -> &mut Vec<SourceId> {
		&mut self.sources
	}

	fn conflict_group(&self) -> Option<ConflictGroupId> {
		self.conflict_group
	}

	fn mark_contradicted(&mut self, group: ConflictGroupId) {
		self.contradicted = true;
		self.conflict_group = Some(group);
	}

	fn touch(&mut self, iteration: u32) {
		self.last_updated = iteration;
	}
}
impl Claim for Risk {
	fn scope(&self) -> &str {
		&self.category
	}

	fn text(&self) -> &str {
		&self.description
	}

	fn set_text(&mut self, text: &str) {
		self.description = text.to_string();
	}

	fn confidence_mut(&mut self) -> &mut f32 {
		&mut self.confidence
	}

	fn sources_mut(&mut self) -> &mut Vec<SourceId> {
		&mut self.sources
	}

	fn conflict_group(&self) -> Option<ConflictGroupId> {
		self.conflict_group
	}

	fn mark_contradicted(&mut self, group: ConflictGroupId) {
		self.contradicted = true;
		self.conflict_group = Some(group);
	}

	fn touch(&mut self, iteration: u32) {
		self.last_updated = iteration;
	}
}

struct ClaimInput<'a> {
	kind: EntityKind,
	scope: &'a str,
	text: &'a str,
	tokens: StatementTokens,
	source: SourceId,
	provisional: f32,
	iteration: u32,
}

enum Placement {
	Existing(usize, MergeAction),
	Contradicts(Vec<usize>),
	New,
}

fn merge_finding(
	investigation: &mut Investigation,
	candidate: FindingCandidate,
	config: &Fusion,
) -> MergeEvent {
	let statement = candidate.statement.trim();
	let Some(trust) = investigation.source_trust(candidate.source) else {
		return rejected(EntityKind::Finding, statement);
	};
	let tokens = StatementTokens::analyze(statement, &investigation.target_tokens);

	if tokens.is_empty() {
		return rejected(EntityKind::Finding, statement);
	}

	let category = candidate.category;
	let input = ClaimInput {
		kind: EntityKind::Finding,
		scope: category.as_str(),
		text: statement,
		tokens,
		source: candidate.source,
		provisional: normalize::clamp_unit(candidate.confidence) * trust,
		iteration: investigation.iteration,
	};

	merge_claim(
		&mut investigation.findings,
		&investigation.target_tokens,
		input,
		config,
		|key, confidence, iteration| Finding {
			key,
			statement: statement.to_string(),
			category,
			confidence,
			tier: VerificationTier::Low,
			sources: vec![candidate.source],
			contradicted: false,
			conflict_group: None,
			first_seen: iteration,
			last_updated: iteration,
		},
		|_| false,
	)
}

fn merge_risk(investigation: &mut Investigation, candidate: RiskCandidate, config: &Fusion) -> MergeEvent {
	let description = candidate.description.trim();
	let Some(trust) = investigation.source_trust(candidate.source) else {
		return rejected(EntityKind::Risk, description);
	};
	let tokens = StatementTokens::analyze(description, &investigation.target_tokens);

	if tokens.is_empty() {
		return rejected(EntityKind::Risk, description);
	}

	let category = match normalize::normalize_label(&candidate.category) {
		label if label.is_empty() => "general".to_string(),
		label => label,
	};
	let severity = normalize::clamp_severity(candidate.severity);
	let (evidence, notes) = resolve_evidence(
		&investigation.findings,
		&investigation.target_tokens,
		&candidate.evidence,
		config,
	);
	let input = ClaimInput {
		kind: EntityKind::Risk,
		scope: &category,
		text: description,
		tokens,
		source: candidate.source,
		provisional: normalize::clamp_unit(candidate.confidence) * trust,
		iteration: investigation.iteration,
	};

	merge_claim(
		&mut investigation.risks,
		&investigation.target_tokens,
		input,
		config,
		|key, confidence, iteration| Risk {
			key,
			category: category.clone(),
			description: description.to_string(),
			severity,
			evidence: evidence.clone(),
			evidence_notes: notes.clone(),
			confidence,
			tier: VerificationTier::Low,
			sources: vec![candidate.source],
			contradicted: false,
			conflict_group: None,
			first_seen: iteration,
			last_updated: iteration,
		},
		|risk| {
			let mut changed = false;

			if severity > risk.severity {
				risk.severity = severity;
				changed = true;
			}

			changed |= extend_unique(&mut risk.evidence, &evidence);
			changed |= extend_unique(&mut risk.evidence_notes, &notes);

			changed
		},
	)
}

fn merge_claim<T, B, E>(
	ledger: &mut Ledger<T>,
	target_tokens: &HashSet<String>,
	input: ClaimInput<'_>,
	config: &Fusion,
	build: B,
	enrich: E,
) -> MergeEvent
where
	T: Claim,
	B: FnOnce(String, f32, u32) -> T,
	E: FnOnce(&mut T) -> bool,
{
	let key = input.tokens.key(input.scope);

	match place(ledger, target_tokens, &input, &key, config) {
		Placement::Existing(idx, action) => {
			if action == MergeAction::VariantMerged {
				ledger.alias(key.clone(), idx);
			}

			let Some(entry) = ledger.entry_mut(idx) else {
				return rejected(input.kind, input.text);
			};
			let mut changed = false;

			if !entry.sources_mut().contains(&input.source) {
				entry.sources_mut().push(input.source);

				let confidence = entry.confidence_mut();

				*confidence = reinforce(*confidence, config.corroboration_weight);
				changed = true;
			}
			if prefers(entry.text(), input.text) {
				entry.set_text(input.text);

				changed = true;
			}

			changed |= enrich(&mut *entry);

			if changed {
				entry.touch(input.iteration);
			}

			let confidence = *entry.confidence_mut();

			MergeEvent {
				kind: input.kind,
				key: entry.key().to_string(),
				action: if changed { action } else { MergeAction::Unchanged },
				confidence,
			}
		},
		Placement::Contradicts(conflicts) => {
			let mut existing = conflicts
				.iter()
				.filter_map(|idx| ledger.as_slice().get(*idx).and_then(|entry| entry.conflict_group()));
			let group = existing
				.next()
				.unwrap_or_else(|| ConflictGroupId::for_family(&input.tokens.family(input.scope)));
			let absorbed: HashSet<ConflictGroupId> = existing.filter(|other| *other != group).collect();

			// Bridged groups collapse into one so no member loses its earlier partners.
			if !absorbed.is_empty() {
				for entry in ledger.iter_mut() {
					if entry.conflict_group().is_some_and(|other| absorbed.contains(&other)) {
						entry.mark_contradicted(group);
						entry.touch(input.iteration);
					}
				}
			}

			for idx in &conflicts {
				if let Some(entry) = ledger.entry_mut(*idx) {
					let confidence = entry.confidence_mut();

					*confidence =
						penalize(*confidence, config.contradiction_penalty, config.min_confidence);

					entry.mark_contradicted(group);
					entry.touch(input.iteration);
				}
			}

			let confidence =
				penalize(input.provisional, config.contradiction_penalty, config.min_confidence);
			let mut entry = build(key.clone(), confidence, input.iteration);

			entry.mark_contradicted(group);
			ledger.insert(entry);

			MergeEvent { kind: input.kind, key, action: MergeAction::Contradicted, confidence }
		},
		Placement::New => {
			let confidence = normalize::clamp_unit(input.provisional);

			ledger.insert(build(key.clone(), confidence, input.iteration));

			MergeEvent { kind: input.kind, key, action: MergeAction::Inserted, confidence }
		},
	}
}

/// Exact key first, then the closest compatible member of the same family.
fn place<T>(
	ledger: &Ledger<T>,
	target_tokens: &HashSet<String>,
	input: &ClaimInput<'_>,
	key: &str,
	config: &Fusion,
) -> Placement
where
	T: Claim,
{
	if let Some(idx) = ledger.position(key) {
		return Placement::Existing(idx, MergeAction::Corroborated);
	}

	let mut best: Option<(usize, f32)> = None;
	let mut conflicts = Vec::new();

	for (idx, existing) in ledger.iter().enumerate() {
		if existing.scope() != input.scope {
			continue;
		}

		let other = StatementTokens::analyze(existing.text(), target_tokens);

		if normalize::jaccard(&input.tokens.stem, &other.stem) < config.family_threshold {
			continue;
		}
		if !normalize::values_compatible(&input.tokens.values, &other.values) {
			conflicts.push(idx);

			continue;
		}

		let similarity = normalize::jaccard(&input.tokens.all, &other.all);

		if similarity >= config.similarity_threshold
			&& best.is_none_or(|(_, score)| similarity > score)
		{
			best = Some((idx, similarity));
		}
	}

	if let Some((idx, _)) = best {
		Placement::Existing(idx, MergeAction::VariantMerged)
	} else if conflicts.is_empty() {
		Placement::New
	} else {
		Placement::Contradicts(conflicts)
	}
}

fn merge_connection(
	investigation: &mut Investigation,
	candidate: ConnectionCandidate,
	config: &Fusion,
) -> MergeEvent {
	let raw_object = candidate.object.trim();
	let Some(trust) = investigation.source_trust(candidate.source) else {
		return rejected(EntityKind::Connection, raw_object);
	};
	let subject = match candidate.subject.as_deref().map(str::trim) {
		Some(subject) if !subject.is_empty() && !investigation.is_target_name(subject) =>
			subject.to_string(),
		_ => investigation.target.name.clone(),
	};
	// Either endpoint naming the target (or a supplied alias) resolves to the target itself.
	let object_name = if !raw_object.is_empty() && investigation.is_target_name(raw_object) {
		investigation.target.name.clone()
	} else {
		raw_object.to_string()
	};
	let object = object_name.as_str();
	let subject_key = normalize::normalize_name(&subject);
	let object_key = normalize::normalize_name(object);
	let relation = normalize::normalize_label(&candidate.relation);

	if relation.is_empty() || object_key.is_empty() || subject_key == object_key {
		return rejected(EntityKind::Connection, raw_object);
	}

	let key = format!("{subject_key}|{relation}|{object_key}");
	let timeframe =
		candidate.timeframe.map(|raw| raw.trim().to_string()).filter(|raw| !raw.is_empty());
	let iteration = investigation.iteration;
	let ledger = &mut investigation.connections;
	let placement = match ledger.position(&key) {
		Some(idx) => Some((idx, MergeAction::Corroborated)),
		None => closest_connection(ledger, &subject_key, &relation, &object_key, config)
			.map(|idx| (idx, MergeAction::VariantMerged)),
	};
	let Some((idx, action)) = placement else {
		let confidence = normalize::clamp_unit(normalize::clamp_unit(candidate.confidence) * trust);

		ledger.insert(Connection {
			key: key.clone(),
			subject,
			relation,
			object: object.to_string(),
			entity_type: candidate.entity_type,
			timeframe,
			confidence,
			tier: VerificationTier::Low,
			sources: vec![candidate.source],
			first_seen: iteration,
			last_updated: iteration,
		});

		return MergeEvent { kind: EntityKind::Connection, key, action: MergeAction::Inserted, confidence };
	};

	if action == MergeAction::VariantMerged {
		ledger.alias(key, idx);
	}

	let Some(entry) = ledger.entry_mut(idx) else {
		return rejected(EntityKind::Connection, object);
	};
	let mut changed = false;

	if !entry.sources.contains(&candidate.source) {
		entry.sources.push(candidate.source);

		entry.confidence = reinforce(entry.confidence, config.corroboration_weight);
		changed = true;
	}
	if prefers(&entry.object, object) {
		entry.object = object.to_string();
		changed = true;
	}
	if entry.timeframe.is_none() && timeframe.is_some() {
		entry.timeframe = timeframe;
		changed = true;
	}
	if entry.entity_type == EntityType::Other && candidate.entity_type != EntityType::Other {
		entry.entity_type = candidate.entity_type;
		changed = true;
	}
	if changed {
		entry.last_updated = iteration;
	}

	MergeEvent {
		kind: EntityKind::Connection,
		key: entry.key.clone(),
		action: if changed { action } else { MergeAction::Unchanged },
		confidence: entry.confidence,
	}
}

fn closest_connection(
	ledger: &Ledger<Connection>,
	subject_key: &str,
	relation: &str,
	object_key: &str,
	config: &Fusion,
) -> Option<usize> {
	let object_tokens: Vec<String> = object_key.split(' ').map(str::to_string).collect();
	let mut best: Option<(usize, f32)> = None;

	for (idx, existing) in ledger.iter().enumerate() {
		let mut parts = existing.key.splitn(3, '|');
		let (Some(subject), Some(label), Some(object)) = (parts.next(), parts.next(), parts.next())
		else {
			continue;
		};

		if subject != subject_key || label != relation {
			continue;
		}

		let other: Vec<String> = object.split(' ').map(str::to_string).collect();
		let similarity = normalize::jaccard(&object_tokens, &other);

		if similarity >= config.family_threshold && best.is_none_or(|(_, score)| similarity > score)
		{
			best = Some((idx, similarity));
		}
	}

	best.map(|(idx, _)| idx)
}

/// Maps free-text evidence onto finding keys; leftovers become notes.
fn resolve_evidence(
	findings: &Ledger<Finding>,
	target_tokens: &HashSet<String>,
	evidence: &[String],
	config: &Fusion,
) -> (Vec<String>, Vec<String>) {
	let mut keys = Vec::new();
	let mut notes = Vec::new();

	for raw in evidence {
		let text = raw.trim();

		if text.is_empty() {
			continue;
		}

		let resolved = findings.get(text).map(|finding| finding.key.clone()).or_else(|| {
			let tokens = StatementTokens::analyze(text, target_tokens);

			if tokens.is_empty() {
				return None;
			}

			findings
				.iter()
				.filter_map(|finding| {
					let other = StatementTokens::analyze(&finding.statement, target_tokens);

					if !normalize::values_compatible(&tokens.values, &other.values) {
						return None;
					}

					let similarity = normalize::jaccard(&tokens.all, &other.all);

					(similarity >= config.family_threshold).then_some((finding, similarity))
				})
				.max_by(|left, right| left.1.total_cmp(&right.1))
				.map(|(finding, _)| finding.key.clone())
		});

		match resolved {
			Some(key) if !keys.contains(&key) => keys.push(key),
			Some(_) => {},
			None if !notes.iter().any(|note: &String| note == text) => notes.push(text.to_string()),
			None => {},
		}
	}

	(keys, notes)
}

fn extend_unique(target: &mut Vec<String>, items: &[String]) -> bool {
	let mut changed = false;

	for item in items {
		if !target.contains(item) {
			target.push(item.clone());

			changed = true;
		}
	}

	changed
}

/// The longest wording is kept for display; ties keep the existing text.
fn prefers(current: &str, candidate: &str) -> bool {
	candidate.chars().count() > current.chars().count()
}

fn rejected(kind: EntityKind, text: &str) -> MergeEvent {
	MergeEvent { kind, key: text.to_string(), action: MergeAction::Rejected, confidence: 0.0 }
}

#[cfg(test)]
mod tests {
	use time::OffsetDateTime;

	use super::*;
	use crate::model::{FindingCategory, Source, Target};

	fn investigation() -> Investigation {
		let mut investigation = Investigation::new(Target::new("Jane Doe").with_alias("J. Doe"), 5)
			.expect("Investigation should be created.");

		investigation.iteration = 1;

		investigation
	}

	fn source(url: &str, trust: f32) -> Source {
		Source::new(url, "title", "query", trust, OffsetDateTime::UNIX_EPOCH, 1)
	}

	fn finding(statement: &str, confidence: f32, source: &Source) -> FindingCandidate {
		FindingCandidate {
			statement: statement.to_string(),
			category: FindingCategory::Biography,
			confidence,
			source: source.id,
		}
	}

	fn batch(sources: &[&Source], findings: Vec<FindingCandidate>) -> CandidateBatch {
		CandidateBatch {
			sources: sources.iter().map(|source| (*source).clone()).collect(),
			findings,
			..CandidateBatch::default()
		}
	}

	#[test]
	fn insert_scales_by_source_trust() {
		let mut investigation = investigation();
		let a = source("https://a.example/1", 0.5);
		let outcome = fuse(
			&mut investigation,
			batch(&[&a], vec![finding("Jane Doe was born in 1970", 0.8, &a)]),
			&Fusion::default(),
		);

		assert_eq!(outcome.inserted, 1);
		assert_eq!(investigation.version(), 1);

		let stored = investigation.findings().get("biography:born|1970").expect("Finding should exist.");

		assert!((stored.confidence - 0.4).abs() < 1e-6);
		assert_eq!(stored.first_seen, 1);
	}

	#[test]
	fn independent_source_reinforces_once() {
		let mut investigation = investigation();
		let config = Fusion::default();
		let a = source("https://a.example/1", 1.0);
		let b = source("https://b.example/1", 1.0);

		fuse(&mut investigation, batch(&[&a], vec![finding("born in 1970", 0.5, &a)]), &config);

		let outcome =
			fuse(&mut investigation, batch(&[&b], vec![finding("born in 1970", 0.9, &b)]), &config);

		assert_eq!(outcome.corroborated, 1);

		let stored = &investigation.findings().as_slice()[0];

		assert!((stored.confidence - 0.7).abs() < 1e-6);
		assert_eq!(stored.sources.len(), 2);

		let replay =
			fuse(&mut investigation, batch(&[&b], vec![finding("born in 1970", 0.9, &b)]), &config);

		assert_eq!(replay.unchanged, 1);
		assert_eq!(replay.gain(), 0);
		assert!((investigation.findings().as_slice()[0].confidence - 0.7).abs() < 1e-6);
	}

	#[test]
	fn variant_keeps_longest_wording_and_aliases_key() {
		let mut investigation = investigation();
		let config = Fusion::default();
		let a = source("https://a.example/1", 1.0);
		let b = source("https://b.example/1", 1.0);

		fuse(
			&mut investigation,
			batch(&[&a], vec![finding("Studied law at Harvard University", 0.6, &a)]),
			&config,
		);

		let outcome = fuse(
			&mut investigation,
			batch(&[&b], vec![finding("She studied law at Harvard University.", 0.6, &b)]),
			&config,
		);

		assert_eq!(outcome.variants_merged + outcome.corroborated, 1);
		assert_eq!(investigation.findings().len(), 1);
		assert_eq!(investigation.findings().as_slice()[0].statement, "She studied law at Harvard University.");
	}

	#[test]
	fn fuzzy_variant_registers_alias() {
		let mut investigation = investigation();
		let config = Fusion { similarity_threshold: 0.75, ..Fusion::default() };
		let a = source("https://a.example/1", 1.0);
		let b = source("https://b.example/1", 1.0);

		fuse(
			&mut investigation,
			batch(&[&a], vec![finding("graduated harvard law school", 0.6, &a)]),
			&config,
		);

		let outcome = fuse(
			&mut investigation,
			batch(&[&b], vec![finding("graduated harvard law school magna", 0.6, &b)]),
			&config,
		);

		assert_eq!(outcome.variants_merged, 1);
		assert_eq!(investigation.findings().len(), 1);
		assert!(investigation.findings().get("biography:graduated harvard law school magna|").is_some());
	}

	#[test]
	fn contradiction_flags_both_without_raising_either() {
		let mut investigation = investigation();
		let config = Fusion::default();
		let a = source("https://a.example/1", 1.0);
		let b = source("https://b.example/1", 1.0);
		let outcome = fuse(
			&mut investigation,
			batch(&[&a, &b], vec![finding("born in 1970", 0.6, &a), finding("born in 1972", 0.6, &b)]),
			&config,
		);

		assert_eq!(outcome.inserted, 1);
		assert_eq!(outcome.contradicted, 1);

		let all = investigation.findings().as_slice();

		assert_eq!(all.len(), 2);
		assert!(all.iter().all(|finding| finding.contradicted));
		assert!(all.iter().all(|finding| finding.confidence <= 0.6));
		assert!(all[0].conflict_group.is_some());
		assert_eq!(all[0].conflict_group, all[1].conflict_group);
	}

	#[test]
	fn bridging_contradiction_merges_conflict_groups() {
		let mut investigation = investigation();
		let config = Fusion::default();
		let a = source("https://a.example/1", 1.0);
		let outcome = fuse(
			&mut investigation,
			batch(
				&[&a],
				vec![
					finding("born in Ohio in 1970", 0.6, &a),
					finding("born in Ohio in 1971", 0.6, &a),
					finding("born in Texas in 1980", 0.6, &a),
					finding("born in Texas Houston in 1981", 0.6, &a),
				],
			),
			&config,
		);

		assert_eq!(outcome.contradicted, 2);

		let all = investigation.findings().as_slice();

		assert_ne!(all[0].conflict_group, all[3].conflict_group);

		let outcome =
			fuse(&mut investigation, batch(&[&a], vec![finding("born in Ohio Texas in 1990", 0.6, &a)]), &config);

		assert_eq!(outcome.contradicted, 1);

		let all = investigation.findings().as_slice();

		assert_eq!(all.len(), 5);
		assert!(all.iter().all(|finding| finding.contradicted));
		assert!(all.iter().all(|finding| finding.conflict_group == all[0].conflict_group));
	}

	#[test]
	fn penalty_respects_floor_and_never_raises() {
		assert!((penalize(0.6, 0.2, 0.05) - 0.4).abs() < 1e-6);
		assert_eq!(penalize(0.1, 0.2, 0.05), 0.05);
		assert_eq!(penalize(0.03, 0.2, 0.05), 0.03);
		assert_eq!(penalize(f32::NAN, 0.2, 0.05), 0.0);
		assert!((reinforce(0.5, 0.4) - 0.7).abs() < 1e-6);
		assert_eq!(reinforce(1.0, 0.4), 1.0);
	}

	#[test]
	fn unknown_source_and_empty_text_are_rejected() {
		let mut investigation = investigation();
		let a = source("https://a.example/1", 1.0);
		let stray = source("https://stray.example/", 1.0);
		let outcome = fuse(
			&mut investigation,
			batch(&[&a], vec![finding("born in 1970", 0.6, &stray), finding("Jane Doe.", 0.6, &a)]),
			&Fusion::default(),
		);

		assert_eq!(outcome.rejected, 2);
		assert!(investigation.findings().is_empty());
	}

	#[test]
	fn out_of_range_confidence_is_clamped() {
		let mut investigation = investigation();
		let a = source("https://a.example/1", 1.0);

		fuse(
			&mut investigation,
			batch(&[&a], vec![finding("born in 1970", 7.5, &a), finding("lives in Paris", f32::NAN, &a)]),
			&Fusion::default(),
		);

		for finding in investigation.findings().iter() {
			assert!((0.0..=1.0).contains(&finding.confidence));
		}
	}

	#[test]
	fn risk_tracks_max_severity_and_resolves_evidence() {
		let mut investigation = investigation();
		let config = Fusion::default();
		let a = source("https://a.example/1", 1.0);
		let b = source("https://b.example/1", 1.0);
		let mut first = batch(&[&a], vec![finding("Fined by the SEC in 2019", 0.7, &a)]);

		first.risks.push(RiskCandidate {
			category: "Regulatory".to_string(),
			description: "SEC enforcement action".to_string(),
			severity: 6.0,
			evidence: vec!["fined by SEC in 2019".to_string(), "anonymous forum post".to_string()],
			confidence: 0.6,
			source: a.id,
		});
		fuse(&mut investigation, first, &config);

		let mut second = batch(&[&b], Vec::new());

		second.risks.push(RiskCandidate {
			category: "regulatory".to_string(),
			description: "SEC enforcement action".to_string(),
			severity: 14.0,
			evidence: Vec::new(),
			confidence: 0.6,
			source: b.id,
		});
		fuse(&mut investigation, second, &config);

		let risk = &investigation.risks().as_slice()[0];

		assert_eq!(investigation.risks().len(), 1);
		assert_eq!(risk.severity, 10.0);
		assert_eq!(risk.evidence, vec!["biography:fined sec|2019".to_string()]);
		assert_eq!(risk.evidence_notes, vec!["anonymous forum post".to_string()]);
		assert_eq!(risk.sources.len(), 2);
	}

	#[test]
	fn connection_subject_defaults_to_target() {
		let mut investigation = investigation();
		let config = Fusion::default();
		let a = source("https://a.example/1", 1.0);
		let b = source("https://b.example/1", 1.0);
		let mut first = batch(&[&a, &b], Vec::new());

		first.connections.push(ConnectionCandidate {
			subject: None,
			relation: "Board Member".to_string(),
			object: "Acme Corp".to_string(),
			entity_type: EntityType::Other,
			timeframe: None,
			confidence: 0.6,
			source: a.id,
		});
		first.connections.push(ConnectionCandidate {
			subject: Some("J. Doe".to_string()),
			relation: "board member".to_string(),
			object: "Acme Corporation".to_string(),
			entity_type: EntityType::Organization,
			timeframe: Some("2015-2020".to_string()),
			confidence: 0.6,
			source: b.id,
		});
		first.connections.push(ConnectionCandidate {
			subject: None,
			relation: "alias".to_string(),
			object: "Dr. Jane Doe".to_string(),
			entity_type: EntityType::Person,
			timeframe: None,
			confidence: 0.6,
			source: b.id,
		});

		let outcome = fuse(&mut investigation, first, &config);

		assert_eq!(outcome.inserted, 1);
		assert_eq!(outcome.corroborated, 1);
		assert_eq!(outcome.rejected, 1);

		let connection = investigation
			.connections()
			.get("jane doe|board_member|acme")
			.expect("Connection should exist.");

		assert_eq!(connection.subject, "Jane Doe");
		assert_eq!(connection.object, "Acme Corporation");
		assert_eq!(connection.entity_type, EntityType::Organization);
		assert_eq!(connection.timeframe.as_deref(), Some("2015-2020"));
	}

	#[test]
	fn connection_object_naming_the_target_folds_to_it() {
		let mut investigation = investigation();
		let config = Fusion::default();
		let a = source("https://a.example/1", 1.0);
		let b = source("https://b.example/1", 1.0);
		let connection = |subject: Option<&str>, relation: &str, object: &str, source: &Source| {
			ConnectionCandidate {
				subject: subject.map(str::to_string),
				relation: relation.to_string(),
				object: object.to_string(),
				entity_type: EntityType::Person,
				timeframe: None,
				confidence: 0.6,
				source: source.id,
			}
		};
		let mut candidates = batch(&[&a, &b], Vec::new());

		candidates.connections = vec![
			connection(Some("Acme Corp"), "employs", "Jane Doe", &a),
			connection(Some("Acme Corp"), "employs", "J. Doe", &b),
			connection(None, "alias", "J. Doe", &b),
		];

		let outcome = fuse(&mut investigation, candidates, &config);

		assert_eq!(outcome.inserted, 1);
		assert_eq!(outcome.corroborated, 1);
		assert_eq!(outcome.rejected, 1);
		assert_eq!(investigation.connections().len(), 1);

		let connection = investigation
			.connections()
			.get("acme|employs|jane doe")
			.expect("Connection should exist.");

		assert_eq!(connection.object, "Jane Doe");
		assert_eq!(connection.sources.len(), 2);
	}
}
