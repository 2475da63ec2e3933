//! The investigation loop: plan, retrieve, extract, fuse, validate, decide.

use std::{
	collections::HashSet,
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
};

use time::OffsetDateTime;

use dossier_domain::{
	candidate::CandidateBatch,
	convergence::{ConvergenceController, Decision, Phase, StopReason, Trigger},
	fusion,
	model::{Investigation, RunCounters, SourceId, Target},
	planner::{Direction, QueryPlanner},
	snapshot::InvestigationSnapshot,
	validator,
};

use crate::{
	DossierService, Error, Result,
	adapters::{self, AdapterInput, AdapterOutput},
	audit::{AuditEvent, Auditor, MergeCounts},
	retrieval::{self, Retrieval},
};

#[derive(Clone, Debug, Default)]
pub struct InvestigateRequest {
	pub target: String,
	pub context: Option<String>,
	pub aliases: Vec<String>,
	/// Overrides `investigation.max_iterations`.
	pub max_iterations: Option<u32>,
}
impl InvestigateRequest {
	pub fn new(target: impl Into<String>) -> Self {
		Self { target: target.into(), ..Default::default() }
	}

	fn to_target(&self) -> Target {
		let mut target = Target::new(self.target.clone());

		if let Some(context) = &self.context {
			target = target.with_context(context.clone());
		}

		self.aliases.iter().fold(target, |target, alias| target.with_alias(alias.clone()))
	}
}

/// Shared flag checked between iterations and after retrieval.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);
impl CancelToken {
	pub fn cancel(&self) {
		self.0.store(true, Ordering::SeqCst);
	}

	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}
}

impl DossierService {
	pub async fn investigate(&self, req: InvestigateRequest) -> Result<InvestigationSnapshot> {
		self.investigate_with_cancel(req, &CancelToken::default()).await
	}

	/// Runs until convergence or budget exhaustion and returns the frozen snapshot.
	///
	/// Fatal input errors return [`Error::Fatal`] before any iteration starts. Cancellation
	/// returns [`Error::Cancelled`] with the last committed snapshot.
	pub async fn investigate_with_cancel(
		&self,
		req: InvestigateRequest,
		cancel: &CancelToken,
	) -> Result<InvestigationSnapshot> {
		let auditor = Auditor::new(self.audit.clone());
		let mut controller = ConvergenceController::new(self.cfg.convergence.clone());
		let budget = req.max_iterations.unwrap_or(self.cfg.investigation.max_iterations);
		let mut investigation = match Investigation::new(req.to_target(), budget) {
			Ok(investigation) => investigation,
			Err(err) => {
				let cause = err.to_string();

				auditor.transition(controller.fire(Trigger::Fatal)?);
				auditor.record(Phase::Failed, AuditEvent::Error { message: cause.clone() });

				tracing::error!(run = %auditor.run(), error = %cause, "Investigation failed to start.");

				return Err(Error::Fatal { cause });
			},
		};

		tracing::info!(
			run = %auditor.run(),
			target = %investigation.target().name,
			budget,
			"Investigation started."
		);

		auditor.transition(controller.start()?);

		let planner =
			QueryPlanner::new(&self.cfg.planner, self.cfg.investigation.queries_per_iteration);
		let mut queries =
			planner.plan(&investigation.snapshot(OffsetDateTime::now_utc()), Direction::Initial);

		if queries.is_empty() {
			let cause = "no initial query could be constructed for the target.".to_string();

			auditor.transition(controller.fail(&mut investigation, cause.clone())?);
			auditor.record(Phase::Failed, AuditEvent::Error { message: cause.clone() });

			return Err(Error::Fatal { cause });
		}

		loop {
			if cancel.is_cancelled() {
				return Err(cancelled(&auditor, &controller, &investigation));
			}

			let iteration = controller.begin_iteration(&mut investigation, &queries)?;

			tracing::info!(iteration, queries = queries.len(), "Iteration started.");

			for query in &queries {
				auditor.record(
					Phase::Searching,
					AuditEvent::SearchIssued { iteration, query: query.clone() },
				);
			}

			let retrieval = retrieval::retrieve(&self.cfg, &self.providers, &queries, iteration).await;

			for (query, error) in &retrieval.failures {
				auditor.record(
					Phase::Searching,
					AuditEvent::SearchFailed { iteration, query: query.clone(), error: error.clone() },
				);
			}

			if cancel.is_cancelled() {
				return Err(cancelled(&auditor, &controller, &investigation));
			}

			let batch = self.extract_candidates(&auditor, &investigation, retrieval, iteration).await?;

			auditor.transition(controller.fire(Trigger::Retrieved)?);

			let outcome = fusion::fuse(&mut investigation, batch, &self.cfg.fusion);

			auditor.record(
				Phase::Merging,
				AuditEvent::MergeApplied {
					iteration,
					version: investigation.version(),
					counts: MergeCounts::from(&outcome),
				},
			);
			auditor.transition(controller.fire(Trigger::Merged)?);

			let metrics =
				validator::validate(&mut investigation, &self.cfg.validation, OffsetDateTime::now_utc());

			auditor.transition(controller.fire(Trigger::Validated)?);

			let decision = controller.decide(&mut investigation, &outcome, &metrics)?;

			tracing::info!(
				iteration,
				gain = outcome.gain(),
				findings = metrics.total_findings,
				verified_fraction = metrics.verified_fraction,
				?decision,
				"Iteration decided."
			);

			auditor.record(Phase::Deciding, AuditEvent::DecisionMade { iteration, decision });

			match decision {
				Decision::Stop(_) => {
					if let Some(transition) = controller.history().last() {
						auditor.transition(*transition);
					}

					return Ok(finish(&auditor, &investigation));
				},
				Decision::Continue(direction) => {
					let next =
						planner.plan(&investigation.snapshot(OffsetDateTime::now_utc()), direction);

					auditor.transition(controller.resume()?);

					if next.is_empty() {
						let decision = Decision::Stop(StopReason::NoOpenGaps);

						tracing::info!(iteration, ?decision, "No unexplored gaps remain.");

						auditor.record(Phase::Searching, AuditEvent::DecisionMade { iteration, decision });
						auditor.transition(controller.conclude(&mut investigation)?);

						return Ok(finish(&auditor, &investigation));
					}

					queries = next;
				},
			}
		}
	}

	/// Runs the three adapters concurrently over one immutable snapshot.
	async fn extract_candidates(
		&self,
		auditor: &Auditor,
		investigation: &Investigation,
		retrieval: Retrieval,
		iteration: u32,
	) -> Result<CandidateBatch> {
		let Retrieval { documents, mut counters, .. } = retrieval;

		if documents.is_empty() {
			tracing::info!(iteration, "No documents retrieved; skipping extraction.");

			return Ok(CandidateBatch { counters, ..Default::default() });
		}

		let snapshot = investigation.snapshot(OffsetDateTime::now_utc());
		let input = AdapterInput { snapshot: &snapshot, documents: &documents };
		let (facts, risks, connections) = tokio::join!(
			adapters::fact::extract(&self.cfg, &self.providers, input),
			adapters::risk::extract(&self.cfg, &self.providers, input),
			adapters::connection::extract(&self.cfg, &self.providers, input),
		);
		let (facts, risks, connections) = (facts?, risks?, connections?);

		tally(auditor, &mut counters, iteration, "fact_extractor", &facts);
		tally(auditor, &mut counters, iteration, "risk_analyzer", &risks);
		tally(auditor, &mut counters, iteration, "connection_mapper", &connections);

		let cited: HashSet<SourceId> = facts
			.candidates
			.iter()
			.map(|candidate| candidate.source)
			.chain(risks.candidates.iter().map(|candidate| candidate.source))
			.chain(connections.candidates.iter().map(|candidate| candidate.source))
			.collect();
		let sources = documents
			.into_iter()
			.map(|document| document.source)
			.filter(|source| cited.contains(&source.id))
			.collect();

		Ok(CandidateBatch {
			sources,
			findings: facts.candidates,
			risks: risks.candidates,
			connections: connections.candidates,
			counters,
		})
	}
}

fn tally<T>(
	auditor: &Auditor,
	counters: &mut RunCounters,
	iteration: u32,
	adapter: &str,
	output: &AdapterOutput<T>,
) {
	counters.malformed_items = counters.malformed_items.saturating_add(output.malformed);

	if output.degraded {
		counters.degraded_calls = counters.degraded_calls.saturating_add(1);
	}

	auditor.record(
		Phase::Searching,
		AuditEvent::CandidatesProduced {
			iteration,
			adapter: adapter.to_string(),
			candidates: output.candidates.len() as u32,
			malformed: output.malformed,
			degraded: output.degraded,
		},
	);
}

fn finish(auditor: &Auditor, investigation: &Investigation) -> InvestigationSnapshot {
	let snapshot = investigation.snapshot(OffsetDateTime::now_utc());

	tracing::info!(
		run = %auditor.run(),
		status = ?snapshot.status,
		iterations = snapshot.iteration,
		findings = snapshot.findings.len(),
		risks = snapshot.risks.len(),
		connections = snapshot.connections.len(),
		"Investigation finished."
	);

	snapshot
}

fn cancelled(
	auditor: &Auditor,
	controller: &ConvergenceController,
	investigation: &Investigation,
) -> Error {
	let snapshot = investigation.snapshot(OffsetDateTime::now_utc());

	tracing::warn!(run = %auditor.run(), iteration = snapshot.iteration, "Investigation cancelled.");

	auditor.record(
		controller.phase(),
		AuditEvent::Error { message: format!("cancelled after iteration {}", snapshot.iteration) },
	);

	Error::Cancelled { snapshot: Box::new(snapshot) }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn requests_carry_context_and_aliases_into_the_target() {
		let req = InvestigateRequest {
			context: Some("Acme Corp".to_string()),
			aliases: vec!["J. Doe".to_string(), "Janie".to_string()],
			..InvestigateRequest::new("Jane Doe")
		};
		let target = req.to_target();

		assert_eq!(target.name, "Jane Doe");
		assert_eq!(target.context.as_deref(), Some("Acme Corp"));
		assert_eq!(target.aliases, vec!["J. Doe".to_string(), "Janie".to_string()]);
	}

	#[test]
	fn cancel_tokens_share_their_flag() {
		let token = CancelToken::default();
		let clone = token.clone();

		clone.cancel();

		assert!(token.is_cancelled());
	}
}
