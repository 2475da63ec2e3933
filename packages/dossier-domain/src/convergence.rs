//! The iteration state machine.

use serde::{Deserialize, Serialize};

use dossier_config::Convergence;

use crate::{
	Error, Result,
	fusion::MergeOutcome,
	model::{Investigation, InvestigationStatus},
	planner::Direction,
	validator::ValidationMetrics,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
	Init,
	Searching,
	Merging,
	Validating,
	Deciding,
	Converged,
	Exhausted,
	Failed,
}
impl Phase {
	pub fn is_terminal(self) -> bool {
		matches!(self, Self::Converged | Self::Exhausted | Self::Failed)
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
	Start,
	Retrieved,
	Merged,
	Validated,
	Continue,
	Converge,
	Exhaust,
	Fatal,
}

/// Every legal edge except `Fatal`, which any non-terminal phase accepts.
const TRANSITIONS: [(Phase, Trigger, Phase); 8] = [
	(Phase::Init, Trigger::Start, Phase::Searching),
	(Phase::Searching, Trigger::Retrieved, Phase::Merging),
	(Phase::Merging, Trigger::Merged, Phase::Validating),
	(Phase::Validating, Trigger::Validated, Phase::Deciding),
	(Phase::Deciding, Trigger::Continue, Phase::Searching),
	(Phase::Deciding, Trigger::Converge, Phase::Converged),
	(Phase::Deciding, Trigger::Exhaust, Phase::Exhausted),
	// The planner found nothing left to ask before the next search started.
	(Phase::Searching, Trigger::Converge, Phase::Converged),
];

pub fn next_phase(from: Phase, trigger: Trigger) -> Option<Phase> {
	if trigger == Trigger::Fatal {
		return (!from.is_terminal()).then_some(Phase::Failed);
	}

	TRANSITIONS
		.iter()
		.find(|(source, edge, _)| *source == from && *edge == trigger)
		.map(|(_, _, target)| *target)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
	pub from: Phase,
	pub to: Phase,
	pub trigger: Trigger,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
	DiminishingReturns,
	VerifiedSaturation,
	NoOpenGaps,
	BudgetExhausted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "decision", content = "detail")]
pub enum Decision {
	Continue(Direction),
	Stop(StopReason),
}

/// Drives an [`Investigation`] through its phases and owns its status and iteration counter.
#[derive(Clone, Debug)]
pub struct ConvergenceController {
	config: Convergence,
	phase: Phase,
	stalled: u32,
	history: Vec<Transition>,
}
impl ConvergenceController {
	pub fn new(config: Convergence) -> Self {
		Self { config, phase: Phase::Init, stalled: 0, history: Vec::new() }
	}

	pub fn phase(&self) -> Phase {
		self.phase
	}

	pub fn history(&self) -> &[Transition] {
		&self.history
	}

	/// Consecutive iterations whose gain fell below the threshold.
	pub fn stalled(&self) -> u32 {
		self.stalled
	}

	pub fn fire(&mut self, trigger: Trigger) -> Result<Transition> {
		let from = self.phase;
		let to = next_phase(from, trigger).ok_or(Error::InvalidTransition { from, trigger })?;
		let transition = Transition { from, to, trigger };

		self.phase = to;

		self.history.push(transition);

		Ok(transition)
	}

	pub fn start(&mut self) -> Result<Transition> {
		self.fire(Trigger::Start)
	}

	/// Opens the next iteration: bumps the counter and records the queries as attempted.
	pub fn begin_iteration(
		&mut self,
		investigation: &mut Investigation,
		queries: &[String],
	) -> Result<u32> {
		if self.phase != Phase::Searching {
			return Err(Error::InvalidTransition { from: self.phase, trigger: Trigger::Retrieved });
		}
		if investigation.iteration >= investigation.budget {
			return Err(Error::BudgetSpent { budget: investigation.budget });
		}

		investigation.iteration += 1;

		for query in queries {
			investigation.record_query(query);
		}

		investigation.counters.searches_issued =
			investigation.counters.searches_issued.saturating_add(queries.len() as u32);

		Ok(investigation.iteration)
	}

	/// Evaluates the stopping rules for the iteration just validated.
	///
	/// Stop decisions move the controller to a terminal phase and settle the investigation
	/// status. `Continue` leaves the controller in `Deciding`; the caller follows with
	/// [`Self::resume`] or, when the planner comes back empty, [`Self::conclude`].
	pub fn decide(
		&mut self,
		investigation: &mut Investigation,
		outcome: &MergeOutcome,
		metrics: &ValidationMetrics,
	) -> Result<Decision> {
		if self.phase != Phase::Deciding {
			return Err(Error::InvalidTransition { from: self.phase, trigger: Trigger::Converge });
		}

		if outcome.gain() < self.config.marginal_gain_threshold {
			self.stalled += 1;
		} else {
			self.stalled = 0;
		}

		let decision = if self.stalled >= self.config.patience {
			Decision::Stop(StopReason::DiminishingReturns)
		} else if metrics.total_findings >= self.config.min_findings_for_saturation
			&& metrics.verified_fraction >= self.config.verified_fraction_saturation
		{
			Decision::Stop(StopReason::VerifiedSaturation)
		} else if investigation.iteration >= investigation.budget {
			Decision::Stop(StopReason::BudgetExhausted)
		} else {
			Decision::Continue(self.direction(investigation, metrics))
		};

		if let Decision::Stop(reason) = decision {
			self.settle(investigation, reason)?;
		}

		Ok(decision)
	}

	/// Returns to `Searching` after a `Continue` decision.
	pub fn resume(&mut self) -> Result<Transition> {
		self.fire(Trigger::Continue)
	}

	/// Converges because no unexplored gap remains.
	pub fn conclude(&mut self, investigation: &mut Investigation) -> Result<Transition> {
		self.settle(investigation, StopReason::NoOpenGaps)
	}

	/// Moves to `Failed` from any non-terminal phase and records the cause.
	pub fn fail(&mut self, investigation: &mut Investigation, cause: impl Into<String>) -> Result<Transition> {
		let transition = self.fire(Trigger::Fatal)?;

		investigation.status = InvestigationStatus::Failed;
		investigation.failure = Some(cause.into());

		Ok(transition)
	}

	fn settle(&mut self, investigation: &mut Investigation, reason: StopReason) -> Result<Transition> {
		let (trigger, status) = match reason {
			StopReason::BudgetExhausted => (Trigger::Exhaust, InvestigationStatus::Exhausted),
			_ => (Trigger::Converge, InvestigationStatus::Converged),
		};
		let transition = self.fire(trigger)?;

		investigation.status = status;

		Ok(transition)
	}

	fn direction(&self, investigation: &Investigation, metrics: &ValidationMetrics) -> Direction {
		let entities = investigation.entity_count();

		if entities < self.config.broaden_below_entities as usize {
			return Direction::Broaden;
		}

		let low_fraction = metrics.low_confidence_entities as f32 / entities as f32;

		if low_fraction >= self.config.narrow_low_confidence_fraction {
			Direction::Narrow
		} else {
			Direction::Broaden
		}
	}
}
