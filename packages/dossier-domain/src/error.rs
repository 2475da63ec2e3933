use crate::convergence::{Phase, Trigger};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid target: {message}")]
	InvalidTarget { message: String },
	#[error("Iteration budget must be greater than zero.")]
	InvalidBudget,
	#[error("No transition from {from:?} on {trigger:?}.")]
	InvalidTransition { from: Phase, trigger: Trigger },
	#[error("Iteration budget of {budget} is already spent.")]
	BudgetSpent { budget: u32 },
}
