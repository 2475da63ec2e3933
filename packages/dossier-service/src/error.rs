use dossier_domain::snapshot::InvestigationSnapshot;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	/// The run could not start; status is FAILED and no snapshot exists.
	#[error("Investigation failed: {cause}")]
	Fatal { cause: String },
	/// Carries the last committed snapshot.
	///
	/// Entities and `version` reflect merged state only. `iteration` and `attempted_queries`
	/// already count an iteration cancelled after retrieval, whose candidates were discarded.
	#[error("Investigation cancelled after iteration {}.", .snapshot.iteration)]
	Cancelled { snapshot: Box<InvestigationSnapshot> },
	#[error(transparent)]
	Domain(#[from] dossier_domain::Error),
}
