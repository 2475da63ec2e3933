//! Append-only audit trail of one investigation run.

use std::{
	fs::{self, File, OpenOptions},
	io::{self, Write},
	path::Path,
	sync::{Arc, Mutex},
};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use dossier_domain::{
	convergence::{Decision, Phase, Transition, Trigger},
	fusion::MergeOutcome,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
	SearchIssued {
		iteration: u32,
		query: String,
	},
	SearchFailed {
		iteration: u32,
		query: String,
		error: String,
	},
	CandidatesProduced {
		iteration: u32,
		adapter: String,
		candidates: u32,
		malformed: u32,
		degraded: bool,
	},
	MergeApplied {
		iteration: u32,
		version: u64,
		counts: MergeCounts,
	},
	DecisionMade {
		iteration: u32,
		decision: Decision,
	},
	PhaseTransition {
		from: Phase,
		to: Phase,
		trigger: Trigger,
	},
	Error {
		message: String,
	},
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeCounts {
	pub inserted: u32,
	pub corroborated: u32,
	pub variants_merged: u32,
	pub contradicted: u32,
	pub unchanged: u32,
	pub rejected: u32,
}
impl From<&MergeOutcome> for MergeCounts {
	fn from(outcome: &MergeOutcome) -> Self {
		Self {
			inserted: outcome.inserted,
			corroborated: outcome.corroborated,
			variants_merged: outcome.variants_merged,
			contradicted: outcome.contradicted,
			unchanged: outcome.unchanged,
			rejected: outcome.rejected,
		}
	}
}

/// One line of the audit log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
	#[serde(with = "dossier_domain::time_serde")]
	pub ts: OffsetDateTime,
	pub run: Uuid,
	pub phase: Phase,
	#[serde(flatten)]
	pub event: AuditEvent,
}

pub trait AuditSink
where
	Self: Send + Sync,
{
	fn append(&self, record: &AuditRecord) -> io::Result<()>;
}

/// Writes one JSON object per line.
pub struct JsonlSink {
	file: Mutex<File>,
}
impl JsonlSink {
	pub fn create(path: &Path) -> io::Result<Self> {
		if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
			fs::create_dir_all(parent)?;
		}

		let file = OpenOptions::new().create(true).append(true).open(path)?;

		Ok(Self { file: Mutex::new(file) })
	}
}
impl AuditSink for JsonlSink {
	fn append(&self, record: &AuditRecord) -> io::Result<()> {
		let mut line = serde_json::to_vec(record)?;

		line.push(b'\n');

		let mut file = self.file.lock().unwrap_or_else(|err| err.into_inner());

		file.write_all(&line)?;
		file.flush()
	}
}

#[derive(Default)]
pub struct MemorySink {
	records: Mutex<Vec<AuditRecord>>,
}
impl MemorySink {
	pub fn records(&self) -> Vec<AuditRecord> {
		self.records.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}
impl AuditSink for MemorySink {
	fn append(&self, record: &AuditRecord) -> io::Result<()> {
		self.records.lock().unwrap_or_else(|err| err.into_inner()).push(record.clone());

		Ok(())
	}
}

pub struct NullSink;
impl AuditSink for NullSink {
	fn append(&self, _: &AuditRecord) -> io::Result<()> {
		Ok(())
	}
}

/// Stamps events with the run id and mirrors them to tracing. Sink failures never stop a run.
pub(crate) struct Auditor {
	run: Uuid,
	sink: Arc<dyn AuditSink>,
}
impl Auditor {
	pub(crate) fn new(sink: Arc<dyn AuditSink>) -> Self {
		Self { run: Uuid::new_v4(), sink }
	}

	pub(crate) fn run(&self) -> Uuid {
		self.run
	}

	pub(crate) fn record(&self, phase: Phase, event: AuditEvent) {
		tracing::debug!(run = %self.run, ?phase, ?event, "Audit event.");

		let record = AuditRecord { ts: OffsetDateTime::now_utc(), run: self.run, phase, event };

		if let Err(err) = self.sink.append(&record) {
			tracing::warn!(run = %self.run, error = %err, "Failed to append audit record.");
		}
	}

	pub(crate) fn transition(&self, transition: Transition) {
		self.record(
			transition.to,
			AuditEvent::PhaseTransition {
				from: transition.from,
				to: transition.to,
				trigger: transition.trigger,
			},
		);
	}
}
