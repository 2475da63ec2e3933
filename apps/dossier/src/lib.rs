use std::{
	fs,
	path::{Path, PathBuf},
	sync::Arc,
};

use clap::Parser;
use time::{OffsetDateTime, macros::format_description};
use tracing_subscriber::EnvFilter;

use dossier_config::Config;
use dossier_domain::snapshot::InvestigationSnapshot;
use dossier_service::{DossierService, InvestigateRequest, audit::JsonlSink};

#[derive(Debug, Parser)]
#[command(
	version = dossier_cli::VERSION,
	rename_all = "kebab",
	styles = dossier_cli::styles(),
)]
pub struct Args {
	/// Full name of the person to investigate.
	#[arg(long, short = 't', value_name = "NAME")]
	pub target: String,
	/// Disambiguating context, e.g. an employer or city.
	#[arg(long, value_name = "TEXT")]
	pub context: Option<String>,
	#[arg(long = "alias", value_name = "NAME")]
	pub aliases: Vec<String>,
	/// Overrides `investigation.max_iterations`.
	#[arg(long, short = 'n', value_name = "N")]
	pub iterations: Option<u32>,
	/// Overrides `service.output_dir`.
	#[arg(long, short = 'o', value_name = "DIR")]
	pub output: Option<PathBuf>,
	#[arg(long)]
	pub debug: bool,
	#[arg(long, short = 'c', value_name = "FILE", default_value = "dossier.toml")]
	pub config: PathBuf,
}
impl Args {
	fn request(&self) -> InvestigateRequest {
		InvestigateRequest {
			target: self.target.clone(),
			context: self.context.clone(),
			aliases: self.aliases.clone(),
			max_iterations: self.iterations,
		}
	}
}

/// Files written by one run.
#[derive(Debug)]
pub struct RunOutput {
	pub snapshot: PathBuf,
	pub audit_log: PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = dossier_config::load(&args.config)?;

	init_tracing(&config, args.debug);

	let output_dir = args.output.clone().unwrap_or_else(|| config.service.output_dir.clone());
	let paths = output_paths(&output_dir, &args.target, OffsetDateTime::now_utc())?;
	let sink = Arc::new(JsonlSink::create(&paths.audit_log)?);
	let service = DossierService::new(config).with_audit(sink);
	let snapshot = match service.investigate(args.request()).await {
		Ok(snapshot) => snapshot,
		Err(err) => {
			tracing::error!(error = %err, audit_log = %paths.audit_log.display(), "Investigation aborted.");

			return Err(err.into());
		},
	};

	write_snapshot(&paths.snapshot, &snapshot)?;

	println!("{}", summary(&snapshot, &paths));

	Ok(())
}

/// `<dir>/reports/<target>_<ts>_snapshot.json` and `<dir>/logs/<target>_<ts>.jsonl`.
pub fn output_paths(
	output_dir: &Path,
	target: &str,
	now: OffsetDateTime,
) -> color_eyre::Result<RunOutput> {
	let stamp = now.format(format_description!("[year][month][day]_[hour][minute][second]"))?;
	let stem = dossier_cli::file_stem(target);

	Ok(RunOutput {
		snapshot: output_dir.join("reports").join(format!("{stem}_{stamp}_snapshot.json")),
		audit_log: output_dir.join("logs").join(format!("{stem}_{stamp}.jsonl")),
	})
}

pub fn write_snapshot(path: &Path, snapshot: &InvestigationSnapshot) -> color_eyre::Result<()> {
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent)?;
	}

	fs::write(path, serde_json::to_vec_pretty(snapshot)?)?;

	tracing::info!(path = %path.display(), version = snapshot.version, "Snapshot written.");

	Ok(())
}

pub fn summary(snapshot: &InvestigationSnapshot, paths: &RunOutput) -> String {
	let verification = &snapshot.summary.verification;
	let risk = &snapshot.summary.risk;
	let mut lines = vec![
		format!(
			"Investigation of {} finished as {:?} after {}/{} iterations.",
			snapshot.target.name, snapshot.status, snapshot.iteration, snapshot.budget
		),
		format!(
			"Findings: {} ({} verified), risks: {} (score {:.1}, {:?}), connections: {}, sources: {}.",
			snapshot.findings.len(),
			verification.verified,
			snapshot.risks.len(),
			risk.score,
			risk.level,
			snapshot.connections.len(),
			snapshot.sources.len()
		),
	];

	for critical in snapshot.critical_risks() {
		lines.push(format!("Critical risk [{}]: {}", critical.category, critical.description));
	}

	if snapshot.counters.degraded_calls > 0 || snapshot.counters.malformed_items > 0 {
		lines.push(format!(
			"Degraded calls: {}, malformed candidates dropped: {}.",
			snapshot.counters.degraded_calls, snapshot.counters.malformed_items
		));
	}

	lines.push(format!("Snapshot: {}", paths.snapshot.display()));
	lines.push(format!("Audit log: {}", paths.audit_log.display()));

	lines.join("\n")
}

fn init_tracing(config: &Config, debug: bool) {
	let level = if debug { "debug" } else { config.service.log_level.as_str() };
	let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

	if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_err() {
		tracing::debug!("Tracing subscriber already installed.");
	}
}
