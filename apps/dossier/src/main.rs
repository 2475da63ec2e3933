use clap::Parser;

use dossier::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	dossier::run(args).await
}
