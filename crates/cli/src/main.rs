use chatgate_cli::cli::Cli;
use chatgate_cli::http::{self, AppState};
use chatgate_cli::{bootstrap, logging};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, warn};

#[tokio::main]
async fn main() {
	let dotenv = dotenvy::dotenv();
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);
	if let Err(err) = dotenv {
		if !err.not_found() {
			warn!(target = "chatgate", error = %err, "failed to load .env");
		}
	}

	if let Err(err) = run(cli).await {
		error!(target = "chatgate", error = %err, "server failed");
		std::process::exit(1);
	}
}

async fn run(cli: Cli) -> anyhow::Result<()> {
	let manager = bootstrap::build_manager(&cli)?;
	let listener = TcpListener::bind((cli.host, cli.port)).await?;

	if cli.init {
		manager.init().await;
	}

	http::serve(listener, AppState::new(manager), shutdown_signal()).await?;
	Ok(())
}

async fn shutdown_signal() {
	if let Err(err) = tokio::signal::ctrl_c().await {
		warn!(target = "chatgate", error = %err, "failed to listen for ctrl-c");
		std::future::pending::<()>().await;
	}
}
