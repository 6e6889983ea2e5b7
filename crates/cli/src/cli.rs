use std::net::IpAddr;
use std::path::PathBuf;

use chatgate::StoreBackend;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "chatgate")]
#[command(about = "HTTP control surface for a session-backed chat client")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// JSON config file; flags and environment variables override its values
	#[arg(long, env = "CHATGATE_CONFIG", value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Address to bind the HTTP server to
	#[arg(long, env = "CHATGATE_HOST", default_value = "0.0.0.0")]
	pub host: IpAddr,

	#[arg(short, long, env = "PORT", default_value_t = 3000)]
	pub port: u16,

	/// Session id; selects which persisted session is restored
	#[arg(long, env = "SESSION_NAME")]
	pub session: Option<String>,

	/// Credential store backend (memory, fs, http, s3)
	#[arg(long, env = "CHATGATE_STORE", value_name = "BACKEND")]
	pub store: Option<StoreBackend>,

	#[arg(long, env = "AWS_BUCKET_NAME")]
	pub bucket: Option<String>,

	/// Key prefix inside the bucket
	#[arg(long, env = "AWS_BUCKET_PATH")]
	pub bucket_path: Option<String>,

	#[arg(long, env = "AWS_REGION")]
	pub region: Option<String>,

	/// Base URL of the http store, or an S3-compatible endpoint for s3
	#[arg(long, env = "STORE_ENDPOINT")]
	pub store_endpoint: Option<String>,

	/// Bearer token for the http store
	#[arg(long, env = "STORE_TOKEN", hide_env_values = true)]
	pub store_token: Option<String>,

	#[arg(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
	pub access_key_id: Option<String>,

	#[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
	pub secret_access_key: Option<String>,

	/// Root directory of the fs store
	#[arg(long, env = "CHATGATE_STORE_ROOT", value_name = "DIR")]
	pub store_root: Option<PathBuf>,

	/// Engine helper command line, e.g. "node engine.js"
	#[arg(long, env = "CHATGATE_ENGINE_CMD", default_value = "chatgate-engine")]
	pub engine_cmd: String,

	/// Disable automatic reconnection after unsolicited disconnects
	#[arg(long)]
	pub no_reconnect: bool,

	/// Start the session immediately instead of waiting for POST /init
	#[arg(long)]
	pub init: bool,
}
