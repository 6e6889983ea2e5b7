use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` wins over `verbose` when set.
pub fn init_logging(verbose: u8) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));
	let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init();
}

fn default_directives(verbose: u8) -> String {
	let ours = match verbose {
		0 | 1 => "info",
		_ => "debug",
	};
	let deps = match verbose {
		0 => "warn",
		1 => "info",
		_ => "debug",
	};
	format!("{deps},chatgate={ours},chatgate_cli={ours},chatgate_runtime={ours},chatgate_protocol={ours}")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn verbosity_raises_dependency_level() {
		assert!(default_directives(0).starts_with("warn,"));
		assert!(default_directives(1).starts_with("info,"));
		assert!(default_directives(2).contains("chatgate=debug"));
		assert!(EnvFilter::try_new(default_directives(2)).is_ok());
	}
}
