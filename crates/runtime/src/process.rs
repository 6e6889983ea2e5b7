//! Process liveness and termination helpers for engine teardown.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::debug;

/// Returns `true` when a process with `pid` appears alive on this platform.
pub fn pid_is_alive(pid: u32) -> bool {
	#[cfg(unix)]
	{
		if pid == 0 {
			return false;
		}

		if PathBuf::from("/proc").exists() {
			return proc_entry_is_running(pid);
		}

		Command::new("kill")
			.arg("-0")
			.arg(pid.to_string())
			.stderr(Stdio::null())
			.status()
			.map(|status| status.success())
			.unwrap_or(pid == std::process::id())
	}

	#[cfg(windows)]
	{
		let filter = format!("PID eq {pid}");
		if let Ok(output) = Command::new("tasklist").args(["/FI", &filter, "/FO", "CSV", "/NH"]).output() {
			if output.status.success() {
				let stdout = String::from_utf8_lossy(&output.stdout);
				return tasklist_has_pid(stdout.as_ref(), pid);
			}
		}

		pid == std::process::id()
	}

	#[cfg(not(any(unix, windows)))]
	{
		pid == std::process::id()
	}
}

/// Signal delivered to an engine's process group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupSignal {
	Terminate,
	Kill,
}

/// Signals every process in the group led by `pgid`.
///
/// Engines are spawned as group leaders so helpers they start (browsers,
/// renderers) go down with them. Returns `true` when the signal was delivered.
pub fn signal_process_group(pgid: u32, signal: GroupSignal) -> bool {
	if pgid == 0 {
		return false;
	}

	#[cfg(unix)]
	let status = {
		let flag = match signal {
			GroupSignal::Terminate => "-TERM",
			GroupSignal::Kill => "-KILL",
		};
		Command::new("kill").args([flag, "--", &format!("-{pgid}")]).stderr(Stdio::null()).status()
	};

	#[cfg(windows)]
	let status = {
		let _ = signal;
		Command::new("taskkill")
			.args(["/PID", &pgid.to_string(), "/T", "/F"])
			.stdout(Stdio::null())
			.stderr(Stdio::null())
			.status()
	};

	#[cfg(not(any(unix, windows)))]
	let status: std::io::Result<std::process::ExitStatus> = {
		let _ = signal;
		Err(std::io::Error::from(std::io::ErrorKind::Unsupported))
	};

	match status {
		Ok(status) if status.success() => true,
		Ok(_) => false,
		Err(e) => {
			debug!(target = "chatgate.engine", pgid, ?signal, error = %e, "failed to signal process group");
			false
		}
	}
}

/// Returns `true` while any non-zombie process remains in the group led by `pgid`.
pub fn group_is_alive(pgid: u32) -> bool {
	if pgid == 0 {
		return false;
	}

	#[cfg(unix)]
	{
		if PathBuf::from("/proc").exists() {
			return proc_group_has_running(pgid);
		}

		Command::new("kill")
			.args(["-0", "--", &format!("-{pgid}")])
			.stderr(Stdio::null())
			.status()
			.map(|status| status.success())
			.unwrap_or(false)
	}

	#[cfg(not(unix))]
	{
		pid_is_alive(pgid)
	}
}

#[cfg(unix)]
fn proc_group_has_running(pgid: u32) -> bool {
	let Ok(entries) = std::fs::read_dir("/proc") else {
		return false;
	};
	entries
		.filter_map(|entry| entry.ok())
		.filter(|entry| entry.file_name().to_str().is_some_and(|name| name.bytes().all(|b| b.is_ascii_digit())))
		.filter_map(|entry| std::fs::read_to_string(entry.path().join("stat")).ok())
		.any(|stat| stat_is_running_in_group(&stat, pgid))
}

/// `/proc/<pid>/stat` fields after the command name: state, ppid, pgrp.
#[cfg(any(test, unix))]
fn stat_is_running_in_group(stat: &str, pgid: u32) -> bool {
	let Some((_, rest)) = stat.rsplit_once(')') else {
		return false;
	};
	let mut fields = rest.split_whitespace();
	let state = fields.next();
	let group = fields.nth(1).and_then(|field| field.parse::<u32>().ok());
	group == Some(pgid) && state.is_some_and(|state| state != "Z")
}

/// Zombies still have a `/proc` entry; treat state `Z` as gone.
#[cfg(unix)]
fn proc_entry_is_running(pid: u32) -> bool {
	let stat = PathBuf::from("/proc").join(pid.to_string()).join("stat");
	match std::fs::read_to_string(stat) {
		Ok(content) => content
			.rsplit_once(')')
			.and_then(|(_, rest)| rest.split_whitespace().next())
			.is_none_or(|state| state != "Z"),
		Err(_) => false,
	}
}

#[cfg(any(test, windows))]
fn tasklist_has_pid(output: &str, pid: u32) -> bool {
	let pid_str = pid.to_string();
	output.lines().any(|line| {
		let line = line.trim();
		line.starts_with('"')
			&& line
				.trim_matches('"')
				.split("\",\"")
				.nth(1)
				.is_some_and(|field| field.trim() == pid_str.as_str())
	})
}
