//! Error types for the supervisor and its stores.

use std::path::PathBuf;

/// Why a session could not be started. State is left at `Idle`/`Stopped`.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
	#[error("a session is already running")]
	AlreadyRunning,

	#[error("executable not found: {}", path.display())]
	ExecutableNotFound { path: PathBuf },

	#[error("spawn failed: {0}")]
	SpawnFailed(#[source] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum StopError {
	#[error("failed to signal process {pid}: {source}")]
	Signal {
		pid: u32,
		#[source]
		source: nix::Error,
	},
}

#[derive(Debug, thiserror::Error)]
pub enum ReattachError {
	#[error("a session is already running")]
	AlreadyRunning,

	#[error("failed to probe process {pid}: {source}")]
	Probe {
		pid: u32,
		#[source]
		source: nix::Error,
	},

	#[error(transparent)]
	Store(#[from] HandleError),
}

#[derive(Debug, thiserror::Error)]
pub enum HandleError {
	#[error("handle store I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("corrupt handle record: {0}")]
	Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("failed to read {}: {source}", path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse {}: {source}", path.display())]
	Parse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},
}

/// Failure of the one-shot `kill-server` helper.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
	#[error("a session is running; stop it first")]
	SessionActive,

	#[error("executable not found: {}", path.display())]
	ExecutableNotFound { path: PathBuf },

	#[error("failed to run {}: {source}", path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("{command} exited with code {code:?}: {stderr}")]
	Failed {
		command: String,
		code: Option<i32>,
		stderr: String,
	},
}
