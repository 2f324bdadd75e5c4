use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
	Info,
	Warning,
	Error,
	Raw,
}

impl Severity {
	pub fn label(&self) -> &'static str {
		match self {
			Severity::Info => "info",
			Severity::Warning => "warn",
			Severity::Error => "error",
			Severity::Raw => "raw",
		}
	}
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stream {
	Stdout,
	Stderr,
	/// Notices produced by the supervisor itself.
	Supervisor,
}

/// One classified line of output. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
	pub text: String,
	pub severity: Severity,
	pub stream: Stream,
	/// Arrival order across the whole session.
	pub seq: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
	Idle,
	Starting,
	Running,
	Stopping,
	Stopped,
}

impl SupervisorState {
	pub fn is_active(&self) -> bool {
		matches!(
			self,
			SupervisorState::Starting | SupervisorState::Running | SupervisorState::Stopping
		)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
	Started { pid: u32 },
	/// The external process terminated on its own.
	ProcessExited { pid: u32, code: Option<i32> },
	/// The caller stopped the process.
	ProcessDisconnected { pid: u32 },
	/// An orphan from a previous run was found alive and adopted for stopping.
	Reattached { pid: u32 },
}

impl LifecycleEvent {
	pub fn pid(&self) -> u32 {
		match self {
			LifecycleEvent::Started { pid }
			| LifecycleEvent::ProcessExited { pid, .. }
			| LifecycleEvent::ProcessDisconnected { pid }
			| LifecycleEvent::Reattached { pid } => *pid,
		}
	}
}

/// Durable record of an in-flight external process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistentHandle {
	pub pid: u32,
	pub command: String,
}
