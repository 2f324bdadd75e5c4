//! Durable storage of the in-flight process id, and probes used to decide
//! whether a stored id still refers to our process.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;

use crate::error::HandleError;
use crate::types::PersistentHandle;

/// Somewhere a single handle outlives the supervising program.
pub trait HandleStore: Send + Sync {
	fn save(&self, handle: &PersistentHandle) -> Result<(), HandleError>;
	fn load(&self) -> Result<Option<PersistentHandle>, HandleError>;
	fn clear(&self) -> Result<(), HandleError>;
}

/// JSON file under the state directory.
#[derive(Debug, Clone)]
pub struct FileHandleStore {
	path: PathBuf,
}

impl FileHandleStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

impl HandleStore for FileHandleStore {
	fn save(&self, handle: &PersistentHandle) -> Result<(), HandleError> {
		if let Some(parent) = self.path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		let data = serde_json::to_vec(handle)?;
		let tmp = self.path.with_extension("json.tmp");
		std::fs::write(&tmp, data)?;
		std::fs::rename(&tmp, &self.path)?;
		Ok(())
	}

	fn load(&self) -> Result<Option<PersistentHandle>, HandleError> {
		match std::fs::read(&self.path) {
			Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(e.into()),
		}
	}

	fn clear(&self) -> Result<(), HandleError> {
		match std::fs::remove_file(&self.path) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(e.into()),
		}
	}
}

/// In-process store for embedders that persist elsewhere, and for tests.
#[derive(Debug, Default)]
pub struct MemoryHandleStore {
	slot: Mutex<Option<PersistentHandle>>,
}

impl MemoryHandleStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with(handle: PersistentHandle) -> Self {
		Self {
			slot: Mutex::new(Some(handle)),
		}
	}
}

impl HandleStore for MemoryHandleStore {
	fn save(&self, handle: &PersistentHandle) -> Result<(), HandleError> {
		*self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle.clone());
		Ok(())
	}

	fn load(&self) -> Result<Option<PersistentHandle>, HandleError> {
		Ok(self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone())
	}

	fn clear(&self) -> Result<(), HandleError> {
		*self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
		Ok(())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
	Alive,
	Dead,
	/// Exists but belongs to someone we may not signal.
	Foreign,
}

pub fn probe(pid: u32) -> Result<Liveness, nix::Error> {
	if pid == 0 || pid > i32::MAX as u32 {
		return Ok(Liveness::Dead);
	}
	match kill(Pid::from_raw(pid as i32), None) {
		Ok(()) => Ok(Liveness::Alive),
		Err(Errno::ESRCH) => Ok(Liveness::Dead),
		Err(Errno::EPERM) => Ok(Liveness::Foreign),
		Err(e) => Err(e),
	}
}

pub fn process_alive(pid: u32) -> bool {
	matches!(probe(pid), Ok(Liveness::Alive))
}

/// Whether `pid` is running `command`. Zombies count as not running.
#[cfg(target_os = "linux")]
pub fn command_matches(pid: u32, command: &str) -> bool {
	let proc_dir = PathBuf::from("/proc").join(pid.to_string());
	if let Ok(stat) = std::fs::read_to_string(proc_dir.join("stat")) {
		// state is the first field after the parenthesised comm
		if let Some(rest) = stat.rfind(')').map(|i| &stat[i + 1..]) {
			if rest.trim_start().starts_with('Z') {
				return false;
			}
		}
	}
	let Ok(cmdline) = std::fs::read(proc_dir.join("cmdline")) else {
		return false;
	};
	let expected = Path::new(command);
	// scripts show up as `<interpreter> <script>`, so look at the first two words
	cmdline
		.split(|&b| b == 0)
		.take(2)
		.map(String::from_utf8_lossy)
		.any(|arg| arg == command || Path::new(arg.as_ref()).file_name() == expected.file_name())
}

#[cfg(not(target_os = "linux"))]
pub fn command_matches(pid: u32, _command: &str) -> bool {
	process_alive(pid)
}
