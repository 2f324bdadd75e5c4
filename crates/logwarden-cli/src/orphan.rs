use logwarden::{ProcessSupervisor, ReattachError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cleanup {
	/// No handle was stored.
	Nothing,
	/// A handle was stored but its process is gone or no longer ours.
	Stale,
	/// A live orphan was adopted and stopped.
	Stopped { pid: u32 },
}

/// Stop whatever a previous run left behind.
pub async fn clean_up(sup: &ProcessSupervisor) -> Result<Cleanup, ReattachError> {
	let Some(handle) = sup.load_handle()? else {
		return Ok(Cleanup::Nothing);
	};
	if !sup.reattach(&handle).await? {
		return Ok(Cleanup::Stale);
	}
	if let Err(e) = sup.stop().await {
		tracing::warn!("failed to stop orphan pid {}: {}", handle.pid, e);
	}
	Ok(Cleanup::Stopped { pid: handle.pid })
}

/// Whether `run` should go on to start a session after cleanup.
pub fn should_start(cleanup: Cleanup, reconnect_on_restart: bool) -> bool {
	match cleanup {
		Cleanup::Stopped { .. } => reconnect_on_restart,
		Cleanup::Nothing | Cleanup::Stale => true,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;

	use logwarden::{MemoryHandleStore, NullSink, PersistentHandle};

	#[tokio::test]
	async fn nothing_stored() {
		let sup = ProcessSupervisor::new(Arc::new(NullSink), Arc::new(MemoryHandleStore::new()));
		assert_eq!(clean_up(&sup).await.unwrap(), Cleanup::Nothing);
	}

	#[tokio::test]
	async fn dead_pid_is_stale_and_cleared() {
		let mut child = std::process::Command::new("true").spawn().unwrap();
		let pid = child.id();
		child.wait().unwrap();

		let store = Arc::new(MemoryHandleStore::with(PersistentHandle {
			pid,
			command: "true".into(),
		}));
		let sup = ProcessSupervisor::new(Arc::new(NullSink), store);
		assert_eq!(clean_up(&sup).await.unwrap(), Cleanup::Stale);
		assert_eq!(sup.load_handle().unwrap(), None);
	}

	#[test]
	fn reconnect_flag_only_gates_after_a_real_orphan() {
		assert!(should_start(Cleanup::Nothing, false));
		assert!(should_start(Cleanup::Stale, false));
		assert!(should_start(Cleanup::Stopped { pid: 1 }, true));
		assert!(!should_start(Cleanup::Stopped { pid: 1 }, false));
	}
}
