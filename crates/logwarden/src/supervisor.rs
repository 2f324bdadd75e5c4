use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bridge;
use crate::buffer::MessageBuffer;
use crate::classify::Classifier;
use crate::config::Configuration;
use crate::error::{BridgeError, HandleError, ReattachError, StartError, StopError};
use crate::handle::{self, HandleStore, Liveness};
use crate::sink::EventSink;
use crate::types::*;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Owns at most one external process at a time.
///
/// Cloning is cheap; all clones drive the same session.
#[derive(Clone)]
pub struct ProcessSupervisor {
	inner: Arc<Inner>,
	reattach_poll: Duration,
}

struct Inner {
	slot: Mutex<Slot>,
	state_tx: watch::Sender<SupervisorState>,
	buffer: MessageBuffer,
	sink: Arc<dyn EventSink>,
	store: Arc<dyn HandleStore>,
	seq: AtomicU64,
}

struct Slot {
	state: SupervisorState,
	session: Option<Session>,
	/// Bumped on every new session so stale poll loops cannot tear down a newer one.
	generation: u64,
}

struct Session {
	pid: u32,
	process: Process,
	cancel: CancellationToken,
	readers: Vec<JoinHandle<()>>,
	poll_interval: Duration,
	/// Exit code, once the poller has reaped the child.
	exited: Option<Option<i32>>,
}

enum Process {
	Spawned(Child),
	/// Left behind by an earlier run and picked up through `reattach`.
	Adopted { command: String },
}

enum Cause {
	Exited { code: Option<i32> },
	Disconnected,
}

enum PollOutcome {
	Running,
	Exited(Option<i32>),
	Superseded,
}

impl ProcessSupervisor {
	pub fn new(sink: Arc<dyn EventSink>, store: Arc<dyn HandleStore>) -> Self {
		let (state_tx, _) = watch::channel(SupervisorState::Idle);
		Self {
			inner: Arc::new(Inner {
				slot: Mutex::new(Slot {
					state: SupervisorState::Idle,
					session: None,
					generation: 0,
				}),
				state_tx,
				buffer: MessageBuffer::default(),
				sink,
				store,
				seq: AtomicU64::new(0),
			}),
			reattach_poll: DEFAULT_POLL_INTERVAL,
		}
	}

	/// Poll interval for processes adopted through `reattach`, which have no
	/// configuration of their own.
	pub fn with_reattach_poll_interval(mut self, interval: Duration) -> Self {
		self.reattach_poll = interval;
		self
	}

	pub fn state(&self) -> SupervisorState {
		self.inner.lock().state
	}

	pub fn subscribe_state(&self) -> watch::Receiver<SupervisorState> {
		self.inner.state_tx.subscribe()
	}

	pub fn pid(&self) -> Option<u32> {
		self.inner.lock().session.as_ref().map(|s| s.pid)
	}

	pub fn buffer(&self) -> &MessageBuffer {
		&self.inner.buffer
	}

	pub fn snapshot(&self) -> Vec<LogRecord> {
		self.inner.buffer.snapshot()
	}

	pub fn clear(&self) {
		self.inner.buffer.clear();
	}

	/// The handle left behind by a previous run, if any.
	pub fn load_handle(&self) -> Result<Option<PersistentHandle>, HandleError> {
		self.inner.store.load()
	}

	pub async fn start(&self, config: Configuration) -> Result<PersistentHandle, StartError> {
		let config = Arc::new(config);
		let mut slot = self.inner.lock();
		if slot.state.is_active() {
			return Err(StartError::AlreadyRunning);
		}
		let previous = slot.state;
		self.inner.set_state(&mut slot, SupervisorState::Starting);

		let (mut child, resolved) = match spawn_child(&config) {
			Ok(spawned) => spawned,
			Err(e) => {
				self.inner.set_state(&mut slot, previous);
				drop(slot);
				tracing::warn!("start failed: {}", e);
				let text = match &e {
					StartError::ExecutableNotFound { path } => format!(
						"{} not found; install the Android SDK platform-tools or set command_path",
						path.display()
					),
					other => other.to_string(),
				};
				self.inner.notice(text, Severity::Error);
				return Err(e);
			}
		};

		let pid = child.id().unwrap_or(0);
		let handle = PersistentHandle {
			pid,
			command: resolved.display().to_string(),
		};

		self.inner
			.buffer
			.reconfigure(config.buffer_capacity, config.eviction_batch_size);
		let classifier = Arc::new(config.classifier());
		let cancel = CancellationToken::new();
		let mut readers = Vec::with_capacity(2);
		if let Some(stdout) = child.stdout.take() {
			readers.push(tokio::spawn(read_lines(
				stdout,
				Stream::Stdout,
				Arc::clone(&self.inner),
				Arc::clone(&classifier),
				cancel.clone(),
			)));
		}
		if let Some(stderr) = child.stderr.take() {
			readers.push(tokio::spawn(read_lines(
				stderr,
				Stream::Stderr,
				Arc::clone(&self.inner),
				Arc::clone(&classifier),
				cancel.clone(),
			)));
		}

		slot.generation += 1;
		let generation = slot.generation;
		slot.session = Some(Session {
			pid,
			process: Process::Spawned(child),
			cancel: cancel.clone(),
			readers,
			poll_interval: config.poll_interval(),
			exited: None,
		});
		self.inner.set_state(&mut slot, SupervisorState::Running);
		drop(slot);

		if let Err(e) = self.inner.store.save(&handle) {
			tracing::warn!("failed to persist handle for pid {}: {}", pid, e);
		}

		tokio::spawn(poll_liveness(
			Arc::clone(&self.inner),
			generation,
			config.poll_interval(),
			cancel,
		));

		tracing::info!("started {} (pid {})", handle.command, pid);
		self.inner.sink.on_lifecycle(&LifecycleEvent::Started { pid });
		Ok(handle)
	}

	/// Stop the current session. A no-op when nothing is running, so repeated
	/// calls release the process once. Returns after the session is fully
	/// released, including one another caller is already tearing down.
	pub async fn stop(&self) -> Result<(), StopError> {
		let mut state = self.inner.state_tx.subscribe();
		if !self.inner.teardown(None, Cause::Disconnected).await? {
			let _ = state.wait_for(|s| *s != SupervisorState::Stopping).await;
		}
		Ok(())
	}

	/// Check whether the process behind `handle` survived a restart.
	///
	/// A dead or reused pid clears the store and yields `false`. A live one is
	/// adopted without pipes so the caller can `stop()` it; output is never
	/// resumed.
	pub async fn reattach(&self, handle: &PersistentHandle) -> Result<bool, ReattachError> {
		let active = self.inner.lock().state.is_active();
		if active {
			return Err(ReattachError::AlreadyRunning);
		}

		let liveness = handle::probe(handle.pid).map_err(|source| ReattachError::Probe {
			pid: handle.pid,
			source,
		})?;
		let ours = liveness == Liveness::Alive && handle::command_matches(handle.pid, &handle.command);
		if !ours {
			tracing::info!("stale handle for pid {} ({:?}), clearing", handle.pid, liveness);
			self.inner.store.clear()?;
			return Ok(false);
		}

		let cancel = CancellationToken::new();
		let generation = {
			let mut slot = self.inner.lock();
			if slot.state.is_active() {
				return Err(ReattachError::AlreadyRunning);
			}
			slot.generation += 1;
			slot.session = Some(Session {
				pid: handle.pid,
				process: Process::Adopted {
					command: handle.command.clone(),
				},
				cancel: cancel.clone(),
				readers: Vec::new(),
				poll_interval: self.reattach_poll,
				exited: None,
			});
			self.inner.set_state(&mut slot, SupervisorState::Running);
			slot.generation
		};

		tokio::spawn(poll_liveness(
			Arc::clone(&self.inner),
			generation,
			self.reattach_poll,
			cancel,
		));

		tracing::info!("reattached to orphan pid {}", handle.pid);
		self.inner
			.sink
			.on_lifecycle(&LifecycleEvent::Reattached { pid: handle.pid });
		Ok(true)
	}

	/// Run `<command> kill-server`. Refused while a session is live.
	pub async fn kill_server(&self, command: &Path) -> Result<String, BridgeError> {
		let active = self.inner.lock().state.is_active();
		if active {
			return Err(BridgeError::SessionActive);
		}
		match bridge::kill_server(command).await {
			Ok(out) => {
				self.inner
					.notice("Adb server successfully killed".to_string(), Severity::Info);
				Ok(out)
			}
			Err(e) => {
				self.inner.notice(e.to_string(), Severity::Error);
				Err(e)
			}
		}
	}
}

impl Inner {
	fn lock(&self) -> MutexGuard<'_, Slot> {
		self.slot.lock().unwrap_or_else(|e| e.into_inner())
	}

	fn set_state(&self, slot: &mut Slot, state: SupervisorState) {
		slot.state = state;
		self.state_tx.send_replace(state);
	}

	fn record(&self, text: String, severity: Severity, stream: Stream) {
		let record = LogRecord {
			text,
			severity,
			stream,
			seq: self.seq.fetch_add(1, Ordering::Relaxed),
		};
		self.buffer.append(record.clone());
		self.sink.on_message(&record);
	}

	fn notice(&self, text: String, severity: Severity) {
		self.record(text, severity, Stream::Supervisor);
	}

	fn check(&self, generation: u64) -> PollOutcome {
		let mut slot = self.lock();
		if slot.generation != generation || slot.state != SupervisorState::Running {
			return PollOutcome::Superseded;
		}
		let Some(session) = slot.session.as_mut() else {
			return PollOutcome::Superseded;
		};
		match &mut session.process {
			Process::Spawned(child) => match child.try_wait() {
				Ok(Some(status)) => {
					session.exited = Some(status.code());
					PollOutcome::Exited(status.code())
				}
				Ok(None) => PollOutcome::Running,
				Err(e) => {
					tracing::warn!("wait on pid {} failed: {}", session.pid, e);
					PollOutcome::Exited(None)
				}
			},
			Process::Adopted { command } => {
				let alive = matches!(handle::probe(session.pid), Ok(Liveness::Alive))
					&& handle::command_matches(session.pid, command);
				if alive {
					PollOutcome::Running
				} else {
					PollOutcome::Exited(None)
				}
			}
		}
	}

	/// Release the session exactly once. Returns whether this call did the work.
	async fn teardown(&self, generation: Option<u64>, cause: Cause) -> Result<bool, StopError> {
		let session = {
			let mut slot = self.lock();
			if slot.state != SupervisorState::Running {
				return Ok(false);
			}
			if generation.is_some_and(|g| g != slot.generation) {
				return Ok(false);
			}
			let Some(session) = slot.session.take() else {
				self.set_state(&mut slot, SupervisorState::Stopped);
				return Ok(false);
			};
			self.set_state(&mut slot, SupervisorState::Stopping);
			session
		};

		let Session {
			pid,
			process,
			cancel,
			mut readers,
			poll_interval,
			exited,
		} = session;

		let mut result = Ok(true);
		let event = match cause {
			Cause::Disconnected => {
				cancel.cancel();
				for reader in &readers {
					reader.abort();
				}
				for reader in readers {
					let _ = reader.await;
				}
				if let Some(code) = exited {
					// already reaped by the poller, only leftovers in its group remain
					if let Err(e) = terminate_group(pid) {
						tracing::warn!("failed to signal group {}: {}", pid, e);
					}
					tracing::info!("pid {} exited before stop (code {:?})", pid, code);
					LifecycleEvent::ProcessExited { pid, code }
				} else {
					if let Err(source) = terminate(pid) {
						tracing::warn!("failed to terminate pid {}: {}", pid, source);
						result = Err(StopError::Signal { pid, source });
					}
					if let Process::Spawned(mut child) = process {
						tokio::spawn(async move {
							let _ = child.wait().await;
						});
					}
					tracing::info!("disconnected from pid {}", pid);
					LifecycleEvent::ProcessDisconnected { pid }
				}
			}
			Cause::Exited { code } => {
				// the pipes close with the process; give the readers one poll
				// interval to deliver what is still buffered
				let drain = async {
					for reader in readers.iter_mut() {
						let _ = reader.await;
					}
				};
				if tokio::time::timeout(poll_interval, drain).await.is_err() {
					tracing::debug!("readers for pid {} still open after exit", pid);
				}
				cancel.cancel();
				for reader in readers {
					if !reader.is_finished() {
						reader.abort();
						let _ = reader.await;
					}
				}
				// descendants may outlive the leader and keep the pipes open
				if let Process::Spawned(_) = process {
					if let Err(e) = terminate_group(pid) {
						tracing::warn!("failed to signal group {}: {}", pid, e);
					}
				}
				tracing::info!("pid {} exited (code {:?})", pid, code);
				LifecycleEvent::ProcessExited { pid, code }
			}
		};

		if let Err(e) = self.store.clear() {
			tracing::warn!("failed to clear handle for pid {}: {}", pid, e);
		}
		{
			let mut slot = self.lock();
			self.set_state(&mut slot, SupervisorState::Stopped);
		}
		self.sink.on_lifecycle(&event);
		result
	}
}

fn spawn_child(config: &Configuration) -> Result<(Child, PathBuf), StartError> {
	let resolved = bridge::resolve_executable(&config.command_path).ok_or_else(|| {
		StartError::ExecutableNotFound {
			path: config.command_path.clone(),
		}
	})?;

	let mut cmd = Command::new(&resolved);
	cmd.args(config.command_args())
		.stdin(Stdio::null())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.process_group(0);

	let child = cmd.spawn().map_err(|e| match e.kind() {
		std::io::ErrorKind::NotFound => StartError::ExecutableNotFound {
			path: resolved.clone(),
		},
		_ => StartError::SpawnFailed(e),
	})?;
	if child.id().is_none() {
		return Err(StartError::SpawnFailed(std::io::Error::other(
			"child exited before its pid was read",
		)));
	}
	Ok((child, resolved))
}

async fn read_lines<R: AsyncRead + Unpin>(
	reader: R,
	stream: Stream,
	inner: Arc<Inner>,
	classifier: Arc<Classifier>,
	cancel: CancellationToken,
) {
	let mut reader = BufReader::new(reader);
	let mut buf = Vec::new();
	loop {
		buf.clear();
		let read = tokio::select! {
			_ = cancel.cancelled() => break,
			read = reader.read_until(b'\n', &mut buf) => read,
		};
		match read {
			Ok(0) => break,
			Ok(_) => {
				let line = String::from_utf8_lossy(&buf);
				let line = line.trim_end_matches(['\n', '\r']);
				if line.is_empty() {
					continue;
				}
				let (text, severity) = classifier.annotate(line);
				inner.record(text, severity, stream);
			}
			Err(e) => {
				tracing::debug!("{:?} read ended: {}", stream, e);
				break;
			}
		}
	}
}

async fn poll_liveness(
	inner: Arc<Inner>,
	generation: u64,
	interval: Duration,
	cancel: CancellationToken,
) {
	let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
	ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
	loop {
		tokio::select! {
			_ = cancel.cancelled() => return,
			_ = ticker.tick() => {}
		}
		match inner.check(generation) {
			PollOutcome::Running => continue,
			PollOutcome::Superseded => return,
			PollOutcome::Exited(code) => {
				let _ = inner.teardown(Some(generation), Cause::Exited { code }).await;
				return;
			}
		}
	}
}

/// SIGTERM the process group led by `pid`, falling back to the pid alone for
/// processes that do not lead a group. A process that is already gone is fine.
pub fn terminate(pid: u32) -> Result<(), nix::Error> {
	if pid == 0 || pid > i32::MAX as u32 {
		return Ok(());
	}
	let target = Pid::from_raw(pid as i32);
	match killpg(target, Signal::SIGTERM) {
		Ok(()) => Ok(()),
		Err(Errno::ESRCH) => match kill(target, Signal::SIGTERM) {
			Ok(()) | Err(Errno::ESRCH) => Ok(()),
			Err(e) => Err(e),
		},
		Err(e) => Err(e),
	}
}

/// SIGTERM whatever is left in the group led by `pid`. An empty group is fine.
fn terminate_group(pid: u32) -> Result<(), nix::Error> {
	if pid == 0 || pid > i32::MAX as u32 {
		return Ok(());
	}
	match killpg(Pid::from_raw(pid as i32), Signal::SIGTERM) {
		Ok(()) | Err(Errno::ESRCH) => Ok(()),
		Err(e) => Err(e),
	}
}
