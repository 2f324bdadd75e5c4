//! # logwarden
//!
//! Supervisor for an external log-tailing process such as `adb logcat`.
//!
//! Spawns the process, streams stdout and stderr line by line, classifies
//! each line, keeps a bounded buffer, and forwards everything to an
//! [`EventSink`]. The process id is persisted so that a restarted supervisor
//! can find and stop an orphan with [`ProcessSupervisor::reattach`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use logwarden::{ChannelSink, Configuration, FileHandleStore, ProcessSupervisor, AppPaths};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let (sink, mut events) = ChannelSink::new();
//! let store = FileHandleStore::new(AppPaths::default().handle_path());
//! let sup = ProcessSupervisor::new(Arc::new(sink), Arc::new(store));
//!
//! sup.start(Configuration::default()).await.unwrap();
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! # }
//! ```

pub mod bridge;
pub mod buffer;
pub mod classify;
pub mod config;
pub mod error;
pub mod handle;
pub mod paths;
pub mod sink;
pub mod supervisor;
pub mod types;

pub use types::*;
pub use bridge::DeviceTarget;
pub use buffer::MessageBuffer;
pub use classify::{ClassificationRule, Classifier, RemediationHint};
pub use config::Configuration;
pub use error::{BridgeError, ConfigError, HandleError, ReattachError, StartError, StopError};
pub use handle::{FileHandleStore, HandleStore, MemoryHandleStore};
pub use paths::AppPaths;
pub use sink::{ChannelSink, EventSink, NullSink, SinkEvent};
pub use supervisor::ProcessSupervisor;
