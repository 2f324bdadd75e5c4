use tokio::sync::mpsc;

use crate::types::{LifecycleEvent, LogRecord};

/// Consumer of supervisor output.
///
/// Called from whichever task owns the read loop or poll loop. Records from one
/// stream arrive in order; stdout and stderr are not ordered relative to each
/// other. Implementations handle their own synchronization.
pub trait EventSink: Send + Sync {
	fn on_message(&self, record: &LogRecord);
	fn on_lifecycle(&self, event: &LifecycleEvent);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
	Message(LogRecord),
	Lifecycle(LifecycleEvent),
}

/// Forwards everything onto an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
	tx: mpsc::UnboundedSender<SinkEvent>,
}

impl ChannelSink {
	pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkEvent>) {
		let (tx, rx) = mpsc::unbounded_channel();
		(Self { tx }, rx)
	}
}

impl EventSink for ChannelSink {
	fn on_message(&self, record: &LogRecord) {
		let _ = self.tx.send(SinkEvent::Message(record.clone()));
	}

	fn on_lifecycle(&self, event: &LifecycleEvent) {
		let _ = self.tx.send(SinkEvent::Lifecycle(event.clone()));
	}
}

/// Discards everything; records are still kept in the buffer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
	fn on_message(&self, _record: &LogRecord) {}
	fn on_lifecycle(&self, _event: &LifecycleEvent) {}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::{Severity, Stream};

	#[test]
	fn channel_sink_forwards_in_order() {
		let (sink, mut rx) = ChannelSink::new();
		let record = LogRecord {
			text: "hello".into(),
			severity: Severity::Info,
			stream: Stream::Stdout,
			seq: 0,
		};
		sink.on_lifecycle(&LifecycleEvent::Started { pid: 1 });
		sink.on_message(&record);
		assert_eq!(rx.try_recv().unwrap(), SinkEvent::Lifecycle(LifecycleEvent::Started { pid: 1 }));
		assert_eq!(rx.try_recv().unwrap(), SinkEvent::Message(record));
		assert!(rx.try_recv().is_err());
	}

	#[test]
	fn closed_channel_is_ignored() {
		let (sink, rx) = ChannelSink::new();
		drop(rx);
		sink.on_lifecycle(&LifecycleEvent::ProcessDisconnected { pid: 3 });
	}
}
