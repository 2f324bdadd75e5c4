use std::io::Write;

use logwarden::{EventSink, LifecycleEvent, LogRecord, Severity, Stream};
use owo_colors::OwoColorize;

/// Prints records to stdout and lifecycle changes to stderr.
pub struct ConsoleSink {
	color: bool,
}

impl ConsoleSink {
	pub fn new(color: bool) -> Self {
		Self { color }
	}
}

pub fn format_record(record: &LogRecord, color: bool) -> String {
	if !color {
		return record.text.clone();
	}
	let text = &record.text;
	match (record.severity, record.stream) {
		(_, Stream::Supervisor) => format!("{}", text.cyan()),
		(Severity::Error, _) => format!("{}", text.truecolor(238, 68, 68)),
		(Severity::Warning, _) => format!("{}", text.truecolor(231, 175, 86)),
		(Severity::Info, _) => format!("{}", text.truecolor(196, 196, 196)),
		(Severity::Raw, _) => format!("{}", text.truecolor(153, 153, 255)),
	}
}

pub fn format_lifecycle(event: &LifecycleEvent, color: bool) -> String {
	let (label, detail, good) = match event {
		LifecycleEvent::Started { pid } => ("connected", format!("pid {}", pid), true),
		LifecycleEvent::Reattached { pid } => ("reattached", format!("orphan pid {}", pid), true),
		LifecycleEvent::ProcessDisconnected { pid } => ("disconnected", format!("pid {}", pid), false),
		LifecycleEvent::ProcessExited { pid, code } => {
			let code = code.map(|c| c.to_string()).unwrap_or_else(|| "signal".into());
			("exited", format!("pid {}, code {}", pid, code), false)
		}
	};
	if !color {
		return format!("{} ({})", label, detail);
	}
	let label = if good {
		format!("{}", label.truecolor(130, 214, 130).bold())
	} else {
		format!("{}", label.truecolor(238, 68, 68).bold())
	};
	format!("{} {}", label, format!("({})", detail).dimmed())
}

impl EventSink for ConsoleSink {
	fn on_message(&self, record: &LogRecord) {
		let mut out = std::io::stdout().lock();
		let _ = writeln!(out, "{}", format_record(record, self.color));
	}

	fn on_lifecycle(&self, event: &LifecycleEvent) {
		eprintln!("{}", format_lifecycle(event, self.color));
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn rec(text: &str, severity: Severity) -> LogRecord {
		LogRecord {
			text: text.into(),
			severity,
			stream: Stream::Stdout,
			seq: 0,
		}
	}

	#[test]
	fn plain_output_is_verbatim() {
		assert_eq!(format_record(&rec("E Unity: boom", Severity::Error), false), "E Unity: boom");
	}

	#[test]
	fn colored_output_keeps_text() {
		let line = format_record(&rec("W Unity: hmm", Severity::Warning), true);
		assert!(line.contains("W Unity: hmm"));
		assert!(line.contains('\u{1b}'));
	}

	#[test]
	fn lifecycle_labels() {
		assert_eq!(
			format_lifecycle(&LifecycleEvent::ProcessExited { pid: 4, code: Some(1) }, false),
			"exited (pid 4, code 1)"
		);
		assert_eq!(
			format_lifecycle(&LifecycleEvent::ProcessExited { pid: 4, code: None }, false),
			"exited (pid 4, code signal)"
		);
		assert_eq!(
			format_lifecycle(&LifecycleEvent::ProcessDisconnected { pid: 9 }, false),
			"disconnected (pid 9)"
		);
	}
}
