//! Substring-rule line classification.

use serde::{Deserialize, Serialize};

use crate::types::Severity;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassificationRule {
	pub pattern: String,
	pub severity: Severity,
}

impl ClassificationRule {
	pub fn new(pattern: impl Into<String>, severity: Severity) -> Self {
		Self {
			pattern: pattern.into(),
			severity,
		}
	}
}

/// A known fault string and the advice appended to any line containing it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemediationHint {
	pub pattern: String,
	pub hint: String,
}

pub const CONNECTION_RESET_FAULT: &str =
	"error: protocol fault (couldn't read status): connection reset";
pub const KILL_SERVER_HINT: &str = ". TRY TO KILL SERVER (maybe several times)";

pub fn default_rules() -> Vec<ClassificationRule> {
	vec![
		ClassificationRule::new("I Unity", Severity::Info),
		ClassificationRule::new("W Unity", Severity::Warning),
		ClassificationRule::new("E Unity", Severity::Error),
	]
}

pub fn default_hints() -> Vec<RemediationHint> {
	vec![RemediationHint {
		pattern: CONNECTION_RESET_FAULT.to_string(),
		hint: KILL_SERVER_HINT.to_string(),
	}]
}

#[derive(Debug, Clone, Default)]
pub struct Classifier {
	rules: Vec<ClassificationRule>,
	hints: Vec<RemediationHint>,
}

impl Classifier {
	pub fn new(rules: Vec<ClassificationRule>, hints: Vec<RemediationHint>) -> Self {
		Self { rules, hints }
	}

	/// First matching rule in declaration order wins; no match is `Raw`.
	pub fn classify(&self, line: &str) -> Severity {
		self.rules
			.iter()
			.find(|r| line.contains(&r.pattern))
			.map(|r| r.severity)
			.unwrap_or(Severity::Raw)
	}

	/// Classify a line and produce the text to store. Hinted faults are forced
	/// to `Error` and carry their hint; this is applied exactly once per line.
	pub fn annotate(&self, line: &str) -> (String, Severity) {
		match self.hints.iter().find(|h| line.contains(&h.pattern)) {
			Some(h) => (format!("{}{}", line, h.hint), Severity::Error),
			None => (line.to_string(), self.classify(line)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn first_declared_rule_wins() {
		let c = Classifier::new(
			vec![
				ClassificationRule::new("E Unity", Severity::Error),
				ClassificationRule::new("W Unity", Severity::Warning),
			],
			vec![],
		);
		assert_eq!(c.classify("12:00 E Unity: crash"), Severity::Error);
		assert_eq!(c.classify("W Unity then E Unity"), Severity::Error);

		let reversed = Classifier::new(
			vec![
				ClassificationRule::new("W Unity", Severity::Warning),
				ClassificationRule::new("E Unity", Severity::Error),
			],
			vec![],
		);
		assert_eq!(reversed.classify("W Unity then E Unity"), Severity::Warning);
	}

	#[test]
	fn unmatched_is_raw() {
		let c = Classifier::new(default_rules(), vec![]);
		assert_eq!(c.classify("--------- beginning of main"), Severity::Raw);
		assert_eq!(c.classify(""), Severity::Raw);
	}

	#[test]
	fn classify_is_deterministic() {
		let c = Classifier::new(default_rules(), default_hints());
		let lines = ["I Unity: a", "W Unity: b", "E Unity: c", "other"];
		for line in lines {
			let first = c.classify(line);
			for _ in 0..10 {
				assert_eq!(c.classify(line), first);
			}
		}
	}

	#[test]
	fn connection_reset_gets_hint_once() {
		let c = Classifier::new(default_rules(), default_hints());
		let (text, sev) = c.annotate(CONNECTION_RESET_FAULT);
		assert_eq!(sev, Severity::Error);
		assert_eq!(text, format!("{}{}", CONNECTION_RESET_FAULT, KILL_SERVER_HINT));
		assert_eq!(text.matches(KILL_SERVER_HINT).count(), 1);
	}

	#[test]
	fn annotate_without_hint_keeps_text() {
		let c = Classifier::new(default_rules(), default_hints());
		assert_eq!(
			c.annotate("01-01 W Unity: low memory"),
			("01-01 W Unity: low memory".to_string(), Severity::Warning)
		);
	}
}
