use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bridge::{self, DeviceTarget};
use crate::classify::{self, ClassificationRule, Classifier, RemediationHint};
use crate::error::ConfigError;

// ── config.toml ──────────────────────────────────────────────────────────────

/// Everything a session needs. Passed by value into `start`, never mutated after.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
	#[serde(default = "bridge::default_command_path")]
	pub command_path: PathBuf,
	/// Explicit arguments. When absent, logcat arguments are built from
	/// `device` and `tag`.
	#[serde(default)]
	pub args: Option<Vec<String>>,
	#[serde(default)]
	pub device: DeviceTarget,
	#[serde(default = "default_tag")]
	pub tag: String,
	#[serde(default = "default_poll_interval")]
	pub poll_interval_ms: u64,
	#[serde(default = "default_capacity")]
	pub buffer_capacity: usize,
	#[serde(default = "default_batch")]
	pub eviction_batch_size: usize,
	/// After cleaning up an orphan on startup, start a fresh session.
	#[serde(default = "default_true")]
	pub reconnect_on_restart: bool,
	#[serde(default = "classify::default_rules", rename = "rules")]
	pub classification_rules: Vec<ClassificationRule>,
	#[serde(default = "classify::default_hints")]
	pub hints: Vec<RemediationHint>,
}

fn default_tag() -> String { "Unity".to_string() }
fn default_poll_interval() -> u64 { 2000 }
fn default_capacity() -> usize { 250 }
fn default_batch() -> usize { 100 }
fn default_true() -> bool { true }

impl Default for Configuration {
	fn default() -> Self {
		Self {
			command_path: bridge::default_command_path(),
			args: None,
			device: DeviceTarget::default(),
			tag: default_tag(),
			poll_interval_ms: default_poll_interval(),
			buffer_capacity: default_capacity(),
			eviction_batch_size: default_batch(),
			reconnect_on_restart: true,
			classification_rules: classify::default_rules(),
			hints: classify::default_hints(),
		}
	}
}

impl Configuration {
	/// Configuration for an arbitrary command, with default buffer and rules.
	pub fn for_command(command_path: impl Into<PathBuf>, args: Vec<String>) -> Self {
		Self {
			command_path: command_path.into(),
			args: Some(args),
			..Self::default()
		}
	}

	pub fn command_args(&self) -> Vec<String> {
		match &self.args {
			Some(args) => args.clone(),
			None => bridge::logcat_args(self.device, &self.tag),
		}
	}

	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms.max(1))
	}

	pub fn classifier(&self) -> Classifier {
		Classifier::new(self.classification_rules.clone(), self.hints.clone())
	}

	pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
		toml::from_str(content)
	}

	/// Read an explicit config file. Missing or malformed files are errors.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
			path: path.to_path_buf(),
			source,
		})?;
		Self::from_toml(&content).map_err(|source| ConfigError::Parse {
			path: path.to_path_buf(),
			source,
		})
	}

	/// Read the default config file if it exists, falling back to defaults.
	pub fn load_or_default(path: &Path) -> Self {
		if !path.exists() {
			return Self::default();
		}
		match Self::load(path) {
			Ok(config) => config,
			Err(e) => {
				tracing::warn!("{}; using defaults", e);
				Self::default()
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::Severity;

	#[test]
	fn empty_file_is_defaults() {
		let c = Configuration::from_toml("").unwrap();
		assert_eq!(c.poll_interval_ms, 2000);
		assert_eq!(c.buffer_capacity, 250);
		assert_eq!(c.eviction_batch_size, 100);
		assert_eq!(c.tag, "Unity");
		assert_eq!(c.device, DeviceTarget::Physical);
		assert!(c.reconnect_on_restart);
		assert_eq!(c.classification_rules.len(), 3);
		assert_eq!(c.command_args(), vec!["-d", "logcat", "-s", "Unity"]);
	}

	#[test]
	fn parses_rules_in_order() {
		let c = Configuration::from_toml(
			r#"
command_path = "/opt/sdk/platform-tools/adb"
device = "emulator"
tag = "Game"
poll_interval_ms = 500
buffer_capacity = 3
eviction_batch_size = 2

[[rules]]
pattern = "E Game"
severity = "error"

[[rules]]
pattern = "W Game"
severity = "warning"
"#,
		)
		.unwrap();
		assert_eq!(c.command_path, PathBuf::from("/opt/sdk/platform-tools/adb"));
		assert_eq!(c.command_args(), vec!["-e", "logcat", "-s", "Game"]);
		assert_eq!(c.poll_interval(), Duration::from_millis(500));
		assert_eq!(c.classification_rules[0].severity, Severity::Error);
		assert_eq!(c.classification_rules[1].pattern, "W Game");
		assert_eq!(c.classifier().classify("x E Game y"), Severity::Error);
	}

	#[test]
	fn explicit_args_override_logcat() {
		let c = Configuration::from_toml(r#"args = ["logcat", "-v", "brief"]"#).unwrap();
		assert_eq!(c.command_args(), vec!["logcat", "-v", "brief"]);
	}

	#[test]
	fn load_reports_parse_errors() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("config.toml");
		std::fs::write(&path, "buffer_capacity = \"lots\"").unwrap();
		assert!(matches!(Configuration::load(&path), Err(ConfigError::Parse { .. })));
		assert_eq!(Configuration::load_or_default(&path).buffer_capacity, 250);
	}

	#[test]
	fn load_missing_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("absent.toml");
		assert!(matches!(Configuration::load(&path), Err(ConfigError::Io { .. })));
		assert_eq!(Configuration::load_or_default(&path).tag, "Unity");
	}
}
