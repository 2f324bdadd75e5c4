//! Helpers for driving the device-log bridge tool (`adb` by default).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::BridgeError;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeviceTarget {
	#[default]
	Physical,
	Emulator,
}

impl DeviceTarget {
	pub fn flag(&self) -> &'static str {
		match self {
			DeviceTarget::Physical => "-d",
			DeviceTarget::Emulator => "-e",
		}
	}
}

/// Arguments for tailing the log of one device, silenced except for `tag`.
pub fn logcat_args(device: DeviceTarget, tag: &str) -> Vec<String> {
	vec![
		device.flag().to_string(),
		"logcat".to_string(),
		"-s".to_string(),
		tag.to_string(),
	]
}

/// `$ANDROID_HOME/platform-tools/adb` (or `$ANDROID_SDK_ROOT`) when it exists,
/// otherwise bare `adb` to be looked up on `PATH`.
pub fn default_command_path() -> PathBuf {
	for var in ["ANDROID_HOME", "ANDROID_SDK_ROOT"] {
		if let Ok(sdk) = std::env::var(var) {
			let candidate = PathBuf::from(sdk).join("platform-tools").join("adb");
			if candidate.is_file() {
				return candidate;
			}
		}
	}
	PathBuf::from("adb")
}

/// Resolve a command the way `execvp` would: paths with a separator are taken
/// as-is, bare names are searched on `PATH`.
pub fn resolve_executable(command: &Path) -> Option<PathBuf> {
	if command.as_os_str().is_empty() {
		return None;
	}
	if command.components().count() > 1 || command.is_absolute() {
		return is_executable(command).then(|| command.to_path_buf());
	}
	let path_var = std::env::var_os("PATH")?;
	std::env::split_paths(&path_var)
		.map(|dir| dir.join(command))
		.find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
	use std::os::unix::fs::PermissionsExt;
	match std::fs::metadata(path) {
		Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
		Err(_) => false,
	}
}

/// Run `<command> kill-server` to completion and return its trimmed stdout.
pub async fn kill_server(command: &Path) -> Result<String, BridgeError> {
	let resolved = resolve_executable(command).ok_or_else(|| BridgeError::ExecutableNotFound {
		path: command.to_path_buf(),
	})?;

	let output = tokio::process::Command::new(&resolved)
		.arg("kill-server")
		.stdin(std::process::Stdio::null())
		.output()
		.await
		.map_err(|source| BridgeError::Io {
			path: resolved.clone(),
			source,
		})?;

	if !output.status.success() {
		return Err(BridgeError::Failed {
			command: format!("{} kill-server", resolved.display()),
			code: output.status.code(),
			stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
		});
	}

	tracing::info!("{} kill-server succeeded", resolved.display());
	Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn logcat_args_by_device() {
		assert_eq!(
			logcat_args(DeviceTarget::Physical, "Unity"),
			vec!["-d", "logcat", "-s", "Unity"]
		);
		assert_eq!(logcat_args(DeviceTarget::Emulator, "App")[0], "-e");
	}

	#[test]
	fn resolves_from_path() {
		assert!(resolve_executable(Path::new("sh")).is_some());
		assert!(resolve_executable(Path::new("definitely-not-a-real-binary-xyz")).is_none());
		assert!(resolve_executable(Path::new("")).is_none());
	}

	#[test]
	fn explicit_paths_must_exist_and_be_executable() {
		let dir = tempfile::tempdir().unwrap();
		let file = dir.path().join("plain.txt");
		std::fs::write(&file, "x").unwrap();
		assert!(resolve_executable(&file).is_none());
		assert!(resolve_executable(&dir.path().join("missing")).is_none());
		assert!(resolve_executable(dir.path()).is_none());
		assert_eq!(resolve_executable(Path::new("/bin/sh")), Some(PathBuf::from("/bin/sh")));
	}

	#[tokio::test]
	async fn kill_server_missing_binary() {
		let err = kill_server(Path::new("/nonexistent/adb")).await.unwrap_err();
		assert!(matches!(err, BridgeError::ExecutableNotFound { .. }));
	}

	#[tokio::test]
	async fn kill_server_runs_command() {
		let dir = tempfile::tempdir().unwrap();
		let script = dir.path().join("fake-adb");
		std::fs::write(&script, "#!/bin/sh\necho \"killed $1\"\n").unwrap();
		use std::os::unix::fs::PermissionsExt;
		std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

		let out = kill_server(&script).await.unwrap();
		assert_eq!(out, "killed kill-server");
	}
}
