use std::path::PathBuf;

pub const APP_NAME: &str = "logwarden";

/// Well-known locations for a named application, XDG first.
#[derive(Debug, Clone)]
pub struct AppPaths {
	pub app_name: String,
}

impl Default for AppPaths {
	fn default() -> Self {
		Self::new(APP_NAME)
	}
}

impl AppPaths {
	pub fn new(app_name: impl Into<String>) -> Self {
		Self {
			app_name: app_name.into(),
		}
	}

	/// `$XDG_STATE_HOME/<app>`, else `~/.local/state/<app>`.
	pub fn state_dir(&self) -> PathBuf {
		base_dir("XDG_STATE_HOME", &[".local", "state"]).join(&self.app_name)
	}

	/// `$XDG_CONFIG_HOME/<app>`, else `~/.config/<app>`.
	pub fn config_dir(&self) -> PathBuf {
		base_dir("XDG_CONFIG_HOME", &[".config"]).join(&self.app_name)
	}

	/// Where the in-flight process handle is persisted.
	pub fn handle_path(&self) -> PathBuf {
		self.state_dir().join("logcat.pid.json")
	}

	pub fn config_path(&self) -> PathBuf {
		self.config_dir().join("config.toml")
	}
}

/// An XDG base directory, falling back to a path under `$HOME` and then to
/// the system temp dir. Empty variables count as unset.
fn base_dir(var: &str, under_home: &[&str]) -> PathBuf {
	let set = |name: &str| std::env::var_os(name).filter(|v| !v.is_empty());
	if let Some(dir) = set(var) {
		return PathBuf::from(dir);
	}
	match set("HOME") {
		Some(home) => under_home.iter().fold(PathBuf::from(home), |p, part| p.join(part)),
		None => std::env::temp_dir(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn file_names_are_stable() {
		let paths = AppPaths::new("lwtest");
		assert_eq!(paths.handle_path().file_name().unwrap(), "logcat.pid.json");
		assert_eq!(paths.config_path().file_name().unwrap(), "config.toml");
		assert!(paths.handle_path().starts_with(paths.state_dir()));
		assert!(paths.state_dir().ends_with("lwtest"));
	}

	#[test]
	fn base_dir_prefers_variable_then_home() {
		std::env::set_var("LOGWARDEN_TEST_BASE", "/srv/state");
		assert_eq!(base_dir("LOGWARDEN_TEST_BASE", &[".local", "state"]), PathBuf::from("/srv/state"));

		std::env::set_var("LOGWARDEN_TEST_EMPTY", "");
		let fallback = base_dir("LOGWARDEN_TEST_EMPTY", &[".config"]);
		assert!(fallback.ends_with(".config") || fallback == std::env::temp_dir());
	}
}
