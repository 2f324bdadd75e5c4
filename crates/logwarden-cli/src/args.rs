use std::path::PathBuf;

use logwarden::{Configuration, DeviceTarget};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RunArgs {
	pub device: Option<DeviceTarget>,
	pub tag: Option<String>,
	pub config: Option<PathBuf>,
	pub no_color: bool,
}

impl RunArgs {
	pub fn parse(args: &[String]) -> Result<Self, String> {
		let mut out = RunArgs::default();
		let mut iter = args.iter();
		while let Some(arg) = iter.next() {
			match arg.as_str() {
				"--emulator" | "-e" => out.device = Some(DeviceTarget::Emulator),
				"--device" | "-d" => out.device = Some(DeviceTarget::Physical),
				"--tag" | "-t" => {
					let tag = iter.next().ok_or("--tag requires a value")?;
					out.tag = Some(tag.clone());
				}
				"--config" | "-c" => {
					let path = iter.next().ok_or("--config requires a path")?;
					out.config = Some(PathBuf::from(path));
				}
				"--no-color" => out.no_color = true,
				other => return Err(format!("unknown option: {}", other)),
			}
		}
		Ok(out)
	}

	pub fn apply(&self, config: &mut Configuration) {
		if let Some(device) = self.device {
			config.device = device;
		}
		if let Some(tag) = &self.tag {
			config.tag = tag.clone();
		}
	}
}

/// `kill-server` only needs to know which adb to run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct KillServerArgs {
	pub config: Option<PathBuf>,
	pub no_color: bool,
}

impl KillServerArgs {
	pub fn parse(args: &[String]) -> Result<Self, String> {
		let mut out = KillServerArgs::default();
		let mut iter = args.iter();
		while let Some(arg) = iter.next() {
			match arg.as_str() {
				"--config" | "-c" => {
					let path = iter.next().ok_or("--config requires a path")?;
					out.config = Some(PathBuf::from(path));
				}
				"--no-color" => out.no_color = true,
				other => return Err(format!("unknown option: {}", other)),
			}
		}
		Ok(out)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse(args: &[&str]) -> Result<RunArgs, String> {
		let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
		RunArgs::parse(&args)
	}

	#[test]
	fn empty() {
		assert_eq!(parse(&[]).unwrap(), RunArgs::default());
	}

	#[test]
	fn all_flags() {
		let args = parse(&["--emulator", "--tag", "MyGame", "-c", "/tmp/x.toml", "--no-color"]).unwrap();
		assert_eq!(args.device, Some(DeviceTarget::Emulator));
		assert_eq!(args.tag.as_deref(), Some("MyGame"));
		assert_eq!(args.config, Some(PathBuf::from("/tmp/x.toml")));
		assert!(args.no_color);
	}

	#[test]
	fn missing_values_and_unknowns() {
		assert!(parse(&["--tag"]).is_err());
		assert!(parse(&["--config"]).is_err());
		assert_eq!(parse(&["--bogus"]).unwrap_err(), "unknown option: --bogus");
	}

	#[test]
	fn apply_overrides_logcat_args() {
		let mut config = Configuration::default();
		parse(&["-e", "-t", "Game"]).unwrap().apply(&mut config);
		let args = config.command_args();
		assert!(args.contains(&"-e".to_string()));
		assert!(args.contains(&"Game".to_string()));
	}

	#[test]
	fn kill_server_rejects_session_flags() {
		let args: Vec<String> = ["-c", "/tmp/x.toml"].iter().map(|s| s.to_string()).collect();
		let parsed = KillServerArgs::parse(&args).unwrap();
		assert_eq!(parsed.config, Some(PathBuf::from("/tmp/x.toml")));
		assert!(!parsed.no_color);

		for flag in ["-e", "--emulator", "-t", "--device"] {
			let err = KillServerArgs::parse(&[flag.to_string()]).unwrap_err();
			assert_eq!(err, format!("unknown option: {}", flag));
		}
	}
}
