mod args;
mod console;
mod orphan;

use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;

use args::{KillServerArgs, RunArgs};
use console::ConsoleSink;
use logwarden::handle::{command_matches, probe, process_alive, Liveness};
use logwarden::{
	AppPaths, Configuration, FileHandleStore, HandleStore, ProcessSupervisor, StartError,
	SupervisorState,
};
use orphan::Cleanup;
use owo_colors::OwoColorize;

fn main() {
	let args: Vec<String> = std::env::args().skip(1).collect();

	if args.is_empty() {
		print_usage();
		return;
	}

	match args[0].as_str() {
		"help" | "--help" | "-h" => print_usage(),
		"version" | "--version" | "-V" => println!("logwarden {}", env!("CARGO_PKG_VERSION")),
		"run" => cmd_run(&args[1..]),
		"status" | "st" => cmd_status(&args[1..]),
		"orphan" => cmd_orphan(&args[1..]),
		"kill-server" => cmd_kill_server(&args[1..]),
		"config" => cmd_config(&args[1..]),
		other => {
			eprintln!("unknown command: {}", other);
			eprintln!("run 'logwarden help' for usage");
			std::process::exit(1);
		}
	}
}

fn print_usage() {
	eprintln!("{} {} - device log supervisor", "logwarden".bold(), env!("CARGO_PKG_VERSION"));
	eprintln!();
	eprintln!("usage: {} <command> [options]", "logwarden".bold());
	eprintln!();

	eprintln!("{}", "session".cyan().bold());
	eprintln!("  {} [options]                 Stream device logs until Ctrl-C", "run".bold());
	eprintln!("      -d, --device               Physical device (default)");
	eprintln!("      -e, --emulator             Emulator");
	eprintln!("      -t, --tag <tag>            Log tag to follow (default Unity)");
	eprintln!("      -c, --config <path>        Config file");
	eprintln!("          --no-color             Plain output");
	eprintln!("  {}                        Show the persisted session", "status".bold());
	eprintln!("  {}                        Stop a session left by a previous run", "orphan".bold());
	eprintln!();

	eprintln!("{}", "bridge".cyan().bold());
	eprintln!("  {} [-c <path>]       Kill the adb server", "kill-server".bold());
	eprintln!();

	eprintln!("{}", "config".cyan().bold());
	eprintln!("  {} [--path]                Print effective configuration", "config".bold());
	eprintln!();

	eprintln!("Set RUST_LOG=logwarden=debug for supervisor diagnostics.");
}

fn init_tracing() {
	use tracing_subscriber::EnvFilter;
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.init();
}

fn runtime() -> tokio::runtime::Runtime {
	match tokio::runtime::Runtime::new() {
		Ok(rt) => rt,
		Err(e) => fail(&format!("failed to start runtime: {}", e)),
	}
}

fn fail(msg: &str) -> ! {
	eprintln!("{} {}", "error:".red().bold(), msg);
	std::process::exit(1);
}

fn load_config(explicit: Option<&Path>, paths: &AppPaths) -> Configuration {
	match explicit {
		Some(path) => Configuration::load(path).unwrap_or_else(|e| fail(&e.to_string())),
		None => Configuration::load_or_default(&paths.config_path()),
	}
}

fn supervisor(paths: &AppPaths, config: &Configuration, color: bool) -> ProcessSupervisor {
	ProcessSupervisor::new(
		Arc::new(ConsoleSink::new(color)),
		Arc::new(FileHandleStore::new(paths.handle_path())),
	)
	.with_reattach_poll_interval(config.poll_interval())
}

fn use_color(no_color: bool) -> bool {
	!no_color && std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
}

fn report_cleanup(cleanup: Cleanup) {
	match cleanup {
		Cleanup::Nothing => {}
		Cleanup::Stale => eprintln!("{}", "cleared stale session record".dimmed()),
		Cleanup::Stopped { pid } => {
			eprintln!("stopped orphaned session {}", format!("(pid {})", pid).dimmed())
		}
	}
}

fn cmd_run(args: &[String]) {
	let run_args = RunArgs::parse(args).unwrap_or_else(|e| fail(&e));
	init_tracing();

	let paths = AppPaths::default();
	let mut config = load_config(run_args.config.as_deref(), &paths);
	run_args.apply(&mut config);
	let color = use_color(run_args.no_color);

	runtime().block_on(async move {
		let sup = supervisor(&paths, &config, color);

		let cleanup = orphan::clean_up(&sup)
			.await
			.unwrap_or_else(|e| fail(&format!("orphan cleanup failed: {}", e)));
		report_cleanup(cleanup);
		if !orphan::should_start(cleanup, config.reconnect_on_restart) {
			eprintln!("reconnect_on_restart is off, not starting a new session");
			return;
		}

		if let Err(e) = sup.start(config).await {
			if matches!(e, StartError::ExecutableNotFound { .. }) {
				eprintln!("set command_path in {} or ANDROID_HOME", paths.config_path().display());
			}
			fail(&e.to_string());
		}

		let mut state = sup.subscribe_state();
		tokio::select! {
			_ = tokio::signal::ctrl_c() => {
				if let Err(e) = sup.stop().await {
					fail(&e.to_string());
				}
			}
			_ = state.wait_for(|s| *s == SupervisorState::Stopped) => {}
		}
		tracing::debug!("{} records buffered at exit", sup.buffer().len());
	});
}

fn cmd_status(_args: &[String]) {
	let paths = AppPaths::default();
	let store = FileHandleStore::new(paths.handle_path());
	let handle = match store.load() {
		Ok(h) => h,
		Err(e) => fail(&e.to_string()),
	};

	let Some(handle) = handle else {
		eprintln!("{} no session recorded", "○".dimmed());
		return;
	};

	let (mark, label) = match probe(handle.pid) {
		Ok(Liveness::Alive) if command_matches(handle.pid, &handle.command) => {
			("●".green().to_string(), "running".green().to_string())
		}
		Ok(Liveness::Alive) => ("●".yellow().to_string(), "pid reused".yellow().to_string()),
		Ok(Liveness::Foreign) => ("●".yellow().to_string(), "not permitted".yellow().to_string()),
		Ok(Liveness::Dead) => ("○".red().to_string(), "dead".red().to_string()),
		Err(e) => fail(&format!("failed to probe pid {}: {}", handle.pid, e)),
	};
	eprintln!("{} {}  pid {}  {}", mark, label, handle.pid, handle.command.dimmed());
	eprintln!("  {}", store.path().display().dimmed());
}

fn cmd_orphan(_args: &[String]) {
	init_tracing();
	let paths = AppPaths::default();
	let config = Configuration::load_or_default(&paths.config_path());

	runtime().block_on(async {
		let sup = supervisor(&paths, &config, use_color(false));
		match orphan::clean_up(&sup).await {
			Ok(Cleanup::Nothing) => eprintln!("no orphaned session"),
			Ok(cleanup) => report_cleanup(cleanup),
			Err(e) => fail(&e.to_string()),
		}
	});
}

fn cmd_kill_server(args: &[String]) {
	let kill_args = KillServerArgs::parse(args).unwrap_or_else(|e| fail(&e));
	init_tracing();
	let paths = AppPaths::default();
	let config = load_config(kill_args.config.as_deref(), &paths);

	// a live session from another invocation still owns the server
	if let Ok(Some(h)) = FileHandleStore::new(paths.handle_path()).load() {
		if process_alive(h.pid) && command_matches(h.pid, &h.command) {
			fail(&format!("a logcat session is running (pid {}); stop it first", h.pid));
		}
	}

	runtime().block_on(async {
		let sup = supervisor(&paths, &config, use_color(kill_args.no_color));
		if let Err(e) = sup.kill_server(&config.command_path).await {
			fail(&e.to_string());
		}
	});
}

fn cmd_config(args: &[String]) {
	let paths = AppPaths::default();
	if args.first().map(|s| s.as_str()) == Some("--path") {
		println!("{}", paths.config_path().display());
		return;
	}
	let config = Configuration::load_or_default(&paths.config_path());
	match toml::to_string_pretty(&config) {
		Ok(s) => print!("{}", s),
		Err(e) => fail(&e.to_string()),
	}
}
