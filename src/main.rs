//! Xcode build bridge CLI
//!
//! Invoked from a run-script build phase with the Xcode build environment
//! exported.

use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;
use xcode_build_bridge::config::DEFAULT_BIN_PATH;
use xcode_build_bridge::signal::{CleanupRegistry, SignalHandler};
use xcode_build_bridge::telemetry::sink_from_settings;
use xcode_build_bridge::{ide, BridgeEnv, BridgeSettings, BuildBridge, BuildOptions, ExitCode};

#[derive(Parser)]
#[command(name = "xcode-build-bridge")]
#[command(about = "Build an Xcode target with an external builder", version)]
struct Cli {
    /// Builder targets to build
    #[arg(required = true)]
    targets: Vec<String>,

    /// Path to the builder executable
    #[arg(long, short = 'b')]
    builder: PathBuf,

    /// Option placed before the build verb (repeatable)
    #[arg(long = "startup-option", allow_hyphen_values = true)]
    startup_options: Vec<String>,

    /// Option placed after the build verb (repeatable)
    #[arg(long = "build-option", allow_hyphen_values = true)]
    build_options: Vec<String>,

    /// Builder output symlink, relative to the workspace root
    #[arg(long, default_value = DEFAULT_BIN_PATH)]
    bin_path: PathBuf,

    /// Install built artifacts where Xcode expects them
    #[arg(long)]
    install_generated_artifacts: bool,

    /// Path to bridge settings (default: <project>/.xcbridge/config.toml)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    process::exit(run(cli));
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> i32 {
    let env = match BridgeEnv::from_process_env() {
        Ok(env) => env,
        Err(e) => {
            ide::error(&format!("option parsing failed: {e}"));
            return e.exit_code();
        }
    };

    let settings = match BridgeSettings::load(cli.config.as_deref(), &env.default_settings_path()) {
        Ok(settings) => settings,
        Err(e) => {
            ide::error(&format!("option parsing failed: {e}"));
            return e.exit_code();
        }
    };

    let registry = CleanupRegistry::new();
    if let Err(e) = SignalHandler::new(registry.clone()).install() {
        tracing::warn!("failed to install signal handler: {e}");
    }

    let options = BuildOptions {
        builder: cli.builder,
        targets: cli.targets,
        startup_options: cli.startup_options,
        build_options: cli.build_options,
        bin_path: cli.bin_path,
        install_generated_artifacts: cli.install_generated_artifacts,
        verbose: cli.verbose,
    };

    let sink = sink_from_settings(&settings.telemetry);
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let code = BuildBridge::new(options, env, settings, registry)
        .with_metric_sink(sink)
        .with_home(home)
        .run();

    if code == ExitCode::Success.as_i32() {
        tracing::info!("bridge finished");
    }
    code
}
