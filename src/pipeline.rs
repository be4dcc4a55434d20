//! Bridge pipeline
//!
//! One Xcode build phase invocation:
//! 1. Derive the builder command and create the event log
//! 2. Run the builder, relaying its output and collecting manifests
//! 3. Resolve the bin directory and link the build workspace
//! 4. Install the primary artifact, generated headers and dSYM
//! 5. Re-sign test artifacts Xcode injected frameworks into
//! 6. Update debugger source maps and patch coverage paths
//!
//! This is the only module that turns a stage failure into an exit code.
//! Every failure is printed as an IDE error before its code is returned.

use std::io;
use std::path::PathBuf;

use bridge_events::EventWatcher;
use thiserror::Error;

use crate::artifact::{
    install_dsym, install_generated_headers, link_workspace, resolve_bin_dir, ArtifactInstaller,
    ArtifactManifest, BinDirectory, BundleTarget, DsymOutcome, DsymRequest, InstallError,
};
use crate::config::{BridgeEnv, BridgeSettings, BuildCommand, BuildOptions, CommandError};
use crate::coverage::{patch_coverage_maps, CoverageOutcome, CoverageRequest};
use crate::debugger::{DebugPathBridge, SourceMapping};
use crate::ide;
use crate::run::{
    CollectError, Collected, CollectorConfig, OutputCollector, OutputPatcher, OutputTarget,
    ProcessError, ProcessRunner, SystemClock,
};
use crate::signal::{CleanupRegistry, EventLogGuard};
use crate::signing::{
    provision_test_runner, resign_test_artifacts, CodesignTool, ProvisionOutcome, SigningError,
    SigningService, TestSigningPlan, XcrunCodesign,
};
use crate::summary::ExitCode;
use crate::telemetry::{MetricSink, NullSink, Timer};

/// Fatal pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("failed to create build event log {path}: {source}")]
    EventLog {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid output pattern: {0}")]
    Patterns(#[from] regex_lite::Error),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Collect(#[from] CollectError),

    #[error(transparent)]
    Install(#[from] InstallError),

    #[error(transparent)]
    Signing(#[from] SigningError),
}

impl PipelineError {
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Command(e) => e.exit_code(),
            PipelineError::EventLog { .. } | PipelineError::Patterns(_) => {
                ExitCode::BuilderLaunch.as_i32()
            }
            PipelineError::Process(e) => e.exit_code(),
            PipelineError::Collect(e) => e.exit_code(),
            PipelineError::Install(e) => e.exit_code(),
            PipelineError::Signing(e) => e.exit_code(),
        }
    }
}

/// Result type for the pipeline
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Runs one Xcode build phase through the external builder
pub struct BuildBridge<T: CodesignTool = XcrunCodesign> {
    options: BuildOptions,
    env: BridgeEnv,
    settings: BridgeSettings,
    registry: CleanupRegistry,
    signing: SigningService<T>,
    sink: Box<dyn MetricSink>,
    home: Option<PathBuf>,
}

impl BuildBridge<XcrunCodesign> {
    pub fn new(
        options: BuildOptions,
        env: BridgeEnv,
        settings: BridgeSettings,
        registry: CleanupRegistry,
    ) -> Self {
        let signing = SigningService::new(XcrunCodesign::new(), env.codesigning_allowed);
        Self {
            options,
            env,
            settings,
            registry,
            signing,
            sink: Box::new(NullSink),
            home: None,
        }
    }
}

impl<T: CodesignTool> BuildBridge<T> {
    /// Replace the signing tool
    pub fn with_codesign_tool<U: CodesignTool>(self, tool: U) -> BuildBridge<U> {
        let signing = SigningService::new(tool, self.env.codesigning_allowed);
        BuildBridge {
            options: self.options,
            env: self.env,
            settings: self.settings,
            registry: self.registry,
            signing,
            sink: self.sink,
            home: self.home,
        }
    }

    pub fn with_metric_sink(mut self, sink: Box<dyn MetricSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Home directory the debugger files default into
    pub fn with_home(mut self, home: Option<PathBuf>) -> Self {
        self.home = home;
        self
    }

    /// Run the pipeline and return the process exit code
    pub fn run(mut self) -> i32 {
        match self.execute() {
            Ok(()) => ExitCode::Success.as_i32(),
            Err(e) => {
                let code = e.exit_code();
                ide::error(&e.to_string());
                tracing::debug!(exit_code = code, "pipeline failed");
                code
            }
        }
    }

    fn execute(&mut self) -> PipelineResult<()> {
        if !self.env.is_build_action() {
            tracing::info!(action = %self.env.action, "nothing to do for action");
            return Ok(());
        }

        let log_dir = self
            .settings
            .event_log_dir
            .clone()
            .unwrap_or_else(|| self.env.support_dir());
        let log_path = EventLogGuard::path_for(&log_dir, std::process::id());

        let command = BuildCommand::derive(&self.options, &self.env, &self.settings, &log_path)?;
        for warning in &command.warnings {
            ide::warning(warning);
        }

        let mut guard = EventLogGuard::create(log_path.clone(), &self.registry).map_err(
            |source| PipelineError::EventLog {
                path: log_path,
                source,
            },
        )?;

        let collected = match self.build(&command, &guard) {
            Err(PipelineError::Collect(e @ CollectError::NoManifest { .. })) => {
                guard.keep();
                return Err(e.into());
            }
            other => other?,
        };

        let bin = resolve_bin_dir(&self.bin_path())?;
        for warning in &bin.warnings {
            ide::warning(warning);
        }
        if let Some(build_root) = &bin.build_root {
            link_workspace(&self.env.workspace_root, build_root)?;
        }

        if self.options.install_generated_artifacts {
            self.install(&collected, &bin)?;
        }

        // Debugger and coverage problems never fail the build.
        if self.env.use_debugger_init {
            self.update_debug_paths();
        }
        if self.env.coverage_enabled {
            self.patch_coverage(&bin);
        }

        Ok(())
    }

    fn build(&self, command: &BuildCommand, guard: &EventLogGuard) -> PipelineResult<Collected> {
        let timer = Timer::start("Running builder", "running_builder", self.sink.as_ref());
        tracing::info!("running {}", command.display());

        let relocated = self
            .env
            .main_group_is_relocated()
            .then(|| self.env.main_group_path.clone());
        let patcher = OutputPatcher::new(relocated)?;

        let runner =
            ProcessRunner::new(OutputTarget::Discard).with_working_dir(self.env.workspace_root.clone());
        let mut child = runner.start(command)?;

        let mut watcher = EventWatcher::new(guard.path());
        let mut collector = OutputCollector::new(
            CollectorConfig::from_settings(&self.settings),
            SystemClock,
            patcher,
        );
        let stdout = io::stdout();
        let mut out = stdout.lock();
        let result = collector.collect(&mut child, &mut watcher, &mut out);
        drop(out);
        timer.end();

        Ok(result?)
    }

    fn bin_path(&self) -> PathBuf {
        if self.options.bin_path.is_absolute() {
            self.options.bin_path.clone()
        } else {
            self.env.workspace_root.join(&self.options.bin_path)
        }
    }

    fn install(&mut self, collected: &Collected, bin: &BinDirectory) -> PipelineResult<()> {
        let manifests = collected
            .manifests
            .iter()
            .map(|path| ArtifactManifest::load(path))
            .collect::<Result<Vec<_>, _>>()?;
        let Some(primary) = manifests.first() else {
            return Err(InstallError::ManifestUnreadable {
                path: PathBuf::new(),
                reason: "no manifest reported".to_string(),
            }
            .into());
        };

        let timer = Timer::start("Installing artifacts", "installing_artifacts", self.sink.as_ref());
        let artifact_root = bin
            .build_root
            .clone()
            .unwrap_or_else(|| self.env.main_group_path.clone());
        let installer = ArtifactInstaller::new(BundleTarget::from_env(&self.env), artifact_root);
        let report = installer.install(primary, &self.env.artifact_output_path())?;
        for warning in &report.warnings {
            ide::warning(warning);
        }
        timer.end();

        match &bin.build_root {
            Some(build_root) => {
                let timer = Timer::start(
                    "Installing generated headers",
                    "installing_generated_headers",
                    self.sink.as_ref(),
                );
                let summary =
                    install_generated_headers(&manifests, &self.env.workspace_root, build_root)?;
                tracing::debug!(linked = summary.linked, missing = summary.missing, "installed headers");
                timer.end();
            }
            None => ide::warning(
                "no build workspace root was detected, generated headers were not installed",
            ),
        }

        if self.env.generate_dsym {
            self.install_dsym()?;
        }

        if self.env.is_test && self.env.injects_test_frameworks() && self.env.codesigning_allowed {
            self.sign_test_artifacts()?;
        }

        Ok(())
    }

    fn install_dsym(&self) -> PipelineResult<()> {
        let timer = Timer::start("Installing dSYM bundles", "installing_dsym", self.sink.as_ref());
        let build_dir = match &self.env.build_path {
            Some(sub) => self.bin_path().join(sub),
            None => self.bin_path(),
        };
        let request = DsymRequest {
            dsym_name: self.env.dwarf_dsym_file_name.as_deref(),
            build_dir: &build_dir,
            output_dir: &self.env.built_products_dir,
            binary_dsym: self.env.binary_dsym.as_deref(),
            build_path_prefix: self.env.build_path.as_deref(),
        };
        match install_dsym(&request)? {
            DsymOutcome::Installed(path) => tracing::debug!("installed {}", path.display()),
            DsymOutcome::NotInstalled => {}
        }
        timer.end();
        Ok(())
    }

    fn sign_test_artifacts(&mut self) -> PipelineResult<()> {
        let timer = Timer::start("Signing test artifacts", "signing_test_artifacts", self.sink.as_ref());
        let plan = TestSigningPlan::from_env(&self.env);

        match provision_test_runner(plan.provisioning_profile.as_deref(), &plan.runner_bundle)? {
            ProvisionOutcome::Missing(profile) => ide::warning(&format!(
                "test runner provisioning profile {} does not exist",
                profile.display()
            )),
            ProvisionOutcome::Installed(path) => tracing::debug!("installed {}", path.display()),
            ProvisionOutcome::NotConfigured => {}
        }

        let report = resign_test_artifacts(&mut self.signing, &plan)?;
        tracing::debug!(frameworks = report.frameworks, runner = ?report.runner, "re-signed test artifacts");
        timer.end();
        Ok(())
    }

    fn update_debug_paths(&self) {
        if !DebugPathBridge::applies_to(&self.env.product_type) {
            return;
        }
        let Some(home) = self.home.as_deref() else {
            ide::warning("HOME is not set, debugger source maps were not updated");
            return;
        };

        let timer = Timer::start("Updating debugger source map", "updating_debugger_init", self.sink.as_ref());
        let bridge = DebugPathBridge::new(self.settings.debugger.resolve(home));
        let source_map = [SourceMapping::new(
            self.settings.debugger.remote_source_prefix.clone(),
            self.env.workspace_root.clone(),
        )];

        // dSYMs carry corrected paths already; stale remaps would shadow them.
        let clear = self.env.generate_dsym;
        match bridge.update(&source_map, clear) {
            Ok(outcome) => {
                tracing::debug!(global_init = %outcome.global_init.display(), "debugger source map updated")
            }
            Err(e) => ide::warning(&format!(
                "updating debugger configuration failed with code {}: {e}",
                e.exit_code()
            )),
        }
        timer.end();
    }

    fn patch_coverage(&self, bin: &BinDirectory) {
        let timer = Timer::start("Patching coverage maps", "patching_llvm_covmap", self.sink.as_ref());
        let binary = self.env.binary_path();
        let request = CoverageRequest {
            post_processor: &self.env.post_processor(),
            binary: binary.as_deref(),
            build_root: bin.build_root.as_deref(),
            workspace_root: &self.env.workspace_root,
            verbose: self.options.verbose > 1,
        };
        match patch_coverage_maps(&request) {
            CoverageOutcome::Warning(msg) => ide::warning(&msg),
            CoverageOutcome::Patched | CoverageOutcome::Skipped => {}
        }
        timer.end();
    }
}
