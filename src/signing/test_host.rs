//! Re-signing of test bundles after Xcode's framework injection

use std::fs;
use std::path::{Path, PathBuf};

use super::{CodesignTool, SigningError, SigningResult, SigningService};
use crate::config::BridgeEnv;

/// File name of an installed provisioning profile inside a bundle
pub const EMBEDDED_PROFILE_NAME: &str = "embedded.mobileprovision";

/// Paths involved in signing one test target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSigningPlan {
    /// Installed test bundle; its signature supplies the identity
    pub artifact: PathBuf,
    /// Host application of a unit test bundle
    pub test_host: Option<PathBuf>,
    /// UI test runner bundle
    pub runner_bundle: PathBuf,
    pub entitlements_template: PathBuf,
    pub entitlements_output: PathBuf,
    pub provisioning_profile: Option<PathBuf>,
}

impl TestSigningPlan {
    pub fn from_env(env: &BridgeEnv) -> Self {
        let product = Path::new(&env.full_product_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| env.full_product_name.clone());
        let derived = env
            .derived_sources_dir
            .clone()
            .unwrap_or_else(|| env.target_build_dir.clone());

        Self {
            artifact: env.artifact_output_path(),
            // TEST_HOST names the host binary; the bundle is its directory.
            test_host: env
                .test_host
                .as_ref()
                .and_then(|host| host.parent().map(Path::to_path_buf)),
            runner_bundle: env.codesigning_folder_path.clone(),
            entitlements_template: env.runner_entitlements_template(),
            entitlements_output: derived.join(format!("{product}_UIRunner.entitlements")),
            provisioning_profile: env.test_runner_provisioning_profile.clone(),
        }
    }

    /// UI tests run in a generated runner rather than a host app
    pub fn is_ui_test(&self) -> bool {
        self.test_host.is_none()
    }
}

/// What happened to the runner's provisioning profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    NotConfigured,
    /// Configured profile does not exist; reported as a warning
    Missing(PathBuf),
    Installed(PathBuf),
}

/// Embed the configured provisioning profile in the runner bundle
pub fn provision_test_runner(
    profile: Option<&Path>,
    runner_bundle: &Path,
) -> SigningResult<ProvisionOutcome> {
    let Some(profile) = profile else {
        return Ok(ProvisionOutcome::NotConfigured);
    };
    if !profile.is_file() {
        return Ok(ProvisionOutcome::Missing(profile.to_path_buf()));
    }

    let embedded = runner_bundle.join(EMBEDDED_PROFILE_NAME);
    let provisioning_err = |source| SigningError::Provisioning {
        path: embedded.clone(),
        source,
    };
    if embedded.exists() {
        fs::remove_file(&embedded).map_err(provisioning_err)?;
    }
    fs::create_dir_all(runner_bundle).map_err(provisioning_err)?;
    fs::copy(profile, &embedded).map_err(provisioning_err)?;

    Ok(ProvisionOutcome::Installed(embedded))
}

/// Counts of what [`resign_test_artifacts`] signed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestSigningReport {
    pub frameworks: usize,
    pub runner: Option<PathBuf>,
}

/// Re-sign injected frameworks, and for UI tests the runner itself
pub fn resign_test_artifacts<T: CodesignTool>(
    service: &mut SigningService<T>,
    plan: &TestSigningPlan,
) -> SigningResult<TestSigningReport> {
    let mut report = TestSigningReport::default();
    if !service.is_enabled() {
        return Ok(report);
    }

    let identity = service.signing_identity(&plan.artifact)?;

    if let Some(host) = &plan.test_host {
        report.frameworks = service.resign_injected_dependents(host, &identity)?;
        return Ok(report);
    }

    report.frameworks = service.resign_injected_dependents(&plan.runner_bundle, &identity)?;

    if !plan.entitlements_template.is_file() {
        return Err(SigningError::Entitlements {
            path: plan.entitlements_template.clone(),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "runner entitlements template not found",
            ),
        });
    }

    let attrs = service.attributes(&plan.artifact)?;
    let team_id = attrs
        .team_identifier
        .ok_or_else(|| SigningError::MissingAttribute {
            bundle: plan.artifact.clone(),
            attribute: "TeamIdentifier",
        })?;
    let bundle_id = attrs
        .identifier
        .ok_or_else(|| SigningError::MissingAttribute {
            bundle: plan.artifact.clone(),
            attribute: "Identifier",
        })?;
    let app_id = match &plan.provisioning_profile {
        Some(profile) if profile.is_file() => service.application_identifier(profile)?,
        _ => team_id.clone(),
    };

    let entitlements = service.synthesize_entitlements(
        &plan.entitlements_template,
        &team_id,
        &bundle_id,
        &app_id,
        &plan.entitlements_output,
    )?;
    service.resign(&plan.runner_bundle, &identity, Some(&entitlements))?;
    report.runner = Some(plan.runner_bundle.clone());

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::{base_vars, env_from};
    use crate::signing::tests::FakeTool;
    use tempfile::TempDir;

    fn plan_in(dir: &Path, test_host: Option<PathBuf>) -> TestSigningPlan {
        TestSigningPlan {
            artifact: dir.join("AppUITests.xctest"),
            test_host,
            runner_bundle: dir.join("AppUITests-Runner.app"),
            entitlements_template: dir.join("iOSXCTRunner.entitlements"),
            entitlements_output: dir.join("derived/AppUITests_UIRunner.entitlements"),
            provisioning_profile: None,
        }
    }

    #[test]
    fn test_plan_from_env() {
        let mut vars = base_vars();
        vars.insert("FULL_PRODUCT_NAME".into(), "AppTests.xctest".into());
        vars.insert("TEST_HOST".into(), "/build/Debug-iphoneos/App.app/App".into());
        vars.insert("DERIVED_SOURCES_DIR".into(), "/build/derived".into());
        let env = env_from(&vars).unwrap();

        let plan = TestSigningPlan::from_env(&env);
        assert_eq!(plan.test_host, Some(PathBuf::from("/build/Debug-iphoneos/App.app")));
        assert_eq!(
            plan.entitlements_output,
            PathBuf::from("/build/derived/AppTests_UIRunner.entitlements")
        );
        assert!(!plan.is_ui_test());
    }

    #[test]
    fn test_unit_test_signs_only_host_frameworks() {
        let dir = TempDir::new().unwrap();
        let host = dir.path().join("App.app");
        fs::create_dir_all(host.join("Frameworks/XCTest.framework")).unwrap();
        fs::create_dir_all(host.join("Frameworks/IDEBundleInjection.framework")).unwrap();

        let tool = FakeTool::default();
        let mut service = SigningService::new(&tool, true);
        let report = resign_test_artifacts(&mut service, &plan_in(dir.path(), Some(host))).unwrap();

        assert_eq!(report.frameworks, 2);
        assert_eq!(report.runner, None);
        assert!(tool.signed.borrow().iter().all(|(_, id, ent)| {
            id == "Apple Development: Dev Person (ABCDE12345)" && ent.is_none()
        }));
    }

    #[test]
    fn test_ui_test_resigns_runner_with_entitlements() {
        let dir = TempDir::new().unwrap();
        let plan = plan_in(dir.path(), None);
        fs::create_dir_all(plan.runner_bundle.join("Frameworks/XCTAutomationSupport.framework"))
            .unwrap();
        fs::write(
            &plan.entitlements_template,
            "$(AppIdentifier).$(BundleIdentifier)",
        )
        .unwrap();

        let tool = FakeTool::default();
        let mut service = SigningService::new(&tool, true);
        let report = resign_test_artifacts(&mut service, &plan).unwrap();

        assert_eq!(report.frameworks, 1);
        assert_eq!(report.runner.as_ref(), Some(&plan.runner_bundle));
        assert_eq!(
            fs::read_to_string(&plan.entitlements_output).unwrap(),
            "TEAM123456.com.example.AppUITests"
        );
        let signed = tool.signed.borrow();
        let (bundle, _, entitlements) = signed.last().unwrap();
        assert_eq!(bundle, &plan.runner_bundle);
        assert_eq!(entitlements.as_ref(), Some(&plan.entitlements_output));
        // identity and attributes share one extraction
        assert_eq!(tool.display_calls.get(), 1);
    }

    #[test]
    fn test_ui_test_without_template_fails_in_signing_band() {
        let dir = TempDir::new().unwrap();
        let tool = FakeTool::default();
        let mut service = SigningService::new(&tool, true);

        let err = resign_test_artifacts(&mut service, &plan_in(dir.path(), None)).unwrap_err();
        assert_eq!(err.exit_code(), 800);
    }

    #[test]
    fn test_missing_profile_is_reported_not_fatal() {
        let dir = TempDir::new().unwrap();
        let profile = dir.path().join("gone.mobileprovision");
        let outcome = provision_test_runner(Some(&profile), dir.path()).unwrap();
        assert_eq!(outcome, ProvisionOutcome::Missing(profile));
    }

    #[test]
    fn test_profile_replaces_embedded_copy() {
        let dir = TempDir::new().unwrap();
        let profile = dir.path().join("dev.mobileprovision");
        fs::write(&profile, b"new").unwrap();
        let runner = dir.path().join("Runner.app");
        fs::create_dir_all(&runner).unwrap();
        fs::write(runner.join(EMBEDDED_PROFILE_NAME), b"old").unwrap();

        let outcome = provision_test_runner(Some(&profile), &runner).unwrap();

        let embedded = runner.join(EMBEDDED_PROFILE_NAME);
        assert_eq!(outcome, ProvisionOutcome::Installed(embedded.clone()));
        assert_eq!(fs::read(embedded).unwrap(), b"new");
    }
}
