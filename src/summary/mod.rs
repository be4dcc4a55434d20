//! Failure taxonomy for the Xcode build bridge
//!
//! Exit codes are partitioned by the pipeline stage that failed so the
//! invoking IDE can tell a build failure from an installation failure without
//! parsing log output.

mod failure;

pub use failure::{ExitCode, FailureStage, SIGNING_EXIT_CODE_MAX};
