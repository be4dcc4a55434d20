//! Xcode build bridge
//!
//! Runs an external builder on behalf of an Xcode build phase and makes its
//! outputs look native: artifacts land where Xcode expects them, injected
//! test frameworks are re-signed, and the debugger can find sources built
//! under the builder's sandbox.

pub mod artifact;
pub mod config;
pub mod coverage;
pub mod debugger;
pub mod ide;
pub mod pipeline;
pub mod run;
pub mod signal;
pub mod signing;
pub mod summary;
pub mod telemetry;

pub use config::{BridgeEnv, BridgeSettings, BuildOptions};
pub use pipeline::{BuildBridge, PipelineError};
pub use summary::ExitCode;
