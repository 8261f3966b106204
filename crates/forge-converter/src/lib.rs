#![recursion_limit = "256"]
//! Headless Spine export orchestration.
//!
//! Drives the Spine editor's command-line interface to export `.spine`
//! projects: locates the executable, prepares an export settings document,
//! runs the process with a timeout, works around non-ASCII paths and rewrites
//! asset paths in the exported JSON.
//!
//! ```no_run
//! use forge_converter::{ConversionJob, ConversionProcessor};
//! use forge_core::config::ConverterConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() {
//! let processor = ConversionProcessor::new(ConverterConfig::default());
//! let jobs = vec![ConversionJob::new("art/hero.spine", "export/hero")];
//! let report = processor.convert_batch(&jobs, &CancellationToken::new()).await;
//! println!("{} of {} succeeded", report.succeeded, report.total());
//! # }
//! ```

pub mod discovery;
pub mod encoding;
pub mod error;
pub mod executor;
pub mod inputs;
pub mod metrics;
pub mod models;
pub mod observer;
pub mod processor;
pub mod rewrite;
pub mod settings;
pub mod staging;

pub use discovery::{DiscoveryMethod, ExecutableDiscovery, ExecutableLocation};
pub use error::ConversionError;
pub use inputs::resolve_project_inputs;
pub use models::{BatchReport, ConversionJob, ConversionResult, ExportOptions, FailureReason};
pub use observer::{ConversionObserver, OutputStream, TracingObserver};
pub use processor::ConversionProcessor;
