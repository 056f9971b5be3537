//! Format conversion pipeline: converter discovery, archive extraction, and
//! subprocess-driven conversion jobs.

pub mod extract;
mod job;
pub mod locator;
pub mod manager;
pub mod types;

pub use extract::extract_source_document;
pub use locator::ConverterLocator;
pub use manager::ConversionManager;
pub use types::{ConversionRequest, JobState, JobStatus};
