//! Media extraction collaborator.
//!
//! The download core only talks to [`MediaExtractor`]; [`YtDlpExtractor`] is
//! the production implementation.

mod errors;
mod models;
mod plan;
mod trait_def;
mod ytdlp;

pub use errors::ExtractorError;
pub use models::{FinalizedInfo, RawFormat, RawInfo};
pub use plan::ExtractionPlan;
pub use trait_def::MediaExtractor;
pub use ytdlp::YtDlpExtractor;
