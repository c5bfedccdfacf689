pub mod extraction_manager;

pub use extraction_manager::{ExtractionManager, ExtractionOutcome};
