pub mod changefeed;
pub mod observer;

pub use changefeed::{ChangeEvent, ChangeFeed, ChangeKind};
pub use observer::{ObserverConfig, PipelineObserver, PipelineOutcome};
