mod errors;
mod events;
mod naming;
mod pool;
mod queue;
mod source;

pub use errors::{DownloadError, Result};
pub use events::{DownloadEvent, EventSink};
pub use naming::OutputNaming;
pub use pool::{
    DownloadConfig, DownloadOutcome, DownloadResult, PageResolver, RetryPolicy, WorkerPool,
};
pub use queue::{DownloadQueue, QueueItem};
pub use source::{HttpMediaSource, MediaSource, MediaStream};
