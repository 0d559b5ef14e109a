mod persist;
mod state;

use longshot_common::store::StoreError;

pub use persist::{ChunkWriter, PersistStats};
pub use state::{Recorder, RecordingPhase, RecordingSummary};

#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("cannot {event} while {from:?}")]
    InvalidTransition {
        from: RecordingPhase,
        event: &'static str,
    },
    #[error("chunk store error: {0}")]
    Store(#[from] StoreError),
    #[error("no tokio runtime available for the chunk writer")]
    NoRuntime,
    #[error("chunk writer stopped unexpectedly")]
    WorkerGone,
}
