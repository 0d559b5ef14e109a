use std::sync::Arc;

use longshot_common::frame::Frame;
use longshot_common::store::{Chunk, ChunkMeta, ChunkStore};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::RecorderError;

struct PersistJob {
    index: u32,
    shift: i32,
    frame: Frame,
}

/// Totals reported when the writer is drained.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PersistStats {
    pub saved: u32,
    pub failed: u32,
}

/// Background chunk writer.
///
/// Admitted frames are queued without blocking the caller. A single worker
/// task drains the queue in order, converting and saving each frame on the
/// blocking pool, so chunks land in the store in capture order.
pub struct ChunkWriter {
    tx: mpsc::UnboundedSender<PersistJob>,
    handle: JoinHandle<PersistStats>,
}

impl ChunkWriter {
    /// Spawn the worker on the current tokio runtime.
    pub fn spawn(store: Arc<dyn ChunkStore>) -> Result<Self, RecorderError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| RecorderError::NoRuntime)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = runtime.spawn(run_writer(store, rx));
        Ok(Self { tx, handle })
    }

    /// Queue a kept frame for persistence as chunk `index`.
    pub fn submit(&self, index: u32, shift: i32, frame: Frame) -> Result<(), RecorderError> {
        self.tx
            .send(PersistJob { index, shift, frame })
            .map_err(|_| RecorderError::WorkerGone)
    }

    /// Stop accepting work and wait for every queued chunk to be written.
    pub async fn finish(self) -> Result<PersistStats, RecorderError> {
        drop(self.tx);
        self.handle.await.map_err(|_| RecorderError::WorkerGone)
    }
}

async fn run_writer(store: Arc<dyn ChunkStore>, mut rx: mpsc::UnboundedReceiver<PersistJob>) -> PersistStats {
    let mut stats = PersistStats::default();
    while let Some(job) = rx.recv().await {
        let index = job.index;
        let store = Arc::clone(&store);
        let result = tokio::task::spawn_blocking(move || {
            let chunk = Chunk {
                meta: ChunkMeta {
                    index: job.index,
                    shift: job.shift,
                    captured_at_ms: job.frame.captured_at_ms(),
                },
                image: job.frame.to_rgba(),
            };
            store.save_chunk(&chunk)
        })
        .await;

        match result {
            Ok(Ok(())) => {
                stats.saved += 1;
                debug!(index, saved = stats.saved, "chunk persisted");
            }
            Ok(Err(e)) => {
                stats.failed += 1;
                error!(error = %e, index, "failed to persist chunk");
            }
            Err(e) => {
                stats.failed += 1;
                error!(error = %e, index, "chunk persistence task failed");
            }
        }
    }
    info!(saved = stats.saved, failed = stats.failed, "chunk writer drained");
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use longshot_common::frame::PixelFormat;
    use longshot_common::store::MemoryChunkStore;

    fn frame(value: u8, ts: i64) -> Frame {
        Frame::packed(PixelFormat::Bgra8, 4, 4, 16, vec![value; 64], ts).unwrap()
    }

    #[tokio::test]
    async fn writes_chunks_in_submission_order() {
        let store = Arc::new(MemoryChunkStore::new());
        store.open().unwrap();
        let writer = ChunkWriter::spawn(store.clone()).unwrap();
        for i in 0..5 {
            writer.submit(i, i as i32 * 10, frame(i as u8, 100 * i as i64)).unwrap();
        }
        let stats = writer.finish().await.unwrap();
        assert_eq!(stats, PersistStats { saved: 5, failed: 0 });

        let chunks = store.load_all_chunks().unwrap();
        assert_eq!(chunks.len(), 5);
        assert_eq!(chunks[3].meta.shift, 30);
        assert_eq!(chunks[3].meta.captured_at_ms, 300);
        assert_eq!(chunks[3].image.dimensions(), (4, 4));
    }

    #[tokio::test]
    async fn store_failures_are_counted_not_fatal() {
        let store = Arc::new(MemoryChunkStore::new());
        // Never opened: every save fails.
        let writer = ChunkWriter::spawn(store).unwrap();
        writer.submit(0, 0, frame(1, 0)).unwrap();
        writer.submit(1, 20, frame(2, 100)).unwrap();
        let stats = writer.finish().await.unwrap();
        assert_eq!(stats, PersistStats { saved: 0, failed: 2 });
    }

    #[test]
    fn spawn_outside_runtime_is_an_error() {
        let store = Arc::new(MemoryChunkStore::new());
        assert!(matches!(ChunkWriter::spawn(store), Err(RecorderError::NoRuntime)));
    }
}
