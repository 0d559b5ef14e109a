//! Chunk persistence port.
//!
//! The recorder appends chunks as frames are admitted and the stitcher reads
//! them back in capture order. Stores are opened once, may be cleared at the
//! start of every recording, and closed at shutdown.

mod dir;
pub mod keys;
mod memory;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

pub use dir::DirChunkStore;
pub use memory::MemoryChunkStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMeta {
    /// Capture-order position, starting at 0 for every recording.
    pub index: u32,
    /// Shift reported by the live oracle when the frame was admitted (0 for
    /// the first chunk).
    pub shift: i32,
    pub captured_at_ms: i64,
}

/// A persisted frame. Immutable once written.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub meta: ChunkMeta,
    pub image: RgbaImage,
}

pub trait ChunkStore: Send + Sync {
    fn open(&self) -> Result<(), StoreError>;

    /// Append a chunk. Indices are write-once.
    fn save_chunk(&self, chunk: &Chunk) -> Result<(), StoreError>;

    /// Every stored chunk, ordered by index.
    fn load_all_chunks(&self) -> Result<Vec<Chunk>, StoreError>;

    fn count(&self) -> Result<usize, StoreError>;

    /// Remove every chunk. The store stays open.
    fn clear(&self) -> Result<(), StoreError>;

    fn close(&self) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("chunk store is not open")]
    NotOpen,
    #[error("chunk {0} is already stored")]
    DuplicateIndex(u32),
    #[error("failed to access {0}: {1}")]
    Io(String, std::io::Error),
    #[error("failed to encode chunk {0}: {1}")]
    Encode(u32, image::ImageError),
    #[error("failed to write metadata for chunk {0}: {1}")]
    Metadata(u32, serde_json::Error),
}
