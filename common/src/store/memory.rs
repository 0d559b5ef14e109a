use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use super::{Chunk, ChunkStore, StoreError};

/// In-process chunk store keyed by index.
#[derive(Debug, Default)]
pub struct MemoryChunkStore {
    chunks: Mutex<BTreeMap<u32, Chunk>>,
    open: AtomicBool,
}

impl MemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.open.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::NotOpen)
        }
    }
}

impl ChunkStore for MemoryChunkStore {
    fn open(&self) -> Result<(), StoreError> {
        self.open.store(true, Ordering::Release);
        Ok(())
    }

    fn save_chunk(&self, chunk: &Chunk) -> Result<(), StoreError> {
        self.ensure_open()?;
        let mut chunks = self.chunks.lock().unwrap_or_else(PoisonError::into_inner);
        if chunks.contains_key(&chunk.meta.index) {
            return Err(StoreError::DuplicateIndex(chunk.meta.index));
        }
        chunks.insert(chunk.meta.index, chunk.clone());
        debug!(index = chunk.meta.index, "stored chunk in memory");
        Ok(())
    }

    fn load_all_chunks(&self) -> Result<Vec<Chunk>, StoreError> {
        self.ensure_open()?;
        let chunks = self.chunks.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(chunks.values().cloned().collect())
    }

    fn count(&self) -> Result<usize, StoreError> {
        self.ensure_open()?;
        Ok(self.chunks.lock().unwrap_or_else(PoisonError::into_inner).len())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.chunks.lock().unwrap_or_else(PoisonError::into_inner).clear();
        Ok(())
    }

    fn close(&self) -> Result<(), StoreError> {
        self.open.store(false, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ChunkMeta;
    use image::RgbaImage;

    fn chunk(index: u32) -> Chunk {
        Chunk {
            meta: ChunkMeta {
                index,
                shift: 0,
                captured_at_ms: 0,
            },
            image: RgbaImage::new(2, 2),
        }
    }

    #[test]
    fn requires_open() {
        let store = MemoryChunkStore::new();
        assert!(matches!(store.save_chunk(&chunk(0)), Err(StoreError::NotOpen)));
        store.open().unwrap();
        store.save_chunk(&chunk(0)).unwrap();
        store.close().unwrap();
        assert!(matches!(store.count(), Err(StoreError::NotOpen)));
    }

    #[test]
    fn loads_in_index_order_and_rejects_rewrites() {
        let store = MemoryChunkStore::new();
        store.open().unwrap();
        for index in [2, 0, 1] {
            store.save_chunk(&chunk(index)).unwrap();
        }
        assert!(matches!(
            store.save_chunk(&chunk(1)),
            Err(StoreError::DuplicateIndex(1))
        ));
        let order: Vec<u32> = store
            .load_all_chunks()
            .unwrap()
            .iter()
            .map(|c| c.meta.index)
            .collect();
        assert_eq!(order, vec![0, 1, 2]);
        store.clear().unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }
}
