use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use image::ImageFormat;
use tracing::{debug, info, warn};

use super::keys::{chunk_image_name, chunk_meta_name, parse_chunk_index};
use super::{Chunk, ChunkMeta, ChunkStore, StoreError};

/// Chunk store backed by a directory of PNG files with JSON sidecars.
///
/// Layout: `{dir}/chunk_0000.png` + `{dir}/chunk_0000.json`. A missing or
/// unreadable sidecar is tolerated (shift and timestamp read back as 0); an
/// undecodable image is skipped with a warning.
pub struct DirChunkStore {
    dir: PathBuf,
    open: AtomicBool,
}

impl DirChunkStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            open: AtomicBool::new(false),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.open.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::NotOpen)
        }
    }

    fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
        move |e| StoreError::Io(path.display().to_string(), e)
    }

    /// Chunk image files present in the directory, sorted by index.
    fn indexed_images(&self) -> Result<Vec<(u32, PathBuf)>, StoreError> {
        let entries = std::fs::read_dir(&self.dir).map_err(Self::io_err(&self.dir))?;
        let mut found = Vec::new();
        for entry in entries {
            let entry = entry.map_err(Self::io_err(&self.dir))?;
            let name = entry.file_name();
            if let Some(index) = name.to_str().and_then(parse_chunk_index) {
                found.push((index, entry.path()));
            }
        }
        found.sort_by_key(|(index, _)| *index);
        Ok(found)
    }

    fn read_meta(&self, index: u32) -> ChunkMeta {
        let path = self.dir.join(chunk_meta_name(index));
        let parsed = std::fs::read(&path)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<ChunkMeta>(&bytes).ok());
        match parsed {
            Some(meta) if meta.index == index => meta,
            _ => {
                debug!(index, "no usable metadata sidecar, using defaults");
                ChunkMeta {
                    index,
                    shift: 0,
                    captured_at_ms: 0,
                }
            }
        }
    }
}

impl ChunkStore for DirChunkStore {
    fn open(&self) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(Self::io_err(&self.dir))?;
        self.open.store(true, Ordering::Release);
        info!(dir = self.dir.display().to_string(), "chunk store opened");
        Ok(())
    }

    fn save_chunk(&self, chunk: &Chunk) -> Result<(), StoreError> {
        self.ensure_open()?;
        let index = chunk.meta.index;
        let image_path = self.dir.join(chunk_image_name(index));
        if image_path.exists() {
            return Err(StoreError::DuplicateIndex(index));
        }

        chunk
            .image
            .save_with_format(&image_path, ImageFormat::Png)
            .map_err(|e| StoreError::Encode(index, e))?;

        let meta_path = self.dir.join(chunk_meta_name(index));
        let meta = serde_json::to_vec(&chunk.meta).map_err(|e| StoreError::Metadata(index, e))?;
        std::fs::write(&meta_path, meta).map_err(Self::io_err(&meta_path))?;

        debug!(
            index,
            shift = chunk.meta.shift,
            width = chunk.image.width(),
            height = chunk.image.height(),
            path = image_path.display().to_string(),
            "saved chunk"
        );
        Ok(())
    }

    fn load_all_chunks(&self) -> Result<Vec<Chunk>, StoreError> {
        self.ensure_open()?;
        let mut chunks = Vec::new();
        for (index, path) in self.indexed_images()? {
            let image = match image::open(&path) {
                Ok(img) => img.to_rgba8(),
                Err(e) => {
                    warn!(index, path = path.display().to_string(), error = %e, "failed to decode chunk, skipping");
                    continue;
                }
            };
            chunks.push(Chunk {
                meta: self.read_meta(index),
                image,
            });
        }
        debug!(count = chunks.len(), "loaded chunks");
        Ok(chunks)
    }

    fn count(&self) -> Result<usize, StoreError> {
        self.ensure_open()?;
        Ok(self.indexed_images()?.len())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.ensure_open()?;
        // Only chunk files are ours; the directory may be shared.
        let mut removed = 0;
        for (index, image_path) in self.indexed_images()? {
            std::fs::remove_file(&image_path).map_err(Self::io_err(&image_path))?;
            let meta_path = self.dir.join(chunk_meta_name(index));
            match std::fs::remove_file(&meta_path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::Io(meta_path.display().to_string(), e)),
            }
            removed += 1;
        }
        info!(dir = self.dir.display().to_string(), removed, "chunk store cleared");
        Ok(())
    }

    fn close(&self) -> Result<(), StoreError> {
        self.open.store(false, Ordering::Release);
        Ok(())
    }
}
