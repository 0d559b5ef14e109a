#[derive(Debug, thiserror::Error)]
pub enum StitchError {
    #[error("insufficient content: {0}")]
    InsufficientContent(String),
    #[error("{ranges} ranges given for {images} chunks")]
    RangeCountMismatch { images: usize, ranges: usize },
    #[error("{debt} redundant rows from chunk {index} could not be absorbed by earlier chunks")]
    UnabsorbedDebt { index: usize, debt: i64 },
    #[error("stitched image would be {0} rows tall")]
    CanvasTooLarge(u64),
    #[error("stitch worker failed: {0}")]
    Worker(String),
}
