const PREFIX: &str = "chunk_";
pub const IMAGE_EXT: &str = "png";
pub const META_EXT: &str = "json";

/// File name of a chunk image.
/// e.g. "chunk_0007.png"
pub fn chunk_image_name(index: u32) -> String {
    format!("{PREFIX}{index:04}.{IMAGE_EXT}")
}

/// File name of a chunk's metadata sidecar.
/// e.g. "chunk_0007.json"
pub fn chunk_meta_name(index: u32) -> String {
    format!("{PREFIX}{index:04}.{META_EXT}")
}

/// Recover the index from a chunk image file name.
pub fn parse_chunk_index(file_name: &str) -> Option<u32> {
    file_name
        .strip_prefix(PREFIX)?
        .strip_suffix(IMAGE_EXT)?
        .strip_suffix('.')?
        .parse()
        .ok()
}
