use longshot_common::frame::Frame;

/// Pixel-level "nothing changed" test run before the shift oracle.
///
/// Implementations compare a candidate frame against the last kept frame and
/// must answer `false` whenever the two cannot be compared.
pub trait DuplicateCheck: Send + Sync {
    /// Returns `true` if `curr` shows the same content as `prev`.
    fn is_duplicate(&self, prev: &Frame, curr: &Frame) -> bool;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}
