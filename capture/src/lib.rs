//! Live side of a scrolling capture: decides which delivered frames carry new
//! content and persists them as chunks.

pub mod filter;
pub mod recorder;

pub use filter::admission::{Admission, AdmissionFilter, DropReason};
pub use recorder::{Recorder, RecorderError, RecordingPhase, RecordingSummary};
