pub mod admission;
pub mod sparse;
pub mod traits;
