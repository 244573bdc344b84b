//! Frame sources
//!
//! A frame is one time-slice of multi-channel samples. Live frames come from
//! an open acquisition device, recorded frames from rows of a CSV capture.

pub mod live;
pub mod recorded;

pub use live::LiveSource;
pub use recorded::{CsvRow, RecordedSource};

use crate::error::Result;

/// Supplies one frame per call
pub trait FrameSource {
    /// Block until the next frame is available.
    ///
    /// The returned slice is only valid until the next call.
    fn next_frame(&mut self) -> Result<&[f32]>;
}
