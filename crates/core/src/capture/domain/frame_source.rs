use crate::shared::frame::Frame;

/// Domain interface for a live or recorded frame stream.
///
/// `Ok(None)` means no frame is available this tick (stalled or exhausted
/// source). Callers treat both `Ok(None)` and `Err` as a skipped tick.
pub trait FrameSource: Send {
    fn read_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>>;
}
