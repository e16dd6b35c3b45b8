use crate::landmarks::domain::point_cloud::HolisticLandmarks;
use crate::shared::frame::Frame;

/// Domain interface for the holistic pose/face/hand detector.
///
/// Implementations may track across frames, hence `&mut self`.
pub trait LandmarkDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<HolisticLandmarks, Box<dyn std::error::Error>>;
}
