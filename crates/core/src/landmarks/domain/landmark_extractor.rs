use crate::landmarks::domain::landmark_detector::LandmarkDetector;
use crate::landmarks::domain::point_cloud::PointCloud;
use crate::shared::frame::Frame;

/// Turns frames into fixed-size point clouds via a holistic detector.
///
/// A detector error yields an empty cloud: the frame then counts as a gap,
/// which the normalizer either interpolates over or leaves as zeros.
pub struct LandmarkExtractor {
    detector: Box<dyn LandmarkDetector>,
}

impl LandmarkExtractor {
    pub fn new(detector: Box<dyn LandmarkDetector>) -> Self {
        Self { detector }
    }

    pub fn extract(&mut self, frame: &Frame) -> PointCloud {
        match self.detector.detect(frame) {
            Ok(landmarks) => PointCloud::from_landmarks(&landmarks),
            Err(e) => {
                log::warn!("Landmark detection failed on frame {}: {e}", frame.index());
                PointCloud::empty()
            }
        }
    }
}
