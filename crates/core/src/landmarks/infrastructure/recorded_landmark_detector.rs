use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::landmarks::domain::landmark_detector::LandmarkDetector;
use crate::landmarks::domain::point_cloud::HolisticLandmarks;
use crate::shared::frame::Frame;

#[derive(Deserialize)]
struct RecordedFrame {
    index: usize,
    #[serde(flatten)]
    landmarks: HolisticLandmarks,
}

/// Replays pre-computed holistic results by frame index.
///
/// Lets a captured video be re-run offline without the live detector.
/// Frames absent from the recording have no detections.
pub struct RecordedLandmarkDetector {
    recording: Arc<HashMap<usize, HolisticLandmarks>>,
}

impl RecordedLandmarkDetector {
    pub fn new(recording: Arc<HashMap<usize, HolisticLandmarks>>) -> Self {
        Self { recording }
    }

    /// Load a JSON array of `{"index": n, "pose": [...], "face": null, ...}`.
    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let json = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read landmarks {}: {e}", path.display()))?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let frames: Vec<RecordedFrame> = serde_json::from_str(json)?;
        let recording = frames
            .into_iter()
            .map(|f| (f.index, f.landmarks))
            .collect::<HashMap<_, _>>();
        Ok(Self::new(Arc::new(recording)))
    }

    pub fn len(&self) -> usize {
        self.recording.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recording.is_empty()
    }
}

impl LandmarkDetector for RecordedLandmarkDetector {
    fn detect(&mut self, frame: &Frame) -> Result<HolisticLandmarks, Box<dyn std::error::Error>> {
        Ok(self
            .recording
            .get(&frame.index())
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn frame(index: usize) -> Frame {
        Frame::new(vec![0u8; 2 * 2 * 3], 2, 2, index)
    }

    const RECORDING: &str = r#"[
        {"index": 0, "pose": [[0.1, 0.2, 0.3]], "face": null},
        {"index": 2, "left_hand": [[0.5, 0.5, 0.0], [0.6, 0.5, 0.0]], "right_hand": null}
    ]"#;

    #[test]
    fn test_returns_recorded_landmarks_for_known_frame() {
        let mut detector = RecordedLandmarkDetector::from_json(RECORDING).unwrap();

        let first = detector.detect(&frame(0)).unwrap();
        assert_eq!(first.pose, Some(vec![[0.1, 0.2, 0.3]]));
        assert!(first.face.is_none());

        let third = detector.detect(&frame(2)).unwrap();
        assert_eq!(third.left_hand.as_ref().map(Vec::len), Some(2));
        assert!(third.pose.is_none());
    }

    #[test]
    fn test_unknown_frame_has_no_detections() {
        let mut detector = RecordedLandmarkDetector::from_json(RECORDING).unwrap();
        assert!(detector.detect(&frame(1)).unwrap().is_empty());
        assert!(detector.detect(&frame(99)).unwrap().is_empty());
    }

    #[test]
    fn test_from_file_reads_recording() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("landmarks.json");
        fs::write(&path, RECORDING).unwrap();

        let detector = RecordedLandmarkDetector::from_file(&path).unwrap();

        assert_eq!(detector.len(), 2);
    }

    #[test]
    fn test_malformed_recording_is_error() {
        assert!(RecordedLandmarkDetector::from_json(r#"{"index": 0}"#).is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        let tmp = TempDir::new().unwrap();
        assert!(RecordedLandmarkDetector::from_file(&tmp.path().join("none.json")).is_err());
    }
}
