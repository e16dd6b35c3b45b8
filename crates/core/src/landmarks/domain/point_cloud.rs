use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::shared::constants::{
    COORDINATES, FACE_OFFSET, LANDMARK_SLOTS, LEFT_HAND_OFFSET, POSE_OFFSET, RIGHT_HAND_OFFSET,
};

/// One landmark in normalized image coordinates.
pub type Point3 = [f32; 3];

/// Holistic detector output for one frame.
///
/// Each group is independently absent when the detector found nothing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HolisticLandmarks {
    #[serde(default)]
    pub pose: Option<Vec<Point3>>,
    #[serde(default)]
    pub face: Option<Vec<Point3>>,
    #[serde(default)]
    pub left_hand: Option<Vec<Point3>>,
    #[serde(default)]
    pub right_hand: Option<Vec<Point3>>,
}

impl HolisticLandmarks {
    pub fn is_empty(&self) -> bool {
        self.pose.is_none()
            && self.face.is_none()
            && self.left_hand.is_none()
            && self.right_hand.is_none()
    }
}

/// Fixed-size cloud of 543 landmark slots for one frame.
///
/// Slots without a detection hold the zero vector. Immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub struct PointCloud {
    points: Array2<f32>,
}

impl PointCloud {
    /// A cloud with no detections at all.
    pub fn empty() -> Self {
        Self {
            points: Array2::zeros((LANDMARK_SLOTS, COORDINATES)),
        }
    }

    /// Lay the detector groups out into slots.
    ///
    /// Groups are written in the order pose, face, left hand, right hand. A
    /// later group overwrites an earlier one where ranges overlap, and
    /// points past the last slot are dropped.
    pub fn from_landmarks(landmarks: &HolisticLandmarks) -> Self {
        let mut points = Array2::<f32>::zeros((LANDMARK_SLOTS, COORDINATES));
        let groups = [
            (&landmarks.pose, POSE_OFFSET),
            (&landmarks.face, FACE_OFFSET),
            (&landmarks.left_hand, LEFT_HAND_OFFSET),
            (&landmarks.right_hand, RIGHT_HAND_OFFSET),
        ];
        for (group, offset) in groups {
            let Some(group) = group else { continue };
            for (slot, point) in (offset..LANDMARK_SLOTS).zip(group) {
                for (c, &value) in point.iter().enumerate() {
                    points[[slot, c]] = value;
                }
            }
        }
        Self { points }
    }

    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.points.view()
    }

    pub fn point(&self, slot: usize) -> Point3 {
        [
            self.points[[slot, 0]],
            self.points[[slot, 1]],
            self.points[[slot, 2]],
        ]
    }

    /// True when no coordinate in the cloud is non-zero.
    pub fn is_empty(&self) -> bool {
        self.points.iter().all(|&v| v == 0.0)
    }
}

impl Default for PointCloud {
    fn default() -> Self {
        Self::empty()
    }
}
