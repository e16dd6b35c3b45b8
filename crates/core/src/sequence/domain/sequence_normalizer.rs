use ndarray::{Array3, ArrayView3, Axis};
use thiserror::Error;

use crate::landmarks::domain::point_cloud::PointCloud;
use crate::shared::constants::{COORDINATES, DEFAULT_FIXED_LENGTH, DEFAULT_MAX_GAP};
use crate::shared::constants::{default_landmark_subset, LANDMARK_SLOTS};

/// Point clouds collected for one word, in capture order.
pub type RawWordSequence = Vec<PointCloud>;

#[derive(Error, Debug, PartialEq)]
pub enum NormalizeError {
    #[error("cannot normalize an empty sequence")]
    EmptySequence,
    #[error("landmark index {index} is out of range for {slots} slots")]
    LandmarkOutOfRange { index: usize, slots: usize },
    #[error("tensor shape {found:?} does not match ({fixed_length}, {landmarks}, 3)")]
    ShapeMismatch {
        found: Vec<usize>,
        fixed_length: usize,
        landmarks: usize,
    },
    #[error("fixed length must be at least 1")]
    ZeroFixedLength,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NormalizerConfig {
    pub fixed_length: usize,
    pub max_gap: usize,
    pub landmark_subset: Vec<usize>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            fixed_length: DEFAULT_FIXED_LENGTH,
            max_gap: DEFAULT_MAX_GAP,
            landmark_subset: default_landmark_subset(),
        }
    }
}

/// A word sequence resampled to `(fixed_length, subset_size, 3)`.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedTensor {
    data: Array3<f32>,
}

impl NormalizedTensor {
    pub fn view(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn into_array(self) -> Array3<f32> {
        self.data
    }
}

/// Maps variable-length landmark sequences to fixed-length tensors.
///
/// Pure and deterministic: the same input always gives the same output.
pub struct SequenceNormalizer {
    config: NormalizerConfig,
}

impl SequenceNormalizer {
    pub fn new(config: NormalizerConfig) -> Result<Self, NormalizeError> {
        if config.fixed_length == 0 {
            return Err(NormalizeError::ZeroFixedLength);
        }
        if let Some(&index) = config.landmark_subset.iter().find(|&&i| i >= LANDMARK_SLOTS) {
            return Err(NormalizeError::LandmarkOutOfRange {
                index,
                slots: LANDMARK_SLOTS,
            });
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Normalize one word. The sequence is consumed.
    pub fn normalize(&self, video: RawWordSequence) -> Result<NormalizedTensor, NormalizeError> {
        if video.is_empty() {
            return Err(NormalizeError::EmptySequence);
        }
        let mut stacked = Array3::<f32>::zeros((video.len(), LANDMARK_SLOTS, COORDINATES));
        for (mut slot, cloud) in stacked.outer_iter_mut().zip(&video) {
            slot.assign(&cloud.view());
        }
        self.normalize_array(stacked)
    }

    /// Accept an already-normalized `(fixed_length, subset, 3)` array.
    pub fn accept(&self, data: Array3<f32>) -> Result<NormalizedTensor, NormalizeError> {
        let expected = [
            self.config.fixed_length,
            self.config.landmark_subset.len(),
            COORDINATES,
        ];
        if data.shape() != expected.as_slice() {
            return Err(NormalizeError::ShapeMismatch {
                found: data.shape().to_vec(),
                fixed_length: expected[0],
                landmarks: expected[1],
            });
        }
        Ok(NormalizedTensor { data })
    }

    /// Normalize a `(T, slots, 3)` array directly.
    pub fn normalize_array(&self, video: Array3<f32>) -> Result<NormalizedTensor, NormalizeError> {
        let (frames, slots, _) = video.dim();
        if frames == 0 {
            return Err(NormalizeError::EmptySequence);
        }
        if let Some(&index) = self.config.landmark_subset.iter().find(|&&i| i >= slots) {
            return Err(NormalizeError::LandmarkOutOfRange { index, slots });
        }

        let video = interpolate_gaps(video, self.config.max_gap);
        let video = video.select(Axis(1), &self.config.landmark_subset);
        let data = resample(video, self.config.fixed_length);
        Ok(NormalizedTensor { data })
    }
}

/// Linearly fill interior runs of all-zero frames no longer than `max_gap`.
///
/// Runs touching the first or last frame, or longer than `max_gap`, are
/// left as zeros.
pub fn interpolate_gaps(mut video: Array3<f32>, max_gap: usize) -> Array3<f32> {
    let len = video.len_of(Axis(0));
    let empty: Vec<bool> = video
        .outer_iter()
        .map(|frame| frame.iter().all(|&v| v == 0.0))
        .collect();

    let mut i = 0;
    while i < len {
        if !empty[i] {
            i += 1;
            continue;
        }
        let start = i;
        while i < len && empty[i] {
            i += 1;
        }
        let end = i;
        let gap = end - start;
        if start == 0 || end == len || gap > max_gap {
            continue;
        }

        let before = video.index_axis(Axis(0), start - 1).to_owned();
        let after = video.index_axis(Axis(0), end).to_owned();
        for j in 0..gap {
            let alpha = (j + 1) as f32 / (gap + 1) as f32;
            let filled = &before * (1.0 - alpha) + &after * alpha;
            video.index_axis_mut(Axis(0), start + j).assign(&filled);
        }
    }
    video
}

/// Resample along time to exactly `target` frames.
///
/// Shorter inputs are edge-padded. Longer inputs are repeated
/// `floor(target² / T)` times per frame, edge-padded to a multiple of
/// `target`, then box-averaged into `target` groups. A zero `target`
/// yields an empty array.
pub fn resample(video: Array3<f32>, target: usize) -> Array3<f32> {
    let (frames, landmarks, coords) = video.dim();
    if target == 0 {
        return Array3::zeros((0, landmarks, coords));
    }
    if frames == target {
        return video;
    }
    if frames < target {
        return pad_edges(&video, target);
    }

    // A zero factor (T > target²) would leave nothing to average.
    let repeat_factor = (target * target / frames).max(1);
    let repeated = repeat_frames(&video, repeat_factor);
    let remainder = repeated.len_of(Axis(0)) % target;
    let padded = if remainder > 0 {
        let padded_len = repeated.len_of(Axis(0)) + (target - remainder);
        pad_edges(&repeated, padded_len)
    } else {
        repeated
    };

    let (total, landmarks, coords) = padded.dim();
    let group = total / target;
    let mut out = Array3::<f32>::zeros((target, landmarks, coords));
    for (g, mut slot) in out.outer_iter_mut().enumerate() {
        let window = padded.slice_axis(Axis(0), (g * group..(g + 1) * group).into());
        if let Some(mean) = window.mean_axis(Axis(0)) {
            slot.assign(&mean);
        }
    }
    out
}

/// Grow to `target` frames by repeating the first frame `floor(pad / 2)` times
/// on the left and the last frame on the right for the remainder.
fn pad_edges(video: &Array3<f32>, target: usize) -> Array3<f32> {
    let (frames, landmarks, coords) = video.dim();
    let pad_left = (target - frames) / 2;
    Array3::from_shape_fn((target, landmarks, coords), |(t, l, c)| {
        let source = t.saturating_sub(pad_left).min(frames - 1);
        video[[source, l, c]]
    })
}

fn repeat_frames(video: &Array3<f32>, factor: usize) -> Array3<f32> {
    let (frames, landmarks, coords) = video.dim();
    Array3::from_shape_fn((frames * factor, landmarks, coords), |(t, l, c)| {
        video[[t / factor, l, c]]
    })
}
