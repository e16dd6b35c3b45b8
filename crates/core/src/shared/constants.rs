/// Total anatomical slots in one holistic point cloud.
pub const LANDMARK_SLOTS: usize = 543;

/// Slot offsets of each landmark group inside a point cloud.
pub const POSE_OFFSET: usize = 0;
pub const FACE_OFFSET: usize = 33;
pub const LEFT_HAND_OFFSET: usize = 468;
pub const RIGHT_HAND_OFFSET: usize = 489;

/// Coordinates per landmark (x, y, z).
pub const COORDINATES: usize = 3;

/// Temporal length every word sequence is normalized to.
pub const DEFAULT_FIXED_LENGTH: usize = 64;

/// Longest run of empty frames that gap interpolation will fill.
pub const DEFAULT_MAX_GAP: usize = 8;

pub const DEFAULT_FRAMES_PER_WORD: usize = 35;
pub const DEFAULT_TOTAL_WORDS: usize = 3;
pub const DEFAULT_COUNTDOWN_SECS: f64 = 3.0;
pub const DEFAULT_INTER_WORD_WAIT_SECS: f64 = 2.0;

/// Frame tick interval of the session loop (~33 fps).
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 30;

/// Curated landmark subset: key pose/face points followed by both hands.
pub fn default_landmark_subset() -> Vec<usize> {
    [0, 9, 11, 13, 14, 17, 117, 118, 119, 199, 346, 347, 348]
        .into_iter()
        .chain(LEFT_HAND_OFFSET..LANDMARK_SLOTS)
        .collect()
}

pub const MODEL_NAME: &str = "model_quantized.onnx";
pub const VOCABULARY_PATH: &str = "model/ord2sign.json";

pub const REMOTE_PROGRAM: &str = "mdt";
pub const REMOTE_DEVICE_DIR: &str = "/home/mendel";
pub const REMOTE_SCRIPT: &str = "/home/mendel/remote_inference.py";
pub const REMOTE_INTERPRETER: &str = "python3";
pub const REMOTE_INPUT_FILE: &str = "tensor.npy";
pub const REMOTE_OUTPUT_FILE: &str = "result.npy";
pub const DEFAULT_STEP_TIMEOUT_SECS: u64 = 20;

pub const SENTENCE_SERVICE_URL: &str =
    "https://aelamraxx-sentence-generator-api.hf.space/translate";
pub const DEFAULT_SENTENCE_TIMEOUT_SECS: u64 = 15;

/// 70% of a typical 200 wpm engine default.
pub const DEFAULT_SPEECH_RATE_WPM: u32 = 140;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
