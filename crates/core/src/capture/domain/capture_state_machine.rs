use std::time::{Duration, Instant};

use ndarray::{Array4, Axis};

use crate::landmarks::domain::landmark_extractor::LandmarkExtractor;
use crate::sequence::domain::sequence_normalizer::{
    NormalizeError, NormalizedTensor, RawWordSequence, SequenceNormalizer,
};
use crate::shared::constants::{
    DEFAULT_COUNTDOWN_SECS, DEFAULT_FRAMES_PER_WORD, DEFAULT_INTER_WORD_WAIT_SECS,
    DEFAULT_TOTAL_WORDS,
};
use crate::shared::frame::Frame;

pub const SESSION_STARTED_MESSAGE: &str = "Sequence capture started...";
pub const SESSION_COMPLETE_MESSAGE: &str = "Full sequence captured. Ready for inference.";

#[derive(Clone, Debug, PartialEq)]
pub struct CaptureConfig {
    pub frames_per_word: usize,
    pub total_words: usize,
    pub countdown: Duration,
    pub inter_word_wait: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frames_per_word: DEFAULT_FRAMES_PER_WORD,
            total_words: DEFAULT_TOTAL_WORDS,
            countdown: Duration::from_secs_f64(DEFAULT_COUNTDOWN_SECS),
            inter_word_wait: Duration::from_secs_f64(DEFAULT_INTER_WORD_WAIT_SECS),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CapturePhase {
    WordStarting,
    Countdown { anchor: Instant },
    Accumulating,
    InterWordWait { since: Instant },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Capturing { word: usize, phase: CapturePhase },
}

/// A frame plus the advisory overlay text to draw on it.
#[derive(Clone, Debug)]
pub struct AnnotatedFrame {
    pub frame: Frame,
    pub overlay: Option<String>,
}

/// Result of one capture tick.
///
/// `completed` is set only on the tick that finishes a word.
#[derive(Debug)]
pub struct StepOutput {
    pub completed: Option<NormalizedTensor>,
    pub log: Option<String>,
    pub frame: AnnotatedFrame,
}

impl StepOutput {
    fn frame_only(frame: Frame, overlay: Option<String>) -> Self {
        Self {
            completed: None,
            log: None,
            frame: AnnotatedFrame { frame, overlay },
        }
    }
}

/// One full session's normalized words, in capture order.
#[derive(Clone, Debug)]
pub struct SessionSequence {
    words: Vec<NormalizedTensor>,
}

impl SessionSequence {
    /// Split a `(words, fixed_length, landmarks, 3)` batch, checking each
    /// word's shape against `normalizer`.
    pub fn from_batch(
        batch: Array4<f32>,
        normalizer: &SequenceNormalizer,
    ) -> Result<Self, NormalizeError> {
        let words = batch
            .outer_iter()
            .map(|word| normalizer.accept(word.to_owned()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { words })
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Stack into a `(words, fixed_length, landmarks, 3)` batch.
    pub fn to_array(&self) -> Option<Array4<f32>> {
        let views: Vec<_> = self.words.iter().map(NormalizedTensor::view).collect();
        ndarray::stack(Axis(0), &views).ok()
    }

    pub fn into_words(self) -> Vec<NormalizedTensor> {
        self.words
    }
}

/// Frame-driven capture of a fixed number of gesture words.
///
/// Per word: start, countdown (no extraction), accumulate `frames_per_word`
/// clouds, normalize, then wait before the next word. Countdown and wait are
/// measured on the `now` passed to [`step`](Self::step), never by frame count.
pub struct CaptureStateMachine {
    config: CaptureConfig,
    extractor: LandmarkExtractor,
    normalizer: SequenceNormalizer,
    state: CaptureState,
    buffer: RawWordSequence,
    sequence: Vec<NormalizedTensor>,
    complete: bool,
    last_log_message: String,
}

impl CaptureStateMachine {
    pub fn new(
        config: CaptureConfig,
        extractor: LandmarkExtractor,
        normalizer: SequenceNormalizer,
    ) -> Self {
        let buffer = Vec::with_capacity(config.frames_per_word);
        Self {
            config,
            extractor,
            normalizer,
            state: CaptureState::Idle,
            buffer,
            sequence: Vec::new(),
            complete: false,
            last_log_message: String::new(),
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self.state, CaptureState::Capturing { .. })
    }

    /// True once every word has been captured, until the sequence is taken.
    pub fn is_complete(&self) -> bool {
        self.complete && self.sequence.len() == self.config.total_words
    }

    pub fn current_word(&self) -> Option<usize> {
        match self.state {
            CaptureState::Capturing { word, .. } => Some(word),
            CaptureState::Idle => None,
        }
    }

    pub fn normalizer(&self) -> &SequenceNormalizer {
        &self.normalizer
    }

    pub fn buffered_frames(&self) -> usize {
        self.buffer.len()
    }

    pub fn captured_words(&self) -> usize {
        self.sequence.len()
    }

    pub fn start_session(&mut self) -> String {
        self.buffer.clear();
        self.sequence.clear();
        self.complete = false;
        self.state = CaptureState::Capturing {
            word: 0,
            phase: CapturePhase::WordStarting,
        };
        SESSION_STARTED_MESSAGE.to_string()
    }

    /// Drop all in-progress capture state and return to idle.
    pub fn abandon(&mut self) {
        self.buffer.clear();
        self.sequence.clear();
        self.complete = false;
        self.state = CaptureState::Idle;
    }

    /// Hand over the completed session, clearing it.
    pub fn take_sequence(&mut self) -> Option<SessionSequence> {
        if !self.is_complete() {
            return None;
        }
        self.complete = false;
        Some(SessionSequence {
            words: std::mem::take(&mut self.sequence),
        })
    }

    pub fn last_log_message(&self) -> &str {
        &self.last_log_message
    }

    /// Remember `message` as the last one shown. Returns false when it
    /// repeats the previous message and should not be shown again.
    pub fn note_log_message(&mut self, message: &str) -> bool {
        if message == self.last_log_message {
            return false;
        }
        self.last_log_message = message.to_string();
        true
    }

    pub fn step(&mut self, frame: Frame, now: Instant) -> StepOutput {
        let CaptureState::Capturing { word, phase } = self.state else {
            return StepOutput::frame_only(frame, None);
        };

        if word >= self.config.total_words {
            self.state = CaptureState::Idle;
            self.complete = true;
            return StepOutput {
                completed: None,
                log: Some(SESSION_COMPLETE_MESSAGE.to_string()),
                frame: AnnotatedFrame {
                    frame,
                    overlay: None,
                },
            };
        }

        let phase = match phase {
            CapturePhase::InterWordWait { since }
                if now.saturating_duration_since(since) < self.config.inter_word_wait =>
            {
                return StepOutput::frame_only(frame, Some("Waiting...".to_string()));
            }
            CapturePhase::InterWordWait { .. } => CapturePhase::WordStarting,
            other => other,
        };

        match phase {
            CapturePhase::WordStarting => {
                self.state = CaptureState::Capturing {
                    word,
                    phase: CapturePhase::Countdown { anchor: now },
                };
                return StepOutput {
                    completed: None,
                    log: Some(format!(
                        "Starting capture of word {}/{}...",
                        word + 1,
                        self.config.total_words
                    )),
                    frame: AnnotatedFrame {
                        frame,
                        overlay: Some(format!("Starting word {}...", word + 1)),
                    },
                };
            }
            CapturePhase::Countdown { anchor } => {
                let elapsed = now.saturating_duration_since(anchor);
                if elapsed < self.config.countdown {
                    let remaining =
                        (self.config.countdown.as_secs_f64() - elapsed.as_secs() as f64).ceil();
                    return StepOutput::frame_only(frame, Some(format!("{remaining}")));
                }
            }
            CapturePhase::Accumulating | CapturePhase::InterWordWait { .. } => {}
        }

        self.accumulate(word, frame, now)
    }

    fn accumulate(&mut self, word: usize, frame: Frame, now: Instant) -> StepOutput {
        self.buffer.push(self.extractor.extract(&frame));
        if self.buffer.len() < self.config.frames_per_word {
            self.state = CaptureState::Capturing {
                word,
                phase: CapturePhase::Accumulating,
            };
            return StepOutput::frame_only(frame, Some(format!("Capturing word {}", word + 1)));
        }

        let raw = std::mem::take(&mut self.buffer);
        match self.normalizer.normalize(raw) {
            Ok(tensor) => {
                self.sequence.push(tensor.clone());
                self.state = CaptureState::Capturing {
                    word: word + 1,
                    phase: CapturePhase::InterWordWait { since: now },
                };
                StepOutput {
                    completed: Some(tensor),
                    log: Some(format!("Word {} captured and processed.", word + 1)),
                    frame: AnnotatedFrame {
                        frame,
                        overlay: Some("Capture finished".to_string()),
                    },
                }
            }
            Err(e) => {
                log::error!("Failed to normalize word {}: {e}", word + 1);
                self.state = CaptureState::Capturing {
                    word,
                    phase: CapturePhase::WordStarting,
                };
                StepOutput {
                    completed: None,
                    log: Some(format!("Word {} could not be processed, retrying.", word + 1)),
                    frame: AnnotatedFrame {
                        frame,
                        overlay: None,
                    },
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::domain::landmark_detector::LandmarkDetector;
    use crate::landmarks::domain::point_cloud::HolisticLandmarks;
    use crate::sequence::domain::sequence_normalizer::NormalizerConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingDetector {
        calls: Arc<AtomicUsize>,
    }

    impl LandmarkDetector for CountingDetector {
        fn detect(
            &mut self,
            frame: &Frame,
        ) -> Result<HolisticLandmarks, Box<dyn std::error::Error>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(HolisticLandmarks {
                right_hand: Some(vec![[0.5, 0.5, frame.index() as f32]; 21]),
                ..Default::default()
            })
        }
    }

    fn frame(index: usize) -> Frame {
        Frame::new(vec![0u8; 2 * 2 * 3], 2, 2, index)
    }

    fn machine(config: CaptureConfig) -> (CaptureStateMachine, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let extractor = LandmarkExtractor::new(Box::new(CountingDetector {
            calls: calls.clone(),
        }));
        let normalizer = SequenceNormalizer::new(NormalizerConfig::default()).unwrap();
        (CaptureStateMachine::new(config, extractor, normalizer), calls)
    }

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn test_idle_passes_frames_through() {
        let (mut csm, calls) = machine(CaptureConfig::default());
        let out = csm.step(frame(0), Instant::now());

        assert!(out.completed.is_none());
        assert!(out.log.is_none());
        assert!(out.frame.overlay.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(csm.state(), CaptureState::Idle);
    }

    #[test]
    fn test_start_session_enters_word_starting() {
        let (mut csm, _) = machine(CaptureConfig::default());
        assert_eq!(csm.start_session(), SESSION_STARTED_MESSAGE);
        assert_eq!(
            csm.state(),
            CaptureState::Capturing {
                word: 0,
                phase: CapturePhase::WordStarting
            }
        );
    }

    #[test]
    fn test_countdown_shows_seconds_and_skips_extraction() {
        let (mut csm, calls) = machine(CaptureConfig::default());
        let t0 = Instant::now();
        csm.start_session();

        let start = csm.step(frame(0), t0);
        assert_eq!(start.log.as_deref(), Some("Starting capture of word 1/3..."));
        assert_eq!(start.frame.overlay.as_deref(), Some("Starting word 1..."));

        let overlays: Vec<_> = [0.5, 1.5, 2.5]
            .iter()
            .map(|&s| csm.step(frame(1), t0 + secs(s)).frame.overlay)
            .collect();
        assert_eq!(
            overlays,
            vec![Some("3".into()), Some("2".into()), Some("1".into())]
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let first = csm.step(frame(2), t0 + secs(3.0));
        assert_eq!(first.frame.overlay.as_deref(), Some("Capturing word 1"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(csm.buffered_frames(), 1);
    }

    #[test]
    fn test_full_session_emits_exactly_one_tensor_per_word() {
        let (mut csm, calls) = machine(CaptureConfig::default());
        let t0 = Instant::now();
        csm.start_session();

        // One-second ticks: 1 start + 2 countdown + 35 accumulation + 1 wait
        // per word, with the wait-exit tick starting the next word.
        let mut tensor_ticks = Vec::new();
        let mut logs = Vec::new();
        for tick in 0..200 {
            let out = csm.step(frame(tick), t0 + Duration::from_secs(tick as u64));
            if let Some(tensor) = out.completed {
                assert_eq!(tensor.shape(), &[64, 88, 3]);
                tensor_ticks.push(tick);
            }
            if let Some(log) = out.log {
                logs.push((tick, log));
            }
        }

        assert_eq!(tensor_ticks, vec![37, 76, 115]);
        assert_eq!(calls.load(Ordering::SeqCst), 3 * 35);
        assert_eq!(logs.first(), Some(&(0, "Starting capture of word 1/3...".to_string())));
        assert!(logs.contains(&(39, "Starting capture of word 2/3...".to_string())));
        assert!(logs.contains(&(76, "Word 2 captured and processed.".to_string())));
        assert_eq!(logs.last(), Some(&(116, SESSION_COMPLETE_MESSAGE.to_string())));
        assert!(!csm.is_capturing());
        assert!(csm.is_complete());
    }

    #[test]
    fn test_inter_word_wait_lasts_configured_duration() {
        let config = CaptureConfig {
            frames_per_word: 2,
            total_words: 2,
            countdown: Duration::ZERO,
            inter_word_wait: secs(2.0),
        };
        let (mut csm, _) = machine(config);
        let t0 = Instant::now();
        csm.start_session();

        csm.step(frame(0), t0); // start
        csm.step(frame(1), t0); // accumulate 1 (zero countdown)
        let done = csm.step(frame(2), t0); // accumulate 2 -> word done
        assert!(done.completed.is_some());

        for s in [0.5, 1.0, 1.999] {
            let out = csm.step(frame(3), t0 + secs(s));
            assert_eq!(out.frame.overlay.as_deref(), Some("Waiting..."));
            assert!(out.log.is_none());
        }
        let next = csm.step(frame(4), t0 + secs(2.0));
        assert_eq!(next.log.as_deref(), Some("Starting capture of word 2/2..."));
    }

    #[test]
    fn test_take_sequence_only_when_complete_and_clears() {
        let config = CaptureConfig {
            frames_per_word: 1,
            total_words: 2,
            countdown: Duration::ZERO,
            inter_word_wait: Duration::ZERO,
        };
        let (mut csm, _) = machine(config);
        let t0 = Instant::now();
        csm.start_session();

        csm.step(frame(0), t0); // start word 1
        csm.step(frame(1), t0); // word 1 done
        assert!(csm.take_sequence().is_none());
        csm.step(frame(2), t0); // start word 2
        csm.step(frame(3), t0); // word 2 done
        assert!(csm.take_sequence().is_none());
        let last = csm.step(frame(4), t0);
        assert_eq!(last.log.as_deref(), Some(SESSION_COMPLETE_MESSAGE));

        let sequence = csm.take_sequence().unwrap();
        assert_eq!(sequence.len(), 2);
        assert_eq!(sequence.to_array().unwrap().shape(), &[2, 64, 88, 3]);
        assert!(csm.take_sequence().is_none());
        assert_eq!(csm.captured_words(), 0);
    }

    #[test]
    fn test_from_batch_validates_each_word() {
        let normalizer = SequenceNormalizer::new(NormalizerConfig::default()).unwrap();

        let good = SessionSequence::from_batch(Array4::zeros((3, 64, 88, 3)), &normalizer).unwrap();
        assert_eq!(good.len(), 3);

        let bad = SessionSequence::from_batch(Array4::zeros((3, 64, 80, 3)), &normalizer);
        assert!(matches!(bad, Err(NormalizeError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_completed_session_ignores_further_frames() {
        let config = CaptureConfig {
            frames_per_word: 1,
            total_words: 1,
            countdown: Duration::ZERO,
            inter_word_wait: Duration::ZERO,
        };
        let (mut csm, calls) = machine(config);
        let t0 = Instant::now();
        csm.start_session();
        for i in 0..3 {
            csm.step(frame(i), t0);
        }
        let after = csm.step(frame(9), t0);

        assert!(after.completed.is_none());
        assert!(after.log.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_restart_resets_progress() {
        let (mut csm, _) = machine(CaptureConfig::default());
        let t0 = Instant::now();
        csm.start_session();
        for tick in 0..10 {
            csm.step(frame(tick), t0 + Duration::from_secs(tick as u64));
        }
        assert!(csm.buffered_frames() > 0);

        csm.start_session();

        assert_eq!(csm.buffered_frames(), 0);
        assert_eq!(csm.current_word(), Some(0));
    }

    #[test]
    fn test_abandon_returns_to_idle() {
        let (mut csm, _) = machine(CaptureConfig::default());
        csm.start_session();
        csm.step(frame(0), Instant::now());

        csm.abandon();

        assert_eq!(csm.state(), CaptureState::Idle);
        assert!(!csm.is_complete());
        assert!(csm.take_sequence().is_none());
    }

    #[test]
    fn test_note_log_message_suppresses_repeats() {
        let (mut csm, _) = machine(CaptureConfig::default());
        assert!(csm.note_log_message("a"));
        assert!(!csm.note_log_message("a"));
        assert!(csm.note_log_message("b"));
        assert!(csm.note_log_message("a"));
        assert_eq!(csm.last_log_message(), "a");
    }
}
