use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use ndarray::{Array4, Ix4};
use thiserror::Error;

use crate::capture::domain::capture_state_machine::{
    AnnotatedFrame, CaptureStateMachine, SessionSequence,
};
use crate::capture::domain::frame_source::FrameSource;
use crate::inference::domain::inference_dispatcher::{InferenceDispatcher, InferenceOutcome};
use crate::inference::domain::npy::{self, NpyError};
use crate::inference::domain::word_classifier::{classify, ClassifyError, VocabularyTable};
use crate::language::domain::sentence_generator::SentenceGenerator;
use crate::language::domain::speech_synthesizer::SpeechSynthesizer;
use crate::pipeline::session_logger::SessionLogger;
use crate::sequence::domain::sequence_normalizer::NormalizeError;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Word {word} could not be classified (remote: {remote}; local: {local})")]
    TerminalInference {
        word: usize,
        remote: String,
        local: String,
    },
    #[error("Word {word}: {source}")]
    Classification {
        word: usize,
        #[source]
        source: ClassifyError,
    },
    #[error("Invalid session batch: {0}")]
    InvalidBatch(#[from] NormalizeError),
    #[error("Failed to read session batch: {0}")]
    BatchFile(#[from] NpyError),
}

/// Result of one session: recognized glosses and the generated sentence.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionResult {
    pub words: Vec<String>,
    pub sentence: String,
}

#[derive(Debug)]
pub enum TickOutcome {
    /// No frame was available this tick.
    Skipped,
    Frame(AnnotatedFrame),
    Completed(SessionResult),
}

/// Collaborators downstream of capture.
pub struct LanguageStage {
    pub sentence: Box<dyn SentenceGenerator>,
    pub speech: Option<Box<dyn SpeechSynthesizer>>,
}

/// Drives capture from a frame source and runs classification, sentence
/// generation, and speech once a session completes.
pub struct SessionController {
    source: Box<dyn FrameSource>,
    capture: CaptureStateMachine,
    dispatcher: InferenceDispatcher,
    vocabulary: Arc<VocabularyTable>,
    language: LanguageStage,
    logger: Box<dyn SessionLogger>,
    skipped_ticks: usize,
}

impl SessionController {
    pub fn new(
        source: Box<dyn FrameSource>,
        capture: CaptureStateMachine,
        dispatcher: InferenceDispatcher,
        vocabulary: Arc<VocabularyTable>,
        language: LanguageStage,
        logger: Box<dyn SessionLogger>,
    ) -> Self {
        Self {
            source,
            capture,
            dispatcher,
            vocabulary,
            language,
            logger,
            skipped_ticks: 0,
        }
    }

    pub fn capture(&self) -> &CaptureStateMachine {
        &self.capture
    }

    pub fn start_session(&mut self) {
        let message = self.capture.start_session();
        self.skipped_ticks = 0;
        self.forward_log(&message);
    }

    /// Advance by one frame.
    ///
    /// A missing or unreadable frame is a skipped tick with no state change.
    /// Terminal inference and classification errors abandon the session.
    pub fn tick(&mut self) -> Result<TickOutcome, SessionError> {
        let frame = match self.source.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                self.skipped_ticks += 1;
                log::debug!("No frame available");
                return Ok(TickOutcome::Skipped);
            }
            Err(e) => {
                self.skipped_ticks += 1;
                log::debug!("Frame source error: {e}");
                return Ok(TickOutcome::Skipped);
            }
        };

        let step = self.capture.step(frame, Instant::now());
        if let Some(message) = &step.log {
            self.forward_log(message);
        }

        if let Some(sequence) = self.capture.take_sequence() {
            self.logger
                .metric("frames_skipped", self.skipped_ticks as f64);
            let result = self.finish(sequence);
            if result.is_err() {
                self.capture.abandon();
            }
            self.logger.summary();
            return result.map(TickOutcome::Completed);
        }

        Ok(TickOutcome::Frame(step.frame))
    }

    /// Classify every word of a stacked `(N, fixed_length, landmarks, 3)` batch.
    pub fn predict_batch(&mut self, batch: Array4<f32>) -> Result<Vec<String>, SessionError> {
        let sequence = SessionSequence::from_batch(batch, self.capture.normalizer())?;
        self.predict_words(sequence)
    }

    /// Classify a batch saved as `.npy`, e.g. one captured on another machine.
    pub fn predict_saved_batch(&mut self, path: &Path) -> Result<Vec<String>, SessionError> {
        let data = npy::read_f32(path)?;
        let found = data.shape().to_vec();
        let batch = data.into_dimensionality::<Ix4>().map_err(|_| {
            let config = self.capture.normalizer().config();
            NormalizeError::ShapeMismatch {
                found,
                fixed_length: config.fixed_length,
                landmarks: config.landmark_subset.len(),
            }
        })?;
        self.predict_batch(batch)
    }

    /// Infer and classify each word in order. The first unclassifiable word
    /// stops the batch.
    pub fn predict_words(&mut self, sequence: SessionSequence) -> Result<Vec<String>, SessionError> {
        let mut words = Vec::with_capacity(sequence.len());
        for (i, tensor) in sequence.into_words().into_iter().enumerate() {
            let word = i + 1;

            let started = Instant::now();
            let outcome = self.dispatcher.infer(tensor);
            self.logger.timing("infer", elapsed_ms(started));

            let probabilities = match outcome {
                InferenceOutcome::Success {
                    probabilities,
                    tier,
                } => {
                    log::info!("Word {word} served by {tier} tier");
                    self.logger.served_by(tier);
                    probabilities
                }
                InferenceOutcome::LocalFailure { remote, local } => {
                    log::error!("Word {word} unclassifiable: remote: {remote}; local: {local}");
                    return Err(SessionError::TerminalInference {
                        word,
                        remote: remote.to_string(),
                        local,
                    });
                }
                InferenceOutcome::RemoteUnavailable(remote) => {
                    return Err(SessionError::TerminalInference {
                        word,
                        remote: remote.to_string(),
                        local: "not attempted".to_string(),
                    });
                }
            };

            let started = Instant::now();
            let token = classify(&probabilities, &self.vocabulary).map_err(|source| {
                log::error!("Word {word}: {source}; model and vocabulary disagree");
                SessionError::Classification { word, source }
            })?;
            self.logger.timing("classify", elapsed_ms(started));
            self.logger.info(&format!("Word {word}: {token}"));
            words.push(token);
        }
        Ok(words)
    }

    fn finish(&mut self, sequence: SessionSequence) -> Result<SessionResult, SessionError> {
        let words = self.predict_words(sequence)?;

        let started = Instant::now();
        let sentence = match self.language.sentence.generate(&words) {
            Ok(sentence) => sentence,
            Err(e) => {
                log::warn!("Sentence generation failed: {e}");
                String::new()
            }
        };
        self.logger.timing("sentence", elapsed_ms(started));
        self.logger.info(&format!("Sentence: {sentence}"));

        if let Some(speech) = self.language.speech.as_mut() {
            if !sentence.trim().is_empty() {
                let started = Instant::now();
                if let Err(e) = speech.speak(&sentence) {
                    log::warn!("Speech failed: {e}");
                }
                self.logger.timing("speech", elapsed_ms(started));
            }
        }

        Ok(SessionResult { words, sentence })
    }

    fn forward_log(&mut self, message: &str) {
        if self.capture.note_log_message(message) {
            self.logger.info(message);
        }
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
