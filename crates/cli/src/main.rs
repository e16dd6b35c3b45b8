use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use sign2speech_core::capture::domain::capture_state_machine::CaptureStateMachine;
use sign2speech_core::capture::domain::frame_source::FrameSource;
use sign2speech_core::capture::infrastructure::ffmpeg_frame_source::FfmpegFrameSource;
use sign2speech_core::capture::infrastructure::image_sequence_frame_source::ImageSequenceFrameSource;
use sign2speech_core::inference::domain::inference_dispatcher::InferenceDispatcher;
use sign2speech_core::inference::domain::remote_transport::RemoteTransport;
use sign2speech_core::inference::domain::word_classifier::VocabularyTable;
use sign2speech_core::inference::infrastructure::execution_provider::preferred_provider_name;
use sign2speech_core::inference::infrastructure::mdt_transport::MdtTransport;
use sign2speech_core::inference::infrastructure::onnx_model_runtime::OnnxModelRuntime;
use sign2speech_core::landmarks::domain::landmark_extractor::LandmarkExtractor;
use sign2speech_core::landmarks::infrastructure::recorded_landmark_detector::RecordedLandmarkDetector;
use sign2speech_core::language::domain::speech_synthesizer::SpeechSynthesizer;
use sign2speech_core::language::infrastructure::command_speech_synthesizer::CommandSpeechSynthesizer;
use sign2speech_core::language::infrastructure::http_sentence_generator::HttpSentenceGenerator;
use sign2speech_core::pipeline::infrastructure::ticked_session_runner::{
    RunOutcome, RunnerConfig, TickedSessionRunner,
};
use sign2speech_core::pipeline::session_controller::{LanguageStage, SessionController};
use sign2speech_core::pipeline::session_logger::StdoutSessionLogger;
use sign2speech_core::sequence::domain::sequence_normalizer::SequenceNormalizer;
use sign2speech_core::shared::config::Config;
use sign2speech_core::shared::frame::Frame;
use sign2speech_core::shared::model_resolver::{self, ModelLookup};

/// Recognize signed words from a video and speak them as a sentence.
#[derive(Parser)]
#[command(name = "sign2speech")]
struct Cli {
    /// Input video file, or a directory of still frames.
    #[arg(required_unless_present = "batch")]
    source: Option<PathBuf>,

    /// Recorded holistic landmarks for the source (JSON, keyed by frame index).
    #[arg(long, required_unless_present = "batch")]
    landmarks: Option<PathBuf>,

    /// Classify a saved (words, frames, landmarks, 3) .npy batch instead of capturing.
    #[arg(long, conflicts_with_all = ["source", "landmarks"])]
    batch: Option<PathBuf>,

    /// Config file (defaults to the user config, then built-in defaults).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of words per session.
    #[arg(long)]
    words: Option<usize>,

    /// Frames captured for each word.
    #[arg(long)]
    frames_per_word: Option<usize>,

    /// Classifier model (.onnx). Skips cache lookup and download.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Class-index to gloss table (JSON).
    #[arg(long)]
    vocabulary: Option<PathBuf>,

    /// Run inference locally only, without the accelerator device.
    #[arg(long)]
    no_remote: bool,

    /// Print the sentence without speaking it.
    #[arg(long)]
    no_speech: bool,

    /// Give up after this many ticks without a frame (0 = wait forever).
    #[arg(long, default_value = "100")]
    stall_ticks: usize,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let mut config = Config::load(cli.config.as_deref())?;
    apply_overrides(&mut config, &cli);
    config.validate()?;

    let (source, capture) = match (&cli.source, &cli.landmarks, &cli.batch) {
        (Some(source), Some(landmarks), None) => {
            (open_source(source)?, build_capture(&config, landmarks)?)
        }
        _ => (
            Box::new(NoFrames) as Box<dyn FrameSource>,
            build_capture_without_landmarks(&config)?,
        ),
    };
    let dispatcher = build_dispatcher(&config)?;
    let vocabulary = Arc::new(VocabularyTable::load(&config.inference.vocabulary_path)?);
    log::info!("Loaded vocabulary with {} glosses", vocabulary.len());

    let sentence = HttpSentenceGenerator::new(
        config.sentence.url.clone(),
        Duration::from_secs(config.sentence.timeout_secs),
    )?;
    let speech: Option<Box<dyn SpeechSynthesizer>> = if config.speech.enabled {
        Some(Box::new(CommandSpeechSynthesizer::new(config.speech.rate_wpm)))
    } else {
        None
    };

    let mut controller = SessionController::new(
        source,
        capture,
        dispatcher,
        vocabulary,
        LanguageStage {
            sentence: Box::new(sentence),
            speech,
        },
        Box::new(StdoutSessionLogger::new()),
    );

    if let Some(batch) = &cli.batch {
        let words = controller.predict_saved_batch(batch)?;
        println!("Words: {}", words.join(" "));
        return Ok(());
    }

    let runner = TickedSessionRunner::new(RunnerConfig {
        interval: config.tick_interval(),
        max_stalled_ticks: (cli.stall_ticks > 0).then_some(cli.stall_ticks),
        cancelled: Arc::new(AtomicBool::new(false)),
    });

    let mut last_overlay: Option<String> = None;
    let outcome = runner.run(&mut controller, |frame| {
        if frame.overlay != last_overlay {
            if let Some(text) = &frame.overlay {
                eprint!("\r{text:<24}");
            }
            last_overlay = frame.overlay.clone();
        }
    })?;
    eprintln!();

    match outcome {
        RunOutcome::Completed(result) => {
            println!("Words: {}", result.words.join(" "));
            if result.sentence.is_empty() {
                println!("Sentence: (unavailable)");
            } else {
                println!("Sentence: {}", result.sentence);
            }
            Ok(())
        }
        RunOutcome::Cancelled => {
            log::info!("Session cancelled before completion");
            Ok(())
        }
        RunOutcome::Stalled { ticks } => Err(format!(
            "Source ran out of frames ({ticks} ticks without a frame, {} of {} words captured)",
            controller.capture().captured_words(),
            config.capture.total_words
        )
        .into()),
    }
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(words) = cli.words {
        config.capture.total_words = words;
    }
    if let Some(frames) = cli.frames_per_word {
        config.capture.frames_per_word = frames;
    }
    if let Some(model) = &cli.model {
        config.inference.model_path = Some(model.clone());
    }
    if let Some(vocabulary) = &cli.vocabulary {
        config.inference.vocabulary_path = vocabulary.clone();
    }
    if cli.no_remote {
        config.inference.remote_enabled = false;
    }
    if cli.no_speech {
        config.speech.enabled = false;
    }
}

fn open_source(path: &Path) -> Result<Box<dyn FrameSource>, Box<dyn std::error::Error>> {
    if path.is_dir() {
        let source = ImageSequenceFrameSource::open(path)?;
        log::info!("Reading {} frames from {}", source.len(), path.display());
        Ok(Box::new(source))
    } else {
        let source = FfmpegFrameSource::open(path)?;
        log::info!(
            "Decoding {} ({}x{})",
            path.display(),
            source.width(),
            source.height()
        );
        Ok(Box::new(source))
    }
}

/// Frame source for batch runs, which never capture.
struct NoFrames;

impl FrameSource for NoFrames {
    fn read_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        Ok(None)
    }
}

fn build_capture(
    config: &Config,
    landmarks: &Path,
) -> Result<CaptureStateMachine, Box<dyn std::error::Error>> {
    let detector = RecordedLandmarkDetector::from_file(landmarks)?;
    log::info!("Loaded landmarks for {} frames", detector.len());
    capture_with(config, detector)
}

/// Batch runs only need the normalizer's shape for validation.
fn build_capture_without_landmarks(
    config: &Config,
) -> Result<CaptureStateMachine, Box<dyn std::error::Error>> {
    capture_with(config, RecordedLandmarkDetector::new(Arc::default()))
}

fn capture_with(
    config: &Config,
    detector: RecordedLandmarkDetector,
) -> Result<CaptureStateMachine, Box<dyn std::error::Error>> {
    let extractor = LandmarkExtractor::new(Box::new(detector));
    let normalizer = SequenceNormalizer::new(config.normalizer_config())?;
    Ok(CaptureStateMachine::new(
        config.capture_config(),
        extractor,
        normalizer,
    ))
}

fn build_dispatcher(config: &Config) -> Result<InferenceDispatcher, Box<dyn std::error::Error>> {
    let inference = &config.inference;
    log::info!("Resolving model: {}", inference.model_name);
    let model_path = model_resolver::resolve(
        &ModelLookup {
            name: &inference.model_name,
            explicit: inference.model_path.as_deref(),
            bundled_dir: config.bundled_model_dir(),
            url: inference.model_url.as_deref(),
        },
        Some(Box::new(download_progress)),
    )?;
    log::info!(
        "Local model {} ({} execution provider)",
        model_path.display(),
        preferred_provider_name()
    );
    let runtime = OnnxModelRuntime::new(model_path);

    let transport: Option<Box<dyn RemoteTransport>> = if inference.remote_enabled {
        Some(Box::new(MdtTransport::new(
            inference.remote.program.clone(),
            config.step_timeout(),
        )))
    } else {
        log::info!("Remote inference disabled");
        None
    };

    Ok(InferenceDispatcher::new(
        transport,
        Box::new(runtime),
        config.remote_layout(),
    ))
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(source) = &cli.source {
        if !source.exists() {
            return Err(format!("Source not found: {}", source.display()).into());
        }
    }
    if let Some(landmarks) = &cli.landmarks {
        if !landmarks.is_file() {
            return Err(format!("Landmarks file not found: {}", landmarks.display()).into());
        }
    }
    if let Some(batch) = &cli.batch {
        if !batch.is_file() {
            return Err(format!("Batch file not found: {}", batch.display()).into());
        }
    }
    if cli.words == Some(0) {
        return Err("Words must be at least 1".into());
    }
    if cli.frames_per_word == Some(0) {
        return Err("Frames per word must be at least 1".into());
    }
    if let Some(model) = &cli.model {
        if !model.is_file() {
            return Err(format!("Model file not found: {}", model.display()).into());
        }
    }
    Ok(())
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading classifier model... {pct}%");
    } else {
        eprint!("\rDownloading classifier model... {downloaded} bytes");
    }
}
