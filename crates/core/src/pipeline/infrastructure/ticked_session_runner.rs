use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::capture::domain::capture_state_machine::AnnotatedFrame;
use crate::pipeline::session_controller::{
    SessionController, SessionError, SessionResult, TickOutcome,
};

/// Anything that can be driven one tick at a time.
pub trait SessionDriver {
    fn start_session(&mut self);
    fn tick(&mut self) -> Result<TickOutcome, SessionError>;
}

impl SessionDriver for SessionController {
    fn start_session(&mut self) {
        SessionController::start_session(self);
    }

    fn tick(&mut self) -> Result<TickOutcome, SessionError> {
        SessionController::tick(self)
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    Completed(SessionResult),
    Cancelled,
    /// Gave up after this many consecutive ticks without a frame.
    Stalled { ticks: usize },
}

#[derive(Clone, Debug)]
pub struct RunnerConfig {
    pub interval: Duration,
    /// `None` waits for frames forever.
    pub max_stalled_ticks: Option<usize>,
    pub cancelled: Arc<AtomicBool>,
}

/// Drives one session from a fixed-interval ticker.
pub struct TickedSessionRunner {
    config: RunnerConfig,
}

impl TickedSessionRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Run until the session completes, fails, is cancelled, or stalls.
    ///
    /// Stalling leaves the session unfinished; nothing is classified.
    pub fn run(
        &self,
        driver: &mut dyn SessionDriver,
        mut on_frame: impl FnMut(&AnnotatedFrame),
    ) -> Result<RunOutcome, SessionError> {
        let ticker = crossbeam_channel::tick(self.config.interval);
        driver.start_session();

        let mut stalled = 0usize;
        loop {
            if self.config.cancelled.load(Ordering::Relaxed) {
                log::info!("Session cancelled");
                return Ok(RunOutcome::Cancelled);
            }
            if ticker.recv().is_err() {
                return Ok(RunOutcome::Cancelled);
            }

            match driver.tick()? {
                TickOutcome::Completed(result) => return Ok(RunOutcome::Completed(result)),
                TickOutcome::Frame(frame) => {
                    stalled = 0;
                    on_frame(&frame);
                }
                TickOutcome::Skipped => {
                    stalled += 1;
                    if self.config.max_stalled_ticks.is_some_and(|max| stalled >= max) {
                        log::warn!("No frames for {stalled} ticks, giving up");
                        return Ok(RunOutcome::Stalled { ticks: stalled });
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::frame::Frame;
    use std::collections::VecDeque;

    enum Scripted {
        Frame,
        Skip,
        Done,
        Fail,
    }

    struct ScriptedDriver {
        script: VecDeque<Scripted>,
        started: bool,
        ticks: usize,
    }

    impl ScriptedDriver {
        fn new(script: Vec<Scripted>) -> Self {
            Self {
                script: script.into(),
                started: false,
                ticks: 0,
            }
        }
    }

    impl SessionDriver for ScriptedDriver {
        fn start_session(&mut self) {
            self.started = true;
        }

        fn tick(&mut self) -> Result<TickOutcome, SessionError> {
            self.ticks += 1;
            match self.script.pop_front().unwrap_or(Scripted::Skip) {
                Scripted::Frame => Ok(TickOutcome::Frame(AnnotatedFrame {
                    frame: Frame::new(vec![0; 3], 1, 1, self.ticks),
                    overlay: Some("Capturing word 1".to_string()),
                })),
                Scripted::Skip => Ok(TickOutcome::Skipped),
                Scripted::Done => Ok(TickOutcome::Completed(SessionResult {
                    words: vec!["hello".to_string()],
                    sentence: "Hello.".to_string(),
                })),
                Scripted::Fail => Err(SessionError::TerminalInference {
                    word: 1,
                    remote: "no device".to_string(),
                    local: "model missing".to_string(),
                }),
            }
        }
    }

    fn runner(max_stalled_ticks: Option<usize>) -> TickedSessionRunner {
        TickedSessionRunner::new(RunnerConfig {
            interval: Duration::from_millis(1),
            max_stalled_ticks,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    #[test]
    fn test_runs_until_completion() {
        let mut driver = ScriptedDriver::new(vec![Scripted::Frame, Scripted::Skip, Scripted::Done]);
        let mut overlays = Vec::new();

        let outcome = runner(None)
            .run(&mut driver, |f| overlays.push(f.overlay.clone()))
            .unwrap();

        assert!(driver.started);
        assert_eq!(driver.ticks, 3);
        assert_eq!(overlays, vec![Some("Capturing word 1".to_string())]);
        match outcome {
            RunOutcome::Completed(result) => assert_eq!(result.sentence, "Hello."),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_gives_up_after_consecutive_skips() {
        let mut driver = ScriptedDriver::new(vec![]);

        let outcome = runner(Some(5)).run(&mut driver, |_| {}).unwrap();

        assert!(matches!(outcome, RunOutcome::Stalled { ticks: 5 }));
        assert_eq!(driver.ticks, 5);
    }

    #[test]
    fn test_frame_resets_stall_count() {
        let mut driver = ScriptedDriver::new(vec![
            Scripted::Skip,
            Scripted::Skip,
            Scripted::Skip,
            Scripted::Frame,
            Scripted::Skip,
            Scripted::Skip,
            Scripted::Skip,
            Scripted::Done,
        ]);

        let outcome = runner(Some(4)).run(&mut driver, |_| {}).unwrap();

        assert!(matches!(outcome, RunOutcome::Completed(_)));
    }

    #[test]
    fn test_cancel_flag_stops_before_next_tick() {
        let mut driver = ScriptedDriver::new(vec![]);
        let runner = runner(None);
        runner.config.cancelled.store(true, Ordering::Relaxed);

        let outcome = runner.run(&mut driver, |_| {}).unwrap();

        assert!(matches!(outcome, RunOutcome::Cancelled));
        assert_eq!(driver.ticks, 0);
    }

    #[test]
    fn test_cancel_from_frame_callback() {
        let mut driver = ScriptedDriver::new(vec![Scripted::Frame, Scripted::Frame, Scripted::Done]);
        let runner = runner(None);
        let cancelled = runner.config.cancelled.clone();

        let outcome = runner
            .run(&mut driver, |_| cancelled.store(true, Ordering::Relaxed))
            .unwrap();

        assert!(matches!(outcome, RunOutcome::Cancelled));
        assert_eq!(driver.ticks, 1);
    }

    #[test]
    fn test_session_error_propagates() {
        let mut driver = ScriptedDriver::new(vec![Scripted::Frame, Scripted::Fail]);

        let result = runner(None).run(&mut driver, |_| {});

        assert!(matches!(
            result,
            Err(SessionError::TerminalInference { word: 1, .. })
        ));
    }
}
