use std::process::{Command, Stdio};

use crate::language::domain::speech_synthesizer::SpeechSynthesizer;

#[cfg(target_os = "macos")]
const DEFAULT_PROGRAM: (&str, &str) = ("say", "-r");
#[cfg(not(target_os = "macos"))]
const DEFAULT_PROGRAM: (&str, &str) = ("espeak-ng", "-s");

/// Speaks through the platform's text-to-speech command.
pub struct CommandSpeechSynthesizer {
    program: String,
    rate_flag: String,
    rate_wpm: u32,
}

impl CommandSpeechSynthesizer {
    /// `say` on macOS, `espeak-ng` elsewhere.
    pub fn new(rate_wpm: u32) -> Self {
        let (program, rate_flag) = DEFAULT_PROGRAM;
        Self::with_program(program, rate_flag, rate_wpm)
    }

    pub fn with_program(
        program: impl Into<String>,
        rate_flag: impl Into<String>,
        rate_wpm: u32,
    ) -> Self {
        Self {
            program: program.into(),
            rate_flag: rate_flag.into(),
            rate_wpm,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl SpeechSynthesizer for CommandSpeechSynthesizer {
    fn speak(&mut self, text: &str) -> Result<(), Box<dyn std::error::Error>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        let status = Command::new(&self.program)
            .arg(&self.rate_flag)
            .arg(self.rate_wpm.to_string())
            .arg(text)
            .stdin(Stdio::null())
            .status()
            .map_err(|e| format!("Failed to run {}: {e}", self.program))?;

        if !status.success() {
            return Err(format!("{} exited with {status}", self.program).into());
        }
        Ok(())
    }
}
