/// Domain interface for speaking a sentence aloud.
///
/// `speak` blocks until playback has finished. Empty text is a no-op.
pub trait SpeechSynthesizer: Send {
    fn speak(&mut self, text: &str) -> Result<(), Box<dyn std::error::Error>>;
}
