/// Domain interface for composing recognized glosses into a sentence.
pub trait SentenceGenerator: Send {
    fn generate(&mut self, words: &[String]) -> Result<String, Box<dyn std::error::Error>>;
}
