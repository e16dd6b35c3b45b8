use ndarray::Array4;

/// Domain interface for the on-host classifier.
///
/// Input is a `(1, fixed_length, landmarks, 3)` batch; output is one score
/// per vocabulary class.
pub trait LocalModelRuntime: Send {
    fn run(&mut self, input: Array4<f32>) -> Result<Vec<f32>, Box<dyn std::error::Error>>;
}
