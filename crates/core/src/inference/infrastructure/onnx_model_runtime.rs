use std::path::{Path, PathBuf};

use ndarray::Array4;

use crate::inference::domain::model_runtime::LocalModelRuntime;
use crate::inference::infrastructure::execution_provider::{
    preferred_execution_providers, preferred_provider_name,
};

/// Quantized word classifier run through ONNX Runtime.
///
/// The session is created on first use. A failed run drops it so the next
/// call starts from a fresh session.
pub struct OnnxModelRuntime {
    model_path: PathBuf,
    session: Option<ort::session::Session>,
}

impl OnnxModelRuntime {
    pub fn new(model_path: PathBuf) -> Self {
        Self {
            model_path,
            session: None,
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn is_loaded(&self) -> bool {
        self.session.is_some()
    }

    fn session(&mut self) -> Result<&mut ort::session::Session, Box<dyn std::error::Error>> {
        if self.session.is_none() {
            if !self.model_path.is_file() {
                return Err(format!("Model not found: {}", self.model_path.display()).into());
            }
            let session = ort::session::Session::builder()?
                .with_execution_providers(preferred_execution_providers())?
                .commit_from_file(&self.model_path)?;
            log::info!(
                "Loaded {} ({} provider)",
                self.model_path.display(),
                preferred_provider_name()
            );
            self.session = Some(session);
        }
        self.session
            .as_mut()
            .ok_or_else(|| "Model session unavailable".into())
    }

    fn run_session(&mut self, input: Array4<f32>) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        let session = self.session()?;
        let input_value = ort::value::Tensor::from_array(input)?;
        let outputs = session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("Model produced no outputs".into());
        }
        let scores = outputs[0].try_extract_array::<f32>()?;
        Ok(scores.iter().copied().collect())
    }
}

impl LocalModelRuntime for OnnxModelRuntime {
    fn run(&mut self, input: Array4<f32>) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        let result = self.run_session(input);
        if result.is_err() {
            self.session = None;
        }
        result
    }
}
