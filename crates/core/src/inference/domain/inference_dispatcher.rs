use std::fmt;
use std::path::Path;

use ndarray::{Array4, Axis};

use crate::inference::domain::model_runtime::LocalModelRuntime;
use crate::inference::domain::npy;
use crate::inference::domain::probability_vector::ProbabilityVector;
use crate::inference::domain::remote_transport::{DeviceId, RemoteTransport, TransportError};
use crate::sequence::domain::sequence_normalizer::NormalizedTensor;
use crate::shared::constants::{
    REMOTE_DEVICE_DIR, REMOTE_INPUT_FILE, REMOTE_INTERPRETER, REMOTE_OUTPUT_FILE, REMOTE_SCRIPT,
};

/// Where transport files live on the device and how its entry point is run.
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteLayout {
    pub device_dir: String,
    pub script: String,
    pub interpreter: String,
    pub input_file: String,
    pub output_file: String,
}

impl RemoteLayout {
    pub fn remote_path(&self, file: &str) -> String {
        format!("{}/{file}", self.device_dir.trim_end_matches('/'))
    }
}

impl Default for RemoteLayout {
    fn default() -> Self {
        Self {
            device_dir: REMOTE_DEVICE_DIR.to_string(),
            script: REMOTE_SCRIPT.to_string(),
            interpreter: REMOTE_INTERPRETER.to_string(),
            input_file: REMOTE_INPUT_FILE.to_string(),
            output_file: REMOTE_OUTPUT_FILE.to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InferenceTier {
    Remote,
    Local,
}

impl fmt::Display for InferenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferenceTier::Remote => f.write_str("remote"),
            InferenceTier::Local => f.write_str("local"),
        }
    }
}

/// The dispatcher's fallback ladder.
///
/// `RemoteUnavailable` is the intermediate rung between the two tiers and is
/// never returned from [`InferenceDispatcher::infer`].
#[derive(Debug)]
pub enum InferenceOutcome {
    Success {
        probabilities: ProbabilityVector,
        tier: InferenceTier,
    },
    RemoteUnavailable(TransportError),
    LocalFailure {
        remote: TransportError,
        local: String,
    },
}

/// Removes remote transport files when dropped, on every exit path.
struct RemoteCleanup<'a> {
    transport: &'a mut dyn RemoteTransport,
    device: DeviceId,
    files: Vec<String>,
}

impl Drop for RemoteCleanup<'_> {
    fn drop(&mut self) {
        for file in &self.files {
            if let Err(e) = self.transport.remove(&self.device, file) {
                log::warn!("Failed to remove remote {file}: {e}");
            }
        }
    }
}

/// Obtains class scores for one word: accelerator first, local model second.
pub struct InferenceDispatcher {
    transport: Option<Box<dyn RemoteTransport>>,
    runtime: Box<dyn LocalModelRuntime>,
    layout: RemoteLayout,
}

impl InferenceDispatcher {
    /// `transport: None` disables the remote tier.
    pub fn new(
        transport: Option<Box<dyn RemoteTransport>>,
        runtime: Box<dyn LocalModelRuntime>,
        layout: RemoteLayout,
    ) -> Self {
        Self {
            transport,
            runtime,
            layout,
        }
    }

    pub fn infer(&mut self, tensor: NormalizedTensor) -> InferenceOutcome {
        let batch = tensor.into_array().insert_axis(Axis(0));

        match self.try_remote(&batch) {
            InferenceOutcome::RemoteUnavailable(remote) => {
                log::warn!("Remote inference unavailable, falling back to local: {remote}");
                self.try_local(batch, remote)
            }
            outcome => outcome,
        }
    }

    fn try_remote(&mut self, batch: &Array4<f32>) -> InferenceOutcome {
        let Some(transport) = self.transport.as_deref_mut() else {
            return InferenceOutcome::RemoteUnavailable(TransportError::Disabled);
        };
        match run_remote(transport, &self.layout, batch) {
            Ok(probabilities) => {
                log::info!("Inference done on remote accelerator");
                InferenceOutcome::Success {
                    probabilities,
                    tier: InferenceTier::Remote,
                }
            }
            Err(e) => InferenceOutcome::RemoteUnavailable(e),
        }
    }

    fn try_local(&mut self, batch: Array4<f32>, remote: TransportError) -> InferenceOutcome {
        match self.runtime.run(batch) {
            Ok(scores) if !scores.is_empty() => {
                log::info!("Inference done on local runtime");
                InferenceOutcome::Success {
                    probabilities: ProbabilityVector::new(scores),
                    tier: InferenceTier::Local,
                }
            }
            Ok(_) => InferenceOutcome::LocalFailure {
                remote,
                local: "local model returned no scores".to_string(),
            },
            Err(e) => {
                log::error!("Local inference failed: {e}");
                InferenceOutcome::LocalFailure {
                    remote,
                    local: e.to_string(),
                }
            }
        }
    }
}

fn run_remote(
    transport: &mut dyn RemoteTransport,
    layout: &RemoteLayout,
    batch: &Array4<f32>,
) -> Result<ProbabilityVector, TransportError> {
    let device = transport.discover()?.ok_or(TransportError::NoDevice)?;
    log::info!("Accelerator detected: {device}");

    let staging = tempfile::tempdir().map_err(|e| TransportError::Staging(e.to_string()))?;
    let local_input = staging.path().join(&layout.input_file);
    npy::write_f32(&local_input, batch.view().into_dyn())
        .map_err(|e| TransportError::Staging(e.to_string()))?;

    let remote_input = layout.remote_path(&layout.input_file);
    let remote_output = layout.remote_path(&layout.output_file);

    match transport.remove(&device, &remote_output) {
        Err(e @ TransportError::Timeout { .. }) => return Err(e),
        Err(e) => log::debug!("Pre-clean of {remote_output} failed: {e}"),
        Ok(()) => {}
    }

    let mut cleanup = RemoteCleanup {
        transport,
        device,
        files: vec![remote_input, remote_output.clone()],
    };
    let exchanged = exchange(&mut cleanup, layout, &local_input, &remote_output, staging.path());
    if let Err(TransportError::Timeout { .. }) = &exchanged {
        log::warn!("Device stopped responding, leaving remote files in place");
        cleanup.files.clear();
    }
    drop(cleanup);
    exchanged?;

    read_scores(&staging.path().join(&layout.output_file))
}

/// Push the input, run the device script, and pull the result.
fn exchange(
    cleanup: &mut RemoteCleanup<'_>,
    layout: &RemoteLayout,
    local_input: &Path,
    remote_output: &str,
    local_dir: &Path,
) -> Result<(), TransportError> {
    let device = &cleanup.device;
    cleanup.transport.push(device, local_input, &layout.device_dir)?;
    cleanup
        .transport
        .execute(device, &[layout.interpreter.as_str(), layout.script.as_str()])?;
    cleanup.transport.pull(device, remote_output, local_dir)
}

fn read_scores(path: &Path) -> Result<ProbabilityVector, TransportError> {
    let result = npy::read_f32(path).map_err(|e| TransportError::BadResult(e.to_string()))?;
    if result.is_empty() {
        return Err(TransportError::BadResult("result holds no scores".to_string()));
    }
    Ok(ProbabilityVector::new(result.iter().copied().collect()))
}
