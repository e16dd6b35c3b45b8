pub mod execution_provider;
pub mod mdt_transport;
pub mod onnx_model_runtime;
