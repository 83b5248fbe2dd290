//! API spec document and predictor kinds

use crate::{ServdError, ServdResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Declarative API specification retrieved at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSpec {
    /// API name
    pub name: String,
    /// Predictor section
    pub predictor: PredictorSpec,
    /// Compute resources requested per replica
    #[serde(default)]
    pub compute: ComputeSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorSpec {
    /// Predictor type (python, tensorflow, onnx)
    #[serde(rename = "type")]
    pub predictor_type: String,
    #[serde(default = "default_processes_per_replica")]
    pub processes_per_replica: u32,
    #[serde(default)]
    pub models: Option<ModelsSpec>,
}

fn default_processes_per_replica() -> u32 {
    1
}

/// Model set and caching parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelsSpec {
    /// Number of models kept in memory
    #[serde(default)]
    pub cache_size: Option<u64>,
    /// Number of models kept on disk
    #[serde(default)]
    pub disk_cache_size: Option<u64>,
    #[serde(default)]
    pub paths: Vec<ModelResource>,
}

/// A named model and where it is sourced from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelResource {
    pub name: String,
    /// Local path or remote URL of the model
    pub model_path: String,
}

impl ModelResource {
    /// Local source directory, if the model is not hosted remotely
    pub fn local_source(&self) -> Option<&Path> {
        if self.model_path.contains("://") {
            None
        } else {
            Some(Path::new(&self.model_path))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComputeSpec {
    #[serde(default)]
    pub cpu: Option<String>,
    #[serde(default)]
    pub gpu: u32,
    /// Inferentia accelerators
    #[serde(default)]
    pub inf: u32,
}

impl ApiSpec {
    /// Parse a spec document
    pub fn from_json(bytes: &[u8]) -> ServdResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Caching is enabled iff both cache sizes are present
    pub fn caching_enabled(&self) -> bool {
        self.predictor
            .models
            .as_ref()
            .map_or(false, |m| m.cache_size.is_some() && m.disk_cache_size.is_some())
    }

    /// Models declared by the spec
    pub fn models(&self) -> &[ModelResource] {
        self.predictor
            .models
            .as_ref()
            .map(|m| m.paths.as_slice())
            .unwrap_or(&[])
    }

    /// Names of the declared models, in declaration order
    pub fn model_names(&self) -> Vec<String> {
        self.models().iter().map(|m| m.name.clone()).collect()
    }

    /// On-disk path of every declared model under `model_dir`
    pub fn model_paths(&self, model_dir: &Path) -> Vec<PathBuf> {
        self.models().iter().map(|m| model_dir.join(&m.name)).collect()
    }
}

/// Category of model-execution backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredictorKind {
    Python,
    TensorFlow,
    TensorFlowNeuron,
    Onnx,
}

impl PredictorKind {
    /// All predictor kinds
    pub const ALL: [PredictorKind; 4] = [
        PredictorKind::Python,
        PredictorKind::TensorFlow,
        PredictorKind::TensorFlowNeuron,
        PredictorKind::Onnx,
    ];

    /// Derive the predictor kind from a spec
    pub fn from_spec(spec: &ApiSpec) -> ServdResult<Self> {
        match spec.predictor.predictor_type.to_lowercase().as_str() {
            "python" => Ok(PredictorKind::Python),
            "onnx" => Ok(PredictorKind::Onnx),
            "tensorflow" if spec.compute.inf > 0 => Ok(PredictorKind::TensorFlowNeuron),
            "tensorflow" => Ok(PredictorKind::TensorFlow),
            other => Err(ServdError::MissingConfiguration(format!(
                "unrecognized predictor type '{}' in api '{}'",
                other, spec.name
            ))),
        }
    }
}

impl std::fmt::Display for PredictorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PredictorKind::Python => write!(f, "python"),
            PredictorKind::TensorFlow => write!(f, "tensorflow"),
            PredictorKind::TensorFlowNeuron => write!(f, "tensorflow-neuron"),
            PredictorKind::Onnx => write!(f, "onnx"),
        }
    }
}
