//! Startup strategy classification

use crate::PredictorKind;
use serde::{Deserialize, Serialize};

/// Whether models are fetched lazily by the serving runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CachingMode {
    Enabled,
    Disabled,
}

impl From<bool> for CachingMode {
    fn from(enabled: bool) -> Self {
        if enabled {
            CachingMode::Enabled
        } else {
            CachingMode::Disabled
        }
    }
}

/// How models are made available before serving starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartupStrategy {
    /// Background daemon stages the model tree on disk
    FileSync,
    /// Background daemon stages models and registers them with one backing server
    BackingServerSync,
    /// One-shot model configuration across every backing server
    BackingServerDirectLoad,
    /// Models are loaded on demand by the serving runtime
    None,
}

impl StartupStrategy {
    /// Select the startup strategy for a predictor kind and caching mode
    pub fn classify(kind: PredictorKind, caching: CachingMode) -> Self {
        match (caching, kind) {
            (CachingMode::Enabled, _) => StartupStrategy::None,
            (CachingMode::Disabled, PredictorKind::Python | PredictorKind::Onnx) => {
                StartupStrategy::FileSync
            }
            (CachingMode::Disabled, PredictorKind::TensorFlow) => {
                StartupStrategy::BackingServerSync
            }
            (CachingMode::Disabled, PredictorKind::TensorFlowNeuron) => {
                StartupStrategy::BackingServerDirectLoad
            }
        }
    }
}

impl std::fmt::Display for StartupStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartupStrategy::FileSync => write!(f, "file-sync"),
            StartupStrategy::BackingServerSync => write!(f, "backing-server-sync"),
            StartupStrategy::BackingServerDirectLoad => write!(f, "backing-server-direct-load"),
            StartupStrategy::None => write!(f, "none"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caching_enabled_always_none() {
        for kind in PredictorKind::ALL {
            assert_eq!(
                StartupStrategy::classify(kind, CachingMode::Enabled),
                StartupStrategy::None
            );
        }
    }

    #[test]
    fn test_caching_disabled_table() {
        let expected = [
            (PredictorKind::Python, StartupStrategy::FileSync),
            (PredictorKind::Onnx, StartupStrategy::FileSync),
            (PredictorKind::TensorFlow, StartupStrategy::BackingServerSync),
            (
                PredictorKind::TensorFlowNeuron,
                StartupStrategy::BackingServerDirectLoad,
            ),
        ];
        for (kind, strategy) in expected {
            assert_eq!(
                StartupStrategy::classify(kind, CachingMode::Disabled),
                strategy
            );
        }
    }

    #[test]
    fn test_classify_is_deterministic() {
        for kind in PredictorKind::ALL {
            for caching in [CachingMode::Enabled, CachingMode::Disabled] {
                assert_eq!(
                    StartupStrategy::classify(kind, caching),
                    StartupStrategy::classify(kind, caching)
                );
            }
        }
    }

    #[test]
    fn test_caching_mode_from_bool() {
        assert_eq!(CachingMode::from(true), CachingMode::Enabled);
        assert_eq!(CachingMode::from(false), CachingMode::Disabled);
    }
}
