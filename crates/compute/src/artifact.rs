//! Persisted model artifact.
//!
//! MessagePack-encoded [`IsolationForest`] plus the metadata needed to refuse
//! an artifact that was trained on a different feature set.

use std::path::Path;

use chargewatch_core::FEATURES;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::algorithms::isolation_forest::IsolationForest;
use crate::error::ModelError;

/// Bumped whenever the encoded layout changes.
pub const ARTIFACT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub version: u32,
    /// Feature names in the order the forest expects them.
    pub features: Vec<String>,
    pub training_rows: usize,
    pub seed: u64,
    pub trained_at: DateTime<Utc>,
    pub forest: IsolationForest,
}

impl ModelArtifact {
    /// Stamped with the current time.
    pub fn new(forest: IsolationForest, training_rows: usize) -> Self {
        Self::with_trained_at(forest, training_rows, Utc::now())
    }

    /// Same forest, rows and timestamp encode to the same bytes.
    pub fn with_trained_at(
        forest: IsolationForest,
        training_rows: usize,
        trained_at: DateTime<Utc>,
    ) -> Self {
        let seed = forest.params().seed;
        Self {
            version: ARTIFACT_VERSION,
            features: FEATURES.iter().map(|f| f.to_string()).collect(),
            training_rows,
            seed,
            trained_at,
            forest,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ModelError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        let artifact: Self = rmp_serde::from_slice(bytes)?;
        artifact.validate()?;
        Ok(artifact)
    }

    /// Write the artifact, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = self.to_bytes()?;
        std::fs::write(path, &bytes)?;
        info!(path = %path.display(), bytes = bytes.len(), "model artifact saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        if !path.exists() {
            return Err(ModelError::NotFound(path.to_path_buf()));
        }
        let bytes = std::fs::read(path)?;
        let artifact = Self::from_bytes(&bytes)?;
        info!(
            path = %path.display(),
            trees = artifact.forest.n_estimators(),
            trained_at = %artifact.trained_at,
            "model artifact loaded"
        );
        Ok(artifact)
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.version != ARTIFACT_VERSION {
            return Err(ModelError::UnsupportedVersion {
                found: self.version,
                expected: ARTIFACT_VERSION,
            });
        }
        let expected: Vec<String> = FEATURES.iter().map(|f| f.to_string()).collect();
        if self.features != expected || self.forest.n_features() != expected.len() {
            return Err(ModelError::FeatureMismatch {
                found: self.features.clone(),
                expected,
            });
        }
        self.forest.validate().map_err(ModelError::Corrupt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::isolation_forest::ForestParams;
    use crate::error::ForestError;

    fn small_artifact() -> ModelArtifact {
        let rows: Vec<Vec<f64>> = (0..64)
            .map(|i| {
                let t = i as f64;
                vec![480.0 + t % 5.0, 30.0 + t % 3.0, 70.0 + t % 4.0, 1500.0 + t % 7.0]
            })
            .collect();
        let params = ForestParams {
            n_estimators: 10,
            ..ForestParams::default()
        };
        ModelArtifact::new(IsolationForest::fit(&rows, params).unwrap(), rows.len())
    }

    #[test]
    fn bytes_round_trip() {
        let artifact = small_artifact();
        let decoded = ModelArtifact::from_bytes(&artifact.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, artifact);
        assert_eq!(decoded.seed, 42);
        assert_eq!(decoded.training_rows, 64);
    }

    #[test]
    fn save_and_load_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models/ev_model.msgpack");
        let artifact = small_artifact();
        artifact.save(&path).unwrap();
        assert_eq!(ModelArtifact::load(&path).unwrap(), artifact);
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = ModelArtifact::load(Path::new("/nonexistent/ev_model.msgpack")).unwrap_err();
        assert!(matches!(err, ModelError::NotFound(_)));
        assert!(err.to_string().contains("chargewatch train"));
    }

    #[test]
    fn wrong_version_is_rejected() {
        let mut artifact = small_artifact();
        artifact.version = 99;
        let bytes = rmp_serde::to_vec_named(&artifact).unwrap();
        assert!(matches!(
            ModelArtifact::from_bytes(&bytes),
            Err(ModelError::UnsupportedVersion { found: 99, .. })
        ));
    }

    #[test]
    fn foreign_feature_set_is_rejected() {
        let mut artifact = small_artifact();
        artifact.features.reverse();
        let bytes = rmp_serde::to_vec_named(&artifact).unwrap();
        assert!(matches!(
            ModelArtifact::from_bytes(&bytes),
            Err(ModelError::FeatureMismatch { .. })
        ));
    }

    /// Re-encode `artifact` with its forest edited through JSON.
    fn with_forest_edit(
        artifact: &ModelArtifact,
        edit: impl FnOnce(&mut serde_json::Value),
    ) -> Vec<u8> {
        let mut forest = serde_json::to_value(&artifact.forest).unwrap();
        edit(&mut forest);
        let mut tampered = artifact.clone();
        tampered.forest = serde_json::from_value(forest).unwrap();
        rmp_serde::to_vec_named(&tampered).unwrap()
    }

    #[test]
    fn forest_without_trees_is_corrupt() {
        let bytes = with_forest_edit(&small_artifact(), |f| f["trees"] = serde_json::json!([]));
        let err = ModelArtifact::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, ModelError::Corrupt(ForestError::Malformed(_))), "{err}");
        assert!(err.to_string().contains("no trees"));
    }

    #[test]
    fn dangling_split_is_corrupt() {
        let bytes = with_forest_edit(&small_artifact(), |f| {
            f["trees"][0]["nodes"] = serde_json::json!([
                {"Split": {"feature": 7, "value": 0.0, "left": 99, "right": 99}}
            ]);
        });
        assert!(matches!(
            ModelArtifact::from_bytes(&bytes),
            Err(ModelError::Corrupt(_))
        ));
    }

    #[test]
    fn corrupt_file_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ev_model.msgpack");
        let bytes = with_forest_edit(&small_artifact(), |f| f["max_samples"] = serde_json::json!(1));
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(ModelArtifact::load(&path), Err(ModelError::Corrupt(_))));
    }

    #[test]
    fn fixed_timestamp_gives_identical_bytes() {
        let at = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let a = small_artifact();
        let b = small_artifact();
        let a = ModelArtifact::with_trained_at(a.forest, a.training_rows, at);
        let b = ModelArtifact::with_trained_at(b.forest, b.training_rows, at);
        assert_eq!(a.to_bytes().unwrap(), b.to_bytes().unwrap());
        assert_eq!(ModelArtifact::from_bytes(&a.to_bytes().unwrap()).unwrap().trained_at, at);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            ModelArtifact::from_bytes(b"not a model"),
            Err(ModelError::Decode(_))
        ));
    }
}
