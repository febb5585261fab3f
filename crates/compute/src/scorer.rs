//! Live anomaly scoring against a trained model.

use std::fmt;
use std::path::Path;

use chargewatch_core::{FieldMap, SchemaError, SensorReading};
use serde::{Deserialize, Serialize};

use crate::artifact::ModelArtifact;
use crate::error::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Normal,
    Anomalous,
}

impl Decision {
    pub fn is_anomalous(self) -> bool {
        self == Decision::Anomalous
    }

    /// Dashboard status line for this decision.
    pub fn status_label(self) -> &'static str {
        match self {
            Decision::Normal => "NORMAL",
            Decision::Anomalous => "PREDICTIVE FAILURE ALERT",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Normal => write!(f, "NORMAL"),
            Decision::Anomalous => write!(f, "ANOMALOUS"),
        }
    }
}

/// A decision plus the numbers behind it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub decision: Decision,
    pub score: f64,
    pub threshold: f64,
}

/// Anything that can judge a reading.
pub trait AnomalyDetector: Send + Sync {
    fn assess(&self, reading: &SensorReading) -> Assessment;

    fn classify(&self, reading: &SensorReading) -> Decision {
        self.assess(reading).decision
    }
}

/// [`AnomalyDetector`] backed by a trained isolation forest.
#[derive(Debug, Clone)]
pub struct AnomalyScorer {
    artifact: ModelArtifact,
}

impl AnomalyScorer {
    pub fn from_artifact(artifact: ModelArtifact) -> Self {
        Self { artifact }
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        ModelArtifact::load(path).map(Self::from_artifact)
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    /// Validate a field map against the feature schema, then assess it.
    pub fn assess_fields(&self, fields: &FieldMap) -> Result<Assessment, SchemaError> {
        let reading = SensorReading::from_fields(fields)?;
        Ok(self.assess(&reading))
    }

    pub fn classify_fields(&self, fields: &FieldMap) -> Result<Decision, SchemaError> {
        self.assess_fields(fields).map(|a| a.decision)
    }
}

impl AnomalyDetector for AnomalyScorer {
    fn assess(&self, reading: &SensorReading) -> Assessment {
        let forest = &self.artifact.forest;
        let score = forest.score(&reading.to_array());
        let threshold = forest.threshold();
        let decision = if score > threshold {
            Decision::Anomalous
        } else {
            Decision::Normal
        };
        Assessment {
            decision,
            score,
            threshold,
        }
    }
}
