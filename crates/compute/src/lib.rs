pub mod algorithms;
pub mod artifact;
pub mod corpus;
pub mod error;
pub mod scorer;
pub mod synth;
pub mod trainer;

pub use algorithms::isolation_forest::{Contamination, ForestParams, IsolationForest, MaxSamples};
pub use artifact::ModelArtifact;
pub use corpus::{read_corpus, write_corpus, TrainingCorpus};
pub use error::{ForestError, ModelError, TrainError, TrainingDataError};
pub use scorer::{AnomalyDetector, AnomalyScorer, Assessment, Decision};
pub use synth::{FeatureDistribution, HealthyProfile};
pub use trainer::{Trainer, TrainerConfig, TrainingReport};
