pub mod answer;
pub mod engine;
pub mod fusion;
pub mod intent;
pub mod recipes;

pub use answer::SAMPLE_QUESTIONS;
pub use engine::HybridQaEngine;
pub use fusion::{fuse, FusionWeights, RRF_K};
pub use intent::{analyze, classify, QuestionAnalysis};
