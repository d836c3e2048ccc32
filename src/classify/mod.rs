//! 场景分类：固定词表 + 三层判定（混合 / 关键词 / 待升级）

pub mod engine;
pub mod vocabulary;

pub use engine::{classify, Backend, ClassificationResult, SceneClassifier, Tier};
