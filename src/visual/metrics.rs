//! 视觉阶段聚合指标

use serde::{Deserialize, Serialize};

use crate::classify::{Backend, Tier};
use crate::visual::{MediaKind, SceneVisual};

/// 视觉计划的统计：各后端/各层级场景数、回退、占位、成本、LLM 调用
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualMetrics {
    pub scenes: usize,
    pub media_search_scenes: usize,
    pub media_generate_scenes: usize,
    pub hybrid_scenes: usize,
    pub tier1_scenes: usize,
    pub tier2_scenes: usize,
    pub tier3_scenes: usize,
    pub fallbacks: usize,
    pub placeholders: usize,
    /// 实际发出的检索调用（含失败与回退）
    pub search_calls: u32,
    /// 实际发出的生成调用（含失败与回退）
    pub generate_calls: u32,
    pub llm_calls: u32,
    pub total_cost: f64,
    /// 未调用 LLM 即完成的场景占比（0 场景时为 0）
    pub resolved_without_llm: f64,
}

impl VisualMetrics {
    pub fn from_scenes(scenes: &[SceneVisual]) -> Self {
        let mut m = VisualMetrics {
            scenes: scenes.len(),
            ..Self::default()
        };
        let mut without_llm = 0usize;

        for s in scenes {
            if s.media_kind == MediaKind::Placeholder {
                m.placeholders += 1;
            } else {
                match s.backend_used {
                    Backend::MediaSearch => m.media_search_scenes += 1,
                    Backend::MediaGenerate => m.media_generate_scenes += 1,
                    Backend::Hybrid => m.hybrid_scenes += 1,
                    Backend::Undecided => {}
                }
            }
            match s.tier {
                Tier::Deterministic => m.tier1_scenes += 1,
                Tier::HybridPattern => m.tier2_scenes += 1,
                Tier::LlmEscalated => m.tier3_scenes += 1,
            }
            if s.is_fallback {
                m.fallbacks += 1;
            }
            if s.llm_calls == 0 {
                without_llm += 1;
            }
            m.search_calls += s.search_calls;
            m.generate_calls += s.generate_calls;
            m.llm_calls += s.llm_calls;
            m.total_cost += s.cost;
        }

        if m.scenes > 0 {
            m.resolved_without_llm = without_llm as f64 / m.scenes as f64;
        }
        m
    }
}
