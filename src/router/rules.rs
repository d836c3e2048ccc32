//! 规则表：路由正确性的唯一来源
//!
//! LLM 路径只是缓存未命中时的延迟/成本优化，它的答案必须与这里一致才会被采用。

use crate::router::{PresencePattern, RoutingDecision};

/// 按缺失的第一个产物决定下一阶段
pub fn rule_decision(p: &PresencePattern) -> RoutingDecision {
    if !p.script {
        RoutingDecision::ScriptStage
    } else if !p.visual_plan {
        RoutingDecision::VisualStage
    } else if !p.audio {
        RoutingDecision::AudioStage
    } else if !p.final_media {
        RoutingDecision::EditStage
    } else {
        RoutingDecision::Finish
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Phase;

    fn p(script: bool, visual_plan: bool, audio: bool, final_media: bool, phase: Phase) -> PresencePattern {
        PresencePattern {
            script,
            visual_plan,
            audio,
            final_media,
            phase,
        }
    }

    #[test]
    fn test_rule_table() {
        assert_eq!(rule_decision(&p(false, false, false, false, Phase::Init)), RoutingDecision::ScriptStage);
        assert_eq!(rule_decision(&p(true, false, false, false, Phase::ScriptReady)), RoutingDecision::VisualStage);
        assert_eq!(rule_decision(&p(true, true, false, false, Phase::VisualReady)), RoutingDecision::AudioStage);
        assert_eq!(rule_decision(&p(true, true, true, false, Phase::AudioReady)), RoutingDecision::EditStage);
        assert_eq!(rule_decision(&p(true, true, true, true, Phase::EditReady)), RoutingDecision::Finish);
    }
}
