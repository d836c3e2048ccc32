//! 路由决策：封闭枚举 + 严格解析
//!
//! LLM 的回答只有在恰好是某个枚举成员时才被接受；任何附加文字都会被拒绝，而不是做子串匹配。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::Phase;

/// 下一步要运行的阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingDecision {
    ScriptStage,
    VisualStage,
    AudioStage,
    EditStage,
    Finish,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("not a routing decision: {0:?}")]
pub struct InvalidDecision(pub String);

impl RoutingDecision {
    pub const ALL: [RoutingDecision; 5] = [
        RoutingDecision::ScriptStage,
        RoutingDecision::VisualStage,
        RoutingDecision::AudioStage,
        RoutingDecision::EditStage,
        RoutingDecision::Finish,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RoutingDecision::ScriptStage => "script_stage",
            RoutingDecision::VisualStage => "visual_stage",
            RoutingDecision::AudioStage => "audio_stage",
            RoutingDecision::EditStage => "edit_stage",
            RoutingDecision::Finish => "finish",
        }
    }

    /// 该阶段完成后 Job 所处的 phase；Finish 不产生新 phase
    pub fn completed_phase(self) -> Option<Phase> {
        match self {
            RoutingDecision::ScriptStage => Some(Phase::ScriptReady),
            RoutingDecision::VisualStage => Some(Phase::VisualReady),
            RoutingDecision::AudioStage => Some(Phase::AudioReady),
            RoutingDecision::EditStage => Some(Phase::EditReady),
            RoutingDecision::Finish => None,
        }
    }
}

impl fmt::Display for RoutingDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoutingDecision {
    type Err = InvalidDecision;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let token = raw
            .trim()
            .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '.'))
            .trim()
            .to_lowercase()
            .replace(['-', ' '], "_");
        match token.as_str() {
            "script_stage" | "scriptstage" | "script" => Ok(RoutingDecision::ScriptStage),
            "visual_stage" | "visualstage" | "visual" => Ok(RoutingDecision::VisualStage),
            "audio_stage" | "audiostage" | "audio" => Ok(RoutingDecision::AudioStage),
            "edit_stage" | "editstage" | "edit" => Ok(RoutingDecision::EditStage),
            "finish" | "end" => Ok(RoutingDecision::Finish),
            _ => Err(InvalidDecision(raw.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_canonical_forms() {
        assert_eq!("script_stage".parse::<RoutingDecision>(), Ok(RoutingDecision::ScriptStage));
        assert_eq!(" VisualStage\n".parse::<RoutingDecision>(), Ok(RoutingDecision::VisualStage));
        assert_eq!("\"audio\"".parse::<RoutingDecision>(), Ok(RoutingDecision::AudioStage));
        assert_eq!("edit-stage.".parse::<RoutingDecision>(), Ok(RoutingDecision::EditStage));
        assert_eq!("FINISH".parse::<RoutingDecision>(), Ok(RoutingDecision::Finish));
    }

    #[test]
    fn test_parse_rejects_free_text() {
        assert!("I think the next step is script_stage".parse::<RoutingDecision>().is_err());
        assert!("visual_stage, then audio".parse::<RoutingDecision>().is_err());
        assert!("".parse::<RoutingDecision>().is_err());
        assert!("render".parse::<RoutingDecision>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for d in RoutingDecision::ALL {
            assert_eq!(d.to_string().parse::<RoutingDecision>(), Ok(d));
        }
    }
}
