//! 状态指纹：只由产物存在与否和 phase 计算，与产物内容无关

use std::fmt;

use blake3::Hasher;
use serde::Serialize;

use crate::core::Phase;

/// Job 的产物存在模式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct PresencePattern {
    pub script: bool,
    pub visual_plan: bool,
    pub audio: bool,
    pub final_media: bool,
    pub phase: Phase,
}

impl PresencePattern {
    /// 规范化文本，如 `script=1;visual=0;audio=0;edit=0;phase=1`
    pub fn canonical(&self) -> String {
        format!(
            "script={};visual={};audio={};edit={};phase={}",
            u8::from(self.script),
            u8::from(self.visual_plan),
            u8::from(self.audio),
            u8::from(self.final_media),
            self.phase.as_u8()
        )
    }

    pub fn fingerprint(&self) -> StateFingerprint {
        let mut h = Hasher::new();
        h.update(self.canonical().as_bytes());
        StateFingerprint(h.finalize().to_hex().to_string())
    }

    /// 给 LLM 看的描述（不含任何产物内容）
    pub fn describe(&self) -> String {
        let mark = |present: bool| if present { "present" } else { "absent" };
        format!(
            "script: {}\nvisual_plan: {}\naudio: {}\nfinal_media: {}\nphase: {}",
            mark(self.script),
            mark(self.visual_plan),
            mark(self.audio),
            mark(self.final_media),
            self.phase.as_u8()
        )
    }
}

/// 缓存键：canonical 文本的 BLAKE3 十六进制摘要
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StateFingerprint(String);

impl StateFingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 日志里截短即可
        f.write_str(self.0.get(..12).unwrap_or(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(script: bool, phase: Phase) -> PresencePattern {
        PresencePattern {
            script,
            visual_plan: false,
            audio: false,
            final_media: false,
            phase,
        }
    }

    #[test]
    fn test_same_pattern_same_fingerprint() {
        let a = pattern(true, Phase::ScriptReady).fingerprint();
        let b = pattern(true, Phase::ScriptReady).fingerprint();
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_different_pattern_different_fingerprint() {
        let a = pattern(true, Phase::ScriptReady).fingerprint();
        let b = pattern(false, Phase::Init).fingerprint();
        assert_ne!(a, b);
    }

    #[test]
    fn test_canonical_and_describe() {
        let p = pattern(true, Phase::ScriptReady);
        assert_eq!(p.canonical(), "script=1;visual=0;audio=0;edit=0;phase=1");
        assert!(p.describe().contains("script: present"));
        assert!(p.describe().contains("visual_plan: absent"));
    }
}
