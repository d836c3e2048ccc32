//! 三层场景分类引擎
//!
//! 纯函数，无 I/O。判定顺序是契约的一部分，而不是代码顺序的副作用：
//!
//! 1. **Hybrid（tier 2）先于 tier 1 检查**。人物 + 数字叠加（全息、图表、界面、logo）是 tier 1
//!    人物信号的细化，若先做人物匹配就会被吞掉。两种形式：
//!    - 人物词与叠加词同时出现 → 置信度 0.85
//!    - 句式 `<实景> with|com <叠加或抽象元素>` → 置信度 0.75
//! 2. **Tier 1 人物** → MediaSearch，0.95。图像生成模型画人脸和手会变形，这是硬性安全规则：
//!    只要出现任何人物信号，就不会因为抽象关键词而改选生成。
//! 3. **Tier 1 抽象**（且全文没有人物信号）→ MediaGenerate，0.90。
//! 4. **Tier 3** → Undecided，0.0，交给工具选择层升级到 LLM。
//!
//! mood / style 不参与确定性判定，只写入 reason，并由工具选择层带入升级 prompt。

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::classify::vocabulary::{
    display_token, matches, normalize, ABSTRACT_SIGNALS, OVERLAY_SIGNALS, PATTERN_CONNECTORS,
    PATTERN_ELEMENT_SIGNALS, PEOPLE_SIGNALS, REAL_CONTEXT_SIGNALS,
};

pub const CONFIDENCE_PEOPLE: f32 = 0.95;
pub const CONFIDENCE_ABSTRACT: f32 = 0.90;
pub const CONFIDENCE_HYBRID_PAIR: f32 = 0.85;
pub const CONFIDENCE_HYBRID_PATTERN: f32 = 0.75;
pub const CONFIDENCE_UNDECIDED: f32 = 0.0;

/// 素材后端
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    MediaSearch,
    MediaGenerate,
    Hybrid,
    Undecided,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::MediaSearch => "media_search",
            Backend::MediaGenerate => "media_generate",
            Backend::Hybrid => "hybrid",
            Backend::Undecided => "undecided",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 做出决定的层级
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// 1：关键词确定性判定
    Deterministic,
    /// 2：人物 + 叠加的混合句式
    HybridPattern,
    /// 3：升级到 LLM 工具调用
    LlmEscalated,
}

impl Tier {
    pub fn as_u8(self) -> u8 {
        match self {
            Tier::Deterministic => 1,
            Tier::HybridPattern => 2,
            Tier::LlmEscalated => 3,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier{}", self.as_u8())
    }
}

/// 单个场景的分类结果；构造后不可变，置信度在构造时钳制到 [0, 1]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClassificationResult {
    backend: Backend,
    confidence: f32,
    tier: Tier,
    reason: String,
    matched_signals: Vec<String>,
}

impl ClassificationResult {
    pub fn new(
        backend: Backend,
        confidence: f32,
        tier: Tier,
        reason: impl Into<String>,
        matched_signals: Vec<String>,
    ) -> Self {
        Self {
            backend,
            confidence: clamp_confidence(confidence),
            tier,
            reason: reason.into(),
            matched_signals,
        }
    }

    pub fn undecided(reason: impl Into<String>) -> Self {
        Self::new(
            Backend::Undecided,
            CONFIDENCE_UNDECIDED,
            Tier::LlmEscalated,
            reason,
            Vec::new(),
        )
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn matched_signals(&self) -> &[String] {
        &self.matched_signals
    }

    /// tier 1/2 可直接调用后端，tier 3 需要升级
    pub fn needs_escalation(&self) -> bool {
        self.backend == Backend::Undecided
    }
}

fn clamp_confidence(c: f32) -> f32 {
    if c.is_nan() {
        0.0
    } else {
        c.clamp(0.0, 1.0)
    }
}

fn hybrid_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            let alt = |list: &[&str]| {
                list.iter()
                    .map(|t| regex::escape(display_token(t)))
                    .collect::<Vec<_>>()
                    .join("|")
            };
            let elements: Vec<&str> = OVERLAY_SIGNALS
                .iter()
                .chain(PATTERN_ELEMENT_SIGNALS)
                .copied()
                .collect();
            let pattern = format!(
                r"\b(?:{})\w*\b.*?\b(?:{})\b.*?\b(?:{})",
                alt(REAL_CONTEXT_SIGNALS),
                alt(PATTERN_CONNECTORS),
                alt(&elements)
            );
            match Regex::new(&pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::error!(error = %e, "hybrid pattern failed to compile");
                    None
                }
            }
        })
        .as_ref()
}

fn to_owned(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|t| display_token(t).to_string()).collect()
}

fn context_suffix(mood: &str, style: &str) -> String {
    match (mood.trim(), style.trim()) {
        ("", "") => String::new(),
        (m, "") => format!(" [mood: {m}]"),
        ("", s) => format!(" [style: {s}]"),
        (m, s) => format!(" [mood: {m}, style: {s}]"),
    }
}

/// 对场景描述分类
pub fn classify(description: &str, mood: &str, style: &str) -> ClassificationResult {
    let text = normalize(description);
    let suffix = context_suffix(mood, style);

    let people = matches(&text, PEOPLE_SIGNALS);
    let overlay = matches(&text, OVERLAY_SIGNALS);

    // Tier 2：必须先于 tier 1
    if !people.is_empty() && !overlay.is_empty() {
        let mut signals = to_owned(&people);
        signals.extend(to_owned(&overlay));
        return ClassificationResult::new(
            Backend::Hybrid,
            CONFIDENCE_HYBRID_PAIR,
            Tier::HybridPattern,
            format!(
                "people ({}) with digital overlay ({}): stock footage plus generated overlay{}",
                to_owned(&people).join(", "),
                to_owned(&overlay).join(", "),
                suffix
            ),
            signals,
        );
    }
    if let Some(m) = hybrid_pattern().and_then(|re| re.find(&text)) {
        return ClassificationResult::new(
            Backend::Hybrid,
            CONFIDENCE_HYBRID_PATTERN,
            Tier::HybridPattern,
            format!("real context with abstract element: \"{}\"{}", m.as_str(), suffix),
            vec![m.as_str().to_string()],
        );
    }

    // Tier 1：人物优先，且一旦命中就不再看抽象词
    if !people.is_empty() {
        return ClassificationResult::new(
            Backend::MediaSearch,
            CONFIDENCE_PEOPLE,
            Tier::Deterministic,
            format!(
                "human presence ({}): stock footage, never generated faces/hands{}",
                to_owned(&people).join(", "),
                suffix
            ),
            to_owned(&people),
        );
    }

    let abstract_hits = matches(&text, ABSTRACT_SIGNALS);
    if !abstract_hits.is_empty() {
        return ClassificationResult::new(
            Backend::MediaGenerate,
            CONFIDENCE_ABSTRACT,
            Tier::Deterministic,
            format!(
                "abstract/conceptual scene without people ({}){}",
                to_owned(&abstract_hits).join(", "),
                suffix
            ),
            to_owned(&abstract_hits),
        );
    }

    ClassificationResult::undecided(format!("no deterministic signal matched{suffix}"))
}

/// 面向对象形式的分类器（便于注入与替换词表实现）
#[derive(Clone, Copy, Debug, Default)]
pub struct SceneClassifier;

impl SceneClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, description: &str, mood: &str, style: &str) -> ClassificationResult {
        classify(description, mood, style)
    }
}
