//! 从场景描述派生检索关键词与生成提示词（回退链与升级失败时使用）

use crate::classify::vocabulary::normalize;

/// 检索关键词最多保留的词数
const MAX_KEYWORDS: usize = 5;

const STOPWORDS: &[&str] = &[
    // en
    "a", "an", "the", "and", "or", "of", "in", "on", "at", "to", "for", "with", "from", "by",
    "is", "are", "its", "it", "this", "that", "into", "over", "under", "while", "very",
    "scene", "shot", "showing", "shows", "view",
    // pt
    "um", "uma", "uns", "umas", "o", "os", "as", "de", "do", "da", "dos", "das", "em", "no",
    "na", "nos", "nas", "com", "para", "por", "e", "ou", "que", "se", "ao", "aos", "sobre",
    "entre", "muito", "cena", "mostra", "mostrando",
];

/// 描述 → 简短检索关键词：小写去重音，去掉停用词与过短的词，去重后取前几个
pub fn derive_keywords(description: &str) -> String {
    let normalized = normalize(description);
    let mut words: Vec<&str> = Vec::new();
    for word in normalized
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2 && !STOPWORDS.contains(w))
    {
        if !words.contains(&word) {
            words.push(word);
        }
        if words.len() == MAX_KEYWORDS {
            break;
        }
    }
    if words.is_empty() {
        // 描述全是停用词或为空时仍需一个可检索的词
        return normalized.split_whitespace().take(MAX_KEYWORDS).collect::<Vec<_>>().join(" ");
    }
    words.join(" ")
}

/// 描述 + 风格 + 情绪 → 图像生成提示词
pub fn derive_prompt(description: &str, style: &str, mood: &str) -> String {
    let mut parts = vec![description.trim().to_string()];
    if !style.trim().is_empty() {
        parts.push(format!("{} style", style.trim()));
    }
    if !mood.trim().is_empty() {
        parts.push(format!("{} mood", mood.trim()));
    }
    parts.push("cinematic lighting, high detail, no text".to_string());
    parts.join(", ")
}

/// 混合场景叠加层的提示词：只要抽象数字元素，不出现人物
pub fn derive_overlay_prompt(description: &str, style: &str) -> String {
    let base = derive_prompt(description, style, "");
    format!("{base}, isolated digital overlay element, transparent background, no people")
}
