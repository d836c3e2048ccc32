//! 场景分类用的固定词表（葡萄牙语 + 英语）
//!
//! 匹配方式：小写 + 去重音后做子串匹配。
//! - 普通词项按词干匹配，必须从词首开始：`executiv` 命中 executivo / executivas，"team" 不会命中 "steam"
//! - 以空格结尾的词项要求词尾对齐：`person ` 不会命中 personalizado
//! - 以 `*` 开头的词项可以出现在词中间，用于复合词：`*people` 命中 businesspeople，
//!   `*man ` 命中 businessman / fireman
//! - 含空格的短语在整句中从词首开始匹配
//!
//! 词表全部写成无重音小写形式，并刻意避开会误命中的词干（例如 "corpo" 会命中 "corporativo"）。

/// 人物信号：人、身体部位、职业、人的动作、教学场景
pub const PEOPLE_SIGNALS: &[&str] = &[
    // pt
    "pessoa",
    "homem",
    "homens",
    "mulher",
    "menina",
    "menino",
    "garota",
    "garoto",
    "rapaz",
    "moca",
    "moco",
    "senhor",
    "bebe",
    "crianca",
    "jovem",
    "jovens",
    "idoso",
    "idosa",
    "familia",
    "equipe",
    "colega",
    "cliente",
    "usuari",
    "executiv",
    "empresari",
    "profissional",
    "funcionari",
    "trabalhador",
    "medic",
    "enfermeir",
    "professor",
    "engenheir",
    "desenvolvedor",
    "programador",
    "cientista",
    "gerente",
    "atleta",
    "aluno",
    "alunos",
    "estudante",
    "palestrante",
    "apresentador",
    "maos",
    "mao ",
    "rosto",
    "olhos",
    "dedo",
    "sorri",
    "trabalhando",
    "conversando",
    "reuniao",
    "sala de aula",
    // en；类别名词允许出现在复合词中
    "*person ",
    "*persons ",
    "*people",
    "personnel",
    "*man ",
    "*men ",
    "*woman",
    "*women",
    "girl",
    "boy",
    "guy",
    "lady",
    "ladies",
    "baby",
    "child",
    "kid",
    "family",
    "team",
    "colleague",
    "customer",
    "employee",
    "worker",
    "doctor",
    "nurse",
    "teacher",
    "student",
    "presenter",
    "engineer",
    "developer",
    "programmer",
    "scientist",
    "manager",
    "entrepreneur",
    "athlete",
    "face ",
    "faces ",
    "hand ",
    "hands",
    "handshake",
    "finger",
    "eyes",
    "smiling",
    "crowd",
    "meeting",
    "classroom",
];

/// 数字叠加信号：全息、数据图表、界面、logo；与人物同时出现时判为 Hybrid
pub const OVERLAY_SIGNALS: &[&str] = &[
    "holograma",
    "holografic",
    "holograph",
    "hologram",
    "digital",
    "grafico",
    "infografico",
    "infographic",
    "chart",
    "dashboard",
    "interface",
    "overlay",
    "visualizacao de dados",
    "data visualization",
    "logo",
    "icone",
    "icon",
];

/// 抽象/概念信号：只有在完全没有人物信号时才会选择生成
pub const ABSTRACT_SIGNALS: &[&str] = &[
    "holograma",
    "holografic",
    "holograph",
    "hologram",
    "logo",
    "infografico",
    "infographic",
    "grafico",
    "chart",
    "dashboard",
    "visualizacao de dados",
    "data visualization",
    "abstrat",
    "abstract",
    "particula",
    "particle",
    "neon",
    "circuito",
    "circuit",
    "futurist",
    "geometric",
    "fractal",
    "galaxia",
    "galaxy",
    "nebulosa",
    "nebula",
    "conceito",
    "concept",
    "simbolo",
    "symbol",
    "icone",
    "icon",
    "3d",
    "espaco vazio",
    "empty space",
    "cenario vazio",
];

/// 实景信号：用于「实景 with/com 抽象元素」句式
pub const REAL_CONTEXT_SIGNALS: &[&str] = &[
    "escritorio",
    "office",
    "cidade",
    "city",
    "rua",
    "street",
    "sala",
    "room",
    "loja",
    "store",
    "fabrica",
    "factory",
    "laboratorio",
    "laboratory",
    "predio",
    "building",
    "paisagem",
    "landscape",
    "mesa",
    "desk",
];

/// 「实景 with 抽象」句式右侧可接受的元素：叠加信号 + 适合合成为叠加层的抽象元素
pub const PATTERN_ELEMENT_SIGNALS: &[&str] = &[
    "particula",
    "particle",
    "neon",
    "abstrat",
    "abstract",
    "circuito",
    "circuit",
    "geometric",
    "fractal",
];

/// 「实景 with 抽象」句式中的连接词
pub const PATTERN_CONNECTORS: &[&str] = &["with", "com", "featuring", "mostrando", "showing", "exibindo"];

/// 小写并去掉常见重音
pub fn normalize(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

/// 去掉匹配标记后的词项（写入 reason / matched_signals）
pub fn display_token(token: &str) -> &str {
    token.trim().trim_start_matches('*')
}

/// 返回 text（已 normalize）中命中的词表项，保持词表顺序
pub fn matches(text: &str, vocabulary: &[&'static str]) -> Vec<&'static str> {
    let words: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let joined = format!(" {} ", words.join(" "));
    vocabulary
        .iter()
        .copied()
        .filter(|token| token_matches(token, &words, &joined))
        .collect()
}

fn token_matches(token: &str, words: &[&str], joined: &str) -> bool {
    let infix = token.starts_with('*');
    let word_end = token.ends_with(' ');
    let core = display_token(token);
    if core.is_empty() {
        return false;
    }
    if core.contains(' ') {
        return joined.contains(&format!(" {core}"));
    }
    words.iter().any(|w| match (infix, word_end) {
        (false, false) => w.starts_with(core),
        (false, true) => *w == core,
        (true, false) => w.contains(core),
        (true, true) => w.ends_with(core),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_folds_accents() {
        assert_eq!(normalize("Logo Holográfico no Espaço"), "logo holografico no espaco");
        assert_eq!(normalize("Criança SORRINDO"), "crianca sorrindo");
    }

    #[test]
    fn test_matches_substrings() {
        let text = normalize("Executivas em reunião");
        let hits = matches(&text, PEOPLE_SIGNALS);
        assert!(hits.contains(&"executiv"));
        assert!(hits.contains(&"reuniao"));
    }

    #[test]
    fn test_vocabulary_avoids_known_false_positives() {
        let text = normalize("Ambiente corporativo moderno");
        assert!(matches(&text, PEOPLE_SIGNALS).is_empty());
        assert!(matches(&text, ABSTRACT_SIGNALS).is_empty());
        assert!(matches(&text, OVERLAY_SIGNALS).is_empty());
    }

    #[test]
    fn test_tokens_anchor_at_word_start() {
        assert_eq!(matches("a small team", PEOPLE_SIGNALS), vec!["team"]);
        assert!(matches("steam engine", PEOPLE_SIGNALS).is_empty());
        assert!(matches("inteligencia artificial", PEOPLE_SIGNALS).is_empty());
    }

    #[test]
    fn test_whole_word_and_phrase_tokens() {
        assert_eq!(matches("a person at work", PEOPLE_SIGNALS), vec!["*person "]);
        assert!(matches("personalized banner", PEOPLE_SIGNALS).is_empty());
        assert_eq!(matches("alunos na sala de aula", PEOPLE_SIGNALS), vec!["aluno", "alunos", "sala de aula"]);
    }

    #[test]
    fn test_class_nouns_match_inside_compounds() {
        assert_eq!(matches("businesspeople around a table", PEOPLE_SIGNALS), vec!["*people"]);
        assert_eq!(matches("a salesperson", PEOPLE_SIGNALS), vec!["*person "]);
        assert_eq!(matches("firemen at the station", PEOPLE_SIGNALS), vec!["*men "]);
        assert!(matches("a businesswoman", PEOPLE_SIGNALS).contains(&"*woman"));
        assert!(matches("a man and a robot", PEOPLE_SIGNALS).contains(&"*man "));
        // 类别名词只在词尾对齐时命中
        assert!(matches("user manual on a monitor", PEOPLE_SIGNALS).is_empty());
        assert!(matches("a moment of calm", PEOPLE_SIGNALS).is_empty());
        assert!(matches("digital interface", PEOPLE_SIGNALS).is_empty());
    }

    #[test]
    fn test_display_token_strips_markers() {
        assert_eq!(display_token("*man "), "man");
        assert_eq!(display_token("mao "), "mao");
        assert_eq!(display_token("executiv"), "executiv");
    }

    #[test]
    fn test_vocabulary_is_normalized() {
        for list in [
            PEOPLE_SIGNALS,
            OVERLAY_SIGNALS,
            ABSTRACT_SIGNALS,
            REAL_CONTEXT_SIGNALS,
            PATTERN_ELEMENT_SIGNALS,
        ] {
            for token in list {
                assert_eq!(normalize(token), *token);
            }
        }
    }
}
