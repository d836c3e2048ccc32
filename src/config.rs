//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `CLIPFLOW__*` 覆盖（双下划线表示嵌套，如 `CLIPFLOW__ROUTER__LLM_ENABLED=false`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::router::{CachePolicy, RouterConfig};
use crate::visual::{SelectorConfig, VisualCosts};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub router: RouterSection,
    pub visual: VisualSection,
}

/// [app] 段：应用名、产物目录、素材目录
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    /// 剪辑清单输出目录
    pub output_dir: PathBuf,
    /// 下载/生成的素材目录
    pub media_dir: PathBuf,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "clipflow".to_string(),
            output_dir: PathBuf::from("output"),
            media_dir: PathBuf::from("output/media"),
        }
    }
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：deepseek / openai / mock；实际选择还取决于 API Key 是否存在
    pub provider: String,
    /// 脚本生成与 tier 3 升级使用的模型
    pub model: String,
    /// 路由决策使用的快速模型
    pub router_model: String,
    pub base_url: Option<String>,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "deepseek".to_string(),
            model: crate::llm::DEEPSEEK_CHAT.to_string(),
            router_model: crate::llm::DEEPSEEK_CHAT.to_string(),
            base_url: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次请求超时（秒），用于脚本生成
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// [router] 段：决策源与缓存
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouterSection {
    pub llm_enabled: bool,
    pub decision_timeout_ms: u64,
    pub max_tokens: u32,
    /// 缓存上限；未设置为不限
    pub cache_max_entries: Option<usize>,
    /// 缓存条目存活时间；未设置为永久
    pub cache_ttl_secs: Option<u64>,
}

impl Default for RouterSection {
    fn default() -> Self {
        Self {
            llm_enabled: true,
            decision_timeout_ms: 3000,
            max_tokens: 8,
            cache_max_entries: None,
            cache_ttl_secs: None,
        }
    }
}

impl RouterSection {
    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            llm_enabled: self.llm_enabled,
            decision_timeout: Duration::from_millis(self.decision_timeout_ms),
            max_tokens: self.max_tokens,
        }
    }

    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            max_entries: self.cache_max_entries,
            ttl: self.cache_ttl_secs.map(Duration::from_secs),
        }
    }
}

/// [visual] 段：并发、超时、成本与两个素材后端
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VisualSection {
    pub max_concurrent_scenes: usize,
    pub backend_timeout_secs: u64,
    pub escalation_timeout_secs: u64,
    pub escalation_max_tokens: u32,
    pub costs: VisualCosts,
    pub search: SearchBackendSection,
    pub generate: GenerateBackendSection,
}

impl Default for VisualSection {
    fn default() -> Self {
        Self {
            max_concurrent_scenes: 4,
            backend_timeout_secs: 30,
            escalation_timeout_secs: 20,
            escalation_max_tokens: 256,
            costs: VisualCosts::default(),
            search: SearchBackendSection::default(),
            generate: GenerateBackendSection::default(),
        }
    }
}

impl VisualSection {
    pub fn selector_config(&self) -> SelectorConfig {
        SelectorConfig {
            costs: self.costs,
            escalation_timeout: Duration::from_secs(self.escalation_timeout_secs),
            escalation_max_tokens: self.escalation_max_tokens,
        }
    }
}

/// [visual.search] 段：Pexels 兼容检索；API Key 从 api_key_env 指定的环境变量读取，缺失时使用 mock
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchBackendSection {
    pub api_base: String,
    pub api_key_env: String,
    pub per_page: u32,
}

impl Default for SearchBackendSection {
    fn default() -> Self {
        Self {
            api_base: "https://api.pexels.com".to_string(),
            api_key_env: "PEXELS_API_KEY".to_string(),
            per_page: 5,
        }
    }
}

/// [visual.generate] 段：图像生成端点；未配置 endpoint 时使用 mock
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerateBackendSection {
    pub endpoint: Option<String>,
    pub api_key_env: String,
    pub width: u32,
    pub height: u32,
}

impl Default for GenerateBackendSection {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key_env: "IMAGE_API_KEY".to_string(),
            width: 1920,
            height: 1080,
        }
    }
}

/// 从 config 目录加载配置，环境变量 CLIPFLOW__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 CLIPFLOW__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("CLIPFLOW")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_usable() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.router.decision_timeout_ms, 3000);
        assert!(cfg.router.cache_policy().max_entries.is_none());
        assert!(cfg.router.cache_policy().ttl.is_none());
        assert_eq!(cfg.visual.max_concurrent_scenes, 4);
        assert_eq!(cfg.visual.selector_config().escalation_timeout, Duration::from_secs(20));
    }

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[router]\nllm_enabled = false\ncache_max_entries = 16\ncache_ttl_secs = 60\n\n[visual]\nmax_concurrent_scenes = 2\n\n[visual.costs]\nsearch = 0.5\ngenerate = 1.5"
        )
        .unwrap();
        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert!(!cfg.router.llm_enabled);
        assert_eq!(cfg.router.cache_policy().max_entries, Some(16));
        assert_eq!(cfg.router.cache_policy().ttl, Some(Duration::from_secs(60)));
        assert_eq!(cfg.visual.max_concurrent_scenes, 2);
        assert_eq!(cfg.visual.costs.generate, 1.5);
        // 未出现的键保持默认
        assert_eq!(cfg.router.max_tokens, 8);
    }
}
