//! DeepSeek 端点（OpenAI 兼容格式）
//!
//! 路由决策与场景升级都只要短回复，默认用 deepseek-chat；脚本生成可在配置里换成 deepseek-reasoner。

use crate::llm::OpenAiClient;

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";
pub const DEEPSEEK_REASONER: &str = "deepseek-reasoner";

/// 用 `DEEPSEEK_API_KEY`（缺省时退回 `OPENAI_API_KEY`）创建指定模型的客户端
pub fn create_deepseek_client(model: &str) -> OpenAiClient {
    let api_key = std::env::var("DEEPSEEK_API_KEY")
        .or_else(|_| std::env::var("OPENAI_API_KEY"))
        .ok();
    OpenAiClient::new(Some(DEEPSEEK_BASE_URL), model, api_key.as_deref())
}
