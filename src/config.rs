//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `COACH__*` 覆盖（双下划线表示嵌套，如 `COACH__LLM__MODEL=deepseek-reasoner`）。
//! 密钥类字段未在配置中给出时，回退到服务商约定的环境变量（`VOLCENGINE_API_KEY`、`TAVILY_API_KEY`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub web: WebSection,
    pub llm: LlmSection,
    pub search: SearchSection,
    pub sessions: SessionsSection,
}

/// [app] 段：应用名、系统提示词路径
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 系统提示词文件；未设置时依次尝试 config/prompts/system.md、../config/prompts/system.md
    pub system_prompt_path: Option<PathBuf>,
}

/// [web] 段：监听地址
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebSection {
    pub host: String,
    pub port: u16,
}

impl Default for WebSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// [llm] 段：OpenAI 兼容端点、模型、推理强度与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// 透传给服务商的推理强度提示（low / medium / high），为空则不发送
    pub reasoning_effort: Option<String>,
    pub timeouts: LlmTimeoutsSection,
}

pub const DEFAULT_LLM_BASE_URL: &str = "https://ark.cn-beijing.volces.com/api/v3";
pub const DEFAULT_LLM_MODEL: &str = "doubao-seed-1-6-251015";
pub const LLM_API_KEY_ENV: &str = "VOLCENGINE_API_KEY";
pub const LLM_MODEL_ENV: &str = "VOLCENGINE_MODEL_ID";

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            api_key: None,
            reasoning_effort: Some("medium".to_string()),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

impl LlmSection {
    /// 配置中的 api_key 优先，其次环境变量 VOLCENGINE_API_KEY；空串视为未配置
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(LLM_API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
    }

    /// 环境变量 VOLCENGINE_MODEL_ID 可覆盖配置中的模型
    pub fn resolve_model(&self) -> String {
        std::env::var(LLM_MODEL_ENV)
            .ok()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.model.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 两个流事件之间允许的最长空闲时间（秒），0 表示不限制
    pub stream: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { stream: 120 }
    }
}

/// [search] 段：搜索服务端点、密钥与结果规模
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub max_results: u32,
    /// basic 偏向低延迟，advanced 更全面但更慢
    pub search_depth: String,
    pub timeout_secs: u64,
}

pub const SEARCH_API_KEY_ENV: &str = "TAVILY_API_KEY";

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            endpoint: "https://api.tavily.com/search".to_string(),
            api_key: None,
            max_results: 5,
            search_depth: "basic".to_string(),
            timeout_secs: 15,
        }
    }
}

impl SearchSection {
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(SEARCH_API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
    }
}

/// [sessions] 段：会话列表持久化文件（单个 JSON 数组）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionsSection {
    pub path: PathBuf,
}

impl Default for SessionsSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("workspace/chat_history.json"),
        }
    }
}

/// 从 config 目录加载配置，环境变量 COACH__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 COACH__*（双下划线表示嵌套键）
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
        config::Environment::with_prefix("COACH")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

const BUILTIN_SYSTEM_PROMPT: &str = "You are an enthusiastic, professional interest coach. \
Help the user discover, explore and deepen their hobbies: ask about personality, available time, \
budget and past preferences; give concrete step-by-step guidance with books, tutorials, communities \
and gear lists; encourage them and help set small achievable goals. Answer warmly and patiently, \
using clear Markdown (lists, bold).";

/// 读取系统提示词：显式路径 > config/prompts/system.md > ../config/prompts/system.md > 内置默认
pub fn load_system_prompt(cfg: &AppConfig) -> String {
    let candidates = cfg
        .app
        .system_prompt_path
        .iter()
        .cloned()
        .chain([
            PathBuf::from("config/prompts/system.md"),
            PathBuf::from("../config/prompts/system.md"),
        ]);
    for path in candidates {
        if let Ok(text) = std::fs::read_to_string(&path) {
            if !text.trim().is_empty() {
                tracing::info!(path = %path.display(), "system prompt loaded");
                return text;
            }
        }
    }
    BUILTIN_SYSTEM_PROMPT.to_string()
}
