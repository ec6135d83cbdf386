//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `WAYFARER__*` 覆盖（双下划线表示嵌套，如 `WAYFARER__LLM__PROVIDER=openai`）。
//! 凭据本身不写进配置文件，配置只记录读取凭据的环境变量名。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub agent: AgentSection,
    pub tools: ToolsSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    /// CLI 是否打印工具调用轨迹
    pub show_tool_trace: bool,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "Wayfarer".to_string(),
            show_tool_trace: false,
        }
    }
}

/// [llm] 段：决策步骤后端
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// ollama / openai / mock
    pub provider: String,
    /// 未设置时由后端决定（ollama 读取 OLLAMA_MODEL）
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub temperature: f32,
    /// 单次请求超时（秒）
    pub timeout_secs: u64,
    /// 读取 OpenAI key 的环境变量名
    pub api_key_env: String,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: None,
            base_url: None,
            temperature: 0.2,
            timeout_secs: 60,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

/// [agent] 段：编排参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// 每个轮次的最多决策次数
    pub max_rounds: usize,
    pub parallel_tool_calls: bool,
    pub max_concurrent_tools: usize,
    /// 工具输出字符上限
    pub max_output_chars: usize,
    /// 工具与决策步骤重试前的等待（毫秒）
    pub retry_backoff_ms: u64,
    pub system_prompt_path: Option<PathBuf>,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_rounds: 6,
            parallel_tool_calls: true,
            max_concurrent_tools: 3,
            max_output_chars: 2000,
            retry_backoff_ms: 0,
            system_prompt_path: None,
        }
    }
}

/// [tools] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
    pub weather: WeatherSection,
    pub search: SearchSection,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 15,
            weather: WeatherSection::default(),
            search: SearchSection::default(),
        }
    }
}

/// [tools.weather] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeatherSection {
    pub base_url: Option<String>,
    pub api_key_env: String,
}

impl Default for WeatherSection {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key_env: "WEATHER_API_KEY".to_string(),
        }
    }
}

/// [tools.search] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub base_url: Option<String>,
    pub api_key_env: String,
    pub default_max_results: usize,
    /// 摘要字符预算
    pub summary_chars: usize,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key_env: "TAVILY_API_KEY".to_string(),
            default_max_results: 2,
            summary_chars: 280,
        }
    }
}

/// 从 config 目录加载配置，环境变量 WAYFARER__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 WAYFARER__*（双下划线表示嵌套键）
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
        config::Environment::with_prefix("WAYFARER")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.agent.max_rounds, 6);
        assert_eq!(cfg.agent.max_output_chars, 2000);
        assert_eq!(cfg.agent.retry_backoff_ms, 0);
        assert_eq!(cfg.tools.weather.api_key_env, "WEATHER_API_KEY");
        assert_eq!(cfg.tools.search.summary_chars, 280);
        assert!(cfg.llm.model.is_none());
    }

    #[test]
    fn test_load_from_explicit_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[llm]
provider = "mock"
model = "qwen3"
temperature = 0.7

[agent]
max_rounds = 3
parallel_tool_calls = false

[tools.search]
default_max_results = 4
"#
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.llm.provider, "mock");
        assert_eq!(cfg.llm.model.as_deref(), Some("qwen3"));
        assert_eq!(cfg.agent.max_rounds, 3);
        assert!(!cfg.agent.parallel_tool_calls);
        assert_eq!(cfg.tools.search.default_max_results, 4);
        // 未出现的键保持默认值
        assert_eq!(cfg.tools.search.summary_chars, 280);
        assert_eq!(cfg.agent.max_output_chars, 2000);
    }
}
