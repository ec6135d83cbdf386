//! Agent 构建器：统一的 Agent 初始化逻辑
//!
//! 从 AppConfig 组装 LLM 客户端、工具注册表、执行器、Planner 与对话记忆，得到一个 Orchestrator。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::core::{AgentError, Orchestrator, OrchestratorConfig};
use crate::llm::{
    create_ollama_client, LlmClient, MockLlmClient, OpenAiClient, RetryConfig, RetryingLlmClient,
    OPENAI_DEFAULT_MODEL,
};
use crate::memory::ConversationStore;
use crate::react::Planner;
use crate::tools::{
    ContinueChatTool, ExecutorConfig, ForecastTool, OpenWeatherClient, SearchTool, ToolExecutor, ToolRegistry,
    WeatherTool,
};

/// 找不到 prompt 文件时使用的系统提示词
pub const FALLBACK_SYSTEM_PROMPT: &str = "You are Wayfarer, a friendly travel assistant. \
Use get_weather for current conditions, get_weather_forecast for the coming days, \
web_search_tavily for destinations and attractions, and continue_chat for general advice. \
Answer concisely and base weather or search facts only on tool results.";

/// 根据配置选择 LLM 后端（Ollama / OpenAI 兼容 / Mock），并包上一层超时与单次重试
pub(crate) fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let timeout = Duration::from_secs(cfg.llm.timeout_secs.max(1));

    let inner: Arc<dyn LlmClient> = match provider.as_str() {
        "openai" => {
            let api_key = std::env::var(&cfg.llm.api_key_env).ok();
            if api_key.is_none() {
                tracing::warn!(env = %cfg.llm.api_key_env, "OpenAI provider selected but no API key set");
            }
            let model = cfg.llm.model.as_deref().unwrap_or(OPENAI_DEFAULT_MODEL);
            tracing::info!("Using OpenAI-compatible LLM ({})", model);
            Arc::new(OpenAiClient::new(
                cfg.llm.base_url.as_deref(),
                model,
                api_key.as_deref(),
                cfg.llm.temperature,
                timeout,
            ))
        }
        "ollama" => {
            let client = create_ollama_client(
                cfg.llm.base_url.as_deref(),
                cfg.llm.model.as_deref(),
                cfg.llm.temperature,
                timeout,
            );
            tracing::info!("Using Ollama LLM ({}) at {}", client.model_name(), client.base_url());
            Arc::new(client)
        }
        "mock" => {
            tracing::info!("Using Mock LLM");
            return Arc::new(MockLlmClient);
        }
        other => {
            tracing::warn!("Unknown LLM provider '{}', using Mock LLM", other);
            return Arc::new(MockLlmClient);
        }
    };

    Arc::new(RetryingLlmClient::new(
        inner,
        RetryConfig {
            timeout,
            max_retries: 1,
            backoff: Duration::from_millis(cfg.agent.retry_backoff_ms),
        },
    ))
}

/// Agent 构建器：统一配置和初始化 Agent 的各个组件
pub struct AgentBuilder {
    config: AppConfig,
    system_prompt: Option<String>,
    llm: Option<Arc<dyn LlmClient>>,
    registry: Option<ToolRegistry>,
    memory: Option<Arc<ConversationStore>>,
}

impl AgentBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            system_prompt: None,
            llm: None,
            registry: None,
            memory: None,
        }
    }

    /// 设置系统提示词
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// 指定决策步骤（测试或嵌入场景）；未指定时按配置创建
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// 指定工具注册表；未指定时注册内置旅行工具
    pub fn with_registry(mut self, registry: ToolRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// 与其他 Orchestrator 共享同一份对话记忆
    pub fn with_memory(mut self, memory: Arc<ConversationStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// 从文件加载系统提示词：配置中的路径优先，其次 config/prompts/system.md
    pub fn load_system_prompt(&self) -> String {
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(p) = &self.config.agent.system_prompt_path {
            candidates.push(p.clone());
        }
        candidates.push(PathBuf::from("config/prompts/system.md"));
        candidates.push(PathBuf::from("../config/prompts/system.md"));

        candidates
            .iter()
            .find_map(|p| std::fs::read_to_string(p).ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| FALLBACK_SYSTEM_PROMPT.to_string())
    }

    /// 内置旅行工具：get_weather、get_weather_forecast、web_search_tavily、continue_chat
    pub fn build_tool_registry(&self) -> Result<ToolRegistry, AgentError> {
        let tools_cfg = &self.config.tools;
        let timeout = Duration::from_secs(tools_cfg.tool_timeout_secs.max(1));

        let weather = Arc::new(OpenWeatherClient::from_env(
            tools_cfg.weather.base_url.as_deref(),
            &tools_cfg.weather.api_key_env,
            timeout,
        ));
        if !weather.is_configured() {
            tracing::warn!(env = %tools_cfg.weather.api_key_env, "weather API key not set; weather tools will report unavailable");
        }

        let mut registry = ToolRegistry::new();
        registry.register(WeatherTool::new(weather.clone()))?;
        registry.register(ForecastTool::new(weather))?;
        registry.register(
            SearchTool::from_env(tools_cfg.search.base_url.as_deref(), &tools_cfg.search.api_key_env, timeout)
                .with_limits(tools_cfg.search.default_max_results, tools_cfg.search.summary_chars),
        )?;
        registry.register(ContinueChatTool)?;
        Ok(registry)
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            timeout: Duration::from_secs(self.config.tools.tool_timeout_secs.max(1)),
            max_output_chars: self.config.agent.max_output_chars.max(1),
            retry_backoff: Duration::from_millis(self.config.agent.retry_backoff_ms),
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            max_rounds: self.config.agent.max_rounds.max(1),
            parallel_tool_calls: self.config.agent.parallel_tool_calls,
            max_concurrent_tools: self.config.agent.max_concurrent_tools.max(1),
        }
    }

    pub fn build(mut self) -> Result<Orchestrator, AgentError> {
        let registry = match self.registry.take() {
            Some(registry) => registry,
            None => self.build_tool_registry()?,
        };
        let system_prompt = match self.system_prompt.take() {
            Some(prompt) => prompt,
            None => self.load_system_prompt(),
        };
        let llm = match self.llm.take() {
            Some(llm) => llm,
            None => create_llm_from_config(&self.config),
        };
        tracing::info!(tools = ?registry.tool_names(), model = %llm.model_name(), "agent built");

        Ok(Orchestrator::new(
            Planner::new(llm, system_prompt),
            ToolExecutor::new(Arc::new(registry), self.executor_config()),
            self.memory.take().unwrap_or_default(),
            self.orchestrator_config(),
        ))
    }
}
