//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / invoke），由 ToolRegistry
//! 在启动时按名注册；注册顺序即 list() 顺序。构建完成后只读，可在多个轮次间共享。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::{AgentError, ToolFailure};
use crate::llm::ToolSpec;
use crate::tools::ToolOutput;

/// 工具 trait：名称、何时使用的说明（供 LLM 选择）、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（模型 tool_calls 中的 function name）
    fn name(&self) -> &str;

    /// 工具描述：说明何时应选择该工具
    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认无参数
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 失败文案中的能力名，如 "Weather data"
    fn capability(&self) -> &str {
        self.name()
    }

    /// 失败文案中的对象，如地点或查询词
    fn subject(&self, _args: &Value) -> String {
        "request".to_string()
    }

    async fn invoke(&self, args: Value) -> Result<ToolOutput, ToolFailure>;
}

/// 工具注册表：名称唯一，保持注册顺序
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), AgentError> {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<(), AgentError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(AgentError::ConfigError(format!("duplicate tool name: {name}")));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// 精确按名解析
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Tool>, ToolFailure> {
        self.index
            .get(name)
            .map(|&i| self.tools[i].clone())
            .ok_or_else(|| ToolFailure::UnknownTool(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// 按注册顺序列出全部工具
    pub fn list(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 传给决策步骤的工具描述
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .iter()
            .map(|t| ToolSpec {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect()
    }

    /// 工具 schema JSON（调试与文本化 prompt 用）
    pub fn to_schema_json(&self) -> String {
        serde_json::to_string_pretty(&self.specs()).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    #[async_trait]
    impl Tool for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "test tool"
        }

        async fn invoke(&self, _args: Value) -> Result<ToolOutput, ToolFailure> {
            Ok(ToolOutput::plain(self.0))
        }
    }

    #[test]
    fn test_list_keeps_registration_order() {
        let mut reg = ToolRegistry::new();
        reg.register(Named("zeta")).unwrap();
        reg.register(Named("alpha")).unwrap();
        reg.register(Named("mid")).unwrap();
        assert_eq!(reg.tool_names(), vec!["zeta", "alpha", "mid"]);
        assert_eq!(reg.specs()[1].name, "alpha");
    }

    #[test]
    fn test_resolve_unknown_tool() {
        let mut reg = ToolRegistry::new();
        reg.register(Named("get_weather")).unwrap();
        assert!(reg.resolve("get_weather").is_ok());
        match reg.resolve("book_flight") {
            Err(ToolFailure::UnknownTool(name)) => assert_eq!(name, "book_flight"),
            _ => panic!("Expected UnknownTool"),
        }
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut reg = ToolRegistry::new();
        reg.register(Named("x")).unwrap();
        assert!(reg.register(Named("x")).is_err());
        assert_eq!(reg.len(), 1);
    }
}
