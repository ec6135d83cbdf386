//! continue_chat：闲聊 / 通用建议的占位能力，不访问外部服务

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::ToolFailure;
use crate::tools::{parameters_schema_for, parse_args, Tool, ToolOutput};

/// 返回给模型的固定标记
pub const CONTINUE_CHAT_MARKER: &str = "CONTINUE_CHAT";

#[allow(dead_code)]
#[derive(Debug, Deserialize, JsonSchema)]
struct ContinueArgs {
    /// The user's message being answered without external data
    #[serde(default)]
    user_message: String,
}

pub struct ContinueChatTool;

#[async_trait]
impl Tool for ContinueChatTool {
    fn name(&self) -> &str {
        "continue_chat"
    }

    fn description(&self) -> &str {
        "Handle generic travel advice or chit-chat when no external data is needed \
         (the answer is stable and not about current weather, forecasts or web search)."
    }

    fn parameters_schema(&self) -> Value {
        parameters_schema_for::<ContinueArgs>()
    }

    fn capability(&self) -> &str {
        "Chat"
    }

    async fn invoke(&self, args: Value) -> Result<ToolOutput, ToolFailure> {
        let args: ContinueArgs = parse_args(args)?;
        let preview: String = args.user_message.chars().take(50).collect();
        tracing::debug!(message = %preview, "continue_chat");
        Ok(ToolOutput::plain(CONTINUE_CHAT_MARKER))
    }
}
