//! 轮次过程事件：供 CLI 展示工具轨迹，也可序列化为 JSON 推给其他前端

use serde::Serialize;

/// 单个轮次内的过程事件
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// 进入第几次决策
    RoundStarted { round: usize, max_rounds: usize },
    /// 调用工具
    ToolCall {
        call_id: String,
        tool: String,
        args: serde_json::Value,
    },
    /// 工具返回（预览，避免过长）
    ToolResult {
        call_id: String,
        tool: String,
        preview: String,
    },
    /// 模型请求了不存在的工具
    UnknownTool { call_id: String, tool: String },
    /// 最终回复
    Answer { text: String },
    /// 达到决策轮数上限
    RoundLimit { max_rounds: usize },
    /// 调用方取消了本轮
    Cancelled,
}

const PREVIEW_CHARS: usize = 200;

/// 截取工具输出预览
pub fn preview(text: &str) -> String {
    if text.chars().count() > PREVIEW_CHARS {
        format!("{}...", text.chars().take(PREVIEW_CHARS).collect::<String>())
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let ev = TurnEvent::RoundStarted { round: 1, max_rounds: 6 };
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["type"], "round_started");
        assert_eq!(v["max_rounds"], 6);
    }

    #[test]
    fn test_preview_cuts_long_output() {
        let long = "x".repeat(500);
        assert_eq!(preview(&long).chars().count(), PREVIEW_CHARS + 3);
        assert_eq!(preview("short"), "short");
    }
}
