//! 编排器：决策 / 工具分发状态机
//!
//! AWAITING_DECISION -> (最终回复) -> TURN_COMPLETE
//! AWAITING_DECISION -> (工具调用) -> DISPATCHING_TOOLS -> AWAITING_DECISION
//!
//! 每次决策都把完整历史交给 Planner；工具结果按调用顺序写回历史（并行执行时亦然）。
//! 决策次数有上限，超出时写入兜底回复。取消只在决策之前检查，已开始的工具批次总会写完结果，
//! 因此历史中不会出现没有结果的工具调用。

use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::state::TurnState;
use crate::core::{AgentError, TaskScheduler, TurnOutcome, TurnReport};
use crate::llm::ToolSpec;
use crate::memory::{ConversationStore, Message, ToolCall};
use crate::react::events::preview;
use crate::react::{Decision, Planner, TurnEvent};
use crate::tools::{ToolExecutor, ToolRegistry};

/// 默认每轮最多决策次数
pub const DEFAULT_MAX_ROUNDS: usize = 6;

/// 编排参数
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_rounds: usize,
    /// 同一批次的多个工具调用是否并行执行
    pub parallel_tool_calls: bool,
    pub max_concurrent_tools: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            parallel_tool_calls: true,
            max_concurrent_tools: 3,
        }
    }
}

/// 单次 run_turn 的可选项
#[derive(Debug, Clone, Default)]
pub struct TurnOptions {
    /// 调用方在两个步骤之间放弃本轮
    pub cancel: Option<CancellationToken>,
    /// 过程事件接收端
    pub events: Option<mpsc::UnboundedSender<TurnEvent>>,
}

/// 模型与工具概况
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub model: String,
    pub temperature: Option<f32>,
    pub tool_count: usize,
    pub tools: Vec<String>,
}

pub fn round_limit_message(max_rounds: usize) -> String {
    format!(
        "I'm sorry, I couldn't complete this request within {} reasoning steps. \
         Please try rephrasing or asking a narrower question.",
        max_rounds
    )
}

pub const MODEL_UNAVAILABLE_MESSAGE: &str =
    "I'm sorry, I couldn't reach the language model right now. Please try again in a moment.";

/// 编排器：持有决策步骤、工具执行器与对话记忆，可在多个线程的并发轮次间共享
pub struct Orchestrator {
    planner: Planner,
    executor: ToolExecutor,
    memory: Arc<ConversationStore>,
    scheduler: TaskScheduler,
    tool_specs: Vec<ToolSpec>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        planner: Planner,
        executor: ToolExecutor,
        memory: Arc<ConversationStore>,
        config: OrchestratorConfig,
    ) -> Self {
        let tool_specs = executor.registry().specs();
        Self {
            planner,
            executor,
            memory,
            scheduler: TaskScheduler::new(config.max_concurrent_tools),
            tool_specs,
            config,
        }
    }

    pub fn memory(&self) -> &Arc<ConversationStore> {
        &self.memory
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        self.executor.registry()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub async fn history(&self, thread_id: &str) -> Vec<Message> {
        self.memory.history(thread_id).await
    }

    pub async fn reset(&self, thread_id: &str) {
        self.memory.reset(thread_id).await;
    }

    pub fn model_info(&self) -> ModelInfo {
        let tools = self.registry().tool_names();
        ModelInfo {
            model: self.planner.model_name().to_string(),
            temperature: self.planner.temperature(),
            tool_count: tools.len(),
            tools,
        }
    }

    /// 决策步骤累计 token：(prompt, completion, total)
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.planner.token_usage()
    }

    /// 提交一个用户轮次，返回最终回复文本
    pub async fn submit_turn(&self, thread_id: &str, user_text: &str) -> Result<String, AgentError> {
        self.run_turn(thread_id, user_text, TurnOptions::default())
            .await
            .map(|report| report.answer)
    }

    /// 执行一个完整轮次，返回结果与统计
    pub async fn run_turn(
        &self,
        thread_id: &str,
        user_text: &str,
        options: TurnOptions,
    ) -> Result<TurnReport, AgentError> {
        let cancel = options.cancel.clone().unwrap_or_else(CancellationToken::new);
        let emit = |event: TurnEvent| {
            if let Some(tx) = &options.events {
                let _ = tx.send(event);
            }
        };

        tracing::info!(thread_id = %thread_id, input_len = user_text.len(), "turn started");
        self.memory.append(thread_id, Message::user(user_text)).await?;
        let mut state = TurnState::new(self.config.max_rounds);

        loop {
            state.await_decision();
            if state.rounds_exhausted() {
                tracing::warn!(thread_id = %thread_id, rounds = state.rounds, "round limit reached");
                emit(TurnEvent::RoundLimit {
                    max_rounds: state.max_rounds(),
                });
                let answer = round_limit_message(state.max_rounds());
                self.memory.append(thread_id, Message::assistant(&answer)).await?;
                return Ok(state.complete(answer, TurnOutcome::RoundLimit));
            }
            if cancel.is_cancelled() {
                tracing::info!(thread_id = %thread_id, "turn cancelled");
                emit(TurnEvent::Cancelled);
                return Err(AgentError::Cancelled);
            }

            let round = state.begin_round();
            emit(TurnEvent::RoundStarted {
                round,
                max_rounds: state.max_rounds(),
            });
            let history = self.memory.history(thread_id).await;
            tracing::debug!(thread_id = %thread_id, round, phase = ?state.phase(), messages = history.len(), "requesting decision");

            let decision = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(thread_id = %thread_id, "turn cancelled during decision");
                    emit(TurnEvent::Cancelled);
                    return Err(AgentError::Cancelled);
                }
                decision = self.planner.decide(&history, &self.tool_specs) => decision,
            };

            match decision {
                Ok(Decision::Answer(message)) => {
                    let answer = message.content.clone();
                    self.memory.append(thread_id, message).await?;
                    emit(TurnEvent::Answer { text: answer.clone() });
                    tracing::info!(thread_id = %thread_id, rounds = state.rounds, tool_calls = state.tool_calls, "turn complete");
                    return Ok(state.complete(answer, TurnOutcome::Answered));
                }
                Ok(Decision::ToolCalls(message)) => {
                    let calls = message.tool_calls.clone();
                    self.memory.append(thread_id, message).await?;
                    state.dispatching(calls.len());
                    tracing::debug!(thread_id = %thread_id, round, phase = ?state.phase(), calls = calls.len(), "dispatching tools");
                    let results = self.dispatch(&calls, &emit).await;
                    self.memory.append_all(thread_id, results).await?;
                }
                Ok(Decision::Empty) => {
                    tracing::warn!(thread_id = %thread_id, round, "decision step returned neither content nor tool calls");
                }
                Err(e) => {
                    tracing::warn!(thread_id = %thread_id, error = %e, "decision step failed");
                    let answer = MODEL_UNAVAILABLE_MESSAGE.to_string();
                    self.memory.append(thread_id, Message::assistant(&answer)).await?;
                    emit(TurnEvent::Answer { text: answer.clone() });
                    return Ok(state.complete(answer, TurnOutcome::ModelUnavailable));
                }
            }
        }
    }

    /// 执行一个批次；返回的工具结果消息与 calls 顺序一致
    async fn dispatch(&self, calls: &[ToolCall], emit: &(impl Fn(TurnEvent) + Sync)) -> Vec<Message> {
        for call in calls {
            if self.registry().contains(&call.tool_name) {
                emit(TurnEvent::ToolCall {
                    call_id: call.call_id.clone(),
                    tool: call.tool_name.clone(),
                    args: call.arguments.clone(),
                });
            } else {
                tracing::warn!(tool = %call.tool_name, "decision step requested unknown tool");
                emit(TurnEvent::UnknownTool {
                    call_id: call.call_id.clone(),
                    tool: call.tool_name.clone(),
                });
            }
        }

        let outputs: Vec<String> = if self.config.parallel_tool_calls && calls.len() > 1 {
            join_all(
                calls
                    .iter()
                    .map(|call| self.scheduler.run_tool(self.executor.execute(call))),
            )
            .await
        } else {
            let mut outputs = Vec::with_capacity(calls.len());
            for call in calls {
                outputs.push(self.executor.execute(call).await);
            }
            outputs
        };

        calls
            .iter()
            .zip(outputs)
            .map(|(call, output)| {
                emit(TurnEvent::ToolResult {
                    call_id: call.call_id.clone(),
                    tool: call.tool_name.clone(),
                    preview: preview(&output),
                });
                Message::tool_result(call.call_id.clone(), output)
            })
            .collect()
    }
}
