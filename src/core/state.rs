//! 轮次状态：状态机阶段与轮次结果

use serde::Serialize;

/// 编排状态机的阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    AwaitingDecision,
    DispatchingTools,
    TurnComplete,
}

impl TurnPhase {
    /// 合法迁移：决策 -> 分发 / 完成，分发 -> 决策；决策 -> 决策 对应空决策
    pub fn can_advance_to(self, next: TurnPhase) -> bool {
        use TurnPhase::*;
        matches!(
            (self, next),
            (AwaitingDecision, AwaitingDecision)
                | (AwaitingDecision, DispatchingTools)
                | (AwaitingDecision, TurnComplete)
                | (DispatchingTools, AwaitingDecision)
        )
    }
}

/// 本轮如何结束
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    /// 模型给出最终回复
    Answered,
    /// 达到决策轮数上限，返回兜底回复
    RoundLimit,
    /// 决策步骤重试后仍失败，返回兜底回复
    ModelUnavailable,
}

/// 一个轮次的结果
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TurnReport {
    /// 返回给调用方的最终文本（已写入历史）
    pub answer: String,
    pub outcome: TurnOutcome,
    /// 实际发起的决策次数
    pub rounds: usize,
    /// 分发的工具调用数
    pub tool_calls: usize,
}

/// 单轮内的状态追踪
#[derive(Debug)]
pub(crate) struct TurnState {
    phase: TurnPhase,
    pub rounds: usize,
    pub tool_calls: usize,
    max_rounds: usize,
}

impl TurnState {
    pub fn new(max_rounds: usize) -> Self {
        Self {
            phase: TurnPhase::AwaitingDecision,
            rounds: 0,
            tool_calls: 0,
            max_rounds: max_rounds.max(1),
        }
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    fn advance(&mut self, next: TurnPhase) {
        if !self.phase.can_advance_to(next) {
            tracing::warn!(from = ?self.phase, to = ?next, "unexpected turn phase transition");
        }
        tracing::debug!(from = ?self.phase, to = ?next, round = self.rounds, "turn phase");
        self.phase = next;
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    pub fn rounds_exhausted(&self) -> bool {
        self.rounds >= self.max_rounds
    }

    /// 回到等待决策阶段（轮次上限也在此阶段判定）
    pub fn await_decision(&mut self) {
        self.advance(TurnPhase::AwaitingDecision);
    }

    /// 发起下一次决策，返回从 1 开始的轮次序号
    pub fn begin_round(&mut self) -> usize {
        self.rounds += 1;
        self.rounds
    }

    pub fn dispatching(&mut self, calls: usize) {
        self.advance(TurnPhase::DispatchingTools);
        self.tool_calls += calls;
    }

    pub fn complete(&mut self, answer: String, outcome: TurnOutcome) -> TurnReport {
        self.advance(TurnPhase::TurnComplete);
        TurnReport {
            answer,
            outcome,
            rounds: self.rounds,
            tool_calls: self.tool_calls,
        }
    }
}
