//! 认知层：决策步骤（Planner）与轮次过程事件

pub mod events;
pub mod planner;

pub use events::TurnEvent;
pub use planner::{strip_think_tags, Decision, Planner};
