//! AI 决策模块（随机行动顺序的回合规划）。

pub mod planner;

pub use planner::{ActionKind, AiAgent, AiConfig, AiStep, AiTurnReport, ACTION_ORDERS};
