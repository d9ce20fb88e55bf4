//! 认知层：Reason → Act → Learn → Reflect 各阶段与自适应控制

pub mod actor;
pub mod adaptive;
pub mod critic;
pub mod events;
pub mod learner;
pub mod parse;
pub mod planner;
pub mod prompts;
pub mod types;

pub use actor::{ActionRouter, Actor};
pub use adaptive::AdaptiveController;
pub use critic::{recent_performance, Critic};
pub use events::{AgentEvent, EventSink};
pub use learner::Learner;
pub use planner::{interpret_plan, Planner};
pub use prompts::PromptKind;
pub use types::{
    ActionBatch, ActionResult, ConfigAdjustment, ConfigKnob, CycleResult, ErrorReflection,
    LearningRecord, LearningReport, PeriodicReflection, PeriodicReply, Plan, PlanOutcome,
    ReasoningStep, RecentPerformance, ReflectionLogEntry, ReflectionRecord, ReflectionReport,
    ReflectionTrend, TaskContext,
};
