//! 周期内各阶段的数据类型
//!
//! Plan / PlanOutcome（Reasoning）、ActionResult / ActionBatch（Acting）、
//! LearningRecord（Learning）、ReflectionRecord / PeriodicReflection / ErrorReflection（Reflection）、
//! ConfigAdjustment（自适应调整审计）与 CycleResult（一次 run 的返回值）。

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{AgentPhase, ParseError};

/// 调用方传入的任务上下文（任意 JSON 对象）
pub type TaskContext = serde_json::Map<String, Value>;

/// Reasoning 阶段产出的计划；一个周期一个，产出后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Plan {
    /// 对任务的分析
    pub analysis: String,
    /// 按顺序执行的动作名，至少一个
    pub required_actions: Vec<String>,
    /// 指定使用的工具；为空表示按动作路由
    #[serde(default)]
    pub tool_selection: Option<String>,
    /// 执行计划说明
    #[serde(default)]
    pub plan: String,
    /// 0 到 1 之间的置信度
    pub confidence: f64,
}

impl Plan {
    /// 规整并校验：动作去空白且非空、置信度在 [0,1]、空 tool_selection 视为未指定
    pub fn validated(mut self) -> Result<Self, ParseError> {
        self.analysis = self.analysis.trim().to_string();
        self.plan = self.plan.trim().to_string();
        self.required_actions = self
            .required_actions
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        if self.required_actions.is_empty() {
            return Err(ParseError::Invalid("required_actions is empty".to_string()));
        }
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(ParseError::Invalid(format!(
                "confidence out of range: {}",
                self.confidence
            )));
        }
        self.tool_selection = self
            .tool_selection
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        Ok(self)
    }
}

/// 计划来源：成功解析，或由原始文本合成的兜底计划
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum PlanOutcome {
    Parsed(Plan),
    Fallback { plan: Plan, reason: String },
}

impl PlanOutcome {
    pub fn plan(&self) -> &Plan {
        match self {
            PlanOutcome::Parsed(plan) => plan,
            PlanOutcome::Fallback { plan, .. } => plan,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, PlanOutcome::Fallback { .. })
    }
}

/// 推理链中的一步；index 在单个 Agent 内跨周期严格递增
#[derive(Debug, Clone, Serialize)]
pub struct ReasoningStep {
    pub index: u64,
    pub task: String,
    pub context: TaskContext,
    pub outcome: PlanOutcome,
    pub timestamp: DateTime<Utc>,
}

/// 单个动作的执行结果
#[derive(Debug, Clone, Serialize)]
pub struct ActionResult {
    pub action: String,
    pub tool_used: String,
    pub output: Value,
    pub success: bool,
    pub attempts: u32,
    pub timestamp: DateTime<Utc>,
}

/// 一个计划产出的整批动作结果，引用产生它的 ReasoningStep
#[derive(Debug, Clone, Serialize)]
pub struct ActionBatch {
    pub reasoning_index: u64,
    pub results: Vec<ActionResult>,
    pub timestamp: DateTime<Utc>,
}

/// Learning 阶段的结构化回复
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LearningReport {
    #[serde(default)]
    pub insights: Vec<String>,
    /// 改进指令，例如 "improve parsing"、"raise confidence"
    #[serde(default)]
    pub improvements: Vec<String>,
    /// 0 到 1
    pub success_rate: f64,
    #[serde(default)]
    pub confidence_boost: f64,
}

impl LearningReport {
    pub fn validated(mut self) -> Result<Self, ParseError> {
        if !self.success_rate.is_finite() || !(0.0..=1.0).contains(&self.success_rate) {
            return Err(ParseError::Invalid(format!(
                "success_rate out of range: {}",
                self.success_rate
            )));
        }
        if !self.confidence_boost.is_finite() {
            return Err(ParseError::Invalid("confidence_boost is not finite".to_string()));
        }
        self.insights = trim_all(self.insights);
        self.improvements = trim_all(self.improvements);
        Ok(self)
    }
}

/// Learning 阶段结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LearningRecord {
    Learned(LearningReport),
    Disabled,
    Degraded { reason: String },
}

impl LearningRecord {
    pub fn enabled(&self) -> bool {
        matches!(self, LearningRecord::Learned(_))
    }

    pub fn report(&self) -> Option<&LearningReport> {
        match self {
            LearningRecord::Learned(report) => Some(report),
            _ => None,
        }
    }
}

/// Reflection 阶段的结构化回复
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReflectionReport {
    /// 0 到 1
    pub performance_score: f64,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub overall_assessment: String,
}

impl ReflectionReport {
    pub fn validated(mut self) -> Result<Self, ParseError> {
        if !self.performance_score.is_finite() || !(0.0..=1.0).contains(&self.performance_score) {
            return Err(ParseError::Invalid(format!(
                "performance_score out of range: {}",
                self.performance_score
            )));
        }
        self.strengths = trim_all(self.strengths);
        self.weaknesses = trim_all(self.weaknesses);
        self.recommendations = trim_all(self.recommendations);
        self.overall_assessment = self.overall_assessment.trim().to_string();
        Ok(self)
    }
}

/// Reflection 阶段结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReflectionRecord {
    Assessed(ReflectionReport),
    Disabled,
    Degraded { reason: String },
}

impl ReflectionRecord {
    pub fn enabled(&self) -> bool {
        matches!(self, ReflectionRecord::Assessed(_))
    }

    pub fn report(&self) -> Option<&ReflectionReport> {
        match self {
            ReflectionRecord::Assessed(report) => Some(report),
            _ => None,
        }
    }
}

/// 表现趋势
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReflectionTrend {
    Improving,
    Declining,
    Stable,
}

impl ReflectionTrend {
    /// 比较窗口首尾分数；少于两个分数视为 stable
    pub fn from_scores(scores: &[f64]) -> Self {
        const EPSILON: f64 = 1e-6;
        match (scores.first(), scores.last()) {
            (Some(first), Some(last)) if scores.len() >= 2 => {
                if last - first > EPSILON {
                    ReflectionTrend::Improving
                } else if first - last > EPSILON {
                    ReflectionTrend::Declining
                } else {
                    ReflectionTrend::Stable
                }
            }
            _ => ReflectionTrend::Stable,
        }
    }
}

/// 周期性反思：最近 reflection_interval 条评估的趋势与战略建议
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodicReflection {
    pub cycle: u64,
    pub window_size: usize,
    pub scores: Vec<f64>,
    pub average_score: f64,
    pub trend: ReflectionTrend,
    pub strategic_recommendations: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// 周期性反思的 LLM 回复
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PeriodicReply {
    #[serde(default)]
    pub strategic_recommendations: Vec<String>,
}

/// 致命失败后自动生成的错误反思
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReflection {
    pub error: String,
    pub phase: AgentPhase,
    pub task: String,
    pub context: TaskContext,
    pub suggestions: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// reflection_log 中的一条
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReflectionLogEntry {
    Cycle {
        cycle: u64,
        report: ReflectionReport,
        timestamp: DateTime<Utc>,
    },
    Error(ErrorReflection),
    Periodic(PeriodicReflection),
}

impl ReflectionLogEntry {
    /// 周期评估的分数（错误反思与周期性反思没有分数）
    pub fn score(&self) -> Option<f64> {
        match self {
            ReflectionLogEntry::Cycle { report, .. } => Some(report.performance_score),
            _ => None,
        }
    }
}

/// 近期表现：最近若干次评估的平均分与趋势
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecentPerformance {
    pub average_score: Option<f64>,
    pub trend: Option<ReflectionTrend>,
    pub recent_scores: Vec<f64>,
}

impl RecentPerformance {
    pub fn from_scores(scores: Vec<f64>) -> Self {
        if scores.is_empty() {
            return Self::default();
        }
        Self {
            average_score: Some(average(&scores)),
            trend: Some(ReflectionTrend::from_scores(&scores)),
            recent_scores: scores,
        }
    }
}

/// 可被自适应调整的配置项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigKnob {
    MaxInputLength,
    ConfidenceBoost,
    ReflectionInterval,
    Confidence,
}

/// 一次被应用的配置变更
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigAdjustment {
    pub cycle: u64,
    pub knob: ConfigKnob,
    pub before: f64,
    pub after: f64,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// 一次成功 run 的结果
#[derive(Debug, Clone, Serialize)]
pub struct CycleResult {
    pub agent: String,
    pub cycle: u64,
    pub task: String,
    pub plan: PlanOutcome,
    pub actions: ActionBatch,
    pub learning: LearningRecord,
    pub reflection: ReflectionRecord,
    pub periodic: Option<PeriodicReflection>,
    pub adjustments: Vec<ConfigAdjustment>,
    /// 本周期结束后的累计置信度
    pub confidence: f64,
    pub duration_ms: u64,
}

pub(crate) fn average(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

fn trim_all(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(actions: &[&str], tool: Option<&str>, confidence: f64) -> Plan {
        Plan {
            analysis: " a ".into(),
            required_actions: actions.iter().map(|s| s.to_string()).collect(),
            tool_selection: tool.map(String::from),
            plan: "p".into(),
            confidence,
        }
    }

    #[test]
    fn test_plan_validation() {
        let p = plan(&[" analyze ", ""], Some("  "), 0.9).validated().unwrap();
        assert_eq!(p.required_actions, vec!["analyze"]);
        assert_eq!(p.tool_selection, None);
        assert_eq!(p.analysis, "a");

        assert!(plan(&[], None, 0.5).validated().is_err());
        assert!(plan(&[" "], None, 0.5).validated().is_err());
        assert!(plan(&["analyze"], None, 1.2).validated().is_err());
        assert!(plan(&["analyze"], None, f64::NAN).validated().is_err());
    }

    #[test]
    fn test_learning_report_range() {
        let ok = LearningReport {
            insights: vec![" x ".into()],
            improvements: vec![],
            success_rate: 0.9,
            confidence_boost: 0.0,
        };
        assert_eq!(ok.validated().unwrap().insights, vec!["x"]);

        let bad = LearningReport {
            insights: vec![],
            improvements: vec![],
            success_rate: 1.5,
            confidence_boost: 0.0,
        };
        assert!(bad.validated().is_err());
    }

    #[test]
    fn test_trend_from_scores() {
        assert_eq!(ReflectionTrend::from_scores(&[0.5, 0.6, 0.7]), ReflectionTrend::Improving);
        assert_eq!(ReflectionTrend::from_scores(&[0.7, 0.9, 0.6]), ReflectionTrend::Declining);
        assert_eq!(ReflectionTrend::from_scores(&[0.7, 0.1, 0.7]), ReflectionTrend::Stable);
        assert_eq!(ReflectionTrend::from_scores(&[0.7]), ReflectionTrend::Stable);
        assert_eq!(ReflectionTrend::from_scores(&[]), ReflectionTrend::Stable);
    }

    #[test]
    fn test_recent_performance() {
        let empty = RecentPerformance::from_scores(vec![]);
        assert_eq!(empty.average_score, None);
        assert_eq!(empty.trend, None);

        let p = RecentPerformance::from_scores(vec![0.4, 0.6]);
        assert!((p.average_score.unwrap() - 0.5).abs() < 1e-9);
        assert_eq!(p.trend, Some(ReflectionTrend::Improving));
    }

    #[test]
    fn test_record_serialization_tags() {
        let v = serde_json::to_value(LearningRecord::Disabled).unwrap();
        assert_eq!(v["status"], "disabled");
        let v = serde_json::to_value(ReflectionRecord::Degraded {
            reason: "timeout".into(),
        })
        .unwrap();
        assert_eq!(v["status"], "degraded");
        assert_eq!(v["reason"], "timeout");
    }
}
