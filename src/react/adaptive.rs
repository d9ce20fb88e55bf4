//! 自适应控制器
//!
//! 周期成功后根据 Learning / Reflection 结果调整 AgentConfig。每项变更都有上下界，
//! 并以 ConfigAdjustment 返回（before / after / reason），调用方写入 adjustments 日志。

use chrono::Utc;

use crate::config::AdaptiveSection;
use crate::core::AgentConfig;
use crate::react::{ConfigAdjustment, ConfigKnob, LearningRecord, ReflectionRecord};

const INPUT_LENGTH_FACTOR: f64 = 1.1;
const CONFIDENCE_BOOST_FACTOR: f64 = 1.05;

pub struct AdaptiveController {
    bounds: AdaptiveSection,
}

impl AdaptiveController {
    pub fn new(bounds: AdaptiveSection) -> Self {
        Self { bounds }
    }

    /// 应用本周期的调整，返回实际发生的变更（值未变化的不记录）
    pub fn apply(
        &self,
        config: &mut AgentConfig,
        cycle: u64,
        learning: &LearningRecord,
        reflection: &ReflectionRecord,
    ) -> Vec<ConfigAdjustment> {
        let mut adjustments = Vec::new();

        if let Some(report) = learning.report() {
            if report.success_rate >= config.learning_threshold {
                for directive in &report.improvements {
                    if let Some(adj) = self.apply_directive(config, cycle, directive) {
                        adjustments.push(adj);
                    }
                }
            }
        }

        if let Some(report) = reflection.report() {
            if report.performance_score > self.bounds.performance_threshold {
                let before = config.confidence;
                config.confidence = (before + config.confidence_boost).clamp(0.0, 1.0);
                push_if_changed(
                    &mut adjustments,
                    cycle,
                    ConfigKnob::Confidence,
                    before,
                    config.confidence,
                    format!("performance_score {:.2} above threshold", report.performance_score),
                );
            }
        }

        for adj in &adjustments {
            tracing::info!(
                knob = ?adj.knob,
                before = adj.before,
                after = adj.after,
                reason = %adj.reason,
                "config adjusted"
            );
        }
        adjustments
    }

    /// 单条改进指令：大小写不敏感，按 parsing / confidence / reflection 顺序首个命中生效
    fn apply_directive(
        &self,
        config: &mut AgentConfig,
        cycle: u64,
        directive: &str,
    ) -> Option<ConfigAdjustment> {
        let lower = directive.to_lowercase();
        let reason = format!("improvement: {directive}");

        if lower.contains("parsing") {
            let before = config.max_input_length;
            let ceiling = self.bounds.max_input_length_ceiling;
            if before < ceiling {
                let grown = (before as f64 * INPUT_LENGTH_FACTOR).floor() as usize;
                config.max_input_length = grown.min(ceiling);
            }
            changed(cycle, ConfigKnob::MaxInputLength, before as f64, config.max_input_length as f64, reason)
        } else if lower.contains("confidence") {
            let before = config.confidence_boost;
            let ceiling = self.bounds.confidence_boost_ceiling;
            if before < ceiling {
                config.confidence_boost = (before * CONFIDENCE_BOOST_FACTOR).min(ceiling);
            }
            changed(cycle, ConfigKnob::ConfidenceBoost, before, config.confidence_boost, reason)
        } else if lower.contains("reflection") {
            let before = config.reflection_interval;
            let floor = self.bounds.reflection_interval_floor.max(1);
            if before > floor {
                config.reflection_interval = before - 1;
            }
            changed(
                cycle,
                ConfigKnob::ReflectionInterval,
                before as f64,
                config.reflection_interval as f64,
                reason,
            )
        } else {
            None
        }
    }
}

fn changed(cycle: u64, knob: ConfigKnob, before: f64, after: f64, reason: String) -> Option<ConfigAdjustment> {
    ((after - before).abs() > f64::EPSILON).then(|| ConfigAdjustment {
        cycle,
        knob,
        before,
        after,
        reason,
        timestamp: Utc::now(),
    })
}

fn push_if_changed(
    adjustments: &mut Vec<ConfigAdjustment>,
    cycle: u64,
    knob: ConfigKnob,
    before: f64,
    after: f64,
    reason: String,
) {
    if let Some(adj) = changed(cycle, knob, before, after, reason) {
        adjustments.push(adj);
    }
}
