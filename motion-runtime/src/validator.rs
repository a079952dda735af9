//! # Validator 模块
//!
//! 在动画运行前按设计约束检查描述符。
//!
//! ## 设计原则
//!
//! - 纯函数：`(描述符, 配置) → 通过 / 失败`，唯一的副作用是诊断日志
//! - 所有规则都会执行，每一条违规都会被记录，而不是遇到第一条就返回
//! - 从不"修正"描述符；是否回退由调用方决定

use std::fmt;

use tracing::warn;

use crate::config::MotionConfig;
use crate::descriptor::{AnimationDescriptor, Property, PropertyMap};
use crate::easing::EasingFunction;

/// 违规出现在描述符的哪一侧
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    From,
    To,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::From => "from",
            Self::To => "to",
        })
    }
}

/// 单条违规
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    /// 时长低于下限
    DurationTooShort { duration: u32, min: u32 },
    /// 时长超过上限
    DurationTooLong { duration: u32, max: u32 },
    /// 使用了会过冲的缓动
    ForbiddenEasing(EasingFunction),
    /// 位移绝对值超过上限
    OffsetOutOfBounds {
        phase: Phase,
        property: Property,
        value: f32,
        limit: f32,
    },
    /// 缩放超过上限
    ScaleTooLarge { phase: Phase, value: f32, limit: f32 },
    /// 透明度低于下限
    OpacityTooLow { phase: Phase, value: f32, limit: f32 },
    /// 动画了高开销属性
    ForbiddenProperty { phase: Phase, property: Property },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DurationTooShort { duration, min } => {
                write!(f, "时长 {duration}ms 低于下限 {min}ms")
            }
            Self::DurationTooLong { duration, max } => {
                write!(f, "时长 {duration}ms 超过上限 {max}ms")
            }
            Self::ForbiddenEasing(easing) => {
                write!(f, "缓动 {easing} 会产生过冲，已被禁止")
            }
            Self::OffsetOutOfBounds {
                phase,
                property,
                value,
                limit,
            } => write!(f, "{phase}.{property} = {value} 超出位移上限 ±{limit}"),
            Self::ScaleTooLarge {
                phase,
                value,
                limit,
            } => write!(f, "{phase}.scale = {value} 超过缩放上限 {limit}"),
            Self::OpacityTooLow {
                phase,
                value,
                limit,
            } => write!(f, "{phase}.opacity = {value} 低于透明度下限 {limit}"),
            Self::ForbiddenProperty { phase, property } => {
                write!(f, "{phase}.{property} 合成开销过高，禁止动画")
            }
        }
    }
}

/// 收集描述符的全部违规
pub fn check(descriptor: &AnimationDescriptor, config: &MotionConfig) -> Vec<Violation> {
    let mut violations = Vec::new();

    if let Some(duration) = descriptor.duration {
        if duration < config.timing.min {
            violations.push(Violation::DurationTooShort {
                duration,
                min: config.timing.min,
            });
        }
        if duration > config.timing.max {
            violations.push(Violation::DurationTooLong {
                duration,
                max: config.timing.max,
            });
        }
    }

    if let Some(easing) = descriptor.easing
        && easing.overshoots()
    {
        violations.push(Violation::ForbiddenEasing(easing));
    }

    if let Some(from) = &descriptor.from {
        check_state(Phase::From, from, config, &mut violations);
    }
    check_state(Phase::To, &descriptor.to, config, &mut violations);

    violations
}

fn check_state(
    phase: Phase,
    state: &PropertyMap,
    config: &MotionConfig,
    violations: &mut Vec<Violation>,
) {
    let bounds = &config.transform_bounds;

    for (property, value) in state.iter() {
        match property {
            Property::OffsetX | Property::OffsetY => {
                let limit = if property == Property::OffsetX {
                    bounds.max_offset_x
                } else {
                    bounds.max_offset_y
                };
                if value.abs() > limit {
                    violations.push(Violation::OffsetOutOfBounds {
                        phase,
                        property,
                        value,
                        limit,
                    });
                }
            }
            Property::Scale if value > bounds.max_scale => {
                violations.push(Violation::ScaleTooLarge {
                    phase,
                    value,
                    limit: bounds.max_scale,
                });
            }
            Property::Opacity if value < bounds.min_opacity => {
                violations.push(Violation::OpacityTooLow {
                    phase,
                    value,
                    limit: bounds.min_opacity,
                });
            }
            _ if property.is_forbidden() => {
                violations.push(Violation::ForbiddenProperty { phase, property });
            }
            _ => {}
        }
    }
}

/// 校验描述符
///
/// 每条违规以 `warn` 级别记录；任意一条违规即返回 `false`。
pub fn validate(descriptor: &AnimationDescriptor, config: &MotionConfig) -> bool {
    let violations = check(descriptor, config);
    for violation in &violations {
        warn!(id = %descriptor.id, violation = %violation, "动画描述符未通过校验");
    }
    violations.is_empty()
}
