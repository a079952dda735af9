//! # Easing 模块
//!
//! 缓动函数库。
//!
//! 设计规范禁止会产生过冲（overshoot）的缓动：`back` / `elastic` / `bounce`
//! 三个族仍然在这里定义（描述符里可能出现它们），但 [`EasingFunction::overshoots`]
//! 会把它们标记出来，由校验器拒绝。

use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

/// 缓动函数类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EasingFunction {
    /// 线性（匀速）
    ///
    /// 滚动擦洗模式强制使用此缓动。
    Linear,
    /// 二次缓入
    EaseInQuad,
    /// 二次缓出
    EaseOutQuad,
    /// 二次缓入缓出
    EaseInOutQuad,
    /// 三次缓入
    EaseInCubic,
    /// 三次缓出
    #[default]
    EaseOutCubic,
    /// 三次缓入缓出
    EaseInOutCubic,
    /// 正弦缓入
    EaseInSine,
    /// 正弦缓出
    EaseOutSine,
    /// 正弦缓入缓出
    EaseInOutSine,
    /// 回退缓入（过冲）
    EaseInBack,
    /// 回退缓出（过冲）
    EaseOutBack,
    /// 回退缓入缓出（过冲）
    EaseInOutBack,
    /// 弹性缓入（过冲）
    EaseInElastic,
    /// 弹性缓出（过冲）
    EaseOutElastic,
    /// 弹性缓入缓出（过冲）
    EaseInOutElastic,
    /// 弹跳缓入
    EaseInBounce,
    /// 弹跳缓出
    EaseOutBounce,
    /// 弹跳缓入缓出
    EaseInOutBounce,
}

impl EasingFunction {
    /// 计算缓动值
    ///
    /// `t` 会先被限制在 0.0 - 1.0 之间。
    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);

        match self {
            Self::Linear => t,
            Self::EaseInQuad => t * t,
            Self::EaseOutQuad => 1.0 - (1.0 - t).powi(2),
            Self::EaseInOutQuad => in_out(t, 2),
            Self::EaseInCubic => t * t * t,
            Self::EaseOutCubic => 1.0 - (1.0 - t).powi(3),
            Self::EaseInOutCubic => in_out(t, 3),
            Self::EaseInSine => 1.0 - (t * PI / 2.0).cos(),
            Self::EaseOutSine => (t * PI / 2.0).sin(),
            Self::EaseInOutSine => -((PI * t).cos() - 1.0) / 2.0,
            Self::EaseInBack => ease_in_back(t),
            Self::EaseOutBack => ease_out_back(t),
            Self::EaseInOutBack => ease_in_out_back(t),
            Self::EaseInElastic => ease_in_elastic(t),
            Self::EaseOutElastic => ease_out_elastic(t),
            Self::EaseInOutElastic => ease_in_out_elastic(t),
            Self::EaseInBounce => 1.0 - ease_out_bounce(1.0 - t),
            Self::EaseOutBounce => ease_out_bounce(t),
            Self::EaseInOutBounce => {
                if t < 0.5 {
                    (1.0 - ease_out_bounce(1.0 - 2.0 * t)) / 2.0
                } else {
                    (1.0 + ease_out_bounce(2.0 * t - 1.0)) / 2.0
                }
            }
        }
    }

    /// 是否属于被禁止的过冲族（back / elastic / bounce）
    ///
    /// bounce 不越界但会来回反弹，同样禁止。
    pub fn overshoots(&self) -> bool {
        matches!(
            self,
            Self::EaseInBack
                | Self::EaseOutBack
                | Self::EaseInOutBack
                | Self::EaseInElastic
                | Self::EaseOutElastic
                | Self::EaseInOutElastic
                | Self::EaseInBounce
                | Self::EaseOutBounce
                | Self::EaseInOutBounce
        )
    }

    /// 配置与日志中使用的名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::EaseInQuad => "easeInQuad",
            Self::EaseOutQuad => "easeOutQuad",
            Self::EaseInOutQuad => "easeInOutQuad",
            Self::EaseInCubic => "easeInCubic",
            Self::EaseOutCubic => "easeOutCubic",
            Self::EaseInOutCubic => "easeInOutCubic",
            Self::EaseInSine => "easeInSine",
            Self::EaseOutSine => "easeOutSine",
            Self::EaseInOutSine => "easeInOutSine",
            Self::EaseInBack => "easeInBack",
            Self::EaseOutBack => "easeOutBack",
            Self::EaseInOutBack => "easeInOutBack",
            Self::EaseInElastic => "easeInElastic",
            Self::EaseOutElastic => "easeOutElastic",
            Self::EaseInOutElastic => "easeInOutElastic",
            Self::EaseInBounce => "easeInBounce",
            Self::EaseOutBounce => "easeOutBounce",
            Self::EaseInOutBounce => "easeInOutBounce",
        }
    }
}

impl std::fmt::Display for EasingFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 多项式缓入缓出
fn in_out(t: f32, power: i32) -> f32 {
    if t < 0.5 {
        2f32.powi(power - 1) * t.powi(power)
    } else {
        1.0 - (-2.0 * t + 2.0).powi(power) / 2.0
    }
}

const BACK_C1: f32 = 1.70158;

fn ease_in_back(t: f32) -> f32 {
    let c3 = BACK_C1 + 1.0;
    c3 * t * t * t - BACK_C1 * t * t
}

fn ease_out_back(t: f32) -> f32 {
    let c3 = BACK_C1 + 1.0;
    1.0 + c3 * (t - 1.0).powi(3) + BACK_C1 * (t - 1.0).powi(2)
}

fn ease_in_out_back(t: f32) -> f32 {
    let c2 = BACK_C1 * 1.525;
    if t < 0.5 {
        (2.0 * t).powi(2) * ((c2 + 1.0) * 2.0 * t - c2) / 2.0
    } else {
        ((2.0 * t - 2.0).powi(2) * ((c2 + 1.0) * (2.0 * t - 2.0) + c2) + 2.0) / 2.0
    }
}

fn ease_in_elastic(t: f32) -> f32 {
    if t == 0.0 || t == 1.0 {
        return t;
    }
    let c4 = (2.0 * PI) / 3.0;
    -(2.0_f32.powf(10.0 * t - 10.0)) * ((t * 10.0 - 10.75) * c4).sin()
}

fn ease_out_elastic(t: f32) -> f32 {
    if t == 0.0 || t == 1.0 {
        return t;
    }
    let c4 = (2.0 * PI) / 3.0;
    2.0_f32.powf(-10.0 * t) * ((t * 10.0 - 0.75) * c4).sin() + 1.0
}

fn ease_in_out_elastic(t: f32) -> f32 {
    if t == 0.0 || t == 1.0 {
        return t;
    }
    let c5 = (2.0 * PI) / 4.5;
    let wave = ((20.0 * t - 11.125) * c5).sin();
    if t < 0.5 {
        -(2.0_f32.powf(20.0 * t - 10.0) * wave) / 2.0
    } else {
        2.0_f32.powf(-20.0 * t + 10.0) * wave / 2.0 + 1.0
    }
}

fn ease_out_bounce(t: f32) -> f32 {
    let n1 = 7.5625;
    let d1 = 2.75;

    if t < 1.0 / d1 {
        n1 * t * t
    } else if t < 2.0 / d1 {
        let t = t - 1.5 / d1;
        n1 * t * t + 0.75
    } else if t < 2.5 / d1 {
        let t = t - 2.25 / d1;
        n1 * t * t + 0.9375
    } else {
        let t = t - 2.625 / d1;
        n1 * t * t + 0.984375
    }
}
