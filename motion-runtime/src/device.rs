//! # Device 模块
//!
//! 设备档位判定与动效强度缩放。
//!
//! 档位只由可用视口宽度决定（三段阈值）；
//! 每个档位对应一个固定的缩放系数，移动端永远为 0（完全不做位移动画）。

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::descriptor::AnimationDescriptor;
use crate::platform::ViewportWatcher;

/// 设备档位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceTier {
    #[default]
    Desktop,
    Tablet,
    Mobile,
}

impl DeviceTier {
    /// 该档位的动效缩放系数
    pub const fn motion_scale(self) -> f32 {
        scale_for(self)
    }
}

impl std::fmt::Display for DeviceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Desktop => "desktop",
            Self::Tablet => "tablet",
            Self::Mobile => "mobile",
        })
    }
}

/// 档位 → 缩放系数（全函数、确定性）
pub const fn scale_for(tier: DeviceTier) -> f32 {
    match tier {
        DeviceTier::Desktop => 1.0,
        DeviceTier::Tablet => 0.7,
        DeviceTier::Mobile => 0.0,
    }
}

/// 宽度阈值（px）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breakpoints {
    /// 低于此宽度为 mobile
    pub narrow: f32,
    /// 低于此宽度为 tablet
    pub medium: f32,
}

impl Default for Breakpoints {
    fn default() -> Self {
        Self {
            narrow: 768.0,
            medium: 1024.0,
        }
    }
}

/// 按宽度判定档位；没有视口（或宽度无效）时为 desktop
pub fn classify_width(width: Option<f32>, breakpoints: &Breakpoints) -> DeviceTier {
    match width {
        Some(w) if w.is_finite() && w < breakpoints.narrow => DeviceTier::Mobile,
        Some(w) if w.is_finite() && w < breakpoints.medium => DeviceTier::Tablet,
        _ => DeviceTier::Desktop,
    }
}

/// 按缩放系数改写描述符
///
/// 只缩放方向性位移（`from` 与 `to` 两侧）；透明度与缩放保持不变。
/// 系数恰好为 0 时时长置 0，表示"不做动画，直接应用终态"。
pub fn adapt_for_scale(descriptor: &AnimationDescriptor, scale: f32) -> AnimationDescriptor {
    let mut adapted = descriptor.clone();
    if let Some(from) = adapted.from.as_mut() {
        from.scale_offsets(scale);
    }
    adapted.to.scale_offsets(scale);
    if scale == 0.0 {
        adapted.duration = Some(0);
    }
    adapted
}

/// 设备适配器
pub struct DeviceAdapter {
    viewport: Rc<dyn ViewportWatcher>,
    breakpoints: Breakpoints,
    tier: DeviceTier,
}

impl std::fmt::Debug for DeviceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceAdapter")
            .field("breakpoints", &self.breakpoints)
            .field("tier", &self.tier)
            .finish()
    }
}

impl DeviceAdapter {
    /// 使用默认阈值创建，构造时判定一次档位
    pub fn new(viewport: Rc<dyn ViewportWatcher>) -> Self {
        Self::with_breakpoints(viewport, Breakpoints::default())
    }

    pub fn with_breakpoints(viewport: Rc<dyn ViewportWatcher>, breakpoints: Breakpoints) -> Self {
        let tier = classify_width(viewport.width(), &breakpoints);
        Self {
            viewport,
            breakpoints,
            tier,
        }
    }

    /// 按当前视口重新判定（不修改已记录的档位）
    pub fn classify(&self) -> DeviceTier {
        classify_width(self.viewport.width(), &self.breakpoints)
    }

    /// 已记录的档位
    pub fn tier(&self) -> DeviceTier {
        self.tier
    }

    /// 已记录档位的缩放系数
    pub fn scale(&self) -> f32 {
        scale_for(self.tier)
    }

    /// 用新宽度更新档位
    ///
    /// # 返回
    /// - `Some(tier)`: 档位发生变化
    /// - `None`: 档位不变
    pub fn update_width(&mut self, width: f32) -> Option<DeviceTier> {
        let tier = classify_width(Some(width), &self.breakpoints);
        self.set_tier(tier)
    }

    /// 重新读取视口并更新档位
    pub fn refresh(&mut self) -> Option<DeviceTier> {
        let tier = self.classify();
        self.set_tier(tier)
    }

    fn set_tier(&mut self, tier: DeviceTier) -> Option<DeviceTier> {
        if tier == self.tier {
            return None;
        }
        debug!(from = %self.tier, to = %tier, "设备档位变化");
        self.tier = tier;
        Some(tier)
    }

    /// 按已记录档位改写描述符
    pub fn adapt(&self, descriptor: &AnimationDescriptor) -> AnimationDescriptor {
        adapt_for_scale(descriptor, self.scale())
    }
}
