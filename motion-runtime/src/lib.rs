//! # Motion Runtime
//!
//! 自适应动效的生命周期管理库。
//!
//! ## 架构概述
//!
//! `motion-runtime` 决定一个 UI 元素的动画是否播放、以多大幅度播放，
//! 以及在什么时候被取消。它不直接接触 DOM 或渲染器，宿主能力全部通过
//! [`platform`] 中的 trait 注入：
//!
//! ```text
//! Platform ── 偏好 / resize / 帧 / 滚动 ──► MotionManager
//!                                              │
//!                      ┌───────────────────────┼──────────────────────┐
//!                      ▼                       ▼                      ▼
//!              AnimationController     ViewportCoordinator    FrameRateMonitor
//!               (id → handle 注册表)     (滚动触发器)           (帧率熔断)
//!                      ▲                       ▲
//!                      └──────── Binding ──────┘
//!                                  │
//!                          Validator / DeviceAdapter / Fallback
//! ```
//!
//! ## 核心类型
//!
//! - [`MotionManager`]：顶层组合体，监听平台信号并调度各组件
//! - [`AnimationDescriptor`]：一个动画的声明式描述
//! - [`Binding`]：一次绑定的所有权令牌，析构时自动注销
//! - [`TweenEngine`]：内置的补间引擎，实现 [`AnimationFactory`]
//!
//! ## 使用示例
//!
//! ```ignore
//! use motion_runtime::{AnimationDescriptor, MotionManager, Property, PropertyMap, TweenEngine};
//!
//! let manager = MotionManager::with_defaults(platform);
//! let engine = std::rc::Rc::new(TweenEngine::new());
//! engine.drive(manager.platform().clock.clone());
//!
//! let _scope = manager.enter();
//! let fade = AnimationDescriptor::new("card-in", PropertyMap::new().with(Property::Opacity, 1.0))
//!     .with_from(PropertyMap::new().with(Property::Opacity, 0.0));
//! let binding = motion_runtime::use_motion().bind(card, &fade, engine.as_ref());
//! ```
//!
//! ## 模块结构
//!
//! - [`config`]：配置与部分覆盖
//! - [`descriptor`]：动画描述符与滚动选项
//! - [`validator`]：描述符校验
//! - [`device`]：设备档位与幅度缩放
//! - [`fps`]：帧率监控
//! - [`controller`]：动画注册表
//! - [`viewport`]：滚动触发器协调
//! - [`lifecycle`]：生命周期管理器
//! - [`fallback`]：静态回退
//! - [`binding`] / [`scope`]：组件层接入
//! - [`engine`]：补间引擎

pub mod binding;
pub mod config;
pub mod controller;
pub mod descriptor;
pub mod device;
pub mod easing;
pub mod engine;
pub mod error;
pub mod fallback;
pub mod fps;
pub mod handle;
pub mod lifecycle;
pub mod platform;
pub mod scope;
pub mod target;
pub mod validator;
pub mod viewport;

// 重导出核心类型
pub use binding::Binding;
pub use config::{
    EasingConfig, MotionConfig, MotionConfigOverride, PerformanceConfig, TimingConfig,
    TransformBounds,
};
pub use controller::AnimationController;
pub use descriptor::{
    AnimationDescriptor, Property, PropertyMap, ScrollOptions, ScrollPosition, ToggleAction,
    ToggleActions, Trigger,
};
pub use device::{Breakpoints, DeviceAdapter, DeviceTier};
pub use easing::EasingFunction;
pub use engine::{AnimationFactory, TweenEngine, TweenHandle, TweenState};
pub use error::{MotionError, MotionResult};
pub use fps::{FpsWindow, FrameRateMonitor};
pub use handle::{AnimationHandle, Cancellable, Playback};
pub use lifecycle::MotionManager;
pub use platform::{FrameClock, Platform, PreferenceWatcher, ScrollObserver, ViewportWatcher};
pub use scope::{ScopeGuard, current, use_motion};
pub use target::{ElementLayout, MotionTarget};
pub use validator::Violation;
pub use viewport::{Region, ScrollRange, ScrollTrigger, ViewportCoordinator};

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use crate::platform::mock::{MockElement, MockPlatform};

    #[test]
    fn test_scoped_bind_smoke() {
        let mock = MockPlatform::with_width(1440.0);
        let manager = MotionManager::with_defaults(mock.platform());
        let engine = Rc::new(TweenEngine::new());
        engine.drive(mock.clock.clone());

        let _scope = manager.enter();
        let card = Rc::new(MockElement::new("card"));
        let fade = AnimationDescriptor::new("card-in", PropertyMap::new().with(Property::Opacity, 1.0))
            .with_from(PropertyMap::new().with(Property::Opacity, 0.0))
            .with_duration(300);
        let binding = use_motion().bind(card.clone(), &fade, engine.as_ref());

        mock.clock.run_at_fps(60.0, 1.0);
        assert!(!binding.is_static());
        assert_eq!(card.value(Property::Opacity), 1.0);
        assert_eq!(manager.config().device_tier, DeviceTier::Desktop);
    }
}
