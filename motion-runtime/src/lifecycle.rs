//! # Lifecycle 模块
//!
//! 动效生命周期管理器：组合根。
//!
//! ## 职责
//!
//! - 持有唯一的实时 [`MotionConfig`]（默认值 ⊕ 覆盖 ⊕ 无障碍偏好 ⊕ 设备档位）
//! - 持有设备适配器、注册表、滚动触发协调器与（按配置创建的）帧率监控器
//! - 响应外部信号：偏好变化、视口 resize、帧率熔断
//!
//! ## 状态机
//!
//! 允许动效 ⇔ `enabled ∧ ¬reducedMotion`：
//!
//! ```text
//! 偏好变为 reduced ──► reducedMotion = true，撤销全部动画（写回结束状态）
//! 偏好恢复          ──► reducedMotion = false
//! resize            ──► 档位变化时更新 deviceTier（只影响之后的 adapt）
//! 帧率熔断          ──► 撤销全部动画，enabled = false（本会话内不再恢复）
//! ```
//!
//! 平台回调只持有管理器的弱引用；管理器被丢弃或 `teardown` 后回调自动失效。

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::{debug, info, warn};

use crate::config::{MotionConfig, MotionConfigOverride};
use crate::controller::AnimationController;
use crate::descriptor::AnimationDescriptor;
use crate::device::{DeviceAdapter, DeviceTier};
use crate::fallback;
use crate::fps::FrameRateMonitor;
use crate::platform::{Platform, SubscriptionId};
use crate::validator;
use crate::viewport::ViewportCoordinator;

/// 动效生命周期管理器
///
/// 每个活跃的 UI 子树一个实例，不是进程级单例。
pub struct MotionManager {
    platform: Platform,
    config: RefCell<MotionConfig>,
    /// 调用方覆盖中强制开启的 reduced motion，不随系统偏好恢复
    forced_reduced: bool,
    adapter: RefCell<DeviceAdapter>,
    controller: AnimationController,
    coordinator: ViewportCoordinator,
    monitor: Option<FrameRateMonitor>,
    preference_subscription: Cell<Option<SubscriptionId>>,
    resize_subscription: Cell<Option<SubscriptionId>>,
    torn_down: Cell<bool>,
}

impl std::fmt::Debug for MotionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotionManager")
            .field("config", &self.config.borrow())
            .field("animations", &self.controller.count())
            .field("triggers", &self.coordinator.count())
            .field("torn_down", &self.torn_down.get())
            .finish()
    }
}

impl MotionManager {
    /// 使用默认配置创建
    pub fn with_defaults(platform: Platform) -> Rc<Self> {
        Self::new(platform, &MotionConfigOverride::default())
    }

    /// 创建管理器并订阅平台信号
    ///
    /// 合并后的配置无效时记录警告并回退到默认配置。
    pub fn new(platform: Platform, overrides: &MotionConfigOverride) -> Rc<Self> {
        let mut config = MotionConfig::merged(overrides);
        if let Err(e) = config.validate() {
            warn!(error = %e, "动效配置无效，使用默认值");
            config = MotionConfig::default();
        }

        let forced_reduced = config.reduced_motion;
        config.reduced_motion = forced_reduced || platform.preferences.prefers_reduced_motion();

        let adapter = DeviceAdapter::new(platform.viewport.clone());
        config.device_tier = adapter.tier();

        let monitor = config.performance.monitoring_enabled.then(|| {
            FrameRateMonitor::new(platform.clock.clone(), config.performance.fps_threshold)
        });

        let manager = Rc::new(Self {
            controller: AnimationController::new(config.clone()),
            coordinator: ViewportCoordinator::new(platform.scroll.clone()),
            config: RefCell::new(config),
            forced_reduced,
            adapter: RefCell::new(adapter),
            monitor,
            preference_subscription: Cell::new(None),
            resize_subscription: Cell::new(None),
            torn_down: Cell::new(false),
            platform,
        });
        manager.subscribe();
        manager.sync_monitor();

        let config = manager.config();
        info!(
            tier = %config.device_tier,
            reduced_motion = config.reduced_motion,
            enabled = config.enabled,
            monitoring = manager.monitor.is_some(),
            "动效管理器就绪"
        );
        manager
    }

    fn subscribe(self: &Rc<Self>) {
        let weak: Weak<Self> = Rc::downgrade(self);
        let id = self
            .platform
            .preferences
            .on_change(Box::new(move |reduced| {
                if let Some(manager) = weak.upgrade() {
                    manager.handle_reduced_motion_change(reduced);
                }
            }));
        self.preference_subscription.set(Some(id));

        let weak: Weak<Self> = Rc::downgrade(self);
        let id = self.platform.viewport.on_resize(Box::new(move |width| {
            if let Some(manager) = weak.upgrade() {
                manager.handle_resize(width);
            }
        }));
        self.resize_subscription.set(Some(id));

        if let Some(monitor) = &self.monitor {
            let weak: Weak<Self> = Rc::downgrade(self);
            monitor.on_breach(move |average| {
                if let Some(manager) = weak.upgrade() {
                    manager.handle_performance_breach(average);
                }
            });
        }
    }

    /// 监控只在允许动效时运行
    fn sync_monitor(&self) {
        let Some(monitor) = &self.monitor else {
            return;
        };
        if self.is_motion_permitted() && !self.torn_down.get() {
            monitor.start();
        } else {
            monitor.stop();
        }
    }

    /// 把配置同步给注册表的校验门
    fn publish_config(&self) {
        self.controller.update_config(self.config());
    }

    // ========== 信号处理 ==========

    /// 无障碍偏好变化
    pub fn handle_reduced_motion_change(&self, prefers_reduced: bool) {
        if self.torn_down.get() {
            return;
        }
        let reduced = self.forced_reduced || prefers_reduced;
        let changed = {
            let mut config = self.config.borrow_mut();
            let changed = config.reduced_motion != reduced;
            config.reduced_motion = reduced;
            changed
        };
        if !changed {
            return;
        }

        info!(reduced_motion = reduced, "无障碍偏好变化");
        self.publish_config();
        if reduced {
            self.revoke_all();
        }
        self.sync_monitor();
    }

    /// 视口 resize
    ///
    /// 档位变化只影响之后的 `adapt`，正在运行的动画不会被重新缩放。
    pub fn handle_resize(&self, width: f32) {
        if self.torn_down.get() {
            return;
        }
        let changed = self.adapter.borrow_mut().update_width(width);
        if let Some(tier) = changed {
            self.config.borrow_mut().device_tier = tier;
            self.publish_config();
            info!(width, tier = %tier, "设备档位变化");
        }
        self.coordinator.refresh_all();
    }

    /// 帧率熔断：撤销全部动画并永久关闭动效
    pub fn handle_performance_breach(&self, average_fps: f32) {
        if self.torn_down.get() || !self.config.borrow().enabled {
            return;
        }
        warn!(average_fps, "帧率持续低于阈值，关闭动效");
        self.revoke_all();
        self.config.borrow_mut().enabled = false;
        self.publish_config();
        self.sync_monitor();
    }

    /// 取消注册表与滚动触发器中的全部动画
    ///
    /// # 返回
    /// 被取消的数量
    pub fn kill_all(&self) -> usize {
        self.controller.kill_all() + self.coordinator.kill_all()
    }

    /// 撤销全部动画：取消后把每个元素直接写成结束状态
    ///
    /// 全局关闭动效（无障碍偏好、帧率熔断）时使用，元素不会停在动画中途。
    ///
    /// # 返回
    /// 被撤销的数量
    pub fn revoke_all(&self) -> usize {
        self.controller.revoke_all() + self.coordinator.revoke_all()
    }

    /// 拆除：停止监控、取消全部动画、退订平台信号
    ///
    /// 无论当前配置如何都会执行；重复调用无副作用。丢弃管理器时自动调用。
    pub fn teardown(&self) {
        if self.torn_down.replace(true) {
            return;
        }
        if let Some(monitor) = &self.monitor {
            monitor.stop();
        }
        let killed = self.kill_all();
        if let Some(id) = self.preference_subscription.take() {
            self.platform.preferences.unsubscribe(id);
        }
        if let Some(id) = self.resize_subscription.take() {
            self.platform.viewport.unsubscribe(id);
        }
        info!(killed, "动效管理器已拆除");
    }

    // ========== 查询 ==========

    /// 当前配置的快照
    pub fn config(&self) -> MotionConfig {
        self.config.borrow().clone()
    }

    /// 是否允许动效：`enabled ∧ ¬reducedMotion`
    pub fn is_motion_permitted(&self) -> bool {
        self.config.borrow().is_motion_permitted()
    }

    /// 是否应走静态回退
    pub fn should_use_static(&self) -> bool {
        let config = self.config.borrow();
        fallback::should_use_static(config.reduced_motion, config.enabled)
    }

    pub fn device_tier(&self) -> DeviceTier {
        self.adapter.borrow().tier()
    }

    /// 按当前视口重新判定档位（不修改配置）
    pub fn classify(&self) -> DeviceTier {
        self.adapter.borrow().classify()
    }

    /// 按当前档位缩放描述符
    pub fn adapt(&self, descriptor: &AnimationDescriptor) -> AnimationDescriptor {
        self.adapter.borrow().adapt(descriptor)
    }

    /// 用当前配置校验描述符
    pub fn validate(&self, descriptor: &AnimationDescriptor) -> bool {
        validator::validate(descriptor, &self.config.borrow())
    }

    pub fn controller(&self) -> &AnimationController {
        &self.controller
    }

    pub fn coordinator(&self) -> &ViewportCoordinator {
        &self.coordinator
    }

    pub fn monitor(&self) -> Option<&FrameRateMonitor> {
        self.monitor.as_ref()
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.get()
    }
}

impl Drop for MotionManager {
    fn drop(&mut self) {
        debug!("丢弃动效管理器");
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Property, PropertyMap};
    use crate::handle::AnimationHandle;
    use crate::platform::headless;
    use crate::platform::mock::{FlagHandle, MockElement, MockPlatform};
    use crate::target::MotionTarget;

    #[test]
    fn test_construction_merges_signals() {
        let mock = MockPlatform::with_width(900.0);
        mock.preferences.set_reduced_motion(true);

        let manager = MotionManager::with_defaults(mock.platform());
        let config = manager.config();
        assert_eq!(config.device_tier, DeviceTier::Tablet);
        assert!(config.reduced_motion);
        assert!(config.enabled);
        assert!(!manager.is_motion_permitted());
        assert!(manager.should_use_static());
        // 不允许动效时不采样
        assert!(!manager.monitor().unwrap().is_running());
    }

    #[test]
    fn test_headless_defaults() {
        let manager = MotionManager::with_defaults(headless());
        assert_eq!(manager.device_tier(), DeviceTier::Desktop);
        assert!(manager.is_motion_permitted());
        assert!(manager.monitor().unwrap().is_running());
    }

    #[test]
    fn test_invalid_override_falls_back_to_defaults() {
        let mock = MockPlatform::with_width(1280.0);
        let manager = MotionManager::new(
            mock.platform(),
            &MotionConfigOverride::default().with_timing(800, 200),
        );
        assert_eq!(manager.config().timing.min, 150);
        assert_eq!(manager.config().timing.max, 600);
    }

    #[test]
    fn test_monitoring_disabled_creates_no_monitor() {
        let mock = MockPlatform::with_width(1280.0);
        let manager = MotionManager::new(
            mock.platform(),
            &MotionConfigOverride::default().with_monitoring(false),
        );
        assert!(manager.monitor().is_none());
        assert_eq!(mock.clock.pending_count(), 0);
    }

    #[test]
    fn test_forced_reduced_survives_preference_reset() {
        let mock = MockPlatform::with_width(1280.0);
        let overrides = MotionConfigOverride {
            reduced_motion: Some(true),
            ..MotionConfigOverride::default()
        };
        let manager = MotionManager::new(mock.platform(), &overrides);

        mock.preferences.set_reduced_motion(true);
        mock.preferences.set_reduced_motion(false);
        assert!(manager.config().reduced_motion);
    }

    #[test]
    fn test_resize_updates_tier() {
        let mock = MockPlatform::with_width(1280.0);
        let manager = MotionManager::with_defaults(mock.platform());

        mock.viewport.resize(500.0);
        assert_eq!(manager.device_tier(), DeviceTier::Mobile);
        assert_eq!(manager.config().device_tier, DeviceTier::Mobile);
        assert_eq!(manager.controller().config().device_tier, DeviceTier::Mobile);
        // 档位变化不影响是否允许动效
        assert!(manager.is_motion_permitted());
    }

    #[test]
    fn test_breach_disables_motion_for_good() {
        let mock = MockPlatform::with_width(1280.0);
        let manager = MotionManager::with_defaults(mock.platform());
        let flag = FlagHandle::new();
        manager
            .controller()
            .register("a", AnimationHandle::new(flag.clone()), None);

        mock.clock.run_at_fps(10.0, 10.0);

        assert_eq!(flag.cancel_count(), 1);
        assert_eq!(manager.controller().count(), 0);
        assert!(!manager.config().enabled);
        assert!(!manager.is_motion_permitted());
        assert!(!manager.monitor().unwrap().is_running());

        // 帧率恢复也不会重新开启
        mock.clock.run_at_fps(60.0, 15.0);
        assert!(!manager.config().enabled);
    }

    #[test]
    fn test_breach_lands_elements_on_final_state() {
        let mock = MockPlatform::with_width(1280.0);
        let manager = MotionManager::with_defaults(mock.platform());
        let element = Rc::new(MockElement::new("card"));
        element.set_property(Property::Opacity, 0.3);
        manager.controller().register(
            "fade",
            AnimationHandle::new(FlagHandle::new())
                .with_final_state(element.clone(), PropertyMap::new().with(Property::Opacity, 1.0)),
            None,
        );

        mock.clock.run_at_fps(10.0, 10.0);
        assert!(!manager.config().enabled);
        assert_eq!(element.value(Property::Opacity), 1.0);
    }

    #[test]
    fn test_teardown_only_cancels() {
        let mock = MockPlatform::with_width(1280.0);
        let manager = MotionManager::with_defaults(mock.platform());
        let element = Rc::new(MockElement::new("card"));
        element.set_property(Property::Opacity, 0.3);
        manager.controller().register(
            "fade",
            AnimationHandle::new(FlagHandle::new())
                .with_final_state(element.clone(), PropertyMap::new().with(Property::Opacity, 1.0)),
            None,
        );

        manager.teardown();
        assert!((element.value(Property::Opacity) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_teardown_is_idempotent_and_unsubscribes() {
        let mock = MockPlatform::with_width(1280.0);
        let manager = MotionManager::with_defaults(mock.platform());
        let flag = FlagHandle::new();
        manager
            .controller()
            .register("a", AnimationHandle::new(flag.clone()), None);
        assert_eq!(mock.preferences.listener_count(), 1);
        assert_eq!(mock.viewport.listener_count(), 1);

        manager.teardown();
        manager.teardown();

        assert_eq!(flag.cancel_count(), 1);
        assert_eq!(mock.preferences.listener_count(), 0);
        assert_eq!(mock.viewport.listener_count(), 0);
        assert_eq!(mock.clock.pending_count(), 0);
        assert!(manager.is_torn_down());

        // 拆除后信号无效
        mock.preferences.set_reduced_motion(true);
        assert!(!manager.config().reduced_motion);
    }

    #[test]
    fn test_drop_tears_down() {
        let mock = MockPlatform::with_width(1280.0);
        let flag = FlagHandle::new();
        {
            let manager = MotionManager::with_defaults(mock.platform());
            manager
                .controller()
                .register("a", AnimationHandle::new(flag.clone()), None);
        }
        assert_eq!(flag.cancel_count(), 1);
        assert_eq!(mock.preferences.listener_count(), 0);
    }
}
