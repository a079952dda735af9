//! # Binding 模块
//!
//! 绑定层入口：把一个描述符绑定到一个 UI 元素上。
//!
//! ## 流程
//!
//! ```text
//! should_use_static ──是──► 写入结束状态（静态）
//!        │否
//!     adapt ──时长为 0──► 写入结束状态（静态）
//!        │
//!   滚动触发？──是──► 校验 → ViewportCoordinator
//!        │否
//!   工厂创建 → Controller.register（校验门）→ 挂载触发时播放
//! ```
//!
//! 任一环节拒绝都回退为静态绑定：元素立即处于结束状态，完全可交互。
//!
//! [`Binding`] 在析构时注销自己的句柄，清理不会被遗忘。

use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::descriptor::{AnimationDescriptor, Trigger};
use crate::engine::AnimationFactory;
use crate::fallback;
use crate::handle::{AnimationHandle, Playback};
use crate::lifecycle::MotionManager;
use crate::target::MotionTarget;
use crate::validator;
use crate::viewport::ScrollTrigger;

enum BindingKind {
    /// 已直接写入结束状态
    Static,
    /// 时间驱动，句柄存放在注册表中
    Animated {
        handle: AnimationHandle,
        playback: Rc<dyn Playback>,
    },
    /// 滚动驱动，由协调器持有
    Scroll(ScrollTrigger),
}

/// 一次绑定的所有权令牌
///
/// 丢弃时注销对应的注册项或滚动触发器；只会移除自己创建的那一项，
/// 同 id 的后继绑定不受影响。
pub struct Binding {
    id: String,
    kind: BindingKind,
    manager: Weak<MotionManager>,
}

impl Binding {
    fn new(id: &str, kind: BindingKind, manager: &Rc<MotionManager>) -> Self {
        Self {
            id: id.to_string(),
            kind,
            manager: Rc::downgrade(manager),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// 是否走了静态回退
    pub fn is_static(&self) -> bool {
        matches!(self.kind, BindingKind::Static)
    }

    pub fn is_scroll_driven(&self) -> bool {
        matches!(self.kind, BindingKind::Scroll(_))
    }

    /// 可控播放对象（悬停 / 操作触发的动画由调用方驱动）
    pub fn playback(&self) -> Option<Rc<dyn Playback>> {
        match &self.kind {
            BindingKind::Static => None,
            BindingKind::Animated { playback, .. } => Some(playback.clone()),
            BindingKind::Scroll(trigger) => Some(trigger.playback()),
        }
    }

    /// 注册表中的句柄（仅时间驱动的绑定）
    pub fn handle(&self) -> Option<&AnimationHandle> {
        match &self.kind {
            BindingKind::Animated { handle, .. } => Some(handle),
            _ => None,
        }
    }

    pub fn trigger(&self) -> Option<&ScrollTrigger> {
        match &self.kind {
            BindingKind::Scroll(trigger) => Some(trigger),
            _ => None,
        }
    }

    /// 立即解绑（等价于丢弃）
    pub fn release(mut self) {
        self.unbind();
    }

    fn unbind(&mut self) {
        let kind = std::mem::replace(&mut self.kind, BindingKind::Static);
        let manager = self.manager.upgrade();
        match (kind, manager) {
            (BindingKind::Static, _) => {}
            (BindingKind::Animated { handle, .. }, Some(manager)) => {
                manager.controller().unregister_handle(&self.id, &handle);
            }
            (BindingKind::Animated { handle, .. }, None) => handle.cancel(),
            (BindingKind::Scroll(trigger), Some(manager)) => {
                manager.coordinator().remove_exact(&trigger);
            }
            // 协调器随管理器一起销毁时已经清理了触发器
            (BindingKind::Scroll(_), None) => {}
        }
    }
}

impl Drop for Binding {
    fn drop(&mut self) {
        self.unbind();
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            BindingKind::Static => "static",
            BindingKind::Animated { .. } => "animated",
            BindingKind::Scroll(_) => "scroll",
        };
        f.debug_struct("Binding")
            .field("id", &self.id)
            .field("kind", &kind)
            .finish()
    }
}

impl MotionManager {
    /// 把描述符绑定到元素
    ///
    /// 永远返回一个绑定；动效不可用或被拒绝时返回静态绑定，
    /// 此时元素已经被写成结束状态。
    pub fn bind(
        self: &Rc<Self>,
        target: Rc<dyn MotionTarget>,
        descriptor: &AnimationDescriptor,
        factory: &dyn AnimationFactory,
    ) -> Binding {
        let id = descriptor.id.as_str();
        let config = self.config();

        if fallback::should_use_static(config.reduced_motion, config.enabled) {
            return self.bind_static(target.as_ref(), descriptor, "动效不可用");
        }

        let adapted = self.adapt(descriptor);
        if adapted.duration == Some(0) {
            return self.bind_static(target.as_ref(), descriptor, "设备档位不做动画");
        }

        if adapted.is_scroll_driven() {
            if !validator::validate(&adapted, &config) {
                return self.bind_static(target.as_ref(), descriptor, "校验未通过");
            }
            return match self
                .coordinator()
                .create_trigger(id, target.clone(), &adapted, factory)
            {
                Some(trigger) => {
                    trigger.set_final_state(descriptor.to.clone());
                    Binding::new(id, BindingKind::Scroll(trigger), self)
                }
                None => self.bind_static(target.as_ref(), descriptor, "滚动触发器创建失败"),
            };
        }

        let mut resolved = adapted;
        resolved.easing.get_or_insert(config.easing.primary);

        let playback = factory.create(target.clone(), &resolved);
        let handle = AnimationHandle::from_playback(playback.clone())
            .with_final_state(target.clone(), descriptor.to.clone());
        if !self
            .controller()
            .register(id, handle.clone(), Some(&resolved))
        {
            playback.cancel();
            return self.bind_static(target.as_ref(), descriptor, "注册被拒绝");
        }

        if resolved.trigger == Trigger::Mount {
            playback.play();
        }
        debug!(id, trigger = ?resolved.trigger, "绑定动画");
        Binding::new(id, BindingKind::Animated { handle, playback }, self)
    }

    /// 以错开的延迟绑定多个元素
    ///
    /// 第 `i` 个元素的 id 为 `"{id}-{i}"`，延迟增加 `i * stagger`；
    /// 描述符未指定 `stagger` 时使用 `timing.staggerStep`。
    pub fn bind_staggered(
        self: &Rc<Self>,
        targets: &[Rc<dyn MotionTarget>],
        descriptor: &AnimationDescriptor,
        factory: &dyn AnimationFactory,
    ) -> Vec<Binding> {
        let step = descriptor
            .stagger
            .unwrap_or_else(|| self.config().timing.stagger_step);
        let base_delay = descriptor.delay.unwrap_or(0);

        targets
            .iter()
            .enumerate()
            .map(|(i, target)| {
                let mut item = descriptor.clone();
                item.id = format!("{}-{}", descriptor.id, i);
                item.delay = Some(base_delay + step * i as u32);
                self.bind(target.clone(), &item, factory)
            })
            .collect()
    }

    fn bind_static(
        self: &Rc<Self>,
        target: &dyn MotionTarget,
        descriptor: &AnimationDescriptor,
        reason: &str,
    ) -> Binding {
        fallback::apply_final_state(target, &descriptor.to);
        debug!(id = %descriptor.id, reason, "静态回退");
        Binding::new(&descriptor.id, BindingKind::Static, self)
    }
}
