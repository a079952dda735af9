//! # Controller 模块
//!
//! 动画注册表：`id → AnimationHandle` 的唯一权威映射。
//!
//! ## 不变量
//!
//! - 同一个 id 任意时刻最多对应一个存活句柄
//! - 重复注册同一 id 时先取消旧句柄（后写者胜）
//! - 取消句柄时不持有注册表借用，句柄的取消逻辑可以重入控制器

use std::cell::RefCell;
use std::collections::HashMap;

use tracing::debug;

use crate::config::MotionConfig;
use crate::descriptor::AnimationDescriptor;
use crate::handle::AnimationHandle;
use crate::validator;

/// 动画控制器
#[derive(Debug, Default)]
pub struct AnimationController {
    entries: RefCell<HashMap<String, AnimationHandle>>,
    config: RefCell<MotionConfig>,
}

impl AnimationController {
    pub fn new(config: MotionConfig) -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
            config: RefCell::new(config),
        }
    }

    /// 注册句柄
    ///
    /// 提供描述符时先用当前配置校验；校验失败则不存放句柄。
    /// 句柄本身由调用方创建，失败时是否取消也由调用方决定。
    ///
    /// # 返回
    /// - `true`: 已存放（替换并取消了同 id 的旧句柄）
    /// - `false`: 校验未通过
    pub fn register(
        &self,
        id: &str,
        handle: AnimationHandle,
        descriptor: Option<&AnimationDescriptor>,
    ) -> bool {
        if let Some(descriptor) = descriptor
            && !validator::validate(descriptor, &self.config.borrow())
        {
            debug!(id, "注册被拒绝");
            return false;
        }

        let previous = self.entries.borrow_mut().remove(id);
        if let Some(previous) = previous
            && !previous.same_as(&handle)
        {
            debug!(id, "替换已注册的动画");
            previous.cancel();
        }

        // 旧句柄的取消逻辑可能重入并写入同一 id
        let stray = self.entries.borrow_mut().insert(id.to_string(), handle);
        if let Some(stray) = stray {
            stray.cancel();
        }
        debug!(id, count = self.count(), "注册动画");
        true
    }

    /// 取消并移除；id 不存在时无操作
    pub fn unregister(&self, id: &str) {
        let removed = self.entries.borrow_mut().remove(id);
        if let Some(handle) = removed {
            handle.cancel();
            debug!(id, "注销动画");
        }
    }

    /// 仅当注册表中的句柄就是 `handle` 时才取消并移除
    ///
    /// 绑定在析构时使用，避免误删同 id 的后继注册。
    pub fn unregister_handle(&self, id: &str, handle: &AnimationHandle) -> bool {
        let removed = {
            let mut entries = self.entries.borrow_mut();
            match entries.get(id) {
                Some(current) if current.same_as(handle) => entries.remove(id),
                _ => None,
            }
        };
        match removed {
            Some(handle) => {
                handle.cancel();
                debug!(id, "注销动画");
                true
            }
            None => false,
        }
    }

    /// 取消全部句柄并清空注册表
    ///
    /// # 返回
    /// 被取消的句柄数量
    pub fn kill_all(&self) -> usize {
        let drained: Vec<(String, AnimationHandle)> =
            self.entries.borrow_mut().drain().collect();
        for (_, handle) in &drained {
            handle.cancel();
        }
        if !drained.is_empty() {
            debug!(count = drained.len(), "取消全部动画");
        }
        drained.len()
    }

    /// 撤销全部句柄：取消并写回各自的结束状态，然后清空注册表
    ///
    /// 用于全局关闭动效；普通注销与拆除只取消。
    ///
    /// # 返回
    /// 被撤销的句柄数量
    pub fn revoke_all(&self) -> usize {
        let drained: Vec<(String, AnimationHandle)> =
            self.entries.borrow_mut().drain().collect();
        for (_, handle) in &drained {
            handle.revoke();
        }
        if !drained.is_empty() {
            debug!(count = drained.len(), "撤销全部动画");
        }
        drained.len()
    }

    pub fn has(&self, id: &str) -> bool {
        self.entries.borrow().contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<AnimationHandle> {
        self.entries.borrow().get(id).cloned()
    }

    pub fn count(&self) -> usize {
        self.entries.borrow().len()
    }

    /// 已注册的 id
    pub fn ids(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }

    /// 替换后续校验使用的配置；不会回溯校验已注册的句柄
    pub fn update_config(&self, config: MotionConfig) {
        *self.config.borrow_mut() = config;
    }

    pub fn config(&self) -> MotionConfig {
        self.config.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use crate::config::MotionConfigOverride;
    use crate::descriptor::{Property, PropertyMap};
    use crate::handle::Cancellable;
    use crate::platform::mock::{FlagHandle, MockElement};
    use crate::target::MotionTarget;

    fn fade() -> AnimationDescriptor {
        AnimationDescriptor::new("fade", PropertyMap::new().with(Property::Opacity, 1.0))
            .with_from(PropertyMap::new().with(Property::Opacity, 0.0))
            .with_duration(500)
    }

    #[test]
    fn test_register_valid_descriptor() {
        let controller = AnimationController::default();
        let flag = FlagHandle::new();

        assert!(controller.register("fade", AnimationHandle::new(flag.clone()), Some(&fade())));
        assert!(controller.has("fade"));
        assert_eq!(controller.count(), 1);
        assert!(flag.is_active());
    }

    #[test]
    fn test_register_declines_invalid_descriptor() {
        let controller = AnimationController::new(MotionConfig::merged(
            &MotionConfigOverride::default().with_max_offset_y(40.0),
        ));
        let desc = AnimationDescriptor::new("drop", PropertyMap::new().with(Property::OffsetY, 80.0));
        let flag = FlagHandle::new();

        assert!(!controller.register("drop", AnimationHandle::new(flag.clone()), Some(&desc)));
        assert_eq!(controller.count(), 0);
        // 拒绝时不替调用方取消
        assert_eq!(flag.cancel_count(), 0);
    }

    #[test]
    fn test_reregister_cancels_previous_once() {
        let controller = AnimationController::default();
        let first = FlagHandle::new();
        let second = FlagHandle::new();

        let before = controller.count();
        controller.register("a", AnimationHandle::new(first.clone()), None);
        controller.register("a", AnimationHandle::new(second.clone()), None);

        assert_eq!(first.cancel_count(), 1);
        assert_eq!(second.cancel_count(), 0);
        assert_eq!(controller.count(), before + 1);

        // 重复注册同一个句柄不会取消自己
        let handle = controller.get("a").unwrap();
        controller.register("a", handle, None);
        assert_eq!(second.cancel_count(), 0);
    }

    #[test]
    fn test_unregister() {
        let controller = AnimationController::default();
        let flag = FlagHandle::new();
        controller.register("a", AnimationHandle::new(flag.clone()), None);

        controller.unregister("a");
        assert!(!controller.has("a"));
        assert_eq!(flag.cancel_count(), 1);

        // 不存在的 id 无操作
        controller.unregister("a");
        controller.unregister("missing");
        assert_eq!(flag.cancel_count(), 1);
        assert_eq!(controller.count(), 0);
    }

    #[test]
    fn test_unregister_handle_checks_identity() {
        let controller = AnimationController::default();
        let old = AnimationHandle::new(FlagHandle::new());
        let new = AnimationHandle::new(FlagHandle::new());

        controller.register("a", old.clone(), None);
        controller.register("a", new.clone(), None);

        assert!(!controller.unregister_handle("a", &old));
        assert!(controller.has("a"));
        assert!(controller.unregister_handle("a", &new));
        assert!(!controller.has("a"));
    }

    #[test]
    fn test_kill_all_cancels_everything() {
        let controller = AnimationController::default();
        let flags: Vec<FlagHandle> = (0..5).map(|_| FlagHandle::new()).collect();
        for (i, flag) in flags.iter().enumerate() {
            controller.register(&format!("a{i}"), AnimationHandle::new(flag.clone()), None);
        }

        assert_eq!(controller.kill_all(), 5);
        assert_eq!(controller.count(), 0);
        assert!(flags.iter().all(|flag| !flag.is_active()));
        assert!(flags.iter().all(|flag| flag.cancel_count() == 1));
    }

    #[test]
    fn test_revoke_all_applies_final_states() {
        let controller = AnimationController::default();
        let element = Rc::new(MockElement::new("card"));
        element.set_property(Property::Opacity, 0.2);
        let flag = FlagHandle::new();
        controller.register(
            "fade",
            AnimationHandle::new(flag.clone())
                .with_final_state(element.clone(), PropertyMap::new().with(Property::Opacity, 1.0)),
            None,
        );
        controller.register("bare", AnimationHandle::new(FlagHandle::new()), None);

        assert_eq!(controller.revoke_all(), 2);
        assert_eq!(controller.count(), 0);
        assert_eq!(flag.cancel_count(), 1);
        assert_eq!(element.value(Property::Opacity), 1.0);
    }

    /// 取消时重入控制器
    struct Reentrant {
        controller: Rc<AnimationController>,
        flag: FlagHandle,
    }

    impl Cancellable for Reentrant {
        fn cancel(&self) {
            self.flag.cancel();
            self.controller.kill_all();
            self.controller.register("late", AnimationHandle::new(FlagHandle::new()), None);
        }

        fn is_active(&self) -> bool {
            self.flag.is_active()
        }
    }

    #[test]
    fn test_kill_all_is_reentrant() {
        let controller = Rc::new(AnimationController::default());
        let flag = FlagHandle::new();
        controller.register(
            "a",
            AnimationHandle::new(Reentrant {
                controller: controller.clone(),
                flag: flag.clone(),
            }),
            None,
        );
        controller.register("b", AnimationHandle::new(FlagHandle::new()), None);

        controller.kill_all();
        assert!(!flag.is_active());
        // 回调中注册的动画保留下来
        assert!(controller.has("late"));
    }

    #[test]
    fn test_update_config_is_not_retroactive() {
        let controller = AnimationController::default();
        controller.register("fade", AnimationHandle::new(FlagHandle::new()), Some(&fade()));

        controller.update_config(MotionConfig::merged(
            &MotionConfigOverride::default().with_timing(100, 300),
        ));
        assert!(controller.has("fade"));
        assert!(!controller.register("again", AnimationHandle::new(FlagHandle::new()), Some(&fade())));
    }
}
