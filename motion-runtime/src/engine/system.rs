//! # System 模块
//!
//! 补间引擎：持有所有存活补间的弱引用，按帧统一推进。
//!
//! 补间的所有权属于句柄（注册表或视口协调器），
//! 引擎只负责推进；句柄被丢弃或补间被取消后，下一次 `update` 会把它清理掉。

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use super::AnimationFactory;
use super::tween::{Tween, TweenHandle, TweenState};
use crate::descriptor::AnimationDescriptor;
use crate::handle::Playback;
use crate::platform::FrameClock;
use crate::target::MotionTarget;

/// 补间引擎
pub struct TweenEngine {
    tweens: RefCell<Vec<Weak<RefCell<Tween>>>>,
    /// 是否已挂到帧时钟上
    driving: Cell<bool>,
}

impl Default for TweenEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TweenEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TweenEngine")
            .field("tweens", &self.tweens.borrow().len())
            .field("driving", &self.driving.get())
            .finish()
    }
}

impl TweenEngine {
    pub fn new() -> Self {
        Self {
            tweens: RefCell::new(Vec::new()),
            driving: Cell::new(false),
        }
    }

    /// 创建补间（暂停状态）并纳入引擎管理
    pub fn create_tween(
        &self,
        target: Rc<dyn MotionTarget>,
        descriptor: &AnimationDescriptor,
    ) -> TweenHandle {
        let handle = TweenHandle::new(Tween::new(target, descriptor));
        self.tweens.borrow_mut().push(handle.downgrade());
        debug!(id = %descriptor.id, "创建补间");
        handle
    }

    /// 创建补间并立即开始播放
    pub fn start(
        &self,
        target: Rc<dyn MotionTarget>,
        descriptor: &AnimationDescriptor,
    ) -> TweenHandle {
        let handle = self.create_tween(target, descriptor);
        handle.play();
        handle
    }

    /// 推进所有正在播放的补间
    ///
    /// 推进期间不持有引擎内部借用，目标在写入回调中创建新补间是安全的。
    pub fn update(&self, dt_ms: f32) {
        let live: Vec<Rc<RefCell<Tween>>> = {
            let mut tweens = self.tweens.borrow_mut();
            tweens.retain(|weak| match weak.upgrade() {
                Some(tween) => {
                    let state = tween.borrow().state();
                    state != TweenState::Cancelled
                }
                None => false,
            });
            tweens.iter().filter_map(Weak::upgrade).collect()
        };

        for cell in live {
            let mut tween = cell.borrow_mut();
            if tween.state().is_running() {
                tween.update(dt_ms);
            }
        }
    }

    /// 正在播放（含延迟等待）的补间数量
    pub fn active_count(&self) -> usize {
        self.tweens
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|tween| tween.borrow().state().is_running())
            .count()
    }

    /// 引擎仍在跟踪的补间数量（含暂停和已完成的）
    pub fn tracked_count(&self) -> usize {
        self.tweens
            .borrow()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// 挂到帧时钟上，每帧以两帧时间差调用 [`update`](Self::update)
    ///
    /// 重复调用无副作用；引擎被丢弃后帧循环自然结束。
    pub fn drive(self: &Rc<Self>, clock: Rc<dyn FrameClock>) {
        if self.driving.replace(true) {
            return;
        }
        schedule(Rc::downgrade(self), clock.clone(), clock.now_ms());
    }
}

fn schedule(engine: Weak<TweenEngine>, clock: Rc<dyn FrameClock>, last_ms: f64) {
    let next = clock.clone();
    clock.request_frame(Box::new(move |now_ms| {
        let Some(engine) = engine.upgrade() else {
            return;
        };
        let dt = (now_ms - last_ms).max(0.0) as f32;
        trace!(dt, "补间帧");
        engine.update(dt);
        schedule(Rc::downgrade(&engine), next, now_ms);
    }));
}

impl AnimationFactory for TweenEngine {
    fn create(
        &self,
        target: Rc<dyn MotionTarget>,
        descriptor: &AnimationDescriptor,
    ) -> Rc<dyn Playback> {
        Rc::new(self.create_tween(target, descriptor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Property, PropertyMap};
    use crate::easing::EasingFunction;
    use crate::handle::Cancellable;
    use crate::platform::mock::{ManualFrameClock, MockElement};

    fn slide(id: &str) -> AnimationDescriptor {
        AnimationDescriptor::new(id, PropertyMap::new().with(Property::OffsetX, 100.0))
            .with_from(PropertyMap::new().with(Property::OffsetX, 0.0))
            .with_duration(200)
            .with_easing(EasingFunction::Linear)
    }

    #[test]
    fn test_engine_advances_started_tweens() {
        let engine = TweenEngine::new();
        let element = Rc::new(MockElement::new("box"));

        let handle = engine.start(element.clone(), &slide("a"));
        assert_eq!(engine.active_count(), 1);

        engine.update(100.0);
        assert!((element.value(Property::OffsetX) - 50.0).abs() < 1e-4);

        engine.update(100.0);
        assert_eq!(element.value(Property::OffsetX), 100.0);
        assert_eq!(handle.state(), TweenState::Completed);
        assert_eq!(engine.active_count(), 0);
    }

    #[test]
    fn test_created_tween_waits_for_play() {
        let engine = TweenEngine::new();
        let element = Rc::new(MockElement::new("box"));

        let playback = engine.create(element.clone(), &slide("a"));
        engine.update(100.0);
        assert!(!element.was_written(Property::OffsetX));

        playback.play();
        engine.update(100.0);
        assert!((playback.progress() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_dropped_and_cancelled_tweens_are_pruned() {
        let engine = TweenEngine::new();
        let element = Rc::new(MockElement::new("box"));

        let kept = engine.start(element.clone(), &slide("kept"));
        let cancelled = engine.start(element.clone(), &slide("cancelled"));
        drop(engine.start(element.clone(), &slide("dropped")));
        assert_eq!(engine.tracked_count(), 2);

        cancelled.cancel();
        engine.update(16.0);
        assert_eq!(engine.tweens.borrow().len(), 1);
        assert!(kept.is_active());
    }

    #[test]
    fn test_drive_from_frame_clock() {
        let engine = Rc::new(TweenEngine::new());
        let clock = Rc::new(ManualFrameClock::new());
        let element = Rc::new(MockElement::new("box"));

        engine.drive(clock.clone());
        engine.drive(clock.clone());
        assert_eq!(clock.pending_count(), 1);

        let _handle = engine.start(element.clone(), &slide("a"));
        clock.advance(50.0);
        clock.advance(50.0);
        assert!((element.value(Property::OffsetX) - 50.0).abs() < 1e-4);

        drop(engine);
        clock.advance(50.0);
        assert_eq!(clock.pending_count(), 0);
    }
}
