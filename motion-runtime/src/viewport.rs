//! # Viewport 模块
//!
//! 滚动触发协调器：把动画进度绑定到滚动位置而不是时间。
//!
//! ## 播放模式
//!
//! - 离散：跨越起点 / 终点时执行 [`ToggleActions`] 中对应的动作，
//!   动画本身按正常时长与缓动播放
//! - 擦洗：进度是滚动位置在 `[start, end]` 区间内的线性函数，
//!   向上滚动精确倒放；缓动强制为线性
//!
//! 固定（pin）模式下，元素只在区间内保持固定，到达终点即恢复正常布局。
//!
//! 滚动订阅只持有触发器的弱引用；触发器由协调器独占。

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::descriptor::{
    AnimationDescriptor, PropertyMap, ScrollOptions, ScrollPosition, ToggleAction,
};
use crate::easing::EasingFunction;
use crate::engine::AnimationFactory;
use crate::fallback;
use crate::handle::Playback;
use crate::platform::{ScrollObserver, SubscriptionId};
use crate::target::{ElementLayout, MotionTarget};

/// 滚动位置相对触发区间的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// 尚未到达起点
    Before,
    /// 位于区间内
    Active,
    /// 已越过终点
    After,
}

/// 触发区间（文档滚动偏移，px）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollRange {
    pub start: f32,
    pub end: f32,
}

impl ScrollRange {
    /// 按元素布局与视口高度计算区间；终点不早于起点
    pub fn compute(layout: ElementLayout, viewport_height: f32, options: &ScrollOptions) -> Self {
        let anchor = |position: ScrollPosition| {
            layout.top + layout.height * position.element - viewport_height * position.viewport
        };
        let start = anchor(options.start);
        let end = anchor(options.end).max(start);
        Self { start, end }
    }

    /// 线性进度（0.0 - 1.0）
    pub fn progress(&self, offset: f32) -> f32 {
        let length = self.end - self.start;
        if length <= 0.0 {
            return if offset >= self.end { 1.0 } else { 0.0 };
        }
        ((offset - self.start) / length).clamp(0.0, 1.0)
    }

    pub fn region(&self, offset: f32) -> Region {
        if offset < self.start {
            Region::Before
        } else if offset >= self.end {
            Region::After
        } else {
            Region::Active
        }
    }
}

fn perform(playback: &dyn Playback, action: ToggleAction) {
    match action {
        ToggleAction::Play => playback.play(),
        ToggleAction::Pause => playback.pause(),
        ToggleAction::Resume => playback.resume(),
        ToggleAction::Reverse => playback.reverse(),
        ToggleAction::Restart => playback.restart(),
        ToggleAction::Reset => playback.reset(),
        ToggleAction::Complete => playback.complete(),
        ToggleAction::None => {}
    }
}

struct TriggerState {
    id: String,
    /// 被动画写入的元素
    target: Rc<dyn MotionTarget>,
    /// 决定区间与固定的元素
    anchor: Rc<dyn MotionTarget>,
    /// 撤销时写回的结束状态
    final_state: RefCell<PropertyMap>,
    playback: Rc<dyn Playback>,
    options: ScrollOptions,
    range: Cell<ScrollRange>,
    /// 首次同步前为 `None`
    region: Cell<Option<Region>>,
    pinned: Cell<bool>,
    subscription: Cell<Option<SubscriptionId>>,
    disposed: Cell<bool>,
}

impl TriggerState {
    fn sync(&self, offset: f32) {
        if self.disposed.get() {
            return;
        }
        let range = self.range.get();
        let region = range.region(offset);
        let previous = self.region.replace(Some(region));
        trace!(id = %self.id, offset, ?region, "滚动同步");

        if self.options.scrub {
            self.playback.seek(range.progress(offset));
        } else {
            self.toggle(previous.unwrap_or(Region::Before), region);
        }

        if self.options.pin {
            self.set_pinned(region == Region::Active);
        }
    }

    fn toggle(&self, from: Region, to: Region) {
        let actions = self.options.toggle_actions;
        let steps = match (from, to) {
            (Region::Before, Region::Active) => vec![actions.on_enter],
            (Region::Active, Region::After) => vec![actions.on_leave],
            (Region::Before, Region::After) => vec![actions.on_enter, actions.on_leave],
            (Region::After, Region::Active) => vec![actions.on_enter_back],
            (Region::Active, Region::Before) => vec![actions.on_leave_back],
            (Region::After, Region::Before) => vec![actions.on_enter_back, actions.on_leave_back],
            _ => Vec::new(),
        };
        for action in steps {
            debug!(id = %self.id, %action, "滚动边界动作");
            perform(self.playback.as_ref(), action);
        }
    }

    fn set_pinned(&self, pinned: bool) {
        if self.pinned.replace(pinned) != pinned {
            self.anchor.set_pinned(pinned);
        }
    }
}

/// 滚动触发器的只读视图
#[derive(Clone)]
pub struct ScrollTrigger {
    state: Rc<TriggerState>,
}

impl ScrollTrigger {
    pub fn id(&self) -> &str {
        &self.state.id
    }

    /// 动画的线性进度
    pub fn progress(&self) -> f32 {
        self.state.playback.progress()
    }

    pub fn range(&self) -> ScrollRange {
        self.state.range.get()
    }

    /// 最近一次同步时所在的区域
    pub fn region(&self) -> Option<Region> {
        self.state.region.get()
    }

    pub fn is_pinned(&self) -> bool {
        self.state.pinned.get()
    }

    pub fn is_scrubbed(&self) -> bool {
        self.state.options.scrub
    }

    /// 触发器是否仍挂在协调器上
    pub fn is_active(&self) -> bool {
        !self.state.disposed.get()
    }

    /// 被驱动的动画
    pub fn playback(&self) -> Rc<dyn Playback> {
        self.state.playback.clone()
    }

    /// 是否与另一个视图指向同一个触发器
    pub fn same_as(&self, other: &ScrollTrigger) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    /// 替换撤销时写回的结束状态（默认为创建时描述符的 `to`）
    pub(crate) fn set_final_state(&self, to: PropertyMap) {
        *self.state.final_state.borrow_mut() = to;
    }
}

impl fmt::Debug for ScrollTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrollTrigger")
            .field("id", &self.state.id)
            .field("range", &self.state.range.get())
            .field("region", &self.state.region.get())
            .field("scrub", &self.state.options.scrub)
            .field("pinned", &self.state.pinned.get())
            .finish()
    }
}

/// 滚动触发协调器
pub struct ViewportCoordinator {
    scroll: Rc<dyn ScrollObserver>,
    triggers: RefCell<HashMap<String, Rc<TriggerState>>>,
}

impl fmt::Debug for ViewportCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewportCoordinator")
            .field("triggers", &self.triggers.borrow().len())
            .finish()
    }
}

impl ViewportCoordinator {
    pub fn new(scroll: Rc<dyn ScrollObserver>) -> Self {
        Self {
            scroll,
            triggers: RefCell::new(HashMap::new()),
        }
    }

    /// 创建滚动触发器，区间与固定都以动画目标本身为准
    ///
    /// # 返回
    /// - `Some(trigger)`: 已创建（替换同 id 的旧触发器）
    /// - `None`: 元素未挂载或无法测量，已记录日志
    pub fn create_trigger(
        &self,
        id: &str,
        element: Rc<dyn MotionTarget>,
        descriptor: &AnimationDescriptor,
        factory: &dyn AnimationFactory,
    ) -> Option<ScrollTrigger> {
        self.create_anchored_trigger(id, element.clone(), element, descriptor, factory)
    }

    /// 创建滚动触发器，区间与固定以 `anchor` 为准，动画写入 `target`
    pub fn create_anchored_trigger(
        &self,
        id: &str,
        target: Rc<dyn MotionTarget>,
        anchor: Rc<dyn MotionTarget>,
        descriptor: &AnimationDescriptor,
        factory: &dyn AnimationFactory,
    ) -> Option<ScrollTrigger> {
        if !target.is_attached() || !anchor.is_attached() {
            warn!(id, target = target.target_id(), "元素未挂载，跳过滚动触发器");
            return None;
        }
        let Some(layout) = anchor.layout() else {
            warn!(id, anchor = anchor.target_id(), "无法测量触发元素，跳过滚动触发器");
            return None;
        };

        let options = descriptor.scroll_options();
        let mut animated = descriptor.clone();
        if options.scrub {
            animated.easing = Some(EasingFunction::Linear);
        }
        let playback = factory.create(target.clone(), &animated);
        let range = ScrollRange::compute(layout, self.scroll.viewport_height(), &options);

        let state = Rc::new(TriggerState {
            id: id.to_string(),
            target,
            anchor,
            final_state: RefCell::new(descriptor.to.clone()),
            playback,
            options,
            range: Cell::new(range),
            region: Cell::new(None),
            pinned: Cell::new(false),
            subscription: Cell::new(None),
            disposed: Cell::new(false),
        });

        let weak = Rc::downgrade(&state);
        let subscription = self.scroll.observe(Box::new(move |offset| {
            if let Some(state) = weak.upgrade() {
                state.sync(offset);
            }
        }));
        state.subscription.set(Some(subscription));

        let previous = self
            .triggers
            .borrow_mut()
            .insert(id.to_string(), state.clone());
        if let Some(previous) = previous {
            debug!(id, "替换已存在的滚动触发器");
            self.dispose(&previous);
        }

        debug!(id, start = range.start, end = range.end, scrub = state.options.scrub, "创建滚动触发器");
        state.sync(self.scroll.scroll_offset());
        Some(ScrollTrigger { state })
    }

    fn dispose(&self, state: &TriggerState) {
        if state.disposed.replace(true) {
            return;
        }
        if let Some(subscription) = state.subscription.take() {
            self.scroll.unobserve(subscription);
        }
        if state.pinned.replace(false) {
            state.anchor.set_pinned(false);
        }
        state.playback.cancel();
    }

    /// 移除并销毁；id 不存在时无操作
    pub fn remove_trigger(&self, id: &str) -> bool {
        let removed = self.triggers.borrow_mut().remove(id);
        match removed {
            Some(state) => {
                self.dispose(&state);
                debug!(id, "移除滚动触发器");
                true
            }
            None => false,
        }
    }

    /// 仅当 id 对应的就是 `trigger` 时才移除
    pub fn remove_exact(&self, trigger: &ScrollTrigger) -> bool {
        let removed = {
            let mut triggers = self.triggers.borrow_mut();
            match triggers.get(trigger.id()) {
                Some(state) if Rc::ptr_eq(state, &trigger.state) => triggers.remove(trigger.id()),
                _ => None,
            }
        };
        match removed {
            Some(state) => {
                self.dispose(&state);
                debug!(id = %state.id, "移除滚动触发器");
                true
            }
            None => false,
        }
    }

    /// 销毁全部触发器
    ///
    /// # 返回
    /// 被销毁的数量
    pub fn kill_all(&self) -> usize {
        let drained: Vec<Rc<TriggerState>> =
            self.triggers.borrow_mut().drain().map(|(_, state)| state).collect();
        for state in &drained {
            self.dispose(state);
        }
        if !drained.is_empty() {
            debug!(count = drained.len(), "销毁全部滚动触发器");
        }
        drained.len()
    }

    /// 撤销全部触发器：销毁后把动画元素写成结束状态
    ///
    /// 用于全局关闭动效；固定会先被解除。
    ///
    /// # 返回
    /// 被撤销的数量
    pub fn revoke_all(&self) -> usize {
        let drained: Vec<Rc<TriggerState>> =
            self.triggers.borrow_mut().drain().map(|(_, state)| state).collect();
        for state in &drained {
            self.dispose(state);
            let to = state.final_state.borrow().clone();
            fallback::apply_final_state(state.target.as_ref(), &to);
        }
        if !drained.is_empty() {
            debug!(count = drained.len(), "撤销全部滚动触发器");
        }
        drained.len()
    }

    /// 布局变化后重新计算所有区间
    ///
    /// 元素已卸载或无法测量的触发器会被移除。
    ///
    /// # 返回
    /// 被移除的数量
    pub fn refresh_all(&self) -> usize {
        let states: Vec<Rc<TriggerState>> = self.triggers.borrow().values().cloned().collect();
        let viewport_height = self.scroll.viewport_height();
        let offset = self.scroll.scroll_offset();
        let mut dropped = 0;

        for state in states {
            let layout = state
                .anchor
                .layout()
                .filter(|_| state.anchor.is_attached());
            let Some(layout) = layout else {
                warn!(id = %state.id, "触发元素已卸载，移除滚动触发器");
                let removed = {
                    let mut triggers = self.triggers.borrow_mut();
                    match triggers.get(&state.id) {
                        Some(current) if Rc::ptr_eq(current, &state) => triggers.remove(&state.id),
                        _ => None,
                    }
                };
                if removed.is_some() {
                    dropped += 1;
                }
                self.dispose(&state);
                continue;
            };

            state
                .range
                .set(ScrollRange::compute(layout, viewport_height, &state.options));
            state.sync(offset);
        }

        debug!(dropped, remaining = self.count(), "刷新滚动触发器");
        dropped
    }

    pub fn has(&self, id: &str) -> bool {
        self.triggers.borrow().contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<ScrollTrigger> {
        self.triggers
            .borrow()
            .get(id)
            .map(|state| ScrollTrigger {
                state: state.clone(),
            })
    }

    pub fn count(&self) -> usize {
        self.triggers.borrow().len()
    }
}

impl Drop for ViewportCoordinator {
    fn drop(&mut self) {
        self.kill_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Property, PropertyMap, ToggleActions};
    use crate::engine::TweenEngine;
    use crate::handle::Cancellable;
    use crate::platform::mock::{MockElement, MockScrollObserver};

    /// 元素位于 2000px，高 400px；视口高 1000px
    /// 默认区间：起点 2000 - 800 = 1200，终点 2400 - 200 = 2200
    fn setup() -> (Rc<MockScrollObserver>, ViewportCoordinator, Rc<MockElement>, TweenEngine) {
        let scroll = Rc::new(MockScrollObserver::new(1000.0));
        let coordinator = ViewportCoordinator::new(scroll.clone());
        let element = Rc::new(MockElement::at("hero", 2000.0, 400.0));
        (scroll, coordinator, element, TweenEngine::new())
    }

    fn rise(scroll: ScrollOptions) -> AnimationDescriptor {
        AnimationDescriptor::new("rise", PropertyMap::new().with(Property::OffsetY, 0.0))
            .with_from(PropertyMap::new().with(Property::OffsetY, 40.0))
            .with_duration(400)
            .with_scroll(scroll)
    }

    fn scrubbed() -> ScrollOptions {
        ScrollOptions {
            scrub: true,
            ..ScrollOptions::default()
        }
    }

    #[test]
    fn test_range_and_regions() {
        let range = ScrollRange::compute(
            ElementLayout::new(2000.0, 400.0),
            1000.0,
            &ScrollOptions::default(),
        );
        assert_eq!(range, ScrollRange { start: 1200.0, end: 2200.0 });
        assert_eq!(range.region(1199.0), Region::Before);
        assert_eq!(range.region(1200.0), Region::Active);
        assert_eq!(range.region(2200.0), Region::After);
        assert_eq!(range.progress(1700.0), 0.5);
    }

    #[test]
    fn test_inverted_anchors_collapse() {
        let options = ScrollOptions {
            start: "bottom top".parse().unwrap(),
            end: "top bottom".parse().unwrap(),
            ..ScrollOptions::default()
        };
        let range = ScrollRange::compute(ElementLayout::new(2000.0, 400.0), 1000.0, &options);
        assert_eq!(range.start, range.end);
        assert_eq!(range.progress(range.start - 1.0), 0.0);
        assert_eq!(range.progress(range.end), 1.0);
    }

    #[test]
    fn test_detached_element_returns_none() {
        let (scroll, coordinator, _, engine) = setup();
        let element = Rc::new(MockElement::detached("gone"));

        let trigger = coordinator.create_trigger("a", element, &rise(scrubbed()), &engine);
        assert!(trigger.is_none());
        assert_eq!(coordinator.count(), 0);
        assert_eq!(scroll.observer_count(), 0);
    }

    #[test]
    fn test_scrub_follows_scroll_both_ways() {
        let (scroll, coordinator, element, engine) = setup();
        let trigger = coordinator
            .create_trigger("a", element.clone(), &rise(scrubbed()), &engine)
            .unwrap();
        assert_eq!(trigger.progress(), 0.0);

        scroll.scroll_to(1700.0);
        assert_eq!(trigger.progress(), 0.5);
        // 擦洗模式强制线性
        assert!((element.value(Property::OffsetY) - 20.0).abs() < 1e-4);

        scroll.scroll_to(3000.0);
        assert_eq!(trigger.progress(), 1.0);
        assert_eq!(element.value(Property::OffsetY), 0.0);

        scroll.scroll_to(1450.0);
        assert_eq!(trigger.progress(), 0.25);
        assert!((element.value(Property::OffsetY) - 30.0).abs() < 1e-4);
    }

    #[test]
    fn test_discrete_plays_once_on_enter() {
        let (scroll, coordinator, element, engine) = setup();
        let trigger = coordinator
            .create_trigger("a", element.clone(), &rise(ScrollOptions::default()), &engine)
            .unwrap();
        let playback = trigger.playback();

        scroll.scroll_to(500.0);
        engine.update(100.0);
        assert_eq!(playback.progress(), 0.0);

        scroll.scroll_to(1300.0);
        engine.update(400.0);
        assert_eq!(playback.progress(), 1.0);

        // 默认 "play none none none"：往回滚不会倒放，也不会重播
        scroll.scroll_to(0.0);
        engine.update(400.0);
        assert_eq!(playback.progress(), 1.0);
        scroll.scroll_to(1300.0);
        assert_eq!(playback.progress(), 1.0);
    }

    #[test]
    fn test_toggle_reverse_on_leave_back() {
        let (scroll, coordinator, element, engine) = setup();
        let options = ScrollOptions {
            toggle_actions: "play none none reverse".parse::<ToggleActions>().unwrap(),
            ..ScrollOptions::default()
        };
        let trigger = coordinator
            .create_trigger("a", element.clone(), &rise(options), &engine)
            .unwrap();
        let playback = trigger.playback();

        scroll.scroll_to(1300.0);
        engine.update(400.0);
        assert_eq!(playback.progress(), 1.0);

        scroll.scroll_to(1000.0);
        engine.update(400.0);
        assert_eq!(playback.progress(), 0.0);
    }

    #[test]
    fn test_created_past_start_plays_immediately() {
        let (scroll, coordinator, element, engine) = setup();
        scroll.scroll_to(1500.0);

        let trigger = coordinator
            .create_trigger("a", element, &rise(ScrollOptions::default()), &engine)
            .unwrap();
        assert_eq!(trigger.region(), Some(Region::Active));
        engine.update(400.0);
        assert_eq!(trigger.progress(), 1.0);
    }

    #[test]
    fn test_pin_only_inside_range() {
        let (scroll, coordinator, element, engine) = setup();
        let options = ScrollOptions {
            scrub: true,
            pin: true,
            ..ScrollOptions::default()
        };
        let trigger = coordinator
            .create_trigger("a", element.clone(), &rise(options), &engine)
            .unwrap();
        assert!(!element.is_pinned());

        scroll.scroll_to(1200.0);
        assert!(element.is_pinned());
        assert!(trigger.is_pinned());

        scroll.scroll_to(2199.0);
        assert!(element.is_pinned());

        // 恰好在终点释放
        scroll.scroll_to(2200.0);
        assert!(!element.is_pinned());

        scroll.scroll_to(1800.0);
        assert!(element.is_pinned());
        assert_eq!(element.pin_changes(), 3);
    }

    #[test]
    fn test_remove_and_kill_all() {
        let (scroll, coordinator, element, engine) = setup();
        let options = ScrollOptions {
            scrub: true,
            pin: true,
            ..ScrollOptions::default()
        };
        let a = coordinator
            .create_trigger("a", element.clone(), &rise(options), &engine)
            .unwrap();
        let other = Rc::new(MockElement::at("other", 3000.0, 200.0));
        let b = coordinator
            .create_trigger("b", other, &rise(scrubbed()), &engine)
            .unwrap();
        scroll.scroll_to(1500.0);
        assert_eq!(scroll.observer_count(), 2);

        assert!(coordinator.remove_trigger("a"));
        assert!(!coordinator.remove_trigger("a"));
        assert!(!a.is_active());
        assert!(!a.playback().is_active());
        // 移除时恢复布局
        assert!(!element.is_pinned());

        assert_eq!(coordinator.kill_all(), 1);
        assert!(!b.is_active());
        assert_eq!(coordinator.count(), 0);
        assert_eq!(scroll.observer_count(), 0);
    }

    #[test]
    fn test_revoke_all_unpins_and_writes_final_state() {
        let (scroll, coordinator, element, engine) = setup();
        let options = ScrollOptions {
            scrub: true,
            pin: true,
            ..ScrollOptions::default()
        };
        let trigger = coordinator
            .create_trigger("a", element.clone(), &rise(options), &engine)
            .unwrap();
        scroll.scroll_to(1700.0);
        assert!((element.value(Property::OffsetY) - 20.0).abs() < 1e-4);
        assert!(element.is_pinned());

        assert_eq!(coordinator.revoke_all(), 1);
        assert!(!trigger.is_active());
        assert!(!element.is_pinned());
        assert_eq!(element.value(Property::OffsetY), 0.0);
        assert_eq!(scroll.observer_count(), 0);

        // 之后的滚动不再写入
        scroll.scroll_to(1300.0);
        assert_eq!(element.value(Property::OffsetY), 0.0);
    }

    #[test]
    fn test_kill_all_leaves_current_values() {
        let (scroll, coordinator, element, engine) = setup();
        coordinator
            .create_trigger("a", element.clone(), &rise(scrubbed()), &engine)
            .unwrap();
        scroll.scroll_to(1700.0);

        coordinator.kill_all();
        assert!((element.value(Property::OffsetY) - 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_same_id_replaces_trigger() {
        let (scroll, coordinator, element, engine) = setup();
        let first = coordinator
            .create_trigger("a", element.clone(), &rise(scrubbed()), &engine)
            .unwrap();
        let second = coordinator
            .create_trigger("a", element.clone(), &rise(scrubbed()), &engine)
            .unwrap();

        assert!(!first.is_active());
        assert!(second.is_active());
        assert_eq!(coordinator.count(), 1);
        assert_eq!(scroll.observer_count(), 1);

        // 旧视图不能移除新触发器
        assert!(!coordinator.remove_exact(&first));
        assert!(coordinator.remove_exact(&second));
    }

    #[test]
    fn test_refresh_all_recomputes_and_drops_detached() {
        let (scroll, coordinator, element, engine) = setup();
        let trigger = coordinator
            .create_trigger("a", element.clone(), &rise(scrubbed()), &engine)
            .unwrap();
        let gone = Rc::new(MockElement::at("gone", 500.0, 100.0));
        coordinator
            .create_trigger("b", gone.clone(), &rise(scrubbed()), &engine)
            .unwrap();

        element.move_to(3000.0, 400.0);
        gone.detach();
        scroll.scroll_to(2700.0);

        assert_eq!(coordinator.refresh_all(), 1);
        assert!(!coordinator.has("b"));
        assert_eq!(trigger.range(), ScrollRange { start: 2200.0, end: 3200.0 });
        assert_eq!(trigger.progress(), 0.5);
        assert_eq!(scroll.observer_count(), 1);
    }
}
