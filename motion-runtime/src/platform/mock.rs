//! # Mock 平台
//!
//! 测试用的平台原语实现，不依赖浏览器或真实窗口。
//!
//! 事件（帧、resize、偏好变化、滚动）全部由测试代码手动推进，
//! 派发时不持有内部借用，监听器可以在回调中安全地订阅或退订。

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use super::{
    FrameCallback, FrameClock, FrameRequestId, Platform, PreferenceWatcher, ScrollObserver,
    SubscriptionId, ViewportWatcher,
};
use crate::descriptor::Property;
use crate::handle::Cancellable;
use crate::target::{ElementLayout, MotionTarget};

/// 监听器集合
struct ListenerSet<A> {
    next_id: Cell<u64>,
    listeners: RefCell<Vec<(SubscriptionId, Box<dyn FnMut(A)>)>>,
    removed: RefCell<Vec<SubscriptionId>>,
}

impl<A: Copy> ListenerSet<A> {
    fn new() -> Self {
        Self {
            next_id: Cell::new(1),
            listeners: RefCell::new(Vec::new()),
            removed: RefCell::new(Vec::new()),
        }
    }

    fn add(&self, listener: Box<dyn FnMut(A)>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, listener));
        id
    }

    fn remove(&self, id: SubscriptionId) {
        self.listeners.borrow_mut().retain(|(sid, _)| *sid != id);
        self.removed.borrow_mut().push(id);
    }

    fn is_removed(&self, id: SubscriptionId) -> bool {
        self.removed.borrow().contains(&id)
    }

    fn emit(&self, arg: A) {
        let mut current = std::mem::take(&mut *self.listeners.borrow_mut());
        for (id, listener) in current.iter_mut() {
            if !self.is_removed(*id) {
                listener(arg);
            }
        }

        // 派发期间新增的监听器排在后面
        let mut listeners = self.listeners.borrow_mut();
        let added = std::mem::take(&mut *listeners);
        *listeners = current
            .into_iter()
            .filter(|(id, _)| !self.is_removed(*id))
            .chain(added)
            .collect();
    }

    fn len(&self) -> usize {
        self.listeners.borrow().len()
    }
}

/// 手动推进的帧时钟
pub struct ManualFrameClock {
    now: Cell<f64>,
    next_id: Cell<u64>,
    pending: RefCell<Vec<(FrameRequestId, FrameCallback)>>,
}

impl ManualFrameClock {
    pub fn new() -> Self {
        Self {
            now: Cell::new(0.0),
            next_id: Cell::new(1),
            pending: RefCell::new(Vec::new()),
        }
    }

    /// 时间前进 `ms` 毫秒并触发一帧
    ///
    /// 回调中新请求的帧会在下一次 `advance` 时触发。
    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
        let due = std::mem::take(&mut *self.pending.borrow_mut());
        let now = self.now.get();
        for (_, callback) in due {
            callback(now);
        }
    }

    /// 以固定帧率推进 `seconds` 秒
    pub fn run_at_fps(&self, fps: f64, seconds: f64) {
        let frames = (fps * seconds).round() as u64;
        let frame_ms = 1000.0 / fps;
        for _ in 0..frames {
            self.advance(frame_ms);
        }
    }

    /// 尚未触发的帧请求数量
    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }
}

impl Default for ManualFrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock for ManualFrameClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }

    fn request_frame(&self, callback: FrameCallback) -> FrameRequestId {
        let id = FrameRequestId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.pending.borrow_mut().push((id, callback));
        id
    }

    fn cancel_frame(&self, id: FrameRequestId) {
        self.pending.borrow_mut().retain(|(rid, _)| *rid != id);
    }
}

/// 可手动 resize 的视口
pub struct MockViewport {
    width: Cell<Option<f32>>,
    listeners: ListenerSet<f32>,
}

impl MockViewport {
    pub fn new(width: Option<f32>) -> Self {
        Self {
            width: Cell::new(width),
            listeners: ListenerSet::new(),
        }
    }

    /// 修改宽度并通知监听器
    pub fn resize(&self, width: f32) {
        self.width.set(Some(width));
        self.listeners.emit(width);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl ViewportWatcher for MockViewport {
    fn width(&self) -> Option<f32> {
        self.width.get()
    }

    fn on_resize(&self, listener: Box<dyn FnMut(f32)>) -> SubscriptionId {
        self.listeners.add(listener)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.remove(id);
    }
}

/// 可手动切换的无障碍偏好
pub struct MockPreferences {
    reduced: Cell<bool>,
    listeners: ListenerSet<bool>,
}

impl MockPreferences {
    pub fn new(reduced: bool) -> Self {
        Self {
            reduced: Cell::new(reduced),
            listeners: ListenerSet::new(),
        }
    }

    /// 修改偏好并通知监听器
    pub fn set_reduced_motion(&self, reduced: bool) {
        self.reduced.set(reduced);
        self.listeners.emit(reduced);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl PreferenceWatcher for MockPreferences {
    fn prefers_reduced_motion(&self) -> bool {
        self.reduced.get()
    }

    fn on_change(&self, listener: Box<dyn FnMut(bool)>) -> SubscriptionId {
        self.listeners.add(listener)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.remove(id);
    }
}

/// 可手动滚动的文档
pub struct MockScrollObserver {
    offset: Cell<f32>,
    viewport_height: Cell<f32>,
    listeners: ListenerSet<f32>,
}

impl MockScrollObserver {
    pub fn new(viewport_height: f32) -> Self {
        Self {
            offset: Cell::new(0.0),
            viewport_height: Cell::new(viewport_height),
            listeners: ListenerSet::new(),
        }
    }

    /// 滚动到 `offset` 并通知观察者
    pub fn scroll_to(&self, offset: f32) {
        self.offset.set(offset);
        self.listeners.emit(offset);
    }

    pub fn observer_count(&self) -> usize {
        self.listeners.len()
    }
}

impl ScrollObserver for MockScrollObserver {
    fn scroll_offset(&self) -> f32 {
        self.offset.get()
    }

    fn viewport_height(&self) -> f32 {
        self.viewport_height.get()
    }

    fn observe(&self, listener: Box<dyn FnMut(f32)>) -> SubscriptionId {
        self.listeners.add(listener)
    }

    fn unobserve(&self, id: SubscriptionId) {
        self.listeners.remove(id);
    }
}

/// 一组 mock 原语，同时保留具体类型以便测试推进事件
pub struct MockPlatform {
    pub clock: Rc<ManualFrameClock>,
    pub viewport: Rc<MockViewport>,
    pub preferences: Rc<MockPreferences>,
    pub scroll: Rc<MockScrollObserver>,
}

impl MockPlatform {
    /// 指定视口宽度的桌面环境（视口高度 1000px）
    pub fn with_width(width: f32) -> Self {
        Self {
            clock: Rc::new(ManualFrameClock::new()),
            viewport: Rc::new(MockViewport::new(Some(width))),
            preferences: Rc::new(MockPreferences::new(false)),
            scroll: Rc::new(MockScrollObserver::new(1000.0)),
        }
    }

    /// 转换为注入用的 [`Platform`]
    pub fn platform(&self) -> Platform {
        Platform {
            clock: self.clock.clone(),
            viewport: self.viewport.clone(),
            preferences: self.preferences.clone(),
            scroll: self.scroll.clone(),
        }
    }
}

/// 内存中的 UI 元素
pub struct MockElement {
    id: String,
    values: RefCell<HashMap<Property, f32>>,
    attached: Cell<bool>,
    layout: Cell<Option<ElementLayout>>,
    pinned: Cell<bool>,
    pin_changes: Cell<u32>,
}

impl MockElement {
    /// 已挂载、布局为 (0, 0) 的元素
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            values: RefCell::new(HashMap::new()),
            attached: Cell::new(true),
            layout: Cell::new(Some(ElementLayout::default())),
            pinned: Cell::new(false),
            pin_changes: Cell::new(0),
        }
    }

    /// 指定文档布局
    pub fn at(id: impl Into<String>, top: f32, height: f32) -> Self {
        let element = Self::new(id);
        element.layout.set(Some(ElementLayout::new(top, height)));
        element
    }

    /// 未挂载的元素
    pub fn detached(id: impl Into<String>) -> Self {
        let element = Self::new(id);
        element.attached.set(false);
        element
    }

    /// 属性值；未写入过时返回静止值
    pub fn value(&self, property: Property) -> f32 {
        self.values
            .borrow()
            .get(&property)
            .copied()
            .unwrap_or_else(|| property.rest_value())
    }

    /// 是否被写入过该属性
    pub fn was_written(&self, property: Property) -> bool {
        self.values.borrow().contains_key(&property)
    }

    pub fn detach(&self) {
        self.attached.set(false);
    }

    pub fn move_to(&self, top: f32, height: f32) {
        self.layout.set(Some(ElementLayout::new(top, height)));
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned.get()
    }

    /// 固定状态切换次数
    pub fn pin_changes(&self) -> u32 {
        self.pin_changes.get()
    }
}

impl MotionTarget for MockElement {
    fn target_id(&self) -> &str {
        &self.id
    }

    fn get_property(&self, property: Property) -> Option<f32> {
        Some(self.value(property))
    }

    fn set_property(&self, property: Property, value: f32) -> bool {
        self.values.borrow_mut().insert(property, value);
        true
    }

    fn is_attached(&self) -> bool {
        self.attached.get()
    }

    fn layout(&self) -> Option<ElementLayout> {
        self.layout.get()
    }

    fn set_pinned(&self, pinned: bool) {
        if self.pinned.replace(pinned) != pinned {
            self.pin_changes.set(self.pin_changes.get() + 1);
        }
    }
}

/// 记录取消次数的句柄
///
/// 克隆共享同一状态，测试保留一份用于断言。
#[derive(Clone)]
pub struct FlagHandle {
    active: Rc<Cell<bool>>,
    cancels: Rc<Cell<u32>>,
}

impl FlagHandle {
    pub fn new() -> Self {
        Self {
            active: Rc::new(Cell::new(true)),
            cancels: Rc::new(Cell::new(0)),
        }
    }

    /// `cancel()` 被调用的次数
    pub fn cancel_count(&self) -> u32 {
        self.cancels.get()
    }
}

impl Default for FlagHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Cancellable for FlagHandle {
    fn cancel(&self) {
        self.active.set(false);
        self.cancels.set(self.cancels.get() + 1);
    }

    fn is_active(&self) -> bool {
        self.active.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_fires_once() {
        let clock = ManualFrameClock::new();
        let hits = Rc::new(Cell::new(0));

        let h = hits.clone();
        clock.request_frame(Box::new(move |_| h.set(h.get() + 1)));
        assert_eq!(clock.pending_count(), 1);

        clock.advance(16.0);
        clock.advance(16.0);
        assert_eq!(hits.get(), 1);
        assert_eq!(clock.now_ms(), 32.0);
    }

    #[test]
    fn test_manual_clock_cancel() {
        let clock = ManualFrameClock::new();
        let hits = Rc::new(Cell::new(0));

        let h = hits.clone();
        let id = clock.request_frame(Box::new(move |_| h.set(h.get() + 1)));
        clock.cancel_frame(id);
        clock.advance(16.0);

        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_listener_unsubscribe_during_emit() {
        let prefs = Rc::new(MockPreferences::new(false));
        let seen = Rc::new(Cell::new(0));

        let p = prefs.clone();
        let s = seen.clone();
        let slot: Rc<Cell<Option<SubscriptionId>>> = Rc::new(Cell::new(None));
        let slot2 = slot.clone();
        let id = prefs.on_change(Box::new(move |_| {
            s.set(s.get() + 1);
            if let Some(id) = slot2.get() {
                p.unsubscribe(id);
            }
        }));
        slot.set(Some(id));

        prefs.set_reduced_motion(true);
        prefs.set_reduced_motion(false);

        assert_eq!(seen.get(), 1);
        assert_eq!(prefs.listener_count(), 0);
    }
}
