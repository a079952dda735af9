//! # Platform 模块
//!
//! 宿主平台提供的原语，全部以 trait 对象注入：
//!
//! - [`FrameClock`]：每帧回调 + 时间戳（浏览器中对应 `requestAnimationFrame`）
//! - [`ViewportWatcher`]：视口宽度查询与 resize 订阅
//! - [`PreferenceWatcher`]：reduced-motion 媒体查询与变更订阅
//! - [`ScrollObserver`]：滚动位置查询与滚动订阅
//!
//! 核心逻辑从不等待这些原语；它们只负责在任意时刻把信号送进来。
//! 所有回调都在宿主的单线程事件循环上执行，因此使用 `Rc` 与 `Box<dyn FnMut>`。

#[cfg(any(test, feature = "test-util"))]
pub mod mock;

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// 帧回调：参数为当前帧的时间戳（毫秒）
pub type FrameCallback = Box<dyn FnOnce(f64)>;

/// 帧请求标识，用于取消尚未触发的回调
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRequestId(pub u64);

/// 订阅标识，用于取消监听
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// 帧调度与时钟
pub trait FrameClock {
    /// 当前时间戳（毫秒，单调递增）
    fn now_ms(&self) -> f64;

    /// 在下一帧调用 `callback`，只触发一次
    fn request_frame(&self, callback: FrameCallback) -> FrameRequestId;

    /// 取消尚未触发的帧回调；已触发或不存在时无操作
    fn cancel_frame(&self, id: FrameRequestId);
}

/// 视口尺寸
pub trait ViewportWatcher {
    /// 当前可用宽度；非浏览器环境（无视口）返回 `None`
    fn width(&self) -> Option<f32>;

    /// 订阅 resize，回调参数为新宽度
    fn on_resize(&self, listener: Box<dyn FnMut(f32)>) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId);
}

/// 无障碍偏好
pub trait PreferenceWatcher {
    /// 用户当前是否请求减少动效
    fn prefers_reduced_motion(&self) -> bool;

    /// 订阅偏好变化，回调参数为新的 reduced-motion 值
    fn on_change(&self, listener: Box<dyn FnMut(bool)>) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId);
}

/// 滚动观察
pub trait ScrollObserver {
    /// 当前文档滚动偏移（px）
    fn scroll_offset(&self) -> f32;

    /// 视口高度（px）
    fn viewport_height(&self) -> f32;

    /// 订阅滚动，回调参数为新的滚动偏移
    fn observe(&self, listener: Box<dyn FnMut(f32)>) -> SubscriptionId;

    fn unobserve(&self, id: SubscriptionId);
}

/// 注入给 `MotionManager` 的一组平台原语
#[derive(Clone)]
pub struct Platform {
    pub clock: Rc<dyn FrameClock>,
    pub viewport: Rc<dyn ViewportWatcher>,
    pub preferences: Rc<dyn PreferenceWatcher>,
    pub scroll: Rc<dyn ScrollObserver>,
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform")
            .field("viewport_width", &self.viewport.width())
            .field("reduced_motion", &self.preferences.prefers_reduced_motion())
            .finish()
    }
}

/// 无头平台：没有视口、没有偏好、帧回调永不触发、滚动永不变化
///
/// 服务端渲染或测试环境下使用；设备档位会被判定为 desktop。
#[derive(Debug)]
pub struct Headless {
    origin: Instant,
    next_id: Cell<u64>,
}

impl Headless {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            next_id: Cell::new(1),
        }
    }

    fn next_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }
}

impl Default for Headless {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock for Headless {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    fn request_frame(&self, _callback: FrameCallback) -> FrameRequestId {
        FrameRequestId(self.next_id())
    }

    fn cancel_frame(&self, _id: FrameRequestId) {}
}

impl ViewportWatcher for Headless {
    fn width(&self) -> Option<f32> {
        None
    }

    fn on_resize(&self, _listener: Box<dyn FnMut(f32)>) -> SubscriptionId {
        SubscriptionId(self.next_id())
    }

    fn unsubscribe(&self, _id: SubscriptionId) {}
}

impl PreferenceWatcher for Headless {
    fn prefers_reduced_motion(&self) -> bool {
        false
    }

    fn on_change(&self, _listener: Box<dyn FnMut(bool)>) -> SubscriptionId {
        SubscriptionId(self.next_id())
    }

    fn unsubscribe(&self, _id: SubscriptionId) {}
}

impl ScrollObserver for Headless {
    fn scroll_offset(&self) -> f32 {
        0.0
    }

    fn viewport_height(&self) -> f32 {
        0.0
    }

    fn observe(&self, _listener: Box<dyn FnMut(f32)>) -> SubscriptionId {
        SubscriptionId(self.next_id())
    }

    fn unobserve(&self, _id: SubscriptionId) {}
}

/// 构建一个无头平台
pub fn headless() -> Platform {
    let headless = Rc::new(Headless::new());
    Platform {
        clock: headless.clone(),
        viewport: headless.clone(),
        preferences: headless.clone(),
        scroll: headless,
    }
}
