//! # FPS 模块
//!
//! 帧率监控：每帧计数，每满一秒把一个采样压入有界窗口，
//! 最近 10 个采样的平均值低于阈值时触发熔断回调。
//!
//! 回调在释放内部借用之后调用，回调里停止监控或取消全部动画都是安全的。

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use tracing::{debug, trace, warn};

use crate::platform::{FrameClock, FrameRequestId};

/// 窗口容量
pub const WINDOW_CAPACITY: usize = 60;

/// 计算滑动平均的采样数
pub const TRAILING_SAMPLES: usize = 10;

/// 采样间隔（毫秒）
pub const SAMPLE_INTERVAL_MS: f64 = 1000.0;

/// 有界 FPS 采样窗口
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FpsWindow {
    samples: VecDeque<f32>,
}

impl FpsWindow {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(WINDOW_CAPACITY),
        }
    }

    /// 追加采样，超出容量时淘汰最旧的
    pub fn push(&mut self, fps: f32) {
        if self.samples.len() == WINDOW_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(fps);
    }

    /// 最近一次采样
    pub fn latest(&self) -> Option<f32> {
        self.samples.back().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// 最近 `n` 个采样的平均值；采样不足 `n` 个时返回 `None`
    pub fn trailing_average(&self, n: usize) -> Option<f32> {
        if n == 0 || self.samples.len() < n {
            return None;
        }
        let sum: f32 = self.samples.iter().rev().take(n).sum();
        Some(sum / n as f32)
    }

    /// 性能是否可接受（采样不足 10 个时视为可接受）
    pub fn is_acceptable(&self, threshold: f32) -> bool {
        self.trailing_average(TRAILING_SAMPLES)
            .is_none_or(|average| average >= threshold)
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

type BreachCallback = Rc<dyn Fn(f32)>;

#[derive(Debug, Default)]
struct MonitorState {
    running: bool,
    pending: Option<FrameRequestId>,
    frames: u32,
    /// 上一个采样点的时间戳
    origin_ms: f64,
    window: FpsWindow,
}

struct MonitorInner {
    clock: Rc<dyn FrameClock>,
    threshold: Cell<f32>,
    state: RefCell<MonitorState>,
    on_breach: RefCell<Option<BreachCallback>>,
}

/// 帧率监控器
///
/// 状态机：`stopped → running → stopped`，可以重复启动。
/// 克隆共享同一个监控器。
#[derive(Clone)]
pub struct FrameRateMonitor {
    inner: Rc<MonitorInner>,
}

impl std::fmt::Debug for FrameRateMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("FrameRateMonitor")
            .field("running", &state.running)
            .field("threshold", &self.inner.threshold.get())
            .field("samples", &state.window.len())
            .finish()
    }
}

impl FrameRateMonitor {
    pub fn new(clock: Rc<dyn FrameClock>, threshold: f32) -> Self {
        Self {
            inner: Rc::new(MonitorInner {
                clock,
                threshold: Cell::new(threshold),
                state: RefCell::new(MonitorState::default()),
                on_breach: RefCell::new(None),
            }),
        }
    }

    /// 设置熔断回调（替换之前的回调）
    pub fn on_breach(&self, callback: impl Fn(f32) + 'static) {
        *self.inner.on_breach.borrow_mut() = Some(Rc::new(callback));
    }

    pub fn threshold(&self) -> f32 {
        self.inner.threshold.get()
    }

    pub fn set_threshold(&self, threshold: f32) {
        self.inner.threshold.set(threshold);
    }

    /// 开始采样；已在运行时无操作
    pub fn start(&self) {
        {
            let mut state = self.inner.state.borrow_mut();
            if state.running {
                return;
            }
            state.running = true;
            state.frames = 0;
            state.origin_ms = self.inner.clock.now_ms();
        }
        debug!(threshold = self.threshold(), "帧率监控启动");
        MonitorInner::schedule(&self.inner);
    }

    /// 停止采样并取消待触发的帧回调；未运行时无操作
    pub fn stop(&self) {
        let pending = {
            let mut state = self.inner.state.borrow_mut();
            if !state.running {
                return;
            }
            state.running = false;
            state.frames = 0;
            state.pending.take()
        };
        if let Some(id) = pending {
            self.inner.clock.cancel_frame(id);
        }
        debug!("帧率监控停止");
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.borrow().running
    }

    /// 最近一次采样的帧率
    pub fn current_fps(&self) -> Option<f32> {
        self.inner.state.borrow().window.latest()
    }

    /// 最近 `n` 个采样的平均值
    pub fn trailing_average(&self, n: usize) -> Option<f32> {
        self.inner.state.borrow().window.trailing_average(n)
    }

    pub fn is_performance_acceptable(&self) -> bool {
        self.inner
            .state
            .borrow()
            .window
            .is_acceptable(self.threshold())
    }

    pub fn sample_count(&self) -> usize {
        self.inner.state.borrow().window.len()
    }

    /// 直接写入一个采样并执行熔断判定
    ///
    /// 与帧回调产生的采样走同一条路径，用于注入合成的采样序列。
    pub fn record_sample(&self, fps: f32) {
        self.inner.record(fps);
    }
}

impl MonitorInner {
    fn schedule(this: &Rc<Self>) {
        let weak: Weak<Self> = Rc::downgrade(this);
        let id = this.clock.request_frame(Box::new(move |now_ms| {
            if let Some(inner) = weak.upgrade() {
                MonitorInner::on_frame(&inner, now_ms);
            }
        }));
        this.state.borrow_mut().pending = Some(id);
    }

    fn on_frame(this: &Rc<Self>, now_ms: f64) {
        let sample = {
            let mut state = this.state.borrow_mut();
            state.pending = None;
            if !state.running {
                return;
            }
            state.frames += 1;
            let elapsed = now_ms - state.origin_ms;
            if elapsed >= SAMPLE_INTERVAL_MS {
                let fps = (f64::from(state.frames) * 1000.0 / elapsed) as f32;
                state.frames = 0;
                state.origin_ms = now_ms;
                Some(fps)
            } else {
                None
            }
        };

        if let Some(fps) = sample {
            this.record(fps);
        }

        // 回调中可能已经停止，或停止后又重新启动并自行排了帧
        let reschedule = {
            let state = this.state.borrow();
            state.running && state.pending.is_none()
        };
        if reschedule {
            Self::schedule(this);
        }
    }

    fn record(&self, fps: f32) {
        let threshold = self.threshold.get();
        let breach = {
            let mut state = self.state.borrow_mut();
            state.window.push(fps);
            trace!(fps, samples = state.window.len(), "帧率采样");
            state
                .window
                .trailing_average(TRAILING_SAMPLES)
                .filter(|average| *average < threshold)
        };

        let Some(average) = breach else {
            return;
        };
        warn!(average, threshold, "帧率低于阈值");
        let callback = self.on_breach.borrow().clone();
        if let Some(callback) = callback {
            callback(average);
        }
    }
}
