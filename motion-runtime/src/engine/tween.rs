//! # Tween 模块
//!
//! 单个补间实例：把目标的一组属性从起始状态插值到结束状态。
//!
//! 时间轴以线性进度（0.0 - 1.0）表示，写入目标前再应用缓动；
//! 正向播放推进进度，反向播放回退进度。

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::descriptor::{AnimationDescriptor, Property};
use crate::easing::EasingFunction;
use crate::handle::{Cancellable, Playback};
use crate::target::MotionTarget;

/// 描述符未指定时长时使用的默认时长（毫秒）
pub const DEFAULT_DURATION_MS: u32 = 400;

/// 补间状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TweenState {
    /// 等待延迟结束
    Pending,
    /// 正在播放
    Playing,
    /// 已暂停（新建的补间处于此状态）
    #[default]
    Paused,
    /// 正向播放到终点
    Completed,
    /// 已取消，不可恢复
    Cancelled,
}

impl TweenState {
    /// 是否需要逐帧推进
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Pending | Self::Playing)
    }
}

/// 播放方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

/// 单个属性的插值轨道
#[derive(Debug, Clone, Copy, PartialEq)]
struct Track {
    property: Property,
    from: f32,
    to: f32,
}

/// 补间实例
pub struct Tween {
    id: String,
    target: Rc<dyn MotionTarget>,
    tracks: Vec<Track>,
    duration_ms: f32,
    delay_ms: f32,
    easing: EasingFunction,
    state: TweenState,
    direction: Direction,
    /// 线性进度（未应用缓动）
    progress: f32,
    /// 剩余延迟
    delay_left: f32,
}

impl fmt::Debug for Tween {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tween")
            .field("id", &self.id)
            .field("target", &self.target.target_id())
            .field("tracks", &self.tracks)
            .field("state", &self.state)
            .field("direction", &self.direction)
            .field("progress", &self.progress)
            .finish()
    }
}

impl Tween {
    /// 按描述符创建补间（暂停状态，尚未写入任何属性）
    ///
    /// 每个属性的起始值依次取自：描述符 `from` → 目标当前值 → 属性静止值。
    /// 只出现在 `from` 中的属性以目标当前值作为结束值。
    pub fn new(target: Rc<dyn MotionTarget>, descriptor: &AnimationDescriptor) -> Self {
        let current = |property: Property| {
            target
                .get_property(property)
                .unwrap_or_else(|| property.rest_value())
        };

        let mut tracks: Vec<Track> = descriptor
            .to
            .iter()
            .map(|(property, to)| Track {
                property,
                from: descriptor
                    .from
                    .as_ref()
                    .and_then(|from| from.get(property))
                    .unwrap_or_else(|| current(property)),
                to,
            })
            .collect();

        if let Some(from) = &descriptor.from {
            for (property, value) in from.iter() {
                if !descriptor.to.contains(property) {
                    tracks.push(Track {
                        property,
                        from: value,
                        to: current(property),
                    });
                }
            }
        }

        let delay_ms = descriptor.delay.unwrap_or(0) as f32;
        Self {
            id: descriptor.id.clone(),
            tracks,
            duration_ms: descriptor.duration.unwrap_or(DEFAULT_DURATION_MS) as f32,
            delay_ms,
            easing: descriptor.easing.unwrap_or_default(),
            state: TweenState::Paused,
            direction: Direction::Forward,
            progress: 0.0,
            delay_left: delay_ms,
            target,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> TweenState {
        self.state
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// 线性进度
    pub fn progress(&self) -> f32 {
        self.progress
    }

    /// 缓动后的进度
    pub fn eased_progress(&self) -> f32 {
        self.easing.apply(self.progress)
    }

    /// 参与插值的属性
    pub fn properties(&self) -> impl Iterator<Item = Property> + '_ {
        self.tracks.iter().map(|track| track.property)
    }

    /// 推进 `dt_ms` 毫秒
    ///
    /// # 返回
    /// - `true`: 仍需继续推进
    /// - `false`: 已停止（暂停、结束或取消）
    pub fn update(&mut self, dt_ms: f32) -> bool {
        match self.state {
            TweenState::Pending => {
                self.delay_left -= dt_ms;
                if self.delay_left > 0.0 {
                    return true;
                }
                let overflow = -self.delay_left;
                self.delay_left = 0.0;
                self.state = TweenState::Playing;
                self.step(overflow)
            }
            TweenState::Playing => self.step(dt_ms),
            TweenState::Paused | TweenState::Completed | TweenState::Cancelled => false,
        }
    }

    fn step(&mut self, dt_ms: f32) -> bool {
        let delta = if self.duration_ms <= 0.0 {
            1.0
        } else {
            dt_ms / self.duration_ms
        };

        match self.direction {
            Direction::Forward => {
                self.progress = (self.progress + delta).min(1.0);
                self.apply();
                if self.progress >= 1.0 {
                    self.state = TweenState::Completed;
                    return false;
                }
            }
            Direction::Backward => {
                self.progress = (self.progress - delta).max(0.0);
                self.apply();
                if self.progress <= 0.0 {
                    self.state = TweenState::Paused;
                    return false;
                }
            }
        }
        true
    }

    /// 把当前进度写入目标
    fn apply(&self) {
        let eased = self.easing.apply(self.progress);
        for track in &self.tracks {
            let value = track.from + (track.to - track.from) * eased;
            self.target.set_property(track.property, value);
        }
        trace!(id = %self.id, progress = self.progress, "补间写入");
    }

    fn start_running(&mut self) {
        self.state = if self.direction == Direction::Forward && self.delay_left > 0.0 {
            TweenState::Pending
        } else {
            TweenState::Playing
        };
    }

    pub fn play(&mut self) {
        if self.state == TweenState::Cancelled {
            return;
        }
        self.direction = Direction::Forward;
        if self.progress >= 1.0 {
            self.state = TweenState::Completed;
            return;
        }
        if self.state == TweenState::Paused && self.progress == 0.0 {
            self.apply();
        }
        self.start_running();
    }

    pub fn reverse(&mut self) {
        if self.state == TweenState::Cancelled {
            return;
        }
        self.direction = Direction::Backward;
        // 反向不等待延迟
        self.delay_left = 0.0;
        if self.progress <= 0.0 {
            self.state = TweenState::Paused;
            return;
        }
        self.state = TweenState::Playing;
    }

    pub fn pause(&mut self) {
        if self.state.is_running() {
            self.state = TweenState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.state != TweenState::Paused {
            return;
        }
        let at_end = match self.direction {
            Direction::Forward => self.progress >= 1.0,
            Direction::Backward => self.progress <= 0.0,
        };
        if !at_end {
            self.start_running();
        }
    }

    pub fn restart(&mut self) {
        if self.state == TweenState::Cancelled {
            return;
        }
        self.direction = Direction::Forward;
        self.progress = 0.0;
        self.delay_left = self.delay_ms;
        self.apply();
        self.start_running();
    }

    pub fn reset(&mut self) {
        if self.state == TweenState::Cancelled {
            return;
        }
        self.direction = Direction::Forward;
        self.progress = 0.0;
        self.delay_left = self.delay_ms;
        self.apply();
        self.state = TweenState::Paused;
    }

    pub fn complete(&mut self) {
        if self.state == TweenState::Cancelled {
            return;
        }
        self.direction = Direction::Forward;
        self.progress = 1.0;
        self.delay_left = 0.0;
        self.apply();
        self.state = TweenState::Completed;
    }

    /// 跳到指定线性进度，不改变播放状态
    pub fn seek(&mut self, progress: f32) {
        if self.state == TweenState::Cancelled {
            return;
        }
        self.progress = progress.clamp(0.0, 1.0);
        if self.state == TweenState::Completed && self.progress < 1.0 {
            self.state = TweenState::Paused;
        }
        self.apply();
    }

    /// 取消：停在当前值，之后的所有操作都无效
    pub fn cancel(&mut self) {
        self.state = TweenState::Cancelled;
    }
}

/// 补间的共享句柄
///
/// 引擎、注册表和视口协调器可以各自持有一份克隆。
#[derive(Clone)]
pub struct TweenHandle {
    inner: Rc<RefCell<Tween>>,
}

impl TweenHandle {
    pub(crate) fn new(tween: Tween) -> Self {
        Self {
            inner: Rc::new(RefCell::new(tween)),
        }
    }

    pub(crate) fn downgrade(&self) -> std::rc::Weak<RefCell<Tween>> {
        Rc::downgrade(&self.inner)
    }

    pub fn state(&self) -> TweenState {
        self.inner.borrow().state()
    }

    pub fn direction(&self) -> Direction {
        self.inner.borrow().direction()
    }

    pub fn id(&self) -> String {
        self.inner.borrow().id().to_string()
    }
}

impl fmt::Debug for TweenHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.borrow().fmt(f)
    }
}

impl Cancellable for TweenHandle {
    fn cancel(&self) {
        self.inner.borrow_mut().cancel();
    }

    fn is_active(&self) -> bool {
        !matches!(
            self.state(),
            TweenState::Completed | TweenState::Cancelled
        )
    }
}

impl Playback for TweenHandle {
    fn play(&self) {
        self.inner.borrow_mut().play();
    }

    fn reverse(&self) {
        self.inner.borrow_mut().reverse();
    }

    fn pause(&self) {
        self.inner.borrow_mut().pause();
    }

    fn resume(&self) {
        self.inner.borrow_mut().resume();
    }

    fn restart(&self) {
        self.inner.borrow_mut().restart();
    }

    fn reset(&self) {
        self.inner.borrow_mut().reset();
    }

    fn complete(&self) {
        self.inner.borrow_mut().complete();
    }

    fn seek(&self, progress: f32) {
        self.inner.borrow_mut().seek(progress);
    }

    fn progress(&self) -> f32 {
        self.inner.borrow().progress()
    }
}
