//! # Handle 模块
//!
//! 动画引擎的最小能力接口。
//!
//! 控制器与视口协调器只依赖这里的 trait，不依赖具体的动画引擎类型；
//! 第三方 timeline / tween 对象通过适配器实现 [`Cancellable`] 即可接入。

use std::fmt;
use std::rc::Rc;

use crate::descriptor::PropertyMap;
use crate::fallback;
use crate::target::MotionTarget;

/// 可取消能力
pub trait Cancellable {
    /// 立即取消；重复调用无副作用
    fn cancel(&self);

    /// 是否仍然存活（未取消、未结束）
    fn is_active(&self) -> bool;
}

/// 可控播放能力
///
/// 视口协调器在离散模式下用边界动作驱动它，在擦洗模式下用 `seek` 驱动它。
pub trait Playback: Cancellable {
    /// 正向播放（从当前进度）
    fn play(&self);
    /// 反向播放（从当前进度回到起点）
    fn reverse(&self);
    fn pause(&self);
    fn resume(&self);
    /// 从起点重新正向播放
    fn restart(&self);
    /// 回到起点并停止
    fn reset(&self);
    /// 直接跳到终点
    fn complete(&self);
    /// 设置线性进度（0.0 - 1.0）并立即应用
    fn seek(&self, progress: f32);
    /// 当前线性进度（0.0 - 1.0）
    fn progress(&self) -> f32;
}

/// 运行中动画的不透明令牌
///
/// 由注册表独占存放；克隆只是复制引用，不会产生第二个动画。
/// 取消后不会被复用。
#[derive(Clone)]
pub struct AnimationHandle {
    inner: Rc<dyn Cancellable>,
    final_state: Option<Rc<FinalState>>,
}

/// 撤销时写回的结束状态
struct FinalState {
    target: Rc<dyn MotionTarget>,
    to: PropertyMap,
}

impl AnimationHandle {
    /// 包装任意可取消对象
    pub fn new<C: Cancellable + 'static>(cancellable: C) -> Self {
        Self::from_rc(Rc::new(cancellable))
    }

    /// 包装已共享的可取消对象
    pub fn from_rc(inner: Rc<dyn Cancellable>) -> Self {
        Self {
            inner,
            final_state: None,
        }
    }

    /// 包装可控播放对象（只暴露取消能力）
    pub fn from_playback(playback: Rc<dyn Playback>) -> Self {
        Self::new(PlaybackAdapter(playback))
    }

    /// 附带撤销时写回的结束状态
    pub fn with_final_state(mut self, target: Rc<dyn MotionTarget>, to: PropertyMap) -> Self {
        self.final_state = Some(Rc::new(FinalState { target, to }));
        self
    }

    /// 只取消，元素停留在当前值
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// 取消并把元素直接写成结束状态
    ///
    /// 没有附带结束状态时等价于 [`cancel`](Self::cancel)。
    pub fn revoke(&self) {
        self.inner.cancel();
        if let Some(state) = &self.final_state {
            fallback::apply_final_state(state.target.as_ref(), &state.to);
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    /// 是否与另一个令牌指向同一个动画
    pub fn same_as(&self, other: &AnimationHandle) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for AnimationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationHandle")
            .field("active", &self.is_active())
            .field("has_final_state", &self.final_state.is_some())
            .finish()
    }
}

struct PlaybackAdapter(Rc<dyn Playback>);

impl Cancellable for PlaybackAdapter {
    fn cancel(&self) {
        self.0.cancel();
    }

    fn is_active(&self) -> bool {
        self.0.is_active()
    }
}
