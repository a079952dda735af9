//! # Engine 模块
//!
//! 参考补间引擎。
//!
//! 生命周期管理器只通过 [`AnimationFactory`] 创建动画，
//! 拿到的是 [`Playback`] 能力而不是具体的引擎类型；
//! 宿主可以换成任何实现了该 trait 的时间轴库。
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! let engine = Rc::new(TweenEngine::new());
//! engine.drive(platform.clock.clone());
//!
//! let handle = engine.start(card.clone(), &descriptor);
//! handle.reverse();
//! ```

mod system;
mod tween;

use std::rc::Rc;

pub use system::TweenEngine;
pub use tween::{DEFAULT_DURATION_MS, Direction, Tween, TweenHandle, TweenState};

use crate::descriptor::AnimationDescriptor;
use crate::handle::Playback;
use crate::target::MotionTarget;

/// 动画工厂
///
/// 返回的动画必须处于暂停状态且尚未写入目标；
/// 何时播放由调用方（绑定层或视口协调器）决定。
pub trait AnimationFactory {
    fn create(
        &self,
        target: Rc<dyn MotionTarget>,
        descriptor: &AnimationDescriptor,
    ) -> Rc<dyn Playback>;
}
