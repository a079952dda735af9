//! # Target 模块
//!
//! 动画目标接口：UI 元素通过实现 [`MotionTarget`] 暴露可动画属性、
//! 挂载状态与布局信息。
//!
//! ## 设计说明
//!
//! 所有方法都接收 `&self`，实现方使用内部可变性（`Cell` / `RefCell`），
//! 这样引擎、视口协调器与静态回退可以同时持有同一个目标的 `Rc`。

use crate::descriptor::Property;

/// 元素在文档坐标系中的布局（px）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ElementLayout {
    /// 元素顶边到文档顶部的距离
    pub top: f32,
    /// 元素高度
    pub height: f32,
}

impl ElementLayout {
    pub const fn new(top: f32, height: f32) -> Self {
        Self { top, height }
    }
}

/// 可动画目标
///
/// ## 实现示例
///
/// ```rust,ignore
/// struct Card {
///     opacity: Cell<f32>,
///     attached: Cell<bool>,
/// }
///
/// impl MotionTarget for Card {
///     fn target_id(&self) -> &str { "card" }
///
///     fn get_property(&self, property: Property) -> Option<f32> {
///         match property {
///             Property::Opacity => Some(self.opacity.get()),
///             _ => None,
///         }
///     }
///
///     fn set_property(&self, property: Property, value: f32) -> bool {
///         match property {
///             Property::Opacity => { self.opacity.set(value); true }
///             _ => false,
///         }
///     }
///
///     fn is_attached(&self) -> bool { self.attached.get() }
///     fn layout(&self) -> Option<ElementLayout> { None }
/// }
/// ```
pub trait MotionTarget {
    /// 目标标识（用于日志）
    fn target_id(&self) -> &str;

    /// 读取属性当前值
    ///
    /// # 返回
    /// - `Some(value)`: 属性存在
    /// - `None`: 目标不支持该属性
    fn get_property(&self, property: Property) -> Option<f32>;

    /// 立即写入属性值（无过渡）
    ///
    /// # 返回
    /// - `true`: 写入成功
    /// - `false`: 目标不支持该属性
    fn set_property(&self, property: Property, value: f32) -> bool;

    /// 元素当前是否挂载在可见文档中
    fn is_attached(&self) -> bool;

    /// 元素布局；无法测量时返回 `None`
    fn layout(&self) -> Option<ElementLayout>;

    /// 固定 / 释放元素（滚动触发的 pin 模式）
    ///
    /// 默认实现忽略固定请求。
    fn set_pinned(&self, _pinned: bool) {}
}
