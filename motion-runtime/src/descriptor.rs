//! # Descriptor 模块
//!
//! 动画描述符：声明动画的起止视觉状态、时间参数与触发方式。
//!
//! 描述符是纯数据，可以从 JSON 反序列化（键名为 camelCase），
//! 也可以通过构建器方法在代码中构造：
//!
//! ```rust,ignore
//! let desc = AnimationDescriptor::new(
//!     "card-enter",
//!     PropertyMap::new().with(Property::Opacity, 1.0),
//! )
//! .with_from(PropertyMap::new().with(Property::Opacity, 0.0))
//! .with_duration(500);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::easing::EasingFunction;
use crate::error::MotionError;

/// 可动画的视觉属性
///
/// `BoxShadow` / `Filter` / `Blur` 每帧合成代价高，描述符中出现即校验失败。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Property {
    /// 水平位移（px）
    #[serde(rename = "x", alias = "offsetX")]
    OffsetX,
    /// 垂直位移（px）
    #[serde(rename = "y", alias = "offsetY")]
    OffsetY,
    /// 透明度 (0.0 - 1.0)
    #[serde(rename = "opacity")]
    Opacity,
    /// 统一缩放
    #[serde(rename = "scale")]
    Scale,
    /// 旋转角度（度）
    #[serde(rename = "rotate")]
    Rotate,
    /// 阴影
    #[serde(rename = "boxShadow")]
    BoxShadow,
    /// CSS 滤镜
    #[serde(rename = "filter")]
    Filter,
    /// 模糊
    #[serde(rename = "blur")]
    Blur,
}

impl Property {
    /// 属性名称（与 JSON 键一致）
    pub fn name(&self) -> &'static str {
        match self {
            Self::OffsetX => "x",
            Self::OffsetY => "y",
            Self::Opacity => "opacity",
            Self::Scale => "scale",
            Self::Rotate => "rotate",
            Self::BoxShadow => "boxShadow",
            Self::Filter => "filter",
            Self::Blur => "blur",
        }
    }

    /// 是否为方向性位移（受设备缩放系数影响）
    pub fn is_offset(&self) -> bool {
        matches!(self, Self::OffsetX | Self::OffsetY)
    }

    /// 是否为禁止动画的高开销属性
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::BoxShadow | Self::Filter | Self::Blur)
    }

    /// 元素未被修改时的静止值
    pub fn rest_value(&self) -> f32 {
        match self {
            Self::Opacity | Self::Scale => 1.0,
            _ => 0.0,
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 稀疏属性映射：属性 → 数值
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyMap(BTreeMap<Property, f32>);

impl PropertyMap {
    /// 创建空映射
    pub fn new() -> Self {
        Self::default()
    }

    /// 构建器：设置一个属性
    pub fn with(mut self, property: Property, value: f32) -> Self {
        self.0.insert(property, value);
        self
    }

    /// 设置属性值，返回旧值
    pub fn insert(&mut self, property: Property, value: f32) -> Option<f32> {
        self.0.insert(property, value)
    }

    /// 获取属性值
    pub fn get(&self, property: Property) -> Option<f32> {
        self.0.get(&property).copied()
    }

    /// 是否包含属性
    pub fn contains(&self, property: Property) -> bool {
        self.0.contains_key(&property)
    }

    /// 遍历 (属性, 值)
    pub fn iter(&self) -> impl Iterator<Item = (Property, f32)> + '_ {
        self.0.iter().map(|(p, v)| (*p, *v))
    }

    /// 所有属性键
    pub fn properties(&self) -> impl Iterator<Item = Property> + '_ {
        self.0.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 将方向性位移乘以 `factor`，其余属性保持不变
    pub fn scale_offsets(&mut self, factor: f32) {
        for (property, value) in self.0.iter_mut() {
            if property.is_offset() {
                *value *= factor;
            }
        }
    }
}

impl FromIterator<(Property, f32)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (Property, f32)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// 动画触发方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    /// 挂载时播放
    #[default]
    Mount,
    /// 悬停驱动（由调用方 play / reverse）
    Hover,
    /// 滚动位置驱动
    Scroll,
    /// 用户操作驱动（由调用方 play）
    Action,
}

/// 滚动锚点
///
/// `element` 是元素上的参考点（0 = 顶边，1 = 底边），
/// `viewport` 是视口上的参考线（0 = 顶部，1 = 底部）。
/// 当元素参考点与视口参考线重合时即为该锚点对应的滚动位置。
///
/// 字符串形式：`"top 80%"`、`"center center"`、`"bottom 20%"`。
/// 只写一个词时两侧取同一值（`"top"` 等价于 `"top top"`）。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScrollPosition {
    /// 元素参考点
    pub element: f32,
    /// 视口参考线
    pub viewport: f32,
}

impl ScrollPosition {
    pub const fn new(element: f32, viewport: f32) -> Self {
        Self { element, viewport }
    }

    /// 默认起点：元素顶边到达视口 80% 处
    pub const fn default_start() -> Self {
        Self::new(0.0, 0.8)
    }

    /// 默认终点：元素底边到达视口 20% 处
    pub const fn default_end() -> Self {
        Self::new(1.0, 0.2)
    }
}

fn parse_edge(token: &str) -> Option<f32> {
    match token {
        "top" => Some(0.0),
        "center" => Some(0.5),
        "bottom" => Some(1.0),
        _ => {
            let percent: f32 = token.strip_suffix('%')?.trim().parse().ok()?;
            percent.is_finite().then_some(percent / 100.0)
        }
    }
}

fn format_edge(value: f32) -> String {
    if value == 0.0 {
        "top".to_string()
    } else if value == 0.5 {
        "center".to_string()
    } else if value == 1.0 {
        "bottom".to_string()
    } else {
        format!("{}%", value * 100.0)
    }
}

impl FromStr for ScrollPosition {
    type Err = MotionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MotionError::InvalidScrollPosition(s.to_string());
        let tokens: Vec<&str> = s.split_whitespace().collect();
        match tokens.as_slice() {
            [both] => {
                let edge = parse_edge(both).ok_or_else(invalid)?;
                Ok(Self::new(edge, edge))
            }
            [element, viewport] => Ok(Self::new(
                parse_edge(element).ok_or_else(invalid)?,
                parse_edge(viewport).ok_or_else(invalid)?,
            )),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for ScrollPosition {
    type Error = MotionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScrollPosition> for String {
    fn from(value: ScrollPosition) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ScrollPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", format_edge(self.element), format_edge(self.viewport))
    }
}

/// 离散模式下跨越边界时执行的动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ToggleAction {
    Play,
    Pause,
    Resume,
    Reverse,
    Restart,
    Reset,
    Complete,
    #[default]
    None,
}

impl FromStr for ToggleAction {
    type Err = MotionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "play" => Self::Play,
            "pause" => Self::Pause,
            "resume" => Self::Resume,
            "reverse" => Self::Reverse,
            "restart" => Self::Restart,
            "reset" => Self::Reset,
            "complete" => Self::Complete,
            "none" => Self::None,
            other => return Err(MotionError::InvalidToggleActions(other.to_string())),
        })
    }
}

impl fmt::Display for ToggleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Reverse => "reverse",
            Self::Restart => "restart",
            Self::Reset => "reset",
            Self::Complete => "complete",
            Self::None => "none",
        })
    }
}

/// 四个边界事件各自的动作
///
/// 字符串形式按顺序为 `onEnter onLeave onEnterBack onLeaveBack`，
/// 默认 `"play none none none"`：只在首次进入时播放一次。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ToggleActions {
    /// 向下滚动越过起点
    pub on_enter: ToggleAction,
    /// 向下滚动越过终点
    pub on_leave: ToggleAction,
    /// 向上滚动回到终点以内
    pub on_enter_back: ToggleAction,
    /// 向上滚动退到起点之前
    pub on_leave_back: ToggleAction,
}

impl Default for ToggleActions {
    fn default() -> Self {
        Self {
            on_enter: ToggleAction::Play,
            on_leave: ToggleAction::None,
            on_enter_back: ToggleAction::None,
            on_leave_back: ToggleAction::None,
        }
    }
}

impl FromStr for ToggleActions {
    type Err = MotionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        let invalid = || MotionError::InvalidToggleActions(s.to_string());
        let [enter, leave, enter_back, leave_back] = tokens.as_slice() else {
            return Err(invalid());
        };
        let parse = |token: &str| token.parse::<ToggleAction>().map_err(|_| invalid());
        Ok(Self {
            on_enter: parse(*enter)?,
            on_leave: parse(*leave)?,
            on_enter_back: parse(*enter_back)?,
            on_leave_back: parse(*leave_back)?,
        })
    }
}

impl TryFrom<String> for ToggleActions {
    type Error = MotionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ToggleActions> for String {
    fn from(value: ToggleActions) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ToggleActions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.on_enter, self.on_leave, self.on_enter_back, self.on_leave_back
        )
    }
}

/// 滚动触发参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollOptions {
    /// 触发元素（为空时使用动画目标本身）
    #[serde(default)]
    pub anchor: Option<String>,
    /// 起点锚点
    #[serde(default = "ScrollPosition::default_start")]
    pub start: ScrollPosition,
    /// 终点锚点
    #[serde(default = "ScrollPosition::default_end")]
    pub end: ScrollPosition,
    /// 擦洗模式：进度直接跟随滚动位置
    #[serde(default)]
    pub scrub: bool,
    /// 在触发区间内把元素固定在屏幕上
    #[serde(default)]
    pub pin: bool,
    /// 离散模式的边界动作
    #[serde(default)]
    pub toggle_actions: ToggleActions,
}

impl Default for ScrollOptions {
    fn default() -> Self {
        Self {
            anchor: None,
            start: ScrollPosition::default_start(),
            end: ScrollPosition::default_end(),
            scrub: false,
            pin: false,
            toggle_actions: ToggleActions::default(),
        }
    }
}

/// 动画描述符
///
/// `to` 必须存在；`from` 缺省表示"从当前状态开始"。
/// 时间参数单位均为毫秒。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationDescriptor {
    /// 动画标识（注册表键）
    pub id: String,
    /// 目标元素标识
    #[serde(default)]
    pub target: String,
    /// 起始状态
    #[serde(default)]
    pub from: Option<PropertyMap>,
    /// 结束状态
    pub to: PropertyMap,
    /// 时长
    #[serde(default)]
    pub duration: Option<u32>,
    /// 延迟
    #[serde(default)]
    pub delay: Option<u32>,
    /// 多目标时的错开步长
    #[serde(default)]
    pub stagger: Option<u32>,
    /// 缓动
    #[serde(default)]
    pub easing: Option<EasingFunction>,
    /// 触发方式
    #[serde(default)]
    pub trigger: Trigger,
    /// 滚动触发参数（仅 `trigger = scroll` 时生效）
    #[serde(default)]
    pub scroll: Option<ScrollOptions>,
}

impl AnimationDescriptor {
    /// 创建描述符（挂载触发，其余参数缺省）
    pub fn new(id: impl Into<String>, to: PropertyMap) -> Self {
        Self {
            id: id.into(),
            target: String::new(),
            from: None,
            to,
            duration: None,
            delay: None,
            stagger: None,
            easing: None,
            trigger: Trigger::Mount,
            scroll: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    pub fn with_from(mut self, from: PropertyMap) -> Self {
        self.from = Some(from);
        self
    }

    pub fn with_duration(mut self, duration_ms: u32) -> Self {
        self.duration = Some(duration_ms);
        self
    }

    pub fn with_delay(mut self, delay_ms: u32) -> Self {
        self.delay = Some(delay_ms);
        self
    }

    pub fn with_stagger(mut self, stagger_ms: u32) -> Self {
        self.stagger = Some(stagger_ms);
        self
    }

    pub fn with_easing(mut self, easing: EasingFunction) -> Self {
        self.easing = Some(easing);
        self
    }

    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = trigger;
        self
    }

    /// 设置滚动参数，同时把触发方式切换为 `Scroll`
    pub fn with_scroll(mut self, scroll: ScrollOptions) -> Self {
        self.trigger = Trigger::Scroll;
        self.scroll = Some(scroll);
        self
    }

    /// 是否由滚动位置驱动
    pub fn is_scroll_driven(&self) -> bool {
        self.trigger == Trigger::Scroll
    }

    /// 生效的滚动参数（缺省时使用默认值）
    pub fn scroll_options(&self) -> ScrollOptions {
        self.scroll.clone().unwrap_or_default()
    }

    /// 同时遍历 `from`（如有）与 `to` 中的属性键
    pub fn animated_properties(&self) -> impl Iterator<Item = Property> + '_ {
        self.from
            .iter()
            .flat_map(|from| from.properties())
            .chain(self.to.properties())
    }
}
