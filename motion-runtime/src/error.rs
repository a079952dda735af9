//! # Error 模块
//!
//! 定义 motion-runtime 中使用的错误类型。
//!
//! 校验失败、目标缺失、帧率下降都不是错误：它们在本地恢复并记录日志，
//! 调用方得到 `false` / `None`。只有结构性的误用（以及配置文件 IO）
//! 才会以 [`MotionError`] 的形式出现。

use thiserror::Error;

/// motion-runtime 统一错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MotionError {
    /// 在没有活跃 `MotionManager` 的作用域中发起了绑定调用
    ///
    /// 这是接线错误而不是运行时状况，`scope::use_motion()` 遇到它会直接 panic。
    #[error("当前作用域没有活跃的 MotionManager，绑定调用必须位于 MotionManager::enter() 的作用域内")]
    NoActiveScope,

    /// 配置文件读取失败
    #[error("读取动效配置失败: {path} - {message}")]
    ConfigIo {
        /// 文件路径
        path: String,
        /// 错误消息
        message: String,
    },

    /// 配置文件解析失败
    #[error("解析动效配置失败: {path} - {message}")]
    ConfigParse {
        /// 文件路径
        path: String,
        /// 错误消息
        message: String,
    },

    /// 合并后的配置违反约束（`min ≤ max`、边界非负）
    #[error("动效配置无效: {0}")]
    InvalidConfig(String),

    /// 无法解析的滚动锚点字符串
    #[error("无效的滚动触发参数 '{0}'")]
    InvalidScrollPosition(String),

    /// 无法解析的边界动作字符串
    #[error("无效的边界动作 '{0}'，应为四个 play|pause|resume|reverse|restart|reset|complete|none")]
    InvalidToggleActions(String),
}

/// Result 类型别名
pub type MotionResult<T> = Result<T, MotionError>;
