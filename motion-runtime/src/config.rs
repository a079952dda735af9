//! # Config 模块
//!
//! 动效配置：时长边界、变换边界、缓动、性能阈值。
//!
//! ## 合并顺序
//!
//! 1. 内置默认值（最低）
//! 2. 调用方覆盖（[`MotionConfigOverride`]，可从 JSON 加载）
//! 3. 无障碍偏好（reduced motion）
//! 4. 设备档位（最高，由 `DeviceAdapter` 探测）
//!
//! 第 3、4 步由 `MotionManager` 在构造时完成。

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::device::DeviceTier;
use crate::easing::EasingFunction;
use crate::error::{MotionError, MotionResult};

/// 动效配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotionConfig {
    /// 动效总开关（帧率熔断后被置为 false）
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// 用户请求减少动效
    #[serde(default)]
    pub reduced_motion: bool,

    /// 当前设备档位
    #[serde(default)]
    pub device_tier: DeviceTier,

    /// 时间约束
    #[serde(default)]
    pub timing: TimingConfig,

    /// 变换约束
    #[serde(default)]
    pub transform_bounds: TransformBounds,

    /// 缓动
    #[serde(default)]
    pub easing: EasingConfig,

    /// 性能监控
    #[serde(default)]
    pub performance: PerformanceConfig,
}

/// 时间约束（毫秒）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingConfig {
    /// 最短时长
    #[serde(default = "default_min_duration", alias = "minDuration")]
    pub min: u32,

    /// 最长时长
    #[serde(default = "default_max_duration", alias = "maxDuration")]
    pub max: u32,

    /// 多目标错开步长
    #[serde(default = "default_stagger_step")]
    pub stagger_step: u32,
}

/// 变换约束
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformBounds {
    /// 水平位移绝对值上限（px）
    #[serde(default = "default_max_offset")]
    pub max_offset_x: f32,

    /// 垂直位移绝对值上限（px）
    #[serde(default = "default_max_offset")]
    pub max_offset_y: f32,

    /// 缩放上限
    #[serde(default = "default_max_scale")]
    pub max_scale: f32,

    /// 透明度下限
    #[serde(default)]
    pub min_opacity: f32,
}

/// 缓动配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EasingConfig {
    /// 主缓动（描述符未指定缓动时使用）
    #[serde(default = "default_primary_easing")]
    pub primary: EasingFunction,

    /// 次缓动（往返 / 悬停类动画）
    #[serde(default = "default_secondary_easing")]
    pub secondary: EasingFunction,
}

/// 性能监控配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceConfig {
    /// 帧率下限：滑动平均低于此值时关闭动效
    #[serde(default = "default_fps_threshold")]
    pub fps_threshold: f32,

    /// 是否启用帧率监控
    #[serde(default = "default_enabled")]
    pub monitoring_enabled: bool,
}

// 默认值函数
fn default_enabled() -> bool {
    true
}

fn default_min_duration() -> u32 {
    150
}

fn default_max_duration() -> u32 {
    600
}

fn default_stagger_step() -> u32 {
    80
}

fn default_max_offset() -> f32 {
    40.0
}

fn default_max_scale() -> f32 {
    1.05
}

fn default_primary_easing() -> EasingFunction {
    EasingFunction::EaseOutCubic
}

fn default_secondary_easing() -> EasingFunction {
    EasingFunction::EaseInOutSine
}

fn default_fps_threshold() -> f32 {
    30.0
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            reduced_motion: false,
            device_tier: DeviceTier::default(),
            timing: TimingConfig::default(),
            transform_bounds: TransformBounds::default(),
            easing: EasingConfig::default(),
            performance: PerformanceConfig::default(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            min: default_min_duration(),
            max: default_max_duration(),
            stagger_step: default_stagger_step(),
        }
    }
}

impl Default for TransformBounds {
    fn default() -> Self {
        Self {
            max_offset_x: default_max_offset(),
            max_offset_y: default_max_offset(),
            max_scale: default_max_scale(),
            min_opacity: 0.0,
        }
    }
}

impl Default for EasingConfig {
    fn default() -> Self {
        Self {
            primary: default_primary_easing(),
            secondary: default_secondary_easing(),
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            fps_threshold: default_fps_threshold(),
            monitoring_enabled: default_enabled(),
        }
    }
}

impl MotionConfig {
    /// 默认值 ⊕ 覆盖
    pub fn merged(overrides: &MotionConfigOverride) -> Self {
        let mut config = Self::default();
        config.apply(overrides);
        config
    }

    /// 把覆盖中出现的字段写入当前配置
    pub fn apply(&mut self, overrides: &MotionConfigOverride) {
        if let Some(enabled) = overrides.enabled {
            self.enabled = enabled;
        }
        if let Some(reduced) = overrides.reduced_motion {
            self.reduced_motion = reduced;
        }
        if let Some(tier) = overrides.device_tier {
            self.device_tier = tier;
        }
        if let Some(timing) = &overrides.timing {
            set_if(&mut self.timing.min, timing.min);
            set_if(&mut self.timing.max, timing.max);
            set_if(&mut self.timing.stagger_step, timing.stagger_step);
        }
        if let Some(bounds) = &overrides.transform_bounds {
            set_if(&mut self.transform_bounds.max_offset_x, bounds.max_offset_x);
            set_if(&mut self.transform_bounds.max_offset_y, bounds.max_offset_y);
            set_if(&mut self.transform_bounds.max_scale, bounds.max_scale);
            set_if(&mut self.transform_bounds.min_opacity, bounds.min_opacity);
        }
        if let Some(easing) = &overrides.easing {
            set_if(&mut self.easing.primary, easing.primary);
            set_if(&mut self.easing.secondary, easing.secondary);
        }
        if let Some(performance) = &overrides.performance {
            set_if(&mut self.performance.fps_threshold, performance.fps_threshold);
            set_if(
                &mut self.performance.monitoring_enabled,
                performance.monitoring_enabled,
            );
        }
    }

    /// 当前是否允许动效：`enabled ∧ ¬reducedMotion`
    pub fn is_motion_permitted(&self) -> bool {
        self.enabled && !self.reduced_motion
    }

    /// 验证配置有效性
    pub fn validate(&self) -> MotionResult<()> {
        if self.timing.min > self.timing.max {
            return Err(MotionError::InvalidConfig(format!(
                "timing.min ({}) 大于 timing.max ({})",
                self.timing.min, self.timing.max
            )));
        }

        let bounds = [
            ("transformBounds.maxOffsetX", self.transform_bounds.max_offset_x),
            ("transformBounds.maxOffsetY", self.transform_bounds.max_offset_y),
            ("transformBounds.maxScale", self.transform_bounds.max_scale),
            ("transformBounds.minOpacity", self.transform_bounds.min_opacity),
            ("performance.fpsThreshold", self.performance.fps_threshold),
        ];
        for (name, value) in bounds {
            if !value.is_finite() || value < 0.0 {
                return Err(MotionError::InvalidConfig(format!(
                    "{name} 必须是非负有限数，实际为 {value}"
                )));
            }
        }

        Ok(())
    }
}

fn set_if<T: Copy>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

/// 调用方提供的部分覆盖
///
/// 所有字段可选，键名与 [`MotionConfig`] 一致。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MotionConfigOverride {
    pub enabled: Option<bool>,
    pub reduced_motion: Option<bool>,
    pub device_tier: Option<DeviceTier>,
    pub timing: Option<TimingOverride>,
    pub transform_bounds: Option<TransformBoundsOverride>,
    pub easing: Option<EasingOverride>,
    pub performance: Option<PerformanceOverride>,
}

/// [`TimingConfig`] 的部分覆盖
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimingOverride {
    #[serde(alias = "minDuration")]
    pub min: Option<u32>,
    #[serde(alias = "maxDuration")]
    pub max: Option<u32>,
    pub stagger_step: Option<u32>,
}

/// [`TransformBounds`] 的部分覆盖
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransformBoundsOverride {
    pub max_offset_x: Option<f32>,
    pub max_offset_y: Option<f32>,
    pub max_scale: Option<f32>,
    pub min_opacity: Option<f32>,
}

/// [`EasingConfig`] 的部分覆盖
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EasingOverride {
    pub primary: Option<EasingFunction>,
    pub secondary: Option<EasingFunction>,
}

/// [`PerformanceConfig`] 的部分覆盖
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PerformanceOverride {
    pub fps_threshold: Option<f32>,
    pub monitoring_enabled: Option<bool>,
}

impl MotionConfigOverride {
    /// 从 JSON 文本解析
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// 从 JSON 文件加载
    pub fn load(path: impl AsRef<Path>) -> MotionResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| MotionError::ConfigIo {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&content).map_err(|e| MotionError::ConfigParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// 只覆盖变换边界中的垂直位移上限
    pub fn with_max_offset_y(mut self, max_offset_y: f32) -> Self {
        self.transform_bounds
            .get_or_insert_with(Default::default)
            .max_offset_y = Some(max_offset_y);
        self
    }

    /// 覆盖时长边界
    pub fn with_timing(mut self, min: u32, max: u32) -> Self {
        let timing = self.timing.get_or_insert_with(Default::default);
        timing.min = Some(min);
        timing.max = Some(max);
        self
    }

    /// 覆盖帧率下限
    pub fn with_fps_threshold(mut self, fps_threshold: f32) -> Self {
        self.performance
            .get_or_insert_with(Default::default)
            .fps_threshold = Some(fps_threshold);
        self
    }

    /// 开关帧率监控
    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.performance
            .get_or_insert_with(Default::default)
            .monitoring_enabled = Some(enabled);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = MotionConfig::default();
        assert!(config.enabled);
        assert!(!config.reduced_motion);
        assert_eq!(config.device_tier, DeviceTier::Desktop);
        assert_eq!(config.timing.min, 150);
        assert_eq!(config.timing.max, 600);
        assert_eq!(config.transform_bounds.min_opacity, 0.0);
        assert!(config.is_motion_permitted());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_merge_partial_override() {
        let overrides = MotionConfigOverride::from_json(
            r#"{ "timing": { "maxDuration": 800 }, "transformBounds": { "maxOffsetY": 24 } }"#,
        )
        .unwrap();
        let config = MotionConfig::merged(&overrides);

        // 覆盖的字段生效
        assert_eq!(config.timing.max, 800);
        assert_eq!(config.transform_bounds.max_offset_y, 24.0);
        // 同组内未覆盖的字段保持默认
        assert_eq!(config.timing.min, 150);
        assert_eq!(config.transform_bounds.max_offset_x, 40.0);
        assert_eq!(config.performance.fps_threshold, 30.0);
    }

    #[test]
    fn test_builder_overrides() {
        let overrides = MotionConfigOverride::default()
            .with_max_offset_y(40.0)
            .with_timing(100, 400)
            .with_fps_threshold(45.0)
            .with_monitoring(false);
        let config = MotionConfig::merged(&overrides);

        assert_eq!(config.transform_bounds.max_offset_y, 40.0);
        assert_eq!((config.timing.min, config.timing.max), (100, 400));
        assert_eq!(config.performance.fps_threshold, 45.0);
        assert!(!config.performance.monitoring_enabled);
    }

    #[test]
    fn test_permitted_predicate() {
        let mut config = MotionConfig::default();
        config.reduced_motion = true;
        assert!(!config.is_motion_permitted());

        config.reduced_motion = false;
        config.enabled = false;
        assert!(!config.is_motion_permitted());
    }

    #[test]
    fn test_validate_rejects_inverted_timing() {
        let config = MotionConfig::merged(&MotionConfigOverride::default().with_timing(700, 600));
        assert!(matches!(
            config.validate(),
            Err(MotionError::InvalidConfig(_))
        ));

        // 边界相等是合法的
        let config = MotionConfig::merged(&MotionConfigOverride::default().with_timing(300, 300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_negative_bounds() {
        let config = MotionConfig::merged(&MotionConfigOverride::default().with_max_offset_y(-1.0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_roundtrip_keys() {
        let json = serde_json::to_value(MotionConfig::default()).unwrap();
        assert_eq!(json["deviceTier"], "desktop");
        assert_eq!(json["timing"]["staggerStep"], 80);
        assert_eq!(json["performance"]["monitoringEnabled"], true);
        assert_eq!(json["easing"]["primary"], "easeOutCubic");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "performance": {{ "fpsThreshold": 50 }} }}"#).unwrap();

        let overrides = MotionConfigOverride::load(file.path()).unwrap();
        assert_eq!(
            overrides.performance.unwrap().fps_threshold,
            Some(50.0)
        );
    }

    #[test]
    fn test_load_errors() {
        let err = MotionConfigOverride::load("definitely/not/here.json").unwrap_err();
        assert!(matches!(err, MotionError::ConfigIo { .. }));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = MotionConfigOverride::load(file.path()).unwrap_err();
        assert!(matches!(err, MotionError::ConfigParse { .. }));
    }
}
