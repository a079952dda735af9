//! # Fallback 模块
//!
//! 静态回退：动效被禁用或不被允许时，直接把元素写成动画的结束状态。

use tracing::debug;

use crate::descriptor::PropertyMap;
use crate::target::MotionTarget;

/// 是否走静态回退
///
/// 所有绑定入口在创建任何句柄之前都必须先经过这里。
pub fn should_use_static(reduced_motion: bool, enabled: bool) -> bool {
    reduced_motion || !enabled
}

/// 无过渡地写入结束状态
///
/// # 返回
/// 成功写入的属性数量（目标不支持的属性会被跳过）
pub fn apply_final_state(target: &dyn MotionTarget, to_state: &PropertyMap) -> usize {
    let written = to_state
        .iter()
        .filter(|(property, value)| target.set_property(*property, *value))
        .count();
    debug!(target = target.target_id(), written, "应用静态结束状态");
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Property;
    use crate::platform::mock::MockElement;

    #[test]
    fn test_should_use_static_truth_table() {
        assert!(!should_use_static(false, true));
        assert!(should_use_static(true, true));
        assert!(should_use_static(false, false));
        assert!(should_use_static(true, false));
    }

    #[test]
    fn test_apply_final_state() {
        let element = MockElement::new("card");
        let to = PropertyMap::new()
            .with(Property::Opacity, 1.0)
            .with(Property::OffsetY, 0.0)
            .with(Property::Scale, 1.02);

        assert_eq!(apply_final_state(&element, &to), 3);
        assert_eq!(element.value(Property::Opacity), 1.0);
        assert_eq!(element.value(Property::Scale), 1.02);
        assert!(element.was_written(Property::OffsetY));
    }
}
