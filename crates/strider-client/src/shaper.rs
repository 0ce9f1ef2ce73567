//! 速度指令整形
//!
//! 在速度指令进入编码路径之前施加逐轴死区与饱和钳制，
//! 保护机器人不受 UI 协作方传来的微小抖动或越界输入影响。
//! 阈值是策略常量而非推导值，通过 [`ShaperConfig`] 在构造时注入。

/// 整形阈值配置
///
/// 默认值：vx 死区 0.05、上限 3.0 m/s；vy 死区 0.10、上限 1.0 m/s。
/// 角速度不整形（直接透传）。
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShaperConfig {
    /// 前向速度死区（|vx| 低于此值归零）
    pub vx_deadband: f32,
    /// 前向速度上限（保号饱和）
    pub vx_limit: f32,
    /// 侧向速度死区
    pub vy_deadband: f32,
    /// 侧向速度上限
    pub vy_limit: f32,
}

impl Default for ShaperConfig {
    fn default() -> Self {
        Self {
            vx_deadband: 0.05,
            vx_limit: 3.0,
            vy_deadband: 0.10,
            vy_limit: 1.0,
        }
    }
}

/// 速度指令整形器
#[derive(Debug, Clone)]
pub struct CommandShaper {
    config: ShaperConfig,
}

impl CommandShaper {
    pub fn new(config: ShaperConfig) -> Self {
        Self { config }
    }

    /// 整形一条完整的速度指令
    ///
    /// 返回 `(vx, vy, yaw_rate)`；yaw_rate 不做处理。
    pub fn shape(&self, vx: f32, vy: f32, yaw_rate: f32) -> (f32, f32, f32) {
        (self.shape_vx(vx), self.shape_vy(vy), yaw_rate)
    }

    /// 前向速度：死区 + 保号饱和
    pub fn shape_vx(&self, vx: f32) -> f32 {
        shape_axis(vx, self.config.vx_deadband, self.config.vx_limit)
    }

    /// 侧向速度：死区 + 保号饱和
    pub fn shape_vy(&self, vy: f32) -> f32 {
        shape_axis(vy, self.config.vy_deadband, self.config.vy_limit)
    }
}

impl Default for CommandShaper {
    fn default() -> Self {
        Self::new(ShaperConfig::default())
    }
}

fn shape_axis(value: f32, deadband: f32, limit: f32) -> f32 {
    if value.abs() < deadband {
        0.0
    } else if value.abs() > limit {
        limit.copysign(value)
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vx_deadband() {
        let shaper = CommandShaper::default();
        assert_eq!(shaper.shape_vx(0.03), 0.0);
        assert_eq!(shaper.shape_vx(-0.03), 0.0);
        // 死区边界本身不归零
        assert_eq!(shaper.shape_vx(0.05), 0.05);
    }

    #[test]
    fn test_vx_saturation_preserves_sign() {
        let shaper = CommandShaper::default();
        assert_eq!(shaper.shape_vx(5.0), 3.0);
        assert_eq!(shaper.shape_vx(-5.0), -3.0);
        assert_eq!(shaper.shape_vx(1.5), 1.5);
    }

    #[test]
    fn test_vy_deadband_and_saturation() {
        let shaper = CommandShaper::default();
        assert_eq!(shaper.shape_vy(0.05), 0.0);
        assert_eq!(shaper.shape_vy(2.0), 1.0);
        assert_eq!(shaper.shape_vy(-2.0), -1.0);
        assert_eq!(shaper.shape_vy(0.5), 0.5);
    }

    #[test]
    fn test_yaw_rate_passes_through() {
        let shaper = CommandShaper::default();
        let (_, _, yaw) = shaper.shape(0.0, 0.0, 123.456);
        assert_eq!(yaw, 123.456);
    }

    #[test]
    fn test_custom_thresholds() {
        let shaper = CommandShaper::new(ShaperConfig {
            vx_deadband: 0.2,
            vx_limit: 1.0,
            vy_deadband: 0.2,
            vy_limit: 0.5,
        });
        assert_eq!(shaper.shape_vx(0.1), 0.0);
        assert_eq!(shaper.shape_vx(2.0), 1.0);
        assert_eq!(shaper.shape_vy(0.6), 0.5);
    }
}
