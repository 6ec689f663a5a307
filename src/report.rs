//! 调谐报告
//!
//! 调谐阶段结束时输出的唯一一行诊断信息。

use core::fmt;

/// 调谐报告
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuningReport {
    /// 实测载波频率 (Hz)
    pub measured_hz: f32,
    /// 减去半个采样率后的目标频率 (Hz)
    pub desired_hz: f32,
    /// 标称载波频率 (Hz)
    pub carrier_hz: f32,
    /// 选中的延时偏移
    pub offset: usize,
    /// 每个样本的载波重复次数
    pub periods: u32,
}

impl TuningReport {
    /// 频率误差 `实测 - 目标` (Hz)，带符号
    pub fn error_hz(&self) -> f32 {
        self.measured_hz - self.desired_hz
    }
}

impl fmt::Display for TuningReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Broadcast: measured={:.6}, desired={:.6} ({:.6}), error={:.6}, final periods={}",
            self.measured_hz,
            self.desired_hz,
            self.carrier_hz,
            self.error_hz(),
            self.periods
        )
    }
}
