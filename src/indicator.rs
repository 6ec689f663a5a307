//! 状态指示
//!
//! 用三色 LED 显示当前阶段，纯信息性质，写入失败不会影响广播。

use embedded_hal::digital::OutputPin;

use crate::error::PeripheralError;
use crate::traits::StatusIndicator;

/// 指示阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorPhase {
    /// 测量中 (红)
    Measuring,
    /// 评估测量结果 (蓝)
    Evaluating,
    /// 调谐中 (青)
    Testing,
    /// 广播中 (绿)
    Broadcasting,
    /// 校准故障 (白)
    Fault,
}

impl IndicatorPhase {
    /// 红、绿、蓝三个通道是否点亮
    pub const fn rgb(&self) -> (bool, bool, bool) {
        match self {
            IndicatorPhase::Measuring => (true, false, false),
            IndicatorPhase::Evaluating => (false, false, true),
            IndicatorPhase::Testing => (false, true, true),
            IndicatorPhase::Broadcasting => (false, true, false),
            IndicatorPhase::Fault => (true, true, true),
        }
    }
}

/// LED 极性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedPolarity {
    /// 高电平点亮
    ActiveHigh,
    /// 低电平点亮
    ActiveLow,
}

/// 三色 LED 指示器
#[derive(Debug)]
pub struct RgbIndicator<R, G, B> {
    red: R,
    green: G,
    blue: B,
    polarity: LedPolarity,
}

impl<R, G, B> RgbIndicator<R, G, B>
where
    R: OutputPin,
    G: OutputPin,
    B: OutputPin,
{
    /// 创建指示器
    pub fn new(red: R, green: G, blue: B, polarity: LedPolarity) -> Self {
        Self {
            red,
            green,
            blue,
            polarity,
        }
    }

    /// 释放引脚
    pub fn release(self) -> (R, G, B) {
        (self.red, self.green, self.blue)
    }
}

fn drive<P: OutputPin>(pin: &mut P, on: bool, polarity: LedPolarity) -> Result<(), PeripheralError> {
    let high = match polarity {
        LedPolarity::ActiveHigh => on,
        LedPolarity::ActiveLow => !on,
    };
    let result = if high { pin.set_high() } else { pin.set_low() };
    result.map_err(|_| PeripheralError::Indicator)
}

impl<R, G, B> StatusIndicator for RgbIndicator<R, G, B>
where
    R: OutputPin,
    G: OutputPin,
    B: OutputPin,
{
    fn set_phase(&mut self, phase: IndicatorPhase) -> Result<(), PeripheralError> {
        let (red, green, blue) = phase.rgb();
        drive(&mut self.red, red, self.polarity)?;
        drive(&mut self.green, green, self.polarity)?;
        drive(&mut self.blue, blue, self.polarity)
    }
}
