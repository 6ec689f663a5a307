//! 外部协作者抽象特征
//!
//! 核心算法只通过这些特征接触硬件：模拟输入、模拟输出、微秒计时器、
//! 状态指示和诊断输出。固件为具体外设实现它们，测试使用 [`crate::testing`] 中的模拟实现。

use core::fmt::{self, Write};

use crate::error::PeripheralError;
use crate::indicator::IndicatorPhase;
use crate::report::TuningReport;

/// 模拟输入外设，按四步轮询完成一次转换
pub trait AnalogInput {
    /// 在配置好的通道上启动一次转换
    fn start_conversion(&mut self);

    /// 转换是否仍处于活动状态
    fn is_active(&mut self) -> bool;

    /// 转换是否已完成
    fn is_complete(&mut self) -> bool;

    /// 读取转换结果
    fn read_result(&mut self) -> u16;
}

/// 模拟输出外设
pub trait AnalogOutput {
    /// 立即写入一个16位样本
    fn write_u16(&mut self, value: u16);
}

/// 单调递增的自由运行微秒计时器
///
/// 核心只对两次读数求差，计数器回绕由 `wrapping_sub` 处理。
pub trait MicrosTimer {
    /// 当前微秒计数
    fn now_us(&mut self) -> u32;

    /// 自 `start` 以来经过的微秒数
    fn micros_since(&mut self, start: u32) -> u32 {
        self.now_us().wrapping_sub(start)
    }
}

/// 状态指示器，每次状态转换调用一次
pub trait StatusIndicator {
    /// 显示当前阶段
    fn set_phase(&mut self, phase: IndicatorPhase) -> Result<(), PeripheralError>;
}

/// 诊断输出，在调谐完成时接收一行报告
pub trait ReportSink {
    /// 输出调谐报告，输出不完整时返回错误
    fn report(&mut self, report: &TuningReport) -> fmt::Result;
}

impl<W: Write> ReportSink for W {
    fn report(&mut self, report: &TuningReport) -> fmt::Result {
        writeln!(self, "{}", report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::String;

    fn report() -> TuningReport {
        TuningReport {
            measured_hz: 547_000.0,
            desired_hz: 546_975.0,
            carrier_hz: 558_000.0,
            offset: 12,
            periods: 12,
        }
    }

    #[test]
    fn test_writer_sink() {
        let mut sink: String<128> = String::new();
        assert_eq!(sink.report(&report()), Ok(()));
        assert!(sink.starts_with("Broadcast: measured=547000.000000"));
        assert!(sink.ends_with("final periods=12\n"));
    }

    #[test]
    fn test_undersized_sink_reports_error() {
        let mut sink: String<32> = String::new();
        assert_eq!(sink.report(&report()), Err(fmt::Error));
        assert!(sink.len() <= 32);
    }
}
