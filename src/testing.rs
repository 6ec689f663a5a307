//! 测试支持模块
//!
//! 提供主机上运行的模拟外设：脚本化的ADC和计时器、记录写入的DAC、
//! 记录阶段的指示器以及模拟GPIO引脚。

use embedded_hal::digital::{Error, ErrorKind, ErrorType, OutputPin};
use heapless::{Deque, Vec};

use crate::error::PeripheralError;
use crate::indicator::IndicatorPhase;
use crate::traits::{AnalogInput, AnalogOutput, MicrosTimer, StatusIndicator};

/// 脚本化的模拟输入
///
/// 每次轮询从对应队列取出下一个标志。队列为空时转换立即就绪：
/// 活动标志为 `false`，完成标志为 `true`，结果重复上一个值。
#[derive(Debug, Default)]
pub struct ScriptedAdc {
    active_flags: Deque<bool, 64>,
    complete_flags: Deque<bool, 64>,
    results: Deque<u16, 64>,
    last_result: u16,
    starts: u32,
    reads: u32,
}

impl ScriptedAdc {
    /// 创建模拟输入
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加活动标志序列
    pub fn push_active(&mut self, flags: &[bool]) {
        for &flag in flags {
            let _ = self.active_flags.push_back(flag);
        }
    }

    /// 追加完成标志序列
    pub fn push_complete(&mut self, flags: &[bool]) {
        for &flag in flags {
            let _ = self.complete_flags.push_back(flag);
        }
    }

    /// 追加一个转换结果
    pub fn push_result(&mut self, value: u16) {
        let _ = self.results.push_back(value);
    }

    /// 启动转换的次数
    pub fn starts(&self) -> u32 {
        self.starts
    }

    /// 读取结果的次数
    pub fn reads(&self) -> u32 {
        self.reads
    }
}

impl AnalogInput for ScriptedAdc {
    fn start_conversion(&mut self) {
        self.starts += 1;
    }

    fn is_active(&mut self) -> bool {
        self.active_flags.pop_front().unwrap_or(false)
    }

    fn is_complete(&mut self) -> bool {
        self.complete_flags.pop_front().unwrap_or(true)
    }

    fn read_result(&mut self) -> u16 {
        self.reads += 1;
        if let Some(value) = self.results.pop_front() {
            self.last_result = value;
        }
        self.last_result
    }
}

/// 记录写入的模拟输出
///
/// 只保存前 64 次写入，计数器记录全部写入次数。
#[derive(Debug, Default)]
pub struct RecordingDac {
    history: Vec<u16, 64>,
    writes: u64,
    last: Option<u16>,
    peak: u16,
}

impl RecordingDac {
    /// 创建模拟输出
    pub fn new() -> Self {
        Self::default()
    }

    /// 前 64 次写入
    pub fn history(&self) -> &[u16] {
        &self.history
    }

    /// 写入总次数
    pub fn writes(&self) -> u64 {
        self.writes
    }

    /// 最后一次写入的值
    pub fn last(&self) -> Option<u16> {
        self.last
    }

    /// 写入过的最大值
    pub fn peak(&self) -> u16 {
        self.peak
    }
}

impl AnalogOutput for RecordingDac {
    fn write_u16(&mut self, value: u16) {
        let _ = self.history.push(value);
        self.writes += 1;
        self.last = Some(value);
        self.peak = self.peak.max(value);
    }
}

/// 脚本化的微秒计时器
///
/// 依次返回预设的读数，读完后每次读取前进 `auto_step_us`。
#[derive(Debug, Default)]
pub struct ScriptedTimer {
    readings: Deque<u32, 256>,
    now: u32,
    auto_step_us: u32,
    reads: u32,
}

impl ScriptedTimer {
    /// 创建计时器，读数从 0 开始
    pub fn new(auto_step_us: u32) -> Self {
        Self {
            auto_step_us,
            ..Self::default()
        }
    }

    /// 按每次突发的耗时生成读数
    ///
    /// 每次突发读取两次计时器，所以 `[a, b]` 生成 `0, a, a, a + b`。
    pub fn from_elapsed(elapsed_us: &[u32]) -> Self {
        Self::from_elapsed_at(0, elapsed_us)
    }

    /// 从指定起始读数生成，用来测试计数器回绕
    pub fn from_elapsed_at(start_us: u32, elapsed_us: &[u32]) -> Self {
        let mut timer = Self::new(0);
        let mut now = start_us;
        for &elapsed in elapsed_us {
            let _ = timer.readings.push_back(now);
            now = now.wrapping_add(elapsed);
            let _ = timer.readings.push_back(now);
        }
        timer.now = now;
        timer
    }

    /// 读取次数
    pub fn reads(&self) -> u32 {
        self.reads
    }

    /// 剩余的预设读数
    pub fn remaining(&self) -> usize {
        self.readings.len()
    }
}

impl MicrosTimer for ScriptedTimer {
    fn now_us(&mut self) -> u32 {
        self.reads += 1;
        match self.readings.pop_front() {
            Some(reading) => reading,
            None => {
                self.now = self.now.wrapping_add(self.auto_step_us);
                self.now
            }
        }
    }
}

/// 记录阶段的指示器
#[derive(Debug, Default)]
pub struct RecordingIndicator {
    phases: Vec<IndicatorPhase, 16>,
    fail: bool,
}

impl RecordingIndicator {
    /// 创建指示器
    pub fn new() -> Self {
        Self::default()
    }

    /// 每次写入都失败的指示器
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// 已显示的阶段
    pub fn phases(&self) -> &[IndicatorPhase] {
        &self.phases
    }

    /// 最后显示的阶段
    pub fn current(&self) -> Option<IndicatorPhase> {
        self.phases.last().copied()
    }
}

impl StatusIndicator for RecordingIndicator {
    fn set_phase(&mut self, phase: IndicatorPhase) -> Result<(), PeripheralError> {
        if self.fail {
            return Err(PeripheralError::Indicator);
        }
        let _ = self.phases.push(phase);
        Ok(())
    }
}

/// 模拟引脚错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockPinError;

impl Error for MockPinError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// 模拟输出引脚
#[derive(Debug, Default)]
pub struct MockPin {
    high: bool,
    fail: bool,
}

impl MockPin {
    /// 创建引脚，初始为低电平
    pub fn new() -> Self {
        Self::default()
    }

    /// 每次写入都失败的引脚
    pub fn failing() -> Self {
        Self {
            high: false,
            fail: true,
        }
    }

    /// 当前是否为高电平
    pub fn is_high(&self) -> bool {
        self.high
    }
}

impl ErrorType for MockPin {
    type Error = MockPinError;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        if self.fail {
            return Err(MockPinError);
        }
        self.high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        if self.fail {
            return Err(MockPinError);
        }
        self.high = true;
        Ok(())
    }
}
