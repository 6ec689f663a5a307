#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

//! # DAC 载波广播库
//!
//! 把微控制器的 DAC 输出变成一个简易的中波发射机：采样模拟输入，
//! 以频率表中某个合法频道的载波把样本重新发射出去。
//!
//! 可达到的载波频率取决于精确的指令执行时间，所以启动时先自校准：
//!
//! 1. MEASURING：对延时缓冲区的每个偏移计时一次突发，得到实测频率
//! 2. 在 偏移 × 频率表 中选出误差最小的组合
//! 3. TESTING：在选中的偏移上再计时一次，算出把载波降到采样率所需的重复次数
//! 4. BROADCASTING：持续发射最新样本
//!
//! ## 特性
//!
//! - 以指令计数控制的延时，见 [`delay`]
//! - 非阻塞的四步 ADC 轮询状态机
//! - 方波与阶梯正弦两种载波波形
//! - 校准失败显式报告，不会静默降级
//! - 所有外设都通过 [`traits`] 中的特征注入，可在主机上测试
//!
//! ## 使用示例
//!
//! ```rust,no_run
//! use dac_broadcaster::testing::{RecordingDac, RecordingIndicator, ScriptedAdc, ScriptedTimer};
//! use dac_broadcaster::{
//!     presets, BroadcastController, Collaborators, FrequencyTable, NeverStop, SpinDelay,
//! };
//!
//! let config = presets::STANDARD;
//! let table = FrequencyTable::medium_wave(config.sample_rate_hz).unwrap();
//!
//! let mut controller = BroadcastController::new(
//!     config,
//!     table,
//!     Collaborators {
//!         adc: ScriptedAdc::new(),
//!         dac: RecordingDac::new(),
//!         delay: SpinDelay::<80>::new(),
//!         timer: ScriptedTimer::new(1),
//!         indicator: RecordingIndicator::new(),
//!         sink: heapless::String::<128>::new(),
//!     },
//! )
//! .unwrap();
//!
//! controller.run(&NeverStop).unwrap();
//! ```

pub mod calibrator;
pub mod config;
pub mod controller;
pub mod delay;
pub mod error;
pub mod indicator;
pub mod report;
pub mod sampler;
pub mod traits;
pub mod transmitter;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// 重新导出主要类型
pub use calibrator::{
    achieved_frequency, evaluate, tuned_periods, BestMatch, Calibrator, Measurements,
    OffsetMeasurement,
};
pub use config::{presets, BroadcastConfig, Channel, FrequencyTable, Waveform, MAX_SLOTS};
pub use controller::{
    BroadcastController, BroadcastState, BroadcastStatistics, Collaborators, NeverStop, StopSignal,
};
pub use delay::{CalibratedDelay, OpcodeBuffer, SpinDelay};
pub use error::{
    BroadcastError, CalibrationError, ConfigError, DelayError, ErrorSeverity, PeripheralError,
    Result,
};
pub use indicator::{IndicatorPhase, LedPolarity, RgbIndicator};
pub use report::TuningReport;
pub use sampler::{SampleState, Sampler};
pub use traits::{AnalogInput, AnalogOutput, MicrosTimer, ReportSink, StatusIndicator};
pub use transmitter::Transmitter;

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 库名称
pub const NAME: &str = env!("CARGO_PKG_NAME");
