//! # 错误处理模块
//!
//! 广播系统是一个闭环控制循环，缓冲区容量和参数都在编译期确定，
//! 因此运行期只有少数几类故障：配置错误、延时缓冲区越界、校准失败
//! 以及状态指示外设的写入失败。

use core::fmt;

/// 库统一结果类型
pub type Result<T> = core::result::Result<T, BroadcastError>;

/// 广播系统错误类型
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BroadcastError {
    /// 配置错误
    Config(ConfigError),
    /// 延时缓冲区错误
    Delay(DelayError),
    /// 校准错误
    Calibration(CalibrationError),
    /// 外设错误
    Peripheral(PeripheralError),
}

impl fmt::Display for BroadcastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BroadcastError::Config(e) => write!(f, "Configuration error: {}", e),
            BroadcastError::Delay(e) => write!(f, "Delay error: {}", e),
            BroadcastError::Calibration(e) => write!(f, "Calibration error: {}", e),
            BroadcastError::Peripheral(e) => write!(f, "Peripheral error: {}", e),
        }
    }
}

impl From<ConfigError> for BroadcastError {
    fn from(error: ConfigError) -> Self {
        BroadcastError::Config(error)
    }
}

impl From<DelayError> for BroadcastError {
    fn from(error: DelayError) -> Self {
        BroadcastError::Delay(error)
    }
}

impl From<CalibrationError> for BroadcastError {
    fn from(error: CalibrationError) -> Self {
        BroadcastError::Calibration(error)
    }
}

impl From<PeripheralError> for BroadcastError {
    fn from(error: PeripheralError) -> Self {
        BroadcastError::Peripheral(error)
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// 警告，可以继续运行
    Warning,
    /// 错误，当前操作失败
    Error,
    /// 致命，广播无法继续
    Fatal,
}

impl BroadcastError {
    /// 获取错误严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            BroadcastError::Peripheral(_) => ErrorSeverity::Warning,
            BroadcastError::Config(_) | BroadcastError::Delay(_) => ErrorSeverity::Error,
            BroadcastError::Calibration(_) => ErrorSeverity::Fatal,
        }
    }

    /// 是否可以恢复
    ///
    /// 校准每次上电只运行一次，没有重试策略，所以校准故障一律不可恢复。
    pub fn is_recoverable(&self) -> bool {
        matches!(self, BroadcastError::Peripheral(_))
    }

    /// 错误代码
    pub fn error_code(&self) -> u16 {
        match self {
            BroadcastError::Config(_) => 0x1000,
            BroadcastError::Delay(_) => 0x2000,
            BroadcastError::Calibration(e) => 0x3000 | e.code(),
            BroadcastError::Peripheral(_) => 0x4000,
        }
    }
}

/// 配置错误类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// 采样率为零
    InvalidSampleRate,
    /// 测量突发周期数为零
    InvalidMeasurePeriods,
    /// 调谐突发周期数为零
    InvalidTuningPeriods,
    /// 测量上限超出延时缓冲区容量
    InvalidMeasureLimit,
    /// 校准种子不是正的有限值
    InvalidSeed,
    /// 频率表为空
    EmptyFrequencyTable,
    /// 频率表条目过多
    FrequencyTableFull,
    /// 频率值不是正的有限值
    InvalidFrequency,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidSampleRate => write!(f, "Sample rate must be non-zero"),
            ConfigError::InvalidMeasurePeriods => write!(f, "Measurement burst must be non-zero"),
            ConfigError::InvalidTuningPeriods => write!(f, "Tuning burst must be non-zero"),
            ConfigError::InvalidMeasureLimit => {
                write!(f, "Measure limit must be within the delay buffer capacity")
            }
            ConfigError::InvalidSeed => write!(f, "Calibration seed must be positive and finite"),
            ConfigError::EmptyFrequencyTable => write!(f, "Frequency table is empty"),
            ConfigError::FrequencyTableFull => write!(f, "Frequency table is full"),
            ConfigError::InvalidFrequency => write!(f, "Frequency must be positive and finite"),
        }
    }
}

/// 延时缓冲区错误类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayError {
    /// 偏移超出缓冲区容量
    OffsetOutOfRange {
        /// 请求的偏移
        offset: usize,
        /// 缓冲区容量
        capacity: usize,
    },
}

impl fmt::Display for DelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DelayError::OffsetOutOfRange { offset, capacity } => {
                write!(f, "Offset {} out of range (capacity {})", offset, capacity)
            }
        }
    }
}

/// 校准错误类型
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationError {
    /// 测得的耗时为零，无法计算频率
    ZeroElapsed {
        /// 出现零耗时的偏移
        offset: usize,
    },
    /// 没有任何偏移/频率组合优于校准种子
    NoMatch {
        /// 校准种子 (Hz)
        seed_diff_hz: f32,
    },
    /// 评估前测量表不完整
    IncompleteMeasurement {
        /// 已记录的测量数
        recorded: usize,
        /// 需要的测量数
        required: usize,
    },
}

impl CalibrationError {
    fn code(&self) -> u16 {
        match self {
            CalibrationError::ZeroElapsed { .. } => 0x01,
            CalibrationError::NoMatch { .. } => 0x02,
            CalibrationError::IncompleteMeasurement { .. } => 0x03,
        }
    }
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationError::ZeroElapsed { offset } => {
                write!(f, "Zero elapsed time measured at offset {}", offset)
            }
            CalibrationError::NoMatch { seed_diff_hz } => {
                write!(f, "No offset beat the calibration seed of {} Hz", seed_diff_hz)
            }
            CalibrationError::IncompleteMeasurement { recorded, required } => {
                write!(f, "Only {} of {} offsets measured", recorded, required)
            }
        }
    }
}

/// 外设错误类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeripheralError {
    /// 状态指示引脚写入失败
    Indicator,
}

impl fmt::Display for PeripheralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeripheralError::Indicator => write!(f, "Status indicator write failed"),
        }
    }
}
