//! # 广播配置模块
//!
//! 所有参数都是编译期常量：采样率、突发周期数、测量上限、校准种子、
//! 载波波形以及允许的载波频率表。没有配置文件，也没有持久化状态。

use heapless::Vec;

use crate::error::ConfigError;

/// 延时缓冲区的最大槽位数
pub const MAX_SLOTS: usize = 80;

/// 频率表的最大条目数
pub const MAX_CHANNELS: usize = 96;

/// 默认输出采样率 (Hz)
pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 22_050;

/// 默认测量突发周期数
pub const DEFAULT_MEASURE_PERIODS: u32 = 100_000;

/// 默认调谐突发周期数
pub const DEFAULT_TUNING_PERIODS: u32 = 250_000;

/// 默认校准种子 (Hz)
pub const DEFAULT_SEED_DIFF_HZ: f32 = 558_000.0;

/// 默认允许的载波频率 (Hz)，中波收音机可以调谐到的频道
pub const DEFAULT_CHANNELS_HZ: [f32; 80] = [
    531_000.0, 540_000.0, 549_000.0, 558_000.0, 567_000.0, 576_000.0, 585_000.0, 594_000.0,
    603_000.0, 612_000.0, 621_000.0, 630_000.0, 639_000.0, 648_000.0, 651_000.0, 666_000.0,
    675_000.0, 684_000.0, 693_000.0, 702_000.0, 711_000.0, 720_000.0, 729_000.0, 738_000.0,
    747_000.0, 756_000.0, 765_000.0, 774_000.0, 783_000.0, 792_000.0, 801_000.0, 810_000.0,
    819_000.0, 828_000.0, 837_000.0, 846_000.0, 855_000.0, 864_000.0, 873_000.0, 882_000.0,
    891_000.0, 900_000.0, 909_000.0, 918_000.0, 927_000.0, 936_000.0, 945_000.0, 954_000.0,
    963_000.0, 972_000.0, 981_000.0, 981_000.0, 989_000.0, 990_000.0, 999_000.0, 1_008_000.0,
    1_017_000.0, 1_026_000.0, 1_035_000.0, 1_044_000.0, 1_053_000.0, 1_062_000.0, 1_071_000.0,
    1_080_000.0, 1_089_000.0, 1_098_000.0, 1_107_000.0, 1_115_000.0, 1_116_000.0, 1_125_000.0,
    1_134_000.0, 1_143_000.0, 1_152_000.0, 1_161_000.0, 1_170_000.0, 1_179_000.0, 1_188_000.0,
    1_197_000.0, 1_206_000.0, 1_215_000.0,
];

/// 载波周期波形
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    /// 方波：高电平、零电平两段
    Square,
    /// 阶梯正弦：零、半幅、满幅、半幅四段
    SteppedSine,
}

/// 广播配置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BroadcastConfig {
    /// 输出采样率 (Hz)
    pub sample_rate_hz: u32,
    /// 测量阶段每个偏移的突发周期数
    pub measure_periods: u32,
    /// 调谐阶段的突发周期数
    pub tuning_periods: u32,
    /// 测量的偏移数量，范围 `[0, measure_limit)`
    pub measure_limit: usize,
    /// 校准种子：候选匹配必须严格优于此差值才会被接受
    pub seed_diff_hz: f32,
    /// 载波波形
    pub waveform: Waveform,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastConfig {
    /// 创建默认配置
    pub const fn new() -> Self {
        Self {
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            measure_periods: DEFAULT_MEASURE_PERIODS,
            tuning_periods: DEFAULT_TUNING_PERIODS,
            measure_limit: MAX_SLOTS - 1,
            seed_diff_hz: DEFAULT_SEED_DIFF_HZ,
            waveform: Waveform::Square,
        }
    }

    /// 设置采样率
    pub const fn sample_rate_hz(mut self, sample_rate_hz: u32) -> Self {
        self.sample_rate_hz = sample_rate_hz;
        self
    }

    /// 设置测量突发周期数
    pub const fn measure_periods(mut self, periods: u32) -> Self {
        self.measure_periods = periods;
        self
    }

    /// 设置调谐突发周期数
    pub const fn tuning_periods(mut self, periods: u32) -> Self {
        self.tuning_periods = periods;
        self
    }

    /// 设置测量上限
    pub const fn measure_limit(mut self, limit: usize) -> Self {
        self.measure_limit = limit;
        self
    }

    /// 设置校准种子
    pub const fn seed_diff_hz(mut self, seed: f32) -> Self {
        self.seed_diff_hz = seed;
        self
    }

    /// 设置载波波形
    pub const fn waveform(mut self, waveform: Waveform) -> Self {
        self.waveform = waveform;
        self
    }

    /// 验证配置
    ///
    /// `capacity` 是延时缓冲区的槽位数。测量上限必须至少留出一个槽位，
    /// 这样最后一次测量之后返回指令仍然可以前移一格。
    pub fn validate(&self, capacity: usize) -> Result<(), ConfigError> {
        if self.sample_rate_hz == 0 {
            return Err(ConfigError::InvalidSampleRate);
        }

        if self.measure_periods == 0 {
            return Err(ConfigError::InvalidMeasurePeriods);
        }

        if self.tuning_periods == 0 {
            return Err(ConfigError::InvalidTuningPeriods);
        }

        if self.measure_limit == 0 || self.measure_limit >= capacity || self.measure_limit > MAX_SLOTS
        {
            return Err(ConfigError::InvalidMeasureLimit);
        }

        if !self.seed_diff_hz.is_finite() || self.seed_diff_hz <= 0.0 {
            return Err(ConfigError::InvalidSeed);
        }

        Ok(())
    }
}

/// 频率表中的一个频道
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Channel {
    /// 标称载波频率 (Hz)
    pub carrier_hz: f32,
    /// 减去半个采样率后的目标频率 (Hz)
    pub adjusted_hz: f32,
}

/// 允许的载波频率表
///
/// 构造时每个条目都减去采样率的一半，因为方波采样过程会把发射信号的
/// 有效频谱上移半个采样率。构造之后不可修改。
#[derive(Debug, Clone)]
pub struct FrequencyTable {
    channels: Vec<Channel, MAX_CHANNELS>,
}

impl FrequencyTable {
    /// 从标称载波频率构建频率表
    pub fn new(carriers_hz: &[f32], sample_rate_hz: u32) -> Result<Self, ConfigError> {
        if carriers_hz.is_empty() {
            return Err(ConfigError::EmptyFrequencyTable);
        }
        if sample_rate_hz == 0 {
            return Err(ConfigError::InvalidSampleRate);
        }

        let shift = sample_rate_hz as f32 / 2.0;
        let mut channels = Vec::new();
        for &carrier_hz in carriers_hz {
            if !carrier_hz.is_finite() || carrier_hz <= 0.0 {
                return Err(ConfigError::InvalidFrequency);
            }
            channels
                .push(Channel {
                    carrier_hz,
                    adjusted_hz: carrier_hz - shift,
                })
                .map_err(|_| ConfigError::FrequencyTableFull)?;
        }

        Ok(Self { channels })
    }

    /// 使用默认中波频道构建频率表
    pub fn medium_wave(sample_rate_hz: u32) -> Result<Self, ConfigError> {
        Self::new(&DEFAULT_CHANNELS_HZ, sample_rate_hz)
    }

    /// 频道数量
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// 获取指定频道
    pub fn get(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    /// 按表顺序遍历频道
    pub fn iter(&self) -> core::slice::Iter<'_, Channel> {
        self.channels.iter()
    }
}

/// 预定义配置
pub mod presets {
    use super::*;

    /// 标准配置：每个偏移测量 100 000 个周期
    pub const STANDARD: BroadcastConfig = BroadcastConfig::new();

    /// 快速扫描：测量突发缩短到 10 000 个周期，精度较低但上电更快
    pub const QUICK_SCAN: BroadcastConfig = BroadcastConfig::new()
        .measure_periods(10_000)
        .tuning_periods(25_000);

    /// 阶梯正弦波形的标准配置
    pub const STEPPED_SINE: BroadcastConfig = BroadcastConfig::new().waveform(Waveform::SteppedSine);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BroadcastConfig::default();
        assert_eq!(config.sample_rate_hz, 22_050);
        assert_eq!(config.measure_periods, 100_000);
        assert_eq!(config.tuning_periods, 250_000);
        assert_eq!(config.measure_limit, MAX_SLOTS - 1);
        assert_eq!(config.waveform, Waveform::Square);
        assert_eq!(config.validate(MAX_SLOTS), Ok(()));
    }

    #[test]
    fn test_config_validation() {
        let config = BroadcastConfig::new().sample_rate_hz(0);
        assert_eq!(config.validate(MAX_SLOTS), Err(ConfigError::InvalidSampleRate));

        let config = BroadcastConfig::new().measure_periods(0);
        assert_eq!(config.validate(MAX_SLOTS), Err(ConfigError::InvalidMeasurePeriods));

        let config = BroadcastConfig::new().tuning_periods(0);
        assert_eq!(config.validate(MAX_SLOTS), Err(ConfigError::InvalidTuningPeriods));

        // 测量上限必须给返回指令留出最后一个槽位
        let config = BroadcastConfig::new().measure_limit(MAX_SLOTS);
        assert_eq!(config.validate(MAX_SLOTS), Err(ConfigError::InvalidMeasureLimit));

        let config = BroadcastConfig::new().measure_limit(0);
        assert_eq!(config.validate(MAX_SLOTS), Err(ConfigError::InvalidMeasureLimit));

        let config = BroadcastConfig::new().seed_diff_hz(f32::INFINITY);
        assert_eq!(config.validate(MAX_SLOTS), Err(ConfigError::InvalidSeed));

        let config = BroadcastConfig::new().seed_diff_hz(0.0);
        assert_eq!(config.validate(MAX_SLOTS), Err(ConfigError::InvalidSeed));
    }

    #[test]
    fn test_frequency_table_shift() {
        let table = FrequencyTable::new(&[558_000.0, 900_000.0], 22_050).unwrap();
        assert_eq!(table.len(), 2);

        let channel = table.get(0).unwrap();
        assert_eq!(channel.carrier_hz, 558_000.0);
        assert_eq!(channel.adjusted_hz, 546_975.0);

        let channel = table.get(1).unwrap();
        assert_eq!(channel.adjusted_hz, 888_975.0);
    }

    #[test]
    fn test_frequency_table_errors() {
        assert_eq!(
            FrequencyTable::new(&[], 22_050).unwrap_err(),
            ConfigError::EmptyFrequencyTable
        );
        assert_eq!(
            FrequencyTable::new(&[-1.0], 22_050).unwrap_err(),
            ConfigError::InvalidFrequency
        );
        assert_eq!(
            FrequencyTable::new(&[1.0; MAX_CHANNELS + 1], 22_050).unwrap_err(),
            ConfigError::FrequencyTableFull
        );
    }

    #[test]
    fn test_medium_wave_table_keeps_order() {
        let table = FrequencyTable::medium_wave(DEFAULT_SAMPLE_RATE_HZ).unwrap();
        assert_eq!(table.len(), 80);
        assert_eq!(table.get(0).unwrap().carrier_hz, 531_000.0);
        assert_eq!(table.get(79).unwrap().carrier_hz, 1_215_000.0);
        // 重复的频道保留原样
        assert_eq!(table.get(50).unwrap().carrier_hz, table.get(51).unwrap().carrier_hz);
    }

    #[test]
    fn test_presets() {
        assert_eq!(presets::STANDARD, BroadcastConfig::new());
        assert_eq!(presets::QUICK_SCAN.measure_periods, 10_000);
        assert_eq!(presets::STEPPED_SINE.waveform, Waveform::SteppedSine);
    }
}
