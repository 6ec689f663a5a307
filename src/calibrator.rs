//! # 载波校准器
//!
//! 载波频率取决于延时缓冲区偏移对应的真实执行时间，无法直接从计时 API 请求。
//! 校准器逐个偏移测量 `periods` 个载波周期的耗时，然后在
//! 偏移 × 目标频率 的全部组合中选出 `|实测 - 目标|` 最小的一对。

use heapless::Vec;
use libm::{fabsf, floorf};
use log::{debug, info};

use crate::config::{BroadcastConfig, Channel, FrequencyTable, MAX_SLOTS};
use crate::delay::CalibratedDelay;
use crate::error::{CalibrationError, Result};
use crate::traits::{AnalogOutput, MicrosTimer};
use crate::transmitter::Transmitter;

/// 每个偏移的测量耗时 (微秒)
///
/// 只能按偏移顺序追加，下标就是偏移。评估之后不再使用。
#[derive(Debug, Clone, Default)]
pub struct Measurements {
    elapsed_us: Vec<u32, MAX_SLOTS>,
}

impl Measurements {
    /// 创建空测量表
    pub const fn new() -> Self {
        Self {
            elapsed_us: Vec::new(),
        }
    }

    /// 从已有耗时构建测量表
    pub fn from_slice(elapsed_us: &[u32]) -> Self {
        let mut measurements = Self::new();
        for &elapsed in elapsed_us.iter().take(MAX_SLOTS) {
            let _ = measurements.elapsed_us.push(elapsed);
        }
        measurements
    }

    /// 记录下一个偏移的耗时，返回该偏移
    pub fn record(&mut self, elapsed_us: u32) -> Option<usize> {
        let offset = self.elapsed_us.len();
        self.elapsed_us.push(elapsed_us).ok()?;
        Some(offset)
    }

    /// 已记录的偏移数量
    pub fn len(&self) -> usize {
        self.elapsed_us.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.elapsed_us.is_empty()
    }

    /// 指定偏移的耗时
    pub fn get(&self, offset: usize) -> Option<u32> {
        self.elapsed_us.get(offset).copied()
    }

    /// 全部耗时
    pub fn as_slice(&self) -> &[u32] {
        &self.elapsed_us
    }

    /// 清空
    pub fn clear(&mut self) {
        self.elapsed_us.clear();
    }
}

/// 最佳匹配
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestMatch {
    /// 延时偏移
    pub offset: usize,
    /// 频率表下标
    pub target_index: usize,
    /// 匹配的频道
    pub channel: Channel,
    /// 该偏移的实测频率 (Hz)
    pub achieved_hz: f32,
    /// `|实测 - 目标|` (Hz)
    pub diff_hz: f32,
}

/// 一次偏移测量
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetMeasurement {
    /// 测量的偏移
    pub offset: usize,
    /// 耗时 (微秒)
    pub elapsed_us: u32,
}

/// 由突发周期数和耗时计算实测频率 (Hz)
///
/// 耗时为零时返回 [`CalibrationError::ZeroElapsed`]，不会产生无穷大或 NaN。
pub fn achieved_frequency(
    periods: u32,
    elapsed_us: u32,
    offset: usize,
) -> core::result::Result<f32, CalibrationError> {
    if elapsed_us == 0 {
        return Err(CalibrationError::ZeroElapsed { offset });
    }
    Ok(periods as f32 * 1_000_000.0 / elapsed_us as f32)
}

/// 稳态每个样本的载波重复次数 `floor(0.5 × 实测 / 采样率)`
///
/// 系数 0.5 来自每个载波周期由高、低两半组成。载波低于两倍采样率时结果为 0，
/// 此时广播突发不发射任何周期。
pub fn tuned_periods(achieved_hz: f32, sample_rate_hz: u32) -> u32 {
    floorf(0.5 * achieved_hz / sample_rate_hz as f32) as u32
}

/// 评估测量表
///
/// 外层按偏移升序，内层按频率表顺序遍历 `[0, measure_limit)` × 频率表。
/// 只有严格小于当前最佳差值的组合才会替换最佳匹配，所以相等时保留先遇到的。
/// 最佳差值以 `seed_diff_hz` 为初值，没有组合优于它时返回
/// [`CalibrationError::NoMatch`]。
pub fn evaluate(
    measurements: &Measurements,
    measure_limit: usize,
    periods: u32,
    table: &FrequencyTable,
    seed_diff_hz: f32,
) -> core::result::Result<BestMatch, CalibrationError> {
    if measurements.len() < measure_limit {
        return Err(CalibrationError::IncompleteMeasurement {
            recorded: measurements.len(),
            required: measure_limit,
        });
    }

    let mut best_diff = seed_diff_hz;
    let mut best = None;

    for (offset, &elapsed_us) in measurements.as_slice()[..measure_limit].iter().enumerate() {
        let achieved_hz = achieved_frequency(periods, elapsed_us, offset)?;
        for (target_index, channel) in table.iter().enumerate() {
            let diff_hz = fabsf(achieved_hz - channel.adjusted_hz);
            if diff_hz < best_diff {
                best_diff = diff_hz;
                best = Some(BestMatch {
                    offset,
                    target_index,
                    channel: *channel,
                    achieved_hz,
                    diff_hz,
                });
            }
        }
    }

    best.ok_or(CalibrationError::NoMatch { seed_diff_hz })
}

/// 载波校准器
///
/// 只在 MEASURING 阶段运行。每次 [`Calibrator::measure_offset`] 测量当前偏移并把
/// 返回指令前移一格；偏移到达 `measure_limit` 后由 [`Calibrator::select_best`]
/// 评估并把返回指令跳到获胜的偏移。
#[derive(Debug, Clone)]
pub struct Calibrator {
    measurements: Measurements,
    offset: usize,
    measure_limit: usize,
    periods: u32,
    seed_diff_hz: f32,
}

impl Calibrator {
    /// 创建校准器，从偏移 0 开始
    pub fn new(config: &BroadcastConfig) -> Self {
        Self {
            measurements: Measurements::new(),
            offset: 0,
            measure_limit: config.measure_limit,
            periods: config.measure_periods,
            seed_diff_hz: config.seed_diff_hz,
        }
    }

    /// 下一个要测量的偏移，测量完成后停在 `measure_limit`
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// 每次测量的突发周期数
    pub fn periods(&self) -> u32 {
        self.periods
    }

    /// 是否已测量完所有偏移
    pub fn is_complete(&self) -> bool {
        self.offset >= self.measure_limit
    }

    /// 已记录的测量
    pub fn measurements(&self) -> &Measurements {
        &self.measurements
    }

    /// 测量当前偏移
    ///
    /// 计时发射 `periods` 个周期，记录耗时，然后把返回指令前移一格。
    pub fn measure_offset<O, D, T>(
        &mut self,
        transmitter: &mut Transmitter<O, D>,
        timer: &mut T,
        value: u16,
    ) -> Result<OffsetMeasurement>
    where
        O: AnalogOutput,
        D: CalibratedDelay,
        T: MicrosTimer,
    {
        let offset = self.offset;

        let start = timer.now_us();
        transmitter.burst(value, self.periods);
        let elapsed_us = timer.micros_since(start);

        self.measurements
            .record(elapsed_us)
            .ok_or(CalibrationError::IncompleteMeasurement {
                recorded: self.measurements.len(),
                required: self.measure_limit,
            })?;
        debug!("offset {} -> {} us", offset, elapsed_us);

        transmitter.delay_mut().set_active_offset(offset + 1)?;
        self.offset = offset + 1;

        Ok(OffsetMeasurement { offset, elapsed_us })
    }

    /// 评估测量表并把延时切换到获胜的偏移
    pub fn select_best<O, D>(
        &mut self,
        transmitter: &mut Transmitter<O, D>,
        table: &FrequencyTable,
    ) -> Result<BestMatch>
    where
        O: AnalogOutput,
        D: CalibratedDelay,
    {
        let best = evaluate(
            &self.measurements,
            self.measure_limit,
            self.periods,
            table,
            self.seed_diff_hz,
        )?;

        transmitter.delay_mut().set_active_offset(best.offset)?;
        self.measurements.clear();

        info!(
            "best match: offset {} -> {} Hz (target {} Hz, diff {} Hz)",
            best.offset, best.achieved_hz, best.channel.carrier_hz, best.diff_hz
        );
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Waveform;
    use crate::delay::SpinDelay;
    use crate::error::BroadcastError;
    use crate::testing::{RecordingDac, ScriptedTimer};

    /// 采样率 2 Hz，使目标频率正好等于标称频率减 1
    fn table(carriers: &[f32]) -> FrequencyTable {
        FrequencyTable::new(carriers, 2).unwrap()
    }

    #[test]
    fn test_achieved_frequency() {
        assert_eq!(
            achieved_frequency(100_000, 179_211, 0).unwrap(),
            100_000.0 * 1_000_000.0 / 179_211.0
        );
        assert_eq!(
            achieved_frequency(100_000, 0, 7),
            Err(CalibrationError::ZeroElapsed { offset: 7 })
        );
    }

    #[test]
    fn test_tuned_periods() {
        assert_eq!(tuned_periods(558_000.0, 22_050), 12);
        assert_eq!(tuned_periods(1_000_000.0, 22_050), 22);
        assert_eq!(tuned_periods(44_100.0, 22_050), 1);
        assert_eq!(tuned_periods(30_000.0, 22_050), 0);
    }

    #[test]
    fn test_evaluate_selects_global_minimum() {
        // 实测频率 1 MHz, 2 MHz, 4 MHz, 8 MHz
        let measurements = Measurements::from_slice(&[1000, 500, 250, 125]);
        let table = table(&[3_000_001.0, 1_900_001.0, 7_000_001.0]);

        let best = evaluate(&measurements, 4, 1000, &table, f32::MAX).unwrap();

        assert_eq!(best.offset, 1);
        assert_eq!(best.target_index, 1);
        assert_eq!(best.achieved_hz, 2_000_000.0);
        assert_eq!(best.channel.adjusted_hz, 1_900_000.0);
        assert_eq!(best.diff_hz, 100_000.0);
    }

    #[test]
    fn test_evaluate_tie_keeps_first() {
        let measurements = Measurements::from_slice(&[1000, 1000]);
        let table = table(&[1_000_101.0, 999_901.0]);

        let best = evaluate(&measurements, 2, 1000, &table, f32::MAX).unwrap();

        assert_eq!(best.offset, 0);
        assert_eq!(best.target_index, 0);
        assert_eq!(best.diff_hz, 100.0);
    }

    #[test]
    fn test_evaluate_ignores_offsets_past_limit() {
        let measurements = Measurements::from_slice(&[1000, 500, 250]);
        let table = table(&[4_000_001.0]);

        let best = evaluate(&measurements, 2, 1000, &table, f32::MAX).unwrap();
        assert_eq!(best.offset, 1);
    }

    #[test]
    fn test_evaluate_requires_complete_measurements() {
        let measurements = Measurements::from_slice(&[1000, 500]);
        let table = table(&[1_000_001.0]);

        assert_eq!(
            evaluate(&measurements, 3, 1000, &table, f32::MAX),
            Err(CalibrationError::IncompleteMeasurement {
                recorded: 2,
                required: 3
            })
        );
    }

    #[test]
    fn test_evaluate_seed_never_beaten() {
        let measurements = Measurements::from_slice(&[1000, 500]);
        let table = table(&[5_000_001.0]);

        assert_eq!(
            evaluate(&measurements, 2, 1000, &table, 10.0),
            Err(CalibrationError::NoMatch { seed_diff_hz: 10.0 })
        );
    }

    #[test]
    fn test_evaluate_zero_elapsed_is_fatal() {
        let measurements = Measurements::from_slice(&[1000, 500, 0, 100]);
        let table = table(&[1_000_001.0]);

        assert_eq!(
            evaluate(&measurements, 4, 1000, &table, f32::MAX),
            Err(CalibrationError::ZeroElapsed { offset: 2 })
        );
    }

    #[test]
    fn test_measure_every_offset_before_evaluation() {
        let config = BroadcastConfig::new()
            .measure_periods(5)
            .measure_limit(4)
            .seed_diff_hz(f32::MAX);
        let mut calibrator = Calibrator::new(&config);
        let mut transmitter =
            Transmitter::new(RecordingDac::new(), SpinDelay::<5>::new(), Waveform::Square);
        let mut timer = ScriptedTimer::from_elapsed(&[50, 40, 30, 20]);
        let table = table(&[250_001.0]);

        for expected in 0..4 {
            assert!(!calibrator.is_complete());
            let measurement = calibrator
                .measure_offset(&mut transmitter, &mut timer, 100)
                .unwrap();
            assert_eq!(measurement.offset, expected);
            assert_eq!(transmitter.delay().active_offset(), expected + 1);
        }

        assert!(calibrator.is_complete());
        assert_eq!(calibrator.measurements().as_slice(), &[50, 40, 30, 20]);
        // 返回指令停在最后一个槽位
        assert_eq!(transmitter.delay().active_offset(), 4);
        assert_eq!(transmitter.dac().writes(), 4 * 5 * 2);

        // 5 个周期 / 20 us = 250 kHz
        let best = calibrator.select_best(&mut transmitter, &table).unwrap();
        assert_eq!(best.offset, 3);
        assert_eq!(best.diff_hz, 0.0);
        assert_eq!(transmitter.delay().active_offset(), 3);
        assert!(calibrator.is_complete());
    }

    #[test]
    fn test_select_best_failure_is_reported() {
        let config = BroadcastConfig::new()
            .measure_periods(1)
            .measure_limit(2)
            .seed_diff_hz(1.0);
        let mut calibrator = Calibrator::new(&config);
        let mut transmitter =
            Transmitter::new(RecordingDac::new(), SpinDelay::<3>::new(), Waveform::Square);
        let mut timer = ScriptedTimer::from_elapsed(&[10, 20]);

        calibrator.measure_offset(&mut transmitter, &mut timer, 0).unwrap();
        calibrator.measure_offset(&mut transmitter, &mut timer, 0).unwrap();

        let result = calibrator.select_best(&mut transmitter, &table(&[1.0e9]));
        assert_eq!(
            result,
            Err(BroadcastError::Calibration(CalibrationError::NoMatch { seed_diff_hz: 1.0 }))
        );
        // 失败时不移动返回指令
        assert_eq!(transmitter.delay().active_offset(), 2);
    }
}
