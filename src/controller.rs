//! # 广播控制器
//!
//! 顶层状态机 MEASURING → TESTING → BROADCASTING。每次迭代先推进一步采样状态机，
//! 再执行当前阶段的一次突发，因此发射的值总是最近锁存的样本。
//!
//! - MEASURING：交给 [`Calibrator`] 逐个偏移测量，全部测完后评估并切换到最佳偏移
//! - TESTING：在选中的偏移上再计时一次突发，计算稳态重复次数并输出调谐报告
//! - BROADCASTING：终止状态，每次迭代按调谐后的次数重复发射当前样本
//!
//! 任何校准故障都会让控制器停在故障状态，之后每次 `step()` 返回同一个错误，
//! 不会重新进入 MEASURING。

use core::sync::atomic::{AtomicBool, Ordering};

use log::{error, info, warn};

use crate::calibrator::{achieved_frequency, tuned_periods, BestMatch, Calibrator};
use crate::config::{BroadcastConfig, FrequencyTable};
use crate::delay::CalibratedDelay;
use crate::error::{BroadcastError, CalibrationError, ConfigError, Result};
use crate::indicator::IndicatorPhase;
use crate::report::TuningReport;
use crate::sampler::Sampler;
use crate::traits::{AnalogInput, AnalogOutput, MicrosTimer, ReportSink, StatusIndicator};
use crate::transmitter::Transmitter;

/// 广播状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastState {
    /// 逐个偏移测量载波频率
    Measuring,
    /// 在选中的偏移上调谐重复次数
    Testing,
    /// 持续广播
    Broadcasting,
}

impl BroadcastState {
    /// 对应的指示阶段
    pub const fn phase(&self) -> IndicatorPhase {
        match self {
            BroadcastState::Measuring => IndicatorPhase::Measuring,
            BroadcastState::Testing => IndicatorPhase::Testing,
            BroadcastState::Broadcasting => IndicatorPhase::Broadcasting,
        }
    }
}

/// 停止信号，在每次 BROADCASTING 迭代开始时检查
pub trait StopSignal {
    /// 是否应该停止
    fn should_stop(&self) -> bool;
}

impl StopSignal for AtomicBool {
    fn should_stop(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

/// 永不停止，固件使用
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverStop;

impl StopSignal for NeverStop {
    fn should_stop(&self) -> bool {
        false
    }
}

/// 广播统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastStatistics {
    /// 突发次数
    pub bursts: u32,
    /// 已发射的载波周期数
    pub periods_transmitted: u64,
    /// 已锁存的样本数
    pub samples_latched: u32,
}

impl BroadcastStatistics {
    /// 清零
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 控制器需要的外部协作者
#[derive(Debug)]
pub struct Collaborators<A, O, D, T, I, R> {
    /// 模拟输入
    pub adc: A,
    /// 模拟输出
    pub dac: O,
    /// 校准延时
    pub delay: D,
    /// 微秒计时器
    pub timer: T,
    /// 状态指示器
    pub indicator: I,
    /// 调谐报告输出
    pub sink: R,
}

/// 广播控制器
pub struct BroadcastController<A, O, D, T, I, R> {
    config: BroadcastConfig,
    table: FrequencyTable,
    sampler: Sampler<A>,
    transmitter: Transmitter<O, D>,
    timer: T,
    indicator: I,
    sink: R,
    calibrator: Calibrator,
    state: BroadcastState,
    periods: u32,
    best: Option<BestMatch>,
    report: Option<TuningReport>,
    stats: BroadcastStatistics,
    fault: Option<BroadcastError>,
}

impl<A, O, D, T, I, R> BroadcastController<A, O, D, T, I, R>
where
    A: AnalogInput,
    O: AnalogOutput,
    D: CalibratedDelay,
    T: MicrosTimer,
    I: StatusIndicator,
    R: ReportSink,
{
    /// 创建控制器
    ///
    /// 按延时容量校验配置，把返回指令放回偏移 0，并显示 MEASURING 阶段。
    pub fn new(
        config: BroadcastConfig,
        table: FrequencyTable,
        parts: Collaborators<A, O, D, T, I, R>,
    ) -> Result<Self> {
        let Collaborators {
            adc,
            dac,
            mut delay,
            timer,
            indicator,
            sink,
        } = parts;

        config.validate(delay.capacity())?;
        if table.is_empty() {
            return Err(ConfigError::EmptyFrequencyTable.into());
        }
        delay.set_active_offset(0)?;

        let mut controller = Self {
            calibrator: Calibrator::new(&config),
            periods: config.measure_periods,
            sampler: Sampler::new(adc),
            transmitter: Transmitter::new(dac, delay, config.waveform),
            config,
            table,
            timer,
            indicator,
            sink,
            state: BroadcastState::Measuring,
            best: None,
            report: None,
            stats: BroadcastStatistics::default(),
            fault: None,
        };

        info!(
            "measuring {} offsets against {} channels, {} periods per burst",
            controller.config.measure_limit,
            controller.table.len(),
            controller.config.measure_periods
        );
        controller.show(IndicatorPhase::Measuring);
        Ok(controller)
    }

    /// 执行一次迭代，返回迭代后的状态
    pub fn step(&mut self) -> Result<BroadcastState> {
        if let Some(fault) = self.fault {
            return Err(fault);
        }

        match self.advance() {
            Ok(state) => Ok(state),
            Err(e) => {
                error!("broadcast halted in {:?}: {}", self.state, e);
                self.fault = Some(e);
                self.show(IndicatorPhase::Fault);
                Err(e)
            }
        }
    }

    /// 循环执行直到停止信号或故障
    ///
    /// 停止信号只在 BROADCASTING 迭代开始时检查，校准过程不可中断。
    pub fn run<S: StopSignal + ?Sized>(&mut self, stop: &S) -> Result<()> {
        loop {
            if self.state == BroadcastState::Broadcasting && stop.should_stop() {
                info!("broadcast stopped after {} bursts", self.stats.bursts);
                return Ok(());
            }
            self.step()?;
        }
    }

    fn advance(&mut self) -> Result<BroadcastState> {
        if self.sampler.poll().is_ok() {
            self.stats.samples_latched = self.stats.samples_latched.wrapping_add(1);
        }
        let value = self.sampler.current_value();

        match self.state {
            BroadcastState::Measuring => {
                self.calibrator
                    .measure_offset(&mut self.transmitter, &mut self.timer, value)?;
                self.record_burst(self.calibrator.periods());

                if self.calibrator.is_complete() {
                    self.show(IndicatorPhase::Evaluating);
                    let best = self
                        .calibrator
                        .select_best(&mut self.transmitter, &self.table)?;
                    self.best = Some(best);
                    self.periods = self.config.tuning_periods;
                    self.enter(BroadcastState::Testing);
                }
            }
            BroadcastState::Testing => {
                let report = self.tune(value)?;
                if self.sink.report(&report).is_err() {
                    warn!("tuning report truncated by the diagnostic sink");
                }
                info!("{}", report);
                self.report = Some(report);
                self.enter(BroadcastState::Broadcasting);
            }
            BroadcastState::Broadcasting => {
                self.transmitter.burst(value, self.periods);
                self.record_burst(self.periods);
            }
        }

        Ok(self.state)
    }

    fn tune(&mut self, value: u16) -> Result<TuningReport> {
        let best = self.best.ok_or(CalibrationError::IncompleteMeasurement {
            recorded: self.calibrator.measurements().len(),
            required: self.config.measure_limit,
        })?;

        let start = self.timer.now_us();
        self.transmitter.burst(value, self.periods);
        let elapsed_us = self.timer.micros_since(start);
        self.record_burst(self.periods);

        let offset = self.transmitter.delay().active_offset();
        let measured_hz = achieved_frequency(self.periods, elapsed_us, offset)?;
        let periods = tuned_periods(measured_hz, self.config.sample_rate_hz);
        if periods == 0 {
            warn!(
                "carrier {} Hz is below twice the sample rate, broadcasting silence",
                measured_hz
            );
        }
        self.periods = periods;

        Ok(TuningReport {
            measured_hz,
            desired_hz: best.channel.adjusted_hz,
            carrier_hz: best.channel.carrier_hz,
            offset,
            periods,
        })
    }

    fn enter(&mut self, state: BroadcastState) {
        info!("{:?} -> {:?}", self.state, state);
        self.state = state;
        self.show(state.phase());
    }

    fn show(&mut self, phase: IndicatorPhase) {
        if let Err(e) = self.indicator.set_phase(phase) {
            warn!("status indicator {:?}: {}", phase, e);
        }
    }

    fn record_burst(&mut self, periods: u32) {
        // 广播永不结束，计数器按回绕累加
        self.stats.bursts = self.stats.bursts.wrapping_add(1);
        self.stats.periods_transmitted = self
            .stats
            .periods_transmitted
            .wrapping_add(u64::from(periods));
    }

    /// 当前状态
    pub fn state(&self) -> BroadcastState {
        self.state
    }

    /// 延时缓冲区当前生效的偏移
    pub fn active_offset(&self) -> usize {
        self.transmitter.delay().active_offset()
    }

    /// 每次突发的载波周期数
    pub fn periods(&self) -> u32 {
        self.periods
    }

    /// 评估选出的最佳匹配
    pub fn best_match(&self) -> Option<&BestMatch> {
        self.best.as_ref()
    }

    /// 调谐报告
    pub fn report(&self) -> Option<&TuningReport> {
        self.report.as_ref()
    }

    /// 广播统计
    pub fn statistics(&self) -> &BroadcastStatistics {
        &self.stats
    }

    /// 清零广播统计
    pub fn reset_statistics(&mut self) {
        self.stats.reset();
    }

    /// 导致停机的故障
    pub fn fault(&self) -> Option<BroadcastError> {
        self.fault
    }

    /// 广播配置
    pub fn config(&self) -> &BroadcastConfig {
        &self.config
    }

    /// 校准器
    pub fn calibrator(&self) -> &Calibrator {
        &self.calibrator
    }

    /// 采样状态机
    pub fn sampler(&self) -> &Sampler<A> {
        &self.sampler
    }

    /// 发射器
    pub fn transmitter(&self) -> &Transmitter<O, D> {
        &self.transmitter
    }

    /// 计时器
    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// 状态指示器
    pub fn indicator(&self) -> &I {
        &self.indicator
    }

    /// 报告输出
    pub fn sink(&self) -> &R {
        &self.sink
    }
}
