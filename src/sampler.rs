//! # 采样状态机
//!
//! 非阻塞地驱动模拟输入外设。每次 [`Sampler::poll`] 最多推进一次状态转换，
//! 不会让广播循环停下来等待转换完成。
//!
//! ```text
//! StartConversion -> WaitActive -> WaitComplete -> LatchValue -> StartConversion
//! ```

use core::convert::Infallible;

use crate::traits::AnalogInput;

/// 采样状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleState {
    /// 启动转换
    StartConversion,
    /// 等待转换活动标志清除
    WaitActive,
    /// 等待转换完成标志
    WaitComplete,
    /// 锁存转换结果
    LatchValue,
}

/// 采样状态机
///
/// 最近一次锁存的样本只有状态机写、控制器读，两者运行在同一个控制循环里，
/// 所以不需要任何同步。
#[derive(Debug)]
pub struct Sampler<A> {
    adc: A,
    state: SampleState,
    latest: u16,
    latched: u32,
}

impl<A: AnalogInput> Sampler<A> {
    /// 创建采样状态机，初始样本为 0
    pub fn new(adc: A) -> Self {
        Self {
            adc,
            state: SampleState::StartConversion,
            latest: 0,
            latched: 0,
        }
    }

    /// 推进一次状态转换
    ///
    /// 只有在 `LatchValue` 状态锁存新样本时返回 `Ok`，其余情况返回 `WouldBlock`。
    pub fn poll(&mut self) -> nb::Result<u16, Infallible> {
        match self.state {
            SampleState::StartConversion => {
                self.adc.start_conversion();
                self.state = SampleState::WaitActive;
            }
            SampleState::WaitActive => {
                if !self.adc.is_active() {
                    self.state = SampleState::WaitComplete;
                }
            }
            SampleState::WaitComplete => {
                if self.adc.is_complete() {
                    self.state = SampleState::LatchValue;
                }
            }
            SampleState::LatchValue => {
                self.latest = self.adc.read_result();
                self.latched = self.latched.wrapping_add(1);
                self.state = SampleState::StartConversion;
                return Ok(self.latest);
            }
        }
        Err(nb::Error::WouldBlock)
    }

    /// 最近一次锁存的样本，第一次完整转换之前为 0
    pub fn current_value(&self) -> u16 {
        self.latest
    }

    /// 当前状态
    pub fn state(&self) -> SampleState {
        self.state
    }

    /// 已锁存的样本数
    pub fn latched_count(&self) -> u32 {
        self.latched
    }

    /// 访问底层外设
    pub fn adc(&self) -> &A {
        &self.adc
    }

    /// 释放底层外设
    pub fn release(self) -> A {
        self.adc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedAdc;

    #[test]
    fn test_latch_after_full_cycle() {
        let mut adc = ScriptedAdc::new();
        adc.push_active(&[true, true, false]);
        adc.push_complete(&[false, true]);
        adc.push_result(1234);

        let mut sampler = Sampler::new(adc);
        let expected = [
            SampleState::WaitActive,
            SampleState::WaitActive,
            SampleState::WaitActive,
            SampleState::WaitComplete,
            SampleState::WaitComplete,
            SampleState::LatchValue,
        ];

        for state in expected {
            assert_eq!(sampler.poll(), Err(nb::Error::WouldBlock));
            assert_eq!(sampler.state(), state);
            assert_eq!(sampler.current_value(), 0);
        }

        assert_eq!(sampler.poll(), Ok(1234));
        assert_eq!(sampler.state(), SampleState::StartConversion);
        assert_eq!(sampler.current_value(), 1234);
        assert_eq!(sampler.latched_count(), 1);
        assert_eq!(sampler.adc().starts(), 1);
        assert_eq!(sampler.adc().reads(), 1);
    }

    #[test]
    fn test_never_skips_latch() {
        let mut adc = ScriptedAdc::new();
        for value in [10, 20, 30] {
            adc.push_result(value);
        }

        let mut sampler = Sampler::new(adc);
        let mut latched = 0;
        let mut previous = sampler.state();

        for _ in 0..12 {
            let result = sampler.poll();
            let state = sampler.state();
            if result.is_ok() {
                assert_eq!(previous, SampleState::LatchValue);
                latched += 1;
            }
            if state == SampleState::StartConversion {
                assert_eq!(previous, SampleState::LatchValue);
            }
            previous = state;
        }

        // 标志立即就绪时每四次轮询锁存一次
        assert_eq!(latched, 3);
        assert_eq!(sampler.current_value(), 30);
        assert_eq!(sampler.release().reads(), 3);
    }

    #[test]
    fn test_value_stale_until_latched() {
        let mut adc = ScriptedAdc::new();
        adc.push_active(&[true; 8]);
        adc.push_result(999);

        let mut sampler = Sampler::new(adc);
        for _ in 0..9 {
            assert!(sampler.poll().is_err());
        }
        assert_eq!(sampler.state(), SampleState::WaitActive);
        assert_eq!(sampler.current_value(), 0);
    }
}
