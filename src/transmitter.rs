//! # 波形发射器
//!
//! 把一个样本值变成一个载波周期：每写一次DAC电平就执行一次校准延时。
//! 校准和正式广播走的是同一段代码，所以测得的周期就是广播时的周期。

use crate::config::Waveform;
use crate::delay::CalibratedDelay;
use crate::traits::AnalogOutput;

/// 波形发射器
#[derive(Debug)]
pub struct Transmitter<O, D> {
    dac: O,
    delay: D,
    waveform: Waveform,
}

impl<O, D> Transmitter<O, D>
where
    O: AnalogOutput,
    D: CalibratedDelay,
{
    /// 创建发射器
    pub fn new(dac: O, delay: D, waveform: Waveform) -> Self {
        Self {
            dac,
            delay,
            waveform,
        }
    }

    /// 发射一个载波周期
    ///
    /// 方波写两次电平（样本值、零），阶梯正弦写四次（零、半幅、满幅、半幅），
    /// 每次写入后执行一次延时。
    #[inline(always)]
    pub fn transmit_period(&mut self, value: u16) {
        match self.waveform {
            Waveform::Square => {
                self.dac.write_u16(value);
                self.delay.execute();
                self.dac.write_u16(0);
                self.delay.execute();
            }
            Waveform::SteppedSine => {
                let half = value >> 1;
                self.dac.write_u16(0);
                self.delay.execute();
                self.dac.write_u16(half);
                self.delay.execute();
                self.dac.write_u16(value);
                self.delay.execute();
                self.dac.write_u16(half);
                self.delay.execute();
            }
        }
    }

    /// 连续发射 `periods` 个载波周期
    pub fn burst(&mut self, value: u16, periods: u32) {
        for _ in 0..periods {
            self.transmit_period(value);
        }
    }

    /// 载波波形
    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    /// 访问延时后端
    pub fn delay(&self) -> &D {
        &self.delay
    }

    /// 可变访问延时后端，校准器用它移动偏移
    pub fn delay_mut(&mut self) -> &mut D {
        &mut self.delay
    }

    /// 访问DAC
    pub fn dac(&self) -> &O {
        &self.dac
    }

    /// 释放DAC和延时后端
    pub fn release(self) -> (O, D) {
        (self.dac, self.delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delay::SpinDelay;
    use crate::testing::RecordingDac;

    #[test]
    fn test_square_period() {
        let mut delay = SpinDelay::<8>::new();
        delay.set_active_offset(3).unwrap();
        let mut transmitter = Transmitter::new(RecordingDac::new(), delay, Waveform::Square);

        transmitter.transmit_period(4000);

        assert_eq!(transmitter.dac().history(), &[4000, 0]);
        assert_eq!(transmitter.dac().writes(), 2);
        // 两个延时区间
        assert_eq!(transmitter.delay().executed_units(), 6);
    }

    #[test]
    fn test_stepped_sine_period() {
        let mut delay = SpinDelay::<8>::new();
        delay.set_active_offset(1).unwrap();
        let mut transmitter = Transmitter::new(RecordingDac::new(), delay, Waveform::SteppedSine);

        transmitter.transmit_period(4000);

        assert_eq!(transmitter.dac().history(), &[0, 2000, 4000, 2000]);
        assert_eq!(transmitter.delay().executed_units(), 4);
    }

    #[test]
    fn test_burst_repeats_period() {
        let mut transmitter =
            Transmitter::new(RecordingDac::new(), SpinDelay::<8>::new(), Waveform::Square);

        transmitter.burst(7, 10);

        assert_eq!(transmitter.dac().writes(), 20);
        assert_eq!(transmitter.dac().last(), Some(0));
        let (dac, _) = transmitter.release();
        assert!(dac.history().chunks(2).all(|pair| pair == [7, 0]));
    }
}
