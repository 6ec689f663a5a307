//! 忙等延时后端

use super::{check_offset, CalibratedDelay};
use crate::error::DelayError;

/// 忙等延时
///
/// 每次执行自旋 `offset` 个单位。没有可写可执行内存的目标上用它代替
/// [`super::OpcodeBuffer`]，校准过程完全相同，只是每个单位的时长由
/// `spin_loop` 决定而不是由一条 NOP 决定。
#[derive(Debug, Clone, Default)]
pub struct SpinDelay<const N: usize> {
    offset: usize,
    executed_units: u64,
}

impl<const N: usize> SpinDelay<N> {
    /// 创建延时，偏移为 0
    pub const fn new() -> Self {
        Self {
            offset: 0,
            executed_units: 0,
        }
    }

    /// 累计执行的工作单位数
    pub fn executed_units(&self) -> u64 {
        self.executed_units
    }

    /// 清零工作单位计数
    pub fn reset_units(&mut self) {
        self.executed_units = 0;
    }
}

impl<const N: usize> CalibratedDelay for SpinDelay<N> {
    fn capacity(&self) -> usize {
        N
    }

    fn active_offset(&self) -> usize {
        self.offset
    }

    fn set_active_offset(&mut self, offset: usize) -> Result<(), DelayError> {
        check_offset(offset, N)?;
        self.offset = offset;
        Ok(())
    }

    #[inline(never)]
    fn execute(&mut self) {
        for _ in 0..self.offset {
            core::hint::spin_loop();
        }
        self.executed_units += self.offset as u64;
    }
}
