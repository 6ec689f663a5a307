//! # 校准延时模块
//!
//! 普通的阻塞睡眠做不到单条指令粒度的延时，循环也会被编译器引入额外开销。
//! 这里的延时长度只由一个偏移决定：偏移越大，执行的空操作越多。
//!
//! - [`OpcodeBuffer`]：Thumb 指令缓冲区，由 NOP 组成，在偏移处放一条返回指令，
//!   直接跳进缓冲区执行。只在 Cortex-M 目标上真正执行机器码。
//! - [`SpinDelay`]：没有可写可执行内存的主机上的替代实现，按偏移次数忙等。
//!
//! 校准算法与具体后端无关，只依赖 [`CalibratedDelay`]。

mod opcode;
mod spin;

pub use opcode::{OpcodeBuffer, NOP, RETURN};
pub use spin::SpinDelay;

use crate::error::DelayError;

/// 由偏移控制长度的延时
pub trait CalibratedDelay {
    /// 可用的槽位数
    fn capacity(&self) -> usize;

    /// 当前生效的偏移
    fn active_offset(&self) -> usize;

    /// 设置新的偏移
    ///
    /// 要求 `offset < capacity()`，越界时返回错误且不修改任何状态。
    fn set_active_offset(&mut self, offset: usize) -> Result<(), DelayError>;

    /// 执行一次延时，执行的工作量与当前偏移成正比
    fn execute(&mut self);
}

fn check_offset(offset: usize, capacity: usize) -> Result<(), DelayError> {
    if offset >= capacity {
        return Err(DelayError::OffsetOutOfRange { offset, capacity });
    }
    Ok(())
}
