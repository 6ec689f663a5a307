//! Thumb 指令缓冲区延时

use core::sync::atomic::{compiler_fence, Ordering};

use super::{check_offset, CalibratedDelay};
use crate::error::DelayError;

/// Thumb `nop`
pub const NOP: u16 = 0xBF00;

/// Thumb `bx lr`
pub const RETURN: u16 = 0x4770;

/// 空操作指令缓冲区
///
/// 所有槽位都是 [`NOP`]，只有一个槽位是 [`RETURN`]，这个槽位的下标就是当前偏移。
/// 从槽位 0 跳入执行时，实际执行的 NOP 数等于偏移。
///
/// 缓冲区必须位于可执行的 RAM 中（Cortex-M4 的 SRAM 在未启用 MPU 时可执行）。
#[repr(C, align(4))]
#[derive(Debug, Clone)]
pub struct OpcodeBuffer<const N: usize> {
    words: [u16; N],
    active: usize,
}

impl<const N: usize> OpcodeBuffer<N> {
    /// 创建缓冲区，返回指令位于槽位 0
    pub const fn new() -> Self {
        let mut words = [NOP; N];
        if N > 0 {
            words[0] = RETURN;
        }
        Self { words, active: 0 }
    }

    /// 指令字
    pub fn words(&self) -> &[u16] {
        &self.words
    }

    /// 返回指令的数量，不变量要求恰好为 1
    pub fn return_slots(&self) -> usize {
        self.words.iter().filter(|&&word| word == RETURN).count()
    }

    /// 在主机上解释执行缓冲区，返回到达返回指令前执行的 NOP 数
    pub fn interpret(&self) -> usize {
        self.words
            .iter()
            .position(|&word| word == RETURN)
            .unwrap_or(N)
    }
}

impl<const N: usize> Default for OpcodeBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> CalibratedDelay for OpcodeBuffer<N> {
    fn capacity(&self) -> usize {
        N
    }

    fn active_offset(&self) -> usize {
        self.active
    }

    fn set_active_offset(&mut self, offset: usize) -> Result<(), DelayError> {
        check_offset(offset, N)?;

        // 两条写入之间缓冲区处于无效状态，执行只能发生在两道屏障之外
        compiler_fence(Ordering::SeqCst);
        self.words[self.active] = NOP;
        self.words[offset] = RETURN;
        self.active = offset;
        compiler_fence(Ordering::SeqCst);

        #[cfg(all(target_arch = "arm", target_os = "none"))]
        {
            cortex_m::asm::dsb();
            cortex_m::asm::isb();
        }

        Ok(())
    }

    #[cfg(all(target_arch = "arm", target_os = "none"))]
    #[inline(always)]
    #[allow(unsafe_code)]
    fn execute(&mut self) {
        // 最低位置 1 表示以 Thumb 状态跳转
        let entry = self.words.as_ptr() as usize | 1;
        // SAFETY: 缓冲区只含 NOP 和唯一一条 `bx lr`，执行会在偏移处返回调用者
        let routine: extern "C" fn() = unsafe { core::mem::transmute(entry) };
        routine();
    }

    #[cfg(not(all(target_arch = "arm", target_os = "none")))]
    fn execute(&mut self) {
        for _ in 0..self.interpret() {
            core::hint::spin_loop();
        }
    }
}
