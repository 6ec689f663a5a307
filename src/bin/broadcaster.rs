#![no_std]
#![no_main]

// DAC 中波广播固件
// 功能：自校准载波频率后持续转发 ADC 采样
// 硬件：STM32F407VG Discovery
// 连接：音频输入 -> PA0 (ADC1_IN0)，天线 <- PA4 (DAC_OUT1)
// LED：PD14 红，PD12 绿，PD15 蓝

use panic_halt as _;

use core::fmt;

use cortex_m_rt::entry;
use log::{error, info, LevelFilter, Metadata, Record};
use rtt_target::{rprint, rprintln, rtt_init_print};

use stm32f4xx_hal::{
    adc::{
        config::{AdcConfig, Resolution, SampleTime, Sequence},
        Adc,
    },
    dac::{DacExt, DacOut, DacPin, C1},
    pac::{self, ADC1, TIM2},
    prelude::*,
    timer::CounterUs,
};

use dac_broadcaster::{
    presets, AnalogInput, AnalogOutput, BroadcastController, Collaborators, FrequencyTable,
    LedPolarity, MicrosTimer, NeverStop, OpcodeBuffer, RgbIndicator, MAX_SLOTS,
};

// 系统时钟，载波频率随它线性变化
const SYSCLK_MHZ: u32 = 168;
const LOG_LEVEL: LevelFilter = LevelFilter::Info;

/// 通过 RTT 输出的日志
struct RttLogger;

impl log::Log for RttLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= LOG_LEVEL
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            rprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: RttLogger = RttLogger;

/// 调谐报告输出到 RTT
struct RttSink;

impl fmt::Write for RttSink {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        rprint!("{}", s);
        Ok(())
    }
}

/// ADC1 四步轮询
///
/// HAL 负责上电和通道配置，状态位直接读寄存器。
struct PolledAdc {
    adc: Adc<ADC1>,
}

impl PolledAdc {
    fn regs() -> &'static pac::adc1::RegisterBlock {
        // SAFETY: 只读取状态位和数据寄存器，ADC1 由本结构独占
        unsafe { &*ADC1::ptr() }
    }
}

impl AnalogInput for PolledAdc {
    fn start_conversion(&mut self) {
        self.adc.start_conversion();
    }

    fn is_active(&mut self) -> bool {
        // 转换真正开始后硬件清除 SWSTART
        Self::regs().cr2.read().swstart().bit_is_set()
    }

    fn is_complete(&mut self) -> bool {
        Self::regs().sr.read().eoc().bit_is_set()
    }

    fn read_result(&mut self) -> u16 {
        // 读数据寄存器同时清除 EOC
        self.adc.current_sample()
    }
}

/// 12 位 DAC 通道 1
struct Dac1 {
    channel: C1,
}

impl AnalogOutput for Dac1 {
    #[inline(always)]
    fn write_u16(&mut self, value: u16) {
        self.channel.set_value(value.min(0x0FFF));
    }
}

/// TIM2 作为 1 MHz 自由运行计数器
struct Tim2Micros {
    counter: CounterUs<TIM2>,
}

impl MicrosTimer for Tim2Micros {
    #[inline(always)]
    fn now_us(&mut self) -> u32 {
        self.counter.now().ticks()
    }
}

#[entry]
fn main() -> ! {
    rtt_init_print!();
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LOG_LEVEL);
    }
    rprintln!("{} v{}", dac_broadcaster::NAME, dac_broadcaster::VERSION);

    let dp = match pac::Peripherals::take() {
        Some(dp) => dp,
        None => halt(),
    };

    let rcc = dp.RCC.constrain();
    let clocks = rcc
        .cfgr
        .use_hse(8.MHz())
        .sysclk(SYSCLK_MHZ.MHz())
        .freeze();

    let gpioa = dp.GPIOA.split();
    let gpiod = dp.GPIOD.split();

    // ADC1 通道 0，12 位，最长采样时间
    let pa0 = gpioa.pa0.into_analog();
    let mut adc = Adc::adc1(dp.ADC1, true, AdcConfig::default().resolution(Resolution::Twelve));
    adc.configure_channel(&pa0, Sequence::One, SampleTime::Cycles_480);
    adc.enable();

    // DAC 通道 1
    let mut channel = dp.DAC.constrain(gpioa.pa4.into_analog());
    channel.enable();

    // 32 位计数器，溢出周期约 71 分钟，差值用回绕减法
    let mut counter = dp.TIM2.counter_us(&clocks);
    if counter.start(u32::MAX.micros()).is_err() {
        halt();
    }

    let indicator = RgbIndicator::new(
        gpiod.pd14.into_push_pull_output(),
        gpiod.pd12.into_push_pull_output(),
        gpiod.pd15.into_push_pull_output(),
        LedPolarity::ActiveHigh,
    );

    let config = presets::STANDARD;
    let table = match FrequencyTable::medium_wave(config.sample_rate_hz) {
        Ok(table) => table,
        Err(e) => {
            error!("frequency table: {}", e);
            halt();
        }
    };

    let parts = Collaborators {
        adc: PolledAdc { adc },
        dac: Dac1 { channel },
        delay: OpcodeBuffer::<MAX_SLOTS>::new(),
        timer: Tim2Micros { counter },
        indicator,
        sink: RttSink,
    };

    let mut controller = match BroadcastController::new(config, table, parts) {
        Ok(controller) => controller,
        Err(e) => {
            error!("startup failed: {}", e);
            halt();
        }
    };

    info!("sysclk {} MHz, calibrating", clocks.sysclk().to_MHz());

    if let Err(e) = controller.run(&NeverStop) {
        error!("error code 0x{:04X}, severity {:?}", e.error_code(), e.severity());
    }
    halt()
}

fn halt() -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}
