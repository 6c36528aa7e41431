//! # ULP FSM driver
//!
//! ## Overview
//!
//! The ULP is started by a timer in the RTC domain. Every time the timer
//! expires the coprocessor runs the program from the entry point in
//! `SENS_PC_INIT` until it executes `HALT`, then the timer is rearmed with
//! the sleep period selected by the last `SLEEP` instruction (register
//! `SENS_ULP_CP_SLEEP_CYC0` unless the program selected another one).
//!
//! [`UlpFsm`] is the main CPU side of this protocol:
//!
//! - loading programs into the memory reserved for the ULP,
//! - starting, stopping and resuming the timer,
//! - programming the sleep periods,
//! - enabling the ULP as a deep sleep wakeup source, and the interrupt
//!   raised when the ULP executes `WAKE` while the main CPU is running.
//!
//! ## Configuration
//!
//! [`Config`] holds the size of the memory reserved for the ULP (code, data
//! and the words the program uses to exchange data with the main CPU) and
//! the calibration of the RTC slow clock, which is needed to convert sleep
//! periods from microseconds into clock cycles.
//!
//! ## Examples
//!
//! ```rust, no_run
//! use esp_ulp_fsm::{
//!     bus::RtcDomain,
//!     fsm::{Config, UlpFsm},
//!     insn::{Insn, Reg},
//! };
//! # struct Delay;
//! # impl embedded_hal::delay::DelayNs for Delay { fn delay_ns(&mut self, _: u32) {} }
//! # let mut delay = Delay;
//!
//! const PROGRAM: &[Insn] = &[
//!     Insn::movi(Reg::R1, 200),
//!     Insn::ld(Reg::R0, Reg::R1, 0),
//!     Insn::addi(Reg::R0, Reg::R0, 1),
//!     Insn::st(Reg::R0, Reg::R1, 0),
//!     Insn::halt(),
//! ];
//!
//! let rtc = unsafe { RtcDomain::esp32() };
//! let mut ulp = UlpFsm::new(rtc, Config::default().with_reserved_memory(1024)).unwrap();
//!
//! ulp.load_program(0, PROGRAM).unwrap();
//! ulp.set_wakeup_period(0, 20_000).unwrap();
//! ulp.enable_wakeup();
//! ulp.run(0, &mut delay).unwrap();
//! ```

use embedded_hal::delay::DelayNs;

use crate::{
    Error,
    binary::{self, BinaryHeader},
    bus::RegisterBus,
    insn::{Insn, SLEEP_CYCLE_REGISTERS},
    memory::SlowMemory,
    program,
    soc::{self, rtc_cntl, sens},
};

/// Fractional bits of the slow clock calibration value.
pub const SLOW_CLK_CAL_FRACT: u32 = 19;

/// Slow clock calibration of a nominal 150 kHz RTC slow clock.
pub const DEFAULT_SLOW_CLK_CAL: u32 = ((1_000_000u64 << SLOW_CLK_CAL_FRACT) / 150_000) as u32;

// Slow clock cycles the FSM spends entering and leaving a sleep period.
const PREPARE_SLEEP_CYCLES: u32 = 2;
const WAKEUP_SLEEP_CYCLES: u32 = 2;

/// ULP driver configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Bytes at the start of RTC slow memory reserved for the ULP.
    reserved_memory: usize,
    /// RTC slow clock period in microseconds, Q13.19 fixed point.
    slow_clk_cal: u32,
    /// Time to wait after stopping the timer before the entry point is
    /// changed. Must cover at least one slow clock cycle.
    start_delay_us: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reserved_memory: 512,
            slow_clk_cal: DEFAULT_SLOW_CLK_CAL,
            start_delay_us: 10,
        }
    }
}

impl Config {
    /// Assign the given value to the `reserved_memory` field.
    pub fn with_reserved_memory(mut self, reserved_memory: usize) -> Self {
        self.reserved_memory = reserved_memory;
        self
    }

    /// Assign the given value to the `slow_clk_cal` field.
    pub fn with_slow_clk_cal(mut self, slow_clk_cal: u32) -> Self {
        self.slow_clk_cal = slow_clk_cal;
        self
    }

    /// Assign the given value to the `start_delay_us` field.
    pub fn with_start_delay_us(mut self, start_delay_us: u32) -> Self {
        self.start_delay_us = start_delay_us;
        self
    }

    /// Bytes reserved for the ULP.
    pub fn reserved_memory(&self) -> usize {
        self.reserved_memory
    }

    /// The slow clock calibration value.
    pub fn slow_clk_cal(&self) -> u32 {
        self.slow_clk_cal
    }

    fn validate(&self, memory_bytes: usize) -> Result<(), ConfigError> {
        if self.reserved_memory % 4 != 0 {
            return Err(ConfigError::UnalignedReservedMemory);
        }
        if self.reserved_memory > soc::ULP_RESERVE_MEM_MAX.min(memory_bytes) {
            return Err(ConfigError::ReservedMemoryTooLarge);
        }
        if self.slow_clk_cal == 0 {
            return Err(ConfigError::InvalidSlowClockCalibration);
        }
        if ((self.start_delay_us as u64) << SLOW_CLK_CAL_FRACT) < self.slow_clk_cal as u64 {
            return Err(ConfigError::StartDelayTooShort);
        }
        Ok(())
    }
}

/// ULP driver configuration error
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The reserved memory is not a whole number of words.
    UnalignedReservedMemory,
    /// The reserved memory exceeds RTC slow memory.
    ReservedMemoryTooLarge,
    /// The slow clock calibration value is zero.
    InvalidSlowClockCalibration,
    /// The start delay is shorter than one slow clock cycle.
    StartDelayTooShort,
}

impl core::error::Error for ConfigError {}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match *self {
            ConfigError::UnalignedReservedMemory => {
                write!(f, "The reserved memory must be a multiple of 4 bytes")
            }
            ConfigError::ReservedMemoryTooLarge => {
                write!(
                    f,
                    "The reserved memory exceeds RTC slow memory (at most {} bytes)",
                    soc::ULP_RESERVE_MEM_MAX
                )
            }
            ConfigError::InvalidSlowClockCalibration => {
                write!(f, "The slow clock calibration value must not be zero")
            }
            ConfigError::StartDelayTooShort => {
                write!(f, "The start delay must cover at least one slow clock cycle")
            }
        }
    }
}

bitfield::bitfield! {
    /// Deep sleep wakeup sources, as found in the wakeup enable and wakeup
    /// cause fields of `RTC_CNTL_WAKEUP_STATE_REG`.
    #[derive(Default, Clone, Copy, PartialEq, Eq)]
    pub struct WakeTriggers(u16);
    impl Debug;
    /// EXT0 GPIO wakeup
    pub ext0, set_ext0: 0;
    /// EXT1 GPIO wakeup
    pub ext1, set_ext1: 1;
    /// GPIO wakeup (light sleep only)
    pub gpio, set_gpio: 2;
    /// Timer wakeup
    pub timer, set_timer: 3;
    /// SDIO wakeup (light sleep only)
    pub sdio, set_sdio: 4;
    /// MAC wakeup (light sleep only)
    pub mac, set_mac: 5;
    /// UART0 wakeup (light sleep only)
    pub uart0, set_uart0: 6;
    /// UART1 wakeup (light sleep only)
    pub uart1, set_uart1: 7;
    /// Touch wakeup
    pub touch, set_touch: 8;
    /// ULP wakeup
    pub ulp, set_ulp: 9;
    /// BT wakeup (light sleep only)
    pub bt, set_bt: 10;
}

impl WakeTriggers {
    /// The raw 11-bit bitmap.
    pub fn bits(&self) -> u16 {
        self.0
    }

    /// Triggers from a raw bitmap.
    pub fn from_bits(bits: u16) -> Self {
        Self(bits & soc::rtc_cntl::WAKEUP_ENA_V as u16)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for WakeTriggers {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "WakeTriggers({=u16:#b})", self.0)
    }
}

/// Main CPU side of the ULP FSM coprocessor.
///
/// `R` gives access to the RTC registers and to RTC slow memory, see
/// [`RtcDomain`](crate::bus::RtcDomain) for the chip and
/// [`SimRtc`](crate::sim::SimRtc) for the host model.
#[derive(Debug)]
pub struct UlpFsm<R> {
    rtc: R,
    config: Config,
}

impl<R> UlpFsm<R>
where
    R: RegisterBus + SlowMemory,
{
    /// Creates the driver and applies `config`.
    pub fn new(rtc: R, config: Config) -> Result<Self, ConfigError> {
        let mut this = Self {
            rtc,
            config: Config::default(),
        };
        this.apply_config(&config)?;

        Ok(this)
    }

    /// Change the driver configuration.
    ///
    /// Does not touch the hardware; the new reservation and calibration are
    /// used by the next load and wakeup period update.
    pub fn apply_config(&mut self, config: &Config) -> Result<(), ConfigError> {
        config.validate(self.rtc.len_words() * 4)?;
        self.config = *config;

        Ok(())
    }

    /// The active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Gives back the RTC access.
    pub fn release(self) -> R {
        self.rtc
    }

    /// Shared access to the RTC registers and slow memory.
    pub fn rtc(&self) -> &R {
        &self.rtc
    }

    /// Exclusive access to the RTC registers and slow memory.
    pub fn rtc_mut(&mut self) -> &mut R {
        &mut self.rtc
    }

    fn reserved_words(&self) -> usize {
        self.config.reserved_memory / 4
    }

    /// Loads `program` at word `load_addr`, resolving its label macros.
    ///
    /// Returns the number of words written.
    pub fn load_program(&mut self, load_addr: usize, program: &[Insn]) -> Result<usize, Error> {
        let reserved = self.reserved_words();
        program::load_program(&mut self.rtc, reserved, load_addr, program)
    }

    /// Loads a ULP binary image at word `load_addr`.
    pub fn load_binary(&mut self, load_addr: usize, image: &[u8]) -> Result<BinaryHeader, Error> {
        binary::load_binary(&mut self.rtc, self.config.reserved_memory, load_addr, image)
    }

    /// Starts the ULP timer with the program at word `entry_point`.
    ///
    /// The program first runs when the timer expires, after the sleep
    /// period of `SENS_ULP_CP_SLEEP_CYC0`.
    pub fn run(&mut self, entry_point: usize, delay: &mut impl DelayNs) -> Result<(), Error> {
        if entry_point >= self.reserved_words() {
            warn!("ULP entry point {} is outside the reserved memory", entry_point);
            return Err(Error::EntryPointOutOfRange);
        }

        self.rtc.clear_bits(rtc_cntl::STATE0, rtc_cntl::ULP_CP_SLP_TIMER_EN);

        // let the FSM see at least one slow clock edge with the timer off
        delay.delay_us(self.config.start_delay_us);

        self.rtc.write_field(
            sens::SAR_START_FORCE,
            sens::PC_INIT_V,
            sens::PC_INIT_S,
            entry_point as u32,
        );
        self.rtc.clear_bits(sens::SAR_START_FORCE, sens::ULP_CP_FORCE_START_TOP);

        self.rtc.write_field(
            rtc_cntl::TIMER5,
            rtc_cntl::MIN_SLP_VAL_V,
            rtc_cntl::MIN_SLP_VAL_S,
            rtc_cntl::MIN_SLP_VAL_MIN,
        );

        self.rtc.set_bits(
            rtc_cntl::OPTIONS0,
            rtc_cntl::BIAS_I2C_FOLW_8M | rtc_cntl::BIAS_CORE_FOLW_8M | rtc_cntl::BIAS_SLEEP_FOLW_8M,
        );

        self.rtc.set_bits(rtc_cntl::STATE0, rtc_cntl::ULP_CP_SLP_TIMER_EN);

        debug!("ULP started at {}", entry_point);

        Ok(())
    }

    /// Stops the ULP timer.
    ///
    /// A program that is currently running completes; it is not started
    /// again.
    pub fn timer_stop(&mut self) {
        self.rtc.clear_bits(rtc_cntl::STATE0, rtc_cntl::ULP_CP_SLP_TIMER_EN);
    }

    /// Restarts the ULP timer after [`UlpFsm::timer_stop`].
    pub fn timer_resume(&mut self) {
        self.rtc.set_bits(rtc_cntl::STATE0, rtc_cntl::ULP_CP_SLP_TIMER_EN);
    }

    /// Returns `true` if the ULP timer is enabled.
    pub fn is_timer_running(&self) -> bool {
        self.rtc.read(rtc_cntl::STATE0) & rtc_cntl::ULP_CP_SLP_TIMER_EN != 0
    }

    /// Sets sleep period `index` (0 to 4) to `period_us` microseconds.
    ///
    /// The FSM adds its own start and stop overhead to every period, which
    /// is subtracted here. Periods shorter than that overhead are programmed
    /// as zero cycles.
    pub fn set_wakeup_period(&mut self, index: usize, period_us: u32) -> Result<(), Error> {
        if index >= SLEEP_CYCLE_REGISTERS as usize {
            return Err(Error::InvalidArgument);
        }

        let cycles = ((period_us as u64) << SLOW_CLK_CAL_FRACT) / self.config.slow_clk_cal as u64;
        let min_cycles = (PREPARE_SLEEP_CYCLES
            + WAKEUP_SLEEP_CYCLES
            + self.rtc.read_field(
                rtc_cntl::TIMER2,
                rtc_cntl::ULPCP_TOUCH_START_WAIT_V,
                rtc_cntl::ULPCP_TOUCH_START_WAIT_S,
            )) as u64;

        let cycles = if cycles < min_cycles {
            warn!(
                "Sleep period {} us is shorter than the minimum of {} cycles, clipped to 0",
                period_us, min_cycles
            );
            0
        } else {
            u32::try_from(cycles - min_cycles).map_err(|_| Error::InvalidArgument)?
        };

        self.rtc.write(sens::ulp_cp_sleep_cyc(index), cycles);
        trace!("Sleep period {} = {} cycles", index, cycles);

        Ok(())
    }

    /// Enables the ULP as deep sleep wakeup source.
    pub fn enable_wakeup(&mut self) {
        self.rtc.set_bits(
            rtc_cntl::WAKEUP_STATE,
            soc::RTC_ULP_TRIG_EN << rtc_cntl::WAKEUP_ENA_S,
        );
    }

    /// Disables the ULP as deep sleep wakeup source.
    pub fn disable_wakeup(&mut self) {
        self.rtc.clear_bits(
            rtc_cntl::WAKEUP_STATE,
            soc::RTC_ULP_TRIG_EN << rtc_cntl::WAKEUP_ENA_S,
        );
    }

    /// The enabled deep sleep wakeup sources.
    pub fn wakeup_triggers(&self) -> WakeTriggers {
        WakeTriggers::from_bits(self.rtc.read_field(
            rtc_cntl::WAKEUP_STATE,
            rtc_cntl::WAKEUP_ENA_V,
            rtc_cntl::WAKEUP_ENA_S,
        ) as u16)
    }

    /// The sources of the last deep sleep wakeup.
    pub fn wakeup_cause(&self) -> WakeTriggers {
        WakeTriggers::from_bits(self.rtc.read_field(
            rtc_cntl::WAKEUP_STATE,
            rtc_cntl::WAKEUP_CAUSE_V,
            rtc_cntl::WAKEUP_CAUSE_S,
        ) as u16)
    }

    /// Returns `true` if the ULP woke the chip from deep sleep.
    pub fn woke_from_ulp(&self) -> bool {
        self.wakeup_cause().ulp()
    }

    /// Enables the interrupt raised when the ULP executes `WAKE` while the
    /// main CPU is awake.
    pub fn listen(&mut self) {
        self.rtc.set_bits(rtc_cntl::INT_ENA, rtc_cntl::ULP_CP_INT);
    }

    /// Disables the ULP interrupt.
    pub fn unlisten(&mut self) {
        self.rtc.clear_bits(rtc_cntl::INT_ENA, rtc_cntl::ULP_CP_INT);
    }

    /// Returns `true` if the ULP interrupt is pending and enabled.
    pub fn is_interrupt_set(&self) -> bool {
        self.rtc.read(rtc_cntl::INT_ST) & rtc_cntl::ULP_CP_INT != 0
    }

    /// Clears a pending ULP interrupt.
    pub fn clear_interrupt(&mut self) {
        self.rtc.write(rtc_cntl::INT_CLR, rtc_cntl::ULP_CP_INT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{NoDelay, SimRtc};

    #[test]
    fn default_calibration_is_150khz() {
        // 6.67 us in Q13.19
        assert_eq!(DEFAULT_SLOW_CLK_CAL, 3_495_253);
        assert_eq!(DEFAULT_SLOW_CLK_CAL >> SLOW_CLK_CAL_FRACT, 6);
    }

    #[test]
    fn config_validation() {
        let mut rtc = SimRtc::new();

        let mut err = |config: Config| UlpFsm::new(&mut rtc, config).err();
        assert_eq!(err(Config::default()), None);
        assert_eq!(err(Config::default().with_reserved_memory(8176)), None);
        assert_eq!(
            err(Config::default().with_reserved_memory(8180)),
            Some(ConfigError::ReservedMemoryTooLarge)
        );
        assert_eq!(
            err(Config::default().with_reserved_memory(514)),
            Some(ConfigError::UnalignedReservedMemory)
        );
        assert_eq!(
            err(Config::default().with_slow_clk_cal(0)),
            Some(ConfigError::InvalidSlowClockCalibration)
        );
        assert_eq!(
            err(Config::default().with_start_delay_us(6)),
            Some(ConfigError::StartDelayTooShort)
        );
        assert_eq!(err(Config::default().with_start_delay_us(7)), None);
    }

    #[test]
    fn reservation_is_limited_by_the_memory() {
        let mut mem = [0u32; 16];
        let rtc = crate::bus::RtcDomain::new(SimRtc::new(), &mut mem[..]);

        let mut ulp = UlpFsm::new(rtc, Config::default().with_reserved_memory(64)).unwrap();
        assert_eq!(
            ulp.apply_config(&Config::default().with_reserved_memory(68)),
            Err(ConfigError::ReservedMemoryTooLarge)
        );
        assert_eq!(ulp.config().reserved_memory(), 64);
    }

    #[test]
    fn wakeup_period_conversion() {
        let mut rtc = SimRtc::new();
        // exactly 8 us per cycle
        let config = Config::default().with_slow_clk_cal(8 << SLOW_CLK_CAL_FRACT);
        let mut ulp = UlpFsm::new(&mut rtc, config).unwrap();

        // 1000 cycles minus 2 + 2 + 16 overhead
        ulp.set_wakeup_period(0, 8000).unwrap();
        assert_eq!(ulp.rtc().read(sens::ulp_cp_sleep_cyc(0)), 980);

        ulp.set_wakeup_period(4, 8 * 20).unwrap();
        assert_eq!(ulp.rtc().read(sens::ulp_cp_sleep_cyc(4)), 0);
        ulp.set_wakeup_period(4, 8 * 19).unwrap();
        assert_eq!(ulp.rtc().read(sens::ulp_cp_sleep_cyc(4)), 0);
        ulp.set_wakeup_period(4, 8 * 21).unwrap();
        assert_eq!(ulp.rtc().read(sens::ulp_cp_sleep_cyc(4)), 1);

        assert_eq!(ulp.set_wakeup_period(5, 1000), Err(Error::InvalidArgument));

        // the touch start wait counts towards the overhead
        ulp.rtc_mut().write_field(
            rtc_cntl::TIMER2,
            rtc_cntl::ULPCP_TOUCH_START_WAIT_V,
            rtc_cntl::ULPCP_TOUCH_START_WAIT_S,
            0,
        );
        ulp.set_wakeup_period(1, 8000).unwrap();
        assert_eq!(ulp.rtc().read(sens::ulp_cp_sleep_cyc(1)), 996);
    }

    #[test]
    fn oversized_period_is_rejected() {
        let mut rtc = SimRtc::new();
        let mut ulp = UlpFsm::new(&mut rtc, Config::default().with_slow_clk_cal(1)).unwrap();

        assert_eq!(ulp.set_wakeup_period(0, u32::MAX), Err(Error::InvalidArgument));
    }

    fn min_sleep(rtc: &SimRtc) -> u32 {
        rtc.read_field(rtc_cntl::TIMER5, rtc_cntl::MIN_SLP_VAL_V, rtc_cntl::MIN_SLP_VAL_S)
    }

    #[test]
    fn run_programs_the_start_registers() {
        let mut rtc = SimRtc::new();
        let mut ulp = UlpFsm::new(&mut rtc, Config::default()).unwrap();

        assert!(!ulp.is_timer_running());
        assert_eq!(ulp.run(128, &mut NoDelay), Err(Error::EntryPointOutOfRange));
        assert_eq!(min_sleep(ulp.rtc()), 0x80);

        ulp.run(5, &mut NoDelay).unwrap();
        assert!(ulp.is_timer_running());
        assert_eq!(min_sleep(ulp.rtc()), rtc_cntl::MIN_SLP_VAL_MIN);
        // the other TIMER5 fields keep their reset values
        assert_eq!(
            ulp.rtc().read(rtc_cntl::TIMER5) & !(rtc_cntl::MIN_SLP_VAL_V << rtc_cntl::MIN_SLP_VAL_S),
            (9 << 25) | (0x14 << 16) | 1
        );

        let start = ulp.rtc().read(sens::SAR_START_FORCE);
        assert_eq!((start >> sens::PC_INIT_S) & sens::PC_INIT_V, 5);
        assert_eq!(start & sens::ULP_CP_FORCE_START_TOP, 0);

        let options = ulp.rtc().read(rtc_cntl::OPTIONS0);
        assert_eq!(options, (1 << 14) | (1 << 17) | (1 << 20));

        ulp.timer_stop();
        assert!(!ulp.is_timer_running());
        ulp.timer_resume();
        assert!(ulp.is_timer_running());
    }

    #[test]
    fn wakeup_and_interrupt_bits() {
        let mut rtc = SimRtc::new();
        let mut ulp = UlpFsm::new(&mut rtc, Config::default()).unwrap();

        // timer and GPIO are enabled out of reset
        let triggers = ulp.wakeup_triggers();
        assert!(triggers.timer() && triggers.gpio() && !triggers.ulp());

        ulp.enable_wakeup();
        assert!(ulp.wakeup_triggers().ulp());
        assert_eq!(
            ulp.rtc().read(rtc_cntl::WAKEUP_STATE) >> rtc_cntl::WAKEUP_ENA_S,
            0b10_0000_1100
        );
        ulp.disable_wakeup();
        assert!(!ulp.wakeup_triggers().ulp());
        assert!(!ulp.woke_from_ulp());

        ulp.rtc_mut().write(rtc_cntl::INT_RAW, rtc_cntl::ULP_CP_INT);
        assert!(!ulp.is_interrupt_set());
        ulp.listen();
        assert!(ulp.is_interrupt_set());
        ulp.clear_interrupt();
        assert!(!ulp.is_interrupt_set());
        ulp.unlisten();
        assert_eq!(ulp.rtc().read(rtc_cntl::INT_ENA), 0);
    }

    #[test]
    fn wake_trigger_bits() {
        let mut triggers = WakeTriggers::default();
        triggers.set_ulp(true);
        triggers.set_ext0(true);

        assert_eq!(triggers.bits(), 0b10_0000_0001);
        assert_eq!(WakeTriggers::from_bits(0xffff).bits(), 0x7ff);
    }
}
