//! # ESP32 RTC domain register map
//!
//! ## Overview
//!
//! Addresses and bit positions of the RTC_CNTL, RTC_IO and SENS registers
//! used to control the ULP coprocessor, plus the location of RTC slow
//! memory. Only the fields the ULP driver touches are listed here.
//!
//! Register addresses are the ones seen by the main CPU. The ULP itself
//! addresses registers through a 2-bit peripheral select and an 8-bit word
//! address, see [`ulp_register`] and [`soc_register`].

/// RTC_CNTL peripheral base.
pub const DR_REG_RTCCNTL_BASE: u32 = 0x3ff4_8000;
/// RTC_IO peripheral base.
pub const DR_REG_RTCIO_BASE: u32 = 0x3ff4_8400;
/// SENS peripheral base.
pub const DR_REG_SENS_BASE: u32 = 0x3ff4_8800;
/// RTC_I2C peripheral base.
pub const DR_REG_RTC_I2C_BASE: u32 = 0x3ff4_8c00;

const RTC_PERIPH_SPAN: u32 = 0x400;
const RTC_PERIPH_COUNT: u32 = 4;

/// Start of RTC slow memory as seen by the main CPU.
pub const RTC_SLOW_MEM_BASE: u32 = 0x5000_0000;
/// Size of RTC slow memory in bytes.
pub const RTC_SLOW_MEM_SIZE: usize = 8 * 1024;
/// Size of RTC slow memory in 32-bit words, the unit the ULP addresses.
pub const RTC_SLOW_MEM_WORDS: usize = RTC_SLOW_MEM_SIZE / 4;

/// Upper bound for the memory reserved for the ULP.
///
/// The last 16 bytes of RTC slow memory are used by the ROM.
pub const ULP_RESERVE_MEM_MAX: usize = RTC_SLOW_MEM_SIZE - 16;

/// RTC_CNTL registers.
#[allow(missing_docs)]
pub mod rtc_cntl {
    use super::DR_REG_RTCCNTL_BASE as BASE;

    pub const OPTIONS0: u32 = BASE + 0x0;
    pub const BIAS_SLEEP_FOLW_8M: u32 = 1 << 14;
    pub const BIAS_I2C_FOLW_8M: u32 = 1 << 17;
    pub const BIAS_CORE_FOLW_8M: u32 = 1 << 20;

    pub const STATE0: u32 = BASE + 0x18;
    pub const SLEEP_EN: u32 = 1 << 31;
    pub const ULP_CP_SLP_TIMER_EN: u32 = 1 << 24;

    pub const TIMER2: u32 = BASE + 0x20;
    pub const ULPCP_TOUCH_START_WAIT_V: u32 = 0x1ff;
    pub const ULPCP_TOUCH_START_WAIT_S: u32 = 15;
    pub const TIMER2_RESET: u32 = 0x10 << ULPCP_TOUCH_START_WAIT_S;

    pub const TIMER5: u32 = BASE + 0x2c;
    pub const MIN_SLP_VAL_V: u32 = 0xff;
    pub const MIN_SLP_VAL_S: u32 = 8;
    pub const MIN_SLP_VAL_MIN: u32 = 2;
    pub const TIMER5_RESET: u32 = (9 << 25) | (0x14 << 16) | (0x80 << MIN_SLP_VAL_S) | 1;

    pub const WAKEUP_STATE: u32 = BASE + 0x38;
    pub const WAKEUP_ENA_V: u32 = 0x7ff;
    pub const WAKEUP_ENA_S: u32 = 11;
    pub const WAKEUP_CAUSE_V: u32 = 0x7ff;
    pub const WAKEUP_CAUSE_S: u32 = 0;
    pub const WAKEUP_STATE_RESET: u32 = 0b1100 << WAKEUP_ENA_S;

    pub const INT_ENA: u32 = BASE + 0x3c;
    pub const INT_RAW: u32 = BASE + 0x40;
    pub const INT_ST: u32 = BASE + 0x44;
    pub const INT_CLR: u32 = BASE + 0x48;
    /// Raised when the ULP executes `WAKE` while the CPU is running.
    pub const ULP_CP_INT: u32 = 1 << 5;

    pub const STORE0: u32 = BASE + 0x4c;
    pub const STORE1: u32 = BASE + 0x50;
    pub const STORE2: u32 = BASE + 0x54;
    pub const STORE3: u32 = BASE + 0x58;
}

/// SENS registers.
#[allow(missing_docs)]
pub mod sens {
    use super::DR_REG_SENS_BASE as BASE;

    /// First of the five `ULP_CP_SLEEP_CYCn` registers, one word apart.
    pub const ULP_CP_SLEEP_CYC0: u32 = BASE + 0x18;
    pub const ULP_CP_SLEEP_CYC_COUNT: usize = 5;
    /// Reset value of the sleep cycle registers.
    pub const ULP_CP_SLEEP_CYC_RESET: u32 = 200;

    pub const SAR_START_FORCE: u32 = BASE + 0x2c;
    pub const PC_INIT_V: u32 = 0x7ff;
    pub const PC_INIT_S: u32 = 11;
    pub const ULP_CP_START_TOP: u32 = 1 << 9;
    pub const ULP_CP_FORCE_START_TOP: u32 = 1 << 8;
    pub const SAR_START_FORCE_RESET: u32 = ULP_CP_FORCE_START_TOP;

    /// Address of sleep cycle register `index`.
    pub const fn ulp_cp_sleep_cyc(index: usize) -> u32 {
        ULP_CP_SLEEP_CYC0 + (index as u32) * 4
    }
}

/// RTC_IO registers.
#[allow(missing_docs)]
pub mod rtc_io {
    use super::DR_REG_RTCIO_BASE as BASE;

    pub const RTC_GPIO_OUT: u32 = BASE + 0x0;
    pub const RTC_GPIO_OUT_W1TS: u32 = BASE + 0x4;
    pub const RTC_GPIO_OUT_W1TC: u32 = BASE + 0x8;
    pub const RTC_GPIO_OUT_DATA_V: u32 = 0x3ffff;
    pub const RTC_GPIO_OUT_DATA_S: u32 = 14;
}

/// Bit of the ULP trigger in the RTC_CNTL wakeup enable and cause bitmaps.
pub const RTC_ULP_TRIG_EN: u32 = 1 << 9;

/// Returns `true` if `addr` is a register of one of the four RTC
/// peripherals the ULP can reach.
pub const fn is_rtc_register(addr: u32) -> bool {
    addr >= DR_REG_RTCCNTL_BASE
        && addr < DR_REG_RTCCNTL_BASE + RTC_PERIPH_SPAN * RTC_PERIPH_COUNT
        && addr % 4 == 0
}

/// Splits a SoC register address into the ULP peripheral select and word
/// address.
///
/// Returns `None` for addresses outside the RTC peripherals.
pub const fn ulp_register(addr: u32) -> Option<(u8, u8)> {
    if !is_rtc_register(addr) {
        return None;
    }
    let periph_sel = (addr - DR_REG_RTCCNTL_BASE) / RTC_PERIPH_SPAN;
    let word = (addr % RTC_PERIPH_SPAN) / 4;
    Some((periph_sel as u8, word as u8))
}

/// Rebuilds the SoC register address from a ULP peripheral select and word
/// address.
pub const fn soc_register(periph_sel: u8, word: u8) -> u32 {
    DR_REG_RTCCNTL_BASE + (periph_sel as u32 & 0b11) * RTC_PERIPH_SPAN + word as u32 * 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_address_mapping() {
        assert_eq!(ulp_register(rtc_cntl::STATE0), Some((0, 0x18 / 4)));
        assert_eq!(ulp_register(rtc_io::RTC_GPIO_OUT_W1TS), Some((1, 1)));
        assert_eq!(ulp_register(sens::SAR_START_FORCE), Some((2, 0x2c / 4)));
        assert_eq!(ulp_register(DR_REG_RTC_I2C_BASE + 0x3fc), Some((3, 0xff)));

        assert_eq!(ulp_register(DR_REG_RTCCNTL_BASE - 4), None);
        assert_eq!(ulp_register(DR_REG_RTC_I2C_BASE + 0x400), None);
        assert_eq!(ulp_register(rtc_cntl::STORE0 + 1), None);

        for addr in [rtc_cntl::STORE3, sens::ulp_cp_sleep_cyc(4), rtc_io::RTC_GPIO_OUT] {
            let (sel, word) = ulp_register(addr).unwrap();
            assert_eq!(soc_register(sel, word), addr);
        }
    }
}
