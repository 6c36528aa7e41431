//! # ESP32 ULP FSM coprocessor support
//!
//! ## Overview
//!
//! The ESP32 contains an ultra low power (ULP) coprocessor: a small finite
//! state machine with four 16-bit registers that executes programs from RTC
//! slow memory while the main CPU is in deep sleep. It can read and write
//! RTC registers, sample the SAR ADCs and the temperature sensor, talk to
//! RTC I2C slaves and wake the main CPU.
//!
//! This crate covers the main CPU side of working with it:
//!
//! - [`insn`]: the instruction encoding, with `const` constructors so
//!   programs can be written as `const` tables.
//! - [`program`]: the loader for such tables. It resolves the label macros
//!   into branch offsets and addresses.
//! - [`binary`]: the loader for binary images produced by the ULP toolchain.
//! - [`fsm`]: the driver that starts the coprocessor, programs its wakeup
//!   timer and handles the wakeup and interrupt signalling.
//! - [`sim`]: a host model of the RTC domain and the coprocessor, used to
//!   run ULP programs and the driver without hardware.
//!
//! Register and memory access go through the [`bus::RegisterBus`] and
//! [`memory::SlowMemory`] traits.
//!
//! ## Examples
//!
//! ```rust
//! use esp_ulp_fsm::{
//!     fsm::{Config, UlpFsm},
//!     insn::{Insn, Reg},
//!     memory::SlowMemory,
//!     sim::{NoDelay, SimRtc},
//! };
//!
//! const PROGRAM: &[Insn] = &[
//!     Insn::movi(Reg::R3, 0x100),
//!     Insn::ld(Reg::R0, Reg::R3, 0),
//!     Insn::addi(Reg::R0, Reg::R0, 1),
//!     Insn::st(Reg::R0, Reg::R3, 0),
//!     Insn::halt(),
//! ];
//!
//! let mut rtc = SimRtc::new();
//! let mut ulp = UlpFsm::new(&mut rtc, Config::default()).unwrap();
//!
//! ulp.load_program(0, PROGRAM).unwrap();
//! ulp.run(0, &mut NoDelay).unwrap();
//!
//! for _ in 0..3 {
//!     ulp.rtc_mut().run_period().unwrap();
//! }
//! assert_eq!(ulp.rtc().read_u16(0x100), 3);
//! ```
//!
//! ## Feature Flags
#![doc = document_features::document_features!(feature_label = r#"<span class="stab portability"><code>{feature}</code></span>"#)]
#![doc(html_logo_url = "https://avatars.githubusercontent.com/u/46717278")]
#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]

// MUST be the first module
mod fmt;

pub mod binary;
pub mod bus;
pub mod fsm;
pub mod insn;
pub mod memory;
pub mod program;
pub mod sim;
pub mod soc;

pub use self::{
    bus::RegisterBus,
    fsm::UlpFsm,
    insn::Insn,
    memory::SlowMemory,
};

/// Errors returned by the loaders and the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum Error {
    /// An argument is outside the range the hardware supports.
    InvalidArgument,
    /// The program or image does not fit into the reserved memory.
    SizeTooBig,
    /// The load address lies outside the reserved memory.
    LoadAddressOutOfRange,
    /// The entry point lies outside the reserved memory.
    EntryPointOutOfRange,
    /// The binary image does not start with the ULP magic word.
    InvalidMagic,
    /// The binary image size does not match its header.
    InvalidSize,
    /// A label number is defined twice.
    DuplicateLabel,
    /// A relocation macro names a label that is never defined.
    UndefinedLabel,
    /// The program ends with a macro.
    TrailingMacro,
    /// A macro word with an unknown sub-opcode.
    InvalidMacro,
    /// A relocation macro is not followed by an instruction it can patch.
    InvalidRelocation,
    /// A relative branch target is further than 127 words away.
    BranchOutOfRange,
    /// The program defines more labels than the loader can track.
    TooManyLabels,
}

impl core::error::Error for Error {}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}", defmt::Display2Format(self))
    }
}
