//! # RTC register access
//!
//! ## Overview
//!
//! [`RegisterBus`] is the low level seam of the crate: the driver only ever
//! reads and writes RTC registers through it. On the chip this is [`Mmio`],
//! on the host it is the register file of [`SimRtc`](crate::sim::SimRtc).
//!
//! The field helpers take a mask and a shift, matching how the constants in
//! [`soc`](crate::soc) describe register fields (`*_V` and `*_S`).

use crate::{
    memory::{RtcSlowMemory, SlowMemory},
    soc,
};

/// 32-bit register access by SoC address.
pub trait RegisterBus {
    /// Reads the register at `addr`.
    fn read(&self, addr: u32) -> u32;

    /// Writes the register at `addr`.
    fn write(&mut self, addr: u32, value: u32);

    /// Read-modify-write of the register at `addr`.
    fn modify(&mut self, addr: u32, f: impl FnOnce(u32) -> u32) {
        let value = self.read(addr);
        self.write(addr, f(value));
    }

    /// Sets the bits of `mask`.
    fn set_bits(&mut self, addr: u32, mask: u32) {
        self.modify(addr, |r| r | mask);
    }

    /// Clears the bits of `mask`.
    fn clear_bits(&mut self, addr: u32, mask: u32) {
        self.modify(addr, |r| r & !mask);
    }

    /// Reads the field `mask << shift`, returned shifted down.
    fn read_field(&self, addr: u32, mask: u32, shift: u32) -> u32 {
        (self.read(addr) >> shift) & mask
    }

    /// Writes `value` to the field `mask << shift`, leaving other bits
    /// untouched.
    fn write_field(&mut self, addr: u32, mask: u32, shift: u32, value: u32) {
        self.modify(addr, |r| (r & !(mask << shift)) | ((value & mask) << shift));
    }
}

impl<T> RegisterBus for &mut T
where
    T: RegisterBus + ?Sized,
{
    fn read(&self, addr: u32) -> u32 {
        (**self).read(addr)
    }

    fn write(&mut self, addr: u32, value: u32) {
        (**self).write(addr, value)
    }
}

/// Volatile access to the memory mapped RTC registers.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Mmio {
    _private: (),
}

impl Mmio {
    /// Creates a handle to the RTC registers.
    ///
    /// # Safety
    ///
    /// Must only be used on an ESP32. Other drivers touching RTC_CNTL or
    /// SENS concurrently may race with the read-modify-write helpers.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl RegisterBus for Mmio {
    fn read(&self, addr: u32) -> u32 {
        debug_assert!(soc::is_rtc_register(addr), "not an RTC register");
        unsafe { (addr as *const u32).read_volatile() }
    }

    fn write(&mut self, addr: u32, value: u32) {
        debug_assert!(soc::is_rtc_register(addr), "not an RTC register");
        unsafe { (addr as *mut u32).write_volatile(value) }
    }
}

/// A register bus and a slow memory combined into what the ULP driver
/// needs.
#[derive(Debug)]
pub struct RtcDomain<B = Mmio, M = RtcSlowMemory> {
    /// The register bus.
    pub bus: B,
    /// The slow memory.
    pub memory: M,
}

impl RtcDomain {
    /// The RTC domain of the running ESP32.
    ///
    /// # Safety
    ///
    /// See [`Mmio::new`] and [`RtcSlowMemory::new`].
    pub const unsafe fn esp32() -> Self {
        unsafe {
            Self {
                bus: Mmio::new(),
                memory: RtcSlowMemory::new(),
            }
        }
    }
}

impl<B, M> RtcDomain<B, M> {
    /// Combines `bus` and `memory`.
    pub const fn new(bus: B, memory: M) -> Self {
        Self { bus, memory }
    }
}

impl<B: RegisterBus, M> RegisterBus for RtcDomain<B, M> {
    fn read(&self, addr: u32) -> u32 {
        self.bus.read(addr)
    }

    fn write(&mut self, addr: u32, value: u32) {
        self.bus.write(addr, value)
    }
}

impl<B, M: SlowMemory> SlowMemory for RtcDomain<B, M> {
    fn len_words(&self) -> usize {
        self.memory.len_words()
    }

    fn read_word(&self, index: usize) -> u32 {
        self.memory.read_word(index)
    }

    fn write_word(&mut self, index: usize, value: u32) {
        self.memory.write_word(index, value)
    }

    fn write_words(&mut self, index: usize, words: &[u32]) {
        self.memory.write_words(index, words)
    }

    fn write_bytes(&mut self, offset: usize, bytes: &[u8]) {
        self.memory.write_bytes(offset, bytes)
    }

    fn fill_bytes(&mut self, offset: usize, len: usize, value: u8) {
        self.memory.fill_bytes(offset, len, value)
    }
}
