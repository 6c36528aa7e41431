//! # RTC slow memory
//!
//! ## Overview
//!
//! The ULP fetches its program from RTC slow memory and exchanges data with
//! the main CPU through the same region. The ULP addresses it in 32-bit
//! words, so [`SlowMemory`] is word indexed. Byte oriented helpers are
//! provided for loading binary images.
//!
//! A word written by the ULP `ST` instruction carries the stored value in
//! its low half and the program counter of the `ST` in bits 31:21, see
//! [`SlowMemory::read_u16`] and [`SlowMemory::store_pc`].
//!
//! Accessing a word outside the memory panics, like slice indexing does.

use crate::soc::{RTC_SLOW_MEM_BASE, RTC_SLOW_MEM_WORDS};

/// Word addressed memory shared between the main CPU and the ULP.
pub trait SlowMemory {
    /// Size of the memory in 32-bit words.
    fn len_words(&self) -> usize;

    /// Reads the word at `index`.
    fn read_word(&self, index: usize) -> u32;

    /// Writes the word at `index`.
    fn write_word(&mut self, index: usize, value: u32);

    /// Writes `words` to consecutive words starting at `index`.
    fn write_words(&mut self, index: usize, words: &[u32]) {
        for (i, word) in words.iter().enumerate() {
            self.write_word(index + i, *word);
        }
    }

    /// Writes `bytes` starting at byte `offset`.
    ///
    /// Words are little endian. Partially covered words keep their other
    /// bytes.
    fn write_bytes(&mut self, offset: usize, bytes: &[u8]) {
        let mut pos = offset;
        let mut rest = bytes;

        while !rest.is_empty() {
            let index = pos / 4;
            let lane = pos % 4;
            let take = (4 - lane).min(rest.len());

            let mut word = if take == 4 {
                [0; 4]
            } else {
                self.read_word(index).to_le_bytes()
            };
            word[lane..][..take].copy_from_slice(&rest[..take]);
            self.write_word(index, u32::from_le_bytes(word));

            pos += take;
            rest = &rest[take..];
        }
    }

    /// Sets `len` bytes starting at byte `offset` to `value`.
    fn fill_bytes(&mut self, offset: usize, len: usize, value: u8) {
        let mut pos = offset;
        let end = offset + len;

        while pos < end {
            let index = pos / 4;
            let lane = pos % 4;
            let take = (4 - lane).min(end - pos);

            let mut word = self.read_word(index).to_le_bytes();
            word[lane..][..take].fill(value);
            self.write_word(index, u32::from_le_bytes(word));

            pos += take;
        }
    }

    /// The 16-bit value part of the word at `index`.
    fn read_u16(&self, index: usize) -> u16 {
        self.read_word(index) as u16
    }

    /// The program counter an `ST` instruction recorded in the word at
    /// `index`.
    fn store_pc(&self, index: usize) -> u16 {
        (self.read_word(index) >> 21) as u16
    }
}

impl SlowMemory for [u32] {
    fn len_words(&self) -> usize {
        self.len()
    }

    fn read_word(&self, index: usize) -> u32 {
        self[index]
    }

    fn write_word(&mut self, index: usize, value: u32) {
        self[index] = value;
    }

    fn write_words(&mut self, index: usize, words: &[u32]) {
        self[index..][..words.len()].copy_from_slice(words);
    }
}

impl<const N: usize> SlowMemory for [u32; N] {
    fn len_words(&self) -> usize {
        N
    }

    fn read_word(&self, index: usize) -> u32 {
        self[index]
    }

    fn write_word(&mut self, index: usize, value: u32) {
        self[index] = value;
    }

    fn write_words(&mut self, index: usize, words: &[u32]) {
        self[index..][..words.len()].copy_from_slice(words);
    }
}

impl<T> SlowMemory for &mut T
where
    T: SlowMemory + ?Sized,
{
    fn len_words(&self) -> usize {
        (**self).len_words()
    }

    fn read_word(&self, index: usize) -> u32 {
        (**self).read_word(index)
    }

    fn write_word(&mut self, index: usize, value: u32) {
        (**self).write_word(index, value)
    }

    fn write_words(&mut self, index: usize, words: &[u32]) {
        (**self).write_words(index, words)
    }

    fn write_bytes(&mut self, offset: usize, bytes: &[u8]) {
        (**self).write_bytes(offset, bytes)
    }

    fn fill_bytes(&mut self, offset: usize, len: usize, value: u8) {
        (**self).fill_bytes(offset, len, value)
    }
}

/// The 8 KiB RTC slow memory of the ESP32.
///
/// All accesses are volatile.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RtcSlowMemory {
    _private: (),
}

impl RtcSlowMemory {
    /// Creates a handle to RTC slow memory.
    ///
    /// # Safety
    ///
    /// Must only be used on an ESP32. The caller is responsible for not
    /// overwriting memory the application itself places in RTC slow memory
    /// and for not creating more than one handle.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }

    fn ptr(index: usize) -> *mut u32 {
        assert!(index < RTC_SLOW_MEM_WORDS, "RTC slow memory index out of range");
        (RTC_SLOW_MEM_BASE as *mut u32).wrapping_add(index)
    }
}

impl SlowMemory for RtcSlowMemory {
    fn len_words(&self) -> usize {
        RTC_SLOW_MEM_WORDS
    }

    fn read_word(&self, index: usize) -> u32 {
        unsafe { Self::ptr(index).read_volatile() }
    }

    fn write_word(&mut self, index: usize, value: u32) {
        unsafe { Self::ptr(index).write_volatile(value) }
    }
}
