//! 2-state bit vectors holding the contents of a model port.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A fixed-width 2-state bit vector.
///
/// Bits are packed 32 per word, least significant word first, which is the
/// layout the external simulator uses for signals wider than 64 bits. Bits at
/// or above `width` are always zero.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortValue {
    width: u32,
    words: Vec<u32>,
}

/// Errors from parsing a textual port value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseValueError {
    /// The literal contains a character not valid for its radix.
    #[error("invalid digit '{digit}' in value literal '{literal}'")]
    InvalidDigit {
        /// The offending character.
        digit: char,
        /// The full literal.
        literal: String,
    },
    /// The literal is empty.
    #[error("empty value literal")]
    Empty,
    /// The literal does not fit in the requested width.
    #[error("value '{literal}' does not fit in {width} bits")]
    Overflow {
        /// The full literal.
        literal: String,
        /// The requested width.
        width: u32,
    },
}

impl PortValue {
    /// Creates an all-zero value of the given width.
    pub fn new(width: u32) -> Self {
        Self {
            width,
            words: vec![0; word_count(width)],
        }
    }

    /// Creates a value from a `u64`, discarding bits beyond `width`.
    pub fn from_u64(value: u64, width: u32) -> Self {
        let mut v = Self::new(width);
        if let Some(w) = v.words.get_mut(0) {
            *w = value as u32;
        }
        if let Some(w) = v.words.get_mut(1) {
            *w = (value >> 32) as u32;
        }
        v.mask_top();
        v
    }

    /// Creates a single-bit value.
    pub fn from_bool(value: bool) -> Self {
        Self::from_u64(value as u64, 1)
    }

    /// Creates a value from 32-bit words, least significant first.
    ///
    /// Missing words are zero; extra words and bits beyond `width` are
    /// discarded.
    pub fn from_words(words: &[u32], width: u32) -> Self {
        let mut v = Self::new(width);
        for (dst, src) in v.words.iter_mut().zip(words) {
            *dst = *src;
        }
        v.mask_top();
        v
    }

    /// Returns the width in bits.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the packed words, least significant first.
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Returns the value as a `u64`, or `None` if any bit at index 64 or
    /// above is set.
    pub fn to_u64(&self) -> Option<u64> {
        if self.words.iter().skip(2).any(|w| *w != 0) {
            return None;
        }
        let lo = self.words.first().copied().unwrap_or(0) as u64;
        let hi = self.words.get(1).copied().unwrap_or(0) as u64;
        Some(lo | (hi << 32))
    }

    /// Returns the value truncated to its low 64 bits.
    pub fn low_u64(&self) -> u64 {
        let lo = self.words.first().copied().unwrap_or(0) as u64;
        let hi = self.words.get(1).copied().unwrap_or(0) as u64;
        lo | (hi << 32)
    }

    /// Returns the bit at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.width()`.
    pub fn bit(&self, index: u32) -> bool {
        assert!(
            index < self.width,
            "index {index} out of bounds for width {}",
            self.width
        );
        (self.words[(index / 32) as usize] >> (index % 32)) & 1 != 0
    }

    /// Sets the bit at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.width()`.
    pub fn set_bit(&mut self, index: u32, value: bool) {
        assert!(
            index < self.width,
            "index {index} out of bounds for width {}",
            self.width
        );
        let word = &mut self.words[(index / 32) as usize];
        let mask = 1u32 << (index % 32);
        if value {
            *word |= mask;
        } else {
            *word &= !mask;
        }
    }

    /// Returns true if every bit is zero.
    pub fn is_zero(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Returns the number of significant bits (index of the highest set bit
    /// plus one, or 0 for zero).
    pub fn significant_bits(&self) -> u32 {
        for (i, w) in self.words.iter().enumerate().rev() {
            if *w != 0 {
                return i as u32 * 32 + (32 - w.leading_zeros());
            }
        }
        0
    }

    /// Returns a copy of this value with a different width, truncating or
    /// zero-extending as needed.
    pub fn resized(&self, width: u32) -> Self {
        Self::from_words(&self.words, width)
    }

    /// Parses an MSB-first binary string like `"1010"`.
    ///
    /// The width of the result is the length of the string.
    pub fn from_binary_str(s: &str) -> Result<Self, ParseValueError> {
        if s.is_empty() {
            return Err(ParseValueError::Empty);
        }
        let width = s.len() as u32;
        let mut v = Self::new(width);
        for (i, c) in s.chars().rev().enumerate() {
            match c {
                '0' => {}
                '1' => v.set_bit(i as u32, true),
                _ => {
                    return Err(ParseValueError::InvalidDigit {
                        digit: c,
                        literal: s.to_string(),
                    })
                }
            }
        }
        Ok(v)
    }

    /// Parses a hex string like `"A5"`. Each digit contributes 4 bits.
    pub fn from_hex_str(s: &str) -> Result<Self, ParseValueError> {
        if s.is_empty() {
            return Err(ParseValueError::Empty);
        }
        let width = s.len() as u32 * 4;
        let mut v = Self::new(width);
        for (hex_idx, c) in s.chars().rev().enumerate() {
            let nibble = c.to_digit(16).ok_or_else(|| ParseValueError::InvalidDigit {
                digit: c,
                literal: s.to_string(),
            })?;
            let bit = hex_idx as u32 * 4;
            v.words[(bit / 32) as usize] |= nibble << (bit % 32);
        }
        Ok(v)
    }

    /// Parses a literal for a port of `width` bits.
    ///
    /// Accepts `0x`/`0b` prefixed hex and binary, or plain decimal that fits
    /// in 64 bits. Underscores are ignored. The literal must fit in `width`.
    pub fn parse(literal: &str, width: u32) -> Result<Self, ParseValueError> {
        let cleaned: String = literal.trim().chars().filter(|c| *c != '_').collect();
        let parsed = if let Some(hex) = cleaned
            .strip_prefix("0x")
            .or_else(|| cleaned.strip_prefix("0X"))
        {
            Self::from_hex_str(hex)?
        } else if let Some(bin) = cleaned
            .strip_prefix("0b")
            .or_else(|| cleaned.strip_prefix("0B"))
        {
            Self::from_binary_str(bin)?
        } else {
            if cleaned.is_empty() {
                return Err(ParseValueError::Empty);
            }
            if let Some(c) = cleaned.chars().find(|c| !c.is_ascii_digit()) {
                return Err(ParseValueError::InvalidDigit {
                    digit: c,
                    literal: literal.to_string(),
                });
            }
            let n: u64 = cleaned.parse().map_err(|_| ParseValueError::Overflow {
                literal: literal.to_string(),
                width,
            })?;
            Self::from_u64(n, 64)
        };
        if parsed.significant_bits() > width {
            return Err(ParseValueError::Overflow {
                literal: literal.to_string(),
                width,
            });
        }
        Ok(parsed.resized(width))
    }

    /// Formats the value as MSB-first binary with leading zeros stripped,
    /// as used in VCD vector changes.
    pub fn to_vcd_bits(&self) -> String {
        let significant = self.significant_bits().max(1);
        (0..significant)
            .rev()
            .map(|i| if self.bit(i) { '1' } else { '0' })
            .collect()
    }

    /// Formats the value as lowercase hex without prefix.
    pub fn to_hex_string(&self) -> String {
        let digits = self.width.div_ceil(4).max(1);
        (0..digits)
            .rev()
            .map(|d| {
                let bit = d * 4;
                let word = self.words.get((bit / 32) as usize).copied().unwrap_or(0);
                let nibble = (word >> (bit % 32)) & 0xf;
                std::char::from_digit(nibble, 16).unwrap_or('0')
            })
            .collect()
    }

    fn mask_top(&mut self) {
        let rem = self.width % 32;
        if rem != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u32 << rem) - 1;
            }
        }
    }
}

impl fmt::Display for PortValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in (0..self.width).rev() {
            write!(f, "{}", if self.bit(i) { '1' } else { '0' })?;
        }
        Ok(())
    }
}

impl fmt::Debug for PortValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PortValue({}'h{})", self.width, self.to_hex_string())
    }
}

/// Returns the number of 32-bit words needed for `width` bits.
fn word_count(width: u32) -> usize {
    width.div_ceil(32) as usize
}
