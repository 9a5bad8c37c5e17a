/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::brotli_error::{ExitCode, Result, err_exit_code};

pub const MIN_QUALITY: u32 = 0;
pub const MAX_QUALITY: u32 = 11;
pub const MIN_WINDOW_BITS: u32 = 10;
pub const MAX_WINDOW_BITS: u32 = 24;
pub const MIN_INPUT_BLOCK_BITS: u32 = 16;
pub const MAX_INPUT_BLOCK_BITS: u32 = 24;

pub const DEFAULT_QUALITY: u32 = 11;
pub const DEFAULT_WINDOW_BITS: u32 = 22;

/// lgblock of 0 lets the encoder derive the block size from the quality
pub const DEFAULT_INPUT_BLOCK_BITS: u32 = 0;

/// Tunes the encoder for a particular kind of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum Mode {
    /// No assumptions about the input.
    Generic = 0,
    /// UTF-8 formatted text.
    Text = 1,
    /// WOFF 2.0 fonts.
    Font = 2,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Generic
    }
}

impl Mode {
    /// Unknown values fall back to generic, which is what the managed side has
    /// always relied on.
    pub fn from_raw(mode: i32) -> Mode {
        Mode::try_from(mode).unwrap_or_default()
    }

    /// value handed to the codec's mode parameter
    pub(crate) fn as_codec_value(self) -> u32 {
        i32::from(self) as u32
    }
}

/// Configuration of an encoder, either for a one-shot compression or a
/// streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrotliParameters {
    pub mode: Mode,

    /// Speed versus density tradeoff. The higher the quality, the slower the compression. Range is 0 to 11.
    pub quality: u32,

    /// Base 2 logarithm of the sliding window size. Range is 10 to 24.
    pub lgwin: u32,

    /// Base 2 logarithm of the maximum input block size. Range is 16 to 24. If set to 0,
    /// the value will be derived from the quality.
    pub lgblock: u32,
}

impl Default for BrotliParameters {
    fn default() -> Self {
        Self {
            mode: Mode::Generic,
            quality: DEFAULT_QUALITY,
            lgwin: DEFAULT_WINDOW_BITS,
            lgblock: DEFAULT_INPUT_BLOCK_BITS,
        }
    }
}

impl BrotliParameters {
    /// Builds parameters from the raw integers that arrive over the C ABI, rejecting
    /// anything negative or out of range.
    pub fn from_raw(mode: i32, quality: i32, lgwin: i32, lgblock: i32) -> Result<Self> {
        if quality < 0 || lgwin < 0 || lgblock < 0 {
            return err_exit_code(
                ExitCode::InvalidParameter,
                "quality, lgwin and lgblock must not be negative",
            );
        }

        let p = BrotliParameters {
            mode: Mode::from_raw(mode),
            quality: quality as u32,
            lgwin: lgwin as u32,
            lgblock: lgblock as u32,
        };
        p.validate()?;
        Ok(p)
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_quality(mut self, quality: u32) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_lgwin(mut self, lgwin: u32) -> Self {
        self.lgwin = lgwin;
        self
    }

    pub fn with_lgblock(mut self, lgblock: u32) -> Self {
        self.lgblock = lgblock;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_QUALITY..=MAX_QUALITY).contains(&self.quality) {
            return err_exit_code(ExitCode::InvalidParameter, "quality out of range 0..11");
        }
        if !(MIN_WINDOW_BITS..=MAX_WINDOW_BITS).contains(&self.lgwin) {
            return err_exit_code(ExitCode::InvalidParameter, "lgwin out of range 10..24");
        }
        if self.lgblock != 0 && !(MIN_INPUT_BLOCK_BITS..=MAX_INPUT_BLOCK_BITS).contains(&self.lgblock)
        {
            return err_exit_code(
                ExitCode::InvalidParameter,
                "lgblock must be 0 or in range 16..24",
            );
        }
        Ok(())
    }

    /// The block size the encoder will actually use. Mirrors the derivation the
    /// codec does internally: the two fastest qualities use the window size,
    /// qualities without block splitting use 14 bits, and lgblock 0 picks 16
    /// bits (up to 18 for the slow qualities with a large window).
    pub fn effective_lgblock(&self) -> u32 {
        if self.quality <= 1 {
            self.lgwin
        } else if self.quality < 4 {
            14
        } else if self.lgblock == 0 {
            if self.quality >= 9 && self.lgwin > 16 {
                self.lgwin.min(18)
            } else {
                16
            }
        } else {
            self.lgblock
                .clamp(MIN_INPUT_BLOCK_BITS, MAX_INPUT_BLOCK_BITS)
        }
    }

    /// Largest input accepted by a single streaming process call.
    pub fn input_block_size(&self) -> usize {
        1usize << self.effective_lgblock()
    }
}
