/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

//! Outcome of a streaming call, and the packed 64-bit form it takes at the C ABI.
//!
//! The status byte lives in bits 56..63 and is read back with sign extension,
//! the byte count lives in the low 32 bits. A status of zero therefore packs to a
//! plain non-negative count.

use crate::brotli_error::{BrotliBindingError, ExitCode};

pub const STATUS_OK: i8 = 0;
pub const STATUS_ERROR: i8 = -(ExitCode::DecodeError as i8);
pub const STATUS_NEEDS_MORE_INPUT: i8 = -(ExitCode::NeedsMoreInput as i8);
pub const STATUS_NEEDS_MORE_OUTPUT: i8 = -(ExitCode::NeedsMoreOutput as i8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// stream completed (decoder) or call completed (encoder)
    Ok,
    Error,
    NeedsMoreInput,
    NeedsMoreOutput,
}

impl StreamStatus {
    pub fn status_byte(self) -> i8 {
        match self {
            StreamStatus::Ok => STATUS_OK,
            StreamStatus::Error => STATUS_ERROR,
            StreamStatus::NeedsMoreInput => STATUS_NEEDS_MORE_INPUT,
            StreamStatus::NeedsMoreOutput => STATUS_NEEDS_MORE_OUTPUT,
        }
    }

    pub fn from_status_byte(b: i8) -> Option<StreamStatus> {
        match b {
            STATUS_OK => Some(StreamStatus::Ok),
            STATUS_ERROR => Some(StreamStatus::Error),
            STATUS_NEEDS_MORE_INPUT => Some(StreamStatus::NeedsMoreInput),
            STATUS_NEEDS_MORE_OUTPUT => Some(StreamStatus::NeedsMoreOutput),
            _ => None,
        }
    }
}

/// Result of one streaming decoder call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamResult {
    pub status: StreamStatus,
    pub bytes_consumed: usize,
    pub bytes_produced: usize,
}

impl StreamResult {
    pub fn new(status: StreamStatus, bytes_consumed: usize, bytes_produced: usize) -> Self {
        StreamResult {
            status,
            bytes_consumed,
            bytes_produced,
        }
    }

    /// Packed form returned by the C ABI. Only the produced count travels.
    pub fn pack(&self) -> i64 {
        pack_status(self.status.status_byte(), self.bytes_produced as u32)
    }
}

pub fn pack_status(status: i8, count: u32) -> i64 {
    ((status as i64) << 56) | i64::from(count)
}

/// Splits a packed value back into the sign-extended status byte and the count.
pub fn unpack_status(value: i64) -> (i8, u32) {
    ((value >> 56) as i8, (value & 0xFFFF_FFFF) as u32)
}

/// Packs an error so it can be returned from a call that normally returns a packed count.
pub fn pack_error(e: &BrotliBindingError) -> i64 {
    pack_status(-(e.exit_code().as_integer_error_code() as i8), 0)
}
