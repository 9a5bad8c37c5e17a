/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use crate::{
    brotli_error::{ExitCode, Result, err_exit_code},
    codec::DecoderState,
    status::{StreamResult, StreamStatus},
};

/// Incremental decoder over one native decoder state.
///
/// Flow control (`NeedsMoreInput`, `NeedsMoreOutput`) is reported through the
/// returned `StreamResult`, only corrupt input is an error.
#[derive(Debug)]
pub struct StreamDecoder {
    state: DecoderState,

    /// set once the codec has been called for this stream
    started: bool,
    last_status: Option<StreamStatus>,
}

impl StreamDecoder {
    pub fn new() -> Result<Self> {
        Ok(StreamDecoder {
            state: DecoderState::new()?,
            started: false,
            last_status: None,
        })
    }

    pub fn decompress(&mut self, input: &[u8], output: &mut [u8]) -> Result<StreamResult> {
        if !self.started && input.is_empty() {
            return Ok(StreamResult::new(StreamStatus::Ok, 0, 0));
        }
        self.started = true;

        let (status, consumed, produced) = self.state.decompress_stream(input, output);
        self.last_status = Some(status);

        if status == StreamStatus::Error {
            let reason = self.state.error_string();
            log::debug!("decoder failed after {consumed} bytes of input: {reason}");
            return err_exit_code(ExitCode::DecodeError, &reason);
        }

        Ok(StreamResult::new(status, consumed, produced))
    }

    pub fn needs_more_input(&self) -> bool {
        self.last_status == Some(StreamStatus::NeedsMoreInput)
    }

    pub fn needs_more_output(&self) -> bool {
        self.last_status == Some(StreamStatus::NeedsMoreOutput) || self.state.has_more_output()
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }
}
