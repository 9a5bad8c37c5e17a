/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use crate::{
    brotli_error::{AddContext, ExitCode, Result, err_exit_code},
    codec::{EncoderOperation, EncoderState},
    parameters::BrotliParameters,
};

/// output is staged in steps of this size
pub const STAGING_WINDOW_SIZE: usize = 32 * 1024;

/// Incremental encoder over one native encoder state.
///
/// Each call consumes the whole input it is given and returns the output the
/// codec surfaced during that call. The returned slice borrows the encoder's
/// staging window, so it is only valid until the next call.
#[derive(Debug)]
pub struct StreamEncoder {
    params: BrotliParameters,
    state: EncoderState,
    staging: Vec<u8>,
    finished: bool,
}

impl StreamEncoder {
    pub fn new(params: BrotliParameters) -> Result<Self> {
        Ok(StreamEncoder {
            state: EncoderState::new(&params)?,
            params,
            staging: vec![0; STAGING_WINDOW_SIZE],
            finished: false,
        })
    }

    pub fn parameters(&self) -> &BrotliParameters {
        &self.params
    }

    /// maximum number of bytes accepted by a single call to `process`
    pub fn input_block_size(&self) -> usize {
        self.params.input_block_size()
    }

    pub fn has_more_output(&self) -> bool {
        self.state.has_more_output()
    }

    /// true once a `Finish` operation has completed
    pub fn is_finished(&self) -> bool {
        self.finished && self.state.is_finished()
    }

    pub fn process(&mut self, input: &[u8], op: EncoderOperation) -> Result<&[u8]> {
        if input.len() > self.input_block_size() {
            return err_exit_code(
                ExitCode::InvalidArgument,
                &format!(
                    "input of {} bytes exceeds the input block size of {} bytes, slice it into smaller chunks",
                    input.len(),
                    self.input_block_size()
                ),
            );
        }

        if self.finished {
            // finishing an already finished stream with nothing new is a no-op
            if op == EncoderOperation::Finish && input.is_empty() {
                return Ok(&[]);
            }
            return err_exit_code(
                ExitCode::StreamFinished,
                "stream already finished, no more data can be added",
            );
        }

        let mut remaining = input;
        let mut produced = 0;

        loop {
            if produced == self.staging.len() {
                self.staging.resize(produced + STAGING_WINDOW_SIZE, 0);
            }

            let (c, p) = self
                .state
                .compress_stream(op, remaining, &mut self.staging[produced..])
                .context()
                .inspect_err(|e| log::debug!("encoder call failed: {e}"))?;

            remaining = &remaining[c..];
            produced += p;

            let done = remaining.is_empty()
                && !self.state.has_more_output()
                && (op != EncoderOperation::Finish || self.state.is_finished());
            if done {
                break;
            }

            // output space was available, so a call that moved nothing will never move anything
            if c == 0 && p == 0 {
                return err_exit_code(ExitCode::GeneralFailure, "encoder made no progress");
            }
        }

        if op == EncoderOperation::Finish {
            self.finished = true;
        }

        Ok(&self.staging[..produced])
    }
}
