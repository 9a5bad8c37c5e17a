/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

//! Lifecycle wrapper shared by the encode and decode sessions.
//!
//! A session starts out uninitialized, becomes ready on `init` and is closed by
//! `close`. `init` may be called again at any time and replaces the native state.
//! Buffer descriptors are validated before the lifecycle is checked, and the
//! lifecycle is checked before anything else.

use crate::{
    brotli_error::{ExitCode, Result, err_exit_code},
    buffer::{InputBuffer, OutputBuffer},
    codec::EncoderOperation,
    parameters::BrotliParameters,
    status::StreamResult,
    stream_decoder::StreamDecoder,
    stream_encoder::StreamEncoder,
};

#[derive(Debug)]
enum SessionState<T> {
    Uninitialized,
    Ready(T),
    Closed,
}

/// Owns at most one native codec state for the lifetime of a stream.
///
/// Sessions are `Send` but not `Sync`: one session can move between threads
/// but never be driven from two at once.
#[derive(Debug)]
pub struct Session<T> {
    state: SessionState<T>,
}

pub type EncoderSession = Session<StreamEncoder>;
pub type DecoderSession = Session<StreamDecoder>;

impl<T> Default for Session<T> {
    fn default() -> Self {
        Session {
            state: SessionState::Uninitialized,
        }
    }
}

impl<T> Session<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, SessionState::Ready(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, SessionState::Closed)
    }

    /// Releases the native state. Safe to call any number of times, including
    /// on a session that was never initialized.
    pub fn close(&mut self) {
        if let SessionState::Ready(_) = self.state {
            log::debug!("closing {}", std::any::type_name::<T>());
            // dropping the old value destroys the native state
            self.state = SessionState::Closed;
        }
    }

    fn install(&mut self, value: T) {
        match self.state {
            SessionState::Ready(_) => {
                log::debug!("re-initializing {}", std::any::type_name::<T>())
            }
            SessionState::Closed => log::debug!("reopening {}", std::any::type_name::<T>()),
            SessionState::Uninitialized => {
                log::debug!("initializing {}", std::any::type_name::<T>())
            }
        }
        self.state = SessionState::Ready(value);
    }

    fn get(&self) -> Result<&T> {
        match &self.state {
            SessionState::Ready(s) => Ok(s),
            SessionState::Uninitialized => not_initialized(),
            SessionState::Closed => already_closed(),
        }
    }

    fn get_mut(&mut self) -> Result<&mut T> {
        match &mut self.state {
            SessionState::Ready(s) => Ok(s),
            SessionState::Uninitialized => not_initialized(),
            SessionState::Closed => already_closed(),
        }
    }
}

#[track_caller]
fn not_initialized<T>() -> Result<T> {
    err_exit_code(
        ExitCode::NotInitialized,
        "session was not initialized, call init first",
    )
}

#[track_caller]
fn already_closed<T>() -> Result<T> {
    err_exit_code(
        ExitCode::NotInitialized,
        "session was already closed, call init to reuse it",
    )
}

impl EncoderSession {
    /// Creates (or replaces) the native encoder with the given parameters. If the
    /// parameters are rejected the session is left as it was.
    pub fn init(&mut self, params: BrotliParameters) -> Result<()> {
        let encoder = StreamEncoder::new(params)
            .inspect_err(|e| log::debug!("encoder init failed: {e}"))?;
        self.install(encoder);
        Ok(())
    }

    /// Feeds one input block to the encoder and returns the output it surfaced.
    /// The returned bytes are only valid until the next call on this session.
    pub fn process(&mut self, input: InputBuffer, op: EncoderOperation) -> Result<&[u8]> {
        let input = input.as_slice()?;
        self.get_mut()?.process(input, op)
    }

    pub fn flush(&mut self, input: InputBuffer) -> Result<&[u8]> {
        self.process(input, EncoderOperation::Flush)
    }

    pub fn finish(&mut self, input: InputBuffer) -> Result<&[u8]> {
        self.process(input, EncoderOperation::Finish)
    }

    pub fn input_block_size(&self) -> Result<usize> {
        Ok(self.get()?.input_block_size())
    }

    pub fn has_more_output(&self) -> Result<bool> {
        Ok(self.get()?.has_more_output())
    }

    pub fn is_finished(&self) -> Result<bool> {
        Ok(self.get()?.is_finished())
    }

    pub fn parameters(&self) -> Result<BrotliParameters> {
        Ok(*self.get()?.parameters())
    }
}

impl DecoderSession {
    pub fn init(&mut self) -> Result<()> {
        let decoder = StreamDecoder::new()?;
        self.install(decoder);
        Ok(())
    }

    /// Decodes as much of the input into the output range as the codec can.
    /// Produced bytes are written at the start of the output range.
    pub fn decompress(
        &mut self,
        input: InputBuffer,
        mut output: OutputBuffer,
    ) -> Result<StreamResult> {
        let input = input.as_slice()?;
        let output = output.as_mut_slice()?;
        self.get_mut()?.decompress(input, output)
    }

    pub fn needs_more_input(&self) -> Result<bool> {
        Ok(self.get()?.needs_more_input())
    }

    pub fn needs_more_output(&self) -> Result<bool> {
        Ok(self.get()?.needs_more_output())
    }

    pub fn is_finished(&self) -> Result<bool> {
        Ok(self.get()?.is_finished())
    }
}
