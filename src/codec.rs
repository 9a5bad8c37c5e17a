/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

//! Owning wrappers around the native Brotli encoder and decoder state, plus the
//! one-shot buffer entry points that run a temporary state for a single call.

use std::{ffi::CStr, ptr, ptr::NonNull};

use brotlic_sys::{
    BrotliDecoderCreateInstance, BrotliDecoderDecompressStream, BrotliDecoderDestroyInstance,
    BrotliDecoderErrorString, BrotliDecoderGetErrorCode, BrotliDecoderHasMoreOutput,
    BrotliDecoderIsFinished, BrotliDecoderResult_BROTLI_DECODER_RESULT_NEEDS_MORE_INPUT,
    BrotliDecoderResult_BROTLI_DECODER_RESULT_NEEDS_MORE_OUTPUT,
    BrotliDecoderResult_BROTLI_DECODER_RESULT_SUCCESS, BrotliDecoderState,
    BrotliEncoderCompressStream, BrotliEncoderCreateInstance, BrotliEncoderDestroyInstance,
    BrotliEncoderHasMoreOutput, BrotliEncoderIsFinished, BrotliEncoderMaxCompressedSize,
    BrotliEncoderOperation, BrotliEncoderOperation_BROTLI_OPERATION_FINISH,
    BrotliEncoderOperation_BROTLI_OPERATION_FLUSH, BrotliEncoderOperation_BROTLI_OPERATION_PROCESS,
    BrotliEncoderParameter, BrotliEncoderParameter_BROTLI_PARAM_LGBLOCK,
    BrotliEncoderParameter_BROTLI_PARAM_LGWIN, BrotliEncoderParameter_BROTLI_PARAM_MODE,
    BrotliEncoderParameter_BROTLI_PARAM_QUALITY, BrotliEncoderSetParameter, BrotliEncoderState,
    BrotliEncoderVersion,
};

use crate::{
    brotli_error::{AddContext, ExitCode, Result, err_exit_code},
    buffer::{InputBuffer, OutputBuffer},
    parameters::BrotliParameters,
    status::StreamStatus,
};

/// What the encoder should do with the input supplied to a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderOperation {
    /// consume input, emitting output only when the encoder decides to
    Process,
    /// consume input and emit everything buffered so far, keeping the stream open
    Flush,
    /// consume input and terminate the stream
    Finish,
}

impl EncoderOperation {
    /// Maps the `(flush, last)` flag pair the managed side passes. `last` wins.
    pub fn from_flags(flush: bool, last: bool) -> Self {
        if last {
            EncoderOperation::Finish
        } else if flush {
            EncoderOperation::Flush
        } else {
            EncoderOperation::Process
        }
    }

    fn as_codec_value(self) -> BrotliEncoderOperation {
        match self {
            EncoderOperation::Process => BrotliEncoderOperation_BROTLI_OPERATION_PROCESS,
            EncoderOperation::Flush => BrotliEncoderOperation_BROTLI_OPERATION_FLUSH,
            EncoderOperation::Finish => BrotliEncoderOperation_BROTLI_OPERATION_FINISH,
        }
    }
}

/// Native encoder instance. Destroyed exactly once, on drop.
#[derive(Debug)]
pub struct EncoderState {
    state: NonNull<BrotliEncoderState>,
}

// the native state has no thread affinity, it just must not be used from two threads at once
unsafe impl Send for EncoderState {}

impl EncoderState {
    pub fn new(params: &BrotliParameters) -> Result<Self> {
        params.validate()?;

        let state = unsafe { BrotliEncoderCreateInstance(None, None, ptr::null_mut()) };
        let Some(state) = NonNull::new(state) else {
            return err_exit_code(
                ExitCode::GeneralFailure,
                "unable to allocate the brotli encoder state",
            );
        };

        let mut s = EncoderState { state };
        s.set_parameter(
            BrotliEncoderParameter_BROTLI_PARAM_MODE,
            params.mode.as_codec_value(),
        )?;
        s.set_parameter(BrotliEncoderParameter_BROTLI_PARAM_QUALITY, params.quality)?;
        s.set_parameter(BrotliEncoderParameter_BROTLI_PARAM_LGWIN, params.lgwin)?;
        s.set_parameter(BrotliEncoderParameter_BROTLI_PARAM_LGBLOCK, params.lgblock)?;
        Ok(s)
    }

    fn set_parameter(&mut self, param: BrotliEncoderParameter, value: u32) -> Result<()> {
        if unsafe { BrotliEncoderSetParameter(self.state.as_ptr(), param, value) } == 0 {
            return err_exit_code(
                ExitCode::InvalidParameter,
                &format!("encoder rejected parameter {param} = {value}"),
            );
        }
        Ok(())
    }

    /// Runs one codec call, returning `(bytes consumed, bytes produced)`.
    pub fn compress_stream(
        &mut self,
        op: EncoderOperation,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<(usize, usize)> {
        let mut avail_in = input.len();
        let mut next_in = input.as_ptr();
        let mut avail_out = output.len();
        let mut next_out = output.as_mut_ptr();

        let ok = unsafe {
            BrotliEncoderCompressStream(
                self.state.as_ptr(),
                op.as_codec_value(),
                &mut avail_in,
                &mut next_in,
                &mut avail_out,
                &mut next_out,
                ptr::null_mut(),
            )
        };
        if ok == 0 {
            return err_exit_code(
                ExitCode::CompressFailed,
                &format!("brotli encoder failed during {op:?}"),
            );
        }

        Ok((input.len() - avail_in, output.len() - avail_out))
    }

    pub fn has_more_output(&self) -> bool {
        unsafe { BrotliEncoderHasMoreOutput(self.state.as_ptr()) != 0 }
    }

    pub fn is_finished(&self) -> bool {
        unsafe { BrotliEncoderIsFinished(self.state.as_ptr()) != 0 }
    }
}

impl Drop for EncoderState {
    fn drop(&mut self) {
        unsafe { BrotliEncoderDestroyInstance(self.state.as_ptr()) };
    }
}

/// Native decoder instance. Destroyed exactly once, on drop.
#[derive(Debug)]
pub struct DecoderState {
    state: NonNull<BrotliDecoderState>,
}

unsafe impl Send for DecoderState {}

impl DecoderState {
    pub fn new() -> Result<Self> {
        let state = unsafe { BrotliDecoderCreateInstance(None, None, ptr::null_mut()) };
        let Some(state) = NonNull::new(state) else {
            return err_exit_code(
                ExitCode::GeneralFailure,
                "unable to allocate the brotli decoder state",
            );
        };
        Ok(DecoderState { state })
    }

    /// Runs one codec call. Consumes as much input and produces as much output as
    /// the codec can, returning the status along with `(consumed, produced)`.
    pub fn decompress_stream(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> (StreamStatus, usize, usize) {
        let mut avail_in = input.len();
        let mut next_in = input.as_ptr();
        let mut avail_out = output.len();
        let mut next_out = output.as_mut_ptr();
        let mut total_out = 0;

        let result = unsafe {
            BrotliDecoderDecompressStream(
                self.state.as_ptr(),
                &mut avail_in,
                &mut next_in,
                &mut avail_out,
                &mut next_out,
                &mut total_out,
            )
        };

        #[allow(non_upper_case_globals)]
        let status = match result {
            BrotliDecoderResult_BROTLI_DECODER_RESULT_SUCCESS => StreamStatus::Ok,
            BrotliDecoderResult_BROTLI_DECODER_RESULT_NEEDS_MORE_INPUT => {
                StreamStatus::NeedsMoreInput
            }
            BrotliDecoderResult_BROTLI_DECODER_RESULT_NEEDS_MORE_OUTPUT => {
                StreamStatus::NeedsMoreOutput
            }
            // BROTLI_DECODER_RESULT_ERROR and anything the codec adds later
            _ => StreamStatus::Error,
        };

        (status, input.len() - avail_in, output.len() - avail_out)
    }

    /// description of the last decoder error, as reported by the codec
    pub fn error_string(&self) -> String {
        unsafe {
            let s = BrotliDecoderErrorString(BrotliDecoderGetErrorCode(self.state.as_ptr()));
            if s.is_null() {
                return String::from("unknown decoder error");
            }
            CStr::from_ptr(s).to_string_lossy().into_owned()
        }
    }

    pub fn has_more_output(&self) -> bool {
        unsafe { BrotliDecoderHasMoreOutput(self.state.as_ptr()) != 0 }
    }

    pub fn is_finished(&self) -> bool {
        unsafe { BrotliDecoderIsFinished(self.state.as_ptr()) != 0 }
    }
}

impl Drop for DecoderState {
    fn drop(&mut self) {
        unsafe { BrotliDecoderDestroyInstance(self.state.as_ptr()) };
    }
}

/// Compresses the whole input in one call into the caller's output range.
///
/// Returns the number of bytes written at the start of the output range. Empty
/// input returns 0 without touching the codec. If the output range is too small
/// the call fails with `NeedsMoreOutput`.
pub fn compress_buffer(
    params: &BrotliParameters,
    input: InputBuffer,
    mut output: OutputBuffer,
) -> Result<usize> {
    let input = input.as_slice()?;
    let output = output.as_mut_slice()?;

    if input.is_empty() {
        return Ok(0);
    }

    let mut state = EncoderState::new(params)?;
    let (consumed, produced) = state
        .compress_stream(EncoderOperation::Finish, input, output)
        .context()?;

    if consumed != input.len() || !state.is_finished() {
        return err_exit_code(
            ExitCode::NeedsMoreOutput,
            &format!(
                "output buffer of {} bytes too small to hold compressed input of {} bytes",
                output.len(),
                input.len()
            ),
        );
    }

    Ok(produced)
}

/// Decompresses a complete stream in one call into the caller's output range.
///
/// Truncated input fails with `NeedsMoreInput`, a too small output range with
/// `NeedsMoreOutput` and corrupt input with `DecodeError`.
pub fn decompress_buffer(input: InputBuffer, mut output: OutputBuffer) -> Result<usize> {
    let input = input.as_slice()?;
    let output = output.as_mut_slice()?;

    if input.is_empty() {
        return Ok(0);
    }

    let mut state = DecoderState::new()?;
    let (status, _, produced) = state.decompress_stream(input, output);

    match status {
        StreamStatus::Ok => Ok(produced),
        StreamStatus::NeedsMoreInput => {
            err_exit_code(ExitCode::NeedsMoreInput, "compressed input is truncated")
        }
        StreamStatus::NeedsMoreOutput => err_exit_code(
            ExitCode::NeedsMoreOutput,
            &format!("output buffer of {} bytes too small", output.len()),
        ),
        StreamStatus::Error => {
            let reason = state.error_string();
            log::debug!("one-shot decode failed: {reason}");
            err_exit_code(ExitCode::DecodeError, &reason)
        }
    }
}

/// Upper bound on the compressed size of `input_size` bytes, or 0 if the bound
/// would overflow. Only meaningful for quality 2 and above.
pub fn max_compressed_size(input_size: usize) -> usize {
    unsafe { BrotliEncoderMaxCompressedSize(input_size) }
}

/// Version of the linked codec as `major.minor.patch`.
pub fn codec_version() -> String {
    let v = unsafe { BrotliEncoderVersion() };
    format!("{}.{}.{}", v >> 24, (v >> 12) & 0xFFF, v & 0xFFF)
}

/// Compresses into a freshly allocated vector, growing it as needed.
pub fn compress_vec(params: &BrotliParameters, input: &[u8]) -> Result<Vec<u8>> {
    let mut capacity = max_compressed_size(input.len()).max(input.len() / 2 + 64);
    let mut output = Vec::new();

    loop {
        output.resize(capacity, 0);
        match compress_buffer(params, InputBuffer::whole(input), OutputBuffer::whole(&mut output)) {
            Ok(n) => {
                output.truncate(n);
                return Ok(output);
            }
            Err(e) if e.exit_code() == ExitCode::NeedsMoreOutput => {
                capacity *= 2;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Decompresses a complete stream into a freshly allocated vector.
pub fn decompress_vec(input: &[u8]) -> Result<Vec<u8>> {
    let mut output: Vec<u8> = Vec::new();
    if input.is_empty() {
        return Ok(output);
    }

    let mut state = DecoderState::new()?;
    let mut offset = 0;
    let mut produced_total = 0;
    output.resize(input.len().saturating_mul(4).max(1024), 0);

    loop {
        let (status, consumed, produced) =
            state.decompress_stream(&input[offset..], &mut output[produced_total..]);
        offset += consumed;
        produced_total += produced;

        match status {
            StreamStatus::Ok => {
                output.truncate(produced_total);
                return Ok(output);
            }
            StreamStatus::NeedsMoreOutput => {
                let grow = output.len().max(24 * 1024);
                output.resize(output.len() + grow, 0);
            }
            StreamStatus::NeedsMoreInput => {
                return err_exit_code(ExitCode::NeedsMoreInput, "compressed input is truncated");
            }
            StreamStatus::Error => {
                return err_exit_code(ExitCode::DecodeError, &state.error_string());
            }
        }
    }
}
