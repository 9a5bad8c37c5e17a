/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

//! C ABI for managed hosts.
//!
//! Calls that return a byte count return it as a non-negative value, or the
//! negated `ExitCode` on failure. Streaming process calls return a packed status
//! (see `status`). Handles are boxed contexts tagged with a magic number; a
//! single handle must not be used from two threads at the same time.

use std::{
    collections::VecDeque,
    ffi::c_void,
    panic::{AssertUnwindSafe, catch_unwind},
};

use crate::{
    brotli_error::{BrotliBindingError, ExitCode, Result, err_exit_code},
    buffer::{InputBuffer, OutputBuffer},
    codec::{EncoderOperation, codec_version, compress_buffer, decompress_buffer, max_compressed_size},
    parameters::BrotliParameters,
    session::{DecoderSession, EncoderSession},
    status::{STATUS_NEEDS_MORE_OUTPUT, STATUS_OK, pack_error, pack_status},
    utils::drain_dequeue,
};

const ENCODER_MAGIC: u32 = 0x4252_454e;
const DECODER_MAGIC: u32 = 0x4252_4445;

#[repr(C)]
struct EncoderContext {
    magic: u32,
    session: EncoderSession,

    /// encoder output that did not fit into the caller's buffer
    pending_output: VecDeque<u8>,
}

#[repr(C)]
struct DecoderContext {
    magic: u32,
    session: DecoderSession,
}

/// Helper function to catch panics and convert them into the appropriate BrotliBindingError
fn catch_unwind_result<R>(f: impl FnOnce() -> Result<R>) -> Result<R> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(r) => r,
        Err(err) => {
            if let Some(message) = err.downcast_ref::<&str>() {
                Err(BrotliBindingError::new(ExitCode::AssertionFailure, *message))
            } else if let Some(message) = err.downcast_ref::<String>() {
                Err(BrotliBindingError::new(ExitCode::AssertionFailure, message))
            } else {
                Err(BrotliBindingError::new(ExitCode::AssertionFailure, "unknown panic"))
            }
        }
    }
}

/// count on success, negated exit code on failure
fn to_return_code(r: Result<i32>) -> i32 {
    match r {
        Ok(v) => v,
        Err(e) => -e.exit_code().as_integer_error_code(),
    }
}

fn to_packed(r: Result<i64>) -> i64 {
    match r {
        Ok(v) => v,
        Err(e) => pack_error(&e),
    }
}

/// copies a string into a limited length zero terminated utf8 buffer
fn copy_cstring_utf8_to_buffer(str: &str, target: &mut [u8]) {
    if target.is_empty() {
        return;
    }

    // stop at an embedded nul, the caller couldn't see past it anyway
    let b = str.as_bytes();
    let b = &b[..b.iter().position(|&c| c == 0).unwrap_or(b.len())];

    let copy_len = std::cmp::min(b.len(), target.len() - 1);
    target[..copy_len].copy_from_slice(&b[..copy_len]);

    // always null terminated
    target[copy_len] = 0;
}

unsafe fn encoder_from_pointer<'a>(context: *mut c_void) -> Result<&'a mut EncoderContext> {
    if context.is_null() {
        return err_exit_code(ExitCode::NotInitialized, "null encoder handle");
    }
    let context = unsafe { &mut *(context as *mut EncoderContext) };
    if context.magic != ENCODER_MAGIC {
        return err_exit_code(ExitCode::InvalidArgument, "invalid encoder handle passed in");
    }
    Ok(context)
}

unsafe fn decoder_from_pointer<'a>(context: *mut c_void) -> Result<&'a mut DecoderContext> {
    if context.is_null() {
        return err_exit_code(ExitCode::NotInitialized, "null decoder handle");
    }
    let context = unsafe { &mut *(context as *mut DecoderContext) };
    if context.magic != DECODER_MAGIC {
        return err_exit_code(ExitCode::InvalidArgument, "invalid decoder handle passed in");
    }
    Ok(context)
}

/// Compresses `input[input_offset..input_offset + input_length]` into the output range in one call.
///
/// Returns the number of bytes written at `output + output_offset`, or a negated exit code.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn brotli_compress(
    mode: i32,
    quality: i32,
    lgwin: i32,
    lgblock: i32,
    input: *const u8,
    input_capacity: u64,
    input_offset: i32,
    input_length: i32,
    output: *mut u8,
    output_capacity: u64,
    output_offset: i32,
    output_length: i32,
) -> i32 {
    to_return_code(catch_unwind_result(|| {
        let input =
            unsafe { InputBuffer::from_raw(input, input_capacity, input_offset, input_length)? };
        let output = unsafe {
            OutputBuffer::from_raw(output, output_capacity, output_offset, output_length)?
        };
        let params = BrotliParameters::from_raw(mode, quality, lgwin, lgblock)?;

        Ok(compress_buffer(&params, input, output)? as i32)
    }))
}

/// Decompresses a complete stream in one call.
///
/// Returns the number of bytes written at `output + output_offset`, or a negated exit code.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn brotli_decompress(
    input: *const u8,
    input_capacity: u64,
    input_offset: i32,
    input_length: i32,
    output: *mut u8,
    output_capacity: u64,
    output_offset: i32,
    output_length: i32,
) -> i32 {
    to_return_code(catch_unwind_result(|| {
        let input =
            unsafe { InputBuffer::from_raw(input, input_capacity, input_offset, input_length)? };
        let output = unsafe {
            OutputBuffer::from_raw(output, output_capacity, output_offset, output_length)?
        };

        Ok(decompress_buffer(input, output)? as i32)
    }))
}

/// Upper bound on the compressed size for the given input size, 0 if it would overflow.
#[unsafe(no_mangle)]
pub extern "C" fn brotli_max_compressed_size(input_size: u64) -> u64 {
    usize::try_from(input_size).map_or(0, |s| max_compressed_size(s) as u64)
}

/// Copies the linked codec version (`major.minor.patch`) into the buffer as a nul terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn brotli_version(buffer: *mut u8, buffer_len: u64) {
    if !buffer.is_null() {
        copy_cstring_utf8_to_buffer(&codec_version(), unsafe {
            std::slice::from_raw_parts_mut(buffer, buffer_len as usize)
        });
    }
}

/// Copies the description of an exit code (either sign) into the buffer as a nul
/// terminated string. Returns 0, or the negated `InvalidArgument` for unknown codes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn brotli_error_message(code: i32, buffer: *mut u8, buffer_len: u64) -> i32 {
    let Some(exit_code) = ExitCode::from_integer_error_code(code) else {
        return -ExitCode::InvalidArgument.as_integer_error_code();
    };
    if buffer.is_null() {
        return -ExitCode::OutputBufferUnavailable.as_integer_error_code();
    }

    copy_cstring_utf8_to_buffer(exit_code.description(), unsafe {
        std::slice::from_raw_parts_mut(buffer, buffer_len as usize)
    });
    0
}

/// Allocates an uninitialized encoder handle. Free with `brotli_encoder_free`.
#[unsafe(no_mangle)]
pub extern "C" fn brotli_encoder_create() -> *mut c_void {
    let context = Box::new(EncoderContext {
        magic: ENCODER_MAGIC,
        session: EncoderSession::new(),
        pending_output: VecDeque::new(),
    });
    Box::into_raw(context) as *mut c_void
}

/// (Re)initializes the encoder, replacing any previous stream. Returns 0 or a negated exit code.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn brotli_encoder_init(
    context: *mut c_void,
    mode: i32,
    quality: i32,
    lgwin: i32,
    lgblock: i32,
) -> i32 {
    to_return_code(catch_unwind_result(|| {
        let context = unsafe { encoder_from_pointer(context)? };
        let params = BrotliParameters::from_raw(mode, quality, lgwin, lgblock)?;

        context.session.init(params)?;
        context.pending_output.clear();
        Ok(0)
    }))
}

/// Feeds one input block to the encoder. `last` finishes the stream, otherwise
/// `flush` forces out everything buffered so far.
///
/// Output is copied to the output range. Output that doesn't fit is kept and
/// returned first by the following calls, which is signalled by a
/// NEEDS_MORE_OUTPUT status. A failing call leaves that output queued. Returns
/// the packed status and count.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn brotli_encoder_process(
    context: *mut c_void,
    input: *const u8,
    input_capacity: u64,
    input_offset: i32,
    input_length: i32,
    flush: bool,
    last: bool,
    output: *mut u8,
    output_capacity: u64,
    output_offset: i32,
    output_length: i32,
) -> i64 {
    to_packed(catch_unwind_result(|| {
        let input =
            unsafe { InputBuffer::from_raw(input, input_capacity, input_offset, input_length)? };
        let mut output = unsafe {
            OutputBuffer::from_raw(output, output_capacity, output_offset, output_length)?
        };
        input.as_slice()?;
        let out = output.as_mut_slice()?;

        let context = unsafe { encoder_from_pointer(context)? };
        let op = EncoderOperation::from_flags(flush, last);

        // queued output only leaves the context once this call can no longer fail
        let written = if input.is_empty() && op == EncoderOperation::Process {
            // nothing to encode, only drain what is queued
            if context.session.is_finished()? && context.pending_output.is_empty() {
                return err_exit_code(
                    ExitCode::StreamFinished,
                    "stream already finished and all output returned",
                );
            }
            drain_dequeue(&mut context.pending_output, out)
        } else {
            let produced = context.session.process(input, op)?;

            let mut written = drain_dequeue(&mut context.pending_output, out);
            let direct = produced.len().min(out.len() - written);
            out[written..written + direct].copy_from_slice(&produced[..direct]);
            written += direct;
            context.pending_output.extend(&produced[direct..]);
            written
        };

        let status = if context.pending_output.is_empty() {
            STATUS_OK
        } else {
            STATUS_NEEDS_MORE_OUTPUT
        };
        Ok(pack_status(status, written as u32))
    }))
}

/// Maximum input length accepted per process call, or a negated exit code.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn brotli_encoder_input_block_size(context: *mut c_void) -> i32 {
    to_return_code(catch_unwind_result(|| {
        let context = unsafe { encoder_from_pointer(context)? };
        Ok(context.session.input_block_size()? as i32)
    }))
}

/// 1 if the encoder holds output not yet returned, 0 if not, or a negated exit code.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn brotli_encoder_has_more_output(context: *mut c_void) -> i32 {
    to_return_code(catch_unwind_result(|| {
        let context = unsafe { encoder_from_pointer(context)? };
        let codec = context.session.has_more_output()?;
        Ok(i32::from(codec || !context.pending_output.is_empty()))
    }))
}

/// 1 once the stream is finished and all output has been returned, 0 if not, or a negated exit code.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn brotli_encoder_is_finished(context: *mut c_void) -> i32 {
    to_return_code(catch_unwind_result(|| {
        let context = unsafe { encoder_from_pointer(context)? };
        let finished = context.session.is_finished()?;
        Ok(i32::from(finished && context.pending_output.is_empty()))
    }))
}

/// Releases the native encoder state but keeps the handle. Safe to call repeatedly and on a null handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn brotli_encoder_close(context: *mut c_void) -> i32 {
    if context.is_null() {
        return 0;
    }
    to_return_code(catch_unwind_result(|| {
        let context = unsafe { encoder_from_pointer(context)? };
        context.session.close();
        context.pending_output.clear();
        Ok(0)
    }))
}

/// Frees the handle and any state it still owns. Null is ignored.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn brotli_encoder_free(context: *mut c_void) {
    if context.is_null() {
        return;
    }
    let x = unsafe { Box::from_raw(context as *mut EncoderContext) };
    assert_eq!(x.magic, ENCODER_MAGIC, "invalid context passed in");
    // let Box destroy the object
}

/// Allocates an uninitialized decoder handle. Free with `brotli_decoder_free`.
#[unsafe(no_mangle)]
pub extern "C" fn brotli_decoder_create() -> *mut c_void {
    let context = Box::new(DecoderContext {
        magic: DECODER_MAGIC,
        session: DecoderSession::new(),
    });
    Box::into_raw(context) as *mut c_void
}

/// (Re)initializes the decoder. Returns 0 or a negated exit code.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn brotli_decoder_init(context: *mut c_void) -> i32 {
    to_return_code(catch_unwind_result(|| {
        let context = unsafe { decoder_from_pointer(context)? };
        context.session.init()?;
        Ok(0)
    }))
}

/// Decodes as much as possible of the input range into the output range.
///
/// Returns the packed status and number of bytes written. The caller advances its
/// input by the consumed count reported through `bytes_consumed` if non-null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn brotli_decoder_process(
    context: *mut c_void,
    input: *const u8,
    input_capacity: u64,
    input_offset: i32,
    input_length: i32,
    output: *mut u8,
    output_capacity: u64,
    output_offset: i32,
    output_length: i32,
    bytes_consumed: *mut u64,
) -> i64 {
    to_packed(catch_unwind_result(|| {
        let input =
            unsafe { InputBuffer::from_raw(input, input_capacity, input_offset, input_length)? };
        let output = unsafe {
            OutputBuffer::from_raw(output, output_capacity, output_offset, output_length)?
        };

        let context = unsafe { decoder_from_pointer(context)? };
        let r = context.session.decompress(input, output)?;

        if !bytes_consumed.is_null() {
            unsafe { *bytes_consumed = r.bytes_consumed as u64 };
        }
        Ok(r.pack())
    }))
}

/// 1 if the last process call stopped for lack of input, 0 if not, or a negated exit code.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn brotli_decoder_needs_more_input(context: *mut c_void) -> i32 {
    to_return_code(catch_unwind_result(|| {
        let context = unsafe { decoder_from_pointer(context)? };
        Ok(i32::from(context.session.needs_more_input()?))
    }))
}

/// 1 if the decoder has output waiting for buffer space, 0 if not, or a negated exit code.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn brotli_decoder_needs_more_output(context: *mut c_void) -> i32 {
    to_return_code(catch_unwind_result(|| {
        let context = unsafe { decoder_from_pointer(context)? };
        Ok(i32::from(context.session.needs_more_output()?))
    }))
}

/// 1 once the end of the stream has been decoded, 0 if not, or a negated exit code.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn brotli_decoder_is_finished(context: *mut c_void) -> i32 {
    to_return_code(catch_unwind_result(|| {
        let context = unsafe { decoder_from_pointer(context)? };
        Ok(i32::from(context.session.is_finished()?))
    }))
}

/// Releases the native decoder state but keeps the handle. Safe to call repeatedly and on a null handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn brotli_decoder_close(context: *mut c_void) -> i32 {
    if context.is_null() {
        return 0;
    }
    to_return_code(catch_unwind_result(|| {
        let context = unsafe { decoder_from_pointer(context)? };
        context.session.close();
        Ok(0)
    }))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn brotli_decoder_free(context: *mut c_void) {
    if context.is_null() {
        return;
    }
    let x = unsafe { Box::from_raw(context as *mut DecoderContext) };
    assert_eq!(x.magic, DECODER_MAGIC, "invalid context passed in");
}

#[test]
fn test_copy_cstring_utf8_to_buffer() {
    // test utf8
    let mut buffer = [0u8; 10];
    copy_cstring_utf8_to_buffer("h\u{00E1}llo", &mut buffer);
    assert_eq!(buffer, [b'h', 0xc3, 0xa1, b'l', b'l', b'o', 0, 0, 0, 0]);

    // test null termination
    let mut buffer = [0u8; 10];
    copy_cstring_utf8_to_buffer("helloeveryone", &mut buffer);
    assert_eq!(
        buffer,
        [b'h', b'e', b'l', b'l', b'o', b'e', b'v', b'e', b'r', 0]
    );

    // embedded nul ends the string
    let mut buffer = [0xffu8; 4];
    copy_cstring_utf8_to_buffer("a\0bc", &mut buffer);
    assert_eq!(buffer, [b'a', 0, 0xff, 0xff]);
}

#[test]
fn test_error_message() {
    let mut buffer = [0u8; 256];
    unsafe {
        assert_eq!(brotli_error_message(-34, buffer.as_mut_ptr(), 256), 0);
        let s = std::ffi::CStr::from_bytes_until_nul(&buffer).unwrap();
        assert!(s.to_str().unwrap().contains("more output"));

        assert_eq!(brotli_error_message(-77, buffer.as_mut_ptr(), 256), -1);
    }
}

#[test]
fn test_null_and_foreign_handles() {
    unsafe {
        let mut out = [0u8; 16];
        let v = brotli_decoder_process(
            std::ptr::null_mut(),
            std::ptr::null(),
            0,
            0,
            0,
            out.as_mut_ptr(),
            16,
            0,
            16,
            std::ptr::null_mut(),
        );
        assert_eq!(crate::status::unpack_status(v), (-20, 0));

        assert_eq!(brotli_encoder_input_block_size(std::ptr::null_mut()), -20);
        assert_eq!(brotli_encoder_close(std::ptr::null_mut()), 0);
        brotli_encoder_free(std::ptr::null_mut());
        brotli_decoder_free(std::ptr::null_mut());
    }
}

#[test]
fn test_encoder_overflow_queue() {
    use crate::{codec::decompress_vec, status::unpack_status};

    let input = crate::utils::sample_random(20_000, 3);
    let mut compressed = Vec::new();
    let mut chunk = [0u8; 1000];

    unsafe {
        let e = brotli_encoder_create();
        assert_eq!(brotli_encoder_init(e, 0, 5, 22, 0), 0);

        // incompressible input, so finishing yields far more than one output chunk
        let v = brotli_encoder_process(
            e,
            input.as_ptr(),
            input.len() as u64,
            0,
            input.len() as i32,
            false,
            true,
            chunk.as_mut_ptr(),
            chunk.len() as u64,
            0,
            chunk.len() as i32,
        );
        let (mut status, n) = unpack_status(v);
        assert_eq!(status, STATUS_NEEDS_MORE_OUTPUT);
        assert_eq!(n as usize, chunk.len());
        compressed.extend_from_slice(&chunk[..n as usize]);
        assert_eq!(brotli_encoder_has_more_output(e), 1);
        assert_eq!(brotli_encoder_is_finished(e), 0);

        while status == STATUS_NEEDS_MORE_OUTPUT {
            let v = brotli_encoder_process(
                e,
                std::ptr::null(),
                0,
                0,
                0,
                false,
                false,
                chunk.as_mut_ptr(),
                chunk.len() as u64,
                0,
                chunk.len() as i32,
            );
            let (s, n) = unpack_status(v);
            assert!(n as usize <= chunk.len());
            compressed.extend_from_slice(&chunk[..n as usize]);
            status = s;
        }
        assert_eq!(status, STATUS_OK);
        assert_eq!(brotli_encoder_is_finished(e), 1);

        assert_eq!(brotli_encoder_close(e), 0);
        assert_eq!(brotli_encoder_close(e), 0);
        assert_eq!(brotli_encoder_is_finished(e), -20);
        brotli_encoder_free(e);
    }

    assert_eq!(decompress_vec(&compressed).unwrap(), input);
}

#[test]
fn test_failed_call_keeps_queued_output() {
    use crate::{codec::decompress_vec, status::unpack_status};

    let input = crate::utils::sample_random(20_000, 5);
    let mut compressed = Vec::new();
    let mut chunk = [0u8; 1000];

    unsafe {
        let e = brotli_encoder_create();
        assert_eq!(brotli_encoder_init(e, 0, 5, 22, 0), 0);

        let process = |input: &[u8], flush: bool, last: bool, chunk: &mut [u8]| {
            unpack_status(brotli_encoder_process(
                e,
                input.as_ptr(),
                input.len() as u64,
                0,
                input.len() as i32,
                flush,
                last,
                chunk.as_mut_ptr(),
                chunk.len() as u64,
                0,
                chunk.len() as i32,
            ))
        };

        let (status, n) = process(&input, false, true, &mut chunk);
        assert_eq!(status, STATUS_NEEDS_MORE_OUTPUT);
        compressed.extend_from_slice(&chunk[..n as usize]);

        // flushing or adding data after finish fails without handing out queued bytes
        assert_eq!(process(&[], true, false, &mut chunk), (-21, 0));
        assert_eq!(process(b"more", false, false, &mut chunk), (-21, 0));
        assert_eq!(brotli_encoder_has_more_output(e), 1);

        let mut status = STATUS_NEEDS_MORE_OUTPUT;
        while status == STATUS_NEEDS_MORE_OUTPUT {
            let (s, n) = process(&[], false, false, &mut chunk);
            compressed.extend_from_slice(&chunk[..n as usize]);
            status = s;
        }
        assert_eq!(status, STATUS_OK);
        assert_eq!(brotli_encoder_is_finished(e), 1);

        // once everything has been returned a plain process call is rejected too
        assert_eq!(process(&[], false, false, &mut chunk), (-21, 0));
        // repeating the last flag stays a harmless no-op
        assert_eq!(process(&[], false, true, &mut chunk), (STATUS_OK, 0));

        brotli_encoder_free(e);
    }

    assert_eq!(decompress_vec(&compressed).unwrap(), input);
}
