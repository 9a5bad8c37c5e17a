/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::io::{Read, Write};
use std::ptr;

use jbrotli_rs::unmanaged_api::*;
use jbrotli_rs::{
    BrotliParameters, BrotliReader, BrotliWriter, DecoderSession, EncoderOperation,
    EncoderSession, ExitCode, InputBuffer, Mode, OutputBuffer, STATUS_NEEDS_MORE_INPUT,
    STATUS_NEEDS_MORE_OUTPUT, STATUS_OK, StreamStatus, compress_buffer, compress_vec,
    decompress_buffer, decompress_vec, max_compressed_size, unpack_status,
};

/// mix of text and binary so that every mode has something to do
fn sample_data(len: usize) -> Vec<u8> {
    let text = b"The quick brown fox jumps over the lazy dog. Brotli streams in blocks. ";
    let mut rng = 0x1234_5678u32;
    let mut r = Vec::with_capacity(len);
    while r.len() < len {
        rng ^= rng << 13;
        rng ^= rng >> 17;
        rng ^= rng << 5;
        if rng % 4 == 0 {
            r.extend((0..(rng % 64)).map(|i| (rng >> (i % 24)) as u8));
        } else {
            r.extend_from_slice(&text[..(rng as usize % text.len()) + 1]);
        }
    }
    r.truncate(len);
    r
}

fn stream_encode(params: BrotliParameters, input: &[u8], chunk_size: usize) -> Vec<u8> {
    let mut session = EncoderSession::new();
    session.init(params).unwrap();

    let mut out = Vec::new();
    for chunk in input.chunks(chunk_size.min(session.input_block_size().unwrap())) {
        out.extend_from_slice(
            session
                .process(InputBuffer::whole(chunk), EncoderOperation::Process)
                .unwrap(),
        );
    }
    out.extend_from_slice(session.finish(InputBuffer::empty()).unwrap());
    assert!(session.is_finished().unwrap());
    session.close();
    out
}

fn stream_decode(compressed: &[u8], in_chunk: usize, out_chunk: usize) -> Vec<u8> {
    let mut session = DecoderSession::new();
    session.init().unwrap();

    let mut result = Vec::new();
    let mut buf = vec![0u8; out_chunk];
    let mut offset = 0;

    loop {
        let end = (offset + in_chunk).min(compressed.len());
        let r = session
            .decompress(
                InputBuffer::whole(&compressed[offset..end]),
                OutputBuffer::whole(&mut buf),
            )
            .unwrap();
        assert!(r.bytes_produced <= buf.len());
        offset += r.bytes_consumed;
        result.extend_from_slice(&buf[..r.bytes_produced]);

        match r.status {
            StreamStatus::Ok => break,
            StreamStatus::NeedsMoreInput => assert!(offset <= compressed.len()),
            StreamStatus::NeedsMoreOutput => {}
            StreamStatus::Error => panic!("decode error"),
        }
    }

    assert!(session.is_finished().unwrap());
    result
}

#[test]
fn roundtrip_all_modes_and_qualities() {
    let input = sample_data(70_000);

    for mode in [Mode::Generic, Mode::Text, Mode::Font] {
        for quality in 0..=11 {
            let params = BrotliParameters::default()
                .with_mode(mode)
                .with_quality(quality);

            let compressed = compress_vec(&params, &input).unwrap();
            assert_eq!(
                decompress_vec(&compressed).unwrap(),
                input,
                "mode {mode:?} quality {quality}"
            );
        }
    }
}

#[test]
fn roundtrip_all_windows() {
    let input = sample_data(100_000);

    for lgwin in 10..=24 {
        let params = BrotliParameters::default().with_quality(7).with_lgwin(lgwin);
        let compressed = stream_encode(params, &input, 10_000);
        assert_eq!(stream_decode(&compressed, 1000, 4096), input, "lgwin {lgwin}");
    }

    for lgblock in [0, 16, 20, 24] {
        let params = BrotliParameters::default().with_quality(9).with_lgblock(lgblock);
        let compressed = stream_encode(params, &input, 1 << 16);
        assert_eq!(decompress_vec(&compressed).unwrap(), input, "lgblock {lgblock}");
    }
}

#[test]
fn streaming_equivalent_to_one_shot() {
    let input = sample_data(300_000);
    let params = BrotliParameters::default().with_quality(5);

    // chunking changes the compressed bytes but never what they decode to
    let reference = compress_vec(&params, &input).unwrap();
    for chunk in [1, 100, 4096, 65536] {
        let compressed = stream_encode(params, &input, chunk);
        assert_eq!(decompress_vec(&compressed).unwrap(), input, "chunk {chunk}");
    }
    assert_eq!(stream_decode(&reference, 7, 13), input);
}

#[test]
fn degenerate_inputs() {
    let params = BrotliParameters::default();
    let mut out = [0u8; 8];

    assert_eq!(
        compress_buffer(&params, InputBuffer::empty(), OutputBuffer::whole(&mut out)).unwrap(),
        0
    );
    assert_eq!(
        decompress_buffer(InputBuffer::new(b"xyz", 3, 0), OutputBuffer::whole(&mut out)).unwrap(),
        0
    );

    // empty stream through the session API still produces a valid, empty brotli stream
    let compressed = stream_encode(params, &[], 100);
    assert!(!compressed.is_empty());
    assert!(decompress_vec(&compressed).unwrap().is_empty());

    let mut d = DecoderSession::new();
    d.init().unwrap();
    let r = d
        .decompress(InputBuffer::empty(), OutputBuffer::whole(&mut out))
        .unwrap();
    assert_eq!((r.status, r.bytes_consumed, r.bytes_produced), (StreamStatus::Ok, 0, 0));
}

#[test]
fn argument_validation() {
    let input = sample_data(100);
    let mut out = [0u8; 1000];
    let params = BrotliParameters::default();

    for (offset, length) in [(-1, 10), (0, -10), (50, 51), (101, 0)] {
        let e = compress_buffer(
            &params,
            InputBuffer::new(&input, offset, length),
            OutputBuffer::whole(&mut out),
        )
        .unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::InvalidArgument, "{offset} {length}");

        let e = decompress_buffer(
            InputBuffer::whole(&input),
            OutputBuffer::new(&mut out, offset * 10, length * 10),
        )
        .unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::InvalidArgument, "{offset} {length}");
    }

    let mut e = EncoderSession::new();
    e.init(params).unwrap();
    let err = e
        .process(InputBuffer::new(&input, 90, 20), EncoderOperation::Process)
        .unwrap_err();
    assert_eq!(err.exit_code(), ExitCode::InvalidArgument);

    let mut d = DecoderSession::new();
    d.init().unwrap();
    let err = d
        .decompress(InputBuffer::whole(&input), OutputBuffer::new(&mut out, 999, 2))
        .unwrap_err();
    assert_eq!(err.exit_code(), ExitCode::InvalidArgument);

    for (q, w, b) in [(12, 22, 0), (5, 25, 0), (5, 22, 8), (5, 22, 25)] {
        let p = BrotliParameters::default()
            .with_quality(q)
            .with_lgwin(w)
            .with_lgblock(b);
        assert_eq!(
            EncoderSession::new().init(p).unwrap_err().exit_code(),
            ExitCode::InvalidParameter
        );
    }
}

#[test]
fn block_size_enforced() {
    let mut e = EncoderSession::new();
    e.init(BrotliParameters::default()).unwrap();
    let block = e.input_block_size().unwrap();
    assert_eq!(block, 1 << 18);

    let input = sample_data(block + 1);
    let err = e
        .process(InputBuffer::whole(&input), EncoderOperation::Process)
        .unwrap_err();
    assert_eq!(err.exit_code(), ExitCode::InvalidArgument);

    // rejected before the codec saw anything, the stream round trips without it
    let out = e.finish(InputBuffer::new(&input, 0, 10)).unwrap().to_vec();
    assert_eq!(decompress_vec(&out).unwrap(), &input[..10]);
}

#[test]
fn needs_more_output_counts_never_overrun() {
    let input = sample_data(64_000);
    let compressed = compress_vec(&BrotliParameters::default(), &input).unwrap();

    let mut d = DecoderSession::new();
    d.init().unwrap();

    // guard bytes around the output range must stay untouched
    let mut buf = vec![0xEEu8; 300];
    let mut decoded = Vec::new();
    let mut offset = 0;
    loop {
        let r = d
            .decompress(
                InputBuffer::whole(&compressed[offset..]),
                OutputBuffer::new(&mut buf, 50, 200),
            )
            .unwrap();
        assert!(r.bytes_produced <= 200);
        assert!(buf[..50].iter().all(|&b| b == 0xEE));
        assert!(buf[250..].iter().all(|&b| b == 0xEE));

        decoded.extend_from_slice(&buf[50..50 + r.bytes_produced]);
        offset += r.bytes_consumed;

        if r.status == StreamStatus::NeedsMoreOutput {
            assert_eq!(r.bytes_produced, 200);
            assert!(d.needs_more_output().unwrap());
        } else {
            assert_eq!(r.status, StreamStatus::Ok);
            break;
        }
    }
    assert_eq!(decoded, input);
}

#[test]
fn use_after_close() {
    let mut e = EncoderSession::new();
    e.init(BrotliParameters::default()).unwrap();
    e.close();
    e.close();

    let err = e
        .process(InputBuffer::whole(b"data"), EncoderOperation::Process)
        .unwrap_err();
    assert_eq!(err.exit_code(), ExitCode::NotInitialized);
    assert!(err.exit_code().is_lifecycle_error());
    assert_eq!(
        e.input_block_size().unwrap_err().exit_code(),
        ExitCode::NotInitialized
    );

    let mut d = DecoderSession::new();
    d.close();
    d.init().unwrap();
    d.close();
    let mut out = [0u8; 10];
    let err = d
        .decompress(InputBuffer::whole(b"data"), OutputBuffer::whole(&mut out))
        .unwrap_err();
    assert_eq!(err.exit_code(), ExitCode::NotInitialized);
    assert_eq!(d.is_finished().unwrap_err().exit_code(), ExitCode::NotInitialized);
}

#[test]
fn process_after_finish() {
    let mut e = EncoderSession::new();
    e.init(BrotliParameters::default()).unwrap();
    e.finish(InputBuffer::whole(b"all done")).unwrap();

    let err = e.flush(InputBuffer::empty()).unwrap_err();
    assert_eq!(err.exit_code(), ExitCode::StreamFinished);

    // a new init starts a new stream on the same session
    e.init(BrotliParameters::default()).unwrap();
    let out = e.finish(InputBuffer::whole(b"again")).unwrap().to_vec();
    assert_eq!(decompress_vec(&out).unwrap(), b"again");
}

#[test]
fn independent_sessions_in_parallel() {
    let handles: Vec<_> = (0..4u32)
        .map(|i| {
            std::thread::spawn(move || {
                let input = sample_data(50_000 + i as usize * 1000);
                let params = BrotliParameters::default().with_quality(4 + i);
                let compressed = stream_encode(params, &input, 5000);
                assert_eq!(stream_decode(&compressed, 333, 1024), input);
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    // a session may move to another thread between calls
    let mut e = EncoderSession::new();
    e.init(BrotliParameters::default()).unwrap();
    e.process(InputBuffer::whole(b"moved "), EncoderOperation::Process)
        .unwrap();
    let out = std::thread::spawn(move || e.finish(InputBuffer::whole(b"session")).unwrap().to_vec())
        .join()
        .unwrap();
    assert_eq!(decompress_vec(&out).unwrap(), b"moved session");
}

#[test]
fn io_adapters() {
    let input = sample_data(500_000);

    let mut w = BrotliWriter::new(Vec::new(), BrotliParameters::default().with_quality(3)).unwrap();
    w.write_all(&input).unwrap();
    let compressed = w.finish().unwrap();

    let mut r = BrotliReader::new(&compressed[..]).unwrap();
    let mut decoded = Vec::new();
    r.read_to_end(&mut decoded).unwrap();
    assert_eq!(decoded, input);
}

#[test]
fn c_abi_one_shot() {
    let input = sample_data(20_000);
    let mut compressed = vec![0u8; max_compressed_size(input.len()) + 10];
    let mut decompressed = vec![0u8; input.len() + 10];

    unsafe {
        let n = brotli_compress(
            1,
            9,
            22,
            0,
            input.as_ptr(),
            input.len() as u64,
            0,
            input.len() as i32,
            compressed.as_mut_ptr(),
            compressed.len() as u64,
            10,
            compressed.len() as i32 - 10,
        );
        assert!(n > 0, "compress failed with {n}");

        let m = brotli_decompress(
            compressed.as_ptr(),
            compressed.len() as u64,
            10,
            n,
            decompressed.as_mut_ptr(),
            decompressed.len() as u64,
            5,
            input.len() as i32,
        );
        assert_eq!(m, input.len() as i32);
        assert_eq!(&decompressed[5..5 + input.len()], &input[..]);

        // output too small, truncated and corrupt input are distinct
        let r = brotli_decompress(
            compressed.as_ptr(),
            compressed.len() as u64,
            10,
            n,
            decompressed.as_mut_ptr(),
            decompressed.len() as u64,
            0,
            100,
        );
        assert_eq!(r, -34);

        let r = brotli_decompress(
            compressed.as_ptr(),
            compressed.len() as u64,
            10,
            n / 2,
            decompressed.as_mut_ptr(),
            decompressed.len() as u64,
            0,
            decompressed.len() as i32,
        );
        assert_eq!(r, -33);

        let garbage = [0xFFu8; 32];
        let r = brotli_decompress(
            garbage.as_ptr(),
            32,
            0,
            32,
            decompressed.as_mut_ptr(),
            decompressed.len() as u64,
            0,
            decompressed.len() as i32,
        );
        assert_eq!(r, -32);

        // argument checks come before pointer checks
        let r = brotli_compress(0, 11, 22, 0, ptr::null(), 0, -1, 10, ptr::null_mut(), 0, 0, 10);
        assert_eq!(r, -(ExitCode::InvalidArgument.as_integer_error_code()));
        let r = brotli_compress(0, 11, 22, 0, ptr::null(), 0, 0, 10, ptr::null_mut(), 0, 0, 10);
        assert_eq!(r, -(ExitCode::InputBufferUnavailable.as_integer_error_code()));
        let r = brotli_compress(
            0,
            11,
            22,
            0,
            input.as_ptr(),
            input.len() as u64,
            0,
            10,
            ptr::null_mut(),
            0,
            0,
            10,
        );
        assert_eq!(r, -(ExitCode::OutputBufferUnavailable.as_integer_error_code()));
        let r = brotli_compress(
            0,
            11,
            30,
            0,
            input.as_ptr(),
            input.len() as u64,
            0,
            10,
            compressed.as_mut_ptr(),
            compressed.len() as u64,
            0,
            10,
        );
        assert_eq!(r, -(ExitCode::InvalidParameter.as_integer_error_code()));

        // empty input never needs an output buffer
        let r = brotli_compress(0, 11, 22, 0, ptr::null(), 0, 0, 0, ptr::null_mut(), 0, 0, 0);
        assert_eq!(r, 0);

        let mut version = [0u8; 32];
        brotli_version(version.as_mut_ptr(), version.len() as u64);
        assert_eq!(version[0], b'1');
        assert!(brotli_max_compressed_size(1000) >= 1000);
    }
}

#[test]
fn c_abi_streaming() {
    let input = sample_data(150_000);
    let mut compressed = Vec::new();
    let mut chunk = vec![0u8; 4096];

    unsafe {
        let e = brotli_encoder_create();

        // not initialized yet
        assert_eq!(brotli_encoder_input_block_size(e), -20);
        assert_eq!(brotli_encoder_init(e, 0, 6, 22, 0), 0);
        let block = brotli_encoder_input_block_size(e) as usize;
        assert_eq!(block, 1 << 16);

        let too_big = brotli_encoder_process(
            e,
            input.as_ptr(),
            input.len() as u64,
            0,
            (block + 1) as i32,
            false,
            false,
            chunk.as_mut_ptr(),
            chunk.len() as u64,
            0,
            chunk.len() as i32,
        );
        assert_eq!(unpack_status(too_big), (-1, 0));

        let pieces: Vec<(usize, usize)> = (0..input.len())
            .step_by(block)
            .map(|s| (s, (input.len() - s).min(block)))
            .collect();

        for (i, &(start, len)) in pieces.iter().enumerate() {
            let last = i == pieces.len() - 1;
            let mut v = brotli_encoder_process(
                e,
                input.as_ptr(),
                input.len() as u64,
                start as i32,
                len as i32,
                i == 1,
                last,
                chunk.as_mut_ptr(),
                chunk.len() as u64,
                0,
                chunk.len() as i32,
            );

            loop {
                let (status, n) = unpack_status(v);
                compressed.extend_from_slice(&chunk[..n as usize]);
                if status == STATUS_OK {
                    break;
                }
                assert_eq!(status, STATUS_NEEDS_MORE_OUTPUT);
                v = brotli_encoder_process(
                    e,
                    ptr::null(),
                    0,
                    0,
                    0,
                    false,
                    last,
                    chunk.as_mut_ptr(),
                    chunk.len() as u64,
                    0,
                    chunk.len() as i32,
                );
            }
        }

        assert_eq!(brotli_encoder_is_finished(e), 1);
        assert_eq!(brotli_encoder_has_more_output(e), 0);
        assert_eq!(brotli_encoder_close(e), 0);
        assert_eq!(brotli_encoder_close(e), 0);
        brotli_encoder_free(e);
    }

    let mut decoded = Vec::new();
    unsafe {
        let d = brotli_decoder_create();
        assert_eq!(brotli_decoder_init(d), 0);

        let mut offset = 0usize;
        loop {
            let in_len = (compressed.len() - offset).min(1000);
            let mut consumed = 0u64;
            let v = brotli_decoder_process(
                d,
                compressed.as_ptr(),
                compressed.len() as u64,
                offset as i32,
                in_len as i32,
                chunk.as_mut_ptr(),
                chunk.len() as u64,
                0,
                chunk.len() as i32,
                &mut consumed,
            );
            let (status, n) = unpack_status(v);
            decoded.extend_from_slice(&chunk[..n as usize]);
            offset += consumed as usize;

            match status {
                STATUS_OK => break,
                STATUS_NEEDS_MORE_INPUT => assert_eq!(brotli_decoder_needs_more_input(d), 1),
                STATUS_NEEDS_MORE_OUTPUT => assert_eq!(n as usize, chunk.len()),
                s => panic!("unexpected status {s}"),
            }
        }

        assert_eq!(brotli_decoder_is_finished(d), 1);
        assert_eq!(brotli_decoder_close(d), 0);

        // closed handles report the lifecycle error in the packed status
        let v = brotli_decoder_process(
            d,
            compressed.as_ptr(),
            compressed.len() as u64,
            0,
            10,
            chunk.as_mut_ptr(),
            chunk.len() as u64,
            0,
            chunk.len() as i32,
            ptr::null_mut(),
        );
        assert_eq!(unpack_status(v), (-20, 0));
        assert_eq!(brotli_decoder_is_finished(d), -20);

        // reinit after close gives a fresh stream
        assert_eq!(brotli_decoder_init(d), 0);
        assert_eq!(brotli_decoder_is_finished(d), 0);
        brotli_decoder_free(d);
    }

    assert_eq!(decoded, input);
}
