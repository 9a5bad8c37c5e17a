/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

//! Streaming sessions must decode to the same bytes no matter how the caller
//! slices input and output.

use jbrotli_rs::{
    BrotliParameters, DecoderSession, EncoderOperation, EncoderSession, ExitCode, InputBuffer,
    OutputBuffer, StreamStatus, compress_vec, decompress_vec,
};
use proptest::prelude::*;

/// splits `len` into consecutive pieces whose sizes cycle through `sizes`
fn split_points(len: usize, sizes: &[usize]) -> Vec<(usize, usize)> {
    let mut r = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while start < len {
        let n = sizes[i % sizes.len()].min(len - start);
        r.push((start, n));
        start += n;
        i += 1;
    }
    r
}

fn compressible(seed: u8, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| b"abcdefgh"[(i / 7 + seed as usize) % 8] ^ ((i % 13 == 0) as u8))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn encoder_chunking_does_not_change_decoded_output(
        seed in any::<u8>(),
        len in 0usize..40_000,
        sizes in prop::collection::vec(1usize..5000, 1..8),
        flush_every in 0usize..6,
        quality in 0u32..=11,
    ) {
        let input = compressible(seed, len);
        let mut session = EncoderSession::new();
        session.init(BrotliParameters::default().with_quality(quality).with_lgwin(18)).unwrap();

        let mut compressed = Vec::new();
        for (n, (start, count)) in split_points(input.len(), &sizes).into_iter().enumerate() {
            let op = if flush_every != 0 && n % flush_every == 0 {
                EncoderOperation::Flush
            } else {
                EncoderOperation::Process
            };
            let out = session
                .process(InputBuffer::new(&input, start as i32, count as i32), op)
                .unwrap();
            compressed.extend_from_slice(out);
        }
        compressed.extend_from_slice(session.finish(InputBuffer::empty()).unwrap());
        prop_assert!(session.is_finished().unwrap());

        prop_assert_eq!(decompress_vec(&compressed).unwrap(), input);
    }

    #[test]
    fn decoder_chunking_does_not_change_output(
        seed in any::<u8>(),
        len in 1usize..60_000,
        in_sizes in prop::collection::vec(1usize..3000, 1..6),
        out_size in 1usize..5000,
    ) {
        let input = compressible(seed, len);
        let compressed = compress_vec(&BrotliParameters::default().with_quality(4), &input).unwrap();

        let mut session = DecoderSession::new();
        session.init().unwrap();

        let mut out = vec![0u8; out_size];
        let mut decoded = Vec::new();
        let mut offset = 0;
        let mut i = 0;

        loop {
            let n = in_sizes[i % in_sizes.len()].min(compressed.len() - offset);
            i += 1;

            let r = session
                .decompress(
                    InputBuffer::new(&compressed, offset as i32, n as i32),
                    OutputBuffer::whole(&mut out),
                )
                .unwrap();
            prop_assert!(r.bytes_consumed <= n);
            prop_assert!(r.bytes_produced <= out_size);
            if r.status == StreamStatus::NeedsMoreOutput {
                prop_assert_eq!(r.bytes_produced, out_size);
            }

            offset += r.bytes_consumed;
            decoded.extend_from_slice(&out[..r.bytes_produced]);

            if r.status == StreamStatus::Ok {
                break;
            }
        }

        prop_assert_eq!(offset, compressed.len());
        prop_assert_eq!(decoded, input);
    }

    #[test]
    fn out_of_range_descriptors_rejected(
        capacity in 0usize..256,
        offset in -10i32..300,
        length in -10i32..300,
    ) {
        let data = vec![0u8; capacity];
        let mut session = EncoderSession::new();
        session.init(BrotliParameters::default()).unwrap();

        let valid = offset >= 0 && length >= 0 && (offset + length) as usize <= capacity;
        let r = session.process(InputBuffer::new(&data, offset, length), EncoderOperation::Process);

        if valid {
            prop_assert!(r.is_ok());
        } else {
            prop_assert_eq!(r.unwrap_err().exit_code(), ExitCode::InvalidArgument);
        }
    }
}
