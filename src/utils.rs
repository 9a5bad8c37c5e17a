/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::collections::VecDeque;

/// Moves as much of the pending output as fits into `output`, returning the number of bytes copied.
pub fn drain_dequeue(pending_output: &mut VecDeque<u8>, output: &mut [u8]) -> usize {
    if pending_output.is_empty() {
        return 0;
    }

    let slices = pending_output.as_slices();

    let len0 = slices.0.len().min(output.len());
    output[..len0].copy_from_slice(&slices.0[..len0]);

    let len1 = slices.1.len().min(output.len() - len0);
    output[len0..len0 + len1].copy_from_slice(&slices.1[..len1]);

    pending_output.drain(..len0 + len1);
    len0 + len1
}

/// handy function to compare two arrays, and print the first mismatch. Useful for debugging.
#[cfg(test)]
#[track_caller]
pub fn assert_eq_array<T: PartialEq + std::fmt::Debug>(a: &[T], b: &[T]) {
    if a.len() != b.len() {
        for i in 0..std::cmp::min(a.len(), b.len()) {
            assert_eq!(
                a[i],
                b[i],
                "length mismatch {},{} and first mismatch at offset {}",
                a.len(),
                b.len(),
                i
            );
        }
        panic!(
            "length mismatch {} and {}, but common prefix identical",
            a.len(),
            b.len()
        );
    } else if let Some(i) = (0..a.len()).find(|&i| a[i] != b[i]) {
        panic!(
            "length identical {}, but first mismatch at offset {}: {:?} != {:?}",
            a.len(),
            i,
            a[i],
            b[i]
        );
    }
}

/// Compressible text of the requested length.
#[cfg(test)]
pub fn sample_text(len: usize) -> Vec<u8> {
    const WORDS: &[&str] = &[
        "stream", "brotli", "window", "block", "quality", "encoder", "decoder", "buffer",
        "session", "flush", "finish", "the", "a", "of", "and", "in",
    ];

    let mut rng = 0x2545_f491u32;
    let mut r = Vec::with_capacity(len + 16);
    while r.len() < len {
        rng ^= rng << 13;
        rng ^= rng >> 17;
        rng ^= rng << 5;
        r.extend_from_slice(WORDS[(rng as usize) % WORDS.len()].as_bytes());
        r.push(if rng % 11 == 0 { b'\n' } else { b' ' });
    }
    r.truncate(len);
    r
}

/// Incompressible bytes of the requested length, deterministic for a given seed.
#[cfg(test)]
pub fn sample_random(len: usize, seed: u32) -> Vec<u8> {
    let mut rng = seed | 1;
    (0..len)
        .map(|_| {
            rng ^= rng << 13;
            rng ^= rng >> 17;
            rng ^= rng << 5;
            (rng >> 24) as u8
        })
        .collect()
}

#[test]
fn drain_dequeue_partial() {
    let mut pending: VecDeque<u8> = VecDeque::with_capacity(8);
    pending.extend([1, 2, 3, 4, 5, 6]);
    pending.drain(..4);
    // wraps around the ring buffer
    pending.extend([7, 8, 9, 10]);

    let mut out = [0u8; 4];
    assert_eq!(drain_dequeue(&mut pending, &mut out), 4);
    assert_eq!(out, [5, 6, 7, 8]);
    assert_eq!(pending.len(), 2);

    let mut out = [0u8; 10];
    assert_eq!(drain_dequeue(&mut pending, &mut out), 2);
    assert_eq!(&out[..2], &[9, 10]);
    assert_eq!(drain_dequeue(&mut pending, &mut out), 0);
}
