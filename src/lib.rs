/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

// forbid lints that we already have eliminated from the codebase so they don't show up in the future
#![forbid(trivial_numeric_casts)]
#![forbid(non_ascii_idents)]
#![forbid(unused_extern_crates)]
#![forbid(unused_import_braces)]
#![forbid(redundant_lifetimes)]
#![forbid(macro_use_extern_crate)]

mod brotli_error;
mod buffer;
mod codec;
mod parameters;
mod session;
mod status;
mod stream_decoder;
mod stream_encoder;
mod stream_io;
mod utils;

pub mod unmanaged_api;

pub use brotli_error::{AddContext, BrotliBindingError, ExitCode, Result};

pub use buffer::{InputBuffer, OutputBuffer};

pub use codec::{
    EncoderOperation, codec_version, compress_buffer, compress_vec, decompress_buffer,
    decompress_vec, max_compressed_size,
};

pub use parameters::{
    BrotliParameters, DEFAULT_INPUT_BLOCK_BITS, DEFAULT_QUALITY, DEFAULT_WINDOW_BITS,
    MAX_INPUT_BLOCK_BITS, MAX_QUALITY, MAX_WINDOW_BITS, MIN_INPUT_BLOCK_BITS, MIN_QUALITY,
    MIN_WINDOW_BITS, Mode,
};

pub use session::{DecoderSession, EncoderSession, Session};

pub use status::{
    STATUS_ERROR, STATUS_NEEDS_MORE_INPUT, STATUS_NEEDS_MORE_OUTPUT, STATUS_OK, StreamResult,
    StreamStatus, pack_status, unpack_status,
};

pub use stream_decoder::StreamDecoder;
pub use stream_encoder::{STAGING_WINDOW_SIZE, StreamEncoder};
pub use stream_io::{BrotliReader, BrotliWriter};

#[cfg(test)]
static INIT: std::sync::Once = std::sync::Once::new();

/// Initialize the logger for tests. This is a no-op if the logger is already initialized.
#[cfg(test)]
pub fn init_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}
