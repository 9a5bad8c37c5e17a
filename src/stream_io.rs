/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::io::{ErrorKind, Read, Write};

use crate::{
    brotli_error::{BrotliBindingError, ExitCode, Result},
    buffer::{InputBuffer, OutputBuffer},
    codec::EncoderOperation,
    parameters::BrotliParameters,
    session::{DecoderSession, EncoderSession},
    status::StreamStatus,
};

/// size of each read from the wrapped reader
pub const READER_INPUT_CHUNK: usize = 4096;

/// Compresses everything written to it into the wrapped writer.
///
/// Writes are cut into input-block-sized pieces before they reach the encoder.
/// Call `finish` to terminate the stream and get the writer back; dropping an
/// unfinished writer finishes the stream and ignores any error.
pub struct BrotliWriter<W: Write> {
    inner: Option<W>,
    session: EncoderSession,
    block_size: usize,
}

impl<W: Write> BrotliWriter<W> {
    pub fn new(inner: W, params: BrotliParameters) -> Result<Self> {
        let mut session = EncoderSession::new();
        session.init(params)?;
        let block_size = session.input_block_size()?;

        Ok(BrotliWriter {
            inner: Some(inner),
            session,
            block_size,
        })
    }

    pub fn get_ref(&self) -> Option<&W> {
        self.inner.as_ref()
    }

    fn run(&mut self, input: &[u8], op: EncoderOperation) -> std::io::Result<()> {
        let Some(inner) = self.inner.as_mut() else {
            return Err(BrotliBindingError::new(ExitCode::NotInitialized, "writer already finished").into());
        };

        let out = self.session.process(InputBuffer::whole(input), op)?;
        inner.write_all(out)
    }

    /// Terminates the stream and returns the wrapped writer.
    pub fn finish(mut self) -> std::io::Result<W> {
        self.run(&[], EncoderOperation::Finish)?;
        self.session.close();

        let mut inner = self.inner.take().ok_or_else(|| {
            std::io::Error::from(BrotliBindingError::new(
                ExitCode::NotInitialized,
                "writer already finished",
            ))
        })?;
        inner.flush()?;
        Ok(inner)
    }
}

impl<W: Write> Write for BrotliWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        for chunk in buf.chunks(self.block_size) {
            self.run(chunk, EncoderOperation::Process)?;
        }
        Ok(buf.len())
    }

    /// Emits everything buffered so far, so a reader can decode all data written up to now.
    fn flush(&mut self) -> std::io::Result<()> {
        self.run(&[], EncoderOperation::Flush)?;
        match self.inner.as_mut() {
            Some(inner) => inner.flush(),
            None => Ok(()),
        }
    }
}

impl<W: Write> Drop for BrotliWriter<W> {
    fn drop(&mut self) {
        if self.inner.is_some() && self.session.is_ready() {
            let _ = self.run(&[], EncoderOperation::Finish);
        }
    }
}

/// Decompresses a Brotli stream pulled from the wrapped reader.
///
/// A stream that ends before the encoder's end marker is reported as `UnexpectedEof`.
pub struct BrotliReader<R: Read> {
    inner: R,
    session: DecoderSession,
    input: Vec<u8>,
    pos: usize,
    len: usize,
    eof: bool,
    done: bool,
}

impl<R: Read> BrotliReader<R> {
    pub fn new(inner: R) -> Result<Self> {
        let mut session = DecoderSession::new();
        session.init()?;

        Ok(BrotliReader {
            inner,
            session,
            input: vec![0; READER_INPUT_CHUNK],
            pos: 0,
            len: 0,
            eof: false,
            done: false,
        })
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for BrotliReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() || self.done {
            return Ok(0);
        }

        loop {
            if self.pos == self.len && !self.eof {
                self.len = self.inner.read(&mut self.input)?;
                self.pos = 0;
                self.eof = self.len == 0;
            }

            let r = self.session.decompress(
                InputBuffer::whole(&self.input[self.pos..self.len]),
                OutputBuffer::whole(buf),
            )?;
            self.pos += r.bytes_consumed;

            match r.status {
                StreamStatus::Ok => {
                    self.done = true;
                    self.session.close();
                    return Ok(r.bytes_produced);
                }
                StreamStatus::NeedsMoreInput => {
                    if r.bytes_produced > 0 {
                        return Ok(r.bytes_produced);
                    }
                    if self.eof {
                        return Err(std::io::Error::new(
                            ErrorKind::UnexpectedEof,
                            "brotli stream truncated",
                        ));
                    }
                }
                // NeedsMoreOutput, codec errors already came back as DecodeError
                _ => return Ok(r.bytes_produced),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codec::{compress_vec, decompress_vec},
        utils::{assert_eq_array, sample_text},
    };

    #[test]
    fn writer_output_decodes() {
        let input = sample_text(200_000);

        let mut w = BrotliWriter::new(Vec::new(), BrotliParameters::default().with_quality(4)).unwrap();
        // uneven writes, some larger than the block size
        for chunk in input.chunks(77_777) {
            w.write_all(chunk).unwrap();
        }
        let compressed = w.finish().unwrap();

        assert_eq_array(&input, &decompress_vec(&compressed).unwrap());
    }

    #[test]
    fn writer_flush_makes_data_visible() {
        let mut w = BrotliWriter::new(Vec::new(), BrotliParameters::default()).unwrap();
        w.write_all(b"hello ").unwrap();
        w.flush().unwrap();

        let partial = w.get_ref().unwrap().clone();
        let mut r = BrotliReader::new(&partial[..]).unwrap();
        let mut got = [0u8; 6];
        r.read_exact(&mut got).unwrap();
        assert_eq!(&got, b"hello ");

        w.write_all(b"world").unwrap();
        let all = w.finish().unwrap();
        assert_eq!(decompress_vec(&all).unwrap(), b"hello world");
    }

    #[test]
    fn dropped_writer_finishes_stream() {
        let mut sink = Vec::new();
        {
            let mut w = BrotliWriter::new(&mut sink, BrotliParameters::default()).unwrap();
            w.write_all(b"dropped").unwrap();
        }
        assert_eq!(decompress_vec(&sink).unwrap(), b"dropped");
    }

    #[test]
    fn reader_small_reads() {
        let input = sample_text(100_000);
        let compressed = compress_vec(&BrotliParameters::default(), &input).unwrap();

        let mut r = BrotliReader::new(&compressed[..]).unwrap();
        let mut out = Vec::new();
        let mut buf = [0u8; 333];
        loop {
            let n = r.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq_array(&input, &out);
    }

    #[test]
    fn reader_reports_truncation() {
        let input = sample_text(50_000);
        let compressed = compress_vec(&BrotliParameters::default(), &input).unwrap();

        let mut r = BrotliReader::new(&compressed[..compressed.len() - 10]).unwrap();
        let mut out = Vec::new();
        let e = r.read_to_end(&mut out).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::UnexpectedEof);
    }

    #[test]
    fn reader_reports_corruption() {
        let mut r = BrotliReader::new(&[0xFFu8; 16][..]).unwrap();
        let e = r.read_to_end(&mut Vec::new()).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn empty_reader_is_empty_stream() {
        let mut r = BrotliReader::new(&[][..]).unwrap();
        let mut out = Vec::new();
        assert_eq!(r.read_to_end(&mut out).unwrap(), 0);
    }
}
