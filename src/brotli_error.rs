/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::{fmt::Display, io::ErrorKind};

#[derive(Debug, Clone)]
pub struct BrotliBindingError {
    /// standard error code
    exit_code: ExitCode,

    /// diagnostic message including location. Content should not be relied on.
    message: String,
}

pub type Result<T> = std::result::Result<T, BrotliBindingError>;

/// Stable error codes. The C ABI reports these negated, and the streaming
/// decoder packs the negated value into the status byte of its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExitCode {
    InvalidArgument = 1,
    InputBufferUnavailable = 10,
    OutputBufferUnavailable = 11,
    CompressFailed = 14,
    InvalidParameter = 15,
    NotInitialized = 20,
    StreamFinished = 21,
    DecodeError = 32,
    NeedsMoreInput = 33,
    NeedsMoreOutput = 34,
    OsError = 40,
    AssertionFailure = 50,
    GeneralFailure = 51,
}

impl ExitCode {
    /// Converts the error code into an integer for use as an error code when
    /// returning from a C API.
    pub fn as_integer_error_code(self) -> i32 {
        self as i32
    }

    /// Maps an integer code (either sign) back to the exit code, if known.
    pub fn from_integer_error_code(code: i32) -> Option<ExitCode> {
        let code = code.checked_abs()?;
        [
            ExitCode::InvalidArgument,
            ExitCode::InputBufferUnavailable,
            ExitCode::OutputBufferUnavailable,
            ExitCode::CompressFailed,
            ExitCode::InvalidParameter,
            ExitCode::NotInitialized,
            ExitCode::StreamFinished,
            ExitCode::DecodeError,
            ExitCode::NeedsMoreInput,
            ExitCode::NeedsMoreOutput,
            ExitCode::OsError,
            ExitCode::AssertionFailure,
            ExitCode::GeneralFailure,
        ]
        .into_iter()
        .find(|e| e.as_integer_error_code() == code)
    }

    /// true for caller faults that are detected before the codec is touched
    pub fn is_argument_error(self) -> bool {
        matches!(self, ExitCode::InvalidArgument | ExitCode::InvalidParameter)
    }

    /// true for use-before-init, use-after-close and process-after-finish
    pub fn is_lifecycle_error(self) -> bool {
        matches!(self, ExitCode::NotInitialized | ExitCode::StreamFinished)
    }

    /// human readable explanation of the code, suitable for exception messages on the managed side
    pub fn description(self) -> &'static str {
        match self {
            ExitCode::InvalidArgument => {
                "Buffer position and length must be non-negative and lie within the buffer, and encoder input must not exceed the input block size."
            }
            ExitCode::InputBufferUnavailable => "Could not access the input buffer memory.",
            ExitCode::OutputBufferUnavailable => "Could not access the output buffer memory.",
            ExitCode::CompressFailed => {
                "Compression failed. Most likely the output buffer is too small, please make it larger."
            }
            ExitCode::InvalidParameter => {
                "Compression parameter out of range (quality 0..11, lgwin 10..24, lgblock 0 or 16..24)."
            }
            ExitCode::NotInitialized => {
                "The session was not initialized or was already closed. Initialize it before use."
            }
            ExitCode::StreamFinished => {
                "The stream was already finished. Create a new session to compress more data."
            }
            ExitCode::DecodeError => "Decoding error, e.g. corrupt input or no memory left.",
            ExitCode::NeedsMoreInput => {
                "Decompression partially done, but must be invoked again with more input."
            }
            ExitCode::NeedsMoreOutput => {
                "Operation partially done, but must be invoked again with more output space."
            }
            ExitCode::OsError => "An I/O error occurred in the wrapped reader or writer.",
            ExitCode::AssertionFailure => "Internal assertion failed inside the native library.",
            ExitCode::GeneralFailure => "Error in native Brotli library.",
        }
    }
}

impl Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl Display for BrotliBindingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{0}: {1}", self.exit_code, self.message)
    }
}

impl BrotliBindingError {
    pub fn new(exit_code: ExitCode, message: impl AsRef<str>) -> BrotliBindingError {
        BrotliBindingError {
            exit_code,
            message: message.as_ref().to_owned(),
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    #[track_caller]
    fn add_context(mut self) -> Self {
        let caller = std::panic::Location::caller();
        self.message = format!("{} at {}", self.message, caller);
        self
    }
}

#[cold]
#[track_caller]
pub fn err_exit_code<T>(error_code: ExitCode, message: &str) -> Result<T> {
    Err(BrotliBindingError::new(error_code, message).add_context())
}

/// Adds the caller location to an error as it propagates, so the message
/// reads like a short stack trace.
pub trait AddContext<T> {
    #[track_caller]
    fn context(self) -> Result<T>;
}

impl<T, E: Into<BrotliBindingError>> AddContext<T> for core::result::Result<T, E> {
    #[track_caller]
    fn context(self) -> Result<T> {
        match self {
            Ok(x) => Ok(x),
            Err(e) => Err(e.into().add_context()),
        }
    }
}

/// translates std::io::Error into BrotliBindingError
impl From<std::io::Error> for BrotliBindingError {
    #[track_caller]
    fn from(e: std::io::Error) -> Self {
        match e.downcast::<BrotliBindingError>() {
            Ok(be) => be,
            Err(e) => {
                let caller = std::panic::Location::caller();
                BrotliBindingError {
                    exit_code: get_io_error_exit_code(&e),
                    message: format!("error {} at {}", e, caller),
                }
            }
        }
    }
}

fn get_io_error_exit_code(e: &std::io::Error) -> ExitCode {
    if e.kind() == ErrorKind::UnexpectedEof {
        ExitCode::NeedsMoreInput
    } else {
        ExitCode::OsError
    }
}

/// translates BrotliBindingError into std::io::Error, which involves putting into a Box and using Other
/// (or UnexpectedEof for truncated streams so readers behave like other decompressors)
impl From<BrotliBindingError> for std::io::Error {
    fn from(e: BrotliBindingError) -> Self {
        let kind = match e.exit_code {
            ExitCode::NeedsMoreInput => ErrorKind::UnexpectedEof,
            ExitCode::InvalidArgument | ExitCode::InvalidParameter => ErrorKind::InvalidInput,
            ExitCode::DecodeError => ErrorKind::InvalidData,
            _ => ErrorKind::Other,
        };
        std::io::Error::new(kind, e)
    }
}

impl std::error::Error for BrotliBindingError {}

#[test]
fn test_error_translation() {
    // test wrapping inside an io error
    fn my_std_error() -> core::result::Result<(), std::io::Error> {
        Err(BrotliBindingError::new(ExitCode::DecodeError, "test error").into())
    }

    let e: BrotliBindingError = my_std_error().unwrap_err().into();
    assert_eq!(e.exit_code, ExitCode::DecodeError);
    assert_eq!(e.message, "test error");

    // an IO error should be translated into an OsError
    let e: BrotliBindingError =
        std::io::Error::new(std::io::ErrorKind::NotFound, "file not found").into();
    assert_eq!(e.exit_code, ExitCode::OsError);

    // truncated input round trips through io as UnexpectedEof
    let io: std::io::Error = BrotliBindingError::new(ExitCode::NeedsMoreInput, "eof").into();
    assert_eq!(io.kind(), ErrorKind::UnexpectedEof);
}

#[test]
fn test_context_adds_location() {
    fn fails() -> Result<()> {
        err_exit_code(ExitCode::InvalidArgument, "bad offset")
    }

    let e = fails().context().unwrap_err();
    assert_eq!(e.exit_code(), ExitCode::InvalidArgument);
    assert!(e.message().starts_with("bad offset at "));
    assert!(e.message().contains("brotli_error.rs"));
}

#[test]
fn test_integer_codes() {
    assert_eq!(ExitCode::DecodeError.as_integer_error_code(), 32);
    assert_eq!(
        ExitCode::from_integer_error_code(-34),
        Some(ExitCode::NeedsMoreOutput)
    );
    assert_eq!(
        ExitCode::from_integer_error_code(20),
        Some(ExitCode::NotInitialized)
    );
    assert_eq!(ExitCode::from_integer_error_code(-99), None);
    assert_eq!(ExitCode::from_integer_error_code(i32::MIN), None);
    assert!(ExitCode::StreamFinished.is_lifecycle_error());
    assert!(!ExitCode::DecodeError.is_lifecycle_error());
    assert!(ExitCode::InvalidArgument.is_argument_error());
    assert_eq!(ExitCode::from_integer_error_code(22), None);
}
