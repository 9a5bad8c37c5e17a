/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

//! Non-owning `(base, offset, length)` views over caller memory. These carry the
//! raw signed offsets that arrive from managed code so that validation happens in
//! one place, before any codec state is touched.

use crate::brotli_error::{ExitCode, Result, err_exit_code};

/// checks offset >= 0, length >= 0 and offset + length <= capacity
fn check_range(offset: i32, length: i32, capacity: usize, which: &str) -> Result<(usize, usize)> {
    if offset < 0 || length < 0 {
        return err_exit_code(
            ExitCode::InvalidArgument,
            &format!("{which} position and length must be greater than or equal to zero"),
        );
    }

    let start = offset as usize;
    let end = start + length as usize;
    if end > capacity {
        return err_exit_code(
            ExitCode::InvalidArgument,
            &format!("{which} position + length ({end}) exceeds the buffer capacity ({capacity})"),
        );
    }

    Ok((start, end))
}

/// Immutable view over caller-owned input.
#[derive(Debug, Clone, Copy)]
pub struct InputBuffer<'a> {
    base: &'a [u8],
    offset: i32,
    length: i32,
}

impl<'a> InputBuffer<'a> {
    pub fn new(base: &'a [u8], offset: i32, length: i32) -> Self {
        InputBuffer {
            base,
            offset,
            length,
        }
    }

    /// View over an entire slice. Slices longer than `i32::MAX` are represented with
    /// a negative length and so are rejected on validation, like on the managed side.
    pub fn whole(base: &'a [u8]) -> Self {
        Self::new(base, 0, i32::try_from(base.len()).unwrap_or(-1))
    }

    pub fn empty() -> Self {
        Self::new(&[], 0, 0)
    }

    /// Acquires a view over raw memory passed through the C ABI.
    ///
    /// Argument errors are reported before the pointer is looked at, and a null
    /// pointer is reported as `InputBufferUnavailable` unless the view is empty.
    ///
    /// # Safety
    /// `ptr` must be valid for reads of `capacity` bytes for the lifetime `'a`
    /// and must not be mutated during that time.
    pub unsafe fn from_raw(ptr: *const u8, capacity: u64, offset: i32, length: i32) -> Result<Self> {
        check_range(offset, length, usize::MAX, "input")?;

        if ptr.is_null() {
            if length == 0 {
                return Ok(Self::empty());
            }
            return err_exit_code(
                ExitCode::InputBufferUnavailable,
                "couldn't get the address of the input buffer",
            );
        }

        let base = unsafe { std::slice::from_raw_parts(ptr, capacity as usize) };
        Ok(Self::new(base, offset, length))
    }

    pub fn offset(&self) -> i32 {
        self.offset
    }

    pub fn length(&self) -> i32 {
        self.length
    }

    /// true if the requested length is zero, regardless of whether the descriptor is valid
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Validates the descriptor and returns the bytes it covers.
    pub fn as_slice(&self) -> Result<&'a [u8]> {
        let (start, end) = check_range(self.offset, self.length, self.base.len(), "input")?;
        Ok(&self.base[start..end])
    }
}

impl<'a> From<&'a [u8]> for InputBuffer<'a> {
    fn from(base: &'a [u8]) -> Self {
        InputBuffer::whole(base)
    }
}

/// Mutable view over caller-owned output space.
#[derive(Debug)]
pub struct OutputBuffer<'a> {
    base: &'a mut [u8],
    offset: i32,
    length: i32,
}

impl<'a> OutputBuffer<'a> {
    pub fn new(base: &'a mut [u8], offset: i32, length: i32) -> Self {
        OutputBuffer {
            base,
            offset,
            length,
        }
    }

    pub fn whole(base: &'a mut [u8]) -> Self {
        let length = i32::try_from(base.len()).unwrap_or(-1);
        Self::new(base, 0, length)
    }

    /// Acquires a view over raw memory passed through the C ABI.
    ///
    /// # Safety
    /// `ptr` must be valid for reads and writes of `capacity` bytes for the lifetime
    /// `'a` and must not be aliased during that time.
    pub unsafe fn from_raw(ptr: *mut u8, capacity: u64, offset: i32, length: i32) -> Result<Self> {
        check_range(offset, length, usize::MAX, "output")?;

        if ptr.is_null() {
            if length == 0 {
                return Ok(Self::new(&mut [], 0, 0));
            }
            return err_exit_code(
                ExitCode::OutputBufferUnavailable,
                "couldn't get the address of the output buffer",
            );
        }

        let base = unsafe { std::slice::from_raw_parts_mut(ptr, capacity as usize) };
        Ok(Self::new(base, offset, length))
    }

    pub fn offset(&self) -> i32 {
        self.offset
    }

    pub fn length(&self) -> i32 {
        self.length
    }

    /// Validates the descriptor only, without borrowing the memory.
    pub fn validate(&self) -> Result<()> {
        check_range(self.offset, self.length, self.base.len(), "output")?;
        Ok(())
    }

    /// Validates the descriptor and returns the writable region it covers.
    pub fn as_mut_slice(&mut self) -> Result<&mut [u8]> {
        let (start, end) = check_range(self.offset, self.length, self.base.len(), "output")?;
        Ok(&mut self.base[start..end])
    }
}

impl<'a> From<&'a mut [u8]> for OutputBuffer<'a> {
    fn from(base: &'a mut [u8]) -> Self {
        OutputBuffer::whole(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_views() {
        let data = b"hello world";

        let v = InputBuffer::new(data, 6, 5);
        assert_eq!(v.as_slice().unwrap(), b"world");

        let v = InputBuffer::whole(data);
        assert_eq!(v.as_slice().unwrap(), data);
        assert!(!v.is_empty());

        // exactly at the end is fine
        assert_eq!(InputBuffer::new(data, 11, 0).as_slice().unwrap(), b"");

        for (offset, length) in [(-1, 1), (0, -1), (6, 6), (12, 0)] {
            let e = InputBuffer::new(data, offset, length).as_slice().unwrap_err();
            assert_eq!(e.exit_code(), ExitCode::InvalidArgument);
        }
    }

    #[test]
    fn output_views() {
        let mut data = [0u8; 8];

        let mut v = OutputBuffer::new(&mut data, 2, 4);
        v.as_mut_slice().unwrap().copy_from_slice(b"abcd");
        assert_eq!(&data, b"\0\0abcd\0\0");

        let v = OutputBuffer::new(&mut data, 4, 5);
        assert_eq!(v.validate().unwrap_err().exit_code(), ExitCode::InvalidArgument);

        let v = OutputBuffer::new(&mut data, -2, 1);
        assert_eq!(v.validate().unwrap_err().exit_code(), ExitCode::InvalidArgument);
    }

    #[test]
    fn raw_acquisition() {
        unsafe {
            // negative arguments win over a null pointer
            let e = InputBuffer::from_raw(std::ptr::null(), 0, -1, 4).unwrap_err();
            assert_eq!(e.exit_code(), ExitCode::InvalidArgument);

            let e = InputBuffer::from_raw(std::ptr::null(), 0, 0, 4).unwrap_err();
            assert_eq!(e.exit_code(), ExitCode::InputBufferUnavailable);

            let e = OutputBuffer::from_raw(std::ptr::null_mut(), 0, 0, 4).unwrap_err();
            assert_eq!(e.exit_code(), ExitCode::OutputBufferUnavailable);

            // null with nothing requested is just an empty view
            let v = InputBuffer::from_raw(std::ptr::null(), 0, 0, 0).unwrap();
            assert!(v.as_slice().unwrap().is_empty());

            let data = [1u8, 2, 3, 4];
            let v = InputBuffer::from_raw(data.as_ptr(), 4, 1, 2).unwrap();
            assert_eq!(v.as_slice().unwrap(), &[2, 3]);

            let v = InputBuffer::from_raw(data.as_ptr(), 4, 3, 2).unwrap();
            assert_eq!(v.as_slice().unwrap_err().exit_code(), ExitCode::InvalidArgument);
        }
    }
}
