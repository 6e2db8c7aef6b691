// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helpers for the fixed byte layouts of key bundles and session state.
//!
//! Public keys and secrets are always written with their full, fixed length. Variable-length
//! lists are prefixed with their length encoded as a [varu64] integer.
//!
//! [varu64]: https://github.com/AljoschaMeyer/varu64-rs
use thiserror::Error;

/// Maximum number of bytes a varu64 integer occupies.
const MAX_VARU64_SIZE: usize = 9;

/// Appends `value` as a varu64 integer to `buf`.
pub(crate) fn write_varu64(buf: &mut Vec<u8>, value: u64) {
    let mut out = [0u8; MAX_VARU64_SIZE];
    let len = varu64::encode(value, &mut out);
    buf.extend_from_slice(&out[..len]);
}

/// Cursor over a byte slice which fails on every malformed or truncated read.
pub(crate) struct ByteReader<'a> {
    bytes: &'a [u8],
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], SerializationError> {
        if self.bytes.len() < N {
            return Err(SerializationError::InvalidLength {
                expected: N,
                actual: self.bytes.len(),
            });
        }
        let (head, tail) = self.bytes.split_at(N);
        let mut out = [0u8; N];
        out.copy_from_slice(head);
        self.bytes = tail;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, SerializationError> {
        let [byte] = self.read_array::<1>()?;
        Ok(byte)
    }

    pub fn read_varu64(&mut self) -> Result<u64, SerializationError> {
        let (value, tail) =
            varu64::decode(self.bytes).map_err(|_| SerializationError::InvalidVarint)?;
        self.bytes = tail;
        Ok(value)
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len()
    }

    /// Makes sure all bytes have been consumed.
    pub fn finish(self) -> Result<(), SerializationError> {
        if self.bytes.is_empty() {
            Ok(())
        } else {
            Err(SerializationError::TrailingBytes(self.bytes.len()))
        }
    }
}

/// Malformed bytes when reconstructing key material or session state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SerializationError {
    #[error("expected {expected} more bytes but only {actual} are left")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid flag byte {0}")]
    InvalidFlag(u8),

    #[error("invalid or non-canonical varu64 integer")]
    InvalidVarint,

    #[error("{0} unexpected bytes at the end of input")]
    TrailingBytes(usize),
}
