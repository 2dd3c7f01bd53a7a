//! Queued I2C requests and their completion handlers.

use std::fmt;
use std::time::Duration;

use crate::error::I2cError;

/// What a read completion handler wants next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadAction {
    /// Request finished.
    #[default]
    Done,
    /// Re-enqueue the same request at the tail of the queue (register polling).
    Repeat,
}

/// Result of a completed read, passed to the read handler.
#[derive(Debug, Clone, Copy)]
pub struct ReadCompletion<'a> {
    /// Register the read started at.
    pub reg_address: u8,
    /// Bytes requested.
    pub length: usize,
    /// Completion time on the control clock.
    pub timestamp: Duration,
    /// Bytes read; `data.len() == length`.
    pub data: &'a [u8],
}

/// Read completion handler. Runs on the control thread without any device
/// lock held, so it may enqueue further requests.
pub type ReadHandler = Box<dyn for<'a> FnMut(&ReadCompletion<'a>) -> ReadAction + Send>;

/// Write completion handler (notification only): `(reg_address, length)`.
pub type WriteHandler = Box<dyn FnOnce(u8, usize) + Send>;

pub(crate) enum RequestKind {
    Read {
        handler: Option<ReadHandler>,
    },
    Write {
        payload: Vec<u8>,
        handler: Option<WriteHandler>,
    },
}

/// One queued transfer. The variant alone decides read versus write.
pub struct I2cRequest {
    pub(crate) reg_address: u8,
    pub(crate) length: usize,
    pub(crate) kind: RequestKind,
}

impl I2cRequest {
    /// Read request.
    pub fn read(reg_address: u8, length: usize, handler: Option<ReadHandler>) -> Self {
        Self {
            reg_address,
            length,
            kind: RequestKind::Read { handler },
        }
    }

    /// Write request.
    pub fn write(
        reg_address: u8,
        length: usize,
        payload: Vec<u8>,
        handler: Option<WriteHandler>,
    ) -> Self {
        Self {
            reg_address,
            length,
            kind: RequestKind::Write { payload, handler },
        }
    }

    /// Register address.
    pub fn reg_address(&self) -> u8 {
        self.reg_address
    }

    /// Transfer length in bytes.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Whether this is a write.
    pub fn is_write(&self) -> bool {
        matches!(self.kind, RequestKind::Write { .. })
    }

    /// Check the request against a port buffer of `max_len` bytes.
    pub fn validate(&self, max_len: usize) -> Result<(), I2cError> {
        if self.length == 0 {
            return Err(I2cError::InvalidLength);
        }
        if self.length > max_len {
            return Err(I2cError::TransferTooLong {
                len: self.length,
                max: max_len,
            });
        }
        if let RequestKind::Write { payload, .. } = &self.kind {
            if payload.len() != self.length {
                return Err(I2cError::PayloadMismatch {
                    expected: self.length,
                    actual: payload.len(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for I2cRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("I2cRequest");
        d.field("reg_address", &format_args!("{:#04x}", self.reg_address))
            .field("length", &self.length);
        match &self.kind {
            RequestKind::Read { handler } => d
                .field("kind", &"read")
                .field("handler", &handler.is_some()),
            RequestKind::Write { payload, handler } => d
                .field("kind", &"write")
                .field("payload", payload)
                .field("handler", &handler.is_some()),
        };
        d.finish()
    }
}
