//! Data Buffer (§4.3, component C3): append-with-growth reassembly buffer
//! for fragmented WSS text frames.
//!
//! No teacher crate models this directly; grounded on
//! `examples/original_source/src/source/Signaling/...`'s `DataBuffer.h`
//! description (initial 2 KiB, 512-byte geometric growth pad, 20 KiB cap).

use crate::error::{Result, SignalingError};

const INITIAL_CAPACITY: usize = 2 * 1024;
const GROWTH_PAD: usize = 512;
const MAX_CAPACITY: usize = 20 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    InProgress,
    /// The fragment completed a message; call [`DataBuffer::take`] to get
    /// the bytes.
    Complete,
}

/// Reassembles fragmented WSS text/binary frames into one message.
#[derive(Debug)]
pub struct DataBuffer {
    buf: Vec<u8>,
    complete: bool,
}

impl Default for DataBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl DataBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(INITIAL_CAPACITY),
            complete: false,
        }
    }

    /// Appends `fragment`. When `final_fragment` is set the buffer is
    /// marked complete and the caller should retrieve the bytes with
    /// [`DataBuffer::take`].
    ///
    /// # Errors
    ///
    /// [`SignalingError::NotEnoughMemory`] if growing past [`MAX_CAPACITY`]
    /// would be required; the buffer is reset and no partial message is
    /// delivered.
    pub fn append(&mut self, fragment: &[u8], final_fragment: bool) -> Result<AppendOutcome> {
        let needed = self.buf.len() + fragment.len();
        if needed > MAX_CAPACITY {
            self.reset();
            return Err(SignalingError::NotEnoughMemory);
        }
        if needed > self.buf.capacity() {
            let grown = (needed + GROWTH_PAD).min(MAX_CAPACITY);
            self.buf.reserve(grown - self.buf.len());
        }
        self.buf.extend_from_slice(fragment);

        if final_fragment {
            self.complete = true;
            Ok(AppendOutcome::Complete)
        } else {
            Ok(AppendOutcome::InProgress)
        }
    }

    /// Returns the accumulated, NUL-terminated bytes and resets the buffer.
    /// Only meaningful after an [`AppendOutcome::Complete`].
    pub fn take(&mut self) -> Vec<u8> {
        let mut out = std::mem::take(&mut self.buf);
        out.push(0);
        self.complete = false;
        out
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Clears size and completion flag without releasing the underlying
    /// allocation.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.complete = false;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}
