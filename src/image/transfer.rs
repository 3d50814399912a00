//! Image buffer ownership and chunked delivery
//!
//! The buffer lives inside [`ImageTransfer::Prepared`], so it can only be
//! read by the chunk cursor once the producer has handed it over, and it
//! is freed as soon as the last chunk leaves or the state is reset.

use alloc::vec::Vec;

/// Lifecycle of the single image buffer
#[derive(Debug, Default, PartialEq, Eq)]
pub enum ImageTransfer {
    /// No capture running and nothing to send
    #[default]
    Idle,
    /// The producer is filling a buffer for the connection `generation`
    Capturing { generation: u32 },
    /// A buffer is ready and `sent` bytes of it have been notified
    Prepared { buffer: Vec<u8>, sent: usize },
}

/// One step of the chunk cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkStep {
    /// A full-size chunk; more follow
    Chunk(Vec<u8>),
    /// The remainder, possibly empty. The transfer is over.
    Last(Vec<u8>),
}

impl ChunkStep {
    pub fn data(&self) -> &[u8] {
        match self {
            Self::Chunk(data) | Self::Last(data) => data,
        }
    }

    pub fn is_last(&self) -> bool {
        matches!(self, Self::Last(_))
    }
}

impl ImageTransfer {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self, Self::Capturing { .. })
    }

    pub fn is_prepared(&self) -> bool {
        matches!(self, Self::Prepared { .. })
    }

    /// Bytes not yet notified, 0 unless prepared
    pub fn remaining(&self) -> usize {
        match self {
            Self::Prepared { buffer, sent } => buffer.len() - sent,
            _ => 0,
        }
    }

    /// Claim the buffer for a new capture.
    ///
    /// Any prepared image is dropped. Returns false if a capture is already
    /// running, in which case nothing changes.
    pub fn begin_capture(&mut self, generation: u32) -> bool {
        if self.is_capturing() {
            return false;
        }
        *self = Self::Capturing { generation };
        true
    }

    /// Hand a captured buffer to the consumer.
    ///
    /// The buffer is only accepted if this capture is still the one in
    /// progress and it was started on the connection `current_generation`.
    /// Otherwise it is dropped and the state returns to idle.
    pub fn complete_capture(&mut self, current_generation: u32, buffer: Vec<u8>) -> bool {
        match *self {
            Self::Capturing { generation } if generation == current_generation => {
                *self = Self::Prepared { buffer, sent: 0 };
                true
            }
            Self::Capturing { .. } => {
                *self = Self::Idle;
                false
            }
            _ => false,
        }
    }

    /// Release a failed capture
    pub fn fail_capture(&mut self) {
        if self.is_capturing() {
            *self = Self::Idle;
        }
    }

    /// Drop a prepared image. A running capture is left to finish.
    pub fn release(&mut self) -> bool {
        if self.is_prepared() {
            *self = Self::Idle;
            true
        } else {
            false
        }
    }

    /// Produce the next notification payload.
    ///
    /// While at least `chunk_size` bytes remain a full chunk is returned.
    /// Otherwise the remainder is returned as the last step and the buffer is
    /// freed. For an image of `L` bytes this yields `L / chunk_size` full
    /// chunks and one last chunk of `L % chunk_size` bytes. When `L` is a
    /// multiple of `chunk_size` the last chunk is empty, so every transfer
    /// ends with exactly one `Last` step and the phone sees the same
    /// notification count for both parities.
    ///
    /// Returns `None` if nothing is prepared.
    pub fn next_chunk(&mut self, chunk_size: usize) -> Option<ChunkStep> {
        let Self::Prepared { buffer, sent } = self else {
            return None;
        };

        let remaining = buffer.len() - *sent;
        if remaining >= chunk_size && chunk_size > 0 {
            let chunk = buffer[*sent..*sent + chunk_size].to_vec();
            *sent += chunk_size;
            return Some(ChunkStep::Chunk(chunk));
        }

        let last = buffer[*sent..].to_vec();
        *self = Self::Idle;
        Some(ChunkStep::Last(last))
    }
}
