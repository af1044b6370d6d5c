//! Error types for the framing engine.
//!
//! Two axes matter to callers: which half of the pipeline failed (sync vs
//! stream) and whether the failure is recoverable. Corruption errors leave
//! the raising object in a continuable state and should be treated as
//! data-loss warnings; everything else is fatal to that object.

use thiserror::Error;

/// A sync state, stream state, or a view produced by one was used after
/// `release()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("resource used after release")]
pub struct ReleasedResourceError;

/// Errors raised by [`SyncState`](crate::SyncState).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Operation on a released sync state.
    #[error(transparent)]
    Released(#[from] ReleasedResourceError),

    /// Bytes were discarded while hunting for the next page boundary.
    /// Recoverable: retry `pageout`.
    #[error("corrupt data: skipped {skipped} bytes while resynchronizing")]
    CorruptData { skipped: usize },

    /// The accumulator would outgrow its configured limit.
    #[error("sync buffer full: {requested} bytes requested, limit is {limit}")]
    BufferFull { requested: usize, limit: usize },
}

impl SyncError {
    /// True for recoverable framing-level corruption.
    #[inline]
    pub fn is_corrupt_data(&self) -> bool {
        matches!(self, SyncError::CorruptData { .. })
    }

    /// True for use-after-release.
    #[inline]
    pub fn is_released(&self) -> bool {
        matches!(self, SyncError::Released(_))
    }
}

/// Errors raised by [`StreamState`](crate::StreamState).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// Operation on a released stream state.
    #[error(transparent)]
    Released(#[from] ReleasedResourceError),

    /// `packetin` after an end-of-stream packet was already submitted.
    #[error("packet submitted after end of stream")]
    PacketAfterEos,

    /// `pagein` got a page belonging to a different logical stream.
    /// Recoverable: route the page to the right decoder and carry on.
    #[error("page serial 0x{got:08x} does not match stream serial 0x{expected:08x}")]
    SerialMismatch { expected: u32, got: u32 },

    /// `pagein` got a page declaring a format version this engine does not
    /// know.
    #[error("unsupported page version {0}")]
    UnsupportedVersion(u8),

    /// `pagein` noticed a jump in page numbering: at least one page was
    /// lost. The offered page is still buffered and reassembly continues.
    #[error("page sequence gap: expected page {expected}, got {got}")]
    SequenceGap { expected: u32, got: u32 },

    /// `packetout`/`packetpeek` reached the spot where pages went missing;
    /// the packet that was in flight there is gone. Later packets remain
    /// retrievable.
    #[error("hole in stream: a packet was lost to a missing page")]
    Hole,
}

impl StreamError {
    /// True for recoverable framing-level corruption.
    #[inline]
    pub fn is_corrupt_data(&self) -> bool {
        matches!(
            self,
            StreamError::SerialMismatch { .. }
                | StreamError::UnsupportedVersion(_)
                | StreamError::SequenceGap { .. }
                | StreamError::Hole
        )
    }

    /// True for use-after-release.
    #[inline]
    pub fn is_released(&self) -> bool {
        matches!(self, StreamError::Released(_))
    }
}

/// Any error the engine can raise, for callers driving both halves of the
/// pipeline through one error path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OggError {
    #[error(transparent)]
    Released(#[from] ReleasedResourceError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Stream(#[from] StreamError),
}

impl OggError {
    /// True for recoverable framing-level corruption.
    pub fn is_corrupt_data(&self) -> bool {
        match self {
            OggError::Released(_) => false,
            OggError::Sync(e) => e.is_corrupt_data(),
            OggError::Stream(e) => e.is_corrupt_data(),
        }
    }

    /// True for use-after-release.
    pub fn is_released(&self) -> bool {
        match self {
            OggError::Released(_) => true,
            OggError::Sync(e) => e.is_released(),
            OggError::Stream(e) => e.is_released(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupt_data_classification() {
        assert!(SyncError::CorruptData { skipped: 3 }.is_corrupt_data());
        assert!(!SyncError::BufferFull {
            requested: 10,
            limit: 5
        }
        .is_corrupt_data());

        assert!(StreamError::Hole.is_corrupt_data());
        assert!(StreamError::SequenceGap {
            expected: 1,
            got: 4
        }
        .is_corrupt_data());
        assert!(StreamError::SerialMismatch {
            expected: 1,
            got: 2
        }
        .is_corrupt_data());
        assert!(!StreamError::PacketAfterEos.is_corrupt_data());
    }

    #[test]
    fn test_released_classification() {
        let sync: SyncError = ReleasedResourceError.into();
        let stream: StreamError = ReleasedResourceError.into();
        assert!(sync.is_released());
        assert!(stream.is_released());
        assert!(!sync.is_corrupt_data());
        assert!(!stream.is_corrupt_data());
    }

    #[test]
    fn test_top_level_delegation() {
        let err: OggError = SyncError::CorruptData { skipped: 1 }.into();
        assert!(err.is_corrupt_data());
        assert!(!err.is_released());

        let err: OggError = ReleasedResourceError.into();
        assert!(err.is_released());

        let err: OggError = StreamError::Released(ReleasedResourceError).into();
        assert!(err.is_released());
    }

    #[test]
    fn test_error_messages() {
        let err = SyncError::CorruptData { skipped: 17 };
        assert_eq!(
            err.to_string(),
            "corrupt data: skipped 17 bytes while resynchronizing"
        );

        let err = StreamError::SerialMismatch {
            expected: 0x100,
            got: 0x200,
        };
        assert_eq!(
            err.to_string(),
            "page serial 0x00000200 does not match stream serial 0x00000100"
        );
    }
}
