//! The capture capability every source implements.

use crate::capture::frame::Frame;

/// A blocking producer of frames.
///
/// `read` may block for the source's own pacing interval (hardware exposure
/// time, simulated delay) before returning. `None` means the source failed to
/// produce a frame; whether that is the end of the stream depends on
/// [`FrameSource::failure_is_terminal`].
///
/// Sources are driven from a single thread at a time. The capture loop owns
/// the source exclusively once the stream is started, so implementations do
/// not need internal locking.
pub trait FrameSource: Send {
    /// Block until the next frame is ready, or return `None` on failure.
    fn read(&mut self) -> Option<Frame>;

    /// Free the underlying resource. Must be idempotent: the capture loop and
    /// teardown paths may both reach it.
    fn release(&mut self);

    /// Whether a failed `read` means no further frames will ever arrive.
    ///
    /// Device-backed sources return `true` (a disconnected camera does not
    /// come back); synthetic sources return `false`.
    fn failure_is_terminal(&self) -> bool {
        true
    }
}
