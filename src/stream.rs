//! Threaded frame acquisition with a single latest-frame slot.
//!
//! One dedicated capture thread pulls frames from a [`FrameSource`] as fast
//! as the source paces itself and publishes each result into an atomically
//! swapped slot. Consumers snapshot the slot at their own rate and never wait
//! on capture latency. The slot holds exactly one frame: stale frames are
//! worthless for live inference, so latest-wins replaces any queueing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use arc_swap::ArcSwapOption;
use tracing::{debug, info, warn};

use crate::capture::frame::Frame;
use crate::capture::source::FrameSource;
use crate::error::StreamError;

/// Owns a [`FrameSource`] and the capture thread driving it.
///
/// Lifecycle: construction seeds the slot with one synchronous read,
/// [`start`](Self::start) spawns the capture thread, [`stop`](Self::stop)
/// signals it and joins. `stop` before `start` releases the source
/// immediately; `start` on an already-running or already-stopped stream is a
/// warned no-op. Dropping the stream performs the same shutdown, so the
/// thread is never leaked.
pub struct AsyncFrameStream<S: FrameSource> {
    slot: Arc<ArcSwapOption<Frame>>,
    stop: Arc<AtomicBool>,
    /// Present only between construction and `start` (or a pre-start `stop`).
    source: Option<S>,
    worker: Option<JoinHandle<()>>,
}

impl<S: FrameSource> AsyncFrameStream<S> {
    /// Seed the slot with an initial synchronous read.
    ///
    /// Fails with [`StreamError::InvalidSource`] if the source cannot produce
    /// a first frame, so a started stream always has something published.
    pub fn new(mut source: S) -> Result<Self, StreamError> {
        let first = source.read().ok_or(StreamError::InvalidSource)?;

        Ok(Self {
            slot: Arc::new(ArcSwapOption::new(Some(Arc::new(first)))),
            stop: Arc::new(AtomicBool::new(false)),
            source: Some(source),
            worker: None,
        })
    }

    /// Snapshot the latest published frame.
    ///
    /// Wait-free: returns immediately with whatever the capture loop last
    /// published, regardless of how long the source blocks per capture.
    /// `None` before any successful capture or after a terminal failure.
    pub fn read(&self) -> Option<Frame> {
        self.slot.load_full().map(|frame| (*frame).clone())
    }

    /// Signal the capture loop and join it. Idempotent.
    ///
    /// The loop owns the source while running, so this never races a release
    /// against an in-flight capture; it only waits out at most one blocking
    /// read before the loop observes the flag.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("capture thread panicked during shutdown");
            }
            info!("frame stream stopped");
        }

        // Never started: the source was never handed to a loop, release it here
        if let Some(mut source) = self.source.take() {
            source.release();
        }
    }

    /// Whether a capture thread is currently owned.
    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }
}

impl<S: FrameSource + 'static> AsyncFrameStream<S> {
    /// Spawn the capture thread and return the stream for fluent use:
    /// `AsyncFrameStream::new(source)?.start()`.
    pub fn start(mut self) -> Self {
        if self.worker.is_some() {
            warn!("start() called while already running; ignoring");
            return self;
        }
        let Some(source) = self.source.take() else {
            warn!("start() called after the source was released; ignoring");
            return self;
        };

        let slot = Arc::clone(&self.slot);
        let stop = Arc::clone(&self.stop);
        self.worker = Some(std::thread::spawn(move || capture_loop(source, slot, stop)));

        info!("frame stream started");
        self
    }
}

impl<S: FrameSource> Drop for AsyncFrameStream<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Body of the capture thread.
///
/// Publishes every capture result into the slot; a failed read publishes
/// `None` so consumers observe the gap. Terminal failures end the loop. The
/// loop owns the source, so the release below runs exactly once and never
/// concurrently with a read.
fn capture_loop<S: FrameSource>(
    mut source: S,
    slot: Arc<ArcSwapOption<Frame>>,
    stop: Arc<AtomicBool>,
) {
    debug!("capture loop running");

    while !stop.load(Ordering::Acquire) {
        match source.read() {
            Some(frame) => slot.store(Some(Arc::new(frame))),
            None => {
                slot.store(None);
                if source.failure_is_terminal() {
                    info!("source reported terminal failure; capture loop stopping");
                    break;
                }
            }
        }
    }

    source.release();
    debug!("capture loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::frame::{FrameMetadata, PixelFormat};
    use crate::capture::SyntheticSource;
    use crate::SyntheticConfig;
    use bytes::Bytes;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    /// Source driven by a fixed script of read outcomes, recording releases.
    struct ScriptedSource {
        script: Vec<Option<Frame>>,
        cursor: usize,
        releases: Arc<AtomicUsize>,
        terminal: bool,
    }

    impl ScriptedSource {
        fn new(script: Vec<Option<Frame>>, releases: Arc<AtomicUsize>, terminal: bool) -> Self {
            Self {
                script,
                cursor: 0,
                releases,
                terminal,
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn read(&mut self) -> Option<Frame> {
            // An exhausted script repeats its final entry
            let idx = self.cursor.min(self.script.len().saturating_sub(1));
            let outcome = self.script.get(idx).cloned().flatten();
            if self.cursor < self.script.len() {
                self.cursor += 1;
            }
            // Paced cadence so the capture loop never spins
            std::thread::sleep(Duration::from_millis(1));
            outcome
        }

        fn release(&mut self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }

        fn failure_is_terminal(&self) -> bool {
            self.terminal
        }
    }

    fn test_frame(sequence: u64) -> Frame {
        Frame {
            data: Bytes::from(vec![sequence as u8; 48]),
            meta: Arc::new(FrameMetadata {
                sequence,
                width: 4,
                height: 4,
                stride: 4,
                format: PixelFormat::Rgb24,
            }),
            timestamp: Instant::now(),
        }
    }

    fn fast_synthetic() -> SyntheticSource {
        SyntheticSource::new(&SyntheticConfig {
            width: 64,
            height: 48,
            fps: 500,
            velocity: (5, 5),
        })
    }

    #[test]
    fn construction_requires_initial_frame() {
        let releases = Arc::new(AtomicUsize::new(0));
        let source = ScriptedSource::new(vec![None], releases, true);

        let err = AsyncFrameStream::new(source).err().expect("must fail");
        assert!(matches!(err, StreamError::InvalidSource));
    }

    #[test]
    fn read_is_idempotent_between_writes() {
        let releases = Arc::new(AtomicUsize::new(0));
        let source = ScriptedSource::new(vec![Some(test_frame(1))], releases, true);

        // Not started: nothing writes after the seeding read
        let stream = AsyncFrameStream::new(source).expect("seed frame");

        let a = stream.read().expect("seeded");
        let b = stream.read().expect("seeded");
        assert!(a.same_capture(&b));
        assert_eq!(a.meta.sequence, 1);
    }

    #[test]
    fn started_stream_publishes_fresh_frames() {
        let stream = AsyncFrameStream::new(fast_synthetic()).expect("synthetic seeds");
        let initial = stream.read().expect("seeded");

        let mut stream = stream.start();

        // Within a few pacing intervals the slot must move past the seed
        let deadline = Instant::now() + Duration::from_secs(2);
        let fresh = loop {
            let frame = stream.read().expect("synthetic never fails");
            if !frame.same_capture(&initial) {
                break frame;
            }
            assert!(Instant::now() < deadline, "no fresh frame published");
            std::thread::sleep(Duration::from_millis(2));
        };

        assert!(fresh.meta.sequence > initial.meta.sequence);
        stream.stop();
    }

    #[test]
    fn terminal_failure_latches_to_none() {
        let releases = Arc::new(AtomicUsize::new(0));
        let source = ScriptedSource::new(
            vec![Some(test_frame(1)), Some(test_frame(2)), None],
            Arc::clone(&releases),
            true,
        );

        let mut stream = AsyncFrameStream::new(source).expect("seed frame").start();

        let deadline = Instant::now() + Duration::from_secs(2);
        while stream.read().is_some() {
            assert!(Instant::now() < deadline, "failure never latched");
            std::thread::sleep(Duration::from_millis(2));
        }

        // Latched: every subsequent read stays None
        for _ in 0..10 {
            assert!(stream.read().is_none());
        }

        stream.stop();
        assert_eq!(releases.load(Ordering::SeqCst), 1, "released exactly once");
    }

    #[test]
    fn non_terminal_failure_does_not_stop_the_loop() {
        let releases = Arc::new(AtomicUsize::new(0));
        let script = vec![Some(test_frame(1)), None, Some(test_frame(3))];
        let source = ScriptedSource::new(script, Arc::clone(&releases), false);

        let mut stream = AsyncFrameStream::new(source).expect("seed frame").start();

        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            if let Some(frame) = stream.read() {
                if frame.meta.sequence == 3 {
                    break;
                }
            }
            assert!(Instant::now() < deadline, "loop never recovered");
            std::thread::sleep(Duration::from_millis(2));
        }

        stream.stop();
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_is_idempotent_and_reads_survive_it() {
        let mut stream = AsyncFrameStream::new(fast_synthetic())
            .expect("synthetic seeds")
            .start();

        std::thread::sleep(Duration::from_millis(20));
        stream.stop();
        assert!(!stream.is_running());

        // Last published value (or None) stays readable after teardown
        let after = stream.read();
        stream.stop();
        match (after, stream.read()) {
            (Some(a), Some(b)) => assert!(a.same_capture(&b)),
            (None, None) => {}
            _ => panic!("read changed across idempotent stop"),
        }
    }

    #[test]
    fn stop_before_start_releases_the_source() {
        let releases = Arc::new(AtomicUsize::new(0));
        let source = ScriptedSource::new(vec![Some(test_frame(1))], Arc::clone(&releases), true);

        let mut stream = AsyncFrameStream::new(source).expect("seed frame");
        stream.stop();
        assert_eq!(releases.load(Ordering::SeqCst), 1);

        // Source is gone, so a later start is a no-op; the seed stays readable
        let stream = stream.start();
        assert!(!stream.is_running());
        assert_eq!(stream.read().expect("seed").meta.sequence, 1);
    }

    #[test]
    fn double_start_keeps_a_single_worker() {
        let mut stream = AsyncFrameStream::new(fast_synthetic())
            .expect("synthetic seeds")
            .start()
            .start();

        assert!(stream.is_running());
        std::thread::sleep(Duration::from_millis(10));
        assert!(stream.read().is_some());
        stream.stop();
    }

    #[test]
    fn drop_joins_the_capture_thread() {
        let releases = Arc::new(AtomicUsize::new(0));
        let script = (1..1000).map(|i| Some(test_frame(i))).collect();
        let source = ScriptedSource::new(script, Arc::clone(&releases), true);

        {
            let _stream = AsyncFrameStream::new(source).expect("seed frame").start();
            std::thread::sleep(Duration::from_millis(10));
        }

        assert_eq!(releases.load(Ordering::SeqCst), 1, "drop released the source");
    }

    #[test]
    fn concurrent_readers_never_observe_torn_frames() {
        let stream = Arc::new(
            AsyncFrameStream::new(fast_synthetic())
                .expect("synthetic seeds")
                .start(),
        );

        let mut readers = Vec::new();
        for _ in 0..4 {
            let stream = Arc::clone(&stream);
            readers.push(std::thread::spawn(move || {
                let until = Instant::now() + Duration::from_millis(300);
                let mut observed = 0u64;
                while Instant::now() < until {
                    let frame = stream.read().expect("synthetic never fails");
                    // A torn publish would break the size/metadata pairing
                    assert_eq!(
                        frame.data.len(),
                        (frame.meta.width * frame.meta.height * 3) as usize
                    );
                    observed += 1;
                }
                observed
            }));
        }

        for reader in readers {
            let observed = reader.join().expect("reader thread");
            assert!(observed > 0);
        }
    }
}
