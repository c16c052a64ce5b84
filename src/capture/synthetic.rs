//! Synthetic frame source for development without a physical device.
//!
//! Renders a moving target bouncing inside the frame bounds and paces itself
//! with a fixed inter-frame sleep, emulating hardware capture latency. It
//! never signals terminal failure.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::debug;

use crate::capture::frame::{Frame, FrameMetadata, PixelFormat};
use crate::capture::source::FrameSource;
use crate::SyntheticConfig;

/// Distance from the frame edge at which the target reflects. Doubles as the
/// target's radius so it visually touches the wall on the reflecting step.
const WALL_MARGIN: i32 = 20;

/// Deterministic bounce trajectory: advance by velocity, then reflect the
/// velocity component whose coordinate has reached the wall margin.
#[derive(Debug, Clone)]
pub struct Bounce {
    x: i32,
    y: i32,
    dx: i32,
    dy: i32,
    width: i32,
    height: i32,
}

impl Bounce {
    pub fn new(x: i32, y: i32, dx: i32, dy: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            dx,
            dy,
            width,
            height,
        }
    }

    /// Advance one step and return the new position.
    ///
    /// The reflection happens after the move, so a coordinate may sit at or
    /// slightly past the margin for exactly one step before heading back.
    pub fn step(&mut self) -> (i32, i32) {
        self.x += self.dx;
        self.y += self.dy;

        if self.x <= WALL_MARGIN || self.x >= self.width - WALL_MARGIN {
            self.dx = -self.dx;
        }
        if self.y <= WALL_MARGIN || self.y >= self.height - WALL_MARGIN {
            self.dy = -self.dy;
        }

        (self.x, self.y)
    }

    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }
}

/// Frame generator emulating a paced camera.
pub struct SyntheticSource {
    bounce: Bounce,
    width: u32,
    height: u32,
    delay: Duration,
    sequence: u64,
}

impl SyntheticSource {
    pub fn new(config: &SyntheticConfig) -> Self {
        let (w, h) = (config.width as i32, config.height as i32);
        Self {
            bounce: Bounce::new(
                w / 2,
                h / 2,
                config.velocity.0,
                config.velocity.1,
                w,
                h,
            ),
            width: config.width,
            height: config.height,
            delay: Duration::from_secs_f64(1.0 / config.fps as f64),
            sequence: 0,
        }
    }

    /// Draw the target as a filled circle into a fresh black RGB24 buffer.
    fn render(&self, cx: i32, cy: i32) -> Vec<u8> {
        let (w, h) = (self.width as i32, self.height as i32);
        let mut buf = vec![0u8; (self.width * self.height * 3) as usize];

        let r = WALL_MARGIN;
        for y in (cy - r).max(0)..=(cy + r).min(h - 1) {
            for x in (cx - r).max(0)..=(cx + r).min(w - 1) {
                let (ox, oy) = (x - cx, y - cy);
                if ox * ox + oy * oy <= r * r {
                    // Green target on black background
                    buf[((y * w + x) * 3 + 1) as usize] = 255;
                }
            }
        }

        buf
    }
}

impl FrameSource for SyntheticSource {
    fn read(&mut self) -> Option<Frame> {
        // Emulate the time a real camera spends on exposure and readout
        std::thread::sleep(self.delay);

        let (x, y) = self.bounce.step();
        let data = Bytes::from(self.render(x, y));

        self.sequence += 1;

        Some(Frame {
            data,
            meta: Arc::new(FrameMetadata {
                sequence: self.sequence,
                width: self.width,
                height: self.height,
                stride: self.width * 3,
                format: PixelFormat::Rgb24,
            }),
            timestamp: Instant::now(),
        })
    }

    fn release(&mut self) {
        // No underlying resource; still observable in traces
        debug!("synthetic source released");
    }

    fn failure_is_terminal(&self) -> bool {
        false
    }
}
