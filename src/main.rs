//! Aperture capture benchmark: synchronous reads vs. the threaded stream.
//!
//! Both runs drive the synthetic source and simulate a fixed per-frame
//! inference cost. The synchronous baseline pays capture latency and
//! inference back to back; the threaded stream overlaps them, which is the
//! whole point of the latest-frame slot.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use color_eyre::Result;
use tracing::info;

use aperture::capture::{FrameSource, SyntheticSource};
use aperture::{AsyncFrameStream, BenchConfig, Config, SyntheticConfig};

fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter("aperture=debug")
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("Aperture benchmark launching...");

    let config = Config::load()?;
    aperture::CONFIG.store(Arc::new(config.clone()));

    let sync_fps = run_sync(&config.synthetic, &config.bench);
    let stream_fps = run_streamed(&config.synthetic, &config.bench)?;

    let improvement = (stream_fps - sync_fps) / sync_fps * 100.0;
    info!(
        "RESULT: sync {sync_fps:.2} FPS, stream {stream_fps:.2} FPS ({improvement:+.1}%)"
    );

    Ok(())
}

/// Simulated model inference cost per frame.
fn heavy_processing(bench: &BenchConfig) {
    thread::sleep(Duration::from_millis(bench.inference_ms));
}

/// Baseline: each iteration pays full capture latency, then inference.
fn run_sync(synthetic: &SyntheticConfig, bench: &BenchConfig) -> f64 {
    info!("synchronous baseline: {} frames", bench.iterations);

    let mut source = SyntheticSource::new(synthetic);

    let started = Instant::now();
    for _ in 0..bench.iterations {
        let Some(_frame) = source.read() else { break };
        heavy_processing(bench);
    }
    let elapsed = started.elapsed();
    source.release();

    let fps = bench.iterations as f64 / elapsed.as_secs_f64();
    info!("sync: {fps:.2} FPS");
    fps
}

/// Threaded: the capture loop runs concurrently, reads are slot snapshots.
fn run_streamed(synthetic: &SyntheticConfig, bench: &BenchConfig) -> Result<f64> {
    info!("threaded stream: {} frames", bench.iterations);

    let source = SyntheticSource::new(synthetic);
    let mut stream = AsyncFrameStream::new(source)?.start();

    // Let the capture loop get ahead of us
    thread::sleep(Duration::from_millis(bench.warmup_ms));

    let started = Instant::now();
    for _ in 0..bench.iterations {
        let _frame = stream.read();
        heavy_processing(bench);
    }
    let elapsed = started.elapsed();
    stream.stop();

    let fps = bench.iterations as f64 / elapsed.as_secs_f64();
    info!("stream: {fps:.2} FPS");
    Ok(fps)
}
