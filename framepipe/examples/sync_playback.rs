// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Plays several synthetic streams in lockstep.
//!
//! Each stream gets its own decode thread producing solid-colour frames. The
//! main thread plays the display: on every refresh it lets each stream with a
//! buffered frame notify the render coordinator and delivers whatever tick
//! the barrier scheduled.
//!
//! ```text
//! cargo run --example sync_playback -- --streams 3 --frames 120
//! ```

mod common;

use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    thread,
    time::Duration,
};

use clap::Parser;
use framepipe::{
    ManualScheduler, PlaybackStream, PushOutcome, RenderCoordinator, StreamBuffer, StreamId,
};
use tracing::{debug, info};

#[derive(Debug, Parser)]
#[command(version, about = "Present synthetic video streams in lockstep")]
struct Opts {
    /// Number of streams to decode and present.
    #[arg(long, default_value_t = 2)]
    streams: usize,

    /// Length of the longest stream in frames; every further stream is
    /// shorter by `--length-step` frames.
    #[arg(long, default_value_t = 120)]
    frames: u64,

    /// Frames by which each subsequent stream is shorter.
    #[arg(long, default_value_t = 20)]
    length_step: u64,

    /// Display refresh interval in milliseconds.
    #[arg(long, default_value_t = 4)]
    refresh_ms: u64,

    /// JSON pipeline configuration; built-in defaults when omitted.
    #[arg(long, env = "FRAMEPIPE_CONFIG")]
    config: Option<PathBuf>,
}

struct Playback {
    id: StreamId,
    buffer: Arc<StreamBuffer>,
    presented: Arc<AtomicU64>,
}

fn spawn_decoder(
    index: usize,
    buffer: Arc<StreamBuffer>,
    length: u64,
    slot_size: usize,
) -> Result<(), framepipe::Error> {
    thread::Builder::new()
        .name(format!("decode-{index}"))
        .spawn(move || {
            let mut frame = buffer.next_frame();
            while frame < length {
                let claim = match buffer.available_load() {
                    0 => None,
                    _ => buffer.claim(),
                };
                let outcome = match claim {
                    Some(mut claim) => {
                        // Decode straight into the slot.
                        claim.payload_mut().fill((frame % 256) as u8);
                        buffer.queue(frame, claim, slot_size)
                    }
                    None => PushOutcome::Full,
                };
                if outcome != PushOutcome::Queued {
                    thread::sleep(Duration::from_millis(1));
                }
                // A seek may have moved the stream.
                frame = buffer.next_frame();
            }
            debug!("Decoder {index} reached end of stream");
        })?;
    Ok(())
}

fn main() -> Result<(), framepipe::Error> {
    common::setup_logging();
    let opts = Opts::parse();
    let config = common::load_config(opts.config.as_deref())?;
    info!("Pipeline configuration: {config:?}");

    let mut coordinator =
        RenderCoordinator::with_eos_margin(ManualScheduler::default(), config.eos_margin);
    let mut playbacks = Vec::with_capacity(opts.streams);

    for index in 0..opts.streams {
        let length = opts
            .frames
            .saturating_sub(opts.length_step * index as u64)
            .max(config.eos_margin + 1);
        let buffer = Arc::new(StreamBuffer::new(&config, length)?);
        let id = StreamId::new();
        coordinator.add_stream(id, buffer.clone());
        spawn_decoder(index, buffer.clone(), length, config.slot_size)?;
        info!("Stream {id} has {length} frames");
        playbacks.push(Playback {
            id,
            buffer,
            presented: Arc::new(AtomicU64::new(0)),
        });
    }

    let longest = playbacks
        .iter()
        .map(|playback| playback.buffer.length())
        .max()
        .unwrap_or(0);
    let mut ticks = 0u64;
    let mut position = 0u64;

    while position + config.eos_margin < longest {
        for playback in &playbacks {
            coordinator.set_frame_request(playback.id, position)?;
            if playback.buffer.buffered() == 0 {
                continue;
            }
            let buffer = playback.buffer.clone();
            let presented = playback.presented.clone();
            coordinator.notify_ready(playback.id, move || {
                if let Some(frame) = buffer.present(|view| view.frame_number) {
                    presented.store(frame, Ordering::Relaxed);
                }
            })?;
        }

        while let Some(tick) = coordinator.scheduler_mut().next_due() {
            if coordinator.on_refresh(tick) > 0 {
                ticks += 1;
                position += 1;
            }
        }
        thread::sleep(Duration::from_millis(opts.refresh_ms));
    }
    coordinator.stop();

    info!("Presented {ticks} synchronized ticks");
    for playback in &playbacks {
        info!(
            "Stream {} last presented frame {}",
            playback.id,
            playback.presented.load(Ordering::Relaxed)
        );
    }
    Ok(())
}
