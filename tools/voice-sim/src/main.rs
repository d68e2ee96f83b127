use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use audio_backend::mock_backend::{MockChannelBackend, MockDeviceProbe};
use audio_system::{
    ManualClock, PlaybackState, PoolConfig, PositionalReplacementPolicy, SoundBank, SoundBuffer,
    SoundSource, SoundSourcePool, Vec3,
};
use clap::Parser;

/// Drive a sound source pool against a mock device and print how voices
/// move between sources tick by tick.
#[derive(Parser)]
struct Args {
    /// Channels the mock device can provide
    #[arg(long, default_value_t = 8)]
    capacity: usize,
    /// Long-lived sources to create up front
    #[arg(long, default_value_t = 24)]
    sources: usize,
    /// Number of update ticks to run
    #[arg(long, default_value_t = 60)]
    ticks: u32,
    /// Simulated milliseconds per tick
    #[arg(long, default_value_t = 16)]
    tick_ms: u64,
    /// Spawn a fire-and-forget blip every N ticks (0 disables)
    #[arg(long, default_value_t = 10)]
    blip_every: u32,
    /// Rank by gain as heard from a moving listener
    #[arg(long)]
    positional: bool,
    /// RON pool config
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => PoolConfig::load(path)?,
        None => PoolConfig::default(),
    };
    run(&args, config)
}

fn run(args: &Args, config: PoolConfig) -> Result<()> {
    let backend = MockChannelBackend::with_capacity(args.capacity);
    let probe = backend.probe();
    let clock = ManualClock::new();
    let pool = SoundSourcePool::with_parts(Box::new(backend), Arc::new(clock.clone()), config);

    let listener = Arc::new(PositionalReplacementPolicy::new(Vec3::ZERO));
    if args.positional {
        pool.lend_replacement_policy(listener.clone());
    }

    let sources: Vec<SoundSource> = (0..args.sources).map(|i| spawn(&pool, i)).collect();

    let mut bank = SoundBank::new();
    bank.insert(SoundBuffer::new("blip", 0.25));

    let step = Duration::from_millis(args.tick_ms);
    for tick in 0..args.ticks {
        clock.advance(step);

        if args.positional {
            let x = (tick as f32 * 0.1).sin() * 400.0;
            listener.set_listener_position(Vec3::new(x, 0.0, 0.0));
        }
        if args.blip_every > 0 && tick % args.blip_every == 0 {
            pool.play_sound(&bank, "blip", 1.0, 1.0, Vec3::ZERO, Vec3::ZERO)
                .context("spawning blip")?;
        }
        if tick % 7 == 3 {
            finish_one(&probe);
        }

        pool.update();
        report(tick, &pool, &sources, &probe);
    }

    drop(sources);
    pool.purge();
    println!(
        "done: channels created={} live={}",
        probe.created_total(),
        probe.live_channels()
    );
    Ok(())
}

/// Sources spread over a ring with a few priority tiers and varied gain.
fn spawn(pool: &SoundSourcePool, index: usize) -> SoundSource {
    let angle = index as f32 * 2.399;
    let radius = 20.0 + (index % 5) as f32 * 120.0;
    let looping = index % 3 != 0;
    let buffer = SoundBuffer::new(format!("bed-{index}"), 2.0 + (index % 4) as f32);
    let source = SoundSource::with_buffer(
        pool,
        &buffer,
        1.0,
        0.2 + (index % 7) as f32 * 0.1,
        Vec3::new(angle.cos() * radius, 0.0, angle.sin() * radius),
        Vec3::ZERO,
        looping,
    );
    source.set_priority(1 + (index % 3) as i32);
    source.play();
    source
}

/// Let the lowest-numbered playing channel run to completion.
fn finish_one(probe: &MockDeviceProbe) {
    let playing = probe.channel_ids().into_iter().find(|id| {
        probe
            .channel(*id)
            .is_some_and(|record| record.state == PlaybackState::Playing)
    });
    if let Some(id) = playing {
        probe.finish(id);
        tracing::debug!(channel = %id, "channel ran to completion");
    }
}

fn report(tick: u32, pool: &SoundSourcePool, sources: &[SoundSource], probe: &MockDeviceProbe) {
    let playing = sources.iter().filter(|s| s.is_playing()).count();
    let held: String = sources
        .iter()
        .map(|s| if s.is_assigned() { '#' } else if s.is_playing() { '.' } else { ' ' })
        .collect();
    println!(
        "tick {tick:>4} playing={playing:>3} assigned={:>3} spare={:>2} ff={:>2} live={:>3} [{held}]",
        pool.assigned_count(),
        pool.spare_voice_count(),
        pool.fire_and_forget_count(),
        probe.live_channels(),
    );
}
