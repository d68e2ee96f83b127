//! Shared fixtures for the cross-crate tests: a pool on a mock device with a
//! hand-cranked clock.

use std::sync::Arc;
use std::time::Duration;

use audio_backend::mock_backend::{MockChannelBackend, MockDeviceProbe};
use audio_system::{ManualClock, PoolConfig, SoundBuffer, SoundSource, SoundSourcePool};

pub struct Rig {
    pub pool: SoundSourcePool,
    pub probe: MockDeviceProbe,
    pub clock: ManualClock,
}

impl Rig {
    pub fn new(capacity: usize) -> Self {
        Self::with_config(capacity, PoolConfig::default())
    }

    pub fn with_config(capacity: usize, config: PoolConfig) -> Self {
        let backend = MockChannelBackend::with_capacity(capacity);
        let probe = backend.probe();
        let clock = ManualClock::new();
        let pool = SoundSourcePool::with_parts(Box::new(backend), Arc::new(clock.clone()), config);
        Self { pool, probe, clock }
    }

    pub fn tick(&self, seconds: f32) {
        self.clock.advance(Duration::from_secs_f32(seconds));
    }

    /// A playing source on a buffer long enough never to end during a test.
    pub fn start(&self, priority: i32, gain: f32) -> SoundSource {
        let source = SoundSource::new(&self.pool);
        source.set_buffer(&SoundBuffer::new("bed", 600.0));
        source.set_priority(priority);
        source.set_gain(gain);
        source.play();
        source
    }
}
