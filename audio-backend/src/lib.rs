// Hardware channel binding consumed by the sound source pool.
// Backends hand out exclusive `VoiceChannel`s; the pool never talks to a
// platform API any other way.

use std::fmt;

use glam::Vec3;
use thiserror::Error;

mod buffer;
pub use buffer::SoundBuffer;

// The null backend is always available; it is what a headless build runs on.
pub mod null_backend;

// The mock backend implementation lives in `src/mock_backend.rs`.
#[cfg(feature = "mock-audio")]
pub mod mock_backend;

/// Failure to acquire or drive a playback channel.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("no free playback channel")]
    ChannelsExhausted,
    #[error("audio output is unavailable")]
    Unavailable,
    #[error("device error: {0}")]
    Device(String),
}

/// Which family of backend a `ChannelBackend` belongs to.
///
/// Checked once by the pool when it is constructed instead of probing the
/// concrete type on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Produces no channels and no sound. Pools on this backend report muted.
    Null,
    /// In-memory device used by tests and the simulator.
    Mock,
    /// A real platform binding implemented outside this crate.
    Native,
}

impl BackendKind {
    pub fn is_null(self) -> bool {
        matches!(self, BackendKind::Null)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Null => write!(f, "null"),
            BackendKind::Mock => write!(f, "mock"),
            BackendKind::Native => write!(f, "native"),
        }
    }
}

/// Observable state of a playback channel.
///
/// `Stopped` is both the initial state and the only state reached by
/// natural playback completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Paused,
    Playing,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Stopped => write!(f, "stopped"),
            PlaybackState::Paused => write!(f, "paused"),
            PlaybackState::Playing => write!(f, "playing"),
        }
    }
}

/// One channel-level tunable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChannelParam {
    Pitch(f32),
    Gain(f32),
    Position(Vec3),
    Velocity(Vec3),
    Looping(bool),
    ReferenceDistance(f32),
    MaxDistance(f32),
    Rolloff(f32),
}

/// Opaque platform identifier of a channel. Only meaningful to its backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u32);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch#{}", self.0)
    }
}

/// An acquired, exclusive physical playback channel.
///
/// Dropping the channel releases it back to the platform.
pub trait VoiceChannel: Send {
    fn id(&self) -> ChannelId;
    fn bind_buffer(&mut self, buffer: &SoundBuffer);
    fn set_param(&mut self, param: ChannelParam);
    /// Seek to `seconds` into the bound buffer.
    fn set_offset(&mut self, seconds: f32);
    /// Current offset into the bound buffer, in seconds.
    fn offset(&self) -> f32;
    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    fn state(&self) -> PlaybackState;
}

/// The core trait defining the channel supply contract.
pub trait ChannelBackend: Send {
    fn kind(&self) -> BackendKind;

    /// Attempt to acquire one more channel. Exhaustion is an ordinary
    /// outcome and must be reported as an error value, never a panic.
    fn try_create_channel(&mut self) -> Result<Box<dyn VoiceChannel>, BackendError>;
}

/// Runtime helper to determine if the `mock-audio` feature was enabled at
/// compile time for this crate.
pub fn is_mock_backend_enabled() -> bool {
    cfg!(feature = "mock-audio")
}

/// Default channel count of the backend returned by `create_channel_backend`
/// when the mock is compiled in.
pub const DEFAULT_MOCK_CHANNELS: usize = 32;

#[cfg(feature = "mock-audio")]
pub fn create_channel_backend() -> Box<dyn ChannelBackend> {
    let backend = mock_backend::MockChannelBackend::with_capacity(DEFAULT_MOCK_CHANNELS);
    tracing::info!(kind = %backend.kind(), channels = DEFAULT_MOCK_CHANNELS, "create_channel_backend");
    Box::new(backend)
}

#[cfg(not(feature = "mock-audio"))]
pub fn create_channel_backend() -> Box<dyn ChannelBackend> {
    let backend = null_backend::NullChannelBackend::new();
    tracing::info!(kind = %backend.kind(), "create_channel_backend");
    Box::new(backend)
}
