//! Sound source pool: multiplexes any number of logical sound sources onto
//! the small set of playback channels a platform can actually provide.
//!
//! Callers create [`SoundSource`]s against a [`SoundSourcePool`], set what
//! they want to hear, and call [`SoundSourcePool::update`] once per frame.
//! The pool grants hardware voices to the sources its [`ReplacementPolicy`]
//! ranks highest and lets the rest play virtually until a voice frees up.

mod attenuation;
mod bank;
mod clock;
mod config;
mod error;
mod listener;
mod policy;
mod pool;
mod source;
mod voice;

pub use attenuation::inverse_distance_clamped;
pub use bank::SoundBank;
pub use clock::{Clock, ManualClock, MonotonicClock, Timestamp};
pub use config::{PoolConfig, SourceDefaults};
pub use error::AudioError;
pub use listener::Listener;
pub use policy::{
    rank_ordering, DefaultReplacementPolicy, PolicyOwnership, PositionalReplacementPolicy,
    Ranking, ReplacementPolicy,
};
pub use pool::SoundSourcePool;
pub use source::{SoundSource, SourceId, SourceState};
pub use voice::HardwareVoice;

// Collaborator types callers need to drive the pool.
pub use audio_backend::{BackendKind, ChannelBackend, PlaybackState, SoundBuffer};
pub use glam::{Quat, Vec3};
