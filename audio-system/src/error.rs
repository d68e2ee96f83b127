use thiserror::Error;

/// Errors surfaced by the pool's fallible conveniences.
///
/// Voice acquisition failures are not errors here: running out of channels
/// is the normal operating condition the pool exists to handle.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("no sound named `{0}` in the sound bank")]
    UnknownSound(String),
    #[error("invalid pool config: {0}")]
    Config(#[from] ron::error::SpannedError),
}
