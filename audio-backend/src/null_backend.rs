use crate::{BackendError, BackendKind, ChannelBackend, VoiceChannel};

/// Backend for builds without audio output. Never yields a channel.
#[derive(Debug, Default)]
pub struct NullChannelBackend;

impl NullChannelBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ChannelBackend for NullChannelBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Null
    }

    fn try_create_channel(&mut self) -> Result<Box<dyn VoiceChannel>, BackendError> {
        Err(BackendError::Unavailable)
    }
}
