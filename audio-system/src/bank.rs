use std::collections::HashMap;

use audio_backend::SoundBuffer;

use crate::error::AudioError;

/// Named sound buffers for fire-and-forget playback.
#[derive(Debug, Default, Clone)]
pub struct SoundBank {
    buffers: HashMap<String, SoundBuffer>,
}

impl SoundBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `buffer` under its own name, replacing any previous entry.
    pub fn insert(&mut self, buffer: SoundBuffer) -> Option<SoundBuffer> {
        self.buffers.insert(buffer.name().to_owned(), buffer)
    }

    pub fn insert_as(&mut self, name: impl Into<String>, buffer: SoundBuffer) -> Option<SoundBuffer> {
        self.buffers.insert(name.into(), buffer)
    }

    pub fn get(&self, name: &str) -> Option<&SoundBuffer> {
        self.buffers.get(name)
    }

    pub fn lookup(&self, name: &str) -> Result<&SoundBuffer, AudioError> {
        self.get(name)
            .ok_or_else(|| AudioError::UnknownSound(name.to_owned()))
    }

    pub fn remove(&mut self, name: &str) -> Option<SoundBuffer> {
        self.buffers.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.buffers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}
