use std::fmt;
use std::sync::Arc;

/// Decoded, ready-to-play audio. Read-only once constructed.
///
/// Decoding happens elsewhere; by the time a buffer reaches a source it is
/// complete and immutable, so handles are shared freely.
#[derive(Clone)]
pub struct SoundBuffer {
    inner: Arc<BufferInfo>,
}

struct BufferInfo {
    name: String,
    duration: f32,
}

impl SoundBuffer {
    pub fn new(name: impl Into<String>, duration_secs: f32) -> Self {
        Self {
            inner: Arc::new(BufferInfo {
                name: name.into(),
                duration: duration_secs.max(0.0),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Length of the buffer in seconds.
    pub fn duration(&self) -> f32 {
        self.inner.duration
    }

    /// True when both handles refer to the same decoded buffer.
    pub fn same(a: &SoundBuffer, b: &SoundBuffer) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl Default for SoundBuffer {
    fn default() -> Self {
        Self::new("", 0.0)
    }
}

impl fmt::Debug for SoundBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoundBuffer")
            .field("name", &self.inner.name)
            .field("duration", &self.inner.duration)
            .finish()
    }
}
