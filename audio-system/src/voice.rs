use audio_backend::{
    ChannelBackend, ChannelId, ChannelParam, PlaybackState, SoundBuffer, VoiceChannel,
};
use glam::Vec3;

/// One physical playback channel held by the pool.
///
/// At most one source drives a voice at a time. Dropping the voice stops it
/// and hands the channel back to the backend.
pub struct HardwareVoice {
    channel: Box<dyn VoiceChannel>,
    buffer: Option<SoundBuffer>,
}

impl HardwareVoice {
    /// Ask the backend for a fresh channel. `None` when the platform has no
    /// more to give; that is the normal way the pool learns its capacity.
    pub fn try_construct(backend: &mut dyn ChannelBackend) -> Option<Self> {
        match backend.try_create_channel() {
            Ok(channel) => {
                tracing::trace!(channel = %channel.id(), "acquired hardware voice");
                Some(Self {
                    channel,
                    buffer: None,
                })
            }
            Err(e) => {
                tracing::debug!(error = %e, backend = %backend.kind(), "voice acquisition failed");
                None
            }
        }
    }

    pub fn id(&self) -> ChannelId {
        self.channel.id()
    }

    /// Rebind the voice wholesale: buffer, pitch, gain, position, velocity
    /// and looping in one go.
    pub fn assign(
        &mut self,
        buffer: &SoundBuffer,
        pitch: f32,
        gain: f32,
        position: Vec3,
        velocity: Vec3,
        looping: bool,
    ) {
        self.set_buffer(buffer);
        self.set_pitch(pitch);
        self.set_gain(gain);
        self.set_position(position);
        self.set_velocity(velocity);
        self.set_looping(looping);
    }

    pub fn set_buffer(&mut self, buffer: &SoundBuffer) {
        self.channel.bind_buffer(buffer);
        self.buffer = Some(buffer.clone());
    }

    pub fn buffer(&self) -> Option<&SoundBuffer> {
        self.buffer.as_ref()
    }

    pub fn set_pitch(&mut self, pitch: f32) {
        self.channel.set_param(ChannelParam::Pitch(pitch));
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.channel.set_param(ChannelParam::Gain(gain));
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.channel.set_param(ChannelParam::Position(position));
    }

    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.channel.set_param(ChannelParam::Velocity(velocity));
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.channel.set_param(ChannelParam::Looping(looping));
    }

    pub fn set_reference_distance(&mut self, distance: f32) {
        self.channel
            .set_param(ChannelParam::ReferenceDistance(distance));
    }

    pub fn set_max_distance(&mut self, distance: f32) {
        self.channel.set_param(ChannelParam::MaxDistance(distance));
    }

    pub fn set_rolloff(&mut self, rolloff: f32) {
        self.channel.set_param(ChannelParam::Rolloff(rolloff));
    }

    pub fn set_time(&mut self, seconds: f32) {
        self.channel.set_offset(seconds);
    }

    pub fn time(&self) -> f32 {
        self.channel.offset()
    }

    pub fn play(&mut self) {
        self.channel.play();
    }

    pub fn pause(&mut self) {
        self.channel.pause();
    }

    pub fn stop(&mut self) {
        self.channel.stop();
    }

    pub fn state(&self) -> PlaybackState {
        self.channel.state()
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    pub fn is_paused(&self) -> bool {
        self.state() == PlaybackState::Paused
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == PlaybackState::Stopped
    }
}

impl Drop for HardwareVoice {
    fn drop(&mut self) {
        self.channel.stop();
    }
}

impl std::fmt::Debug for HardwareVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwareVoice")
            .field("channel", &self.id())
            .field("state", &self.state())
            .field("buffer", &self.buffer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audio_backend::mock_backend::MockChannelBackend;
    use audio_backend::null_backend::NullChannelBackend;

    #[test]
    fn null_backend_yields_no_voice() {
        let mut backend = NullChannelBackend::new();
        assert!(HardwareVoice::try_construct(&mut backend).is_none());
    }

    #[test]
    fn assign_writes_every_parameter_to_the_channel() {
        let mut backend = MockChannelBackend::with_capacity(1);
        let probe = backend.probe();
        let mut voice = HardwareVoice::try_construct(&mut backend).unwrap();
        let buffer = SoundBuffer::new("engine", 3.0);
        voice.assign(&buffer, 1.5, 0.25, Vec3::X, Vec3::Y, true);
        voice.set_rolloff(2.0);
        voice.set_time(1.0);
        voice.play();

        let record = probe.channel(voice.id()).unwrap();
        assert_eq!(record.buffer.as_deref(), Some("engine"));
        assert_eq!(record.pitch, 1.5);
        assert_eq!(record.gain, 0.25);
        assert_eq!(record.position, Vec3::X);
        assert_eq!(record.velocity, Vec3::Y);
        assert!(record.looping);
        assert_eq!(record.rolloff, 2.0);
        assert_eq!(record.offset, 1.0);
        assert!(voice.is_playing());
        assert!(SoundBuffer::same(voice.buffer().unwrap(), &buffer));
    }

    #[test]
    fn dropping_a_voice_releases_the_channel() {
        let mut backend = MockChannelBackend::with_capacity(1);
        let probe = backend.probe();
        let voice = HardwareVoice::try_construct(&mut backend).unwrap();
        assert!(HardwareVoice::try_construct(&mut backend).is_none());
        drop(voice);
        assert_eq!(probe.live_channels(), 0);
        assert!(HardwareVoice::try_construct(&mut backend).is_some());
    }
}
