use std::fmt;

use audio_backend::{PlaybackState, SoundBuffer};
use glam::Vec3;

use crate::attenuation::inverse_distance_clamped;
use crate::clock::Timestamp;
use crate::config::SourceDefaults;
use crate::pool::SoundSourcePool;
use crate::voice::HardwareVoice;

/// Stable identity of a source within its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub(crate) u32);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "src#{}", self.0)
    }
}

/// Where a source is in its buffer while it has no voice to ask.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Playhead {
    state: PlaybackState,
    /// Offset into the buffer at `marked_at`.
    offset: f32,
    marked_at: Timestamp,
}

/// Everything the pool knows about one logical source.
///
/// Parameters are cached here and mirrored onto the voice while one is
/// assigned, so a source can lose its voice and get another without the
/// caller noticing. Replacement policies rank sources by reading this.
pub struct SourceState {
    voice: Option<HardwareVoice>,
    priority: i32,
    unstop_time: Timestamp,
    buffer: SoundBuffer,
    pitch: f32,
    gain: f32,
    position: Vec3,
    velocity: Vec3,
    looping: bool,
    reference_distance: f32,
    max_distance: f32,
    rolloff: f32,
    playhead: Playhead,
}

impl SourceState {
    pub(crate) fn new(defaults: &SourceDefaults, now: Timestamp) -> Self {
        Self {
            voice: None,
            priority: defaults.priority,
            unstop_time: now,
            buffer: SoundBuffer::default(),
            pitch: defaults.pitch,
            gain: defaults.gain,
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            looping: false,
            reference_distance: defaults.reference_distance,
            max_distance: defaults.max_distance,
            rolloff: defaults.rolloff,
            playhead: Playhead {
                state: PlaybackState::Stopped,
                offset: 0.0,
                marked_at: now,
            },
        }
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// When the source was last started or paused.
    pub fn unstop_time(&self) -> Timestamp {
        self.unstop_time
    }

    pub fn buffer(&self) -> &SoundBuffer {
        &self.buffer
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn reference_distance(&self) -> f32 {
        self.reference_distance
    }

    pub fn max_distance(&self) -> f32 {
        self.max_distance
    }

    pub fn rolloff(&self) -> f32 {
        self.rolloff
    }

    pub fn is_assigned(&self) -> bool {
        self.voice.is_some()
    }

    /// Playback state as last observed.
    ///
    /// A voice that reports `Stopped` under a source the caller paused is
    /// still reported as paused.
    pub fn state(&self) -> PlaybackState {
        match &self.voice {
            Some(voice) => match voice.state() {
                PlaybackState::Stopped if self.playhead.state == PlaybackState::Paused => {
                    PlaybackState::Paused
                }
                observed => observed,
            },
            None => self.playhead.state,
        }
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

    /// Gain as heard from `listener_position` under inverse distance clamped
    /// rolloff.
    pub fn calculate_gain(&self, listener_position: Vec3) -> f32 {
        let distance = self.position.distance(listener_position);
        self.gain
            * inverse_distance_clamped(
                distance,
                self.reference_distance,
                self.max_distance,
                self.rolloff,
            )
    }

    /// Seconds into the buffer at `now`.
    ///
    /// Asked of the voice while one is assigned. Otherwise extrapolated from
    /// the last mark: looping sources wrap, others saturate at the buffer's
    /// duration.
    pub fn time(&self, now: Timestamp) -> f32 {
        if let Some(voice) = &self.voice {
            return voice.time();
        }
        self.virtual_time(now)
    }

    fn virtual_time(&self, now: Timestamp) -> f32 {
        let Playhead {
            state,
            offset,
            marked_at,
        } = self.playhead;
        let elapsed = match state {
            PlaybackState::Playing => now.seconds_since(marked_at),
            _ => 0.0,
        };
        let time = offset + elapsed;
        let duration = self.buffer.duration();
        // zero length means unknown length: never wrap or saturate
        if duration <= 0.0 || time < duration {
            time
        } else if self.looping {
            time % duration
        } else {
            duration
        }
    }

    /// Record what the voice is doing into the cached playhead, and retire
    /// virtual sources that have run off the end of their buffer.
    pub(crate) fn refresh(&mut self, now: Timestamp) {
        let observed = self.voice.as_ref().map(|v| (v.state(), v.time()));
        match observed {
            None => {
                if self.playhead.state == PlaybackState::Playing
                    && !self.looping
                    && self.has_run_out(self.virtual_time(now))
                {
                    self.mark(PlaybackState::Stopped, 0.0, now);
                }
            }
            Some((PlaybackState::Playing, offset)) => {
                self.mark(PlaybackState::Playing, offset, now);
            }
            Some((PlaybackState::Paused, offset)) => {
                self.mark(PlaybackState::Paused, offset, now);
            }
            Some((PlaybackState::Stopped, _)) => {
                if self.playhead.state != PlaybackState::Paused {
                    self.mark(PlaybackState::Stopped, 0.0, now);
                }
            }
        }
    }

    /// True once `time` is at or past the end of a buffer of known length.
    fn has_run_out(&self, time: f32) -> bool {
        let duration = self.buffer.duration();
        duration > 0.0 && time >= duration
    }

    fn mark(&mut self, state: PlaybackState, offset: f32, now: Timestamp) {
        self.playhead = Playhead {
            state,
            offset,
            marked_at: now,
        };
    }

    pub(crate) fn set_buffer(&mut self, buffer: &SoundBuffer) {
        self.buffer = buffer.clone();
        if let Some(voice) = &mut self.voice {
            voice.set_buffer(buffer);
        }
    }

    pub(crate) fn set_priority(&mut self, priority: i32) {
        self.priority = priority;
    }

    pub(crate) fn set_pitch(&mut self, pitch: f32) {
        self.pitch = pitch;
        if let Some(voice) = &mut self.voice {
            voice.set_pitch(pitch);
        }
    }

    pub(crate) fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
        if let Some(voice) = &mut self.voice {
            voice.set_gain(gain);
        }
    }

    pub(crate) fn set_position(&mut self, position: Vec3) {
        self.position = position;
        if let Some(voice) = &mut self.voice {
            voice.set_position(position);
        }
    }

    pub(crate) fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
        if let Some(voice) = &mut self.voice {
            voice.set_velocity(velocity);
        }
    }

    pub(crate) fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
        if let Some(voice) = &mut self.voice {
            voice.set_looping(looping);
        }
    }

    pub(crate) fn set_reference_distance(&mut self, distance: f32) {
        self.reference_distance = distance;
        if let Some(voice) = &mut self.voice {
            voice.set_reference_distance(distance);
        }
    }

    pub(crate) fn set_max_distance(&mut self, distance: f32) {
        self.max_distance = distance;
        if let Some(voice) = &mut self.voice {
            voice.set_max_distance(distance);
        }
    }

    pub(crate) fn set_rolloff(&mut self, rolloff: f32) {
        self.rolloff = rolloff;
        if let Some(voice) = &mut self.voice {
            voice.set_rolloff(rolloff);
        }
    }

    pub(crate) fn set_time(&mut self, seconds: f32, now: Timestamp) {
        let state = self.playhead.state;
        self.mark(state, seconds.max(0.0), now);
        if let Some(voice) = &mut self.voice {
            voice.set_time(seconds.max(0.0));
        }
    }

    pub(crate) fn play(&mut self, now: Timestamp) {
        self.refresh(now);
        let offset = self.time(now);
        self.mark(PlaybackState::Playing, offset, now);
        if let Some(voice) = &mut self.voice {
            voice.play();
        }
        self.unstop_time = now;
    }

    pub(crate) fn pause(&mut self, now: Timestamp) {
        self.refresh(now);
        if self.state() == PlaybackState::Playing {
            let offset = self.time(now);
            self.mark(PlaybackState::Paused, offset, now);
            if let Some(voice) = &mut self.voice {
                voice.pause();
            }
        }
        self.unstop_time = now;
    }

    pub(crate) fn stop(&mut self, now: Timestamp) {
        self.mark(PlaybackState::Stopped, 0.0, now);
        if let Some(voice) = &mut self.voice {
            voice.stop();
        }
    }

    /// Bind `voice` to this source and bring it up to date: parameters,
    /// play position, and playback if the source is playing and has not yet
    /// reached the end of its buffer.
    pub(crate) fn assign(&mut self, mut voice: HardwareVoice, now: Timestamp) {
        let time = self.virtual_time(now);
        voice.assign(
            &self.buffer,
            self.pitch,
            self.gain,
            self.position,
            self.velocity,
            self.looping,
        );
        voice.set_reference_distance(self.reference_distance);
        voice.set_max_distance(self.max_distance);
        voice.set_rolloff(self.rolloff);
        voice.set_time(time);
        if self.playhead.state == PlaybackState::Playing && !self.has_run_out(time) {
            voice.play();
        }
        self.voice = Some(voice);
    }

    /// Detach the voice, silenced, leaving the source's cached parameters and
    /// play position as they were.
    pub(crate) fn unassign(&mut self, now: Timestamp) -> Option<HardwareVoice> {
        self.refresh(now);
        let mut voice = self.voice.take()?;
        voice.stop();
        Some(voice)
    }
}

impl fmt::Debug for SourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceState")
            .field("state", &self.state())
            .field("priority", &self.priority)
            .field("gain", &self.gain)
            .field("buffer", &self.buffer)
            .field("voice", &self.voice.as_ref().map(HardwareVoice::id))
            .finish()
    }
}

/// Caller-owned handle to a source registered with a pool.
///
/// Dropping the handle deregisters the source; if it held a voice, the voice
/// goes back to the pool. Hand the handle to
/// [`SoundSourcePool::play_and_destroy`] to let it finish playing first.
pub struct SoundSource {
    pool: SoundSourcePool,
    id: SourceId,
    registered: bool,
}

impl SoundSource {
    pub fn new(pool: &SoundSourcePool) -> Self {
        Self {
            pool: pool.clone(),
            id: pool.register(),
            registered: true,
        }
    }

    /// A source with the common parameters set up front.
    pub fn with_buffer(
        pool: &SoundSourcePool,
        buffer: &SoundBuffer,
        pitch: f32,
        gain: f32,
        position: Vec3,
        velocity: Vec3,
        looping: bool,
    ) -> Self {
        let source = Self::new(pool);
        source.with_state(|s, _| {
            s.set_buffer(buffer);
            s.set_pitch(pitch);
            s.set_gain(gain);
            s.set_position(position);
            s.set_velocity(velocity);
            s.set_looping(looping);
        });
        source
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn pool(&self) -> &SoundSourcePool {
        &self.pool
    }

    /// Give up the handle without deregistering the source.
    pub(crate) fn into_id(mut self) -> SourceId {
        self.registered = false;
        self.id
    }

    fn with_state<R: Default>(&self, f: impl FnOnce(&mut SourceState, Timestamp) -> R) -> R {
        self.pool.with_source(self.id, f)
    }

    pub fn set_buffer(&self, buffer: &SoundBuffer) {
        self.with_state(|s, _| s.set_buffer(buffer));
    }

    pub fn set_priority(&self, priority: i32) {
        self.with_state(|s, _| s.set_priority(priority));
    }

    pub fn set_pitch(&self, pitch: f32) {
        self.with_state(|s, _| s.set_pitch(pitch));
    }

    pub fn set_gain(&self, gain: f32) {
        self.with_state(|s, _| s.set_gain(gain));
    }

    pub fn set_position(&self, position: Vec3) {
        self.with_state(|s, _| s.set_position(position));
    }

    pub fn set_velocity(&self, velocity: Vec3) {
        self.with_state(|s, _| s.set_velocity(velocity));
    }

    pub fn set_looping(&self, looping: bool) {
        self.with_state(|s, _| s.set_looping(looping));
    }

    pub fn set_reference_distance(&self, distance: f32) {
        self.with_state(|s, _| s.set_reference_distance(distance));
    }

    pub fn set_max_distance(&self, distance: f32) {
        self.with_state(|s, _| s.set_max_distance(distance));
    }

    pub fn set_rolloff(&self, rolloff: f32) {
        self.with_state(|s, _| s.set_rolloff(rolloff));
    }

    pub fn set_time(&self, seconds: f32) {
        self.with_state(|s, now| s.set_time(seconds, now));
    }

    pub fn buffer(&self) -> SoundBuffer {
        self.with_state(|s, _| s.buffer().clone())
    }

    pub fn priority(&self) -> i32 {
        self.with_state(|s, _| s.priority())
    }

    pub fn pitch(&self) -> f32 {
        self.with_state(|s, _| s.pitch())
    }

    pub fn gain(&self) -> f32 {
        self.with_state(|s, _| s.gain())
    }

    pub fn position(&self) -> Vec3 {
        self.with_state(|s, _| s.position())
    }

    pub fn velocity(&self) -> Vec3 {
        self.with_state(|s, _| s.velocity())
    }

    pub fn is_looping(&self) -> bool {
        self.with_state(|s, _| s.is_looping())
    }

    pub fn reference_distance(&self) -> f32 {
        self.with_state(|s, _| s.reference_distance())
    }

    pub fn max_distance(&self) -> f32 {
        self.with_state(|s, _| s.max_distance())
    }

    pub fn rolloff(&self) -> f32 {
        self.with_state(|s, _| s.rolloff())
    }

    pub fn unstop_time(&self) -> Timestamp {
        self.with_state(|s, _| s.unstop_time())
    }

    pub fn time(&self) -> f32 {
        self.with_state(|s, now| {
            s.refresh(now);
            s.time(now)
        })
    }

    pub fn state(&self) -> PlaybackState {
        self.with_state(|s, now| {
            s.refresh(now);
            s.state()
        })
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

    pub fn is_assigned(&self) -> bool {
        self.with_state(|s, _| s.is_assigned())
    }

    pub fn calculate_gain(&self, listener_position: Vec3) -> f32 {
        self.with_state(|s, _| s.calculate_gain(listener_position))
    }

    pub fn play(&self) {
        self.with_state(|s, now| s.play(now));
    }

    pub fn pause(&self) {
        self.with_state(|s, now| s.pause(now));
    }

    pub fn stop(&self) {
        self.with_state(|s, now| s.stop(now));
    }
}

impl Drop for SoundSource {
    fn drop(&mut self) {
        if self.registered {
            self.pool.deregister(self.id);
        }
    }
}

impl fmt::Debug for SoundSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoundSource").field("id", &self.id).finish()
    }
}
