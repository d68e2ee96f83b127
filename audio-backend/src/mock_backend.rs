use std::collections::HashMap;
use std::sync::Arc;

use glam::Vec3;
use parking_lot::Mutex;

use crate::{
    BackendError, BackendKind, ChannelBackend, ChannelId, ChannelParam, PlaybackState,
    SoundBuffer, VoiceChannel,
};

/// Everything the mock device remembers about one live channel.
#[derive(Debug, Clone, PartialEq)]
pub struct MockChannelRecord {
    pub state: PlaybackState,
    /// Name of the bound buffer, if any.
    pub buffer: Option<String>,
    pub pitch: f32,
    pub gain: f32,
    pub position: Vec3,
    pub velocity: Vec3,
    pub looping: bool,
    pub reference_distance: f32,
    pub max_distance: f32,
    pub rolloff: f32,
    pub offset: f32,
}

impl Default for MockChannelRecord {
    fn default() -> Self {
        Self {
            state: PlaybackState::Stopped,
            buffer: None,
            pitch: 1.0,
            gain: 1.0,
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            looping: false,
            reference_distance: 1.0,
            max_distance: f32::MAX,
            rolloff: 1.0,
            offset: 0.0,
        }
    }
}

struct MockDevice {
    capacity: usize,
    next_id: u32,
    channels: HashMap<ChannelId, MockChannelRecord>,
    // forced failures remaining, consumed before the capacity check
    fail_next: usize,
    created_total: u64,
}

impl MockDevice {
    fn with_record<R>(&mut self, id: ChannelId, f: impl FnOnce(&mut MockChannelRecord) -> R) -> Option<R> {
        self.channels.get_mut(&id).map(f)
    }
}

/// A Send-safe in-memory device with a fixed channel budget.
pub struct MockChannelBackend {
    device: Arc<Mutex<MockDevice>>,
}

impl MockChannelBackend {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            device: Arc::new(Mutex::new(MockDevice {
                capacity,
                next_id: 1,
                channels: HashMap::new(),
                fail_next: 0,
                created_total: 0,
            })),
        }
    }

    /// Inspection and fault-injection handle sharing this backend's device.
    pub fn probe(&self) -> MockDeviceProbe {
        MockDeviceProbe {
            device: self.device.clone(),
        }
    }
}

impl ChannelBackend for MockChannelBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Mock
    }

    fn try_create_channel(&mut self) -> Result<Box<dyn VoiceChannel>, BackendError> {
        let mut device = self.device.lock();
        if device.fail_next > 0 {
            device.fail_next -= 1;
            return Err(BackendError::Device("injected failure".to_string()));
        }
        if device.channels.len() >= device.capacity {
            return Err(BackendError::ChannelsExhausted);
        }
        let id = ChannelId(device.next_id);
        device.next_id = device.next_id.wrapping_add(1);
        device.created_total += 1;
        device.channels.insert(id, MockChannelRecord::default());
        Ok(Box::new(MockChannel {
            id,
            device: self.device.clone(),
        }))
    }
}

/// Test-side view of a mock device.
#[derive(Clone)]
pub struct MockDeviceProbe {
    device: Arc<Mutex<MockDevice>>,
}

impl MockDeviceProbe {
    pub fn capacity(&self) -> usize {
        self.device.lock().capacity
    }

    /// Change the channel budget. Live channels are kept; new ones are
    /// refused until the live count drops below the new budget.
    pub fn set_capacity(&self, capacity: usize) {
        self.device.lock().capacity = capacity;
    }

    /// Make the next `count` creation attempts fail regardless of capacity.
    pub fn fail_next_creations(&self, count: usize) {
        self.device.lock().fail_next = count;
    }

    pub fn live_channels(&self) -> usize {
        self.device.lock().channels.len()
    }

    /// Channels ever created on this device, including released ones.
    pub fn created_total(&self) -> u64 {
        self.device.lock().created_total
    }

    pub fn channel_ids(&self) -> Vec<ChannelId> {
        let mut ids: Vec<ChannelId> = self.device.lock().channels.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn channel(&self, id: ChannelId) -> Option<MockChannelRecord> {
        self.device.lock().channels.get(&id).cloned()
    }

    pub fn count_in_state(&self, state: PlaybackState) -> usize {
        self.device
            .lock()
            .channels
            .values()
            .filter(|r| r.state == state)
            .count()
    }

    /// Simulate natural completion: the channel reports `Stopped` and its
    /// offset rewinds. Returns false if the channel is not live.
    pub fn finish(&self, id: ChannelId) -> bool {
        self.device
            .lock()
            .with_record(id, |r| {
                r.state = PlaybackState::Stopped;
                r.offset = 0.0;
            })
            .is_some()
    }

    /// Finish every channel that is currently playing. Returns how many.
    pub fn finish_all_playing(&self) -> usize {
        let mut device = self.device.lock();
        let mut finished = 0;
        for record in device.channels.values_mut() {
            if record.state == PlaybackState::Playing {
                record.state = PlaybackState::Stopped;
                record.offset = 0.0;
                finished += 1;
            }
        }
        finished
    }
}

struct MockChannel {
    id: ChannelId,
    device: Arc<Mutex<MockDevice>>,
}

impl MockChannel {
    fn update(&self, f: impl FnOnce(&mut MockChannelRecord)) {
        self.device.lock().with_record(self.id, f);
    }

    fn read<R: Default>(&self, f: impl FnOnce(&MockChannelRecord) -> R) -> R {
        self.device
            .lock()
            .channels
            .get(&self.id)
            .map(f)
            .unwrap_or_default()
    }
}

impl VoiceChannel for MockChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn bind_buffer(&mut self, buffer: &SoundBuffer) {
        let name = buffer.name().to_string();
        self.update(|r| r.buffer = Some(name));
    }

    fn set_param(&mut self, param: ChannelParam) {
        self.update(|r| match param {
            ChannelParam::Pitch(v) => r.pitch = v,
            ChannelParam::Gain(v) => r.gain = v,
            ChannelParam::Position(v) => r.position = v,
            ChannelParam::Velocity(v) => r.velocity = v,
            ChannelParam::Looping(v) => r.looping = v,
            ChannelParam::ReferenceDistance(v) => r.reference_distance = v,
            ChannelParam::MaxDistance(v) => r.max_distance = v,
            ChannelParam::Rolloff(v) => r.rolloff = v,
        });
    }

    fn set_offset(&mut self, seconds: f32) {
        self.update(|r| r.offset = seconds.max(0.0));
    }

    fn offset(&self) -> f32 {
        self.read(|r| r.offset)
    }

    fn play(&mut self) {
        self.update(|r| r.state = PlaybackState::Playing);
    }

    fn pause(&mut self) {
        self.update(|r| {
            if r.state == PlaybackState::Playing {
                r.state = PlaybackState::Paused;
            }
        });
    }

    fn stop(&mut self) {
        self.update(|r| {
            r.state = PlaybackState::Stopped;
            r.offset = 0.0;
        });
    }

    fn state(&self) -> PlaybackState {
        self.read(|r| r.state)
    }
}

impl Drop for MockChannel {
    fn drop(&mut self) {
        self.device.lock().channels.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation_stops_at_capacity() {
        let mut backend = MockChannelBackend::with_capacity(2);
        let a = backend.try_create_channel();
        let b = backend.try_create_channel();
        let c = backend.try_create_channel();
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(c.err(), Some(BackendError::ChannelsExhausted));
    }

    #[test]
    fn dropping_a_channel_frees_its_slot() {
        let mut backend = MockChannelBackend::with_capacity(1);
        let probe = backend.probe();
        let ch = backend.try_create_channel().unwrap();
        assert_eq!(probe.live_channels(), 1);
        drop(ch);
        assert_eq!(probe.live_channels(), 0);
        assert!(backend.try_create_channel().is_ok());
        assert_eq!(probe.created_total(), 2);
    }

    #[test]
    fn state_machine_follows_commands() {
        let mut backend = MockChannelBackend::with_capacity(1);
        let mut ch = backend.try_create_channel().unwrap();
        assert_eq!(ch.state(), PlaybackState::Stopped);
        // pause from stopped is ignored
        ch.pause();
        assert_eq!(ch.state(), PlaybackState::Stopped);
        ch.play();
        assert_eq!(ch.state(), PlaybackState::Playing);
        ch.pause();
        assert_eq!(ch.state(), PlaybackState::Paused);
        ch.set_offset(0.5);
        ch.stop();
        assert_eq!(ch.state(), PlaybackState::Stopped);
        assert_eq!(ch.offset(), 0.0);
    }

    #[test]
    fn probe_records_params_and_finishes() {
        let mut backend = MockChannelBackend::with_capacity(1);
        let probe = backend.probe();
        let mut ch = backend.try_create_channel().unwrap();
        ch.bind_buffer(&SoundBuffer::new("laser", 1.0));
        ch.set_param(ChannelParam::Gain(0.25));
        ch.set_param(ChannelParam::Position(Vec3::new(1.0, 2.0, 3.0)));
        ch.play();

        let rec = probe.channel(ch.id()).unwrap();
        assert_eq!(rec.buffer.as_deref(), Some("laser"));
        assert_eq!(rec.gain, 0.25);
        assert_eq!(rec.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(probe.count_in_state(PlaybackState::Playing), 1);

        assert!(probe.finish(ch.id()));
        assert_eq!(ch.state(), PlaybackState::Stopped);
    }

    #[test]
    fn injected_failures_are_consumed_first() {
        let mut backend = MockChannelBackend::with_capacity(4);
        backend.probe().fail_next_creations(1);
        assert!(matches!(backend.try_create_channel(), Err(BackendError::Device(_))));
        assert!(backend.try_create_channel().is_ok());
    }

    #[test]
    fn shrinking_capacity_keeps_live_channels() {
        let mut backend = MockChannelBackend::with_capacity(2);
        let probe = backend.probe();
        let _a = backend.try_create_channel().unwrap();
        let _b = backend.try_create_channel().unwrap();
        probe.set_capacity(1);
        assert_eq!(probe.live_channels(), 2);
        assert!(backend.try_create_channel().is_err());
    }
}
