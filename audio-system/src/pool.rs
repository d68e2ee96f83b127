use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use audio_backend::{BackendKind, ChannelBackend};
use glam::Vec3;
use parking_lot::Mutex;

use crate::bank::SoundBank;
use crate::clock::{Clock, MonotonicClock, Timestamp};
use crate::config::PoolConfig;
use crate::error::AudioError;
use crate::policy::{rank_ordering, PolicyOwnership, PolicySlot, ReplacementPolicy};
use crate::source::{SoundSource, SourceId, SourceState};
use crate::voice::HardwareVoice;

/// Shared handle to the voice allocator. Clones refer to the same pool.
#[derive(Clone)]
pub struct SoundSourcePool {
    inner: Arc<Mutex<PoolInner>>,
}

struct PoolInner {
    backend: Box<dyn ChannelBackend>,
    backend_kind: BackendKind,
    clock: Arc<dyn Clock>,
    config: PoolConfig,
    next_id: u32,
    sources: HashMap<SourceId, SourceState>,
    // Registration order; the tie-breaker of last resort when ranking.
    handles: Vec<SourceId>,
    play_and_destroy: Vec<SourceId>,
    spare_voices: Vec<HardwareVoice>,
    policy: PolicySlot,
    muted: bool,
}

impl SoundSourcePool {
    pub fn new(backend: Box<dyn ChannelBackend>) -> Self {
        Self::with_parts(
            backend,
            Arc::new(MonotonicClock::new()),
            PoolConfig::default(),
        )
    }

    pub fn with_config(backend: Box<dyn ChannelBackend>, config: PoolConfig) -> Self {
        Self::with_parts(backend, Arc::new(MonotonicClock::new()), config)
    }

    pub fn with_parts(
        backend: Box<dyn ChannelBackend>,
        clock: Arc<dyn Clock>,
        config: PoolConfig,
    ) -> Self {
        let backend_kind = backend.kind();
        tracing::info!(
            backend = %backend_kind,
            voice_limit = ?config.voice_limit,
            muted = config.start_muted,
            "sound source pool created"
        );
        let inner = PoolInner {
            backend,
            backend_kind,
            clock,
            muted: config.start_muted,
            config,
            next_id: 0,
            sources: HashMap::new(),
            handles: Vec::new(),
            play_and_destroy: Vec::new(),
            spare_voices: Vec::new(),
            policy: PolicySlot::default(),
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Reconcile voice ownership with what every source currently wants.
    /// Call once per frame.
    pub fn update(&self) {
        self.inner.lock().update();
    }

    /// Start `source` and let the pool keep it until it finishes on its own.
    pub fn play_and_destroy(&self, source: SoundSource) {
        if !Arc::ptr_eq(&self.inner, &source.pool().inner) {
            tracing::warn!(source = %source.id(), "source handed to a pool it does not belong to");
            let owner = source.pool().clone();
            owner.play_and_destroy(source);
            return;
        }
        let id = source.into_id();
        let mut inner = self.inner.lock();
        let now = inner.clock.now();
        if let Some(state) = inner.sources.get_mut(&id) {
            state.play(now);
        }
        inner.play_and_destroy.push(id);
        tracing::trace!(source = %id, "queued fire-and-forget source");
    }

    /// Fire-and-forget playback of a named buffer from `bank`.
    pub fn play_sound(
        &self,
        bank: &SoundBank,
        name: &str,
        pitch: f32,
        gain: f32,
        position: Vec3,
        velocity: Vec3,
    ) -> Result<SourceId, AudioError> {
        let buffer = bank.lookup(name)?;
        let source =
            SoundSource::with_buffer(self, buffer, pitch, gain, position, velocity, false);
        let id = source.id();
        self.play_and_destroy(source);
        Ok(id)
    }

    pub fn pause_all(&self) {
        let mut inner = self.inner.lock();
        let now = inner.clock.now();
        for state in inner.sources.values_mut() {
            state.refresh(now);
            if state.is_playing() {
                state.pause(now);
            }
        }
    }

    pub fn unpause_all(&self) {
        let mut inner = self.inner.lock();
        let now = inner.clock.now();
        for state in inner.sources.values_mut() {
            state.refresh(now);
            if state.is_paused() {
                state.play(now);
            }
        }
    }

    /// Drop every fire-and-forget source and every voice, held or spare.
    pub fn purge(&self) {
        self.inner.lock().purge();
    }

    /// While muted no voices are held. Sources keep their state and pick up
    /// voices again on the first update after unmuting.
    pub fn mute(&self, muted: bool) {
        let mut inner = self.inner.lock();
        if inner.muted == muted {
            return;
        }
        inner.muted = muted;
        if muted {
            inner.destroy_all_voices();
        }
        tracing::info!(muted, "sound source pool mute changed");
    }

    /// Muted by request, or running on a backend that can never produce
    /// sound.
    pub fn is_muted(&self) -> bool {
        self.inner.lock().is_muted()
    }

    /// Install a policy the pool owns from now on.
    pub fn give_replacement_policy(&self, policy: Box<dyn ReplacementPolicy>) {
        self.inner.lock().policy = PolicySlot::Owned(policy);
        tracing::info!("replacement policy given to pool");
    }

    /// Install a policy the caller keeps a share of, e.g. to move a
    /// listener around while the pool ranks with it.
    pub fn lend_replacement_policy(&self, policy: Arc<dyn ReplacementPolicy>) {
        self.inner.lock().policy = PolicySlot::Lent(policy);
        tracing::info!("replacement policy lent to pool");
    }

    pub fn policy_ownership(&self) -> PolicyOwnership {
        self.inner.lock().policy.ownership()
    }

    /// Registered sources, fire-and-forget included, from lowest to highest
    /// rank under the current policy.
    pub fn ranked_sources(&self) -> Vec<SourceId> {
        let mut inner = self.inner.lock();
        let now = inner.clock.now();
        for state in inner.sources.values_mut() {
            state.refresh(now);
        }
        let mut ranked = inner.handles.clone();
        let ranking = inner.policy.get().ranking();
        ranked.sort_by(|a, b| rank_ordering(&ranking, &inner.sources[a], &inner.sources[b]));
        ranked
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.inner.lock().backend_kind
    }

    pub fn config(&self) -> PoolConfig {
        self.inner.lock().config.clone()
    }

    pub fn now(&self) -> Timestamp {
        self.inner.lock().clock.now()
    }

    pub fn source_count(&self) -> usize {
        self.inner.lock().sources.len()
    }

    pub fn assigned_count(&self) -> usize {
        self.inner
            .lock()
            .sources
            .values()
            .filter(|s| s.is_assigned())
            .count()
    }

    pub fn spare_voice_count(&self) -> usize {
        self.inner.lock().spare_voices.len()
    }

    pub fn fire_and_forget_count(&self) -> usize {
        self.inner.lock().play_and_destroy.len()
    }

    pub fn contains(&self, id: SourceId) -> bool {
        self.inner.lock().sources.contains_key(&id)
    }

    pub fn is_assigned(&self, id: SourceId) -> bool {
        self.inner
            .lock()
            .sources
            .get(&id)
            .is_some_and(SourceState::is_assigned)
    }

    pub(crate) fn register(&self) -> SourceId {
        let mut inner = self.inner.lock();
        let now = inner.clock.now();
        let id = SourceId(inner.next_id);
        inner.next_id = inner.next_id.wrapping_add(1);
        let state = SourceState::new(&inner.config.defaults, now);
        inner.sources.insert(id, state);
        inner.handles.push(id);
        id
    }

    pub(crate) fn deregister(&self, id: SourceId) {
        self.inner.lock().remove_source(id);
    }

    pub(crate) fn with_source<R: Default>(
        &self,
        id: SourceId,
        f: impl FnOnce(&mut SourceState, Timestamp) -> R,
    ) -> R {
        let mut inner = self.inner.lock();
        let now = inner.clock.now();
        match inner.sources.get_mut(&id) {
            Some(state) => f(state, now),
            None => {
                tracing::warn!(source = %id, "access to unregistered source");
                R::default()
            }
        }
    }
}

impl fmt::Debug for SoundSourcePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("SoundSourcePool")
            .field("backend", &inner.backend_kind)
            .field("sources", &inner.sources.len())
            .field("spare_voices", &inner.spare_voices.len())
            .field("muted", &inner.muted)
            .finish()
    }
}

impl PoolInner {
    fn is_muted(&self) -> bool {
        self.muted || self.backend_kind.is_null()
    }

    fn update(&mut self) {
        let now = self.clock.now();
        for state in self.sources.values_mut() {
            state.refresh(now);
        }

        let finished: Vec<SourceId> = self
            .play_and_destroy
            .iter()
            .copied()
            .filter(|id| self.sources.get(id).is_none_or(SourceState::is_stopped))
            .collect();
        for id in finished {
            tracing::trace!(source = %id, "reaped finished fire-and-forget source");
            self.remove_source(id);
        }

        if self.is_muted() {
            return;
        }

        let mut unassigned = std::mem::take(&mut self.spare_voices);

        // Only playing sources may hold voices.
        for id in &self.handles {
            if let Some(state) = self.sources.get_mut(id) {
                if state.is_assigned() && !state.is_playing() {
                    unassigned.extend(state.unassign(now));
                }
            }
        }

        let demand = self.count_sources(SourceState::is_playing);
        let held = self.count_sources(SourceState::is_assigned);
        let mut supply = held + unassigned.len();
        let limit = self.config.voice_limit.unwrap_or(usize::MAX);
        while supply < demand && supply < limit {
            match HardwareVoice::try_construct(self.backend.as_mut()) {
                Some(voice) => {
                    unassigned.push(voice);
                    supply += 1;
                }
                None => break,
            }
        }

        let mut order = self.handles.clone();
        if demand > supply {
            let sources = &self.sources;
            let ranking = self.policy.get().ranking();
            order.sort_by(|a, b| rank_ordering(&ranking, &sources[a], &sources[b]));
        }

        let playing: Vec<SourceId> = order
            .iter()
            .copied()
            .filter(|id| self.sources[id].is_playing())
            .collect();
        let cut = demand.saturating_sub(supply);
        let (losers, winners) = playing.split_at(cut);

        for id in losers {
            if let Some(state) = self.sources.get_mut(id) {
                if let Some(voice) = state.unassign(now) {
                    tracing::trace!(source = %id, channel = %voice.id(), "voice revoked");
                    unassigned.push(voice);
                }
            }
        }

        for id in winners.iter().rev() {
            let Some(state) = self.sources.get_mut(id) else {
                continue;
            };
            if state.is_assigned() {
                continue;
            }
            let Some(voice) = unassigned.pop() else {
                break;
            };
            tracing::trace!(source = %id, channel = %voice.id(), "voice granted");
            state.assign(voice, now);
        }

        self.spare_voices = unassigned;
        tracing::debug!(
            demand,
            supply,
            virtual_sources = cut,
            spare = self.spare_voices.len(),
            "reconciled voices"
        );
    }

    fn count_sources(&self, pred: impl Fn(&SourceState) -> bool) -> usize {
        self.sources.values().filter(|&s| pred(s)).count()
    }

    fn remove_source(&mut self, id: SourceId) {
        let now = self.clock.now();
        if let Some(mut state) = self.sources.remove(&id) {
            state.stop(now);
            if let Some(voice) = state.unassign(now) {
                if self.is_muted() {
                    drop(voice);
                } else {
                    self.spare_voices.push(voice);
                }
            }
        }
        self.handles.retain(|h| *h != id);
        self.play_and_destroy.retain(|h| *h != id);
    }

    fn destroy_all_voices(&mut self) {
        let now = self.clock.now();
        let mut released = self.spare_voices.len();
        self.spare_voices.clear();
        for state in self.sources.values_mut() {
            if state.unassign(now).is_some() {
                released += 1;
            }
        }
        tracing::debug!(released, "destroyed all hardware voices");
    }

    fn purge(&mut self) {
        let doomed = std::mem::take(&mut self.play_and_destroy);
        let purged = doomed.len();
        for id in doomed {
            self.remove_source(id);
        }
        self.destroy_all_voices();
        tracing::info!(purged, "sound source pool purged");
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        self.purge();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use audio_backend::mock_backend::{MockChannelBackend, MockDeviceProbe};
    use audio_backend::null_backend::NullChannelBackend;
    use audio_backend::{PlaybackState, SoundBuffer};
    use std::time::Duration;

    fn mock_pool(capacity: usize) -> (SoundSourcePool, MockDeviceProbe, ManualClock) {
        let backend = MockChannelBackend::with_capacity(capacity);
        let probe = backend.probe();
        let clock = ManualClock::new();
        let pool = SoundSourcePool::with_parts(
            Box::new(backend),
            Arc::new(clock.clone()),
            PoolConfig::default(),
        );
        (pool, probe, clock)
    }

    fn long_buffer() -> SoundBuffer {
        SoundBuffer::new("long", 120.0)
    }

    fn started(pool: &SoundSourcePool, priority: i32, gain: f32) -> SoundSource {
        let source = SoundSource::new(pool);
        source.set_buffer(&long_buffer());
        source.set_priority(priority);
        source.set_gain(gain);
        source.play();
        source
    }

    #[test]
    fn grants_voices_to_every_playing_source_under_capacity() {
        let (pool, probe, _clock) = mock_pool(4);
        let a = started(&pool, 1, 1.0);
        let b = started(&pool, 1, 1.0);
        let idle = SoundSource::new(&pool);
        pool.update();
        assert!(a.is_assigned());
        assert!(b.is_assigned());
        assert!(!idle.is_assigned());
        assert_eq!(probe.live_channels(), 2);
        assert_eq!(probe.count_in_state(PlaybackState::Playing), 2);
    }

    #[test]
    fn highest_ranked_sources_win_under_pressure() {
        let (pool, _probe, clock) = mock_pool(2);
        let a = started(&pool, 1, 1.0);
        clock.advance(Duration::from_secs(1));
        let b = started(&pool, 1, 0.5);
        clock.advance(Duration::from_secs(1));
        let c = started(&pool, 2, 0.1);
        pool.update();
        assert!(a.is_assigned());
        assert!(!b.is_assigned());
        assert!(c.is_assigned());
        assert!(b.is_playing());
    }

    #[test]
    fn stopping_a_source_frees_its_voice_for_the_next_in_line() {
        let (pool, _probe, _clock) = mock_pool(1);
        let high = started(&pool, 5, 1.0);
        let low = started(&pool, 1, 1.0);
        pool.update();
        assert!(high.is_assigned());
        assert!(!low.is_assigned());

        high.stop();
        pool.update();
        assert!(!high.is_assigned());
        assert!(low.is_assigned());
    }

    #[test]
    fn repeated_updates_are_stable() {
        let (pool, probe, _clock) = mock_pool(2);
        let sources: Vec<_> = (0..5).map(|p| started(&pool, p, 1.0)).collect();
        pool.update();
        let first: Vec<bool> = sources.iter().map(SoundSource::is_assigned).collect();
        let created = probe.created_total();
        pool.update();
        pool.update();
        let again: Vec<bool> = sources.iter().map(SoundSource::is_assigned).collect();
        assert_eq!(first, again);
        assert_eq!(probe.created_total(), created);
        assert_eq!(first, vec![false, false, false, true, true]);
    }

    #[test]
    fn fire_and_forget_sources_are_reaped_once_finished() {
        let (pool, probe, _clock) = mock_pool(4);
        let source = SoundSource::new(&pool);
        source.set_buffer(&long_buffer());
        let id = source.id();
        pool.play_and_destroy(source);
        assert_eq!(pool.fire_and_forget_count(), 1);

        pool.update();
        assert!(pool.is_assigned(id));
        pool.update();
        assert!(pool.contains(id));

        assert_eq!(probe.finish_all_playing(), 1);
        pool.update();
        assert!(!pool.contains(id));
        assert_eq!(pool.fire_and_forget_count(), 0);
        assert_eq!(pool.spare_voice_count(), 1);
    }

    #[test]
    fn dropping_a_handle_returns_its_voice_to_the_spares() {
        let (pool, probe, _clock) = mock_pool(1);
        let source = started(&pool, 1, 1.0);
        pool.update();
        drop(source);
        assert_eq!(pool.source_count(), 0);
        assert_eq!(pool.spare_voice_count(), 1);
        assert_eq!(probe.count_in_state(PlaybackState::Playing), 0);

        let next = started(&pool, 1, 1.0);
        pool.update();
        assert!(next.is_assigned());
        assert_eq!(probe.created_total(), 1);
    }

    #[test]
    fn mute_releases_everything_and_unmute_restores() {
        let (pool, probe, _clock) = mock_pool(2);
        let a = started(&pool, 1, 1.0);
        let b = started(&pool, 1, 1.0);
        pool.update();
        assert_eq!(probe.live_channels(), 2);

        pool.mute(true);
        assert!(pool.is_muted());
        assert_eq!(probe.live_channels(), 0);
        pool.update();
        assert_eq!(pool.assigned_count(), 0);
        assert!(a.is_playing());

        pool.mute(false);
        pool.update();
        assert!(a.is_assigned());
        assert!(b.is_assigned());
    }

    #[test]
    fn null_backend_pool_is_muted_and_never_assigns() {
        let pool = SoundSourcePool::new(Box::new(NullChannelBackend::new()));
        assert!(pool.is_muted());
        let source = started(&pool, 1, 1.0);
        pool.update();
        assert!(!source.is_assigned());
        assert!(source.is_playing());
    }

    #[test]
    fn voice_limit_caps_acquisition() {
        let backend = MockChannelBackend::with_capacity(8);
        let probe = backend.probe();
        let config = PoolConfig {
            voice_limit: Some(3),
            ..PoolConfig::default()
        };
        let pool = SoundSourcePool::with_config(Box::new(backend), config);
        let _sources: Vec<_> = (0..6).map(|p| started(&pool, p, 1.0)).collect();
        pool.update();
        assert_eq!(probe.live_channels(), 3);
        assert_eq!(pool.assigned_count(), 3);
    }

    #[test]
    fn pause_all_then_unpause_all() {
        let (pool, _probe, _clock) = mock_pool(2);
        let a = started(&pool, 1, 1.0);
        let idle = SoundSource::new(&pool);
        pool.update();
        pool.pause_all();
        assert!(a.is_paused());
        assert!(idle.is_stopped());
        pool.update();
        assert!(!a.is_assigned());
        pool.unpause_all();
        pool.update();
        assert!(a.is_playing());
        assert!(a.is_assigned());
        assert!(idle.is_stopped());
    }

    #[test]
    fn purge_drops_fire_and_forget_and_all_voices() {
        let (pool, probe, _clock) = mock_pool(4);
        let kept = started(&pool, 1, 1.0);
        let doomed = started(&pool, 1, 1.0);
        pool.play_and_destroy(doomed);
        pool.update();
        assert_eq!(probe.live_channels(), 2);

        pool.purge();
        assert_eq!(probe.live_channels(), 0);
        assert_eq!(pool.source_count(), 1);
        assert!(kept.is_playing());
        pool.update();
        assert!(kept.is_assigned());
    }

    #[test]
    fn start_muted_config_is_honoured() {
        let config = PoolConfig::from_ron_str("(start_muted: true)").unwrap();
        let pool = SoundSourcePool::with_config(Box::new(MockChannelBackend::with_capacity(1)), config);
        let source = started(&pool, 1, 1.0);
        pool.update();
        assert!(!source.is_assigned());
    }

    #[test]
    fn new_sources_take_configured_defaults() {
        let config = PoolConfig::from_ron_str("(defaults: (priority: 7, gain: 0.25))").unwrap();
        let pool = SoundSourcePool::with_config(Box::new(MockChannelBackend::with_capacity(1)), config);
        let source = SoundSource::new(&pool);
        assert_eq!(source.priority(), 7);
        assert_eq!(source.gain(), 0.25);
    }

    #[test]
    fn play_sound_looks_up_the_bank() {
        let (pool, _probe, _clock) = mock_pool(2);
        let mut bank = SoundBank::new();
        bank.insert(SoundBuffer::new("explosion", 2.0));
        let id = pool
            .play_sound(&bank, "explosion", 1.0, 0.8, Vec3::X, Vec3::ZERO)
            .unwrap();
        assert!(pool.contains(id));
        assert_eq!(pool.fire_and_forget_count(), 1);
        assert!(matches!(
            pool.play_sound(&bank, "nope", 1.0, 1.0, Vec3::ZERO, Vec3::ZERO),
            Err(AudioError::UnknownSound(_))
        ));
    }

    #[test]
    fn policy_can_be_given_or_lent() {
        use crate::policy::PositionalReplacementPolicy;
        let (pool, _probe, _clock) = mock_pool(1);
        assert_eq!(pool.policy_ownership(), PolicyOwnership::Owned);
        let shared = Arc::new(PositionalReplacementPolicy::default());
        pool.lend_replacement_policy(shared.clone());
        assert_eq!(pool.policy_ownership(), PolicyOwnership::Lent);
        assert_eq!(Arc::strong_count(&shared), 2);
        pool.give_replacement_policy(Box::new(PositionalReplacementPolicy::default()));
        assert_eq!(pool.policy_ownership(), PolicyOwnership::Owned);
        assert_eq!(Arc::strong_count(&shared), 1);
    }

    #[test]
    fn ranked_sources_lists_lowest_first() {
        let (pool, _probe, _clock) = mock_pool(1);
        let high = started(&pool, 9, 1.0);
        let idle = SoundSource::new(&pool);
        let low = started(&pool, 1, 1.0);
        assert_eq!(pool.ranked_sources(), vec![idle.id(), low.id(), high.id()]);
    }

    #[test]
    fn ties_fall_back_to_registration_order_on_every_update() {
        let (pool, _probe, _clock) = mock_pool(1);
        let first = started(&pool, 1, 1.0);
        let second = started(&pool, 1, 0.5);
        pool.update();
        assert!(first.is_assigned());

        second.set_gain(1.0);
        pool.update();
        assert_eq!(pool.ranked_sources(), vec![first.id(), second.id()]);
        assert!(second.is_assigned());
        assert!(!first.is_assigned());

        pool.update();
        assert!(second.is_assigned());
    }

    #[test]
    fn source_of_unknown_length_plays_and_takes_a_voice() {
        let (pool, probe, clock) = mock_pool(1);
        let bare = SoundSource::new(&pool);
        bare.play();
        assert!(bare.is_playing());

        clock.advance(Duration::from_secs(30));
        pool.update();
        assert!(bare.is_playing());
        assert!(bare.is_assigned());
        let channel = probe.channel_ids()[0];
        assert_eq!(probe.channel(channel).unwrap().state, PlaybackState::Playing);

        bare.set_buffer(&SoundBuffer::new("stream", 0.0));
        pool.update();
        assert!(bare.is_playing());
    }
}
