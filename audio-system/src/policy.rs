use std::cmp::Ordering;
use std::sync::Arc;

use arc_swap::ArcSwap;
use glam::Vec3;

use crate::listener::Listener;
use crate::source::SourceState;

/// Decides which sources deserve hardware voices when there are not enough
/// to go around.
///
/// Implementations must be a strict weak ordering: irreflexive, asymmetric
/// and transitive, with incomparability transitive as well.
pub trait ReplacementPolicy: Send + Sync {
    /// True when `lhs` should lose its voice before `rhs` does.
    fn ranks_below(&self, lhs: &SourceState, rhs: &SourceState) -> bool;

    /// The comparator for one ranking pass over the pool.
    ///
    /// Every comparison made through the returned closure must see the same
    /// inputs. Policies with state that can change concurrently capture it
    /// here once.
    fn ranking(&self) -> Ranking<'_> {
        Box::new(move |lhs: &SourceState, rhs: &SourceState| self.ranks_below(lhs, rhs))
    }
}

/// A `ranks_below` comparator fixed for the duration of one sort.
pub type Ranking<'a> = Box<dyn Fn(&SourceState, &SourceState) -> bool + 'a>;

/// Turn a ranking into an ascending `Ordering` for sorting: lowest rank
/// first.
pub fn rank_ordering(ranking: &Ranking<'_>, lhs: &SourceState, rhs: &SourceState) -> Ordering {
    if ranking(lhs, rhs) {
        Ordering::Less
    } else if ranking(rhs, lhs) {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

/// Playing beats not playing, then higher priority, then louder, then the
/// source that has been running longer. A NaN gain counts as silence.
fn ranks_below_by(
    lhs: &SourceState,
    rhs: &SourceState,
    effective_gain: impl Fn(&SourceState) -> f32,
) -> bool {
    if std::ptr::eq(lhs, rhs) {
        return false;
    }

    match (lhs.is_playing(), rhs.is_playing()) {
        (_, false) => return false,
        (false, true) => return true,
        (true, true) => {}
    }

    if lhs.priority() != rhs.priority() {
        return lhs.priority() < rhs.priority();
    }

    let audible = |s: &SourceState| {
        let gain = effective_gain(s);
        if gain.is_nan() { 0.0 } else { gain }
    };
    let (lhs_gain, rhs_gain) = (audible(lhs), audible(rhs));
    if lhs_gain != rhs_gain {
        return lhs_gain < rhs_gain;
    }

    lhs.unstop_time() > rhs.unstop_time()
}

/// Ranks by the gain each source was given, ignoring where it is.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultReplacementPolicy;

impl ReplacementPolicy for DefaultReplacementPolicy {
    fn ranks_below(&self, lhs: &SourceState, rhs: &SourceState) -> bool {
        ranks_below_by(lhs, rhs, SourceState::gain)
    }
}

/// Ranks by gain as heard from a listener position, so far-away sounds give
/// up their voices to nearby ones.
///
/// The listener position can be moved from any thread while the pool holds
/// the policy. A ranking pass reads it once, so a move lands on the next
/// update.
#[derive(Debug)]
pub struct PositionalReplacementPolicy {
    listener_position: ArcSwap<Vec3>,
}

impl PositionalReplacementPolicy {
    pub fn new(listener_position: Vec3) -> Self {
        Self {
            listener_position: ArcSwap::from_pointee(listener_position),
        }
    }

    pub fn listener_position(&self) -> Vec3 {
        **self.listener_position.load()
    }

    pub fn set_listener_position(&self, position: Vec3) {
        self.listener_position.store(Arc::new(position));
    }

    pub fn set_listener(&self, listener: &Listener) {
        self.set_listener_position(listener.position);
    }
}

impl Default for PositionalReplacementPolicy {
    fn default() -> Self {
        Self::new(Vec3::ZERO)
    }
}

impl ReplacementPolicy for PositionalReplacementPolicy {
    fn ranks_below(&self, lhs: &SourceState, rhs: &SourceState) -> bool {
        let listener = self.listener_position();
        ranks_below_by(lhs, rhs, |s| s.calculate_gain(listener))
    }

    fn ranking(&self) -> Ranking<'_> {
        let listener = self.listener_position();
        Box::new(move |lhs: &SourceState, rhs: &SourceState| {
            ranks_below_by(lhs, rhs, |s| s.calculate_gain(listener))
        })
    }
}

/// Whether the pool is responsible for its policy's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyOwnership {
    /// Handed over with `give_replacement_policy`; dropped with the pool or
    /// on replacement.
    Owned,
    /// Shared with `lend_replacement_policy`; the caller keeps it alive.
    Lent,
}

pub(crate) enum PolicySlot {
    Owned(Box<dyn ReplacementPolicy>),
    Lent(Arc<dyn ReplacementPolicy>),
}

impl PolicySlot {
    pub(crate) fn get(&self) -> &dyn ReplacementPolicy {
        match self {
            PolicySlot::Owned(policy) => policy.as_ref(),
            PolicySlot::Lent(policy) => policy.as_ref(),
        }
    }

    pub(crate) fn ownership(&self) -> PolicyOwnership {
        match self {
            PolicySlot::Owned(_) => PolicyOwnership::Owned,
            PolicySlot::Lent(_) => PolicyOwnership::Lent,
        }
    }
}

impl Default for PolicySlot {
    fn default() -> Self {
        PolicySlot::Owned(Box::new(DefaultReplacementPolicy))
    }
}
