//! Moving or fixed world-space points that constraints can attach to
//! instead of a second body.

use crate::math as m;

use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};

/// A world-space point that a constraint pulls its body towards.
///
/// The solver asks for the current target at the start of every tick,
/// and calls `detach` exactly once when the constraint is removed.
pub trait TargetSource: std::fmt::Debug + Send {
    fn current_target(&mut self) -> m::Vec2;

    fn detach(&mut self) {}
}

/// A target that never moves.
#[derive(Clone, Copy, Debug)]
pub struct FixedPoint(pub m::Vec2);

impl TargetSource for FixedPoint {
    fn current_target(&mut self) -> m::Vec2 {
        self.0
    }
}

/// Identifies a pointing device: the mouse, or one finger on a touch screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointerId {
    Mouse,
    Touch(u64),
}

#[derive(Debug, Default)]
struct PointerState {
    positions: HashMap<PointerId, m::Vec2>,
    listeners: HashMap<PointerId, usize>,
}

/// Shared world-space positions of pointing devices.
///
/// Feed this from your input handling and create [`PointerTarget`]s from it
/// to drag bodies around with mouse and touch constraints.
/// Clones share the same state.
#[derive(Clone, Debug, Default)]
pub struct PointerSource(Arc<Mutex<PointerState>>);

impl PointerSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_position(&self, id: PointerId, position: m::Vec2) {
        self.0.lock().positions.insert(id, position);
    }

    /// Forget the position of a pointer, e.g. when a touch ends.
    /// Targets following it stay where they last saw it.
    pub fn release(&self, id: PointerId) {
        self.0.lock().positions.remove(&id);
    }

    pub fn position(&self, id: PointerId) -> Option<m::Vec2> {
        self.0.lock().positions.get(&id).copied()
    }

    /// Number of live targets following the given pointer.
    pub fn listener_count(&self, id: PointerId) -> usize {
        self.0.lock().listeners.get(&id).copied().unwrap_or(0)
    }

    /// Create a target following the given pointer.
    ///
    /// `fallback` is used until the pointer has a known position.
    pub fn target(&self, id: PointerId, fallback: m::Vec2) -> PointerTarget {
        let mut state = self.0.lock();
        *state.listeners.entry(id).or_insert(0) += 1;
        let last = state.positions.get(&id).copied().unwrap_or(fallback);
        PointerTarget {
            source: self.clone(),
            id,
            last,
            attached: true,
        }
    }
}

/// A target that follows a pointer of a [`PointerSource`].
#[derive(Debug)]
pub struct PointerTarget {
    source: PointerSource,
    id: PointerId,
    last: m::Vec2,
    attached: bool,
}

impl PointerTarget {
    #[inline]
    pub fn pointer(&self) -> PointerId {
        self.id
    }
}

impl TargetSource for PointerTarget {
    fn current_target(&mut self) -> m::Vec2 {
        if let Some(pos) = self.source.position(self.id) {
            self.last = pos;
        }
        self.last
    }

    fn detach(&mut self) {
        if !self.attached {
            return;
        }
        self.attached = false;
        let mut state = self.source.0.lock();
        let remaining = match state.listeners.get_mut(&self.id) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => return,
        };
        if remaining == 0 {
            state.listeners.remove(&self.id);
        }
    }
}

impl Drop for PointerTarget {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_target_follows_and_detaches() {
        let source = PointerSource::new();
        let mut target = source.target(PointerId::Mouse, m::Vec2::new(1.0, 1.0));
        assert_eq!(source.listener_count(PointerId::Mouse), 1);
        assert_eq!(target.current_target(), m::Vec2::new(1.0, 1.0));

        source.set_position(PointerId::Mouse, m::Vec2::new(3.0, 2.0));
        assert_eq!(target.current_target(), m::Vec2::new(3.0, 2.0));
        source.release(PointerId::Mouse);
        assert_eq!(target.current_target(), m::Vec2::new(3.0, 2.0));

        target.detach();
        target.detach();
        assert_eq!(source.listener_count(PointerId::Mouse), 0);
        drop(target);
        assert_eq!(source.listener_count(PointerId::Mouse), 0);
    }

    #[test]
    fn touches_are_separate() {
        let source = PointerSource::new();
        let t1 = source.target(PointerId::Touch(1), m::Vec2::zero());
        let _t2 = source.target(PointerId::Touch(2), m::Vec2::zero());
        assert_eq!(source.listener_count(PointerId::Touch(1)), 1);
        drop(t1);
        assert_eq!(source.listener_count(PointerId::Touch(1)), 0);
        assert_eq!(source.listener_count(PointerId::Touch(2)), 1);
        assert_eq!(source.listener_count(PointerId::Mouse), 0);
    }
}
