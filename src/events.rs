//! Events raised while the world steps.
//!
//! Events are queued in the order they occur and handed to the caller by
//! [`World::drain_events`](crate::World::drain_events). Each condition is
//! reported once per transition.

use glam::Vec2;

use crate::dynamics::contact::ContactHandle;
use crate::dynamics::fixture::FixtureHandle;
use crate::dynamics::joints::JointHandle;

/// Something that happened during a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WorldEvent {
    /// Two fixtures started touching.
    BeginContact {
        contact: ContactHandle,
        fixture_a: FixtureHandle,
        fixture_b: FixtureHandle,
    },
    /// Two fixtures stopped touching, or a touching contact was destroyed.
    EndContact {
        contact: ContactHandle,
        fixture_a: FixtureHandle,
        fixture_b: FixtureHandle,
    },
    /// A joint exceeded its breakpoint and disabled itself.
    JointBroke {
        joint: JointHandle,
        reaction_force: Vec2,
        reaction_torque: f32,
    },
}

/// FIFO of pending events.
#[derive(Debug, Default)]
pub(crate) struct EventQueue {
    events: Vec<WorldEvent>,
}

impl EventQueue {
    pub(crate) fn push(&mut self, event: WorldEvent) {
        self.events.push(event);
    }

    pub(crate) fn take(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn len(&self) -> usize {
        self.events.len()
    }
}
