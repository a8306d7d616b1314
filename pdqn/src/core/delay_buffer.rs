//! Delayed insertion of transitions awaiting a follow-up reward term.
//!
//! Some reward components (the "impact" a maneuver has on surrounding traffic)
//! are only known after the next step. The delay buffer holds each transition
//! until `delay` newer transitions have arrived, then releases it with the
//! newest arrival's impact added to its reward:
//!
//! ```text
//! delay = 1
//! push(T1, impact=0.3) → None
//! push(T2, impact=0.5) → Some(T1 with reward + 0.5)
//! push(T3, impact=0.1) → Some(T2 with reward + 0.1)
//! flush()              → [T3]              (no follow-up term known)
//! ```
//!
//! A delay of zero passes transitions straight through with their own impact.

use std::collections::VecDeque;

use crate::core::transition::Transition;

/// FIFO holding transitions until their follow-up reward term is known.
#[derive(Debug, Clone)]
pub struct DelayBuffer {
    delay: usize,
    pending: VecDeque<Transition>,
}

impl DelayBuffer {
    /// Create a delay buffer releasing transitions `delay` steps late.
    pub fn new(delay: usize) -> Self {
        Self {
            delay,
            pending: VecDeque::with_capacity(delay + 1),
        }
    }

    /// Configured delay in steps.
    pub fn delay(&self) -> usize {
        self.delay
    }

    /// Number of transitions currently held back.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Push a transition with the impact term observed at this step.
    ///
    /// Returns the transition that became ready, if any, with `impact` added to
    /// its reward.
    pub fn push(&mut self, transition: Transition, impact: f32) -> Option<Transition> {
        self.pending.push_back(transition);
        if self.pending.len() > self.delay {
            self.pending
                .pop_front()
                .map(|ready| ready.with_reward_bonus(impact))
        } else {
            None
        }
    }

    /// Release everything still pending, without an impact bonus.
    ///
    /// Called at episode end: the follow-up steps that would carry the impact
    /// term will never happen.
    pub fn flush(&mut self) -> Vec<Transition> {
        self.pending.drain(..).collect()
    }

    /// Drop everything still pending.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

impl Default for DelayBuffer {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(tag: f32) -> Transition {
        Transition::new(vec![tag], 0, vec![0.0, 0.0], 1.0, vec![tag + 1.0], false, false)
    }

    #[test]
    fn test_one_step_delay_adds_next_impact() {
        let mut buffer = DelayBuffer::new(1);

        assert!(buffer.push(step(1.0), 0.3).is_none());

        let released = buffer.push(step(2.0), 0.5).unwrap();
        assert_eq!(released.state, vec![1.0]);
        assert!((released.reward - 1.5).abs() < 1e-6);

        let released = buffer.push(step(3.0), 0.1).unwrap();
        assert_eq!(released.state, vec![2.0]);
        assert!((released.reward - 1.1).abs() < 1e-6);

        assert_eq!(buffer.pending(), 1);
    }

    #[test]
    fn test_zero_delay_passes_through() {
        let mut buffer = DelayBuffer::new(0);
        let released = buffer.push(step(1.0), 0.25).unwrap();
        assert_eq!(released.state, vec![1.0]);
        assert!((released.reward - 1.25).abs() < 1e-6);
        assert_eq!(buffer.pending(), 0);
    }

    #[test]
    fn test_longer_delay() {
        let mut buffer = DelayBuffer::new(2);
        assert!(buffer.push(step(1.0), 0.0).is_none());
        assert!(buffer.push(step(2.0), 0.0).is_none());

        let released = buffer.push(step(3.0), 2.0).unwrap();
        assert_eq!(released.state, vec![1.0]);
        assert!((released.reward - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_flush_releases_without_bonus() {
        let mut buffer = DelayBuffer::new(1);
        buffer.push(step(1.0), 0.0);
        let _ = buffer.push(step(2.0), 9.0);

        let flushed = buffer.flush();
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].state, vec![2.0]);
        assert_eq!(flushed[0].reward, 1.0);
        assert_eq!(buffer.pending(), 0);
    }
}
