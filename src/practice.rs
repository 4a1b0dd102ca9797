//! Practice sequencer (§4.4): a pure, clock-driven state machine with no I/O
//! of its own, so it is entirely unit-testable without a runtime.
//!
//! No direct teacher precedent (`drakeerv-ds-rs` has no practice mode); the
//! shape — a `Phase` enum advanced by repeatedly feeding it a `Duration`, with
//! intents read back out rather than pushed — follows this codebase's own
//! `codec` conventions (pure value-in, value-out, `#[cfg(test)]` unit tests)
//! rather than any one source file.

use std::time::Duration;

use serde::Serialize;

use crate::codec::Mode;

/// A phase in the practice sequence (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    Countdown,
    Autonomous,
    Delay,
    Teleop,
    Done,
}

/// Configurable phase durations (§6 `practice_timing`). Defaults per §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PracticeTiming {
    pub countdown: Duration,
    pub autonomous: Duration,
    pub delay: Duration,
    pub teleop: Duration,
}

impl Default for PracticeTiming {
    fn default() -> Self {
        PracticeTiming {
            countdown: Duration::from_secs(3),
            autonomous: Duration::from_secs(15),
            delay: Duration::from_secs(1),
            teleop: Duration::from_secs(135),
        }
    }
}

/// The result of advancing the sequencer by one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PracticeTick {
    pub phase: Phase,
    pub elapsed_in_phase: Duration,
    /// `None` once in `Done` (or `Idle`): there is no further phase to count down to.
    pub remaining_in_phase: Option<Duration>,
    pub mode: Mode,
    pub enabled: bool,
    /// `true` on the tick that caused a phase transition (useful for logging).
    pub phase_changed: bool,
}

pub struct PracticeSequencer {
    timing: PracticeTiming,
    phase: Phase,
    elapsed_in_phase: Duration,
    /// Set by [`PracticeSequencer::a_stop`]; cleared on every phase transition
    /// (§4.4: "A-Stop does not latch across phases").
    a_stopped: bool,
}

impl PracticeSequencer {
    pub fn new(timing: PracticeTiming) -> PracticeSequencer {
        PracticeSequencer { timing, phase: Phase::Idle, elapsed_in_phase: Duration::ZERO, a_stopped: false }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether the coordinator should merge this sequencer's intents at all
    /// (§4.6 rule 3: "Practice mode/enable intents apply only while Practice
    /// is running").
    pub fn is_running(&self) -> bool {
        self.phase != Phase::Idle
    }

    /// Idle → Countdown, from t=0 of the new run.
    pub fn start(&mut self) -> PracticeTick {
        self.phase = Phase::Countdown;
        self.elapsed_in_phase = Duration::ZERO;
        self.a_stopped = false;
        self.current_tick(true)
    }

    /// Any phase → Idle, emitting `enabled=false`.
    pub fn stop(&mut self) -> PracticeTick {
        self.phase = Phase::Idle;
        self.elapsed_in_phase = Duration::ZERO;
        self.a_stopped = false;
        self.current_tick(true)
    }

    /// Forces `enabled=false` for the remainder of the current Autonomous
    /// phase. A no-op outside Autonomous.
    pub fn a_stop(&mut self) {
        if self.phase == Phase::Autonomous {
            self.a_stopped = true;
        }
    }

    /// Advances the sequencer's clock by `dt`, crossing as many phase
    /// boundaries as `dt` spans, and returns the resulting tick. A no-op
    /// (phase stays `Idle`) if the sequence hasn't been started.
    pub fn advance(&mut self, dt: Duration) -> PracticeTick {
        if self.phase == Phase::Idle {
            return self.current_tick(false);
        }

        self.elapsed_in_phase += dt;
        let mut changed = false;
        while let Some(duration) = self.phase_duration() {
            if self.elapsed_in_phase < duration {
                break;
            }
            let overflow = self.elapsed_in_phase - duration;
            self.advance_phase();
            self.elapsed_in_phase = overflow;
            changed = true;
        }
        self.current_tick(changed)
    }

    fn phase_duration(&self) -> Option<Duration> {
        match self.phase {
            Phase::Idle | Phase::Done => None,
            Phase::Countdown => Some(self.timing.countdown),
            Phase::Autonomous => Some(self.timing.autonomous),
            Phase::Delay => Some(self.timing.delay),
            Phase::Teleop => Some(self.timing.teleop),
        }
    }

    fn advance_phase(&mut self) {
        self.phase = match self.phase {
            Phase::Idle => Phase::Idle,
            Phase::Countdown => Phase::Autonomous,
            Phase::Autonomous => Phase::Delay,
            Phase::Delay => Phase::Teleop,
            Phase::Teleop => Phase::Done,
            Phase::Done => Phase::Done,
        };
        self.a_stopped = false;
    }

    fn current_tick(&self, phase_changed: bool) -> PracticeTick {
        let (mode, enabled) = match self.phase {
            Phase::Idle => (Mode::Teleop, false),
            Phase::Countdown => (Mode::Autonomous, false),
            Phase::Autonomous => (Mode::Autonomous, !self.a_stopped),
            Phase::Delay => (Mode::Autonomous, false),
            Phase::Teleop => (Mode::Teleop, true),
            Phase::Done => (Mode::Teleop, false),
        };
        PracticeTick {
            phase: self.phase,
            elapsed_in_phase: self.elapsed_in_phase,
            remaining_in_phase: self.phase_duration().map(|d| d.saturating_sub(self.elapsed_in_phase)),
            mode,
            enabled,
            phase_changed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phase_at(seq: &mut PracticeSequencer, secs: f64) -> PracticeTick {
        seq.advance(Duration::from_secs_f64(secs))
    }

    #[test]
    fn default_timing_produces_the_spec_phase_boundaries() {
        let mut seq = PracticeSequencer::new(PracticeTiming::default());
        seq.start();

        assert_eq!(phase_at(&mut seq, 1.0).phase, Phase::Countdown);
        assert_eq!(phase_at(&mut seq, 2.0).phase, Phase::Autonomous); // cumulative t=3.0
        assert!(phase_at(&mut seq, 14.999).phase == Phase::Autonomous); // t ~= 17.999
        assert_eq!(phase_at(&mut seq, 0.001).phase, Phase::Delay); // cumulative t=18.0
        assert_eq!(phase_at(&mut seq, 1.0).phase, Phase::Teleop); // cumulative t=19.0
        assert_eq!(phase_at(&mut seq, 135.0).phase, Phase::Done); // cumulative t=154.0
    }

    #[test]
    fn enabled_intent_trace_matches_default_schedule() {
        let mut seq = PracticeSequencer::new(PracticeTiming::default());
        let countdown = seq.start();
        assert!(!countdown.enabled);

        let autonomous = seq.advance(Duration::from_secs(3));
        assert_eq!(autonomous.phase, Phase::Autonomous);
        assert!(autonomous.enabled);

        let delay = seq.advance(Duration::from_secs(15));
        assert_eq!(delay.phase, Phase::Delay);
        assert!(!delay.enabled);

        let teleop = seq.advance(Duration::from_secs(1));
        assert_eq!(teleop.phase, Phase::Teleop);
        assert!(teleop.enabled);

        let done = seq.advance(Duration::from_secs(135));
        assert_eq!(done.phase, Phase::Done);
        assert!(!done.enabled);
    }

    #[test]
    fn a_stop_during_autonomous_disables_without_moving_phase_boundaries() {
        let mut seq = PracticeSequencer::new(PracticeTiming::default());
        seq.start();
        let autonomous = seq.advance(Duration::from_secs(3)); // t=3, enters Autonomous
        assert!(autonomous.enabled);

        let mid_auto = seq.advance(Duration::from_secs(2)); // t=5
        assert!(mid_auto.enabled);

        seq.a_stop();
        let after_a_stop = seq.advance(Duration::ZERO);
        assert_eq!(after_a_stop.phase, Phase::Autonomous);
        assert!(!after_a_stop.enabled);

        // Phase boundaries are unaffected: Delay still starts at cumulative t=18.
        let delay = seq.advance(Duration::from_secs(13));
        assert_eq!(delay.phase, Phase::Delay);
        assert!(!delay.enabled);

        // A-Stop does not latch into Teleop.
        let teleop = seq.advance(Duration::from_secs(1));
        assert_eq!(teleop.phase, Phase::Teleop);
        assert!(teleop.enabled);
    }

    #[test]
    fn stop_returns_to_idle_and_disables() {
        let mut seq = PracticeSequencer::new(PracticeTiming::default());
        seq.start();
        seq.advance(Duration::from_secs(5));
        let tick = seq.stop();
        assert_eq!(tick.phase, Phase::Idle);
        assert!(!tick.enabled);
        assert!(!seq.is_running());
    }

    #[test]
    fn a_stop_outside_autonomous_is_a_no_op() {
        let mut seq = PracticeSequencer::new(PracticeTiming::default());
        seq.start();
        seq.a_stop();
        assert!(!seq.advance(Duration::ZERO).phase_changed); // still Countdown, nothing latched
        let autonomous = seq.advance(Duration::from_secs(3));
        assert!(autonomous.enabled); // the earlier a_stop() had no effect
    }
}
