use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

/// Ordered phases of a match. The discriminant is the index sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchState {
    /// Teams are being set up; held until an operator starts the match.
    PreMatch = 0,
    /// The start was accepted; the next clock update enters the first period.
    StartMatch = 1,
    /// Robots warm up before autonomous.
    WarmupPeriod = 2,
    /// Autonomous period.
    AutoPeriod = 3,
    /// Pause between autonomous and teleop.
    PausePeriod = 4,
    /// Teleoperated period.
    TeleopPeriod = 5,
    /// Held until results are committed or discarded.
    PostMatch = 6,
}

impl MatchState {
    /// Integer index used on the wire.
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Whether the match is running (neither pre-match nor post-match).
    pub fn is_active(self) -> bool {
        !matches!(self, MatchState::PreMatch | MatchState::PostMatch)
    }

    /// Whether this state is one of the timed periods.
    fn is_timed(self) -> bool {
        matches!(
            self,
            MatchState::WarmupPeriod
                | MatchState::AutoPeriod
                | MatchState::PausePeriod
                | MatchState::TeleopPeriod
        )
    }
}

impl Serialize for MatchState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.index())
    }
}

/// Configured duration of each timed period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MatchTiming {
    /// Warmup length.
    pub warmup_duration_sec: u64,
    /// Autonomous length.
    pub auto_duration_sec: u64,
    /// Pause length.
    pub pause_duration_sec: u64,
    /// Teleop length.
    pub teleop_duration_sec: u64,
    /// Remaining teleop time at which displays start warning the audience.
    pub warning_remaining_duration_sec: u64,
}

impl Default for MatchTiming {
    fn default() -> Self {
        Self {
            warmup_duration_sec: 3,
            auto_duration_sec: 15,
            pause_duration_sec: 2,
            teleop_duration_sec: 135,
            warning_remaining_duration_sec: 30,
        }
    }
}

impl MatchTiming {
    fn periods(&self) -> [(MatchState, u64); 4] {
        [
            (MatchState::WarmupPeriod, self.warmup_duration_sec),
            (MatchState::AutoPeriod, self.auto_duration_sec),
            (MatchState::PausePeriod, self.pause_duration_sec),
            (MatchState::TeleopPeriod, self.teleop_duration_sec),
        ]
    }

    /// Sum of all timed periods.
    pub fn total_duration(&self) -> Duration {
        Duration::from_secs(self.periods().iter().map(|(_, secs)| secs).sum())
    }

    /// Period occupied `elapsed` after the match started.
    pub fn state_at(&self, elapsed: Duration) -> MatchState {
        let mut boundary = Duration::ZERO;
        for (state, secs) in self.periods() {
            boundary += Duration::from_secs(secs);
            if elapsed < boundary {
                return state;
            }
        }
        MatchState::PostMatch
    }
}

/// Events the operator can apply to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchEvent {
    /// Start from pre-match.
    Start,
    /// Abort an active match.
    Abort,
    /// Return to pre-match.
    Reset,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The state the machine was in when the invalid event was received.
    pub from: MatchState,
    /// The event that cannot be applied from this state.
    pub event: MatchEvent,
}

/// Payload of the `matchTime` notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchTime {
    /// Current state.
    pub match_state: MatchState,
    /// Whole seconds since the match started.
    pub match_time_sec: u64,
}

/// What changed during a clock update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockUpdate {
    /// New state when a period boundary was crossed.
    pub period_changed: Option<MatchState>,
    /// Set when a whole second elapsed or the period changed.
    pub tick: Option<MatchTime>,
}

/// Timer-driven match lifecycle.
#[derive(Debug, Clone)]
pub struct MatchStateMachine {
    timing: MatchTiming,
    state: MatchState,
    started_at: Option<Instant>,
    last_tick_sec: Option<u64>,
}

impl MatchStateMachine {
    /// Create a machine held in pre-match.
    pub fn new(timing: MatchTiming) -> Self {
        Self {
            timing,
            state: MatchState::PreMatch,
            started_at: None,
            last_tick_sec: None,
        }
    }

    /// Inspect the current state.
    pub fn state(&self) -> MatchState {
        self.state
    }

    /// Configured period durations.
    pub fn timing(&self) -> &MatchTiming {
        &self.timing
    }

    /// Current state and whole seconds elapsed, zero outside the timed periods.
    pub fn match_time(&self, now: Instant) -> MatchTime {
        let match_time_sec = match self.started_at {
            Some(started_at) if self.state.is_timed() => {
                now.saturating_duration_since(started_at).as_secs()
            }
            _ => 0,
        };
        MatchTime {
            match_state: self.state,
            match_time_sec,
        }
    }

    /// Start the clock from pre-match.
    pub fn start(&mut self, now: Instant) -> Result<(), InvalidTransition> {
        self.ensure(MatchEvent::Start, self.state == MatchState::PreMatch)?;
        self.state = MatchState::StartMatch;
        self.started_at = Some(now);
        self.last_tick_sec = None;
        Ok(())
    }

    /// Jump straight to post-match from any active state.
    pub fn abort(&mut self) -> Result<(), InvalidTransition> {
        self.ensure(MatchEvent::Abort, self.state.is_active())?;
        self.state = MatchState::PostMatch;
        Ok(())
    }

    /// Return to pre-match once results were handled.
    pub fn reset(&mut self) -> Result<(), InvalidTransition> {
        self.ensure(MatchEvent::Reset, self.state == MatchState::PostMatch)?;
        self.state = MatchState::PreMatch;
        self.started_at = None;
        self.last_tick_sec = None;
        Ok(())
    }

    /// Advance the clock. Calling it twice with the same instant reports nothing new.
    pub fn update(&mut self, now: Instant) -> ClockUpdate {
        let Some(started_at) = self.started_at else {
            return ClockUpdate::default();
        };
        if !self.state.is_active() {
            return ClockUpdate::default();
        }

        let elapsed = now.saturating_duration_since(started_at);
        let next = self.timing.state_at(elapsed);
        let period_changed = (next != self.state).then_some(next);
        self.state = next;

        let second = elapsed.as_secs();
        let crossed_second = self.last_tick_sec != Some(second);
        self.last_tick_sec = Some(second);

        let tick = (crossed_second || period_changed.is_some()).then(|| self.match_time(now));
        ClockUpdate {
            period_changed,
            tick,
        }
    }

    fn ensure(&self, event: MatchEvent, allowed: bool) -> Result<(), InvalidTransition> {
        if allowed {
            Ok(())
        } else {
            Err(InvalidTransition {
                from: self.state,
                event,
            })
        }
    }
}
