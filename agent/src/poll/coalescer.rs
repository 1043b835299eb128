//! Request coalescing for the async protocol
//!
//! Ticks from the ping, snapshot and command tickers are merged into a single
//! request when they land within one coalescing window. The machine holds no
//! timer of its own: callers pass the current instant in and arm a timer for
//! the deadline it returns.

use std::time::Duration;

use tokio::time::Instant;

pub const COALESCE_WINDOW: Duration = Duration::from_millis(100);

/// What the next request must carry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub ping: bool,
    pub snapshot: bool,
    pub command: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoalesceEvent {
    PingTick,
    SnapshotTick,
    CommandTick,
    /// The coalescing timer expired
    Fire,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoalesceState {
    Idle,
    Coalescing { deadline: Instant, flags: Flags },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoalesceAction {
    None,
    /// Arm the coalescing timer for this instant
    Arm(Instant),
    /// Send exactly one request carrying these flags
    Send(Flags),
}

#[derive(Debug)]
pub struct Coalescer {
    state: CoalesceState,
    window: Duration,
}

impl Coalescer {
    pub fn new(window: Duration) -> Self {
        Self {
            state: CoalesceState::Idle,
            window,
        }
    }

    pub fn state(&self) -> CoalesceState {
        self.state
    }

    /// Deadline of the armed timer, if any
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            CoalesceState::Idle => None,
            CoalesceState::Coalescing { deadline, .. } => Some(deadline),
        }
    }

    pub fn handle(&mut self, event: CoalesceEvent, now: Instant) -> CoalesceAction {
        match (self.state, event) {
            (CoalesceState::Idle, CoalesceEvent::Fire) => CoalesceAction::None,
            (CoalesceState::Coalescing { flags, .. }, CoalesceEvent::Fire) => {
                self.state = CoalesceState::Idle;
                CoalesceAction::Send(flags)
            }
            (CoalesceState::Idle, tick) => {
                let deadline = now + self.window;
                self.state = CoalesceState::Coalescing {
                    deadline,
                    flags: set_flag(Flags::default(), tick),
                };
                CoalesceAction::Arm(deadline)
            }
            (CoalesceState::Coalescing { deadline, flags }, tick) => {
                self.state = CoalesceState::Coalescing {
                    deadline,
                    flags: set_flag(flags, tick),
                };
                CoalesceAction::None
            }
        }
    }
}

impl Default for Coalescer {
    fn default() -> Self {
        Self::new(COALESCE_WINDOW)
    }
}

fn set_flag(mut flags: Flags, event: CoalesceEvent) -> Flags {
    match event {
        CoalesceEvent::PingTick => flags.ping = true,
        CoalesceEvent::SnapshotTick => flags.snapshot = true,
        CoalesceEvent::CommandTick => flags.command = true,
        CoalesceEvent::Fire => {}
    }
    flags
}
