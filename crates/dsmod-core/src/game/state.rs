use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};
use strum::{Display, FromRepr, IntoStaticStr};

/// Inferred gameplay state
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    FromRepr,
    IntoStaticStr,
    Display,
)]
#[repr(u8)]
pub enum GameState {
    #[default]
    Idle = 0,
    InGame = 1,
    Paused = 2,
}

/// Something the handlers or the pause watcher observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    LevelLoaded { player_present: bool },
    Heartbeat { player_alive: bool },
    HeartbeatTimeout,
    PauseSignal,
    PlayerDied,
    LevelExited,
}

/// Side effect attached to a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Drop current weapon, ammo-pointer table and has-ammo table
    ClearTracking,
    /// Put both triggers back to the neutral profile
    ResetTriggers,
    /// Resend the current weapon's profile, bypassing de-duplication
    ReplayProfile,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: GameState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn stay(state: GameState) -> Self {
        Self {
            next: state,
            effects: Vec::new(),
        }
    }

    fn to_idle() -> Self {
        Self {
            next: GameState::Idle,
            effects: vec![Effect::ClearTracking, Effect::ResetTriggers],
        }
    }

    fn to_in_game() -> Self {
        Self {
            next: GameState::InGame,
            effects: vec![Effect::ReplayProfile],
        }
    }

    fn to_paused() -> Self {
        Self {
            next: GameState::Paused,
            effects: vec![Effect::ResetTriggers],
        }
    }

    pub fn is_noop(&self, from: GameState) -> bool {
        self.next == from && self.effects.is_empty()
    }
}

/// The gameplay state machine.
///
/// Entering Idle always clears tracking and resets the triggers; entering
/// InGame from any other state replays the current weapon's profile because
/// the device keeps no memory across a pause.
pub fn transition(state: GameState, event: GameEvent) -> Transition {
    use GameEvent::*;
    use GameState::*;

    match (state, event) {
        (Idle, LevelLoaded { player_present: true }) => Transition::to_in_game(),
        (Paused, LevelLoaded { .. }) => Transition::to_idle(),

        (Idle | Paused, Heartbeat { player_alive: true }) => Transition::to_in_game(),

        (InGame, HeartbeatTimeout | PauseSignal) => Transition::to_paused(),

        (_, PlayerDied) => Transition::to_idle(),
        (InGame | Paused, LevelExited) => Transition::to_idle(),

        (state, _) => Transition::stay(state),
    }
}

/// Process-wide state value, read and written atomically.
#[derive(Debug, Default)]
pub struct SharedGameState(AtomicU8);

impl SharedGameState {
    pub fn new(state: GameState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> GameState {
        GameState::from_repr(self.0.load(Ordering::Acquire)).unwrap_or_default()
    }

    pub fn store(&self, state: GameState) {
        self.0.store(state as u8, Ordering::Release);
    }
}
