//! The owned session context shared by every interception handler.
//!
//! Holds the game state, the heartbeat stamp, the compound tracking behind
//! one lock, the profile table and the trigger device. Lock order is
//! `transition` before `tracking`; neither is held across a host call.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tracing::{debug, info};

use crate::game::{
    DispatchKey, Effect, GameEvent, GameState, PlayerHandle, SharedGameState, Tracking,
    transition,
};
use crate::trigger::{ProfileTable, TriggerDevice, TriggerPair, apply_pair};

/// Millisecond clock used for heartbeat stamps
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Hand-driven clock for tests
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ManualClock(AtomicU64);

#[cfg(test)]
impl ManualClock {
    pub fn set(&self, ms: u64) {
        self.0.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

const NO_HEARTBEAT: u64 = u64::MAX;

pub struct SessionContext {
    state: SharedGameState,
    last_heartbeat: AtomicU64,
    transition: Mutex<()>,
    tracking: Mutex<Tracking>,
    profiles: ProfileTable,
    neutral: TriggerPair,
    device: Box<dyn TriggerDevice>,
    clock: Arc<dyn Clock>,
}

impl SessionContext {
    pub fn new(profiles: ProfileTable, device: Box<dyn TriggerDevice>) -> Self {
        Self::with_clock(profiles, device, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(
        profiles: ProfileTable,
        device: Box<dyn TriggerDevice>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state: SharedGameState::new(GameState::Idle),
            last_heartbeat: AtomicU64::new(NO_HEARTBEAT),
            transition: Mutex::new(()),
            tracking: Mutex::new(Tracking::default()),
            profiles,
            neutral: TriggerPair::neutral(),
            device,
            clock,
        }
    }

    pub fn state(&self) -> GameState {
        self.state.load()
    }

    pub fn profiles(&self) -> &ProfileTable {
        &self.profiles
    }

    /// Lock the compound tracking. A poisoned lock is recovered; the data is
    /// advisory and a panic in one handler must not disable the others.
    pub fn tracking(&self) -> MutexGuard<'_, Tracking> {
        self.tracking.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn transition_lock(&self) -> MutexGuard<'_, ()> {
        self.transition.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn tracked_player(&self) -> Option<PlayerHandle> {
        self.tracking().player
    }

    pub fn is_tracked_player(&self, player: PlayerHandle) -> bool {
        self.tracked_player() == Some(player)
    }

    pub fn set_player(&self, player: PlayerHandle) {
        let mut tracking = self.tracking();
        if tracking.player != Some(player) {
            debug!("Tracking player {:?}", player);
            tracking.player = Some(player);
        }
    }

    /// Take `player` as the one named by the first weapon grant of this Idle
    /// period. Later grants are ignored until the next transition into Idle.
    pub fn capture_player(&self, player: PlayerHandle) -> bool {
        let mut tracking = self.tracking();
        if tracking.player_captured {
            return false;
        }
        tracking.player_captured = true;
        tracking.player = Some(player);
        true
    }

    pub fn current_weapon_id(&self) -> Option<String> {
        self.tracking().weapon.as_ref().map(|w| w.id.clone())
    }

    pub fn stamp_heartbeat(&self) {
        self.last_heartbeat
            .store(self.clock.now_ms(), Ordering::Release);
    }

    /// Time since the last heartbeat, `None` if none was ever seen.
    pub fn millis_since_heartbeat(&self) -> Option<u64> {
        match self.last_heartbeat.load(Ordering::Acquire) {
            NO_HEARTBEAT => None,
            last => Some(self.clock.now_ms().saturating_sub(last)),
        }
    }

    /// Feed an event through the state machine and run the resulting effects.
    ///
    /// Events that cannot change anything return without taking the lock, so
    /// the per-frame heartbeat stays cheap while InGame.
    pub fn apply(&self, event: GameEvent) -> GameState {
        let current = self.state.load();
        if transition(current, event).is_noop(current) {
            return current;
        }

        let _guard = self.transition_lock();
        let current = self.state.load();
        let step = transition(current, event);
        if step.is_noop(current) {
            return current;
        }

        self.state.store(step.next);
        if current != step.next {
            info!("Game state: {} -> {} on {:?}", current, step.next, event);
        }
        for effect in &step.effects {
            match effect {
                Effect::ClearTracking => self.tracking().clear(),
                Effect::ResetTriggers => self.reset_triggers(),
                Effect::ReplayProfile => self.dispatch_current(true),
            }
        }
        step.next
    }

    /// Send the current weapon's profile if the game is running.
    pub fn dispatch_if_in_game(&self) {
        let _guard = self.transition_lock();
        if self.state.load() == GameState::InGame {
            self.dispatch_current(false);
        }
    }

    /// Send the profile matching the tracked weapon and ammo state. Unless
    /// forced, nothing is sent when it equals the last profile sent.
    fn dispatch_current(&self, force: bool) {
        let (key, pair) = {
            let mut tracking = self.tracking();
            let (key, pair) = self.select_profile(&tracking);
            if !force && tracking.last_dispatch.as_ref() == Some(&key) {
                return;
            }
            tracking.last_dispatch = Some(key.clone());
            (key, pair.clone())
        };
        apply_pair(self.device.as_ref(), &pair);
        debug!("Adaptive Trigger settings sent successfully! ({:?})", key);
    }

    fn select_profile(&self, tracking: &Tracking) -> (DispatchKey, &TriggerPair) {
        let Some(weapon) = &tracking.weapon else {
            return (DispatchKey::Neutral, &self.neutral);
        };
        if tracking.current_has_ammo() == Some(false) {
            return (DispatchKey::NoAmmo, &self.profiles.no_ammo);
        }
        match self.profiles.get(&weapon.id) {
            Some(profile) => {
                let (pair, modded) = profile.pair(weapon.is_modded());
                let key = DispatchKey::Weapon {
                    id: weapon.id.clone(),
                    modded,
                };
                (key, pair)
            }
            None => {
                debug!("No trigger profile for {}, using neutral", weapon.id);
                (DispatchKey::Neutral, &self.neutral)
            }
        }
    }

    fn reset_triggers(&self) {
        self.tracking().last_dispatch = Some(DispatchKey::Neutral);
        apply_pair(self.device.as_ref(), &self.neutral);
        debug!("Adaptive Triggers reset successfully!");
    }
}
