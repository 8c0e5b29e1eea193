//! Logic behind every interception.
//!
//! Each function is called by a detour with arguments already turned into
//! handles. None of them fail: unreadable objects leave the tracked state as
//! it was. Forwarding to the original stays in the detour, except for damage
//! where detection has to straddle the original call.

use std::cell::Cell;

use tracing::{debug, info};

use crate::game::{AmmoHandle, GameEvent, GameState, PlayerHandle, TrackedWeapon, WeaponHandle};
use crate::host::HostAccess;
use crate::session::SessionContext;

thread_local! {
    static IN_DAMAGE: Cell<bool> = const { Cell::new(false) };
}

/// Marks the outermost damage call on this thread.
struct DamageGuard;

impl DamageGuard {
    fn enter() -> Option<Self> {
        IN_DAMAGE.with(|flag| (!flag.replace(true)).then_some(DamageGuard))
    }
}

impl Drop for DamageGuard {
    fn drop(&mut self) {
        IN_DAMAGE.with(|flag| flag.set(false));
    }
}

/// Read a weapon and make it the current one. Returns its id, or `None` if
/// the weapon could not be read and tracking was left alone.
fn track_weapon<H: HostAccess + ?Sized>(
    ctx: &SessionContext,
    host: &H,
    weapon: WeaponHandle,
) -> Option<String> {
    let Some(id) = host.weapon_id(weapon) else {
        debug!("Could not read weapon id of {:?}", weapon);
        return None;
    };
    let ammo_type = host.weapon_ammo_type(weapon);

    let ammo = ammo_type.and_then(|ty| ctx.tracking().ammo_pointers.get(&ty).copied());
    let count = ammo.and_then(|ammo| host.ammo_count(ammo));

    let mut tracking = ctx.tracking();
    if let (Some(ammo), Some(count)) = (ammo, count) {
        tracking.has_ammo.insert(ammo, count > 0);
    }
    tracking.select(TrackedWeapon::new(weapon, id.clone(), ammo_type));
    drop(tracking);

    info!("Current weapon: {}", id);
    Some(id)
}

/// Runtime weapon switch.
pub fn weapon_selected<H: HostAccess + ?Sized>(
    ctx: &SessionContext,
    host: &H,
    weapon: Option<WeaponHandle>,
) {
    let Some(weapon) = weapon else {
        return;
    };
    if track_weapon(ctx, host, weapon).is_some() {
        ctx.dispatch_if_in_game();
    }
}

/// Weapon granted through a declaration (loadout, pickups). The first call
/// seen in each Idle period also tells us who the player is.
pub fn weapon_initialized<H: HostAccess + ?Sized>(
    ctx: &SessionContext,
    host: &H,
    owner: Option<PlayerHandle>,
    weapon: Option<WeaponHandle>,
) {
    if let Some(owner) = owner
        && ctx.state() == GameState::Idle
        && ctx.capture_player(owner)
    {
        info!("Captured player {:?}", owner);
    }
    weapon_selected(ctx, host, weapon);
}

/// An ammo pool changed; `ammo` is the pool after the update.
pub fn ammo_updated<H: HostAccess + ?Sized>(
    ctx: &SessionContext,
    host: &H,
    ammo: Option<AmmoHandle>,
) {
    let Some(ammo) = ammo else {
        return;
    };
    let Some(count) = host.ammo_count(ammo) else {
        return;
    };
    let ammo_type = host.ammo_type(ammo);
    let has_ammo = count > 0;

    let flipped = {
        let mut tracking = ctx.tracking();
        let before = tracking.current_has_ammo();

        let current_type = tracking.weapon.as_ref().and_then(|w| w.ammo_type);
        if let Some(ty) = ammo_type
            && current_type == Some(ty)
            && !tracking.ammo_pointers.contains_key(&ty)
        {
            debug!("Ammo type {} lives at {:?}", ty, ammo);
            tracking.ammo_pointers.insert(ty, ammo);
        }
        tracking.has_ammo.insert(ammo, has_ammo);

        before != tracking.current_has_ammo()
    };

    if flipped {
        debug!("Ammo {:?} sufficient: {}", ammo, has_ammo);
        ctx.dispatch_if_in_game();
    }
}

/// Wrap one damage application. Only the outermost call on a thread checks
/// the tracked player for an alive to dead edge; nested calls just forward.
pub fn damage_applied<H, R>(ctx: &SessionContext, host: &H, forward: impl FnOnce() -> R) -> R
where
    H: HostAccess + ?Sized,
{
    let Some(_guard) = DamageGuard::enter() else {
        return forward();
    };
    let Some(player) = ctx.tracked_player() else {
        return forward();
    };

    let was_dead = host.is_dead(player);
    let result = forward();
    let is_dead = host.is_dead(player);

    if was_dead == Some(false) && is_dead == Some(true) {
        info!("Player died");
        ctx.apply(GameEvent::PlayerDied);
    }
    result
}

/// Per-frame hands update, the liveness heartbeat.
pub fn hands_updated<H: HostAccess + ?Sized>(
    ctx: &SessionContext,
    host: &H,
    player: Option<PlayerHandle>,
) {
    ctx.stamp_heartbeat();

    let player_alive = player.is_none_or(|p| host.is_dead(p) != Some(true));
    if let Some(player) = player
        && (ctx.tracked_player().is_none()
            || (player_alive && ctx.state() != GameState::InGame))
    {
        ctx.set_player(player);
    }
    ctx.apply(GameEvent::Heartbeat { player_alive });
}

/// A level finished loading. Picks up the player and their starting weapon.
pub fn level_loaded<H: HostAccess + ?Sized>(
    ctx: &SessionContext,
    host: &H,
    player: Option<PlayerHandle>,
) {
    if let Some(player) = player {
        ctx.set_player(player);
        match host.current_weapon(player) {
            Some(weapon) => {
                track_weapon(ctx, host, weapon);
            }
            None => debug!("No starting weapon for {:?}", player),
        }
    }

    let player_present = ctx.tracked_player().is_some();
    let state = ctx.apply(GameEvent::LevelLoaded { player_present });
    if state == GameState::InGame {
        ctx.dispatch_if_in_game();
    }
}

/// A weapon's active fire mode changed.
pub fn fire_mode_changed(ctx: &SessionContext, weapon: Option<WeaponHandle>, mode: i32) {
    let Some(weapon) = weapon else {
        return;
    };
    let changed = {
        let mut tracking = ctx.tracking();
        match tracking.weapon.as_mut() {
            Some(current) if current.handle == weapon && current.fire_mode != Some(mode) => {
                debug!("Fire mode of {}: {:?} -> {}", current.id, current.fire_mode, mode);
                current.fire_mode = Some(mode);
                tracking.fire_modes.insert(weapon, mode);
                true
            }
            _ => false,
        }
    };
    if changed {
        ctx.dispatch_if_in_game();
    }
}

/// The pause menu opened.
pub fn pause_signaled(ctx: &SessionContext) {
    ctx.apply(GameEvent::PauseSignal);
}

pub fn level_exited(ctx: &SessionContext) {
    ctx.apply(GameEvent::LevelExited);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::game::DispatchKey;
    use crate::host::fake::FakeHost;
    use crate::session::ManualClock;
    use crate::trigger::{ProfileTable, RecordingDevice, TriggerCommand, TriggerPair};

    const PLAYER: usize = 0x1000;
    const SMG_AMMO: u32 = 3;

    struct Harness {
        ctx: SessionContext,
        device: Arc<RecordingDevice>,
        host: FakeHost,
        player: PlayerHandle,
    }

    impl Harness {
        fn new() -> Self {
            let device = Arc::new(RecordingDevice::default());
            let ctx = SessionContext::with_clock(
                ProfileTable::builtin(),
                Box::new(device.clone()),
                Arc::new(ManualClock::default()),
            );
            let host = FakeHost::default();
            let player = host.add_player(PLAYER);
            Self {
                ctx,
                device,
                host,
                player,
            }
        }

        /// Level loaded with the player holding `weapon`, device log cleared.
        fn in_game_with(&self, weapon: WeaponHandle) {
            self.host.equip(self.player, weapon);
            level_loaded(&self.ctx, &self.host, Some(self.player));
            assert_eq!(self.ctx.state(), GameState::InGame);
            self.device.take();
        }

        fn profile(&self, id: &str) -> Vec<TriggerCommand> {
            let profile = self.ctx.profiles().get(id).unwrap();
            RecordingDevice::pair_commands(&profile.primary)
        }

        fn modded(&self, id: &str) -> Vec<TriggerCommand> {
            let profile = self.ctx.profiles().get(id).unwrap();
            RecordingDevice::pair_commands(profile.modded.as_ref().unwrap())
        }

        fn no_ammo(&self) -> Vec<TriggerCommand> {
            RecordingDevice::pair_commands(&self.ctx.profiles().no_ammo)
        }
    }

    fn neutral() -> Vec<TriggerCommand> {
        RecordingDevice::pair_commands(&TriggerPair::neutral())
    }

    #[test]
    fn test_weapon_selection_tracks_latest_non_null() {
        let h = Harness::new();
        let pistol = h.host.add_weapon(0x10, "WEAPON_PISTOL_DEFAULT", None);
        let smg = h.host.add_weapon(0x20, "WEAPON_SMG_STANDARD", Some(SMG_AMMO));
        let railgun = h.host.add_weapon(0x30, "WEAPON_RAILGUN_STANDARD", Some(5));

        let events = [Some(pistol), Some(smg), None, Some(railgun), None, Some(pistol)];
        let mut expected = None;
        for event in events {
            weapon_selected(&h.ctx, &h.host, event);
            if let Some(weapon) = event {
                expected = h.host.weapon_id(weapon);
            }
            assert_eq!(h.ctx.current_weapon_id(), expected);
        }
    }

    #[test]
    fn test_unreadable_weapon_keeps_previous() {
        let h = Harness::new();
        let pistol = h.host.add_weapon(0x10, "WEAPON_PISTOL_DEFAULT", None);
        let smg = h.host.add_weapon(0x20, "WEAPON_SMG_STANDARD", Some(SMG_AMMO));
        h.in_game_with(pistol);

        h.host.free_weapon(smg);
        weapon_selected(&h.ctx, &h.host, Some(smg));
        assert_eq!(h.ctx.current_weapon_id().as_deref(), Some("WEAPON_PISTOL_DEFAULT"));
        assert!(h.device.commands().is_empty());
    }

    #[test]
    fn test_weapon_switch_dispatches_only_in_game() {
        let h = Harness::new();
        let smg = h.host.add_weapon(0x20, "WEAPON_SMG_STANDARD", Some(SMG_AMMO));
        let railgun = h.host.add_weapon(0x30, "WEAPON_RAILGUN_STANDARD", Some(5));

        weapon_selected(&h.ctx, &h.host, Some(smg));
        assert!(h.device.commands().is_empty());

        h.in_game_with(smg);
        weapon_selected(&h.ctx, &h.host, Some(railgun));
        assert_eq!(h.device.take(), h.profile("WEAPON_RAILGUN_STANDARD"));
    }

    #[test]
    fn test_unknown_weapon_falls_back_to_neutral() {
        let h = Harness::new();
        let smg = h.host.add_weapon(0x20, "WEAPON_SMG_STANDARD", Some(SMG_AMMO));
        let bfg = h.host.add_weapon(0x40, "WEAPON_BFG", Some(9));
        h.in_game_with(smg);

        weapon_selected(&h.ctx, &h.host, Some(bfg));
        assert_eq!(h.ctx.current_weapon_id().as_deref(), Some("WEAPON_BFG"));
        assert_eq!(h.device.take(), neutral());
    }

    #[test]
    fn test_weapon_initialized_captures_first_player_while_idle() {
        let h = Harness::new();
        let other = h.host.add_player(0x2000);
        let pistol = h.host.add_weapon(0x10, "WEAPON_PISTOL_DEFAULT", None);

        weapon_initialized(&h.ctx, &h.host, Some(h.player), Some(pistol));
        assert_eq!(h.ctx.tracked_player(), Some(h.player));
        assert_eq!(h.ctx.current_weapon_id().as_deref(), Some("WEAPON_PISTOL_DEFAULT"));

        weapon_initialized(&h.ctx, &h.host, Some(other), None);
        assert_eq!(h.ctx.tracked_player(), Some(h.player));
    }

    #[test]
    fn test_heartbeat_is_idempotent_in_game() {
        let h = Harness::new();
        let smg = h.host.add_weapon(0x20, "WEAPON_SMG_STANDARD", Some(SMG_AMMO));
        h.in_game_with(smg);

        for _ in 0..10 {
            hands_updated(&h.ctx, &h.host, Some(h.player));
        }
        assert_eq!(h.ctx.state(), GameState::InGame);
        assert!(h.device.commands().is_empty());
    }

    #[test]
    fn test_heartbeat_resumes_and_replays_after_pause() {
        let h = Harness::new();
        let smg = h.host.add_weapon(0x20, "WEAPON_SMG_STANDARD", Some(SMG_AMMO));
        h.in_game_with(smg);

        pause_signaled(&h.ctx);
        assert_eq!(h.ctx.state(), GameState::Paused);
        assert_eq!(h.device.take(), neutral());

        hands_updated(&h.ctx, &h.host, Some(h.player));
        assert_eq!(h.ctx.state(), GameState::InGame);
        assert_eq!(h.device.take(), h.profile("WEAPON_SMG_STANDARD"));
    }

    #[test]
    fn test_heartbeat_from_dead_player_does_not_resume() {
        let h = Harness::new();
        h.host.set_dead(h.player, true);
        hands_updated(&h.ctx, &h.host, Some(h.player));
        assert_eq!(h.ctx.state(), GameState::Idle);
        assert!(h.ctx.millis_since_heartbeat().is_some());
    }

    #[test]
    fn test_death_resets_exactly_once() {
        let h = Harness::new();
        let smg = h.host.add_weapon(0x20, "WEAPON_SMG_STANDARD", Some(SMG_AMMO));
        let ammo = h.host.set_ammo(0x500, SMG_AMMO, 40);
        h.in_game_with(smg);
        ammo_updated(&h.ctx, &h.host, Some(ammo));

        damage_applied(&h.ctx, &h.host, || h.host.set_dead(h.player, true));
        assert_eq!(h.ctx.state(), GameState::Idle);
        assert!(h.ctx.current_weapon_id().is_none());
        {
            let tracking = h.ctx.tracking();
            assert!(tracking.ammo_pointers.is_empty());
            assert!(tracking.has_ammo.is_empty());
        }
        assert_eq!(h.device.take(), neutral());

        damage_applied(&h.ctx, &h.host, || ());
        assert!(h.device.commands().is_empty());
    }

    #[test]
    fn test_respawned_player_is_recaptured() {
        let h = Harness::new();
        let smg = h.host.add_weapon(0x20, "WEAPON_SMG_STANDARD", Some(SMG_AMMO));
        h.in_game_with(smg);
        damage_applied(&h.ctx, &h.host, || h.host.set_dead(h.player, true));
        assert_eq!(h.ctx.state(), GameState::Idle);
        assert_eq!(h.ctx.tracked_player(), None);

        // the dead body keeps ticking until the checkpoint reloads
        hands_updated(&h.ctx, &h.host, Some(h.player));
        assert_eq!(h.ctx.state(), GameState::Idle);

        let fresh = h.host.add_player(0x3000);
        let pistol = h.host.add_weapon(0x10, "WEAPON_PISTOL_DEFAULT", None);
        weapon_initialized(&h.ctx, &h.host, Some(fresh), Some(pistol));
        assert_eq!(h.ctx.tracked_player(), Some(fresh));
        hands_updated(&h.ctx, &h.host, Some(fresh));
        assert_eq!(h.ctx.state(), GameState::InGame);
        h.device.take();

        damage_applied(&h.ctx, &h.host, || h.host.set_dead(fresh, true));
        assert_eq!(h.ctx.state(), GameState::Idle);
        assert_eq!(h.device.take(), neutral());
    }

    #[test]
    fn test_live_heartbeat_replaces_stale_player() {
        let h = Harness::new();
        let smg = h.host.add_weapon(0x20, "WEAPON_SMG_STANDARD", Some(SMG_AMMO));
        h.in_game_with(smg);
        pause_signaled(&h.ctx);

        let fresh = h.host.add_player(0x3000);
        hands_updated(&h.ctx, &h.host, Some(fresh));
        assert_eq!(h.ctx.tracked_player(), Some(fresh));
        assert_eq!(h.ctx.state(), GameState::InGame);
    }

    #[test]
    fn test_nested_damage_runs_detection_once() {
        let h = Harness::new();
        let smg = h.host.add_weapon(0x20, "WEAPON_SMG_STANDARD", Some(SMG_AMMO));
        h.in_game_with(smg);

        let result = damage_applied(&h.ctx, &h.host, || {
            damage_applied(&h.ctx, &h.host, || h.host.set_dead(h.player, true));
            7
        });
        assert_eq!(result, 7);
        assert_eq!(h.ctx.state(), GameState::Idle);
        assert_eq!(h.device.take(), neutral());

        // the guard is released afterwards
        assert!(DamageGuard::enter().is_some());
    }

    #[test]
    fn test_damage_without_player_only_forwards() {
        let h = Harness::new();
        let result = damage_applied(&h.ctx, &h.host, || "forwarded");
        assert_eq!(result, "forwarded");
        assert_eq!(h.ctx.state(), GameState::Idle);
    }

    #[test]
    fn test_ammo_sufficiency_follows_count_sign() {
        let h = Harness::new();
        let smg = h.host.add_weapon(0x20, "WEAPON_SMG_STANDARD", Some(SMG_AMMO));
        h.in_game_with(smg);

        let ammo = h.host.set_ammo(0x500, SMG_AMMO, 0);
        ammo_updated(&h.ctx, &h.host, Some(ammo));
        assert_eq!(h.ctx.tracking().has_ammo.get(&ammo), Some(&false));
        assert_eq!(h.ctx.tracking().ammo_pointers.get(&SMG_AMMO), Some(&ammo));
        assert_eq!(h.device.take(), h.no_ammo());

        h.host.set_ammo(0x500, SMG_AMMO, -1);
        ammo_updated(&h.ctx, &h.host, Some(ammo));
        assert_eq!(h.ctx.tracking().has_ammo.get(&ammo), Some(&false));
        assert!(h.device.take().is_empty());

        h.host.set_ammo(0x500, SMG_AMMO, 25);
        ammo_updated(&h.ctx, &h.host, Some(ammo));
        assert_eq!(h.ctx.tracking().has_ammo.get(&ammo), Some(&true));
        assert_eq!(h.device.take(), h.profile("WEAPON_SMG_STANDARD"));

        h.host.set_ammo(0x500, SMG_AMMO, 24);
        ammo_updated(&h.ctx, &h.host, Some(ammo));
        assert!(h.device.take().is_empty());
    }

    #[test]
    fn test_other_ammo_types_are_not_mapped() {
        let h = Harness::new();
        let smg = h.host.add_weapon(0x20, "WEAPON_SMG_STANDARD", Some(SMG_AMMO));
        h.in_game_with(smg);

        let shells = h.host.set_ammo(0x600, 7, 0);
        ammo_updated(&h.ctx, &h.host, Some(shells));
        let tracking = h.ctx.tracking();
        assert_eq!(tracking.has_ammo.get(&shells), Some(&false));
        assert!(!tracking.ammo_pointers.contains_key(&7));
        assert!(h.device.commands().is_empty());
    }

    #[test]
    fn test_switching_to_empty_weapon_uses_no_ammo_profile() {
        let h = Harness::new();
        let pistol = h.host.add_weapon(0x10, "WEAPON_PISTOL_DEFAULT", None);
        let smg = h.host.add_weapon(0x20, "WEAPON_SMG_STANDARD", Some(SMG_AMMO));
        let ammo = h.host.set_ammo(0x500, SMG_AMMO, 10);
        h.in_game_with(smg);
        ammo_updated(&h.ctx, &h.host, Some(ammo));

        weapon_selected(&h.ctx, &h.host, Some(pistol));
        h.host.set_ammo(0x500, SMG_AMMO, 0);
        h.device.take();

        weapon_selected(&h.ctx, &h.host, Some(smg));
        assert_eq!(h.device.take(), h.no_ammo());
    }

    #[test]
    fn test_level_load_enters_game_with_starting_weapon() {
        let h = Harness::new();
        let shotgun = h.host.add_weapon(0x50, "WEAPON_SHOTGUN_SINGLESHOT", Some(2));
        h.host.equip(h.player, shotgun);

        level_loaded(&h.ctx, &h.host, Some(h.player));
        assert_eq!(h.ctx.state(), GameState::InGame);
        assert_eq!(h.ctx.tracked_player(), Some(h.player));
        assert_eq!(
            h.ctx.current_weapon_id().as_deref(),
            Some("WEAPON_SHOTGUN_SINGLESHOT")
        );
        assert_eq!(h.device.take(), h.profile("WEAPON_SHOTGUN_SINGLESHOT"));
    }

    #[test]
    fn test_level_load_without_player_stays_idle() {
        let h = Harness::new();
        level_loaded(&h.ctx, &h.host, None);
        assert_eq!(h.ctx.state(), GameState::Idle);
        assert!(h.device.commands().is_empty());
    }

    #[test]
    fn test_level_load_while_paused_returns_to_idle() {
        let h = Harness::new();
        let smg = h.host.add_weapon(0x20, "WEAPON_SMG_STANDARD", Some(SMG_AMMO));
        h.in_game_with(smg);
        pause_signaled(&h.ctx);
        h.device.take();

        level_loaded(&h.ctx, &h.host, Some(h.player));
        assert_eq!(h.ctx.state(), GameState::Idle);
        assert!(h.ctx.current_weapon_id().is_none());
        assert_eq!(h.device.take(), neutral());
    }

    #[test]
    fn test_fire_mode_change_uses_mod_variant() {
        let h = Harness::new();
        let shotgun = h.host.add_weapon(0x50, "WEAPON_SHOTGUN_SINGLESHOT", Some(2));
        h.in_game_with(shotgun);

        fire_mode_changed(&h.ctx, Some(shotgun), 1);
        assert_eq!(h.device.take(), h.modded("WEAPON_SHOTGUN_SINGLESHOT"));
        assert_eq!(
            h.ctx.tracking().last_dispatch,
            Some(DispatchKey::Weapon {
                id: "WEAPON_SHOTGUN_SINGLESHOT".to_string(),
                modded: true
            })
        );

        fire_mode_changed(&h.ctx, Some(shotgun), 1);
        assert!(h.device.take().is_empty());

        fire_mode_changed(&h.ctx, Some(shotgun), 0);
        assert_eq!(h.device.take(), h.profile("WEAPON_SHOTGUN_SINGLESHOT"));
    }

    #[test]
    fn test_fire_mode_survives_weapon_switch() {
        let h = Harness::new();
        let shotgun = h.host.add_weapon(0x50, "WEAPON_SHOTGUN_SINGLESHOT", Some(2));
        let pistol = h.host.add_weapon(0x10, "WEAPON_PISTOL_DEFAULT", None);
        h.in_game_with(shotgun);
        fire_mode_changed(&h.ctx, Some(shotgun), 1);

        weapon_selected(&h.ctx, &h.host, Some(pistol));
        h.device.take();

        weapon_selected(&h.ctx, &h.host, Some(shotgun));
        assert_eq!(h.device.take(), h.modded("WEAPON_SHOTGUN_SINGLESHOT"));

        // forgotten once the session ends
        level_exited(&h.ctx);
        h.in_game_with(shotgun);
        assert!(!h.ctx.tracking().weapon.as_ref().unwrap().is_modded());
    }

    #[test]
    fn test_fire_mode_of_other_weapon_is_ignored() {
        let h = Harness::new();
        let shotgun = h.host.add_weapon(0x50, "WEAPON_SHOTGUN_SINGLESHOT", Some(2));
        let pistol = h.host.add_weapon(0x10, "WEAPON_PISTOL_DEFAULT", None);
        h.in_game_with(shotgun);

        fire_mode_changed(&h.ctx, Some(pistol), 1);
        fire_mode_changed(&h.ctx, None, 1);
        assert!(h.device.commands().is_empty());
    }

    #[test]
    fn test_level_exit_goes_idle() {
        let h = Harness::new();
        let smg = h.host.add_weapon(0x20, "WEAPON_SMG_STANDARD", Some(SMG_AMMO));
        h.in_game_with(smg);

        level_exited(&h.ctx);
        assert_eq!(h.ctx.state(), GameState::Idle);
        assert_eq!(h.device.take(), neutral());

        level_exited(&h.ctx);
        assert!(h.device.commands().is_empty());
    }
}
