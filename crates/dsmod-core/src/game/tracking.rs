use std::collections::HashMap;

use crate::game::{AmmoHandle, PlayerHandle, WeaponHandle};

/// Fire mode a weapon starts in after being selected
pub const PRIMARY_FIRE_MODE: i32 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedWeapon {
    pub handle: WeaponHandle,
    pub id: String,
    pub ammo_type: Option<u32>,
    /// Last fire mode seen for this weapon, `None` until the first change
    pub fire_mode: Option<i32>,
}

impl TrackedWeapon {
    pub fn new(handle: WeaponHandle, id: impl Into<String>, ammo_type: Option<u32>) -> Self {
        Self {
            handle,
            id: id.into(),
            ammo_type,
            fire_mode: None,
        }
    }

    /// Whether the weapon's alternate ("mod") fire mode is active
    pub fn is_modded(&self) -> bool {
        self.fire_mode.is_some_and(|mode| mode != PRIMARY_FIRE_MODE)
    }
}

/// Identity of the last profile sent to the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchKey {
    Neutral,
    NoAmmo,
    Weapon { id: String, modded: bool },
}

/// Compound session tracking guarded by the context's lock
#[derive(Debug, Default)]
pub struct Tracking {
    pub player: Option<PlayerHandle>,
    /// Set once a weapon grant has named the player in the current Idle period
    pub player_captured: bool,
    pub weapon: Option<TrackedWeapon>,
    /// Last fire mode seen per weapon, so a mod survives switching away
    pub fire_modes: HashMap<WeaponHandle, i32>,
    /// Ammo type → host ammo object, learned lazily per session
    pub ammo_pointers: HashMap<u32, AmmoHandle>,
    pub has_ammo: HashMap<AmmoHandle, bool>,
    pub last_dispatch: Option<DispatchKey>,
}

impl Tracking {
    /// Sufficiency of the current weapon's ammo, if it has been observed.
    pub fn current_has_ammo(&self) -> Option<bool> {
        let ammo_type = self.weapon.as_ref()?.ammo_type?;
        let ammo = self.ammo_pointers.get(&ammo_type)?;
        self.has_ammo.get(ammo).copied()
    }

    /// Make `weapon` current, restoring the fire mode it was last seen in.
    pub fn select(&mut self, mut weapon: TrackedWeapon) {
        weapon.fire_mode = self.fire_modes.get(&weapon.handle).copied();
        self.weapon = Some(weapon);
    }

    /// Reset applied on every transition into Idle. The player is dropped as
    /// well; the next weapon grant, heartbeat or level load names it again.
    pub fn clear(&mut self) {
        self.player = None;
        self.player_captured = false;
        self.weapon = None;
        self.fire_modes.clear();
        self.ammo_pointers.clear();
        self.has_ammo.clear();
    }
}
