//! Read access to host objects.
//!
//! Every method returns `None` when the object cannot be read (null, freed,
//! unmapped); callers keep their previous state in that case.

use crate::game::{AmmoHandle, PlayerHandle, WeaponHandle};

pub trait HostAccess {
    /// Declaration name of a weapon, e.g. `WEAPON_PISTOL_DEFAULT`
    fn weapon_id(&self, weapon: WeaponHandle) -> Option<String>;

    /// Ammo type the weapon consumes; `None` for weapons without ammo
    fn weapon_ammo_type(&self, weapon: WeaponHandle) -> Option<u32>;

    fn ammo_type(&self, ammo: AmmoHandle) -> Option<u32>;

    /// Current count of an ammo pool
    fn ammo_count(&self, ammo: AmmoHandle) -> Option<i32>;

    fn is_dead(&self, player: PlayerHandle) -> Option<bool>;

    /// The player's equipped weapon, resolved from its stored entity handle
    fn current_weapon(&self, player: PlayerHandle) -> Option<WeaponHandle>;
}

#[cfg(test)]
pub mod fake {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::*;

    /// In-memory host for handler tests
    #[derive(Default)]
    pub struct FakeHost {
        pub weapons: RefCell<HashMap<WeaponHandle, (String, Option<u32>)>>,
        pub ammo: RefCell<HashMap<AmmoHandle, (u32, i32)>>,
        pub dead: RefCell<HashMap<PlayerHandle, bool>>,
        pub equipped: RefCell<HashMap<PlayerHandle, WeaponHandle>>,
    }

    impl FakeHost {
        pub fn add_weapon(&self, address: usize, id: &str, ammo_type: Option<u32>) -> WeaponHandle {
            let handle = WeaponHandle::new(address).unwrap();
            self.weapons
                .borrow_mut()
                .insert(handle, (id.to_string(), ammo_type));
            handle
        }

        pub fn add_player(&self, address: usize) -> PlayerHandle {
            let handle = PlayerHandle::new(address).unwrap();
            self.dead.borrow_mut().insert(handle, false);
            handle
        }

        pub fn set_ammo(&self, address: usize, ammo_type: u32, count: i32) -> AmmoHandle {
            let handle = AmmoHandle::new(address).unwrap();
            self.ammo.borrow_mut().insert(handle, (ammo_type, count));
            handle
        }

        pub fn set_dead(&self, player: PlayerHandle, dead: bool) {
            self.dead.borrow_mut().insert(player, dead);
        }

        pub fn equip(&self, player: PlayerHandle, weapon: WeaponHandle) {
            self.equipped.borrow_mut().insert(player, weapon);
        }

        /// Simulate the host freeing an object
        pub fn free_weapon(&self, weapon: WeaponHandle) {
            self.weapons.borrow_mut().remove(&weapon);
        }
    }

    impl HostAccess for FakeHost {
        fn weapon_id(&self, weapon: WeaponHandle) -> Option<String> {
            self.weapons.borrow().get(&weapon).map(|(id, _)| id.clone())
        }

        fn weapon_ammo_type(&self, weapon: WeaponHandle) -> Option<u32> {
            self.weapons.borrow().get(&weapon).and_then(|(_, ty)| *ty)
        }

        fn ammo_type(&self, ammo: AmmoHandle) -> Option<u32> {
            self.ammo.borrow().get(&ammo).map(|(ty, _)| *ty)
        }

        fn ammo_count(&self, ammo: AmmoHandle) -> Option<i32> {
            self.ammo.borrow().get(&ammo).map(|(_, count)| *count)
        }

        fn is_dead(&self, player: PlayerHandle) -> Option<bool> {
            self.dead.borrow().get(&player).copied()
        }

        fn current_weapon(&self, player: PlayerHandle) -> Option<WeaponHandle> {
            self.equipped.borrow().get(&player).copied()
        }
    }
}
