//! Signatures for the supported host build
//!
//! Every pattern is tied to one executable revision. A mismatching build is
//! detected by the registry gate, never patched partially. Users can point
//! the config at a JSON override produced by `dsmod-check signatures`.

use crate::scan::signature::{FunctionSignature, SignatureSet};

/// Host build these signatures were taken from
pub const BUILTIN_VERSION: &str = "DOOMx64vk 20191002-1";

/// Names of the host functions the mod resolves
pub mod names {
    /// Runtime weapon switch: `(i32 component_state, idWeapon* weapon)`
    pub const WEAPON_SELECTED: &str = "OnWeaponSelected";
    /// Explicit-decl select: `(idWeaponManager* mgr, const idDeclWeapon* decl) -> idWeapon*`
    pub const SELECT_WEAPON_BY_DECL: &str = "SelectWeaponByDecl";
    /// Ammo pool update: `(idAmmo* ammo, i32 delta) -> i32`
    pub const AMMO_UPDATE: &str = "UpdateAmmo";
    /// Damage application: `(idEntity* target, idEntity* inflictor, idEntity* attacker, const idDeclDamage* decl)`
    pub const APPLY_DAMAGE: &str = "ApplyDamage";
    /// Per-frame first-person hands think: `(idPlayerHands* hands)`
    pub const HANDS_UPDATE: &str = "idHandsUpdate";
    /// End of map load: `(idPlayer* player)`
    pub const LEVEL_LOADED: &str = "OnLevelLoadComplete";
    /// Weapon fire-mode toggle: `(idWeapon* weapon, i32 mode)`
    pub const FIRE_MODE_CHANGED: &str = "SetActiveFireMode";
    /// In-game pause menu opened: `(idMenu* menu)`
    pub const PAUSE_MENU_OPENED: &str = "OnPauseMenuOpened";
    /// Map teardown: `(idGameLocal* game)`
    pub const LEVEL_EXIT: &str = "OnLevelExit";
    /// Entity handle → pointer lookup, called but never hooked: `(u32 handle) -> idEntity*`
    pub const HANDLE_TO_POINTER: &str = "EntityHandleToPointer";
}

pub fn builtin_signatures() -> SignatureSet {
    use names::*;

    SignatureSet {
        version: BUILTIN_VERSION.to_string(),
        entries: vec![
            FunctionSignature::pattern(
                WEAPON_SELECTED,
                "48 85 D2 74 ? 48 89 74 24 10 57 48 83 EC 20 83 3D ? ? ? ? 00 48 8B FA 48 8B F1 74 ?",
            ),
            FunctionSignature::pattern(
                SELECT_WEAPON_BY_DECL,
                "48 89 5C 24 08 57 48 83 EC 20 48 8B FA 48 8B D9 48 85 D2 0F 84 ? ? ? ? 8B 42 ? 85 C0",
            ),
            FunctionSignature::pattern(
                AMMO_UPDATE,
                "40 53 48 83 EC 20 8B 41 ? 48 8B D9 03 C2 89 41 ? 79 ? C7 41 ? 00 00 00 00",
            ),
            FunctionSignature::pattern(
                APPLY_DAMAGE,
                "48 8B C4 55 41 54 41 55 41 56 41 57 48 8D 68 ? 48 81 EC ? ? ? ? 48 89 58 ? 4D 8B E1",
            ),
            FunctionSignature::pattern(
                HANDS_UPDATE,
                "40 55 56 57 48 8D 6C 24 ? 48 81 EC ? ? ? ? 48 8B F9 E8 ? ? ? ? 48 8B 8F ? ? ? ?",
            ),
            FunctionSignature::pattern(
                LEVEL_LOADED,
                "48 89 5C 24 10 48 89 74 24 18 57 48 83 EC 30 48 8B F9 E8 ? ? ? ? 48 8B 0D ? ? ? ? 33 F6",
            ),
            FunctionSignature::pattern(
                FIRE_MODE_CHANGED,
                "48 89 5C 24 08 57 48 83 EC 20 8B FA 48 8B D9 3B 91 ? ? ? ? 74 ? 89 91",
            ),
            FunctionSignature::pattern(
                PAUSE_MENU_OPENED,
                "40 53 48 83 EC 20 48 8B D9 C6 81 ? ? ? ? 01 48 8B 0D ? ? ? ? 48 85 C9 74 ?",
            ),
            FunctionSignature::pattern(
                LEVEL_EXIT,
                "48 89 5C 24 08 48 89 6C 24 10 48 89 74 24 18 57 48 83 EC 20 48 8B F1 33 ED 48 8B 89",
            ),
            FunctionSignature::pattern(
                HANDLE_TO_POINTER,
                "83 F9 FF 74 ? 8B C1 25 FF 1F 00 00 48 8D 0C 40 48 8B 05 ? ? ? ? 48 8D 04 C8",
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_builtin_patterns_parse() {
        for entry in builtin_signatures().entries {
            assert!(entry.pattern_bytes().unwrap().is_some(), "{}", entry.name);
        }
    }

    #[test]
    fn test_builtin_names_unique() {
        let set = builtin_signatures();
        let unique: HashSet<_> = set.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(unique.len(), set.entries.len());
        assert!(set.entry(names::HANDLE_TO_POINTER).is_some());
    }
}
