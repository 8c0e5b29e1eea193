//! Memory layout constants for DOOM host objects
//!
//! All offsets were taken from `DOOMx64vk.exe` build 20191002-1 and must be
//! re-verified together with the signatures whenever the build changes.
//! They are only ever read through [`crate::host::RawHost`], which checks
//! every address before dereferencing it.
//!
//! # Object Graph
//!
//! ```text
//! idPlayerHands ──owner──▶ idPlayer ──weapon handle──▶ (EntityHandleToPointer) ──▶ idWeapon
//! idWeaponManager ──owner──▶ idPlayer                                              │
//!                                                                    decl ◀───────┘
//! idAmmo { type, count }                                     idDeclWeapon { name }
//! ```

/// Pointer size on x64
pub const QWORD: usize = 8;

/// Entity handle value the host uses for "no entity"
pub const INVALID_ENTITY_HANDLE: u32 = 0xFFFF_FFFF;

/// Ammo type id stored in weapons that consume nothing
pub const NO_AMMO_TYPE: i32 = -1;

/// Longest declaration name read from host memory
pub const MAX_DECL_NAME: usize = 128;

/// `idPlayer`
///
/// ```text
/// Offset   Field               Size    Description
/// ──────────────────────────────────────────────────────
/// 0x000    vtable              8       idPlayer vftable
/// 0x1E58   currentWeapon       4       entity handle of the equipped idWeapon
/// ```
pub mod player {
    pub const CURRENT_WEAPON_HANDLE: usize = 0x1E58;

    /// vtable slot of `bool idPlayer::IsDead() const`
    pub const IS_DEAD_SLOT: usize = 47;
}

/// `idWeapon`
///
/// ```text
/// Offset   Field               Size    Description
/// ──────────────────────────────────────────────────────
/// 0x030    decl                8       const idDeclWeapon*
/// 0x1A8    ammoType            4       ammo type id, -1 for none
/// ```
pub mod weapon {
    pub const DECL: usize = 0x30;
    pub const AMMO_TYPE: usize = 0x1A8;
}

/// `idDeclWeapon`
pub mod decl {
    /// `const char*` declaration name, e.g. `WEAPON_PISTOL_DEFAULT`
    pub const NAME: usize = super::QWORD;
}

/// Ammo pool object passed to `UpdateAmmo`
///
/// ```text
/// Offset   Field               Size    Description
/// ──────────────────────────────────────────────────────
/// 0x10     type                4       ammo type id
/// 0x14     count               4       current count, already updated on return
/// ```
pub mod ammo {
    pub const TYPE: usize = 0x10;
    pub const COUNT: usize = 0x14;
}

/// `idPlayerHands`
pub mod hands {
    /// Owning `idPlayer*`
    pub const OWNER: usize = 0x1F0;
}

/// `idWeaponManager`
pub mod weapon_manager {
    /// Owning `idPlayer*`
    pub const OWNER: usize = 0x18;
}
