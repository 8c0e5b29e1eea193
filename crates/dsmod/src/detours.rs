//! Replacement functions installed over the host's.
//!
//! Each detour converts its raw arguments into handles, runs the matching
//! handler under `catch_unwind`, and forwards to the original with the
//! original arguments. Host behavior is only observed, never changed.

use std::cell::Cell;
use std::ffi::c_void;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, OnceLock};

use dsmod_core::handlers;
use dsmod_core::scan::names;
use dsmod_core::{AmmoHandle, HookBinding, OriginalFn, PlayerHandle, SessionContext, WeaponHandle};
use tracing::error;

use crate::host::RawHost;

struct Runtime {
    ctx: Arc<SessionContext>,
    host: RawHost,
}

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Make the session visible to the detours. Must happen before any hook is
/// enabled; returns `false` if a session was already set.
pub fn set_runtime(ctx: Arc<SessionContext>, host: RawHost) -> bool {
    RUNTIME.set(Runtime { ctx, host }).is_ok()
}

fn observe(name: &str, handler: impl FnOnce(&SessionContext, &RawHost)) {
    let Some(runtime) = RUNTIME.get() else {
        return;
    };
    if catch_unwind(AssertUnwindSafe(|| handler(runtime.ctx.as_ref(), &runtime.host))).is_err() {
        error!("{} handler panicked, call forwarded unchanged", name);
    }
}

static WEAPON_SELECTED: OriginalFn = OriginalFn::new(names::WEAPON_SELECTED);
static SELECT_WEAPON_BY_DECL: OriginalFn = OriginalFn::new(names::SELECT_WEAPON_BY_DECL);
static AMMO_UPDATE: OriginalFn = OriginalFn::new(names::AMMO_UPDATE);
static APPLY_DAMAGE: OriginalFn = OriginalFn::new(names::APPLY_DAMAGE);
static HANDS_UPDATE: OriginalFn = OriginalFn::new(names::HANDS_UPDATE);
static LEVEL_LOADED: OriginalFn = OriginalFn::new(names::LEVEL_LOADED);
static FIRE_MODE_CHANGED: OriginalFn = OriginalFn::new(names::FIRE_MODE_CHANGED);
static PAUSE_MENU_OPENED: OriginalFn = OriginalFn::new(names::PAUSE_MENU_OPENED);
static LEVEL_EXIT: OriginalFn = OriginalFn::new(names::LEVEL_EXIT);

type WeaponSelectedFn = unsafe extern "system" fn(i32, *mut c_void);
type SelectWeaponByDeclFn = unsafe extern "system" fn(*mut c_void, *const c_void) -> *mut c_void;
type AmmoUpdateFn = unsafe extern "system" fn(*mut c_void, i32) -> i32;
type ApplyDamageFn =
    unsafe extern "system" fn(*mut c_void, *mut c_void, *mut c_void, *const c_void);
type ThisCallFn = unsafe extern "system" fn(*mut c_void);
type FireModeFn = unsafe extern "system" fn(*mut c_void, i32);

unsafe extern "system" fn weapon_selected(state: i32, weapon: *mut c_void) {
    // SAFETY: the slot was published with this function's trampoline.
    if let Some(original) = unsafe { WEAPON_SELECTED.as_fn::<WeaponSelectedFn>() } {
        unsafe { original(state, weapon) };
    }
    observe(names::WEAPON_SELECTED, |ctx, host| {
        handlers::weapon_selected(ctx, host, WeaponHandle::from_ptr(weapon))
    });
}

unsafe extern "system" fn select_weapon_by_decl(
    manager: *mut c_void,
    decl: *const c_void,
) -> *mut c_void {
    // SAFETY: as above.
    let weapon = match unsafe { SELECT_WEAPON_BY_DECL.as_fn::<SelectWeaponByDeclFn>() } {
        Some(original) => unsafe { original(manager, decl) },
        None => std::ptr::null_mut(),
    };
    observe(names::SELECT_WEAPON_BY_DECL, |ctx, host| {
        let owner = host.manager_owner(manager);
        handlers::weapon_initialized(ctx, host, owner, WeaponHandle::from_ptr(weapon))
    });
    weapon
}

unsafe extern "system" fn ammo_update(ammo: *mut c_void, delta: i32) -> i32 {
    // SAFETY: as above.
    let result = match unsafe { AMMO_UPDATE.as_fn::<AmmoUpdateFn>() } {
        Some(original) => unsafe { original(ammo, delta) },
        None => 0,
    };
    observe(names::AMMO_UPDATE, |ctx, host| {
        handlers::ammo_updated(ctx, host, AmmoHandle::from_ptr(ammo))
    });
    result
}

unsafe extern "system" fn apply_damage(
    target: *mut c_void,
    inflictor: *mut c_void,
    attacker: *mut c_void,
    decl: *const c_void,
) {
    // SAFETY: as above.
    let Some(original) = (unsafe { APPLY_DAMAGE.as_fn::<ApplyDamageFn>() }) else {
        return;
    };
    let forward = || unsafe { original(target, inflictor, attacker, decl) };

    let Some(runtime) = RUNTIME.get() else {
        forward();
        return;
    };
    let forwarded = Cell::new(false);
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        handlers::damage_applied(&runtime.ctx, &runtime.host, || {
            forwarded.set(true);
            forward()
        })
    }));
    if outcome.is_err() {
        error!("{} handler panicked", names::APPLY_DAMAGE);
        if !forwarded.get() {
            forward();
        }
    }
}

unsafe extern "system" fn hands_update(hands: *mut c_void) {
    observe(names::HANDS_UPDATE, |ctx, host| {
        handlers::hands_updated(ctx, host, host.hands_owner(hands))
    });
    // SAFETY: as above.
    if let Some(original) = unsafe { HANDS_UPDATE.as_fn::<ThisCallFn>() } {
        unsafe { original(hands) };
    }
}

unsafe extern "system" fn level_loaded(player: *mut c_void) {
    // SAFETY: as above.
    if let Some(original) = unsafe { LEVEL_LOADED.as_fn::<ThisCallFn>() } {
        unsafe { original(player) };
    }
    observe(names::LEVEL_LOADED, |ctx, host| {
        handlers::level_loaded(ctx, host, PlayerHandle::from_ptr(player))
    });
}

unsafe extern "system" fn fire_mode_changed(weapon: *mut c_void, mode: i32) {
    // SAFETY: as above.
    if let Some(original) = unsafe { FIRE_MODE_CHANGED.as_fn::<FireModeFn>() } {
        unsafe { original(weapon, mode) };
    }
    observe(names::FIRE_MODE_CHANGED, |ctx, _| {
        handlers::fire_mode_changed(ctx, WeaponHandle::from_ptr(weapon), mode)
    });
}

unsafe extern "system" fn pause_menu_opened(menu: *mut c_void) {
    observe(names::PAUSE_MENU_OPENED, |ctx, _| handlers::pause_signaled(ctx));
    // SAFETY: as above.
    if let Some(original) = unsafe { PAUSE_MENU_OPENED.as_fn::<ThisCallFn>() } {
        unsafe { original(menu) };
    }
}

unsafe extern "system" fn level_exit(game: *mut c_void) {
    observe(names::LEVEL_EXIT, |ctx, _| handlers::level_exited(ctx));
    // SAFETY: as above.
    if let Some(original) = unsafe { LEVEL_EXIT.as_fn::<ThisCallFn>() } {
        unsafe { original(game) };
    }
}

/// Every hook the mod installs, paired with its original slot
pub fn bindings() -> Vec<HookBinding> {
    vec![
        HookBinding::new(&WEAPON_SELECTED, weapon_selected as usize),
        HookBinding::new(&SELECT_WEAPON_BY_DECL, select_weapon_by_decl as usize),
        HookBinding::new(&AMMO_UPDATE, ammo_update as usize),
        HookBinding::new(&APPLY_DAMAGE, apply_damage as usize),
        HookBinding::new(&HANDS_UPDATE, hands_update as usize),
        HookBinding::new(&LEVEL_LOADED, level_loaded as usize),
        HookBinding::new(&FIRE_MODE_CHANGED, fire_mode_changed as usize),
        HookBinding::new(&PAUSE_MENU_OPENED, pause_menu_opened as usize),
        HookBinding::new(&LEVEL_EXIT, level_exit as usize),
    ]
}
