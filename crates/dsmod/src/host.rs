//! Checked access to live host objects.
//!
//! This is the only place that dereferences host memory. Every read first
//! asks `VirtualQuery` whether the bytes are committed and readable, so a
//! stale handle yields `None` instead of an access violation.

use std::ffi::{CStr, c_void};
use std::mem::size_of;
use std::ops::Range;

use dsmod_core::{AmmoHandle, HostAccess, PlayerHandle, WeaponHandle};
use windows::Win32::System::Memory::{
    MEM_COMMIT, MEMORY_BASIC_INFORMATION, PAGE_EXECUTE, PAGE_EXECUTE_READ,
    PAGE_EXECUTE_READWRITE, PAGE_EXECUTE_WRITECOPY, PAGE_GUARD, PAGE_NOACCESS, VirtualQuery,
};

use crate::layout::{self, ammo, decl, hands, player, weapon, weapon_manager};

/// Addresses below this are never valid objects
const MIN_ADDRESS: usize = 0x10000;

type HandleToPointerFn = unsafe extern "system" fn(u32) -> *mut c_void;
type IsDeadFn = unsafe extern "system" fn(*const c_void) -> bool;

/// Committed region holding `address`, if any.
fn query(address: usize) -> Option<MEMORY_BASIC_INFORMATION> {
    if address < MIN_ADDRESS {
        return None;
    }
    let mut info = MEMORY_BASIC_INFORMATION::default();
    // SAFETY: VirtualQuery only inspects the address space; `info` is a valid out buffer.
    let written = unsafe {
        VirtualQuery(
            Some(address as *const c_void),
            &mut info,
            size_of::<MEMORY_BASIC_INFORMATION>(),
        )
    };
    let accessible = info.Protect.0 != 0 && info.Protect.0 & (PAGE_NOACCESS.0 | PAGE_GUARD.0) == 0;
    (written != 0 && info.State == MEM_COMMIT && accessible).then_some(info)
}

/// Number of readable bytes starting at `address`, up to the end of its
/// memory region.
fn readable_len(address: usize) -> usize {
    query(address).map_or(0, |info| {
        let end = info.BaseAddress as usize + info.RegionSize;
        end.saturating_sub(address)
    })
}

fn is_executable(address: usize) -> bool {
    let execute =
        PAGE_EXECUTE.0 | PAGE_EXECUTE_READ.0 | PAGE_EXECUTE_READWRITE.0 | PAGE_EXECUTE_WRITECOPY.0;
    query(address).is_some_and(|info| info.Protect.0 & execute != 0)
}

fn is_readable(address: usize, len: usize) -> bool {
    readable_len(address) >= len
}

fn read<T: Copy>(address: usize) -> Option<T> {
    // SAFETY: the range was just checked to be committed and readable.
    is_readable(address, size_of::<T>())
        .then(|| unsafe { std::ptr::read_unaligned(address as *const T) })
}

fn read_ptr(address: usize) -> Option<usize> {
    read::<usize>(address).filter(|&p| p != 0)
}

fn read_c_string(address: usize, max: usize) -> Option<String> {
    let len = readable_len(address).min(max);
    if len == 0 {
        return None;
    }
    // SAFETY: `len` bytes from `address` lie in one readable region.
    let bytes = unsafe { std::slice::from_raw_parts(address as *const u8, len) };
    let name = CStr::from_bytes_until_nul(bytes).ok()?;
    let name = name.to_str().ok()?;
    (!name.is_empty()).then(|| name.to_string())
}

/// Host accessor for the running game
pub struct RawHost {
    handle_to_pointer: HandleToPointerFn,
    /// Address range of the game image; virtual calls never leave it
    image: Range<usize>,
}

impl RawHost {
    /// # Safety
    /// `handle_to_pointer` must be the address of the host's entity handle
    /// lookup function, and `image` the mapped range of the game module.
    pub unsafe fn new(handle_to_pointer: usize, image: Range<usize>) -> Self {
        // SAFETY: guaranteed by the caller.
        let handle_to_pointer =
            unsafe { std::mem::transmute::<usize, HandleToPointerFn>(handle_to_pointer) };
        Self {
            handle_to_pointer,
            image,
        }
    }

    /// Owner of a hands object passed to the per-frame update
    pub fn hands_owner(&self, hands: *const c_void) -> Option<PlayerHandle> {
        let hands = hands as usize;
        (hands != 0)
            .then(|| read_ptr(hands + hands::OWNER))
            .flatten()
            .and_then(PlayerHandle::new)
    }

    /// Owner of a weapon manager passed to the declaration select
    pub fn manager_owner(&self, manager: *const c_void) -> Option<PlayerHandle> {
        let manager = manager as usize;
        (manager != 0)
            .then(|| read_ptr(manager + weapon_manager::OWNER))
            .flatten()
            .and_then(PlayerHandle::new)
    }

    /// Target of a virtual call, only if both the vtable and the function
    /// live in the game image and the function's page is executable.
    fn vtable_slot(&self, object: usize, slot: usize) -> Option<usize> {
        let vtable = read_ptr(object).filter(|v| self.image.contains(v))?;
        let function = read_ptr(vtable + slot * layout::QWORD)?;
        (self.image.contains(&function) && is_executable(function)).then_some(function)
    }
}

impl HostAccess for RawHost {
    fn weapon_id(&self, weapon: WeaponHandle) -> Option<String> {
        let decl = read_ptr(weapon.address() + weapon::DECL)?;
        let name = read_ptr(decl + decl::NAME)?;
        read_c_string(name, layout::MAX_DECL_NAME)
    }

    fn weapon_ammo_type(&self, weapon: WeaponHandle) -> Option<u32> {
        let ammo_type = read::<i32>(weapon.address() + weapon::AMMO_TYPE)?;
        if ammo_type == layout::NO_AMMO_TYPE {
            return None;
        }
        u32::try_from(ammo_type).ok()
    }

    fn ammo_type(&self, ammo: AmmoHandle) -> Option<u32> {
        let ammo_type = read::<i32>(ammo.address() + ammo::TYPE)?;
        u32::try_from(ammo_type).ok()
    }

    fn ammo_count(&self, ammo: AmmoHandle) -> Option<i32> {
        read::<i32>(ammo.address() + ammo::COUNT)
    }

    fn is_dead(&self, player: PlayerHandle) -> Option<bool> {
        let function = self.vtable_slot(player.address(), player::IS_DEAD_SLOT)?;
        // SAFETY: slot layout is fixed for the supported build and the target is
        // executable code inside the game image.
        let is_dead = unsafe { std::mem::transmute::<usize, IsDeadFn>(function) };
        Some(unsafe { is_dead(player.address() as *const c_void) })
    }

    fn current_weapon(&self, player: PlayerHandle) -> Option<WeaponHandle> {
        let handle = read::<u32>(player.address() + player::CURRENT_WEAPON_HANDLE)?;
        if handle == layout::INVALID_ENTITY_HANDLE {
            return None;
        }
        // SAFETY: the lookup takes any handle value and returns null for unknown ones.
        let entity = unsafe { (self.handle_to_pointer)(handle) };
        WeaponHandle::from_ptr(entity)
    }
}
