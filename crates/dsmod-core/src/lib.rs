//! # dsmod-core
//!
//! Platform-independent engine of the DualSense adaptive-trigger mod.
//!
//! This crate provides:
//! - Signature scanning over a loaded or file-mapped PE image
//! - The all-or-nothing function registry and hook installer
//! - Gameplay state inference (state machine, session context, pause watcher)
//! - Interception handler logic, driven through the [`HostAccess`] boundary
//! - Trigger profiles and the non-blocking device queue

pub mod config;
pub mod error;
pub mod game;
pub mod handlers;
pub mod heartbeat;
pub mod hook;
pub mod host;
pub mod scan;
pub mod session;
pub mod shutdown;
pub mod trigger;

pub use config::{CONFIG_PATH, Config};
pub use error::{Error, Result};
pub use game::{
    AmmoHandle, DispatchKey, Effect, GameEvent, GameState, PlayerHandle, TrackedWeapon, Tracking,
    Transition, WeaponHandle, transition,
};
pub use heartbeat::PauseWatcher;
pub use hook::{BackendError, HookBackend, HookBinding, HookInstaller, OriginalFn};
pub use host::HostAccess;
pub use scan::{
    BUILTIN_VERSION, FunctionRegistry, FunctionSignature, Locator, Pattern, ResolvedFunction,
    ScanReport, SignatureScanner, SignatureSet, builtin_signatures, load_signatures,
    save_signatures,
};
pub use session::{Clock, MonotonicClock, SessionContext};
pub use shutdown::ShutdownSignal;
pub use trigger::{
    CommandSink, ProfileTable, QueuedDevice, TriggerCommand, TriggerDevice, TriggerEffect,
    TriggerMode, TriggerPair, TriggerProfile, TriggerSide, UdpSink, WeaponProfile,
};
