//! # dsmod
//!
//! DualSense adaptive-trigger mod for DOOM, loaded into the game process.
//!
//! On attach a worker thread scans the game module for the functions the
//! mod observes, refuses to continue if any is missing, hooks them all, and
//! starts the pause watcher and the helper service.

pub mod layout;
pub mod logging;
pub mod service;

#[cfg(target_os = "windows")]
mod backend;
#[cfg(target_os = "windows")]
mod detours;
#[cfg(target_os = "windows")]
mod host;
#[cfg(target_os = "windows")]
mod module;

#[cfg(target_os = "windows")]
mod windows_main {
    use std::ffi::c_void;
    use std::path::Path;
    use std::sync::{Arc, OnceLock};
    use std::thread;

    use anyhow::{Context, Result, bail};
    use dsmod_core::scan::names;
    use dsmod_core::{
        CONFIG_PATH, Config, FunctionRegistry, HookInstaller, PauseWatcher, ProfileTable,
        QueuedDevice, SessionContext, ShutdownSignal, UdpSink, builtin_signatures,
        load_signatures,
    };
    use tracing::{error, info, warn};
    use windows::Win32::Foundation::{BOOL, HINSTANCE, HWND};
    use windows::Win32::System::SystemServices::{DLL_PROCESS_ATTACH, DLL_PROCESS_DETACH};
    use windows::Win32::UI::WindowsAndMessaging::{MB_ICONEXCLAMATION, MB_OK, MessageBoxW};
    use windows::core::HSTRING;

    use crate::backend::RetourBackend;
    use crate::detours;
    use crate::host::RawHost;
    use crate::logging;
    use crate::module::MainModule;
    use crate::service;

    const INCOMPATIBLE_NOTICE: &str = "DualsenseMod is not compatible with this version of DOOM (2016).\nPlease visit the mod page for updates.";

    static SHUTDOWN: OnceLock<Arc<ShutdownSignal>> = OnceLock::new();

    fn show_incompatible_notice() {
        // SAFETY: plain modal message box without an owner window.
        unsafe {
            MessageBoxW(
                HWND::default(),
                &HSTRING::from(INCOMPATIBLE_NOTICE),
                &HSTRING::from("DualsenseMod"),
                MB_OK | MB_ICONEXCLAMATION,
            );
        }
    }

    fn load_profiles(config: &Config) -> ProfileTable {
        let Some(path) = &config.profiles else {
            return ProfileTable::builtin();
        };
        match ProfileTable::load(path) {
            Ok(table) => {
                info!("Loaded trigger profiles from {}", path.display());
                table
            }
            Err(e) => {
                warn!("Failed to load profiles from {}: {}, using builtin", path.display(), e);
                ProfileTable::builtin()
            }
        }
    }

    fn init() -> Result<()> {
        let log_level = logging::init(Path::new(logging::LOG_PATH))?;
        logging::set_panic_hook();

        info!("DOOM (2016) DualsenseMod v{}", env!("CARGO_PKG_VERSION"));
        let config = Config::load_or_default(CONFIG_PATH);
        log_level.set_debug(config.debug)?;
        let module = MainModule::current()?;
        info!("Module base: {:#x}", module.base());
        config.print();

        let signatures = match &config.signatures {
            Some(path) => load_signatures(path)
                .with_context(|| format!("Failed to load signatures from {}", path.display()))?,
            None => builtin_signatures(),
        };
        info!("Signature set: {}", signatures.version);

        let mut registry = FunctionRegistry::from_set(&signatures)?;
        info!("Sigscan start");
        registry.resolve_all(&module.scanner());
        if let Err(e) = registry.ensure_all_resolved() {
            if e.is_incompatible_host() {
                error!("FATAL: Incompatible version");
                show_incompatible_notice();
            }
            return Err(e.into());
        }
        info!("Addresses set");

        let shutdown = Arc::clone(SHUTDOWN.get_or_init(|| Arc::new(ShutdownSignal::new())));
        let (device, _worker) = QueuedDevice::spawn(UdpSink::connect(config.service_port)?)?;
        let ctx = Arc::new(SessionContext::new(load_profiles(&config), Box::new(device)));

        let handle_to_pointer = registry
            .address(names::HANDLE_TO_POINTER)
            .context("Entity handle lookup was not resolved")?;
        // SAFETY: resolved from the handle lookup signature of this build.
        let host = unsafe { RawHost::new(handle_to_pointer as usize, module.image_range()) };
        if !detours::set_runtime(Arc::clone(&ctx), host) {
            bail!("DualsenseMod is already initialized");
        }

        let mut installer = HookInstaller::new(RetourBackend::new());
        // SAFETY: every target resolved from this build's signatures and every
        // detour mirrors its target's signature.
        unsafe { installer.install_all(&mut registry, &detours::bindings()) }?;
        // Hooks stay in place until the process exits.
        Box::leak(Box::new(installer.into_backend()));

        PauseWatcher::new(config.pause_threshold, config.poll_interval)
            .spawn(ctx, Arc::clone(&shutdown))?;
        if config.launch_service {
            service::spawn_launcher(config.service_path.clone(), config.service_port, shutdown)?;
        }

        info!("Ready.");
        Ok(())
    }

    #[unsafe(no_mangle)]
    unsafe extern "system" fn DllMain(_: HINSTANCE, reason: u32, _: *mut c_void) -> BOOL {
        match reason {
            DLL_PROCESS_ATTACH => {
                let spawned = thread::Builder::new()
                    .name("dsmod-init".to_string())
                    .spawn(|| {
                        if let Err(e) = init() {
                            error!("Initialization failed: {:#}", e);
                        }
                    });
                if spawned.is_err() {
                    return false.into();
                }
            }
            DLL_PROCESS_DETACH => {
                if let Some(shutdown) = SHUTDOWN.get() {
                    shutdown.trigger();
                }
            }
            _ => {}
        }
        true.into()
    }
}
