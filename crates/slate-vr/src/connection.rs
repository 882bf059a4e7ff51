//! Process-wide VR runtime connection: lazy creation, sticky failure
//! handling, idempotent teardown, and live device property access.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use tracing::{error, info, warn};

use crate::runtime::{
    CompositorCapability, FloatProperty, InitError, OverlayCapability, PropertyStatus,
    StringProperty, SystemCapability, VrRuntime, COMPOSITOR_INTERFACE_VERSION, HMD_DEVICE_INDEX,
    OVERLAY_INTERFACE_VERSION,
};

static GLOBAL: OnceLock<ConnectionManager> = OnceLock::new();

/// Install the process-wide manager for the given backend.
///
/// The first caller's backend wins; later calls return the manager that is
/// already installed.
pub fn install(runtime: Arc<dyn VrRuntime>) -> &'static ConnectionManager {
    GLOBAL.get_or_init(|| ConnectionManager::new(runtime))
}

/// The process-wide manager, if one has been installed.
pub fn global() -> Option<&'static ConnectionManager> {
    GLOBAL.get()
}

/// Guards at most one live [`RuntimeConnection`].
///
/// Creation is lazy and gated by an `enabled` flag: a failed creation
/// disables the manager so callers stop retrying a known-bad environment
/// until [`ConnectionManager::set_enabled`] turns it back on.
pub struct ConnectionManager {
    runtime: Arc<dyn VrRuntime>,
    enabled: AtomicBool,
    slot: Mutex<Option<Arc<RuntimeConnection>>>,
}

impl ConnectionManager {
    pub fn new(runtime: Arc<dyn VrRuntime>) -> Self {
        Self {
            runtime,
            enabled: AtomicBool::new(true),
            slot: Mutex::new(None),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<RuntimeConnection>>> {
        match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Whether a live connection currently exists, without creating one.
    pub fn active(&self) -> bool {
        self.slot().is_some()
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Gate lazy creation. Disabling disposes any live connection first;
    /// enabling never creates one by itself.
    pub fn set_enabled(&self, value: bool) {
        if !value {
            self.safe_dispose();
        }
        self.enabled.store(value, Ordering::Release);
    }

    /// The live connection, created on first use while enabled.
    ///
    /// Creation failure is reported through the log, never as a panic, and
    /// disables the manager: repeated calls return `None` without touching
    /// the runtime again until `set_enabled(true)`.
    pub fn instance(&self) -> Option<Arc<RuntimeConnection>> {
        if !self.enabled() {
            return None;
        }
        let mut slot = self.slot();
        if slot.is_none() {
            match RuntimeConnection::create(&self.runtime) {
                Ok(connection) => *slot = Some(Arc::new(connection)),
                Err(err) => {
                    error!("{err}");
                    self.enabled.store(false, Ordering::Release);
                    return None;
                }
            }
        }
        slot.clone()
    }

    /// Dispose the live connection if one exists. Never creates a connection
    /// as a side effect of checking.
    pub fn safe_dispose(&self) {
        self.dispose();
    }

    /// Idempotent teardown: empties the slot and shuts the runtime
    /// connection down at most once.
    ///
    /// Callable concurrently from the signal path and a normal shutdown
    /// path; the shutdown call itself runs outside the slot lock.
    pub fn dispose(&self) {
        let connection = self.slot().take();
        if let Some(connection) = connection {
            connection.dispose();
        }
    }
}

/// A live connection to the VR runtime with its resolved capabilities.
///
/// Constructed only through [`ConnectionManager::instance`]; a value of this
/// type means init succeeded and both required subsystem interfaces were
/// validated.
pub struct RuntimeConnection {
    runtime: Arc<dyn VrRuntime>,
    compositor: Arc<dyn CompositorCapability>,
    overlay: Arc<dyn OverlayCapability>,
    system: Arc<dyn SystemCapability>,
    render_width: u32,
    render_height: u32,
    live: AtomicBool,
}

impl RuntimeConnection {
    /// Ordered creation: init, resolve compositor, resolve overlay manager.
    /// Any failed step unwinds with a full shutdown so partial success never
    /// escapes as a half-usable connection.
    fn create(runtime: &Arc<dyn VrRuntime>) -> Result<Self, InitError> {
        if let Err(err) = runtime.init() {
            runtime.shutdown();
            return Err(err);
        }

        let compositor = match runtime.resolve_compositor(COMPOSITOR_INTERFACE_VERSION) {
            Ok(compositor) => compositor,
            Err(err) => {
                runtime.shutdown();
                return Err(err);
            }
        };

        let overlay = match runtime.resolve_overlay(OVERLAY_INTERFACE_VERSION) {
            Ok(overlay) => overlay,
            Err(err) => {
                runtime.shutdown();
                return Err(err);
            }
        };

        let system = runtime.system();
        let (render_width, render_height) = compositor.recommended_render_target_size();

        let connection = Self {
            runtime: runtime.clone(),
            compositor,
            overlay,
            system,
            render_width,
            render_height,
            live: AtomicBool::new(true),
        };
        info!(
            "connected to {}:{}",
            connection.hmd_tracking_system_name(),
            connection.hmd_serial_number()
        );
        Ok(connection)
    }

    /// Shut the runtime connection down. Idempotent; only the first call
    /// reaches the runtime. Does not allocate and does not panic, so it is
    /// safe from the interrupt-signal path.
    pub fn dispose(&self) {
        if self.live.swap(false, Ordering::AcqRel) {
            self.runtime.shutdown();
        }
    }

    pub fn compositor(&self) -> Arc<dyn CompositorCapability> {
        self.compositor.clone()
    }

    pub fn overlay(&self) -> Arc<dyn OverlayCapability> {
        self.overlay.clone()
    }

    /// Render target dimensions captured at creation.
    pub fn render_target_size(&self) -> (u32, u32) {
        (self.render_width, self.render_height)
    }

    /// Two-phase string property read for an arbitrary tracked device.
    ///
    /// Returns `None` when the device provides no value (reported capacity
    /// of 1 or less) or when the fetch phase fails.
    pub fn tracked_device_string(&self, device: u32, prop: StringProperty) -> Option<String> {
        let (capacity, _) = self.system.string_property_capacity(device, prop);
        if capacity <= 1 {
            return None;
        }
        let mut buf = vec![0u8; capacity as usize];
        let (len, status) = self.system.string_property(device, prop, &mut buf);
        if status != PropertyStatus::Success {
            warn!(
                "device {device} property {prop:?} read failed: {}",
                status.description()
            );
            return None;
        }
        Some(string_from_property(&buf[..len as usize]))
    }

    /// HMD string property. Errors are surfaced as the status code's textual
    /// description so the value stays informational rather than fatal.
    pub fn hmd_string(&self, prop: StringProperty) -> String {
        let (capacity, status) = self.system.string_property_capacity(HMD_DEVICE_INDEX, prop);
        if capacity > 1 {
            let mut buf = vec![0u8; capacity as usize];
            let (len, status) = self.system.string_property(HMD_DEVICE_INDEX, prop, &mut buf);
            if status == PropertyStatus::Success {
                return string_from_property(&buf[..len as usize]);
            }
            return status.description().to_string();
        }
        if status != PropertyStatus::Success {
            status.description().to_string()
        } else {
            "<unknown>".to_string()
        }
    }

    pub fn hmd_float(&self, prop: FloatProperty) -> f32 {
        let (value, _) = self.system.float_property(HMD_DEVICE_INDEX, prop);
        value
    }

    pub fn hmd_tracking_system_name(&self) -> String {
        self.hmd_string(StringProperty::TrackingSystemName)
    }

    pub fn hmd_model_number(&self) -> String {
        self.hmd_string(StringProperty::ModelNumber)
    }

    pub fn hmd_serial_number(&self) -> String {
        self.hmd_string(StringProperty::SerialNumber)
    }

    pub fn hmd_display_frequency(&self) -> f32 {
        self.hmd_float(FloatProperty::DisplayFrequency)
    }

    pub fn hmd_seconds_from_vsync_to_photons(&self) -> f32 {
        self.hmd_float(FloatProperty::SecondsFromVsyncToPhotons)
    }
}

impl Drop for RuntimeConnection {
    fn drop(&mut self) {
        // Backstop for connections that were never explicitly disposed.
        self.dispose();
    }
}

/// Property buffers are NUL-terminated; everything past the first NUL is
/// garbage capacity.
fn string_from_property(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
