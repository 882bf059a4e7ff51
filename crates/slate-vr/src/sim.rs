//! In-memory runtime backend.
//!
//! Backs the `sim` backend of the host binary and the test suite: init and
//! capability failures are scriptable, dashboard visibility can be toggled,
//! and every call that reaches the "runtime" is recorded as a [`SimEvent`].

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::runtime::{
    CompositorCapability, FloatProperty, InitError, InputMethod, OverlayCapability, OverlayError,
    OverlayId, PropertyStatus, StringProperty, SystemCapability, VrRuntime, HMD_DEVICE_INDEX,
    MAX_TRACKED_DEVICE_COUNT,
};

const SIM_RENDER_TARGET: (u32, u32) = (1920, 1080);

/// A call that reached the simulated runtime, in order of arrival.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    Init,
    Shutdown,
    ResolveCompositor { version: String },
    ResolveOverlay { version: String },
    CreateOverlay { key: String, name: String },
    SetImage { overlay: OverlayId, path: PathBuf },
    SetWidth { overlay: OverlayId, meters: f32 },
    SetInputMethod { overlay: OverlayId, method: InputMethod },
    VisibilityQuery { overlay: OverlayId, visible: bool },
    DestroyOverlay { overlay: OverlayId },
}

struct OverlayEntry {
    key: String,
    thumbnail: OverlayId,
}

#[derive(Default)]
struct SimState {
    events: Vec<SimEvent>,
    init_calls: usize,
    shutdown_calls: usize,
    init_failure: Option<InitError>,
    compositor_failure: Option<InitError>,
    overlay_failure: Option<InitError>,
    fail_image_sets: bool,
    fail_visibility: bool,
    visible: bool,
    next_handle: u64,
    overlays: HashMap<OverlayId, OverlayEntry>,
    alive: HashSet<OverlayId>,
    strings: HashMap<(u32, StringProperty), String>,
    floats: HashMap<(u32, FloatProperty), f32>,
}

/// Simulated VR runtime. Cheap to construct per test; share it via `Arc` so
/// the scripted state is visible to the capabilities it hands out.
pub struct SimRuntime {
    state: Arc<Mutex<SimState>>,
}

fn lock(state: &Arc<Mutex<SimState>>) -> MutexGuard<'_, SimState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl SimRuntime {
    /// An empty runtime with no tracked devices.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Arc::new(Mutex::new(SimState {
                next_handle: 1,
                ..SimState::default()
            })),
        })
    }

    /// A runtime with a plausible HMD property table already in place.
    pub fn headset() -> Arc<Self> {
        let sim = Self::new();
        sim.set_string_property(HMD_DEVICE_INDEX, StringProperty::TrackingSystemName, "sim");
        sim.set_string_property(
            HMD_DEVICE_INDEX,
            StringProperty::ModelNumber,
            "Slate Sim HMD",
        );
        sim.set_string_property(HMD_DEVICE_INDEX, StringProperty::SerialNumber, "SIM-0001");
        sim.set_float_property(HMD_DEVICE_INDEX, FloatProperty::DisplayFrequency, 90.0);
        sim.set_float_property(
            HMD_DEVICE_INDEX,
            FloatProperty::SecondsFromVsyncToPhotons,
            0.011,
        );
        sim
    }

    // Scripting -----------------------------------------------------------

    /// Make the next `init` fail with `err`.
    pub fn fail_init(&self, err: InitError) {
        lock(&self.state).init_failure = Some(err);
    }

    /// Make compositor resolution fail with `err`.
    pub fn fail_resolve_compositor(&self, err: InitError) {
        lock(&self.state).compositor_failure = Some(err);
    }

    /// Make overlay-manager resolution fail with `err`.
    pub fn fail_resolve_overlay(&self, err: InitError) {
        lock(&self.state).overlay_failure = Some(err);
    }

    /// Clear all scripted failures.
    pub fn clear_failures(&self) {
        let mut state = lock(&self.state);
        state.init_failure = None;
        state.compositor_failure = None;
        state.overlay_failure = None;
        state.fail_image_sets = false;
        state.fail_visibility = false;
    }

    pub fn fail_image_sets(&self, fail: bool) {
        lock(&self.state).fail_image_sets = fail;
    }

    pub fn fail_visibility(&self, fail: bool) {
        lock(&self.state).fail_visibility = fail;
    }

    /// Toggle dashboard visibility for every overlay.
    pub fn set_visible(&self, visible: bool) {
        lock(&self.state).visible = visible;
    }

    pub fn set_string_property(&self, device: u32, prop: StringProperty, value: &str) {
        lock(&self.state)
            .strings
            .insert((device, prop), value.to_string());
    }

    pub fn set_float_property(&self, device: u32, prop: FloatProperty, value: f32) {
        lock(&self.state).floats.insert((device, prop), value);
    }

    // Inspection ----------------------------------------------------------

    /// Every call that reached the runtime so far, in order.
    pub fn events(&self) -> Vec<SimEvent> {
        lock(&self.state).events.clone()
    }

    pub fn init_calls(&self) -> usize {
        lock(&self.state).init_calls
    }

    pub fn shutdown_calls(&self) -> usize {
        lock(&self.state).shutdown_calls
    }

    pub fn overlay_alive(&self, overlay: OverlayId) -> bool {
        lock(&self.state).alive.contains(&overlay)
    }

    /// Image paths set on `overlay`, in order.
    pub fn image_sets_for(&self, overlay: OverlayId) -> Vec<PathBuf> {
        lock(&self.state)
            .events
            .iter()
            .filter_map(|event| match event {
                SimEvent::SetImage { overlay: id, path } if *id == overlay => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    /// Direct access to the overlay capability, bypassing the connection.
    pub fn overlay_capability(&self) -> Arc<dyn OverlayCapability> {
        Arc::new(SimOverlayManager {
            state: self.state.clone(),
        })
    }

    /// Direct access to the system capability, bypassing the connection.
    pub fn system_capability(&self) -> Arc<dyn SystemCapability> {
        Arc::new(SimSystem {
            state: self.state.clone(),
        })
    }
}

impl VrRuntime for SimRuntime {
    fn init(&self) -> Result<(), InitError> {
        let mut state = lock(&self.state);
        state.init_calls += 1;
        state.events.push(SimEvent::Init);
        match state.init_failure.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn shutdown(&self) {
        let mut state = lock(&self.state);
        state.shutdown_calls += 1;
        state.events.push(SimEvent::Shutdown);
    }

    fn resolve_compositor(
        &self,
        version: &str,
    ) -> Result<Arc<dyn CompositorCapability>, InitError> {
        let mut state = lock(&self.state);
        state.events.push(SimEvent::ResolveCompositor {
            version: version.to_string(),
        });
        if let Some(err) = state.compositor_failure.clone() {
            return Err(err);
        }
        Ok(Arc::new(SimCompositor))
    }

    fn resolve_overlay(&self, version: &str) -> Result<Arc<dyn OverlayCapability>, InitError> {
        let mut state = lock(&self.state);
        state.events.push(SimEvent::ResolveOverlay {
            version: version.to_string(),
        });
        if let Some(err) = state.overlay_failure.clone() {
            return Err(err);
        }
        Ok(Arc::new(SimOverlayManager {
            state: self.state.clone(),
        }))
    }

    fn system(&self) -> Arc<dyn SystemCapability> {
        Arc::new(SimSystem {
            state: self.state.clone(),
        })
    }
}

struct SimCompositor;

impl CompositorCapability for SimCompositor {
    fn recommended_render_target_size(&self) -> (u32, u32) {
        SIM_RENDER_TARGET
    }
}

struct SimOverlayManager {
    state: Arc<Mutex<SimState>>,
}

impl OverlayCapability for SimOverlayManager {
    fn create_dashboard_overlay(
        &self,
        key: &str,
        name: &str,
    ) -> Result<(OverlayId, OverlayId), OverlayError> {
        let mut state = lock(&self.state);
        if state.overlays.values().any(|entry| entry.key == key) {
            return Err(OverlayError::KeyInUse(key.to_string()));
        }
        let handle = OverlayId(state.next_handle);
        let thumbnail = OverlayId(state.next_handle + 1);
        state.next_handle += 2;
        state.overlays.insert(
            handle,
            OverlayEntry {
                key: key.to_string(),
                thumbnail,
            },
        );
        state.alive.insert(handle);
        state.alive.insert(thumbnail);
        state.events.push(SimEvent::CreateOverlay {
            key: key.to_string(),
            name: name.to_string(),
        });
        debug!("sim: created dashboard overlay {key:?} as {handle}");
        Ok((handle, thumbnail))
    }

    fn set_image_file(&self, overlay: OverlayId, path: &Path) -> Result<(), OverlayError> {
        let mut state = lock(&self.state);
        if !state.alive.contains(&overlay) {
            return Err(OverlayError::InvalidHandle(overlay));
        }
        if state.fail_image_sets {
            return Err(OverlayError::Backend("scripted image-set failure".into()));
        }
        state.events.push(SimEvent::SetImage {
            overlay,
            path: path.to_path_buf(),
        });
        debug!("sim: overlay {overlay} now shows {}", path.display());
        Ok(())
    }

    fn set_width_meters(&self, overlay: OverlayId, meters: f32) -> Result<(), OverlayError> {
        let mut state = lock(&self.state);
        if !state.alive.contains(&overlay) {
            return Err(OverlayError::InvalidHandle(overlay));
        }
        state.events.push(SimEvent::SetWidth { overlay, meters });
        Ok(())
    }

    fn set_input_method(
        &self,
        overlay: OverlayId,
        method: InputMethod,
    ) -> Result<(), OverlayError> {
        let mut state = lock(&self.state);
        if !state.alive.contains(&overlay) {
            return Err(OverlayError::InvalidHandle(overlay));
        }
        state
            .events
            .push(SimEvent::SetInputMethod { overlay, method });
        Ok(())
    }

    fn is_visible(&self, overlay: OverlayId) -> Result<bool, OverlayError> {
        let mut state = lock(&self.state);
        if !state.alive.contains(&overlay) {
            return Err(OverlayError::InvalidHandle(overlay));
        }
        if state.fail_visibility {
            return Err(OverlayError::Backend("scripted visibility failure".into()));
        }
        let visible = state.visible;
        state
            .events
            .push(SimEvent::VisibilityQuery { overlay, visible });
        Ok(visible)
    }

    fn destroy(&self, overlay: OverlayId) -> Result<(), OverlayError> {
        let mut state = lock(&self.state);
        let Some(entry) = state.overlays.remove(&overlay) else {
            return Err(OverlayError::InvalidHandle(overlay));
        };
        state.alive.remove(&overlay);
        state.alive.remove(&entry.thumbnail);
        state.events.push(SimEvent::DestroyOverlay { overlay });
        debug!("sim: destroyed overlay {overlay} ({:?})", entry.key);
        Ok(())
    }
}

struct SimSystem {
    state: Arc<Mutex<SimState>>,
}

impl SystemCapability for SimSystem {
    fn string_property_capacity(
        &self,
        device: u32,
        prop: StringProperty,
    ) -> (u32, PropertyStatus) {
        if device >= MAX_TRACKED_DEVICE_COUNT {
            return (0, PropertyStatus::InvalidDevice);
        }
        match lock(&self.state).strings.get(&(device, prop)) {
            Some(value) => (value.len() as u32 + 1, PropertyStatus::Success),
            None => (0, PropertyStatus::NotProvided),
        }
    }

    fn string_property(
        &self,
        device: u32,
        prop: StringProperty,
        buf: &mut [u8],
    ) -> (u32, PropertyStatus) {
        if device >= MAX_TRACKED_DEVICE_COUNT {
            return (0, PropertyStatus::InvalidDevice);
        }
        let state = lock(&self.state);
        let Some(value) = state.strings.get(&(device, prop)) else {
            return (0, PropertyStatus::NotProvided);
        };
        let required = value.len() as u32 + 1;
        if (buf.len() as u32) < required {
            return (required, PropertyStatus::BufferTooSmall);
        }
        buf[..value.len()].copy_from_slice(value.as_bytes());
        buf[value.len()] = 0;
        (required, PropertyStatus::Success)
    }

    fn float_property(&self, device: u32, prop: FloatProperty) -> (f32, PropertyStatus) {
        if device >= MAX_TRACKED_DEVICE_COUNT {
            return (0.0, PropertyStatus::InvalidDevice);
        }
        match lock(&self.state).floats.get(&(device, prop)) {
            Some(value) => (*value, PropertyStatus::Success),
            None => (0.0, PropertyStatus::NotProvided),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_allocated_in_pairs() {
        let sim = SimRuntime::new();
        let overlay = sim.overlay_capability();

        let (first, first_thumb) = overlay.create_dashboard_overlay("a", "A").unwrap();
        let (second, _) = overlay.create_dashboard_overlay("b", "B").unwrap();
        assert_eq!(first_thumb.0, first.0 + 1);
        assert!(second.0 > first_thumb.0);
    }

    #[test]
    fn destroy_frees_both_handles_and_the_key() {
        let sim = SimRuntime::new();
        let overlay = sim.overlay_capability();

        let (handle, thumbnail) = overlay.create_dashboard_overlay("a", "A").unwrap();
        overlay.destroy(handle).unwrap();

        assert!(!sim.overlay_alive(handle));
        assert!(!sim.overlay_alive(thumbnail));
        assert_eq!(
            overlay.destroy(handle),
            Err(OverlayError::InvalidHandle(handle))
        );
        overlay.create_dashboard_overlay("a", "A").unwrap();
    }

    #[test]
    fn operations_on_destroyed_handles_are_rejected() {
        let sim = SimRuntime::new();
        let overlay = sim.overlay_capability();

        let (handle, _) = overlay.create_dashboard_overlay("a", "A").unwrap();
        overlay.destroy(handle).unwrap();

        assert_eq!(
            overlay.is_visible(handle),
            Err(OverlayError::InvalidHandle(handle))
        );
        assert_eq!(
            overlay.set_image_file(handle, Path::new("x.png")),
            Err(OverlayError::InvalidHandle(handle))
        );
    }

    #[test]
    fn string_properties_round_trip_through_the_two_phase_protocol() {
        let sim = SimRuntime::new();
        sim.set_string_property(1, StringProperty::SerialNumber, "LHR-F00");
        let system = sim.system_capability();

        let (capacity, status) = system.string_property_capacity(1, StringProperty::SerialNumber);
        assert_eq!((capacity, status), (8, PropertyStatus::Success));

        let mut buf = vec![0xaa; capacity as usize];
        let (len, status) = system.string_property(1, StringProperty::SerialNumber, &mut buf);
        assert_eq!((len, status), (8, PropertyStatus::Success));
        assert_eq!(&buf[..7], b"LHR-F00");
        assert_eq!(buf[7], 0);
    }

    #[test]
    fn out_of_range_devices_report_invalid_device() {
        let sim = SimRuntime::new();
        let system = sim.system_capability();

        let (capacity, status) =
            system.string_property_capacity(MAX_TRACKED_DEVICE_COUNT, StringProperty::SerialNumber);
        assert_eq!((capacity, status), (0, PropertyStatus::InvalidDevice));
    }
}
