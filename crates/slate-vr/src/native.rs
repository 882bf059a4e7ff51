//! Native vendor runtime backend.
//!
//! Linking against the vendor loader is not wired into this build; init
//! reports the backend as unreachable so hosts run the ordinary
//! fatal-at-init path and exit with a clear diagnostic.
// TODO: load the vendor runtime library and map its init codes onto InitError.

use std::sync::Arc;

use crate::runtime::{
    CompositorCapability, FloatProperty, InitError, OverlayCapability, PropertyStatus,
    StringProperty, SystemCapability, VrRuntime,
};

pub struct NativeRuntime;

impl NativeRuntime {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NativeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl VrRuntime for NativeRuntime {
    fn init(&self) -> Result<(), InitError> {
        Err(InitError::VendorUnreachable)
    }

    fn shutdown(&self) {}

    fn resolve_compositor(
        &self,
        version: &str,
    ) -> Result<Arc<dyn CompositorCapability>, InitError> {
        Err(InitError::InterfaceNotFound(version.to_string()))
    }

    fn resolve_overlay(&self, version: &str) -> Result<Arc<dyn OverlayCapability>, InitError> {
        Err(InitError::InterfaceNotFound(version.to_string()))
    }

    fn system(&self) -> Arc<dyn SystemCapability> {
        Arc::new(OfflineSystem)
    }
}

/// System capability of a runtime that never came up.
struct OfflineSystem;

impl SystemCapability for OfflineSystem {
    fn string_property_capacity(&self, _: u32, _: StringProperty) -> (u32, PropertyStatus) {
        (0, PropertyStatus::InvalidDevice)
    }

    fn string_property(&self, _: u32, _: StringProperty, _: &mut [u8]) -> (u32, PropertyStatus) {
        (0, PropertyStatus::InvalidDevice)
    }

    fn float_property(&self, _: u32, _: FloatProperty) -> (f32, PropertyStatus) {
        (0.0, PropertyStatus::InvalidDevice)
    }
}
