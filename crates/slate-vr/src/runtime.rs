//! Boundary traits for the VR runtime and its subsystem capabilities.
//!
//! The runtime is an external collaborator; everything this crate needs from
//! it is expressed here as a trait per capability. Capabilities are resolved
//! by versioned interface name, so a backend built against a different
//! runtime revision fails loudly at connection time instead of misbehaving
//! later.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Versioned compositor interface this crate was written against.
pub const COMPOSITOR_INTERFACE_VERSION: &str = "IVRCompositor_026";

/// Versioned overlay-manager interface this crate was written against.
pub const OVERLAY_INTERFACE_VERSION: &str = "IVROverlay_024";

/// Device index of the head-mounted display.
pub const HMD_DEVICE_INDEX: u32 = 0;

/// Upper bound on simultaneously tracked devices.
pub const MAX_TRACKED_DEVICE_COUNT: u32 = 64;

/// Opaque overlay identifier issued by the overlay-manager capability.
///
/// Valid only between successful creation and destruction of the overlay it
/// names; the owning session is responsible for never using a stale id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OverlayId(pub u64);

impl fmt::Display for OverlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// How the compositor routes user input to an overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputMethod {
    /// The overlay receives no input.
    None,
    /// Pointer input is delivered to the overlay as mouse events.
    Mouse,
}

/// String-valued tracked device properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringProperty {
    TrackingSystemName,
    ModelNumber,
    SerialNumber,
    AttachedDeviceId,
}

/// Float-valued tracked device properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatProperty {
    DisplayFrequency,
    SecondsFromVsyncToPhotons,
}

/// Status code reported by device property queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyStatus {
    Success,
    WrongDataType,
    BufferTooSmall,
    UnknownProperty,
    InvalidDevice,
    NotProvided,
}

impl PropertyStatus {
    /// Textual description of the status code, mirroring what the runtime
    /// itself reports.
    pub fn description(self) -> &'static str {
        match self {
            PropertyStatus::Success => "success",
            PropertyStatus::WrongDataType => "wrong data type",
            PropertyStatus::BufferTooSmall => "buffer too small",
            PropertyStatus::UnknownProperty => "unknown property",
            PropertyStatus::InvalidDevice => "invalid device index",
            PropertyStatus::NotProvided => "value not provided by device",
        }
    }
}

/// Fatal errors raised while establishing the runtime connection.
///
/// `Display` is the code-to-diagnostic mapping shown to users. Codes this
/// crate does not classify carry the runtime's own description through
/// [`InitError::Other`], so new codes degrade to a readable message instead
/// of being swallowed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InitError {
    #[error("VR runtime initialization failed: make sure the headset is powered on and the vendor runtime service is running")]
    VendorUnreachable,

    #[error("VR drivers not found: install the runtime's driver package and try again")]
    DriverNotFound,

    #[error("VR runtime initialization failed: the installed driver runtime is out of date")]
    DriverOutOfDate,

    #[error("required runtime interface {0} could not be resolved")]
    InterfaceNotFound(String),

    #[error("VR runtime initialization failed: {0}")]
    Other(String),
}

/// Errors raised by overlay-manager operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OverlayError {
    #[error("overlay key {0:?} is already in use")]
    KeyInUse(String),

    #[error("overlay handle {0} is not valid")]
    InvalidHandle(OverlayId),

    #[error("invalid session state: {0}")]
    InvalidState(&'static str),

    #[error("overlay backend error: {0}")]
    Backend(String),
}

/// Process connection to the VR runtime and resolver for its subsystem
/// capabilities.
pub trait VrRuntime: Send + Sync {
    /// Establish the process-wide connection to the runtime.
    fn init(&self) -> Result<(), InitError>;

    /// Tear the connection down. Must tolerate being called after a failed
    /// or partial init, and more than once.
    fn shutdown(&self);

    /// Resolve the compositor capability by versioned interface name.
    fn resolve_compositor(
        &self,
        version: &str,
    ) -> Result<Arc<dyn CompositorCapability>, InitError>;

    /// Resolve the overlay-manager capability by versioned interface name.
    fn resolve_overlay(&self, version: &str) -> Result<Arc<dyn OverlayCapability>, InitError>;

    /// The device/system capability, implied by a successful `init`.
    fn system(&self) -> Arc<dyn SystemCapability>;
}

/// Compositor subsystem.
pub trait CompositorCapability: Send + Sync {
    /// Render target dimensions the runtime recommends for this headset.
    fn recommended_render_target_size(&self) -> (u32, u32);
}

/// Overlay-manager subsystem.
pub trait OverlayCapability: Send + Sync {
    /// Create a dashboard overlay and its paired thumbnail.
    fn create_dashboard_overlay(
        &self,
        key: &str,
        name: &str,
    ) -> Result<(OverlayId, OverlayId), OverlayError>;

    /// Display the image file at `path` on the overlay.
    fn set_image_file(&self, overlay: OverlayId, path: &Path) -> Result<(), OverlayError>;

    /// Width of the overlay quad in meters.
    fn set_width_meters(&self, overlay: OverlayId, meters: f32) -> Result<(), OverlayError>;

    fn set_input_method(
        &self,
        overlay: OverlayId,
        method: InputMethod,
    ) -> Result<(), OverlayError>;

    /// Whether the overlay is currently shown in the dashboard.
    fn is_visible(&self, overlay: OverlayId) -> Result<bool, OverlayError>;

    /// Destroy the overlay and its paired thumbnail.
    fn destroy(&self, overlay: OverlayId) -> Result<(), OverlayError>;
}

/// Device/system subsystem: tracked device properties.
///
/// String properties use the runtime's two-phase protocol: the first call
/// reports the required buffer capacity including the NUL terminator, the
/// second fills a caller-provided buffer of at least that capacity. A
/// reported capacity of 1 or less means the device provides no value.
pub trait SystemCapability: Send + Sync {
    /// Phase 1: required buffer capacity for a string property.
    fn string_property_capacity(
        &self,
        device: u32,
        prop: StringProperty,
    ) -> (u32, PropertyStatus);

    /// Phase 2: copy the value into `buf`, returning the bytes written
    /// including the NUL terminator.
    fn string_property(
        &self,
        device: u32,
        prop: StringProperty,
        buf: &mut [u8],
    ) -> (u32, PropertyStatus);

    fn float_property(&self, device: u32, prop: FloatProperty) -> (f32, PropertyStatus);
}
