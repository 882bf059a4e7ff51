//! VR runtime connection lifecycle and the dashboard overlay it owns.
//!
//! The crate is built around two pieces: [`connection::ConnectionManager`],
//! which guards the single live connection to the VR runtime, and
//! [`overlay::DashboardOverlaySession`], which owns one dashboard overlay +
//! thumbnail pair and swaps its imagery with dashboard visibility. The
//! runtime itself is reached only through the capability traits in
//! [`runtime`], so backends stay swappable and the lifecycle logic stays
//! testable.

#![forbid(unsafe_code)]

pub mod connection;
pub mod native;
pub mod overlay;
pub mod runtime;
pub mod sim;

pub use connection::{global, install, ConnectionManager, RuntimeConnection};
pub use native::NativeRuntime;
pub use overlay::{DashboardOverlaySession, SessionState};
pub use runtime::{
    CompositorCapability, FloatProperty, InitError, InputMethod, OverlayCapability, OverlayError,
    OverlayId, PropertyStatus, StringProperty, SystemCapability, VrRuntime,
    COMPOSITOR_INTERFACE_VERSION, HMD_DEVICE_INDEX, MAX_TRACKED_DEVICE_COUNT,
    OVERLAY_INTERFACE_VERSION,
};
pub use sim::SimRuntime;
