//! Slate dashboard overlay host.
//!
//! Connects to the VR runtime, registers one dashboard overlay + thumbnail
//! pair, and polls dashboard visibility until interrupted, swapping in the
//! primary image whenever the overlay is shown.

#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use tokio::sync::watch;
use tracing::info;

use slate_vr::{
    connection, DashboardOverlaySession, InputMethod, NativeRuntime, SimRuntime, VrRuntime,
};

#[derive(Parser, Debug)]
#[command(name = "slate-dash")]
#[command(about = "Hosts a VR dashboard overlay that follows dashboard visibility")]
struct Args {
    /// Runtime backend to connect to
    #[arg(long, value_enum, default_value = "native")]
    backend: Backend,

    /// Overlay key registered with the runtime
    #[arg(long, env = "SLATE_OVERLAY_KEY", default_value = "slate.dashboard")]
    overlay_key: String,

    /// Friendly overlay name shown in the dashboard
    #[arg(long, env = "SLATE_OVERLAY_NAME", default_value = "Slate")]
    overlay_name: String,

    /// Thumbnail image; relative paths resolve under the resource directory
    #[arg(long, env = "SLATE_THUMBNAIL", default_value = "thumbnail.png")]
    thumbnail: PathBuf,

    /// Primary image shown while the dashboard is visible
    #[arg(long, env = "SLATE_IMAGE", default_value = "dashboard.png")]
    image: PathBuf,

    /// Overlay quad width in meters
    #[arg(long, default_value_t = 2.5)]
    width_meters: f32,

    /// Visibility poll interval in milliseconds
    #[arg(long, env = "SLATE_POLL_INTERVAL_MS", default_value_t = 10)]
    poll_interval_ms: u64,

    /// How the overlay receives user input
    #[arg(long, value_enum, default_value = "mouse")]
    input_method: InputMethodArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    /// Native vendor runtime
    Native,
    /// In-memory simulated runtime
    Sim,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum InputMethodArg {
    None,
    Mouse,
}

impl From<InputMethodArg> for InputMethod {
    fn from(arg: InputMethodArg) -> Self {
        match arg {
            InputMethodArg::None => InputMethod::None,
            InputMethodArg::Mouse => InputMethod::Mouse,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    slate_common::init_tracing();

    let args = Args::parse();

    let runtime: Arc<dyn VrRuntime> = match args.backend {
        Backend::Native => Arc::new(NativeRuntime::new()),
        Backend::Sim => {
            let sim = SimRuntime::headset();
            // Nothing toggles the simulated dashboard, so keep it visible.
            sim.set_visible(true);
            sim
        }
    };

    let manager = connection::install(runtime);
    let Some(conn) = manager.instance() else {
        bail!("could not connect to the VR runtime");
    };

    let (width, height) = conn.render_target_size();
    info!(
        "{} ({}), recommended render target {width}x{height}",
        conn.hmd_model_number(),
        conn.hmd_tracking_system_name()
    );

    let thumbnail = slate_common::resolve_resource(&args.thumbnail)?;
    let image = slate_common::resolve_resource(&args.image)?;

    let mut session = DashboardOverlaySession::create(
        conn.overlay(),
        &args.overlay_key,
        &args.overlay_name,
        &thumbnail,
    )?;
    session.configure(args.width_meters, args.input_method.into())?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            let _ = cancel_tx.send(true);
        }
    });

    session
        .run(
            &image,
            Duration::from_millis(args.poll_interval_ms),
            cancel_rx,
        )
        .await?;

    // The overlay is gone; now the connection itself.
    if let Some(manager) = connection::global() {
        manager.dispose();
    }
    Ok(())
}
