//! Headless demo of the messaging substrate.
//!
//! Builds a three-level frame tree (root shell → reports app → export
//! widget), then walks through the core flows: a toast requested two levels
//! deep, answered at the root, resolved back at the origin; URL-change
//! telemetry; escape-close. Everything the embedded UI would normally do is
//! scripted here.

mod cli;

use std::sync::{Arc, Mutex};

use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use atrium_bus::{listener, pump_all, CallbackSlots, FrameHandle, WindowRef};
use atrium_common::{Envelope, MessageKind};
use atrium_sdk::{SdkConfig, ShellSdk, ToastOptions};

fn main() {
    let args = cli::parse();

    let log_directive = args.log_level.as_deref().unwrap_or("atrium=info");
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                log_directive
                    .parse()
                    .unwrap_or_else(|_| "atrium=info".parse().unwrap()),
            ),
        )
        .init();

    let mut config = SdkConfig::new();
    for origin in args.allowed_origins {
        config = config.allow_origin(origin);
    }

    // Root shell with one app frame, which itself hosts a widget frame.
    let root = ShellSdk::new(WindowRef::new("app://shell"), None, config.clone());

    let app_window = WindowRef::new("app://shell");
    let app = ShellSdk::new(
        app_window.clone(),
        Some(root.bus().window().clone()),
        config.clone(),
    );
    let app_id = root
        .add_frame(FrameHandle::new(app_window))
        .expect("app frame registers");

    let widget_window = WindowRef::new("app://shell");
    let widget = ShellSdk::new(
        widget_window.clone(),
        Some(app.bus().window().clone()),
        config,
    );
    app.add_frame(FrameHandle::new(widget_window))
        .expect("widget frame registers");

    info!(%app_id, frames = root.diagnostics().frames, "tree mounted");

    // The root's "UI": render toasts by logging them, and answer the action
    // button immediately, addressed back along the accumulated path.
    let pending_reply: Arc<Mutex<Vec<Envelope>>> = Arc::new(Mutex::new(Vec::new()));
    let queue = Arc::clone(&pending_reply);
    let _toast_listener = root.add_listener(
        MessageKind::ToastShow,
        listener(move |env| {
            info!(
                message = %env.payload["message"],
                path = ?env.from,
                "toast shown at root"
            );
            let reply = Envelope::new(
                MessageKind::ReplyAction,
                json!({ "id": env.payload["id"] }),
            )
            .addressed_to(env.from.clone());
            queue.lock().unwrap().push(reply);
        }),
    );

    let _url_listener = root.add_listener(
        MessageKind::UrlChange,
        listener(|env| info!(url = %env.payload["url"], "child navigated")),
    );

    let _close_listener = root.add_listener(
        MessageKind::OverlayClose,
        listener(|_| info!("overlay close requested")),
    );

    // The widget, two levels deep, asks for a toast with an undo action.
    widget.toast(
        ToastOptions::info("Export complete").with_action_label("Undo"),
        CallbackSlots::new().on_action(|| info!("undo pressed, export rolled back")),
    );
    pump_all(&[root.bus(), app.bus(), widget.bus()]);

    // Root UI answers whatever it queued while pumping.
    for reply in pending_reply.lock().unwrap().drain(..) {
        root.send(&reply);
    }
    pump_all(&[root.bus(), app.bus(), widget.bus()]);

    // Telemetry and escape-close, for good measure.
    app.report_url("/reports");
    app.report_url("/reports"); // suppressed: not a net change
    app.report_url("/reports/42");
    widget.handle_escape_key();
    pump_all(&[root.bus(), app.bus(), widget.bus()]);

    let diag = widget.diagnostics();
    info!(
        pending_callbacks = diag.pending_callbacks,
        "demo finished"
    );
}
