//! JavaScript glue for frames that are real embedded web pages.
//!
//! The bus itself is transport-agnostic; when a frame hosts actual web
//! content, this script is injected as an initialization script so the page
//! can speak envelopes over `window.postMessage` without bundling anything.

use atrium_common::Envelope;

/// Sets up `window.atrium` inside an embedded page: a thin envelope codec
/// over `postMessage` plus a per-kind handler table.
pub const BRIDGE_INIT_SCRIPT: &str = r#"
(function() {
    // Atrium envelope bridge
    window.atrium = window.atrium || {};
    window.atrium.send = function(type, payload, to) {
        window.parent.postMessage({
            type: type,
            payload: payload === undefined ? null : payload,
            to: to || []
        }, '*');
    };
    window.atrium._handlers = {};
    window.atrium.on = function(type, callback) {
        window.atrium._handlers[type] = callback;
    };
    window.atrium._receive = function(envelope) {
        var handler = window.atrium._handlers[envelope.type];
        if (handler) {
            handler(envelope.payload, envelope);
        }
    };
    window.addEventListener('message', function(event) {
        var data = event.data;
        if (data && typeof data.type === 'string' && data.type.indexOf('atrium:') === 0) {
            window.atrium._receive(data);
        }
    });
})();
"#;

/// Generate the snippet that hands an envelope to the page's bridge.
pub fn js_dispatch_envelope(env: &Envelope) -> String {
    format!("window.atrium._receive({});", env.to_json())
}

#[cfg(test)]
mod tests {
    use super::*;
    use atrium_common::MessageKind;
    use serde_json::json;

    #[test]
    fn init_script_defines_the_bridge() {
        assert!(BRIDGE_INIT_SCRIPT.contains("window.atrium.send"));
        assert!(BRIDGE_INIT_SCRIPT.contains("window.atrium.on"));
        assert!(BRIDGE_INIT_SCRIPT.contains("'atrium:'"));
    }

    #[test]
    fn dispatch_snippet_embeds_the_envelope() {
        let env = Envelope::new(MessageKind::ToastShow, json!({"id": "ab12cd34"}));
        let js = js_dispatch_envelope(&env);
        assert!(js.starts_with("window.atrium._receive({"));
        assert!(js.contains("\"atrium:toast-show\""));
        assert!(js.contains("\"ab12cd34\""));
        assert!(js.ends_with(");"));
    }
}
