//! Validation for backend, realtime, and server sections.

use crate::schema::LoungeConfig;

use super::helpers::{validate_range, validate_scheme};

pub(crate) fn validate_backend(errors: &mut Vec<String>, config: &LoungeConfig) {
    validate_scheme(errors, "backend.url", &config.backend.url, &["http://", "https://"]);
    validate_range(errors, "backend.timeout_secs", config.backend.timeout_secs, 1, 120);
}

/// An empty realtime URL means the realtime transport is not configured.
pub(crate) fn validate_realtime(errors: &mut Vec<String>, config: &LoungeConfig) {
    let rt = &config.realtime;
    if !rt.url.is_empty() {
        validate_scheme(errors, "realtime.url", &rt.url, &["ws://", "wss://"]);
    }
    validate_range(errors, "realtime.heartbeat_interval", rt.heartbeat_interval, 5, 120);
    validate_range(errors, "realtime.reconnect_delay", rt.reconnect_delay, 1, 60);
    if rt.max_reconnect_delay < rt.reconnect_delay {
        errors.push(format!(
            "realtime.max_reconnect_delay = {} is below realtime.reconnect_delay = {}",
            rt.max_reconnect_delay, rt.reconnect_delay
        ));
    }
}

pub(crate) fn validate_server(errors: &mut Vec<String>, config: &LoungeConfig) {
    let server = &config.server;
    if server.port == 0 {
        errors.push("server.port must not be 0".into());
    }
    validate_scheme(errors, "server.provider_url", &server.provider_url, &["http://", "https://"]);
    if !matches!(server.room_type.as_str(), "audio" | "video") {
        errors.push(format!(
            "server.room_type = {:?} must be \"audio\" or \"video\"",
            server.room_type
        ));
    }
}
