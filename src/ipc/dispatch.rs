//! IPC message dispatch — parse s-expressions and route to handlers.

use lexpr::Value;
use tracing::{debug, warn};

use crate::hand::landmarks::HandSample;
use crate::scene::photos::TextureHandle;
use crate::state::GroveState;

/// Parse an s-expression message and dispatch to the appropriate handler.
/// Returns an optional response string (s-expression).
pub fn handle_message(state: &mut GroveState, client_id: u64, raw: &str) -> Option<String> {
    let value = match lexpr::parse::from_str_elisp(raw) {
        Ok(v) => v,
        Err(e) => {
            warn!(client_id, "malformed s-expression: {}", e);
            return Some(error_response(0, &format!("malformed s-expression: {e}")));
        }
    };

    let msg_type = get_keyword(&value, "type");
    let msg_id = get_int(&value, "id").unwrap_or(0);

    // Check authentication (hello must be first message)
    let is_authenticated = state
        .ipc_server
        .clients
        .get(&client_id)
        .map(|c| c.authenticated)
        .unwrap_or(false);

    match msg_type.as_deref() {
        Some("hello") => handle_hello(state, client_id, msg_id, &value),
        _ if !is_authenticated => Some(error_response(msg_id, "hello handshake required")),
        Some("ping") => handle_ping(msg_id, &value),
        Some("status") => Some(data_response(msg_id, &state.pipeline.status_sexp())),
        Some("config-get") => Some(data_response(msg_id, &state.pipeline.config().sexp())),
        Some("config-set-pinch") => handle_set_pinch(state, msg_id, &value),
        Some("config-set-alpha") => handle_set_alpha(state, msg_id, &value),
        Some("config-set-mirror") => handle_set_mirror(state, msg_id, &value),
        Some("gesture-status") => Some(data_response(
            msg_id,
            &state.pipeline.classifier_status_sexp(),
        )),
        Some("mode-status") => Some(data_response(msg_id, &state.pipeline.modes_status_sexp())),
        Some("morph-status") => Some(data_response(msg_id, &state.pipeline.morph_status_sexp())),
        Some("camera-status") => Some(data_response(msg_id, &state.pipeline.camera_status_sexp())),
        Some("photo-list") => Some(data_response(msg_id, &state.pipeline.photos_sexp())),
        Some("photo-attach-texture") => handle_attach_texture(state, msg_id, &value),
        Some("hand-simulate") => handle_hand_simulate(state, msg_id, &value),
        Some("reset") => {
            state.pipeline.reset();
            Some(ok_response(msg_id))
        }
        Some("quit") => {
            state.running = false;
            Some(ok_response(msg_id))
        }
        Some(other) => Some(error_response(
            msg_id,
            &format!("unknown message type: {other}"),
        )),
        None => Some(error_response(msg_id, "missing :type field")),
    }
}

// ── Handlers ────────────────────────────────────────────────

fn handle_hello(
    state: &mut GroveState,
    client_id: u64,
    msg_id: i64,
    value: &Value,
) -> Option<String> {
    let version = get_int(value, "version").unwrap_or(0);
    if version != 1 {
        return Some(error_response(
            msg_id,
            &format!("unsupported protocol version: {version}"),
        ));
    }

    let client_name = get_string(value, "client").unwrap_or_default();
    debug!(client_id, client_name, "hello handshake");

    if let Some(client) = state.ipc_server.clients.get_mut(&client_id) {
        client.authenticated = true;
    }

    Some(format!(
        "(:type :hello :id {} :version 1 :server \"palmgrove\" :features (:photos {} :particles {}))",
        msg_id,
        state.pipeline.photos().len(),
        state.pipeline.morph().len(),
    ))
}

fn handle_ping(msg_id: i64, value: &Value) -> Option<String> {
    let client_ts = get_int(value, "timestamp").unwrap_or(0);
    let server_ts = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);

    Some(format!(
        "(:type :response :id {} :status :ok :client-timestamp {} :server-timestamp {})",
        msg_id, client_ts, server_ts,
    ))
}

fn handle_set_pinch(state: &mut GroveState, msg_id: i64, value: &Value) -> Option<String> {
    let enter = match get_f64(value, "enter") {
        Some(v) => v as f32,
        None => return Some(error_response(msg_id, "missing :enter")),
    };
    let exit = match get_f64(value, "exit") {
        Some(v) => v as f32,
        None => return Some(error_response(msg_id, "missing :exit")),
    };
    match state.pipeline.set_pinch_thresholds(enter, exit) {
        Ok(()) => Some(ok_response(msg_id)),
        Err(reason) => Some(error_response(msg_id, &reason)),
    }
}

fn handle_set_alpha(state: &mut GroveState, msg_id: i64, value: &Value) -> Option<String> {
    match get_f64(value, "alpha") {
        Some(alpha) => {
            state.pipeline.set_pointer_alpha(alpha as f32);
            Some(ok_response(msg_id))
        }
        None => Some(error_response(msg_id, "missing :alpha")),
    }
}

fn handle_set_mirror(state: &mut GroveState, msg_id: i64, value: &Value) -> Option<String> {
    match get_bool(value, "mirror") {
        Some(mirror) => {
            state.pipeline.set_mirror_input(mirror);
            Some(ok_response(msg_id))
        }
        None => Some(error_response(msg_id, "missing :mirror")),
    }
}

fn handle_attach_texture(state: &mut GroveState, msg_id: i64, value: &Value) -> Option<String> {
    let id = match get_int(value, "slot") {
        Some(v) if v >= 0 => v as usize,
        _ => return Some(error_response(msg_id, "missing :slot")),
    };
    let handle = match get_int(value, "handle") {
        Some(v) if v >= 0 => TextureHandle(v as u32),
        _ => return Some(error_response(msg_id, "missing :handle")),
    };
    if state.pipeline.attach_photo_texture(id, handle) {
        Some(ok_response(msg_id))
    } else {
        Some(error_response(msg_id, &format!("no photo slot {id}")))
    }
}

/// Inject one detector sample: either `:absent t` or `:landmarks` with a
/// flat list of 63 numbers. Drives the pipeline from scripts and tests.
fn handle_hand_simulate(state: &mut GroveState, msg_id: i64, value: &Value) -> Option<String> {
    let now = state.now_ms();

    if get_bool(value, "absent") == Some(true) {
        state.pipeline.detector_tick(now, None);
        return Some(ok_response(msg_id));
    }

    let numbers = match get_value(value, "landmarks") {
        Some(list) => {
            let flat: Vec<f32> = flatten_list(list)
                .iter()
                .filter_map(|v| v.as_f64().map(|n| n as f32))
                .collect();
            flat
        }
        None => return Some(error_response(msg_id, "missing :landmarks or :absent")),
    };

    match HandSample::from_flat(now, &numbers) {
        Some(sample) => {
            let accepted = state.pipeline.detector_tick(now, Some(sample));
            Some(format!(
                "(:type :response :id {} :status :ok :accepted {})",
                msg_id,
                if accepted { "t" } else { "nil" },
            ))
        }
        None => {
            state.pipeline.record_malformed();
            Some(error_response(msg_id, "malformed landmark buffer"))
        }
    }
}

// ── Response helpers ────────────────────────────────────────

fn ok_response(id: i64) -> String {
    format!("(:type :response :id {} :status :ok)", id)
}

fn data_response(id: i64, data: &str) -> String {
    format!("(:type :response :id {} :status :ok :data {})", id, data)
}

fn error_response(id: i64, reason: &str) -> String {
    format!(
        "(:type :response :id {} :status :error :reason \"{}\")",
        id,
        escape_string(reason)
    )
}

/// Escape a string for s-expression output.
fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

// ── Plist helpers ───────────────────────────────────────────

/// Extract the value following `:key` in a flat plist.
fn get_value<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let flat = flatten_pairs(value);
    for i in 0..flat.len().saturating_sub(1) {
        if let Value::Keyword(k) = flat[i] {
            if k.as_ref() == key {
                return Some(flat[i + 1]);
            }
        }
    }
    None
}

/// Extract a keyword value from an s-expression plist as a string.
fn get_keyword(value: &Value, key: &str) -> Option<String> {
    get_value(value, key).map(|v| match v {
        Value::Keyword(k) => k.to_string(),
        Value::Symbol(s) => s.to_string(),
        Value::String(s) => s.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    })
}

/// Extract an integer value from an s-expression plist.
fn get_int(value: &Value, key: &str) -> Option<i64> {
    get_keyword(value, key).and_then(|s| s.parse().ok())
}

/// Extract a float value from an s-expression plist.
fn get_f64(value: &Value, key: &str) -> Option<f64> {
    get_keyword(value, key).and_then(|s| s.parse().ok())
}

/// Extract a string value from an s-expression plist.
fn get_string(value: &Value, key: &str) -> Option<String> {
    get_keyword(value, key)
}

/// Extract an elisp-style boolean (`t` / `nil`).
fn get_bool(value: &Value, key: &str) -> Option<bool> {
    match get_keyword(value, key)?.as_str() {
        "t" => Some(true),
        "nil" => Some(false),
        _ => None,
    }
}

/// Flatten the top-level plist, keeping nested lists intact as values.
fn flatten_pairs(value: &Value) -> Vec<&Value> {
    let mut result = Vec::new();
    let mut cursor = value;
    while let Value::Cons(pair) = cursor {
        result.push(pair.car());
        cursor = pair.cdr();
    }
    result
}

/// Flatten a possibly nested list/cons structure into a Vec of leaf values.
fn flatten_list(value: &Value) -> Vec<&Value> {
    let mut result = Vec::new();
    fn walk<'a>(v: &'a Value, out: &mut Vec<&'a Value>) {
        match v {
            Value::Cons(pair) => {
                walk(pair.car(), out);
                walk(pair.cdr(), out);
            }
            Value::Null => {} // end of list
            other => out.push(other),
        }
    }
    walk(value, &mut result);
    result
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::ipc::server::IpcServer;

    fn test_state() -> (GroveState, u64) {
        let mut config = CoreConfig::default();
        config.particle_count = 32;
        config.photo_slots = 2;
        let mut state = GroveState::new(config, IpcServer::new("/tmp/unused.sock".into()));
        let client_id = state.ipc_server.insert_test_client();
        (state, client_id)
    }

    fn hello(state: &mut GroveState, client_id: u64) {
        let resp = handle_message(
            state,
            client_id,
            "(:type :hello :id 1 :version 1 :client \"test\")",
        )
        .unwrap();
        assert!(resp.contains(":server \"palmgrove\""), "{resp}");
    }

    #[test]
    fn test_malformed_sexp_rejected() {
        let (mut state, client_id) = test_state();
        let resp = handle_message(&mut state, client_id, "(:type").unwrap();
        assert!(resp.contains(":status :error"));
    }

    #[test]
    fn test_requires_handshake() {
        let (mut state, client_id) = test_state();
        let resp = handle_message(&mut state, client_id, "(:type :status :id 2)").unwrap();
        assert!(resp.contains("hello handshake required"));
    }

    #[test]
    fn test_hello_wrong_version() {
        let (mut state, client_id) = test_state();
        let resp =
            handle_message(&mut state, client_id, "(:type :hello :id 1 :version 9)").unwrap();
        assert!(resp.contains("unsupported protocol version"));
    }

    #[test]
    fn test_status_after_hello() {
        let (mut state, client_id) = test_state();
        hello(&mut state, client_id);
        let resp = handle_message(&mut state, client_id, "(:type :status :id 2)").unwrap();
        assert!(resp.contains(":mode :tree"), "{resp}");
    }

    #[test]
    fn test_config_roundtrip() {
        let (mut state, client_id) = test_state();
        hello(&mut state, client_id);

        let resp = handle_message(
            &mut state,
            client_id,
            "(:type :config-set-pinch :id 3 :enter 0.05 :exit 0.09)",
        )
        .unwrap();
        assert!(resp.contains(":status :ok"), "{resp}");

        let resp = handle_message(&mut state, client_id, "(:type :config-get :id 4)").unwrap();
        assert!(resp.contains(":pinch-enter 0.050"), "{resp}");
    }

    #[test]
    fn test_config_set_pinch_rejects_bad_pair() {
        let (mut state, client_id) = test_state();
        hello(&mut state, client_id);
        let resp = handle_message(
            &mut state,
            client_id,
            "(:type :config-set-pinch :id 3 :enter 0.1 :exit 0.1)",
        )
        .unwrap();
        assert!(resp.contains(":status :error"), "{resp}");
    }

    #[test]
    fn test_hand_simulate_absent() {
        let (mut state, client_id) = test_state();
        hello(&mut state, client_id);
        let resp = handle_message(
            &mut state,
            client_id,
            "(:type :hand-simulate :id 5 :absent t)",
        )
        .unwrap();
        assert!(resp.contains(":status :ok"), "{resp}");
    }

    #[test]
    fn test_hand_simulate_landmarks() {
        let (mut state, client_id) = test_state();
        hello(&mut state, client_id);

        let numbers: Vec<String> = (0..63).map(|i| format!("{:.2}", 0.3 + i as f64 * 0.001)).collect();
        let msg = format!(
            "(:type :hand-simulate :id 6 :landmarks ({}))",
            numbers.join(" "),
        );
        let resp = handle_message(&mut state, client_id, &msg).unwrap();
        assert!(resp.contains(":accepted t"), "{resp}");
    }

    #[test]
    fn test_hand_simulate_short_buffer() {
        let (mut state, client_id) = test_state();
        hello(&mut state, client_id);
        let resp = handle_message(
            &mut state,
            client_id,
            "(:type :hand-simulate :id 7 :landmarks (0.1 0.2 0.3))",
        )
        .unwrap();
        assert!(resp.contains("malformed landmark buffer"), "{resp}");
    }

    #[test]
    fn test_photo_attach_texture() {
        let (mut state, client_id) = test_state();
        hello(&mut state, client_id);
        let resp = handle_message(
            &mut state,
            client_id,
            "(:type :photo-attach-texture :id 8 :slot 1 :handle 42)",
        )
        .unwrap();
        assert!(resp.contains(":status :ok"), "{resp}");

        let resp = handle_message(
            &mut state,
            client_id,
            "(:type :photo-attach-texture :id 9 :slot 99 :handle 0)",
        )
        .unwrap();
        assert!(resp.contains("no photo slot 99"), "{resp}");
    }

    #[test]
    fn test_unknown_type() {
        let (mut state, client_id) = test_state();
        hello(&mut state, client_id);
        let resp = handle_message(&mut state, client_id, "(:type :warp-drive :id 9)").unwrap();
        assert!(resp.contains("unknown message type: warp-drive"));
    }

    #[test]
    fn test_quit_clears_running() {
        let (mut state, client_id) = test_state();
        hello(&mut state, client_id);
        assert!(state.running);
        handle_message(&mut state, client_id, "(:type :quit :id 10)");
        assert!(!state.running);
    }

    #[test]
    fn test_plist_helpers() {
        let value = lexpr::parse::from_str_elisp("(:type :ping :id 3 :alpha 0.25 :flag t)").unwrap();
        assert_eq!(get_keyword(&value, "type").as_deref(), Some("ping"));
        assert_eq!(get_int(&value, "id"), Some(3));
        assert_eq!(get_f64(&value, "alpha"), Some(0.25));
        assert_eq!(get_bool(&value, "flag"), Some(true));
        assert!(get_keyword(&value, "missing").is_none());
    }

    #[test]
    fn test_nested_list_value() {
        let value = lexpr::parse::from_str_elisp("(:landmarks (1 2 3) :id 1)").unwrap();
        let list = get_value(&value, "landmarks").unwrap();
        let numbers: Vec<f64> = flatten_list(list)
            .iter()
            .filter_map(|v| v.as_f64())
            .collect();
        assert_eq!(numbers, vec![1.0, 2.0, 3.0]);
    }
}
