//! Command protocol for dualstream
//!
//! One command line arrives either as a JSON object
//! `{"action": "...", "stream": "..."}` or as plaintext
//! `<action> [<target>]`. Both wire formats converge on the same internal
//! `Command` before dispatch, so the dispatch logic never sees the wire
//! format.

use crate::manager::StreamManager;
use crate::stream::{CameraStream, StreamStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Internal representation of one received command
///
/// `action` is lowercased during parsing. `stream` is the target camera id,
/// `"*"` for all cameras, or `""` when unspecified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub action: String,
    pub stream: String,
}

/// Wire shape of the JSON command format
#[derive(Deserialize)]
struct WireCommand {
    #[serde(default)]
    action: String,
    #[serde(default)]
    stream: String,
}

/// Parse one command line
///
/// Attempts the JSON format first; on failure, falls back to whitespace
/// tokenization where the first token is the action and the optional second
/// token is the target. Tokens beyond the second are ignored.
pub fn parse_line(line: &str) -> Command {
    if let Ok(wire) = serde_json::from_str::<WireCommand>(line) {
        return Command {
            action: wire.action.to_lowercase(),
            stream: wire.stream,
        };
    }

    let mut tokens = line.split_whitespace();
    Command {
        action: tokens.next().unwrap_or("").to_lowercase(),
        stream: tokens.next().unwrap_or("").to_string(),
    }
}

/// One response line: the affected cameras' status, or an error
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Response {
    Streams { streams: Vec<StreamStatus> },
    Error { error: String },
}

impl Response {
    pub fn streams(streams: Vec<StreamStatus>) -> Self {
        Response::Streams { streams }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            error: message.into(),
        }
    }
}

/// Apply one command against the registry
///
/// Target resolution for mutating actions: an empty target and `"*"` both
/// mean every registered camera (empty-means-wildcard is the documented
/// policy of this protocol); anything else must exactly match one camera id.
/// An unknown target or action mutates nothing and reports an error naming
/// the offending input.
pub fn dispatch(manager: &StreamManager, command: &Command) -> Response {
    match command.action.as_str() {
        "status" => Response::streams(manager.all_status()),
        "live" | "standby" | "toggle" => {
            let targets: Vec<Arc<CameraStream>> =
                if command.stream.is_empty() || command.stream == "*" {
                    manager.streams().to_vec()
                } else {
                    match manager.get(&command.stream) {
                        Some(stream) => vec![stream],
                        None => {
                            return Response::error(format!(
                                "unknown stream: {}",
                                command.stream
                            ))
                        }
                    }
                };

            for stream in &targets {
                match command.action.as_str() {
                    "live" => stream.set_live(),
                    "standby" => stream.set_standby(),
                    _ => stream.toggle(),
                }
            }

            Response::streams(targets.iter().map(|s| s.status()).collect())
        }
        other => Response::error(format!("unknown action: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::Mode;
    use dualstream_config::{CameraConfig, Config, ServerConfig};
    use proptest::prelude::*;
    use std::path::PathBuf;

    fn two_camera_manager() -> StreamManager {
        let config = Config {
            server: ServerConfig::default(),
            cameras: ["c1", "c2"]
                .iter()
                .map(|id| CameraConfig {
                    id: id.to_string(),
                    name: format!("Camera {}", id),
                    source_url: format!("rtsp://cam.local/{}", id),
                    standby_media: PathBuf::from("/opt/media/loop.mp4"),
                    segment_duration: 2,
                })
                .collect(),
        };
        StreamManager::new(&config)
    }

    fn modes(manager: &StreamManager) -> Vec<Mode> {
        manager.streams().iter().map(|s| s.mode()).collect()
    }

    #[test]
    fn test_parse_json_format() {
        let command = parse_line(r#"{"action":"live","stream":"cam1"}"#);
        assert_eq!(
            command,
            Command {
                action: "live".to_string(),
                stream: "cam1".to_string()
            }
        );
    }

    #[test]
    fn test_parse_plaintext_format() {
        assert_eq!(
            parse_line("live cam1"),
            Command {
                action: "live".to_string(),
                stream: "cam1".to_string()
            }
        );
        assert_eq!(
            parse_line("status"),
            Command {
                action: "status".to_string(),
                stream: "".to_string()
            }
        );
        // Trailing tokens are ignored
        assert_eq!(
            parse_line("toggle cam2 please"),
            Command {
                action: "toggle".to_string(),
                stream: "cam2".to_string()
            }
        );
    }

    #[test]
    fn test_parse_lowercases_action_in_both_formats() {
        assert_eq!(parse_line("LIVE cam1").action, "live");
        assert_eq!(parse_line(r#"{"action":"TOGGLE","stream":"c1"}"#).action, "toggle");
    }

    #[test]
    fn test_parse_json_with_missing_fields() {
        let command = parse_line(r#"{"stream":"cam1"}"#);
        assert_eq!(command.action, "");
        assert_eq!(command.stream, "cam1");

        let command = parse_line("{}");
        assert_eq!(command.action, "");
        assert_eq!(command.stream, "");
    }

    // Scenario: `status` lists every camera, in registration order.
    #[test]
    fn test_status_lists_all_cameras_in_order() {
        let manager = two_camera_manager();

        let response = dispatch(&manager, &parse_line("status"));
        match response {
            Response::Streams { streams } => {
                assert_eq!(streams.len(), 2);
                assert_eq!(streams[0].id, "c1");
                assert_eq!(streams[0].mode, Mode::Standby);
                assert_eq!(streams[1].id, "c2");
                assert_eq!(streams[1].mode, Mode::Standby);
            }
            Response::Error { error } => panic!("unexpected error: {}", error),
        }
    }

    // Scenario: targeting one camera changes only that camera.
    #[test]
    fn test_live_single_target() {
        let manager = two_camera_manager();

        let response = dispatch(&manager, &parse_line(r#"{"action":"live","stream":"c1"}"#));
        match response {
            Response::Streams { streams } => {
                assert_eq!(streams.len(), 1);
                assert_eq!(streams[0].id, "c1");
                assert_eq!(streams[0].mode, Mode::Live);
            }
            Response::Error { error } => panic!("unexpected error: {}", error),
        }
        assert_eq!(modes(&manager), vec![Mode::Live, Mode::Standby]);
    }

    // Scenario: wildcard toggle flips every camera and lists all of them.
    #[test]
    fn test_wildcard_toggle_covers_all_cameras() {
        let manager = two_camera_manager();
        manager.get("c1").expect("c1 exists").set_live();

        let response = dispatch(&manager, &parse_line(r#"{"action":"toggle","stream":"*"}"#));
        match response {
            Response::Streams { streams } => {
                assert_eq!(streams.len(), 2);
                assert_eq!(streams[0].id, "c1");
                assert_eq!(streams[0].mode, Mode::Standby);
                assert_eq!(streams[1].id, "c2");
                assert_eq!(streams[1].mode, Mode::Live);
            }
            Response::Error { error } => panic!("unexpected error: {}", error),
        }
    }

    // Empty target on a mutating action means wildcard (documented policy).
    #[test]
    fn test_empty_target_means_wildcard() {
        let manager = two_camera_manager();

        dispatch(&manager, &parse_line("live"));
        assert_eq!(modes(&manager), vec![Mode::Live, Mode::Live]);
    }

    // Scenario: unknown action is rejected without touching state.
    #[test]
    fn test_unknown_action_is_rejected() {
        let manager = two_camera_manager();

        let response = dispatch(&manager, &parse_line("foo bar"));
        assert_eq!(response, Response::error("unknown action: foo"));
        assert_eq!(modes(&manager), vec![Mode::Standby, Mode::Standby]);
    }

    // Scenario: unknown target is rejected without touching state.
    #[test]
    fn test_unknown_target_is_rejected() {
        let manager = two_camera_manager();

        let response = dispatch(&manager, &parse_line(r#"{"action":"live","stream":"ghost"}"#));
        assert_eq!(response, Response::error("unknown stream: ghost"));
        assert_eq!(modes(&manager), vec![Mode::Standby, Mode::Standby]);
    }

    // Repeating a mutating command on an already-matching state still
    // returns the correct current status.
    #[test]
    fn test_repeated_command_is_idempotent() {
        let manager = two_camera_manager();

        let first = dispatch(&manager, &parse_line("live c1"));
        let second = dispatch(&manager, &parse_line("live c1"));
        assert_eq!(first, second);
        assert_eq!(modes(&manager), vec![Mode::Live, Mode::Standby]);
    }

    #[test]
    fn test_response_serialization_shape() {
        let error = serde_json::to_string(&Response::error("unknown action: foo")).unwrap();
        assert_eq!(error, r#"{"error":"unknown action: foo"}"#);

        let empty = serde_json::to_string(&Response::streams(Vec::new())).unwrap();
        assert_eq!(empty, r#"{"streams":[]}"#);
    }

    // *For any* action and target, the JSON and plaintext renderings of the
    // same command produce identical responses and identical final state.
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_dual_format_equivalence(
            action_index in 0usize..5,
            target_index in 0usize..4,
        ) {
            let actions = ["status", "live", "standby", "toggle", "foo"];
            let targets = ["", "*", "c1", "ghost"];
            let action = actions[action_index];
            let target = targets[target_index];

            let json_manager = two_camera_manager();
            let plain_manager = two_camera_manager();

            let json_line = format!(r#"{{"action":"{}","stream":"{}"}}"#, action, target);
            let plain_line = if target.is_empty() {
                action.to_string()
            } else {
                format!("{} {}", action, target)
            };

            let json_response = dispatch(&json_manager, &parse_line(&json_line));
            let plain_response = dispatch(&plain_manager, &parse_line(&plain_line));

            prop_assert_eq!(json_response, plain_response);
            prop_assert_eq!(modes(&json_manager), modes(&plain_manager));
        }
    }
}
