// Wire format of the session channel

use serde_json::{json, Value};
use voice_turns::channel::messages::{decode, encode};
use voice_turns::channel::{ClientEvent, ServerEvent};
use voice_turns::ProtocolError;

fn as_json(event: &ServerEvent) -> Value {
    serde_json::from_str(&encode(event).unwrap()).unwrap()
}

#[test]
fn test_server_events_use_event_and_data_fields() {
    assert_eq!(
        as_json(&ServerEvent::AiResponse {
            text: "Hi".to_string()
        }),
        json!({"event": "ai-response", "data": {"text": "Hi"}})
    );
    assert_eq!(
        as_json(&ServerEvent::SpeechRequest {
            text: "Hi".to_string()
        }),
        json!({"event": "speech-request", "data": {"text": "Hi"}})
    );
    assert_eq!(
        as_json(&ServerEvent::ready()),
        json!({"event": "ready-for-next-input", "data": {"keep_listening": true}})
    );
}

#[test]
fn test_reset_flag_only_sent_when_set() {
    let event = ServerEvent::ReadyForNextInput {
        keep_listening: true,
        reset_state: true,
    };

    assert_eq!(
        as_json(&event),
        json!({"event": "ready-for-next-input", "data": {"keep_listening": true, "reset_state": true}})
    );
}

#[test]
fn test_client_events_decode() {
    assert_eq!(
        decode::<ClientEvent>(r#"{"event":"user-speech","data":{"text":"hello"}}"#).unwrap(),
        ClientEvent::UserSpeech {
            text: "hello".to_string()
        }
    );
    assert_eq!(
        decode::<ClientEvent>(r#"{"event":"tts-error","data":{"error":"quota"}}"#).unwrap(),
        ClientEvent::TtsError {
            error: "quota".to_string()
        }
    );
}

#[test]
fn test_payloadless_events_accept_missing_or_null_data() {
    for frame in [
        r#"{"event":"speech-ended"}"#,
        r#"{"event":"speech-ended","data":null}"#,
        r#"{"event":"speech-ended","data":{}}"#,
    ] {
        assert_eq!(
            decode::<ClientEvent>(frame).unwrap(),
            ClientEvent::SpeechEnded {}
        );
    }
    assert_eq!(
        decode::<ClientEvent>(r#"{"event":"end-session"}"#).unwrap(),
        ClientEvent::EndSession {}
    );
}

#[test]
fn test_ready_defaults_when_flags_missing() {
    let event: ServerEvent = decode(r#"{"event":"ready-for-next-input","data":{}}"#).unwrap();

    assert_eq!(
        event,
        ServerEvent::ReadyForNextInput {
            keep_listening: false,
            reset_state: false
        }
    );
}

#[test]
fn test_bad_frames_are_protocol_errors() {
    for frame in [
        "not json",
        r#"{"event":"user-speech"}"#,
        r#"{"event":"shout","data":{"text":"hi"}}"#,
        r#"{"data":{"text":"hi"}}"#,
        r#"[1,2,3]"#,
    ] {
        assert!(matches!(
            decode::<ClientEvent>(frame),
            Err(ProtocolError::Malformed(_))
        ));
    }
}

#[test]
fn test_event_names_match_wire_tags() {
    let events = [
        ServerEvent::ready(),
        ServerEvent::Error {
            message: "x".to_string(),
            recoverable: true,
        },
        ServerEvent::PhaseChanged {
            phase: "intro".to_string(),
            remaining_secs: 5,
        },
        ServerEvent::SessionSummary {
            text: "s".to_string(),
        },
        ServerEvent::SessionEnded {
            reason: "r".to_string(),
        },
        ServerEvent::Pong {},
    ];

    for event in events {
        assert_eq!(as_json(&event)["event"], event.name());
    }
}
