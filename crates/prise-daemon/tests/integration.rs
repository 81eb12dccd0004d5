//! Spawn-attach-echo round trip against the real socket server, speaking
//! the wire protocol directly rather than through a higher-level client.

use std::time::Duration;

use prise_daemon::{DaemonConfig, ShellConfig};
use prise_paths::PrisePaths;
use prise_protocol::codec::{DEFAULT_MAX_FRAME_BYTES, decode_message_bounded, encode_message};
use prise_protocol::message::Message;
use prise_protocol::wire_types::{KeyDesc, PtyId, RedrawEvent, ResizePtyParams, SpawnPtyParams};
use rmpv::ext::{from_value, to_value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

fn cat_shell_config() -> DaemonConfig {
    let mut config = DaemonConfig::default();
    config.shell = ShellConfig {
        program: "/bin/sh".to_string(),
        args: vec!["-c".to_string(), "cat".to_string()],
    };
    config
}

async fn wait_for_socket(path: &std::path::Path) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !path.exists() {
        assert!(tokio::time::Instant::now() < deadline, "daemon never created its socket");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

async fn send_request(stream: &mut UnixStream, req_id: u32, method: &str, params: impl serde::Serialize) {
    let value = to_value(params).unwrap_or(rmpv::Value::Nil);
    let bytes = encode_message(&Message::request(req_id, method, value)).unwrap();
    stream.write_all(&bytes).await.unwrap();
}

async fn send_notification(stream: &mut UnixStream, method: &str, params: impl serde::Serialize) {
    let value = to_value(params).unwrap_or(rmpv::Value::Nil);
    let bytes = encode_message(&Message::notification(method, value)).unwrap();
    stream.write_all(&bytes).await.unwrap();
}

async fn recv_message(stream: &mut UnixStream, buf: &mut Vec<u8>) -> Message {
    loop {
        if let Ok(Some((message, consumed))) = decode_message_bounded(buf, DEFAULT_MAX_FRAME_BYTES) {
            buf.drain(..consumed);
            return message;
        }
        let mut chunk = [0u8; 4096];
        let n = stream.read(&mut chunk).await.expect("connection closed while waiting for a message");
        assert!(n > 0, "connection closed unexpectedly");
        buf.extend_from_slice(&chunk[..n]);
    }
}

#[tokio::test]
async fn spawn_attach_and_echo_produces_a_redraw_containing_the_typed_character() {
    let dir = tempfile::tempdir().unwrap();
    let paths = PrisePaths::from_dirs(dir.path().join("run"), dir.path().join("state"), dir.path().join("config"));
    let socket_path = paths.socket_path();

    let server = tokio::spawn(prise_daemon::run_server(paths, cat_shell_config()));
    wait_for_socket(&socket_path).await;

    let mut stream = UnixStream::connect(&socket_path).await.unwrap();
    let mut buf = Vec::new();

    send_request(
        &mut stream,
        0,
        "spawn_pty",
        SpawnPtyParams {
            rows: 24,
            cols: 80,
            attach: true,
            cwd: None,
        },
    )
    .await;
    let pty_id: PtyId = match recv_message(&mut stream, &mut buf).await {
        Message::Response { error, result, .. } => {
            assert!(error.is_nil(), "spawn_pty returned an error: {error:?}");
            from_value(result).unwrap()
        }
        other => panic!("expected a response to spawn_pty, got {other:?}"),
    };

    let key = KeyDesc {
        key: "a".to_string(),
        code: "KeyA".to_string(),
        shift_key: false,
        ctrl_key: false,
        alt_key: false,
        meta_key: false,
    };
    send_notification(&mut stream, "key_input", (pty_id, key)).await;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let mut saw_echoed_a = false;
    while tokio::time::Instant::now() < deadline && !saw_echoed_a {
        let message = recv_message(&mut stream, &mut buf).await;
        let Message::Notification { method, params } = message else {
            continue;
        };
        if method != "redraw" {
            continue;
        }
        let (_pty, events): (PtyId, Vec<RedrawEvent>) = from_value(params).unwrap();
        assert!(events.iter().any(|e| matches!(e, RedrawEvent::Flush)), "every redraw notification must end with a flush event");
        saw_echoed_a = events.iter().any(|e| matches!(e, RedrawEvent::Row { runs, .. } if runs.iter().any(|r| r.text.contains('a'))));
    }
    assert!(saw_echoed_a, "expected the PTY (running `cat`) to echo the typed 'a' back in a redraw row");

    server.abort();
}

#[tokio::test]
async fn resize_after_attach_reaches_every_attached_client() {
    let dir = tempfile::tempdir().unwrap();
    let paths = PrisePaths::from_dirs(dir.path().join("run"), dir.path().join("state"), dir.path().join("config"));
    let socket_path = paths.socket_path();

    let server = tokio::spawn(prise_daemon::run_server(paths, cat_shell_config()));
    wait_for_socket(&socket_path).await;

    let mut stream = UnixStream::connect(&socket_path).await.unwrap();
    let mut buf = Vec::new();
    send_request(
        &mut stream,
        0,
        "spawn_pty",
        SpawnPtyParams {
            rows: 24,
            cols: 80,
            attach: true,
            cwd: None,
        },
    )
    .await;
    let pty_id: PtyId = match recv_message(&mut stream, &mut buf).await {
        Message::Response { error, result, .. } => {
            assert!(error.is_nil());
            from_value(result).unwrap()
        }
        other => panic!("expected a response, got {other:?}"),
    };

    send_request(
        &mut stream,
        1,
        "resize_pty",
        ResizePtyParams {
            pty_id,
            rows: 30,
            cols: 100,
            width_px: 0,
            height_px: 0,
        },
    )
    .await;
    match recv_message(&mut stream, &mut buf).await {
        Message::Response { req_id, error, .. } => {
            assert_eq!(req_id, 1);
            assert!(error.is_nil(), "resize_pty returned an error: {error:?}");
        }
        other => panic!("expected a response to resize_pty, got {other:?}"),
    }

    let mut saw_redraw = false;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline && !saw_redraw {
        if let Message::Notification { method, .. } = recv_message(&mut stream, &mut buf).await {
            saw_redraw = method == "redraw";
        }
    }
    assert!(saw_redraw, "resize_pty should push a full redraw to the attached client");

    server.abort();
}

#[tokio::test]
async fn unknown_pty_requests_return_a_wire_error_without_closing_the_connection() {
    let dir = tempfile::tempdir().unwrap();
    let paths = PrisePaths::from_dirs(dir.path().join("run"), dir.path().join("state"), dir.path().join("config"));
    let socket_path = paths.socket_path();

    let server = tokio::spawn(prise_daemon::run_server(paths, cat_shell_config()));
    wait_for_socket(&socket_path).await;

    let mut stream = UnixStream::connect(&socket_path).await.unwrap();
    let mut buf = Vec::new();

    send_request(&mut stream, 0, "attach_pty", (PtyId(9999),)).await;
    match recv_message(&mut stream, &mut buf).await {
        Message::Response { error, .. } => assert!(!error.is_nil(), "attach_pty on an unknown pty should return an error"),
        other => panic!("expected a response, got {other:?}"),
    }

    // the connection must still be usable after a non-fatal wire error.
    send_request(&mut stream, 1, "ping", ()).await;
    match recv_message(&mut stream, &mut buf).await {
        Message::Response { req_id, error, result } => {
            assert_eq!(req_id, 1);
            assert!(error.is_nil());
            let pong: String = from_value(result).unwrap();
            assert_eq!(pong, "pong");
        }
        other => panic!("expected a response to ping, got {other:?}"),
    }

    server.abort();
}
