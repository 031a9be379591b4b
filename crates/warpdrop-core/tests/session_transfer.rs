//! End-to-end transfer tests over the in-process transport.
//!
//! Two session tasks rendezvous through a shared `MemoryHub`, exactly
//! as two networked peers would through a real transport.

use std::time::Duration;

use tokio::time::timeout;

use warpdrop_core::code::WarpCode;
use warpdrop_core::file::FilePayload;
use warpdrop_core::hash;
use warpdrop_core::protocol::{decode_chunk, encode_chunk, WireMessage};
use warpdrop_core::session::{SessionController, SessionHandle, SessionOptions, SessionStatus};
use warpdrop_core::transport::memory::MemoryHub;
use warpdrop_core::transport::{ChannelEvent, Transport};

const WAIT: Duration = Duration::from_secs(5);

fn spawn_session(hub: &MemoryHub) -> SessionHandle {
    let (controller, handle) = SessionController::new(hub.clone());
    controller.spawn();
    handle
}

fn spawn_session_with(hub: &MemoryHub, options: SessionOptions) -> SessionHandle {
    let (controller, handle) = SessionController::with_options(hub.clone(), options);
    controller.spawn();
    handle
}

async fn wait_for<F>(handle: &SessionHandle, predicate: F) -> warpdrop_core::session::SessionSnapshot
where
    F: FnMut(&warpdrop_core::session::SessionSnapshot) -> bool,
{
    timeout(WAIT, handle.wait_for(predicate))
        .await
        .expect("timed out waiting for session state")
        .expect("session task gone")
}

async fn listening_code(handle: &SessionHandle) -> String {
    handle.listen().await.expect("listen");
    wait_for(handle, |s| s.code.is_some())
        .await
        .code
        .expect("code")
}

#[tokio::test]
async fn test_file_transfer_end_to_end() {
    let hub = MemoryHub::new();
    let receiver = spawn_session(&hub);
    let sender = spawn_session(&hub);

    let code = listening_code(&receiver).await;

    // Codes are matched case-insensitively.
    sender.connect(&code.to_lowercase()).await.expect("connect");
    wait_for(&sender, |s| s.peer_ready).await;
    wait_for(&receiver, |s| s.status == SessionStatus::Connected).await;

    let content: Vec<u8> = (0..50 * 1024).map(|i| (i % 251) as u8).collect();
    let payload = FilePayload::new("data.bin", "application/octet-stream", content.clone());

    sender.stage_files(vec![payload]).await.expect("stage");
    sender.send_now().await.expect("send");

    let done = wait_for(&sender, |s| s.status == SessionStatus::Completed).await;
    assert!((done.progress - 100.0).abs() < f64::EPSILON);

    let received = wait_for(&receiver, |s| s.status == SessionStatus::Completed).await;
    assert_eq!(received.verified, Some(true));
    assert!(received.error.is_none());

    let file = received.received_file.expect("received file");
    assert_eq!(file.name, "data.bin");
    assert_eq!(file.bytes, content);
}

#[tokio::test]
async fn test_connect_to_unknown_code_surfaces_error_and_allows_retry() {
    let hub = MemoryHub::new();
    let receiver = spawn_session(&hub);
    let sender = spawn_session(&hub);

    sender.connect("Cosmic-Falcon").await.expect("connect");
    let missed = wait_for(&sender, |s| s.error.is_some()).await;
    assert_eq!(missed.status, SessionStatus::Idle);

    // The same session can dial again once a live code exists.
    let code = listening_code(&receiver).await;
    sender.connect(&code).await.expect("connect");
    let connected = wait_for(&sender, |s| s.peer_ready).await;
    assert_eq!(connected.status, SessionStatus::Connected);
    assert!(connected.error.is_none());
}

#[tokio::test]
async fn test_failed_connect_keeps_listening_code() {
    let hub = MemoryHub::new();
    let session = spawn_session(&hub);
    let code = listening_code(&session).await;

    let dead_code = if code == "Hidden-Lantern" {
        "Silver-Raven"
    } else {
        "Hidden-Lantern"
    };
    session.connect(dead_code).await.expect("connect");

    let snapshot = wait_for(&session, |s| s.error.is_some()).await;
    assert_eq!(snapshot.status, SessionStatus::Listening);
    assert_eq!(snapshot.code.as_deref(), Some(code.as_str()));

    // The claimed identifier still answers.
    let channel_id = WarpCode::parse(&code).expect("parse").channel_id();
    assert!(hub.connect(&channel_id).await.is_ok());
}

#[tokio::test]
async fn test_malformed_code_rejected_before_dialing() {
    let hub = MemoryHub::new();
    let sender = spawn_session(&hub);

    assert!(sender.connect("not a code").await.is_err());
    assert!(sender.connect("lonelyword").await.is_err());
    assert_eq!(sender.snapshot().status, SessionStatus::Idle);
}

#[tokio::test]
async fn test_tampered_payload_flagged_but_delivered() {
    let hub = MemoryHub::new();
    let receiver = spawn_session(&hub);
    let code = listening_code(&receiver).await;

    // Drive the wire protocol by hand so the advertised digest no
    // longer matches the bytes actually sent.
    let channel_id = WarpCode::parse(&code).expect("parse").channel_id();
    let channel = hub.connect(&channel_id).await.expect("connect");
    channel.send(WireMessage::Ready).await.expect("ready");

    let mut content = b"original content".to_vec();
    let digest = hash::digest(&content);
    content[0] ^= 0x01;

    channel
        .send(WireMessage::FileMeta {
            name: "tampered.bin".to_string(),
            size: content.len() as u64,
            file_type: "application/octet-stream".to_string(),
            hash: digest,
            has_text: false,
        })
        .await
        .expect("meta");
    channel.send(encode_chunk(0, &content)).await.expect("chunk");
    channel
        .send(WireMessage::TransferComplete)
        .await
        .expect("complete");

    let done = wait_for(&receiver, |s| s.status == SessionStatus::Completed).await;
    assert_eq!(done.verified, Some(false));
    assert!(done.error.expect("error").contains("mismatch"));

    // The payload still reaches the caller, flagged unverified.
    let file = done.received_file.expect("file");
    assert_eq!(file.bytes, content);
}

#[tokio::test]
async fn test_chunks_reassembled_by_index() {
    let hub = MemoryHub::new();
    let receiver = spawn_session(&hub);
    let code = listening_code(&receiver).await;

    let channel_id = WarpCode::parse(&code).expect("parse").channel_id();
    let channel = hub.connect(&channel_id).await.expect("connect");
    channel.send(WireMessage::Ready).await.expect("ready");

    let parts: [&[u8]; 3] = [b"first-", b"second-", b"third"];
    let content: Vec<u8> = parts.concat();

    channel
        .send(WireMessage::FileMeta {
            name: "parts.txt".to_string(),
            size: content.len() as u64,
            file_type: "text/plain".to_string(),
            hash: hash::digest(&content),
            has_text: false,
        })
        .await
        .expect("meta");

    // Deliver out of order; the receiver sorts by chunk index.
    for index in [2usize, 0, 1] {
        channel
            .send(encode_chunk(index as u64, parts[index]))
            .await
            .expect("chunk");
    }
    channel
        .send(WireMessage::TransferComplete)
        .await
        .expect("complete");

    let done = wait_for(&receiver, |s| s.status == SessionStatus::Completed).await;
    assert_eq!(done.verified, Some(true));
    assert_eq!(done.received_file.expect("file").bytes, content);
}

#[tokio::test]
async fn test_corrupt_chunk_fails_transfer() {
    let hub = MemoryHub::new();
    let receiver = spawn_session(&hub);
    let code = listening_code(&receiver).await;

    let channel_id = WarpCode::parse(&code).expect("parse").channel_id();
    let channel = hub.connect(&channel_id).await.expect("connect");
    channel.send(WireMessage::Ready).await.expect("ready");

    channel
        .send(WireMessage::FileMeta {
            name: "bad.bin".to_string(),
            size: 10,
            file_type: "application/octet-stream".to_string(),
            hash: "00".repeat(32),
            has_text: false,
        })
        .await
        .expect("meta");
    channel
        .send(WireMessage::Chunk {
            index: 0,
            data: "%%% not base64 %%%".to_string(),
        })
        .await
        .expect("chunk");

    let failed = wait_for(&receiver, |s| s.status == SessionStatus::Failed).await;
    assert!(failed.error.is_some());
    assert!(failed.received_file.is_none());
}

#[tokio::test]
async fn test_code_rotates_after_expiry() {
    let hub = MemoryHub::new();
    let options = SessionOptions {
        code_expiry: Duration::from_millis(100),
        tick: Duration::from_millis(20),
        ..SessionOptions::default()
    };
    let receiver = spawn_session_with(&hub, options);

    let first = listening_code(&receiver).await;
    let rotated = wait_for(&receiver, |s| {
        s.code.as_deref().is_some_and(|c| c != first)
    })
    .await;
    assert_eq!(rotated.status, SessionStatus::Listening);

    // The old identifier is released along with the old listener.
    let old_id = WarpCode::parse(&first).expect("parse").channel_id();
    assert!(hub.connect(&old_id).await.is_err());

    // The new code still answers.
    let new_id = WarpCode::parse(&rotated.code.expect("code"))
        .expect("parse")
        .channel_id();
    assert!(hub.connect(&new_id).await.is_ok());
}

#[tokio::test]
async fn test_progress_is_monotonic() {
    let hub = MemoryHub::new();
    let receiver = spawn_session(&hub);
    let sender = spawn_session(&hub);

    let code = listening_code(&receiver).await;
    sender.connect(&code).await.expect("connect");
    wait_for(&sender, |s| s.peer_ready).await;

    let mut progress_rx = receiver.watch();
    let sampler = tokio::spawn(async move {
        let mut samples = Vec::new();
        loop {
            if progress_rx.changed().await.is_err() {
                break;
            }
            let snapshot = progress_rx.borrow_and_update().clone();
            samples.push(snapshot.progress);
            if snapshot.status == SessionStatus::Completed {
                break;
            }
        }
        samples
    });

    // Enough content for several hundred chunks.
    let content = vec![0xA5u8; 2 * 1024 * 1024];
    sender
        .stage_files(vec![FilePayload::new(
            "big.bin",
            "application/octet-stream",
            content,
        )])
        .await
        .expect("stage");
    sender.send_now().await.expect("send");
    wait_for(&receiver, |s| s.status == SessionStatus::Completed).await;

    let samples = timeout(WAIT, sampler)
        .await
        .expect("sampler timed out")
        .expect("sampler panicked");
    assert!(!samples.is_empty());
    for pair in samples.windows(2) {
        assert!(pair[1] >= pair[0], "progress went backwards: {pair:?}");
    }
    assert!((samples[samples.len() - 1] - 100.0).abs() < f64::EPSILON);
    // Intermediate progress never claims completion early.
    for &sample in &samples[..samples.len() - 1] {
        assert!(sample <= 99.0);
    }
}

#[tokio::test]
async fn test_empty_file_transfer() {
    let hub = MemoryHub::new();
    let receiver = spawn_session(&hub);
    let sender = spawn_session(&hub);

    let code = listening_code(&receiver).await;
    sender.connect(&code).await.expect("connect");
    wait_for(&sender, |s| s.peer_ready).await;

    sender
        .stage_files(vec![FilePayload::new("empty.txt", "text/plain", Vec::new())])
        .await
        .expect("stage");
    sender.send_now().await.expect("send");

    let done = wait_for(&receiver, |s| s.status == SessionStatus::Completed).await;
    assert_eq!(done.verified, Some(true));
    assert!(done.received_file.expect("file").bytes.is_empty());
}

#[tokio::test]
async fn test_text_only_transfer() {
    let hub = MemoryHub::new();
    let receiver = spawn_session(&hub);
    let sender = spawn_session(&hub);

    let code = listening_code(&receiver).await;
    sender.connect(&code).await.expect("connect");
    wait_for(&sender, |s| s.peer_ready).await;

    sender
        .stage_text("meet me at the usual place".to_string())
        .await
        .expect("stage");
    sender.send_now().await.expect("send");

    let done = wait_for(&receiver, |s| s.status == SessionStatus::Completed).await;
    assert_eq!(
        done.received_text.as_deref(),
        Some("meet me at the usual place")
    );
    assert!(done.received_file.is_none());

    wait_for(&sender, |s| s.status == SessionStatus::Completed).await;
}

#[tokio::test]
async fn test_text_with_file_in_one_send() {
    let hub = MemoryHub::new();
    let receiver = spawn_session(&hub);
    let sender = spawn_session(&hub);

    let code = listening_code(&receiver).await;
    sender.connect(&code).await.expect("connect");
    wait_for(&sender, |s| s.peer_ready).await;

    sender
        .stage_text("here is the file".to_string())
        .await
        .expect("stage text");
    sender
        .stage_files(vec![FilePayload::new(
            "attached.txt",
            "text/plain",
            b"attachment".to_vec(),
        )])
        .await
        .expect("stage files");
    sender.send_now().await.expect("send");

    let done = wait_for(&receiver, |s| s.status == SessionStatus::Completed).await;
    assert_eq!(done.received_text.as_deref(), Some("here is the file"));
    assert_eq!(done.received_file.expect("file").bytes, b"attachment");
}

#[tokio::test]
async fn test_oversized_text_rejected() {
    let hub = MemoryHub::new();
    let sender = spawn_session(&hub);

    let text = "x".repeat(10_001);
    assert!(sender.stage_text(text).await.is_err());
}

#[tokio::test]
async fn test_multiple_files_arrive_as_archive() {
    let hub = MemoryHub::new();
    let receiver = spawn_session(&hub);
    let sender = spawn_session(&hub);

    let code = listening_code(&receiver).await;
    sender.connect(&code).await.expect("connect");
    wait_for(&sender, |s| s.peer_ready).await;

    sender
        .stage_files(vec![
            FilePayload::new("a.txt", "text/plain", b"alpha".to_vec()),
            FilePayload::new("b.txt", "text/plain", b"beta".to_vec()),
        ])
        .await
        .expect("stage");
    sender.send_now().await.expect("send");

    let done = wait_for(&receiver, |s| s.status == SessionStatus::Completed).await;
    assert_eq!(done.verified, Some(true));

    let file = done.received_file.expect("file");
    assert_eq!(file.content_type, "application/zip");
    assert!(file.name.starts_with("warpdrop-"));

    let mut zip =
        zip::ZipArchive::new(std::io::Cursor::new(file.bytes)).expect("open archive");
    assert_eq!(zip.len(), 2);
    assert!(zip.by_name("a.txt").is_ok());
}

#[tokio::test]
async fn test_stalled_transfer_fails() {
    let hub = MemoryHub::new();
    let options = SessionOptions {
        stall_timeout: Duration::from_millis(100),
        tick: Duration::from_millis(20),
        ..SessionOptions::default()
    };
    let receiver = spawn_session_with(&hub, options);
    let code = listening_code(&receiver).await;

    let channel_id = WarpCode::parse(&code).expect("parse").channel_id();
    let channel = hub.connect(&channel_id).await.expect("connect");
    channel.send(WireMessage::Ready).await.expect("ready");

    // Announce a file, then go silent.
    channel
        .send(WireMessage::FileMeta {
            name: "never.bin".to_string(),
            size: 1024,
            file_type: "application/octet-stream".to_string(),
            hash: "00".repeat(32),
            has_text: false,
        })
        .await
        .expect("meta");

    let failed = wait_for(&receiver, |s| s.status == SessionStatus::Failed).await;
    assert!(failed.error.expect("error").contains("stalled"));
}

#[tokio::test]
async fn test_reset_returns_to_idle() {
    let hub = MemoryHub::new();
    let receiver = spawn_session(&hub);
    let sender = spawn_session(&hub);

    let code = listening_code(&receiver).await;
    sender.connect(&code).await.expect("connect");
    wait_for(&sender, |s| s.peer_ready).await;

    sender.reset().await.expect("reset");
    let idle = wait_for(&sender, |s| s.status == SessionStatus::Idle).await;
    assert!(idle.code.is_none());
    assert!(idle.error.is_none());
}

#[tokio::test]
async fn test_peer_disconnect_outside_transfer_keeps_code() {
    let hub = MemoryHub::new();
    let receiver = spawn_session(&hub);
    let code = listening_code(&receiver).await;

    let channel_id = WarpCode::parse(&code).expect("parse").channel_id();
    let channel = hub.connect(&channel_id).await.expect("connect");
    channel.send(WireMessage::Ready).await.expect("ready");
    wait_for(&receiver, |s| s.status == SessionStatus::Connected).await;

    // The peer walks away before any transfer starts.
    channel.close().await;

    let back = wait_for(&receiver, |s| s.status == SessionStatus::Listening).await;
    assert_eq!(back.code.as_deref(), Some(code.as_str()));
    assert!(!back.peer_ready);

    // A new peer can still reach the same code.
    let retry = hub.connect(&channel_id).await.expect("reconnect");
    retry.send(WireMessage::Ready).await.expect("ready");
    wait_for(&receiver, |s| s.status == SessionStatus::Connected).await;
}

#[tokio::test]
async fn test_full_reset_releases_code() {
    let hub = MemoryHub::new();
    let session = spawn_session(&hub);
    let code = listening_code(&session).await;

    session.full_reset().await.expect("full reset");
    let idle = wait_for(&session, |s| s.status == SessionStatus::Idle).await;
    assert!(idle.code.is_none());

    let channel_id = WarpCode::parse(&code).expect("parse").channel_id();
    assert!(hub.connect(&channel_id).await.is_err());
}

#[tokio::test]
async fn test_send_rejected_until_peer_ready() {
    let hub = MemoryHub::new();
    // A listener that never confirms readiness.
    let _listener = hub.listen("wd-silent-post").await.expect("listen");

    let sender = spawn_session(&hub);
    sender.connect("Silent-Post").await.expect("connect");
    wait_for(&sender, |s| s.status == SessionStatus::Connected).await;

    sender
        .stage_files(vec![FilePayload::new(
            "note.txt",
            "text/plain",
            b"too soon".to_vec(),
        )])
        .await
        .expect("stage");
    sender.send_now().await.expect("send");

    let failed = wait_for(&sender, |s| s.status == SessionStatus::Failed).await;
    assert!(failed.error.expect("error").contains("ready"));
}

#[tokio::test]
async fn test_configured_chunk_size_is_used() {
    let hub = MemoryHub::new();
    let options = SessionOptions {
        chunk_size: 4,
        ..SessionOptions::default()
    };
    let sender = spawn_session_with(&hub, options);

    let mut listener = hub.listen("wd-tiny-chunks").await.expect("listen");
    sender.connect("Tiny-Chunks").await.expect("connect");
    let mut channel = listener.accept().await.expect("accept");
    channel.send(WireMessage::Ready).await.expect("ready");
    wait_for(&sender, |s| s.peer_ready).await;

    sender
        .stage_files(vec![FilePayload::new(
            "ten.bin",
            "application/octet-stream",
            vec![7u8; 10],
        )])
        .await
        .expect("stage");
    sender.send_now().await.expect("send");
    wait_for(&sender, |s| s.status == SessionStatus::Completed).await;

    let mut chunk_sizes = Vec::new();
    loop {
        match channel.recv().await {
            ChannelEvent::Message(WireMessage::Chunk { data, .. }) => {
                chunk_sizes.push(decode_chunk(&data).expect("decode").len());
            }
            ChannelEvent::Message(WireMessage::TransferComplete) => break,
            ChannelEvent::Message(_) => {}
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert_eq!(chunk_sizes, vec![4, 4, 2]);
}

#[tokio::test]
async fn test_peer_disconnect_mid_transfer_fails() {
    let hub = MemoryHub::new();
    let receiver = spawn_session(&hub);
    let code = listening_code(&receiver).await;

    let channel_id = WarpCode::parse(&code).expect("parse").channel_id();
    let channel = hub.connect(&channel_id).await.expect("connect");
    channel.send(WireMessage::Ready).await.expect("ready");

    channel
        .send(WireMessage::FileMeta {
            name: "partial.bin".to_string(),
            size: 100,
            file_type: "application/octet-stream".to_string(),
            hash: "00".repeat(32),
            has_text: false,
        })
        .await
        .expect("meta");
    channel.send(encode_chunk(0, &[0u8; 50])).await.expect("chunk");
    channel.close().await;

    let failed = wait_for(&receiver, |s| s.status == SessionStatus::Failed).await;
    assert!(failed.error.is_some());
}

#[tokio::test]
async fn test_second_listener_gets_fresh_code() {
    let hub = MemoryHub::new();
    let first = spawn_session(&hub);
    let second = spawn_session(&hub);

    let code_a = listening_code(&first).await;
    let code_b = listening_code(&second).await;
    assert_ne!(code_a, code_b);
}
