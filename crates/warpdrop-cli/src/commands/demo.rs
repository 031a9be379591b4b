//! Demo command implementation.
//!
//! Runs a complete transfer between two sessions inside one process:
//! one session listens on a generated share code, the other connects
//! to it, and the staged payload moves through the full chunking,
//! hashing, and verification pipeline.

use std::time::Duration;

use anyhow::{bail, Context, Result};

use warpdrop_core::file::{format_size, FilePayload};
use warpdrop_core::history::HistoryStore;
use warpdrop_core::session::{SessionController, SessionOptions, SessionStatus};
use warpdrop_core::transport::memory::MemoryHub;

use super::{DemoArgs, SendTextArgs};

/// Run the send-text command: a text-only loopback transfer.
pub async fn run_text(args: SendTextArgs) -> Result<()> {
    run(DemoArgs {
        paths: Vec::new(),
        text: Some(args.text),
        output: std::path::PathBuf::from("."),
        no_save: true,
    })
    .await
}

/// Run the demo command.
pub async fn run(args: DemoArgs) -> Result<()> {
    if args.paths.is_empty() && args.text.is_none() {
        bail!("nothing to send: pass file paths, --text, or both");
    }

    let mut files = Vec::with_capacity(args.paths.len());
    for path in &args.paths {
        let payload = FilePayload::from_path(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        println!("  Staged {} ({})", payload.name, format_size(payload.size()));
        files.push(payload);
    }

    let hub = MemoryHub::new();

    let config = super::load_config();
    let options = SessionOptions {
        code_expiry: Duration::from_secs(config.transfer.code_expire_secs),
        chunk_size: config.transfer.chunk_size,
        ..SessionOptions::default()
    };

    let (receiver_ctrl, receiver) = SessionController::with_options(hub.clone(), options.clone());
    let receiver_ctrl = match HistoryStore::load() {
        Ok(store) => receiver_ctrl.with_history(store),
        Err(e) => {
            tracing::warn!(error = %e, "history unavailable, not recording");
            receiver_ctrl
        }
    };
    receiver_ctrl.spawn();

    let (sender_ctrl, sender) = SessionController::with_options(hub, options);
    sender_ctrl.spawn();

    receiver.listen().await?;
    let code = receiver
        .wait_for(|s| s.code.is_some())
        .await?
        .code
        .context("no share code")?;
    println!();
    println!("  Share code: {code}");

    sender.connect(&code).await?;
    let connected = sender.wait_for(|s| s.peer_ready || s.error.is_some()).await?;
    if let Some(error) = connected.error {
        bail!("connect failed: {error}");
    }

    if let Some(text) = args.text {
        sender.stage_text(text).await?;
    }
    if !files.is_empty() {
        sender.stage_files(files).await?;
    }
    sender.send_now().await?;

    let done = receiver
        .wait_for(|s| {
            s.status == SessionStatus::Completed || s.status == SessionStatus::Failed
        })
        .await?;

    if done.status == SessionStatus::Failed {
        bail!(
            "transfer failed: {}",
            done.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }

    println!();
    if let Some(text) = &done.received_text {
        println!("  Received text: {text}");
    }
    if let Some(file) = &done.received_file {
        let verified = if done.verified == Some(true) {
            "verified"
        } else {
            "VERIFICATION FAILED"
        };
        println!(
            "  Received {} ({}, {verified})",
            file.name,
            format_size(file.size())
        );

        if !args.no_save {
            let written = file.save_to(&args.output)?;
            println!("  Saved to {}", written.display());
        }
    }

    sender.shutdown().await.ok();
    receiver.shutdown().await.ok();
    Ok(())
}
