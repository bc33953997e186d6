//! Shared helpers for runtime integration tests.
#![allow(dead_code)]

use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use weft_msg::Message;

/// Generous bound for anything that should complete quickly.
pub const WAIT: Duration = Duration::from_secs(5);

/// Awaits the next egress message.
pub async fn recv_egress(rx: &mut UnboundedReceiver<Message>) -> Message {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for egress")
        .expect("egress stream closed")
}

/// Awaits the next egress message carrying the given `seq_id`.
pub async fn recv_egress_with_seq(rx: &mut UnboundedReceiver<Message>, seq_id: &str) -> Message {
    loop {
        let msg = recv_egress(rx).await;
        if msg.seq_id() == Some(seq_id) {
            return msg;
        }
    }
}

/// Polls `probe` until it returns true or the wait bound elapses.
pub async fn wait_until(mut probe: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        if probe() {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
