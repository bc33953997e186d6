//! Engine timers.
//!
//! A `timer` command arms a task that posts `timeout` commands back at
//! the requesting extension; path deadlines use one-shot tasks feeding
//! the same engine inbox. Cancelling aborts the task; firing into a
//! closed engine ends it.

use crate::engine::EngineInput;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use weft_msg::Message;
use weft_types::Location;

/// Armed timers of one engine, keyed by timer id.
#[derive(Default)]
pub(crate) struct TimerTable {
    tasks: HashMap<String, tokio::task::JoinHandle<()>>,
}

impl TimerTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Arms (or re-arms) a timer firing every `interval`.
    ///
    /// `times` bounds the number of firings; `0` fires until cancelled.
    pub(crate) fn arm(
        &mut self,
        timer_id: String,
        interval: Duration,
        times: i64,
        dest: Location,
        tx: mpsc::UnboundedSender<EngineInput>,
    ) {
        self.cancel(&timer_id);
        let id = timer_id.clone();
        let task = tokio::spawn(async move {
            let mut fired = 0i64;
            loop {
                tokio::time::sleep(interval).await;
                let msg = Message::timeout(&id).with_dest(dest.clone());
                if tx.send(EngineInput::TimerFired { msg }).is_err() {
                    break;
                }
                fired += 1;
                if times > 0 && fired >= times {
                    break;
                }
            }
        });
        self.tasks.insert(timer_id, task);
    }

    /// Aborts a timer. Unknown ids are a no-op.
    pub(crate) fn cancel(&mut self, timer_id: &str) {
        if let Some(task) = self.tasks.remove(timer_id) {
            task.abort();
        }
    }

    /// Aborts everything; used by the stop protocol.
    pub(crate) fn abort_all(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

impl Drop for TimerTable {
    fn drop(&mut self) {
        self.abort_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn timer_fires_the_requested_number_of_times() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = TimerTable::new();
        timers.arm(
            "t".into(),
            Duration::from_millis(5),
            2,
            Location::extension("u", "0", "g", "a"),
            tx,
        );

        let mut fired = 0;
        while let Ok(Some(input)) =
            tokio::time::timeout(Duration::from_millis(200), rx.recv()).await
        {
            let EngineInput::TimerFired { msg } = input else {
                panic!("unexpected input");
            };
            assert_eq!(msg.name(), "timeout");
            assert_eq!(msg.dests()[0].extension.as_deref(), Some("a"));
            fired += 1;
            if fired == 2 {
                break;
            }
        }
        assert_eq!(fired, 2);

        // Task ended by itself; nothing further arrives.
        assert!(
            tokio::time::timeout(Duration::from_millis(30), rx.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn cancel_stops_a_periodic_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = TimerTable::new();
        timers.arm(
            "t".into(),
            Duration::from_millis(5),
            0,
            Location::extension("u", "0", "g", "a"),
            tx,
        );

        // Let it fire at least once, then cancel.
        assert!(rx.recv().await.is_some());
        timers.cancel("t");

        // Drain whatever was already in flight, then silence.
        tokio::time::sleep(Duration::from_millis(20)).await;
        while rx.try_recv().is_ok() {}
        assert!(
            tokio::time::timeout(Duration::from_millis(30), rx.recv())
                .await
                .is_err()
        );
    }
}
