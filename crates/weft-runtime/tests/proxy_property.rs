//! Cross-thread property access through an env proxy.

mod common;

use common::wait_until;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use weft_extension::{Env, Extension};
use weft_msg::Message;
use weft_runtime::App;
use weft_types::Location;
use weft_value::Value;

const APP_URI: &str = "test://app/";
const READS: usize = 200;

type Snapshots = Arc<Mutex<Vec<(i64, i64)>>>;

/// Keeps a pair of properties in lockstep on its own thread while a
/// background thread reads them through an env proxy.
struct PairOwner {
    version: i64,
    snapshots: Snapshots,
    done: Arc<AtomicBool>,
}

impl Extension for PairOwner {
    fn on_start(&mut self, env: &mut dyn Env) {
        env.set_property("pair.a", Value::from(0i64)).unwrap();
        env.set_property("pair.b", Value::from(0i64)).unwrap();

        let proxy = env.proxy();
        let snapshots = Arc::clone(&self.snapshots);
        let done = Arc::clone(&self.done);
        std::thread::spawn(move || {
            for _ in 0..READS {
                let (tx, rx) = std::sync::mpsc::channel();
                let send = proxy.notify(move |env| {
                    // The clone is mandatory: the owning thread mutates
                    // the pair between reads.
                    let a = env
                        .get_property("pair.a")
                        .and_then(|v| v.get_int64().ok())
                        .unwrap_or(-1);
                    let b = env
                        .get_property("pair.b")
                        .and_then(|v| v.get_int64().ok())
                        .unwrap_or(-1);
                    let _ = tx.send((a, b));
                });
                if send.is_err() {
                    break;
                }
                match rx.recv_timeout(Duration::from_secs(5)) {
                    Ok(pair) => snapshots.lock().unwrap().push(pair),
                    Err(_) => break,
                }
            }
            done.store(true, Ordering::SeqCst);
        });

        env.start_done().unwrap();
    }

    fn on_data(&mut self, env: &mut dyn Env, _data: Message) {
        // Both halves change within one callback; readers on the same
        // thread can never observe the intermediate state.
        self.version += 1;
        env.set_property("pair.a", Value::from(self.version)).unwrap();
        env.set_property("pair.b", Value::from(self.version)).unwrap();
    }
}

#[tokio::test]
async fn proxy_reads_observe_consistent_snapshots() {
    let snapshots: Snapshots = Arc::new(Mutex::new(Vec::new()));
    let done = Arc::new(AtomicBool::new(false));

    let mut app = App::new(APP_URI);
    {
        let snapshots = Arc::clone(&snapshots);
        let done = Arc::clone(&done);
        app.register_extension(
            "owner",
            Box::new(move |_| {
                Box::new(PairOwner {
                    version: 0,
                    snapshots: Arc::clone(&snapshots),
                    done: Arc::clone(&done),
                })
            }),
        );
    }

    let descriptor = serde_json::json!({
        "name": "pairs",
        "nodes": [
            { "type": "extension_group", "name": "g" },
            { "type": "extension", "name": "owner", "addon": "owner",
              "extension_group": "g" }
        ]
    });
    app.start_graph(&descriptor).await.unwrap();

    // Mutate continuously while the background reader runs.
    for _ in 0..500 {
        let frame = Message::data("mutate")
            .with_dest(Location::extension(APP_URI, "pairs", "g", "owner"));
        app.ingress(frame).await.unwrap();
        if done.load(Ordering::SeqCst) {
            break;
        }
    }

    wait_until(|| done.load(Ordering::SeqCst)).await;

    let snapshots = snapshots.lock().unwrap().clone();
    assert!(!snapshots.is_empty(), "reader observed nothing");
    for (a, b) in &snapshots {
        assert!(*a >= 0 && *b >= 0, "reader saw a missing property");
        assert_eq!(a, b, "reader observed a torn pair");
    }

    app.stop_graph("pairs").await.unwrap();
}

/// Emits a data frame from a foreign thread through the proxy.
struct Wakener;

impl Extension for Wakener {
    fn on_start(&mut self, env: &mut dyn Env) {
        let proxy = env.proxy();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            let _ = proxy.notify(|env| {
                env.send_data(Message::data("woke")).unwrap();
            });
        });
        env.start_done().unwrap();
    }
}

struct WakeSink {
    woke: Arc<AtomicBool>,
}

impl Extension for WakeSink {
    fn on_data(&mut self, _env: &mut dyn Env, data: Message) {
        if data.name() == "woke" {
            self.woke.store(true, Ordering::SeqCst);
        }
    }
}

#[tokio::test]
async fn proxy_wakeup_emits_through_the_normal_path() {
    let woke = Arc::new(AtomicBool::new(false));

    let mut app = App::new(APP_URI);
    app.register_extension("wakener", Box::new(|_| Box::new(Wakener)));
    {
        let woke = Arc::clone(&woke);
        app.register_extension(
            "wake_sink",
            Box::new(move |_| {
                Box::new(WakeSink {
                    woke: Arc::clone(&woke),
                })
            }),
        );
    }

    let descriptor = serde_json::json!({
        "name": "wake",
        "nodes": [
            { "type": "extension_group", "name": "g1" },
            { "type": "extension_group", "name": "g2" },
            { "type": "extension", "name": "w", "addon": "wakener",
              "extension_group": "g1" },
            { "type": "extension", "name": "s", "addon": "wake_sink",
              "extension_group": "g2" }
        ],
        "connections": [
            { "extension_group": "g1", "extension": "w",
              "data": [{ "name": "woke",
                         "dest": [{ "extension_group": "g2", "extension": "s" }] }] }
        ]
    });
    app.start_graph(&descriptor).await.unwrap();

    wait_until(|| woke.load(Ordering::SeqCst)).await;

    app.stop_graph("wake").await.unwrap();
}
