//! End-to-end message flow across a two-group graph.

mod common;

use common::{recv_egress, recv_egress_with_seq, wait_until};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use weft_extension::{Env, Extension};
use weft_msg::Message;
use weft_runtime::App;
use weft_types::{Location, StatusCode};
use weft_value::Value;

const APP_URI: &str = "test://app/";

/// Forwards `hello_world` to its graph destinations; answers everything
/// else itself.
struct Forwarder;

impl Extension for Forwarder {
    fn on_cmd(&mut self, env: &mut dyn Env, cmd: Message) {
        if cmd.name() == "hello_world" {
            env.send_cmd(cmd).unwrap();
        } else {
            let result = Message::cmd_result_for(StatusCode::Ok, &cmd).with_detail("default");
            env.return_result(result, &cmd).unwrap();
        }
    }
}

/// Terminal hop of the echo graph.
struct Greeter;

impl Extension for Greeter {
    fn on_cmd(&mut self, env: &mut dyn Env, cmd: Message) {
        let result =
            Message::cmd_result_for(StatusCode::Ok, &cmd).with_detail("hello world, too");
        env.return_result(result, &cmd).unwrap();
    }
}

fn echo_descriptor() -> serde_json::Value {
    serde_json::json!({
        "name": "0",
        "nodes": [
            { "type": "extension_group", "name": "g1" },
            { "type": "extension_group", "name": "g2" },
            { "type": "extension", "name": "a", "addon": "forwarder",
              "extension_group": "g1" },
            { "type": "extension", "name": "b", "addon": "greeter",
              "extension_group": "g2" }
        ],
        "connections": [
            { "extension_group": "g1", "extension": "a",
              "cmd": [{ "name": "hello_world",
                        "dest": [{ "extension_group": "g2", "extension": "b" }] }] }
        ]
    })
}

async fn echo_app() -> App {
    let mut app = App::new(APP_URI);
    app.register_extension("forwarder", Box::new(|_| Box::new(Forwarder)));
    app.register_extension("greeter", Box::new(|_| Box::new(Greeter)));
    app.start_graph(&echo_descriptor()).await.unwrap();
    app
}

#[tokio::test]
async fn echo_across_two_groups() {
    let mut app = echo_app().await;
    let mut egress = app.take_egress().unwrap();

    // The client speaks the JSON envelope form.
    let cmd = Message::from_envelope(
        r#"{
            "_ten": {
                "name": "hello_world",
                "seq_id": "137",
                "dest": [{
                    "app": "test://app/",
                    "graph": "0",
                    "extension_group": "g1",
                    "extension": "a"
                }]
            }
        }"#,
    )
    .unwrap();
    app.ingress(cmd).await.unwrap();

    let result = recv_egress_with_seq(&mut egress, "137").await;
    assert_eq!(result.status_code(), Some(StatusCode::Ok));
    assert_eq!(result.detail(), Some("hello world, too"));
    assert_eq!(result.is_final(), Some(true));

    app.stop_graph("0").await.unwrap();
}

#[tokio::test]
async fn default_on_cmd_answers_with_default_detail() {
    let mut app = echo_app().await;
    let mut egress = app.take_egress().unwrap();

    let mut cmd = Message::cmd("ping");
    cmd.set_seq_id("9");
    cmd.add_dest(Location::extension(APP_URI, "0", "g1", "a"));
    app.ingress(cmd).await.unwrap();

    let result = recv_egress_with_seq(&mut egress, "9").await;
    assert_eq!(result.status_code(), Some(StatusCode::Ok));
    assert_eq!(result.detail(), Some("default"));

    app.stop_graph("0").await.unwrap();
}

#[tokio::test]
async fn start_graph_over_the_wire_envelope() {
    let mut app = App::new(APP_URI);
    app.register_extension("forwarder", Box::new(|_| Box::new(Forwarder)));
    app.register_extension("greeter", Box::new(|_| Box::new(Greeter)));
    let mut egress = app.take_egress().unwrap();

    let mut start = Message::start_graph(Value::from_serde_json(echo_descriptor()));
    start.set_seq_id("1");
    app.ingress(start).await.unwrap();

    let reply = recv_egress_with_seq(&mut egress, "1").await;
    assert_eq!(reply.status_code(), Some(StatusCode::Ok));
    assert_eq!(
        reply.peek_property("graph_id").unwrap().get_string().unwrap(),
        "0"
    );

    // The graph is live: drive the echo path.
    let mut cmd = Message::cmd("hello_world");
    cmd.set_seq_id("2");
    cmd.add_dest(Location::extension(APP_URI, "0", "g1", "a"));
    app.ingress(cmd).await.unwrap();
    let result = recv_egress_with_seq(&mut egress, "2").await;
    assert_eq!(result.detail(), Some("hello world, too"));

    // And stop it over the wire too.
    let mut stop = Message::stop_graph();
    stop.set_seq_id("3");
    stop.add_dest(Location::graph(APP_URI, "0"));
    app.ingress(stop).await.unwrap();
    let stopped = recv_egress_with_seq(&mut egress, "3").await;
    assert_eq!(stopped.status_code(), Some(StatusCode::Ok));
    assert!(app.graph_ids().is_empty());
}

#[tokio::test]
async fn start_graph_with_missing_addon_rolls_back() {
    let mut app = App::new(APP_URI);
    // Only one of the two addons is registered.
    app.register_extension("forwarder", Box::new(|_| Box::new(Forwarder)));

    let err = app.start_graph(&echo_descriptor()).await.unwrap_err();
    assert!(err.to_string().contains("greeter"));
    assert!(app.graph_ids().is_empty());
}

/// Emits a burst of numbered data frames toward its graph destinations.
struct Producer;

impl Extension for Producer {
    fn on_cmd(&mut self, env: &mut dyn Env, cmd: Message) {
        let count = cmd
            .peek_property("count")
            .and_then(|v| v.get_int64().ok())
            .unwrap_or(0);
        for n in 0..count {
            let mut frame = Message::data("numbered");
            frame.set_property("n", Value::from(n)).unwrap();
            env.send_data(frame).unwrap();
        }
        let result = Message::cmd_result_for(StatusCode::Ok, &cmd).with_detail("burst sent");
        env.return_result(result, &cmd).unwrap();
    }
}

struct OrderRecorder {
    seen: Arc<Mutex<Vec<i64>>>,
    count: Arc<AtomicUsize>,
}

impl Extension for OrderRecorder {
    fn on_data(&mut self, _env: &mut dyn Env, data: Message) {
        let n = data
            .peek_property("n")
            .and_then(|v| v.get_int64().ok())
            .unwrap_or(-1);
        self.seen.lock().unwrap().push(n);
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn messages_between_one_pair_arrive_in_order() {
    const BURST: i64 = 200;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let count = Arc::new(AtomicUsize::new(0));

    let mut app = App::new(APP_URI);
    app.register_extension("producer", Box::new(|_| Box::new(Producer)));
    {
        let seen = Arc::clone(&seen);
        let count = Arc::clone(&count);
        app.register_extension(
            "recorder",
            Box::new(move |_| {
                Box::new(OrderRecorder {
                    seen: Arc::clone(&seen),
                    count: Arc::clone(&count),
                })
            }),
        );
    }

    let descriptor = serde_json::json!({
        "name": "fifo",
        "nodes": [
            { "type": "extension_group", "name": "g1" },
            { "type": "extension_group", "name": "g2" },
            { "type": "extension", "name": "src", "addon": "producer",
              "extension_group": "g1" },
            { "type": "extension", "name": "dst", "addon": "recorder",
              "extension_group": "g2" }
        ],
        "connections": [
            { "extension_group": "g1", "extension": "src",
              "data": [{ "name": "numbered",
                         "dest": [{ "extension_group": "g2", "extension": "dst" }] }] }
        ]
    });
    app.start_graph(&descriptor).await.unwrap();
    let mut egress = app.take_egress().unwrap();

    let mut burst = Message::cmd("burst");
    burst.set_seq_id("b");
    burst.set_property("count", Value::from(BURST)).unwrap();
    burst.add_dest(Location::extension(APP_URI, "fifo", "g1", "src"));
    app.ingress(burst).await.unwrap();

    let reply = recv_egress(&mut egress).await;
    assert_eq!(reply.detail(), Some("burst sent"));

    wait_until(|| count.load(Ordering::SeqCst) == BURST as usize).await;
    let seen = seen.lock().unwrap().clone();
    let expected: Vec<i64> = (0..BURST).collect();
    assert_eq!(seen, expected);

    app.stop_graph("fifo").await.unwrap();
}
