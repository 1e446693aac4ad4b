//! Lazy embed example
//!
//! Walks one lazy embed through its lifecycle on the headless host and prints
//! what the host was asked to do at each step.
//!
//! Run with: cargo run -p kino-embed --example lazy_embed

use kino_embed::headless::HeadlessHost;
use kino_embed::{EmbedBridge, EmbedConfig, EmbedContext, InboundMessage, JsonDecoder};
use serde_json::json;
use std::rc::Rc;

fn main() {
    println!("Kino Embed - Lazy Embed Example");
    println!("===============================\n");

    let host = Rc::new(HeadlessHost::new());
    let ctx = EmbedContext::new(host.clone());

    let config = EmbedConfig::new("https://player.example/embed/abc")
        .with_title("Launch trailer")
        .with_param("autoplay", 1)
        .with_origin("https://player.example")
        .with_preconnect_hints(["https://cdn.player.example"])
        .with_decoder(JsonDecoder);

    let (bridge, mut events) = EmbedBridge::new(ctx, config);
    let mut seen = 0;
    let mut step = |label: &str| {
        println!("{} [{}]", label, bridge.state());
        let ops = host.ops();
        for op in &ops[seen..] {
            println!("  host: {}", op);
        }
        seen = ops.len();
        while let Ok(event) = events.try_recv() {
            println!("  event: {:?}", event);
        }
    };

    bridge.start().expect("start embed");
    step("Started");

    host.set_visible(&bridge.dom_id(), true);
    step("Entered viewport");

    let handle = bridge.context_handle().expect("context handle");
    host.complete_load(handle);
    step("Loaded");

    host.dispatch(InboundMessage::new(handle, "https://evil.example", json!(r#"{"event":"spoof"}"#)));
    host.dispatch(InboundMessage::new(handle, "https://player.example", json!(r#"{"event":"ready"}"#)));
    step("Messages delivered");

    bridge
        .post_message(&json!({"cmd": "play"}), Some("https://player.example"))
        .expect("post message");
    step("Posted play");

    bridge.stop();
    step("Stopped");
}
