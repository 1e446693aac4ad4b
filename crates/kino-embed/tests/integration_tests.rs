//! Integration tests for Kino Embed

use kino_embed::headless::{HeadlessHost, HostOp};
use kino_embed::{
    compose, BridgeState, EmbedBridge, EmbedConfig, EmbedContext, EmbedEvent, EmbedEvents,
    EmbedParams, InboundMessage, InstanceId, JsonDecoder,
};
use serde_json::json;
use std::rc::Rc;

fn drain(events: &mut EmbedEvents) -> Vec<EmbedEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

fn page() -> (Rc<HeadlessHost>, Rc<EmbedContext>) {
    let host = Rc::new(HeadlessHost::new());
    let ctx = EmbedContext::new(host.clone());
    (host, ctx)
}

// =============================================================================
// Composition
// =============================================================================

#[test]
fn test_compose_identity_and_determinism() {
    let params = EmbedParams::new();
    for base in ["https://player.example/embed/abc", "https://a.b?x=1", ""] {
        assert_eq!(compose(base, &params), base);
    }

    let config = EmbedConfig::new("https://player.example/embed/abc")
        .with_param("autoplay", 1)
        .with_param("loop", false);
    assert_eq!(config.composed_url(), config.composed_url());
}

// =============================================================================
// Lazy loading
// =============================================================================

#[test]
fn test_lazy_embed_scenario() {
    let (host, ctx) = page();
    let config = EmbedConfig::new("https://player.example/embed/abc").with_param("autoplay", 1);
    let (bridge, mut events) = EmbedBridge::new(ctx, config);

    bridge.start().unwrap();
    assert_eq!(bridge.composed_url(), "https://player.example/embed/abc?autoplay=1");

    let handle = bridge.context_handle().unwrap();
    assert_eq!(host.frame(handle).unwrap().source(), None);

    host.set_visible(&bridge.dom_id(), true);
    host.set_visible(&bridge.dom_id(), false);
    host.set_visible(&bridge.dom_id(), true);

    let set_sources: Vec<_> = host
        .ops()
        .into_iter()
        .filter(|op| matches!(op, HostOp::SetSource { .. }))
        .collect();
    assert_eq!(
        set_sources,
        vec![HostOp::SetSource {
            handle,
            url: "https://player.example/embed/abc?autoplay=1".into()
        }]
    );

    host.complete_load(handle);
    assert_eq!(
        drain(&mut events),
        vec![
            EmbedEvent::SourceChanged {
                url: "https://player.example/embed/abc?autoplay=1".into()
            },
            EmbedEvent::Loaded,
        ]
    );
    assert_eq!(bridge.state(), BridgeState::Loaded);
}

#[test]
fn test_embeds_enter_viewport_independently() {
    let (host, ctx) = page();
    let (first, _e1) = EmbedBridge::new(ctx.clone(), EmbedConfig::new("https://player.example/1"));
    let (second, _e2) = EmbedBridge::new(ctx, EmbedConfig::new("https://player.example/2"));
    first.start().unwrap();
    second.start().unwrap();

    assert_eq!(first.id(), InstanceId(1));
    assert_eq!(second.id(), InstanceId(2));
    assert_ne!(first.dom_id(), second.dom_id());

    host.set_visible(&second.dom_id(), true);
    assert_eq!(first.state(), BridgeState::WaitingForViewport);
    assert_eq!(second.state(), BridgeState::Armed);
}

// =============================================================================
// Preconnect
// =============================================================================

#[test]
fn test_preconnect_hints_scenario() {
    let (host, ctx) = page();
    let config = EmbedConfig::new("")
        .with_preconnect_hints(["https://cdn.a", "https://cdn.b"]);
    let (bridge, _events) = EmbedBridge::new(ctx, config);
    bridge.start().unwrap();

    let mut hinted = host.preconnects();
    hinted.sort();
    assert_eq!(hinted, vec!["https://cdn.a", "https://cdn.b"]);

    host.set_visible(&bridge.dom_id(), true);
    bridge.set_preconnect_hints(vec!["https://cdn.c".into(), "https://cdn.d".into()]);
    assert_eq!(host.preconnects().len(), 2);
}

#[test]
fn test_registry_shared_across_embeds() {
    let (host, ctx) = page();
    let config = EmbedConfig::new("https://player.example/embed/a")
        .with_preconnect_hints(["https://cdn.a"]);
    let (first, _e1) = EmbedBridge::new(ctx.clone(), config.clone());
    let (second, _e2) = EmbedBridge::new(ctx.clone(), config.with_param("v", 2));
    first.start().unwrap();
    second.start().unwrap();

    assert_eq!(host.preconnects(), vec!["https://player.example", "https://cdn.a"]);
    assert_eq!(ctx.hinter().len(), 2);
}

#[test]
fn test_preconnect_failures_are_ignored() {
    let (host, ctx) = page();
    host.fail_preconnects(true);
    let (bridge, _events) = EmbedBridge::new(ctx, EmbedConfig::new("https://player.example/a"));

    bridge.start().unwrap();
    host.set_visible(&bridge.dom_id(), true);
    assert_eq!(bridge.state(), BridgeState::Armed);
}

// =============================================================================
// Messaging
// =============================================================================

#[test]
fn test_evil_origin_scenario() {
    let (host, ctx) = page();
    let config = EmbedConfig::eager("https://player.example/embed/abc")
        .with_origin("https://player.example");
    let (bridge, mut events) = EmbedBridge::new(ctx, config);
    bridge.start().unwrap();
    drain(&mut events);

    let handle = bridge.context_handle().unwrap();
    host.dispatch(InboundMessage::new(handle, "https://evil.example", json!({"event": "x"})));
    assert!(drain(&mut events).is_empty());
}

#[test]
fn test_cross_instance_messages_rejected() {
    let (host, ctx) = page();
    let (first, mut first_events) =
        EmbedBridge::new(ctx.clone(), EmbedConfig::eager("https://player.example/1"));
    let (second, mut second_events) =
        EmbedBridge::new(ctx, EmbedConfig::eager("https://player.example/2"));
    first.start().unwrap();
    second.start().unwrap();
    drain(&mut first_events);
    drain(&mut second_events);

    // A page-wide listener sees everything; each bridge must still only take its own
    let from_second = second.context_handle().unwrap();
    host.broadcast(InboundMessage::new(from_second, "https://player.example", json!({"n": 2})));

    assert!(drain(&mut first_events).is_empty());
    assert_eq!(
        drain(&mut second_events),
        vec![EmbedEvent::MessageReceived { payload: json!({"n": 2}) }]
    );
}

#[test]
fn test_json_decoder_end_to_end() {
    let (host, ctx) = page();
    let config = EmbedConfig::eager("https://player.example/a").with_decoder(JsonDecoder);
    let (bridge, mut events) = EmbedBridge::new(ctx, config);
    bridge.start().unwrap();
    drain(&mut events);

    let handle = bridge.context_handle().unwrap();
    host.dispatch(InboundMessage::new(handle, "https://player.example", json!(r#"{"event":"ready"}"#)));
    host.dispatch(InboundMessage::new(handle, "https://player.example", json!("")));

    assert_eq!(
        drain(&mut events),
        vec![EmbedEvent::MessageReceived { payload: json!({"event": "ready"}) }]
    );
}

#[test]
fn test_post_before_arming_scenario() {
    let (host, ctx) = page();
    let (bridge, _events) = EmbedBridge::new(ctx, EmbedConfig::new("https://player.example/a"));
    bridge.start().unwrap();

    assert!(bridge.post_message(&json!({"cmd": "play"}), None).is_ok());
    assert!(!host.ops().iter().any(|op| matches!(op, HostOp::Post { .. })));
}

#[test]
fn test_detached_embed_is_inert() {
    let (host, ctx) = page();
    let (bridge, mut events) = EmbedBridge::new(ctx, EmbedConfig::eager("https://player.example/a"));
    bridge.start().unwrap();
    let handle = bridge.context_handle().unwrap();
    drain(&mut events);

    bridge.stop();
    host.broadcast(InboundMessage::new(handle, "https://player.example", json!({"late": true})));
    host.complete_load(handle);
    assert!(bridge.post_message(&json!({"cmd": "play"}), None).is_ok());

    assert!(drain(&mut events).is_empty());
    assert_eq!(host.subscription_count(), 0);
}
