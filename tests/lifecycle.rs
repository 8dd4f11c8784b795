//! Host recreation, teardown and the event pump

mod common;

use std::time::Duration;

use common::{names, setup, RecordingAuthority};
use futures::channel::mpsc;
use futures::StreamExt;
use grant_coordinator::{
    AnchorRuntime, CapabilityResult, CoordinatorConfig, CoordinatorError, LifecycleAnchor,
    RequestCoordinator,
};

/// Poll a stream once so pending trigger firings register, without waiting
async fn poll_once<S: futures::Stream + Unpin>(stream: &mut S) {
    let _ = tokio::time::timeout(Duration::from_millis(10), stream.next()).await;
}

#[tokio::test]
async fn two_trigger_subscribers_survive_host_recreation() {
    let (coordinator, first_host) = setup();
    let anchor = coordinator.anchor().clone();

    let (fire_a, trigger_a) = mpsc::unbounded();
    let (fire_b, trigger_b) = mpsc::unbounded();
    let mut first = coordinator.ensure(trigger_a, ["CAMERA"]).unwrap();
    let mut second = coordinator.ensure(trigger_b, ["CAMERA"]).unwrap();

    fire_a.unbounded_send(()).unwrap();
    fire_b.unbounded_send(()).unwrap();
    poll_once(&mut first).await;
    poll_once(&mut second).await;

    // The second subscriber joined the first one's prompt
    assert_eq!(first_host.prompt_count(), 1);
    let code = first_host.prompts()[0].request_code;

    // Host torn down and recreated while the prompt is showing
    anchor.detach();
    drop(first_host);
    let second_host = RecordingAuthority::new();
    anchor.attach(second_host.clone()).unwrap();
    assert_eq!(second_host.prompt_count(), 0);
    assert!(anchor.is_pending("CAMERA"));

    anchor.on_result(code, names(&["CAMERA"]), vec![true]).unwrap();

    assert!(first.next().await.unwrap().unwrap());
    assert!(second.next().await.unwrap().unwrap());

    // Streams end with their triggers
    drop(fire_a);
    drop(fire_b);
    assert!(first.next().await.is_none());
    assert!(second.next().await.is_none());
}

#[tokio::test]
async fn answer_while_detached_still_resolves() {
    let (coordinator, host) = setup();
    host.allow_rationale("MIC");
    let anchor = coordinator.anchor().clone();

    let aggregator = coordinator.request(["MIC"]).unwrap();
    let code = host.prompts()[0].request_code;
    anchor.detach();

    // No host to ask about rationale, so none is reported
    anchor.on_result(code, names(&["MIC"]), vec![false]).unwrap();
    assert_eq!(
        aggregator.combined().await,
        Some(CapabilityResult::new("MIC", false, false))
    );

    assert!(matches!(
        coordinator.request(["MIC"]),
        Err(CoordinatorError::HostDetached)
    ));
}

#[tokio::test]
async fn queued_prompt_waits_for_new_host() {
    let (coordinator, first_host) = setup();
    let anchor = coordinator.anchor().clone();

    let a = coordinator.request(["A"]).unwrap();
    let b = coordinator.request(["B"]).unwrap();
    let code = first_host.prompts()[0].request_code;

    anchor.detach();
    anchor.on_result(code, names(&["A"]), vec![true]).unwrap();
    assert_eq!(a.all_granted().await, Some(true));

    // B can't be shown until a host is back
    assert_eq!(anchor.queued_prompts(), 1);
    let second_host = RecordingAuthority::new();
    anchor.attach(second_host.clone()).unwrap();

    let prompts = second_host.prompts();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].names, names(&["B"]));
    anchor
        .on_result(prompts[0].request_code, names(&["B"]), vec![true])
        .unwrap();
    assert_eq!(b.all_granted().await, Some(true));
}

#[tokio::test]
async fn destroy_denies_everything_pending() {
    let (coordinator, _host) = setup();
    let anchor = coordinator.anchor().clone();

    let (fire, trigger) = mpsc::unbounded();
    let mut gated = coordinator.ensure_each(trigger, ["X"]).unwrap();
    let plain = coordinator.request(["X", "Y"]).unwrap();

    fire.unbounded_send(()).unwrap();
    poll_once(&mut gated).await;

    assert_eq!(anchor.destroy(), 2);
    assert!(anchor.is_destroyed());
    assert_eq!(anchor.pending_count(), 0);

    assert_eq!(
        gated.next().await.unwrap().unwrap(),
        CapabilityResult::denied("X")
    );
    assert_eq!(plain.all_granted().await, Some(false));

    // Later firings report the teardown
    fire.unbounded_send(()).unwrap();
    assert!(matches!(
        gated.next().await,
        Some(Err(CoordinatorError::AnchorDestroyed))
    ));
    assert!(matches!(
        coordinator.request(["X"]),
        Err(CoordinatorError::AnchorDestroyed)
    ));
}

#[tokio::test]
async fn dropping_last_handle_denies_pending() {
    let anchor = LifecycleAnchor::new();
    let host = RecordingAuthority::new();
    anchor.attach(host.clone()).unwrap();

    let aggregator = RequestCoordinator::new(anchor).request(["CAMERA"]).unwrap();

    // The coordinator and anchor are gone; the waiter still gets an answer
    assert_eq!(
        aggregator.results().await,
        Some(vec![CapabilityResult::denied("CAMERA")])
    );
}

#[tokio::test]
async fn event_pump_delivers_across_host_recreation() {
    let config = CoordinatorConfig::new().with_event_channel_size(4).with_verbose(true);
    let runtime = AnchorRuntime::with_config(config.clone());
    let (anchor, events) = runtime.spawn().await;

    let first_host = RecordingAuthority::new();
    anchor.attach(first_host.clone()).unwrap();
    let coordinator = RequestCoordinator::with_config(anchor.clone(), &config);

    let mut results = coordinator.request_each(["CAMERA", "MIC"]).unwrap();
    let prompt = first_host.prompts()[0].clone();

    anchor.detach();
    anchor.attach(RecordingAuthority::new()).unwrap();

    events
        .deliver(prompt.request_code, prompt.names, vec![true, false])
        .await
        .unwrap();

    assert_eq!(results.next().await, Some(CapabilityResult::granted("CAMERA")));
    assert_eq!(results.next().await, Some(CapabilityResult::denied("MIC")));
    assert!(results.next().await.is_none());

    assert_eq!(runtime.destroy(&anchor.id()).await, Some(0));
}

#[tokio::test]
async fn event_pump_cancellation() {
    let runtime = AnchorRuntime::new();
    let (anchor, events) = runtime.spawn().await;
    let host = RecordingAuthority::new();
    anchor.attach(host.clone()).unwrap();

    let coordinator = RequestCoordinator::new(anchor.clone());
    let aggregator = coordinator.request(["X", "Y"]).unwrap();

    events.cancel(host.prompts()[0].request_code).await.unwrap();

    assert_eq!(aggregator.all_granted().await, Some(false));
    common::wait_until(|| anchor.pending_count() == 0).await;
    assert_eq!(runtime.destroy_all().await, 1);
}
