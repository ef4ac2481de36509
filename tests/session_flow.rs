//! End-to-end session tests against the simulated recognition engine.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use scan_inventory_lib::{
    display::{ChannelRenderer, DisplayModel, DisplayRow, RenderEvent},
    inventory::Symbology,
    scanner::{
        adapter_for,
        engine::{CameraPower, Decoded},
        simulated::{SimulatedEngine, VirtualCamera},
        BackendKind, InitError, RecognitionEvent,
    },
    session::{SessionController, SessionState},
    settings::ScannerConfig,
};
use tokio::sync::mpsc::UnboundedReceiver;

struct Harness {
    session: SessionController,
    camera: VirtualCamera,
    rendered: UnboundedReceiver<RenderEvent>,
    pulses: Arc<AtomicUsize>,
}

fn licensed() -> ScannerConfig {
    ScannerConfig {
        license_key: Some("test-license".into()),
        ..ScannerConfig::default()
    }
}

fn harness(config: ScannerConfig) -> Harness {
    let (engine, camera) = SimulatedEngine::new();
    let adapter = adapter_for(config.backend, Box::new(engine));
    let (renderer, rendered) = ChannelRenderer::new();

    let pulses = Arc::new(AtomicUsize::new(0));
    let counter = pulses.clone();
    let haptics = Arc::new(move |_: Duration| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let session = SessionController::new(config, adapter, Arc::new(renderer), haptics);
    Harness {
        session,
        camera,
        rendered,
        pulses,
    }
}

fn code128(data: &str) -> Decoded {
    Decoded {
        data: data.into(),
        symbology: Symbology::Code128,
    }
}

fn event(payload: &str) -> RecognitionEvent {
    RecognitionEvent {
        payload: payload.into(),
        format: Symbology::Code128,
        captured_at: Utc::now(),
    }
}

async fn next_inventory(rendered: &mut UnboundedReceiver<RenderEvent>) -> DisplayModel {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(2), rendered.recv())
            .await
            .expect("timed out waiting for render event")
            .expect("renderer closed");
        if let RenderEvent::InventoryChanged(model) = event {
            return model;
        }
    }
}

async fn wait_for_count(h: &mut Harness, count: usize) -> DisplayModel {
    loop {
        let model = next_inventory(&mut h.rendered).await;
        if model.count() == count {
            return model;
        }
    }
}

fn rows(model: &DisplayModel) -> Vec<(usize, String)> {
    match model {
        DisplayModel::Empty => Vec::new(),
        DisplayModel::Items { rows, .. } => rows
            .iter()
            .map(|DisplayRow { ordinal, payload, .. }| (*ordinal, payload.clone()))
            .collect(),
    }
}

#[tokio::test]
async fn scan_hide_and_clear() {
    let mut h = harness(licensed());

    assert_eq!(h.session.start().await.unwrap(), SessionState::Active);
    assert_eq!(h.camera.power(), CameraPower::On);
    assert_eq!(next_inventory(&mut h.rendered).await, DisplayModel::Empty);

    let t0: DateTime<Utc> = Utc::now();
    let t1 = t0 + chrono::Duration::seconds(1);

    assert!(h.camera.present_batch(t0, vec![code128("A1")]));
    let model = wait_for_count(&mut h, 1).await;
    assert_eq!(rows(&model), vec![(1, "A1".to_string())]);

    assert!(h.camera.present_batch(t1, vec![code128("B2")]));
    let model = wait_for_count(&mut h, 2).await;
    assert_eq!(
        rows(&model),
        vec![(2, "B2".to_string()), (1, "A1".to_string())]
    );

    let items = h.session.inventory().await;
    assert_eq!(items[0].payload, "B2");
    assert_eq!(items[0].captured_at, t1);
    assert_eq!(items[1].payload, "A1");
    assert_eq!(items[1].captured_at, t0);

    assert_eq!(h.session.set_visibility(false).await, SessionState::Suspended);
    assert_eq!(h.camera.power(), CameraPower::Off);
    assert_eq!(h.camera.power_log().last(), Some(&CameraPower::Off));

    assert_eq!(h.session.clear_inventory().await, 2);
    assert_eq!(h.session.inventory_size().await, 0);
    assert_eq!(h.session.display().await, DisplayModel::Empty);
    assert_eq!(next_inventory(&mut h.rendered).await, DisplayModel::Empty);
}

#[tokio::test(start_paused = true)]
async fn missing_credential_disposes_and_notice_expires() {
    let h = harness(ScannerConfig::default());

    let err = h.session.start().await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<InitError>(),
        Some(&InitError::MissingCredential { key: "licenseKey" })
    );
    assert_eq!(h.session.state().await, SessionState::Disposed);
    assert_eq!(h.camera.open_count(), 0);

    let notice = h.session.notice().expect("error notice visible");
    assert!(notice.message.contains("licenseKey"));

    tokio::time::sleep(Duration::from_millis(4999)).await;
    assert!(h.session.notice().is_some());
    tokio::time::sleep(Duration::from_millis(2)).await;
    assert!(h.session.notice().is_none());
}

#[tokio::test]
async fn backend_failure_disposes_without_retry() {
    let h = harness(licensed());
    h.camera.fail_next_open("engine assets not found");

    let err = h.session.start().await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<InitError>(),
        Some(InitError::BackendUnavailable(_))
    ));
    assert_eq!(h.session.state().await, SessionState::Disposed);
    assert!(h.session.notice().is_some());

    // Disposed is terminal; only a reload starts over.
    assert!(h.session.start().await.is_err());
    assert_eq!(h.camera.open_count(), 0);
}

#[tokio::test]
async fn scans_outside_active_never_reach_the_ledger() {
    let h = harness(licensed());
    assert!(h.session.deliver(event("EARLY")).await.is_none());

    h.session.start().await.unwrap();
    h.session.set_visibility(false).await;

    assert!(!h.camera.present("A1", Symbology::Code128));
    assert!(h.session.deliver(event("A1")).await.is_none());
    assert_eq!(h.session.inventory_size().await, 0);

    h.session.teardown().await;
    assert!(h.session.deliver(event("LATE")).await.is_none());
    assert_eq!(h.session.inventory_size().await, 0);
}

#[tokio::test]
async fn resume_failure_stays_suspended_until_next_visibility() {
    let h = harness(licensed());
    h.session.start().await.unwrap();
    assert_eq!(h.session.set_visibility(false).await, SessionState::Suspended);

    h.camera.fail_next_power_on("camera busy");
    assert_eq!(h.session.set_visibility(true).await, SessionState::Suspended);
    let notice = h.session.notice().expect("resume failure surfaced");
    assert!(notice.message.contains("camera busy"));

    assert_eq!(h.session.set_visibility(true).await, SessionState::Active);
    assert_eq!(h.camera.power(), CameraPower::On);
}

#[tokio::test]
async fn suspend_failure_still_stops_accepting_scans() {
    let h = harness(licensed());
    h.session.start().await.unwrap();
    h.camera.fail_next_power_off("driver hung");

    assert_eq!(h.session.set_visibility(false).await, SessionState::Suspended);
    assert!(h.session.notice().is_some());
    assert!(h.session.deliver(event("A1")).await.is_none());
}

#[tokio::test]
async fn repeated_visibility_signals_are_idempotent() {
    let h = harness(licensed());
    h.session.start().await.unwrap();

    assert_eq!(h.session.set_visibility(true).await, SessionState::Active);
    h.session.set_visibility(false).await;
    assert_eq!(h.session.set_visibility(false).await, SessionState::Suspended);
    assert_eq!(
        h.camera.power_log(),
        vec![CameraPower::On, CameraPower::Off]
    );
}

#[tokio::test]
async fn teardown_powers_off_then_disposes_once() {
    let mut h = harness(licensed());
    h.session.start().await.unwrap();
    h.session.deliver(event("A1")).await.unwrap();

    assert_eq!(h.session.teardown().await, SessionState::Disposed);
    assert_eq!(h.camera.power_log().last(), Some(&CameraPower::Off));
    assert_eq!(h.camera.close_count(), 1);
    assert!(!h.camera.is_open());
    assert_eq!(h.session.inventory_size().await, 0);

    // The emptied ledger is drawn, not left showing the old rows.
    let mut last_drawn = None;
    while let Ok(event) = h.rendered.try_recv() {
        if let RenderEvent::InventoryChanged(model) = event {
            last_drawn = Some(model.count());
        }
    }
    assert_eq!(last_drawn, Some(0));

    assert_eq!(h.session.teardown().await, SessionState::Disposed);
    assert_eq!(h.camera.close_count(), 1);
    assert!(h.rendered.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn teardown_during_initialize_draws_nothing_new() {
    let mut h = harness(licensed());
    h.camera.set_open_delay(Duration::from_millis(200));

    let starter = {
        let session = h.session.clone();
        tokio::spawn(async move { session.start().await })
    };
    while h.session.state().await != SessionState::Initializing {
        tokio::task::yield_now().await;
    }
    h.session.teardown().await;
    starter.await.unwrap().unwrap();

    // Nothing was scanned, so there is no list to redraw.
    while let Ok(event) = h.rendered.try_recv() {
        assert!(!matches!(event, RenderEvent::InventoryChanged(_)), "{event:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn pump_stops_accepting_before_the_camera_powers_off() {
    let h = harness(licensed());
    h.session.start().await.unwrap();
    h.camera.set_power_off_delay(Duration::from_millis(50));

    let hider = {
        let session = h.session.clone();
        tokio::spawn(async move { session.set_visibility(false).await })
    };
    while h.session.state().await == SessionState::Active {
        tokio::task::yield_now().await;
    }
    // Camera is still powering down here.
    assert!(h.session.deliver(event("LATE")).await.is_none());

    assert_eq!(hider.await.unwrap(), SessionState::Suspended);
    assert_eq!(h.session.inventory_size().await, 0);
}

#[tokio::test]
async fn teardown_while_suspended_disposes() {
    let h = harness(licensed());
    h.session.start().await.unwrap();
    h.session.set_visibility(false).await;

    assert_eq!(h.session.teardown().await, SessionState::Disposed);
    assert_eq!(h.camera.close_count(), 1);
}

#[tokio::test]
async fn teardown_failures_are_swallowed() {
    let h = harness(licensed());
    h.session.start().await.unwrap();
    h.camera.fail_next_power_off("already off");
    h.camera.fail_next_close("context lost");

    assert_eq!(h.session.teardown().await, SessionState::Disposed);
    assert!(h.session.notice().is_none());
}

#[tokio::test(start_paused = true)]
async fn teardown_during_pending_initialize_disposes_after_it_completes() {
    let h = harness(licensed());
    h.camera.set_open_delay(Duration::from_millis(500));

    let starter = {
        let session = h.session.clone();
        tokio::spawn(async move { session.start().await })
    };
    while h.session.state().await != SessionState::Initializing {
        tokio::task::yield_now().await;
    }
    assert!(h.session.deliver(event("X")).await.is_none());

    assert_eq!(h.session.teardown().await, SessionState::Disposed);
    assert_eq!(starter.await.unwrap().unwrap(), SessionState::Disposed);

    assert_eq!(h.camera.open_count(), 1);
    assert_eq!(h.camera.close_count(), 1);
    assert!(!h.camera.is_open());
}

#[tokio::test(start_paused = true)]
async fn hidden_during_initialize_suspends_on_completion() {
    let h = harness(licensed());
    h.camera.set_open_delay(Duration::from_millis(300));

    let starter = {
        let session = h.session.clone();
        tokio::spawn(async move { session.start().await })
    };
    while h.session.state().await != SessionState::Initializing {
        tokio::task::yield_now().await;
    }

    assert_eq!(h.session.set_visibility(false).await, SessionState::Suspended);
    assert_eq!(starter.await.unwrap().unwrap(), SessionState::Suspended);
    assert_eq!(h.camera.power(), CameraPower::Off);
}

#[tokio::test]
async fn same_code_twice_counts_two_units() {
    let mut h = harness(licensed());
    h.session.start().await.unwrap();

    assert!(h.camera.present("SKU-1", Symbology::Code128));
    assert!(h.camera.present("SKU-1", Symbology::Code128));
    wait_for_count(&mut h, 2).await;

    let items = h.session.inventory().await;
    assert_eq!(items[0].payload, items[1].payload);
    assert_ne!(items[0].id, items[1].id);
}

#[tokio::test]
async fn codes_from_one_frame_keep_batch_order() {
    let mut h = harness(licensed());
    h.session.start().await.unwrap();

    let frame = Utc::now();
    assert!(h
        .camera
        .present_batch(frame, vec![code128("FIRST"), code128("SECOND")]));
    let model = wait_for_count(&mut h, 2).await;

    assert_eq!(
        rows(&model),
        vec![(2, "SECOND".to_string()), (1, "FIRST".to_string())]
    );
    let items = h.session.inventory().await;
    assert!(items[0].id > items[1].id);
}

#[tokio::test]
async fn disabled_symbologies_are_ignored() {
    let h = harness(licensed());
    h.session.start().await.unwrap();

    assert!(!h.camera.present("4006381333931", Symbology::Ean13));
    assert_eq!(
        h.camera.last_setup().map(|setup| setup.symbologies),
        Some(vec![Symbology::Code128])
    );
}

#[tokio::test]
async fn each_accepted_scan_pulses_once() {
    let mut h = harness(licensed());
    h.session.start().await.unwrap();

    h.camera.present("A1", Symbology::Code128);
    h.camera.present("B2", Symbology::Code128);
    wait_for_count(&mut h, 2).await;
    assert_eq!(h.pulses.load(Ordering::SeqCst), 2);

    h.session.set_visibility(false).await;
    h.session.deliver(event("C3")).await;
    assert_eq!(h.pulses.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn rapid_scan_brings_its_own_feedback() {
    let mut h = harness(ScannerConfig {
        backend: BackendKind::RapidScan,
        ..licensed()
    });
    h.session.start().await.unwrap();

    h.camera.present("A1", Symbology::Code128);
    wait_for_count(&mut h, 1).await;
    assert_eq!(h.pulses.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn inline_decoder_needs_no_license() {
    let mut h = harness(ScannerConfig {
        backend: BackendKind::InlineDecoder,
        ..ScannerConfig::default()
    });

    assert_eq!(h.session.start().await.unwrap(), SessionState::Active);
    h.camera.present("A1", Symbology::Code128);
    let model = wait_for_count(&mut h, 1).await;
    assert_eq!(rows(&model), vec![(1, "A1".to_string())]);
}

#[tokio::test]
async fn start_reports_state_changes_in_order() {
    let mut h = harness(licensed());
    h.session.start().await.unwrap();

    let mut states = Vec::new();
    while let Ok(event) = h.rendered.try_recv() {
        if let RenderEvent::SessionStateChanged(state) = event {
            states.push(state);
        }
    }
    assert_eq!(states, [SessionState::Initializing, SessionState::Active]);
}

#[tokio::test]
async fn ledger_revisions_follow_mutations() {
    let h = harness(licensed());
    h.session.start().await.unwrap();
    let mut changes = h.session.subscribe_inventory().await;

    h.session.deliver(event("A1")).await.unwrap();
    h.session.clear_inventory().await;
    assert!(changes.has_changed().unwrap());
    assert_eq!(*changes.borrow_and_update(), 2);

    // Clearing an empty ledger is not a mutation.
    h.session.clear_inventory().await;
    assert!(!changes.has_changed().unwrap());
}

#[tokio::test]
async fn snapshot_reports_session_and_display() {
    let h = harness(licensed());
    h.session.start().await.unwrap();
    h.session.deliver(event("A1")).await.unwrap();

    let snapshot = h.session.snapshot().await;
    assert_eq!(snapshot.state, SessionState::Active);
    assert!(snapshot.session_id.is_some());
    assert!(snapshot.started_at.is_some_and(|at| at <= Utc::now()));
    assert_eq!(snapshot.display.count(), 1);
    assert!(snapshot.notice.is_none());

    assert!(!h.session.dismiss_notice());
}
