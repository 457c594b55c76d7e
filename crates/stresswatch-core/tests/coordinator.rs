//! Integration tests for the live session coordinator.
//!
//! All tests run on a paused clock so freeze thresholds and countdowns are
//! exercised deterministically.

mod common;

use common::{advance_ms, settle, spawn, spawn_with};
use stresswatch_core::{CoordinatorConfig, Notification, StresswatchError, HISTORY_CAPACITY};
use stresswatch_types::{
    CaptureMode, CaptureState, CloseReason, ConnectionStatus, DialogState, RejectReason,
    StressLabel, TriggerOutcome, WsServerMessage,
};

fn drain_notifications(
    rx: &mut tokio::sync::broadcast::Receiver<Notification>,
) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push(n);
    }
    out
}

fn drain_events(rx: &mut tokio::sync::broadcast::Receiver<WsServerMessage>) -> Vec<WsServerMessage> {
    let mut out = Vec::new();
    while let Ok(m) = rx.try_recv() {
        out.push(m);
    }
    out
}

fn count_dialog_opens(notifications: &[Notification]) -> usize {
    notifications
        .iter()
        .filter(|n| matches!(n, Notification::DialogOpenRequested { .. }))
        .count()
}

#[tokio::test(start_paused = true)]
async fn test_freeze_opens_dialog_then_auto_cancels() {
    let h = spawn();
    let mut notes = h.handle.subscribe_notifications();

    h.handle.start_session(0).await.unwrap();
    h.backend.push_status(0.4, StressLabel::Moderate);
    settle().await;

    advance_ms(4900).await;
    let snap = h.handle.snapshot().await.unwrap();
    assert_eq!(snap.dialog, DialogState::Closed);
    assert!(!snap.liveness.armed);

    advance_ms(200).await;
    let snap = h.handle.snapshot().await.unwrap();
    assert_eq!(snap.dialog, DialogState::Open { remaining: 10 });
    assert_eq!(snap.capture, CaptureState::Frozen);
    assert!(snap.liveness.armed);

    advance_ms(8900).await;
    let snap = h.handle.snapshot().await.unwrap();
    assert_eq!(snap.dialog, DialogState::Open { remaining: 1 });

    let mut events = h.handle.subscribe();
    advance_ms(1000).await;
    let snap = h.handle.snapshot().await.unwrap();
    assert_eq!(snap.dialog, DialogState::Closed);
    assert_eq!(snap.capture, CaptureState::Idle);

    let events = drain_events(&mut events);
    assert!(events.iter().any(|e| matches!(
        e,
        WsServerMessage::DialogClosed {
            reason: CloseReason::AutoCancel
        }
    )));

    let notes = drain_notifications(&mut notes);
    assert_eq!(count_dialog_opens(&notes), 1);
    assert!(notes.contains(&Notification::UnfreezeRequested));
}

#[tokio::test(start_paused = true)]
async fn test_freeze_fires_once_until_status_resumes() {
    let h = spawn();
    let mut notes = h.handle.subscribe_notifications();

    h.handle.start_session(0).await.unwrap();
    h.backend.push_status(0.2, StressLabel::Low);
    settle().await;

    // First episode: dialog opens, operator cancels, silence continues.
    advance_ms(5500).await;
    assert_eq!(
        h.handle.cancel().await.unwrap(),
        Some(CloseReason::Cancel)
    );
    advance_ms(30_000).await;

    let snap = h.handle.snapshot().await.unwrap();
    assert_eq!(snap.dialog, DialogState::Closed);
    assert!(snap.liveness.armed);
    assert_eq!(count_dialog_opens(&drain_notifications(&mut notes)), 1);

    // A status re-arms detection for the next episode.
    h.backend.push_status(0.3, StressLabel::Low);
    settle().await;
    assert!(!h.handle.snapshot().await.unwrap().liveness.armed);

    advance_ms(5500).await;
    let snap = h.handle.snapshot().await.unwrap();
    assert!(snap.dialog.is_open());
    assert_eq!(count_dialog_opens(&drain_notifications(&mut notes)), 1);
}

#[tokio::test(start_paused = true)]
async fn test_manual_capture_counts_down_then_opens_dialog() {
    let h = spawn();
    h.handle.start_session(1).await.unwrap();

    let outcome = h.handle.trigger_capture().await.unwrap();
    assert_eq!(outcome, TriggerOutcome::Started { remaining: 5 });
    assert_eq!(
        h.handle.snapshot().await.unwrap().capture,
        CaptureState::CountingDown { remaining: 5 }
    );

    // A second press while counting down is rejected, not queued.
    assert_eq!(
        h.handle.trigger_capture().await.unwrap(),
        TriggerOutcome::Rejected {
            reason: RejectReason::AlreadyCountingDown
        }
    );

    advance_ms(4500).await;
    assert_eq!(
        h.handle.snapshot().await.unwrap().capture,
        CaptureState::CountingDown { remaining: 1 }
    );

    advance_ms(1000).await;
    let snap = h.handle.snapshot().await.unwrap();
    assert_eq!(snap.capture, CaptureState::Frozen);
    assert_eq!(snap.dialog, DialogState::Open { remaining: 10 });

    assert_eq!(
        h.handle.trigger_capture().await.unwrap(),
        TriggerOutcome::Rejected {
            reason: RejectReason::AlreadyFrozen
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_print_hands_report_and_unfreezes() {
    let h = spawn();
    let mut reports = h.printer.subscribe();

    h.handle.start_session(0).await.unwrap();
    h.backend.push_status(0.8, StressLabel::High);
    settle().await;

    h.handle.trigger_capture().await.unwrap();
    advance_ms(5500).await;
    assert!(h.handle.snapshot().await.unwrap().dialog.is_open());

    // Keep the stream quiet; printing is the operator's decision.
    assert_eq!(h.handle.print().await.unwrap(), Some(CloseReason::Print));

    let report = reports.try_recv().unwrap();
    let summary = report.summary.unwrap();
    assert_eq!(summary.label, StressLabel::High);
    assert!(!summary.recommendations.is_empty());
    assert_eq!(report.history.len(), 1);
    assert_eq!(report.trigger, Some(CaptureMode::Manual));

    let snap = h.handle.snapshot().await.unwrap();
    assert_eq!(snap.dialog, DialogState::Closed);
    assert_eq!(snap.capture, CaptureState::Idle);

    // Nothing left to print.
    assert_eq!(h.handle.print().await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_status_while_open_closes_with_stream_resumed() {
    let h = spawn();
    h.handle.start_session(0).await.unwrap();

    h.handle.trigger_capture().await.unwrap();
    advance_ms(5200).await;
    advance_ms(3000).await;
    assert_eq!(
        h.handle.snapshot().await.unwrap().dialog,
        DialogState::Open { remaining: 7 }
    );

    let mut events = h.handle.subscribe();
    h.backend.push_status(0.5, StressLabel::Moderate);
    settle().await;

    let snap = h.handle.snapshot().await.unwrap();
    assert_eq!(snap.dialog, DialogState::Closed);
    assert_eq!(snap.capture, CaptureState::Idle);
    assert!(drain_events(&mut events).iter().any(|e| matches!(
        e,
        WsServerMessage::DialogClosed {
            reason: CloseReason::StreamResumed
        }
    )));

    // The discarded countdown never ticks again.
    drain_events(&mut events);
    advance_ms(4500).await;
    assert!(!drain_events(&mut events)
        .iter()
        .any(|e| matches!(e, WsServerMessage::DialogChanged { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_history_is_bounded_and_malformed_statuses_dropped() {
    let h = spawn();
    h.handle.start_session(0).await.unwrap();

    h.backend.push_raw(b"data: {\"level\": \"high\"}\n\n");
    h.backend.push_raw(b"data: not json\n\n");
    settle().await;
    let snap = h.handle.snapshot().await.unwrap();
    assert!(snap.summary.is_none());
    assert!(snap.history.is_empty());
    assert!(snap.liveness.last_update_at.is_none());

    for i in 0..15 {
        h.backend.push_status(i as f64 / 15.0, StressLabel::from_level(i as f64 / 15.0));
        advance_ms(500).await;
    }
    let snap = h.handle.snapshot().await.unwrap();
    assert_eq!(snap.history.len(), HISTORY_CAPACITY);
    assert!(snap.history.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    assert_eq!(snap.history[0].level, snap.summary.unwrap().level);

    h.handle.reset_summary().await.unwrap();
    let snap = h.handle.snapshot().await.unwrap();
    assert!(snap.summary.is_none());
    assert!(snap.history.is_empty());
    assert!(snap.connection.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_countdown_and_freezes_but_leaves_dialog() {
    let h = spawn();
    h.handle.start_session(0).await.unwrap();
    h.backend.push_status(0.2, StressLabel::Low);
    settle().await;

    advance_ms(5500).await;
    assert!(h.handle.snapshot().await.unwrap().dialog.is_open());

    h.handle.stop_session().await.unwrap();
    let snap = h.handle.snapshot().await.unwrap();
    assert_eq!(snap.connection, ConnectionStatus::Idle);
    assert!(snap.dialog.is_open());

    // Operator still completes the decision.
    assert_eq!(h.handle.cancel().await.unwrap(), Some(CloseReason::Cancel));

    // No new freezes after stop.
    advance_ms(20_000).await;
    let snap = h.handle.snapshot().await.unwrap();
    assert_eq!(snap.dialog, DialogState::Closed);
    assert_eq!(snap.capture, CaptureState::Idle);

    // Stop is idempotent.
    h.handle.stop_session().await.unwrap();
    assert_eq!(h.backend.stop_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stop_abandons_manual_countdown() {
    let h = spawn();
    h.handle.start_session(0).await.unwrap();
    h.handle.trigger_capture().await.unwrap();
    advance_ms(2500).await;

    h.handle.stop_session().await.unwrap();
    advance_ms(10_000).await;

    let snap = h.handle.snapshot().await.unwrap();
    assert_eq!(snap.capture, CaptureState::Idle);
    assert_eq!(snap.dialog, DialogState::Closed);
    assert_eq!(
        h.handle.trigger_capture().await.unwrap(),
        TriggerOutcome::Rejected {
            reason: RejectReason::NotConnected
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_command_errors_leave_state_unchanged() {
    let h = spawn();
    h.backend
        .reject_start
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let err = h.handle.start_session(3).await.unwrap_err();
    assert!(matches!(err, StresswatchError::Command(_)));
    let snap = h.handle.snapshot().await.unwrap();
    assert_eq!(snap.connection, ConnectionStatus::Idle);
    assert_eq!(snap.capture, CaptureState::Idle);

    h.backend
        .reject_start
        .store(false, std::sync::atomic::Ordering::SeqCst);
    h.handle.start_session(3).await.unwrap();
    h.backend
        .reject_stop
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let err = h.handle.stop_session().await.unwrap_err();
    assert!(matches!(err, StresswatchError::Command(_)));
    assert!(matches!(
        h.handle.snapshot().await.unwrap().connection,
        ConnectionStatus::Running { camera_index: 3, .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_stream_failure_is_visible_and_freeze_still_detected() {
    let h = spawn();
    let mut events = h.handle.subscribe();
    h.handle.start_session(0).await.unwrap();
    h.backend.push_status(0.6, StressLabel::Moderate);
    settle().await;

    h.backend.drop_stream();
    settle().await;

    let snap = h.handle.snapshot().await.unwrap();
    assert!(matches!(snap.connection, ConnectionStatus::StreamLost { .. }));
    assert!(drain_events(&mut events).iter().any(|e| matches!(
        e,
        WsServerMessage::Error { code, .. } if code == "connection_error"
    )));

    // Liveness keeps working from the last recorded update.
    advance_ms(5500).await;
    assert!(h.handle.snapshot().await.unwrap().dialog.is_open());
}

#[tokio::test(start_paused = true)]
async fn test_refused_stream_reports_connection_error() {
    let h = spawn();
    h.backend
        .refuse_stream
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let err = h.handle.start_session(0).await.unwrap_err();
    assert!(matches!(err, StresswatchError::Connection(_)));
    assert!(matches!(
        h.handle.snapshot().await.unwrap().connection,
        ConnectionStatus::StreamLost { .. }
    ));

    // Explicit restart recovers.
    h.backend
        .refuse_stream
        .store(false, std::sync::atomic::Ordering::SeqCst);
    let started = h.handle.start_session(0).await.unwrap();
    assert!(started.switched);
    assert!(matches!(
        h.handle.snapshot().await.unwrap().connection,
        ConnectionStatus::Running { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_start_while_running_switches_source() {
    let h = spawn();
    let first = h.handle.start_session(0).await.unwrap();
    assert!(!first.switched);

    let second = h.handle.start_session(2).await.unwrap();
    assert!(second.switched);
    assert_ne!(first.session_id, second.session_id);
    assert_eq!(h.backend.start_calls(), vec![0, 2]);
    assert_eq!(h.backend.stop_calls(), 1);

    // Statuses from the new stream are ingested.
    h.backend.push_status(0.9, StressLabel::High);
    settle().await;
    let snap = h.handle.snapshot().await.unwrap();
    assert_eq!(snap.connection.camera_index(), Some(2));
    assert_eq!(snap.summary.unwrap().label, StressLabel::High);
}

#[tokio::test(start_paused = true)]
async fn test_failed_switch_restores_previous_source() {
    let h = spawn();
    *h.backend.reject_camera.lock().unwrap() = Some(9);
    let first = h.handle.start_session(0).await.unwrap();
    h.backend.push_status(0.3, StressLabel::Low);
    settle().await;

    let err = h.handle.start_session(9).await.unwrap_err();
    assert!(matches!(err, StresswatchError::Command(_)));
    assert_eq!(h.backend.start_calls(), vec![0, 0]);

    let snap = h.handle.snapshot().await.unwrap();
    assert!(matches!(
        snap.connection,
        ConnectionStatus::Running { session_id, camera_index: 0, .. } if session_id == first.session_id
    ));
    assert_eq!(snap.summary.unwrap().label, StressLabel::Low);

    // The reopened stream feeds the same session.
    h.backend.push_status(0.9, StressLabel::High);
    settle().await;
    assert_eq!(
        h.handle.snapshot().await.unwrap().summary.unwrap().label,
        StressLabel::High
    );

    // Capture stays connected and liveness keeps polling.
    let outcome = h.handle.trigger_capture().await.unwrap();
    assert!(matches!(outcome, TriggerOutcome::Started { .. }));
    h.handle.reset_capture().await.unwrap();
    advance_ms(5500).await;
    assert!(h.handle.snapshot().await.unwrap().dialog.is_open());
}

#[tokio::test(start_paused = true)]
async fn test_failed_restore_marks_stream_lost() {
    let h = spawn();
    let mut events = h.handle.subscribe();
    let first = h.handle.start_session(1).await.unwrap();
    h.backend
        .reject_start
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let err = h.handle.start_session(4).await.unwrap_err();
    assert!(matches!(err, StresswatchError::Command(_)));

    let snap = h.handle.snapshot().await.unwrap();
    assert!(matches!(
        snap.connection,
        ConnectionStatus::StreamLost { session_id, camera_index: 1, .. } if session_id == first.session_id
    ));
    assert_eq!(
        h.handle.trigger_capture().await.unwrap(),
        TriggerOutcome::Rejected {
            reason: RejectReason::NotConnected
        }
    );
    let errors = drain_events(&mut events)
        .into_iter()
        .filter(|e| matches!(e, WsServerMessage::Error { .. }))
        .count();
    assert_eq!(errors, 2);
}

#[tokio::test(start_paused = true)]
async fn test_subscribe_with_snapshot_neither_misses_nor_repeats() {
    let h = spawn();
    h.handle.start_session(0).await.unwrap();
    h.backend.push_status(0.5, StressLabel::Moderate);
    settle().await;

    let (snapshot, mut events) = h.handle.subscribe_with_snapshot().await.unwrap();
    assert_eq!(snapshot.summary.unwrap().label, StressLabel::Moderate);
    assert!(drain_events(&mut events).is_empty());

    h.backend.push_status(0.8, StressLabel::High);
    settle().await;
    let events = drain_events(&mut events);
    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        WsServerMessage::SummaryUpdate { summary, .. } if summary.label == StressLabel::High
    ));
}

#[tokio::test(start_paused = true)]
async fn test_disabled_freeze_capture_still_arms_once() {
    let h = spawn_with(CoordinatorConfig {
        freeze_capture_enabled: false,
        ..CoordinatorConfig::default()
    });
    let mut events = h.handle.subscribe();
    h.handle.start_session(0).await.unwrap();
    h.backend.push_status(0.2, StressLabel::Low);
    settle().await;

    advance_ms(12_000).await;
    let snap = h.handle.snapshot().await.unwrap();
    assert_eq!(snap.dialog, DialogState::Closed);
    assert!(snap.liveness.armed);

    let events = drain_events(&mut events);
    let freezes = events
        .iter()
        .filter(|e| matches!(e, WsServerMessage::FreezeDetected { .. }))
        .count();
    assert_eq!(freezes, 1);
    assert!(events.iter().any(|e| matches!(
        e,
        WsServerMessage::CaptureTriggered {
            mode: CaptureMode::FreezeDetected,
            outcome: TriggerOutcome::Rejected {
                reason: RejectReason::Disabled
            }
        }
    )));
}

#[tokio::test(start_paused = true)]
async fn test_external_unfreeze_and_shutdown() {
    let h = spawn();
    h.handle.start_session(0).await.unwrap();
    h.handle.trigger_capture().await.unwrap();
    advance_ms(2500).await;

    h.handle.reset_capture().await.unwrap();
    assert_eq!(h.handle.snapshot().await.unwrap().capture, CaptureState::Idle);

    h.handle.shutdown().await;
    h.handle.shutdown().await;
    assert!(matches!(
        h.handle.snapshot().await,
        Err(StresswatchError::CoordinatorUnavailable)
    ));
}
