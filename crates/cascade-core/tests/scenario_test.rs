//! End-to-end test of the built-in demonstration scenario through the
//! controller's public surface: step, reset, params, update, stream.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use cascade_core::{CascadeConfig, SimController, Simulation, StreamConfig};
use cascade_types::{Params, ParamsPatch, ReceiptKind};

fn controller_with_full_history() -> SimController {
    let mut config = CascadeConfig::default();
    config.receipts.capacity = 1_000_000;
    SimController::new(Simulation::from_config(config))
}

#[tokio::test]
async fn pressure_drives_saturation_birth_and_reconciliation() {
    let controller = controller_with_full_history();

    // Tick 1: B injects max(0, |1.2 - 1.6| - 0.05) = 0.35, then diffuses.
    let snapshot = controller.step().await;
    assert_eq!(snapshot.step, 1);
    assert!((snapshot.total_error - 0.35 * (-0.05f64).exp()).abs() < 1e-9);
    assert!(snapshot
        .receipts
        .iter()
        .all(|r| r.kind != ReceiptKind::MetaBirth));

    // Tick 2: the occurrence-weighted total crosses the 0.5 limit.
    let snapshot = controller.step().await;
    assert!(snapshot.total_error > 0.5);
    assert_eq!(
        snapshot
            .receipts
            .iter()
            .filter(|r| r.kind == ReceiptKind::MetaBirth)
            .count(),
        1
    );
    assert!(snapshot.meta_energy > 0.0);

    // Continued stepping backfeeds corrections until B reconciles.
    let mut reconciled = false;
    for _ in 0..100 {
        let snapshot = controller.step().await;
        if snapshot
            .receipts
            .iter()
            .any(|r| r.kind == ReceiptKind::Reconcile && r.subject == "B.err")
        {
            reconciled = true;
            break;
        }
    }
    assert!(reconciled, "B never came back within tolerance");
}

#[tokio::test]
async fn meta_energy_never_increases_after_birth() {
    let controller = controller_with_full_history();
    controller.step().await;
    let mut previous = controller.step().await.meta_energy;
    assert!(previous > 0.0);

    for _ in 0..60 {
        let current = controller.step().await.meta_energy;
        assert!(current <= previous + 1e-12);
        previous = current;
    }
}

#[tokio::test]
async fn reset_discards_everything() {
    let controller = controller_with_full_history();
    for _ in 0..5 {
        controller.step().await;
    }
    controller
        .update_params(ParamsPatch {
            limit: Some(0.8),
            ..ParamsPatch::default()
        })
        .await;

    let snapshot = controller.reset().await;
    assert_eq!(snapshot.step, 0);
    assert!((snapshot.total_error).abs() < f64::EPSILON);
    assert!((snapshot.meta_energy).abs() < f64::EPSILON);
    assert!(snapshot.receipts.is_empty());

    // Runtime parameter changes are discarded along with the rest.
    let params = controller.params().await;
    assert!((params.limit - 0.5).abs() < 1e-12);
}

#[tokio::test]
async fn sentinel_zero_update_leaves_other_params_alone() {
    let controller = controller_with_full_history();
    let updated = controller
        .update_params(ParamsPatch::from_sentinel(Params {
            viscosity: 0.0,
            limit: 0.9,
            dt: 0.0,
        }))
        .await;

    assert!((updated.limit - 0.9).abs() < 1e-12);
    assert!((updated.viscosity - 0.05).abs() < 1e-12);
    assert!((updated.dt - 1.0).abs() < 1e-12);
}

#[tokio::test]
async fn stream_publishes_progress_and_shuts_down() {
    let controller = controller_with_full_history();
    let (handle, mut frames) = controller.spawn_stream(StreamConfig {
        step_interval_ms: 1,
        publish_interval_ms: 5,
        epsilon: 1e-5,
    });

    let first = tokio::time::timeout(Duration::from_secs(5), frames.recv())
        .await
        .unwrap()
        .unwrap();
    let second = tokio::time::timeout(Duration::from_secs(5), frames.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(second.step > first.step);

    handle.stop().await;
    let stopped_at = controller.snapshot().await.step;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(controller.snapshot().await.step, stopped_at);
}
