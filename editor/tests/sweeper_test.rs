//! SessionSweeperActor timeout behaviour against a live store.

use editor::actors::{SessionSweeperActor, SweepNotice, SweeperArguments, SweeperMsg};
use editor::document::Document;
use editor::suggestions::DisabledSuggestions;
use editor::{EditorConfig, SessionError, SessionStore, Strategy};
use ractor::Actor;
use shared_types::Decision;
use std::sync::Arc;
use std::time::Duration;

fn short_timeouts() -> EditorConfig {
    EditorConfig {
        session_warning_seconds: 0,
        session_timeout_seconds: 1,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_sweeper_warns_then_expires_idle_sessions() {
    let store = SessionStore::new(short_timeouts(), Arc::new(DisabledSuggestions));
    let (notice_tx, mut notice_rx) = tokio::sync::mpsc::unbounded_channel();
    let (sweeper, handle) = Actor::spawn(
        None,
        SessionSweeperActor,
        SweeperArguments {
            store: store.clone(),
            interval: Duration::from_secs(3600),
            notices: Some(notice_tx),
        },
    )
    .await
    .expect("failed to spawn sweeper");

    let id = store
        .start_session(
            "idle-user",
            Document::from_plain_text("a a"),
            None,
            Strategy::literal("a", "b"),
        )
        .await
        .unwrap();

    let report = ractor::call!(sweeper, |reply| SweeperMsg::SweepAndReport { reply })
        .expect("sweep call failed");
    assert_eq!(report.warned.len(), 1);
    assert_eq!(report.warned[0].owner, "idle-user");
    assert!(report.expired.is_empty());

    // Warned once per idle stretch
    let report = ractor::call!(sweeper, |reply| SweeperMsg::SweepAndReport { reply })
        .expect("sweep call failed");
    assert!(report.warned.is_empty());

    tokio::time::sleep(Duration::from_millis(1100)).await;
    let report = ractor::call!(sweeper, |reply| SweeperMsg::SweepAndReport { reply })
        .expect("sweep call failed");
    assert_eq!(report.expired, vec![id.clone()]);

    assert!(matches!(
        store.decide(&id, Decision::Accept).await,
        Err(SessionError::NotFound(_))
    ));
    assert!(matches!(notice_rx.recv().await, Some(SweepNotice::Warning(_))));
    assert_eq!(notice_rx.recv().await, Some(SweepNotice::Expired(id)));

    let sweeps = ractor::call!(sweeper, |reply| SweeperMsg::GetSweepCount { reply })
        .expect("count call failed");
    assert_eq!(sweeps, 3);

    sweeper.stop(None);
    handle.await.unwrap();
}

#[tokio::test]
async fn test_activity_resets_the_idle_clock() {
    let store = SessionStore::new(short_timeouts(), Arc::new(DisabledSuggestions));
    let (sweeper, handle) = Actor::spawn(
        None,
        SessionSweeperActor,
        SweeperArguments {
            store: store.clone(),
            interval: Duration::from_millis(50),
            notices: None,
        },
    )
    .await
    .expect("failed to spawn sweeper");

    let id = store
        .start_session(
            "busy-user",
            Document::from_plain_text("a a a"),
            None,
            Strategy::literal("a", "b"),
        )
        .await
        .unwrap();

    for _ in 0..2 {
        tokio::time::sleep(Duration::from_millis(600)).await;
        store.decide(&id, Decision::Accept).await.unwrap();
    }

    tokio::time::sleep(Duration::from_millis(1300)).await;
    assert!(matches!(
        store.state(&id).await,
        Err(SessionError::NotFound(_))
    ));
    assert!(store.is_empty().await);

    sweeper.stop(None);
    handle.await.unwrap();
}
