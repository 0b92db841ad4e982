mod common;

use chrono::{Duration, Utc};
use common::{config, follower, no_shutdown, FakeApi, MESSAGE, RETRY_MESSAGE};
use follower_outreach::engine::discovery::DiscoveryWalker;
use follower_outreach::engine::failure::UpstreamError;
use follower_outreach::engine::messaging::{personalize, Messenger};
use follower_outreach::store::types::Follower;
use follower_outreach::store::Store;

fn seeded(ids: &[i64]) -> (Store, Vec<Follower>) {
    let store = Store::open_memory().unwrap();
    let followers: Vec<Follower> = ids.iter().map(|&id| follower(id, 100, false)).collect();
    for f in &followers {
        store.insert_follower(f).unwrap();
    }
    (store, followers)
}

#[tokio::test]
async fn test_attempt_count_drives_template() {
    let (store, followers) = seeded(&[1, 2, 3, 4]);
    let now = Utc::now();
    // 2: messaged two days ago, still cooling down
    store.append_attempt(2, now - Duration::days(2)).unwrap();
    // 3: messaged eight days ago, retry due
    store.append_attempt(3, now - Duration::days(8)).unwrap();
    // 4: already retried
    store.append_attempt(4, now - Duration::days(30)).unwrap();
    store.append_attempt(4, now - Duration::days(20)).unwrap();

    let api = FakeApi::new(4);
    let cfg = config("");
    let shutdown = no_shutdown();
    let report = Messenger::new(&api, &store, &cfg.messaging, &shutdown)
        .send_to_candidates(&followers)
        .await
        .unwrap();

    assert_eq!(api.sent_ids(), vec![1, 3]);
    assert_eq!(api.sent_text(1).unwrap(), personalize("user1", MESSAGE));
    assert_eq!(api.sent_text(3).unwrap(), personalize("user3", RETRY_MESSAGE));
    assert_eq!(report.first_sent, 1);
    assert_eq!(report.retries_sent, 1);
    assert_eq!(report.waiting, 1);
    assert_eq!(report.already_handled, 1);

    assert_eq!(store.list_attempts(1).unwrap().len(), 1);
    assert_eq!(store.list_attempts(2).unwrap().len(), 1);
    assert_eq!(store.list_attempts(3).unwrap().len(), 2);
    assert_eq!(store.list_attempts(4).unwrap().len(), 2);
}

#[tokio::test]
async fn test_refusal_skips_follower_for_good() {
    let (store, followers) = seeded(&[1, 2]);
    let api = FakeApi::new(2)
        .with_pages(vec![vec![1, 2]])
        .fail_send(1, UpstreamError::PermanentRefusal { code: 349 });
    let cfg = config("");
    let shutdown = no_shutdown();

    let report = Messenger::new(&api, &store, &cfg.messaging, &shutdown)
        .send_to_candidates(&followers)
        .await
        .unwrap();

    assert_eq!(report.refused, 1);
    assert_eq!(report.first_sent, 1);
    assert!(store.get_skip(1).unwrap().is_some());
    assert!(store.list_attempts(1).unwrap().is_empty());
    assert_eq!(store.counts().unwrap().skipped, 1);

    // a second pass leaves the skip list and the attempts untouched
    let again = Messenger::new(&api, &store, &cfg.messaging, &shutdown)
        .send_to_candidates(&followers)
        .await
        .unwrap();
    assert_eq!(again.excluded, 1);
    assert_eq!(again.waiting, 1);
    assert_eq!(store.counts().unwrap().skipped, 1);
    assert!(store.list_attempts(1).unwrap().is_empty());

    // never rediscovered, even once the retry window has passed
    let found = DiscoveryWalker::new(&api, &store, -1, &shutdown).walk(10).await.unwrap();
    assert!(!found.ids.contains(&1));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_ends_send_loop() {
    let (store, followers) = seeded(&[1, 2, 3]);
    let api = FakeApi::new(3).fail_send(2, UpstreamError::RateLimited);
    let cfg = config("");
    let shutdown = no_shutdown();

    let report = Messenger::new(&api, &store, &cfg.messaging, &shutdown)
        .send_to_candidates(&followers)
        .await
        .unwrap();

    assert!(report.rate_limited);
    assert_eq!(api.sent_ids(), vec![1]);
    assert!(store.list_attempts(2).unwrap().is_empty());
    assert!(store.list_attempts(3).unwrap().is_empty());
    assert!(store.get_skip(2).unwrap().is_none());
}

#[tokio::test]
async fn test_transient_send_error_aborts() {
    let (store, followers) = seeded(&[1, 2, 3]);
    let api = FakeApi::new(3).fail_send(2, UpstreamError::other("503 Service Unavailable"));
    let cfg = config("");
    let shutdown = no_shutdown();

    let report = Messenger::new(&api, &store, &cfg.messaging, &shutdown)
        .send_to_candidates(&followers)
        .await
        .unwrap();

    assert!(matches!(report.aborted, Some(UpstreamError::TransientOther(_))));
    assert_eq!(api.sent_ids(), vec![1]);
    // the attempt recorded before the failure is kept
    assert_eq!(store.list_attempts(1).unwrap().len(), 1);
    assert!(store.get_skip(2).unwrap().is_none());
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let (store, followers) = seeded(&[1, 2]);
    let api = FakeApi::new(2);
    let mut cfg = config("");
    cfg.messaging.dry_run = true;
    let shutdown = no_shutdown();

    let report = Messenger::new(&api, &store, &cfg.messaging, &shutdown)
        .send_to_candidates(&followers)
        .await
        .unwrap();

    assert_eq!(report.planned, 2);
    assert_eq!(report.sent(), 0);
    assert!(api.sent_ids().is_empty());
    assert_eq!(store.counts().unwrap().messaged, 0);
}

#[tokio::test]
async fn test_send_limit_caps_messages() {
    let (store, followers) = seeded(&[1, 2, 3, 4, 5]);
    let api = FakeApi::new(5);
    let mut cfg = config("");
    cfg.messaging.send_limit = 2;
    let shutdown = no_shutdown();

    let report = Messenger::new(&api, &store, &cfg.messaging, &shutdown)
        .send_to_candidates(&followers)
        .await
        .unwrap();

    assert!(report.limit_reached);
    assert_eq!(api.sent_ids(), vec![1, 2]);
}

#[tokio::test]
async fn test_test_accounts_never_touch_store() {
    let store = Store::open_memory().unwrap();
    let accounts = vec![follower(7, 1, false), follower(8, 1, false)];
    let api = FakeApi::new(0).fail_send(8, UpstreamError::PermanentRefusal { code: 150 });
    let cfg = config("");
    let shutdown = no_shutdown();

    let report = Messenger::new(&api, &store, &cfg.messaging, &shutdown)
        .send_to_test_accounts(&accounts, true)
        .await;

    assert_eq!(report.retries_sent, 1);
    assert_eq!(report.refused, 1);
    assert_eq!(api.sent_text(7).unwrap(), personalize("user7", RETRY_MESSAGE));
    let counts = store.counts().unwrap();
    assert_eq!((counts.followers, counts.skipped, counts.messaged), (0, 0, 0));
}

#[tokio::test]
async fn test_shutdown_stops_between_sends() {
    let (store, followers) = seeded(&[1, 2, 3]);
    let (tx, shutdown) = tokio::sync::watch::channel(false);
    let api = FakeApi::new(3).shutdown_after_sends(1, tx);
    let cfg = config("");

    let report = Messenger::new(&api, &store, &cfg.messaging, &shutdown)
        .send_to_candidates(&followers)
        .await
        .unwrap();

    assert_eq!(report.first_sent, 1);
    assert_eq!(api.sent_ids(), vec![1]);
    assert_eq!(store.list_attempts(1).unwrap().len(), 1);
    assert!(store.list_attempts(2).unwrap().is_empty());
}
