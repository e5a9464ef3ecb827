//! Transaction timer tests
//!
//! Run on a paused tokio clock, so every retransmission and timeout lands
//! exactly on its RFC 3261 deadline.

mod common;

use std::time::Duration;

use tokio::time::Instant;

use common::*;
use sipflow_dialog_core::prelude::*;

/// Milliseconds since `start` at which each outgoing message was seen,
/// and when `key` left the transaction table
async fn timeline(h: &mut Harness, key: &TransactionKey, start: Instant) -> (Vec<u128>, Option<u128>) {
    let mut sent = vec![0; h.sent().len()];
    let mut terminated = None;
    while h.manager.poll_timer().await {
        let now = start.elapsed().as_millis();
        sent.extend(h.sent().iter().map(|_| now));
        if terminated.is_none() && h.manager.transaction_state(key).is_none() {
            terminated = Some(now);
        }
    }
    (sent, terminated)
}

#[tokio::test(start_paused = true)]
async fn test_non_invite_timer_e_schedule_ends_at_timer_f() {
    let mut h = Harness::new(false);
    let start = Instant::now();
    let key = h.manager.send_request(outgoing(Method::Options)).await.unwrap();
    assert_eq!(h.manager.transaction_state(&key), Some(TransactionState::Trying));

    let (sent, terminated) = timeline(&mut h, &key, start).await;

    // T1 doubling, capped at T2 = 4s
    assert_eq!(
        sent,
        vec![0, 500, 1500, 3500, 7500, 11500, 15500, 19500, 23500, 27500, 31500]
    );
    assert_eq!(terminated, Some(32_000));
    assert_eq!(h.manager.armed_timer_count(), 0);

    let outcomes = terminated_outcomes(&h.events());
    assert_eq!(outcomes, vec![(key, TransactionOutcome::Timeout)]);
}

#[tokio::test(start_paused = true)]
async fn test_timer_e_uses_t2_after_provisional() {
    let mut h = Harness::new(false);
    let start = Instant::now();
    let key = h.manager.send_request(outgoing(Method::Options)).await.unwrap();
    let request = h.sent_requests().remove(0);

    // first retransmission at 500ms, then a 100 Trying
    assert!(h.manager.poll_timer().await);
    assert_eq!(h.sent().len(), 1);
    h.receive(respond(&request, StatusCode::Trying, None)).await;
    assert_eq!(h.manager.transaction_state(&key), Some(TransactionState::Proceeding));

    // E was already re-armed for 1500ms; after that it runs every T2
    let (sent, terminated) = timeline(&mut h, &key, start).await;
    assert_eq!(sent, vec![1500, 5500, 9500, 13500, 17500, 21500, 25500, 29500]);
    assert_eq!(terminated, Some(32_000));
    assert_eq!(
        h.manager.transaction_history(&key),
        None,
        "terminated transactions leave the table"
    );
}

#[tokio::test(start_paused = true)]
async fn test_reliable_non_invite_has_no_retransmissions() {
    let mut h = Harness::new(true);
    let start = Instant::now();
    let key = h.manager.send_request(outgoing(Method::Options)).await.unwrap();

    let (sent, terminated) = timeline(&mut h, &key, start).await;
    assert_eq!(sent, vec![0]);
    assert_eq!(terminated, Some(32_000));
}

#[tokio::test(start_paused = true)]
async fn test_timer_k_absorbs_retransmitted_final() {
    let mut h = Harness::new(false);
    let start = Instant::now();
    let key = h.manager.send_request(outgoing(Method::Options)).await.unwrap();
    let request = h.sent_requests().remove(0);

    let ok = respond(&request, StatusCode::Ok, Some("peer-tag"));
    h.receive(ok.clone()).await;
    assert_eq!(h.manager.transaction_state(&key), Some(TransactionState::Completed));
    h.receive(ok).await;

    let (sent, terminated) = timeline(&mut h, &key, start).await;
    assert!(sent.is_empty());
    assert_eq!(terminated, Some(5_000));

    let events = h.events();
    let responses = events
        .iter()
        .filter(|e| matches!(e, CoreEvent::Response { .. }))
        .count();
    assert_eq!(responses, 1);
    assert_eq!(
        terminated_outcomes(&events),
        vec![(key, TransactionOutcome::Accepted)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_reliable_final_terminates_immediately() {
    let mut h = Harness::new(true);
    let key = h.manager.send_request(outgoing(Method::Options)).await.unwrap();
    let request = h.sent_requests().remove(0);

    h.receive(respond(&request, StatusCode::NotFound, None)).await;
    assert_eq!(h.manager.transaction_state(&key), None);
    assert_eq!(h.manager.armed_timer_count(), 0);
    assert_eq!(
        terminated_outcomes(&h.events()),
        vec![(key, TransactionOutcome::Rejected)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_invite_timer_a_doubles_until_timer_b() {
    let mut h = Harness::new(false);
    let start = Instant::now();
    let key = h.manager.send_request(outgoing(Method::Invite)).await.unwrap();
    assert_eq!(h.manager.transaction_state(&key), Some(TransactionState::Calling));

    let (sent, terminated) = timeline(&mut h, &key, start).await;
    assert_eq!(sent, vec![0, 500, 1500, 3500, 7500, 15500, 31500]);
    assert_eq!(terminated, Some(32_000));
    assert_eq!(
        terminated_outcomes(&h.events()),
        vec![(key, TransactionOutcome::Timeout)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_invite_non_2xx_ack_and_timer_d() {
    let mut h = Harness::new(false);
    let start = Instant::now();
    let key = h.manager.send_request(outgoing(Method::Invite)).await.unwrap();
    let invite = h.sent_requests().remove(0);

    let busy = respond(&invite, StatusCode::BusyHere, Some("busy-tag"));
    h.receive(busy.clone()).await;
    assert_eq!(h.manager.transaction_state(&key), Some(TransactionState::Completed));

    let ack = h.sent_requests().remove(0);
    assert_eq!(ack.method, Method::Ack);
    assert_eq!(ack.top_via().unwrap().branch(), invite.top_via().unwrap().branch());
    assert_eq!(ack.cseq().unwrap().seq, invite.cseq().unwrap().seq);
    assert_eq!(ack.to_tag().as_deref(), Some("busy-tag"));

    // each retransmitted final gets the same ACK again
    h.receive(busy).await;
    let again = h.sent_requests();
    assert_eq!(again, vec![ack]);

    let (sent, terminated) = timeline(&mut h, &key, start).await;
    assert!(sent.is_empty());
    assert_eq!(terminated, Some(32_000));
    assert_eq!(
        terminated_outcomes(&h.events()),
        vec![(key, TransactionOutcome::Rejected)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_invite_server_timer_g_then_ack_and_timer_i() {
    let mut h = Harness::new(false);
    let start = Instant::now();
    h.receive(incoming("INVITE", "z9hG4bKsrv1", 1, None)).await;
    let key = new_server_transaction(&h.events()).unwrap();

    let trying = h.sent_responses();
    assert_eq!(trying.len(), 1);
    assert_eq!(trying[0].status, StatusCode::Trying);

    let busy = h.manager.create_response(&key, StatusCode::BusyHere).unwrap();
    h.manager.send_response(&key, busy).await.unwrap();
    assert_eq!(h.manager.transaction_state(&key), Some(TransactionState::Completed));
    assert_eq!(h.sent_responses().len(), 1);

    // G at 500ms, then 1500ms
    assert!(h.manager.poll_timer().await);
    assert!(h.manager.poll_timer().await);
    assert_eq!(start.elapsed(), Duration::from_millis(1500));
    let retransmitted = h.sent_responses();
    assert_eq!(retransmitted.len(), 2);
    assert!(retransmitted.iter().all(|r| r.status == StatusCode::BusyHere));

    h.receive(incoming("ACK", "z9hG4bKsrv1", 1, retransmitted[0].to_tag().as_deref()))
        .await;
    assert_eq!(h.manager.transaction_state(&key), Some(TransactionState::Confirmed));

    let (sent, terminated) = timeline(&mut h, &key, start).await;
    assert!(sent.is_empty());
    assert_eq!(terminated, Some(6_500));
    assert_eq!(
        terminated_outcomes(&h.events()),
        vec![(key, TransactionOutcome::Rejected)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_invite_server_timer_h_without_ack() {
    let mut h = Harness::new(true);
    let start = Instant::now();
    h.receive(incoming("INVITE", "z9hG4bKsrv2", 1, None)).await;
    let key = new_server_transaction(&h.events()).unwrap();

    let decline = h.manager.create_response(&key, StatusCode::Decline).unwrap();
    h.manager.send_response(&key, decline).await.unwrap();

    let (_, terminated) = timeline(&mut h, &key, start).await;
    assert_eq!(terminated, Some(32_000));
    assert_eq!(
        terminated_outcomes(&h.events()),
        vec![(key, TransactionOutcome::Timeout)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_custom_t1_scales_every_timer() {
    let config = config().with_t1(Duration::from_millis(100));
    let mut h = Harness::with_config(false, config);
    let start = Instant::now();
    let key = h.manager.send_request(outgoing(Method::Options)).await.unwrap();

    let (sent, terminated) = timeline(&mut h, &key, start).await;
    assert_eq!(&sent[..4], &[0, 100, 300, 700]);
    assert_eq!(terminated, Some(6_400));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_timers_and_ignores_input() {
    let mut h = Harness::new(false);
    let key = h.manager.send_request(outgoing(Method::Invite)).await.unwrap();
    let invite = h.sent_requests().remove(0);
    assert!(h.manager.armed_timer_count() > 0);

    h.manager.shutdown();
    assert!(h.manager.is_closed());
    assert_eq!(h.manager.armed_timer_count(), 0);
    assert_eq!(h.manager.transaction_state(&key), None);
    assert!(!h.manager.poll_timer().await);

    h.receive(respond(&invite, StatusCode::Ok, Some("late"))).await;
    assert!(h.sent().is_empty());
    assert!(h.events().is_empty());
    assert!(matches!(
        h.manager.send_request(outgoing(Method::Options)).await,
        Err(DialogError::Closed)
    ));
}
