use super::*;
use std::sync::Arc;

fn msg(s: &str) -> Outbound {
    Arc::from(s)
}

// =============================================================================
// admit / remove
// =============================================================================

#[test]
fn admit_then_count() {
    let r = ConnectionRegistry::new(8);
    let _a = r.admit("a", None).unwrap();
    let _b = r.admit("b", Some("10.0.0.1".into())).unwrap();
    assert_eq!(r.count(), 2);
    assert!(r.contains("a"));
}

#[test]
fn duplicate_identity_rejected_without_side_effects() {
    let r = ConnectionRegistry::new(8);
    let _a = r.admit("a", None).unwrap();
    let err = r.admit("a", None).err().unwrap();
    assert_eq!(err, RegistryError::DuplicateIdentity("a".into()));
    assert_eq!(r.count(), 1);
}

#[test]
fn remove_is_idempotent() {
    let r = ConnectionRegistry::new(8);
    let _a = r.admit("a", None).unwrap();
    assert!(r.remove("a"));
    assert!(!r.remove("a"));
    assert_eq!(r.count(), 0);
}

#[test]
fn id_reusable_after_remove() {
    let r = ConnectionRegistry::new(8);
    let _a = r.admit("a", None).unwrap();
    r.remove("a");
    assert!(r.admit("a", None).is_ok());
}

#[test]
fn count_matches_admits_minus_removes() {
    let r = ConnectionRegistry::new(8);
    let mut handles = Vec::new();
    for i in 0..10 {
        handles.push(r.admit(&format!("c{i}"), None).unwrap());
    }
    for i in (0..10).step_by(3) {
        r.remove(&format!("c{i}"));
    }
    assert_eq!(r.count(), 6);
}

#[test]
fn remove_admission_ignores_newer_admission() {
    let r = ConnectionRegistry::new(8);
    let old = r.admit("a", None).unwrap();
    r.remove("a");
    let new = r.admit("a", None).unwrap();
    assert_ne!(old.token, new.token);

    assert!(!r.remove_admission("a", old.token));
    assert!(r.contains("a"));
    assert!(r.remove_admission("a", new.token));
    assert!(!r.contains("a"));
}

#[tokio::test]
async fn removing_drops_sender_and_closes_queue() {
    let r = ConnectionRegistry::new(8);
    let mut h = r.admit("a", None).unwrap();
    r.remove("a");
    assert!(h.rx.recv().await.is_none());
}

// =============================================================================
// delivery
// =============================================================================

#[tokio::test]
async fn admit_with_queues_first_message() {
    let r = ConnectionRegistry::new(8);
    let mut h = r.admit_with("a", None, &msg("hello")).unwrap();
    assert_eq!(h.rx.recv().await.as_deref(), Some("hello"));
}

#[tokio::test]
async fn fan_out_excludes_sender() {
    let r = ConnectionRegistry::new(8);
    let mut a = r.admit("a", None).unwrap();
    let mut b = r.admit("b", None).unwrap();
    let failed = r.fan_out(Some("a"), &msg("x"));
    assert!(failed.is_empty());
    assert_eq!(b.rx.recv().await.as_deref(), Some("x"));
    assert!(a.rx.try_recv().is_err());
}

#[tokio::test]
async fn fan_out_all_reaches_everyone() {
    let r = ConnectionRegistry::new(8);
    let mut a = r.admit("a", None).unwrap();
    let mut b = r.admit("b", None).unwrap();
    assert!(r.fan_out(None, &msg("x")).is_empty());
    assert_eq!(a.rx.recv().await.as_deref(), Some("x"));
    assert_eq!(b.rx.recv().await.as_deref(), Some("x"));
}

#[test]
fn closed_recipient_reported_others_still_delivered() {
    let r = ConnectionRegistry::new(8);
    let a = r.admit("a", None).unwrap();
    let mut b = r.admit("b", None).unwrap();
    let token = a.token;
    drop(a);

    let failed = r.fan_out(None, &msg("x"));
    assert_eq!(
        failed,
        vec![DeliveryError::RecipientUnreachable { id: "a".into(), token: Some(token), reason: Unreachable::Closed }]
    );
    assert_eq!(b.rx.try_recv().ok().as_deref(), Some("x"));
}

#[test]
fn full_queue_reported_as_lagging() {
    let r = ConnectionRegistry::new(1);
    let a = r.admit("a", None).unwrap();
    assert!(r.send_to("a", &msg("1")).is_ok());
    let err = r.send_to("a", &msg("2")).unwrap_err();
    assert_eq!(
        err,
        DeliveryError::RecipientUnreachable { id: "a".into(), token: Some(a.token), reason: Unreachable::Lagging }
    );
    assert_eq!(err.client_id(), "a");
}

#[test]
fn send_to_unknown_is_unreachable() {
    let r = ConnectionRegistry::new(8);
    let err = r.send_to("ghost", &msg("x")).unwrap_err();
    assert_eq!(err.token(), None);
}

#[tokio::test]
async fn per_recipient_order_is_send_order() {
    let r = ConnectionRegistry::new(16);
    let mut b = r.admit("b", None).unwrap();
    for i in 0..10 {
        r.fan_out(Some("a"), &msg(&i.to_string()));
    }
    for i in 0..10 {
        assert_eq!(b.rx.recv().await.as_deref(), Some(i.to_string().as_str()));
    }
}

#[test]
fn fan_out_count_carries_count_at_delivery() {
    let r = ConnectionRegistry::new(8);
    let mut a = r.admit("a", None).unwrap();
    let mut b = r.admit("b", None).unwrap();
    let c = r.admit("c", None).unwrap();
    drop(c);

    let failed = r.fan_out_count(|n| msg(&n.to_string()));
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].client_id(), "c");
    assert_eq!(a.rx.try_recv().ok().as_deref(), Some("3"));
    assert_eq!(b.rx.try_recv().ok().as_deref(), Some("3"));
}

#[test]
fn for_each_visits_snapshot() {
    let r = ConnectionRegistry::new(8);
    let _a = r.admit("a", None).unwrap();
    let _b = r.admit("b", None).unwrap();
    let mut seen = Vec::new();
    r.for_each_except("a", |rcpt| seen.push(rcpt.id.clone()));
    assert_eq!(seen, vec!["b".to_string()]);
    let mut all = 0;
    r.for_each_all(|_| all += 1);
    assert_eq!(all, 2);
}

// =============================================================================
// activity
// =============================================================================

#[test]
fn inactive_detects_idle_connections() {
    let r = ConnectionRegistry::new(8);
    let t0 = OffsetDateTime::now_utc();
    let a = r.admit_at("a", None, None, t0).unwrap();
    let _b = r.admit_at("b", None, None, t0).unwrap();
    r.touch_at("b", t0 + time::Duration::seconds(250));

    let idle = r.inactive_at(Duration::from_secs(300), t0 + time::Duration::seconds(301));
    assert_eq!(idle, vec![("a".to_string(), a.token)]);
}

#[test]
fn touch_unknown_is_noop() {
    let r = ConnectionRegistry::new(8);
    r.touch("ghost");
    assert_eq!(r.count(), 0);
}

#[test]
fn infos_report_ip_and_duration() {
    let r = ConnectionRegistry::new(8);
    let t0 = OffsetDateTime::now_utc();
    let _a = r.admit_at("a", Some("1.2.3.4".into()), None, t0).unwrap();
    r.touch_at("a", t0 + time::Duration::seconds(10));

    let infos = r.infos();
    assert_eq!(infos.len(), 1);
    assert_eq!(infos[0].client_id, "a");
    assert_eq!(infos[0].ip_address.as_deref(), Some("1.2.3.4"));
    assert!((infos[0].session_duration - 10.0).abs() < 1e-6);
    assert!(infos[0].last_activity > infos[0].connected_at);
}
