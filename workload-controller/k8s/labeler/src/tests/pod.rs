use super::*;
use pretty_assertions::assert_eq;

#[tokio::test]
async fn second_sync_is_a_noop() {
    let h = Harness::new();
    let wl1 = h.workload("wl1", "wl1", "x");
    let svc1 = h.put_service(mk_service(
        "svc1",
        &["wl1"],
        labels(&[("workloadID_svc1", "true")]),
    ));
    h.registry.store(svc1, [wl1].into_iter().collect());
    let p1 = h.put_pod(mk_pod("p1", &[("app", "x"), ("workloadID_gone", "true")]));

    assert_eq!(h.sync_pod(&p1).await.unwrap(), Outcome::Updated);
    assert_eq!(h.sync_pod(&p1).await.unwrap(), Outcome::Unchanged);

    assert_eq!(h.pod_updates(), vec![p1.clone()]);
    assert_eq!(
        h.pod_labels(&p1),
        labels(&[("app", "x"), ("workloadID_svc1", "true")])
    );
}

#[tokio::test]
async fn equal_labels_are_not_written() {
    let h = Harness::new();
    let wl1 = h.workload("wl1", "wl1", "x");
    let svc1 = h.put_service(mk_service(
        "svc1",
        &["wl1"],
        labels(&[("workloadID_svc1", "true")]),
    ));
    h.registry.store(svc1, [wl1].into_iter().collect());
    let p1 = h.put_pod(mk_pod(
        "p1",
        &[("workloadID_svc1", "true"), ("app", "x"), ("version", "v1")],
    ));
    let p2 = h.put_pod(mk_pod("p2", &[("app", "y")]));

    assert_eq!(h.sync_pod(&p1).await.unwrap(), Outcome::Unchanged);
    assert_eq!(h.sync_pod(&p2).await.unwrap(), Outcome::Unchanged);
    assert!(h.pod_updates().is_empty());
}

#[tokio::test]
async fn later_service_wins_conflicting_labels() {
    let h = Harness::new();
    let wl1 = h.workload("wl1", "wl1", "x");
    for (name, tier) in [("svc-b", "b"), ("svc-a", "a")] {
        let synthetic = format!("workloadID_{name}");
        let selector = labels(&[("tier", tier), (synthetic.as_str(), "true")]);
        let svc = h.put_service(mk_service(name, &["wl1"], selector));
        h.registry.store(svc, [wl1.clone()].into_iter().collect());
    }
    let p1 = h.put_pod(mk_pod("p1", &[("app", "x")]));

    assert_eq!(h.sync_pod(&p1).await.unwrap(), Outcome::Updated);
    assert_eq!(
        h.pod_labels(&p1),
        labels(&[
            ("app", "x"),
            ("tier", "b"),
            ("workloadID_svc-a", "true"),
            ("workloadID_svc-b", "true"),
        ])
    );
}

#[tokio::test]
async fn missing_service_is_skipped() {
    let h = Harness::new();
    let wl1 = h.workload("wl1", "wl1", "x");
    h.registry
        .store(ResourceId::new(NS, "gone"), [wl1].into_iter().collect());
    let p1 = h.put_pod(mk_pod("p1", &[("app", "x"), ("workloadID_gone", "true")]));

    assert_eq!(h.sync_pod(&p1).await.unwrap(), Outcome::Updated);
    assert_eq!(h.pod_labels(&p1), labels(&[("app", "x")]));
}

#[tokio::test]
async fn absent_and_terminating_pods_are_skipped() {
    let h = Harness::new();
    h.workload("wl1", "wl1", "x");
    let p1 = h.put_pod(terminating(mk_pod(
        "p1",
        &[("app", "x"), ("workloadID_gone", "true")],
    )));

    assert_eq!(h.sync_pod(&p1).await.unwrap(), Outcome::Skipped);
    assert_eq!(
        h.sync_pod(&ResourceId::new(NS, "p2")).await.unwrap(),
        Outcome::Skipped
    );
    assert!(h.pod_updates().is_empty());
}

#[tokio::test]
async fn update_failure_is_reported() {
    let h = Harness::new();
    h.workload("wl1", "wl1", "x");
    let p1 = h.put_pod(mk_pod("p1", &[("app", "x"), ("workloadID_gone", "true")]));
    h.fail_pod(&p1);

    let error = h.sync_pod(&p1).await.unwrap_err();
    assert!(error.to_string().contains("default/p1"), "{error}");
    assert_eq!(
        h.pod_labels(&p1),
        labels(&[("app", "x"), ("workloadID_gone", "true")])
    );
}
