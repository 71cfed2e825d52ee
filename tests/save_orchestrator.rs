//! End-to-end save scenarios against an in-memory store and a recording core.

use serde_json::{json, Value};

use proxy_control::core::CoreAdapter;
use proxy_control::engine::{Action, ChangeQuery, EngineError, ObjectClass, SaveRequest};
use proxy_control::store::{clients, endpoints, inbounds, outbounds, StoreError};
use proxy_control::validation::ValidationError;

mod common;
use common::{Harness, RecordingCore};

fn wireguard(tag: &str, allowed: &[&str]) -> Value {
    json!({
        "type": "wireguard",
        "tag": tag,
        "address": ["10.99.0.1/32"],
        "peers": [{
            "public_key": "PK1",
            "address": "1.2.3.4",
            "port": 51820,
            "allowed_ips": allowed,
            "persistent_keepalive": 25,
        }],
    })
}

fn trojan(tag: &str, port: u16) -> Value {
    json!({"type": "trojan", "tag": tag, "listen": "::", "listen_port": port})
}

fn new_inbound(h: &Harness, tag: &str, port: u16) -> i64 {
    h.ok(ObjectClass::Inbounds, Action::New, trojan(tag, port))
        .committed
        .objects[0]
}

fn alice(inbound_ids: &[i64]) -> Value {
    json!({
        "name": "alice",
        "inbounds": inbound_ids,
        "config": {"trojan": {"name": "alice", "password": "pw"}},
        "links": [{"type": "external", "remark": "cdn", "uri": "trojan://x@cdn.example:443#cdn"}],
    })
}

fn row_counts(h: &Harness) -> (usize, usize, usize) {
    h.engine
        .store()
        .read(|conn| {
            Ok::<_, StoreError>((
                inbounds::list(conn)?.len(),
                clients::list(conn)?.len(),
                endpoints::list(conn)?.len(),
            ))
        })
        .unwrap()
}

#[test]
fn test_endpoint_retrievable_by_tag() {
    let h = Harness::running();
    let outcome = h.ok(
        ObjectClass::Endpoints,
        Action::New,
        wireguard("ep1", &["10.0.0.0/24"]),
    );
    assert!(outcome.convergence.is_converged());

    let stored = h
        .engine
        .store()
        .read(|conn| endpoints::get_by_tag(conn, "ep1"))
        .unwrap()
        .expect("ep1 stored");
    assert_eq!(stored.id, outcome.committed.objects[0]);
    assert_eq!(stored.options["peers"][0]["allowed_ips"][0], "10.0.0.0/24");
    assert!(h.core.live("endpoint:ep1").is_some());
}

#[test]
fn test_overlapping_range_names_the_owner() {
    let h = Harness::running();
    h.ok(ObjectClass::Endpoints, Action::New, wireguard("ep1", &["10.0.0.0/24"]));
    h.core.reset_calls();

    let err = h
        .save(ObjectClass::Endpoints, Action::New, wireguard("ep2", &["10.0.0.5/32"]))
        .unwrap_err();
    match &err {
        EngineError::Validation(ValidationError::RangeConflict { tag, .. }) => assert_eq!(tag, "ep1"),
        other => panic!("expected a range conflict, got {other:?}"),
    }
    assert!(err.to_string().contains("ep1"));

    let (ep1, ep2) = h
        .engine
        .store()
        .read(|conn| {
            Ok::<_, StoreError>((
                endpoints::get_by_tag(conn, "ep1")?,
                endpoints::get_by_tag(conn, "ep2")?,
            ))
        })
        .unwrap();
    assert_eq!(ep1.unwrap().options["peers"][0]["allowed_ips"][0], "10.0.0.0/24");
    assert!(ep2.is_none());
    assert!(h.core.calls().is_empty(), "rejected save touched the core");
}

#[test]
fn test_endpoint_edit_keeps_its_own_ranges() {
    let h = Harness::running();
    let id = h.ok(ObjectClass::Endpoints, Action::New, wireguard("ep1", &["10.0.0.0/24"]))
        .committed
        .objects[0];

    let mut edited = wireguard("ep1", &["10.0.0.0/24", "10.1.0.0/24"]);
    edited["id"] = json!(id);
    h.ok(ObjectClass::Endpoints, Action::Edit, edited);

    let calls = h.core.calls();
    assert!(!calls.contains(&"remove_endpoint:ep1".to_string()));
    assert_eq!(h.core.live("endpoint:ep1").unwrap()["peers"][0]["allowed_ips"][1], "10.1.0.0/24");
}

#[test]
fn test_endpoint_rename_drops_the_old_tag_from_core() {
    let h = Harness::running();
    let id = h.ok(ObjectClass::Endpoints, Action::New, wireguard("ep1", &["10.0.0.0/24"]))
        .committed
        .objects[0];

    let mut renamed = wireguard("ep9", &["10.0.0.0/24"]);
    renamed["id"] = json!(id);
    h.ok(ObjectClass::Endpoints, Action::Edit, renamed);

    assert!(h.core.calls().contains(&"remove_endpoint:ep1".to_string()));
    assert!(h.core.live("endpoint:ep1").is_none());
    assert!(h.core.live("endpoint:ep9").is_some());
}

#[test]
fn test_inbound_delete_strips_only_its_local_descriptor() {
    let h = Harness::running();
    let in1 = new_inbound(&h, "in1", 443);
    let in2 = new_inbound(&h, "in2", 8443);
    h.ok(ObjectClass::Clients, Action::New, alice(&[in1, in2]));

    let before = h
        .engine
        .store()
        .read(|conn| clients::get_by_name(conn, "alice"))
        .unwrap()
        .unwrap();
    let remarks: Vec<_> = before.links.iter().map(|d| d.remark.as_str()).collect();
    assert_eq!(remarks, ["in1", "in2", "cdn"]);
    assert_eq!(before.links[0].uri, "trojan://pw@h.example:443?type=tcp&security=none#in1");

    h.ok(ObjectClass::Inbounds, Action::Del, json!("in1"));

    let after = h
        .engine
        .store()
        .read(|conn| clients::get_by_name(conn, "alice"))
        .unwrap()
        .unwrap();
    assert_eq!(after.inbounds, vec![in2]);
    assert_eq!(after.links.len(), 2);
    assert_eq!(after.links[0], before.links[1]);
    assert_eq!(after.links[1], before.links[2]);
    assert!(h.core.live("inbound:in1").is_none());
}

fn stored_client(h: &Harness, name: &str) -> proxy_control::model::Client {
    h.engine
        .store()
        .read(|conn| clients::get_by_name(conn, name))
        .unwrap()
        .unwrap_or_else(|| panic!("client {name} not stored"))
}

fn remarks(client: &proxy_control::model::Client) -> Vec<&str> {
    client.links.iter().map(|d| d.remark.as_str()).collect()
}

#[test]
fn test_inbound_rename_moves_local_descriptors() {
    let h = Harness::running();
    let in1 = new_inbound(&h, "in1", 443);
    h.ok(ObjectClass::Clients, Action::New, alice(&[in1]));
    let external = stored_client(&h, "alice").links[1].clone();
    h.core.reset_calls();

    let mut renamed = trojan("edge", 443);
    renamed["id"] = json!(in1);
    let outcome = h.ok(ObjectClass::Inbounds, Action::Edit, renamed);
    assert!(outcome.convergence.is_converged());

    assert_eq!(
        h.core.calls(),
        vec!["remove_inbound:in1".to_string(), "add_inbound:edge".to_string()]
    );
    assert!(h.core.live("inbound:in1").is_none());
    let live = h.core.live("inbound:edge").unwrap();
    assert_eq!(live["users"], json!([{"name": "alice", "password": "pw"}]));

    let after = stored_client(&h, "alice");
    assert_eq!(remarks(&after), ["edge", "cdn"]);
    assert_eq!(after.links[0].uri, "trojan://pw@h.example:443?type=tcp&security=none#edge");
    assert_eq!(after.links[1], external);
}

#[test]
fn test_client_edit_restarts_old_and_new_inbounds() {
    let h = Harness::running();
    let in1 = new_inbound(&h, "in1", 443);
    let in2 = new_inbound(&h, "in2", 444);
    let in3 = new_inbound(&h, "in3", 445);
    let id = h.ok(ObjectClass::Clients, Action::New, alice(&[in1, in2]))
        .committed
        .objects[0];

    let mut edited = alice(&[in2, in3]);
    edited["id"] = json!(id);
    let outcome = h.ok(ObjectClass::Clients, Action::Edit, edited);

    assert_eq!(
        outcome.convergence.restarted,
        vec!["in2".to_string(), "in3".to_string(), "in1".to_string()]
    );
    assert!(!h.core.live("inbound:in1").unwrap().to_string().contains("alice"));
    assert_eq!(
        h.core.live("inbound:in3").unwrap()["users"],
        json!([{"name": "alice", "password": "pw"}])
    );

    let after = stored_client(&h, "alice");
    assert_eq!(after.inbounds, vec![in2, in3]);
    assert_eq!(remarks(&after), ["in2", "in3", "cdn"]);
}

#[test]
fn test_tls_edit_resyncs_client_descriptors() {
    let h = Harness::running();
    let tls = h
        .ok(
            ObjectClass::Tls,
            Action::New,
            json!({"name": "main", "server": {"enabled": true, "server_name": "a.example"}}),
        )
        .committed
        .objects[0];
    let mut inbound = trojan("in1", 443);
    inbound["tls_id"] = json!(tls);
    let in1 = h.ok(ObjectClass::Inbounds, Action::New, inbound).committed.objects[0];
    let in2 = new_inbound(&h, "in2", 444);
    h.ok(ObjectClass::Clients, Action::New, alice(&[in1, in2]));

    let before = stored_client(&h, "alice");
    assert!(before.links[0].uri.contains("security=tls&sni=a.example"), "{}", before.links[0].uri);
    h.core.reset_calls();

    let outcome = h.ok(
        ObjectClass::Tls,
        Action::Edit,
        json!({"id": tls, "name": "main", "server": {"enabled": true, "server_name": "b.example"}}),
    );
    assert_eq!(outcome.convergence.restarted, vec!["in1".to_string()]);
    assert_eq!(
        h.core.calls(),
        vec!["remove_inbound:in1".to_string(), "add_inbound:in1".to_string()]
    );
    assert_eq!(h.core.live("inbound:in1").unwrap()["tls"]["server_name"], "b.example");

    let after = stored_client(&h, "alice");
    assert_eq!(remarks(&after), ["in1", "in2", "cdn"]);
    assert!(after.links[0].uri.contains("sni=b.example"), "{}", after.links[0].uri);
    assert_eq!(after.links[1], before.links[1]);
}

#[test]
fn test_tag_uniqueness_within_class() {
    let h = Harness::running();
    new_inbound(&h, "in1", 443);
    let second = new_inbound(&h, "in2", 444);

    let err = h
        .save(ObjectClass::Inbounds, Action::New, trojan("in1", 445))
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::DuplicateTag { .. })
    ));

    let mut renamed = trojan("in1", 444);
    renamed["id"] = json!(second);
    assert!(h.save(ObjectClass::Inbounds, Action::Edit, renamed).is_err());

    // Same tag in another class is fine.
    h.ok(ObjectClass::Outbounds, Action::New, json!({"type": "direct", "tag": "in1"}));
    assert_eq!(row_counts(&h).0, 2);
}

#[test]
fn test_bulk_add_is_all_or_nothing() {
    let h = Harness::running();
    let in1 = new_inbound(&h, "in1", 443);
    let query = ChangeQuery {
        limit: 100,
        ..Default::default()
    };
    assert_eq!(h.engine.changes(&query).unwrap().len(), 1);

    let err = h
        .save(
            ObjectClass::Clients,
            Action::AddBulk,
            json!([
                {"name": "bob", "inbounds": [in1]},
                {"name": "carol", "inbounds": [in1]},
                {"name": "bob"},
            ]),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::DuplicateName { .. })
    ));
    assert_eq!(row_counts(&h).1, 0);

    assert_eq!(h.engine.changes(&query).unwrap().len(), 1, "failed bulk add left a change record");
}

#[test]
fn test_unknown_inbound_link_is_rejected() {
    let h = Harness::running();
    let err = h
        .save(ObjectClass::Clients, Action::New, json!({"name": "dave", "inbounds": [42]}))
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::UnknownInbound(42))
    ));
}

#[test]
fn test_in_transaction_core_failure_rolls_back() {
    let h = Harness::running();
    h.ok(ObjectClass::Clients, Action::New, json!({"name": "erin"}));
    h.core.fail_on("add_inbound");

    let request = SaveRequest::new(ObjectClass::Inbounds, Action::New, trojan("in1", 443).to_string(), "tester")
        .with_init_users(vec![1]);
    let err = h.engine.save(request).unwrap_err();
    assert!(matches!(err, EngineError::Core { op: "add inbound", .. }));

    let (inbound_rows, erin) = h
        .engine
        .store()
        .read(|conn| Ok::<_, StoreError>((inbounds::list(conn)?.len(), clients::get(conn, 1)?)))
        .unwrap();
    assert_eq!(inbound_rows, 0);
    assert!(erin.unwrap().inbounds.is_empty());
}

#[test]
fn test_post_commit_failure_reports_divergence() {
    let h = Harness::running();
    let in1 = new_inbound(&h, "in1", 443);
    h.core.fail_on("add_inbound");

    let outcome = h.ok(ObjectClass::Clients, Action::New, alice(&[in1]));
    assert!(!outcome.convergence.is_converged());
    assert_eq!(outcome.convergence.failures[0].tag, "in1");

    // Committed regardless.
    let stored = h
        .engine
        .store()
        .read(|conn| clients::get_by_name(conn, "alice"))
        .unwrap();
    assert!(stored.is_some());
}

#[test]
fn test_client_save_restarts_linked_inbounds_with_users() {
    let h = Harness::running();
    let in1 = new_inbound(&h, "in1", 443);
    let outcome = h.ok(ObjectClass::Clients, Action::New, alice(&[in1]));

    assert_eq!(outcome.convergence.restarted, vec!["in1".to_string()]);
    let live = h.core.live("inbound:in1").unwrap();
    assert_eq!(live["users"], json!([{"name": "alice", "password": "pw"}]));
}

#[test]
fn test_stopped_core_is_started_after_commit() {
    let h = Harness::new(RecordingCore::stopped());
    let outcome = h.ok(ObjectClass::Outbounds, Action::New, json!({"type": "direct", "tag": "direct"}));

    assert!(outcome.convergence.core_started);
    assert_eq!(h.core.calls(), vec!["start:core".to_string()]);
    assert!(h.core.live("outbound:direct").is_some());
}

#[test]
fn test_config_save_restarts_the_core() {
    let h = Harness::running();
    h.ok(
        ObjectClass::Config,
        Action::Edit,
        json!({"log": {"level": "warn"}}),
    );
    assert_eq!(h.core.calls(), vec!["stop:core".to_string(), "start:core".to_string()]);

    let doc = h.engine.assemble(None).unwrap();
    assert_eq!(doc.log, Some(json!({"level": "warn"})));

    let err = h
        .engine
        .save(SaveRequest::new(ObjectClass::Config, Action::Edit, "[]", "tester"))
        .unwrap_err();
    assert!(matches!(err, EngineError::Parse(_)));
    assert!(matches!(
        h.save(ObjectClass::Config, Action::Del, json!({})).unwrap_err(),
        EngineError::Validation(ValidationError::UnsupportedAction { .. })
    ));
}

#[test]
fn test_assembled_arrays_match_row_counts() {
    let h = Harness::running();
    let in1 = new_inbound(&h, "in1", 443);
    new_inbound(&h, "in2", 444);
    h.ok(ObjectClass::Outbounds, Action::New, json!({"type": "direct", "tag": "direct"}));
    h.ok(ObjectClass::Endpoints, Action::New, wireguard("ep1", &["10.0.0.0/24"]));
    h.ok(ObjectClass::Clients, Action::New, alice(&[in1]));

    let doc = h.engine.assemble(None).unwrap();
    let outbound_rows = h
        .engine
        .store()
        .read(|conn| outbounds::list(conn))
        .unwrap()
        .len();
    let (inbound_rows, _, endpoint_rows) = row_counts(&h);
    assert_eq!(doc.inbounds.len(), inbound_rows);
    assert_eq!(doc.outbounds.len(), outbound_rows);
    assert_eq!(doc.endpoints.len(), endpoint_rows);
}

#[test]
fn test_tls_profile_in_use_cannot_be_deleted() {
    let h = Harness::running();
    let tls = h
        .ok(
            ObjectClass::Tls,
            Action::New,
            json!({"name": "main", "server": {"enabled": true, "server_name": "a.example"}}),
        )
        .committed
        .objects[0];
    let mut inbound = trojan("in1", 443);
    inbound["tls_id"] = json!(tls);
    h.ok(ObjectClass::Inbounds, Action::New, inbound);

    let err = h.save(ObjectClass::Tls, Action::Del, json!(tls)).unwrap_err();
    match err {
        EngineError::Validation(ValidationError::TlsInUse { inbounds, .. }) => {
            assert_eq!(inbounds, vec!["in1".to_string()])
        }
        other => panic!("expected TlsInUse, got {other:?}"),
    }

    // Editing it refreshes the inbound's client snapshot and restarts it.
    let outcome = h.ok(
        ObjectClass::Tls,
        Action::Edit,
        json!({"id": tls, "name": "main", "server": {"enabled": true, "server_name": "b.example"}}),
    );
    assert_eq!(outcome.convergence.restarted, vec!["in1".to_string()]);
    let stored = h
        .engine
        .store()
        .read(|conn| inbounds::get_by_tag(conn, "in1"))
        .unwrap()
        .unwrap();
    assert_eq!(stored.out_json["tls"]["server_name"], "b.example");
}

#[test]
fn test_warp_endpoint_is_provisioned() {
    let h = Harness::running();
    let outcome = h.ok(
        ObjectClass::Endpoints,
        Action::New,
        json!({"type": "warp", "tag": "w1", "mtu": 1280, "ext": {"license_key": "mine"}}),
    );
    let id = outcome.committed.objects[0];

    let stored = h
        .engine
        .store()
        .read(|conn| endpoints::get(conn, id))
        .unwrap()
        .unwrap();
    assert_eq!(stored.ext["device_id"], "device-1");
    assert_eq!(stored.license_key(), "mine");
    assert_eq!(
        h.provisioner.licenses.lock().unwrap().clone(),
        vec![("device-1".to_string(), "mine".to_string())]
    );

    let live = h.core.live("endpoint:w1").unwrap();
    assert_eq!(live["type"], "wireguard");
    assert!(live.get("ext").is_none());

    // A rejected license leaves the stored endpoint untouched.
    let mut edit = serde_json::to_value(&stored).unwrap();
    edit["ext"] = json!({"license_key": "bad"});
    assert!(matches!(
        h.save(ObjectClass::Endpoints, Action::Edit, edit).unwrap_err(),
        EngineError::Provision(_)
    ));
    let again = h
        .engine
        .store()
        .read(|conn| endpoints::get(conn, id))
        .unwrap()
        .unwrap();
    assert_eq!(again.license_key(), "mine");
    assert_eq!(h.provisioner.registrations.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[test]
fn test_wireguard_range_conflicts_with_provisioned_warp() {
    let h = Harness::running();
    h.ok(ObjectClass::Endpoints, Action::New, json!({"type": "warp", "tag": "w1"}));
    h.core.reset_calls();

    let err = h
        .save(ObjectClass::Endpoints, Action::New, wireguard("wg2", &["0.0.0.0/0"]))
        .unwrap_err();
    match &err {
        EngineError::Validation(ValidationError::RangeConflict { tag, .. }) => assert_eq!(tag, "w1"),
        other => panic!("expected a range conflict, got {other:?}"),
    }
    assert!(h.core.calls().is_empty());
    assert!(h.core.live("endpoint:wg2").is_none());
}

#[test]
fn test_outbound_delete_tolerates_missing_core_entry() {
    let h = Harness::running();
    h.ok(ObjectClass::Outbounds, Action::New, json!({"type": "direct", "tag": "direct"}));
    h.core.stop().unwrap();
    h.core.start(&Default::default()).unwrap();

    h.ok(ObjectClass::Outbounds, Action::Del, json!("direct"));
    let err = h.save(ObjectClass::Outbounds, Action::Del, json!("direct")).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::NotFound { .. })
    ));
}

#[test]
fn test_settings_are_coerced() {
    let h = Harness::running();
    h.ok(
        ObjectClass::Settings,
        Action::Edit,
        json!({"webPort": " 2054 ", "webPath": "panel", "subEncode": "0"}),
    );
    let settings = h.engine.settings().unwrap();
    assert_eq!(settings["webPort"], "2054");
    assert_eq!(settings["webPath"], "/panel/");
    assert_eq!(settings["subEncode"], "false");
    assert!(!settings.contains_key("secret"));
    assert!(!settings.contains_key("config"));

    assert!(h
        .save(ObjectClass::Settings, Action::Edit, json!({"webPort": "http"}))
        .is_err());
    assert!(h
        .save(ObjectClass::Settings, Action::Edit, json!({"noSuchKey": "1"}))
        .is_err());
    assert_eq!(h.engine.settings().unwrap()["webPort"], "2054");
}

#[test]
fn test_sweep_disables_depleted_clients() {
    let h = Harness::running();
    let in1 = new_inbound(&h, "in1", 443);
    let mut over = alice(&[in1]);
    over["volume"] = json!(100);
    over["up"] = json!(80);
    over["down"] = json!(30);
    h.ok(ObjectClass::Clients, Action::New, over);
    h.ok(ObjectClass::Clients, Action::New, json!({"name": "fresh", "inbounds": [in1]}));

    let report = h.engine.deplete_clients().unwrap();
    assert_eq!(report.disabled, vec!["alice".to_string()]);
    assert_eq!(report.convergence.restarted, vec!["in1".to_string()]);
    assert_eq!(h.core.live("inbound:in1").unwrap()["users"], json!([]));

    let log = h
        .engine
        .changes(&ChangeQuery {
            actor: Some("DepleteJob".into()),
            class: None,
            limit: 10,
        })
        .unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].action, "disable");
    assert_eq!(log[0].obj, json!("alice"));

    assert!(h.engine.deplete_clients().unwrap().disabled.is_empty());
}
