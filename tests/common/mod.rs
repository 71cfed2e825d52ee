//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use proxy_control::assembler::CoreDocument;
use proxy_control::core::{CoreAdapter, CoreError, CoreResult};
use proxy_control::engine::{Action, Engine, EngineResult, ObjectClass, SaveOutcome, SaveRequest};
use proxy_control::provision::{PeerProvisioner, PeerRegistration, ProvisionError, RemotePeer};
use proxy_control::store::Store;

pub const HOSTNAME: &str = "h.example";

/// In-memory core that records every call and can be told to fail one.
#[derive(Default)]
pub struct RecordingCore {
    running: AtomicBool,
    live: Mutex<BTreeMap<String, Value>>,
    calls: Mutex<Vec<String>>,
    fail_on: Mutex<Option<String>>,
}

impl RecordingCore {
    pub fn running() -> Arc<Self> {
        let core = Self::default();
        core.running.store(true, Ordering::SeqCst);
        Arc::new(core)
    }

    pub fn stopped() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes the next calls of `op` (e.g. `add_inbound`) fail until cleared.
    pub fn fail_on(&self, op: &str) {
        *self.fail_on.lock().unwrap() = Some(op.to_string());
    }

    pub fn clear_failure(&self) {
        *self.fail_on.lock().unwrap() = None;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Live config under `kind:tag` (e.g. `inbound:in1`).
    pub fn live(&self, key: &str) -> Option<Value> {
        self.live.lock().unwrap().get(key).cloned()
    }

    fn record(&self, op: &str, tag: &str) -> CoreResult<()> {
        self.calls.lock().unwrap().push(format!("{op}:{tag}"));
        if self.fail_on.lock().unwrap().as_deref() == Some(op) {
            return Err(CoreError::Rejected {
                kind: "test",
                reason: format!("injected failure on {op}"),
            });
        }
        Ok(())
    }

    fn add(&self, kind: &'static str, config: &Value) -> CoreResult<()> {
        let tag = config["tag"].as_str().unwrap_or_default().to_string();
        self.record(&format!("add_{kind}"), &tag)?;
        self.live.lock().unwrap().insert(format!("{kind}:{tag}"), config.clone());
        Ok(())
    }

    fn remove(&self, kind: &'static str, tag: &str) -> CoreResult<()> {
        self.record(&format!("remove_{kind}"), tag)?;
        match self.live.lock().unwrap().remove(&format!("{kind}:{tag}")) {
            Some(_) => Ok(()),
            None => Err(CoreError::NotFound {
                kind,
                tag: tag.to_string(),
            }),
        }
    }
}

impl CoreAdapter for RecordingCore {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn start(&self, document: &CoreDocument) -> CoreResult<()> {
        self.record("start", "core")?;
        let mut live = self.live.lock().unwrap();
        live.clear();
        for (kind, list) in [
            ("inbound", &document.inbounds),
            ("outbound", &document.outbounds),
            ("endpoint", &document.endpoints),
        ] {
            for config in list {
                let tag = config["tag"].as_str().unwrap_or_default();
                live.insert(format!("{kind}:{tag}"), config.clone());
            }
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) -> CoreResult<()> {
        self.record("stop", "core")?;
        self.live.lock().unwrap().clear();
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn add_inbound(&self, config: &Value) -> CoreResult<()> {
        self.add("inbound", config)
    }

    fn remove_inbound(&self, tag: &str) -> CoreResult<()> {
        self.remove("inbound", tag)
    }

    fn add_outbound(&self, config: &Value) -> CoreResult<()> {
        self.add("outbound", config)
    }

    fn remove_outbound(&self, tag: &str) -> CoreResult<()> {
        self.remove("outbound", tag)
    }

    fn add_endpoint(&self, config: &Value) -> CoreResult<()> {
        self.add("endpoint", config)
    }

    fn remove_endpoint(&self, tag: &str) -> CoreResult<()> {
        self.remove("endpoint", tag)
    }
}

/// Provisioner returning canned registrations.
#[derive(Default)]
pub struct FakeProvisioner {
    pub registrations: AtomicUsize,
    pub licenses: Mutex<Vec<(String, String)>>,
}

impl PeerProvisioner for FakeProvisioner {
    fn register(&self) -> Result<PeerRegistration, ProvisionError> {
        let n = self.registrations.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PeerRegistration {
            device_id: format!("device-{n}"),
            access_token: format!("token-{n}"),
            license_key: format!("issued-{n}"),
            private_key: "cHJpdmF0ZQ==".into(),
            ipv4: format!("172.16.0.{}", n + 1),
            ipv6: format!("fd01::{}", n + 1),
            peer: RemotePeer {
                address: "162.159.192.1".into(),
                port: 2408,
                public_key: "bmlQdWJsaWM=".into(),
                reserved: vec![1, 2, 3],
            },
        })
    }

    fn update_license(&self, device_id: &str, _token: &str, license: &str) -> Result<(), ProvisionError> {
        if license == "bad" {
            return Err(ProvisionError::Api {
                code: "invalid_license".into(),
                message: "license rejected".into(),
            });
        }
        self.licenses
            .lock()
            .unwrap()
            .push((device_id.to_string(), license.to_string()));
        Ok(())
    }
}

pub struct Harness {
    pub engine: Engine,
    pub core: Arc<RecordingCore>,
    pub provisioner: Arc<FakeProvisioner>,
}

impl Harness {
    pub fn new(core: Arc<RecordingCore>) -> Self {
        let provisioner = Arc::new(FakeProvisioner::default());
        let store = Arc::new(Store::open_in_memory().unwrap());
        let engine = Engine::new(
            store,
            Arc::clone(&core) as Arc<dyn CoreAdapter>,
            Arc::clone(&provisioner) as Arc<dyn PeerProvisioner>,
            HOSTNAME,
        );
        Self {
            engine,
            core,
            provisioner,
        }
    }

    pub fn running() -> Self {
        Self::new(RecordingCore::running())
    }

    pub fn save(&self, class: ObjectClass, action: Action, payload: Value) -> EngineResult<SaveOutcome> {
        self.engine
            .save(SaveRequest::new(class, action, payload.to_string(), "tester"))
    }

    /// Saves and asserts success.
    pub fn ok(&self, class: ObjectClass, action: Action, payload: Value) -> SaveOutcome {
        match self.save(class, action, payload) {
            Ok(outcome) => outcome,
            Err(e) => panic!("{class}/{action} failed: {e}"),
        }
    }
}
