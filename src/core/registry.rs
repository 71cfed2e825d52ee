//! In-process live core.
//!
//! Holds the running configuration as per-class tag maps and, when a
//! snapshot path is configured, rewrites a full JSON document after every
//! change so an external data plane can reload it.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use serde_json::Value;

use crate::assembler::CoreDocument;
use crate::core::{CoreAdapter, CoreError, CoreResult};

/// Live registry of inbounds, outbounds and endpoints keyed by tag.
pub struct RegistryCore {
    running: AtomicBool,
    /// Document the core was last started with; its arrays are superseded
    /// by the maps below.
    base: ArcSwap<CoreDocument>,
    inbounds: DashMap<String, Value>,
    outbounds: DashMap<String, Value>,
    endpoints: DashMap<String, Value>,
    snapshot_path: Option<PathBuf>,
}

impl RegistryCore {
    pub fn new(snapshot_path: Option<PathBuf>) -> Self {
        Self {
            running: AtomicBool::new(false),
            base: ArcSwap::from_pointee(CoreDocument::default()),
            inbounds: DashMap::new(),
            outbounds: DashMap::new(),
            endpoints: DashMap::new(),
            snapshot_path,
        }
    }

    /// Current running document, arrays sorted by tag.
    pub fn snapshot(&self) -> CoreDocument {
        fn sorted(map: &DashMap<String, Value>) -> Vec<Value> {
            let mut entries: Vec<(String, Value)> = map
                .iter()
                .map(|e| (e.key().clone(), e.value().clone()))
                .collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            entries.into_iter().map(|(_, v)| v).collect()
        }

        let mut document = CoreDocument::clone(&self.base.load());
        document.inbounds = sorted(&self.inbounds);
        document.outbounds = sorted(&self.outbounds);
        document.endpoints = sorted(&self.endpoints);
        document
    }

    fn ensure_running(&self) -> CoreResult<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(CoreError::NotRunning)
        }
    }

    fn add(&self, kind: &'static str, map: &DashMap<String, Value>, config: &Value) -> CoreResult<()> {
        self.ensure_running()?;
        let tag = config
            .get("tag")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CoreError::Rejected {
                kind,
                reason: "missing tag".into(),
            })?;
        let replaced = map.insert(tag.to_string(), config.clone()).is_some();
        tracing::debug!(kind, tag, replaced, "Core entry added");
        self.persist()
    }

    fn remove(&self, kind: &'static str, map: &DashMap<String, Value>, tag: &str) -> CoreResult<()> {
        self.ensure_running()?;
        if map.remove(tag).is_none() {
            return Err(CoreError::NotFound {
                kind,
                tag: tag.to_string(),
            });
        }
        tracing::debug!(kind, tag, "Core entry removed");
        self.persist()
    }

    fn persist(&self) -> CoreResult<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let body = serde_json::to_vec_pretty(&self.snapshot())
            .map_err(|e| CoreError::Rejected {
                kind: "document",
                reason: e.to_string(),
            })?;
        write_atomic(path, &body)?;
        Ok(())
    }
}

/// Writes through a sibling temp file so readers never see a partial file.
fn write_atomic(path: &Path, body: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, body)?;
    std::fs::rename(&tmp, path)
}

impl CoreAdapter for RegistryCore {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn start(&self, document: &CoreDocument) -> CoreResult<()> {
        let load = |kind: &'static str, map: &DashMap<String, Value>, items: &[Value]| {
            map.clear();
            for item in items {
                match item.get("tag").and_then(Value::as_str) {
                    Some(tag) => {
                        map.insert(tag.to_string(), item.clone());
                    }
                    None => tracing::warn!(kind, "Skipping untagged entry"),
                }
            }
        };
        load("inbound", &self.inbounds, &document.inbounds);
        load("outbound", &self.outbounds, &document.outbounds);
        load("endpoint", &self.endpoints, &document.endpoints);
        self.base.store(Arc::new(document.clone()));
        self.running.store(true, Ordering::Release);

        tracing::info!(
            inbounds = self.inbounds.len(),
            outbounds = self.outbounds.len(),
            endpoints = self.endpoints.len(),
            "Core started"
        );
        self.persist()
    }

    fn stop(&self) -> CoreResult<()> {
        self.running.store(false, Ordering::Release);
        self.inbounds.clear();
        self.outbounds.clear();
        self.endpoints.clear();
        tracing::info!("Core stopped");
        Ok(())
    }

    fn add_inbound(&self, config: &Value) -> CoreResult<()> {
        self.add("inbound", &self.inbounds, config)
    }

    fn remove_inbound(&self, tag: &str) -> CoreResult<()> {
        self.remove("inbound", &self.inbounds, tag)
    }

    fn add_outbound(&self, config: &Value) -> CoreResult<()> {
        self.add("outbound", &self.outbounds, config)
    }

    fn remove_outbound(&self, tag: &str) -> CoreResult<()> {
        self.remove("outbound", &self.outbounds, tag)
    }

    fn add_endpoint(&self, config: &Value) -> CoreResult<()> {
        self.add("endpoint", &self.endpoints, config)
    }

    fn remove_endpoint(&self, tag: &str) -> CoreResult<()> {
        self.remove("endpoint", &self.endpoints, tag)
    }
}
