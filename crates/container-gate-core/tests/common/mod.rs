// crates/container-gate-core/tests/common/mod.rs
// ============================================================================
// Module: Admission Test Fixtures
// Description: Fake inventory, recording audit sink, and gate builders.
// Purpose: Drive the admission gate without a container runtime.
// Dependencies: container-gate-core, tokio
// ============================================================================

#![allow(dead_code, reason = "Fixtures are shared across test binaries.")]

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use container_gate_core::AdmissionAuditEvent;
use container_gate_core::AdmissionGate;
use container_gate_core::AdminPrincipal;
use container_gate_core::ContainerInventory;
use container_gate_core::GateAuditSink;
use container_gate_core::GateComponents;
use container_gate_core::GateNoticeEvent;
use container_gate_core::GateNoticeKind;
use container_gate_core::GateSettings;
use container_gate_core::InventoryEntry;
use container_gate_core::InventoryError;
use container_gate_core::OwnershipStore;
use container_gate_core::PermitAllSupplementary;
use container_gate_core::PolicyDataType;
use container_gate_core::PolicyKind;
use container_gate_core::PolicyRule;
use container_gate_core::PolicySource;
use container_gate_core::RegexPolicyEvaluator;
use container_gate_core::RouteTable;
use container_gate_core::StaticPolicySource;
use container_gate_core::SupplementaryPolicy;

/// Admin secret used by fixtures.
pub const ADMIN_TOKEN: &str = "admin-secret-token";

/// Full identifier of the `web` fixture container.
pub const WEB_ID: &str = "f760a15e19af19f97e52ead30d4cb5f8c906e601bab8cb63ccc071857df44b75";

/// Full identifier of the `db` fixture container.
pub const DB_ID: &str = "0b1c2d3e4f5a6b7c8d9e0f1a2b3c4d5e6f7a8b9c0d1e2f3a4b5c6d7e8f9a0b1c";

/// Handles for a fetch parked by [`FakeInventory::hold_next_fetch`].
pub struct HeldFetch {
    /// Signalled once the parked fetch has started.
    pub started: Arc<Notify>,
    /// Signal to let the parked fetch return its snapshot.
    pub release: Arc<Notify>,
}

/// Frozen snapshot returned by a parked fetch.
struct ParkedFetch {
    entries: Vec<InventoryEntry>,
    started: Arc<Notify>,
    release: Arc<Notify>,
}

/// Scriptable inventory.
#[derive(Default)]
pub struct FakeInventory {
    entries: Mutex<Vec<InventoryEntry>>,
    failing: Mutex<bool>,
    delay: Mutex<Option<Duration>>,
    parked: Mutex<Option<ParkedFetch>>,
}

impl FakeInventory {
    pub fn with_entries(entries: &[(&str, &str)]) -> Self {
        let inventory = Self::default();
        inventory.set_entries(entries);
        inventory
    }

    pub fn set_entries(&self, entries: &[(&str, &str)]) {
        let list = entries.iter().map(|(id, name)| InventoryEntry::new(*id, *name)).collect();
        *self.entries.lock().unwrap() = list;
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Parks the next fetch until released; it then returns `entries`.
    pub fn hold_next_fetch(&self, entries: &[(&str, &str)]) -> HeldFetch {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        *self.parked.lock().unwrap() = Some(ParkedFetch {
            entries: entries.iter().map(|(id, name)| InventoryEntry::new(*id, *name)).collect(),
            started: Arc::clone(&started),
            release: Arc::clone(&release),
        });
        HeldFetch {
            started,
            release,
        }
    }
}

#[async_trait]
impl ContainerInventory for FakeInventory {
    async fn list_containers(&self) -> Result<Vec<InventoryEntry>, InventoryError> {
        let parked = self.parked.lock().unwrap().take();
        if let Some(parked) = parked {
            parked.started.notify_one();
            parked.release.notified().await;
            return Ok(parked.entries);
        }
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.failing.lock().unwrap() {
            return Err(InventoryError::Unreachable("daemon offline".to_string()));
        }
        Ok(self.entries.lock().unwrap().clone())
    }
}

/// Audit sink that keeps every event in memory.
#[derive(Default)]
pub struct RecordingSink {
    pub decisions: Mutex<Vec<AdmissionAuditEvent>>,
    pub notices: Mutex<Vec<GateNoticeEvent>>,
}

impl RecordingSink {
    pub fn notice_kinds(&self) -> Vec<GateNoticeKind> {
        self.notices.lock().unwrap().iter().map(|notice| notice.kind).collect()
    }

    pub fn last_decision(&self) -> AdmissionAuditEvent {
        self.decisions.lock().unwrap().last().cloned().expect("decision recorded")
    }
}

impl GateAuditSink for RecordingSink {
    fn record(&self, event: &AdmissionAuditEvent) {
        self.decisions.lock().unwrap().push(event.clone());
    }

    fn record_notice(&self, event: &GateNoticeEvent) {
        self.notices.lock().unwrap().push(event.clone());
    }
}

/// Policy rules used by fixtures.
pub fn sample_rules() -> Vec<PolicyRule> {
    vec![
        PolicyRule::new("Privileged", "false", PolicyDataType::Bool, PolicyKind::ExpectToSee),
        PolicyRule::new(
            "SecurityOpt",
            "[apparmor=unconfined]",
            PolicyDataType::Slice,
            PolicyKind::DoesntExpectToSee,
        ),
    ]
}

/// Gate plus handles to its fakes.
pub struct Harness {
    pub gate: AdmissionGate,
    pub inventory: Arc<FakeInventory>,
    pub sink: Arc<RecordingSink>,
}

/// Builder for gate fixtures.
pub struct HarnessBuilder {
    inventory: FakeInventory,
    policy: Arc<dyn PolicySource>,
    supplementary: Arc<dyn SupplementaryPolicy>,
    settings: GateSettings,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        let evaluator = RegexPolicyEvaluator::new(sample_rules()).expect("compile rules");
        Self {
            inventory: FakeInventory::with_entries(&[(WEB_ID, "/web"), (DB_ID, "/db")]),
            policy: Arc::new(StaticPolicySource::new(Arc::new(evaluator))),
            supplementary: Arc::new(PermitAllSupplementary),
            settings: GateSettings::default(),
        }
    }

    pub fn policy(mut self, policy: Arc<dyn PolicySource>) -> Self {
        self.policy = policy;
        self
    }

    pub fn supplementary(mut self, supplementary: Arc<dyn SupplementaryPolicy>) -> Self {
        self.supplementary = supplementary;
        self
    }

    pub fn inventory_timeout(mut self, timeout: Duration) -> Self {
        self.settings.inventory_timeout = timeout;
        self
    }

    pub fn build(self) -> Harness {
        let inventory = Arc::new(self.inventory);
        let sink = Arc::new(RecordingSink::default());
        let gate = AdmissionGate::new(
            GateComponents {
                routes: RouteTable::with_defaults().expect("default routes"),
                admin: AdminPrincipal::from_secret(ADMIN_TOKEN),
                store: Arc::new(OwnershipStore::new()),
                inventory: Arc::clone(&inventory) as Arc<dyn ContainerInventory>,
                policy: self.policy,
                supplementary: self.supplementary,
                audit: Arc::clone(&sink) as Arc<dyn GateAuditSink>,
            },
            self.settings,
        );
        Harness {
            gate,
            inventory,
            sink,
        }
    }
}

/// Builds the default harness.
pub fn harness() -> Harness {
    HarnessBuilder::new().build()
}
