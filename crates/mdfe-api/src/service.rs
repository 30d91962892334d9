//! # Manifest Service
//!
//! Thin façade over the lifecycle for the surrounding service layer. Each
//! operation resolves its manifest in the [`ManifestRegistry`], runs the
//! lifecycle transition on it and returns either a result payload or one
//! [`ServiceError`].
//!
//! | Operation                | Lifecycle                                        |
//! |--------------------------|--------------------------------------------------|
//! | `generate_manifest`      | assemble, register as Draft, sign                |
//! | `transmit_manifest`      | sign if still Draft, transmit, poll once         |
//! | `consult_manifest`       | poll if Transmitted, then consult the authority  |
//! | `cancel_manifest`        | cancel event                                     |
//! | `close_manifest`         | closure event                                    |
//! | `service_status`         | authority service status                         |
//! | `consult_open_manifests` | open-manifest query for an issuer                |

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDate;
use mdfe_core::{AccessKey, Cnpj, Timestamp};
use mdfe_gateway::{
    GatewayConfig, GatewayOperation, SharedGateway, TransmissionBatch, TransmissionGateway,
};
use mdfe_state::{
    Closure, Consultation, DocumentAssembler, LifecycleError, ManifestData, ManifestDocument,
    ManifestLifecycle, ManifestState, OpenManifests, PollOutcome, ServiceStatus,
    TransitionRecord,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ErrorDetail, ServiceError};
use crate::registry::{ManifestEntry, ManifestRegistry};

// ─── Result Payloads ────────────────────────────────────────────────

/// Caller-facing view of a registered manifest.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestSummary {
    pub id: Uuid,
    pub state: ManifestState,
    pub issuer: Cnpj,
    pub series: u16,
    pub number: u32,
    pub access_key: Option<AccessKey>,
    pub receipt: Option<String>,
    pub protocol: Option<String>,
    pub authority_status: Option<u16>,
    pub authority_reason: Option<String>,
    pub created_at: Timestamp,
    pub transitions: Vec<TransitionRecord>,
}

impl From<&ManifestDocument> for ManifestSummary {
    fn from(doc: &ManifestDocument) -> Self {
        Self {
            id: doc.id(),
            state: doc.state(),
            issuer: doc.issuer().clone(),
            series: doc.series(),
            number: doc.number(),
            access_key: doc.access_key().cloned(),
            receipt: doc.receipt().map(str::to_string),
            protocol: doc.protocol().map(str::to_string),
            authority_status: doc.authority_status(),
            authority_reason: doc.authority_reason().map(str::to_string),
            created_at: doc.created_at(),
            transitions: doc.transitions().to_vec(),
        }
    }
}

/// Result of [`ManifestService::transmit_manifest`].
///
/// Once the batch is accepted the call succeeds. Exactly one of `outcome`
/// and `poll_error` is set; a failed first poll leaves the manifest
/// Transmitted, to be completed through `consult_manifest`.
#[derive(Debug, Clone, Serialize)]
pub struct Transmission {
    pub receipt: String,
    pub outcome: Option<PollOutcome>,
    pub poll_error: Option<ErrorDetail>,
    pub manifest: ManifestSummary,
}

/// Result of [`ManifestService::consult_manifest`].
#[derive(Debug, Clone, Serialize)]
pub struct ManifestConsultation {
    pub situation: Consultation,
    /// Outcome of the receipt poll run for a registered, still
    /// transmitted manifest.
    pub poll: Option<PollOutcome>,
    /// The registered manifest with this key, if this process created it.
    pub manifest: Option<ManifestSummary>,
}

// ─── Service ────────────────────────────────────────────────────────

/// Upstream façade over one gateway session.
#[derive(Debug)]
pub struct ManifestService {
    lifecycle: ManifestLifecycle,
    assembler: DocumentAssembler,
    registry: ManifestRegistry,
    next_batch: AtomicU64,
}

impl ManifestService {
    pub fn new(lifecycle: ManifestLifecycle, assembler: DocumentAssembler) -> Self {
        Self {
            lifecycle,
            assembler,
            registry: ManifestRegistry::new(),
            next_batch: AtomicU64::new(1),
        }
    }

    /// Initialize `gateway` with `config` and build a service over it.
    pub fn open(
        gateway: Box<dyn TransmissionGateway>,
        config: &GatewayConfig,
    ) -> Result<Self, ServiceError> {
        let shared = SharedGateway::open(gateway, config)
            .map_err(|e| LifecycleError::from_gateway(GatewayOperation::Initialize, e))?;
        tracing::info!(
            environment = ?config.environment,
            issuer = %config.issuer.cnpj,
            "manifest service opened"
        );
        Ok(Self::new(
            ManifestLifecycle::new(shared),
            DocumentAssembler::new(config.environment),
        ))
    }

    pub fn lifecycle(&self) -> &ManifestLifecycle {
        &self.lifecycle
    }

    pub fn registry(&self) -> &ManifestRegistry {
        &self.registry
    }

    /// Current view of manifest `id`.
    pub fn manifest(&self, id: Uuid) -> Result<ManifestSummary, ServiceError> {
        let entry = self.entry(id)?;
        let doc = entry.lock();
        Ok(ManifestSummary::from(&*doc))
    }

    /// Assemble `data`, register it and sign it.
    ///
    /// A manifest that fails to sign stays registered as `Draft`; the error
    /// names its id so the caller can retry through `transmit_manifest`.
    pub fn generate_manifest(&self, data: &ManifestData) -> Result<ManifestSummary, ServiceError> {
        let doc = self.assembler.assemble(data)?;
        let id = doc.id();
        let entry = self.registry.insert(doc);
        tracing::info!(manifest_id = %id, "manifest registered");

        let mut doc = entry.lock();
        let key = self
            .lifecycle
            .sign(&mut doc)
            .map_err(|e| ServiceError::lifecycle(id, e))?;
        self.registry.index_key(id, &key);
        Ok(ManifestSummary::from(&*doc))
    }

    /// Transmit manifest `id` under `batch_id` and poll its receipt once.
    ///
    /// Errors only when nothing reached the authority or the batch was
    /// refused; a poll failure is reported in [`Transmission::poll_error`].
    pub fn transmit_manifest(&self, id: Uuid, batch_id: u64) -> Result<Transmission, ServiceError> {
        let batch = TransmissionBatch::new(batch_id)?;
        let entry = self.entry(id)?;
        let mut doc = entry.lock();
        let fail = move |e: LifecycleError| ServiceError::lifecycle(id, e);

        if doc.state() == ManifestState::Draft {
            let key = self.lifecycle.sign(&mut doc).map_err(fail)?;
            self.registry.index_key(id, &key);
        }
        let receipt = self.lifecycle.transmit(&mut doc, batch).map_err(fail)?;
        let (outcome, poll_error) = match self.lifecycle.poll_status(&mut doc) {
            Ok(outcome) => (Some(outcome), None),
            Err(e) => {
                let error = fail(e);
                tracing::warn!(
                    manifest_id = %id,
                    receipt = %receipt,
                    error = %error,
                    "first receipt poll failed, manifest stays transmitted"
                );
                (None, Some(error.to_body().error))
            }
        };
        Ok(Transmission {
            receipt,
            outcome,
            poll_error,
            manifest: ManifestSummary::from(&*doc),
        })
    }

    /// Situation of `key` at the authority.
    ///
    /// A registered manifest still waiting on its receipt is polled first,
    /// so this also completes pending authorizations.
    pub fn consult_manifest(&self, key: &str) -> Result<ManifestConsultation, ServiceError> {
        let key = AccessKey::new(key)?;
        let Some((id, entry)) = self.registry.find_by_key(&key) else {
            let situation = self.lifecycle.consult(&key)?;
            return Ok(ManifestConsultation {
                situation,
                poll: None,
                manifest: None,
            });
        };

        let mut doc = entry.lock();
        let fail = move |e: LifecycleError| ServiceError::lifecycle(id, e);
        let poll = if doc.state() == ManifestState::Transmitted {
            Some(self.lifecycle.poll_status(&mut doc).map_err(fail)?)
        } else {
            None
        };
        let situation = self.lifecycle.consult(&key).map_err(fail)?;
        Ok(ManifestConsultation {
            situation,
            poll,
            manifest: Some(ManifestSummary::from(&*doc)),
        })
    }

    /// Cancel the manifest signed with `key`.
    pub fn cancel_manifest(
        &self,
        key: &str,
        justification: &str,
    ) -> Result<ManifestSummary, ServiceError> {
        let (id, entry) = self.entry_by_key(key)?;
        let batch = self.next_batch()?;
        let mut doc = entry.lock();
        self.lifecycle
            .cancel(&mut doc, justification, batch)
            .map_err(|e| ServiceError::lifecycle(id, e))?;
        Ok(ManifestSummary::from(&*doc))
    }

    /// Close the manifest signed with `key` at `destination_municipality`.
    /// `closed_on` defaults to today's UTC date.
    pub fn close_manifest(
        &self,
        key: &str,
        destination_municipality: &str,
        closed_on: Option<NaiveDate>,
    ) -> Result<ManifestSummary, ServiceError> {
        let (id, entry) = self.entry_by_key(key)?;
        let closure = Closure {
            municipality_code: destination_municipality.to_string(),
            closed_on: closed_on.unwrap_or_else(|| Timestamp::now().date()),
        };
        let mut doc = entry.lock();
        self.lifecycle
            .close(&mut doc, &closure)
            .map_err(|e| ServiceError::lifecycle(id, e))?;
        Ok(ManifestSummary::from(&*doc))
    }

    pub fn service_status(&self) -> Result<ServiceStatus, ServiceError> {
        Ok(self.lifecycle.service_status()?)
    }

    /// Authorized, unclosed manifests of `issuer_cnpj`.
    pub fn consult_open_manifests(&self, issuer_cnpj: &str) -> Result<OpenManifests, ServiceError> {
        let issuer = Cnpj::new(issuer_cnpj)?;
        Ok(self.lifecycle.query_open_manifests(&issuer)?)
    }

    fn entry(&self, id: Uuid) -> Result<ManifestEntry, ServiceError> {
        self.registry
            .get(&id)
            .ok_or_else(|| ServiceError::NotFound(format!("manifest {id}")))
    }

    fn entry_by_key(&self, key: &str) -> Result<(Uuid, ManifestEntry), ServiceError> {
        let key = AccessKey::new(key)?;
        self.registry
            .find_by_key(&key)
            .ok_or_else(|| ServiceError::NotFound(format!("manifest with key {key}")))
    }

    fn next_batch(&self) -> Result<TransmissionBatch, ServiceError> {
        Ok(TransmissionBatch::new(
            self.next_batch.fetch_add(1, Ordering::Relaxed),
        )?)
    }
}
