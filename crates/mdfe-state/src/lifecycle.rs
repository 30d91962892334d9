//! # Manifest Lifecycle
//!
//! Drives a [`ManifestDocument`] through the transmission gateway.
//!
//! | From        | Event        | Gateway calls (one critical section)        | To                     |
//! |-------------|--------------|---------------------------------------------|------------------------|
//! | Draft       | `sign`       | clear, load, validate, sign                 | Signed                 |
//! | Signed      | `transmit`   | clear, load, sign, send                     | Transmitted            |
//! | Transmitted | `poll_status`| query by receipt                            | Authorized / Rejected  |
//! | Authorized  | `cancel`     | cancel event                                | Cancelled              |
//! | Authorized  | `close`      | closure event                               | Closed                 |
//!
//! Every transition is a single attempt. The state is mutated only after
//! the whole call sequence reported success and the authority response was
//! read; any failure leaves the document exactly as it was. Nothing retries.
//!
//! `transmit` reloads and re-signs the document before sending because
//! another manifest may have used the gateway since this one was signed.
//! The re-signed key must equal the key assigned at signing.

use std::time::Duration;

use chrono::NaiveDate;
use mdfe_core::{AccessKey, Cnpj, DocumentModel, ValidationError};
use mdfe_gateway::{
    AuthorityResponse, CancellationRequest, ClosureRequest, GatewayConfig, GatewayGuard,
    GatewayOperation, GatewayResult, SharedGateway, TransmissionBatch,
};
use serde::{Deserialize, Serialize};

use crate::assembler::municipality_uf;
use crate::document::{LifecycleEvent, ManifestDocument};
use crate::error::LifecycleError;

/// Batch received, awaiting processing.
pub const STATUS_BATCH_RECEIVED: u16 = 103;
/// Batch processed; the protocol block carries the outcome.
pub const STATUS_BATCH_PROCESSED: u16 = 104;
/// Batch still in processing.
pub const STATUS_BATCH_PROCESSING: u16 = 105;
/// Use of the manifest authorized.
pub const STATUS_AUTHORIZED: u16 = 100;
/// Event registered and linked to the manifest.
pub const STATUS_EVENT_REGISTERED: u16 = 135;
/// Event registered but not linked.
pub const STATUS_EVENT_REGISTERED_UNLINKED: u16 = 136;
/// Open-manifest query found manifests.
pub const STATUS_OPEN_FOUND: u16 = 111;
/// Open-manifest query found none.
pub const STATUS_OPEN_NONE: u16 = 112;

/// Justification length bounds for cancellation, in characters.
pub const JUSTIFICATION_MIN: usize = 15;
pub const JUSTIFICATION_MAX: usize = 255;

/// Result of [`ManifestLifecycle::poll_status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PollOutcome {
    /// The authority is still processing; the document stays `Transmitted`.
    Pending { status: u16 },
    Authorized { protocol: String },
    Rejected { status: u16, reason: String },
}

/// Closure ("encerramento") arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Closure {
    /// 7-digit IBGE code of the municipality where the trip ended.
    pub municipality_code: String,
    pub closed_on: NaiveDate,
}

/// Read-only situation of a manifest at the authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consultation {
    pub key: AccessKey,
    pub status: u16,
    pub reason: String,
    pub protocol: Option<String>,
    /// Verbatim authority response.
    pub response: String,
}

/// Manifests of an issuer authorized but not yet closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenManifests {
    pub status: u16,
    pub reason: String,
    pub keys: Vec<AccessKey>,
    pub response: String,
}

/// Authority service availability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub status: u16,
    pub reason: String,
    pub response: String,
}

/// Lifecycle state machine over the shared gateway.
#[derive(Debug, Clone)]
pub struct ManifestLifecycle {
    gateway: SharedGateway,
    timeout: Option<Duration>,
}

impl ManifestLifecycle {
    pub fn new(gateway: SharedGateway) -> Self {
        Self {
            gateway,
            timeout: None,
        }
    }

    /// Deadline for entering the gateway section, overriding the
    /// configured default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn gateway(&self) -> &SharedGateway {
        &self.gateway
    }

    fn enter(&self, operation: GatewayOperation) -> Result<GatewayGuard<'_>, LifecycleError> {
        self.gateway
            .acquire(self.timeout)
            .map_err(|e| LifecycleError::from_gateway(operation, e))
    }

    /// Draft → Signed. Returns the assigned access key.
    pub fn sign(&self, doc: &mut ManifestDocument) -> Result<AccessKey, LifecycleError> {
        doc.require(LifecycleEvent::Sign)?;
        let payload = doc.payload.render();
        let signed = {
            let mut guard = self.enter(GatewayOperation::Sign)?;
            let gw = guard.gateway();
            checked(GatewayOperation::ClearDocuments, gw.clear_documents())?;
            checked(GatewayOperation::LoadDocument, gw.load_document(&payload))?;
            checked(GatewayOperation::Validate, gw.validate())?;
            checked(GatewayOperation::Sign, gw.sign())?
        };

        let key = signed_key(doc, &signed.body)?;
        doc.mark_signed(key.clone(), &signed.body);
        tracing::info!(
            manifest_id = %doc.id,
            access_key = %key,
            "manifest signed"
        );
        Ok(key)
    }

    /// Signed → Transmitted. Returns the batch receipt.
    pub fn transmit(
        &self,
        doc: &mut ManifestDocument,
        batch: TransmissionBatch,
    ) -> Result<String, LifecycleError> {
        doc.require(LifecycleEvent::Transmit)?;
        let key = doc
            .access_key
            .clone()
            .ok_or(LifecycleError::InvalidTransition {
                from: doc.state,
                event: LifecycleEvent::Transmit,
            })?;
        let payload = doc.payload.render();
        let sent = {
            let mut guard = self.enter(GatewayOperation::Send)?;
            let gw = guard.gateway();
            checked(GatewayOperation::ClearDocuments, gw.clear_documents())?;
            checked(GatewayOperation::LoadDocument, gw.load_document(&payload))?;
            let resigned = checked(GatewayOperation::Sign, gw.sign())?;
            let resigned_key = AuthorityResponse::read(&resigned.body).key;
            if resigned_key.as_deref() != Some(key.as_str()) {
                return Err(LifecycleError::UnreadableResponse(format!(
                    "re-signed key {} differs from assigned key {key}",
                    resigned_key.as_deref().unwrap_or("<none>")
                )));
            }
            checked(GatewayOperation::Send, gw.send(&batch))?
        };

        let response = AuthorityResponse::read(&sent.body);
        let Some(receipt) = response.receipt.clone() else {
            return Err(match response.status {
                Some(status)
                    if !(STATUS_BATCH_RECEIVED..=STATUS_BATCH_PROCESSING).contains(&status) =>
                {
                    rejected(status, response.reason.clone(), doc)
                }
                _ => LifecycleError::UnreadableResponse("send response has no receipt".into()),
            });
        };
        doc.mark_transmitted(receipt.clone(), response.status, &sent.body);
        tracing::info!(
            manifest_id = %doc.id,
            access_key = %key,
            batch_id = %batch,
            receipt = %receipt,
            "manifest transmitted"
        );
        Ok(receipt)
    }

    /// Transmitted → Authorized | Rejected, or stays Transmitted while the
    /// authority is still processing. A refusal outside the protocol block
    /// (service paused, bad receipt) is an `AuthorityRejected` error.
    pub fn poll_status(&self, doc: &mut ManifestDocument) -> Result<PollOutcome, LifecycleError> {
        doc.require(LifecycleEvent::PollStatus)?;
        let receipt = doc
            .receipt
            .clone()
            .ok_or_else(|| LifecycleError::UnreadableResponse("document has no receipt".into()))?;
        let answer = {
            let mut guard = self.enter(GatewayOperation::QueryByReceipt)?;
            checked(
                GatewayOperation::QueryByReceipt,
                guard.gateway().query_by_receipt(&receipt),
            )?
        };

        let response = AuthorityResponse::read(&answer.body);
        let status = response
            .effective_status()
            .ok_or_else(|| LifecycleError::UnreadableResponse("receipt query has no status".into()))?;
        let reason = response.effective_reason().map(str::to_string);

        match status {
            STATUS_BATCH_RECEIVED | STATUS_BATCH_PROCESSING => {
                tracing::debug!(manifest_id = %doc.id, status, "authority still processing");
                Ok(PollOutcome::Pending { status })
            }
            STATUS_BATCH_PROCESSED => Err(LifecycleError::UnreadableResponse(
                "processed batch carries no protocol".into(),
            )),
            STATUS_AUTHORIZED => {
                let protocol = response.protocol.as_ref();
                if let (Some(found), Some(own)) =
                    (protocol.and_then(|p| p.key.as_deref()), doc.access_key.as_ref())
                {
                    if found != own.as_str() {
                        return Err(LifecycleError::UnreadableResponse(format!(
                            "protocol is for key {found}, not {own}"
                        )));
                    }
                }
                let number = protocol
                    .and_then(|p| p.protocol.clone())
                    .ok_or_else(|| {
                        LifecycleError::UnreadableResponse("authorization has no protocol".into())
                    })?;
                doc.mark_authorized(number.clone(), status, reason, &answer.body);
                tracing::info!(
                    manifest_id = %doc.id,
                    protocol = %number,
                    "manifest authorized"
                );
                Ok(PollOutcome::Authorized { protocol: number })
            }
            // Only a status inside the protocol block judges the manifest.
            // Anything else refuses the query and leaves it Transmitted.
            _ if response.protocol.as_ref().and_then(|p| p.status).is_none() => {
                Err(rejected(status, reason, doc))
            }
            _ => {
                let reason_text = reason.clone().unwrap_or_default();
                doc.mark_rejected(status, reason, &answer.body);
                tracing::warn!(
                    manifest_id = %doc.id,
                    status,
                    reason = %reason_text,
                    "manifest rejected by the authority"
                );
                Ok(PollOutcome::Rejected {
                    status,
                    reason: reason_text,
                })
            }
        }
    }

    /// Authorized → Cancelled.
    pub fn cancel(
        &self,
        doc: &mut ManifestDocument,
        justification: &str,
        batch: TransmissionBatch,
    ) -> Result<(), LifecycleError> {
        doc.require(LifecycleEvent::Cancel)?;
        let justification = check_justification(justification)?;
        let request = CancellationRequest {
            key: authorized_key(doc, LifecycleEvent::Cancel)?,
            protocol: doc.protocol.clone().unwrap_or_default(),
            justification,
            issuer: doc.issuer.clone(),
            batch,
        };
        let answer = {
            let mut guard = self.enter(GatewayOperation::Cancel)?;
            checked(GatewayOperation::Cancel, guard.gateway().cancel(&request))?
        };
        self.register_event(doc, LifecycleEvent::Cancel, &answer.body)
    }

    /// Authorized → Closed.
    pub fn close(&self, doc: &mut ManifestDocument, closure: &Closure) -> Result<(), LifecycleError> {
        doc.require(LifecycleEvent::Close)?;
        let uf = municipality_uf(&closure.municipality_code).ok_or_else(|| {
            ValidationError::field(
                "municipality_code",
                "must be a 7-digit IBGE code starting with a valid UF code",
            )
        })?;
        if closure.closed_on < doc.emitted_at.date() {
            return Err(ValidationError::field(
                "closed_on",
                format!("{} is before the issuance date", closure.closed_on),
            )
            .into());
        }
        let request = ClosureRequest {
            key: authorized_key(doc, LifecycleEvent::Close)?,
            protocol: doc.protocol.clone().unwrap_or_default(),
            closed_on: closure.closed_on,
            uf,
            municipality_code: closure.municipality_code.trim().to_string(),
            issuer: doc.issuer.clone(),
        };
        let answer = {
            let mut guard = self.enter(GatewayOperation::Close)?;
            checked(GatewayOperation::Close, guard.gateway().close(&request))?
        };
        self.register_event(doc, LifecycleEvent::Close, &answer.body)
    }

    fn register_event(
        &self,
        doc: &mut ManifestDocument,
        event: LifecycleEvent,
        body: &str,
    ) -> Result<(), LifecycleError> {
        let response = AuthorityResponse::read(body);
        let status = response
            .effective_status()
            .ok_or_else(|| LifecycleError::UnreadableResponse("event response has no status".into()))?;
        let reason = response.effective_reason().map(str::to_string);
        if !matches!(status, STATUS_EVENT_REGISTERED | STATUS_EVENT_REGISTERED_UNLINKED) {
            return Err(rejected(status, reason, doc));
        }
        doc.mark_event(event, status, reason, body);
        tracing::info!(
            manifest_id = %doc.id,
            event = %event,
            state = %doc.state,
            "manifest event registered"
        );
        Ok(())
    }

    /// Situation of `key` at the authority. No state change.
    pub fn consult(&self, key: &AccessKey) -> Result<Consultation, LifecycleError> {
        let answer = {
            let mut guard = self.enter(GatewayOperation::QueryByKey)?;
            checked(GatewayOperation::QueryByKey, guard.gateway().query_by_key(key))?
        };
        let response = AuthorityResponse::read(&answer.body);
        let status = response
            .effective_status()
            .ok_or_else(|| LifecycleError::UnreadableResponse("situation has no status".into()))?;
        Ok(Consultation {
            key: key.clone(),
            status,
            reason: response.effective_reason().unwrap_or_default().to_string(),
            protocol: response.protocol.and_then(|p| p.protocol),
            response: answer.body,
        })
    }

    /// Authorized, unclosed manifests of `issuer`. No state change.
    pub fn query_open_manifests(&self, issuer: &Cnpj) -> Result<OpenManifests, LifecycleError> {
        let answer = {
            let mut guard = self.enter(GatewayOperation::QueryOpenManifests)?;
            checked(
                GatewayOperation::QueryOpenManifests,
                guard.gateway().query_open_manifests(issuer),
            )?
        };
        let response = AuthorityResponse::read(&answer.body);
        let status = response
            .status
            .ok_or_else(|| LifecycleError::UnreadableResponse("open-manifest query has no status".into()))?;
        let reason = response.reason.clone().unwrap_or_default();
        if !matches!(status, STATUS_OPEN_FOUND | STATUS_OPEN_NONE) {
            tracing::warn!(issuer = %issuer, status, reason = %reason, "open-manifest query refused");
            return Err(LifecycleError::AuthorityRejected { status, reason });
        }
        let keys = response
            .open_keys
            .iter()
            .filter_map(|k| match AccessKey::new(k.as_str()) {
                Ok(key) => Some(key),
                Err(_) => {
                    tracing::warn!(key = %k, "ignoring malformed key in open-manifest list");
                    None
                }
            })
            .collect();
        Ok(OpenManifests {
            status,
            reason,
            keys,
            response: answer.body,
        })
    }

    /// Authority service status. No state change.
    pub fn service_status(&self) -> Result<ServiceStatus, LifecycleError> {
        let answer = {
            let mut guard = self.enter(GatewayOperation::ServiceStatus)?;
            checked(GatewayOperation::ServiceStatus, guard.gateway().service_status())?
        };
        let response = AuthorityResponse::read(&answer.body);
        let status = response
            .status
            .ok_or_else(|| LifecycleError::UnreadableResponse("service status has no status".into()))?;
        Ok(ServiceStatus {
            status,
            reason: response.reason.unwrap_or_default(),
            response: answer.body,
        })
    }

    /// Replace the gateway configuration inside the exclusive section.
    pub fn reconfigure(&self, config: GatewayConfig) -> Result<(), LifecycleError> {
        let mut guard = self.enter(GatewayOperation::ConfigWrite)?;
        checked(GatewayOperation::ConfigWrite, guard.reconfigure(config))
    }
}

/// Map a gateway result, logging failures.
fn checked<T>(operation: GatewayOperation, result: GatewayResult<T>) -> Result<T, LifecycleError> {
    match result {
        Ok(value) => {
            tracing::debug!(%operation, "gateway call succeeded");
            Ok(value)
        }
        Err(e) => {
            tracing::warn!(%operation, code = ?e.code(), error = %e, "gateway call failed");
            Err(LifecycleError::from_gateway(operation, e))
        }
    }
}

fn rejected(status: u16, reason: Option<String>, doc: &ManifestDocument) -> LifecycleError {
    let reason = reason.unwrap_or_default();
    tracing::warn!(manifest_id = %doc.id, status, reason = %reason, "authority refused the request");
    LifecycleError::AuthorityRejected { status, reason }
}

fn authorized_key(doc: &ManifestDocument, event: LifecycleEvent) -> Result<AccessKey, LifecycleError> {
    match (&doc.access_key, &doc.protocol) {
        (Some(key), Some(_)) => Ok(key.clone()),
        _ => Err(LifecycleError::InvalidTransition {
            from: doc.state,
            event,
        }),
    }
}

fn check_justification(justification: &str) -> Result<String, ValidationError> {
    let trimmed = justification.trim();
    let len = trimmed.chars().count();
    if !(JUSTIFICATION_MIN..=JUSTIFICATION_MAX).contains(&len) {
        return Err(ValidationError::field(
            "justification",
            format!("must be {JUSTIFICATION_MIN} to {JUSTIFICATION_MAX} characters, got {len}"),
        ));
    }
    Ok(trimmed.to_string())
}

/// Read the key out of a signed document and check it belongs to `doc`.
fn signed_key(doc: &ManifestDocument, signed: &str) -> Result<AccessKey, LifecycleError> {
    let raw = AuthorityResponse::read(signed)
        .key
        .ok_or_else(|| LifecycleError::UnreadableResponse("signed document has no key".into()))?;
    let key = AccessKey::new(raw.as_str())
        .map_err(|_| LifecycleError::UnreadableResponse(format!("signed key {raw} is invalid")))?;
    let fields = key.fields();
    let mismatch = if fields.model_kind != DocumentModel::MDFe {
        Some("model")
    } else if fields.issuer_cnpj != doc.issuer.as_str() {
        Some("issuer")
    } else if fields.series_value() != doc.series {
        Some("series")
    } else if fields.number_value() != doc.number {
        Some("number")
    } else {
        None
    };
    match mismatch {
        Some(field) => Err(LifecycleError::UnreadableResponse(format!(
            "signed key {key} does not match the document {field}"
        ))),
        None => Ok(key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn justification_bounds() {
        assert!(check_justification("short").is_err());
        assert!(check_justification("   fourteen chars  ").is_err());
        assert_eq!(
            check_justification("  Erro na digitacao  ").unwrap(),
            "Erro na digitacao"
        );
        assert!(check_justification(&"x".repeat(255)).is_ok());
        assert!(check_justification(&"x".repeat(256)).is_err());
        // Counted in characters, not bytes.
        assert!(check_justification("ção ção ção ção").is_ok());
    }

    #[test]
    fn poll_outcome_serializes_tagged() {
        let json = serde_json::to_value(PollOutcome::Pending { status: 105 }).unwrap();
        assert_eq!(json["outcome"], "pending");
        assert_eq!(json["status"], 105);
    }
}
