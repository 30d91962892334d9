//! # Manifest Document
//!
//! The fiscal document being issued and its lifecycle state.
//!
//! ## States
//!
//! ```text
//! Draft ──▶ Signed ──▶ Transmitted ──▶ Authorized ──▶ Closed     (terminal)
//!                           │               │
//!                           │               └──▶ Cancelled       (terminal)
//!                           └──▶ Rejected                        (terminal)
//! ```
//!
//! A document is created in `Draft` by the assembler and changes state only
//! through the lifecycle. A rejected manifest is resubmitted as a fresh
//! document; nothing moves backward in place.

use mdfe_core::{AccessKey, Cnpj, EmissionType, Timestamp, Uf};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::payload::GatewayPayload;

// ─── State ──────────────────────────────────────────────────────────

/// Lifecycle state of a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ManifestState {
    Draft,
    Signed,
    Transmitted,
    Authorized,
    Rejected,
    Cancelled,
    Closed,
}

impl ManifestState {
    /// No event is accepted from a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Cancelled | Self::Closed)
    }

    /// Position in the forward order; `Authorized`/`Rejected` and
    /// `Closed`/`Cancelled` share a rank.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Draft => 0,
            Self::Signed => 1,
            Self::Transmitted => 2,
            Self::Authorized | Self::Rejected => 3,
            Self::Cancelled | Self::Closed => 4,
        }
    }
}

impl std::fmt::Display for ManifestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Draft => "DRAFT",
            Self::Signed => "SIGNED",
            Self::Transmitted => "TRANSMITTED",
            Self::Authorized => "AUTHORIZED",
            Self::Rejected => "REJECTED",
            Self::Cancelled => "CANCELLED",
            Self::Closed => "CLOSED",
        };
        f.write_str(s)
    }
}

/// Lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleEvent {
    Sign,
    Transmit,
    PollStatus,
    Cancel,
    Close,
}

impl LifecycleEvent {
    /// The state the event must start from.
    pub fn required_state(&self) -> ManifestState {
        match self {
            Self::Sign => ManifestState::Draft,
            Self::Transmit => ManifestState::Signed,
            Self::PollStatus => ManifestState::Transmitted,
            Self::Cancel | Self::Close => ManifestState::Authorized,
        }
    }
}

impl std::fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Sign => "SIGN",
            Self::Transmit => "TRANSMIT",
            Self::PollStatus => "POLL_STATUS",
            Self::Cancel => "CANCEL",
            Self::Close => "CLOSE",
        };
        f.write_str(s)
    }
}

// ─── Transition Log ─────────────────────────────────────────────────

/// Record of one successful transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: ManifestState,
    pub to: ManifestState,
    pub event: LifecycleEvent,
    pub timestamp: Timestamp,
    /// SHA-256 hex of the authority response that drove the transition.
    pub response_digest: String,
}

/// Lowercase hex SHA-256 of `body`.
pub fn response_digest(body: &str) -> String {
    Sha256::digest(body.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

// ─── Document Parts ─────────────────────────────────────────────────

/// Resolved route: start and end UF plus any UF crossed on the way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub origin: Uf,
    pub destination: Uf,
    pub via: Vec<Uf>,
}

/// A loading or unloading municipality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locality {
    /// 7-digit IBGE code.
    pub municipality_code: String,
    pub name: String,
}

/// Cargo totals. Value in BRL, weight in kilograms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CargoTotals {
    pub value: Decimal,
    pub weight_kg: Decimal,
}

// ─── Document ───────────────────────────────────────────────────────

/// A manifest with its lifecycle state and transition history.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestDocument {
    pub(crate) id: Uuid,
    pub(crate) issuer: Cnpj,
    pub(crate) uf: Uf,
    pub(crate) series: u16,
    pub(crate) number: u32,
    pub(crate) numeric_code: String,
    pub(crate) emission_type: EmissionType,
    pub(crate) emitted_at: Timestamp,
    pub(crate) route: Route,
    pub(crate) loading: Vec<Locality>,
    pub(crate) unloading: Vec<Locality>,
    pub(crate) cte_keys: Vec<AccessKey>,
    pub(crate) nfe_keys: Vec<AccessKey>,
    pub(crate) totals: CargoTotals,
    pub(crate) payload: GatewayPayload,
    pub(crate) state: ManifestState,
    pub(crate) access_key: Option<AccessKey>,
    pub(crate) receipt: Option<String>,
    pub(crate) protocol: Option<String>,
    pub(crate) authority_status: Option<u16>,
    pub(crate) authority_reason: Option<String>,
    pub(crate) last_response: Option<String>,
    pub(crate) created_at: Timestamp,
    pub(crate) transitions: Vec<TransitionRecord>,
}

impl ManifestDocument {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> ManifestState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn issuer(&self) -> &Cnpj {
        &self.issuer
    }

    pub fn uf(&self) -> Uf {
        self.uf
    }

    pub fn series(&self) -> u16 {
        self.series
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn numeric_code(&self) -> &str {
        &self.numeric_code
    }

    pub fn emission_type(&self) -> EmissionType {
        self.emission_type
    }

    pub fn emitted_at(&self) -> Timestamp {
        self.emitted_at
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn loading(&self) -> &[Locality] {
        &self.loading
    }

    pub fn unloading(&self) -> &[Locality] {
        &self.unloading
    }

    /// Referenced CT-e keys across all unloading points.
    pub fn cte_keys(&self) -> &[AccessKey] {
        &self.cte_keys
    }

    pub fn nfe_keys(&self) -> &[AccessKey] {
        &self.nfe_keys
    }

    pub fn totals(&self) -> &CargoTotals {
        &self.totals
    }

    pub fn payload(&self) -> &GatewayPayload {
        &self.payload
    }

    /// Assigned when signed.
    pub fn access_key(&self) -> Option<&AccessKey> {
        self.access_key.as_ref()
    }

    /// Batch receipt, assigned when transmitted.
    pub fn receipt(&self) -> Option<&str> {
        self.receipt.as_deref()
    }

    /// Authorization protocol, assigned when authorized.
    pub fn protocol(&self) -> Option<&str> {
        self.protocol.as_deref()
    }

    /// Last authority status applied to the document.
    pub fn authority_status(&self) -> Option<u16> {
        self.authority_status
    }

    pub fn authority_reason(&self) -> Option<&str> {
        self.authority_reason.as_deref()
    }

    /// Verbatim authority response of the last transition.
    pub fn last_response(&self) -> Option<&str> {
        self.last_response.as_deref()
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// Check `event` is legal from the current state.
    pub(crate) fn require(&self, event: LifecycleEvent) -> Result<(), crate::LifecycleError> {
        if self.state.is_terminal() || self.state != event.required_state() {
            return Err(crate::LifecycleError::InvalidTransition {
                from: self.state,
                event,
            });
        }
        Ok(())
    }

    /// Move to `to`, keeping `response` verbatim and logging the digest.
    fn transition(&mut self, to: ManifestState, event: LifecycleEvent, response: &str) {
        self.transitions.push(TransitionRecord {
            from: self.state,
            to,
            event,
            timestamp: Timestamp::now(),
            response_digest: response_digest(response),
        });
        self.last_response = Some(response.to_string());
        self.state = to;
    }

    pub(crate) fn mark_signed(&mut self, key: AccessKey, signed: &str) {
        self.access_key = Some(key);
        self.transition(ManifestState::Signed, LifecycleEvent::Sign, signed);
    }

    pub(crate) fn mark_transmitted(&mut self, receipt: String, status: Option<u16>, response: &str) {
        self.receipt = Some(receipt);
        self.authority_status = status;
        self.transition(ManifestState::Transmitted, LifecycleEvent::Transmit, response);
    }

    pub(crate) fn mark_authorized(
        &mut self,
        protocol: String,
        status: u16,
        reason: Option<String>,
        response: &str,
    ) {
        self.protocol = Some(protocol);
        self.authority_status = Some(status);
        self.authority_reason = reason;
        self.transition(ManifestState::Authorized, LifecycleEvent::PollStatus, response);
    }

    pub(crate) fn mark_rejected(&mut self, status: u16, reason: Option<String>, response: &str) {
        self.authority_status = Some(status);
        self.authority_reason = reason;
        self.transition(ManifestState::Rejected, LifecycleEvent::PollStatus, response);
    }

    pub(crate) fn mark_event(
        &mut self,
        event: LifecycleEvent,
        status: u16,
        reason: Option<String>,
        response: &str,
    ) {
        let to = match event {
            LifecycleEvent::Cancel => ManifestState::Cancelled,
            _ => ManifestState::Closed,
        };
        self.authority_status = Some(status);
        self.authority_reason = reason;
        self.transition(to, event, response);
    }
}
