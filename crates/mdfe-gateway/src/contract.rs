//! # Transmission Gateway Contract
//!
//! The narrow call surface the lifecycle state machine consumes. Production
//! deployments implement it over the native fiscal library
//! ([`crate::native::NativeGateway`]); tests use [`crate::mock::MockGateway`].
//!
//! Implementations are stateful (a document is loaded, then validated, then
//! signed) and therefore take `&mut self`. They must be `Send` so a session
//! can live behind a mutex shared across threads; they are never required to
//! be safe for concurrent calls.

use chrono::NaiveDate;
use mdfe_core::{AccessKey, Cnpj, Uf, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::GatewayError;

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Every call in the contract, used for error context and call logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GatewayOperation {
    Initialize,
    Finalize,
    ConfigRead,
    ConfigWrite,
    ClearDocuments,
    LoadDocument,
    Validate,
    Sign,
    Send,
    QueryByKey,
    QueryByReceipt,
    Cancel,
    Close,
    QueryOpenManifests,
    ServiceStatus,
}

impl fmt::Display for GatewayOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initialize => "Initialize",
            Self::Finalize => "Finalize",
            Self::ConfigRead => "ConfigRead",
            Self::ConfigWrite => "ConfigWrite",
            Self::ClearDocuments => "ClearDocuments",
            Self::LoadDocument => "LoadDocument",
            Self::Validate => "Validate",
            Self::Sign => "Sign",
            Self::Send => "Send",
            Self::QueryByKey => "QueryByKey",
            Self::QueryByReceipt => "QueryByReceipt",
            Self::Cancel => "Cancel",
            Self::Close => "Close",
            Self::QueryOpenManifests => "QueryOpenManifests",
            Self::ServiceStatus => "ServiceStatus",
        };
        f.write_str(s)
    }
}

/// An authority-format response returned by a successful call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayResponse {
    pub operation: GatewayOperation,
    /// Response document, verbatim.
    pub body: String,
}

impl GatewayResponse {
    pub fn new(operation: GatewayOperation, body: impl Into<String>) -> Self {
        Self {
            operation,
            body: body.into(),
        }
    }
}

/// Largest batch id the authority accepts (15 digits).
const MAX_BATCH_ID: u64 = 999_999_999_999_999;

/// Addressing id for a single send attempt ("lote"). Not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransmissionBatch(u64);

impl TransmissionBatch {
    /// # Errors
    ///
    /// Returns a [`ValidationError`] on `batch_id` for zero or ids longer
    /// than 15 digits.
    pub fn new(id: u64) -> Result<Self, ValidationError> {
        if id == 0 || id > MAX_BATCH_ID {
            return Err(ValidationError::field(
                "batch_id",
                format!("{id} is outside 1..={MAX_BATCH_ID}"),
            ));
        }
        Ok(Self(id))
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransmissionBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Arguments of the cancellation event.
#[derive(Debug, Clone)]
pub struct CancellationRequest {
    pub key: AccessKey,
    /// Authorization protocol of the manifest being cancelled.
    pub protocol: String,
    pub justification: String,
    pub issuer: Cnpj,
    pub batch: TransmissionBatch,
}

/// Arguments of the closure ("encerramento") event.
#[derive(Debug, Clone)]
pub struct ClosureRequest {
    pub key: AccessKey,
    /// Authorization protocol of the manifest being closed.
    pub protocol: String,
    pub closed_on: NaiveDate,
    pub uf: Uf,
    /// 7-digit IBGE municipality code of the final unloading point.
    pub municipality_code: String,
    pub issuer: Cnpj,
}

/// Call contract of the external fiscal transmission library.
pub trait TransmissionGateway: Send {
    /// Human-readable name of the implementation (e.g. "MockGateway").
    fn name(&self) -> &str;

    fn initialize(&mut self, config_path: &str) -> GatewayResult<()>;

    fn finalize(&mut self) -> GatewayResult<()>;

    fn config_read(&mut self, section: &str, key: &str) -> GatewayResult<String>;

    fn config_write(&mut self, section: &str, key: &str, value: &str) -> GatewayResult<()>;

    /// Drop any document previously loaded.
    fn clear_documents(&mut self) -> GatewayResult<()>;

    /// Load a document payload (the assembler's key/value text).
    fn load_document(&mut self, payload: &str) -> GatewayResult<()>;

    /// Schema-validate the loaded document.
    fn validate(&mut self) -> GatewayResult<GatewayResponse>;

    /// Sign the loaded document; the response is the signed document.
    fn sign(&mut self) -> GatewayResult<GatewayResponse>;

    /// Transmit the signed document in a batch.
    fn send(&mut self, batch: &TransmissionBatch) -> GatewayResult<GatewayResponse>;

    fn query_by_key(&mut self, key: &AccessKey) -> GatewayResult<GatewayResponse>;

    fn query_by_receipt(&mut self, receipt: &str) -> GatewayResult<GatewayResponse>;

    fn cancel(&mut self, request: &CancellationRequest) -> GatewayResult<GatewayResponse>;

    fn close(&mut self, request: &ClosureRequest) -> GatewayResult<GatewayResponse>;

    fn query_open_manifests(&mut self, issuer: &Cnpj) -> GatewayResult<GatewayResponse>;

    fn service_status(&mut self) -> GatewayResult<GatewayResponse>;
}
