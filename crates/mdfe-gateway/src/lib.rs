//! # mdfe-gateway — Transmission Gateway Contract
//!
//! The fiscal authority is reached through an external native library whose
//! internals are opaque. This crate pins that dependency behind a narrow
//! contract so nothing above it ever sees the native call convention.
//!
//! ## Modules
//!
//! - **contract**: the [`TransmissionGateway`] trait and its request types.
//! - **response**: reads the authority-format responses (status, reason,
//!   receipt, protocol, key).
//! - **config**: [`GatewayConfig`], loaded from YAML and written into the
//!   gateway through `ConfigWrite`.
//! - **native**: [`NativeGateway`], the only adapter aware of the
//!   fixed-buffer call convention of the native library.
//! - **mock**: [`MockGateway`], a scripted in-process gateway for tests and
//!   development.
//! - **session**: [`GatewaySession`] (scoped initialize/finalize) and
//!   [`SharedGateway`] (the exclusive section every call sequence runs in).
//!
//! ## Failure Semantics
//!
//! Every native call yields an integer result code. Code `0` is success;
//! anything else becomes [`GatewayError::Failure`] carrying the code and the
//! diagnostic message. Nothing here retries: the authority's idempotency
//! rules make blind resubmission unsafe.

pub mod config;
pub mod contract;
pub mod error;
pub mod mock;
pub mod native;
pub mod response;
pub mod session;

pub use config::{CertificateConfig, ConfigError, Environment, GatewayConfig, IssuerDefaults};
pub use contract::{
    CancellationRequest, ClosureRequest, GatewayOperation, GatewayResponse, GatewayResult,
    TransmissionBatch, TransmissionGateway,
};
pub use error::GatewayError;
pub use mock::{MockGateway, MockHandle};
pub use native::{NativeCall, NativeGateway, NativeLibrary};
pub use response::{AuthorityResponse, EventInfo, ProtocolInfo};
pub use session::{GatewayGuard, GatewaySession, SharedGateway};
