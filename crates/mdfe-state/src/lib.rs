//! # mdfe-state — Manifest Lifecycle
//!
//! Everything between a form-level data record and an authorized, closed
//! manifest.
//!
//! - **assembler** (`assembler.rs`): validates a [`ManifestData`] record
//!   and builds a `Draft` [`ManifestDocument`] with its gateway payload.
//! - **payload** (`payload.rs`): the ordered key/value payload handed to
//!   the gateway's `LoadDocument`.
//! - **document** (`document.rs`): [`ManifestDocument`], its
//!   [`ManifestState`] and the transition log.
//! - **lifecycle** (`lifecycle.rs`): [`ManifestLifecycle`], the state
//!   machine that drives the gateway through the shared exclusive section.
//!
//! ## Guarantees
//!
//! The assembler is pure and may run on any number of threads at once.
//! Lifecycle operations serialize on the gateway and leave the document
//! untouched when any step fails.

pub mod assembler;
pub mod document;
pub mod error;
pub mod lifecycle;
pub mod payload;

pub use assembler::{
    municipality_uf, DocumentAssembler, DriverData, InsurerData, IssuerData, LocalityData,
    ManifestData, RouteData, UnloadingData, VehicleData,
};
pub use document::{
    response_digest, CargoTotals, LifecycleEvent, Locality, ManifestDocument, ManifestState,
    Route, TransitionRecord,
};
pub use error::LifecycleError;
pub use lifecycle::{
    Closure, Consultation, ManifestLifecycle, OpenManifests, PollOutcome, ServiceStatus,
};
pub use payload::{GatewayPayload, PayloadSection};
