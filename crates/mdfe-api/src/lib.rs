//! # mdfe-api — Upstream Manifest Façade
//!
//! The in-process surface the surrounding service layer calls:
//! `generate_manifest`, `transmit_manifest`, `consult_manifest`,
//! `cancel_manifest`, `close_manifest`, `service_status` and
//! `consult_open_manifests` on [`ManifestService`].
//!
//! Manifests created through the service live in a [`ManifestRegistry`]
//! for the lifetime of the process. Failures come back as one
//! [`ServiceError`] whose [`ErrorBody`] form has a stable code:
//!
//! | Code                  | Meaning                                          |
//! |-----------------------|--------------------------------------------------|
//! | `VALIDATION_ERROR`    | input rejected, nothing sent                     |
//! | `INVALID_TRANSITION`  | operation not legal in the manifest's state      |
//! | `GATEWAY_FAILURE`     | gateway returned a non-zero code                 |
//! | `AUTHORITY_REJECTED`  | authority refused the request                    |
//! | `UNREADABLE_RESPONSE` | response lacks what the transition needs         |
//! | `CONCURRENCY_TIMEOUT` | gateway busy past the deadline                   |
//! | `NOT_FOUND`           | no registered manifest matches                   |

pub mod error;
pub mod registry;
pub mod service;

pub use error::{ErrorBody, ErrorDetail, ServiceError};
pub use registry::{ManifestEntry, ManifestRegistry};
pub use service::{ManifestConsultation, ManifestService, ManifestSummary, Transmission};
