//! # mdfe-core — Foundational Types for the MDF-e Stack
//!
//! The leaf crate of the workspace. It owns the identifier rules that the
//! fiscal authorities enforce and that every other crate relies on before a
//! single byte reaches the transmission gateway.
//!
//! ## Key Design Principles
//!
//! 1. **Pure checksum functions.** [`validate_cnpj`], [`validate_cpf`] and
//!    [`validate_access_key`] are total: malformed input yields `false`,
//!    never a panic. They strip formatting before checking.
//!
//! 2. **Newtype wrappers for identifiers.** [`Cnpj`], [`Cpf`] and
//!    [`AccessKey`] can only be constructed from input that passes the
//!    checksum, and deserialization routes through the same constructor.
//!
//! 3. **Structured validation errors.** Every rejection carries the name of
//!    the offending field so callers can map it back to a form input.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `mdfe-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod access_key;
pub mod checksum;
pub mod error;
pub mod taxpayer;
pub mod temporal;
pub mod uf;

pub use access_key::{
    format_key, is_cte_key, is_mdfe_key, is_nfe_key, parse, AccessKey, AccessKeyFields,
    DocumentModel, EmissionType, KeyComponents,
};
pub use checksum::{
    access_key_check_digit, cnpj_check_digits, cpf_check_digits, digits_only,
    random_numeric_code, validate_access_key, validate_cnpj, validate_cpf,
};
pub use error::{FieldError, ValidationError};
pub use taxpayer::{Cnpj, Cpf, TaxpayerId};
pub use temporal::Timestamp;
pub use uf::Uf;
