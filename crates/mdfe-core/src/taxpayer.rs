//! # Taxpayer Identifiers
//!
//! Domain-primitive newtypes for Brazilian taxpayer identifiers:
//!
//! - [`Cnpj`]: legal-entity registry number, 14 digits.
//! - [`Cpf`]: individual registry number, 11 digits.
//! - [`TaxpayerId`]: exactly one of the two.
//!
//! The canonical storage format is digits only. Constructors accept the
//! usual punctuated forms (`11.222.333/0001-81`, `123.456.789-09`) and reject
//! anything that fails the check-digit rules in [`crate::checksum`]. Once
//! constructed a value is immutable.

use serde::{Deserialize, Serialize};

use crate::checksum::{digits_only, validate_cnpj, validate_cpf, CNPJ_LEN, CPF_LEN};
use crate::error::ValidationError;

/// Implement `Deserialize` for string newtypes by routing the raw string
/// through the type's validating `new()` constructor.
macro_rules! impl_validating_deserialize {
    ($ty:ident) => {
        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                Self::new(raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

/// Brazilian legal-entity taxpayer number (CNPJ).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Cnpj(String);

impl_validating_deserialize!(Cnpj);

impl Cnpj {
    /// Create a CNPJ, stripping formatting and verifying both check digits.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] on the `cnpj` field if the digits do not
    /// form a valid CNPJ.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = value.into();
        if !validate_cnpj(&raw) {
            return Err(ValidationError::field(
                "cnpj",
                format!("{raw:?} is not a valid CNPJ"),
            ));
        }
        Ok(Self(digits_only(&raw)))
    }

    /// The 14 digits.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Display form: `XX.XXX.XXX/XXXX-XX`.
    pub fn formatted(&self) -> String {
        let d = &self.0;
        format!(
            "{}.{}.{}/{}-{}",
            &d[..2],
            &d[2..5],
            &d[5..8],
            &d[8..12],
            &d[12..]
        )
    }
}

impl std::fmt::Display for Cnpj {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Cnpj {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Brazilian individual taxpayer number (CPF).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Cpf(String);

impl_validating_deserialize!(Cpf);

impl Cpf {
    /// Create a CPF, stripping formatting and verifying both check digits.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] on the `cpf` field if the digits do not
    /// form a valid CPF.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = value.into();
        if !validate_cpf(&raw) {
            return Err(ValidationError::field(
                "cpf",
                format!("{raw:?} is not a valid CPF"),
            ));
        }
        Ok(Self(digits_only(&raw)))
    }

    /// The 11 digits.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Display form: `XXX.XXX.XXX-XX`.
    pub fn formatted(&self) -> String {
        let d = &self.0;
        format!("{}.{}.{}-{}", &d[..3], &d[3..6], &d[6..9], &d[9..])
    }
}

impl std::fmt::Display for Cpf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A taxpayer identified either by CNPJ or by CPF, never both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub enum TaxpayerId {
    Cnpj(Cnpj),
    Cpf(Cpf),
}

impl_validating_deserialize!(TaxpayerId);

impl TaxpayerId {
    /// Classify by digit count (14 → CNPJ, 11 → CPF) and validate.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] on the `taxpayer_id` field when the
    /// length matches neither family or the check digits are wrong.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = value.into();
        let invalid = || {
            ValidationError::field(
                "taxpayer_id",
                format!("{raw:?} is neither a valid CNPJ nor a valid CPF"),
            )
        };
        match digits_only(&raw).len() {
            CNPJ_LEN => Cnpj::new(raw.as_str()).map(Self::Cnpj).map_err(|_| invalid()),
            CPF_LEN => Cpf::new(raw.as_str()).map(Self::Cpf).map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }

    /// Digits-only form.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Cnpj(c) => c.as_str(),
            Self::Cpf(c) => c.as_str(),
        }
    }

    pub fn as_cnpj(&self) -> Option<&Cnpj> {
        match self {
            Self::Cnpj(c) => Some(c),
            Self::Cpf(_) => None,
        }
    }

    pub fn is_cnpj(&self) -> bool {
        matches!(self, Self::Cnpj(_))
    }
}

impl From<TaxpayerId> for String {
    fn from(id: TaxpayerId) -> Self {
        id.as_str().to_string()
    }
}

impl From<Cnpj> for TaxpayerId {
    fn from(c: Cnpj) -> Self {
        Self::Cnpj(c)
    }
}

impl From<Cpf> for TaxpayerId {
    fn from(c: Cpf) -> Self {
        Self::Cpf(c)
    }
}

impl std::fmt::Display for TaxpayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cnpj_stores_digits_only() {
        let c = Cnpj::new("11.222.333/0001-81").unwrap();
        assert_eq!(c.as_str(), "11222333000181");
        assert_eq!(c.formatted(), "11.222.333/0001-81");
    }

    #[test]
    fn cnpj_rejects_bad_check_digit() {
        let err = Cnpj::new("11.222.333/0001-80").unwrap_err();
        assert!(err.has_field("cnpj"));
    }

    #[test]
    fn cpf_formatting() {
        let c = Cpf::new("12345678909").unwrap();
        assert_eq!(c.formatted(), "123.456.789-09");
    }

    #[test]
    fn taxpayer_id_classifies_by_length() {
        assert!(TaxpayerId::new("11222333000181").unwrap().is_cnpj());
        assert!(!TaxpayerId::new("123.456.789-09").unwrap().is_cnpj());
        assert!(TaxpayerId::new("1234").is_err());
        assert!(TaxpayerId::new("12345678900").is_err());
    }

    #[test]
    fn deserialization_validates() {
        let ok: Result<Cnpj, _> = serde_json::from_str("\"11222333000181\"");
        assert!(ok.is_ok());
        let bad: Result<Cnpj, _> = serde_json::from_str("\"11111111111111\"");
        assert!(bad.is_err());
    }

    #[test]
    fn taxpayer_id_serializes_as_digits() {
        let id = TaxpayerId::new("123.456.789-09").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"12345678909\"");
        let back: TaxpayerId = serde_json::from_str("\"12345678909\"").unwrap();
        assert_eq!(back, id);
    }
}
