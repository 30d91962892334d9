//! # Access Key Codec
//!
//! The 44-digit access key identifies a signed fiscal document. Layout:
//!
//! ```text
//! cUF  AAMM  CNPJ            mod  serie  nNF        tpEmis  cNF       cDV
//! 2    4     14              2    3      9          1       8         1
//! 35   2401  11222333000181  58   001    000000123  1       00000001  1
//! ```
//!
//! [`parse`] only accepts keys that pass [`validate_access_key`]; there is no
//! partially-valid key. [`format_key`] is a display helper and does not
//! validate.

use serde::{Deserialize, Serialize};

use crate::checksum::{access_key_check_digit, digits_only, validate_access_key, ACCESS_KEY_LEN};
use crate::error::{FieldError, ValidationError};
use crate::taxpayer::Cnpj;
use crate::uf::Uf;

/// Fiscal document model, from digits 21–22 of the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentModel {
    /// `55`: Nota Fiscal eletrônica.
    NFe,
    /// `57`: Conhecimento de Transporte eletrônico.
    CTe,
    /// `58`: Manifesto Eletrônico de Documentos Fiscais.
    MDFe,
    /// Any other model code.
    Unknown,
}

impl DocumentModel {
    pub fn from_code(code: &str) -> Self {
        match code {
            "55" => Self::NFe,
            "57" => Self::CTe,
            "58" => Self::MDFe,
            _ => Self::Unknown,
        }
    }

    /// Two-digit model code. `None` for [`DocumentModel::Unknown`].
    pub fn code(self) -> Option<&'static str> {
        match self {
            Self::NFe => Some("55"),
            Self::CTe => Some("57"),
            Self::MDFe => Some("58"),
            Self::Unknown => None,
        }
    }

    /// Human-readable description (`"MDF-e"` for model 58).
    pub fn description(self) -> &'static str {
        match self {
            Self::NFe => "NF-e",
            Self::CTe => "CT-e",
            Self::MDFe => "MDF-e",
            Self::Unknown => "Desconhecido",
        }
    }
}

impl std::fmt::Display for DocumentModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Emission type (`tpEmis`), digit 35 of the key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmissionType {
    /// `1`: normal emission.
    #[default]
    Normal,
    /// `2`: contingency emission.
    Contingency,
}

impl EmissionType {
    pub fn code(self) -> u8 {
        match self {
            Self::Normal => 1,
            Self::Contingency => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Normal),
            2 => Some(Self::Contingency),
            _ => None,
        }
    }
}

/// The nine structural fields of a validated key, as digit strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessKeyFields {
    /// IBGE code of the issuing UF (2 digits).
    pub uf_code: String,
    /// Issuance period, `YYMM`.
    pub year_month: String,
    /// Issuer CNPJ (14 digits).
    pub issuer_cnpj: String,
    /// Model code (2 digits).
    pub model: String,
    /// Classified model.
    pub model_kind: DocumentModel,
    /// Series (3 digits).
    pub series: String,
    /// Document number (9 digits).
    pub number: String,
    /// Emission type code (1 digit).
    pub emission_type: String,
    /// Random numeric code (8 digits).
    pub numeric_code: String,
    /// Check digit.
    pub check_digit: String,
}

impl AccessKeyFields {
    /// Description of the model (`"MDF-e"`, `"CT-e"`, ...).
    pub fn model_description(&self) -> &'static str {
        self.model_kind.description()
    }

    /// The issuing UF, if the code is a known one.
    pub fn uf(&self) -> Option<Uf> {
        self.uf_code.parse().ok().and_then(Uf::from_code)
    }

    /// Series as a number.
    pub fn series_value(&self) -> u16 {
        self.series.parse().unwrap_or_default()
    }

    /// Document number as a number.
    pub fn number_value(&self) -> u32 {
        self.number.parse().unwrap_or_default()
    }

    /// Decoded emission type; `None` for codes outside the known set.
    pub fn emission(&self) -> Option<EmissionType> {
        self.emission_type.parse().ok().and_then(EmissionType::from_code)
    }
}

/// A validated 44-digit access key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AccessKey(String);

impl<'de> Deserialize<'de> for AccessKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

impl AccessKey {
    /// Create a key from 44 digits, ignoring formatting.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] on the `access_key` field if the length
    /// or check digit is wrong.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = value.into();
        if !validate_access_key(&raw) {
            return Err(ValidationError::field(
                "access_key",
                format!("{raw:?} is not a valid access key"),
            ));
        }
        Ok(Self(digits_only(&raw)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The structural fields. Infallible: the key was validated on construction.
    pub fn fields(&self) -> AccessKeyFields {
        slice_fields(&self.0)
    }

    pub fn model(&self) -> DocumentModel {
        DocumentModel::from_code(&self.0[20..22])
    }

    /// Space-separated 4-digit groups.
    pub fn formatted(&self) -> String {
        format_key(&self.0)
    }
}

impl std::fmt::Display for AccessKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for AccessKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

fn slice_fields(d: &str) -> AccessKeyFields {
    let model = d[20..22].to_string();
    AccessKeyFields {
        uf_code: d[0..2].to_string(),
        year_month: d[2..6].to_string(),
        issuer_cnpj: d[6..20].to_string(),
        model_kind: DocumentModel::from_code(&model),
        model,
        series: d[22..25].to_string(),
        number: d[25..34].to_string(),
        emission_type: d[34..35].to_string(),
        numeric_code: d[35..43].to_string(),
        check_digit: d[43..44].to_string(),
    }
}

/// Parse a key into its structural fields.
///
/// # Errors
///
/// Returns a "not a valid access key" [`ValidationError`] when the key fails
/// length or checksum validation.
pub fn parse(key: &str) -> Result<AccessKeyFields, ValidationError> {
    AccessKey::new(key).map(|k| k.fields())
}

/// Group the digits of `key` into 4-digit blocks separated by one space.
///
/// Display only: the input is not validated.
pub fn format_key(key: &str) -> String {
    let digits = digits_only(key);
    digits
        .as_bytes()
        .chunks(4)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

fn has_model(key: &str, model: DocumentModel) -> bool {
    if !validate_access_key(key) {
        return false;
    }
    let digits = digits_only(key);
    Some(&digits[20..22]) == model.code()
}

/// Valid key AND model `57`.
pub fn is_cte_key(key: &str) -> bool {
    has_model(key, DocumentModel::CTe)
}

/// Valid key AND model `55`.
pub fn is_nfe_key(key: &str) -> bool {
    has_model(key, DocumentModel::NFe)
}

/// Valid key AND model `58`.
pub fn is_mdfe_key(key: &str) -> bool {
    has_model(key, DocumentModel::MDFe)
}

/// Inputs for building a key from scratch.
#[derive(Debug, Clone)]
pub struct KeyComponents {
    pub uf: Uf,
    /// Issuance period, `YYMM`.
    pub year_month: String,
    pub issuer: Cnpj,
    pub model: DocumentModel,
    /// `0..=999`.
    pub series: u16,
    /// `1..=999_999_999`.
    pub number: u32,
    pub emission_type: EmissionType,
    /// 8 digits.
    pub numeric_code: String,
}

impl KeyComponents {
    /// Assemble the 43-digit prefix and append its check digit.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming every component that cannot be
    /// encoded in its fixed-width slot.
    pub fn compose(&self) -> Result<AccessKey, ValidationError> {
        let mut errors = Vec::new();
        if self.year_month.len() != 4 || !self.year_month.bytes().all(|b| b.is_ascii_digit()) {
            errors.push(FieldError::new("year_month", "must be 4 digits (YYMM)"));
        }
        let model = match self.model.code() {
            Some(code) => code,
            None => {
                errors.push(FieldError::new("model", "unknown document model"));
                "00"
            }
        };
        if self.series > 999 {
            errors.push(FieldError::new("series", "must be at most 999"));
        }
        if self.number == 0 || self.number > 999_999_999 {
            errors.push(FieldError::new("number", "must be between 1 and 999999999"));
        }
        if self.numeric_code.len() != 8 || !self.numeric_code.bytes().all(|b| b.is_ascii_digit()) {
            errors.push(FieldError::new("numeric_code", "must be 8 digits"));
        }
        if let Some(err) = ValidationError::from_fields(errors) {
            return Err(err);
        }

        let prefix = format!(
            "{:02}{}{}{}{:03}{:09}{}{}",
            self.uf.code(),
            self.year_month,
            self.issuer.as_str(),
            model,
            self.series,
            self.number,
            self.emission_type.code(),
            self.numeric_code,
        );
        debug_assert_eq!(prefix.len(), ACCESS_KEY_LEN - 1);
        let dv = access_key_check_digit(&prefix)
            .ok_or_else(|| ValidationError::field("access_key", "malformed key prefix"))?;
        AccessKey::new(format!("{prefix}{dv}"))
    }
}
