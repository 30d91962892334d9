//! # Federative Units
//!
//! The 27 Brazilian federative units (UF) with their IBGE numeric codes.
//! The numeric code is the first field of every access key and the first two
//! digits of every IBGE municipality code.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A Brazilian federative unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Uf {
    RO,
    AC,
    AM,
    RR,
    PA,
    AP,
    TO,
    MA,
    PI,
    CE,
    RN,
    PB,
    PE,
    AL,
    SE,
    BA,
    MG,
    ES,
    RJ,
    SP,
    PR,
    SC,
    RS,
    MS,
    MT,
    GO,
    DF,
}

const ALL: [(Uf, &str, u8); 27] = [
    (Uf::RO, "RO", 11),
    (Uf::AC, "AC", 12),
    (Uf::AM, "AM", 13),
    (Uf::RR, "RR", 14),
    (Uf::PA, "PA", 15),
    (Uf::AP, "AP", 16),
    (Uf::TO, "TO", 17),
    (Uf::MA, "MA", 21),
    (Uf::PI, "PI", 22),
    (Uf::CE, "CE", 23),
    (Uf::RN, "RN", 24),
    (Uf::PB, "PB", 25),
    (Uf::PE, "PE", 26),
    (Uf::AL, "AL", 27),
    (Uf::SE, "SE", 28),
    (Uf::BA, "BA", 29),
    (Uf::MG, "MG", 31),
    (Uf::ES, "ES", 32),
    (Uf::RJ, "RJ", 33),
    (Uf::SP, "SP", 35),
    (Uf::PR, "PR", 41),
    (Uf::SC, "SC", 42),
    (Uf::RS, "RS", 43),
    (Uf::MS, "MS", 50),
    (Uf::MT, "MT", 51),
    (Uf::GO, "GO", 52),
    (Uf::DF, "DF", 53),
];

impl Uf {
    /// IBGE numeric code (e.g. `35` for SP).
    pub fn code(self) -> u8 {
        ALL.iter()
            .find(|(uf, _, _)| *uf == self)
            .map(|(_, _, code)| *code)
            .unwrap_or_default()
    }

    /// Two-letter abbreviation.
    pub fn sigla(self) -> &'static str {
        ALL.iter()
            .find(|(uf, _, _)| *uf == self)
            .map(|(_, sigla, _)| *sigla)
            .unwrap_or_default()
    }

    /// Look up by IBGE numeric code.
    pub fn from_code(code: u8) -> Option<Self> {
        ALL.iter().find(|(_, _, c)| *c == code).map(|(uf, _, _)| *uf)
    }

    /// Look up by abbreviation, case-insensitively.
    pub fn from_sigla(sigla: &str) -> Option<Self> {
        let upper = sigla.trim().to_ascii_uppercase();
        ALL.iter()
            .find(|(_, s, _)| *s == upper)
            .map(|(uf, _, _)| *uf)
    }

    /// Parse either form: `"SP"` or `"35"`.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] on the `uf` field for unknown values.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let trimmed = value.trim();
        let found = match trimmed.parse::<u8>() {
            Ok(code) => Self::from_code(code),
            Err(_) => Self::from_sigla(trimmed),
        };
        found.ok_or_else(|| {
            ValidationError::field("uf", format!("{value:?} is not a Brazilian federative unit"))
        })
    }

    /// All units in IBGE code order.
    pub fn all() -> impl Iterator<Item = Uf> {
        ALL.iter().map(|(uf, _, _)| *uf)
    }
}

impl std::fmt::Display for Uf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.sigla())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_and_sigla_agree() {
        for uf in Uf::all() {
            assert_eq!(Uf::from_code(uf.code()), Some(uf));
            assert_eq!(Uf::from_sigla(uf.sigla()), Some(uf));
        }
        assert_eq!(Uf::all().count(), 27);
    }

    #[test]
    fn parse_accepts_both_forms() {
        assert_eq!(Uf::parse("SP").unwrap(), Uf::SP);
        assert_eq!(Uf::parse("sp").unwrap(), Uf::SP);
        assert_eq!(Uf::parse("35").unwrap(), Uf::SP);
        assert_eq!(Uf::parse("41").unwrap(), Uf::PR);
    }

    #[test]
    fn parse_rejects_unknown() {
        assert!(Uf::parse("XX").is_err());
        assert!(Uf::parse("34").is_err());
        assert!(Uf::parse("").is_err());
    }
}
