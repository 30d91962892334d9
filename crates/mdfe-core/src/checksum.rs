//! # Checksum Validators
//!
//! Modulo-11 check-digit rules for the three identifier families the fiscal
//! authorities verify on every document:
//!
//! - **CNPJ** (14 digits): two check digits, fixed weight tables.
//! - **CPF** (11 digits): two check digits, descending weights.
//! - **Access key** (44 digits): one check digit, cyclic weights `2..=9`
//!   applied right to left over the first 43 digits.
//!
//! Every validator strips non-digit characters first, so `"11.222.333/0001-81"`
//! and `"11222333000181"` are equivalent. Validators only ever inspect length
//! and checksum; they never fail with an error.

use rand::Rng;

/// Weights for the first CNPJ check digit (positions 1..=12).
const CNPJ_WEIGHTS_1: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

/// Weights for the second CNPJ check digit (positions 1..=13).
const CNPJ_WEIGHTS_2: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

/// Length of an access key including its check digit.
pub const ACCESS_KEY_LEN: usize = 44;

/// Length of a CNPJ in digits.
pub const CNPJ_LEN: usize = 14;

/// Length of a CPF in digits.
pub const CPF_LEN: usize = 11;

/// Keep only ASCII digits, dropping punctuation, whitespace and anything else.
pub fn digits_only(input: &str) -> String {
    input.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Numeric values of an all-digit string. Callers guarantee the input
/// contains only ASCII digits.
fn to_values(digits: &str) -> Vec<u32> {
    digits.bytes().map(|b| u32::from(b - b'0')).collect()
}

/// `sum mod 11 < 2 → 0`, otherwise `11 − (sum mod 11)`.
fn mod11_digit(sum: u32) -> u32 {
    let rem = sum % 11;
    if rem < 2 {
        0
    } else {
        11 - rem
    }
}

fn all_identical(values: &[u32]) -> bool {
    values.windows(2).all(|w| w[0] == w[1])
}

fn weighted_sum(values: &[u32], weights: &[u32]) -> u32 {
    values.iter().zip(weights).map(|(v, w)| v * w).sum()
}

/// Compute both CNPJ check digits from the 12-digit base.
///
/// Returns `None` unless `base` is exactly 12 ASCII digits.
pub fn cnpj_check_digits(base: &str) -> Option<(u8, u8)> {
    if base.len() != 12 || !base.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut values = to_values(base);
    let first = mod11_digit(weighted_sum(&values, &CNPJ_WEIGHTS_1));
    values.push(first);
    let second = mod11_digit(weighted_sum(&values, &CNPJ_WEIGHTS_2));
    Some((first as u8, second as u8))
}

/// Compute both CPF check digits from the 9-digit base.
///
/// Returns `None` unless `base` is exactly 9 ASCII digits.
pub fn cpf_check_digits(base: &str) -> Option<(u8, u8)> {
    if base.len() != 9 || !base.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut values = to_values(base);
    let weights_1: Vec<u32> = (2..=10).rev().collect();
    let first = mod11_digit(weighted_sum(&values, &weights_1));
    values.push(first);
    let weights_2: Vec<u32> = (2..=11).rev().collect();
    let second = mod11_digit(weighted_sum(&values, &weights_2));
    Some((first as u8, second as u8))
}

/// Compute the access-key check digit from the first 43 digits.
///
/// Weights cycle `2, 3, …, 9, 2, 3, …` starting from the rightmost digit.
/// Returns `None` unless `first43` is exactly 43 ASCII digits.
pub fn access_key_check_digit(first43: &str) -> Option<u8> {
    if first43.len() != ACCESS_KEY_LEN - 1 || !first43.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let sum: u32 = to_values(first43)
        .iter()
        .rev()
        .enumerate()
        .map(|(i, v)| v * (2 + (i as u32 % 8)))
        .sum();
    Some(mod11_digit(sum) as u8)
}

/// Validate a CNPJ. Formatting characters are ignored.
///
/// Fails unless the stripped input is 14 digits, not all identical, and
/// both check digits match.
pub fn validate_cnpj(input: &str) -> bool {
    let digits = digits_only(input);
    if digits.len() != CNPJ_LEN || all_identical(&to_values(&digits)) {
        return false;
    }
    match cnpj_check_digits(&digits[..12]) {
        Some((d1, d2)) => digits[12..] == format!("{d1}{d2}"),
        None => false,
    }
}

/// Validate a CPF. Formatting characters are ignored.
///
/// Fails unless the stripped input is 11 digits, not all identical, and
/// both check digits match.
pub fn validate_cpf(input: &str) -> bool {
    let digits = digits_only(input);
    if digits.len() != CPF_LEN || all_identical(&to_values(&digits)) {
        return false;
    }
    match cpf_check_digits(&digits[..9]) {
        Some((d1, d2)) => digits[9..] == format!("{d1}{d2}"),
        None => false,
    }
}

/// Validate a 44-digit access key. Formatting characters are ignored.
pub fn validate_access_key(input: &str) -> bool {
    let digits = digits_only(input);
    if digits.len() != ACCESS_KEY_LEN {
        return false;
    }
    match access_key_check_digit(&digits[..43]) {
        Some(dv) => digits[43..] == dv.to_string(),
        None => false,
    }
}

/// Generate an 8-digit random numeric code for the `cMDF` key field.
///
/// Callers opt in explicitly; the assembler never fills a missing code.
pub fn random_numeric_code() -> String {
    let code: u32 = rand::thread_rng().gen_range(0..100_000_000);
    format!("{code:08}")
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn replace_digit(s: &str, pos: usize, delta: u8) -> String {
        let mut bytes = s.as_bytes().to_vec();
        let d = bytes[pos] - b'0';
        bytes[pos] = b'0' + (d + delta) % 10;
        String::from_utf8(bytes).unwrap()
    }

    proptest! {
        /// A CNPJ completed with its computed digits always validates.
        #[test]
        fn computed_cnpj_validates(base in "[0-9]{12}") {
            let (d1, d2) = cnpj_check_digits(&base).unwrap();
            let full = format!("{base}{d1}{d2}");
            let identical = full.bytes().all(|b| b == full.as_bytes()[0]);
            prop_assert_eq!(validate_cnpj(&full), !identical);
        }

        /// A CPF completed with its computed digits always validates.
        #[test]
        fn computed_cpf_validates(base in "[0-9]{9}") {
            let (d1, d2) = cpf_check_digits(&base).unwrap();
            let full = format!("{base}{d1}{d2}");
            let identical = full.bytes().all(|b| b == full.as_bytes()[0]);
            prop_assert_eq!(validate_cpf(&full), !identical);
        }

        /// A key completed with its computed digit always validates.
        #[test]
        fn computed_key_validates(prefix in "[0-9]{43}") {
            let dv = access_key_check_digit(&prefix).unwrap();
            let key = format!("{prefix}{dv}");
            prop_assert!(validate_access_key(&key));
        }

        /// Changing only the check digit of a valid key is always detected.
        #[test]
        fn wrong_key_check_digit_rejected(prefix in "[0-9]{43}", delta in 1u8..10) {
            let dv = access_key_check_digit(&prefix).unwrap();
            let full = format!("{prefix}{dv}");
            let corrupted = replace_digit(&full, 43, delta);
            prop_assert!(!validate_access_key(&corrupted));
        }

        /// Validators never panic on arbitrary input.
        #[test]
        fn validators_are_total(input in ".{0,64}") {
            let _ = validate_cnpj(&input);
            let _ = validate_cpf(&input);
            let _ = validate_access_key(&input);
        }
    }
}
