// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Phone normalization into the canonical channel address.
//!
//! Free-form Brazilian phone input (`(11) 9 9123-4567`, `+55 11 991234567`,
//! `011991234567`, ...) is reduced to a fixed 12-digit key:
//! country code `55`, two-digit area code, eight-digit subscriber number.
//! The mobile `9` prefix of eleven-digit numbers is always dropped, so the
//! same handset maps to the same key whether or not the customer typed it.
//! Every read and write path goes through [`normalize`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ComandaError;

/// Country calling code prepended to every canonical phone.
pub const COUNTRY_CODE: &str = "55";

/// Length of every canonical phone string.
pub const CANONICAL_LEN: usize = 12;

/// Why a phone input was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidPhone {
    #[error("no digits in input")]
    Empty,
    #[error("expected 10 or 11 digits after the country code, got {0}")]
    Length(usize),
    #[error("`{0}` is not a valid area code")]
    AreaCode(String),
    #[error("nine-digit subscriber numbers must start with 9")]
    MobilePrefix,
}

impl From<InvalidPhone> for ComandaError {
    fn from(err: InvalidPhone) -> Self {
        ComandaError::InvalidPhone(err.to_string())
    }
}

/// A normalized phone: join key for customers and orders, and channel address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CanonicalPhone(String);

impl CanonicalPhone {
    /// The full canonical string, e.g. `551191234567`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Area code plus subscriber number, without the country code.
    pub fn national(&self) -> &str {
        &self.0[COUNTRY_CODE.len()..]
    }

    /// The two-digit area code.
    pub fn area_code(&self) -> &str {
        &self.0[COUNTRY_CODE.len()..COUNTRY_CODE.len() + 2]
    }
}

impl std::fmt::Display for CanonicalPhone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CanonicalPhone {
    type Error = InvalidPhone;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        normalize(&value)
    }
}

impl From<CanonicalPhone> for String {
    fn from(phone: CanonicalPhone) -> Self {
        phone.0
    }
}

impl std::str::FromStr for CanonicalPhone {
    type Err = InvalidPhone;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize(s)
    }
}

/// Normalize free-form phone input.
///
/// Strips every non-digit, then leading trunk/international zeros, then the
/// `55` country code when the remaining length says it is present. The
/// national part must be a valid area code followed by an 8-digit number or a
/// 9-digit mobile number starting with `9` (the `9` is dropped).
pub fn normalize(raw: &str) -> Result<CanonicalPhone, InvalidPhone> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Err(InvalidPhone::Empty);
    }

    let national = match digits.len() {
        12 | 13 => digits.strip_prefix(COUNTRY_CODE).unwrap_or(digits),
        _ => digits,
    };
    if !(10..=11).contains(&national.len()) {
        return Err(InvalidPhone::Length(national.len()));
    }

    let (area, subscriber) = national.split_at(2);
    if !area.bytes().all(|b| (b'1'..=b'9').contains(&b)) {
        return Err(InvalidPhone::AreaCode(area.to_string()));
    }

    let subscriber = if subscriber.len() == 9 {
        subscriber
            .strip_prefix('9')
            .ok_or(InvalidPhone::MobilePrefix)?
    } else {
        subscriber
    };

    Ok(CanonicalPhone(format!("{COUNTRY_CODE}{area}{subscriber}")))
}
