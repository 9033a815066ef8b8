//! Ledger data types shared by commands and stream messages.
//!
//! These model the JSON shapes the node speaks; they carry no ledger
//! semantics of their own.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;

/// 256-bit identifier (ledger entry key, transaction or ledger hash).
///
/// Formats as 64 uppercase hex digits; ordering is byte order, which matches
/// the node's key order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub const ZERO: Self = Self([0; 32]);
    pub const MAX: Self = Self([0xFF; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The key immediately before this one, or `None` for zero.
    pub fn predecessor(&self) -> Option<Self> {
        let mut bytes = self.0;
        for byte in bytes.iter_mut().rev() {
            if *byte > 0 {
                *byte -= 1;
                return Some(Self(bytes));
            }
            *byte = 0xFF;
        }
        None
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({self})")
    }
}

impl FromStr for Hash256 {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Account address, kept in its textual form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Account(pub String);

impl From<&str> for Account {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An amount: native drops as a string, or an issued value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    Native(String),
    Issued {
        value: String,
        currency: String,
        issuer: Account,
    },
}

impl Amount {
    pub fn currency(&self) -> &str {
        match self {
            Self::Native(_) => "XRP",
            Self::Issued { currency, .. } => currency,
        }
    }

    /// Numeric value, for ordering. Unparseable values sort as NaN.
    pub fn numeric(&self) -> f64 {
        let text = match self {
            Self::Native(drops) => drops,
            Self::Issued { value, .. } => value,
        };
        parse_number(text)
    }
}

/// A currency, optionally qualified by its issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<Account>,
}

impl Asset {
    pub fn native() -> Self {
        Self {
            currency: "XRP".into(),
            issuer: None,
        }
    }

    pub fn issued(currency: impl Into<String>, issuer: impl Into<Account>) -> Self {
        Self {
            currency: currency.into(),
            issuer: Some(issuer.into()),
        }
    }
}

/// Which ledger a command reads.
///
/// Serializes to `ledger_index` (shortcut or sequence) or `ledger_hash`, so
/// requests embed it with `#[serde(flatten)]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerSelector {
    Validated,
    Current,
    Closed,
    Sequence(u32),
    Hash(Hash256),
}

impl Serialize for LedgerSelector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Self::Validated => map.serialize_entry("ledger_index", "validated")?,
            Self::Current => map.serialize_entry("ledger_index", "current")?,
            Self::Closed => map.serialize_entry("ledger_index", "closed")?,
            Self::Sequence(seq) => map.serialize_entry("ledger_index", seq)?,
            Self::Hash(hash) => map.serialize_entry("ledger_hash", hash)?,
        }
        map.end()
    }
}

impl From<u32> for LedgerSelector {
    fn from(seq: u32) -> Self {
        Self::Sequence(seq)
    }
}

impl From<Hash256> for LedgerSelector {
    fn from(hash: Hash256) -> Self {
        Self::Hash(hash)
    }
}

/// Opaque pagination cursor. Echoed back to the node byte for byte.
#[derive(Debug, Clone)]
pub struct Marker(Box<RawValue>);

impl Marker {
    /// A marker positioned at `key`, for ledger state walks.
    pub fn from_hash(key: &Hash256) -> Result<Self, serde_json::Error> {
        serde_json::value::to_raw_value(&key.to_string()).map(Self)
    }

    pub fn as_str(&self) -> &str {
        self.0.get()
    }
}

impl PartialEq for Marker {
    fn eq(&self, other: &Self) -> bool {
        self.0.get() == other.0.get()
    }
}

impl Eq for Marker {}

impl Serialize for Marker {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Marker {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Box::<RawValue>::deserialize(deserializer).map(Self)
    }
}

/// Ledger sequence as the node reports it: a number, or a decimal string on
/// some verbs.
pub(crate) fn ledger_sequence<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Sequence {
        Number(u32),
        Text(String),
    }

    match Option::<Sequence>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Sequence::Number(seq)) => Ok(Some(seq)),
        Some(Sequence::Text(text)) => text.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

pub(crate) fn parse_number(text: &str) -> f64 {
    text.parse().unwrap_or(f64::NAN)
}

/// A decimal string as `0.digits * 10^exponent`, with no leading or trailing
/// zeros in `digits`. Zero has no digits.
#[derive(Debug, PartialEq, Eq)]
struct DecimalText {
    negative: bool,
    digits: Vec<u8>,
    exponent: i64,
}

impl DecimalText {
    fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (negative, unsigned) = match text.as_bytes().first()? {
            b'-' => (true, &text[1..]),
            b'+' => (false, &text[1..]),
            _ => (false, text),
        };
        let (mantissa, exp) = match unsigned.find(['e', 'E']) {
            Some(at) => (&unsigned[..at], unsigned[at + 1..].parse::<i64>().ok()?),
            None => (unsigned, 0),
        };
        let (int, frac) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        if int.is_empty() && frac.is_empty() {
            return None;
        }
        if !int.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
            return None;
        }

        let mut digits: Vec<u8> = int.bytes().chain(frac.bytes()).collect();
        let leading = digits.iter().take_while(|d| **d == b'0').count();
        digits.drain(..leading);
        while digits.last() == Some(&b'0') {
            digits.pop();
        }
        if digits.is_empty() {
            return Some(Self {
                negative: false,
                digits,
                exponent: 0,
            });
        }
        let exponent = i64::try_from(int.len())
            .ok()?
            .checked_sub(i64::try_from(leading).ok()?)?
            .checked_add(exp)?;
        Some(Self {
            negative,
            digits,
            exponent,
        })
    }

    fn signum(&self) -> i8 {
        match (self.digits.is_empty(), self.negative) {
            (true, _) => 0,
            (false, true) => -1,
            (false, false) => 1,
        }
    }
}

impl Ord for DecimalText {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_sign = self.signum().cmp(&other.signum());
        if by_sign != Ordering::Equal || self.signum() == 0 {
            return by_sign;
        }
        let magnitude = self
            .exponent
            .cmp(&other.exponent)
            .then_with(|| self.digits.cmp(&other.digits));
        if self.negative { magnitude.reverse() } else { magnitude }
    }
}

impl PartialOrd for DecimalText {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Exact order on decimal strings; text that is not a number sorts last.
pub(crate) fn cmp_numeric(a: &str, b: &str) -> Ordering {
    match (DecimalText::parse(a), DecimalText::parse(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
