//! Binary ledger state entries, as returned by `ledger_data` with `binary: true`.

use crate::data::Hash256;

/// Field header of `LedgerEntryType`: type code 1 (UInt16), field code 1.
const LEDGER_ENTRY_TYPE_HEADER: u8 = 0x11;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum LedgerEntryError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("entry is {0} bytes, shorter than its 32-byte key")]
    TooShort(usize),
}

/// One ledger state entry in its serialized form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub index: Hash256,
    /// `LedgerEntryType`, when the object starts with it (it always does for
    /// canonically serialized entries).
    pub entry_type: Option<u16>,
    /// The serialized object, without the trailing key.
    pub data: Vec<u8>,
}

impl LedgerEntry {
    /// Decode the node's `data` and `index` hex strings.
    ///
    /// The two are decoded as one buffer; its last 32 bytes are the key.
    pub fn from_hex(data: &str, index: &str) -> Result<Self, LedgerEntryError> {
        let mut bytes = hex::decode(format!("{data}{index}"))?;
        if bytes.len() < 32 {
            return Err(LedgerEntryError::TooShort(bytes.len()));
        }
        let key = bytes.split_off(bytes.len() - 32);
        let mut index = [0u8; 32];
        index.copy_from_slice(&key);

        let entry_type = match bytes.as_slice() {
            [LEDGER_ENTRY_TYPE_HEADER, hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
            _ => None,
        };
        Ok(Self {
            index: Hash256(index),
            entry_type,
            data: bytes,
        })
    }

    /// Name of the entry type, for the types a client usually meets.
    pub fn type_name(&self) -> Option<&'static str> {
        let name = match self.entry_type? {
            0x0061 => "AccountRoot",
            0x0043 => "Check",
            0x0070 => "DepositPreauth",
            0x0064 => "DirectoryNode",
            0x0075 => "Escrow",
            0x0073 => "FeeSettings",
            0x0066 => "Amendments",
            0x0068 => "LedgerHashes",
            0x004E => "NegativeUNL",
            0x006F => "Offer",
            0x0078 => "PayChannel",
            0x0072 => "RippleState",
            0x0053 => "SignerList",
            0x0054 => "Ticket",
            _ => return None,
        };
        Some(name)
    }
}
