//! Push-stream messages and their registry.

use ripple_remote_core::NotificationRegistry;
use serde::Deserialize;
use serde_json::Value;

use crate::commands::PathAlternative;
use crate::data::{Account, Amount, Hash256, ledger_sequence};

/// A message from a subscribed stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    LedgerClosed(LedgerClosed),
    Transaction(Box<TransactionStream>),
    ServerStatus(ServerStatus),
    PathFind(PathFindStream),
}

impl StreamMessage {
    /// Registry routing every stream type this client understands.
    pub fn registry() -> NotificationRegistry<Self> {
        NotificationRegistry::new()
            .register("ledgerClosed", Self::LedgerClosed)
            .register("transaction", |tx: TransactionStream| Self::Transaction(Box::new(tx)))
            .register("serverStatus", Self::ServerStatus)
            .register("path_find", Self::PathFind)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::LedgerClosed(_) => "ledgerClosed",
            Self::Transaction(_) => "transaction",
            Self::ServerStatus(_) => "serverStatus",
            Self::PathFind(_) => "path_find",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LedgerClosed {
    pub ledger_index: u32,
    pub ledger_hash: Hash256,
    #[serde(default)]
    pub ledger_time: u64,
    #[serde(default)]
    pub txn_count: u32,
    #[serde(default)]
    pub fee_base: u64,
    #[serde(default)]
    pub fee_ref: u64,
    #[serde(default)]
    pub reserve_base: u64,
    #[serde(default)]
    pub reserve_inc: u64,
    #[serde(default)]
    pub validated_ledgers: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransactionStream {
    pub transaction: Value,
    #[serde(default)]
    pub meta: Value,
    #[serde(default)]
    pub engine_result: String,
    #[serde(default, deserialize_with = "ledger_sequence")]
    pub ledger_index: Option<u32>,
    #[serde(default)]
    pub ledger_hash: Option<Hash256>,
    #[serde(default)]
    pub validated: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerStatus {
    pub server_status: String,
    pub load_base: u64,
    pub load_factor: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PathFindStream {
    pub source_account: Account,
    pub destination_account: Account,
    pub destination_amount: Amount,
    #[serde(default)]
    pub alternatives: Vec<PathAlternative>,
    #[serde(default)]
    pub full_reply: bool,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn registry_covers_every_stream() {
        let registry = StreamMessage::registry();
        for kind in ["ledgerClosed", "transaction", "serverStatus", "path_find"] {
            assert!(registry.contains(kind), "{kind} not registered");
        }
        assert!(!registry.contains("response"));
    }

    #[test]
    fn decodes_ledger_closed() {
        let message = json!({
            "type": "ledgerClosed",
            "ledger_index": 42,
            "ledger_hash": Hash256::MAX.to_string(),
            "ledger_time": 700000000u64,
            "txn_count": 3,
        });
        let decoded = StreamMessage::registry()
            .decode("ledgerClosed", message.to_string().as_bytes())
            .unwrap()
            .unwrap();
        assert_eq!(decoded.kind(), "ledgerClosed");
        match decoded {
            StreamMessage::LedgerClosed(closed) => {
                assert_eq!(closed.ledger_index, 42);
                assert_eq!(closed.txn_count, 3);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn decodes_transaction() {
        let message = json!({
            "type": "transaction",
            "transaction": {"TransactionType": "Payment"},
            "engine_result": "tesSUCCESS",
            "ledger_index": 7,
            "validated": true,
        });
        let decoded = StreamMessage::registry()
            .decode("transaction", message.to_string().as_bytes())
            .unwrap()
            .unwrap();
        assert!(matches!(decoded, StreamMessage::Transaction(tx) if tx.validated));
    }
}
