//! Typed ledger verbs: one request struct per verb, plus its result shape.
//!
//! Results keep the fields a client acts on; anything else the node sends is
//! ignored, or kept as raw JSON where its shape varies by ledger object.

use ripple_remote_core::Request;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::data::{Account, Amount, Asset, Hash256, LedgerSelector, Marker, ledger_sequence};

/// Page size requested by paginated verbs.
pub const PAGE_LIMIT: u32 = 400;

/// `book_offers` has no pagination here; ask for a large single page.
pub const BOOK_OFFERS_LIMIT: u32 = 5000;

// ---------------------------------------------------------------------------
// tx

#[derive(Debug, Serialize)]
pub struct TxRequest {
    pub transaction: Hash256,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxResult {
    pub hash: Hash256,
    #[serde(default, deserialize_with = "ledger_sequence")]
    pub ledger_index: Option<u32>,
    #[serde(default)]
    pub validated: bool,
    #[serde(default)]
    pub meta: Option<Value>,
    /// The transaction's own fields (`Account`, `TransactionType`, ...).
    #[serde(flatten)]
    pub tx: Map<String, Value>,
}

impl Request for TxRequest {
    const COMMAND: &'static str = "tx";
    type Response = TxResult;
}

// ---------------------------------------------------------------------------
// submit

#[derive(Debug, Serialize)]
pub struct SubmitRequest {
    /// Signed transaction, uppercase hex.
    pub tx_blob: String,
}

impl SubmitRequest {
    pub fn new(signed: &[u8]) -> Self {
        Self {
            tx_blob: hex::encode_upper(signed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubmitResult {
    pub engine_result: String,
    #[serde(default)]
    pub engine_result_code: i32,
    #[serde(default)]
    pub engine_result_message: String,
    #[serde(default)]
    pub tx_blob: String,
    #[serde(default)]
    pub tx_json: Value,
}

impl Request for SubmitRequest {
    const COMMAND: &'static str = "submit";
    type Response = SubmitResult;
}

// ---------------------------------------------------------------------------
// ledger, ledger_header

#[derive(Debug, Serialize)]
pub struct LedgerRequest {
    #[serde(flatten)]
    pub ledger: LedgerSelector,
    pub transactions: bool,
    pub expand: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerResult {
    pub ledger: Ledger,
    #[serde(default)]
    pub validated: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ledger {
    #[serde(default, deserialize_with = "ledger_sequence")]
    pub ledger_index: Option<u32>,
    #[serde(default)]
    pub ledger_hash: Option<Hash256>,
    #[serde(default)]
    pub parent_hash: Option<Hash256>,
    #[serde(default)]
    pub close_time: Option<u64>,
    #[serde(default)]
    pub total_coins: Option<String>,
    /// Expanded transactions, each with its `metaData`.
    #[serde(default)]
    pub transactions: Vec<Value>,
}

impl Ledger {
    /// Order transactions by their position in the ledger.
    pub(crate) fn sort_transactions(&mut self) {
        self.transactions.sort_by_key(|tx| {
            tx.get("metaData")
                .or_else(|| tx.get("meta"))
                .and_then(|meta| meta.get("TransactionIndex"))
                .and_then(Value::as_u64)
                .unwrap_or(u64::MAX)
        });
    }
}

impl Request for LedgerRequest {
    const COMMAND: &'static str = "ledger";
    type Response = LedgerResult;
}

#[derive(Debug, Serialize)]
pub struct LedgerHeaderRequest {
    #[serde(flatten)]
    pub ledger: LedgerSelector,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerHeaderResult {
    /// Serialized header, hex.
    #[serde(default)]
    pub ledger_data: Option<String>,
    #[serde(default)]
    pub ledger: Value,
    #[serde(default, deserialize_with = "ledger_sequence")]
    pub ledger_index: Option<u32>,
    #[serde(default)]
    pub validated: bool,
}

impl Request for LedgerHeaderRequest {
    const COMMAND: &'static str = "ledger_header";
    type Response = LedgerHeaderResult;
}

// ---------------------------------------------------------------------------
// ledger_data

#[derive(Debug, Serialize)]
pub struct LedgerDataRequest {
    #[serde(flatten)]
    pub ledger: LedgerSelector,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<Marker>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub binary: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerDataResult {
    #[serde(default, deserialize_with = "ledger_sequence")]
    pub ledger_index: Option<u32>,
    #[serde(default)]
    pub ledger_hash: Option<Hash256>,
    #[serde(default)]
    pub marker: Option<Marker>,
    #[serde(default)]
    pub state: Vec<StateEntry>,
}

/// One `ledger_data` item: `data` + `index` in binary mode, the object's
/// fields otherwise.
#[derive(Debug, Clone, Deserialize)]
pub struct StateEntry {
    pub index: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Request for LedgerDataRequest {
    const COMMAND: &'static str = "ledger_data";
    type Response = LedgerDataResult;
}

// ---------------------------------------------------------------------------
// account_info

#[derive(Debug, Serialize)]
pub struct AccountInfoRequest {
    pub account: Account,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountInfoResult {
    pub account_data: AccountRoot,
    #[serde(default, deserialize_with = "ledger_sequence")]
    pub ledger_index: Option<u32>,
    #[serde(default, deserialize_with = "ledger_sequence")]
    pub ledger_current_index: Option<u32>,
    #[serde(default)]
    pub validated: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccountRoot {
    #[serde(rename = "Account")]
    pub account: Account,
    /// Drops.
    #[serde(rename = "Balance")]
    pub balance: String,
    #[serde(rename = "Sequence")]
    pub sequence: u32,
    #[serde(rename = "OwnerCount", default)]
    pub owner_count: u32,
    #[serde(rename = "Flags", default)]
    pub flags: u32,
}

impl Request for AccountInfoRequest {
    const COMMAND: &'static str = "account_info";
    type Response = AccountInfoResult;
}

// ---------------------------------------------------------------------------
// account_lines, account_offers

#[derive(Debug, Serialize)]
pub struct AccountLinesRequest {
    pub account: Account,
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<Marker>,
    #[serde(flatten)]
    pub ledger: Option<LedgerSelector>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountLinesResult {
    pub account: Account,
    pub lines: Vec<TrustLine>,
    #[serde(default)]
    pub marker: Option<Marker>,
    #[serde(default, deserialize_with = "ledger_sequence")]
    pub ledger_index: Option<u32>,
    #[serde(default, deserialize_with = "ledger_sequence")]
    pub ledger_current_index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrustLine {
    /// Counterparty.
    pub account: Account,
    pub balance: String,
    pub currency: String,
    pub limit: String,
    pub limit_peer: String,
    #[serde(default)]
    pub quality_in: u32,
    #[serde(default)]
    pub quality_out: u32,
    #[serde(default)]
    pub no_ripple: bool,
    #[serde(default)]
    pub no_ripple_peer: bool,
}

impl Request for AccountLinesRequest {
    const COMMAND: &'static str = "account_lines";
    type Response = AccountLinesResult;
}

#[derive(Debug, Serialize)]
pub struct AccountOffersRequest {
    pub account: Account,
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<Marker>,
    #[serde(flatten)]
    pub ledger: Option<LedgerSelector>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountOffersResult {
    pub account: Account,
    pub offers: Vec<AccountOffer>,
    #[serde(default)]
    pub marker: Option<Marker>,
    #[serde(default, deserialize_with = "ledger_sequence")]
    pub ledger_index: Option<u32>,
    #[serde(default, deserialize_with = "ledger_sequence")]
    pub ledger_current_index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccountOffer {
    #[serde(default)]
    pub flags: u32,
    pub seq: u32,
    pub taker_gets: Amount,
    pub taker_pays: Amount,
    /// Exchange rate, as a decimal string.
    pub quality: String,
}

impl Request for AccountOffersRequest {
    const COMMAND: &'static str = "account_offers";
    type Response = AccountOffersResult;
}

// ---------------------------------------------------------------------------
// account_tx

#[derive(Debug, Serialize)]
pub struct AccountTxRequest {
    pub account: Account,
    /// -1 for the earliest available ledger.
    pub ledger_index_min: i64,
    /// -1 for the most recent validated ledger.
    pub ledger_index_max: i64,
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<Marker>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountTxResult {
    pub account: Account,
    #[serde(default)]
    pub marker: Option<Marker>,
    #[serde(default)]
    pub transactions: Vec<AccountTransaction>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccountTransaction {
    pub tx: Value,
    #[serde(default)]
    pub meta: Value,
    #[serde(default)]
    pub validated: bool,
}

impl Request for AccountTxRequest {
    const COMMAND: &'static str = "account_tx";
    type Response = AccountTxResult;
}

// ---------------------------------------------------------------------------
// book_offers

#[derive(Debug, Serialize)]
pub struct BookOffersRequest {
    pub taker: Account,
    pub taker_pays: Asset,
    pub taker_gets: Asset,
    pub limit: u32,
    #[serde(flatten)]
    pub ledger: Option<LedgerSelector>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookOffersResult {
    pub offers: Vec<BookOffer>,
    #[serde(default, deserialize_with = "ledger_sequence")]
    pub ledger_index: Option<u32>,
    #[serde(default, deserialize_with = "ledger_sequence")]
    pub ledger_current_index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BookOffer {
    #[serde(rename = "Account")]
    pub account: Account,
    #[serde(rename = "Sequence")]
    pub sequence: u32,
    #[serde(rename = "TakerGets")]
    pub taker_gets: Amount,
    #[serde(rename = "TakerPays")]
    pub taker_pays: Amount,
    #[serde(rename = "Flags", default)]
    pub flags: u32,
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub owner_funds: Option<String>,
}

impl Request for BookOffersRequest {
    const COMMAND: &'static str = "book_offers";
    type Response = BookOffersResult;
}

// ---------------------------------------------------------------------------
// subscribe

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderBookSubscription {
    pub taker_gets: Asset,
    pub taker_pays: Asset,
    pub snapshot: bool,
    pub both: bool,
}

#[derive(Debug, Serialize)]
pub struct SubscribeRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub streams: Vec<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub books: Vec<OrderBookSubscription>,
}

/// Subscription acknowledgement.
///
/// Each stream acknowledges with its own block of fields; a block that is
/// absent or incomplete decodes as `None`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeResult {
    #[serde(flatten)]
    pub ledger: Option<LedgerStreamAck>,
    #[serde(flatten)]
    pub server: Option<ServerStreamAck>,
    /// Order-book snapshot, when requested.
    #[serde(default)]
    pub offers: Vec<Value>,
    #[serde(default)]
    pub bids: Vec<Value>,
    #[serde(default)]
    pub asks: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LedgerStreamAck {
    pub ledger_index: u32,
    pub ledger_hash: Hash256,
    #[serde(default)]
    pub ledger_time: u64,
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
pub struct ServerStreamAck {
    pub server_status: String,
    pub load_base: u64,
    pub load_factor: u64,
}

impl Request for SubscribeRequest {
    const COMMAND: &'static str = "subscribe";
    type Response = SubscribeResult;
}

// ---------------------------------------------------------------------------
// fee

#[derive(Debug, Serialize)]
pub struct FeeRequest {}

#[derive(Debug, Clone, Deserialize)]
pub struct FeeResult {
    pub drops: FeeDrops,
    #[serde(default)]
    pub current_ledger_size: String,
    #[serde(default)]
    pub current_queue_size: String,
    #[serde(default)]
    pub expected_ledger_size: String,
    #[serde(default)]
    pub max_queue_size: String,
    #[serde(default, deserialize_with = "ledger_sequence")]
    pub ledger_current_index: Option<u32>,
    #[serde(default)]
    pub levels: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeeDrops {
    pub base_fee: String,
    pub median_fee: String,
    pub minimum_fee: String,
    pub open_ledger_fee: String,
}

impl Request for FeeRequest {
    const COMMAND: &'static str = "fee";
    type Response = FeeResult;
}

// ---------------------------------------------------------------------------
// ripple_path_find

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceCurrency {
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<Account>,
}

#[derive(Debug, Serialize)]
pub struct RipplePathFindRequest {
    pub source_account: Account,
    pub destination_account: Account,
    pub destination_amount: Amount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_currencies: Option<Vec<SourceCurrency>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RipplePathFindResult {
    #[serde(default)]
    pub alternatives: Vec<PathAlternative>,
    pub destination_account: Account,
    #[serde(default)]
    pub destination_currencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PathAlternative {
    #[serde(default)]
    pub paths_computed: Value,
    pub source_amount: Amount,
}

impl Request for RipplePathFindRequest {
    const COMMAND: &'static str = "ripple_path_find";
    type Response = RipplePathFindResult;
}
