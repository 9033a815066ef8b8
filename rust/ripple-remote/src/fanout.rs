//! Parallel walk of a ledger's state, split by leading key nibble.
//!
//! Sixteen workers each page through one slice of the key space and push
//! decoded batches onto one shared queue. The queue closes only after every
//! worker has finished.

use ripple_remote_core::{RemoteError, Transport};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::Remote;
use crate::commands::{LedgerDataRequest, LedgerDataResult};
use crate::data::{Hash256, LedgerSelector, Marker};
use crate::ledger_entry::LedgerEntry;

pub const PARTITIONS: u8 = 16;

/// Batches of entries from one page of one partition.
pub type LedgerDataStream = mpsc::Receiver<Result<Vec<LedgerEntry>, RemoteError>>;

/// One contiguous slice of the key space: `[lower, upper]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub lower: Hash256,
    pub upper: Hash256,
}

impl Partition {
    /// Partition `i` holds every key whose leading nibble is `i`.
    pub fn nth(i: u8) -> Self {
        debug_assert!(i < PARTITIONS);
        let mut lower = [0u8; 32];
        lower[0] = i << 4;
        let mut upper = [0xFFu8; 32];
        upper[0] = (i << 4) | 0x0F;
        Self {
            lower: Hash256(lower),
            upper: Hash256(upper),
        }
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (0..PARTITIONS).map(Self::nth)
    }

    /// Marker to start from. The node resumes strictly after a marker, so
    /// this is the key just before `lower`; the first partition starts
    /// without one.
    fn start_marker(&self) -> Result<Option<Marker>, RemoteError> {
        self.lower
            .predecessor()
            .map(|key| Marker::from_hash(&key))
            .transpose()
            .map_err(|e| RemoteError::Encode(e.to_string()))
    }
}

/// Decode the part of `page` that falls inside `partition`.
///
/// Returns the entries and whether the page ran past the partition's upper
/// bound, in which case the walk is over. Keys below the lower bound belong
/// to the previous partition. Entries that fail to decode are logged and
/// skipped.
fn scan_page(partition: &Partition, page: &LedgerDataResult) -> (Vec<LedgerEntry>, bool) {
    let mut entries = Vec::with_capacity(page.state.len());
    for state in &page.state {
        let key: Hash256 = match state.index.parse() {
            Ok(key) => key,
            Err(err) => {
                tracing::warn!(index = %state.index, %err, "skipping entry with bad key");
                continue;
            }
        };
        if key < partition.lower {
            tracing::debug!(index = %state.index, "skipping entry below partition");
            continue;
        }
        if key > partition.upper {
            return (entries, true);
        }
        let Some(data) = state.data.as_deref() else {
            tracing::warn!(index = %state.index, "skipping entry without binary data");
            continue;
        };
        match LedgerEntry::from_hex(data, &state.index) {
            Ok(entry) => entries.push(entry),
            Err(err) => tracing::error!(index = %state.index, %err, "failed to decode ledger entry"),
        }
    }
    (entries, false)
}

impl<T: Transport> Remote<T> {
    /// Stream every state entry of `ledger`, fetched by 16 concurrent
    /// partition walks over binary `ledger_data`.
    ///
    /// The first page of partition 0 resolves `ledger` to a sequence number
    /// and every partition reads that one ledger. Batches arrive in no
    /// particular order across partitions. A failing partition reports its
    /// error as one item and stops; the others go on.
    pub fn stream_ledger_data(&self, ledger: LedgerSelector) -> Result<LedgerDataStream, RemoteError> {
        self.ensure_connected()?;
        let (tx, rx) = mpsc::channel(self.session().config().stream_depth);
        tokio::spawn(supervise(self.clone(), ledger, tx));
        Ok(rx)
    }
}

async fn supervise<T: Transport>(
    remote: Remote<T>,
    ledger: LedgerSelector,
    tx: mpsc::Sender<Result<Vec<LedgerEntry>, RemoteError>>,
) {
    let first = LedgerDataRequest {
        ledger,
        marker: None,
        binary: true,
    };
    let page: LedgerDataResult = match remote.request(&first).await {
        Ok(page) => page,
        Err(err) => {
            tracing::error!(%err, "ledger_data walk could not start");
            let _ = tx.send(Err(err)).await;
            return;
        }
    };
    let pinned = match page.ledger_index {
        Some(seq) => LedgerSelector::Sequence(seq),
        None => {
            tracing::warn!(?ledger, "first ledger_data page has no ledger_index; walking unpinned");
            ledger
        }
    };
    tracing::debug!(?pinned, "ledger data walk started");

    let mut first_page = Some(page);
    let mut workers = JoinSet::new();
    for (i, partition) in Partition::all().enumerate() {
        let resume = first_page.take();
        workers.spawn(walk_partition(remote.clone(), pinned, partition, i, resume, tx.clone()));
    }
    // Only the workers hold senders now; the queue closes when the last one ends.
    drop(tx);

    while let Some(joined) = workers.join_next().await {
        if let Err(err) = joined {
            tracing::error!(%err, "ledger data worker panicked");
        }
    }
    tracing::debug!("ledger data walk finished");
}

/// Page through one partition of `ledger`, starting from `resume` when the
/// first page is already in hand.
async fn walk_partition<T: Transport>(
    remote: Remote<T>,
    ledger: LedgerSelector,
    partition: Partition,
    worker: usize,
    mut resume: Option<LedgerDataResult>,
    tx: mpsc::Sender<Result<Vec<LedgerEntry>, RemoteError>>,
) {
    let mut marker = match partition.start_marker() {
        Ok(marker) => marker,
        Err(err) => {
            let _ = tx.send(Err(err)).await;
            return;
        }
    };
    let mut pages = 0usize;
    loop {
        let page = match resume.take() {
            Some(page) => page,
            None => {
                let request = LedgerDataRequest {
                    ledger,
                    marker: marker.take(),
                    binary: true,
                };
                match remote.request(&request).await {
                    Ok(page) => page,
                    Err(err) => {
                        tracing::error!(worker, %err, "ledger_data page failed");
                        let _ = tx.send(Err(err)).await;
                        return;
                    }
                }
            }
        };
        pages += 1;

        let (entries, past_upper) = scan_page(&partition, &page);
        if !entries.is_empty() && tx.send(Ok(entries)).await.is_err() {
            tracing::debug!(worker, "ledger data consumer gone");
            return;
        }
        match page.marker {
            Some(next) if !past_upper => marker = Some(next),
            _ => {
                tracing::debug!(worker, pages, "partition done");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn key(first: u8, fill: u8) -> Hash256 {
        let mut bytes = [fill; 32];
        bytes[0] = first;
        Hash256(bytes)
    }

    fn page(keys: &[Hash256]) -> LedgerDataResult {
        let state: Vec<_> = keys
            .iter()
            .map(|k| json!({"data": "110061", "index": k.to_string()}))
            .collect();
        serde_json::from_value(json!({"ledger_index": 1, "state": state, "marker": "M"})).unwrap()
    }

    #[test]
    fn partitions_tile_the_key_space() {
        let parts: Vec<_> = Partition::all().collect();
        assert_eq!(parts.len(), 16);
        assert_eq!(parts[0].lower, Hash256::ZERO);
        assert_eq!(parts[15].upper, Hash256::MAX);
        for pair in parts.windows(2) {
            assert!(pair[0].lower < pair[0].upper);
            assert_eq!(pair[1].lower.predecessor(), Some(pair[0].upper));
        }
    }

    #[test]
    fn start_markers() {
        assert_eq!(Partition::nth(0).start_marker().unwrap(), None);
        let marker = Partition::nth(1).start_marker().unwrap().unwrap();
        assert_eq!(marker.as_str(), format!("\"{}\"", key(0x0F, 0xFF)));
    }

    #[test]
    fn page_is_truncated_at_the_upper_bound() {
        let boundary = key(0x10, 0x00);
        let page = page(&[key(0x0F, 0xFE), key(0x0F, 0xFF), boundary, key(0x10, 0x01)]);

        let (first, past_first) = scan_page(&Partition::nth(0), &page);
        assert!(past_first);
        assert_eq!(first.iter().map(|e| e.index).collect::<Vec<_>>(), [key(0x0F, 0xFE), key(0x0F, 0xFF)]);

        let (second, past_second) = scan_page(&Partition::nth(1), &page);
        assert!(!past_second);
        assert_eq!(second.iter().map(|e| e.index).collect::<Vec<_>>(), [boundary, key(0x10, 0x01)]);
    }

    #[test]
    fn boundary_page_splits_without_overlap() {
        let page = page(&[key(0x0F, 0xFE), key(0x0F, 0xFF), key(0x10, 0x00)]);
        let (first, _) = scan_page(&Partition::nth(0), &page);
        let (second, _) = scan_page(&Partition::nth(1), &page);
        assert_eq!(first.len() + second.len(), 3);
        assert!(first.iter().all(|a| second.iter().all(|b| a.index != b.index)));
    }

    #[test]
    fn bad_entries_are_skipped() {
        let page: LedgerDataResult = serde_json::from_value(json!({
            "state": [
                {"data": "11", "index": "nothex"},
                {"index": key(0, 1).to_string()},
                {"data": "zz", "index": key(0, 2).to_string()},
                {"data": "110061", "index": key(0, 3).to_string()},
            ],
        }))
        .unwrap();
        let (entries, past) = scan_page(&Partition::nth(0), &page);
        assert!(!past);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].index, key(0, 3));
    }
}
