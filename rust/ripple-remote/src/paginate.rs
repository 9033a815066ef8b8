//! Marker-following verbs.
//!
//! `account_lines` and `account_offers` drain every page and sort the
//! combined list; `account_tx` streams items as pages arrive.
//!
//! After the first page, later pages are pinned to the ledger the first one
//! was read from, so a walk never straddles two ledgers.

use std::cmp::Ordering;

use ripple_remote_core::{RemoteError, Transport};
use tokio::sync::mpsc;

use crate::Remote;
use crate::commands::{
    AccountLinesRequest, AccountLinesResult, AccountOffer, AccountOffersRequest,
    AccountOffersResult, AccountTransaction, AccountTxRequest, PAGE_LIMIT, TrustLine,
};
use crate::data::{Account, LedgerSelector, Marker, cmp_numeric};

/// Trust lines by currency, then balance.
fn cmp_lines(a: &TrustLine, b: &TrustLine) -> Ordering {
    a.currency
        .cmp(&b.currency)
        .then_with(|| cmp_numeric(&a.balance, &b.balance))
}

/// Offers by quality, then sequence.
fn cmp_offers(a: &AccountOffer, b: &AccountOffer) -> Ordering {
    cmp_numeric(&a.quality, &b.quality).then_with(|| a.seq.cmp(&b.seq))
}

fn pinned(ledger_index: Option<u32>, ledger_current_index: Option<u32>) -> Option<LedgerSelector> {
    ledger_index
        .or(ledger_current_index)
        .map(LedgerSelector::Sequence)
}

impl<T: Transport> Remote<T> {
    /// Every trust line of `account`, sorted by currency then balance.
    pub async fn account_lines(
        &self,
        account: &Account,
        ledger: Option<LedgerSelector>,
    ) -> Result<AccountLinesResult, RemoteError> {
        let mut ledger = ledger;
        let mut marker: Option<Marker> = None;
        let mut lines = Vec::new();
        let mut pages = 0usize;
        loop {
            let mut page = self
                .request(&AccountLinesRequest {
                    account: account.clone(),
                    limit: PAGE_LIMIT,
                    marker: marker.take(),
                    ledger,
                })
                .await?;
            pages += 1;
            lines.append(&mut page.lines);

            match page.marker.take() {
                Some(next) => {
                    marker = Some(next);
                    ledger = pinned(page.ledger_index, page.ledger_current_index).or(ledger);
                }
                None => {
                    lines.sort_by(cmp_lines);
                    tracing::debug!(%account, pages, lines = lines.len(), "account_lines complete");
                    page.lines = lines;
                    return Ok(page);
                }
            }
        }
    }

    /// Every offer owned by `account`, sorted by quality.
    pub async fn account_offers(
        &self,
        account: &Account,
        ledger: Option<LedgerSelector>,
    ) -> Result<AccountOffersResult, RemoteError> {
        let mut ledger = ledger;
        let mut marker: Option<Marker> = None;
        let mut offers = Vec::new();
        let mut pages = 0usize;
        loop {
            let mut page = self
                .request(&AccountOffersRequest {
                    account: account.clone(),
                    limit: PAGE_LIMIT,
                    marker: marker.take(),
                    ledger,
                })
                .await?;
            pages += 1;
            offers.append(&mut page.offers);

            match page.marker.take() {
                Some(next) => {
                    marker = Some(next);
                    ledger = pinned(page.ledger_index, page.ledger_current_index).or(ledger);
                }
                None => {
                    offers.sort_by(cmp_offers);
                    tracing::debug!(%account, pages, offers = offers.len(), "account_offers complete");
                    page.offers = offers;
                    return Ok(page);
                }
            }
        }
    }

    /// Stream the transactions of `account`, page by page.
    ///
    /// Use -1 for `min_ledger` to start at the earliest available ledger and
    /// -1 for `max_ledger` to end at the most recent validated one. If a page
    /// fails, the error is the last item before the stream ends. Dropping the
    /// receiver stops the walk.
    pub fn account_tx(
        &self,
        account: &Account,
        page_size: u32,
        min_ledger: i64,
        max_ledger: i64,
    ) -> Result<mpsc::Receiver<Result<AccountTransaction, RemoteError>>, RemoteError> {
        self.ensure_connected()?;
        let (tx, rx) = mpsc::channel(self.session().config().stream_depth);
        let remote = self.clone();
        let account = account.clone();
        tokio::spawn(async move {
            let mut marker: Option<Marker> = None;
            loop {
                let request = AccountTxRequest {
                    account: account.clone(),
                    ledger_index_min: min_ledger,
                    ledger_index_max: max_ledger,
                    limit: page_size,
                    marker: marker.take(),
                };
                let page = match remote.request(&request).await {
                    Ok(page) => page,
                    Err(err) => {
                        tracing::error!(%account, %err, "account_tx page failed");
                        let _ = tx.send(Err(err)).await;
                        return;
                    }
                };
                for transaction in page.transactions {
                    if tx.send(Ok(transaction)).await.is_err() {
                        tracing::debug!(%account, "account_tx consumer gone");
                        return;
                    }
                }
                match page.marker {
                    Some(next) => marker = Some(next),
                    None => return,
                }
            }
        });
        Ok(rx)
    }
}
