//! `Remote`: the ledger client façade.

use ripple_remote_core::{
    RemoteConfig, RemoteError, Request, Session, Transport, WebSocketTransport,
};
use tokio::sync::mpsc;

use crate::commands::{
    AccountInfoRequest, AccountInfoResult, BOOK_OFFERS_LIMIT, BookOffersRequest, BookOffersResult,
    FeeRequest, FeeResult, LedgerDataRequest, LedgerDataResult, LedgerHeaderRequest,
    LedgerHeaderResult, LedgerRequest, LedgerResult, OrderBookSubscription, RipplePathFindRequest,
    RipplePathFindResult, SourceCurrency, SubmitRequest, SubmitResult, SubscribeRequest,
    SubscribeResult, TxRequest, TxResult,
};
use crate::data::{Account, Amount, Asset, Hash256, LedgerSelector, Marker};
use crate::streams::StreamMessage;

/// A connection to one ledger node.
///
/// Cheap to clone; every clone shares the session.
pub struct Remote<T: Transport = WebSocketTransport> {
    session: Session<T, StreamMessage>,
}

impl<T: Transport> Clone for Remote<T> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
        }
    }
}

impl<T: Transport> std::fmt::Debug for Remote<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Remote").field("session", &self.session).finish()
    }
}

impl Remote {
    /// Connect to `endpoint` with configuration taken from the environment.
    pub async fn connect(endpoint: &str) -> Result<Self, RemoteError> {
        Self::connect_with(endpoint, RemoteConfig::from_env()).await
    }

    pub async fn connect_with(endpoint: &str, config: RemoteConfig) -> Result<Self, RemoteError> {
        tracing::info!(remote = endpoint, "new remote session");
        let session = Session::connect(endpoint, StreamMessage::registry(), config).await?;
        Ok(Self { session })
    }
}

impl<T: Transport> Remote<T> {
    /// Run a session over an established transport.
    pub fn with_transport(transport: T, config: RemoteConfig) -> Result<Self, RemoteError> {
        let session = Session::start(transport, StreamMessage::registry(), config)?;
        Ok(Self { session })
    }

    pub fn session(&self) -> &Session<T, StreamMessage> {
        &self.session
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Take the stream of subscribed push messages. Only the first call gets it.
    pub fn incoming(&self) -> Option<mpsc::Receiver<StreamMessage>> {
        self.session.incoming()
    }

    /// Shut the session down; pending calls fail with [`RemoteError::Closed`].
    pub async fn close(&self) {
        self.session.close().await;
    }

    pub(crate) async fn request<R: Request>(&self, request: &R) -> Result<R::Response, RemoteError> {
        self.session.request(request).await
    }

    pub async fn tx(&self, hash: Hash256) -> Result<TxResult, RemoteError> {
        self.request(&TxRequest { transaction: hash }).await
    }

    /// Submit one signed transaction.
    pub async fn submit(&self, signed: &[u8]) -> Result<SubmitResult, RemoteError> {
        self.request(&SubmitRequest::new(signed)).await
    }

    /// Submit several signed transactions.
    ///
    /// All are queued before any reply is awaited; results come back in the
    /// order of `batch` whatever order the node answers in.
    pub async fn submit_batch<B: AsRef<[u8]>>(
        &self,
        batch: &[B],
    ) -> Result<Vec<Result<SubmitResult, RemoteError>>, RemoteError> {
        let mut pending = Vec::with_capacity(batch.len());
        for signed in batch {
            pending.push(self.session.submit(&SubmitRequest::new(signed.as_ref())).await?);
        }
        let mut results = Vec::with_capacity(pending.len());
        for reply in pending {
            results.push(reply.await);
        }
        Ok(results)
    }

    /// Fetch a ledger; with `transactions`, expanded and in ledger order.
    pub async fn ledger(
        &self,
        ledger: LedgerSelector,
        transactions: bool,
    ) -> Result<LedgerResult, RemoteError> {
        let mut result = self
            .request(&LedgerRequest {
                ledger,
                transactions,
                expand: true,
            })
            .await?;
        result.ledger.sort_transactions();
        Ok(result)
    }

    pub async fn ledger_header(&self, ledger: LedgerSelector) -> Result<LedgerHeaderResult, RemoteError> {
        self.request(&LedgerHeaderRequest { ledger }).await
    }

    /// One JSON page of ledger state.
    pub async fn ledger_data(
        &self,
        ledger: LedgerSelector,
        marker: Option<Marker>,
    ) -> Result<LedgerDataResult, RemoteError> {
        self.request(&LedgerDataRequest {
            ledger,
            marker,
            binary: false,
        })
        .await
    }

    pub async fn account_info(&self, account: &Account) -> Result<AccountInfoResult, RemoteError> {
        self.request(&AccountInfoRequest {
            account: account.clone(),
        })
        .await
    }

    /// Offers in one order book, as seen by `taker`.
    pub async fn book_offers(
        &self,
        taker: &Account,
        ledger: Option<LedgerSelector>,
        pays: Asset,
        gets: Asset,
    ) -> Result<BookOffersResult, RemoteError> {
        self.request(&BookOffersRequest {
            taker: taker.clone(),
            taker_pays: pays,
            taker_gets: gets,
            limit: BOOK_OFFERS_LIMIT,
            ledger,
        })
        .await
    }

    /// Subscribe to push streams. Messages arrive on [`incoming`](Self::incoming).
    ///
    /// The node must acknowledge the ledger and server streams with their
    /// current state; a missing acknowledgement is a protocol error.
    pub async fn subscribe(
        &self,
        ledger: bool,
        transactions: bool,
        transactions_proposed: bool,
        server: bool,
    ) -> Result<SubscribeResult, RemoteError> {
        let streams = [
            (ledger, "ledger"),
            (transactions, "transactions"),
            (transactions_proposed, "transactions_proposed"),
            (server, "server"),
        ]
        .into_iter()
        .filter_map(|(wanted, stream)| wanted.then_some(stream))
        .collect();

        let result = self
            .request(&SubscribeRequest {
                streams,
                books: Vec::new(),
            })
            .await?;
        if ledger && result.ledger.is_none() {
            return Err(RemoteError::Protocol("missing ledger subscribe response".into()));
        }
        if server && result.server.is_none() {
            return Err(RemoteError::Protocol("missing server subscribe response".into()));
        }
        Ok(result)
    }

    /// Subscribe to the ledger and server streams plus the given order books.
    pub async fn subscribe_order_books(
        &self,
        books: Vec<OrderBookSubscription>,
    ) -> Result<SubscribeResult, RemoteError> {
        self.request(&SubscribeRequest {
            streams: vec!["ledger", "server"],
            books,
        })
        .await
    }

    pub async fn fee(&self) -> Result<FeeResult, RemoteError> {
        self.request(&FeeRequest {}).await
    }

    pub async fn ripple_path_find(
        &self,
        source: &Account,
        destination: &Account,
        amount: Amount,
        source_currencies: Option<Vec<SourceCurrency>>,
    ) -> Result<RipplePathFindResult, RemoteError> {
        self.request(&RipplePathFindRequest {
            source_account: source.clone(),
            destination_account: destination.clone(),
            destination_amount: amount,
            source_currencies,
        })
        .await
    }

    /// Fail fast when the session is down, before spawning stream workers.
    pub(crate) fn ensure_connected(&self) -> Result<(), RemoteError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(RemoteError::NotConnected)
        }
    }
}
