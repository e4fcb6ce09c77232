//! Dispatcher - Routes inbound frames and correlates requests with replies
//!
//! Handles:
//! - Decoding each frame against the catalog
//! - Point-to-point delivery of replies to the request that sent the id
//! - Fan-out of unsolicited events to firehose subscribers
//! - The request/response primitive every RPC call is built on

mod fanout;
mod pending;

pub use fanout::{Event, EventSender, Fanout, Registration, Subscription};

use bytes::Bytes;
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::catalog::{
    payload_type, Catalog, CatalogMessage, DecodeError, Payload, ProtocolError,
};
use crate::network::{
    CloseReason, ClosedListener, Dialer, FrameError, FrameHandler, Session, SessionConfig,
    SessionError, SessionResult, SessionStats, TcpDialer,
};
use crate::protocol::Envelope;
use pending::{Delivery, PendingTable, ReplyKind};

/// Caller-visible outcome of a failed request
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Invalid request: {0}")]
    Configuration(String),

    #[error("No reply to payload type {payload_type} within {timeout:?}")]
    Timeout { payload_type: u32, timeout: Duration },

    #[error("Write timeout after {0:?}")]
    WriteTimeout(Duration),

    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Unexpected reply of payload type {0}")]
    UnexpectedPayload(u32),
}

pub type RequestResult<T> = Result<T, RequestError>;

impl From<SessionError> for RequestError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::WriteTimeout(limit) => RequestError::WriteTimeout(limit),
            SessionError::ConnectionClosed(reason) => RequestError::ConnectionClosed(reason.to_string()),
            SessionError::Codec(e) => RequestError::Configuration(format!("request not sendable: {}", e)),
            other => RequestError::ConnectionClosed(other.to_string()),
        }
    }
}

/// Failure routing one inbound frame
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The frame is dropped; the session stays up
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Routing state is unusable; the session closes
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type DispatchResult<T> = Result<T, DispatchError>;

impl From<DispatchError> for FrameError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::Decode(e) => FrameError::Dropped(e.to_string()),
            DispatchError::Internal(reason) => FrameError::Internal(reason),
        }
    }
}

/// Owns one session and everything routed over it
pub struct Dispatcher {
    session: Session,
    catalog: Catalog,
    pending: Arc<PendingTable>,
    firehose: Fanout,
}

impl Dispatcher {
    /// Dispatcher over a TLS/TCP session
    pub fn new(config: SessionConfig, catalog: Catalog) -> Arc<Self> {
        Self::with_dialer(config, catalog, Arc::new(TcpDialer))
    }

    pub fn with_dialer(config: SessionConfig, catalog: Catalog, dialer: Arc<dyn Dialer>) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Dispatcher>| {
            let handler: Weak<dyn FrameHandler> = this.clone();
            Self {
                session: Session::new(config, dialer, handler),
                catalog,
                pending: Arc::new(PendingTable::default()),
                firehose: Fanout::new(),
            }
        })
    }

    pub async fn connect(&self) -> SessionResult<()> {
        self.session.connect().await
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Close the session; only the first call has an effect
    pub async fn close(&self, reason: impl Into<String>) -> bool {
        self.session.close(CloseReason::Requested(reason.into())).await
    }

    pub fn on_conn_closed(&self) -> ClosedListener {
        self.session.on_closed()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn stats(&self) -> SessionStats {
        self.session.stats()
    }

    /// Send a payload without a request id
    pub async fn send<M: prost::Message>(&self, payload_type: u32, payload: &M) -> RequestResult<()> {
        self.session.send(payload_type, payload, None).await?;
        Ok(())
    }

    /// Send a request and wait for its reply
    ///
    /// Resolves with the first reply carrying the request's id whose payload
    /// type is in `success` (the payload) or in `error` (a [`ProtocolError`]).
    /// Every registration of the request is released whatever the outcome.
    pub async fn send_request<M: prost::Message>(
        &self,
        payload_type: u32,
        payload: &M,
        success: &[u32],
        error: &[u32],
        timeout: Duration,
    ) -> RequestResult<Payload> {
        let (_, payload) = self
            .exchange(payload_type, payload, success, error, timeout)
            .await?;
        Ok(payload)
    }

    /// [`send_request`](Self::send_request) with the reply downcast to `T`
    pub async fn request<T, M>(
        &self,
        payload_type: u32,
        payload: &M,
        success: &[u32],
        error: &[u32],
        timeout: Duration,
    ) -> RequestResult<T>
    where
        T: CatalogMessage + Clone,
        M: prost::Message,
    {
        let (reply_type, reply) = self
            .exchange(payload_type, payload, success, error, timeout)
            .await?;

        reply
            .downcast_ref::<T>()
            .cloned()
            .ok_or(RequestError::UnexpectedPayload(reply_type))
    }

    async fn exchange<M: prost::Message>(
        &self,
        payload_type: u32,
        payload: &M,
        success: &[u32],
        error: &[u32],
        timeout: Duration,
    ) -> RequestResult<(u32, Payload)> {
        self.check_expected(success, error)?;

        let request_id = Uuid::new_v4().to_string();
        let mut closed = self.session.on_closed();
        let (_guard, reply) = self.pending.register(&request_id, success, error);

        self.session
            .send(payload_type, payload, Some(request_id.clone()))
            .await?;
        tracing::debug!(
            "Request {} sent as {}",
            request_id,
            payload_type::name(payload_type)
        );

        let delivery = tokio::select! {
            biased;
            delivery = reply => delivery,
            reason = closed.recv() => return Err(self.connection_closed(reason)),
            _ = tokio::time::sleep(timeout) => {
                tracing::debug!("Request {} timed out", request_id);
                return Err(RequestError::Timeout { payload_type, timeout });
            }
        };

        let Ok(Delivery { kind, event }) = delivery else {
            return Err(self.connection_closed(None));
        };
        let payload = event.payload?;
        match kind {
            ReplyKind::Success => Ok((event.payload_type, payload)),
            ReplyKind::Error => {
                Err(ProtocolError::from_payload(event.payload_type, payload.as_ref()).into())
            }
        }
    }

    /// Firehose subscription to every unsolicited frame of `payload_type`
    ///
    /// The stream ends when the session closes, or at once if it already has.
    pub fn on(&self, payload_type: u32) -> Subscription {
        self.firehose.subscribe(payload_type)
    }

    /// Feed unsolicited frames of `payload_type` into an existing channel
    pub fn subscribe_sink(&self, payload_type: u32, sink: EventSender) -> Registration {
        self.firehose.attach(payload_type, sink)
    }

    /// Registrations held by in-flight requests
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Live firehose registrations
    pub fn subscription_count(&self) -> usize {
        self.firehose.len()
    }

    fn check_expected(&self, success: &[u32], error: &[u32]) -> RequestResult<()> {
        if success.is_empty() {
            return Err(RequestError::Configuration(
                "no success payload type given".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for payload_type in success.iter().chain(error) {
            if !seen.insert(*payload_type) {
                return Err(RequestError::Configuration(format!(
                    "{} expected more than once",
                    payload_type::name(*payload_type)
                )));
            }
            if !self.catalog.contains(*payload_type) {
                return Err(RequestError::Configuration(format!(
                    "payload type {} is not in the catalog",
                    payload_type
                )));
            }
        }
        Ok(())
    }

    fn connection_closed(&self, reason: Option<CloseReason>) -> RequestError {
        let reason = reason
            .or_else(|| self.session.close_reason())
            .map(|reason| reason.to_string())
            .unwrap_or_else(|| "session dropped".to_string());
        RequestError::ConnectionClosed(reason)
    }

    /// Route one inbound frame
    pub fn handle_frame(&self, frame: Bytes) -> DispatchResult<()> {
        let envelope = Envelope::parse(frame).map_err(|e| DecodeError::Envelope(e.to_string()))?;
        let payload_type = envelope.payload_type;
        if !self.catalog.contains(payload_type) {
            return Err(DecodeError::UnknownPayloadType(payload_type).into());
        }

        let payload = self.catalog.decode(payload_type, &envelope.payload);
        if let Err(e) = &payload {
            tracing::warn!("{}", e);
        }
        let event = Event {
            payload_type,
            payload,
        };

        match envelope.request_id {
            Some(request_id) => {
                if self.pending.deliver(&request_id, event)? {
                    tracing::debug!(
                        "Routed {} to request {}",
                        payload_type::name(payload_type),
                        request_id
                    );
                } else {
                    tracing::debug!(
                        "Dropped {} for unknown request {}",
                        payload_type::name(payload_type),
                        request_id
                    );
                }
            }
            None => {
                let delivered = self.firehose.publish(&event)?;
                tracing::debug!(
                    "Published {} to {} subscribers",
                    payload_type::name(payload_type),
                    delivered
                );
            }
        }
        Ok(())
    }
}

impl FrameHandler for Dispatcher {
    fn on_frame(&self, frame: Bytes) -> Result<(), FrameError> {
        Ok(self.handle_frame(frame)?)
    }

    fn on_closed(&self, reason: &CloseReason) {
        tracing::debug!(
            "Releasing {} pending registrations after close: {}",
            self.pending.len(),
            reason
        );
        self.pending.clear();
        self.firehose.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::payload_type::*;
    use crate::catalog::{
        AccountReq, OaErrorRes, SpotEvent, Trader, TraderRes, VersionReq, VersionRes,
    };
    use prost::Message;
    use crate::testing::{pipe, MockServer};

    const TIMEOUT: Duration = Duration::from_secs(10);

    async fn connected() -> (Arc<Dispatcher>, MockServer) {
        let (dialer, server) = pipe();
        let dispatcher = Dispatcher::with_dialer(
            SessionConfig::default().without_tls(),
            Catalog::open_api(),
            Arc::new(dialer),
        );
        dispatcher.connect().await.unwrap();
        (dispatcher, server)
    }

    fn version(dispatcher: &Arc<Dispatcher>) -> tokio::task::JoinHandle<RequestResult<Payload>> {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            dispatcher
                .send_request(OA_VERSION_REQ, &VersionReq {}, &[OA_VERSION_RES], DEFAULT_ERROR_TYPES, TIMEOUT)
                .await
        })
    }

    fn spot(symbol_id: i64) -> SpotEvent {
        SpotEvent {
            ctid_trader_account_id: Some(7),
            symbol_id,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_success_reply_resolves_request() {
        let (dispatcher, mut server) = connected().await;
        let baseline = dispatcher.pending_count();
        let request = version(&dispatcher);

        let sent = server.recv_request().await;
        assert_eq!(sent.payload_type, OA_VERSION_REQ);
        server
            .reply(OA_VERSION_RES, &VersionRes { version: "88".to_string() }, sent.request_id)
            .await;

        let payload = request.await.unwrap().unwrap();
        assert_eq!(payload.downcast_ref::<VersionRes>().unwrap().version, "88");
        assert_eq!(dispatcher.pending_count(), baseline);
    }

    #[tokio::test]
    async fn test_error_reply_is_protocol_error() {
        let (dispatcher, mut server) = connected().await;
        let request = version(&dispatcher);

        let sent = server.recv_request().await;
        let error = OaErrorRes {
            ctid_trader_account_id: Some(7),
            error_code: "CH_ACCESS_TOKEN_INVALID".to_string(),
            description: None,
            maintenance_end_timestamp: None,
        };
        server.reply(OA_ERROR_RES, &error, sent.request_id).await;

        match request.await.unwrap() {
            Err(RequestError::Protocol(e)) => {
                assert_eq!(e.code, "CH_ACCESS_TOKEN_INVALID");
                assert_eq!(e.tenant_id, Some(7));
            }
            other => panic!("expected protocol error, got {:?}", other),
        }
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_late_reply_is_dropped() {
        let (dispatcher, mut server) = connected().await;
        let request = version(&dispatcher);
        let sent = server.recv_request().await;

        assert!(matches!(
            request.await.unwrap(),
            Err(RequestError::Timeout { payload_type: OA_VERSION_REQ, .. })
        ));
        assert_eq!(dispatcher.pending_count(), 0);

        server
            .reply(OA_VERSION_RES, &VersionRes { version: "late".to_string() }, sent.request_id)
            .await;

        // the session survives and still answers
        let request = version(&dispatcher);
        let sent = server.recv_request().await;
        server
            .reply(OA_VERSION_RES, &VersionRes { version: "89".to_string() }, sent.request_id)
            .await;
        let payload = request.await.unwrap().unwrap();
        assert_eq!(payload.downcast_ref::<VersionRes>().unwrap().version, "89");
        assert!(dispatcher.is_connected());
    }

    #[tokio::test]
    async fn test_same_payload_type_requests_do_not_cross() {
        let (dispatcher, mut server) = connected().await;

        let mut requests = Vec::new();
        for account in [1i64, 2] {
            let dispatcher = dispatcher.clone();
            requests.push(tokio::spawn(async move {
                dispatcher
                    .request::<TraderRes, _>(
                        OA_TRADER_REQ,
                        &AccountReq { ctid_trader_account_id: account },
                        &[OA_TRADER_RES],
                        DEFAULT_ERROR_TYPES,
                        TIMEOUT,
                    )
                    .await
            }));
        }

        let mut sent = vec![server.recv_request().await, server.recv_request().await];
        // answer in reverse order of arrival
        sent.reverse();
        for envelope in sent {
            let request = AccountReq::decode(envelope.payload.as_slice()).unwrap();
            let reply = TraderRes {
                ctid_trader_account_id: request.ctid_trader_account_id,
                trader: Some(Trader {
                    ctid_trader_account_id: request.ctid_trader_account_id,
                    balance: request.ctid_trader_account_id * 100,
                    money_digits: None,
                }),
            };
            server.reply(OA_TRADER_RES, &reply, envelope.request_id).await;
        }

        for (account, request) in [1i64, 2].into_iter().zip(requests) {
            let trader = request.await.unwrap().unwrap();
            assert_eq!(trader.ctid_trader_account_id, account);
            assert_eq!(trader.trader.unwrap().balance, account * 100);
        }
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_firehose_gets_unsolicited_frames_in_order() {
        let (dispatcher, mut server) = connected().await;
        let mut spots = dispatcher.on(OA_SPOT_EVENT);

        server.reply(OA_SPOT_EVENT, &spot(1), None).await;
        server.reply(OA_SPOT_EVENT, &spot(99), Some("U1".to_string())).await;
        server.reply(OA_SPOT_EVENT, &spot(2), None).await;
        server.reply(OA_SPOT_EVENT, &spot(3), None).await;
        server.close().await;

        let mut seen = Vec::new();
        while let Some(event) = spots.recv().await {
            let payload = event.payload.unwrap();
            seen.push(payload.downcast_ref::<SpotEvent>().unwrap().symbol_id);
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_sink_merges_payload_types_in_wire_order() {
        let (dispatcher, mut server) = connected().await;
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let _spots = dispatcher.subscribe_sink(OA_SPOT_EVENT, tx.clone());
        let _versions = dispatcher.subscribe_sink(OA_VERSION_RES, tx);

        server.reply(OA_SPOT_EVENT, &spot(1), None).await;
        server.reply(OA_VERSION_RES, &VersionRes::default(), None).await;
        server.reply(OA_SPOT_EVENT, &spot(2), None).await;

        let mut order = Vec::new();
        for _ in 0..3 {
            order.push(rx.recv().await.unwrap().payload_type);
        }
        assert_eq!(order, vec![OA_SPOT_EVENT, OA_VERSION_RES, OA_SPOT_EVENT]);
    }

    #[tokio::test]
    async fn test_malformed_reply_fails_the_waiter() {
        let (dispatcher, mut server) = connected().await;
        let request = version(&dispatcher);

        let sent = server.recv_request().await;
        server
            .push(Envelope::new(OA_VERSION_RES, vec![0x12, 0xFF], sent.request_id))
            .await;

        assert!(matches!(
            request.await.unwrap(),
            Err(RequestError::Decode(DecodeError::Malformed { payload_type: OA_VERSION_RES, .. }))
        ));
        assert!(dispatcher.is_connected());
    }

    #[tokio::test]
    async fn test_undecodable_frames_keep_session_up() {
        let (dispatcher, mut server) = connected().await;
        let mut spots = dispatcher.on(OA_SPOT_EVENT);

        server.push(Envelope::new(9999, vec![], None)).await;
        server.push_raw(&[0, 0, 0, 2, 0xFF, 0xFF]).await;
        server.reply(OA_SPOT_EVENT, &spot(5), None).await;

        let event = spots.recv().await.unwrap();
        assert_eq!(event.payload.unwrap().downcast_ref::<SpotEvent>().unwrap().symbol_id, 5);
        assert!(dispatcher.is_connected());
    }

    #[tokio::test]
    async fn test_connection_loss_fails_pending_request() {
        let (dispatcher, mut server) = connected().await;
        let mut closed = dispatcher.on_conn_closed();
        let request = version(&dispatcher);

        server.recv_request().await;
        server.close().await;

        assert!(matches!(request.await.unwrap(), Err(RequestError::ConnectionClosed(_))));
        assert!(matches!(closed.recv().await, Some(CloseReason::Transport(_))));
        assert_eq!(closed.recv().await, None);
        assert_eq!(dispatcher.pending_count(), 0);
        assert!(!dispatcher.close("again").await);
    }

    #[tokio::test]
    async fn test_request_after_close_fails() {
        let (dispatcher, _server) = connected().await;
        assert!(dispatcher.close("done").await);

        let result = dispatcher
            .send_request(OA_VERSION_REQ, &VersionReq {}, &[OA_VERSION_RES], &[], TIMEOUT)
            .await;

        assert!(matches!(result, Err(RequestError::ConnectionClosed(_))));
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_expected_types_are_rejected() {
        let (dispatcher, _server) = connected().await;

        for (success, error) in [
            (&[][..], DEFAULT_ERROR_TYPES),
            (&[OA_VERSION_RES, OA_VERSION_RES][..], &[][..]),
            (&[OA_VERSION_RES][..], &[OA_VERSION_RES][..]),
            (&[OA_VERSION_RES][..], &[OA_NEW_ORDER_REQ][..]),
        ] {
            let result = dispatcher
                .send_request(OA_VERSION_REQ, &VersionReq {}, success, error, TIMEOUT)
                .await;
            assert!(matches!(result, Err(RequestError::Configuration(_))));
        }
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_typed_request_rejects_other_shape() {
        let (dispatcher, mut server) = connected().await;
        let request = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .request::<TraderRes, _>(OA_VERSION_REQ, &VersionReq {}, &[OA_VERSION_RES], &[], TIMEOUT)
                    .await
            })
        };

        let sent = server.recv_request().await;
        server.reply(OA_VERSION_RES, &VersionRes::default(), sent.request_id).await;

        assert!(matches!(
            request.await.unwrap(),
            Err(RequestError::UnexpectedPayload(_))
        ));
    }

    #[tokio::test]
    async fn test_subscription_after_close_ends() {
        let (dispatcher, _server) = connected().await;
        let mut live = dispatcher.on(OA_SPOT_EVENT);
        let mut closed = dispatcher.on_conn_closed();
        dispatcher.close("done").await;
        closed.recv().await;

        let mut late = dispatcher.on(OA_SPOT_EVENT);

        let (live, late) = tokio::join!(
            tokio::time::timeout(TIMEOUT, live.recv()),
            tokio::time::timeout(TIMEOUT, late.recv()),
        );
        assert!(matches!(live, Ok(None)));
        assert!(matches!(late, Ok(None)));
    }

    #[tokio::test]
    async fn test_subscription_count_returns_to_baseline() {
        let (dispatcher, _server) = connected().await;
        let baseline = dispatcher.subscription_count();

        let spots = dispatcher.on(OA_SPOT_EVENT);
        let executions = dispatcher.on(OA_EXECUTION_EVENT);
        assert_eq!(dispatcher.subscription_count(), baseline + 2);

        drop((spots, executions));
        assert_eq!(dispatcher.subscription_count(), baseline);
    }
}
