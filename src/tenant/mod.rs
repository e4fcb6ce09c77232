//! Tenant router
//!
//! Re-partitions the firehose per tenant. Event envelopes carry no tenant at
//! the frame level, so the router watches every catalog payload type through
//! one merged channel and keeps the payloads whose tenant scope names its
//! tenant. Keeping a single channel preserves the wire order across payload
//! types.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::catalog::payload_type::*;
use crate::dispatch::{Dispatcher, Event, Fanout, Registration, Subscription};

/// Firehose filtered down to one tenant
pub struct TenantRouter {
    tenant_id: i64,
    fanout: Fanout,
    task: JoinHandle<()>,
    _registrations: Vec<Registration>,
}

impl TenantRouter {
    /// Start routing `tenant_id` events
    ///
    /// Must be called within a tokio runtime.
    pub fn new(dispatcher: &Arc<Dispatcher>, tenant_id: i64) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let registrations = dispatcher
            .catalog()
            .payload_types()
            .map(|payload_type| dispatcher.subscribe_sink(payload_type, tx.clone()))
            .collect();
        drop(tx);

        let fanout = Fanout::new();
        let task = tokio::spawn(filter(tenant_id, rx, fanout.clone()));
        tracing::debug!("Routing events of tenant {}", tenant_id);

        Self {
            tenant_id,
            fanout,
            task,
            _registrations: registrations,
        }
    }

    pub fn tenant_id(&self) -> i64 {
        self.tenant_id
    }

    /// This tenant's stream of `payload_type`
    pub fn on(&self, payload_type: u32) -> Subscription {
        self.fanout.subscribe(payload_type)
    }

    pub fn subscription_count(&self) -> usize {
        self.fanout.len()
    }

    pub fn on_trailing_sl_change(&self) -> Subscription {
        self.on(OA_TRAILING_SL_CHANGED_EVENT)
    }

    pub fn on_symbol_change(&self) -> Subscription {
        self.on(OA_SYMBOL_CHANGED_EVENT)
    }

    pub fn on_trader_update(&self) -> Subscription {
        self.on(OA_TRADER_UPDATE_EVENT)
    }

    /// Order and position lifecycle
    pub fn on_execution(&self) -> Subscription {
        self.on(OA_EXECUTION_EVENT)
    }

    /// Quotes of subscribed symbols
    pub fn on_spot(&self) -> Subscription {
        self.on(OA_SPOT_EVENT)
    }

    pub fn on_order_error(&self) -> Subscription {
        self.on(OA_ORDER_ERROR_EVENT)
    }

    pub fn on_margin_changed(&self) -> Subscription {
        self.on(OA_MARGIN_CHANGED_EVENT)
    }

    /// Access token revoked for a set of tenants, this one among them
    pub fn on_token_invalidated(&self) -> Subscription {
        self.on(OA_ACCOUNTS_TOKEN_INVALIDATED_EVENT)
    }

    pub fn on_depth(&self) -> Subscription {
        self.on(OA_DEPTH_EVENT)
    }

    pub fn on_account_disconnect(&self) -> Subscription {
        self.on(OA_ACCOUNT_DISCONNECT_EVENT)
    }

    pub fn on_margin_call_update(&self) -> Subscription {
        self.on(OA_MARGIN_CALL_UPDATE_EVENT)
    }

    pub fn on_margin_call_trigger(&self) -> Subscription {
        self.on(OA_MARGIN_CALL_TRIGGER_EVENT)
    }
}

impl Drop for TenantRouter {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn filter(tenant_id: i64, mut events: mpsc::UnboundedReceiver<Event>, fanout: Fanout) {
    while let Some(event) = events.recv().await {
        let payload = match &event.payload {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Tenant {} skipped undecodable event: {}", tenant_id, e);
                continue;
            }
        };
        if !payload.tenant().contains(tenant_id) {
            continue;
        }

        if let Err(e) = fanout.publish(&event) {
            tracing::error!("Tenant {} router stopped: {}", tenant_id, e);
            break;
        }
    }

    fanout.close();
    tracing::debug!("Tenant {} router finished", tenant_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AccountsTokenInvalidatedEvent, Catalog, SpotEvent};
    use crate::network::SessionConfig;
    use crate::testing::{pipe, MockServer};
    use std::time::Duration;

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

    fn invalidated(ids: Vec<i64>) -> AccountsTokenInvalidatedEvent {
        AccountsTokenInvalidatedEvent {
            ctid_trader_account_ids: ids,
            reason: None,
        }
    }

    fn ids_of(event: Event) -> Vec<i64> {
        let payload = event.payload.unwrap();
        payload
            .downcast_ref::<AccountsTokenInvalidatedEvent>()
            .unwrap()
            .ctid_trader_account_ids
            .clone()
    }

    fn spot(tenant_id: i64, symbol_id: i64) -> SpotEvent {
        SpotEvent {
            ctid_trader_account_id: Some(tenant_id),
            symbol_id,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_plural_tenant_list_routes_to_members_only() {
        let (dispatcher, mut server) = connected().await;
        let member = TenantRouter::new(&dispatcher, 7);
        let outsider = TenantRouter::new(&dispatcher, 3);
        let mut member_events = member.on_token_invalidated();
        let mut outsider_events = outsider.on_token_invalidated();

        server
            .reply(OA_ACCOUNTS_TOKEN_INVALIDATED_EVENT, &invalidated(vec![5, 7, 9]), None)
            .await;
        server
            .reply(OA_ACCOUNTS_TOKEN_INVALIDATED_EVENT, &invalidated(vec![3]), None)
            .await;

        assert_eq!(ids_of(member_events.recv().await.unwrap()), vec![5, 7, 9]);
        // the first event the outsider sees is the one naming it
        assert_eq!(ids_of(outsider_events.recv().await.unwrap()), vec![3]);
    }

    #[tokio::test]
    async fn test_plural_tenant_list_is_scanned_to_the_end() {
        let (dispatcher, mut server) = connected().await;
        let router = TenantRouter::new(&dispatcher, 9);
        let mut events = router.on_token_invalidated();

        server
            .reply(OA_ACCOUNTS_TOKEN_INVALIDATED_EVENT, &invalidated(vec![5, 7, 9]), None)
            .await;

        assert_eq!(ids_of(events.recv().await.unwrap()), vec![5, 7, 9]);
    }

    #[tokio::test]
    async fn test_single_tenant_events_are_filtered() {
        let (dispatcher, mut server) = connected().await;
        let router = TenantRouter::new(&dispatcher, 7);
        let mut spots = router.on_spot();

        server.reply(OA_SPOT_EVENT, &spot(7, 1), None).await;
        server.reply(OA_SPOT_EVENT, &spot(8, 2), None).await;
        server.reply(OA_SPOT_EVENT, &spot(7, 3), None).await;
        server.close().await;

        let mut symbols = Vec::new();
        while let Some(event) = spots.recv().await {
            let payload = event.payload.unwrap();
            symbols.push(payload.downcast_ref::<SpotEvent>().unwrap().symbol_id);
        }
        assert_eq!(symbols, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_events_without_tenant_are_dropped() {
        let (dispatcher, mut server) = connected().await;
        let router = TenantRouter::new(&dispatcher, 7);
        let mut heartbeats = router.on(HEARTBEAT_EVENT);
        let mut spots = router.on_spot();

        server
            .reply(HEARTBEAT_EVENT, &crate::catalog::HeartbeatEvent {}, None)
            .await;
        server.reply(OA_SPOT_EVENT, &spot(7, 1), None).await;

        spots.recv().await.unwrap();
        assert!(heartbeats.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_router_created_after_close_ends() {
        let (dispatcher, _server) = connected().await;
        let mut closed = dispatcher.on_conn_closed();
        dispatcher.close("done").await;
        closed.recv().await;

        let router = TenantRouter::new(&dispatcher, 7);
        let mut spots = router.on_spot();

        let next = tokio::time::timeout(Duration::from_secs(5), spots.recv()).await;
        assert!(matches!(next, Ok(None)));
    }

    #[tokio::test]
    async fn test_drop_releases_firehose_registrations() {
        let (dispatcher, _server) = connected().await;
        let baseline = dispatcher.subscription_count();

        let router = TenantRouter::new(&dispatcher, 7);
        assert_eq!(
            dispatcher.subscription_count(),
            baseline + dispatcher.catalog().len()
        );

        drop(router);
        assert_eq!(dispatcher.subscription_count(), baseline);
    }
}
