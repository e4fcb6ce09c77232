//! Account facade - Calls scoped to one authorized trading account
//!
//! Order-affecting calls also fail on order-error events, which the server
//! sends with the request's id when it rejects an order.

use std::sync::Arc;
use std::time::Duration;

use crate::catalog::payload_type::*;
use crate::catalog::{
    AccountLogoutRes, AccountReq, AmendOrderReq, AmendPositionSltpReq, CancelOrderReq,
    ClosePositionReq, ExecutionEvent, NewOrderReq, ReconcileRes, SubscribeSpotsReq,
    SubscribeSpotsRes, SymbolsListReq, SymbolsListRes, Trader, TraderRes, UnsubscribeSpotsReq,
    UnsubscribeSpotsRes,
};
use crate::dispatch::{Dispatcher, RequestError, RequestResult, Subscription};
use crate::tenant::TenantRouter;

/// An authorized trading account
///
/// Events pushed for this account are available through [`Account::router`]
/// or [`Account::on`].
pub struct Account {
    id: i64,
    dispatcher: Arc<Dispatcher>,
    router: TenantRouter,
    request_timeout: Duration,
}

impl Account {
    pub(crate) fn new(dispatcher: &Arc<Dispatcher>, id: i64, request_timeout: Duration) -> Self {
        Self {
            id,
            dispatcher: dispatcher.clone(),
            router: TenantRouter::new(dispatcher, id),
            request_timeout,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn router(&self) -> &TenantRouter {
        &self.router
    }

    /// This account's stream of `payload_type`
    pub fn on(&self, payload_type: u32) -> Subscription {
        self.router.on(payload_type)
    }

    /// Balance and account settings
    pub async fn trader(&self) -> RequestResult<Trader> {
        let res = self
            .dispatcher
            .request::<TraderRes, _>(
                OA_TRADER_REQ,
                &AccountReq {
                    ctid_trader_account_id: self.id,
                },
                &[OA_TRADER_RES],
                DEFAULT_ERROR_TYPES,
                self.request_timeout,
            )
            .await?;

        res.trader.ok_or(RequestError::UnexpectedPayload(OA_TRADER_RES))
    }

    /// Start receiving spot events for the symbols
    pub async fn subscribe_spots(&self, symbol_ids: &[i64]) -> RequestResult<()> {
        let req = SubscribeSpotsReq {
            ctid_trader_account_id: self.id,
            symbol_id: symbol_ids.to_vec(),
            subscribe_to_spot_timestamp: Some(true),
        };

        self.dispatcher
            .request::<SubscribeSpotsRes, _>(
                OA_SUBSCRIBE_SPOTS_REQ,
                &req,
                &[OA_SUBSCRIBE_SPOTS_RES],
                DEFAULT_ERROR_TYPES,
                self.request_timeout,
            )
            .await?;
        tracing::debug!("Account {} subscribed to spots of {:?}", self.id, symbol_ids);
        Ok(())
    }

    pub async fn unsubscribe_spots(&self, symbol_ids: &[i64]) -> RequestResult<()> {
        let req = UnsubscribeSpotsReq {
            ctid_trader_account_id: self.id,
            symbol_id: symbol_ids.to_vec(),
        };

        self.dispatcher
            .request::<UnsubscribeSpotsRes, _>(
                OA_UNSUBSCRIBE_SPOTS_REQ,
                &req,
                &[OA_UNSUBSCRIBE_SPOTS_RES],
                DEFAULT_ERROR_TYPES,
                self.request_timeout,
            )
            .await?;
        Ok(())
    }

    /// Open positions and pending orders
    pub async fn reconcile(&self) -> RequestResult<ReconcileRes> {
        self.dispatcher
            .request::<ReconcileRes, _>(
                OA_RECONCILE_REQ,
                &AccountReq {
                    ctid_trader_account_id: self.id,
                },
                &[OA_RECONCILE_RES],
                DEFAULT_ERROR_TYPES,
                self.request_timeout,
            )
            .await
    }

    pub async fn symbols_list(&self, include_archived: bool) -> RequestResult<SymbolsListRes> {
        let req = SymbolsListReq {
            ctid_trader_account_id: self.id,
            include_archived_symbols: Some(include_archived),
        };

        self.dispatcher
            .request::<SymbolsListRes, _>(
                OA_SYMBOLS_LIST_REQ,
                &req,
                &[OA_SYMBOLS_LIST_RES],
                DEFAULT_ERROR_TYPES,
                self.request_timeout,
            )
            .await
    }

    /// Place an order
    ///
    /// `req` must not name an account; this account's id is filled in.
    pub async fn new_order(&self, mut req: NewOrderReq) -> RequestResult<ExecutionEvent> {
        self.claim(&mut req.ctid_trader_account_id)?;
        self.execute(OA_NEW_ORDER_REQ, &req).await
    }

    /// Cancel a pending order
    pub async fn cancel_order(&self, order_id: i64) -> RequestResult<ExecutionEvent> {
        let req = CancelOrderReq {
            ctid_trader_account_id: self.id,
            order_id,
        };
        self.execute(OA_CANCEL_ORDER_REQ, &req).await
    }

    /// Change a pending order; `req` must not name an account
    pub async fn amend_order(&self, mut req: AmendOrderReq) -> RequestResult<ExecutionEvent> {
        self.claim(&mut req.ctid_trader_account_id)?;
        self.execute(OA_AMEND_ORDER_REQ, &req).await
    }

    /// Change the stop loss and take profit of a position
    pub async fn amend_position_sltp(&self, mut req: AmendPositionSltpReq) -> RequestResult<ExecutionEvent> {
        self.claim(&mut req.ctid_trader_account_id)?;
        self.execute(OA_AMEND_POSITION_SLTP_REQ, &req).await
    }

    /// Close `volume` of a position, in cents of a unit
    pub async fn close_position(&self, position_id: i64, volume: i64) -> RequestResult<ExecutionEvent> {
        let req = ClosePositionReq {
            ctid_trader_account_id: self.id,
            position_id,
            volume,
        };
        self.execute(OA_CLOSE_POSITION_REQ, &req).await
    }

    pub async fn logout(&self) -> RequestResult<()> {
        self.dispatcher
            .request::<AccountLogoutRes, _>(
                OA_ACCOUNT_LOGOUT_REQ,
                &AccountReq {
                    ctid_trader_account_id: self.id,
                },
                &[OA_ACCOUNT_LOGOUT_RES],
                DEFAULT_ERROR_TYPES,
                self.request_timeout,
            )
            .await?;
        tracing::info!("Account {} logged out", self.id);
        Ok(())
    }

    fn claim(&self, account_id: &mut Option<i64>) -> RequestResult<()> {
        if account_id.is_some() {
            return Err(RequestError::Configuration("account id must be empty".to_string()));
        }
        *account_id = Some(self.id);
        Ok(())
    }

    async fn execute<M: prost::Message>(&self, payload_type: u32, req: &M) -> RequestResult<ExecutionEvent> {
        let event = self
            .dispatcher
            .request::<ExecutionEvent, _>(
                payload_type,
                req,
                &[OA_EXECUTION_EVENT],
                ORDER_ERROR_TYPES,
                self.request_timeout,
            )
            .await?;
        tracing::debug!(
            "Account {} {}: execution type {:?}",
            self.id,
            crate::catalog::payload_type::name(payload_type),
            event.execution_type
        );
        Ok(event)
    }
}
