//! Payload shapes of the Open API catalog
//!
//! These mirror the upstream proto2 schema for the fields this crate reads or
//! writes. Fields not declared here are skipped on decode, so newer server
//! versions keep parsing.

use std::any::Any;

use super::{CatalogMessage, ProtocolError, TenantScope};

macro_rules! catalog_message {
    ($ty:ty) => {
        impl CatalogMessage for $ty {
            fn as_any(&self) -> &dyn Any {
                self
            }
        }
    };
    ($ty:ty, tenant = $field:ident) => {
        impl CatalogMessage for $ty {
            fn tenant(&self) -> TenantScope<'_> {
                TenantScope::from(self.$field)
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }
    };
    ($ty:ty, tenants = $field:ident) => {
        impl CatalogMessage for $ty {
            fn tenant(&self) -> TenantScope<'_> {
                TenantScope::Many(&self.$field)
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }
    };
}

/// Declares replies whose only field of interest is the owning account.
macro_rules! account_reply {
    ($($(#[$meta:meta])* $name:ident),+ $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Clone, PartialEq, prost::Message)]
            pub struct $name {
                #[prost(int64, optional, tag = "2")]
                pub ctid_trader_account_id: Option<i64>,
            }

            catalog_message!($name, tenant = ctid_trader_account_id);
        )+
    };
}

// ============================================================================
// Common messages
// ============================================================================

/// Generic error reply shared by every API on the endpoint
#[derive(Clone, PartialEq, prost::Message)]
pub struct ErrorRes {
    #[prost(string, required, tag = "2")]
    pub error_code: String,
    #[prost(string, optional, tag = "3")]
    pub description: Option<String>,
    #[prost(uint64, optional, tag = "4")]
    pub maintenance_end_timestamp: Option<u64>,
}

impl CatalogMessage for ErrorRes {
    fn protocol_error(&self) -> Option<ProtocolError> {
        let mut error = ProtocolError::new(&self.error_code);
        error.description = self.description.clone();
        error.maintenance_end_timestamp = self.maintenance_end_timestamp;
        Some(error)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Keep-alive, sent by both sides without a request id
#[derive(Clone, PartialEq, prost::Message)]
pub struct HeartbeatEvent {}

catalog_message!(HeartbeatEvent);

// ============================================================================
// Application and account authorization
// ============================================================================

#[derive(Clone, PartialEq, prost::Message)]
pub struct ApplicationAuthReq {
    #[prost(string, required, tag = "2")]
    pub client_id: String,
    #[prost(string, required, tag = "3")]
    pub client_secret: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ApplicationAuthRes {}

catalog_message!(ApplicationAuthRes);

#[derive(Clone, PartialEq, prost::Message)]
pub struct AccountAuthReq {
    #[prost(int64, required, tag = "2")]
    pub ctid_trader_account_id: i64,
    #[prost(string, required, tag = "3")]
    pub access_token: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VersionReq {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VersionRes {
    #[prost(string, required, tag = "2")]
    pub version: String,
}

catalog_message!(VersionRes);

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetAccountListByAccessTokenReq {
    #[prost(string, required, tag = "2")]
    pub access_token: String,
}

/// Trading account bound to an access token
#[derive(Clone, PartialEq, prost::Message)]
pub struct CtidTraderAccount {
    #[prost(uint64, required, tag = "1")]
    pub ctid_trader_account_id: u64,
    #[prost(bool, optional, tag = "2")]
    pub is_live: Option<bool>,
    #[prost(int64, optional, tag = "3")]
    pub trader_login: Option<i64>,
    #[prost(string, optional, tag = "6")]
    pub broker_title_short: Option<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetAccountListByAccessTokenRes {
    #[prost(string, required, tag = "2")]
    pub access_token: String,
    #[prost(int32, optional, tag = "3")]
    pub permission_scope: Option<i32>,
    #[prost(message, repeated, tag = "4")]
    pub ctid_trader_account: Vec<CtidTraderAccount>,
}

catalog_message!(GetAccountListByAccessTokenRes);

#[derive(Clone, PartialEq, prost::Message)]
pub struct RefreshTokenReq {
    #[prost(string, required, tag = "2")]
    pub refresh_token: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RefreshTokenRes {
    #[prost(string, required, tag = "2")]
    pub access_token: String,
    #[prost(string, required, tag = "3")]
    pub token_type: String,
    #[prost(int64, required, tag = "4")]
    pub expires_in: i64,
    #[prost(string, required, tag = "5")]
    pub refresh_token: String,
}

catalog_message!(RefreshTokenRes);

#[derive(Clone, PartialEq, prost::Message)]
pub struct CtidProfile {
    #[prost(int64, required, tag = "1")]
    pub user_id: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetCtidProfileByTokenRes {
    #[prost(message, optional, tag = "2")]
    pub profile: Option<CtidProfile>,
}

catalog_message!(GetCtidProfileByTokenRes);

/// Request shape shared by calls that only name the account
#[derive(Clone, PartialEq, prost::Message)]
pub struct AccountReq {
    #[prost(int64, required, tag = "2")]
    pub ctid_trader_account_id: i64,
}

// ============================================================================
// Account-scoped replies
// ============================================================================

account_reply! {
    AccountAuthRes,
    AccountLogoutRes,
    AccountDisconnectEvent,
    SubscribeSpotsRes,
    UnsubscribeSpotsRes,
    AssetListRes,
    AssetClassListRes,
    SymbolByIdRes,
    SymbolsForConversionRes,
    SymbolCategoryListRes,
    DealListRes,
    DealListByPositionIdRes,
    OrderListRes,
    GetTrendbarsRes,
    GetTickDataRes,
    ExpectedMarginRes,
    CashFlowHistoryListRes,
    SubscribeLiveTrendbarRes,
    UnsubscribeLiveTrendbarRes,
    SubscribeDepthQuotesRes,
    UnsubscribeDepthQuotesRes,
    MarginCallListRes,
    MarginCallUpdateRes,
    GetDynamicLeverageByIdRes,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SubscribeSpotsReq {
    #[prost(int64, required, tag = "2")]
    pub ctid_trader_account_id: i64,
    #[prost(int64, repeated, packed = "false", tag = "3")]
    pub symbol_id: Vec<i64>,
    #[prost(bool, optional, tag = "4")]
    pub subscribe_to_spot_timestamp: Option<bool>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct UnsubscribeSpotsReq {
    #[prost(int64, required, tag = "2")]
    pub ctid_trader_account_id: i64,
    #[prost(int64, repeated, packed = "false", tag = "3")]
    pub symbol_id: Vec<i64>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CancelOrderReq {
    #[prost(int64, required, tag = "2")]
    pub ctid_trader_account_id: i64,
    #[prost(int64, required, tag = "3")]
    pub order_id: i64,
}

/// Account balance snapshot
#[derive(Clone, PartialEq, prost::Message)]
pub struct Trader {
    #[prost(int64, required, tag = "1")]
    pub ctid_trader_account_id: i64,
    #[prost(int64, required, tag = "2")]
    pub balance: i64,
    #[prost(uint32, optional, tag = "25")]
    pub money_digits: Option<u32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TraderRes {
    #[prost(int64, required, tag = "2")]
    pub ctid_trader_account_id: i64,
    #[prost(message, optional, tag = "3")]
    pub trader: Option<Trader>,
}

impl CatalogMessage for TraderRes {
    fn tenant(&self) -> TenantScope<'_> {
        TenantScope::Single(self.ctid_trader_account_id)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TraderUpdatedEvent {
    #[prost(int64, optional, tag = "2")]
    pub ctid_trader_account_id: Option<i64>,
    #[prost(message, optional, tag = "3")]
    pub trader: Option<Trader>,
}

catalog_message!(TraderUpdatedEvent, tenant = ctid_trader_account_id);

// ============================================================================
// Trading events
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum OrderType {
    Market = 1,
    Limit = 2,
    Stop = 3,
    StopLossTakeProfit = 4,
    MarketRange = 5,
    StopLimit = 6,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum TradeSide {
    Buy = 1,
    Sell = 2,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Order {
    #[prost(int64, required, tag = "1")]
    pub order_id: i64,
    #[prost(enumeration = "OrderType", optional, tag = "3")]
    pub order_type: Option<i32>,
    #[prost(int32, optional, tag = "4")]
    pub order_status: Option<i32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Position {
    #[prost(int64, required, tag = "1")]
    pub position_id: i64,
    #[prost(int32, optional, tag = "3")]
    pub position_status: Option<i32>,
    #[prost(double, optional, tag = "5")]
    pub price: Option<f64>,
    #[prost(double, optional, tag = "6")]
    pub stop_loss: Option<f64>,
    #[prost(double, optional, tag = "7")]
    pub take_profit: Option<f64>,
}

/// Open a new order
///
/// The account id is filled in by the account sending it.
#[derive(Clone, PartialEq, prost::Message)]
pub struct NewOrderReq {
    #[prost(int64, optional, tag = "2")]
    pub ctid_trader_account_id: Option<i64>,
    #[prost(int64, required, tag = "3")]
    pub symbol_id: i64,
    #[prost(enumeration = "OrderType", required, tag = "4")]
    pub order_type: i32,
    #[prost(enumeration = "TradeSide", required, tag = "5")]
    pub trade_side: i32,
    /// In cents of a unit
    #[prost(int64, required, tag = "6")]
    pub volume: i64,
    #[prost(double, optional, tag = "7")]
    pub limit_price: Option<f64>,
    #[prost(double, optional, tag = "8")]
    pub stop_price: Option<f64>,
    #[prost(int64, optional, tag = "10")]
    pub expiration_timestamp: Option<i64>,
    #[prost(double, optional, tag = "11")]
    pub stop_loss: Option<f64>,
    #[prost(double, optional, tag = "12")]
    pub take_profit: Option<f64>,
    #[prost(string, optional, tag = "13")]
    pub comment: Option<String>,
    #[prost(string, optional, tag = "16")]
    pub label: Option<String>,
    #[prost(int64, optional, tag = "17")]
    pub position_id: Option<i64>,
    #[prost(string, optional, tag = "18")]
    pub client_order_id: Option<String>,
}

/// Change a pending order; unset fields keep their value
#[derive(Clone, PartialEq, prost::Message)]
pub struct AmendOrderReq {
    #[prost(int64, optional, tag = "2")]
    pub ctid_trader_account_id: Option<i64>,
    #[prost(int64, required, tag = "3")]
    pub order_id: i64,
    #[prost(int64, optional, tag = "4")]
    pub volume: Option<i64>,
    #[prost(double, optional, tag = "5")]
    pub limit_price: Option<f64>,
    #[prost(double, optional, tag = "6")]
    pub stop_price: Option<f64>,
    #[prost(int64, optional, tag = "7")]
    pub expiration_timestamp: Option<i64>,
    #[prost(double, optional, tag = "8")]
    pub stop_loss: Option<f64>,
    #[prost(double, optional, tag = "9")]
    pub take_profit: Option<f64>,
}

/// Change the protection levels of an open position
#[derive(Clone, PartialEq, prost::Message)]
pub struct AmendPositionSltpReq {
    #[prost(int64, optional, tag = "2")]
    pub ctid_trader_account_id: Option<i64>,
    #[prost(int64, required, tag = "3")]
    pub position_id: i64,
    #[prost(double, optional, tag = "4")]
    pub stop_loss: Option<f64>,
    #[prost(double, optional, tag = "5")]
    pub take_profit: Option<f64>,
    #[prost(bool, optional, tag = "7")]
    pub guaranteed_stop_loss: Option<bool>,
    #[prost(bool, optional, tag = "8")]
    pub trailing_stop_loss: Option<bool>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ClosePositionReq {
    #[prost(int64, required, tag = "2")]
    pub ctid_trader_account_id: i64,
    #[prost(int64, required, tag = "3")]
    pub position_id: i64,
    #[prost(int64, required, tag = "4")]
    pub volume: i64,
}

/// Open positions and pending orders of an account
#[derive(Clone, PartialEq, prost::Message)]
pub struct ReconcileRes {
    #[prost(int64, optional, tag = "2")]
    pub ctid_trader_account_id: Option<i64>,
    #[prost(message, repeated, tag = "3")]
    pub position: Vec<Position>,
    #[prost(message, repeated, tag = "4")]
    pub order: Vec<Order>,
}

catalog_message!(ReconcileRes, tenant = ctid_trader_account_id);

#[derive(Clone, PartialEq, prost::Message)]
pub struct SymbolsListReq {
    #[prost(int64, required, tag = "2")]
    pub ctid_trader_account_id: i64,
    #[prost(bool, optional, tag = "3")]
    pub include_archived_symbols: Option<bool>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LightSymbol {
    #[prost(int64, required, tag = "1")]
    pub symbol_id: i64,
    #[prost(string, optional, tag = "2")]
    pub symbol_name: Option<String>,
    #[prost(bool, optional, tag = "3")]
    pub enabled: Option<bool>,
    #[prost(int64, optional, tag = "4")]
    pub base_asset_id: Option<i64>,
    #[prost(int64, optional, tag = "5")]
    pub quote_asset_id: Option<i64>,
}

/// Symbols tradable by an account
#[derive(Clone, PartialEq, prost::Message)]
pub struct SymbolsListRes {
    #[prost(int64, optional, tag = "2")]
    pub ctid_trader_account_id: Option<i64>,
    #[prost(message, repeated, tag = "3")]
    pub symbol: Vec<LightSymbol>,
}

catalog_message!(SymbolsListRes, tenant = ctid_trader_account_id);

#[derive(Clone, PartialEq, prost::Message)]
pub struct Deal {
    #[prost(int64, required, tag = "1")]
    pub deal_id: i64,
}

/// Order, position and deal lifecycle update
#[derive(Clone, PartialEq, prost::Message)]
pub struct ExecutionEvent {
    #[prost(int64, optional, tag = "2")]
    pub ctid_trader_account_id: Option<i64>,
    #[prost(int32, optional, tag = "3")]
    pub execution_type: Option<i32>,
    #[prost(message, optional, tag = "4")]
    pub position: Option<Position>,
    #[prost(message, optional, tag = "5")]
    pub order: Option<Order>,
    #[prost(message, optional, tag = "6")]
    pub deal: Option<Deal>,
    #[prost(string, optional, tag = "9")]
    pub error_code: Option<String>,
    #[prost(bool, optional, tag = "10")]
    pub is_server_event: Option<bool>,
}

catalog_message!(ExecutionEvent, tenant = ctid_trader_account_id);

/// Rejected order operation
#[derive(Clone, PartialEq, prost::Message)]
pub struct OrderErrorEvent {
    #[prost(string, required, tag = "2")]
    pub error_code: String,
    #[prost(int64, optional, tag = "3")]
    pub order_id: Option<i64>,
    #[prost(int64, optional, tag = "5")]
    pub ctid_trader_account_id: Option<i64>,
    #[prost(int64, optional, tag = "6")]
    pub position_id: Option<i64>,
    #[prost(string, optional, tag = "7")]
    pub description: Option<String>,
}

impl CatalogMessage for OrderErrorEvent {
    fn tenant(&self) -> TenantScope<'_> {
        TenantScope::from(self.ctid_trader_account_id)
    }

    fn protocol_error(&self) -> Option<ProtocolError> {
        let mut error = ProtocolError::new(&self.error_code);
        error.description = self.description.clone();
        error.tenant_id = self.ctid_trader_account_id;
        error.order_id = self.order_id;
        error.position_id = self.position_id;
        Some(error)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Open API error reply
#[derive(Clone, PartialEq, prost::Message)]
pub struct OaErrorRes {
    #[prost(int64, optional, tag = "2")]
    pub ctid_trader_account_id: Option<i64>,
    #[prost(string, required, tag = "3")]
    pub error_code: String,
    #[prost(string, optional, tag = "4")]
    pub description: Option<String>,
    #[prost(int64, optional, tag = "5")]
    pub maintenance_end_timestamp: Option<i64>,
}

impl CatalogMessage for OaErrorRes {
    fn tenant(&self) -> TenantScope<'_> {
        TenantScope::from(self.ctid_trader_account_id)
    }

    fn protocol_error(&self) -> Option<ProtocolError> {
        let mut error = ProtocolError::new(&self.error_code);
        error.description = self.description.clone();
        error.tenant_id = self.ctid_trader_account_id;
        error.maintenance_end_timestamp = self
            .maintenance_end_timestamp
            .and_then(|ts| u64::try_from(ts).ok());
        Some(error)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TrailingSlChangedEvent {
    #[prost(int64, optional, tag = "2")]
    pub ctid_trader_account_id: Option<i64>,
    #[prost(int64, required, tag = "3")]
    pub position_id: i64,
    #[prost(int64, required, tag = "4")]
    pub order_id: i64,
    #[prost(double, required, tag = "5")]
    pub stop_price: f64,
}

catalog_message!(TrailingSlChangedEvent, tenant = ctid_trader_account_id);

#[derive(Clone, PartialEq, prost::Message)]
pub struct SymbolChangedEvent {
    #[prost(int64, optional, tag = "2")]
    pub ctid_trader_account_id: Option<i64>,
    #[prost(int64, repeated, packed = "false", tag = "3")]
    pub symbol_id: Vec<i64>,
}

catalog_message!(SymbolChangedEvent, tenant = ctid_trader_account_id);

/// Bid/ask update for a subscribed symbol
#[derive(Clone, PartialEq, prost::Message)]
pub struct SpotEvent {
    #[prost(int64, optional, tag = "2")]
    pub ctid_trader_account_id: Option<i64>,
    #[prost(int64, required, tag = "3")]
    pub symbol_id: i64,
    #[prost(uint64, optional, tag = "4")]
    pub bid: Option<u64>,
    #[prost(uint64, optional, tag = "5")]
    pub ask: Option<u64>,
    #[prost(int64, optional, tag = "8")]
    pub timestamp: Option<i64>,
}

catalog_message!(SpotEvent, tenant = ctid_trader_account_id);

#[derive(Clone, PartialEq, prost::Message)]
pub struct MarginChangedEvent {
    #[prost(int64, optional, tag = "2")]
    pub ctid_trader_account_id: Option<i64>,
    #[prost(uint64, required, tag = "3")]
    pub position_id: u64,
    #[prost(uint64, required, tag = "4")]
    pub used_margin: u64,
}

catalog_message!(MarginChangedEvent, tenant = ctid_trader_account_id);

/// Broadcast naming every account whose token stopped being valid
#[derive(Clone, PartialEq, prost::Message)]
pub struct AccountsTokenInvalidatedEvent {
    #[prost(int64, repeated, packed = "false", tag = "2")]
    pub ctid_trader_account_ids: Vec<i64>,
    #[prost(string, optional, tag = "3")]
    pub reason: Option<String>,
}

catalog_message!(AccountsTokenInvalidatedEvent, tenants = ctid_trader_account_ids);

#[derive(Clone, PartialEq, prost::Message)]
pub struct ClientDisconnectEvent {
    #[prost(string, optional, tag = "2")]
    pub reason: Option<String>,
}

catalog_message!(ClientDisconnectEvent);

#[derive(Clone, PartialEq, prost::Message)]
pub struct DepthQuote {
    #[prost(uint64, required, tag = "1")]
    pub id: u64,
    #[prost(uint64, required, tag = "3")]
    pub size: u64,
    #[prost(uint64, optional, tag = "4")]
    pub bid: Option<u64>,
    #[prost(uint64, optional, tag = "5")]
    pub ask: Option<u64>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DepthEvent {
    #[prost(int64, optional, tag = "2")]
    pub ctid_trader_account_id: Option<i64>,
    #[prost(uint64, required, tag = "3")]
    pub symbol_id: u64,
    #[prost(message, repeated, tag = "4")]
    pub new_quotes: Vec<DepthQuote>,
    #[prost(uint64, repeated, tag = "5")]
    pub deleted_quotes: Vec<u64>,
}

catalog_message!(DepthEvent, tenant = ctid_trader_account_id);

#[derive(Clone, PartialEq, prost::Message)]
pub struct MarginCall {
    #[prost(int32, required, tag = "1")]
    pub margin_call_type: i32,
    #[prost(double, required, tag = "2")]
    pub margin_level_threshold: f64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MarginCallUpdateEvent {
    #[prost(int64, optional, tag = "2")]
    pub ctid_trader_account_id: Option<i64>,
    #[prost(message, optional, tag = "3")]
    pub margin_call: Option<MarginCall>,
}

catalog_message!(MarginCallUpdateEvent, tenant = ctid_trader_account_id);

#[derive(Clone, PartialEq, prost::Message)]
pub struct MarginCallTriggerEvent {
    #[prost(int64, optional, tag = "2")]
    pub ctid_trader_account_id: Option<i64>,
    #[prost(message, optional, tag = "3")]
    pub margin_call: Option<MarginCall>,
}

catalog_message!(MarginCallTriggerEvent, tenant = ctid_trader_account_id);
