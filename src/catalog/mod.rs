//! Message catalog
//!
//! Maps a numeric payload-type tag to the decoder of its payload shape. The
//! dispatcher consults it for every inbound frame; the tenant router walks it
//! to know which payload types to watch.

mod messages;
pub mod payload_type;

pub use messages::*;

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A decoded payload, shared between every subscriber that receives it
pub type Payload = Arc<dyn CatalogMessage>;

type DecodeFn = fn(&[u8]) -> Result<Payload, prost::DecodeError>;

/// Errors decoding a single inbound frame
///
/// None of these is fatal to the session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed envelope: {0}")]
    Envelope(String),

    #[error("Unknown payload type {0}")]
    UnknownPayloadType(u32),

    #[error("Malformed payload of type {payload_type}: {reason}")]
    Malformed { payload_type: u32, reason: String },
}

/// Structured server-side error reply
#[derive(Error, Debug, Clone, Default, PartialEq, Eq)]
#[error("{code} - desc: {}; accId: {}", .description.as_deref().unwrap_or("-"), display_id(.tenant_id))]
pub struct ProtocolError {
    /// Payload type of the error reply
    pub payload_type: u32,
    /// Vendor error code
    pub code: String,
    pub description: Option<String>,
    pub tenant_id: Option<i64>,
    pub order_id: Option<i64>,
    pub position_id: Option<i64>,
    /// End of a maintenance window, when the server is down for one
    pub maintenance_end_timestamp: Option<u64>,
}

fn display_id(id: &Option<i64>) -> String {
    id.map(|id| id.to_string()).unwrap_or_else(|| "nil".to_string())
}

impl ProtocolError {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Default::default()
        }
    }

    /// Build the error for an error-type reply
    ///
    /// Payloads that do not describe themselves as errors still produce one,
    /// carrying their debug representation.
    pub fn from_payload(payload_type: u32, payload: &dyn CatalogMessage) -> Self {
        let mut error = payload.protocol_error().unwrap_or_else(|| {
            let mut error = Self::new("UNKNOWN_ERROR");
            error.description = Some(format!("{:?}", payload));
            if let TenantScope::Single(id) = payload.tenant() {
                error.tenant_id = Some(id);
            }
            error
        });
        error.payload_type = payload_type;
        error
    }
}

/// Tenant ids a payload carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantScope<'a> {
    None,
    Single(i64),
    Many(&'a [i64]),
}

impl TenantScope<'_> {
    /// Whether the payload belongs to `tenant_id`; plural lists are scanned in full
    pub fn contains(&self, tenant_id: i64) -> bool {
        match self {
            TenantScope::None => false,
            TenantScope::Single(id) => *id == tenant_id,
            TenantScope::Many(ids) => ids.iter().any(|id| *id == tenant_id),
        }
    }
}

impl From<Option<i64>> for TenantScope<'_> {
    fn from(id: Option<i64>) -> Self {
        id.map_or(TenantScope::None, TenantScope::Single)
    }
}

/// Capabilities every catalog payload exposes to the dispatcher
pub trait CatalogMessage: Any + fmt::Debug + Send + Sync {
    /// Tenant ids embedded in the payload
    fn tenant(&self) -> TenantScope<'_> {
        TenantScope::None
    }

    /// Error details, for payloads that describe a server-side failure
    fn protocol_error(&self) -> Option<ProtocolError> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

impl dyn CatalogMessage {
    pub fn downcast_ref<T: CatalogMessage>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn is<T: CatalogMessage>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

fn decode_as<T>(bytes: &[u8]) -> Result<Payload, prost::DecodeError>
where
    T: CatalogMessage + prost::Message + Default,
{
    Ok(Arc::new(T::decode(bytes)?))
}

/// Table of payload-type tag to payload decoder
#[derive(Clone, Default)]
pub struct Catalog {
    decoders: BTreeMap<u32, DecodeFn>,
}

impl Catalog {
    /// An empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog of every reply and event of the Open API
    pub fn open_api() -> Self {
        use payload_type::*;

        let mut catalog = Self::new();
        catalog
            .register::<ErrorRes>(ERROR_RES)
            .register::<HeartbeatEvent>(HEARTBEAT_EVENT)
            .register::<ApplicationAuthRes>(OA_APPLICATION_AUTH_RES)
            .register::<AccountAuthRes>(OA_ACCOUNT_AUTH_RES)
            .register::<VersionRes>(OA_VERSION_RES)
            .register::<TrailingSlChangedEvent>(OA_TRAILING_SL_CHANGED_EVENT)
            .register::<AssetListRes>(OA_ASSET_LIST_RES)
            .register::<SymbolsListRes>(OA_SYMBOLS_LIST_RES)
            .register::<SymbolByIdRes>(OA_SYMBOL_BY_ID_RES)
            .register::<SymbolsForConversionRes>(OA_SYMBOLS_FOR_CONVERSION_RES)
            .register::<SymbolChangedEvent>(OA_SYMBOL_CHANGED_EVENT)
            .register::<TraderRes>(OA_TRADER_RES)
            .register::<TraderUpdatedEvent>(OA_TRADER_UPDATE_EVENT)
            .register::<ReconcileRes>(OA_RECONCILE_RES)
            .register::<ExecutionEvent>(OA_EXECUTION_EVENT)
            .register::<SubscribeSpotsRes>(OA_SUBSCRIBE_SPOTS_RES)
            .register::<UnsubscribeSpotsRes>(OA_UNSUBSCRIBE_SPOTS_RES)
            .register::<SpotEvent>(OA_SPOT_EVENT)
            .register::<OrderErrorEvent>(OA_ORDER_ERROR_EVENT)
            .register::<DealListRes>(OA_DEAL_LIST_RES)
            .register::<GetTrendbarsRes>(OA_GET_TRENDBARS_RES)
            .register::<ExpectedMarginRes>(OA_EXPECTED_MARGIN_RES)
            .register::<MarginChangedEvent>(OA_MARGIN_CHANGED_EVENT)
            .register::<OaErrorRes>(OA_ERROR_RES)
            .register::<CashFlowHistoryListRes>(OA_CASH_FLOW_HISTORY_LIST_RES)
            .register::<GetTickDataRes>(OA_GET_TICKDATA_RES)
            .register::<AccountsTokenInvalidatedEvent>(OA_ACCOUNTS_TOKEN_INVALIDATED_EVENT)
            .register::<ClientDisconnectEvent>(OA_CLIENT_DISCONNECT_EVENT)
            .register::<GetAccountListByAccessTokenRes>(OA_GET_ACCOUNTS_BY_ACCESS_TOKEN_RES)
            .register::<GetCtidProfileByTokenRes>(OA_GET_CTID_PROFILE_BY_TOKEN_RES)
            .register::<AssetClassListRes>(OA_ASSET_CLASS_LIST_RES)
            .register::<DepthEvent>(OA_DEPTH_EVENT)
            .register::<SubscribeDepthQuotesRes>(OA_SUBSCRIBE_DEPTH_QUOTES_RES)
            .register::<UnsubscribeDepthQuotesRes>(OA_UNSUBSCRIBE_DEPTH_QUOTES_RES)
            .register::<SymbolCategoryListRes>(OA_SYMBOL_CATEGORY_RES)
            .register::<AccountLogoutRes>(OA_ACCOUNT_LOGOUT_RES)
            .register::<AccountDisconnectEvent>(OA_ACCOUNT_DISCONNECT_EVENT)
            .register::<SubscribeLiveTrendbarRes>(OA_SUBSCRIBE_LIVE_TRENDBAR_RES)
            .register::<UnsubscribeLiveTrendbarRes>(OA_UNSUBSCRIBE_LIVE_TRENDBAR_RES)
            .register::<MarginCallListRes>(OA_MARGIN_CALL_LIST_RES)
            .register::<MarginCallUpdateRes>(OA_MARGIN_CALL_UPDATE_RES)
            .register::<MarginCallUpdateEvent>(OA_MARGIN_CALL_UPDATE_EVENT)
            .register::<MarginCallTriggerEvent>(OA_MARGIN_CALL_TRIGGER_EVENT)
            .register::<RefreshTokenRes>(OA_REFRESH_TOKEN_RES)
            .register::<OrderListRes>(OA_ORDER_LIST_RES)
            .register::<GetDynamicLeverageByIdRes>(OA_GET_DYNAMIC_LEVERAGE_RES)
            .register::<DealListByPositionIdRes>(OA_DEAL_LIST_BY_POSITION_ID_RES);
        catalog
    }

    /// Register the payload shape for a tag, replacing any previous entry
    pub fn register<T>(&mut self, payload_type: u32) -> &mut Self
    where
        T: CatalogMessage + prost::Message + Default,
    {
        self.decoders.insert(payload_type, decode_as::<T> as DecodeFn);
        self
    }

    pub fn contains(&self, payload_type: u32) -> bool {
        self.decoders.contains_key(&payload_type)
    }

    /// Every registered tag, in ascending order
    pub fn payload_types(&self) -> impl Iterator<Item = u32> + '_ {
        self.decoders.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Decode a payload body by its tag
    pub fn decode(&self, payload_type: u32, bytes: &[u8]) -> Result<Payload, DecodeError> {
        let decode = self
            .decoders
            .get(&payload_type)
            .ok_or(DecodeError::UnknownPayloadType(payload_type))?;

        decode(bytes).map_err(|e| DecodeError::Malformed {
            payload_type,
            reason: e.to_string(),
        })
    }
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog")
            .field("payload_types", &self.decoders.keys().collect::<Vec<_>>())
            .finish()
    }
}
