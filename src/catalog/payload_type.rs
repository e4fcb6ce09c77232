//! Numeric payload-type tags
//!
//! Common tags (< 100) are shared by every API on the endpoint; the Open API
//! tags live in the 2100 range.

pub const PROTO_MESSAGE: u32 = 5;
pub const ERROR_RES: u32 = 50;
pub const HEARTBEAT_EVENT: u32 = 51;

pub const OA_APPLICATION_AUTH_REQ: u32 = 2100;
pub const OA_APPLICATION_AUTH_RES: u32 = 2101;
pub const OA_ACCOUNT_AUTH_REQ: u32 = 2102;
pub const OA_ACCOUNT_AUTH_RES: u32 = 2103;
pub const OA_VERSION_REQ: u32 = 2104;
pub const OA_VERSION_RES: u32 = 2105;
pub const OA_NEW_ORDER_REQ: u32 = 2106;
pub const OA_TRAILING_SL_CHANGED_EVENT: u32 = 2107;
pub const OA_CANCEL_ORDER_REQ: u32 = 2108;
pub const OA_AMEND_ORDER_REQ: u32 = 2109;
pub const OA_AMEND_POSITION_SLTP_REQ: u32 = 2110;
pub const OA_CLOSE_POSITION_REQ: u32 = 2111;
pub const OA_ASSET_LIST_REQ: u32 = 2112;
pub const OA_ASSET_LIST_RES: u32 = 2113;
pub const OA_SYMBOLS_LIST_REQ: u32 = 2114;
pub const OA_SYMBOLS_LIST_RES: u32 = 2115;
pub const OA_SYMBOL_BY_ID_REQ: u32 = 2116;
pub const OA_SYMBOL_BY_ID_RES: u32 = 2117;
pub const OA_SYMBOLS_FOR_CONVERSION_REQ: u32 = 2118;
pub const OA_SYMBOLS_FOR_CONVERSION_RES: u32 = 2119;
pub const OA_SYMBOL_CHANGED_EVENT: u32 = 2120;
pub const OA_TRADER_REQ: u32 = 2121;
pub const OA_TRADER_RES: u32 = 2122;
pub const OA_TRADER_UPDATE_EVENT: u32 = 2123;
pub const OA_RECONCILE_REQ: u32 = 2124;
pub const OA_RECONCILE_RES: u32 = 2125;
pub const OA_EXECUTION_EVENT: u32 = 2126;
pub const OA_SUBSCRIBE_SPOTS_REQ: u32 = 2127;
pub const OA_SUBSCRIBE_SPOTS_RES: u32 = 2128;
pub const OA_UNSUBSCRIBE_SPOTS_REQ: u32 = 2129;
pub const OA_UNSUBSCRIBE_SPOTS_RES: u32 = 2130;
pub const OA_SPOT_EVENT: u32 = 2131;
pub const OA_ORDER_ERROR_EVENT: u32 = 2132;
pub const OA_DEAL_LIST_REQ: u32 = 2133;
pub const OA_DEAL_LIST_RES: u32 = 2134;
pub const OA_SUBSCRIBE_LIVE_TRENDBAR_REQ: u32 = 2135;
pub const OA_UNSUBSCRIBE_LIVE_TRENDBAR_REQ: u32 = 2136;
pub const OA_GET_TRENDBARS_REQ: u32 = 2137;
pub const OA_GET_TRENDBARS_RES: u32 = 2138;
pub const OA_EXPECTED_MARGIN_REQ: u32 = 2139;
pub const OA_EXPECTED_MARGIN_RES: u32 = 2140;
pub const OA_MARGIN_CHANGED_EVENT: u32 = 2141;
pub const OA_ERROR_RES: u32 = 2142;
pub const OA_CASH_FLOW_HISTORY_LIST_REQ: u32 = 2143;
pub const OA_CASH_FLOW_HISTORY_LIST_RES: u32 = 2144;
pub const OA_GET_TICKDATA_REQ: u32 = 2145;
pub const OA_GET_TICKDATA_RES: u32 = 2146;
pub const OA_ACCOUNTS_TOKEN_INVALIDATED_EVENT: u32 = 2147;
pub const OA_CLIENT_DISCONNECT_EVENT: u32 = 2148;
pub const OA_GET_ACCOUNTS_BY_ACCESS_TOKEN_REQ: u32 = 2149;
pub const OA_GET_ACCOUNTS_BY_ACCESS_TOKEN_RES: u32 = 2150;
pub const OA_GET_CTID_PROFILE_BY_TOKEN_REQ: u32 = 2151;
pub const OA_GET_CTID_PROFILE_BY_TOKEN_RES: u32 = 2152;
pub const OA_ASSET_CLASS_LIST_REQ: u32 = 2153;
pub const OA_ASSET_CLASS_LIST_RES: u32 = 2154;
pub const OA_DEPTH_EVENT: u32 = 2155;
pub const OA_SUBSCRIBE_DEPTH_QUOTES_REQ: u32 = 2156;
pub const OA_SUBSCRIBE_DEPTH_QUOTES_RES: u32 = 2157;
pub const OA_UNSUBSCRIBE_DEPTH_QUOTES_REQ: u32 = 2158;
pub const OA_UNSUBSCRIBE_DEPTH_QUOTES_RES: u32 = 2159;
pub const OA_SYMBOL_CATEGORY_REQ: u32 = 2160;
pub const OA_SYMBOL_CATEGORY_RES: u32 = 2161;
pub const OA_ACCOUNT_LOGOUT_REQ: u32 = 2162;
pub const OA_ACCOUNT_LOGOUT_RES: u32 = 2163;
pub const OA_ACCOUNT_DISCONNECT_EVENT: u32 = 2164;
pub const OA_SUBSCRIBE_LIVE_TRENDBAR_RES: u32 = 2165;
pub const OA_UNSUBSCRIBE_LIVE_TRENDBAR_RES: u32 = 2166;
pub const OA_MARGIN_CALL_LIST_REQ: u32 = 2167;
pub const OA_MARGIN_CALL_LIST_RES: u32 = 2168;
pub const OA_MARGIN_CALL_UPDATE_REQ: u32 = 2169;
pub const OA_MARGIN_CALL_UPDATE_RES: u32 = 2170;
pub const OA_MARGIN_CALL_UPDATE_EVENT: u32 = 2171;
pub const OA_MARGIN_CALL_TRIGGER_EVENT: u32 = 2172;
pub const OA_REFRESH_TOKEN_REQ: u32 = 2173;
pub const OA_REFRESH_TOKEN_RES: u32 = 2174;
pub const OA_ORDER_LIST_REQ: u32 = 2175;
pub const OA_ORDER_LIST_RES: u32 = 2176;
pub const OA_GET_DYNAMIC_LEVERAGE_REQ: u32 = 2177;
pub const OA_GET_DYNAMIC_LEVERAGE_RES: u32 = 2178;
pub const OA_DEAL_LIST_BY_POSITION_ID_REQ: u32 = 2179;
pub const OA_DEAL_LIST_BY_POSITION_ID_RES: u32 = 2180;

/// Default error replies watched by every request
pub const DEFAULT_ERROR_TYPES: &[u32] = &[OA_ERROR_RES];

/// Error replies watched by order-affecting requests
pub const ORDER_ERROR_TYPES: &[u32] = &[OA_ERROR_RES, OA_ORDER_ERROR_EVENT];

/// Human-readable name of a tag, for logs
pub fn name(payload_type: u32) -> &'static str {
    match payload_type {
        PROTO_MESSAGE => "PROTO_MESSAGE",
        ERROR_RES => "ERROR_RES",
        HEARTBEAT_EVENT => "HEARTBEAT_EVENT",
        OA_APPLICATION_AUTH_RES => "APPLICATION_AUTH_RES",
        OA_ACCOUNT_AUTH_RES => "ACCOUNT_AUTH_RES",
        OA_VERSION_RES => "VERSION_RES",
        OA_TRAILING_SL_CHANGED_EVENT => "TRAILING_SL_CHANGED_EVENT",
        OA_SYMBOL_CHANGED_EVENT => "SYMBOL_CHANGED_EVENT",
        OA_SYMBOLS_LIST_RES => "SYMBOLS_LIST_RES",
        OA_TRADER_RES => "TRADER_RES",
        OA_RECONCILE_RES => "RECONCILE_RES",
        OA_TRADER_UPDATE_EVENT => "TRADER_UPDATE_EVENT",
        OA_EXECUTION_EVENT => "EXECUTION_EVENT",
        OA_SUBSCRIBE_SPOTS_RES => "SUBSCRIBE_SPOTS_RES",
        OA_UNSUBSCRIBE_SPOTS_RES => "UNSUBSCRIBE_SPOTS_RES",
        OA_SPOT_EVENT => "SPOT_EVENT",
        OA_ORDER_ERROR_EVENT => "ORDER_ERROR_EVENT",
        OA_MARGIN_CHANGED_EVENT => "MARGIN_CHANGED_EVENT",
        OA_ERROR_RES => "OA_ERROR_RES",
        OA_ACCOUNTS_TOKEN_INVALIDATED_EVENT => "ACCOUNTS_TOKEN_INVALIDATED_EVENT",
        OA_CLIENT_DISCONNECT_EVENT => "CLIENT_DISCONNECT_EVENT",
        OA_GET_ACCOUNTS_BY_ACCESS_TOKEN_RES => "GET_ACCOUNTS_BY_ACCESS_TOKEN_RES",
        OA_DEPTH_EVENT => "DEPTH_EVENT",
        OA_ACCOUNT_LOGOUT_RES => "ACCOUNT_LOGOUT_RES",
        OA_ACCOUNT_DISCONNECT_EVENT => "ACCOUNT_DISCONNECT_EVENT",
        OA_MARGIN_CALL_UPDATE_EVENT => "MARGIN_CALL_UPDATE_EVENT",
        OA_MARGIN_CALL_TRIGGER_EVENT => "MARGIN_CALL_TRIGGER_EVENT",
        OA_REFRESH_TOKEN_RES => "REFRESH_TOKEN_RES",
        _ => "OTHER",
    }
}
