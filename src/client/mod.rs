//! Client facade - Typed calls over the dispatcher
//!
//! [`Client`] covers the application-level calls; [`Account`] covers the
//! calls scoped to one authorized trading account.

mod account;

pub use account::Account;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::catalog::payload_type::*;
use crate::catalog::{
    AccountAuthReq, AccountAuthRes, ApplicationAuthReq, ApplicationAuthRes, CtidTraderAccount,
    GetAccountListByAccessTokenReq, GetAccountListByAccessTokenRes, RefreshTokenReq,
    RefreshTokenRes, VersionReq, VersionRes,
};
use crate::dispatch::{Dispatcher, RequestResult, Subscription};
use crate::network::{ClosedListener, SessionResult};

/// Default time to wait for a reply
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Application and user credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    /// Application client id
    #[serde(default)]
    pub client_id: String,
    /// Application client secret
    #[serde(default)]
    pub client_secret: String,
    /// OAuth access token of the user
    #[serde(default)]
    pub access_token: String,
    /// OAuth refresh token of the user
    #[serde(default)]
    pub refresh_token: String,
}

/// Application-level client
pub struct Client {
    dispatcher: Arc<Dispatcher>,
    credentials: Credentials,
    request_timeout: Duration,
}

impl Client {
    pub fn new(dispatcher: Arc<Dispatcher>, credentials: Credentials) -> Self {
        Self {
            dispatcher,
            credentials,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub async fn connect(&self) -> SessionResult<()> {
        self.dispatcher.connect().await
    }

    pub async fn close(&self) -> bool {
        self.dispatcher.close("client closed").await
    }

    pub fn on_conn_closed(&self) -> ClosedListener {
        self.dispatcher.on_conn_closed()
    }

    /// Every unsolicited frame of `payload_type`, whatever its tenant
    pub fn on(&self, payload_type: u32) -> Subscription {
        self.dispatcher.on(payload_type)
    }

    /// Authorize the application on this session
    pub async fn application_auth(&self) -> RequestResult<()> {
        let req = ApplicationAuthReq {
            client_id: self.credentials.client_id.clone(),
            client_secret: self.credentials.client_secret.clone(),
        };

        self.dispatcher
            .request::<ApplicationAuthRes, _>(
                OA_APPLICATION_AUTH_REQ,
                &req,
                &[OA_APPLICATION_AUTH_RES],
                DEFAULT_ERROR_TYPES,
                self.request_timeout,
            )
            .await?;
        tracing::info!("Application authorized");
        Ok(())
    }

    /// Server version string
    pub async fn version(&self) -> RequestResult<String> {
        let res = self
            .dispatcher
            .request::<VersionRes, _>(
                OA_VERSION_REQ,
                &VersionReq {},
                &[OA_VERSION_RES],
                DEFAULT_ERROR_TYPES,
                self.request_timeout,
            )
            .await?;
        Ok(res.version)
    }

    /// Trading accounts the access token grants access to
    pub async fn account_list_by_access_token(&self) -> RequestResult<Vec<CtidTraderAccount>> {
        let req = GetAccountListByAccessTokenReq {
            access_token: self.credentials.access_token.clone(),
        };

        let res = self
            .dispatcher
            .request::<GetAccountListByAccessTokenRes, _>(
                OA_GET_ACCOUNTS_BY_ACCESS_TOKEN_REQ,
                &req,
                &[OA_GET_ACCOUNTS_BY_ACCESS_TOKEN_RES],
                DEFAULT_ERROR_TYPES,
                self.request_timeout,
            )
            .await?;
        Ok(res.ctid_trader_account)
    }

    /// Exchange the refresh token for a new token pair
    ///
    /// The new tokens replace the stored credentials.
    pub async fn refresh_token(&mut self) -> RequestResult<RefreshTokenRes> {
        let req = RefreshTokenReq {
            refresh_token: self.credentials.refresh_token.clone(),
        };

        let res = self
            .dispatcher
            .request::<RefreshTokenRes, _>(
                OA_REFRESH_TOKEN_REQ,
                &req,
                &[OA_REFRESH_TOKEN_RES],
                DEFAULT_ERROR_TYPES,
                self.request_timeout,
            )
            .await?;

        self.credentials.access_token = res.access_token.clone();
        self.credentials.refresh_token = res.refresh_token.clone();
        tracing::info!("Access token refreshed, expires in {}s", res.expires_in);
        Ok(res)
    }

    /// Authorize a trading account and start routing its events
    pub async fn account(&self, account_id: i64) -> RequestResult<Account> {
        let req = AccountAuthReq {
            ctid_trader_account_id: account_id,
            access_token: self.credentials.access_token.clone(),
        };

        let res = self
            .dispatcher
            .request::<AccountAuthRes, _>(
                OA_ACCOUNT_AUTH_REQ,
                &req,
                &[OA_ACCOUNT_AUTH_RES],
                DEFAULT_ERROR_TYPES,
                self.request_timeout,
            )
            .await?;

        let id = res.ctid_trader_account_id.unwrap_or(account_id);
        tracing::info!("Account {} authorized", id);
        Ok(Account::new(&self.dispatcher, id, self.request_timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, OaErrorRes};
    use crate::dispatch::RequestError;
    use crate::network::SessionConfig;
    use crate::testing::{pipe, MockServer};
    use prost::Message;

    async fn connected_client() -> (Client, MockServer) {
        let (dialer, server) = pipe();
        let dispatcher = Dispatcher::with_dialer(
            SessionConfig::default().without_tls(),
            Catalog::open_api(),
            Arc::new(dialer),
        );
        let credentials = Credentials {
            client_id: "app".to_string(),
            client_secret: "secret".to_string(),
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
        };
        let client = Client::new(dispatcher, credentials);
        client.connect().await.unwrap();
        (client, server)
    }

    #[tokio::test]
    async fn test_application_auth_sends_credentials() {
        let (client, mut server) = connected_client().await;

        let (result, ()) = tokio::join!(client.application_auth(), async {
            let sent = server.recv_request().await;
            assert_eq!(sent.payload_type, OA_APPLICATION_AUTH_REQ);
            let req = ApplicationAuthReq::decode(sent.payload.as_slice()).unwrap();
            assert_eq!(req.client_id, "app");
            assert_eq!(req.client_secret, "secret");
            server
                .reply(OA_APPLICATION_AUTH_RES, &ApplicationAuthRes {}, sent.request_id)
                .await;
        });

        result.unwrap();
    }

    #[tokio::test]
    async fn test_application_auth_failure() {
        let (client, mut server) = connected_client().await;

        let (result, ()) = tokio::join!(client.application_auth(), async {
            let sent = server.recv_request().await;
            let error = OaErrorRes {
                error_code: "CH_CLIENT_AUTH_FAILURE".to_string(),
                description: Some("bad secret".to_string()),
                ..Default::default()
            };
            server.reply(OA_ERROR_RES, &error, sent.request_id).await;
        });

        match result {
            Err(RequestError::Protocol(e)) => assert_eq!(e.code, "CH_CLIENT_AUTH_FAILURE"),
            other => panic!("expected protocol error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_account_list() {
        let (client, mut server) = connected_client().await;

        let (result, ()) = tokio::join!(client.account_list_by_access_token(), async {
            let sent = server.recv_request().await;
            let req = GetAccountListByAccessTokenReq::decode(sent.payload.as_slice()).unwrap();
            assert_eq!(req.access_token, "access");
            let res = GetAccountListByAccessTokenRes {
                access_token: "access".to_string(),
                permission_scope: None,
                ctid_trader_account: vec![
                    CtidTraderAccount {
                        ctid_trader_account_id: 11,
                        is_live: Some(false),
                        ..Default::default()
                    },
                    CtidTraderAccount {
                        ctid_trader_account_id: 12,
                        is_live: Some(true),
                        ..Default::default()
                    },
                ],
            };
            server
                .reply(OA_GET_ACCOUNTS_BY_ACCESS_TOKEN_RES, &res, sent.request_id)
                .await;
        });

        let ids: Vec<u64> = result
            .unwrap()
            .iter()
            .map(|a| a.ctid_trader_account_id)
            .collect();
        assert_eq!(ids, vec![11, 12]);
    }

    #[tokio::test]
    async fn test_refresh_token_updates_credentials() {
        let (mut client, mut server) = connected_client().await;

        let refresh = async {
            let sent = server.recv_request().await;
            let req = RefreshTokenReq::decode(sent.payload.as_slice()).unwrap();
            assert_eq!(req.refresh_token, "refresh");
            let res = RefreshTokenRes {
                access_token: "access-2".to_string(),
                token_type: "bearer".to_string(),
                expires_in: 2_628_000,
                refresh_token: "refresh-2".to_string(),
            };
            server.reply(OA_REFRESH_TOKEN_RES, &res, sent.request_id).await;
        };
        let (result, ()) = tokio::join!(client.refresh_token(), refresh);

        result.unwrap();
        assert_eq!(client.credentials().access_token, "access-2");
        assert_eq!(client.credentials().refresh_token, "refresh-2");
    }
}
