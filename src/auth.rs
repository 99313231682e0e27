//! Google 服务账号鉴权
//!
//! 使用服务账号私钥签发 JWT，换取 OAuth2 access token，供存储与数据库接口使用。

use std::cell::RefCell;
use std::path::Path;

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use log::debug;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::error::{Result, check_status};

pub const SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// JWT 有效期（秒）
const TOKEN_TTL: i64 = 3600;
/// 提前刷新 token 的时间（秒）
const REFRESH_MARGIN: i64 = 60;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// 服务账号密钥文件中用到的字段
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccount {
    pub client_email: String,
    pub private_key: String,
    pub project_id: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccount {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Ok(serde_json::from_slice(&data)?)
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: i64,
}

impl CachedToken {
    fn is_fresh(&self, now: i64) -> bool {
        now + REFRESH_MARGIN < self.expires_at
    }
}

/// 获取并缓存 access token
pub struct TokenProvider {
    client: Client,
    account: ServiceAccount,
    cached: RefCell<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(client: Client, account: ServiceAccount) -> Self {
        Self { client, account, cached: RefCell::new(None) }
    }

    pub fn from_file(client: Client, path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(client, ServiceAccount::from_file(path)?))
    }

    pub fn project_id(&self) -> &str {
        &self.account.project_id
    }

    /// 返回有效的 access token，过期前会自动刷新
    pub fn token(&self) -> Result<String> {
        let now = Utc::now().timestamp();
        if let Some(cached) = self.cached.borrow().as_ref().filter(|c| c.is_fresh(now)) {
            return Ok(cached.token.clone());
        }

        let assertion = self.assertion(now)?;
        debug!("向 {} 请求 access token", self.account.token_uri);
        let resp = self
            .client
            .post(&self.account.token_uri)
            .form(&[("grant_type", GRANT_TYPE), ("assertion", assertion.as_str())])
            .send()?;
        let resp: TokenResponse = check_status("oauth2", resp)?.json()?;

        let expires_at = now + resp.expires_in.unwrap_or(TOKEN_TTL);
        *self.cached.borrow_mut() =
            Some(CachedToken { token: resp.access_token.clone(), expires_at });
        Ok(resp.access_token)
    }

    fn claims(&self, now: i64) -> Claims<'_> {
        Claims {
            iss: &self.account.client_email,
            scope: SCOPE,
            aud: &self.account.token_uri,
            iat: now,
            exp: now + TOKEN_TTL,
        }
    }

    fn assertion(&self, now: i64) -> Result<String> {
        let key = EncodingKey::from_rsa_pem(self.account.private_key.as_bytes())?;
        Ok(encode(&Header::new(Algorithm::RS256), &self.claims(now), &key)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    const ACCOUNT: &str = r#"{
        "type": "service_account",
        "project_id": "demo-project",
        "private_key_id": "abc",
        "private_key": "not a key",
        "client_email": "bot@demo-project.iam.gserviceaccount.com"
    }"#;

    fn provider() -> TokenProvider {
        TokenProvider::new(Client::new(), serde_json::from_str(ACCOUNT).unwrap())
    }

    #[test]
    fn test_parse_service_account() {
        let account: ServiceAccount = serde_json::from_str(ACCOUNT).unwrap();
        assert_eq!(account.project_id, "demo-project");
        assert_eq!(account.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn test_claims() {
        let p = provider();
        let claims = p.claims(1000);
        assert_eq!(claims.iss, "bot@demo-project.iam.gserviceaccount.com");
        assert_eq!(claims.aud, DEFAULT_TOKEN_URI);
        assert_eq!(claims.scope, SCOPE);
        assert_eq!(claims.exp - claims.iat, TOKEN_TTL);
    }

    #[test]
    fn test_cached_token_freshness() {
        let token = CachedToken { token: "t".into(), expires_at: 1000 };
        assert!(token.is_fresh(900));
        assert!(!token.is_fresh(950));
        assert!(!token.is_fresh(1000));
    }

    #[test]
    fn test_cached_token_is_reused() {
        let p = provider();
        let expires_at = Utc::now().timestamp() + 600;
        *p.cached.borrow_mut() = Some(CachedToken { token: "cached".into(), expires_at });
        assert_eq!(p.token().unwrap(), "cached");
    }

    #[test]
    fn test_invalid_private_key() {
        let err = provider().assertion(0).unwrap_err();
        assert!(matches!(err, crate::Error::Jwt(_)));
    }

    #[test]
    fn test_token_exchange_is_cached() {
        let mut server = mockito::Server::new();
        let endpoint = testing::token_endpoint(&mut server);
        let p = testing::provider(&server);

        assert_eq!(p.token().unwrap(), testing::TEST_TOKEN);
        assert_eq!(p.token().unwrap(), testing::TEST_TOKEN);
        endpoint.assert();
    }

    #[test]
    fn test_token_exchange_rejected() {
        let mut server = mockito::Server::new();
        let endpoint = server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create();
        let p = testing::provider(&server);

        let err = p.token().unwrap_err();
        assert!(
            matches!(err, crate::Error::Service { service: "oauth2", status: 400, ref body } if body.contains("invalid_grant"))
        );
        assert!(p.cached.borrow().is_none());
        endpoint.assert();
    }

    #[test]
    fn test_missing_file() {
        let err = ServiceAccount::from_file("/nonexistent/account.json").unwrap_err();
        assert!(matches!(err, crate::Error::Io(_)));
    }
}
