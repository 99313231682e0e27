//! 单元测试共用的服务账号与 token 接口

use std::rc::Rc;

use mockito::{Matcher, Mock, ServerGuard};
use reqwest::blocking::Client;
use serde_json::json;

use crate::auth::{ServiceAccount, TokenProvider};

pub const TEST_KEY: &str = include_str!("../tests/data/service_key.pem");
pub const TEST_TOKEN: &str = "ya29.test-token";

pub fn account(server: &ServerGuard) -> ServiceAccount {
    serde_json::from_value(json!({
        "project_id": "demo-project",
        "private_key": TEST_KEY,
        "client_email": "bot@demo-project.iam.gserviceaccount.com",
        "token_uri": format!("{}/token", server.url()),
    }))
    .unwrap()
}

/// 期望只被请求一次的 token 接口
pub fn token_endpoint(server: &mut ServerGuard) -> Mock {
    server
        .mock("POST", "/token")
        .match_header("content-type", "application/x-www-form-urlencoded")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer".into()),
            Matcher::Regex("assertion=[A-Za-z0-9_-]+\\.[A-Za-z0-9_-]+\\.[A-Za-z0-9_-]+".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "access_token": TEST_TOKEN, "expires_in": 3599, "token_type": "Bearer" }).to_string())
        .expect(1)
        .create()
}

pub fn provider(server: &ServerGuard) -> Rc<TokenProvider> {
    Rc::new(TokenProvider::new(Client::new(), account(server)))
}

pub fn bearer() -> String {
    format!("Bearer {TEST_TOKEN}")
}
