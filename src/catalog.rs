//! 商品记录与文档数据库

use std::rc::Rc;

use log::{error, info};
use rand::distr::{Alphanumeric, SampleString};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::auth::TokenProvider;
use crate::error::{Error, Result, check_status};
use crate::storage::StoredAsset;

/// Firestore 自动生成的文档 ID 长度
const DOCUMENT_ID_LEN: usize = 20;

/// 文档数据库接口
pub trait DocumentStore {
    /// 在集合中创建文档，返回文档 ID
    ///
    /// `server_timestamps` 中的字段由服务端写入提交时间
    fn create(
        &self,
        collection: &str,
        fields: &Map<String, Value>,
        server_timestamps: &[&str],
    ) -> Result<String>;
}

/// 基于 REST API 的 Firestore
pub struct Firestore {
    client: Client,
    auth: Rc<TokenProvider>,
    base_url: String,
}

impl Firestore {
    pub fn new(client: Client, auth: Rc<TokenProvider>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, auth, base_url }
    }

    fn database(&self) -> String {
        format!("projects/{}/databases/(default)", self.auth.project_id())
    }
}

impl DocumentStore for Firestore {
    fn create(
        &self,
        collection: &str,
        fields: &Map<String, Value>,
        server_timestamps: &[&str],
    ) -> Result<String> {
        let id = Alphanumeric.sample_string(&mut rand::rng(), DOCUMENT_ID_LEN);
        let name = format!("{}/documents/{collection}/{id}", self.database());
        let body = commit_body(&name, fields, server_timestamps);

        let url = format!("{}/{}/documents:commit", self.base_url, self.database());
        let resp = self.client.post(url).bearer_auth(self.auth.token()?).json(&body).send()?;
        check_status("firestore", resp)?;
        Ok(id)
    }
}

/// 构建新建文档的 commit 请求体，文档已存在时提交失败
fn commit_body(name: &str, fields: &Map<String, Value>, server_timestamps: &[&str]) -> Value {
    let transforms = server_timestamps
        .iter()
        .map(|f| json!({ "fieldPath": f, "setToServerValue": "REQUEST_TIME" }))
        .collect::<Vec<_>>();
    json!({
        "writes": [{
            "update": { "name": name, "fields": encode_fields(fields) },
            "currentDocument": { "exists": false },
            "updateTransforms": transforms,
        }]
    })
}

fn encode_fields(fields: &Map<String, Value>) -> Value {
    Value::Object(fields.iter().map(|(k, v)| (k.clone(), encode_value(v))).collect())
}

/// 把 JSON 值转换为 Firestore 的带类型值
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(values) => {
            json!({ "arrayValue": { "values": values.iter().map(encode_value).collect::<Vec<_>>() } })
        }
        Value::Object(fields) => json!({ "mapValue": { "fields": encode_fields(fields) } }),
    }
}

/// 一张试穿图
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TryonResult {
    /// 模特背景图的文件名（不含后缀名）
    pub background: String,
    pub public_url: String,
    pub gs_path: String,
}

/// 上传后的素材引用，上传失败时两个字段均为 null
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetRef {
    pub public_url: Option<String>,
    pub gs_path: Option<String>,
}

impl From<Option<StoredAsset>> for AssetRef {
    fn from(asset: Option<StoredAsset>) -> Self {
        match asset {
            Some(a) => Self { public_url: Some(a.public_url), gs_path: Some(a.gs_path) },
            None => Self::default(),
        }
    }
}

/// 一个 logo 与一件衣服组合成的商品，`timestamp` 字段由数据库写入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub name: String,
    pub price: i64,
    pub tryons: Vec<TryonResult>,
    pub original_logo: AssetRef,
    pub original_garment: AssetRef,
    pub processed_garment: AssetRef,
}

/// 随机组合的试穿图记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComboRecord {
    #[serde(rename = "imagePath")]
    pub image_path: String,
    pub name: String,
    pub price: i64,
}

/// 写入商品记录，失败时只记录日志
pub struct CatalogWriter<'a> {
    store: &'a dyn DocumentStore,
    collection: String,
}

impl<'a> CatalogWriter<'a> {
    pub fn new(store: &'a dyn DocumentStore, collection: impl Into<String>) -> Self {
        Self { store, collection: collection.into() }
    }

    pub fn record_product(&self, record: &ProductRecord) -> Option<String> {
        self.create(record, &["timestamp"])
    }

    pub fn record_combo(&self, record: &ComboRecord) -> Option<String> {
        self.create(record, &[])
    }

    fn create<T: Serialize>(&self, record: &T, server_timestamps: &[&str]) -> Option<String> {
        let result = to_fields(record)
            .and_then(|fields| self.store.create(&self.collection, &fields, server_timestamps));
        match result {
            Ok(id) => {
                info!("创建文档成功: {}/{id}", self.collection);
                Some(id)
            }
            Err(e) => {
                error!("创建文档失败: {e}");
                None
            }
        }
    }
}

fn to_fields<T: Serialize>(record: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(record)? {
        Value::Object(fields) => Ok(fields),
        _ => Err(Error::protocol("firestore", "文档必须是对象")),
    }
}
