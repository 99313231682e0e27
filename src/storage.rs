//! 对象存储与素材上传

use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use log::{error, info};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::TokenProvider;
use crate::error::{Result, check_status};
use crate::utils::file_name;

pub const DOWNLOAD_TOKEN_KEY: &str = "firebaseStorageDownloadTokens";
pub const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

/// 对象存储接口
pub trait ObjectStore {
    /// 以 `key` 上传数据
    fn upload(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()>;
    /// 设置对象的自定义元数据
    fn set_metadata(&self, key: &str, metadata: &BTreeMap<String, String>) -> Result<()>;
    /// 允许匿名读取
    fn make_public(&self, key: &str) -> Result<()>;
    /// 对象的公开访问地址
    fn public_url(&self, key: &str) -> String;
    /// 对象的存储路径，如 `gs://bucket/key`
    fn storage_path(&self, key: &str) -> String;
}

/// 基于 Cloud Storage JSON API 的 Firebase 存储桶
pub struct FirebaseStorage {
    client: Client,
    auth: Rc<TokenProvider>,
    bucket: String,
    endpoint: String,
}

impl FirebaseStorage {
    pub fn new(client: Client, auth: Rc<TokenProvider>, bucket: impl Into<String>) -> Self {
        Self { client, auth, bucket: bucket.into(), endpoint: DEFAULT_ENDPOINT.to_string() }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/storage/v1/b/{}/o/{}", self.endpoint, self.bucket, key)
    }
}

impl ObjectStore for FirebaseStorage {
    fn upload(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        let url = format!("{}/upload/storage/v1/b/{}/o", self.endpoint, self.bucket);
        let resp = self
            .client
            .post(url)
            .query(&[("uploadType", "media"), ("name", key)])
            .bearer_auth(self.auth.token()?)
            .header(CONTENT_TYPE, content_type)
            .body(data)
            .send()?;
        check_status("storage", resp)?;
        Ok(())
    }

    fn set_metadata(&self, key: &str, metadata: &BTreeMap<String, String>) -> Result<()> {
        let resp = self
            .client
            .patch(self.object_url(key))
            .bearer_auth(self.auth.token()?)
            .json(&json!({ "metadata": metadata }))
            .send()?;
        check_status("storage", resp)?;
        Ok(())
    }

    fn make_public(&self, key: &str) -> Result<()> {
        let resp = self
            .client
            .post(format!("{}/acl", self.object_url(key)))
            .bearer_auth(self.auth.token()?)
            .json(&json!({ "entity": "allUsers", "role": "READER" }))
            .send()?;
        check_status("storage", resp)?;
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{DEFAULT_ENDPOINT}/{}/{key}", self.bucket)
    }

    fn storage_path(&self, key: &str) -> String {
        format!("gs://{}/{key}", self.bucket)
    }
}

/// 已上传的素材
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredAsset {
    pub public_url: String,
    pub gs_path: String,
}

/// 把本地图片上传到对象存储并公开
pub struct Publisher<'a> {
    store: &'a dyn ObjectStore,
}

impl<'a> Publisher<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self { store }
    }

    /// 上传文件，失败时记录日志并返回 `None`
    pub fn publish(&self, path: &Path) -> Option<StoredAsset> {
        match self.try_publish(path) {
            Ok(asset) => {
                info!("上传成功: {} -> {}", file_name(path), asset.public_url);
                Some(asset)
            }
            Err(e) => {
                error!("上传失败: {}: {}", path.display(), e);
                None
            }
        }
    }

    /// 上传文件，对象名为随机 UUID 加原文件后缀名
    pub fn try_publish(&self, path: &Path) -> Result<StoredAsset> {
        let data = std::fs::read(path)?;
        let key = object_key(path);
        let content_type = mime_guess::from_path(path).first_or_octet_stream();

        self.store.upload(&key, data, content_type.essence_str())?;
        let metadata = BTreeMap::from([(DOWNLOAD_TOKEN_KEY.to_string(), Uuid::new_v4().to_string())]);
        self.store.set_metadata(&key, &metadata)?;
        self.store.make_public(&key)?;

        Ok(StoredAsset { public_url: self.store.public_url(&key), gs_path: self.store.storage_path(&key) })
    }
}

fn object_key(path: &Path) -> String {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_else(|| "webp".to_string());
    format!("{}.{ext}", Uuid::new_v4())
}
