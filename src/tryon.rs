//! 虚拟试穿服务
//!
//! 试穿服务是一个 Gradio 应用，调用流程：
//! 1. 把背景图与衣服图上传到 `/upload`，得到服务端路径
//! 2. `POST /call/tryon` 提交任务，得到 `event_id`
//! 3. `GET /call/tryon/{event_id}` 读取事件流，直到 `complete` 或 `error`
//! 4. 下载结果中的第一张图片
//!
//! Gradio 5 把这些接口放在 `/gradio_api` 下，前缀从 `/config` 的 `api_prefix` 读取，
//! 旧版本没有这个字段，前缀为空。

use std::cell::OnceCell;
use std::path::{Path, PathBuf};

use log::{debug, info};
use reqwest::blocking::{Client, multipart};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{Error, Result, check_status};
use crate::utils::{file_name, random_name};

const SERVICE: &str = "tryon";
const ENDPOINT: &str = "tryon";

/// 一次试穿请求
#[derive(Debug, Clone)]
pub struct TryOnRequest {
    /// 模特背景图
    pub background: PathBuf,
    /// 衣服图
    pub garment: PathBuf,
    /// 衣服描述
    pub description: String,
    /// 是否自动生成遮罩
    pub is_checked: bool,
    /// 是否自动裁剪
    pub is_checked_crop: bool,
    pub denoise_steps: u32,
    pub seed: i64,
}

impl TryOnRequest {
    pub fn new(background: impl Into<PathBuf>, garment: impl Into<PathBuf>) -> Self {
        Self {
            background: background.into(),
            garment: garment.into(),
            description: String::new(),
            is_checked: true,
            is_checked_crop: true,
            denoise_steps: 40,
            seed: -1,
        }
    }
}

/// 图片生成服务接口
pub trait ImageGenerator {
    /// 生成试穿图，返回本地文件路径
    fn try_on(&self, request: &TryOnRequest) -> Result<PathBuf>;
}

/// Gradio 试穿服务客户端
pub struct GradioTryOn {
    client: Client,
    base: String,
    work_dir: PathBuf,
    api_prefix: OnceCell<String>,
}

#[derive(Debug, Deserialize)]
struct EventId {
    event_id: String,
}

#[derive(Debug, Deserialize)]
struct AppConfig {
    #[serde(default)]
    api_prefix: String,
}

impl GradioTryOn {
    /// `work_dir` 用于保存下载的结果图
    pub fn new(client: Client, base: &str, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            base: base.trim_end_matches('/').to_string(),
            work_dir: work_dir.into(),
            api_prefix: OnceCell::new(),
        }
    }

    /// 第一次调用时读取 `/config` 中的接口前缀
    fn api_prefix(&self) -> Result<&str> {
        if let Some(prefix) = self.api_prefix.get() {
            return Ok(prefix.as_str());
        }
        let resp = self.client.get(format!("{}/config", self.base)).send()?;
        let config: AppConfig = check_status(SERVICE, resp)?.json()?;
        let prefix = config.api_prefix.trim_end_matches('/').to_string();
        debug!("试穿服务接口前缀: {prefix:?}");
        Ok(self.api_prefix.get_or_init(|| prefix).as_str())
    }

    fn route(&self, path: &str) -> Result<String> {
        Ok(format!("{}{}/{path}", self.base, self.api_prefix()?))
    }

    /// 上传文件，返回服务端路径
    fn upload(&self, path: &Path) -> Result<String> {
        let part = multipart::Part::file(path)?;
        let form = multipart::Form::new().part("files", part);
        let resp = self.client.post(self.route("upload")?).multipart(form).send()?;
        let paths: Vec<String> = check_status(SERVICE, resp)?.json()?;
        paths
            .into_iter()
            .next()
            .ok_or_else(|| Error::protocol(SERVICE, "上传接口没有返回文件路径"))
    }

    fn submit(&self, data: Value) -> Result<String> {
        let url = self.route(&format!("call/{ENDPOINT}"))?;
        let resp = self.client.post(url).json(&json!({ "data": data })).send()?;
        let event: EventId = check_status(SERVICE, resp)?.json()?;
        Ok(event.event_id)
    }

    fn wait(&self, event_id: &str) -> Result<Value> {
        let url = self.route(&format!("call/{ENDPOINT}/{event_id}"))?;
        let body = check_status(SERVICE, self.client.get(url).send()?)?.text()?;
        parse_sse(&body)
    }

    fn download(&self, location: &str) -> Result<PathBuf> {
        let url = if location.starts_with("http://") || location.starts_with("https://") {
            location.to_string()
        } else {
            self.route(&format!("file={location}"))?
        };
        let ext = Path::new(location).extension().and_then(|e| e.to_str()).unwrap_or("webp");
        let output = self.work_dir.join(format!("tryon_{}.{ext}", random_name(10)));

        let data = check_status(SERVICE, self.client.get(url).send()?)?.bytes()?;
        std::fs::write(&output, &data)?;
        Ok(output)
    }
}

impl ImageGenerator for GradioTryOn {
    fn try_on(&self, request: &TryOnRequest) -> Result<PathBuf> {
        let background = self.upload(&request.background)?;
        let garment = self.upload(&request.garment)?;

        let data = json!([
            { "background": file_data(&background, &request.background), "layers": [], "composite": null },
            file_data(&garment, &request.garment),
            request.description,
            request.is_checked,
            request.is_checked_crop,
            request.denoise_steps,
            request.seed,
        ]);
        let event_id = self.submit(data)?;
        debug!("试穿任务已提交: {event_id}");

        let output = self.wait(&event_id)?;
        let location = result_location(&output)?;
        let path = self.download(&location)?;
        info!(
            "试穿完成: {} + {} -> {}",
            file_name(&request.background),
            file_name(&request.garment),
            path.display()
        );
        Ok(path)
    }
}

fn file_data(server_path: &str, local: &Path) -> Value {
    json!({
        "path": server_path,
        "orig_name": file_name(local),
        "meta": { "_type": "gradio.FileData" },
    })
}

/// 解析事件流，返回 `complete` 事件的数据
fn parse_sse(body: &str) -> Result<Value> {
    let mut event = "";
    for line in body.lines() {
        if let Some(name) = line.strip_prefix("event:") {
            event = name.trim();
        } else if let Some(data) = line.strip_prefix("data:") {
            let data = data.trim();
            match event {
                "complete" => return Ok(serde_json::from_str(data)?),
                "error" => return Err(Error::protocol(SERVICE, format!("任务失败: {data}"))),
                _ => {}
            }
        }
    }
    Err(Error::protocol(SERVICE, "事件流中没有结果"))
}

/// 取出结果中第一张图片的位置，可能是 URL 或服务端路径
fn result_location(output: &Value) -> Result<String> {
    let first = output
        .get(0)
        .ok_or_else(|| Error::protocol(SERVICE, "结果为空"))?;
    let location = match first {
        Value::String(path) => Some(path.as_str()),
        Value::Object(file) => file
            .get("url")
            .and_then(Value::as_str)
            .or_else(|| file.get("path").and_then(Value::as_str)),
        _ => None,
    };
    location
        .map(str::to_string)
        .ok_or_else(|| Error::protocol(SERVICE, format!("无法识别的结果: {first}")))
}
