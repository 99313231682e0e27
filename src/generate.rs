//! 文生图接口

use log::info;
use reqwest::blocking::{Client, multipart};
use reqwest::header::ACCEPT;

use crate::error::{Result, check_status};

pub const DEFAULT_ENDPOINT: &str = "https://api.stability.ai/v2beta/stable-image/generate/sd3";

pub struct StabilityClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl StabilityClient {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self { client, api_key: api_key.into(), endpoint: DEFAULT_ENDPOINT.to_string() }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// 根据提示词生成图片，返回编码后的图片数据
    pub fn generate(&self, prompt: &str, output_format: &str) -> Result<Vec<u8>> {
        let form = multipart::Form::new()
            .text("prompt", prompt.to_string())
            .text("output_format", output_format.to_string());
        info!("生成图片: {prompt}");
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header(ACCEPT, "image/*")
            .multipart(form)
            .send()?;
        let data = check_status("stability", resp)?.bytes()?;
        Ok(data.to_vec())
    }
}
