//! 商品命名

use log::debug;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{Error, Result, check_status};

const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";

pub trait ProductNamer {
    /// 根据衣服与 logo 的文件名（不含后缀名）生成商品名
    fn name(&self, garment: &str, logo: &str) -> Result<String>;
}

/// 直接拼接两个名字
pub struct TemplateNamer;

impl TemplateNamer {
    pub fn compose(garment: &str, logo: &str) -> String {
        format!("{garment} x {logo}")
    }
}

impl ProductNamer for TemplateNamer {
    fn name(&self, garment: &str, logo: &str) -> Result<String> {
        Ok(Self::compose(garment, logo))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Provider {
    Anthropic,
    OpenAi,
}

/// 调用大模型生成商品名
pub struct ChatNamer {
    client: Client,
    provider: Provider,
    model: String,
    api_key: String,
    max_tokens: u32,
    endpoint: String,
}

impl ChatNamer {
    /// `model` 的格式为 `provider/model`，不带前缀时按 OpenAI 处理
    pub fn new(client: Client, model: &str, api_key: impl Into<String>, max_tokens: u32) -> Self {
        let (provider, model) = split_model(model);
        let endpoint = match provider {
            Provider::Anthropic => ANTHROPIC_URL,
            Provider::OpenAi => OPENAI_URL,
        };
        Self {
            client,
            provider,
            model: model.to_string(),
            api_key: api_key.into(),
            max_tokens,
            endpoint: endpoint.to_string(),
        }
    }

    /// 使用兼容接口的其他服务地址
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn request(&self, prompt: &str) -> Result<Value> {
        let messages = json!([{ "role": "user", "content": prompt }]);
        let body = json!({ "model": self.model, "max_tokens": self.max_tokens, "messages": messages });
        let req = match self.provider {
            Provider::Anthropic => self
                .client
                .post(&self.endpoint)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            Provider::OpenAi => self.client.post(&self.endpoint).bearer_auth(&self.api_key),
        };
        let resp = req.json(&body).send()?;
        Ok(check_status("naming", resp)?.json()?)
    }
}

impl ProductNamer for ChatNamer {
    fn name(&self, garment: &str, logo: &str) -> Result<String> {
        let response = self.request(&prompt(garment, logo))?;
        debug!("模型响应: {response}");
        let name = match self.provider {
            Provider::Anthropic => anthropic_text(response)?,
            Provider::OpenAi => openai_text(response)?,
        };
        Ok(name.trim().to_string())
    }
}

fn split_model(model: &str) -> (Provider, &str) {
    match model.split_once('/') {
        Some(("anthropic", name)) => (Provider::Anthropic, name),
        Some(("openai", name)) => (Provider::OpenAi, name),
        _ => (Provider::OpenAi, model),
    }
}

fn prompt(garment: &str, logo: &str) -> String {
    format!(
        "Generate a creative and catchy product name for a garment named '{garment}' combined with \
         a logo named '{logo}'. The name should be concise and appealing to customers. \
         Output only the GENERATED_NAME"
    )
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicBlock>,
}

#[derive(Deserialize)]
struct AnthropicBlock {
    #[serde(default)]
    text: Option<String>,
}

fn anthropic_text(response: Value) -> Result<String> {
    let response: AnthropicResponse = serde_json::from_value(response)?;
    response
        .content
        .into_iter()
        .find_map(|block| block.text)
        .ok_or_else(|| Error::protocol("naming", "响应中没有文本"))
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: Option<String>,
}

fn openai_text(response: Value) -> Result<String> {
    let response: OpenAiResponse = serde_json::from_value(response)?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| Error::protocol("naming", "响应中没有文本"))
}
