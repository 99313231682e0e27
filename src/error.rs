use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("无法解码图片: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP 请求失败: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON 解析失败: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JWT 签名失败: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// 聚类中心数量超过了图片中不同颜色的数量
    #[error("聚类中心数量 {clusters} 超过了不同颜色的数量 {distinct}")]
    TooFewColors { clusters: usize, distinct: usize },

    #[error("目录中没有图片: {}", .0.display())]
    EmptyDirectory(PathBuf),

    /// 外部服务返回了非 2xx 状态码
    #[error("{service} 返回 {status}: {body}")]
    Service { service: &'static str, status: u16, body: String },

    /// 外部服务的响应不符合预期
    #[error("{service} 响应格式错误: {message}")]
    Protocol { service: &'static str, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn protocol(service: &'static str, message: impl Into<String>) -> Self {
        Self::Protocol { service, message: message.into() }
    }
}

/// 检查 HTTP 响应状态，非 2xx 时读取响应体作为错误信息
pub(crate) fn check_status(
    service: &'static str,
    resp: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    Err(Error::Service { service, status: status.as_u16(), body })
}
