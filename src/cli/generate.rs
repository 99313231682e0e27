use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use reqwest::blocking::Client;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::generate::{DEFAULT_ENDPOINT, StabilityClient};
use crate::utils::random_name;

#[derive(Parser, Debug, Clone)]
pub struct GenerateCommand {
    /// 提示词
    #[arg(default_value = "product photo of a white t-shirt on a man")]
    pub prompt: String,
    /// 图片格式
    #[arg(long, default_value = "png")]
    pub output_format: String,
    /// 输出目录
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,
    /// Stability API key
    #[arg(long, env = "STABILITY_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
    /// 文生图接口地址
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

impl SubCommandExtend for GenerateCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        let Some(api_key) = &self.api_key else {
            bail!("未设置 STABILITY_API_KEY");
        };
        let client = StabilityClient::new(Client::new(), api_key).with_endpoint(&self.endpoint);
        let data = client.generate(&self.prompt, &self.output_format)?;

        let output = self.output_dir.join(format!("{}.{}", random_name(10), self.output_format));
        std::fs::write(&output, data)?;
        println!("{}", output.display());
        Ok(())
    }
}
