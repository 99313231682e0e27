use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};

use crate::cli::SubCommandExtend;
use crate::color::{ColorProfile, dominant_colors};
use crate::config::Opts;

#[derive(Parser, Debug, Clone)]
pub struct ColorsCommand {
    /// 图片路径
    pub image: PathBuf,
    /// 主色数量
    #[arg(short, default_value_t = 3)]
    pub n: usize,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for ColorsCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        let profile = dominant_colors(&self.image, self.n)?;
        print_result(&profile, self.output_format)
    }
}

fn print_result(profile: &ColorProfile, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(profile)?)
        }
        OutputFormat::Table => {
            for c in profile.colors() {
                println!("{}\t{:.4}", c.color, c.frequency);
            }
        }
    }
    Ok(())
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Table,
}
