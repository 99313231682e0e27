use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::cli::SubCommandExtend;
use crate::color::Rgb;
use crate::compositor::Compositor;
use crate::config::{CompositeOptions, Opts};

#[derive(Parser, Debug, Clone)]
pub struct CompositeCommand {
    #[command(flatten)]
    pub composite: CompositeOptions,
    /// logo 图片
    pub logo: PathBuf,
    /// 衣服图片
    pub garment: PathBuf,
    /// 输出路径，后缀名决定图片格式
    pub output: PathBuf,
    /// 期望的 logo 主色，格式为 #rrggbb 或 r,g,b
    #[arg(long, value_name = "COLOR")]
    pub desired_color: Option<Rgb>,
}

impl SubCommandExtend for CompositeCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        let center = (self.composite.center_w, self.composite.center_h);
        let compositor = Compositor::new(self.composite.clone());
        let output = compositor.composite(
            &self.logo,
            &self.garment,
            &self.output,
            center,
            self.desired_color.as_ref(),
        )?;
        println!("{}", output.display());
        Ok(())
    }
}
