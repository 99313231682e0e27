use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rand::Rng;
use rand::seq::IndexedRandom;

use crate::catalog::{CatalogWriter, ComboRecord};
use crate::cli::{SubCommandExtend, firebase, tryon_client};
use crate::config::{FirebaseOptions, Opts};
use crate::storage::Publisher;
use crate::tryon::{GradioTryOn, ImageGenerator, TryOnRequest};
use crate::utils::{IMAGE_SUFFIX, file_stem, require_images, suffix_regex};

#[derive(Parser, Debug, Clone)]
pub struct TryonCommand {
    /// 试穿服务地址
    #[arg(long, env = "TRYON_API_URL", default_value = "http://127.0.0.1:7860/")]
    pub api_url: String,
    /// 去噪步数
    #[arg(long, value_name = "N", default_value_t = 30)]
    pub denoise_steps: u32,
    /// 随机种子，-1 表示随机
    #[arg(long, default_value_t = 42, allow_negative_numbers = true)]
    pub seed: i64,
    /// 试穿请求的超时时间（秒）
    #[arg(long, value_name = "SECONDS", default_value_t = 600)]
    pub timeout: u64,
    #[command(flatten)]
    pub firebase: FirebaseOptions,
    /// 模特背景图目录
    #[arg(long, value_name = "DIR", default_value = "/IDM-VTON/people")]
    pub background_dir: PathBuf,
    /// 衣服图片目录
    #[arg(long, value_name = "DIR", default_value = "/IDM-VTON/garmets")]
    pub garment_dir: PathBuf,
    /// 结果图的本地副本保存在该目录下的 result_image.webp
    #[arg(short, long, value_name = "DIR", default_value = "/IDM-VTON")]
    pub output_dir: PathBuf,
}

impl SubCommandExtend for TryonCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        let suffix = suffix_regex(IMAGE_SUFFIX);
        let backgrounds = require_images(&self.background_dir, &suffix)?;
        let garments = require_images(&self.garment_dir, &suffix)?;

        let mut rng = rand::rng();
        let background = backgrounds.choose(&mut rng).context("没有背景图")?;
        let garment = garments.choose(&mut rng).context("没有衣服图片")?;
        println!("背景: {}\n衣服: {}", background.display(), garment.display());

        let (storage, firestore) = firebase(&self.firebase)?;
        let generator = GradioTryOn::new(tryon_client(self.timeout)?, &self.api_url, &self.output_dir);
        let request = TryOnRequest {
            is_checked_crop: false,
            denoise_steps: self.denoise_steps,
            seed: self.seed,
            ..TryOnRequest::new(background, garment)
        };
        let result = generator.try_on(&request)?;

        let asset = Publisher::new(&storage).try_publish(&result).context("上传试穿图失败")?;

        let record = ComboRecord {
            image_path: asset.gs_path.clone(),
            name: format!("Combo: {} + {}", file_stem(background), file_stem(garment)),
            price: rng.random_range(1..=100),
        };
        CatalogWriter::new(&firestore, &self.firebase.collection).record_combo(&record);

        println!("图片已上传: {}", asset.public_url);
        std::fs::copy(&result, self.output_dir.join("result_image.webp"))?;
        Ok(())
    }
}
