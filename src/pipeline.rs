//! 批量生成商品：挑选衣服、合成 logo、虚拟试穿、上传并写入商品记录

use std::path::{Path, PathBuf};

use log::{info, warn};
use rand::Rng;
use rand::seq::IndexedRandom;

use crate::catalog::{CatalogWriter, DocumentStore, ProductRecord, TryonResult};
use crate::color::{Rgb, dominant_colors};
use crate::compositor::Compositor;
use crate::config::{CompositeOptions, DirOptions, MatchOptions, TryOnOptions};
use crate::error::Result;
use crate::matcher::{GarmentRecord, analyze_garments, select_matching_garments};
use crate::naming::{ProductNamer, TemplateNamer};
use crate::storage::{ObjectStore, Publisher};
use crate::tryon::{ImageGenerator, TryOnRequest};
use crate::utils::{file_name, file_stem, require_images, suffix_regex};

/// 一次运行的全部参数
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub dirs: DirOptions,
    pub matching: MatchOptions,
    pub composite: CompositeOptions,
    pub tryon: TryOnOptions,
    pub collection: String,
    pub price: i64,
    /// 期望的 logo 主色，只有主色与其接近时才抠图
    pub desired_color: Option<Rgb>,
}

/// 一个商品的处理结果
#[derive(Debug, Clone)]
pub struct ProductOutcome {
    pub logo: PathBuf,
    pub garment: PathBuf,
    pub record: ProductRecord,
    /// 写入失败时为 `None`
    pub document_id: Option<String>,
}

pub struct Pipeline<'a> {
    config: PipelineConfig,
    compositor: Compositor,
    generator: &'a dyn ImageGenerator,
    publisher: Publisher<'a>,
    catalog: CatalogWriter<'a>,
    namer: &'a dyn ProductNamer,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: PipelineConfig,
        generator: &'a dyn ImageGenerator,
        objects: &'a dyn ObjectStore,
        documents: &'a dyn DocumentStore,
        namer: &'a dyn ProductNamer,
    ) -> Self {
        Self {
            compositor: Compositor::new(config.composite.clone()),
            catalog: CatalogWriter::new(documents, config.collection.clone()),
            publisher: Publisher::new(objects),
            config,
            generator,
            namer,
        }
    }

    pub fn run<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<ProductOutcome>> {
        let dirs = &self.config.dirs;
        let suffix = suffix_regex(&dirs.suffix);
        let backgrounds = require_images(&dirs.background_dir, &suffix)?;
        let garments = require_images(&dirs.garment_dir, &suffix)?;
        let logos = require_images(&dirs.logo_dir, &suffix)?;
        info!(
            "找到 {} 张背景图，{} 件衣服，{} 个 logo",
            backgrounds.len(),
            garments.len(),
            logos.len()
        );
        std::fs::create_dir_all(&dirs.output_dir)?;

        let garments = analyze_garments(&garments, self.config.matching.n_colors)?;

        let mut outcomes = vec![];
        for logo in &logos {
            let products = self.process_logo(logo, &garments, &backgrounds, rng)?;
            if products.iter().all(|p| p.record.tryons.is_empty()) {
                warn!("logo 处理失败: {}", file_name(logo));
            }
            outcomes.extend(products);
        }
        info!("共生成 {} 个商品", outcomes.len());
        Ok(outcomes)
    }

    fn process_logo<R: Rng + ?Sized>(
        &self,
        logo: &Path,
        garments: &[GarmentRecord],
        backgrounds: &[PathBuf],
        rng: &mut R,
    ) -> Result<Vec<ProductOutcome>> {
        let m = &self.config.matching;
        let profile = dominant_colors(logo, m.n_colors)?;
        let candidates = select_matching_garments(
            &profile,
            garments,
            m.match_count,
            m.color_match_threshold,
            m.match_frequency_threshold,
            rng,
        );
        info!("{} 匹配到 {} 件衣服", file_name(logo), candidates.len());

        let mut picked = vec![];
        for _ in 0..m.garments_per_logo {
            if let Some(garment) = candidates.choose(rng) {
                picked.push(garment.to_path_buf());
            }
        }

        let mut outcomes = vec![];
        for garment in picked {
            let outcome = self.process_pair(logo, &garment, backgrounds, rng)?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    fn process_pair<R: Rng + ?Sized>(
        &self,
        logo: &Path,
        garment: &Path,
        backgrounds: &[PathBuf],
        rng: &mut R,
    ) -> Result<ProductOutcome> {
        let c = &self.config.composite;
        let processed = self
            .config
            .dirs
            .output_dir
            .join(format!("processed_{}_{}", file_name(logo), file_name(garment)));
        self.compositor.composite(
            logo,
            garment,
            &processed,
            (c.center_w, c.center_h),
            self.config.desired_color.as_ref(),
        )?;

        let original_logo = self.publisher.publish(logo).into();
        let original_garment = self.publisher.publish(garment).into();
        let processed_garment = self.publisher.publish(&processed).into();

        // 只记录当前 logo 与衣服组合的试穿图，不累积同一 logo 的其他衣服
        let mut tryons = vec![];
        for _ in 0..self.config.tryon.backgrounds_per_garment {
            let Some(background) = backgrounds.choose(rng) else { break };
            let request = TryOnRequest {
                denoise_steps: self.config.tryon.denoise_steps,
                seed: self.config.tryon.seed,
                ..TryOnRequest::new(background, &processed)
            };
            let result = self.generator.try_on(&request)?;
            if let Some(asset) = self.publisher.publish(&result) {
                tryons.push(TryonResult {
                    background: file_stem(background),
                    public_url: asset.public_url,
                    gs_path: asset.gs_path,
                });
            }
        }

        let name = self.product_name(garment, logo);
        let record = ProductRecord {
            name,
            price: self.config.price,
            tryons,
            original_logo,
            original_garment,
            processed_garment,
        };
        let document_id = self.catalog.record_product(&record);
        Ok(ProductOutcome {
            logo: logo.to_path_buf(),
            garment: garment.to_path_buf(),
            record,
            document_id,
        })
    }

    fn product_name(&self, garment: &Path, logo: &Path) -> String {
        let (garment, logo) = (file_stem(garment), file_stem(logo));
        match self.namer.name(&garment, &logo) {
            Ok(name) if !name.is_empty() => name,
            Ok(_) => {
                warn!("生成的商品名为空，使用默认名称");
                TemplateNamer::compose(&garment, &logo)
            }
            Err(e) => {
                warn!("生成商品名失败，使用默认名称: {e}");
                TemplateNamer::compose(&garment, &logo)
            }
        }
    }
}
