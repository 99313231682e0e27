use anyhow::Result;
use clap::Parser;
use log::info;
use reqwest::blocking::Client;

use crate::cli::{SubCommandExtend, firebase, tryon_client};
use crate::color::Rgb;
use crate::config::*;
use crate::naming::{ChatNamer, ProductNamer, TemplateNamer};
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::tryon::GradioTryOn;

#[derive(Parser, Debug, Clone)]
pub struct RunCommand {
    #[command(flatten)]
    pub dirs: DirOptions,
    #[command(flatten)]
    pub matching: MatchOptions,
    #[command(flatten)]
    pub composite: CompositeOptions,
    #[command(flatten)]
    pub tryon: TryOnOptions,
    #[command(flatten)]
    pub firebase: FirebaseOptions,
    #[command(flatten)]
    pub naming: NamingOptions,
    /// 商品价格
    #[arg(long, default_value_t = 749)]
    pub price: i64,
    /// 期望的 logo 主色，格式为 #rrggbb 或 r,g,b
    #[arg(long, value_name = "COLOR")]
    pub desired_color: Option<Rgb>,
}

impl SubCommandExtend for RunCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        let (storage, firestore) = firebase(&self.firebase)?;
        let generator = GradioTryOn::new(
            tryon_client(self.tryon.timeout)?,
            &self.tryon.api_url,
            &self.dirs.output_dir,
        );
        let namer: Box<dyn ProductNamer> = match &self.naming.ai_api_key {
            Some(key) => {
                let namer = ChatNamer::new(Client::new(), &self.naming.ai_model, key, self.naming.max_tokens);
                match &self.naming.ai_api_url {
                    Some(url) => Box::new(namer.with_endpoint(url)),
                    None => Box::new(namer),
                }
            }
            None => {
                info!("未设置 AI_API_KEY，使用模板命名");
                Box::new(TemplateNamer)
            }
        };

        let config = PipelineConfig {
            dirs: self.dirs.clone(),
            matching: self.matching.clone(),
            composite: self.composite.clone(),
            tryon: self.tryon.clone(),
            collection: self.firebase.collection.clone(),
            price: self.price,
            desired_color: self.desired_color,
        };
        let pipeline = Pipeline::new(config, &generator, &storage, &firestore, namer.as_ref());
        let outcomes = pipeline.run(&mut rand::rng())?;

        for outcome in &outcomes {
            let id = outcome.document_id.as_deref().unwrap_or("-");
            println!("{}\t{}\t{}", id, outcome.record.name, outcome.record.tryons.len());
        }
        Ok(())
    }
}
