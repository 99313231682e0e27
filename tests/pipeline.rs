use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use image::{Rgb as Pixel, RgbImage};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::{Map, Value};

use vton_factory::catalog::DocumentStore;
use vton_factory::config::{CompositeOptions, DirOptions, MatchOptions, TryOnOptions};
use vton_factory::naming::ProductNamer;
use vton_factory::pipeline::{Pipeline, PipelineConfig};
use vton_factory::storage::ObjectStore;
use vton_factory::tryon::{ImageGenerator, TryOnRequest};
use vton_factory::utils::IMAGE_SUFFIX;
use vton_factory::{Error, Result as FactoryResult};

/// 把背景图复制一份作为试穿结果
struct CopyGenerator {
    work_dir: PathBuf,
    requests: RefCell<Vec<TryOnRequest>>,
}

impl ImageGenerator for CopyGenerator {
    fn try_on(&self, request: &TryOnRequest) -> FactoryResult<PathBuf> {
        let mut requests = self.requests.borrow_mut();
        let output = self.work_dir.join(format!("tryon_{}.png", requests.len()));
        std::fs::copy(&request.background, &output)?;
        requests.push(request.clone());
        Ok(output)
    }
}

#[derive(Default)]
struct MemoryStore {
    objects: RefCell<BTreeMap<String, usize>>,
    broken: bool,
}

impl ObjectStore for MemoryStore {
    fn upload(&self, key: &str, data: Vec<u8>, _content_type: &str) -> FactoryResult<()> {
        if self.broken {
            return Err(Error::Service { service: "memory", status: 503, body: String::new() });
        }
        self.objects.borrow_mut().insert(key.to_string(), data.len());
        Ok(())
    }

    fn set_metadata(&self, _key: &str, _metadata: &BTreeMap<String, String>) -> FactoryResult<()> {
        Ok(())
    }

    fn make_public(&self, _key: &str) -> FactoryResult<()> {
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://cdn.test/{key}")
    }

    fn storage_path(&self, key: &str) -> String {
        format!("gs://test-bucket/{key}")
    }
}

#[derive(Default)]
struct MemoryDocs {
    docs: RefCell<Vec<(String, Map<String, Value>)>>,
}

impl DocumentStore for MemoryDocs {
    fn create(
        &self,
        collection: &str,
        fields: &Map<String, Value>,
        server_timestamps: &[&str],
    ) -> FactoryResult<String> {
        assert_eq!(server_timestamps, ["timestamp"]);
        let mut docs = self.docs.borrow_mut();
        docs.push((collection.to_string(), fields.clone()));
        Ok(format!("doc{}", docs.len()))
    }
}

struct FailingNamer;

impl ProductNamer for FailingNamer {
    fn name(&self, _garment: &str, _logo: &str) -> FactoryResult<String> {
        Err(Error::Service { service: "naming", status: 401, body: "invalid key".into() })
    }
}

struct FixedNamer;

impl ProductNamer for FixedNamer {
    fn name(&self, garment: &str, logo: &str) -> FactoryResult<String> {
        Ok(format!("{logo} on {garment}"))
    }
}

/// 生成三色图片：`main` 占大部分，另外两种颜色各占一小块
fn write_image(path: &Path, main: [u8; 3], accents: [[u8; 3]; 2]) {
    let mut img = RgbImage::from_pixel(100, 100, Pixel(main));
    for y in 0..15 {
        for x in 0..15 {
            img.put_pixel(x, y, Pixel(accents[0]));
            img.put_pixel(99 - x, 99 - y, Pixel(accents[1]));
        }
    }
    img.save(path).unwrap();
}

struct Workspace {
    _dir: assert_fs::TempDir,
    root: PathBuf,
}

impl Workspace {
    fn new() -> Result<Self> {
        let dir = assert_fs::TempDir::new()?;
        let root = dir.path().to_path_buf();
        for sub in ["people", "garments", "logos"] {
            std::fs::create_dir(root.join(sub))?;
        }
        write_image(&root.join("people/model.png"), [200, 180, 160], [[20, 20, 20], [90, 60, 30]]);
        write_image(&root.join("garments/a_blue.png"), [0, 0, 230], [[255, 255, 255], [0, 0, 0]]);
        write_image(&root.join("garments/b_red.png"), [230, 10, 10], [[255, 255, 255], [0, 0, 0]]);
        write_image(&root.join("logos/logo.png"), [250, 0, 0], [[0, 250, 0], [250, 250, 0]]);
        Ok(Self { _dir: dir, root })
    }

    fn config(&self) -> PipelineConfig {
        PipelineConfig {
            dirs: DirOptions {
                background_dir: self.root.join("people"),
                garment_dir: self.root.join("garments"),
                logo_dir: self.root.join("logos"),
                output_dir: self.root.join("output"),
                suffix: IMAGE_SUFFIX.to_string(),
            },
            matching: MatchOptions { match_count: 1, ..MatchOptions::default() },
            composite: CompositeOptions::default(),
            tryon: TryOnOptions {
                api_url: "http://127.0.0.1:7860/".into(),
                denoise_steps: 40,
                seed: -1,
                backgrounds_per_garment: 2,
                timeout: 600,
            },
            collection: "products".into(),
            price: 749,
            desired_color: None,
        }
    }

    fn generator(&self) -> CopyGenerator {
        CopyGenerator { work_dir: self.root.clone(), requests: RefCell::new(vec![]) }
    }
}

#[test]
fn run_creates_product() -> Result<()> {
    let ws = Workspace::new()?;
    let generator = ws.generator();
    let store = MemoryStore::default();
    let docs = MemoryDocs::default();

    let pipeline = Pipeline::new(ws.config(), &generator, &store, &docs, &FailingNamer);
    let outcomes = pipeline.run(&mut StdRng::seed_from_u64(42))?;

    assert_eq!(outcomes.len(), 1);
    let outcome = &outcomes[0];
    assert_eq!(outcome.garment, ws.root.join("garments/b_red.png"));
    assert_eq!(outcome.document_id.as_deref(), Some("doc1"));

    let processed = ws.root.join("output/processed_logo.png_b_red.png");
    assert!(processed.is_file());

    let record = &outcome.record;
    assert_eq!(record.name, "b_red x logo");
    assert_eq!(record.price, 749);
    assert_eq!(record.tryons.len(), 2);
    assert!(record.tryons.iter().all(|t| t.background == "model"));
    assert!(record.tryons.iter().all(|t| t.gs_path.starts_with("gs://test-bucket/")));
    assert!(record.original_logo.public_url.as_deref().unwrap().starts_with("https://cdn.test/"));
    assert!(record.processed_garment.gs_path.is_some());

    // 3 个素材 + 2 张试穿图
    assert_eq!(store.objects.borrow().len(), 5);

    let requests = generator.requests.borrow();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].garment, processed);
    assert_eq!(requests[0].denoise_steps, 40);
    assert!(requests[0].is_checked && requests[0].is_checked_crop);

    let docs = docs.docs.borrow();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].0, "products");
    assert_eq!(docs[0].1["price"], 749);
    assert_eq!(docs[0].1["tryons"].as_array().map(Vec::len), Some(2));
    Ok(())
}

#[test]
fn run_uses_generated_name() -> Result<()> {
    let ws = Workspace::new()?;
    let generator = ws.generator();
    let store = MemoryStore::default();
    let docs = MemoryDocs::default();

    let pipeline = Pipeline::new(ws.config(), &generator, &store, &docs, &FixedNamer);
    let outcomes = pipeline.run(&mut StdRng::seed_from_u64(1))?;

    assert_eq!(outcomes[0].record.name, "logo on b_red");
    Ok(())
}

#[test]
fn run_survives_upload_failures() -> Result<()> {
    let ws = Workspace::new()?;
    let generator = ws.generator();
    let store = MemoryStore { broken: true, ..Default::default() };
    let docs = MemoryDocs::default();

    let pipeline = Pipeline::new(ws.config(), &generator, &store, &docs, &FailingNamer);
    let outcomes = pipeline.run(&mut StdRng::seed_from_u64(7))?;

    assert_eq!(outcomes.len(), 1);
    let record = &outcomes[0].record;
    assert!(record.tryons.is_empty());
    assert_eq!(record.original_logo.public_url, None);
    assert_eq!(record.original_garment.gs_path, None);
    // 上传失败不影响写入商品记录
    assert_eq!(docs.docs.borrow().len(), 1);
    assert_eq!(docs.docs.borrow()[0].1["original_logo"]["gs_path"], Value::Null);
    Ok(())
}

#[test]
fn run_rejects_empty_directory() -> Result<()> {
    let ws = Workspace::new()?;
    std::fs::remove_file(ws.root.join("logos/logo.png"))?;
    let generator = ws.generator();
    let store = MemoryStore::default();
    let docs = MemoryDocs::default();

    let pipeline = Pipeline::new(ws.config(), &generator, &store, &docs, &FailingNamer);
    let err = pipeline.run(&mut StdRng::seed_from_u64(0)).unwrap_err();

    assert!(matches!(err, Error::EmptyDirectory(ref dir) if dir.ends_with("logos")));
    assert!(generator.requests.borrow().is_empty());
    assert!(docs.docs.borrow().is_empty());
    Ok(())
}
