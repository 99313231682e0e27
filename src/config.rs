use std::path::PathBuf;
use std::sync::LazyLock;

use clap::{Parser, Subcommand};
use directories::ProjectDirs;

use crate::cli::*;

static CREDENTIALS: LazyLock<String> = LazyLock::new(|| {
    let dir = ProjectDirs::from("", "magifactory", "vton-factory")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    dir.join("account.json").to_string_lossy().into_owned()
});

fn default_credentials() -> &'static str {
    CREDENTIALS.as_str()
}

/// logo 缩放、摆放与抠图参数
#[derive(Parser, Debug, Clone)]
pub struct CompositeOptions {
    /// logo 高度占衣服高度的比例
    #[arg(long, value_name = "RATIO", default_value_t = 0.3)]
    pub resize_height_ratio: f32,
    /// logo 按高度缩放后比衣服还宽时，改为按该宽度比例缩放
    #[arg(long, value_name = "RATIO", default_value_t = 0.8)]
    pub max_width_ratio: f32,
    /// logo 中心的横向位置，占衣服宽度的比例
    #[arg(long, value_name = "RATIO", default_value_t = 0.5)]
    pub center_w: f32,
    /// logo 中心的纵向位置，占衣服高度的比例
    #[arg(long, value_name = "RATIO", default_value_t = 0.4)]
    pub center_h: f32,
    /// 与主色距离不超过该值的像素会被抠掉
    #[arg(long, value_name = "DISTANCE", default_value_t = 20.0)]
    pub color_range: f32,
    /// 主色占比超过该值才会抠图
    #[arg(long, value_name = "RATIO", default_value_t = 0.4)]
    pub mask_frequency_threshold: f32,
    /// 指定期望颜色时，主色与期望颜色的最大距离
    #[arg(long, value_name = "DISTANCE", default_value_t = 100.0)]
    pub color_distance_threshold: f32,
}

impl Default for CompositeOptions {
    fn default() -> Self {
        Self {
            resize_height_ratio: 0.3,
            max_width_ratio: 0.8,
            center_w: 0.5,
            center_h: 0.4,
            color_range: 20.0,
            mask_frequency_threshold: 0.4,
            color_distance_threshold: 100.0,
        }
    }
}

/// logo 与衣服的颜色匹配参数
#[derive(Parser, Debug, Clone)]
pub struct MatchOptions {
    /// 颜色距离小于该值视为匹配
    #[arg(long, value_name = "DISTANCE", default_value_t = 100.0)]
    pub color_match_threshold: f32,
    /// 占比低于该值的颜色不参与匹配
    #[arg(long, value_name = "RATIO", default_value_t = 0.3)]
    pub match_frequency_threshold: f32,
    /// 每个 logo 挑选的候选衣服数量
    #[arg(long, value_name = "N", default_value_t = 3)]
    pub match_count: usize,
    /// 从候选衣服中（可重复）抽取实际使用的数量
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub garments_per_logo: usize,
    /// 每张图片提取的主色数量
    #[arg(long, value_name = "N", default_value_t = 3)]
    pub n_colors: usize,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            color_match_threshold: 100.0,
            match_frequency_threshold: 0.3,
            match_count: 3,
            garments_per_logo: 1,
            n_colors: 3,
        }
    }
}

/// Firebase 存储与数据库
#[derive(Parser, Debug, Clone)]
pub struct FirebaseOptions {
    /// 存储桶名称
    #[arg(long, env = "FIREBASE_STORAGE_BUCKET", default_value = "magifactory2.appspot.com")]
    pub storage_bucket: String,
    /// Cloud Storage 接口地址，使用模拟器时修改
    #[arg(long, env = "FIREBASE_STORAGE_ENDPOINT", default_value = crate::storage::DEFAULT_ENDPOINT)]
    pub storage_endpoint: String,
    /// Firestore REST 接口地址
    #[arg(long, env = "FIREBASE_DATABASE_URL", default_value = "https://firestore.googleapis.com/v1")]
    pub database_url: String,
    /// 服务账号密钥文件
    #[arg(long, env = "FIREBASE_CREDENTIALS", default_value = default_credentials())]
    pub credentials: PathBuf,
    /// 商品记录所在集合
    #[arg(long, default_value = "products")]
    pub collection: String,
}

/// 虚拟试穿服务参数
#[derive(Parser, Debug, Clone)]
pub struct TryOnOptions {
    /// 试穿服务地址
    #[arg(long, env = "TRYON_API_URL", default_value = "http://127.0.0.1:7860/")]
    pub api_url: String,
    /// 去噪步数
    #[arg(long, value_name = "N", default_value_t = 40)]
    pub denoise_steps: u32,
    /// 随机种子，-1 表示随机
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub seed: i64,
    /// 每件衣服生成的试穿图数量
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub backgrounds_per_garment: usize,
    /// 单次试穿请求的超时时间（秒）
    #[arg(long, value_name = "SECONDS", default_value_t = 600)]
    pub timeout: u64,
}

/// 素材目录
#[derive(Parser, Debug, Clone)]
pub struct DirOptions {
    /// 模特背景图目录
    #[arg(long, value_name = "DIR", default_value = "/IDM-VTON/people")]
    pub background_dir: PathBuf,
    /// 衣服图片目录
    #[arg(long, value_name = "DIR", default_value = "/IDM-VTON/garmets")]
    pub garment_dir: PathBuf,
    /// logo 图片目录
    #[arg(long, value_name = "DIR", default_value = "/IDM-VTON/logos")]
    pub logo_dir: PathBuf,
    /// 输出目录
    #[arg(short, long, value_name = "DIR", default_value = "/IDM-VTON/output")]
    pub output_dir: PathBuf,
    /// 扫描的文件后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = crate::utils::IMAGE_SUFFIX)]
    pub suffix: String,
}

/// 商品命名
#[derive(Parser, Debug, Clone)]
pub struct NamingOptions {
    /// 生成商品名的模型，格式为 provider/model
    #[arg(long, default_value = "anthropic/claude-3-haiku-20240307")]
    pub ai_model: String,
    /// 生成商品名的最大 token 数
    #[arg(long, default_value_t = 50)]
    pub max_tokens: u32,
    /// 模型服务的 API key，不填则使用模板命名
    #[arg(long, env = "AI_API_KEY", hide_env_values = true)]
    pub ai_api_key: Option<String>,
    /// 模型服务的接口地址，不填则使用 provider 的官方地址
    #[arg(long, env = "AI_API_URL")]
    pub ai_api_url: Option<String>,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "vton-factory", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 为每个 logo 挑选衣服、合成、试穿并上架
    Run(RunCommand),
    /// 随机挑选模特与衣服生成一张试穿图
    Tryon(TryonCommand),
    /// 调用文生图接口生成商品图
    Generate(GenerateCommand),
    /// 把 logo 合成到一件衣服上
    Composite(CompositeCommand),
    /// 显示图片的主色
    Colors(ColorsCommand),
}
