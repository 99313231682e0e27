//! 主色提取与颜色距离

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use image::DynamicImage;
use image::imageops::FilterType;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::kmeans::color_kmeans;

/// 采样前将图片缩放到的边长
pub const SAMPLE_SIZE: u32 = 100;
const MAX_ITER: usize = 300;

/// RGB 颜色，分量范围 0 ~ 255
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rgb(pub [f32; 3]);

impl Rgb {
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self([r, g, b])
    }

    pub fn from_u8(rgb: [u8; 3]) -> Self {
        Self(rgb.map(f32::from))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0.map(|c| c.round().clamp(0.0, 255.0) as u8);
        write!(f, "#{r:02x}{g:02x}{b:02x}")
    }
}

impl FromStr for Rgb {
    type Err = String;

    /// 解析 `#rrggbb` 或 `r,g,b` 格式
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            if hex.len() != 6 || !hex.is_ascii() {
                return Err(format!("无效的颜色: {s}"));
            }
            let mut rgb = [0u8; 3];
            for (i, c) in rgb.iter_mut().enumerate() {
                *c = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                    .map_err(|_| format!("无效的颜色: {s}"))?;
            }
            return Ok(Self::from_u8(rgb));
        }
        let parts = s.split(',').map(|p| p.trim().parse::<u8>()).collect::<Vec<_>>();
        match parts.as_slice() {
            [Ok(r), Ok(g), Ok(b)] => Ok(Self::from_u8([*r, *g, *b])),
            _ => Err(format!("无效的颜色: {s}")),
        }
    }
}

/// 聚类得到的一种主色及其占比
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DominantColor {
    pub color: Rgb,
    /// 距离该中心最近的采样像素占比
    pub frequency: f32,
}

/// 按占比降序排列的主色列表
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ColorProfile(Vec<DominantColor>);

impl ColorProfile {
    /// 使用给定的颜色构建，会按占比降序重新排序
    pub fn new(mut colors: Vec<DominantColor>) -> Self {
        colors.sort_by(|a, b| b.frequency.total_cmp(&a.frequency));
        Self(colors)
    }

    pub fn colors(&self) -> &[DominantColor] {
        &self.0
    }

    /// 占比最高的颜色
    pub fn top(&self) -> Option<&DominantColor> {
        self.0.first()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 占比不低于阈值的颜色
    pub fn prominent(&self, frequency_threshold: f32) -> impl Iterator<Item = &DominantColor> {
        self.0.iter().filter(move |c| c.frequency >= frequency_threshold)
    }
}

/// 两个颜色在 RGB 空间中的欧氏距离
pub fn color_distance(a: &Rgb, b: &Rgb) -> f32 {
    a.0.iter().zip(b.0.iter()).map(|(x, y)| (x - y).powi(2)).sum::<f32>().sqrt()
}

/// 返回距离 target 最近的候选颜色的下标，距离相同时取靠前的
pub fn find_closest_index(target: &Rgb, candidates: &[Rgb]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, c) in candidates.iter().enumerate() {
        let d = color_distance(target, c);
        if best.is_none_or(|(_, bd)| d < bd) {
            best = Some((i, d));
        }
    }
    best.map(|(i, _)| i)
}

/// 返回距离 target 最近的候选颜色
pub fn find_closest<'a>(target: &Rgb, candidates: &'a [Rgb]) -> Option<&'a Rgb> {
    find_closest_index(target, candidates).map(|i| &candidates[i])
}

/// 读取图片并提取 n 种主色
pub fn dominant_colors(path: impl AsRef<Path>, n: usize) -> Result<ColorProfile> {
    let img = image::open(path.as_ref())?;
    dominant_colors_of(&img, n)
}

/// 提取 n 种主色：缩放到 100x100，丢弃 alpha 后做 kmeans 聚类
pub fn dominant_colors_of(img: &DynamicImage, n: usize) -> Result<ColorProfile> {
    let sample = img.resize_exact(SAMPLE_SIZE, SAMPLE_SIZE, FilterType::Triangle).to_rgb8();
    let pixels = sample.pixels().map(|p| Rgb::from_u8(p.0)).collect::<Vec<_>>();

    let mut distinct = pixels.iter().map(|p| p.0.map(|c| c as u8)).collect::<Vec<_>>();
    distinct.sort_unstable();
    distinct.dedup();
    if n == 0 || n > distinct.len() {
        return Err(Error::TooFewColors { clusters: n, distinct: distinct.len() });
    }

    let flat = pixels.iter().flat_map(|p| p.0).collect::<Vec<_>>();
    let centers = color_kmeans(&flat, n, MAX_ITER).into_iter().map(Rgb).collect::<Vec<_>>();

    let mut counts = vec![0usize; centers.len()];
    for p in &pixels {
        if let Some(i) = find_closest_index(p, &centers) {
            counts[i] += 1;
        }
    }

    let total = pixels.len() as f32;
    let colors = centers
        .into_iter()
        .zip(counts)
        .map(|(color, count)| DominantColor { color, frequency: count as f32 / total })
        .collect();
    Ok(ColorProfile::new(colors))
}
