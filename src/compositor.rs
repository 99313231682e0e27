//! 把 logo 合成到衣服上

use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, RgbaImage};
use log::{debug, info};

use crate::color::{ColorProfile, Rgb, color_distance, dominant_colors};
use crate::config::CompositeOptions;
use crate::error::Result;
use crate::utils::file_name;

/// 抠图时重新提取的 logo 主色数量
const LOGO_COLORS: usize = 3;

pub struct Compositor {
    opts: CompositeOptions,
}

impl Compositor {
    pub fn new(opts: CompositeOptions) -> Self {
        Self { opts }
    }

    /// 计算 logo 缩放后的尺寸，保持宽高比
    ///
    /// 先按衣服高度的比例缩放，如果比衣服还宽，则改为按衣服宽度的比例缩放
    pub fn fit_logo(&self, logo: (u32, u32), garment: (u32, u32)) -> (u32, u32) {
        let aspect = logo.0 as f32 / logo.1 as f32;
        let mut height = (garment.1 as f32 * self.opts.resize_height_ratio) as u32;
        let mut width = (height as f32 * aspect) as u32;
        if width > garment.0 {
            width = (garment.0 as f32 * self.opts.max_width_ratio) as u32;
            height = (width as f32 / aspect) as u32;
        }
        (width.max(1), height.max(1))
    }

    /// 把缩放后的 logo 放到与衣服同样大小的透明画布上，中心位于 `center` 指定的比例处
    pub fn place_logo(&self, logo: &RgbaImage, garment: (u32, u32), center: (f32, f32)) -> RgbaImage {
        let (width, height) = self.fit_logo(logo.dimensions(), garment);
        let resized = imageops::resize(logo, width, height, FilterType::Lanczos3);

        let x = (garment.0 as f32 * center.0 - width as f32 / 2.0) as i64;
        let y = (garment.1 as f32 * center.1 - height as f32 / 2.0) as i64;
        debug!("logo 缩放到 {width}x{height}，偏移 ({x}, {y})");

        let mut canvas = RgbaImage::new(garment.0, garment.1);
        imageops::replace(&mut canvas, &resized, x, y);
        canvas
    }

    /// 根据 logo 主色决定是否抠图，返回需要抠掉的颜色
    ///
    /// 主色占比必须超过阈值；指定了期望颜色时，主色还必须与其足够接近
    pub fn mask_color(&self, profile: &ColorProfile, desired: Option<&Rgb>) -> Option<Rgb> {
        let top = profile.top()?;
        if top.frequency <= self.opts.mask_frequency_threshold {
            return None;
        }
        match desired {
            Some(desired)
                if color_distance(&top.color, desired) >= self.opts.color_distance_threshold =>
            {
                None
            }
            _ => Some(top.color),
        }
    }

    /// 把画布中与 `color` 距离不超过 `color_range` 的像素设为全透明
    pub fn apply_mask(&self, canvas: &mut RgbaImage, color: &Rgb) {
        for pixel in canvas.pixels_mut() {
            let [r, g, b, _] = pixel.0;
            if color_distance(&Rgb::from_u8([r, g, b]), color) <= self.opts.color_range {
                pixel.0[3] = 0;
            }
        }
    }

    /// 把 logo 合成到衣服上并保存到 `output`
    pub fn composite(
        &self,
        logo_path: &Path,
        garment_path: &Path,
        output: &Path,
        center: (f32, f32),
        desired: Option<&Rgb>,
    ) -> Result<PathBuf> {
        let logo = image::open(logo_path)?.to_rgba8();
        let mut garment = image::open(garment_path)?.to_rgba8();

        let mut canvas = self.place_logo(&logo, garment.dimensions(), center);

        let profile = dominant_colors(logo_path, LOGO_COLORS)?;
        let name = file_name(logo_path);
        match self.mask_color(&profile, desired) {
            Some(color) => {
                info!("按主色 {color} 抠图: {name}");
                self.apply_mask(&mut canvas, &color);
            }
            None => info!("保留完整 logo: {name}"),
        }

        imageops::overlay(&mut garment, &canvas, 0, 0);
        save_image(garment, output)?;
        Ok(output.to_path_buf())
    }
}

/// 保存图片，JPEG 不支持透明通道，需要先转换为 RGB
fn save_image(image: RgbaImage, output: &Path) -> Result<()> {
    match ImageFormat::from_path(output)? {
        ImageFormat::Jpeg => DynamicImage::ImageRgba8(image).to_rgb8().save(output)?,
        _ => image.save(output)?,
    }
    Ok(())
}
