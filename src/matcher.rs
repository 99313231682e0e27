use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressIterator};
use log::info;
use rand::Rng;
use rand::seq::IndexedRandom;

use crate::color::{ColorProfile, color_distance, dominant_colors};
use crate::error::Result;
use crate::utils::{file_name, pb_style};

/// 一件衣服及其主色，每次运行只计算一次
#[derive(Debug, Clone)]
pub struct GarmentRecord {
    pub path: PathBuf,
    pub profile: ColorProfile,
}

/// 预先计算所有衣服的主色
pub fn analyze_garments(paths: &[PathBuf], n_colors: usize) -> Result<Vec<GarmentRecord>> {
    info!("分析 {} 件衣服的主色", paths.len());
    let pb = ProgressBar::new(paths.len() as u64).with_style(pb_style());
    let mut garments = Vec::with_capacity(paths.len());
    for path in paths.iter().progress_with(pb.clone()) {
        pb.set_message(file_name(path));
        let profile = dominant_colors(path, n_colors)?;
        garments.push(GarmentRecord { path: path.clone(), profile });
    }
    pb.finish_with_message("主色分析完成");
    Ok(garments)
}

/// 挑选与 logo 颜色相近的衣服
///
/// 外层按占比降序遍历 logo 的主色，内层按原顺序遍历衣服的主色，两者都会跳过占比低于
/// `frequency_threshold` 的颜色。距离小于 `color_threshold` 时加入结果，凑满 `count`
/// 件立即返回。同一件衣服可能因为多组颜色相近被重复加入。
///
/// 数量不足时，从尚未入选的衣服中不放回地随机补足；剩余衣服不够时全部加入。
pub fn select_matching_garments<'a, R: Rng + ?Sized>(
    logo: &ColorProfile,
    garments: &'a [GarmentRecord],
    count: usize,
    color_threshold: f32,
    frequency_threshold: f32,
    rng: &mut R,
) -> Vec<&'a Path> {
    let mut matches: Vec<&Path> = vec![];
    if count == 0 {
        return matches;
    }

    for logo_color in logo.prominent(frequency_threshold) {
        for garment in garments {
            for garment_color in garment.profile.prominent(frequency_threshold) {
                if color_distance(&logo_color.color, &garment_color.color) < color_threshold {
                    matches.push(&garment.path);
                    if matches.len() == count {
                        return matches;
                    }
                }
            }
        }
    }

    let remaining = garments
        .iter()
        .map(|g| g.path.as_path())
        .filter(|p| !matches.contains(p))
        .collect::<Vec<_>>();
    let need = count - matches.len();
    matches.extend(remaining.choose_multiple(rng, need).copied());
    matches
}
