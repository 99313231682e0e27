use std::path::{Path, PathBuf};

use indicatif::ProgressStyle;
use rand::distr::{Alphanumeric, SampleString};
use regex::Regex;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// 默认识别的图片后缀名
pub const IMAGE_SUFFIX: &str = "png,jpg,jpeg,webp";

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        .expect("invalid progress template")
        .progress_chars("#>-")
}

/// 根据逗号分隔的后缀名列表构建忽略大小写的匹配正则
pub fn suffix_regex(suffix: &str) -> Regex {
    let alts = suffix.split(',').map(|s| regex::escape(s.trim())).collect::<Vec<_>>();
    let re = format!("(?i)^({})$", alts.join("|"));
    Regex::new(&re).expect("failed to build regex")
}

/// 列出目录下（不递归）所有后缀匹配的图片，按文件名排序
pub fn list_images(dir: impl AsRef<Path>, suffix: &Regex) -> Result<Vec<PathBuf>> {
    let mut images = vec![];
    for entry in WalkDir::new(dir.as_ref()).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        if path.extension().map(|s| suffix.is_match(&s.to_string_lossy())) == Some(true) {
            images.push(path);
        }
    }
    Ok(images)
}

/// 同 [`list_images`]，但空目录视为错误
pub fn require_images(dir: impl AsRef<Path>, suffix: &Regex) -> Result<Vec<PathBuf>> {
    let images = list_images(dir.as_ref(), suffix)?;
    if images.is_empty() {
        return Err(Error::EmptyDirectory(dir.as_ref().to_path_buf()));
    }
    Ok(images)
}

/// 文件名去掉后缀名的部分
pub fn file_stem(path: &Path) -> String {
    path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
}

/// 文件名（含后缀名）
pub fn file_name(path: &Path) -> String {
    path.file_name().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
}

/// 生成指定长度的随机小写字母数字串
pub fn random_name(len: usize) -> String {
    Alphanumeric.sample_string(&mut rand::rng(), len).to_ascii_lowercase()
}
