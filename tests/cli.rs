use std::path::Path;
use std::process::Command;

use anyhow::Result;
use assert_cmd::prelude::*;
use image::{Rgb, RgbImage, Rgba, RgbaImage};
use predicates::prelude::*;
use rstest::*;

macro_rules! cargo_run {
    ($cmd:expr, $($args:expr),*) => {
        {
            let mut cmd = Command::cargo_bin($cmd)?;
            $(cmd.arg($args);)*
            cmd.assert()
        }
    };
}

fn solid(path: &Path, color: [u8; 3]) -> Result<()> {
    RgbImage::from_pixel(64, 64, Rgb(color)).save(path)?;
    Ok(())
}

/// 红底、中间一块蓝色、角落一块绿色的 logo
fn logo(path: &Path) -> Result<()> {
    let mut img = RgbaImage::from_pixel(40, 40, Rgba([255, 0, 0, 255]));
    for y in 12..28 {
        for x in 12..28 {
            img.put_pixel(x, y, Rgba([0, 0, 255, 255]));
        }
    }
    for y in 0..6 {
        for x in 34..40 {
            img.put_pixel(x, y, Rgba([0, 255, 0, 255]));
        }
    }
    img.save(path)?;
    Ok(())
}

#[test]
fn colors_table() -> Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let image = dir.path().join("red.png");
    solid(&image, [255, 0, 0])?;

    cargo_run!("vton-factory", "colors", &image, "-n", "1")
        .success()
        .stdout(predicate::str::contains("#ff0000\t1.0000"));
    Ok(())
}

#[test]
fn colors_json() -> Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let image = dir.path().join("logo.png");
    logo(&image)?;

    let output = cargo_run!("vton-factory", "colors", &image, "--output-format", "json").success();
    let profile: serde_json::Value = serde_json::from_slice(&output.get_output().stdout)?;
    let colors = profile.as_array().unwrap();
    assert_eq!(colors.len(), 3);

    let total: f64 = colors.iter().map(|c| c["frequency"].as_f64().unwrap()).sum();
    assert!((total - 1.0).abs() < 1e-3);
    // 按占比降序，红色最多
    assert!(colors[0]["color"][0].as_f64().unwrap() > 200.0);
    Ok(())
}

#[test]
fn colors_too_many_clusters() -> Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let image = dir.path().join("gray.png");
    solid(&image, [128, 128, 128])?;

    cargo_run!("vton-factory", "colors", &image, "-n", "4")
        .failure()
        .stderr(predicate::str::contains("聚类中心数量 4"));
    Ok(())
}

#[rstest]
#[case::png("out.png")]
#[case::jpeg("out.jpg")]
#[case::webp("out.webp")]
fn composite(#[case] output: &str) -> Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let logo_path = dir.path().join("logo.png");
    let garment = dir.path().join("garment.png");
    let output = dir.path().join(output);
    logo(&logo_path)?;
    solid(&garment, [255, 255, 255])?;

    cargo_run!("vton-factory", "composite", &logo_path, &garment, &output)
        .success()
        .stdout(predicate::str::contains(output.to_str().unwrap()));

    let result = image::open(&output)?;
    assert_eq!((result.width(), result.height()), (64, 64));
    Ok(())
}

#[rstest]
#[case::named("red")]
#[case::short_hex("#fff")]
#[case::out_of_range("256,0,0")]
fn composite_invalid_color(#[case] color: &str) -> Result<()> {
    cargo_run!("vton-factory", "composite", "a.png", "b.png", "c.png", "--desired-color", color)
        .failure()
        .stderr(predicate::str::contains("无效的颜色"));
    Ok(())
}

#[test]
fn run_without_credentials() -> Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let credentials = dir.path().join("missing.json");

    Command::cargo_bin("vton-factory")?
        .env_remove("FIREBASE_CREDENTIALS")
        .args(["run", "--credentials"])
        .arg(&credentials)
        .arg("-o")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("IO 错误"));
    Ok(())
}

#[test]
fn generate_without_api_key() -> Result<()> {
    let dir = assert_fs::TempDir::new()?;

    Command::cargo_bin("vton-factory")?
        .env_remove("STABILITY_API_KEY")
        .args(["generate", "a red hoodie", "-o"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("STABILITY_API_KEY"));
    Ok(())
}
