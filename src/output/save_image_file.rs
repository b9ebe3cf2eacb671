// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::{
  dataset::Sample,
  model::DetectResult,
  output::{Render, draw::Draw},
};

const SAVE_IMAGE_EXT: &str = "png";

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
}

/// 把检测结果绘制到原图上，保存为 `<directory>/<image_id>.png`
pub struct SaveImageOutput {
  directory: PathBuf,
  draw: Draw,
}

impl SaveImageOutput {
  pub fn new(directory: impl AsRef<Path>) -> Self {
    SaveImageOutput {
      directory: directory.as_ref().to_path_buf(),
      draw: Draw::default(),
    }
  }

  pub fn with_draw(mut self, draw: Draw) -> Self {
    self.draw = draw;
    self
  }

  pub fn image_path(&self, image_id: &str) -> PathBuf {
    self
      .directory
      .join(format!("{}.{}", image_id, SAVE_IMAGE_EXT))
  }

  fn save_image(&self, path: &Path, image: image::RgbImage) -> Result<(), SaveImageFileError> {
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    image.save(path)?;

    debug!("保存图像到文件: {}", path.display());

    Ok(())
  }
}

impl Render<Sample, DetectResult> for SaveImageOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, frame: &Sample, result: &DetectResult) -> Result<(), Self::Error> {
    let image = self.draw.draw_detection(frame, result);
    let path = self.image_path(&frame.annotation.image_id);
    self.save_image(&path, image)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::dataset::Annotation;
  use image::{Rgb, RgbImage};

  #[test]
  fn saves_under_image_id_with_subdirectories() {
    let dir = tempfile::tempdir().unwrap();
    let output = SaveImageOutput::new(dir.path());
    let sample = Sample {
      annotation: Annotation {
        image_id: "Borcherds86/3".to_string(),
        boxes: vec![],
      },
      image: RgbImage::from_pixel(8, 8, Rgb([255, 255, 255])),
    };
    let result = DetectResult {
      items: Box::new([]),
      priors: None,
    };

    output.render_result(&sample, &result).unwrap();

    let path = dir.path().join("Borcherds86/3.png");
    assert!(path.is_file());
    let saved = image::open(&path).unwrap().into_rgb8();
    assert_eq!(saved.dimensions(), (8, 8));
  }
}
