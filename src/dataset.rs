// 该文件是 Shanan （山南西风） 项目的一部分。
// src/dataset.rs - 测试数据集
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

use image::RgbImage;

/// 一张图像的标注真值
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotation {
  pub image_id: String,
  /// 每个真值框的数值 (x1, y1, x2, y2, ...)
  pub boxes: Vec<Vec<f32>>,
}

#[derive(Debug, Clone)]
pub struct Sample {
  pub annotation: Annotation,
  pub image: RgbImage,
}

pub trait Dataset {
  type Error;

  fn len(&self) -> usize;

  fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn get(&self, index: usize) -> Result<Sample, Self::Error>;
}

mod gtdb;
pub use self::gtdb::{DatasetError, GtdbDataset};
