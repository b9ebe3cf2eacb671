// 该文件是 Shanan （山南西风） 项目的一部分。
// src/frame.rs - 输入图像预处理
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

use image::{RgbImage, imageops::FilterType};
use ndarray::Array4;

pub const SSD_INPUT_SIZE: u32 = 300;
/// BGR 顺序的通道均值
pub const SSD_MEAN_BGR: [f32; 3] = [104.0, 117.0, 123.0];

const BGR_CHANNELS: usize = 3;

/// SSD 的基础变换：缩放到 size x size，转为 BGR 并减去均值，输出 NCHW 张量
#[derive(Debug, Clone, PartialEq)]
pub struct BaseTransform {
  size: u32,
  mean: [f32; 3],
}

impl Default for BaseTransform {
  fn default() -> Self {
    BaseTransform {
      size: SSD_INPUT_SIZE,
      mean: SSD_MEAN_BGR,
    }
  }
}

impl BaseTransform {
  pub fn new(size: u32, mean: [f32; 3]) -> Self {
    BaseTransform { size, mean }
  }

  pub fn size(&self) -> u32 {
    self.size
  }

  /// 输出形状为 [1, 3, size, size]
  pub fn apply(&self, image: &RgbImage) -> Array4<f32> {
    let size = self.size as usize;
    let resized = if image.dimensions() == (self.size, self.size) {
      image.clone()
    } else {
      image::imageops::resize(image, self.size, self.size, FilterType::Triangle)
    };

    Array4::from_shape_fn((1, BGR_CHANNELS, size, size), |(_, c, y, x)| {
      let pixel = resized.get_pixel(x as u32, y as u32);
      // RGB -> BGR
      let value = pixel[BGR_CHANNELS - 1 - c];
      value as f32 - self.mean[c]
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn output_is_nchw_bgr_minus_mean() {
    let image = RgbImage::from_pixel(4, 4, Rgb([10, 20, 30]));
    let transform = BaseTransform::new(4, [1.0, 2.0, 3.0]);
    let tensor = transform.apply(&image);

    assert_eq!(tensor.shape(), &[1, 3, 4, 4]);
    // 通道 0 为 B
    assert_eq!(tensor[[0, 0, 2, 1]], 30.0 - 1.0);
    assert_eq!(tensor[[0, 1, 0, 0]], 20.0 - 2.0);
    assert_eq!(tensor[[0, 2, 3, 3]], 10.0 - 3.0);
  }

  #[test]
  fn resizes_to_square_input() {
    let image = RgbImage::from_pixel(37, 11, Rgb([200, 100, 50]));
    let tensor = BaseTransform::default().apply(&image);

    assert_eq!(tensor.shape(), &[1, 3, 300, 300]);
    assert_eq!(tensor[[0, 0, 150, 150]], 50.0 - 104.0);
  }
}
