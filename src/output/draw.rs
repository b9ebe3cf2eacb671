// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
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

use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};

use crate::{dataset::Sample, detection::Scale, model::DetectResult};

const BOX_THICKNESS: i32 = 2;
const PREDICTION_COLOR: [u8; 3] = [0, 0, 255]; // 蓝色
const GROUND_TRUTH_COLOR: [u8; 3] = [0, 200, 0]; // 绿色
const PRIOR_COLOR: [u8; 3] = [255, 140, 0]; // 橙色

pub struct Draw {
  thickness: i32,
  prediction_color: [u8; 3],
  ground_truth_color: [u8; 3],
  prior_color: [u8; 3],
  /// 先验框在任一前景类别上的得分达到该值才绘制
  prior_threshold: f32,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      thickness: BOX_THICKNESS,
      prediction_color: PREDICTION_COLOR,
      ground_truth_color: GROUND_TRUTH_COLOR,
      prior_color: PRIOR_COLOR,
      prior_threshold: 0.6,
    }
  }
}

impl Draw {
  pub fn with_prior_threshold(mut self, threshold: f32) -> Self {
    self.prior_threshold = threshold;
    self
  }

  /// 在图像上绘制一个矩形边框，bbox 为像素坐标 [x_min, y_min, x_max, y_max]
  pub fn draw_bbox(&self, image: &mut RgbImage, bbox: &[f32], color: [u8; 3]) {
    if bbox.len() < 4 || image.width() == 0 || image.height() == 0 {
      return;
    }
    let (w, h) = (image.width() as i32, image.height() as i32);

    let x_min = (bbox[0].floor() as i32).clamp(0, w - 1);
    let y_min = (bbox[1].floor() as i32).clamp(0, h - 1);
    let x_max = (bbox[2].ceil() as i32).clamp(0, w - 1);
    let y_max = (bbox[3].ceil() as i32).clamp(0, h - 1);

    if x_min >= x_max || y_min >= y_max {
      return;
    }

    for t in 0..self.thickness {
      let (x0, y0, x1, y1) = (x_min + t, y_min + t, x_max - t, y_max - t);
      if x0 >= x1 || y0 >= y1 {
        break;
      }
      let rect = Rect::at(x0, y0).of_size((x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32);
      draw_hollow_rect_mut(image, rect, Rgb(color));
    }
  }

  /// 依次绘制调试先验框、真值框和预测框
  pub fn draw_detection(&self, sample: &Sample, result: &DetectResult) -> RgbImage {
    let mut image = sample.image.clone();
    let scale = Scale::of_image(&image);

    if let Some(priors) = &result.priors {
      for (bbox, scores) in priors.boxes.rows().into_iter().zip(priors.scores.rows()) {
        let best = scores
          .iter()
          .skip(1)
          .copied()
          .fold(f32::NEG_INFINITY, f32::max);
        if best >= self.prior_threshold {
          let bbox = scale.apply([bbox[0], bbox[1], bbox[2], bbox[3]]);
          self.draw_bbox(&mut image, &bbox, self.prior_color);
        }
      }
    }

    for gt in &sample.annotation.boxes {
      self.draw_bbox(&mut image, gt, self.ground_truth_color);
    }

    for item in result.items.iter() {
      self.draw_bbox(&mut image, &item.bbox, self.prediction_color);
    }

    image
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    dataset::Annotation,
    model::{DebugPriors, DetectItem},
  };
  use ndarray::array;

  fn blank_sample(boxes: Vec<Vec<f32>>) -> Sample {
    Sample {
      annotation: Annotation {
        image_id: "page".to_string(),
        boxes,
      },
      image: RgbImage::from_pixel(40, 30, Rgb([255, 255, 255])),
    }
  }

  #[test]
  fn prediction_box_is_drawn_with_thickness() {
    let sample = blank_sample(vec![]);
    let result = DetectResult {
      items: vec![DetectItem {
        class_id: 1,
        label: "math".to_string(),
        score: 0.9,
        bbox: [5.0, 5.0, 20.0, 15.0],
      }]
      .into_boxed_slice(),
      priors: None,
    };
    let image = Draw::default().draw_detection(&sample, &result);

    assert_eq!(image.get_pixel(5, 5), &Rgb(PREDICTION_COLOR));
    assert_eq!(image.get_pixel(6, 6), &Rgb(PREDICTION_COLOR));
    assert_eq!(image.get_pixel(20, 15), &Rgb(PREDICTION_COLOR));
    assert_eq!(image.get_pixel(12, 10), &Rgb([255, 255, 255]));
    assert_eq!(image.get_pixel(7, 7), &Rgb([255, 255, 255]));
  }

  #[test]
  fn ground_truth_and_priors_use_own_colors() {
    let sample = blank_sample(vec![vec![1.0, 1.0, 10.0, 10.0]]);
    let result = DetectResult {
      items: Box::new([]),
      priors: Some(DebugPriors {
        // 归一化坐标
        boxes: array![[0.5, 0.5, 0.9, 0.9], [0.0, 0.0, 0.2, 0.2]],
        scores: array![[0.1, 0.8], [0.9, 0.1]],
      }),
    };
    let image = Draw::default().draw_detection(&sample, &result);

    assert_eq!(image.get_pixel(1, 1), &Rgb(GROUND_TRUTH_COLOR));
    assert_eq!(image.get_pixel(20, 15), &Rgb(PRIOR_COLOR));
    // 第二个先验框只有背景得分高，不绘制
    assert_eq!(image.get_pixel(0, 0), &Rgb([255, 255, 255]));
  }

  #[test]
  fn degenerate_box_is_ignored() {
    let mut image = RgbImage::from_pixel(10, 10, Rgb([255, 255, 255]));
    Draw::default().draw_bbox(&mut image, &[5.0, 5.0, 5.0, 8.0], PREDICTION_COLOR);
    Draw::default().draw_bbox(&mut image, &[1.0, 2.0], PREDICTION_COLOR);
    assert!(image.pixels().all(|p| *p == Rgb([255, 255, 255])));
  }
}
