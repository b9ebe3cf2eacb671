// 该文件是 Shanan （山南西风） 项目的一部分。
// src/detection.rs - 检测结果过滤与坐标映射
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
use ndarray::ArrayView3;
use thiserror::Error;
use tracing::debug;

use crate::model::DetectItem;

/// 检测张量最后一维的长度: (置信度, x1, y1, x2, y2)
pub const DETECTION_ITEM_LEN: usize = 5;

#[derive(Error, Debug, PartialEq)]
pub enum DetectionError {
  #[error("置信度阈值必须位于 (0, 1] 区间, 实际为 {0}")]
  InvalidThreshold(f32),
  #[error("检测张量最后一维长度应为 5, 实际为 {0}")]
  InvalidShape(usize),
  #[error("类别 {class_id} 没有对应的标签 (标签数量 {labels})")]
  MissingLabel { class_id: usize, labels: usize },
}

/// 置信度阈值，取值范围 (0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold(f32);

impl Threshold {
  pub fn new(value: f32) -> Result<Self, DetectionError> {
    if value > 0.0 && value <= 1.0 {
      Ok(Threshold(value))
    } else {
      Err(DetectionError::InvalidThreshold(value))
    }
  }

  pub fn value(&self) -> f32 {
    self.0
  }

  pub fn passes(&self, score: f32) -> bool {
    score >= self.0
  }
}

/// 标签表，不含背景类
///
/// 检测张量的类别轴在第 0 位放置背景，因此类别 `i` 对应标签 `i - 1`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
  names: Vec<String>,
}

impl LabelMap {
  pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
    LabelMap {
      names: names.into_iter().map(Into::into).collect(),
    }
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  /// 包含背景在内的类别数量
  pub fn num_classes(&self) -> usize {
    self.names.len() + 1
  }

  /// 背景类 (0) 返回 None
  pub fn label_for_class(&self, class_id: usize) -> Option<&str> {
    class_id
      .checked_sub(1)
      .and_then(|idx| self.names.get(idx))
      .map(String::as_str)
  }
}

/// 原图尺寸 (W, H, W, H)，用于把归一化坐标映射回像素坐标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale([f32; 4]);

impl Scale {
  pub fn new(width: f32, height: f32) -> Self {
    Scale([width, height, width, height])
  }

  pub fn of_image(image: &RgbImage) -> Self {
    let (width, height) = image.dimensions();
    Scale::new(width as f32, height as f32)
  }

  pub fn apply(&self, bbox: [f32; 4]) -> [f32; 4] {
    [
      bbox[0] * self.0[0],
      bbox[1] * self.0[1],
      bbox[2] * self.0[2],
      bbox[3] * self.0[3],
    ]
  }
}

/// 按置信度阈值过滤检测张量 `[C, K, 5]`，并将坐标映射到像素空间
///
/// 每个类别的候选框已按置信度降序排列，遇到第一个低于阈值的候选即停止该类别的扫描。
/// 背景类 (0) 不参与输出。结果按 (类别, 候选序号) 排序。
pub fn filter_detections(
  detections: ArrayView3<'_, f32>,
  scale: Scale,
  threshold: Threshold,
  labels: &LabelMap,
) -> Result<Vec<DetectItem>, DetectionError> {
  let (num_classes, top_k, item_len) = detections.dim();
  if item_len != DETECTION_ITEM_LEN {
    return Err(DetectionError::InvalidShape(item_len));
  }

  let mut items = Vec::new();
  for class_id in 1..num_classes {
    let mut slot = 0;
    while slot < top_k && threshold.passes(detections[[class_id, slot, 0]]) {
      let label = labels
        .label_for_class(class_id)
        .ok_or(DetectionError::MissingLabel {
          class_id,
          labels: labels.len(),
        })?;
      let bbox = [
        detections[[class_id, slot, 1]],
        detections[[class_id, slot, 2]],
        detections[[class_id, slot, 3]],
        detections[[class_id, slot, 4]],
      ];
      items.push(DetectItem {
        class_id,
        label: label.to_string(),
        score: detections[[class_id, slot, 0]],
        bbox: scale.apply(bbox),
      });
      slot += 1;
    }
  }

  debug!("阈值 {} 下保留 {} 个检测框", threshold.value(), items.len());
  Ok(items)
}
