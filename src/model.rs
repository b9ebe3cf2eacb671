// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model.rs - 模型
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

use ndarray::{Array2, Array3};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 推理设备，由调用方显式传给模型加载器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
  #[default]
  Cpu,
  Cuda {
    device_id: i32,
  },
}

/// 网络输出的调试先验框
#[derive(Debug, Clone)]
pub struct DebugPriors {
  /// [N, 4] 归一化坐标 (x1, y1, x2, y2)
  pub boxes: Array2<f32>,
  /// [N, C] 每个先验框的各类别得分
  pub scores: Array2<f32>,
}

/// SSD 单张图像的原始输出
#[derive(Debug, Clone)]
pub struct SsdOutput {
  /// [C, K, 5]，最后一维为 (置信度, x1, y1, x2, y2)
  pub detections: Array3<f32>,
  pub priors: Option<DebugPriors>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem {
  pub class_id: usize,
  pub label: String,
  pub score: f32,
  pub bbox: [f32; 4], // 像素坐标 [x_min, y_min, x_max, y_max]
}

#[derive(Debug, Clone)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
  pub priors: Option<DebugPriors>,
}

mod ssd;
pub use self::ssd::{ModelError, SsdBuilder, SsdOnnx};
