// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/ssd.rs - SSD 模型 (ONNX Runtime)
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
use std::sync::Mutex;

use ndarray::{Array2, Array3, Array4};
use ort::execution_providers::CUDAExecutionProvider;
use ort::session::Session;
use ort::value::TensorRef;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::model::{DebugPriors, Device, Model, SsdOutput};

const SSD_NUM_INPUTS: usize = 1;
/// 仅检测张量，或检测张量 + 调试先验框 + 先验得分
const SSD_NUM_OUTPUTS: [usize; 2] = [1, 3];
const SSD_DETECTION_ITEM_LEN: usize = 5;
const SSD_PRIOR_BOX_LEN: usize = 4;

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("模型文件不存在: {0}")]
  ModelNotFound(PathBuf),
  #[error("ONNX Runtime 错误: {0}")]
  OrtError(#[from] ort::Error),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("输出 {name} 形状错误: {shape:?}")]
  OutputShape { name: String, shape: Vec<i64> },
  #[error("类别数量不匹配: 期望 {expected}, 实际 {actual}")]
  ClassMismatch { expected: usize, actual: usize },
  #[error("张量形状错误: {0}")]
  ShapeError(#[from] ndarray::ShapeError),
  #[error("推理会话锁已损坏")]
  SessionPoisoned,
}

pub struct SsdBuilder {
  model_path: PathBuf,
  device: Device,
  num_classes: usize,
}

impl SsdBuilder {
  pub fn new(model_path: impl AsRef<Path>) -> Self {
    SsdBuilder {
      model_path: model_path.as_ref().to_path_buf(),
      device: Device::Cpu,
      num_classes: 2,
    }
  }

  pub fn device(mut self, device: Device) -> Self {
    self.device = device;
    self
  }

  /// 包含背景类
  pub fn num_classes(mut self, num_classes: usize) -> Self {
    self.num_classes = num_classes;
    self
  }

  pub fn build(self) -> Result<SsdOnnx, ModelError> {
    if !self.model_path.is_file() {
      error!("模型文件不存在: {}", self.model_path.display());
      return Err(ModelError::ModelNotFound(self.model_path));
    }

    info!("加载模型文件: {}", self.model_path.display());
    let mut builder = Session::builder()?;
    if let Device::Cuda { device_id } = self.device {
      info!("使用 CUDA 设备 {}", device_id);
      builder = builder.with_execution_providers([CUDAExecutionProvider::default()
        .with_device_id(device_id)
        .build()])?;
    }
    let session = builder.commit_from_file(&self.model_path)?;
    info!("模型加载完成");

    let num_inputs = session.inputs.len();
    let num_outputs = session.outputs.len();
    debug!("模型输入数量: {}", num_inputs);
    debug!("模型输出数量: {}", num_outputs);

    if num_inputs != SSD_NUM_INPUTS {
      error!("预期模型输入数量为 {}, 实际为 {}", SSD_NUM_INPUTS, num_inputs);
      return Err(ModelError::ModelInvalid(format!(
        "预期模型输入数量为 {}, 实际为 {}",
        SSD_NUM_INPUTS, num_inputs
      )));
    }

    if !SSD_NUM_OUTPUTS.contains(&num_outputs) {
      error!("预期模型输出数量为 {:?}, 实际为 {}", SSD_NUM_OUTPUTS, num_outputs);
      return Err(ModelError::ModelInvalid(format!(
        "预期模型输出数量为 {:?}, 实际为 {}",
        SSD_NUM_OUTPUTS, num_outputs
      )));
    }

    let input_name = session.inputs[0].name.clone();
    let output_names = session.outputs.iter().map(|o| o.name.clone()).collect();

    Ok(SsdOnnx {
      session: Mutex::new(session),
      input_name,
      output_names,
      num_classes: self.num_classes,
    })
  }
}

pub struct SsdOnnx {
  session: Mutex<Session>,
  input_name: String,
  output_names: Vec<String>,
  num_classes: usize,
}

impl SsdOnnx {
  pub fn num_classes(&self) -> usize {
    self.num_classes
  }
}

fn dims(shape: &[i64]) -> Vec<usize> {
  shape.iter().map(|&d| d.max(0) as usize).collect()
}

/// [1, C, K, 5] 或 [C, K, 5] -> (C, K)
fn detection_dims(name: &str, shape: &[i64]) -> Result<(usize, usize), ModelError> {
  let shape_error = || ModelError::OutputShape {
    name: name.to_string(),
    shape: shape.to_vec(),
  };
  match dims(shape).as_slice() {
    [1, c, k, SSD_DETECTION_ITEM_LEN] | [c, k, SSD_DETECTION_ITEM_LEN] => Ok((*c, *k)),
    _ => Err(shape_error()),
  }
}

/// [1, N, D] 或 [N, D] -> (N, D)
fn matrix_dims(name: &str, shape: &[i64]) -> Result<(usize, usize), ModelError> {
  match dims(shape).as_slice() {
    [1, n, d] | [n, d] => Ok((*n, *d)),
    _ => Err(ModelError::OutputShape {
      name: name.to_string(),
      shape: shape.to_vec(),
    }),
  }
}

impl Model for SsdOnnx {
  type Input = Array4<f32>;
  type Output = SsdOutput;
  type Error = ModelError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("设置模型输入: {:?}", input.shape());
    let input = input.as_standard_layout();
    let input_tensor = TensorRef::from_array_view(&input)?;

    let mut session = self
      .session
      .lock()
      .map_err(|_| ModelError::SessionPoisoned)?;

    debug!("执行模型推理");
    let outputs = session.run(ort::inputs![self.input_name.as_str() => input_tensor])?;

    debug!("获取模型输出");
    let name = self.output_names[0].as_str();
    let (shape, data) = outputs[name].try_extract_tensor::<f32>()?;
    let (num_classes, top_k) = detection_dims(name, shape)?;
    if num_classes != self.num_classes {
      error!("类别数量不匹配: 期望 {}, 实际 {}", self.num_classes, num_classes);
      return Err(ModelError::ClassMismatch {
        expected: self.num_classes,
        actual: num_classes,
      });
    }
    let detections = Array3::from_shape_vec(
      (num_classes, top_k, SSD_DETECTION_ITEM_LEN),
      data.to_vec(),
    )?;

    let priors = if self.output_names.len() == 3 {
      let box_name = self.output_names[1].as_str();
      let (shape, data) = outputs[box_name].try_extract_tensor::<f32>()?;
      let (num_priors, box_len) = matrix_dims(box_name, shape)?;
      if box_len != SSD_PRIOR_BOX_LEN {
        return Err(ModelError::OutputShape {
          name: box_name.to_string(),
          shape: shape.to_vec(),
        });
      }
      let boxes = Array2::from_shape_vec((num_priors, box_len), data.to_vec())?;

      let score_name = self.output_names[2].as_str();
      let (shape, data) = outputs[score_name].try_extract_tensor::<f32>()?;
      let (score_rows, score_cols) = matrix_dims(score_name, shape)?;
      if score_rows != num_priors {
        return Err(ModelError::OutputShape {
          name: score_name.to_string(),
          shape: shape.to_vec(),
        });
      }
      let scores = Array2::from_shape_vec((score_rows, score_cols), data.to_vec())?;
      debug!("调试先验框数量: {}", num_priors);
      Some(DebugPriors { boxes, scores })
    } else {
      None
    };

    Ok(SsdOutput { detections, priors })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn detection_output_accepts_batch_axis() {
    assert_eq!(detection_dims("out", &[1, 2, 200, 5]).unwrap(), (2, 200));
    assert_eq!(detection_dims("out", &[2, 200, 5]).unwrap(), (2, 200));
  }

  #[test]
  fn detection_output_rejects_bad_shape() {
    assert!(detection_dims("out", &[2, 2, 200, 5]).is_err());
    assert!(detection_dims("out", &[1, 2, 200, 4]).is_err());
    assert!(detection_dims("out", &[200, 5]).is_err());
  }

  #[test]
  fn missing_checkpoint_fails_fast() {
    let err = SsdBuilder::new("/nonexistent/ssd300_GTDB.onnx")
      .build()
      .err()
      .unwrap();
    assert!(matches!(err, ModelError::ModelNotFound(_)));
  }
}
