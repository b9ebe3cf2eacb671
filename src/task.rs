// 该文件是 Shanan （山南西风） 项目的一部分。
// src/task.rs - 评估任务
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

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ndarray::Array4;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
  dataset::{Dataset, Sample},
  detection::{DetectionError, LabelMap, Scale, Threshold, filter_detections},
  frame::BaseTransform,
  model::{DetectResult, Model, SsdOutput},
  output::{DetectionReport, REPORT_FILE_NAME, Render, ReportError},
};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub trait Task<D, M, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, dataset: D, model: M, output: O) -> Result<Self::Output, Self::Error>;
}

#[derive(Error, Debug)]
pub enum TaskError {
  #[error("无法创建输出目录 {path}: {source}")]
  SaveFolder {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("结果文件错误: {0}")]
  Report(#[from] ReportError),
  #[error("检测后处理错误: {0}")]
  Detection(#[from] DetectionError),
  #[error("第 {index} 张图像读取失败: {source}")]
  Dataset {
    index: usize,
    #[source]
    source: BoxError,
  },
  #[error("第 {index} 张图像推理失败: {source}")]
  Model {
    index: usize,
    #[source]
    source: BoxError,
  },
  #[error("第 {index} 张图像绘制失败: {source}")]
  Render {
    index: usize,
    #[source]
    source: BoxError,
  },
}

impl TaskError {
  /// 只影响单张图像的错误，可以跳过该图像继续评估
  pub fn is_per_image(&self) -> bool {
    matches!(
      self,
      TaskError::Dataset { .. } | TaskError::Model { .. } | TaskError::Render { .. }
    )
  }
}

#[derive(Debug, Clone)]
pub struct EvaluationConfig {
  pub save_folder: PathBuf,
  pub threshold: Threshold,
  pub labels: LabelMap,
  pub transform: BaseTransform,
  /// None 表示评估全部图像
  pub limit: Option<usize>,
  pub fail_fast: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationSummary {
  pub images: usize,
  pub failed: usize,
  pub predictions: usize,
  pub interrupted: bool,
}

/// 逐张图像执行 推理 -> 过滤 -> 写入结果 -> 绘制
pub struct EvaluationTask {
  config: EvaluationConfig,
  stop: Option<Arc<AtomicBool>>,
}

impl EvaluationTask {
  pub fn new(config: EvaluationConfig) -> Self {
    EvaluationTask { config, stop: None }
  }

  /// 置位后在当前图像处理完成时停止
  pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
    self.stop = Some(stop);
    self
  }

  fn stop_requested(&self) -> bool {
    self
      .stop
      .as_ref()
      .map(|s| s.load(Ordering::SeqCst))
      .unwrap_or(false)
  }

  fn evaluate_image<D, M, O, W>(
    &self,
    index: usize,
    dataset: &D,
    model: &M,
    output: &O,
    report: &mut DetectionReport<W>,
  ) -> Result<usize, TaskError>
  where
    D: Dataset,
    D::Error: std::error::Error + Send + Sync + 'static,
    M: Model<Input = Array4<f32>, Output = SsdOutput>,
    M::Error: std::error::Error + Send + Sync + 'static,
    O: Render<Sample, DetectResult>,
    O::Error: std::error::Error + Send + Sync + 'static,
    W: Write,
  {
    let sample = dataset.get(index).map_err(|e| TaskError::Dataset {
      index,
      source: Box::new(e),
    })?;

    let input = self.config.transform.apply(&sample.image);
    let now = std::time::Instant::now();
    let SsdOutput { detections, priors } = model.infer(&input).map_err(|e| TaskError::Model {
      index,
      source: Box::new(e),
    })?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());

    let items = filter_detections(
      detections.view(),
      Scale::of_image(&sample.image),
      self.config.threshold,
      &self.config.labels,
    )?;
    report.write_image(&sample.annotation, &items)?;

    let predictions = items.len();
    let result = DetectResult {
      items: items.into_boxed_slice(),
      priors,
    };
    output
      .render_result(&sample, &result)
      .map_err(|e| TaskError::Render {
        index,
        source: Box::new(e),
      })?;

    Ok(predictions)
  }
}

impl<D, M, O> Task<D, M, O> for EvaluationTask
where
  D: Dataset,
  D::Error: std::error::Error + Send + Sync + 'static,
  M: Model<Input = Array4<f32>, Output = SsdOutput>,
  M::Error: std::error::Error + Send + Sync + 'static,
  O: Render<Sample, DetectResult>,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  type Output = EvaluationSummary;
  type Error = TaskError;

  fn run_task(self, dataset: D, model: M, output: O) -> Result<Self::Output, Self::Error> {
    let save_folder = &self.config.save_folder;
    std::fs::create_dir_all(save_folder).map_err(|source| TaskError::SaveFolder {
      path: save_folder.clone(),
      source,
    })?;
    let mut report = DetectionReport::create(save_folder.join(REPORT_FILE_NAME))?;

    let num_images = self
      .config
      .limit
      .map_or(dataset.len(), |limit| limit.min(dataset.len()));
    info!("开始评估，共 {} 张图像", num_images);

    let mut summary = EvaluationSummary::default();
    for index in 0..num_images {
      if self.stop_requested() {
        warn!("中断信号接收，退出评估循环");
        summary.interrupted = true;
        break;
      }

      info!("测试图像 {}/{}....", index + 1, num_images);
      match self.evaluate_image(index, &dataset, &model, &output, &mut report) {
        Ok(predictions) => {
          summary.images += 1;
          summary.predictions += predictions;
        }
        Err(e) if e.is_per_image() && !self.config.fail_fast => {
          error!("跳过图像: {}", e);
          summary.failed += 1;
        }
        Err(e) => return Err(e),
      }
    }

    report.finish()?;

    info!(
      "评估完成: 成功 {} 张, 失败 {} 张, 检测框 {} 个",
      summary.images, summary.failed, summary.predictions
    );
    Ok(summary)
  }
}
