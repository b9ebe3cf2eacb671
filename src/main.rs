// 该文件是 Shanan （山南西风） 项目的一部分。
// src/main.rs - SSD 公式检测评估主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, bail};
use clap::Parser;
use tracing::info;

use shanan_gtdb::{
  dataset::GtdbDataset,
  detection::{LabelMap, Threshold},
  frame::BaseTransform,
  model::{Device, SsdBuilder},
  output::NoRender,
  task::{EvaluationConfig, EvaluationSummary, EvaluationTask, Task},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("模型文件路径: {}", args.trained_model.display());
  info!("数据集目录: {}", args.dataset_root.display());
  info!("结果目录: {}", args.save_folder.display());
  info!("置信度阈值: {}", args.visual_threshold);

  let threshold = Threshold::new(args.visual_threshold)?;
  let mean: [f32; 3] = match args.mean.as_slice() {
    [b, g, r] => [*b, *g, *r],
    other => bail!("均值需要 3 个通道, 实际为 {}", other.len()),
  };
  let labels = LabelMap::new(args.labels.iter().map(String::as_str));
  if labels.is_empty() {
    bail!("至少需要一个类别标签");
  }

  let device = if args.cuda {
    Device::Cuda {
      device_id: args.gpu_id,
    }
  } else {
    Device::Cpu
  };

  info!("正在加载模型...");
  let model = SsdBuilder::new(&args.trained_model)
    .device(device)
    .num_classes(labels.num_classes())
    .build()?;

  let dataset = GtdbDataset::open(&args.dataset_root, &args.split)?;

  let stop = Arc::new(AtomicBool::new(false));
  {
    let stop = stop.clone();
    ctrlc::set_handler(move || {
      info!("收到中断信号，处理完当前图像后退出...");
      stop.store(true, Ordering::SeqCst);
    })?;
  }

  let config = EvaluationConfig {
    save_folder: args.save_folder.clone(),
    threshold,
    labels,
    transform: BaseTransform::new(args.input_size, mean),
    limit: args.limit,
    fail_fast: args.fail_fast,
  };
  let task = EvaluationTask::new(config).with_stop_flag(stop);

  let summary = run(task, dataset, model, &args)?;

  info!("处理完成!");
  info!("成功图像数: {}", summary.images);
  info!("失败图像数: {}", summary.failed);
  info!("总检测数: {}", summary.predictions);
  if summary.interrupted {
    info!("评估被中断");
  }

  Ok(())
}

#[cfg(feature = "save_image_file")]
fn run(
  task: EvaluationTask,
  dataset: GtdbDataset,
  model: shanan_gtdb::model::SsdOnnx,
  args: &args::Args,
) -> Result<EvaluationSummary> {
  use shanan_gtdb::output::{SaveImageOutput, draw::Draw};

  if args.no_render {
    return Ok(task.run_task(dataset, model, NoRender)?);
  }
  let output = SaveImageOutput::new(&args.save_folder)
    .with_draw(Draw::default().with_prior_threshold(args.visual_threshold));
  Ok(task.run_task(dataset, model, output)?)
}

#[cfg(not(feature = "save_image_file"))]
fn run(
  task: EvaluationTask,
  dataset: GtdbDataset,
  model: shanan_gtdb::model::SsdOnnx,
  _args: &args::Args,
) -> Result<EvaluationSummary> {
  Ok(task.run_task(dataset, model, NoRender)?)
}
