// 该文件是 Shanan （山南西风） 项目的一部分。
// src/args.rs - 项目参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use clap::Parser;

/// SSD 公式检测评估参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 训练好的模型文件路径 (ONNX)
  #[arg(long = "trained_model", default_value = "weights/ssd300_GTDB_990.onnx", value_name = "FILE")]
  pub trained_model: PathBuf,

  /// 结果保存目录，不存在时自动创建
  #[arg(long = "save_folder", default_value = "eval/", value_name = "DIR")]
  pub save_folder: PathBuf,

  /// 最终置信度阈值 (0.0, 1.0]
  #[arg(long = "visual_threshold", default_value = "0.6", value_name = "THRESHOLD")]
  pub visual_threshold: f32,

  /// 使用 CUDA 推理
  #[arg(long)]
  pub cuda: bool,

  /// CUDA 设备编号
  #[arg(long = "gpu_id", default_value = "0", value_name = "ID")]
  pub gpu_id: i32,

  /// 数据集根目录
  #[arg(long = "dataset_root", default_value = "data/GTDB", value_name = "DIR")]
  pub dataset_root: PathBuf,

  /// 数据集划分文件名
  #[arg(long, default_value = "processed_test", value_name = "NAME")]
  pub split: String,

  /// 类别标签（不含背景），逗号分隔
  #[arg(long, value_delimiter = ',', default_value = "math", value_name = "LABELS")]
  pub labels: Vec<String>,

  /// 网络输入尺寸
  #[arg(long = "input_size", default_value = "300", value_name = "SIZE")]
  pub input_size: u32,

  /// BGR 通道均值，逗号分隔
  #[arg(long, value_delimiter = ',', default_value = "104,117,123", value_name = "B,G,R")]
  pub mean: Vec<f32>,

  /// 最多评估的图像数量，不指定则评估全部
  #[arg(long, value_name = "COUNT")]
  pub limit: Option<usize>,

  /// 任意一张图像出错即终止评估
  #[arg(long = "fail_fast")]
  pub fail_fast: bool,

  /// 不保存可视化图像
  #[arg(long = "no_render")]
  pub no_render: bool,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults() {
    let args = Args::parse_from(["shanan-gtdb"]);
    assert_eq!(args.visual_threshold, 0.6);
    assert_eq!(args.save_folder, PathBuf::from("eval/"));
    assert_eq!(args.labels, vec!["math"]);
    assert_eq!(args.mean, vec![104.0, 117.0, 123.0]);
    assert_eq!(args.limit, None);
    assert!(!args.cuda);
  }

  #[test]
  fn underscore_flag_names() {
    let args = Args::parse_from([
      "shanan-gtdb",
      "--trained_model",
      "weights/ssd.onnx",
      "--visual_threshold",
      "0.8",
      "--cuda",
      "--labels",
      "math,text",
      "--limit",
      "200",
    ]);
    assert_eq!(args.trained_model, PathBuf::from("weights/ssd.onnx"));
    assert_eq!(args.visual_threshold, 0.8);
    assert!(args.cuda);
    assert_eq!(args.labels, vec!["math", "text"]);
    assert_eq!(args.limit, Some(200));
  }
}
