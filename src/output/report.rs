// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/report.rs - 检测结果文本记录
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

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::{dataset::Annotation, model::DetectItem};

pub const REPORT_FILE_NAME: &str = "detection_output.txt";

const FIELD_SEPARATOR: &str = " || ";

#[derive(Error, Debug)]
pub enum ReportError {
  #[error("无法创建结果文件 {path}: {source}")]
  CreateError {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 检测结果文本文件，每次运行都会覆盖
///
/// 每张图像一个块：
///
/// ```text
///
/// FOR: <image_id>
/// label: <v1> || <v2> || ...
/// PREDICTIONS:
/// <n> label: <name> score: <score> <x1> || <y1> || <x2> || <y2>
/// ```
pub struct DetectionReport<W: Write> {
  writer: W,
}

impl DetectionReport<BufWriter<File>> {
  pub fn create(path: impl AsRef<Path>) -> Result<Self, ReportError> {
    let path = path.as_ref();
    let create_error = |source| ReportError::CreateError {
      path: path.to_path_buf(),
      source,
    };
    if path.is_file() {
      warn!("删除已有结果文件: {}", path.display());
      std::fs::remove_file(path).map_err(create_error)?;
    }
    let file = File::create(path).map_err(create_error)?;
    debug!("创建结果文件: {}", path.display());
    Ok(DetectionReport::from_writer(BufWriter::new(file)))
  }
}

impl<W: Write> DetectionReport<W> {
  pub fn from_writer(writer: W) -> Self {
    DetectionReport { writer }
  }

  /// 写入一张图像的真值与预测，预测编号从 1 开始
  pub fn write_image(
    &mut self,
    annotation: &Annotation,
    items: &[DetectItem],
  ) -> Result<(), ReportError> {
    write!(self.writer, "\nFOR: {}\n", annotation.image_id)?;
    for gt in &annotation.boxes {
      writeln!(self.writer, "label: {}", join_values(gt))?;
    }

    if !items.is_empty() {
      writeln!(self.writer, "PREDICTIONS: ")?;
    }
    for (idx, item) in items.iter().enumerate() {
      writeln!(
        self.writer,
        "{} label: {} score: {} {}",
        idx + 1,
        item.label,
        item.score,
        join_values(&item.bbox)
      )?;
    }
    Ok(())
  }

  pub fn finish(mut self) -> Result<W, ReportError> {
    self.writer.flush()?;
    Ok(self.writer)
  }
}

fn join_values(values: &[f32]) -> String {
  values
    .iter()
    .map(f32::to_string)
    .collect::<Vec<_>>()
    .join(FIELD_SEPARATOR)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn annotation(boxes: Vec<Vec<f32>>) -> Annotation {
    Annotation {
      image_id: "Borcherds86_3".to_string(),
      boxes,
    }
  }

  fn write(annotation: &Annotation, items: &[DetectItem]) -> String {
    let mut report = DetectionReport::from_writer(Vec::new());
    report.write_image(annotation, items).unwrap();
    String::from_utf8(report.finish().unwrap()).unwrap()
  }

  #[test]
  fn block_with_predictions() {
    let items = vec![
      DetectItem {
        class_id: 1,
        label: "math".to_string(),
        score: 0.9,
        bbox: [10.0, 20.5, 30.0, 40.0],
      },
      DetectItem {
        class_id: 1,
        label: "math".to_string(),
        score: 0.75,
        bbox: [1.0, 2.0, 3.0, 4.0],
      },
    ];
    let text = write(&annotation(vec![vec![10.0, 20.0, 30.0, 40.0]]), &items);
    assert_eq!(
      text,
      "\nFOR: Borcherds86_3\n\
       label: 10 || 20 || 30 || 40\n\
       PREDICTIONS: \n\
       1 label: math score: 0.9 10 || 20.5 || 30 || 40\n\
       2 label: math score: 0.75 1 || 2 || 3 || 4\n"
    );
  }

  #[test]
  fn block_without_predictions_has_no_header() {
    let text = write(&annotation(vec![vec![1.0, 2.0, 3.0, 4.0]]), &[]);
    assert_eq!(text, "\nFOR: Borcherds86_3\nlabel: 1 || 2 || 3 || 4\n");
    assert!(!text.contains("PREDICTIONS"));
  }

  #[test]
  fn numbering_restarts_per_image() {
    let item = DetectItem {
      class_id: 1,
      label: "math".to_string(),
      score: 0.8,
      bbox: [0.0, 0.0, 1.0, 1.0],
    };
    let mut report = DetectionReport::from_writer(Vec::new());
    report
      .write_image(&annotation(vec![]), std::slice::from_ref(&item))
      .unwrap();
    report
      .write_image(&annotation(vec![]), std::slice::from_ref(&item))
      .unwrap();
    let text = String::from_utf8(report.finish().unwrap()).unwrap();
    assert_eq!(text.matches("\n1 label: math").count(), 2);
    assert!(!text.contains("\n2 label:"));
  }

  #[test]
  fn create_truncates_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(REPORT_FILE_NAME);
    std::fs::write(&path, "stale content from an earlier run").unwrap();

    let report = DetectionReport::create(&path).unwrap();
    report.finish().unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
  }
}
