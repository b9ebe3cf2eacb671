// 该文件是 Shanan （山南西风） 项目的一部分。
// src/dataset/gtdb.rs - GTDB 目录结构数据集
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

use image::ImageReader;
use thiserror::Error;
use tracing::{debug, info};

use crate::dataset::{Annotation, Dataset, Sample};

const GTDB_IMAGE_DIR: &str = "images";
const GTDB_IMAGE_EXT: &str = "png";
const GTDB_ANNOTATION_DIR: &str = "annotations";
const GTDB_ANNOTATION_EXT: &str = "pmath";

#[derive(Error, Debug)]
pub enum DatasetError {
  #[error("I/O 错误: {path}: {source}")]
  IoError {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("图像加载错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("标注格式错误: {path}:{line}: {content:?}")]
  MalformedAnnotation {
    path: PathBuf,
    line: usize,
    content: String,
  },
  #[error("图像索引越界: {index} (共 {len} 张)")]
  IndexOutOfRange { index: usize, len: usize },
}

/// GTDB 数据集
///
/// 目录结构:
/// - `<root>/<split>`: 图像编号列表，每行一个
/// - `<root>/images/<id>.png`
/// - `<root>/annotations/<id>.pmath`: 每行一个真值框 `x1,y1,x2,y2[,...]`
pub struct GtdbDataset {
  root: PathBuf,
  ids: Vec<String>,
}

impl GtdbDataset {
  pub fn open(root: impl AsRef<Path>, split: &str) -> Result<Self, DatasetError> {
    let root = root.as_ref().to_path_buf();
    let split_path = root.join(split);
    info!("读取数据集划分: {}", split_path.display());
    let content = std::fs::read_to_string(&split_path).map_err(|source| DatasetError::IoError {
      path: split_path.clone(),
      source,
    })?;
    let ids = parse_split(&content);
    info!("数据集共 {} 张图像", ids.len());

    Ok(GtdbDataset { root, ids })
  }

  pub fn ids(&self) -> &[String] {
    &self.ids
  }

  fn image_path(&self, id: &str) -> PathBuf {
    self
      .root
      .join(GTDB_IMAGE_DIR)
      .join(format!("{}.{}", id, GTDB_IMAGE_EXT))
  }

  fn annotation_path(&self, id: &str) -> PathBuf {
    self
      .root
      .join(GTDB_ANNOTATION_DIR)
      .join(format!("{}.{}", id, GTDB_ANNOTATION_EXT))
  }

  fn load_annotation(&self, id: &str) -> Result<Annotation, DatasetError> {
    let path = self.annotation_path(id);
    if !path.is_file() {
      debug!("图像 {} 没有标注文件", id);
      return Ok(Annotation {
        image_id: id.to_string(),
        boxes: Vec::new(),
      });
    }

    let content = std::fs::read_to_string(&path).map_err(|source| DatasetError::IoError {
      path: path.clone(),
      source,
    })?;
    let boxes = parse_annotation(&path, &content)?;
    Ok(Annotation {
      image_id: id.to_string(),
      boxes,
    })
  }
}

impl Dataset for GtdbDataset {
  type Error = DatasetError;

  fn len(&self) -> usize {
    self.ids.len()
  }

  fn get(&self, index: usize) -> Result<Sample, Self::Error> {
    let id = self.ids.get(index).ok_or(DatasetError::IndexOutOfRange {
      index,
      len: self.ids.len(),
    })?;

    let image_path = self.image_path(id);
    debug!("加载图像: {}", image_path.display());
    let image = ImageReader::open(&image_path)
      .map_err(|source| DatasetError::IoError {
        path: image_path.clone(),
        source,
      })?
      .decode()?
      .into_rgb8();

    let annotation = self.load_annotation(id)?;
    Ok(Sample { annotation, image })
  }
}

fn parse_split(content: &str) -> Vec<String> {
  content
    .lines()
    .map(str::trim)
    .filter(|line| !line.is_empty() && !line.starts_with('#'))
    .map(str::to_string)
    .collect()
}

fn parse_annotation(path: &Path, content: &str) -> Result<Vec<Vec<f32>>, DatasetError> {
  let mut boxes = Vec::new();
  for (idx, line) in content.lines().enumerate() {
    let line = line.trim();
    if line.is_empty() {
      continue;
    }
    let malformed = || DatasetError::MalformedAnnotation {
      path: path.to_path_buf(),
      line: idx + 1,
      content: line.to_string(),
    };
    let values = line
      .split(',')
      .map(|v| v.trim().parse::<f32>())
      .collect::<Result<Vec<_>, _>>()
      .map_err(|_| malformed())?;
    if values.len() < 4 {
      return Err(malformed());
    }
    boxes.push(values);
  }
  Ok(boxes)
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};

  #[test]
  fn split_skips_blank_and_comment_lines() {
    let ids = parse_split("# test split\n\n28007624_9\n  Borcherds86_3 \n");
    assert_eq!(ids, vec!["28007624_9", "Borcherds86_3"]);
  }

  #[test]
  fn annotation_parses_boxes() {
    let boxes = parse_annotation(Path::new("a.pmath"), "12,34,56,78\n\n1.5, 2, 3, 4, 1\n").unwrap();
    assert_eq!(boxes, vec![vec![12.0, 34.0, 56.0, 78.0], vec![1.5, 2.0, 3.0, 4.0, 1.0]]);
  }

  #[test]
  fn malformed_annotation_names_line() {
    let err = parse_annotation(Path::new("a.pmath"), "1,2,3,4\n1,x,3,4\n").unwrap_err();
    match err {
      DatasetError::MalformedAnnotation { line, .. } => assert_eq!(line, 2),
      other => panic!("unexpected error: {other}"),
    }

    let err = parse_annotation(Path::new("a.pmath"), "1,2,3\n").unwrap_err();
    assert!(matches!(err, DatasetError::MalformedAnnotation { line: 1, .. }));
  }

  #[test]
  fn open_reads_images_and_annotations() {
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(root.path().join("images/book")).unwrap();
    std::fs::create_dir_all(root.path().join("annotations/book")).unwrap();
    std::fs::write(root.path().join("processed_test"), "book/page1\nbook/page2\n").unwrap();
    RgbImage::from_pixel(8, 6, Rgb([255, 255, 255]))
      .save(root.path().join("images/book/page1.png"))
      .unwrap();
    RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]))
      .save(root.path().join("images/book/page2.png"))
      .unwrap();
    std::fs::write(root.path().join("annotations/book/page1.pmath"), "1,2,3,4\n").unwrap();

    let dataset = GtdbDataset::open(root.path(), "processed_test").unwrap();
    assert_eq!(dataset.len(), 2);

    let sample = dataset.get(0).unwrap();
    assert_eq!(sample.annotation.image_id, "book/page1");
    assert_eq!(sample.annotation.boxes, vec![vec![1.0, 2.0, 3.0, 4.0]]);
    assert_eq!(sample.image.dimensions(), (8, 6));

    // 缺失标注文件视为没有真值
    let sample = dataset.get(1).unwrap();
    assert!(sample.annotation.boxes.is_empty());

    assert!(matches!(
      dataset.get(2),
      Err(DatasetError::IndexOutOfRange { index: 2, len: 2 })
    ));
  }

  #[test]
  fn missing_split_fails_fast() {
    let root = tempfile::tempdir().unwrap();
    assert!(matches!(
      GtdbDataset::open(root.path(), "processed_test"),
      Err(DatasetError::IoError { .. })
    ));
  }
}
