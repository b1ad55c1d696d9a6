//! 写真フォルダ
//!
//! `<root>/<評価ID>/<領域>/<ステップ番号>/` 直下の画像を数える。

use std::path::{Path, PathBuf};
use survey_common::PhotoSource;
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "heic", "JPG", "JPEG", "PNG", "HEIC"];

/// ローカルフォルダを写真の保存先とみなす
#[derive(Debug, Clone)]
pub struct FolderPhotoSource {
    root: PathBuf,
    assessment_id: String,
}

impl FolderPhotoSource {
    pub fn new(root: impl Into<PathBuf>, assessment_id: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            assessment_id: assessment_id.into(),
        }
    }

    pub fn step_dir(&self, form_area: &str, step_index: usize) -> PathBuf {
        self.root
            .join(&self.assessment_id)
            .join(form_area)
            .join(step_index.to_string())
    }
}

impl PhotoSource for FolderPhotoSource {
    fn photo_count_for_step(&self, form_area: &str, step_index: usize) -> usize {
        count_images(&self.step_dir(form_area, step_index))
    }
}

/// フォルダ直下の画像枚数（フォルダが無ければ 0）
pub fn count_images(folder: &Path) -> usize {
    if !folder.is_dir() {
        return 0;
    }

    WalkDir::new(folder)
        .max_depth(1) // 直下のみ
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| is_image_extension(&ext.to_string_lossy()))
                .unwrap_or(false)
        })
        .count()
}

fn is_image_extension(ext: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&ext)
}
