//! エラーケーステスト
//!
//! 各種エラー条件でのエラーハンドリングを検証

use condition_survey::config::Config;
use condition_survey::error::SurveyError;
use condition_survey::photos::{count_images, FolderPhotoSource};
use std::path::Path;
use survey_common::PhotoSource;
use tempfile::tempdir;

/// 存在しないフォルダの写真枚数は 0
#[test]
fn test_count_nonexistent_folder() {
    assert_eq!(count_images(Path::new("/nonexistent/path/12345")), 0);
}

/// 画像以外のファイルとサブフォルダは数えない
#[test]
fn test_count_images_only() {
    let dir = tempdir().expect("Failed to create temp dir");
    let step = dir.path().join("a1").join("interiors").join("0");
    std::fs::create_dir_all(step.join("nested")).unwrap();

    std::fs::write(step.join("ceiling.jpg"), b"fake").unwrap();
    std::fs::write(step.join("floor.PNG"), b"fake").unwrap();
    std::fs::write(step.join("notes.txt"), "hello").unwrap();
    std::fs::write(step.join("nested").join("deep.jpg"), b"fake").unwrap();

    let source = FolderPhotoSource::new(dir.path(), "a1");
    assert_eq!(source.photo_count_for_step("interiors", 0), 2);
    assert_eq!(source.photo_count_for_step("interiors", 1), 0);
}

/// SurveyErrorのDisplay実装確認
#[test]
fn test_error_display() {
    let errors = vec![
        SurveyError::Config("テスト設定エラー".to_string()),
        SurveyError::NoActiveAssessment,
        SurveyError::InvalidStore("assessments.json".to_string()),
        SurveyError::UnitCapacity("chiller 2台".to_string()),
        SurveyError::SubmissionFailed("送信失敗".to_string()),
        SurveyError::InvalidInput("不正".to_string()),
    ];

    for err in errors {
        let display = format!("{}", err);
        assert!(!display.is_empty(), "エラーメッセージが空: {:?}", err);
    }
}

/// アクティブ評価なしのメッセージ確認
#[test]
fn test_no_active_assessment_message() {
    let display = SurveyError::NoActiveAssessment.to_string();
    assert!(display.contains("survey new"));
    assert!(display.contains("survey use"));
}

/// IOエラーからの変換
#[test]
fn test_io_error_conversion() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let err: SurveyError = io_err.into();

    assert!(matches!(err, SurveyError::Io(_)));
    assert!(err.to_string().contains("IO"));
}

/// JSONエラーからの変換
#[test]
fn test_json_error_conversion() {
    let json_err = serde_json::from_str::<serde_json::Value>("{ invalid }").unwrap_err();
    let err: SurveyError = json_err.into();

    assert!(matches!(err, SurveyError::JsonParse(_)));
}

/// survey_common::Errorはそのまま表示される
#[test]
fn test_common_error_conversion() {
    let common_err = survey_common::Error::AssessmentNotFound("a1".to_string());
    let expected = common_err.to_string();
    let err: SurveyError = common_err.into();

    assert!(matches!(err, SurveyError::Common(_)));
    assert_eq!(err.to_string(), expected);
}

/// 設定ファイルが無ければ既定値
#[test]
fn test_config_missing_file_defaults() {
    let dir = tempdir().expect("Failed to create temp dir");
    let config = Config::load_from(&dir.path().join("config.json")).expect("設定読み込み失敗");
    assert_eq!(config, Config::default());
}

/// 設定の保存と読み込み
#[test]
fn test_config_save_and_load() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("sub").join("config.json");
    let config = Config {
        debounce_ms: 500,
        flush_on_exit: true,
        inspector: Some("調査員A".into()),
        ..Default::default()
    };

    config.save_to(&path).expect("設定保存失敗");
    assert_eq!(Config::load_from(&path).unwrap(), config);
}

/// 壊れた設定ファイルはエラー
#[test]
fn test_config_invalid_json() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("config.json");
    std::fs::write(&path, "not json").unwrap();

    assert!(matches!(Config::load_from(&path), Err(SurveyError::JsonParse(_))));
}
