//! コマンド実行テスト
//!
//! 一時ストアに対して「読み込み → 操作 → 保存」の流れを検証

use condition_survey::cli::{Commands, MaterialAction, SectionArgs, TripleArgs, UnitAction};
use condition_survey::commands::{self, Context};
use condition_survey::config::Config;
use condition_survey::error::SurveyError;
use condition_survey::storage::Store;
use std::path::{Path, PathBuf};
use survey_common::{Condition, FormArea, RepairStatus, SectionPath, UnitKind};
use tempfile::{tempdir, TempDir};

struct Env {
    dir: TempDir,
    store: PathBuf,
}

impl Env {
    fn new() -> Self {
        let dir = tempdir().expect("Failed to create temp dir");
        let store = dir.path().join("assessments.json");
        Self { dir, store }
    }

    fn config(&self) -> Config {
        Config {
            photo_root: Some(self.dir.path().join("photos")),
            outbox_dir: Some(self.dir.path().join("outbox")),
            ..Default::default()
        }
    }

    fn ctx(&self) -> Context {
        Context::new(self.config(), Some(&self.store), None).expect("コンテキスト作成失敗")
    }

    async fn run(&self, command: Commands) -> condition_survey::error::Result<()> {
        commands::run(self.ctx(), command).await
    }

    fn store(&self) -> Store {
        Store::open(&self.store).expect("ストア読み込み失敗")
    }

    fn active(&self) -> String {
        self.store().tree.active_id().expect("アクティブな評価があるべき").to_string()
    }
}

fn target(area: FormArea, section: &str) -> SectionArgs {
    SectionArgs {
        area,
        section: section.to_string(),
    }
}

fn cooling() -> SectionArgs {
    target(FormArea::MechanicalSystems, "cooling")
}

#[tokio::test]
async fn test_mutation_without_assessment_fails() {
    let env = Env::new();
    let err = env
        .run(Commands::Na {
            target: target(FormArea::Interiors, "ceilings"),
            flag: true,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, SurveyError::NoActiveAssessment));
    assert!(!env.store.exists());
}

#[tokio::test]
async fn test_new_then_patch_persists() {
    let env = Env::new();
    env.run(Commands::New).await.unwrap();
    let id = env.active();

    env.run(Commands::Patch {
        target: target(FormArea::SiteAndGrounds, "paving"),
        json: r#"{"fields": {"notes": "cracked", "parking": null}, "assessment": {"condition": "poor"}}"#.into(),
    })
    .await
    .unwrap();

    let store = env.store();
    let path = SectionPath::new(FormArea::SiteAndGrounds, "paving");
    let node = store.tree.section(&id, &path).unwrap().expect("セクションがあるべき");
    assert_eq!(node.fields.get("notes").and_then(|v| v.as_str()), Some("cracked"));
    assert!(!node.fields.contains_key("parking"));
    assert_eq!(node.assessment.as_ref().and_then(|a| a.condition), Some(Condition::Poor));
}

#[tokio::test]
async fn test_second_assessment_does_not_steal_active() {
    let env = Env::new();
    env.run(Commands::New).await.unwrap();
    let first = env.active();
    env.run(Commands::New).await.unwrap();
    assert_eq!(env.active(), first);

    let other = env
        .store()
        .tree
        .list()
        .into_iter()
        .map(|a| a.id.clone())
        .find(|id| *id != first)
        .unwrap();
    env.run(Commands::Use { id: other.clone() }).await.unwrap();
    assert_eq!(env.active(), other);

    let err = env.run(Commands::Use { id: "missing".into() }).await.unwrap_err();
    assert!(matches!(err, SurveyError::Common(_)));
}

#[tokio::test]
async fn test_unit_add_refused_at_capacity() {
    let env = Env::new();
    env.run(Commands::New).await.unwrap();

    let add = |force: bool| Commands::Unit {
        action: UnitAction::Add {
            target: cooling(),
            kind: UnitKind::Chiller,
            fields: vec![("make".into(), "Trane".into())],
            triple: TripleArgs::default(),
            force,
        },
    };

    env.run(add(false)).await.unwrap();
    env.run(add(false)).await.unwrap();
    let err = env.run(add(false)).await.unwrap_err();
    assert!(matches!(err, SurveyError::UnitCapacity(_)));

    env.run(add(true)).await.unwrap();
    let id = env.active();
    let path = SectionPath::new(FormArea::MechanicalSystems, "cooling");
    let store = env.store();
    let units = store.tree.units(&id, &path, "chillers").unwrap().unwrap();
    assert_eq!(units.len(), 3);
}

#[tokio::test]
async fn test_material_select_then_update() {
    let env = Env::new();
    env.run(Commands::New).await.unwrap();
    let paving = || target(FormArea::SiteAndGrounds, "paving");

    env.run(Commands::Material {
        action: MaterialAction::Select {
            target: paving(),
            collection: "pavement".into(),
            material: "gravel".into(),
            triple: TripleArgs {
                condition: Some(Condition::Fair),
                ..Default::default()
            },
            age: None,
        },
    })
    .await
    .unwrap();

    env.run(Commands::Material {
        action: MaterialAction::Update {
            target: paving(),
            collection: "pavement".into(),
            material: "gravel".into(),
            triple: TripleArgs {
                status: Some(RepairStatus::RR),
                amount: Some("$1,500".into()),
                ..Default::default()
            },
            age: Some("12".into()),
        },
    })
    .await
    .unwrap();

    let id = env.active();
    let store = env.store();
    let path = SectionPath::new(FormArea::SiteAndGrounds, "paving");
    let materials = store.tree.materials(&id, &path, "pavement").unwrap().unwrap();
    let gravel = materials.get("gravel").unwrap();
    assert_eq!(gravel.assessment.condition, Some(Condition::Fair));
    assert_eq!(gravel.assessment.repair_status, Some(RepairStatus::RR));
    assert_eq!(gravel.assessment.amount_to_repair.as_deref(), Some("1500"));
    assert_eq!(gravel.effective_age, Some(12));

    env.run(Commands::Material {
        action: MaterialAction::Remove {
            target: paving(),
            collection: "pavement".into(),
            material: "gravel".into(),
            yes: true,
        },
    })
    .await
    .unwrap();
    let store = env.store();
    assert!(!store.tree.materials(&id, &path, "pavement").unwrap().unwrap().is_selected("gravel"));
}

#[tokio::test]
async fn test_submit_writes_outbox_and_stamps() {
    let env = Env::new();
    env.run(Commands::New).await.unwrap();
    env.run(Commands::Submit).await.unwrap();

    let id = env.active();
    assert!(env.store().tree.get(&id).unwrap().submitted_at.is_some());

    let outbox: Vec<_> = std::fs::read_dir(env.dir.path().join("outbox")).unwrap().collect();
    assert_eq!(outbox.len(), 1);
}

#[tokio::test]
async fn test_export_json_report() {
    let env = Env::new();
    env.run(Commands::New).await.unwrap();
    env.run(Commands::Patch {
        target: target(FormArea::BuildingEnvelope, "roofing"),
        json: r#"{"assessment": {"condition": "poor", "repairStatus": "RR", "amountToRepair": "4000"}}"#.into(),
    })
    .await
    .unwrap();

    let output = env.dir.path().join("report.json");
    env.run(Commands::Export {
        output: output.clone(),
        title: "Report".into(),
    })
    .await
    .unwrap();

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(json["rows"].as_array().unwrap().len(), 1);
    assert_eq!(json["totalRepairCost"], 4000.0);

    let err = env
        .run(Commands::Export {
            output: Path::new("report.pdf").to_path_buf(),
            title: "Report".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, SurveyError::InvalidInput(_)));
}
