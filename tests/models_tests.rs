use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use benchmark_models::logger::MemoryLog;
use benchmark_models::models::{load_models, ModelOverlay};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir()
        .join("benchmark-models-tests")
        .join(format!("models-{}-{}", name, std::process::id()));
    if dir.exists() {
        fs::remove_dir_all(&dir).unwrap();
    }
    fs::create_dir_all(&dir).unwrap();
    dir
}

const CATALOG: &str = r#"[
    {
        "name": "resnet50",
        "dockerfile": "docker/resnet50",
        "scripts": "scripts/resnet50",
        "n_gpus": "8",
        "training_precision": "fp16",
        "tags": ["vision", "convnet"],
        "env": {"HSA_ENABLE_SDMA": "0"}
    },
    {
        "name": "bert_large",
        "dockerfile": "docker/bert",
        "scripts": "scripts/bert",
        "timeout": 7200
    }
]"#;

#[test]
fn loads_the_catalog_with_defaults() {
    let dir = scratch_dir("load");
    let path = dir.join("models.json");
    fs::write(&path, CATALOG).unwrap();

    let models = load_models(&path, &MemoryLog::new()).unwrap();
    assert_eq!(models.len(), 2);

    assert_eq!(models[0].name, "resnet50");
    assert_eq!(models[0].n_gpus, "8");
    assert_eq!(models[0].tags, vec!["vision", "convnet"]);
    assert_eq!(models[0].env.get("HSA_ENABLE_SDMA"), Some(&"0".to_string()));
    assert_eq!(models[0].timeout, None);

    assert_eq!(models[1].name, "bert_large");
    assert_eq!(models[1].n_gpus, "");
    assert!(models[1].tags.is_empty());
    assert!(models[1].env.is_empty());
    assert_eq!(models[1].timeout, Some(7200));
}

#[test]
fn overlay_replaces_scalars_and_merges_env() {
    let dir = scratch_dir("overlay");
    let path = dir.join("models.json");
    fs::write(&path, CATALOG).unwrap();
    let mut model = load_models(&path, &MemoryLog::new()).unwrap().remove(0);

    let mut env = BTreeMap::new();
    env.insert("HSA_ENABLE_SDMA".to_string(), "1".to_string());
    env.insert("NCCL_DEBUG".to_string(), "INFO".to_string());

    let overlay = ModelOverlay {
        n_gpus: Some("4".to_string()),
        env: Some(env),
        ..ModelOverlay::default()
    };
    model.apply_overlay(&overlay);

    // Scalars replace, the env mapping merges key-wise.
    assert_eq!(model.n_gpus, "4");
    assert_eq!(model.env.get("HSA_ENABLE_SDMA"), Some(&"1".to_string()));
    assert_eq!(model.env.get("NCCL_DEBUG"), Some(&"INFO".to_string()));

    // Fields the overlay leaves out keep their values.
    assert_eq!(model.training_precision, "fp16");
    assert_eq!(model.tags, vec!["vision", "convnet"]);
    assert_eq!(model.dockerfile, "docker/resnet50");
}

#[test]
fn overlay_replaces_tags_wholesale() {
    let dir = scratch_dir("tags");
    let path = dir.join("models.json");
    fs::write(&path, CATALOG).unwrap();
    let mut model = load_models(&path, &MemoryLog::new()).unwrap().remove(0);

    let overlay = ModelOverlay {
        tags: Some(vec!["nightly".to_string()]),
        ..ModelOverlay::default()
    };
    model.apply_overlay(&overlay);
    assert_eq!(model.tags, vec!["nightly"]);
}
