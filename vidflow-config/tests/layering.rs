use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use vidflow_config::{
    ConfigLoadError, ConfigLoader, ConfigOverrides, EnvConfig,
};
use vidflow_core::{EncoderPreset, RecyclePolicy};

fn env_from(pairs: &[(&str, &str)]) -> EnvConfig {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    EnvConfig::from_lookup(|name| map.get(name).cloned()).unwrap()
}

fn write_config(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("vidflow.toml");
    fs::write(&path, contents).unwrap();
    path
}

/// Points the loader at an empty env file so a stray `.env` in the working
/// directory cannot leak in.
fn loader(tmp: &TempDir) -> ConfigLoader {
    let env_file = tmp.path().join("empty.env");
    fs::write(&env_file, "").unwrap();
    ConfigLoader::new().with_env_file(env_file)
}

const FILE: &str = r#"
[encoder]
path = "/opt/ffmpeg/bin/ffmpeg"
preset = "slow"

[pipeline]
batch_size = 20
parallel = true
media_extensions = ["mov", "mkv"]

[watch]
settle_delay_ms = 400

[recycle]
policy = "delete"
"#;

#[test]
fn file_values_replace_defaults() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(tmp.path(), FILE);

    let load = loader(&tmp)
        .with_config_path(&path)
        .with_env(EnvConfig::default())
        .load()
        .unwrap();
    let config = load.config;

    assert_eq!(config.encoder.path, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
    assert_eq!(config.encoder.preset, EncoderPreset::Slow);
    assert_eq!(config.pipeline.batch_size, 20);
    assert!(config.pipeline.parallel);
    assert_eq!(config.pipeline.media_extensions, vec!["mov", "mkv"]);
    assert_eq!(config.watch.settle_delay_ms, 400);
    assert_eq!(config.recycle.policy, RecyclePolicy::Delete);
    assert_eq!(config.metadata.config_path, Some(path));
    assert!(config.metadata.env_file_loaded);
    // Hard delete is allowed but flagged.
    assert!(!load.warnings.is_empty());
}

#[test]
fn environment_beats_file_and_flags_beat_environment() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(tmp.path(), FILE);

    let env = env_from(&[
        ("VIDFLOW_BATCH_SIZE", "5"),
        ("VIDFLOW_PRESET", "veryfast"),
        ("FFMPEG_PATH", "/usr/bin/ffmpeg"),
    ]);
    let overrides = ConfigOverrides {
        batch_size: Some(9),
        parallel: Some(false),
        ..Default::default()
    };

    let config = loader(&tmp)
        .with_config_path(&path)
        .with_env(env)
        .with_overrides(overrides)
        .load()
        .unwrap()
        .config;

    assert_eq!(config.pipeline.batch_size, 9);
    assert!(!config.pipeline.parallel);
    assert_eq!(config.encoder.preset, EncoderPreset::Veryfast);
    assert_eq!(config.encoder.path, PathBuf::from("/usr/bin/ffmpeg"));
    assert_eq!(config.watch.settle_delay_ms, 400);
}

#[test]
fn config_path_from_environment_is_honoured() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(tmp.path(), "[pipeline]\nall_cores = true\n");
    let env = env_from(&[("VIDFLOW_CONFIG", path.to_str().unwrap())]);

    let config = loader(&tmp).with_env(env).load().unwrap().config;
    assert!(config.pipeline.all_cores);
    assert_eq!(config.metadata.config_path, Some(path));
}

#[test]
fn explicit_missing_file_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let err = loader(&tmp)
        .with_config_path(tmp.path().join("nope.toml"))
        .with_env(EnvConfig::default())
        .load()
        .unwrap_err();
    assert!(matches!(err, ConfigLoadError::MissingConfig { .. }));
}

#[test]
fn malformed_file_reports_parse_error() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(tmp.path(), "[pipeline]\nbatch_size = \"lots\"\n");
    let err = loader(&tmp)
        .with_config_path(&path)
        .with_env(EnvConfig::default())
        .load()
        .unwrap_err();
    assert!(matches!(err, ConfigLoadError::Parse { .. }));
}

#[test]
fn bad_enumerated_env_value_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let err = loader(&tmp)
        .with_env(env_from(&[("VIDFLOW_RECYCLE", "shred")]))
        .load()
        .unwrap_err();
    match err {
        ConfigLoadError::InvalidValue { key, value, .. } => {
            assert_eq!(key, "VIDFLOW_RECYCLE");
            assert_eq!(value, "shred");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn guard_rails_run_after_overrides() {
    let tmp = TempDir::new().unwrap();
    let err = loader(&tmp)
        .with_env(EnvConfig::default())
        .with_overrides(ConfigOverrides {
            batch_size: Some(0),
            ..Default::default()
        })
        .load()
        .unwrap_err();
    assert!(matches!(err, ConfigLoadError::GuardRail(_)));
}

#[test]
fn env_file_values_are_loaded() {
    let tmp = TempDir::new().unwrap();
    let env_file = tmp.path().join("vidflow.env");
    fs::write(&env_file, "VIDFLOW_TEST_ONLY_MARKER=1\n").unwrap();

    let load = ConfigLoader::new()
        .with_env_file(&env_file)
        .with_env(EnvConfig::default())
        .load()
        .unwrap();
    assert!(load.config.metadata.env_file_loaded);
}

#[test]
fn explicit_missing_env_file_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("typo.env");
    let err = ConfigLoader::new()
        .with_env_file(&missing)
        .with_env(EnvConfig::default())
        .load()
        .unwrap_err();
    match err {
        ConfigLoadError::MissingEnvFile { path } => assert_eq!(path, missing),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn malformed_numeric_env_value_is_rejected() {
    let err = EnvConfig::from_lookup(|name| {
        (name == "VIDFLOW_BATCH_SIZE").then(|| "ten".to_string())
    })
    .unwrap_err();
    match err {
        ConfigLoadError::InvalidValue { key, value, .. } => {
            assert_eq!(key, "VIDFLOW_BATCH_SIZE");
            assert_eq!(value, "ten");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(
        EnvConfig::from_lookup(|name| {
            (name == "VIDFLOW_PARALLEL").then(|| "sometimes".to_string())
        })
        .is_err()
    );
}
