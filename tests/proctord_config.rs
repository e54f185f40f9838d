use std::sync::Mutex;

use tempfile::NamedTempFile;

use proctor_kernel::config::ProctorConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "PROCTOR_CONFIG",
        "PROCTOR_ATTEMPT_ID",
        "PROCTOR_TEST_TIME_MINUTES",
        "PROCTOR_CAMERA_SOURCE",
        "PROCTOR_CAMERA_FACING",
        "PROCTOR_ACQUISITION_DELAY_MS",
        "PROCTOR_CHECK_INTERVAL_SECS",
        "PROCTOR_CHECK_PROBABILITY",
        "PROCTOR_CHECK_SEED",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "attempt_id": "attempt:prod_42",
        "test_time_minutes": 45,
        "camera": {
            "source": "stub://candidate",
            "width": 640,
            "height": 480,
            "facing": "environment"
        },
        "acquisition_delay_ms": 500,
        "check": {
            "interval_secs": 30,
            "probability": 0.25,
            "seed": 99
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("PROCTOR_CONFIG", file.path());
    std::env::set_var("PROCTOR_ATTEMPT_ID", "attempt:env_override");
    std::env::set_var("PROCTOR_CHECK_INTERVAL_SECS", "120");

    let cfg = ProctorConfig::load().expect("load config");

    assert_eq!(cfg.attempt_id, "attempt:env_override");
    assert_eq!(cfg.test_time_minutes, 45);
    assert_eq!(cfg.camera.source, "stub://candidate");
    assert_eq!(cfg.camera.width, 640);
    assert_eq!(cfg.camera.height, 480);
    assert_eq!(cfg.acquisition_delay.as_millis(), 500);
    assert_eq!(cfg.check_interval.as_secs(), 120);
    assert_eq!(cfg.check_probability, 0.25);
    assert_eq!(cfg.check_seed, Some(99));

    clear_env();
}

#[test]
fn defaults_apply_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = ProctorConfig::load().expect("load config");

    assert_eq!(cfg.attempt_id, "attempt:local");
    assert_eq!(cfg.test_time_minutes, 30);
    assert_eq!(cfg.total_seconds(), 1800);
    assert_eq!(cfg.camera.source, "stub://candidate");
    assert_eq!(cfg.camera.width, 320);
    assert_eq!(cfg.camera.height, 240);
    assert_eq!(cfg.acquisition_delay.as_millis(), 1500);
    assert_eq!(cfg.check_interval.as_secs(), 60);
    assert!(cfg.check_seed.is_none());

    clear_env();
}

#[test]
fn rejects_invalid_env_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PROCTOR_TEST_TIME_MINUTES", "soon");
    assert!(ProctorConfig::load().is_err());

    std::env::set_var("PROCTOR_TEST_TIME_MINUTES", "0");
    assert!(ProctorConfig::load().is_err());

    clear_env();

    std::env::set_var("PROCTOR_CHECK_PROBABILITY", "2.0");
    assert!(ProctorConfig::load().is_err());

    clear_env();
}

#[test]
fn attempt_id_is_normalized_lowercase() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PROCTOR_ATTEMPT_ID", "Attempt:Retake_2");
    let cfg = ProctorConfig::load().expect("load config");
    assert_eq!(cfg.attempt_id, "attempt:retake_2");

    clear_env();
}
