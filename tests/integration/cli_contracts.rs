use std::io::Write;

use apiroot::tooling::cli::{CliContext, Commands};

#[test]
fn config_json_contract_has_required_sections() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[watcher]\nchange_buffer = 64").unwrap();

    let cli = CliContext::new(Some(file.path().to_path_buf())).unwrap();
    let output = cli
        .execute(&Commands::Config {
            format: "json".to_string(),
        })
        .unwrap();

    let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(
        parsed.pointer("/watcher/change_buffer").and_then(|v| v.as_u64()),
        Some(64)
    );
    assert!(parsed.pointer("/login/allow_agents").and_then(|v| v.as_bool()).is_some());
    assert!(parsed.pointer("/logging/level").and_then(|v| v.as_str()).is_some());
}

#[test]
fn missing_config_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    assert!(CliContext::new(Some(dir.path().join("nope.toml"))).is_err());
}
