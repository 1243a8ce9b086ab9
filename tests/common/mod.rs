use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Config file in a fresh temporary directory
///
/// With no `session.dir` set, sessions land in `<tempdir>/sessions`.
#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Session directory next to a config file
#[allow(dead_code)]
pub fn sessions_dir(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .expect("config file has a parent directory")
        .join("sessions")
}

/// Write a session file the way the binary would
///
/// `created` is an RFC 3339 timestamp; `messages` alternate user/assistant.
#[allow(dead_code)]
pub fn write_session(
    dir: &Path,
    id: &str,
    created: &str,
    parent_id: Option<&str>,
    name: Option<&str>,
    messages: &[&str],
) -> PathBuf {
    fs::create_dir_all(dir).expect("failed to create session dir");

    let messages: Vec<_> = messages
        .iter()
        .enumerate()
        .map(|(idx, content)| {
            json!({
                "role": if idx % 2 == 0 { "user" } else { "assistant" },
                "content": content,
                "timestamp": created,
            })
        })
        .collect();

    let mut session = json!({
        "id": id,
        "model": "ollama:llama3.2:latest",
        "created_at": created,
        "updated_at": created,
        "messages": messages,
    });
    if let Some(parent) = parent_id {
        session["parent_id"] = json!(parent);
    }
    if let Some(name) = name {
        session["name"] = json!(name);
    }

    let path = dir.join(format!("{}.json", id));
    fs::write(&path, serde_json::to_string_pretty(&session).unwrap())
        .expect("failed to write session file");
    path
}
