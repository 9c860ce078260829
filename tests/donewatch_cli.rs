use std::process::Command;

fn combined_output(output: &std::process::Output) -> String {
    let mut combined = String::new();
    combined.push_str(&String::from_utf8_lossy(&output.stdout));
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    combined
}

fn donewatch(settings: &std::path::Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_donewatch"));
    cmd.env("DONEWATCH_SETTINGS", settings);
    cmd
}

#[test]
fn help_lists_subcommands() {
    let output = Command::new(env!("CARGO_BIN_EXE_donewatch"))
        .arg("--help")
        .output()
        .expect("run donewatch --help");
    assert!(output.status.success());
    let combined = combined_output(&output);
    for sub in ["watch", "windows", "shell", "settings", "test-tick", "test-stop"] {
        assert!(combined.contains(sub), "missing {sub} in help");
    }
}

#[test]
fn watch_without_target_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = donewatch(&dir.path().join("settings.json"))
        .arg("watch")
        .output()
        .expect("run donewatch watch");
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("--region"));
}

#[test]
fn invalid_config_is_refused_before_watching() {
    let dir = tempfile::tempdir().unwrap();
    let output = donewatch(&dir.path().join("settings.json"))
        .args(["watch", "--region", "0,0,200,200", "--poll", "0"])
        .output()
        .expect("run donewatch watch");
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("poll"));
}

#[test]
fn settings_set_then_show() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");

    let output = donewatch(&path)
        .args(["settings", "set", "beep.quietSecs", "1.5"])
        .output()
        .expect("run donewatch settings set");
    assert!(output.status.success(), "{}", combined_output(&output));

    let output = donewatch(&path)
        .args(["settings", "show"])
        .output()
        .expect("run donewatch settings show");
    assert!(output.status.success());
    let shown: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(shown["beep"]["quietSecs"], 1.5);
    assert_eq!(shown["watch"]["pollSecs"], 0.8);
}

#[test]
fn settings_set_rejects_unknown_key() {
    let dir = tempfile::tempdir().unwrap();
    let output = donewatch(&dir.path().join("settings.json"))
        .args(["settings", "set", "beep.loudness", "11"])
        .output()
        .expect("run donewatch settings set");
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("unknown setting"));
}
