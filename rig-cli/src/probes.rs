//! Built-in host probe suite.
//!
//! Small integration checks against the machine `rig` runs on. They double
//! as a smoke test of the harness itself: nested subtests, parallel
//! subtests, skips, and logged diagnostics all show up in a normal run.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use rig_harness::{RunConfig, Suite, SuiteError, H};

const OS_RELEASE: &str = "/etc/os-release";

/// Build the probe suite with the given run configuration.
pub fn suite(config: RunConfig) -> Result<Suite, SuiteError> {
    let mut suite = Suite::new(config);
    suite.register("host.os-release", os_release)?;
    suite.register("host.commands", commands)?;
    suite.register("host.tempfile", tempfile_round_trip)?;
    suite.register("host.env", env)?;
    Ok(suite)
}

/// Parse `KEY=value` lines, dropping comments and surrounding quotes.
pub fn parse_os_release(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}

async fn os_release(h: H) {
    let content = match tokio::fs::read_to_string(OS_RELEASE).await {
        Ok(content) => content,
        Err(e) => h.skip(format!("cannot read {OS_RELEASE}: {e}")),
    };
    let fields = parse_os_release(&content);
    h.log(format!("{} fields", fields.len()));

    for key in ["ID", "NAME"] {
        let value = fields.get(key).cloned();
        h.run(key, move |t| async move {
            t.parallel().await;
            match value {
                Some(v) if !v.is_empty() => t.log(format!("{key}={v}")),
                Some(_) => t.error(format!("{key} is empty")),
                None => t.error(format!("{key} is missing")),
            }
        })
        .await;
    }

    let version = fields.get("VERSION_ID").cloned();
    h.run("VERSION_ID", move |t| async move {
        match version {
            Some(v) => t.log(format!("VERSION_ID={v}")),
            None => t.skip("rolling release without VERSION_ID"),
        }
    })
    .await;
}

async fn commands(h: H) {
    let cases: [(&'static str, &'static [&'static str], &'static str); 3] = [
        ("true", &[], ""),
        ("sh", &["-c", "echo ok"], "ok"),
        ("uname", &["-s"], ""),
    ];
    for (program, args, expected) in cases {
        h.run(program, move |t| async move {
            t.parallel().await;
            let output = match tokio::process::Command::new(program).args(args).output().await {
                Ok(output) => output,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    t.skip(format!("{program} not installed"))
                }
                Err(e) => t.fatal(format!("spawning {program}: {e}")),
            };
            if !output.status.success() {
                t.fatal(format!("{program} exited with {}", output.status));
            }
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stdout = stdout.trim();
            if !stdout.is_empty() {
                t.log(format!("stdout: {stdout}"));
            }
            if !expected.is_empty() && stdout != expected {
                t.error(format!("expected {expected:?}, got {stdout:?}"));
            }
        })
        .await;
    }
}

async fn tempfile_round_trip(h: H) {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let path: PathBuf =
        std::env::temp_dir().join(format!("rig-probe-{}-{}", std::process::id(), nanos));
    let payload = format!("written by {}", h.name());

    let written = {
        let (path, payload) = (path.clone(), payload.clone());
        h.run("write", move |t| async move {
            if let Err(e) = tokio::fs::write(&path, payload).await {
                t.fatal(format!("writing {}: {e}", path.display()));
            }
        })
        .await
    };
    if !written {
        h.fail_now();
    }

    {
        let path = path.clone();
        h.run("read", move |t| async move {
            match tokio::fs::read_to_string(&path).await {
                Ok(content) if content == payload => {}
                Ok(content) => t.error(format!("read back {content:?}, wrote {payload:?}")),
                Err(e) => t.error(format!("reading {}: {e}", path.display())),
            }
        })
        .await;
    }

    h.run("remove", move |t| async move {
        if let Err(e) = tokio::fs::remove_file(&path).await {
            t.error(format!("removing {}: {e}", path.display()));
        }
        if path.exists() {
            t.error("file still exists after removal");
        }
    })
    .await;
}

async fn env(h: H) {
    match std::env::var("PATH") {
        Ok(path) if !path.is_empty() => {
            h.log(format!("PATH has {} entries", std::env::split_paths(&path).count()))
        }
        _ => h.error("PATH is not set"),
    }
    if let Ok(home) = std::env::var("HOME") {
        h.log(format!("HOME={home}"));
    }
}
