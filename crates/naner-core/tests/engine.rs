//! End-to-end batch behavior against an in-memory transport.

use std::collections::HashMap;
use std::io::{self, Cursor, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use naner_core::config::TarBackend;
use naner_core::engine::EngineError;
use naner_core::io::transport::{ProgressFn, TransportError};
use naner_core::{
    Catalog, Engine, EngineConfig, Layout, NullReporter, Reporter, Stage, Transport, VendorStatus,
};
use naner_schema::{VERSION_MARKER, VendorName};
use sha2::{Digest, Sha256};
use tempfile::tempdir;
use zip::write::SimpleFileOptions;

#[derive(Default)]
struct FakeTransport {
    pages: HashMap<String, String>,
    files: HashMap<String, Vec<u8>>,
    downloads: Mutex<Vec<String>>,
}

impl FakeTransport {
    fn page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }

    fn file(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.files.insert(url.to_string(), bytes);
        self
    }

    fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get_text(&self, url: &str) -> Result<String, TransportError> {
        self.pages.get(url).cloned().ok_or_else(|| {
            TransportError::Io(io::Error::other(format!("connection refused: {url}")))
        })
    }

    async fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: ProgressFn<'_>,
    ) -> Result<u64, TransportError> {
        self.downloads.lock().unwrap().push(url.to_string());
        let bytes = self.files.get(url).ok_or_else(|| {
            TransportError::Io(io::Error::other(format!("404 Not Found: {url}")))
        })?;
        std::fs::write(dest, bytes)?;
        let len = bytes.len() as u64;
        progress(100, len, len);
        Ok(len)
    }
}

#[derive(Default)]
struct RecordingReporter {
    warnings: Mutex<Vec<String>>,
}

impl Reporter for RecordingReporter {
    fn section(&self, _: &str) {}
    fn stage(&self, _: &VendorName, _: Stage) {}
    fn downloading(&self, _: &VendorName, _: u8, _: u64, _: u64) {}
    fn done(&self, _: &VendorName, _: &str, _: &str) {}
    fn skipped(&self, _: &VendorName, _: &str) {}
    fn failed(&self, _: &VendorName, _: Stage, _: &str) {}
    fn info(&self, _: &str) {}
    fn warning(&self, msg: &str) {
        self.warnings.lock().unwrap().push(msg.to_string());
    }
    fn summary(&self, _: usize, _: usize, _: usize, _: f64) {}
}

fn zip_bytes(files: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in files {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(contents.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn static_vendor(name: &str, url: &str) -> String {
    format!(
        r#"{{"name": "{name}", "extractDirectory": "{name}",
            "source": {{"type": "static", "url": "{url}"}}}}"#
    )
}

fn catalog(entries: &[String]) -> Catalog {
    Catalog::from_json(&format!("[{}]", entries.join(","))).unwrap()
}

fn config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.tools.tar_backend = TarBackend::Native;
    config
}

fn engine(root: &Path, catalog: Catalog, transport: Arc<FakeTransport>) -> Engine {
    Engine::new(
        Layout::new(root),
        catalog,
        config(),
        transport,
        Arc::new(NullReporter),
    )
}

#[tokio::test]
async fn install_twice_is_a_no_op() {
    let root = tempdir().unwrap();
    let url = "https://example.test/dl/tool-1.2.0.zip";
    let transport = Arc::new(FakeTransport::default().file(
        url,
        zip_bytes(&[("payload-v1.2/bin/tool.exe", "v1"), ("payload-v1.2/README", "r")]),
    ));
    let engine = engine(
        root.path(),
        catalog(&[static_vendor("tool", url)]),
        Arc::clone(&transport),
    );

    let first = engine.install(&[]).await.unwrap();
    assert_eq!(
        first.status("tool"),
        Some(&VendorStatus::Installed {
            version: "1.2.0".to_string()
        })
    );

    let dir = root.path().join("vendor/tool");
    assert!(dir.join("bin/tool.exe").is_file());
    assert!(dir.join("README").is_file());
    assert!(!dir.join("payload-v1.2").exists());
    let marker = std::fs::read_to_string(dir.join(VERSION_MARKER)).unwrap();

    let second = engine.install(&[]).await.unwrap();
    assert!(matches!(
        second.status("tool"),
        Some(VendorStatus::Skipped { .. })
    ));
    assert_eq!(transport.downloads().len(), 1);
    assert_eq!(
        std::fs::read_to_string(dir.join(VERSION_MARKER)).unwrap(),
        marker
    );
    assert!(!root.path().join("vendor/.downloads").exists());
}

#[tokio::test]
async fn failing_resolution_installs_the_fallback() {
    let root = tempdir().unwrap();
    let fallback = "https://example.test/pinned/terminal-1.21.zip";
    let transport =
        Arc::new(FakeTransport::default().file(fallback, zip_bytes(&[("wt.exe", "exe")])));
    let entry = format!(
        r#"{{"name": "terminal", "extractDirectory": "terminal",
            "source": {{"type": "github-release", "repo": "microsoft/terminal", "assetSuffix": "_x64.zip"}},
            "fallback": {{"url": "{fallback}", "version": "1.21"}}}}"#
    );
    let engine = engine(root.path(), catalog(&[entry]), Arc::clone(&transport));

    let report = engine.install(&[]).await.unwrap();
    assert_eq!(
        report.status("terminal"),
        Some(&VendorStatus::Installed {
            version: "fallback".to_string()
        })
    );
    assert_eq!(transport.downloads(), vec![fallback.to_string()]);

    let state = engine
        .installed_state(engine.catalog().find("terminal").unwrap())
        .unwrap();
    assert_eq!(state.version, "fallback");
    assert_eq!(state.pinned_version.as_deref(), Some("1.21"));
}

#[tokio::test]
async fn failing_download_retries_the_fallback_once() {
    let root = tempdir().unwrap();
    let primary = "https://example.test/latest/tool-2.0.zip";
    let fallback = "https://example.test/pinned/tool-1.0.zip";
    let transport =
        Arc::new(FakeTransport::default().file(fallback, zip_bytes(&[("tool.exe", "v1")])));
    let entry = format!(
        r#"{{"name": "tool", "extractDirectory": "tool",
            "source": {{"type": "static", "url": "{primary}"}},
            "fallback": {{"url": "{fallback}"}}}}"#
    );
    let engine = engine(root.path(), catalog(&[entry]), Arc::clone(&transport));

    let report = engine.install(&[]).await.unwrap();
    assert_eq!(
        report.status("tool"),
        Some(&VendorStatus::Installed {
            version: "fallback".to_string()
        })
    );
    assert_eq!(
        transport.downloads(),
        vec![primary.to_string(), fallback.to_string()]
    );
}

#[tokio::test]
async fn checksum_mismatch_fails_before_extraction() {
    let root = tempdir().unwrap();
    let url = "https://example.test/tool-1.0.zip";
    let transport = Arc::new(FakeTransport::default().file(url, zip_bytes(&[("tool.exe", "x")])));
    let entry = format!(
        r#"{{"name": "tool", "extractDirectory": "tool", "checksum": "sha256:{}",
            "source": {{"type": "static", "url": "{url}"}}}}"#,
        "0".repeat(64)
    );
    let engine = engine(root.path(), catalog(&[entry]), transport);

    let report = engine.install(&[]).await.unwrap();
    assert!(matches!(
        report.status("tool"),
        Some(VendorStatus::Failed {
            stage: Stage::Verifying,
            ..
        })
    ));
    assert!(!root.path().join("vendor/tool").exists());
}

#[tokio::test]
async fn matching_checksum_installs() {
    let root = tempdir().unwrap();
    let url = "https://example.test/tool-1.0.zip";
    let bytes = zip_bytes(&[("tool.exe", "x")]);
    let digest = hex::encode(Sha256::digest(&bytes)).to_uppercase();
    let transport = Arc::new(FakeTransport::default().file(url, bytes));
    let entry = format!(
        r#"{{"name": "tool", "extractDirectory": "tool", "checksum": "{digest}",
            "source": {{"type": "static", "url": "{url}"}}}}"#
    );
    let engine = engine(root.path(), catalog(&[entry]), transport);

    let report = engine.install(&[]).await.unwrap();
    assert_eq!(report.installed(), 1);
}

#[tokio::test]
async fn multiple_top_level_entries_stay_unflattened() {
    let root = tempdir().unwrap();
    let url = "https://example.test/bundle-3.zip";
    let transport = Arc::new(
        FakeTransport::default().file(url, zip_bytes(&[("bin/a.exe", "a"), ("lib/b.dll", "b")])),
    );
    let engine = engine(root.path(), catalog(&[static_vendor("bundle", url)]), transport);

    engine.install(&[]).await.unwrap();
    let dir = root.path().join("vendor/bundle");
    assert!(dir.join("bin/a.exe").is_file());
    assert!(dir.join("lib/b.dll").is_file());
}

#[tokio::test]
async fn update_preserves_or_replaces_by_descriptor_flag() {
    let root = tempdir().unwrap();
    let terminal_entry = |url: &str| {
        format!(
            r#"{{"name": "terminal", "extractDirectory": "terminal", "preserveStateOnUpdate": true,
                "source": {{"type": "static", "url": "{url}"}}}}"#
        )
    };

    let v1 = Arc::new(
        FakeTransport::default()
            .file(
                "https://example.test/terminal-1.0.zip",
                zip_bytes(&[("wt-1.0/wt.exe", "v1"), ("wt-1.0/old.dll", "v1")]),
            )
            .file(
                "https://example.test/shell-1.0.zip",
                zip_bytes(&[("shell.exe", "v1"), ("old.dll", "v1")]),
            ),
    );
    engine(
        root.path(),
        catalog(&[
            terminal_entry("https://example.test/terminal-1.0.zip"),
            static_vendor("shell", "https://example.test/shell-1.0.zip"),
        ]),
        v1,
    )
    .install(&[])
    .await
    .unwrap();

    let terminal = root.path().join("vendor/terminal");
    let shell = root.path().join("vendor/shell");
    std::fs::create_dir_all(terminal.join("settings")).unwrap();
    std::fs::write(terminal.join("settings/settings.json"), "user edits").unwrap();

    let v2 = Arc::new(
        FakeTransport::default()
            .file(
                "https://example.test/terminal-2.0.zip",
                zip_bytes(&[("wt-2.0/wt.exe", "v2")]),
            )
            .file(
                "https://example.test/shell-2.0.zip",
                zip_bytes(&[("shell.exe", "v2"), ("new.dll", "v2")]),
            ),
    );
    let report = engine(
        root.path(),
        catalog(&[
            terminal_entry("https://example.test/terminal-2.0.zip"),
            static_vendor("shell", "https://example.test/shell-2.0.zip"),
        ]),
        v2,
    )
    .update(&[])
    .await
    .unwrap();
    assert_eq!(report.installed(), 2);

    assert_eq!(
        std::fs::read_to_string(terminal.join("settings/settings.json")).unwrap(),
        "user edits"
    );
    assert_eq!(std::fs::read_to_string(terminal.join("wt.exe")).unwrap(), "v2");

    let mut names: Vec<String> = std::fs::read_dir(&shell)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec![VERSION_MARKER, "new.dll", "shell.exe"]);
    assert_eq!(std::fs::read_to_string(shell.join("shell.exe")).unwrap(), "v2");
}

#[tokio::test]
async fn compressed_tar_without_archive_tool_fails_cleanly() {
    let root = tempdir().unwrap();
    let transport = Arc::new(FakeTransport::default().file(
        "https://example.test/msys2-base-x86_64-20241208.tar.xz",
        b"xz payload".to_vec(),
    ));
    let msys2 = r#"{"name": "msys2", "extractDirectory": "msys64", "dependencies": ["7zip"],
        "source": {"type": "static", "url": "https://example.test/msys2-base-x86_64-20241208.tar.xz"}}"#;
    let seven_zip = static_vendor("7zip", "https://example.test/7z2408-x64.msi");

    let mut config = config();
    config.tools.tar_backend = TarBackend::External;
    let reporter = Arc::new(RecordingReporter::default());
    let engine = Engine::new(
        Layout::new(root.path()),
        catalog(&[msys2.to_string(), seven_zip]),
        config,
        transport,
        Arc::clone(&reporter) as Arc<dyn Reporter>,
    );

    let report = engine.install(&[]).await.unwrap();
    let names: Vec<&str> = report.outcomes.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["7zip", "msys2"]);

    assert!(matches!(
        report.status("7zip"),
        Some(VendorStatus::Failed {
            stage: Stage::Downloading,
            ..
        })
    ));
    match report.status("msys2") {
        Some(VendorStatus::Failed { stage, reason }) => {
            assert_eq!(*stage, Stage::Extracting);
            assert!(reason.contains("Missing archive tool"), "{reason}");
        }
        other => panic!("expected extraction failure, got {other:?}"),
    }
    let warnings = reporter.warnings.lock().unwrap();
    assert!(warnings.iter().any(|w| w.contains("dependency 7zip")));
}

#[tokio::test]
async fn one_failure_does_not_stop_the_batch() {
    let root = tempdir().unwrap();
    let mut transport = FakeTransport::default();
    for name in ["a", "c", "d"] {
        let exe = format!("{name}.exe");
        transport = transport.file(
            &format!("https://example.test/{name}-1.0.zip"),
            zip_bytes(&[(exe.as_str(), name)]),
        );
    }
    let transport = Arc::new(transport);
    let entries: Vec<String> = ["a", "b", "c", "d"]
        .iter()
        .map(|n| static_vendor(n, &format!("https://example.test/{n}-1.0.zip")))
        .collect();
    let engine = engine(root.path(), catalog(&entries), Arc::clone(&transport));

    let report = engine.install(&[]).await.unwrap();
    assert_eq!(report.installed(), 3);
    assert_eq!(report.failed(), 1);
    assert!(matches!(
        report.status("b"),
        Some(VendorStatus::Failed {
            stage: Stage::Downloading,
            ..
        })
    ));
    assert!(root.path().join("vendor/d/d.exe").is_file());
    assert_eq!(transport.downloads().len(), 4);
    assert!(!root.path().join("vendor/.downloads").exists());
}

#[tokio::test]
async fn disabled_and_filtered_vendors() {
    let root = tempdir().unwrap();
    let transport = Arc::new(
        FakeTransport::default()
            .file("https://example.test/a-1.zip", zip_bytes(&[("a", "a")]))
            .file("https://example.test/b-1.zip", zip_bytes(&[("b", "b")])),
    );
    let disabled = r#"{"name": "off", "extractDirectory": "off", "enabled": false,
        "source": {"type": "static", "url": "https://example.test/off-1.zip"}}"#;
    let engine = engine(
        root.path(),
        catalog(&[
            static_vendor("a", "https://example.test/a-1.zip"),
            static_vendor("b", "https://example.test/b-1.zip"),
            disabled.to_string(),
        ]),
        Arc::clone(&transport),
    );

    let report = engine.install(&["b".to_string()]).await.unwrap();
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(transport.downloads(), vec!["https://example.test/b-1.zip"]);

    let report = engine.install(&[]).await.unwrap();
    assert_eq!(
        report.status("off"),
        Some(&VendorStatus::Skipped {
            reason: "disabled".to_string()
        })
    );

    assert!(matches!(
        engine.install(&["nope".to_string()]).await,
        Err(EngineError::Catalog(_))
    ));
}

#[tokio::test]
async fn resolve_reports_without_downloading() {
    let root = tempdir().unwrap();
    let transport = Arc::new(FakeTransport::default().page(
        "https://api.github.com/repos/PowerShell/PowerShell/releases/latest",
        r#"{"tag_name": "v7.4.6", "assets": [
            {"name": "PowerShell-7.4.6-win-x64.zip", "browser_download_url": "https://example.test/ps.zip"}
        ]}"#,
    ));
    let entry = r#"{"name": "powershell", "extractDirectory": "powershell",
        "source": {"type": "github-release", "repo": "PowerShell/PowerShell",
                   "assetPrefix": "PowerShell-", "assetSuffix": "-win-x64.zip"}}"#;
    let engine = engine(root.path(), catalog(&[entry.to_string()]), Arc::clone(&transport));

    let release = engine.resolve("powershell").await.unwrap();
    assert_eq!(release.version, "7.4.6");
    assert_eq!(release.download_url, "https://example.test/ps.zip");
    assert!(transport.downloads().is_empty());
}
