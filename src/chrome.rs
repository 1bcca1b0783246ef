//! Locating a Chrome/Chromium executable, downloading one if needed.
//!
//! Lookup order: the `CHROME` environment variable, well-known commands in
//! `PATH`, well-known install locations, a previous download cached under
//! `~/.a3s/chromium/<version>/`, and finally a fresh Chrome for Testing
//! download into that cache.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::{DorkError, Result};

/// Chrome for Testing release metadata.
const CHROME_VERSIONS_URL: &str =
    "https://googlechromelabs.github.io/chrome-for-testing/last-known-good-versions-with-downloads.json";

#[cfg(target_os = "macos")]
const KNOWN_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
];

#[cfg(all(unix, not(target_os = "macos")))]
const KNOWN_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/opt/google/chrome/chrome",
];

#[cfg(not(unix))]
const KNOWN_PATHS: &[&str] = &[];

const KNOWN_COMMANDS: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
];

#[derive(Debug, Deserialize)]
struct VersionManifest {
    channels: Channels,
}

#[derive(Debug, Deserialize)]
struct Channels {
    #[serde(rename = "Stable")]
    stable: Release,
}

#[derive(Debug, Deserialize)]
struct Release {
    version: String,
    downloads: Downloads,
}

#[derive(Debug, Deserialize)]
struct Downloads {
    #[serde(default)]
    chrome: Vec<Download>,
}

#[derive(Debug, Deserialize)]
struct Download {
    platform: String,
    url: String,
}

impl Release {
    fn download_url(&self, platform: &str) -> Option<&str> {
        self.downloads
            .chrome
            .iter()
            .find(|d| d.platform == platform)
            .map(|d| d.url.as_str())
    }
}

fn browser_err(context: &str, e: impl std::fmt::Display) -> DorkError {
    DorkError::Browser(format!("{}: {}", context, e))
}

/// Chrome for Testing platform identifier for this build target.
fn platform_id() -> Result<&'static str> {
    if cfg!(all(target_os = "macos", target_arch = "aarch64")) {
        Ok("mac-arm64")
    } else if cfg!(all(target_os = "macos", target_arch = "x86_64")) {
        Ok("mac-x64")
    } else if cfg!(all(target_os = "linux", target_arch = "x86_64")) {
        Ok("linux64")
    } else {
        Err(DorkError::Browser(
            "No Chrome for Testing build for this platform".into(),
        ))
    }
}

/// Executable path relative to a version directory.
fn executable_in_archive(platform: &str) -> PathBuf {
    if platform.starts_with("mac") {
        PathBuf::from(format!("chrome-{platform}"))
            .join("Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing")
    } else {
        PathBuf::from(format!("chrome-{platform}")).join("chrome")
    }
}

fn cache_root(home: &Path) -> PathBuf {
    home.join(".a3s").join("chromium")
}

fn home_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .ok_or_else(|| DorkError::Browser("HOME is not set".into()))
}

/// Finds an installed Chrome/Chromium.
pub fn detect_chrome() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("CHROME").map(PathBuf::from) {
        if path.exists() {
            debug!("Chrome from CHROME: {}", path.display());
            return Some(path);
        }
        debug!("Ignoring CHROME={}, file does not exist", path.display());
    }

    if let Some(path) = KNOWN_COMMANDS.iter().find_map(|cmd| which::which(cmd).ok()) {
        debug!("Chrome in PATH: {}", path.display());
        return Some(path);
    }

    KNOWN_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

/// Newest cached download under `root`, if any.
fn cached_chrome(root: &Path, platform: &str) -> Option<PathBuf> {
    let mut versions: Vec<PathBuf> = std::fs::read_dir(root)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir())
        .collect();
    versions.sort_by(|a, b| b.file_name().cmp(&a.file_name()));

    versions
        .into_iter()
        .map(|dir| dir.join(executable_in_archive(platform)))
        .find(|exe| exe.exists())
}

/// Returns a usable Chrome executable, downloading one when none is found.
pub async fn ensure_chrome() -> Result<PathBuf> {
    if let Some(path) = detect_chrome() {
        info!("Using Chrome at {}", path.display());
        return Ok(path);
    }

    let platform = platform_id()?;
    let root = cache_root(&home_dir()?);
    if let Some(path) = cached_chrome(&root, platform) {
        info!("Using cached Chrome at {}", path.display());
        return Ok(path);
    }

    info!("No Chrome found, downloading Chrome for Testing");
    download_chrome(&root, platform).await
}

async fn download_chrome(root: &Path, platform: &str) -> Result<PathBuf> {
    let client = reqwest::Client::new();
    let manifest: VersionManifest = client
        .get(CHROME_VERSIONS_URL)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| browser_err("Cannot fetch Chrome versions", e))?
        .json()
        .await
        .map_err(|e| browser_err("Malformed Chrome versions manifest", e))?;

    let release = manifest.channels.stable;
    let url = release.download_url(platform).ok_or_else(|| {
        DorkError::Browser(format!("No Chrome download for platform {}", platform))
    })?;

    info!("Downloading Chrome {} for {}", release.version, platform);
    let archive = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| browser_err("Chrome download failed", e))?
        .bytes()
        .await
        .map_err(|e| browser_err("Chrome download interrupted", e))?;
    debug!("Downloaded {} bytes", archive.len());

    let version_dir = root.join(&release.version);
    extract_zip(&archive, &version_dir)?;

    let exe = version_dir.join(executable_in_archive(platform));
    if !exe.exists() {
        warn!("Chrome archive did not contain {}", exe.display());
        return Err(DorkError::Browser(format!(
            "Chrome executable missing after extraction: {}",
            exe.display()
        )));
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755))?;
    }

    info!("Chrome {} installed at {}", release.version, exe.display());
    Ok(exe)
}

/// Unpacks a zip archive into `target`.
fn extract_zip(bytes: &[u8], target: &Path) -> Result<()> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| browser_err("Invalid zip archive", e))?;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| browser_err("Corrupt zip entry", e))?;
        let Some(relative) = entry.enclosed_name() else {
            warn!("Skipping zip entry outside the archive root: {}", entry.name());
            continue;
        };
        let path = target.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&path)?;
            continue;
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::File::create(&path)?;
        std::io::copy(&mut entry, &mut file)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode))?;
        }
    }
    Ok(())
}
