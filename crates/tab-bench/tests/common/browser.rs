//! Browser helpers for tests that drive a real Chromium

use anyhow::Result;
use chromiumoxide::browser::BrowserConfig;
use tab_bench::config::SourceConfig;
use tab_bench::source::ChromeTabSource;

/// Check if browser tests should be skipped (when Chrome isn't available)
pub fn should_skip() -> bool {
    std::env::var("SKIP_BROWSER_TESTS").is_ok()
}

/// Macro to skip test if Chrome isn't available
#[macro_export]
macro_rules! skip_if_no_chrome {
    () => {
        if browser::should_skip() {
            eprintln!("Skipping test: SKIP_BROWSER_TESTS is set");
            return;
        }
    };
}

/// Find Chrome for Testing installed by Puppeteer
pub fn find_chrome_for_testing() -> Option<std::path::PathBuf> {
    let home = std::env::var("HOME").ok()?;
    let puppeteer_cache = std::path::Path::new(&home).join(".cache/puppeteer/chrome");

    let entries = std::fs::read_dir(&puppeteer_cache).ok()?;
    let mut versions: Vec<_> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    versions.sort_by(|a, b| b.cmp(a));

    versions.into_iter().find_map(|version_dir| {
        [
            "chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing",
            "chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing",
            "chrome-linux64/chrome",
        ]
        .iter()
        .map(|rel| version_dir.join(rel))
        .find(|path| path.exists())
    })
}

/// Headless browser config with its own profile directory
pub fn test_browser_config() -> Result<BrowserConfig> {
    use std::sync::atomic::{AtomicU64, Ordering};
    static BROWSER_ID: AtomicU64 = AtomicU64::new(0);

    let mut builder = BrowserConfig::builder();
    if let Some(chrome_path) = find_chrome_for_testing() {
        eprintln!("Using Chrome for Testing: {}", chrome_path.display());
        builder = builder.chrome_executable(chrome_path);
    }

    // Parallel test binaries must not share a profile
    let user_data_dir = std::env::temp_dir().join(format!(
        "tab-bench-{}-{}",
        std::process::id(),
        BROWSER_ID.fetch_add(1, Ordering::SeqCst)
    ));
    builder = builder.user_data_dir(user_data_dir);

    builder
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build browser config: {}", e))
}

/// Launch a tab source, or `None` when no Chrome is installed
pub async fn require_tab_source(config: &SourceConfig) -> Option<ChromeTabSource> {
    let browser_config = match test_browser_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Skipping: {:#}", e);
            return None;
        }
    };
    match ChromeTabSource::launch(browser_config, config).await {
        Ok(source) => Some(source),
        Err(e) => {
            let message = format!("{:#}", e);
            if message.contains("Could not auto detect") {
                eprintln!("Skipping: Chrome not installed ({})", message);
                None
            } else {
                panic!("Unexpected browser error: {}", message);
            }
        }
    }
}
