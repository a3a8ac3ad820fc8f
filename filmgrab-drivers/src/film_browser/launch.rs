use filmgrab_config::BrowserSettings;
use serde_json::{json, Value};
use webdriver::capabilities::Capabilities;

/// Construct Chrome command-line arguments for the configured browser.
pub fn build_launch_arguments(settings: &BrowserSettings) -> Vec<String> {
    let mut args = vec![
        "--no-sandbox".to_string(),
        "--disable-setuid-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-accelerated-2d-canvas".to_string(),
        "--disable-gpu".to_string(),
        "--disable-infobars".to_string(),
        "--disable-extensions".to_string(),
        format!("--user-agent={}", settings.user_agent),
        format!(
            "--window-size={},{}",
            settings.viewport_width, settings.viewport_height
        ),
    ];
    if settings.headless {
        args.push("--headless=new".to_string());
    }
    if settings.accept_insecure_certs {
        args.push("--ignore-certificate-errors".to_string());
    }
    // FIXME(security): `--disable-web-security` weakens browser isolation.
    // It stays on by default because film pages ship CSP headers that break
    // their own lazy loaders under automation.
    if settings.bypass_csp {
        args.push("--disable-web-security".to_string());
    }
    if settings.disable_images {
        args.push("--blink-settings=imagesEnabled=false".to_string());
    }
    args.extend(settings.extra_args.iter().cloned());
    args
}

/// W3C capabilities for a new Chromedriver session.
///
/// `pageLoadStrategy: eager` returns from navigation at DOMContentLoaded;
/// poster readiness is awaited separately.
pub fn build_capabilities(settings: &BrowserSettings) -> Capabilities {
    let mut caps = Capabilities::new();
    let mut chrome_opts = serde_json::Map::new();
    chrome_opts.insert("args".to_string(), json!(build_launch_arguments(settings)));

    if settings.disable_images {
        chrome_opts.insert(
            "prefs".to_string(),
            json!({ "profile.managed_default_content_settings.images": 2 }),
        );
    }

    caps.insert("goog:chromeOptions".to_string(), Value::Object(chrome_opts));
    caps.insert(
        "acceptInsecureCerts".to_string(),
        json!(settings.accept_insecure_certs),
    );
    caps.insert("pageLoadStrategy".to_string(), json!("eager"));
    caps
}
