// ── Samsung TV app catalog ──

use url::Url;

/// A launchable TV app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TvApp {
    pub name: &'static str,
    pub app_id: &'static str,
}

impl TvApp {
    const fn new(name: &'static str, app_id: &'static str) -> Self {
        Self { name, app_id }
    }

    /// `"Name (id)"`, the form shown in pickers.
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.app_id)
    }
}

pub const CATALOG: &[TvApp] = &[
    TvApp::new("Disney+", "3201901017640"),
    TvApp::new("Disney+ (new)", "3202204027038"),
    TvApp::new("Netflix", "11101200001"),
    TvApp::new("Netflix (new)", "3201907018807"),
    TvApp::new("YouTube", "111299001912"),
    TvApp::new("YouTube Kids", "3201611010983"),
    TvApp::new("Prime Video", "3201512006785"),
    TvApp::new("Prime Video (new)", "3201910019365"),
    TvApp::new("Viaplay", "11111300404"),
    TvApp::new("KPN iTV", "3201803015963"),
    TvApp::new("RTL XL / Videoland", "3201906018642"),
    TvApp::new("Ziggo GO", "3201901017581"),
    TvApp::new("Apple TV", "3201807016597"),
    TvApp::new("Apple TV (new)", "3202106024097"),
    TvApp::new("Spotify", "3201606009684"),
    TvApp::new("Plex", "3201512006963"),
    TvApp::new("Web Browser", "org.tizen.browser"),
    TvApp::new("SmartThings", "3201910019378"),
];

pub const YOUTUBE: TvApp = TvApp::new("YouTube", "111299001912");
pub const BROWSER: TvApp = TvApp::new("Web Browser", "org.tizen.browser");

pub fn labels() -> Vec<String> {
    CATALOG.iter().map(TvApp::label).collect()
}

fn by_id(id: &str) -> Option<TvApp> {
    CATALOG.iter().find(|app| app.app_id == id).copied()
}

fn by_name(name: &str) -> Option<TvApp> {
    CATALOG
        .iter()
        .find(|app| app.name.eq_ignore_ascii_case(name))
        .copied()
}

/// Resolve an app id, a `"Name (id)"` label, or a name (case-insensitive).
pub fn resolve(value: &str) -> Option<TvApp> {
    let raw = value.trim();
    if raw.is_empty() {
        return None;
    }
    if let Some(app) = by_id(raw) {
        return Some(app);
    }
    if let Some((name, tail)) = raw.strip_suffix(')').and_then(|s| s.rsplit_once(" (")) {
        if let Some(app) = by_id(tail.trim()) {
            return Some(app);
        }
        if let Some(app) = by_name(name.trim()) {
            return Some(app);
        }
    }
    by_name(raw)
}

pub fn is_http_url(value: &str) -> bool {
    Url::parse(value.trim())
        .is_ok_and(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some_and(|h| !h.is_empty()))
}

pub fn is_youtube_url(value: &str) -> bool {
    if !is_http_url(value) {
        return false;
    }
    Url::parse(value.trim()).is_ok_and(|u| {
        let host = u.host_str().unwrap_or_default().to_lowercase();
        host.contains("youtube.com") || host.contains("youtu.be")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_id_label_and_name() {
        assert_eq!(resolve("11101200001").map(|a| a.name), Some("Netflix"));
        assert_eq!(resolve("Netflix (new) (3201907018807)").map(|a| a.name), Some("Netflix (new)"));
        assert_eq!(resolve("  youtube kids ").map(|a| a.app_id), Some("3201611010983"));
        assert_eq!(resolve("Plex (unknown)").map(|a| a.app_id), Some("3201512006963"));
        assert_eq!(resolve("Kodi"), None);
        assert_eq!(resolve("   "), None);
    }

    #[test]
    fn labels_round_trip_through_resolve() {
        for label in labels() {
            assert!(resolve(&label).is_some(), "{label}");
        }
    }

    #[test]
    fn url_helpers() {
        assert!(is_http_url("https://example.com/x"));
        assert!(!is_http_url("ftp://example.com"));
        assert!(!is_http_url("not a url"));
        assert!(is_youtube_url("https://www.youtube.com/watch?v=abc"));
        assert!(is_youtube_url("https://youtu.be/abc"));
        assert!(!is_youtube_url("https://vimeo.com/1"));
    }
}
