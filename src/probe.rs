//! Capability probing module
//!
//! One small request per renderer endpoint at startup, all issued
//! concurrently, decides which render strategies this site supports.
//! A probe failure is a capability absence, never an error; only a site
//! that supports no strategy at all aborts the run.

use crate::download::Downloader;
use crate::{MirrorError, Result};
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

/// Which render endpoints the target site answers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    pub action_parse: bool,
    pub desktop_rest: bool,
    pub mobile_rest: bool,
    pub rest_api: bool,
    pub visual_editor: bool,
}

impl CapabilitySet {
    pub fn any(&self) -> bool {
        self.action_parse
            || self.desktop_rest
            || self.mobile_rest
            || self.rest_api
            || self.visual_editor
    }
}

/// Probes every render endpoint against one known page.
///
/// `probe_page` is a page that certainly exists on the site, typically
/// its main page.
pub async fn probe_capabilities(
    downloader: &Downloader,
    base: &Url,
    probe_page: &str,
) -> Result<CapabilitySet> {
    let (action_parse, desktop_rest, mobile_rest, rest_api, visual_editor) = tokio::join!(
        probe_action_parse(downloader, base, probe_page),
        probe_desktop_rest(downloader, base, probe_page),
        probe_mobile_rest(downloader, base, probe_page),
        probe_rest_api(downloader, base, probe_page),
        probe_visual_editor(downloader, base, probe_page),
    );

    let caps = CapabilitySet {
        action_parse,
        desktop_rest,
        mobile_rest,
        rest_api,
        visual_editor,
    };

    if !caps.any() {
        return Err(MirrorError::FatalStartup(format!(
            "site {base} answers none of the known render endpoints"
        )));
    }

    info!(
        action_parse = caps.action_parse,
        desktop_rest = caps.desktop_rest,
        mobile_rest = caps.mobile_rest,
        rest_api = caps.rest_api,
        visual_editor = caps.visual_editor,
        "probed site capabilities"
    );

    Ok(caps)
}

async fn probe_action_parse(downloader: &Downloader, base: &Url, page: &str) -> bool {
    let url = match base.join(&format!(
        "w/api.php?action=parse&format=json&page={}",
        encode_title(page)
    )) {
        Ok(url) => url,
        Err(_) => return false,
    };
    match downloader.get_json(url.as_str()).await {
        Ok(body) => body.get("parse").is_some(),
        Err(err) => {
            debug!(endpoint = "action-parse", %err, "probe failed");
            false
        }
    }
}

async fn probe_desktop_rest(downloader: &Downloader, base: &Url, page: &str) -> bool {
    probe_html(downloader, base, &format!("api/rest_v1/page/html/{}", encode_title(page)), "desktop-rest").await
}

async fn probe_mobile_rest(downloader: &Downloader, base: &Url, page: &str) -> bool {
    probe_html(
        downloader,
        base,
        &format!("api/rest_v1/page/mobile-html/{}", encode_title(page)),
        "mobile-rest",
    )
    .await
}

async fn probe_rest_api(downloader: &Downloader, base: &Url, page: &str) -> bool {
    let url = match base.join(&format!("w/rest.php/v1/page/{}", encode_title(page))) {
        Ok(url) => url,
        Err(_) => return false,
    };
    match downloader.get_json(url.as_str()).await {
        Ok(body) => body.get("id").is_some() || body.get("source").is_some(),
        Err(err) => {
            debug!(endpoint = "rest-api", %err, "probe failed");
            false
        }
    }
}

async fn probe_visual_editor(downloader: &Downloader, base: &Url, page: &str) -> bool {
    let url = match base.join(&format!(
        "w/api.php?action=visualeditor&format=json&paction=metadata&page={}",
        encode_title(page)
    )) {
        Ok(url) => url,
        Err(_) => return false,
    };
    match downloader.get_json(url.as_str()).await {
        Ok(body) => matches!(body.get("visualeditor"), Some(Value::Object(_))),
        Err(err) => {
            debug!(endpoint = "visual-editor", %err, "probe failed");
            false
        }
    }
}

async fn probe_html(downloader: &Downloader, base: &Url, path: &str, endpoint: &str) -> bool {
    let url = match base.join(path) {
        Ok(url) => url,
        Err(_) => return false,
    };
    match downloader.get_content(url.as_str()).await {
        Ok(content) => !content.data.is_empty(),
        Err(err) => {
            debug!(endpoint, %err, "probe failed");
            false
        }
    }
}

fn encode_title(title: &str) -> String {
    title.replace(' ', "_").replace('?', "%3F").replace('&', "%26")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_capability_set_supports_nothing() {
        assert!(!CapabilitySet::default().any());
    }

    #[test]
    fn test_single_capability_is_enough() {
        let caps = CapabilitySet {
            mobile_rest: true,
            ..Default::default()
        };
        assert!(caps.any());
    }

    #[test]
    fn test_title_encoding() {
        assert_eq!(encode_title("Main Page"), "Main_Page");
        assert_eq!(encode_title("Q&A"), "Q%26A");
    }
}
