//! 详情页 magnet 提取

use crate::scraper::{decode_entities, ScrapeError, SearchClient};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, info};

fn href_magnet_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"href="(magnet:[^"]+)""#).expect("正则字面量"))
}

fn raw_magnet_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"magnet:[^\s"'<>]+"#).expect("正则字面量"))
}

impl SearchClient {
    /// 抓取详情页并提取第一个 magnet 链接
    pub async fn find_magnet(&self, page_url: &str) -> Result<String, ScrapeError> {
        debug!("提取 magnet: {}", page_url);
        let html = self
            .http
            .get(page_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let magnet = extract_magnet(&html).ok_or(ScrapeError::MagnetNotFound)?;
        info!("✓ 提取到 magnet 链接（{} 字符）", magnet.len());
        Ok(magnet)
    }
}

/// 从页面 HTML 中提取第一个 magnet URI。
///
/// 优先取 `<a href="magnet:...">`，页面没有超链接形式时
/// 退化为全文匹配裸 magnet 文本。
pub(crate) fn extract_magnet(html: &str) -> Option<String> {
    if let Some(cap) = href_magnet_regex().captures(html) {
        return Some(decode_entities(&cap[1]));
    }
    raw_magnet_regex()
        .find(html)
        .map(|m| decode_entities(m.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_magnet_from_href() {
        let html = r#"
<p>下载方式：</p>
<a href="magnet:?xt=urn:btih:ABCDEF1234&amp;dn=Game.One&amp;tr=udp%3A%2F%2Ftracker">magnet</a>
<a href="magnet:?xt=urn:btih:SECOND">第二个</a>
"#;
        let magnet = extract_magnet(html).unwrap();
        // 取第一个，且 &amp; 被还原
        assert_eq!(magnet, "magnet:?xt=urn:btih:ABCDEF1234&dn=Game.One&tr=udp%3A%2F%2Ftracker");
    }

    #[test]
    fn test_extract_magnet_from_raw_text() {
        let html = "<pre>magnet:?xt=urn:btih:FFFF0000 复制上面的链接</pre>";
        assert_eq!(
            extract_magnet(html).unwrap(),
            "magnet:?xt=urn:btih:FFFF0000"
        );
    }

    #[test]
    fn test_extract_magnet_missing() {
        assert!(extract_magnet("<html><body>没有链接</body></html>").is_none());
    }
}
