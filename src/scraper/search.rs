//! 站内搜索
//!
//! 搜索结果页的每个条目是 `<h1 class="entry-title"><a href="...">标题</a></h1>`，
//! 用正则抓出链接与标题即可。

use crate::config::ScraperConfig;
use crate::scraper::{decode_entities, ScrapeError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info};

/// 一条搜索结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResult {
    pub title: String,
    pub page_url: String,
}

/// 资源站 HTTP 客户端
pub struct SearchClient {
    pub(crate) http: reqwest::Client,
    base_url: String,
}

fn entry_title_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?is)<h1[^>]*class="[^"]*entry-title[^"]*"[^>]*>\s*<a[^>]+href="([^"]+)"[^>]*>(.*?)</a>"#,
        )
        .expect("正则字面量")
    })
}

fn tag_strip_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("正则字面量"))
}

impl SearchClient {
    pub fn new(config: &ScraperConfig) -> Result<Self, ScrapeError> {
        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// 站内搜索，返回 (标题, 详情页链接) 列表。无结果时返回空列表。
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ScrapeError> {
        let url = format!("{}/?s={}", self.base_url, urlencoding::encode(query));
        debug!("搜索请求: {}", url);

        let html = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let results = parse_search_results(&html);
        info!("搜索 \"{}\" 命中 {} 条结果", query, results.len());
        Ok(results)
    }
}

/// 从搜索结果页 HTML 中提取条目
pub(crate) fn parse_search_results(html: &str) -> Vec<SearchResult> {
    entry_title_regex()
        .captures_iter(html)
        .map(|cap| {
            let raw_title = tag_strip_regex().replace_all(&cap[2], "");
            SearchResult {
                title: decode_entities(raw_title.trim()),
                page_url: decode_entities(&cap[1]),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_PAGE: &str = r#"
<html><body>
<article>
  <h1 class="entry-title"><a href="https://example.site/game-one/" rel="bookmark">Game One &#8211; Deluxe</a></h1>
</article>
<article>
  <h1 class="post-title entry-title something">
    <a href="https://example.site/game-two/?a=1&amp;b=2"><span>Game</span> Two</a>
  </h1>
</article>
<h1 class="page-title">不相关的标题</h1>
</body></html>
"#;

    #[test]
    fn test_parse_search_results() {
        let results = parse_search_results(SEARCH_PAGE);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Game One – Deluxe");
        assert_eq!(results[0].page_url, "https://example.site/game-one/");
        // 内嵌标签被剥掉，链接里的实体被还原
        assert_eq!(results[1].title, "Game Two");
        assert_eq!(results[1].page_url, "https://example.site/game-two/?a=1&b=2");
    }

    #[test]
    fn test_parse_empty_page() {
        assert!(parse_search_results("<html><body>没有结果</body></html>").is_empty());
    }
}
