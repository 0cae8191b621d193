//! 资源站抓取
//!
//! 搜索页和详情页都是普通 HTML，直接用正则提取目标片段，
//! 不引入完整的 DOM 解析。

pub mod magnet;
pub mod search;

pub use search::{SearchClient, SearchResult};

use thiserror::Error;

/// 抓取层错误
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("网络请求失败: {0}")]
    Network(#[from] reqwest::Error),

    #[error("页面中未找到 magnet 链接")]
    MagnetNotFound,
}

/// 还原 HTML 实体（只覆盖站点标题里实际出现的几种）
pub(crate) fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&#39;", "'")
        .replace("&#8211;", "–")
        .replace("&#8217;", "’")
        .replace("&#8220;", "“")
        .replace("&#8221;", "”")
        .replace("&nbsp;", " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("Tom &amp; Jerry"), "Tom & Jerry");
        assert_eq!(decode_entities("A &#8211; B"), "A – B");
        assert_eq!(decode_entities("plain"), "plain");
    }
}
