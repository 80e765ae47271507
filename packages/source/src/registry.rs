//! Client for the Safety Map wildfire occurrence history API.
//!
//! The API answers with XML:
//!
//! ```xml
//! <response>
//!   <header><resultCode>00</resultCode><resultMsg>NORMAL SERVICE.</resultMsg></header>
//!   <body>
//!     <items><item><OBJT_ID>1</OBJT_ID><OCCU_DATE>20240115</OCCU_DATE>...</item></items>
//!     <totalCount>1</totalCount>
//!   </body>
//! </response>
//! ```
//!
//! Each `<item>` becomes a flat JSON object keyed by child element name so
//! it can go through the same normalizer as spreadsheet rows.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Deserialize;

use crate::SourceError;
use crate::progress::ProgressCallback;

const EMBEDDED_REGISTRY: &str = include_str!("../registry.toml");

/// Result code the API uses for success.
const SUCCESS_CODE: &str = "00";

/// Endpoint and paging settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegistryConfig {
    /// Full endpoint URL, without query string.
    pub base_url: String,
    /// Rows requested per page.
    pub page_size: u32,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Page cap per year in [`RegistryPages::fetch_recent`].
    pub max_pages_per_year: u32,
    /// Page cap for the unfiltered fetch when recent years are empty.
    pub fallback_pages: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::embedded()
    }
}

impl RegistryConfig {
    /// Returns the compiled-in configuration.
    ///
    /// # Panics
    ///
    /// Panics if the embedded `registry.toml` is malformed.
    #[must_use]
    pub fn embedded() -> Self {
        toml::de::from_str(EMBEDDED_REGISTRY)
            .unwrap_or_else(|e| panic!("Failed to parse embedded registry.toml: {e}"))
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// One page of registry rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistryPage {
    /// Rows as flat JSON objects.
    pub items: Vec<serde_json::Value>,
    /// Total rows the API reports for the query, if present.
    pub total_count: Option<u64>,
}

/// Parses an API response body.
///
/// # Errors
///
/// Returns [`SourceError::Xml`] on malformed XML, or [`SourceError::Api`]
/// if the response carries a non-success result code.
pub fn parse_response(xml: &str) -> Result<RegistryPage, SourceError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut path: Vec<String> = Vec::new();
    let mut current_item: Option<serde_json::Map<String, serde_json::Value>> = None;
    let mut text = String::new();

    let mut result_code: Option<String> = None;
    let mut result_msg: Option<String> = None;
    let mut page = RegistryPage::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == "item" {
                    current_item = Some(serde_json::Map::new());
                }
                path.push(name);
                text.clear();
            }
            Ok(Event::Text(t)) => {
                let unescaped = t.unescape().map_err(|e| SourceError::Xml {
                    message: e.to_string(),
                })?;
                text.push_str(&unescaped);
            }
            Ok(Event::CData(c)) => {
                text.push_str(&String::from_utf8_lossy(&c));
            }
            Ok(Event::Empty(e)) => {
                // <ADRES/> is an explicitly empty field.
                if let Some(item) = current_item.as_mut() {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    item.insert(name, serde_json::Value::String(String::new()));
                }
            }
            Ok(Event::End(_)) => {
                let Some(name) = path.pop() else {
                    return Err(SourceError::Xml {
                        message: "unbalanced closing tag".to_string(),
                    });
                };
                let value = std::mem::take(&mut text);

                if name == "item" {
                    if let Some(item) = current_item.take() {
                        page.items.push(serde_json::Value::Object(item));
                    }
                } else if let Some(item) = current_item.as_mut() {
                    item.insert(name, serde_json::Value::String(value));
                } else {
                    match name.as_str() {
                        "resultCode" => result_code = Some(value),
                        "resultMsg" => result_msg = Some(value),
                        "totalCount" => page.total_count = value.trim().parse().ok(),
                        _ => {}
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(SourceError::Xml {
                    message: format!(
                        "XML parsing error at position {}: {e}",
                        reader.buffer_position()
                    ),
                });
            }
        }
        buf.clear();
    }

    if let Some(code) = result_code
        && code != SUCCESS_CODE
    {
        return Err(SourceError::Api {
            message: result_msg.unwrap_or_else(|| format!("API error: {code}")),
            code,
        });
    }

    Ok(page)
}

/// Paged access to the registry.
///
/// Only [`Self::fetch_page`] talks to the network; the multi-page walks are
/// provided on top of it.
#[async_trait]
pub trait RegistryPages: Send + Sync {
    /// Fetches one page (1-based), optionally filtered to an occurrence
    /// year.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on transport, parse, or API errors.
    async fn fetch_page(&self, page: u32, year: Option<i32>) -> Result<RegistryPage, SourceError>;

    /// Walks pages 1..=`max_pages`, stopping at the first empty page. A
    /// failing page ends the walk with whatever was collected so far,
    /// except for a missing credential, which is returned.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Unconfigured`] if no API key is set.
    async fn fetch_pages(
        &self,
        year: Option<i32>,
        max_pages: u32,
    ) -> Result<Vec<serde_json::Value>, SourceError> {
        let mut rows = Vec::new();
        for page in 1..=max_pages {
            match self.fetch_page(page, year).await {
                Ok(fetched) if fetched.items.is_empty() => break,
                Ok(fetched) => rows.extend(fetched.items),
                Err(SourceError::Unconfigured) => return Err(SourceError::Unconfigured),
                Err(e) => {
                    log::warn!("[registry] Page {page} (year {year:?}) failed: {e}");
                    break;
                }
            }
        }
        Ok(rows)
    }

    /// Fetches up to `max_pages` unfiltered pages.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Unconfigured`] if no API key is set.
    async fn fetch_all(&self, max_pages: u32) -> Result<Vec<serde_json::Value>, SourceError> {
        let rows = self.fetch_pages(None, max_pages).await?;
        log::info!("[registry] Fetched {} rows", rows.len());
        Ok(rows)
    }

    /// Fetches up to `max_pages` pages for one occurrence year.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Unconfigured`] if no API key is set.
    async fn fetch_year(
        &self,
        year: i32,
        max_pages: u32,
    ) -> Result<Vec<serde_json::Value>, SourceError> {
        self.fetch_pages(Some(year), max_pages).await
    }

    /// Fetches the most recent `years` years, newest first. If nothing
    /// comes back, falls back to an unfiltered fetch of `fallback_pages`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Unconfigured`] if no API key is set.
    async fn fetch_recent(
        &self,
        years: u32,
        current_year: i32,
        pages_per_year: u32,
        fallback_pages: u32,
        progress: Arc<dyn ProgressCallback>,
    ) -> Result<Vec<serde_json::Value>, SourceError> {
        let oldest = current_year - i32::try_from(years).unwrap_or(i32::MAX).saturating_sub(1);
        log::info!("[registry] Fetching {years} years ({oldest}-{current_year})");
        progress.set_total(u64::from(years));

        let mut rows = Vec::new();
        for year in (oldest..=current_year).rev() {
            progress.set_message(format!("{year}"));
            let year_rows = self.fetch_year(year, pages_per_year).await?;
            log::info!("[registry] {year}: {} rows", year_rows.len());
            rows.extend(year_rows);
            progress.inc(1);
        }

        if rows.is_empty() {
            log::warn!("[registry] No recent rows, fetching all available pages");
            progress.set_message("all years".to_string());
            rows = self.fetch_all(fallback_pages).await?;
        }

        progress.finish(format!("{} rows", rows.len()));
        Ok(rows)
    }
}

/// HTTP client for the registry endpoint.
pub struct RegistryClient {
    client: reqwest::Client,
    config: RegistryConfig,
    api_key: Option<String>,
}

impl RegistryClient {
    #[must_use]
    pub const fn new(
        client: reqwest::Client,
        config: RegistryConfig,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            config,
            api_key,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &RegistryConfig {
        &self.config
    }
}

#[async_trait]
impl RegistryPages for RegistryClient {
    async fn fetch_page(&self, page: u32, year: Option<i32>) -> Result<RegistryPage, SourceError> {
        let Some(api_key) = self.api_key.as_deref().filter(|k| !k.is_empty()) else {
            return Err(SourceError::Unconfigured);
        };

        // Service keys are issued already percent-encoded and must be sent
        // verbatim, so the key goes into the URL by hand.
        let url = format!("{}?serviceKey={api_key}", self.config.base_url);
        let mut query = vec![
            ("numOfRows", self.config.page_size.to_string()),
            ("pageNo", page.to_string()),
            ("dataType", "XML".to_string()),
        ];
        if let Some(year) = year {
            query.push(("occuYear", year.to_string()));
        }

        log::debug!("[registry] GET page {page} (year {year:?})");
        let body = self
            .client
            .get(url)
            .query(&query)
            .timeout(self.config.timeout())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use super::*;
    use crate::progress::null_progress;

    const OK_PAGE: &str = r"<?xml version='1.0' encoding='UTF-8'?>
<response>
  <header><resultCode>00</resultCode><resultMsg>NORMAL SERVICE.</resultMsg></header>
  <body>
    <items>
      <item>
        <OBJT_ID>1001</OBJT_ID>
        <OCCU_DATE>20240115</OCCU_DATE>
        <RN_ADRES>null</RN_ADRES>
        <ADRES>경상북도 안동시 풍천면 &amp; 일대</ADRES>
        <X>1099392.05</X>
        <Y>1756509.03</Y>
        <SGG_CD/>
      </item>
      <item><OBJT_ID>1002</OBJT_ID></item>
    </items>
    <numOfRows>100</numOfRows>
    <pageNo>1</pageNo>
    <totalCount>2</totalCount>
  </body>
</response>";

    #[test]
    fn parses_items_into_flat_rows() {
        let page = parse_response(OK_PAGE).unwrap();

        assert_eq!(page.total_count, Some(2));
        assert_eq!(page.items.len(), 2);
        let first = &page.items[0];
        assert_eq!(first["OBJT_ID"], "1001");
        assert_eq!(first["ADRES"], "경상북도 안동시 풍천면 & 일대");
        assert_eq!(first["RN_ADRES"], "null");
        assert_eq!(first["SGG_CD"], "");
        assert_eq!(page.items[1]["OBJT_ID"], "1002");
    }

    #[test]
    fn non_success_code_is_an_api_error() {
        let xml = "<response><header><resultCode>30</resultCode>\
                   <resultMsg>SERVICE KEY IS NOT REGISTERED ERROR.</resultMsg></header></response>";
        match parse_response(xml) {
            Err(SourceError::Api { code, message }) => {
                assert_eq!(code, "30");
                assert_eq!(message, "SERVICE KEY IS NOT REGISTERED ERROR.");
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[test]
    fn empty_body_is_an_empty_page() {
        let xml = "<response><header><resultCode>00</resultCode></header><body><items/></body></response>";
        assert!(parse_response(xml).unwrap().items.is_empty());
    }

    #[test]
    fn malformed_xml_is_rejected() {
        assert!(matches!(
            parse_response("<response><item></response>"),
            Err(SourceError::Xml { .. })
        ));
    }

    #[test]
    fn embedded_config_points_at_safemap() {
        let config = RegistryConfig::embedded();
        assert!(config.base_url.contains("getFrfireSttusData.do"));
        assert_eq!(config.page_size, 100);
        assert_eq!(config.timeout(), Duration::from_secs(10));
    }

    /// Serves canned pages keyed by `(year, page)` and records requests.
    #[derive(Default)]
    struct FakePages {
        pages: BTreeMap<(Option<i32>, u32), Vec<serde_json::Value>>,
        failing: Vec<(Option<i32>, u32)>,
        unconfigured: bool,
        requests: Mutex<Vec<(Option<i32>, u32)>>,
    }

    impl FakePages {
        fn with_page(mut self, year: Option<i32>, page: u32, ids: &[&str]) -> Self {
            let rows = ids
                .iter()
                .map(|id| serde_json::json!({ "OBJT_ID": id }))
                .collect();
            self.pages.insert((year, page), rows);
            self
        }

        fn requests(&self) -> Vec<(Option<i32>, u32)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RegistryPages for FakePages {
        async fn fetch_page(
            &self,
            page: u32,
            year: Option<i32>,
        ) -> Result<RegistryPage, SourceError> {
            self.requests.lock().unwrap().push((year, page));
            if self.unconfigured {
                return Err(SourceError::Unconfigured);
            }
            if self.failing.contains(&(year, page)) {
                return Err(SourceError::Api {
                    code: "99".to_string(),
                    message: "boom".to_string(),
                });
            }
            Ok(RegistryPage {
                items: self.pages.get(&(year, page)).cloned().unwrap_or_default(),
                total_count: None,
            })
        }
    }

    #[tokio::test]
    async fn fetch_all_stops_at_first_empty_page() {
        let fake = FakePages::default()
            .with_page(None, 1, &["a", "b"])
            .with_page(None, 2, &["c"])
            .with_page(None, 4, &["never"]);

        let rows = fake.fetch_all(5).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(fake.requests(), vec![(None, 1), (None, 2), (None, 3)]);
    }

    #[tokio::test]
    async fn fetch_year_keeps_rows_before_a_failing_page() {
        let mut fake = FakePages::default()
            .with_page(Some(2024), 1, &["a"])
            .with_page(Some(2024), 3, &["c"]);
        fake.failing.push((Some(2024), 2));

        let rows = fake.fetch_year(2024, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn unfiltered_walk_survives_a_failing_page() {
        let mut fake = FakePages::default().with_page(None, 1, &["a", "b"]);
        fake.failing.push((None, 2));

        let rows = fake.fetch_all(5).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(fake.requests(), vec![(None, 1), (None, 2)]);
    }

    #[tokio::test]
    async fn fetch_recent_walks_years_newest_first() {
        let fake = FakePages::default()
            .with_page(Some(2026), 1, &["x"])
            .with_page(Some(2024), 1, &["y", "z"]);

        let rows = fake
            .fetch_recent(3, 2026, 10, 10, null_progress())
            .await
            .unwrap();

        assert_eq!(rows.len(), 3);
        let years: Vec<_> = fake.requests().iter().map(|(y, _)| *y).collect();
        assert_eq!(
            years,
            vec![
                Some(2026),
                Some(2026),
                Some(2025),
                Some(2024),
                Some(2024)
            ]
        );
    }

    #[tokio::test]
    async fn fetch_recent_falls_back_to_unfiltered_pages() {
        let fake = FakePages::default().with_page(None, 1, &["old"]);

        let rows = fake
            .fetch_recent(2, 2026, 10, 10, null_progress())
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["OBJT_ID"], "old");
    }

    #[tokio::test]
    async fn missing_credential_is_not_swallowed() {
        let fake = FakePages {
            unconfigured: true,
            ..FakePages::default()
        };
        assert!(matches!(
            fake.fetch_recent(5, 2026, 10, 10, null_progress()).await,
            Err(SourceError::Unconfigured)
        ));
        assert_eq!(fake.requests().len(), 1);
    }

    #[tokio::test]
    async fn client_without_key_is_unconfigured() {
        let client = RegistryClient::new(reqwest::Client::new(), RegistryConfig::embedded(), None);
        assert!(matches!(
            client.fetch_page(1, None).await,
            Err(SourceError::Unconfigured)
        ));
    }
}
