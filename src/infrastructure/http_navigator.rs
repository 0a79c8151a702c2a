//! Plain HTTP navigation backend
//!
//! Fetches pages with `reqwest` and serves them as static markup. There is no
//! script engine, so content rendered client-side is invisible to it and
//! `execute_script` reports `Unsupported`.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{direct::NotKeyed, InMemoryState},
    Quota, RateLimiter,
};
use reqwest::header::{HeaderValue, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::Client;
use tracing::{debug, info};

use crate::infrastructure::config::HttpSettings;
use crate::infrastructure::document::{compile_selector, PageDocument};
use crate::infrastructure::harvest_error::NavigationError;
use crate::infrastructure::navigator::{NavResult, Navigator};

const FALLBACK_USER_AGENT: &str = "product-harvester/0.1";

struct LoadedPage {
    url: String,
    source: String,
}

pub struct HttpNavigator {
    client: Option<Client>,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    user_agents: Vec<String>,
    rng: fastrand::Rng,
    proxy: Option<String>,
    page: Option<LoadedPage>,
}

impl HttpNavigator {
    /// Build a navigator with its own client, rate limiter and RNG
    pub fn new(settings: &HttpSettings, seed: u64) -> Result<Self> {
        let mut rng = fastrand::Rng::with_seed(seed);
        let proxy = (!settings.proxies.is_empty())
            .then(|| settings.proxies[rng.usize(..settings.proxies.len())].clone());

        let mut builder = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .cookie_store(true)
            .redirect(if settings.follow_redirects {
                reqwest::redirect::Policy::limited(settings.max_redirects)
            } else {
                reqwest::redirect::Policy::none()
            });
        if let Some(proxy_url) = &proxy {
            builder = builder.proxy(
                reqwest::Proxy::all(proxy_url).with_context(|| format!("Invalid proxy URL: {proxy_url}"))?,
            );
        }
        let client = builder.build().context("Failed to create HTTP client")?;

        let quota = Quota::per_second(
            NonZeroU32::new(settings.max_requests_per_second).context("Rate limit must be greater than 0")?,
        );

        let user_agents = settings
            .user_agents
            .iter()
            .filter(|ua| HeaderValue::from_str(ua).is_ok())
            .cloned()
            .collect();

        Ok(Self {
            client: Some(client),
            rate_limiter: RateLimiter::direct(quota),
            user_agents,
            rng,
            proxy,
            page: None,
        })
    }

    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    fn next_user_agent(&mut self) -> String {
        if self.user_agents.is_empty() {
            return FALLBACK_USER_AGENT.to_string();
        }
        let index = self.rng.usize(..self.user_agents.len());
        self.user_agents[index].clone()
    }

    fn loaded(&self) -> NavResult<&LoadedPage> {
        if self.client.is_none() {
            return Err(NavigationError::Closed);
        }
        self.page.as_ref().ok_or(NavigationError::NoPage)
    }
}

#[async_trait]
impl Navigator for HttpNavigator {
    async fn navigate(&mut self, url: &str) -> NavResult<()> {
        let user_agent = self.next_user_agent();
        let client = self.client.clone().ok_or(NavigationError::Closed)?;
        self.page = None;

        self.rate_limiter.until_ready().await;
        info!("Fetching URL: {}", url);

        let response = client
            .get(url)
            .header(USER_AGENT, user_agent)
            .header(ACCEPT_LANGUAGE, "vi-VN,vi;q=0.9,en-US;q=0.8,en;q=0.7")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NavigationError::Timeout
                } else {
                    NavigationError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NavigationError::Http { status: status.as_u16() });
        }

        let final_url = response.url().to_string();
        let source = response
            .text()
            .await
            .map_err(|e| NavigationError::Transport(format!("failed to read body: {e}")))?;

        debug!("Fetched {} ({} bytes)", final_url, source.len());
        self.page = Some(LoadedPage { url: final_url, source });
        Ok(())
    }

    /// Static markup cannot change, so a single check decides the wait
    async fn wait_until_present(&mut self, selector: &str, _timeout: Duration) -> NavResult<bool> {
        let page = self.loaded()?;
        let Some(compiled) = compile_selector(selector) else {
            return Ok(false);
        };
        Ok(PageDocument::parse(&page.source).has_match(&compiled))
    }

    async fn page_source(&mut self) -> NavResult<String> {
        Ok(self.loaded()?.source.clone())
    }

    async fn execute_script(&mut self, _script: &str) -> NavResult<serde_json::Value> {
        self.loaded()?;
        Err(NavigationError::Unsupported("script execution"))
    }

    async fn close(&mut self) -> NavResult<()> {
        if self.client.take().is_some() {
            debug!("HTTP navigator closed");
        }
        self.page = None;
        Ok(())
    }

    fn current_url(&self) -> Option<&str> {
        self.page.as_ref().map(|page| page.url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> HttpSettings {
        HttpSettings {
            proxies: vec!["http://10.0.0.1:3128".to_string(), "http://10.0.0.2:3128".to_string()],
            ..HttpSettings::default()
        }
    }

    #[test]
    fn test_proxy_and_agents_are_instance_local() {
        let a = HttpNavigator::new(&settings(), 7).unwrap();
        let b = HttpNavigator::new(&settings(), 7).unwrap();
        assert_eq!(a.proxy(), b.proxy());
        assert!(a.proxy().is_some());

        let mut a = a;
        let mut b = b;
        for _ in 0..5 {
            let ua = a.next_user_agent();
            assert_eq!(ua, b.next_user_agent());
            assert!(HttpSettings::default().user_agents.contains(&ua));
        }
    }

    #[test]
    fn test_zero_rate_limit_is_rejected() {
        let settings = HttpSettings {
            max_requests_per_second: 0,
            ..HttpSettings::default()
        };
        assert!(HttpNavigator::new(&settings, 1).is_err());
    }

    #[tokio::test]
    async fn test_page_access_before_navigation_and_after_close() {
        let mut nav = HttpNavigator::new(&HttpSettings::default(), 1).unwrap();
        assert_eq!(nav.page_source().await, Err(NavigationError::NoPage));

        nav.page = Some(LoadedPage {
            url: "https://shop.example/p/1".into(),
            source: "<div class='item'>x</div>".into(),
        });
        assert_eq!(nav.wait_until_present(".item", Duration::from_secs(1)).await, Ok(true));
        assert_eq!(nav.wait_until_present(".other", Duration::from_secs(1)).await, Ok(false));
        assert!(matches!(nav.execute_script("1").await, Err(NavigationError::Unsupported(_))));

        nav.close().await.unwrap();
        nav.close().await.unwrap();
        assert_eq!(nav.navigate("https://shop.example").await, Err(NavigationError::Closed));
        assert_eq!(nav.current_url(), None);
    }
}
