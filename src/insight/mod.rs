//! Insight module - natural-language commentary from a language-model endpoint
//!
//! Every failure (no key, network, timeout, rate limit, bad response) yields the
//! fixed fallback insight instead of an error.

mod client;
mod prompt;

pub use client::{ChatMessage, ChatRole, CompletionClient, HttpCompletionClient, InsightError};
pub use prompt::InsightContext;

use crate::config::InsightConfig;
use std::sync::Arc;
use tracing::{info, warn};

pub const FALLBACK_MESSAGE: &str =
    "AI insights are unavailable right now. The KPIs and charts above reflect the current filters.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsightSource {
    Model,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Insight {
    pub text: String,
    pub source: InsightSource,
    /// Why the fallback was used, for the status line.
    pub reason: Option<String>,
}

impl Insight {
    pub fn fallback() -> Self {
        Self {
            text: FALLBACK_MESSAGE.to_string(),
            source: InsightSource::Fallback,
            reason: None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == InsightSource::Fallback
    }
}

/// Turns summary statistics into commentary through a completion client.
#[derive(Clone)]
pub struct InsightGenerator {
    client: Option<Arc<dyn CompletionClient>>,
}

impl InsightGenerator {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            client: Some(client),
        }
    }

    /// HTTP-backed generator; without an API key it only produces the fallback.
    pub fn from_config(config: &InsightConfig) -> Self {
        if config.api_key.is_none() {
            info!("no language-model API key configured; insights will use the fallback message");
            return Self { client: None };
        }
        match HttpCompletionClient::new(config.clone()) {
            Ok(client) => Self::new(Arc::new(client)),
            Err(e) => {
                warn!(error = %e, "failed to build completion client");
                Self { client: None }
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    /// Blocking; call from a worker thread.
    pub fn generate(&self, context: &InsightContext) -> Insight {
        let Some(client) = &self.client else {
            return Insight {
                reason: Some(InsightError::Unconfigured.to_string()),
                ..Insight::fallback()
            };
        };

        match client.complete(&context.messages()) {
            Ok(text) => Insight {
                text,
                source: InsightSource::Model,
                reason: None,
            },
            Err(e) => {
                warn!(error = %e, "insight request failed; using fallback");
                Insight {
                    reason: Some(e.to_string()),
                    ..Insight::fallback()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;
    use std::time::Duration;

    struct StubClient(fn() -> Result<String, InsightError>);

    impl CompletionClient for StubClient {
        fn complete(&self, _messages: &[ChatMessage]) -> Result<String, InsightError> {
            (self.0)()
        }
    }

    #[test]
    fn reply_is_passed_through() {
        let generator = InsightGenerator::new(Arc::new(StubClient(|| Ok("Tech leads.".to_string()))));
        let insight = generator.generate(&InsightContext::default());
        assert_eq!(insight.text, "Tech leads.");
        assert_eq!(insight.source, InsightSource::Model);
    }

    #[test]
    fn every_failure_gives_the_fixed_fallback() {
        let failures: [fn() -> Result<String, InsightError>; 4] = [
            || Err(InsightError::Timeout),
            || Err(InsightError::RateLimited),
            || Err(InsightError::Malformed("{}".to_string())),
            || Err(InsightError::Network("refused".to_string())),
        ];
        for failure in failures {
            let insight = InsightGenerator::new(Arc::new(StubClient(failure)))
                .generate(&InsightContext::default());
            assert_eq!(insight.text, FALLBACK_MESSAGE);
            assert!(insight.is_fallback());
            assert!(insight.reason.is_some());
        }
    }

    #[test]
    fn unconfigured_generator_falls_back() {
        let generator = InsightGenerator::from_config(&InsightConfig::default());
        assert!(!generator.is_configured());
        assert_eq!(generator.generate(&InsightContext::default()).text, FALLBACK_MESSAGE);
    }

    #[test]
    fn stalled_endpoint_times_out_to_fallback() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            // Read the request and never answer.
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf);
                std::thread::sleep(Duration::from_millis(1500));
            }
        });

        let config = InsightConfig {
            endpoint: format!("http://{addr}/v1/chat/completions"),
            api_key: Some("test-key".to_string()),
            timeout: Duration::from_millis(300),
            ..InsightConfig::default()
        };
        let insight = InsightGenerator::from_config(&config).generate(&InsightContext::default());

        assert_eq!(insight.text, FALLBACK_MESSAGE);
        assert_eq!(insight.reason.as_deref(), Some("Request timed out"));
        server.join().unwrap();
    }
}
