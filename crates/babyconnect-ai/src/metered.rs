//! Quota-gated access to a [`Generator`].
//!
//! Every call goes check, then consume, then call: a blocked quota returns
//! [`AiOutcome::QuotaExceeded`] without reaching the service, and a unit is
//! consumed *before* the call so concurrent callers cannot overshoot the
//! daily limit. A unit consumed by a call that then fails is not refunded.

use std::sync::Arc;
use std::time::Duration;

use babyconnect_store::models::{AppConfig, NameMeaning, Product};
use babyconnect_store::{QuotaMeter, QuotaStatus};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::error::{AiError, AiResult};
use crate::generator::{ChatTurn, GenerateRequest, Generator};
use crate::prompts::{self, GeneratedWeek};

/// Default bound on a single AI call.
pub const DEFAULT_AI_TIMEOUT: Duration = Duration::from_secs(30);

/// How AI calls are bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AiPolicy {
    /// Per-call timeout; `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for AiPolicy {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_AI_TIMEOUT),
        }
    }
}

/// Result of a metered call. Every variant carries the quota after the call.
#[derive(Debug, Clone, PartialEq)]
pub enum AiOutcome<T> {
    Ok { value: T, quota: QuotaStatus },
    QuotaExceeded(QuotaStatus),
    Failed { reason: String, quota: QuotaStatus },
}

impl<T> AiOutcome<T> {
    pub fn quota(&self) -> QuotaStatus {
        match self {
            Self::Ok { quota, .. } | Self::Failed { quota, .. } => *quota,
            Self::QuotaExceeded(quota) => *quota,
        }
    }

    /// The value, if the call succeeded.
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Ok { value, .. } => Some(value),
            _ => None,
        }
    }
}

/// A [`Generator`] behind the daily quota.
#[derive(Clone)]
pub struct MeteredGenerator {
    generator: Arc<dyn Generator>,
    meter: QuotaMeter,
    policy: AiPolicy,
}

impl MeteredGenerator {
    pub fn new(generator: Arc<dyn Generator>, meter: QuotaMeter) -> Self {
        Self {
            generator,
            meter,
            policy: AiPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: AiPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Today's quota. Never writes.
    pub fn quota(&self) -> QuotaStatus {
        self.meter.check_status()
    }

    /// Run `request` if quota allows and convert the reply with `parse`.
    #[instrument(skip_all, fields(structured = request.schema.is_some()))]
    pub async fn run<T>(
        &self,
        request: &GenerateRequest,
        parse: impl FnOnce(Value) -> AiResult<T>,
    ) -> AiOutcome<T> {
        let before = self.meter.check_status();
        if before.is_blocked {
            info!(%before, "ai call refused, daily quota reached");
            return AiOutcome::QuotaExceeded(before);
        }

        let quota = match self.meter.try_acquire() {
            Ok(Some(quota)) => quota,
            Ok(None) => return AiOutcome::QuotaExceeded(self.meter.check_status()),
            Err(e) => {
                warn!(error = %e, "could not record ai usage");
                return AiOutcome::Failed {
                    reason: e.to_string(),
                    quota: before,
                };
            }
        };

        match self.call(request).await.and_then(parse) {
            Ok(value) => AiOutcome::Ok { value, quota },
            Err(e) => {
                warn!(error = %e, "ai call failed");
                AiOutcome::Failed {
                    reason: e.to_string(),
                    quota,
                }
            }
        }
    }

    async fn call(&self, request: &GenerateRequest) -> AiResult<Value> {
        let call = self.generator.generate(request);
        match self.policy.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| AiError::Timeout {
                    seconds: limit.as_secs(),
                })?,
            None => call.await,
        }
    }

    // ── features ─────────────────────────────────────────────────────

    /// One doula chat reply.
    pub async fn ask_doula(
        &self,
        config: &AppConfig,
        history: &[ChatTurn],
        message: &str,
    ) -> AiOutcome<String> {
        let request = prompts::doula_request(config, history, message);
        self.run(&request, |reply| match reply {
            Value::String(text) => Ok(text),
            other => Ok(other.to_string()),
        })
        .await
    }

    pub async fn name_meaning(&self, name: &str) -> AiOutcome<NameMeaning> {
        self.run(&prompts::name_meaning_request(name), parse_json).await
    }

    pub async fn weekly_info(&self, week: u8, products: &[Product]) -> AiOutcome<GeneratedWeek> {
        self.run(&prompts::weekly_info_request(week, products), parse_json)
            .await
    }
}

fn parse_json<T: DeserializeOwned>(value: Value) -> AiResult<T> {
    serde_json::from_value(value).map_err(|e| AiError::Parse {
        reason: format!("unexpected reply shape: {e}"),
    })
}
