use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU64;
use std::sync::Arc;

use throttle_limit::LeakyBucket;
use throttle_limit::Strategy;
use throttle_limit::TokenBucket;

use crate::ThrottleError;

/// Which bucket algorithm an endpoint is guarded by.
///
/// Each kind owns its own route, parameter names and reply field, so the
/// two endpoints can share every piece of plumbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum BucketKind {
    Leaky,
    Token,
}

impl BucketKind {
    /// Human readable name used in reply messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::Leaky => "Leaky Bucket",
            Self::Token => "Token Bucket",
        }
    }

    /// Stable identifier for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Leaky => "leaky_bucket",
            Self::Token => "token_bucket",
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Self::Leaky => "/leaky-bucket",
            Self::Token => "/token-bucket",
        }
    }

    /// Name of the rate parameter accepted by the configuration call.
    pub fn rate_param(self) -> &'static str {
        match self {
            Self::Leaky => "leakRate",
            Self::Token => "refillRate",
        }
    }

    /// Name of the reply field carrying the bucket level.
    pub fn level_field(self) -> &'static str {
        match self {
            Self::Leaky => "currentSize",
            Self::Token => "currentTokens",
        }
    }

    /// Construct a fresh limiter of this kind.
    pub fn build(self, config: BucketConfig) -> Arc<dyn Strategy> {
        match self {
            Self::Leaky => Arc::new(LeakyBucket::new(config.capacity, config.rate)),
            Self::Token => Arc::new(TokenBucket::new(config.capacity, config.rate)),
        }
    }
}

impl fmt::Display for BucketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated parameters for a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketConfig {
    pub capacity: NonZeroU64,
    pub rate: NonZeroU64,
}

impl BucketConfig {
    /// Validate raw request parameters for `kind`.
    ///
    /// Checks run in order: presence, numeric format, then positivity.
    pub fn from_params(
        kind: BucketKind,
        params: &HashMap<String, String>,
    ) -> Result<Self, ThrottleError> {
        let capacity = params.get("capacity").filter(|v| !v.is_empty());
        let rate = params.get(kind.rate_param()).filter(|v| !v.is_empty());
        let (Some(capacity), Some(rate)) = (capacity, rate) else {
            return Err(ThrottleError::MissingParameters { kind });
        };

        let (Ok(capacity), Ok(rate)) = (capacity.parse::<i64>(), rate.parse::<i64>()) else {
            return Err(ThrottleError::InvalidFormat { kind });
        };

        match (positive(capacity), positive(rate)) {
            (Some(capacity), Some(rate)) => Ok(Self { capacity, rate }),
            _ => Err(ThrottleError::InvalidValue { kind }),
        }
    }
}

fn positive(value: i64) -> Option<NonZeroU64> {
    u64::try_from(value).ok().and_then(NonZeroU64::new)
}
