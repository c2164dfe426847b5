//! Process-wide token-bucket rate limiter.

use chrono::{DateTime, Utc};

/// Single token bucket: capacity is the burst size, refill rate is
/// requests-per-minute spread over the minute.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimit {
    tokens: f64,
    max_tokens: f64,
    refill_rate: f64,
    last_refill: DateTime<Utc>,
}

impl RateLimit {
    pub fn new(requests_per_minute: u32, burst: u32) -> Self {
        let max_tokens = burst.max(1) as f64;
        Self {
            tokens: max_tokens,
            max_tokens,
            refill_rate: requests_per_minute.max(1) as f64 / 60.0,
            last_refill: Utc::now(),
        }
    }

    /// Consume one token, refilling by elapsed time first.
    pub fn try_consume(&mut self) -> bool {
        self.refill_at(Utc::now());
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill_at(&mut self, now: DateTime<Utc>) {
        let elapsed_secs = (now - self.last_refill)
            .to_std()
            .map_or(0.0, |elapsed| elapsed.as_secs_f64());
        if elapsed_secs <= 0.0 {
            return;
        }
        self.tokens = (self.tokens + elapsed_secs * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;
    }
}

/// Parse a `--rate-limit` value of the form `rpm[:burst]`.
pub fn parse_rate_limit_spec(raw: &str) -> Result<(u32, u32), String> {
    let (rpm_raw, burst_raw) = match raw.split_once(':') {
        Some((rpm, burst)) => (rpm, Some(burst)),
        None => (raw, None),
    };

    let rpm: u32 = rpm_raw
        .trim()
        .parse()
        .map_err(|_| format!("invalid requests-per-minute value '{rpm_raw}'"))?;
    if rpm == 0 {
        return Err("requests-per-minute must be greater than zero".to_string());
    }

    let burst = match burst_raw {
        Some(value) => {
            let burst: u32 = value
                .trim()
                .parse()
                .map_err(|_| format!("invalid burst value '{value}'"))?;
            if burst == 0 {
                return Err("burst must be greater than zero".to_string());
            }
            burst
        }
        None => 10,
    };

    Ok((rpm, burst))
}
