//! Inter-attempt delay strategies.

use std::time::Duration;

use rand::Rng;

use crate::config::{BackoffStrategy, RetryConfig};

/// Delay before the attempt following failed attempt number `attempt` (1-based).
///
/// Attempt 0 has no delay. Every result is clamped to `[0, max_delay_ms]`.
pub fn calculate_backoff(config: &RetryConfig, attempt: u32) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let initial = config.initial_delay_ms as f64;
    let max = config.max_delay_ms as f64;

    let delay_ms = match config.strategy {
        BackoffStrategy::Fixed => initial,
        BackoffStrategy::Linear => initial * f64::from(attempt),
        BackoffStrategy::Exponential => exponential(initial, config.backoff_factor, attempt, max),
        BackoffStrategy::ExponentialJitter => {
            let base = exponential(initial, config.backoff_factor, attempt, max);
            // +/- 10% uniform jitter
            let jitter = rand::thread_rng().gen_range(-0.1..=0.1);
            base + base * jitter
        }
    };

    Duration::from_millis(clamp(delay_ms, max) as u64)
}

fn exponential(initial: f64, factor: f64, attempt: u32, max: f64) -> f64 {
    let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
    (initial * factor.powi(exponent)).min(max)
}

fn clamp(delay_ms: f64, max: f64) -> f64 {
    if delay_ms.is_nan() {
        return max;
    }
    delay_ms.clamp(0.0, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(strategy: BackoffStrategy) -> RetryConfig {
        RetryConfig {
            strategy,
            initial_delay_ms: 100,
            max_delay_ms: 1000,
            backoff_factor: 2.0,
            ..RetryConfig::default()
        }
    }

    fn ms(d: Duration) -> u128 {
        d.as_millis()
    }

    #[test]
    fn test_fixed() {
        let c = config(BackoffStrategy::Fixed);
        assert_eq!(ms(calculate_backoff(&c, 1)), 100);
        assert_eq!(ms(calculate_backoff(&c, 7)), 100);
    }

    #[test]
    fn test_linear_is_clamped() {
        let c = config(BackoffStrategy::Linear);
        assert_eq!(ms(calculate_backoff(&c, 3)), 300);
        assert_eq!(ms(calculate_backoff(&c, 50)), 1000);
    }

    #[test]
    fn test_exponential() {
        let c = config(BackoffStrategy::Exponential);
        assert_eq!(ms(calculate_backoff(&c, 1)), 100);
        assert_eq!(ms(calculate_backoff(&c, 2)), 200);
        assert_eq!(ms(calculate_backoff(&c, 3)), 400);
        assert_eq!(ms(calculate_backoff(&c, 10)), 1000);
        assert_eq!(ms(calculate_backoff(&c, u32::MAX)), 1000);
    }

    #[test]
    fn test_jitter_stays_within_ten_percent() {
        let c = config(BackoffStrategy::ExponentialJitter);
        for _ in 0..200 {
            let d = ms(calculate_backoff(&c, 2));
            assert!((180..=220).contains(&d), "delay {d} out of range");
        }
        // At the cap, jitter can only go down.
        for _ in 0..200 {
            let d = ms(calculate_backoff(&c, 20));
            assert!((900..=1000).contains(&d), "delay {d} out of range");
        }
    }

    #[test]
    fn test_zero_attempt_has_no_delay() {
        assert_eq!(calculate_backoff(&config(BackoffStrategy::Fixed), 0), Duration::ZERO);
    }
}
