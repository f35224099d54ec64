//! Network experience scoring — a pure classification over one site's
//! metrics record. No I/O and no state; the presentation layer applies
//! it to whatever the store holds.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Raw inputs for one site, as shared by every status producer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SiteMetrics {
    pub wan_status: bool,
    pub lan_switch_status: bool,
    pub lan_ap_status: bool,
    pub latency_ms: f64,
    pub packet_loss_pct: f64,
    pub jitter_ms: f64,
}

/// Discrete health label derived from the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthStatus::Excellent => "Excellent",
            HealthStatus::Good => "Good",
            HealthStatus::Fair => "Fair",
            HealthStatus::Poor => "Poor",
            HealthStatus::Critical => "Critical",
        };
        f.write_str(s)
    }
}

/// Compute the 0-100 experience score for one site.
///
/// WAN down is a critical failure and shorts the score to zero.
/// Otherwise penalties accumulate from 100: 20 points per degraded LAN
/// tier, latency above 50 ms (1 point per 10 ms, capped at 30), packet
/// loss (5 points per percent, capped at 40) and jitter above 10 ms
/// (1 point per 5 ms, capped at 10). Rounded to one decimal, floored
/// at zero.
pub fn calculate_score(metrics: &SiteMetrics) -> f64 {
    if !metrics.wan_status {
        return 0.0;
    }

    let mut score = 100.0;

    if !metrics.lan_switch_status {
        score -= 20.0;
    }
    if !metrics.lan_ap_status {
        score -= 20.0;
    }

    if metrics.latency_ms > 50.0 {
        score -= ((metrics.latency_ms - 50.0) / 10.0).min(30.0);
    }
    if metrics.packet_loss_pct > 0.0 {
        score -= (metrics.packet_loss_pct * 5.0).min(40.0);
    }
    if metrics.jitter_ms > 10.0 {
        score -= ((metrics.jitter_ms - 10.0) / 5.0).min(10.0);
    }

    (score.max(0.0) * 10.0).round() / 10.0
}

/// Map a score onto its health label.
pub fn health_status(score: f64) -> HealthStatus {
    if score >= 90.0 {
        HealthStatus::Excellent
    } else if score >= 70.0 {
        HealthStatus::Good
    } else if score >= 50.0 {
        HealthStatus::Fair
    } else if score > 0.0 {
        HealthStatus::Poor
    } else {
        HealthStatus::Critical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy() -> SiteMetrics {
        SiteMetrics {
            wan_status: true,
            lan_switch_status: true,
            lan_ap_status: true,
            latency_ms: 20.0,
            packet_loss_pct: 0.0,
            jitter_ms: 5.0,
        }
    }

    #[test]
    fn perfect_site_scores_100() {
        assert_eq!(calculate_score(&healthy()), 100.0);
        assert_eq!(health_status(100.0), HealthStatus::Excellent);
    }

    #[test]
    fn high_latency_penalty() {
        // 150 ms -> (150 - 50) / 10 = 10 points.
        let metrics = SiteMetrics {
            latency_ms: 150.0,
            ..healthy()
        };
        assert_eq!(calculate_score(&metrics), 90.0);
    }

    #[test]
    fn packet_loss_penalty() {
        // 2% -> 2 * 5 = 10 points.
        let metrics = SiteMetrics {
            packet_loss_pct: 2.0,
            ..healthy()
        };
        assert_eq!(calculate_score(&metrics), 90.0);
    }

    #[test]
    fn degraded_switch_tier_penalty() {
        let metrics = SiteMetrics {
            lan_switch_status: false,
            ..healthy()
        };
        assert_eq!(calculate_score(&metrics), 80.0);
        assert_eq!(health_status(80.0), HealthStatus::Good);
    }

    #[test]
    fn wan_down_is_critical() {
        let metrics = SiteMetrics {
            wan_status: false,
            latency_ms: 0.0,
            jitter_ms: 0.0,
            ..healthy()
        };
        assert_eq!(calculate_score(&metrics), 0.0);
        assert_eq!(health_status(0.0), HealthStatus::Critical);
    }

    #[test]
    fn score_never_goes_negative() {
        // Every penalty at its cap: 20 + 20 + 30 + 40 + 10 = 120.
        let metrics = SiteMetrics {
            wan_status: true,
            lan_switch_status: false,
            lan_ap_status: false,
            latency_ms: 500.0,
            packet_loss_pct: 20.0,
            jitter_ms: 100.0,
        };
        assert_eq!(calculate_score(&metrics), 0.0);
    }

    #[test]
    fn label_thresholds() {
        assert_eq!(health_status(90.0), HealthStatus::Excellent);
        assert_eq!(health_status(89.9), HealthStatus::Good);
        assert_eq!(health_status(69.9), HealthStatus::Fair);
        assert_eq!(health_status(49.9), HealthStatus::Poor);
        assert_eq!(health_status(0.0), HealthStatus::Critical);
    }
}
