//! Period aggregation over the daily stat rows.

use chrono::{Duration as ChronoDuration, Utc};
use ordersieve_store::rows::StatRow;
use serde::Serialize;

/// Reporting period for summaries and exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    /// The current UTC day.
    Today,
    /// The last 7 days.
    Week,
    /// The last 30 days.
    Month,
    /// Everything ever recorded.
    All,
}

impl Period {
    /// Parse the CLI spelling.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "today" => Some(Self::Today),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    /// Inclusive `YYYY-MM-DD` bounds for stat-row queries.
    pub fn date_bounds(&self) -> (String, String) {
        let today = Utc::now().date_naive();
        let from = match self {
            Self::Today => today,
            Self::Week => today - ChronoDuration::days(6),
            Self::Month => today - ChronoDuration::days(29),
            Self::All => chrono::NaiveDate::from_ymd_opt(2000, 1, 1).expect("valid date"),
        };
        (from.format("%Y-%m-%d").to_string(), today.format("%Y-%m-%d").to_string())
    }

    /// The period length in days, used for order-window queries.
    pub fn days(&self) -> i64 {
        match self {
            Self::Today => 1,
            Self::Week => 7,
            Self::Month => 30,
            Self::All => 36500,
        }
    }

    /// Canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Week => "week",
            Self::Month => "month",
            Self::All => "all",
        }
    }
}

/// Aggregated counters plus the derived rates operators actually read.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PeriodSummary {
    /// Period name.
    pub period: String,
    /// Days with any recorded activity.
    pub active_days: usize,
    /// Messages seen.
    pub total_messages: i64,
    /// Orders detected by either tier.
    pub detected_orders: i64,
    /// Pattern-bank detections.
    pub regex_detections: i64,
    /// Remote-classifier detections.
    pub llm_detections: i64,
    /// Tokens consumed by the paid tier.
    pub llm_tokens_used: i64,
    /// Cost of the paid tier, USD.
    pub llm_cost: f64,
    /// Orders per hundred messages.
    pub detection_rate: f64,
    /// Share of detections that needed the paid tier, percent.
    pub llm_share: f64,
    /// Average paid cost per LLM-detected order, USD.
    pub cost_per_llm_order: f64,
}

impl PeriodSummary {
    /// Fold a window of stat rows into one summary.
    pub fn from_rows(period: Period, rows: &[StatRow]) -> Self {
        let total_messages: i64 = rows.iter().map(|r| r.total_messages).sum();
        let detected_orders: i64 = rows.iter().map(|r| r.detected_orders).sum();
        let regex_detections: i64 = rows.iter().map(|r| r.regex_detections).sum();
        let llm_detections: i64 = rows.iter().map(|r| r.llm_detections).sum();
        let llm_tokens_used: i64 = rows.iter().map(|r| r.llm_tokens_used).sum();
        let llm_cost: f64 = rows.iter().map(|r| r.llm_cost).sum();

        let detection_rate = if total_messages > 0 {
            detected_orders as f64 * 100.0 / total_messages as f64
        } else {
            0.0
        };
        let total_detections = regex_detections + llm_detections;
        let llm_share = if total_detections > 0 {
            llm_detections as f64 * 100.0 / total_detections as f64
        } else {
            0.0
        };
        let cost_per_llm_order = if llm_detections > 0 {
            llm_cost / llm_detections as f64
        } else {
            0.0
        };

        Self {
            period: period.name().to_string(),
            active_days: rows.len(),
            total_messages,
            detected_orders,
            regex_detections,
            llm_detections,
            llm_tokens_used,
            llm_cost,
            detection_rate,
            llm_share,
            cost_per_llm_order,
        }
    }

    /// Plain-text rendering for the CLI.
    pub fn render(&self) -> String {
        format!(
            "Period: {period} ({days} active days)\n\
             Messages seen:    {messages}\n\
             Orders detected:  {orders} ({rate:.1}% of messages)\n\
               by pattern bank: {regex}\n\
               by classifier:   {llm} ({share:.1}% of detections)\n\
             Classifier usage: {tokens} tokens, ${cost:.4} (${per_order:.4}/order)",
            period = self.period,
            days = self.active_days,
            messages = self.total_messages,
            orders = self.detected_orders,
            rate = self.detection_rate,
            regex = self.regex_detections,
            llm = self.llm_detections,
            share = self.llm_share,
            tokens = self.llm_tokens_used,
            cost = self.llm_cost,
            per_order = self.cost_per_llm_order,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(date: &str, messages: i64, orders: i64, regex: i64, llm: i64, tokens: i64, cost: f64) -> StatRow {
        StatRow {
            id: 0,
            date: date.into(),
            total_messages: messages,
            detected_orders: orders,
            regex_detections: regex,
            llm_detections: llm,
            llm_tokens_used: tokens,
            llm_cost: cost,
        }
    }

    #[test]
    fn period_parses_cli_spellings() {
        assert_eq!(Period::parse("today"), Some(Period::Today));
        assert_eq!(Period::parse("WEEK"), Some(Period::Week));
        assert_eq!(Period::parse("month"), Some(Period::Month));
        assert_eq!(Period::parse("all"), Some(Period::All));
        assert_eq!(Period::parse("fortnight"), None);
    }

    #[test]
    fn bounds_are_inclusive_and_utc() {
        let (from, to) = Period::Today.date_bounds();
        assert_eq!(from, to);
        let (from, to) = Period::Week.date_bounds();
        assert!(from < to);
    }

    #[test]
    fn summary_folds_and_derives() {
        let rows = vec![
            row("2026-07-30", 100, 8, 6, 2, 1200, 0.02),
            row("2026-07-31", 50, 2, 1, 1, 800, 0.01),
        ];
        let summary = PeriodSummary::from_rows(Period::Week, &rows);

        assert_eq!(summary.total_messages, 150);
        assert_eq!(summary.detected_orders, 10);
        assert_eq!(summary.llm_tokens_used, 2000);
        assert!((summary.detection_rate - 6.666).abs() < 0.01);
        assert!((summary.llm_share - 30.0).abs() < 1e-9);
        assert!((summary.cost_per_llm_order - 0.01).abs() < 1e-9);
    }

    #[test]
    fn empty_window_has_zero_rates() {
        let summary = PeriodSummary::from_rows(Period::Today, &[]);
        assert_eq!(summary.detection_rate, 0.0);
        assert_eq!(summary.llm_share, 0.0);
        assert_eq!(summary.cost_per_llm_order, 0.0);
        assert!(summary.render().contains("Orders detected:  0"));
    }
}
