use std::collections::BTreeMap;

use chrono::Datelike;
use serde::Serialize;

use crate::model::PerformanceSample;

const TREND_THRESHOLD: f64 = 5.0;
const MOVING_AVERAGE_WINDOW: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeekData {
    /// ISO week label, e.g. `2024-W07`.
    pub week: String,
    pub sessions: usize,
    pub avg_performance: f64,
    pub avg_accuracy: Option<f64>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    pub labels: Vec<String>,
    pub performance: Vec<f64>,
    pub moving_average: Vec<f64>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceTrend {
    pub user_id: String,
    pub weekly_data: Vec<WeekData>,
    pub overall_trend: TrendDirection,
    pub improvement_score: f64,
    pub mood_breakdown: BTreeMap<String, usize>,
    pub chart_data: ChartData,
}

pub struct TrendsAnalyzer;

impl TrendsAnalyzer {
    pub fn new() -> Self {
        TrendsAnalyzer
    }

    /// `history` may be in any order; output is chronological.
    pub fn generate_user_trend(
        &self,
        user_id: &str,
        history: &[PerformanceSample],
    ) -> PerformanceTrend {
        let mut chronological: Vec<&PerformanceSample> = history.iter().collect();
        chronological.sort_by_key(|sample| sample.timestamp);

        let weekly_data = self.bucket_by_week(&chronological);
        let improvement_score = self.calculate_improvement_score(&weekly_data);
        let overall_trend = self.determine_trend(improvement_score, weekly_data.len());

        let mut mood_breakdown = BTreeMap::new();
        for mood in chronological.iter().filter_map(|s| s.mood_tag.as_deref()) {
            *mood_breakdown.entry(mood.to_string()).or_insert(0) += 1;
        }

        PerformanceTrend {
            user_id: user_id.to_string(),
            chart_data: self.generate_chart_data(&chronological),
            weekly_data,
            overall_trend,
            improvement_score,
            mood_breakdown,
        }
    }

    fn bucket_by_week(&self, chronological: &[&PerformanceSample]) -> Vec<WeekData> {
        let mut weeks: BTreeMap<(i32, u32), Vec<&PerformanceSample>> = BTreeMap::new();
        for sample in chronological {
            let iso = sample.timestamp.iso_week();
            weeks.entry((iso.year(), iso.week())).or_default().push(*sample);
        }

        weeks
            .into_iter()
            .map(|((year, week), samples)| {
                let sessions = samples.len();
                let avg_performance =
                    samples.iter().map(|s| s.performance).sum::<f64>() / sessions as f64;
                let accuracies: Vec<f64> = samples.iter().filter_map(|s| s.accuracy).collect();
                let avg_accuracy = if accuracies.is_empty() {
                    None
                } else {
                    Some(accuracies.iter().sum::<f64>() / accuracies.len() as f64)
                };
                WeekData {
                    week: format!("{year}-W{week:02}"),
                    sessions,
                    avg_performance,
                    avg_accuracy,
                }
            })
            .collect()
    }

    fn generate_chart_data(&self, chronological: &[&PerformanceSample]) -> ChartData {
        let labels: Vec<String> = chronological
            .iter()
            .map(|s| s.timestamp.format("%Y-%m-%d").to_string())
            .collect();
        let performance: Vec<f64> = chronological.iter().map(|s| s.performance).collect();
        let moving_average = (0..performance.len())
            .map(|i| {
                let start = (i + 1).saturating_sub(MOVING_AVERAGE_WINDOW);
                let window = &performance[start..=i];
                window.iter().sum::<f64>() / window.len() as f64
            })
            .collect();

        ChartData {
            labels,
            performance,
            moving_average,
        }
    }

    fn calculate_improvement_score(&self, weekly_data: &[WeekData]) -> f64 {
        match (weekly_data.first(), weekly_data.last()) {
            (Some(first), Some(last)) if weekly_data.len() >= 2 => {
                (last.avg_performance - first.avg_performance).clamp(-100.0, 100.0)
            }
            _ => 0.0,
        }
    }

    fn determine_trend(&self, improvement_score: f64, weeks: usize) -> TrendDirection {
        if weeks < 2 {
            TrendDirection::Stable
        } else if improvement_score > TREND_THRESHOLD {
            TrendDirection::Improving
        } else if improvement_score < -TREND_THRESHOLD {
            TrendDirection::Declining
        } else {
            TrendDirection::Stable
        }
    }
}

impl Default for TrendsAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn sample(day: i64, performance: f64, mood: Option<&str>) -> PerformanceSample {
        // 2024-01-01 is a Monday, ISO week 1.
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 7, 0, 0).unwrap();
        let mut sample = PerformanceSample::new(start + Duration::days(day), performance);
        sample.mood_tag = mood.map(str::to_string);
        sample
    }

    #[test]
    fn buckets_samples_into_iso_weeks() {
        let history = vec![
            sample(8, 80.0, None),
            sample(0, 50.0, None),
            sample(2, 60.0, None),
            sample(7, 70.0, None),
        ];
        let trend = TrendsAnalyzer::new().generate_user_trend("u1", &history);

        assert_eq!(trend.weekly_data.len(), 2);
        assert_eq!(trend.weekly_data[0].week, "2024-W01");
        assert_eq!(trend.weekly_data[0].avg_performance, 55.0);
        assert_eq!(trend.weekly_data[1].week, "2024-W02");
        assert_eq!(trend.weekly_data[1].avg_performance, 75.0);
        assert_eq!(trend.improvement_score, 20.0);
        assert_eq!(trend.overall_trend, TrendDirection::Improving);
    }

    #[test]
    fn declining_and_stable_directions() {
        let analyzer = TrendsAnalyzer::new();
        let declining =
            analyzer.generate_user_trend("u1", &[sample(0, 80.0, None), sample(7, 60.0, None)]);
        assert_eq!(declining.overall_trend, TrendDirection::Declining);

        let stable =
            analyzer.generate_user_trend("u1", &[sample(0, 70.0, None), sample(7, 73.0, None)]);
        assert_eq!(stable.overall_trend, TrendDirection::Stable);

        let single_week =
            analyzer.generate_user_trend("u1", &[sample(0, 10.0, None), sample(1, 90.0, None)]);
        assert_eq!(single_week.overall_trend, TrendDirection::Stable);
        assert_eq!(single_week.improvement_score, 0.0);
    }

    #[test]
    fn chart_series_are_chronological_with_moving_average() {
        let history = vec![
            sample(3, 90.0, Some("tired")),
            sample(1, 60.0, Some("focused")),
            sample(2, 30.0, Some("focused")),
        ];
        let trend = TrendsAnalyzer::new().generate_user_trend("u1", &history);

        assert_eq!(trend.chart_data.labels, vec!["2024-01-02", "2024-01-03", "2024-01-04"]);
        assert_eq!(trend.chart_data.performance, vec![60.0, 30.0, 90.0]);
        assert_eq!(trend.chart_data.moving_average, vec![60.0, 45.0, 60.0]);
        assert_eq!(trend.mood_breakdown.get("focused"), Some(&2));
        assert_eq!(trend.mood_breakdown.get("tired"), Some(&1));
    }

    #[test]
    fn empty_history_gives_empty_report() {
        let trend = TrendsAnalyzer::new().generate_user_trend("u1", &[]);
        assert!(trend.weekly_data.is_empty());
        assert!(trend.chart_data.labels.is_empty());
        assert_eq!(trend.overall_trend, TrendDirection::Stable);
    }
}
