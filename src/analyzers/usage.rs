//! Monthly, weekday and day-period usage of each rider class.
//!
//! Each pattern is a rider-class x bucket crosstab normalized per class. When
//! both classes are present the casual-minus-member percentage-point gaps are
//! summarized and turned into a one-line interpretation.

use tracing::{info, warn};

use super::aggregate::{crosstab, percent_by_row, Grid};
use super::magnitude::{direction, magnitude};
use super::report::ReportWriter;
use super::types::{PatternStats, UsagePattern, UsageReport};
use super::utility::{mean, stddev, validate_columns};
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::table::Table;
use crate::transform::{DAY_OF_WEEK, DAY_PERIOD, MONTH};

const REPORT: &str = "usage_patterns";

/// Gap statistics between the casual and member rows of `percentages`.
///
/// Returns `None` unless both rows exist and there is at least one bucket.
pub fn pattern_stats(percentages: &Grid<f64>, config: &AnalysisConfig) -> Option<PatternStats> {
    let casual = percentages.row(&config.casual_label)?;
    let member = percentages.row(&config.member_label)?;
    if casual.is_empty() {
        return None;
    }

    let diffs: Vec<f64> = casual.iter().zip(member).map(|(c, m)| c - m).collect();

    let mut max_index = 0;
    for (i, d) in diffs.iter().enumerate() {
        if d.abs() > diffs[max_index].abs() {
            max_index = i;
        }
    }

    let abs: Vec<f64> = diffs.iter().map(|d| d.abs()).collect();
    Some(PatternStats {
        max_difference: abs[max_index],
        max_difference_period: percentages.columns[max_index].clone(),
        mean_difference: mean(&abs),
        std_difference: stddev(&diffs, mean(&diffs)),
    })
}

fn interpretation(
    name: &str,
    percentages: &Grid<f64>,
    stats: Option<&PatternStats>,
    config: &AnalysisConfig,
) -> String {
    let Some(stats) = stats else {
        return format!(
            "Statistical Analysis for {name}:\n- Comparison unavailable: both '{}' and '{}' riders are required",
            config.casual_label, config.member_label
        );
    };

    let signed = percentages
        .get(&config.casual_label, &stats.max_difference_period)
        .zip(percentages.get(&config.member_label, &stats.max_difference_period))
        .map(|(c, m)| c - m)
        .unwrap_or(0.0);

    format!(
        "Statistical Analysis for {name}:\n\
         - Average absolute difference is {} ({:.1}%)\n\
         - Largest difference occurs on {} ({:.1}% {})",
        magnitude(stats.mean_difference, config),
        stats.mean_difference,
        stats.max_difference_period,
        stats.max_difference,
        direction(signed),
    )
}

fn pattern(
    table: &Table,
    column: &str,
    title: &'static str,
    config: &AnalysisConfig,
) -> Result<UsagePattern> {
    let counts = crosstab(table, &config.rider_column, column)?;
    let percentages = percent_by_row(&counts);
    let stats = pattern_stats(&percentages, config);
    if stats.is_none() {
        warn!(pattern = title, "Usage comparison skipped, a rider class is missing");
    }
    let interpretation = interpretation(title, &percentages, stats.as_ref(), config);
    Ok(UsagePattern {
        title,
        counts,
        percentages,
        stats,
        interpretation,
    })
}

fn stats_table(patterns: [&UsagePattern; 3]) -> (Vec<String>, Vec<Vec<String>>) {
    let header = std::iter::once(String::new())
        .chain(patterns.iter().map(|p| p.title.to_string()))
        .collect();

    let cell = |p: &UsagePattern, f: fn(&PatternStats) -> String| {
        p.stats.as_ref().map(f).unwrap_or_default()
    };
    let fields: [(&str, fn(&PatternStats) -> String); 4] = [
        ("max_difference", |s| format!("{:.2}", s.max_difference)),
        ("max_difference_period", |s| s.max_difference_period.clone()),
        ("mean_difference", |s| format!("{:.2}", s.mean_difference)),
        ("std_difference", |s| format!("{:.2}", s.std_difference)),
    ];
    let rows = fields
        .iter()
        .map(|(name, f)| {
            std::iter::once(name.to_string())
                .chain(patterns.iter().map(|p| cell(*p, *f)))
                .collect()
        })
        .collect();
    (header, rows)
}

#[tracing::instrument(skip_all)]
pub fn analyze_usage_patterns(
    table: &Table,
    config: &AnalysisConfig,
    writer: &ReportWriter,
) -> Result<UsageReport> {
    validate_columns(
        table,
        REPORT,
        &[config.rider_column.as_str(), MONTH, DAY_OF_WEEK, DAY_PERIOD],
    )?;

    let report = UsageReport {
        monthly: pattern(table, MONTH, "Monthly", config)?,
        daily: pattern(table, DAY_OF_WEEK, "Daily", config)?,
        hourly: pattern(table, DAY_PERIOD, "Hourly", config)?,
    };

    let mut body = String::new();
    for p in [&report.monthly, &report.daily, &report.hourly] {
        body.push_str(&format!(
            "{title} usage patterns:\n{}\n\n{title} usage patterns (%):\n{}\n{}\n\n",
            p.counts.transpose().render(),
            p.percentages.transpose().render(),
            p.interpretation,
            title = p.title,
        ));
    }
    writer.section("Analyze Usage Patterns", body.trim_end())?;

    writer.write_grid("monthly_usage_pct.csv", &report.monthly.percentages.transpose())?;
    writer.write_grid("daily_usage_pct.csv", &report.daily.percentages.transpose())?;
    writer.write_grid("hourly_usage_pct.csv", &report.hourly.percentages.transpose())?;
    let (header, rows) = stats_table([&report.monthly, &report.daily, &report.hourly]);
    writer.write_rows("usage_patterns_stats.csv", &header, &rows)?;

    info!("Usage pattern report written");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(casual: Vec<f64>, member: Vec<f64>) -> Grid<f64> {
        Grid {
            row_name: "member_casual".to_string(),
            column_name: "day_period".to_string(),
            rows: vec!["casual".to_string(), "member".to_string()],
            columns: ["Afternoon", "Evening", "Morning", "Night"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            values: vec![casual, member],
        }
    }

    #[test]
    fn test_pattern_stats() {
        let config = AnalysisConfig::default();
        let g = grid(vec![40.0, 30.0, 20.0, 10.0], vec![30.0, 30.0, 35.0, 5.0]);
        let stats = pattern_stats(&g, &config).unwrap();

        assert_eq!(stats.max_difference, 15.0);
        assert_eq!(stats.max_difference_period, "Morning");
        assert_eq!(stats.mean_difference, 7.5);
        // diffs 10, 0, -15, 5: mean 0, sample variance 350 / 3
        assert!((stats.std_difference - (350.0f64 / 3.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_interpretation_names_largest_gap() {
        let config = AnalysisConfig::default();
        let g = grid(vec![40.0, 30.0, 20.0, 10.0], vec![30.0, 30.0, 35.0, 5.0]);
        let stats = pattern_stats(&g, &config);
        let text = interpretation("Hourly", &g, stats.as_ref(), &config);

        assert!(text.contains("Average absolute difference is large (7.5%)"));
        assert!(text.contains("Largest difference occurs on Morning (15.0% higher member usage)"));
    }

    #[test]
    fn test_stats_need_both_classes() {
        let config = AnalysisConfig::default();
        let mut g = grid(vec![50.0, 50.0, 0.0, 0.0], vec![]);
        g.rows.truncate(1);
        g.values.truncate(1);
        assert!(pattern_stats(&g, &config).is_none());
        assert!(interpretation("Monthly", &g, None, &config).contains("unavailable"));
    }

    #[test]
    fn test_usage_report_outputs() {
        let table = Table::from_csv_reader(
            "member_casual,month,day_of_week,day_period\n\
             casual,July,Saturday,Afternoon\n\
             casual,July,Sunday,Afternoon\n\
             member,January,Monday,Morning\n\
             member,July,Tuesday,Evening\n"
                .as_bytes(),
        )
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::create(dir.path()).unwrap();

        let report = analyze_usage_patterns(&table, &AnalysisConfig::default(), &writer).unwrap();
        assert_eq!(report.daily.percentages.get("casual", "Saturday"), Some(50.0));
        assert!(report.hourly.stats.is_some());

        let hourly = std::fs::read_to_string(writer.path("hourly_usage_pct.csv")).unwrap();
        assert!(hourly.starts_with("day_period,casual,member"));
        let monthly = std::fs::read_to_string(writer.path("monthly_usage_pct.csv")).unwrap();
        assert!(monthly.starts_with("month,casual,member"), "{monthly}");
        let daily = std::fs::read_to_string(writer.path("daily_usage_pct.csv")).unwrap();
        assert!(daily.starts_with("day_of_week,casual,member"), "{daily}");
        let stats = std::fs::read_to_string(writer.path("usage_patterns_stats.csv")).unwrap();
        assert!(stats.starts_with(",Monthly,Daily,Hourly"));
        assert!(stats.contains("max_difference_period,"));
    }

    #[test]
    fn test_usage_text_shows_counts_above_percentages() {
        let table = Table::from_csv_reader(
            "member_casual,month,day_of_week,day_period\n\
             casual,July,Saturday,Afternoon\n\
             member,July,Monday,Morning\n\
             member,July,Monday,Morning\n"
                .as_bytes(),
        )
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::create(dir.path()).unwrap();
        analyze_usage_patterns(&table, &AnalysisConfig::default(), &writer).unwrap();

        let text = std::fs::read_to_string(writer.path("analysis_output.txt")).unwrap();
        for title in ["Monthly", "Daily", "Hourly"] {
            let counts = text.find(&format!("{title} usage patterns:\n")).unwrap();
            let pct = text.find(&format!("{title} usage patterns (%):\n")).unwrap();
            assert!(counts < pct, "{title}");
        }
        let daily_counts = text.find("Daily usage patterns:\n").unwrap();
        let monday = text[daily_counts..].lines().find(|l| l.starts_with("Monday")).unwrap();
        assert_eq!(monday.split_whitespace().collect::<Vec<_>>(), vec!["Monday", "0", "2"]);
    }
}
