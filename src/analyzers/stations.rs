//! Station popularity and concentration, for trip starts and trip ends.

use std::collections::BTreeMap;

use tracing::info;

use super::aggregate::{COUNT, group_counts, render_rows};
use super::report::ReportWriter;
use super::types::{RankedStation, StationConcentration, StationReport, StationRoleReport};
use super::utility::{gini, top_share, validate_columns};
use crate::config::AnalysisConfig;
use crate::error::{PipelineError, Result};
use crate::stats::round_to;
use crate::table::Table;

const REPORT: &str = "station_popularity";

/// Column names for one station role (`start` or `end`).
struct RoleColumns {
    role: &'static str,
    station: String,
    lat: String,
    lng: String,
}

impl RoleColumns {
    fn new(role: &'static str) -> Self {
        Self {
            role,
            station: format!("{role}_station_name"),
            lat: format!("{role}_lat"),
            lng: format!("{role}_lng"),
        }
    }
}

fn require_numeric(table: &Table, column: &str) -> Result<()> {
    match table.dtype(column) {
        Some(dtype) if dtype.is_numeric() => Ok(()),
        Some(_) => Err(PipelineError::Conversion {
            column: column.to_string(),
            expected: "float".to_string(),
            reason: "coordinates are not numeric".to_string(),
        }),
        None => Err(PipelineError::validation(REPORT, vec![column.to_string()])),
    }
}

/// The `top_n` most visited stations of each rider class.
///
/// Trips are grouped by (class, station, latitude, longitude); trips missing
/// any of these are ignored. Ties keep first-appearance order. Classes are
/// returned in sorted order.
pub fn rank_stations(
    table: &Table,
    rider: &str,
    station: &str,
    lat: &str,
    lng: &str,
    top_n: usize,
) -> Result<Vec<RankedStation>> {
    require_numeric(table, lat)?;
    require_numeric(table, lng)?;
    let counted = group_counts(table, &[rider, station, lat, lng])?;

    let groups = counted
        .text(rider)?
        .into_iter()
        .zip(counted.text(station)?)
        .zip(counted.floats(lat)?.into_iter().zip(counted.floats(lng)?))
        .zip(counted.counts(COUNT)?)
        .filter_map(|(((class, name), (la, ln)), count)| {
            Some(RankedStation {
                rider_class: class?,
                station: name?,
                latitude: la?,
                longitude: ln?,
                count,
            })
        });

    let mut by_class: BTreeMap<String, Vec<RankedStation>> = BTreeMap::new();
    for group in groups {
        by_class.entry(group.rider_class.clone()).or_default().push(group);
    }

    Ok(by_class
        .into_values()
        .flat_map(|mut ranked| {
            ranked.sort_by(|a, b| b.count.cmp(&a.count));
            ranked.truncate(top_n);
            ranked
        })
        .collect())
}

/// Spread of visits across the stations each rider class uses.
pub fn station_concentration(
    table: &Table,
    rider: &str,
    station: &str,
    top_n: usize,
) -> Result<Vec<StationConcentration>> {
    let counted = group_counts(table, &[rider, station])?;

    let mut visits: BTreeMap<String, Vec<u64>> = BTreeMap::new();
    for (class, n) in counted.text(rider)?.into_iter().zip(counted.counts(COUNT)?) {
        if let Some(class) = class {
            visits.entry(class).or_default().push(n);
        }
    }

    visits
        .into_iter()
        .map(|(class, visits)| -> Result<StationConcentration> {
            let as_f64: Vec<f64> = visits.iter().map(|&v| v as f64).collect();
            Ok(StationConcentration {
                rider_class: class,
                total_stations: visits.len(),
                gini_coefficient: gini(&as_f64)?,
                top_share: top_share(&visits, top_n),
            })
        })
        .collect()
}

fn role_report(
    table: &Table,
    columns: &RoleColumns,
    config: &AnalysisConfig,
) -> Result<StationRoleReport> {
    let rider = config.rider_column.as_str();
    Ok(StationRoleReport {
        role: columns.role,
        top_stations: rank_stations(
            table,
            rider,
            &columns.station,
            &columns.lat,
            &columns.lng,
            config.top_n,
        )?,
        concentration: station_concentration(table, rider, &columns.station, config.top_n)?,
    })
}

fn ranking_records(report: &StationRoleReport, rider: &str) -> (Vec<String>, Vec<Vec<String>>) {
    let header = vec![
        rider.to_string(),
        format!("{}_station_name", report.role),
        "latitude".to_string(),
        "longitude".to_string(),
        COUNT.to_string(),
    ];
    let rows = report
        .top_stations
        .iter()
        .map(|s| {
            vec![
                s.rider_class.clone(),
                s.station.clone(),
                s.latitude.to_string(),
                s.longitude.to_string(),
                s.count.to_string(),
            ]
        })
        .collect();
    (header, rows)
}

fn concentration_records(report: &StationRoleReport, rider: &str) -> (Vec<String>, Vec<Vec<String>>) {
    let header = [rider, "total_stations", "gini_coefficient", "top_share"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let rows = report
        .concentration
        .iter()
        .map(|c| {
            vec![
                c.rider_class.clone(),
                c.total_stations.to_string(),
                round_to(c.gini_coefficient, 4).to_string(),
                format!("{:.2}", c.top_share),
            ]
        })
        .collect();
    (header, rows)
}

fn share_lines(report: &StationRoleReport, config: &AnalysisConfig) -> String {
    let line = |label: &str, who: &str| {
        report
            .concentration
            .iter()
            .find(|c| c.rider_class == label)
            .map(|c| {
                format!(
                    "- {who}: Top {} stations account for {:.1}% of rides",
                    config.top_n, c.top_share
                )
            })
            .unwrap_or_else(|| format!("- {who}: no rides"))
    };
    format!(
        "{}\n{}",
        line(&config.casual_label, "Casual riders"),
        line(&config.member_label, "Members")
    )
}

#[tracing::instrument(skip_all)]
pub fn analyze_station_popularity(
    table: &Table,
    config: &AnalysisConfig,
    writer: &ReportWriter,
) -> Result<StationReport> {
    let start = RoleColumns::new("start");
    let end = RoleColumns::new("end");
    validate_columns(
        table,
        REPORT,
        &[
            config.rider_column.as_str(),
            start.station.as_str(),
            end.station.as_str(),
            start.lat.as_str(),
            start.lng.as_str(),
            end.lat.as_str(),
            end.lng.as_str(),
        ],
    )?;

    let report = StationReport {
        start: role_report(table, &start, config)?,
        end: role_report(table, &end, config)?,
    };

    let rider = config.rider_column.as_str();
    let (start_header, start_rows) = ranking_records(&report.start, rider);
    let (end_header, end_rows) = ranking_records(&report.end, rider);

    writer.section(
        "Analyze Station Popularity",
        &format!(
            "Top Start Stations:\n{}\n\nTop End Stations:\n{}\n\n\
             Station Usage Patterns:\nStart Stations:\n{}\nEnd Stations:\n{}",
            render_rows(&start_header, &start_rows),
            render_rows(&end_header, &end_rows),
            share_lines(&report.start, config),
            share_lines(&report.end, config),
        ),
    )?;

    writer.write_rows("popular_start_stations.csv", &start_header, &start_rows)?;
    writer.write_rows("popular_end_stations.csv", &end_header, &end_rows)?;
    for role in [&report.start, &report.end] {
        let (header, rows) = concentration_records(role, rider);
        writer.write_rows(&format!("{}_station_concentration.csv", role.role), &header, &rows)?;
    }

    info!(
        start_stations = report.start.top_stations.len(),
        end_stations = report.end.top_stations.len(),
        "Station popularity report written"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trips(rows: &[(&str, &str)]) -> Table {
        let mut csv = String::from(
            "member_casual,start_station_name,start_lat,start_lng,end_station_name,end_lat,end_lng\n",
        );
        for (i, (class, station)) in rows.iter().enumerate() {
            let lat = 41.0 + (station.len() as f64) / 100.0;
            csv.push_str(&format!(
                "{class},{station},{lat},-87.5,End {},41.9,-87.6\n",
                i % 2
            ));
        }
        Table::from_csv_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_rank_returns_top_n_sorted() {
        let mut rows = Vec::new();
        let names: Vec<String> = (0..12).map(|i| format!("Station {i:02}")).collect();
        for (i, name) in names.iter().enumerate() {
            for _ in 0..=i {
                rows.push(("member", name.as_str()));
            }
        }
        let table = trips(&rows);

        let ranked = rank_stations(
            &table,
            "member_casual",
            "start_station_name",
            "start_lat",
            "start_lng",
            10,
        )
        .unwrap();
        assert_eq!(ranked.len(), 10);
        assert_eq!(ranked[0].station, "Station 11");
        assert_eq!(ranked[0].count, 12);
        assert!(ranked.windows(2).all(|w| w[0].count >= w[1].count));
    }

    #[test]
    fn test_rank_ties_keep_first_appearance() {
        let table = trips(&[
            ("casual", "B"),
            ("casual", "A"),
            ("casual", "A"),
            ("casual", "B"),
            ("casual", "C"),
        ]);
        let ranked = rank_stations(
            &table,
            "member_casual",
            "start_station_name",
            "start_lat",
            "start_lng",
            10,
        )
        .unwrap();
        let order: Vec<&str> = ranked.iter().map(|s| s.station.as_str()).collect();
        assert_eq!(order, vec!["B", "A", "C"]);
    }

    #[test]
    fn test_concentration() {
        let table = trips(&[
            ("member", "A"),
            ("member", "A"),
            ("member", "B"),
            ("member", "B"),
            ("casual", "A"),
        ]);
        let stats = station_concentration(&table, "member_casual", "start_station_name", 1).unwrap();

        assert_eq!(stats[0].rider_class, "casual");
        assert_eq!(stats[0].total_stations, 1);
        assert_eq!(stats[0].top_share, 100.0);
        assert_eq!(stats[1].total_stations, 2);
        assert!(stats[1].gini_coefficient.abs() < 1e-9);
        assert_eq!(stats[1].top_share, 50.0);
    }

    #[test]
    fn test_station_report_outputs() {
        let table = trips(&[("member", "A"), ("casual", "A"), ("casual", "B")]);
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::create(dir.path()).unwrap();

        analyze_station_popularity(&table, &AnalysisConfig::default(), &writer).unwrap();

        let text = std::fs::read_to_string(writer.path("analysis_output.txt")).unwrap();
        assert!(text.contains("- Casual riders: Top 10 stations account for 100.0% of rides"));
        for file in [
            "popular_start_stations.csv",
            "popular_end_stations.csv",
            "start_station_concentration.csv",
            "end_station_concentration.csv",
        ] {
            assert!(writer.path(file).exists(), "{file} missing");
        }

        for role in ["start", "end"] {
            let csv = std::fs::read_to_string(writer.path(&format!("popular_{role}_stations.csv")))
                .unwrap();
            let header = format!("member_casual,{role}_station_name,latitude,longitude,count");
            assert!(csv.starts_with(&header), "{csv}");
        }
    }

    #[test]
    fn test_text_coordinates_are_conversion_error() {
        let table = Table::from_csv_reader(
            "member_casual,start_station_name,start_lat,start_lng\nmember,A,north,west\n".as_bytes(),
        )
        .unwrap();
        let err = rank_stations(
            &table,
            "member_casual",
            "start_station_name",
            "start_lat",
            "start_lng",
            10,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Conversion { .. }));
    }
}
