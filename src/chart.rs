//! Plot series for the temperature chart: recent history oldest-first, with
//! the live reading appended.

use chrono::Local;
use serde::Serialize;

use crate::fusion::FusionState;
use crate::models::FusedRecord;

pub const DEFAULT_CHART_WINDOW: usize = 10;
pub const LIVE_LABEL: &str = "Current";
/// Zero-padded 12-hour clock, e.g. `03:07 PM`.
const LABEL_FORMAT: &str = "%I:%M %p";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub label: String,
    pub device_temp: f64,
    pub ambient_temp: f64,
}

impl ChartPoint {
    fn from_record(record: &FusedRecord) -> Self {
        let ambient_temp = record.ambient_temp();
        Self {
            label: record
                .timestamp
                .with_timezone(&Local)
                .format(LABEL_FORMAT)
                .to_string(),
            device_temp: record
                .device_temp()
                .or(ambient_temp)
                .unwrap_or_default(),
            ambient_temp: ambient_temp.unwrap_or_default(),
        }
    }
}

/// `history` is newest-first, as the ledger keeps it. At most `window`
/// records are plotted; the live point is added only when the state holds
/// both a sample and an ambient reading.
pub fn project(state: &FusionState, history: &[FusedRecord], window: usize) -> Vec<ChartPoint> {
    let mut points: Vec<ChartPoint> = history
        .iter()
        .take(window)
        .rev()
        .map(ChartPoint::from_record)
        .collect();

    if let (Some(_), Some(ambient)) = (&state.sample, &state.ambient) {
        points.push(ChartPoint {
            label: LIVE_LABEL.to_string(),
            device_temp: state.device_temp().unwrap_or(ambient.temp),
            ambient_temp: ambient.temp,
        });
    }

    points
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::models::DeviceSample;
    use crate::testing::{ambient, sample};

    fn record(id: u64, battery_temp: f64) -> FusedRecord {
        FusedRecord {
            id,
            timestamp: Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap()
                + Duration::minutes(id as i64),
            stats: sample(battery_temp),
            ambient: Some(ambient(20.0)),
            advisory: None,
        }
    }

    fn newest_first(count: u64) -> Vec<FusedRecord> {
        (0..count).rev().map(|i| record(i, 30.0 + i as f64)).collect()
    }

    fn live_state(battery_temp: f64) -> FusionState {
        FusionState::default()
            .with_sample(sample(battery_temp), Utc::now())
            .with_ambient(ambient(25.0))
    }

    #[test]
    fn nothing_to_plot() {
        assert!(project(&FusionState::default(), &[], DEFAULT_CHART_WINDOW).is_empty());
    }

    #[test]
    fn sample_without_ambient_adds_no_live_point() {
        let state = FusionState::default().with_sample(sample(35.0), Utc::now());
        assert!(project(&state, &[], DEFAULT_CHART_WINDOW).is_empty());
    }

    #[test]
    fn window_keeps_newest_records_oldest_first_then_live() {
        let history = newest_first(12);
        let points = project(&live_state(50.0), &history, DEFAULT_CHART_WINDOW);

        assert_eq!(points.len(), 11);
        let temps: Vec<f64> = points.iter().map(|p| p.device_temp).collect();
        assert_eq!(
            temps,
            vec![32.0, 33.0, 34.0, 35.0, 36.0, 37.0, 38.0, 39.0, 40.0, 41.0, 50.0]
        );
        assert_eq!(points[10].label, LIVE_LABEL);
        assert_eq!(points[10].ambient_temp, 25.0);
    }

    #[test]
    fn labels_read_as_twelve_hour_clock() {
        let points = project(&FusionState::default(), &newest_first(3), DEFAULT_CHART_WINDOW);

        for point in points {
            let (clock, meridiem) = point.label.split_once(' ').unwrap();
            assert!(meridiem == "AM" || meridiem == "PM", "{}", point.label);
            let (hour, minute) = clock.split_once(':').unwrap();
            assert_eq!(hour.len(), 2);
            assert_eq!(minute.len(), 2);
            assert!((1..=12).contains(&hour.parse::<u32>().unwrap()));
        }
    }

    #[test]
    fn labels_use_local_clock_time() {
        let history = newest_first(1);
        let points = project(&FusionState::default(), &history, DEFAULT_CHART_WINDOW);

        let expected = history[0]
            .timestamp
            .with_timezone(&Local)
            .format(LABEL_FORMAT)
            .to_string();
        assert_eq!(points[0].label, expected);
    }

    #[test]
    fn device_temp_falls_back_to_cpu_then_ambient() {
        let mut cpu_only = record(1, 0.0);
        cpu_only.stats = DeviceSample {
            cpu_temp: Some(61.5),
            ..Default::default()
        };
        let mut bare = record(0, 0.0);
        bare.stats = DeviceSample::default();
        let mut nothing = record(2, 0.0);
        nothing.stats = DeviceSample::default();
        nothing.ambient = None;

        let points = project(
            &FusionState::default(),
            &[nothing, cpu_only, bare],
            DEFAULT_CHART_WINDOW,
        );

        assert_eq!(points[0].device_temp, 20.0);
        assert_eq!(points[1].device_temp, 61.5);
        assert_eq!(points[2].device_temp, 0.0);
        assert_eq!(points[2].ambient_temp, 0.0);
    }

    #[test]
    fn live_point_falls_back_to_ambient() {
        let state = FusionState::default()
            .with_sample(DeviceSample::default(), Utc::now())
            .with_ambient(ambient(27.0));

        let points = project(&state, &[], DEFAULT_CHART_WINDOW);

        assert_eq!(
            points,
            vec![ChartPoint {
                label: LIVE_LABEL.into(),
                device_temp: 27.0,
                ambient_temp: 27.0,
            }]
        );
    }
}
