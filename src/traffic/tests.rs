use std::io::Write;
use std::time::Duration;

use super::*;

fn write_temp(contents: &str) -> Result<tempfile::NamedTempFile, String> {
    let mut file = tempfile::Builder::new()
        .suffix(".csv")
        .tempfile()
        .map_err(|err| format!("tempfile failed: {}", err))?;
    file.write_all(contents.as_bytes())
        .map_err(|err| format!("write failed: {}", err))?;
    Ok(file)
}

#[test]
fn stable_holds_target() {
    let profile = TrafficProfile::Stable { target_tps: 100.0 };
    assert!((profile.tps_at(0, 10_000) - 100.0).abs() < f64::EPSILON);
    assert!((profile.tps_at(9_999, 10_000) - 100.0).abs() < f64::EPSILON);
}

#[test]
fn ramp_interpolates_then_plateaus() {
    let profile = TrafficProfile::Ramp {
        start_tps: 10.0,
        target_tps: 100.0,
        ramp: Duration::from_millis(1000),
    };
    assert!((profile.tps_at(0, 2000) - 10.0).abs() < 1e-9);
    let mid = profile.tps_at(500, 2000);
    assert!((mid - 55.0).abs() < 1e-9, "mid was {}", mid);
    assert!((profile.tps_at(1000, 2000) - 100.0).abs() < 1e-9);
    assert!((profile.tps_at(1500, 2000) - 100.0).abs() < 1e-9);
}

#[test]
fn ramp_is_monotonic_until_plateau() {
    let profile = TrafficProfile::Ramp {
        start_tps: 5.0,
        target_tps: 50.0,
        ramp: Duration::from_millis(2000),
    };
    let mut previous = 0.0_f64;
    for elapsed in (0..=2000).step_by(100) {
        let tps = profile.tps_at(elapsed, 5000);
        assert!(tps >= previous, "ramp decreased at {} ms", elapsed);
        previous = tps;
    }
}

#[test]
fn spike_is_piecewise_constant() {
    let profile = TrafficProfile::Spike {
        base_tps: 10.0,
        spike_tps: 200.0,
        start: Duration::from_millis(1000),
        duration: Duration::from_millis(500),
    };
    assert!((profile.tps_at(999, 5000) - 10.0).abs() < f64::EPSILON);
    assert!((profile.tps_at(1000, 5000) - 200.0).abs() < f64::EPSILON);
    assert!((profile.tps_at(1499, 5000) - 200.0).abs() < f64::EPSILON);
    assert!((profile.tps_at(1500, 5000) - 10.0).abs() < f64::EPSILON);
}

#[test]
fn custom_clamps_and_interpolates() {
    let profile = TrafficProfile::Custom {
        points: vec![(1000, 10.0), (3000, 30.0), (5000, 20.0)],
    };
    assert!((profile.tps_at(0, 6000) - 10.0).abs() < f64::EPSILON);
    assert!((profile.tps_at(2000, 6000) - 20.0).abs() < 1e-9);
    assert!((profile.tps_at(4000, 6000) - 25.0).abs() < 1e-9);
    assert!((profile.tps_at(6000, 6000) - 20.0).abs() < f64::EPSILON);
}

#[test]
fn profiles_never_go_negative() {
    let profiles = [
        TrafficProfile::Stable { target_tps: 0.5 },
        TrafficProfile::Ramp {
            start_tps: 100.0,
            target_tps: 1.0,
            ramp: Duration::from_millis(1000),
        },
        TrafficProfile::Custom {
            points: vec![(0, 0.0), (1000, 4.0)],
        },
    ];
    for profile in &profiles {
        for elapsed in [0, 1, 500, 999, 1000, 100_000] {
            assert!(profile.tps_at(elapsed, 1000) >= 0.0);
        }
    }
}

#[test]
fn max_tps_bounds_every_sample() {
    let profile = TrafficProfile::Spike {
        base_tps: 10.0,
        spike_tps: 200.0,
        start: Duration::from_millis(100),
        duration: Duration::from_millis(100),
    };
    let bound = profile.max_tps();
    for elapsed in (0..1000).step_by(50) {
        assert!(profile.tps_at(elapsed, 1000) <= bound);
    }
}

#[test]
fn pattern_loader_reads_seconds_and_sorts() -> Result<(), String> {
    let file = write_temp("time,tps\n5,50\n1,10\n3,30\n")?;
    let points =
        load_pattern_points(file.path(), false).map_err(|err| format!("load failed: {}", err))?;
    let times: Vec<u64> = points.iter().map(|&(time_ms, _)| time_ms).collect();
    assert_eq!(times, vec![1000, 3000, 5000]);
    for (&(_, tps), expected) in points.iter().zip([10.0, 30.0, 50.0]) {
        assert!((tps - expected).abs() < f64::EPSILON);
    }
    Ok(())
}

#[test]
fn pattern_loader_accepts_t_and_rate_columns_in_millis() -> Result<(), String> {
    let file = write_temp("t,rate\n100,2.5\n200,5\n")?;
    let points =
        load_pattern_points(file.path(), true).map_err(|err| format!("load failed: {}", err))?;
    let times: Vec<u64> = points.iter().map(|&(time_ms, _)| time_ms).collect();
    assert_eq!(times, vec![100, 200]);
    for (&(_, tps), expected) in points.iter().zip([2.5, 5.0]) {
        assert!((tps - expected).abs() < f64::EPSILON);
    }
    Ok(())
}

#[test]
fn pattern_loader_skips_malformed_rows() -> Result<(), String> {
    let file = write_temp("time,tps\n1,10\nnot,a,row\n2,\n3,30\n")?;
    let points =
        load_pattern_points(file.path(), false).map_err(|err| format!("load failed: {}", err))?;
    assert_eq!(points.len(), 2);
    Ok(())
}

#[test]
fn pattern_loader_rejects_empty_files() -> Result<(), String> {
    let file = write_temp("time,tps\nbad,row\n")?;
    match load_pattern_points(file.path(), false) {
        Err(crate::error::ConfigError::PatternFileEmpty { .. }) => Ok(()),
        Err(err) => Err(format!("unexpected error: {}", err)),
        Ok(_) => Err("expected an error for a file with no valid rows".to_owned()),
    }
}

#[test]
fn pattern_loader_requires_known_columns() -> Result<(), String> {
    let file = write_temp("foo,bar\n1,2\n")?;
    match load_pattern_points(file.path(), false) {
        Err(crate::error::ConfigError::PatternFileMissingColumns { .. }) => Ok(()),
        Err(err) => Err(format!("unexpected error: {}", err)),
        Ok(_) => Err("expected a missing-columns error".to_owned()),
    }
}
