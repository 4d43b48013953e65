//! Configuration layering: shipped file, TOML overrides and environment.

use figment::Jail;
use inline_inspection::config::{LogFormat, RigConfig};
use inline_inspection::orchestrator::OrchestratorSettings;
use std::path::Path;
use std::time::Duration;

#[test]
fn shipped_config_matches_defaults() {
    Jail::expect_with(|_| {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/inspection.toml");
        let config = RigConfig::load_from(&path).map_err(|e| e.to_string())?;
        config.validate().map_err(|e| e.to_string())?;
        assert_eq!(config, RigConfig::default());
        Ok(())
    });
}

#[test]
fn environment_overrides_file() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "inspection.toml",
            r#"
            [measurement]
            interval_s = 0.5

            [collector]
            base_url = "http://collector:5000"
            "#,
        )?;
        jail.set_env("INSPECTION_MEASUREMENT__INTERVAL_S", "2.5");
        jail.set_env("INSPECTION_APPLICATION__LOG_FORMAT", "json");

        let config = RigConfig::load_from("inspection.toml").map_err(|e| e.to_string())?;
        assert_eq!(config.measurement.interval_s, 2.5);
        assert_eq!(config.collector.base_url, "http://collector:5000");
        assert_eq!(config.application.log_format, LogFormat::Json);
        Ok(())
    });
}

#[test]
fn orchestrator_settings_follow_config() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "inspection.toml",
            r#"
            [measurement]
            samplesPerSecond = 20
            movingAverageWindow = 4

            [capture]
            cameraFieldOfView = 10
            minimumCaptureFrequency = 0.01
            max_in_flight_dispatches = 2
            shutdown_drain_timeout_s = 3
            "#,
        )?;

        let config = RigConfig::load_from("inspection.toml").map_err(|e| e.to_string())?;
        config.validate().map_err(|e| e.to_string())?;
        let settings = OrchestratorSettings::try_from(&config).map_err(|e| e.to_string())?;

        assert_eq!(settings.measurement.samples_per_second, 20.0);
        assert_eq!(settings.measurement.moving_average_window, 4);
        assert_eq!(settings.search.field_of_view, 10.0);
        assert_eq!(settings.search.floor, 0.01);
        assert_eq!(settings.search.initial, 1.0);
        assert_eq!(settings.max_in_flight_dispatches, 2);
        assert_eq!(settings.drain_timeout, Duration::from_secs(3));
        Ok(())
    });
}
