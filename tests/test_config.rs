use etas_sim::config::{ConfigError, EtasConfig, EtasParams, TriggerWeighting};

#[test]
fn test_defaults_are_valid() {
    let config = EtasConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.weighting, TriggerWeighting::Combined);
    // calibration defaults carried over unchanged
    assert_eq!(config.params.k, 0.008);
    assert_eq!(config.params.p, 1.34);
    assert_eq!(config.params.c_days, 0.095);
    assert_eq!(config.params.dist_decay_q, 1.96);
    assert_eq!(config.params.min_dist_km, 0.79);
    assert_eq!(config.params.ert_ramp_half_width_km, 1.24);
    assert_eq!(config.params.trigger_loc_fuzz_deg, 0.005);
}

#[test]
fn test_invalid_params_rejected() {
    let params = EtasParams {
        p: 0.9,
        ..EtasParams::default()
    };
    assert!(matches!(
        params.validate(),
        Err(ConfigError::InvalidParameter { param: "p", .. })
    ));

    let params = EtasParams {
        k: f64::NAN,
        ..EtasParams::default()
    };
    assert!(matches!(
        params.validate(),
        Err(ConfigError::InvalidParameter { param: "k", .. })
    ));
}

#[test]
fn test_invalid_horizon_rejected() {
    let mut config = EtasConfig::default();
    config.options.sim_start_ms = 100;
    config.options.sim_end_ms = 100;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidHorizon { .. })
    ));
}

#[test]
fn test_load_from_toml_file() {
    let text = r#"
        weighting = "combined"

        [params]
        k = 0.01
        p = 1.2
        max_trigger_dist_km = 300.0

        [options]
        sim_start_ms = 0
        sim_end_ms = 86400000
        include_spontaneous = false
        max_events = 10000
    "#;
    let path = std::env::temp_dir().join("etas_sim_test_config.toml");
    std::fs::write(&path, text).unwrap();
    let config = EtasConfig::from_toml_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(config.params.k, 0.01);
    assert_eq!(config.params.p, 1.2);
    assert_eq!(config.params.max_trigger_dist_km, 300.0);
    // unspecified fields fall back to defaults
    assert_eq!(config.params.c_days, 0.095);
    assert!(!config.options.include_spontaneous);
    assert_eq!(config.options.max_events, Some(10000));
    assert_eq!(config.options.sim_end_ms, 86_400_000);
}

#[test]
fn test_invalid_toml_is_fatal() {
    let text = r#"
        [params]
        p = 0.5
    "#;
    let path = std::env::temp_dir().join("etas_sim_test_config_bad.toml");
    std::fs::write(&path, text).unwrap();
    let result = EtasConfig::from_toml_file(&path);
    std::fs::remove_file(&path).ok();
    assert!(matches!(
        result,
        Err(ConfigError::InvalidParameter { param: "p", .. })
    ));
}
