use anyhow::Result;
use rankflow::*;
use tempfile::tempdir;

#[test]
fn run_reports_rows_per_unit() -> Result<()> {
    let p = Pipeline::default();
    let nums = rise(&p, FromMem::new((1..=10u32).collect()));
    let evens = nums.filter(|x: &u32| x % 2 == 0);

    let mut ctx = Context::solo();
    let metrics = evens.run(&mut ctx, ProcReq::inherit())?;

    assert_eq!(metrics.rank(), 0);
    let root = metrics.unit(nums.id()).expect("root stats");
    assert_eq!(root.label, "rise");
    assert_eq!(root.rows_out, 10);
    assert_eq!(root.ranks, vec![0]);

    let filter = metrics.unit(evens.id()).expect("filter stats");
    assert_eq!((filter.rows_in, filter.rows_out), (10, 5));
    assert_eq!(metrics.total_bytes_sent(), 0);
    assert_eq!(metrics.units().count(), 2);
    Ok(())
}

#[test]
fn metrics_serialize_to_json() -> Result<()> {
    let p = Pipeline::default();
    let doubled = rise(&p, FromMem::new(vec![1u32, 2])).map(|x: &u32| x * 2);
    let mut ctx = Context::solo();
    let metrics = doubled.run(&mut ctx, ProcReq::inherit())?;

    let json = metrics.to_json();
    assert_eq!(json["rank"], 0);
    assert_eq!(json["units"]["1"]["label"], "map");
    assert_eq!(json["units"]["1"]["rows_out"], 2);

    let dir = tempdir()?;
    let path = dir.path().join("metrics.json");
    metrics.save_to_file(path.to_str().expect("utf-8 temp path"))?;
    let back: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(back["units"]["0"]["rows_out"], 2);
    Ok(())
}

#[test]
fn config_defaults() {
    let cfg = RunConfig::default();
    assert_eq!(cfg.prll_ratio, 0.5);
    assert!(cfg.persist_load);
    assert_eq!(cfg.ordered_batch_rows, 1);
    assert!(cfg.log_mode.contains(LogMode::WARNING));
    assert!(!cfg.log_mode.contains(LogMode::INFO));
}

#[test]
fn config_from_env_stays_within_bounds() {
    let cfg = RunConfig::from_env();
    assert!(cfg.prll_ratio > 0.0 && cfg.prll_ratio <= 1.0);
    assert!(cfg.ordered_batch_rows >= 1);
}

#[test]
fn context_reports_group_and_config() {
    let cfg = RunConfig { prll_ratio: 0.25, ..RunConfig::default() };
    let ctx = Context::with_config(std::sync::Arc::new(Solo::new()), cfg);
    assert_eq!((ctx.rank(), ctx.size()), (0, 1));
    assert_eq!(ctx.config().prll_ratio, 0.25);
    assert_eq!(ctx.scheduler().size(), 1);
}

#[test]
fn logging_can_be_initialised_twice() {
    init_logging(LogMode::ALL);
    init_logging(LogMode::NONE);
}

#[test]
fn log_modes_combine() {
    let mode = LogMode::ERROR | LogMode::WARNING;
    assert!(mode.contains(LogMode::ERROR));
    assert!(!mode.contains(LogMode::INFO));
    assert!(!LogMode::NONE.contains(LogMode::ERROR));
}

#[test]
fn run_error_exit_codes() {
    assert_eq!(RunError::Aborted { rank: 2, code: EXIT_UNKNOWN }.exit_code(), EXIT_UNKNOWN);
    assert_eq!(RunError::Codec("truncated".into()).exit_code(), EXIT_KNOWN);
    assert_eq!(
        RunError::TypeMismatch { unit: "map".into(), expected: "u32" }.to_string(),
        "unit map expected rows of type u32"
    );
}
