use anyhow::Result;
use rankflow::testing::*;
use rankflow::units::sink::rank_path;
use rankflow::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Reading {
    sensor: String,
    value: f64,
}

#[test]
fn dump_file_writes_header_then_json_lines() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("out.jsonl");

    let p = Pipeline::default();
    let readings = rise(
        &p,
        FromMem::new(vec![
            Reading { sensor: "t1".into(), value: 20.5 },
            Reading { sensor: "t2".into(), value: -3.0 },
        ]),
    );
    let same = readings.dump_file(&path, Some("sensor,value"));
    assert_eq!(same.id(), readings.id());

    let mut ctx = Context::solo();
    let metrics = readings.run(&mut ctx, ProcReq::inherit())?;
    assert_eq!(metrics.unit(readings.id()).map(|s| s.rows_out), Some(2));

    let text = fs::read_to_string(&path)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "sensor,value");
    let parsed: Vec<Reading> = lines[1..]
        .iter()
        .map(|l| serde_json::from_str(l))
        .collect::<Result<_, _>>()?;
    assert_eq!(parsed[0], Reading { sensor: "t1".into(), value: 20.5 });
    assert_eq!(parsed.len(), 2);
    Ok(())
}

#[test]
fn dump_file_creates_missing_directories() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("nested/deeper/rows.jsonl");

    let p = Pipeline::default();
    let nums = rise(&p, FromMem::new(vec![1u32, 2]));
    nums.dump_file(&path, None);
    let mut ctx = Context::solo();
    nums.run(&mut ctx, ProcReq::inherit())?;

    assert_eq!(fs::read_to_string(&path)?, "1\n2\n");
    Ok(())
}

#[test]
fn every_rank_writes_its_own_file() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("part.jsonl");
    let target = path.clone();

    LocalCluster::new(2).launch(|comm| {
        let p = Pipeline::default();
        let nums = rise(&p, FromMem::new(vec![1u32, 2, 3, 4]).split());
        nums.dump_file(&target, None);
        let mut ctx = Context::new(comm);
        nums.run(&mut ctx, ProcReq::inherit())?;
        Ok(())
    })?;

    assert!(!path.exists());
    assert_eq!(fs::read_to_string(rank_path(&path, 0, 2))?, "1\n2\n");
    assert_eq!(fs::read_to_string(rank_path(&path, 1, 2))?, "3\n4\n");
    Ok(())
}

#[test]
fn ranks_outside_the_sink_leave_no_file() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("only0.jsonl");
    let target = path.clone();

    LocalCluster::new(2).launch(|comm| {
        let p = Pipeline::default();
        let nums = rise_on(&p, FromMem::new(Vec::<u32>::new()), ProcReq::ranks(vec![0]));
        nums.dump_file(&target, Some("n"));
        let mut ctx = Context::new(comm);
        nums.run(&mut ctx, ProcReq::inherit())?;
        Ok(())
    })?;

    // in range with no rows still leaves the header behind
    assert_eq!(fs::read_to_string(rank_path(&path, 0, 2))?, "n\n");
    assert!(!rank_path(&path, 1, 2).exists());
    Ok(())
}

#[test]
fn rank_path_only_suffixes_multi_rank_worlds() {
    let p = Path::new("/tmp/out.jsonl");
    assert_eq!(rank_path(p, 0, 1), Path::new("/tmp/out.jsonl"));
    assert_eq!(rank_path(p, 3, 4), Path::new("/tmp/out.jsonl.3"));
}

#[test]
fn dump_to_stdout_passes_rows_on() -> Result<()> {
    let p = Pipeline::default();
    let nums = rise(&p, FromMem::new(vec![5u32, 6])).dump().map(|x: &u32| x + 1);
    let mut ctx = Context::solo();
    assert_collections_equal(&nums.run_result(&mut ctx, ProcReq::inherit())?, &[6, 7]);
    Ok(())
}
