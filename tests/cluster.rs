use anyhow::{Result, anyhow};
use rankflow::reducers::{count, sum_by};
use rankflow::testing::*;
use rankflow::*;

fn abort_of(err: &anyhow::Error) -> Option<(usize, i32)> {
    match err.downcast_ref::<RunError>() {
        Some(RunError::Aborted { rank, code }) => Some((*rank, *code)),
        _ => None,
    }
}

#[test]
fn launch_returns_results_in_rank_order() -> Result<()> {
    let out = LocalCluster::new(4).launch(|comm| Ok((comm.rank(), comm.size())))?;
    assert_eq!(out, vec![(0, 4), (1, 4), (2, 4), (3, 4)]);
    Ok(())
}

#[test]
fn packets_are_matched_by_tag_and_sender() -> Result<()> {
    let out = LocalCluster::new(2).launch(|comm| {
        if comm.rank() == 0 {
            comm.send(1, Packet::new(7, 0, vec![7], true))?;
            comm.send(1, Packet::new(5, 0, vec![5], true))?;
            Ok(Vec::new())
        } else {
            // asked for in the opposite order of arrival
            let five = comm.recv(5, 0)?;
            let seven = comm.recv(7, 0)?;
            Ok(vec![five.payload[0], seven.payload[0]])
        }
    })?;
    assert_eq!(out[1], vec![5, 7]);
    Ok(())
}

#[test]
fn error_on_one_rank_aborts_with_known_code() {
    let err = LocalCluster::new(3)
        .launch(|comm| {
            if comm.rank() == 1 {
                return Err(anyhow!("bad input on rank 1"));
            }
            // the others wait on rank 1 forever unless the abort wakes them
            comm.recv(99, 1)?;
            Ok(())
        })
        .unwrap_err();
    assert_eq!(abort_of(&err), Some((1, EXIT_KNOWN)));
}

#[test]
fn panic_on_one_rank_aborts_with_unknown_code() {
    let err = LocalCluster::new(2)
        .launch(|comm| {
            let p = Pipeline::default();
            let rank = comm.rank();
            let moved = rise(&p, FromMem::new(vec![1u32, 2, 3]).split())
                .map(move |x: &u32| {
                    if rank == 1 {
                        panic!("row {x} is cursed");
                    }
                    *x
                })
                .prll(ProcReq::count(1));
            let mut ctx = Context::new(comm);
            moved.run_result(&mut ctx, ProcReq::inherit())
        })
        .unwrap_err();
    assert_eq!(abort_of(&err), Some((1, EXIT_UNKNOWN)));
}

#[test]
fn failing_source_on_every_rank_still_aborts_once() {
    let err = LocalCluster::new(3)
        .launch(|comm| {
            let p = Pipeline::default();
            let names = rise(&p, FromFileNames::new("[broken")).prll(ProcReq::count(1));
            let mut ctx = Context::new(comm);
            names.run_result(&mut ctx, ProcReq::inherit())
        })
        .unwrap_err();
    let (_, code) = abort_of(&err).expect("job should report an abort");
    assert_eq!(code, EXIT_KNOWN);
}

#[test]
fn solo_abort_shows_up_on_the_next_receive() {
    let solo = Solo::new();
    solo.abort(EXIT_KNOWN);
    solo.abort(EXIT_UNKNOWN);
    assert!(matches!(solo.recv(1, 0), Err(RunError::Aborted { code: EXIT_KNOWN, .. })));
}

#[test]
fn solo_receive_without_a_matching_send_fails() -> Result<()> {
    let solo = Solo::new();
    assert!(matches!(solo.recv(3, 0), Err(RunError::Disconnected { rank: 0 })));
    solo.send(0, Packet::new(3, 0, vec![1, 2], true))?;
    assert_eq!(solo.recv(3, 0)?.payload, vec![1, 2]);
    assert!(solo.send(1, Packet::new(3, 0, Vec::new(), true)).is_err());
    Ok(())
}

#[test]
fn word_count_over_two_ranks() -> Result<()> {
    let per_rank = run_on_ranks(2, |p| {
        rise(p, FromMem::new(vec!["a".to_string(), "b".into(), "a".into()]).split())
            .reduce(|w: &String| w.clone(), 0u64, count(), Keyed::default().inprocess())
            .reduce(
                |kv: &(String, u64)| kv.0.clone(),
                0u64,
                sum_by(|kv: &(String, u64)| kv.1),
                Keyed::default().prll(ProcReq::count(2)),
            )
    })?;

    let keys: Vec<Vec<String>> = per_rank.iter().map(|rs| rs.iter().map(|r| r.0.clone()).collect()).collect();
    assert_keys_partitioned(&keys);
    let all: Vec<(String, u64)> = per_rank.into_iter().flatten().collect();
    assert_kv_collections_equal(all, vec![("a".into(), 2), ("b".into(), 1)]);
    Ok(())
}

/// Rows gathered per rank, for each of `runs` consecutive runs of one pipeline.
fn gathered_per_run(config: RunConfig, runs: usize) -> Result<Vec<Vec<usize>>> {
    LocalCluster::new(2).launch(|comm| {
        let p = Pipeline::default();
        let moved = rise(&p, FromMem::new((0..4u32).collect()).split()).prll(ProcReq::count(1));
        let mut ctx = Context::with_config(comm, config.clone());
        (0..runs)
            .map(|_| Ok(moved.run_result(&mut ctx, ProcReq::inherit())?.len()))
            .collect()
    })
}

#[test]
fn repeated_runs_move_work_to_less_loaded_ranks() -> Result<()> {
    let per_rank = gathered_per_run(RunConfig::default(), 2)?;
    assert_eq!(per_rank[0], vec![4, 0]);
    assert_eq!(per_rank[1], vec![0, 4]);
    Ok(())
}

#[test]
fn repeated_runs_without_load_history_stay_put() -> Result<()> {
    let config = RunConfig { persist_load: false, ..RunConfig::default() };
    let per_rank = gathered_per_run(config, 3)?;
    assert_eq!(per_rank[0], vec![4, 4, 4]);
    assert_eq!(per_rank[1], vec![0, 0, 0]);
    Ok(())
}

#[test]
fn run_can_be_limited_to_part_of_the_group() -> Result<()> {
    let per_rank = LocalCluster::new(3).launch(|comm| {
        let p = Pipeline::default();
        let nums = rise(&p, FromMem::new(vec![1u32, 2, 3, 4]).split());
        let mut ctx = Context::new(comm);
        nums.run_result(&mut ctx, ProcReq::count(2))
    })?;
    assert_eq!(per_rank, vec![vec![1, 2], vec![3, 4], vec![]]);
    Ok(())
}
