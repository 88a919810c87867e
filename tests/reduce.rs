use anyhow::Result;
use rankflow::reducers::{count, group_len, group_sum_by, max_by, min_by, sum_by};
use rankflow::testing::*;
use rankflow::units::reduce::Reduce;
use rankflow::units::reduce_all::ReduceAll;
use rankflow::*;
use std::sync::Arc;

fn words(s: &str) -> Vec<String> {
    s.split_whitespace().map(String::from).collect()
}

fn counter(ordered: bool) -> Reduce<String, String, u64> {
    Reduce::new(
        Arc::new(|w: &String| w.clone()),
        Arc::new(|n: u64, _: &String, _: &String| n + 1),
        0,
        ordered,
    )
}

#[test]
fn unordered_reduce_emits_only_at_end() -> Result<()> {
    let mut h = UnitHarness::new(counter(false));
    h.feed(0, words("b a b c"))?;
    h.feed(0, words("a b"))?;
    assert!(h.take::<(String, u64)>()?.is_empty());
    assert_eq!(h.unit().open_keys(), 3);

    h.end(0)?;
    assert!(h.closed());
    assert_kv_collections_equal(
        h.take::<(String, u64)>()?,
        vec![("a".into(), 2), ("b".into(), 3), ("c".into(), 1)],
    );
    assert_eq!(h.unit().open_keys(), 0);
    Ok(())
}

#[test]
fn ordered_reduce_emits_on_key_change_and_holds_one_key() -> Result<()> {
    let mut h = UnitHarness::new(counter(true));
    h.feed(0, words("a a b"))?;
    assert_eq!(h.take::<(String, u64)>()?, vec![("a".to_string(), 2)]);
    assert_eq!(h.unit().open_keys(), 1);

    h.feed(0, words("b b c"))?;
    assert_eq!(h.take::<(String, u64)>()?, vec![("b".to_string(), 3)]);
    assert_eq!(h.unit().open_keys(), 1);

    h.end(0)?;
    assert_eq!(h.take::<(String, u64)>()?, vec![("c".to_string(), 1)]);
    assert_eq!(h.unit().open_keys(), 0);
    Ok(())
}

#[test]
fn reduce_rejects_rows_of_the_wrong_type() {
    let mut h = UnitHarness::new(counter(false));
    assert!(h.feed(0, vec![1u32, 2]).is_err());
}

#[test]
fn reduce_runs_again_from_scratch() -> Result<()> {
    let p = Pipeline::default();
    let counts = rise(&p, FromMem::new(words("x y x"))).reduce(
        |w: &String| w.clone(),
        0u64,
        count(),
        Keyed::default(),
    );
    let mut ctx = Context::solo();
    let first = counts.run_result(&mut ctx, ProcReq::inherit())?;
    let second = counts.run_result(&mut ctx, ProcReq::inherit())?;
    assert_kv_collections_equal(first.clone(), vec![("x".into(), 2), ("y".into(), 1)]);
    assert_kv_collections_equal(first, second);
    Ok(())
}

#[test]
fn ordered_reduce_in_a_pipeline_keeps_key_order() -> Result<()> {
    let p = Pipeline::default();
    let counts = rise(&p, FromMem::new(words("a a b c c c")).batch(2)).reduce(
        |w: &String| w.clone(),
        0u64,
        count(),
        Keyed::default().ordered(),
    );
    let mut ctx = Context::solo();
    assert_collections_equal(
        &counts.run_result(&mut ctx, ProcReq::inherit())?,
        &[("a".to_string(), 2), ("b".to_string(), 1), ("c".to_string(), 3)],
    );
    Ok(())
}

#[test]
fn inprocess_reduce_skips_the_exchange() -> Result<()> {
    // every rank holds the whole input, so every rank reports full counts
    let per_rank = run_on_ranks(2, |p| {
        rise(p, FromMem::new(words("a b a"))).reduce(
            |w: &String| w.clone(),
            0u64,
            count(),
            Keyed::default().inprocess(),
        )
    })?;
    for rows in per_rank {
        assert_kv_collections_equal(rows, vec![("a".into(), 2), ("b".into(), 1)]);
    }
    Ok(())
}

#[test]
fn ready_made_folds() -> Result<()> {
    let p = Pipeline::default();
    let sales = rise(
        &p,
        FromMem::new(vec![
            ("north".to_string(), 5u64),
            ("south".to_string(), 2),
            ("north".to_string(), 7),
            ("south".to_string(), 9),
        ]),
    );
    let key = |s: &(String, u64)| s.0.clone();
    let totals = sales.reduce(key, 0u64, sum_by(|s: &(String, u64)| s.1), Keyed::default());
    let lows = sales.reduce(key, None, min_by(|s: &(String, u64)| s.1), Keyed::default());
    let highs = sales.reduce(key, None, max_by(|s: &(String, u64)| s.1), Keyed::default());

    let mut ctx = Context::solo();
    assert_kv_collections_equal(
        totals.run_result(&mut ctx, ProcReq::inherit())?,
        vec![("north".into(), 12), ("south".into(), 11)],
    );
    assert_kv_collections_equal(
        lows.run_result(&mut ctx, ProcReq::inherit())?,
        vec![("north".into(), Some(5)), ("south".into(), Some(2))],
    );
    assert_kv_collections_equal(
        highs.run_result(&mut ctx, ProcReq::inherit())?,
        vec![("north".into(), Some(7)), ("south".into(), Some(9))],
    );
    Ok(())
}

/* ===================== reduce_all ===================== */

/// Key `c` once, `d` three times, `c` four times.
fn runs() -> Vec<(String, u32)> {
    ["c", "d", "d", "d", "c", "c", "c", "c"]
        .iter()
        .enumerate()
        .map(|(i, k)| (k.to_string(), i as u32))
        .collect()
}

fn window_sizes(window: Window) -> Result<Vec<usize>> {
    let p = Pipeline::default();
    let groups = rise(&p, FromMem::new(runs())).reduce_all(
        |r: &(String, u32)| r.0.clone(),
        group_len::<String, (String, u32)>(),
        window,
        Keyed::default().ordered().inprocess(),
    );
    let mut ctx = Context::solo();
    Ok(groups
        .run_result(&mut ctx, ProcReq::inherit())?
        .into_iter()
        .map(|(_, n)| n)
        .collect())
}

#[test]
fn bunch_window_hands_over_fixed_chunks() -> Result<()> {
    assert_collections_equal(&window_sizes(Window::Bunch(3))?, &[1, 3, 3, 1]);
    Ok(())
}

#[test]
fn adjacent_window_slides_by_one() -> Result<()> {
    assert_collections_equal(&window_sizes(Window::Adjacent(3))?, &[1, 3, 2, 3, 3]);
    Ok(())
}

#[test]
fn whole_window_hands_over_each_run_of_a_key() -> Result<()> {
    assert_collections_equal(&window_sizes(Window::Whole)?, &[1, 3, 4]);
    Ok(())
}

#[test]
fn unordered_adjacent_flushes_short_keys_only() -> Result<()> {
    let mut h = UnitHarness::new(ReduceAll::new(
        Arc::new(|r: &(char, u32)| r.0),
        Arc::new(|_: &char, rows: &[(char, u32)]| rows.iter().map(|r| r.1).collect::<Vec<_>>()),
        Window::Adjacent(3),
        false,
    ));
    h.feed(0, vec![('a', 1u32), ('b', 1), ('a', 2), ('a', 3), ('b', 2), ('a', 4)])?;
    let mut early = h.take::<(char, Vec<u32>)>()?;
    h.end(0)?;
    early.extend(h.take::<(char, Vec<u32>)>()?);
    early.sort();
    assert_eq!(
        early,
        vec![('a', vec![1, 2, 3]), ('a', vec![2, 3, 4]), ('b', vec![1, 2])]
    );
    Ok(())
}

#[test]
fn ordered_reduce_all_holds_at_most_one_group() -> Result<()> {
    let mut h = UnitHarness::new(ReduceAll::new(
        Arc::new(|r: &(String, u32)| r.0.clone()),
        Arc::new(group_len::<String, (String, u32)>()),
        Window::Whole,
        true,
    ));
    for row in runs() {
        h.feed(0, vec![row])?;
        assert!(h.unit().open_keys() <= 1);
    }
    h.end(0)?;
    assert_eq!(h.unit().open_keys(), 0);
    Ok(())
}

#[test]
fn keyed_group_sums_across_ranks() -> Result<()> {
    let rows: Vec<(u8, u64)> = (0..30u64).map(|i| ((i % 4) as u8, i)).collect();
    let input = rows.clone();
    let per_rank = run_on_ranks(3, move |p| {
        rise(p, FromMem::new(input.clone()).split()).reduce_all(
            |r: &(u8, u64)| r.0,
            group_sum_by(|r: &(u8, u64)| r.1),
            Window::Whole,
            Keyed::default().prll(ProcReq::count(3)),
        )
    })?;

    let keys: Vec<Vec<u8>> = per_rank.iter().map(|rs| rs.iter().map(|r| r.0).collect()).collect();
    assert_keys_partitioned(&keys);

    let mut expected = [0u64; 4];
    for (k, v) in rows {
        expected[k as usize] += v;
    }
    let all: Vec<(u8, u64)> = per_rank.into_iter().flatten().collect();
    assert_kv_collections_equal(all, (0..4u8).map(|k| (k, expected[k as usize])).collect());
    Ok(())
}
