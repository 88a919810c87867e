use rankflow::*;

fn sched(size: usize) -> Scheduler {
    Scheduler::new(size, 0, &RunConfig::default())
}

fn one(s: &mut Scheduler, req: ProcReq, cur_run: &[usize], prio: Vec<usize>) -> Par {
    s.assign(&[vec![req]], cur_run, &[prio]).remove(0).remove(0)
}

#[test]
fn roots_without_size_take_every_rank() {
    let mut s = sched(8);
    let all: Vec<usize> = (0..8).collect();
    let root = one(&mut s, ProcReq::inherit(), &all, vec![]);
    assert_eq!(root.ranks(), all.as_slice());
}

#[test]
fn task_without_size_takes_half_of_its_parent() {
    let mut s = sched(8);
    let all: Vec<usize> = (0..8).collect();
    let root = one(&mut s, ProcReq::inherit(), &all, vec![]);
    let task = one(&mut s, ProcReq::inherit(), &all, root.ranks().to_vec());
    assert_eq!(task.ranks(), &[0, 1, 2, 3]);
}

#[test]
fn prll_ratio_comes_from_config() {
    let cfg = RunConfig { prll_ratio: 0.25, ..RunConfig::default() };
    let mut s = Scheduler::new(8, 0, &cfg);
    let all: Vec<usize> = (0..8).collect();
    let task = one(&mut s, ProcReq::inherit(), &all, all.clone());
    assert_eq!(task.n_proc(), 2);
}

#[test]
fn count_requests_never_go_below_one() {
    let mut s = sched(4);
    let all: Vec<usize> = (0..4).collect();
    assert_eq!(one(&mut s, ProcReq::count(0), &all, vec![]).n_proc(), 1);
    assert_eq!(one(&mut s, ProcReq::count(3), &all, vec![]).n_proc(), 3);
    assert_eq!(one(&mut s, ProcReq::count(10), &all, vec![]).n_proc(), 4);
}

#[test]
fn ratio_scales_parent_or_whole_run() {
    let mut s = sched(8);
    let all: Vec<usize> = (0..8).collect();
    let with_parent = one(&mut s, ProcReq::ratio(0.5), &all, vec![4, 5, 6, 7]);
    assert_eq!(with_parent.n_proc(), 2);
    let without_parent = one(&mut s, ProcReq::ratio(0.5), &all, vec![]);
    assert_eq!(without_parent.n_proc(), 4);
}

#[test]
fn rank_list_is_intersected_with_the_run() {
    let mut s = sched(4);
    let all: Vec<usize> = (0..4).collect();
    let par = one(&mut s, ProcReq::ranks(vec![2, 9, 1, 2]), &all, vec![]);
    assert_eq!(par.ranks(), &[2, 1]);
}

#[test]
fn impossible_rank_list_falls_back_to_one_rank() {
    let mut s = sched(4);
    let all: Vec<usize> = (0..4).collect();
    let par = one(&mut s, ProcReq::ranks(vec![9]), &all, vec![]);
    assert_eq!(par.n_proc(), 1);
    assert_eq!(par.ranks(), &[0]);
}

#[test]
fn parent_ranks_come_first_unless_task_mode() {
    let mut s = sched(4);
    let all: Vec<usize> = (0..4).collect();
    let local = one(&mut s, ProcReq::count(2), &all, vec![2, 3]);
    assert_eq!(local.ranks(), &[2, 3]);

    let mut s = sched(4);
    let free = one(&mut s, ProcReq::count(2).mode(LlMode::TASK), &all, vec![2, 3]);
    assert_eq!(free.ranks(), &[0, 1]);
}

#[test]
fn all_mode_spreads_to_every_candidate() {
    let mut s = sched(5);
    let all: Vec<usize> = (0..5).collect();
    let par = one(&mut s, ProcReq::inherit().mode(LlMode::ALL), &all, vec![3]);
    assert_eq!(par.n_proc(), 5);
    assert_eq!(par.ranks()[0], 3);
}

#[test]
fn tags_are_fresh_per_allocation() {
    let mut s = sched(2);
    let all = vec![0, 1];
    let a = one(&mut s, ProcReq::inherit(), &all, vec![]);
    let b = one(&mut s, ProcReq::inherit(), &all, vec![]);
    assert_eq!(a.tags(), [1, 2, 3]);
    assert_eq!(b.tags(), [4, 5, 6]);
}

#[test]
fn persisted_load_moves_later_runs_to_idle_ranks() {
    let mut s = sched(4);
    let all: Vec<usize> = (0..4).collect();
    let first = one(&mut s, ProcReq::count(2), &all, vec![]);
    s.finish_run();
    let second = one(&mut s, ProcReq::count(2), &all, vec![]);
    assert_eq!(first.ranks(), &[0, 1]);
    assert_eq!(second.ranks(), &[2, 3]);
}

#[test]
fn load_resets_without_persistence() {
    let cfg = RunConfig { persist_load: false, ..RunConfig::default() };
    let mut s = Scheduler::new(4, 0, &cfg);
    let all: Vec<usize> = (0..4).collect();
    one(&mut s, ProcReq::count(2), &all, vec![]);
    s.finish_run();
    let second = one(&mut s, ProcReq::count(2), &all, vec![]);
    assert_eq!(second.ranks(), &[0, 1]);
    assert!(s.loads().iter().all(|(load, _)| load[1] == 0));
}

#[test]
fn run_request_limits_candidates() {
    let mut s = sched(6);
    let cur_run = s.resolve_run(&ProcReq::count(3));
    assert_eq!(cur_run, vec![0, 1, 2]);
    let root = one(&mut s, ProcReq::inherit(), &cur_run, vec![]);
    assert_eq!(root.ranks(), &[0, 1, 2]);
}

#[test]
fn every_rank_computes_the_same_assignment() {
    let all: Vec<usize> = (0..5).collect();
    let plans: Vec<Vec<Vec<usize>>> = (0..5)
        .map(|rank| {
            let mut s = Scheduler::new(5, rank, &RunConfig::default());
            let groups = vec![vec![ProcReq::inherit(), ProcReq::count(2)]];
            let roots = s.assign(&groups, &all, &[vec![]]);
            let tasks = s.assign(
                &[vec![ProcReq::inherit(), ProcReq::ratio(0.4)]],
                &all,
                &[roots[0][0].ranks().to_vec()],
            );
            roots
                .into_iter()
                .chain(tasks)
                .flatten()
                .map(|p| p.ranks().to_vec())
                .collect()
        })
        .collect();
    assert!(plans.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn par_knows_position_of_current_rank() {
    let par = Par::new(vec![4, 2, 7], [1, 2, 3], 2);
    assert!(par.in_range());
    assert_eq!(par.pos(), Some(1));
    assert_eq!(par.tag(2), 3);

    let outside = Par::new(vec![4, 7], [1, 2, 3], 2);
    assert!(!outside.in_range());
    assert_eq!(outside.pos(), None);
}

#[test]
fn proc_req_display_and_flags() {
    let req = ProcReq::ratio(0.5).mode(LlMode::TASK | LlMode::SHARD);
    assert!(req.is_task() && req.is_shard() && !req.is_all());
    assert_eq!(req.to_string(), "ratio(0.5)+task+shard");
    assert_eq!(ProcReq::from(3usize), ProcReq::count(3));
    assert_eq!(ProcReq::from(vec![1, 2]).size(), &ProcCount::Ranks(vec![1, 2]));
}
