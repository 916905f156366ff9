/*!
 * Supervisor Tests
 * Supervision loop driven by scripted terminations
 */

use mockall::{mock, Sequence};
use nix::errno::Errno;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use proc_supervisor::{
    ChildSlot, ForkGuard, Pid, Reaper, Signal, Supervisor, SupervisorError, SupervisorResult,
    TerminationStatus,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

mock! {
    pub ScriptedReaper {}
    impl Reaper for ScriptedReaper {
        fn wait_any(&mut self) -> SupervisorResult<TerminationStatus>;
    }
}

const CHILD: i32 = 42;

fn exited(pid: i32, code: i32) -> TerminationStatus {
    TerminationStatus::Exited {
        pid: Pid::from_raw(pid),
        code,
    }
}

fn signaled(pid: i32, signal: Signal) -> TerminationStatus {
    TerminationStatus::Signaled {
        pid: Pid::from_raw(pid),
        signal,
        core_dumped: false,
    }
}

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

fn bump(counter: &Arc<AtomicUsize>) -> impl FnMut() + Send + 'static {
    let counter = Arc::clone(counter);
    move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

fn reaper_always(status: TerminationStatus) -> MockScriptedReaper {
    let mut reaper = MockScriptedReaper::new();
    reaper.expect_wait_any().returning(move || Ok(status));
    reaper
}

#[test]
fn test_single_cycle_returns_exit_code() {
    let prefork = counter();
    let prerestart = counter();
    let checks = counter();
    let check_count = Arc::clone(&checks);

    let mut supervisor = Supervisor::builder()
        .with_spawn_routine(|| Ok(Pid::from_raw(CHILD)))
        .with_reaper(reaper_always(exited(CHILD, 7)))
        .with_prefork(bump(&prefork))
        .with_prerestart(bump(&prerestart))
        .with_restart_check(move |_| {
            check_count.fetch_add(1, Ordering::SeqCst);
            false
        })
        .build();

    assert_eq!(supervisor.start().unwrap(), 7);
    assert_eq!(supervisor.cycles(), 1);
    assert_eq!(prefork.load(Ordering::SeqCst), 1);
    assert_eq!(prerestart.load(Ordering::SeqCst), 0);
    assert_eq!(checks.load(Ordering::SeqCst), 1);
}

#[test]
fn test_hook_counts_follow_restarts() {
    for restarts in 0..5usize {
        let prefork = counter();
        let prerestart = counter();
        let mut decisions = 0usize;

        let mut supervisor = Supervisor::builder()
            .with_spawn_routine(|| Ok(Pid::from_raw(CHILD)))
            .with_reaper(reaper_always(signaled(CHILD, Signal::SIGSEGV)))
            .with_prefork(bump(&prefork))
            .with_prerestart(bump(&prerestart))
            .with_restart_check(move |_| {
                decisions += 1;
                decisions <= restarts
            })
            .build();

        assert_eq!(supervisor.start().unwrap(), 0);
        assert_eq!(prefork.load(Ordering::SeqCst), restarts + 1);
        assert_eq!(prerestart.load(Ordering::SeqCst), restarts);
        assert_eq!(supervisor.cycles(), restarts as u64 + 1);
    }
}

#[test]
fn test_default_policy_restarts_only_on_signal() {
    let mut seq = Sequence::new();
    let mut reaper = MockScriptedReaper::new();
    reaper
        .expect_wait_any()
        .times(2)
        .in_sequence(&mut seq)
        .returning(|| Ok(signaled(CHILD, Signal::SIGKILL)));
    reaper
        .expect_wait_any()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(exited(CHILD, 3)));

    let prerestart = counter();
    let mut supervisor = Supervisor::builder()
        .with_spawn_routine(|| Ok(Pid::from_raw(CHILD)))
        .with_reaper(reaper)
        .with_prerestart(bump(&prerestart))
        .build();

    assert_eq!(supervisor.start().unwrap(), 3);
    assert_eq!(supervisor.cycles(), 3);
    assert_eq!(prerestart.load(Ordering::SeqCst), 2);
}

#[test]
fn test_restart_check_overrides_default() {
    let mut supervisor = Supervisor::builder()
        .with_spawn_routine(|| Ok(Pid::from_raw(CHILD)))
        .with_reaper(reaper_always(signaled(CHILD, Signal::SIGTERM)))
        .with_restart_check(|status| !status.signaled())
        .build();

    assert_eq!(supervisor.start().unwrap(), 0);
    assert_eq!(supervisor.cycles(), 1);
}

#[test]
fn test_unrelated_children_logged_and_skipped() {
    let mut seq = Sequence::new();
    let mut reaper = MockScriptedReaper::new();
    reaper
        .expect_wait_any()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(exited(99, 0)));
    reaper
        .expect_wait_any()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(signaled(100, Signal::SIGKILL)));
    reaper
        .expect_wait_any()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(exited(CHILD, 5)));

    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&lines);

    let mut supervisor = Supervisor::builder()
        .with_spawn_routine(|| Ok(Pid::from_raw(CHILD)))
        .with_reaper(reaper)
        .with_log(move |line| sink.lock().push(line.to_string()))
        .build();

    // Signaled stranger does not trigger the restart policy
    assert_eq!(supervisor.start().unwrap(), 5);
    assert_eq!(
        *lines.lock(),
        vec![
            "child exits: pid=99, signaled=false, signal=0, exited=true, status=0".to_string(),
            "child exits: pid=100, signaled=true, signal=9, exited=false, status=0".to_string(),
            "child exits: pid=42, signaled=false, signal=0, exited=true, status=5".to_string(),
        ]
    );
}

#[test]
fn test_postfork_and_child_slot() {
    let slot = Arc::new(ChildSlot::new());
    let observed = Arc::new(Mutex::new(Vec::new()));
    let during_wait = Arc::new(Mutex::new(Vec::new()));

    let mut next_pid = 500;
    let seen_by_reaper = Arc::clone(&during_wait);
    let reaper_slot = Arc::clone(&slot);
    let mut reaper = MockScriptedReaper::new();
    let mut reaped = 500;
    reaper.expect_wait_any().times(2).returning(move || {
        seen_by_reaper.lock().push(reaper_slot.get());
        let pid = reaped;
        reaped += 1;
        Ok(exited(pid, if pid == 500 { 1 } else { 0 }))
    });

    let postfork_seen = Arc::clone(&observed);
    let mut supervisor = Supervisor::builder()
        .with_spawn_routine(move || {
            let pid = Pid::from_raw(next_pid);
            next_pid += 1;
            Ok(pid)
        })
        .with_child_slot(Arc::clone(&slot))
        .with_reaper(reaper)
        .with_postfork(move |pid| postfork_seen.lock().push(pid))
        .with_restart_check(|status| status.exit_code() != 0)
        .build();

    assert_eq!(supervisor.start().unwrap(), 0);
    assert_eq!(*observed.lock(), vec![Pid::from_raw(500), Pid::from_raw(501)]);
    assert_eq!(
        *during_wait.lock(),
        vec![Some(Pid::from_raw(500)), Some(Pid::from_raw(501))]
    );
    // Reaped child is no longer a forwarding target
    assert_eq!(slot.get(), None);
    assert!(supervisor.child_slot().is_some());
}

#[test]
fn test_wait_failure_propagates() {
    let mut reaper = MockScriptedReaper::new();
    reaper
        .expect_wait_any()
        .returning(|| Err(SupervisorError::Wait(Errno::ECHILD)));

    let mut supervisor = Supervisor::builder()
        .with_spawn_routine(|| Ok(Pid::from_raw(CHILD)))
        .with_reaper(reaper)
        .build();

    assert!(matches!(
        supervisor.start(),
        Err(SupervisorError::Wait(Errno::ECHILD))
    ));
}

#[test]
fn test_spawn_failure_propagates() {
    let mut reaper = MockScriptedReaper::new();
    reaper.expect_wait_any().never();

    let prefork = counter();
    let mut supervisor = Supervisor::builder()
        .with_spawn_routine(|| Err(SupervisorError::Spawn(Errno::EAGAIN)))
        .with_reaper(reaper)
        .with_prefork(bump(&prefork))
        .build();

    assert!(matches!(
        supervisor.start(),
        Err(SupervisorError::Spawn(Errno::EAGAIN))
    ));
    assert_eq!(prefork.load(Ordering::SeqCst), 1);
}

#[test]
fn test_default_routine_refuses_multithreaded_fork() {
    let mut reaper = MockScriptedReaper::new();
    reaper.expect_wait_any().never();

    let mut supervisor = Supervisor::builder()
        .with_fork_guard(ForkGuard::with_probe(|| Ok(2)))
        .with_child_routine(|| 0)
        .with_reaper(reaper)
        .build();

    assert!(matches!(
        supervisor.start(),
        Err(SupervisorError::UnsafeFork { threads: 2 })
    ));
    assert_eq!(supervisor.cycles(), 0);
}

#[test]
fn test_builder_defaults() {
    let supervisor = Supervisor::builder().build();
    assert_eq!(supervisor.child_signal(), Signal::SIGTERM);
    assert_eq!(supervisor.cycles(), 0);
    assert!(supervisor.child_slot().is_none());

    let supervisor = Supervisor::builder()
        .with_child_signal(Signal::SIGKILL)
        .build();
    assert_eq!(supervisor.child_signal(), Signal::SIGKILL);
}
