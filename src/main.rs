/*!
 * supervise - Main Entry Point
 *
 * Runs PROGRAM ARGS..., forwards termination signals to it and relaunches
 * it when it dies:
 * - killed by a stop signal (INT/TERM by default): exit
 * - killed by any other signal: relaunch immediately
 * - exited non-zero: relaunch after the failure delay
 * - exited zero: exit
 */

use clap::Parser;
use proc_supervisor::{
    fatal, init_tracing, ChildSlot, ExecSpawner, LauncherConfig, SignalBridge, Supervisor,
};
use std::sync::Arc;
use tracing::info;

fn main() {
    init_tracing();
    let config = LauncherConfig::parse();

    // Forwarding target, updated by the supervisor on every relaunch
    let current_child = Arc::new(ChildSlot::new());

    let mut bridge = SignalBridge::new().unwrap_or_else(|e| fatal("signal bridge setup", e));
    let forward_to = Arc::clone(&current_child);
    bridge.set_handler(move |signo| {
        forward_to.forward(signo);
    });
    for &signal in &config.forward {
        if let Err(e) = bridge.add_signal(signal) {
            fatal("signal forwarding setup", e);
        }
    }

    let spawner = ExecSpawner::new(config.program().clone(), config.args().to_vec())
        .with_death_signal(config.death_signal);
    let policy = config.policy();

    let mut supervisor = Supervisor::builder()
        .with_spawn_routine(move || spawner.spawn())
        .with_child_slot(Arc::clone(&current_child))
        .with_log(|line| info!(target: "supervise::child", "{}", line))
        .with_restart_check(move |status| {
            let restart = policy.should_restart(status);
            if restart {
                if let Some(delay) = policy.restart_delay(status) {
                    info!(delay_secs = delay.as_secs_f64(), "Delaying relaunch of failed child");
                    std::thread::sleep(delay);
                }
            }
            restart
        })
        .build();

    info!(
        program = %config.program().to_string_lossy(),
        forwarded = ?config.forward,
        "Supervising"
    );
    let code = supervisor
        .start()
        .unwrap_or_else(|e| fatal("supervision failed", e));

    drop(bridge);
    info!(code = code, "Supervision finished");
    std::process::exit(code);
}
