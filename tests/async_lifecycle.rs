//! End-to-end lifecycle tests through the public `ShellRunner` API

#![cfg(unix)]

mod common;

use std::collections::HashSet;
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

use shellrun::config::load_config;
use shellrun::{
    AsyncState, CommandResult, OutputCallback, OutputStream, ShellKind, ShellRunner, SubmitError,
};

use common::{canonical, create_config_file, eventually, skip_without, SAMPLE_CONFIG};

#[test]
fn ids_are_unique_across_runners() {
    let first = ShellRunner::new().unwrap();
    let second = ShellRunner::new().unwrap();

    let mut seen = HashSet::new();
    for runner in [&first, &second, &first, &second] {
        let id = runner
            .execute_async("true", ShellKind::PosixShell, 5_000, None)
            .unwrap();
        assert!(id >= 1);
        assert!(seen.insert(id), "id {} reused", id);
    }
}

#[test]
fn status_converges_and_result_matches_sync() {
    let runner = ShellRunner::new().unwrap();
    let cases = [
        ("echo ok", AsyncState::Completed),
        ("echo bad >&2; exit 9", AsyncState::Failed),
        ("sleep 3", AsyncState::TimedOut),
    ];

    for (command, expected) in cases {
        let sync = runner.execute_sync(command, ShellKind::PosixShell, 300);
        let id = runner
            .execute_async(command, ShellKind::PosixShell, 300, None)
            .unwrap();

        assert!(
            eventually(Duration::from_secs(10), || runner.get_async_status(id) == expected),
            "{} never reached {}",
            command,
            expected
        );

        let result = runner.get_async_result(id);
        assert_eq!(result.exit_code, sync.exit_code, "{}", command);
        assert_eq!(result.output, sync.output, "{}", command);
        assert_eq!(result.timed_out, sync.timed_out, "{}", command);
    }
}

#[test]
fn get_async_result_blocks_until_terminal() {
    let runner = ShellRunner::new().unwrap();
    let started = Instant::now();
    let id = runner
        .execute_async("sleep 0.3; echo late", ShellKind::PosixShell, 5_000, None)
        .unwrap();

    let result = runner.get_async_result(id);

    assert!(started.elapsed() >= Duration::from_millis(250));
    assert_eq!(result.output.trim(), "late");
    assert_eq!(runner.get_async_status(id), AsyncState::Completed);
}

#[test]
fn terminate_stops_the_process() {
    let runner = ShellRunner::new().unwrap();
    let id = runner
        .execute_async("sleep 30", ShellKind::PosixShell, 60_000, None)
        .unwrap();

    assert!(runner.terminate_async(id));
    assert_eq!(runner.get_async_status(id), AsyncState::Cancelled);

    let started = Instant::now();
    assert_eq!(runner.get_async_result(id), CommandResult::default());
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!runner.terminate_async(id));
}

#[test]
fn callback_sees_each_stream_once() {
    let runner = ShellRunner::new().unwrap();
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let callback: OutputCallback = Box::new(move |stream, text| {
        let _ = tx.lock().unwrap().send((stream, text.to_string()));
    });

    let id = runner
        .execute_async(
            "echo to-out; echo to-err >&2; exit 1",
            ShellKind::PosixShell,
            5_000,
            Some(callback),
        )
        .unwrap();
    runner.get_async_result(id);

    let mut received = Vec::new();
    while let Ok(item) = rx.recv_timeout(Duration::from_secs(2)) {
        received.push(item);
    }

    assert_eq!(received.len(), 2);
    assert_eq!(received[0].0, OutputStream::Stdout);
    assert_eq!(received[0].1.trim(), "to-out");
    assert_eq!(received[1].0, OutputStream::Stderr);
    assert_eq!(received[1].1.trim(), "to-err");
}

#[test]
fn callback_skips_empty_output() {
    let runner = ShellRunner::new().unwrap();
    let calls = Arc::new(Mutex::new(0usize));
    let callback: OutputCallback = {
        let calls = Arc::clone(&calls);
        Box::new(move |_, _| *calls.lock().unwrap() += 1)
    };

    let id = runner
        .execute_async("true", ShellKind::PosixShell, 5_000, Some(callback))
        .unwrap();
    runner.get_async_result(id);
    std::thread::sleep(Duration::from_millis(100));

    assert_eq!(*calls.lock().unwrap(), 0);
}

#[test]
fn context_changes_apply_to_later_submissions_only() {
    let dir = tempfile::TempDir::new().unwrap();
    let runner = ShellRunner::new().unwrap();

    let before = runner
        .execute_async("sleep 0.2; pwd", ShellKind::PosixShell, 5_000, None)
        .unwrap();
    runner.set_working_directory(dir.path());
    let after = runner
        .execute_async("pwd", ShellKind::PosixShell, 5_000, None)
        .unwrap();

    let before_dir = runner.get_async_result(before).output.trim().to_string();
    let after_dir = runner.get_async_result(after).output.trim().to_string();

    assert_ne!(canonical(before_dir.as_ref()), canonical(dir.path()));
    assert_eq!(canonical(after_dir.as_ref()), canonical(dir.path()));
}

#[test]
fn default_runner_does_not_cap_submissions() {
    let runner = ShellRunner::new().unwrap();

    let ids: Vec<_> = (0..80)
        .map(|_| {
            runner
                .execute_async("sleep 0.5", ShellKind::PosixShell, 30_000, None)
                .unwrap()
        })
        .collect();

    for id in ids {
        assert_eq!(runner.get_async_result(id).exit_code, 0);
    }
}

#[test]
fn capacity_limit_from_config() {
    let (_dir, path) = create_config_file("[defaults]\nmax_concurrent = 1\n");
    let config = load_config(Some(&path)).unwrap();
    let runner = ShellRunner::from_config(&config).unwrap();

    let first = runner
        .execute_async("sleep 5", ShellKind::PosixShell, 60_000, None)
        .unwrap();
    let second = runner.execute_async("true", ShellKind::PosixShell, 60_000, None);

    assert_eq!(second, Err(SubmitError::AtCapacity { limit: 1 }));
    assert!(runner.terminate_async(first));
}

#[test]
fn config_context_reaches_commands() {
    let (_dir, path) = create_config_file(SAMPLE_CONFIG);
    let config = load_config(Some(&path)).unwrap();
    let runner = ShellRunner::from_config(&config).unwrap();

    assert_eq!(runner.default_shell(), ShellKind::PosixShell);
    assert_eq!(runner.default_timeout_ms(), 5_000);

    let result = runner.execute_sync("echo $SHELLRUN_SAMPLE", runner.default_shell(), 5_000);
    assert_eq!(result.output.trim(), "from-config");
}

#[test]
fn bash_expands_variables_in_raw_script() {
    if skip_without(ShellKind::Bash) {
        return;
    }

    let runner = ShellRunner::new().unwrap();
    runner.set_environment("SHELLRUN_EXPANDED", "value");

    let result = runner.execute_sync("echo \"$SHELLRUN_EXPANDED\"", ShellKind::Bash, 5_000);
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.output.trim(), "value");
}

#[test]
fn large_output_on_both_streams() {
    let runner = ShellRunner::new().unwrap();
    let id = runner
        .execute_async(
            "head -c 2000000 /dev/zero | tr '\\0' a; head -c 2000000 /dev/zero | tr '\\0' b >&2",
            ShellKind::PosixShell,
            30_000,
            None,
        )
        .unwrap();

    let result = runner.get_async_result(id);
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.output.len(), 2_000_000);
    assert_eq!(result.error.len(), 2_000_000);
}

#[test]
fn unknown_ids() {
    let runner = ShellRunner::new().unwrap();

    assert_eq!(runner.get_async_status(u64::MAX), AsyncState::Failed);
    assert_eq!(runner.get_async_result(u64::MAX), CommandResult::default());
    assert!(!runner.terminate_async(u64::MAX));
}
