//! Runs `ImapsyncRunner` against small shell scripts standing in for imapsync.
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use mailmover_core::config::ToolConfig;
use mailmover_core::transfer::{
    ImapsyncRunner, TransferRequest, TransferRunner, ESTIMATED_BYTES_PER_TRANSFER,
};
use mailmover_core::{Endpoint, JobId, Secret, TransferError};
use tokio_util::sync::CancellationToken;

fn write_script(dir: &Path, body: &str) -> String {
    let path = dir.join("fake-imapsync");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().into_owned()
}

fn runner(dir: &Path, body: &str) -> ImapsyncRunner {
    ImapsyncRunner::new(ToolConfig {
        program: write_script(dir, body),
        tmp_root: dir.to_path_buf(),
        ..ToolConfig::default()
    })
}

fn endpoints() -> (Endpoint, Endpoint) {
    (
        Endpoint::new("imap.old.example", "alice@old.example", Secret::new("s1")),
        Endpoint::new("imap.new.example", "alice@new.example", Secret::new("s2")),
    )
}

#[tokio::test]
async fn streams_progress_and_reports_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let runner = runner(
        dir.path(),
        "echo 'Host1 Folder INBOX'\n\
         echo 'msg 3/12 copied'\n\
         echo 'ETA: 50.0% done'\n\
         echo 'Total bytes transferred  : 4096'\n\
         exit 0",
    );
    let (source, destination) = endpoints();
    let id = JobId::from("alice");
    let seen = Mutex::new(Vec::new());
    let progress = |p: f64| seen.lock().unwrap().push(p);

    let bytes = runner
        .run(
            TransferRequest {
                job_id: &id,
                source: &source,
                destination: &destination,
                attempt: 1,
            },
            &progress,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(bytes, 4096);
    assert_eq!(*seen.lock().unwrap(), vec![25.0, 50.0]);
    assert!(dir.path().join("tmp_alice").is_dir());
}

#[tokio::test]
async fn latin1_output_does_not_fail_the_transfer() {
    let dir = tempfile::tempdir().unwrap();
    let runner = runner(
        dir.path(),
        "printf 'Folder Entw\\374rfe 10%%\\n'\n\
         echo 'Total bytes transferred : 10'\n\
         exit 0",
    );
    let (source, destination) = endpoints();
    let id = JobId::from("latin1");
    let seen = Mutex::new(Vec::new());
    let progress = |p: f64| seen.lock().unwrap().push(p);

    let bytes = runner
        .run(
            TransferRequest {
                job_id: &id,
                source: &source,
                destination: &destination,
                attempt: 1,
            },
            &progress,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(bytes, 10);
    assert_eq!(*seen.lock().unwrap(), vec![10.0]);
}

#[tokio::test]
async fn silent_success_falls_back_to_estimate() {
    let dir = tempfile::tempdir().unwrap();
    let runner = runner(dir.path(), "exit 0");
    let (source, destination) = endpoints();
    let id = JobId::from("quiet");

    let bytes = runner
        .run(
            TransferRequest {
                job_id: &id,
                source: &source,
                destination: &destination,
                attempt: 1,
            },
            &|_: f64| {},
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(bytes, ESTIMATED_BYTES_PER_TRANSFER);
}

#[tokio::test]
async fn non_zero_exit_is_an_operation_failure() {
    let dir = tempfile::tempdir().unwrap();
    let runner = runner(dir.path(), "echo 'Host1: login failed'\nexit 11");
    let (source, destination) = endpoints();
    let id = JobId::from("denied");

    let err = runner
        .run(
            TransferRequest {
                job_id: &id,
                source: &source,
                destination: &destination,
                attempt: 2,
            },
            &|_: f64| {},
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(
        matches!(err, TransferError::OperationFailed { .. }),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn missing_program_fails_to_start() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ImapsyncRunner::new(ToolConfig {
        program: dir.path().join("no-such-tool").to_string_lossy().into_owned(),
        tmp_root: dir.path().to_path_buf(),
        ..ToolConfig::default()
    });
    let (source, destination) = endpoints();
    let id = JobId::from("nobody");

    let err = runner
        .run(
            TransferRequest {
                job_id: &id,
                source: &source,
                destination: &destination,
                attempt: 1,
            },
            &|_: f64| {},
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("failed to start"), "{err}");
}

#[tokio::test]
async fn cancellation_kills_the_process_promptly() {
    let dir = tempfile::tempdir().unwrap();
    let runner = runner(dir.path(), "echo '1/100'\nexec sleep 30");
    let (source, destination) = endpoints();
    let id = JobId::from("slow");
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        runner.run(
            TransferRequest {
                job_id: &id,
                source: &source,
                destination: &destination,
                attempt: 1,
            },
            &|_: f64| {},
            &cancel,
        ),
    )
    .await
    .expect("cancelled run returns well before the tool would exit");
    assert!(matches!(result, Err(TransferError::Cancelled)));
}

#[tokio::test]
async fn check_login_follows_exit_status() {
    let dir = tempfile::tempdir().unwrap();
    let (source, destination) = endpoints();
    let cancel = CancellationToken::new();

    let ok = runner(dir.path(), r#"[ "$1" = "--justlogin" ] || exit 3"#);
    ok.check_login(&source, &destination, &cancel).await.unwrap();

    let bad_dir = tempfile::tempdir().unwrap();
    let bad = runner(bad_dir.path(), "exit 1");
    let err = bad
        .check_login(&source, &destination, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::OperationFailed { .. }));
}
