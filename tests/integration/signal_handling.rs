use std::time::Duration;

use meter_data_downloader::address::DeviceAddress;
use meter_data_downloader::cli::CliError;
use meter_data_downloader::downloader::{
    DownloadError, FetchExecutor, FetchJob, FetchStage, ProgressMode,
};
use meter_data_downloader::shutdown::ShutdownCoordinator;
use tempfile::TempDir;

use crate::common::ScriptedDevice;

#[tokio::test]
async fn shutdown_notifies_waiters() {
    let shutdown = ShutdownCoordinator::shared();
    let waiter = {
        let handle = shutdown.clone();
        tokio::spawn(async move {
            handle.wait_for_shutdown().await;
            true
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.request_shutdown();

    let result = tokio::time::timeout(Duration::from_secs(1), waiter).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn wait_after_request_returns_immediately() {
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();

    let result = tokio::time::timeout(Duration::from_secs(1), shutdown.wait_for_shutdown()).await;
    assert!(result.is_ok(), "wait_for_shutdown() blocked after shutdown was requested");
}

#[tokio::test]
async fn every_waiter_is_woken() {
    let shutdown = ShutdownCoordinator::shared();

    let waiters: Vec<_> = (0..10)
        .map(|_| {
            let handle = shutdown.clone();
            tokio::spawn(async move { handle.wait_for_shutdown().await })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(20)).await;
    shutdown.request_shutdown();
    // A second request is a no-op
    shutdown.request_shutdown();

    for waiter in waiters {
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }
}

#[tokio::test]
async fn shutdown_before_start_cancels_without_connecting() {
    let temp_dir = TempDir::new().unwrap();
    let device = ScriptedDevice::new(vec![]);
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();

    let job = FetchJob::new(DeviceAddress::parse("10.0.0.5").unwrap(), "1h").with_output(
        temp_dir
            .path()
            .join("[mac].log")
            .to_string_lossy()
            .into_owned(),
    );
    let failure = FetchExecutor::new(device.connector())
        .with_progress(ProgressMode::Off)
        .with_shutdown(shutdown)
        .execute(&job)
        .await
        .unwrap_err();

    assert_eq!(failure.error, DownloadError::Cancelled);
    assert_eq!(failure.stage, FetchStage::Connecting);
    assert_eq!(device.connects(), 0);
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);

    let cli_error = CliError::from(failure);
    assert_eq!(cli_error.exit_code(), 130);
}
