//! Start/stop of real detached processes.

use nix::sys::signal::{killpg, Signal};
use nix::unistd::{getpgid, Pid};
use service_provisioner::config::ServiceOverride;
use service_provisioner::service::{
    LifecycleManager, ProcessControl, ServiceDescriptor, ServiceState, StartOutcome, StopOutcome,
    SystemProcessControl,
};
use service_provisioner::{Config, Deployment, Error};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

/// A deployment whose services run `command` and whose runtime
/// environments exist.
fn deployment(dir: &TempDir, command: &str) -> Deployment {
    let mut config = Config::default();
    for name in ["sync", "backend", "frontend"] {
        config.services.insert(
            name.to_string(),
            ServiceOverride {
                command: Some(command.to_string()),
                ..Default::default()
            },
        );
    }
    let d = Deployment::from_config(config, dir.path());
    for service in d.services() {
        fs::create_dir_all(&service.runtime_env).unwrap();
    }
    d
}

async fn wait_until_dead(control: &SystemProcessControl, pid: u32) -> bool {
    for _ in 0..100 {
        if !control.is_alive(pid).await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

async fn wait_for_log(service: &ServiceDescriptor, needle: &str) -> String {
    let mut content = String::new();
    for _ in 0..100 {
        content = fs::read_to_string(&service.log_path).unwrap_or_default();
        if content.contains(needle) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    content
}

#[tokio::test]
async fn test_start_stop_round_trip() {
    let dir = TempDir::new().unwrap();
    let d = deployment(&dir, "echo backend-up; sleep 30");
    let backend = d.service("backend").unwrap();
    let manager = LifecycleManager::new(SystemProcessControl);

    let StartOutcome::Started { pid } = manager.start(&backend).await.unwrap() else {
        panic!("expected a fresh start");
    };
    assert_eq!(
        fs::read_to_string(&backend.pid_path).unwrap().trim(),
        pid.to_string()
    );
    assert!(wait_for_log(&backend, "backend-up").await.contains("backend-up"));

    let status = manager.status(&backend).await.unwrap();
    assert_eq!(status.state, ServiceState::Running);
    assert_eq!(status.pid, Some(pid));

    assert_eq!(
        manager.stop(&backend).await.unwrap(),
        StopOutcome::Stopped { pid }
    );
    assert!(!backend.pid_path.exists());
    assert!(backend.log_path.exists());
    assert!(wait_until_dead(manager.control(), pid).await);

    assert_eq!(manager.stop(&backend).await.unwrap(), StopOutcome::NotRunning);
}

#[tokio::test]
async fn test_second_start_does_not_launch_again() {
    let dir = TempDir::new().unwrap();
    let d = deployment(&dir, "sleep 30");
    let sync = d.service("sync").unwrap();
    let manager = LifecycleManager::new(SystemProcessControl);

    let StartOutcome::Started { pid } = manager.start(&sync).await.unwrap() else {
        panic!("expected a fresh start");
    };
    assert_eq!(
        manager.start(&sync).await.unwrap(),
        StartOutcome::AlreadyRunning { pid }
    );
    manager.stop(&sync).await.unwrap();
    assert!(wait_until_dead(manager.control(), pid).await);
}

#[tokio::test]
async fn test_killed_process_is_reported_stale() {
    let dir = TempDir::new().unwrap();
    let d = deployment(&dir, "sleep 30");
    let frontend = d.service("frontend").unwrap();
    let manager = LifecycleManager::new(SystemProcessControl);

    let StartOutcome::Started { pid } = manager.start(&frontend).await.unwrap() else {
        panic!("expected a fresh start");
    };

    let nix_pid = Pid::from_raw(pid as i32);
    let pgid = getpgid(Some(nix_pid)).unwrap();
    killpg(pgid, Signal::SIGKILL).unwrap();
    assert!(wait_until_dead(manager.control(), pid).await);
    assert!(frontend.pid_path.exists());

    assert_eq!(
        manager.status(&frontend).await.unwrap().state,
        ServiceState::Stale
    );
    assert_eq!(
        manager.stop(&frontend).await.unwrap(),
        StopOutcome::Stale { pid: Some(pid) }
    );
    assert!(!frontend.pid_path.exists());
}

#[tokio::test]
async fn test_missing_runtime_env_fails_one_service_only() {
    let dir = TempDir::new().unwrap();
    let d = deployment(&dir, "sleep 30");
    let services: Vec<_> = d
        .services()
        .into_iter()
        .filter(|s| s.name != "frontend")
        .collect();
    fs::remove_dir(&d.service("sync").unwrap().runtime_env).unwrap();
    let manager = LifecycleManager::new(SystemProcessControl);

    let report = manager.start_all(&services).await;
    assert_eq!(report.failed(), ["sync"]);
    assert!(matches!(
        report.results[0].result,
        Err(Error::DependencyMissing { .. })
    ));
    let Ok(StartOutcome::Started { pid }) = report.results[1].result else {
        panic!("backend should have started");
    };
    assert!(matches!(
        report.failure(),
        Some(Error::PartialBatchFailure { .. })
    ));

    let stopped = manager.stop_all(&services).await;
    assert!(!stopped.has_failures());
    assert!(wait_until_dead(manager.control(), pid).await);
}
