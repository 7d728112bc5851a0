mod common;
use common::{FakeConfig, FakeInfra, FakeProber, FakeTunnel, Harness, TestProject};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use vmflow_ansible::Role;
use vmflow_pipeline::{
    Confirm, Entry, HealthReport, Observer, Outcome, PipelineError, RecordStore, Stage, exit_code,
};

struct Approve;

impl Confirm for Approve {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

/// Sends the interrupt once `stage` completes
struct InterruptAfter {
    stage: Stage,
    cancel: watch::Sender<bool>,
}

impl Observer for InterruptAfter {
    fn stage_completed(&self, stage: Stage, _note: &str) {
        if stage == self.stage {
            self.cancel.send(true).unwrap();
        }
    }
}

/// Interrupted while the operator still has the prompt open
struct SlowApprove {
    cancel: watch::Sender<bool>,
}

impl SlowApprove {
    const ANSWER_AFTER: Duration = Duration::from_secs(2);
}

impl Confirm for SlowApprove {
    fn confirm(&self, _prompt: &str) -> bool {
        self.cancel.send(true).unwrap();
        std::thread::sleep(Self::ANSWER_AFTER);
        true
    }
}

#[derive(Default)]
struct Recorder {
    started: Mutex<Vec<Stage>>,
    health: Mutex<Vec<String>>,
}

impl Observer for Recorder {
    fn stage_started(&self, stage: Stage) {
        self.started.lock().unwrap().push(stage);
    }

    fn health_report(&self, report: &HealthReport) {
        self.health.lock().unwrap().push(report.endpoint.clone());
    }
}

#[tokio::test]
async fn test_fresh_deploy_reaches_done() {
    let project = TestProject::new();
    let harness = Harness::new();
    let recorder = Arc::new(Recorder::default());
    let orchestrator = harness.orchestrator(&project).with_observer(recorder.clone());

    let report = orchestrator.run(Entry::Full).await;

    assert!(report.is_success(), "{:?}", report.outcome);
    assert_eq!(
        report.visited,
        vec![
            Stage::Init,
            Stage::PrereqChecked,
            Stage::SecretsResolved,
            Stage::InfraApplied,
            Stage::InventoryGenerated,
            Stage::TunnelUp,
            Stage::HostsReachable,
            Stage::ServicesDeployed,
            Stage::Verified,
            Stage::Done,
        ]
    );
    assert_eq!(harness.infra.calls(), vec!["plan", "apply"]);
    assert_eq!(harness.tunnel.bring_ups(), 1);
    assert_eq!(harness.config.runs().len(), 1);
    assert_eq!(recorder.started.lock().unwrap().len(), 8);
    assert_eq!(
        *recorder.health.lock().unwrap(),
        vec!["gateway", "app", "database", "storage", "monitoring"]
    );

    let workspace = project.workspace();
    let inventory = std::fs::read_to_string(workspace.inventory_path()).unwrap();
    assert!(inventory.contains("10.8.0.1"));

    let record = RecordStore::new(workspace.record_path())
        .load()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.addresses.public_ip.as_deref(), Some("203.0.113.10"));
    assert_eq!(record.addresses.wireguard_ip.as_deref(), Some("10.8.0.1"));
    assert!(!record.config.ssl_enabled);
    assert_eq!(record.roles, Role::ALL.to_vec());
}

#[tokio::test]
async fn test_generated_secrets_are_persisted_before_infra() {
    let project = TestProject::new();
    let harness = Harness::new();

    let report = harness.orchestrator(&project).run(Entry::Infra).await;
    assert!(report.is_done());

    let config = project.read_config();
    for key in ["DB_PASSWORD=", "STORAGE_SECRET_KEY=", "APP_SECRET_KEY="] {
        assert!(config.contains(key), "{} missing from {}", key, config);
    }

    // the vars handed to the config driver later use exactly these values
    let report = harness.orchestrator(&project).run(Entry::Full).await;
    assert!(report.is_success());
    assert!(report.skipped.contains(&Stage::SecretsResolved));
    assert_eq!(project.read_config(), config);

    let vars = &harness.config.runs()[0].vars;
    let db_password = vars["db_password"].as_str().unwrap();
    assert!(config.contains(&format!("DB_PASSWORD={}", db_password)));
}

#[tokio::test]
async fn test_domain_without_ssl_flag_stays_plain_http() {
    let project = TestProject::new();
    project.write_config("DOMAIN_NAME=example.org\n");
    let harness = Harness::new();

    let report = harness.orchestrator(&project).run(Entry::Full).await;
    assert!(report.is_success(), "{:?}", report.outcome);

    let vars = &harness.config.runs()[0].vars;
    assert_eq!(vars["ssl_enabled"], serde_json::Value::Bool(false));
    assert!(!vars.contains_key("acme_server"));
    assert!(!vars.contains_key("ssl_email"));

    let record = RecordStore::new(project.workspace().record_path())
        .load()
        .await
        .unwrap()
        .unwrap();
    assert!(!record.config.ssl_enabled);
    assert_eq!(record.config.ssl_email.as_deref(), Some("admin@example.org"));
    assert_eq!(
        record.addresses.gateway_url.as_deref(),
        Some("http://203.0.113.10")
    );
}

#[tokio::test]
async fn test_ssl_flag_without_domain_is_rejected() {
    let project = TestProject::new();
    project.write_config("ENABLE_SSL=true\n");
    let harness = Harness::new();

    let report = harness.orchestrator(&project).run(Entry::Full).await;

    let (stage, error) = report.error().unwrap();
    assert_eq!(stage, Stage::PrereqChecked);
    assert!(matches!(error, PipelineError::PrerequisiteMissing(_)));
    assert_eq!(report.exit_code(), exit_code::PREREQUISITE);
    assert!(harness.infra.calls().is_empty());
}

#[tokio::test]
async fn test_rerun_regenerates_deleted_inventory_without_apply() {
    let project = TestProject::new();
    let harness = Harness::new();
    let orchestrator = harness.orchestrator(&project);
    let applies = || harness.infra.calls().iter().filter(|c| **c == "apply").count();

    assert!(orchestrator.run(Entry::Infra).await.is_done());
    assert_eq!(applies(), 1);

    let inventory = project.workspace().inventory_path();
    std::fs::remove_file(&inventory).unwrap();

    let report = orchestrator.run(Entry::Full).await;

    assert!(report.is_success(), "{:?}", report.outcome);
    assert!(report.skipped.contains(&Stage::InfraApplied));
    assert!(!report.skipped.contains(&Stage::InventoryGenerated));
    assert!(inventory.is_file());
    assert_eq!(applies(), 1);
}

#[tokio::test]
async fn test_unchanged_inventory_is_not_rewritten() {
    let project = TestProject::new();
    let harness = Harness::new().with_infra(FakeInfra::converged());

    let first = harness.orchestrator(&project).run(Entry::Infra).await;
    assert!(!first.skipped.contains(&Stage::InventoryGenerated));

    let second = harness.orchestrator(&project).run(Entry::Infra).await;
    assert!(second.skipped.contains(&Stage::InventoryGenerated));
}

#[tokio::test]
async fn test_destroy_declined_changes_nothing() {
    let project = TestProject::new();
    let harness = Harness::new().with_infra(FakeInfra::converged());
    let orchestrator = harness.orchestrator(&project);
    assert!(orchestrator.run(Entry::Infra).await.is_done());

    let report = orchestrator
        .run(Entry::Destroy {
            auto_confirm: false,
        })
        .await;

    assert!(matches!(report.outcome, Outcome::Cancelled));
    assert_eq!(report.exit_code(), exit_code::CANCELLED);
    assert!(!report.entered(Stage::InfraDestroyed));
    assert!(!harness.infra.called("destroy"));
    assert!(project.workspace().inventory_path().is_file());
}

#[tokio::test]
async fn test_destroy_removes_artifacts_but_keeps_config() {
    let project = TestProject::new();
    let harness = Harness::new();
    let orchestrator = harness.orchestrator(&project).with_confirm(Arc::new(Approve));
    assert!(orchestrator.run(Entry::Full).await.is_success());

    let report = orchestrator
        .run(Entry::Destroy {
            auto_confirm: false,
        })
        .await;

    assert!(report.is_success(), "{:?}", report.outcome);
    assert!(harness.infra.called("destroy"));
    assert_eq!(harness.tunnel.teardowns(), 1);

    let workspace = project.workspace();
    for artifact in workspace.artifacts() {
        assert!(!artifact.exists(), "{} still exists", artifact.display());
    }
    assert!(workspace.config_path().is_file());
}

#[tokio::test]
async fn test_destroy_ignores_service_settings() {
    let project = TestProject::new();
    let harness = Harness::new().with_infra(FakeInfra::converged());
    let orchestrator = harness.orchestrator(&project);
    assert!(orchestrator.run(Entry::Infra).await.is_done());

    project.write_config("ENABLE_SSL=true\n");
    let report = orchestrator.run(Entry::Destroy { auto_confirm: true }).await;

    assert!(report.is_success(), "{:?}", report.outcome);
    assert!(harness.infra.called("destroy"));
}

#[tokio::test]
async fn test_interrupt_stops_before_next_stage() {
    let project = TestProject::new();
    let (cancel, rx) = watch::channel(false);
    let harness = Harness::new();
    let orchestrator = harness
        .orchestrator(&project)
        .with_observer(Arc::new(InterruptAfter {
            stage: Stage::InfraApplied,
            cancel,
        }))
        .with_cancel(rx);

    let report = orchestrator.run(Entry::Full).await;

    assert!(matches!(report.outcome, Outcome::Cancelled));
    assert_eq!(report.exit_code(), exit_code::CANCELLED);
    assert!(harness.infra.called("apply"));
    assert!(!report.entered(Stage::InventoryGenerated));
    assert_eq!(harness.config.pings(), 0);
}

#[tokio::test]
async fn test_interrupt_during_destroy_prompt() {
    let project = TestProject::new();
    let (cancel, rx) = watch::channel(false);
    let harness = Harness::new().with_infra(FakeInfra::converged());
    let orchestrator = harness
        .orchestrator(&project)
        .with_confirm(Arc::new(SlowApprove { cancel }))
        .with_cancel(rx);

    let started = Instant::now();
    let report = orchestrator
        .run(Entry::Destroy {
            auto_confirm: false,
        })
        .await;

    assert!(matches!(report.outcome, Outcome::Cancelled));
    assert!(started.elapsed() < SlowApprove::ANSWER_AFTER);
    assert!(!harness.infra.called("destroy"));
}

#[tokio::test]
async fn test_incomplete_destroy_still_cleans_up() {
    let project = TestProject::new();
    let harness = Harness::new().with_infra(FakeInfra::converged().stuck(&["sakura_disk.data"]));
    let orchestrator = harness.orchestrator(&project);
    assert!(orchestrator.run(Entry::Infra).await.is_done());

    let report = orchestrator.run(Entry::Destroy { auto_confirm: true }).await;

    let (stage, error) = report.error().unwrap();
    assert_eq!(stage, Stage::InfraDestroyed);
    match error {
        PipelineError::Destroy { remaining, .. } => {
            assert_eq!(remaining, &vec!["sakura_disk.data".to_string()]);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(report.exit_code(), exit_code::DESTROY);
    assert!(report.entered(Stage::ArtifactsRemoved));
    assert!(!project.workspace().inventory_path().exists());
}

#[tokio::test]
async fn test_unreachable_host_stops_before_configuration() {
    let project = TestProject::new();
    let harness = Harness::new().with_config(FakeConfig::unreachable(&["vmflow"]));

    let report = harness.orchestrator(&project).run(Entry::Full).await;

    let (stage, error) = report.error().unwrap();
    assert_eq!(stage, Stage::HostsReachable);
    assert!(matches!(error, PipelineError::Connectivity { hosts, .. } if hosts == &vec!["vmflow".to_string()]));
    assert_eq!(report.exit_code(), exit_code::CONNECTIVITY);
    assert!(harness.config.runs().is_empty());
    assert!(!report.entered(Stage::ServicesDeployed));
}

#[tokio::test]
async fn test_single_role_deploy() {
    let project = TestProject::new();
    let harness = Harness::new().with_infra(FakeInfra::converged());

    let report = harness
        .orchestrator(&project)
        .run(Entry::Services {
            role: Some(Role::Database),
            assume_ready: false,
        })
        .await;

    assert!(report.is_success(), "{:?}", report.outcome);
    assert!(!report.entered(Stage::InfraApplied));
    assert!(!report.entered(Stage::Verified));
    assert_eq!(harness.tunnel.bring_ups(), 1);

    let runs = harness.config.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].role, Some(Role::Database));

    let record = RecordStore::new(project.workspace().record_path())
        .load()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.roles, vec![Role::Database]);
}

#[tokio::test]
async fn test_services_keep_a_running_tunnel() {
    let project = TestProject::new();
    let harness = Harness::new()
        .with_infra(FakeInfra::converged())
        .with_tunnel(FakeTunnel::already_up());

    let report = harness
        .orchestrator(&project)
        .run(Entry::Services {
            role: None,
            assume_ready: false,
        })
        .await;

    assert!(report.is_success(), "{:?}", report.outcome);
    assert!(report.skipped.contains(&Stage::TunnelUp));
    assert_eq!(harness.tunnel.bring_ups(), 0);
}

#[tokio::test]
async fn test_assume_ready_requires_inventory() {
    let project = TestProject::new();
    let harness = Harness::new().with_infra(FakeInfra::converged());
    let orchestrator = harness.orchestrator(&project);
    let entry = Entry::Services {
        role: Some(Role::App),
        assume_ready: true,
    };

    let report = orchestrator.run(entry).await;
    assert_eq!(report.error().unwrap().0, Stage::PrereqChecked);
    assert_eq!(report.exit_code(), exit_code::PREREQUISITE);

    assert!(orchestrator.run(Entry::Infra).await.is_done());
    let report = orchestrator.run(entry).await;
    assert!(report.is_success(), "{:?}", report.outcome);
    assert!(!report.entered(Stage::TunnelUp));
    assert_eq!(harness.tunnel.bring_ups(), 0);
}

#[tokio::test]
async fn test_unhealthy_required_endpoint_fails_verification() {
    let project = TestProject::new();
    let harness = Harness::new().with_prober(FakeProber::failing(&[":5432"]));

    let report = harness.orchestrator(&project).run(Entry::Full).await;

    // the pipeline completes; health decides the exit code
    assert!(report.is_done());
    assert!(!report.is_success());
    assert_eq!(report.exit_code(), exit_code::VERIFICATION);
    let failure = report.verification_failure().unwrap();
    assert!(
        matches!(&failure, PipelineError::Verification { unhealthy } if unhealthy == &vec!["database".to_string()])
    );
    assert!(failure.remediation().unwrap().contains("vmflow health"));
}

#[tokio::test]
async fn test_health_counts_optional_endpoints() {
    let project = TestProject::new();
    let harness = Harness::new()
        .with_infra(FakeInfra::converged())
        .with_prober(FakeProber::failing(&[":3000"]));
    let orchestrator = harness.orchestrator(&project);

    let verify = orchestrator.run(Entry::Verify).await;
    assert_eq!(verify.exit_code(), exit_code::OK);

    let health = orchestrator.run(Entry::Health).await;
    assert_eq!(health.exit_code(), exit_code::VERIFICATION);
    assert_eq!(harness.prober.probed().len(), 10);
}

#[tokio::test]
async fn test_verify_without_infrastructure() {
    let project = TestProject::new();
    let harness = Harness::new();

    let report = harness.orchestrator(&project).run(Entry::Verify).await;

    assert_eq!(report.error().unwrap().0, Stage::Verified);
    assert_eq!(report.exit_code(), exit_code::PREREQUISITE);
    assert!(harness.prober.probed().is_empty());
}

#[tokio::test]
async fn test_addresses_from_live_outputs() {
    let project = TestProject::new();
    project.write_config("ENABLE_SSL=true\nDOMAIN_NAME=example.org\n");
    let harness = Harness::new().with_infra(FakeInfra::converged());

    let book = harness.orchestrator(&project).addresses().await.unwrap();

    assert_eq!(book.gateway_url.as_deref(), Some("https://example.org"));
    assert_eq!(book.tailscale_ip.as_deref(), Some("100.64.0.5"));
    let names: Vec<String> = book.dns_records().into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["example.org", "*.example.org"]);
}
