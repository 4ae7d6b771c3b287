use std::io::Write;
use std::sync::Arc;

use budgetwatch::alerting::{CheckOutcome, Monitor};
use budgetwatch::config::{Config, StorageBackend};
use budgetwatch::models::{AlertKind, Budget, Category};
use budgetwatch::source::{BudgetSource, JsonFileSource};
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn file_backed_config(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.history.backend = StorageBackend::File;
    config.history.path = Some(dir.to_path_buf());
    config
}

fn budgets_file(budgets: &[Budget]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&serde_json::to_vec(budgets).unwrap()).unwrap();
    file
}

#[tokio::test]
async fn history_on_disk_suppresses_repeat_after_restart() {
    let data = tempfile::tempdir().unwrap();
    let config = file_backed_config(data.path());
    let budget = Budget::new("groceries", Category::Groceries, 300.0, 275.0);

    let monitor = Monitor::from_config(&config).await.unwrap();
    let outcome = monitor.start_monitoring(&budget).await.unwrap();
    assert_eq!(outcome.report().unwrap().scheduled.len(), 1);
    drop(monitor);

    let restarted = Monitor::from_config(&config).await.unwrap();
    assert!(restarted
        .history()
        .last_sent("groceries", AlertKind::Warning)
        .await
        .is_some());

    let outcome = restarted.start_monitoring(&budget).await.unwrap();
    let report = outcome.report().unwrap();
    assert!(report.scheduled.is_empty());
    assert_eq!(report.suppressed, vec![AlertKind::Warning]);
}

#[tokio::test]
async fn sweep_reads_fresh_snapshots_from_file() {
    let data = tempfile::tempdir().unwrap();
    let monitor = Monitor::from_config(&file_backed_config(data.path())).await.unwrap();

    let calm = [
        Budget::new("dining", Category::Dining, 200.0, 20.0),
        Budget::new("travel", Category::Travel, 1000.0, 10.0),
    ];
    for budget in &calm {
        let outcome = monitor.start_monitoring(budget).await.unwrap();
        assert!(outcome.report().unwrap().fired.is_empty());
    }

    // Dining goes over, travel disappears from the file
    let file = budgets_file(&[Budget::new("dining", Category::Dining, 200.0, 240.0)]);
    let source = JsonFileSource::new(file.path());
    assert!(source.fetch_budget("travel").await.unwrap().is_none());

    let summary = monitor.check_all_monitored_budgets(&source).await;

    assert_eq!(summary.checked, 2);
    assert_eq!(summary.evaluated, 1);
    assert_eq!(summary.missing, 1);
    assert_eq!(summary.scheduled, 1);
    assert!(monitor.history().last_sent("dining", AlertKind::Overrun).await.is_some());
}

#[tokio::test]
async fn webhook_receives_overrun_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hooks/budget"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = Config::default();
    config.delivery.webhook_url = Some(format!("{}/hooks/budget", server.uri()));

    let monitor = Arc::new(Monitor::from_config(&config).await.unwrap());
    let budget = Budget::new("rent", Category::Housing, 1500.0, 1600.0);

    monitor.start_monitoring(&budget).await.unwrap();
    let outcome = monitor.check_budget_status(&budget).await.unwrap();
    assert!(matches!(
        outcome,
        CheckOutcome::Evaluated(ref report) if report.suppressed == vec![AlertKind::Overrun]
    ));

    assert!(monitor.stop_monitoring("rent").await);
    assert!(matches!(
        monitor.check_budget_status(&budget).await.unwrap(),
        CheckOutcome::NotMonitored
    ));
}
