use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use helmsubst_build::credentials::{CredentialResolver, FileCredentialResolver, NoCredentials};
use helmsubst_build::pipeline::{
    ApplicationOutcome, BuildOptions, BuildPipeline, BuildReport, SkipReason,
};
use helmsubst_build::render::collect_manifests;
use helmsubst_build::staging::StagingStore;
use helmsubst_build::{PipelineError, StepError};
use helmsubst_core::{AmbientContext, RevisionKey};
use helmsubst_helm::{HelmClient, HelmCommand, HelmError, HelmExecutor};
use tempfile::TempDir;

/// Helm stand-in that reproduces the filesystem effects of `helm pull`
/// and echoes the values file from `helm template`.
#[derive(Default)]
struct FakeHelm {
    calls: Mutex<Vec<HelmCommand>>,
    failing_charts: HashSet<String>,
    charts_with_dependencies: HashSet<String>,
    /// Pull succeeds but leaves no chart directory behind.
    empty_pulls: HashSet<String>,
    /// Pull leaves a directory where the override values file goes.
    blocked_values: HashSet<String>,
    /// Releases whose `helm template` exits non-zero.
    failing_templates: HashSet<String>,
    /// Charts whose `helm dependency build` exits non-zero.
    failing_dependency_builds: HashSet<String>,
}

impl FakeHelm {
    fn calls(&self) -> Vec<HelmCommand> {
        self.calls.lock().unwrap().clone()
    }

    fn calls_for(&self, subcommand: &str) -> Vec<HelmCommand> {
        self.calls()
            .into_iter()
            .filter(|c| c.subcommand() == subcommand)
            .collect()
    }

    fn pull(&self, command: &HelmCommand) -> Result<String, HelmError> {
        let chart = &command.args[1];
        if !command.has_arg("--untar") {
            return Err(failure(command, "Error: expected --untar"));
        }
        if self.failing_charts.contains(chart) {
            return Err(HelmError::CommandFailed {
                args: command.args.clone(),
                stderr: format!("Error: chart \"{chart}\" not found"),
            });
        }

        let untar_dir = PathBuf::from(command.flag_value("--untardir").unwrap());
        std::fs::write(untar_dir.join(format!("{chart}-1.0.0.tgz")), "archive").unwrap();
        if self.empty_pulls.contains(chart) {
            return Ok(String::new());
        }

        let chart_dir = untar_dir.join(chart);
        std::fs::create_dir_all(chart_dir.join("templates")).unwrap();
        let mut chart_yaml = format!("apiVersion: v2\nname: {chart}\nversion: 1.0.0\n");
        if self.charts_with_dependencies.contains(chart) {
            chart_yaml.push_str(
                "dependencies:\n  - name: redis\n    version: 17.0.0\n    repository: https://charts.bitnami.com/bitnami\n",
            );
        }
        std::fs::write(chart_dir.join("Chart.yaml"), chart_yaml).unwrap();
        if self.blocked_values.contains(chart) {
            std::fs::create_dir(chart_dir.join("override.values.yaml")).unwrap();
        }
        Ok(String::new())
    }

    fn dependency(&self, command: &HelmCommand) -> Result<String, HelmError> {
        let chart_dir = command.current_dir.as_deref().unwrap();
        let chart = chart_dir.file_name().unwrap().to_string_lossy();
        if self.failing_dependency_builds.contains(chart.as_ref()) {
            return Err(failure(
                command,
                "Error: no repository definition for https://charts.bitnami.com/bitnami",
            ));
        }
        Ok(String::new())
    }

    fn template(&self, command: &HelmCommand) -> Result<String, HelmError> {
        let release = &command.args[1];
        if self.failing_templates.contains(release) {
            return Err(failure(command, "Error: template: demo/templates/cm.yaml: nil pointer"));
        }
        let chart_dir = Path::new(&command.args[2]);
        let namespace = command.flag_value("--namespace").unwrap_or("default");
        let values = command
            .flag_value("--values")
            .map(|p| std::fs::read_to_string(p).unwrap())
            .unwrap_or_default();
        let chart = chart_dir.file_name().unwrap().to_string_lossy();

        Ok(format!(
            "---\n# Source: {chart}/templates/configmap.yaml\napiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: {release}\n  namespace: {namespace}\ndata:\n  values: |\n    {}\n",
            values.trim_end().replace('\n', "\n    ")
        ))
    }
}

impl HelmExecutor for FakeHelm {
    async fn exec(&self, command: &HelmCommand) -> Result<String, HelmError> {
        self.calls.lock().unwrap().push(command.clone());
        match command.subcommand() {
            "pull" => self.pull(command),
            "template" => self.template(command),
            "dependency" => self.dependency(command),
            _ => Ok(String::new()),
        }
    }
}

fn failure(command: &HelmCommand, stderr: &str) -> HelmError {
    HelmError::CommandFailed {
        args: command.args.clone(),
        stderr: stderr.to_owned(),
    }
}

struct Fixture {
    _tmp: TempDir,
    source: PathBuf,
    repos: PathBuf,
    store: StagingStore,
}

impl Fixture {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("apps");
        let repos = tmp.path().join("helm-working-dir");
        let staging = tmp.path().join("staging");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::create_dir_all(&staging).unwrap();
        Self {
            _tmp: tmp,
            source,
            repos,
            store: StagingStore::new(staging),
        }
    }

    fn descriptor(&self, file: &str, content: &str) {
        std::fs::write(self.source.join(file), content).unwrap();
    }

    fn options(&self) -> BuildOptions {
        BuildOptions {
            source_dir: self.source.clone(),
            repository_config_dir: self.repos.clone(),
            reject_insecure_repositories: false,
        }
    }

    async fn run(
        &self,
        helm: FakeHelm,
        context: &AmbientContext,
        options: BuildOptions,
        key: &RevisionKey,
    ) -> (HelmClient<FakeHelm>, Result<BuildReport, PipelineError>) {
        self.run_with(helm, &NoCredentials, context, options, key)
            .await
    }

    async fn run_with<C: CredentialResolver>(
        &self,
        helm: FakeHelm,
        credentials: &C,
        context: &AmbientContext,
        options: BuildOptions,
        key: &RevisionKey,
    ) -> (HelmClient<FakeHelm>, Result<BuildReport, PipelineError>) {
        let client = HelmClient::with_executor(helm);
        let report = BuildPipeline::new(&client, &self.store, credentials, context, options)
            .run(key)
            .await;
        (client, report)
    }
}

fn app(name: &str, repo: &str, chart: &str, values: Option<&str>) -> String {
    let mut yaml = format!(
        "apiVersion: argoproj.io/v1alpha1\nkind: Application\nmetadata:\n  name: {name}\nspec:\n  project: default\n  source:\n    repoURL: {repo}\n    chart: {chart}\n    targetRevision: 1.0.0\n"
    );
    if let Some(values) = values {
        yaml.push_str("    helm:\n      values: |\n");
        for line in values.lines() {
            yaml.push_str(&format!("        {line}\n"));
        }
    }
    yaml
}

fn context(vars: &[(&str, &str)]) -> AmbientContext {
    AmbientContext::from_vars(vars.iter().copied())
}

fn key() -> RevisionKey {
    RevisionKey::new("app1", "rev123")
}

// ── Scenarios ──

#[tokio::test]
async fn round_trip_substitutes_values_and_renders() {
    let fx = Fixture::new();
    fx.descriptor(
        "app1.yaml",
        &app(
            "app1",
            "https://repo.example/charts",
            "demo",
            Some("env: #ENVIRONMENT#"),
        ),
    );
    let ctx = context(&[("ENVIRONMENT", "prod"), ("ARGOCD_APP_NAMESPACE", "argo-ns")]);

    let (_client, report) = fx.run(FakeHelm::default(), &ctx, fx.options(), &key()).await;
    let report = report.unwrap();

    assert!(report.is_success());
    assert_eq!(report.revision_dir, fx.store.root().join("app1-rev123"));
    let staged: Vec<_> = report.staged().collect();
    assert_eq!(staged.len(), 1);

    let manifests = collect_manifests(&fx.store, &key()).unwrap();
    assert_eq!(manifests.len(), 1);
    assert_eq!(
        manifests[0].path,
        fx.store.root().join("app1-rev123/app1/build.yaml")
    );
    let out = &manifests[0].content;
    assert!(out.contains("kind: ConfigMap"));
    assert!(out.contains("env: prod"));
    assert!(!out.contains("#ENVIRONMENT#"));
    // No destination namespace in the descriptor: ambient namespace applies.
    assert!(out.contains("namespace: argo-ns"));
}

#[tokio::test]
async fn helm_invocations_follow_pull_then_template() {
    let fx = Fixture::new();
    fx.descriptor(
        "app1.yaml",
        &app("app1", "https://repo.example/charts", "demo", Some("a: b")),
    );

    let (client, report) = fx
        .run(FakeHelm::default(), &context(&[]), fx.options(), &key())
        .await;
    assert!(report.unwrap().is_success());

    let calls = client.executor().calls();
    let subcommands: Vec<&str> = calls.iter().map(HelmCommand::subcommand).collect();
    assert_eq!(subcommands, ["pull", "template"]);

    let app_dir = fx.store.application_dir(&key(), "app1");
    assert_eq!(calls[0].flag_value("--untardir"), app_dir.to_str());
    assert_eq!(calls[0].flag_value("--version"), Some("1.0.0"));
    let values = app_dir.join("demo").join("override.values.yaml");
    assert_eq!(calls[1].flag_value("--values"), values.to_str());
    assert!(values.exists());
    assert!(!app_dir.join("demo-1.0.0.tgz").exists());
}

#[tokio::test]
async fn malformed_file_is_skipped_and_run_continues() {
    let fx = Fixture::new();
    fx.descriptor("a-broken.yaml", "metadata: [unclosed\n  :");
    fx.descriptor(
        "b-good.yaml",
        &app("good", "https://repo.example/charts", "demo", None),
    );
    fx.descriptor("c-configmap.yml", "apiVersion: v1\nkind: ConfigMap\ndata: {}\n");
    fx.descriptor("notes.txt", "not yaml at all: [");

    let (_client, report) = fx
        .run(FakeHelm::default(), &context(&[]), fx.options(), &key())
        .await;
    let report = report.unwrap();

    assert!(report.is_success());
    assert_eq!(report.staged().count(), 1);
    assert_eq!(report.skipped().count(), 2);
    assert!(report.skipped().all(|o| matches!(
        o,
        ApplicationOutcome::Skipped {
            reason: SkipReason::NotADescriptor { .. },
            name: None,
            ..
        }
    )));
    assert_eq!(collect_manifests(&fx.store, &key()).unwrap().len(), 1);
}

#[tokio::test]
async fn insecure_repository_is_skipped_without_helm_calls() {
    let fx = Fixture::new();
    fx.descriptor(
        "insecure.yaml",
        &app("insecure", "http://repo.example/charts", "demo", None),
    );

    let (client, report) = fx
        .run(FakeHelm::default(), &context(&[]), fx.options(), &key())
        .await;
    let report = report.unwrap();

    assert!(report.is_success());
    assert!(client.executor().calls().is_empty());
    assert!(matches!(
        &report.outcomes[0],
        ApplicationOutcome::Skipped {
            reason: SkipReason::InsecureRepository { url },
            ..
        } if url == "http://repo.example/charts"
    ));
    assert!(!fx.store.application_dir(&key(), "insecure").exists());
    assert!(collect_manifests(&fx.store, &key()).unwrap().is_empty());
}

#[tokio::test]
async fn insecure_repository_fails_when_policy_rejects() {
    let fx = Fixture::new();
    fx.descriptor(
        "insecure.yaml",
        &app("insecure", "http://repo.example/charts", "demo", None),
    );
    let options = BuildOptions {
        reject_insecure_repositories: true,
        ..fx.options()
    };

    let (_client, report) = fx.run(FakeHelm::default(), &context(&[]), options, &key()).await;
    let report = report.unwrap();

    assert!(!report.is_success());
    assert!(matches!(
        &report.outcomes[0],
        ApplicationOutcome::Failed {
            error: StepError::InsecureRepository { .. },
            ..
        }
    ));
}

#[tokio::test]
async fn failed_pull_does_not_stop_later_applications() {
    let fx = Fixture::new();
    fx.descriptor(
        "a.yaml",
        &app("broken", "https://repo.example/charts", "missing-chart", None),
    );
    fx.descriptor(
        "b.yaml",
        &app("works", "https://repo.example/charts", "demo", None),
    );
    let helm = FakeHelm {
        failing_charts: HashSet::from(["missing-chart".to_owned()]),
        ..FakeHelm::default()
    };

    let (_client, report) = fx.run(helm, &context(&[]), fx.options(), &key()).await;
    let report = report.unwrap();

    assert!(!report.is_success());
    assert_eq!(report.staged().count(), 1);
    match report.failed().next().unwrap() {
        ApplicationOutcome::Failed { name, error, .. } => {
            assert_eq!(name, "broken");
            assert!(matches!(error, StepError::Pull { .. }));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(!fx.store.artifact_path(&key(), "broken").exists());
    assert!(fx.store.artifact_path(&key(), "works").exists());
}

#[tokio::test]
async fn missing_chart_directory_after_pull_fails_application() {
    let fx = Fixture::new();
    fx.descriptor(
        "a.yaml",
        &app("ghost", "https://repo.example/charts", "ghost-chart", None),
    );
    let helm = FakeHelm {
        empty_pulls: HashSet::from(["ghost-chart".to_owned()]),
        ..FakeHelm::default()
    };

    let (_client, report) = fx.run(helm, &context(&[]), fx.options(), &key()).await;
    let report = report.unwrap();

    assert!(matches!(
        &report.outcomes[0],
        ApplicationOutcome::Failed {
            error: StepError::MissingChart(_),
            ..
        }
    ));
}

#[tokio::test]
async fn chart_with_dependencies_gets_repository_config() {
    let fx = Fixture::new();
    fx.descriptor(
        "umbrella.yaml",
        &app("umbrella", "https://repo.example/charts", "platform", None),
    );
    let helm = FakeHelm {
        charts_with_dependencies: HashSet::from(["platform".to_owned()]),
        ..FakeHelm::default()
    };

    let (client, report) = fx.run(helm, &context(&[]), fx.options(), &key()).await;
    let report = report.unwrap();
    assert!(report.is_success());

    let repo_config = fx.repos.join("umbrella.yaml");
    let content = std::fs::read_to_string(&repo_config).unwrap();
    assert!(content.contains("https://charts.bitnami.com/bitnami"));

    let deps = client.executor().calls_for("dependency");
    assert_eq!(deps.len(), 1);
    assert_eq!(
        deps[0].flag_value("--repository-config"),
        repo_config.to_str()
    );
    assert_eq!(
        deps[0].current_dir.as_deref(),
        Some(
            fx.store
                .application_dir(&key(), "umbrella")
                .join("platform")
                .as_path()
        )
    );
}

#[tokio::test]
async fn chart_without_dependencies_skips_dependency_build() {
    let fx = Fixture::new();
    fx.descriptor(
        "app1.yaml",
        &app("app1", "https://repo.example/charts", "demo", None),
    );

    let (client, report) = fx
        .run(FakeHelm::default(), &context(&[]), fx.options(), &key())
        .await;
    assert!(report.unwrap().is_success());

    let fake = client.executor();
    assert!(fake.calls_for("dependency").is_empty());
    assert_eq!(fake.calls_for("pull").len(), 1);
    assert_eq!(fake.calls_for("template").len(), 1);
    assert!(!fx.repos.join("app1.yaml").exists());
}

#[tokio::test]
async fn excluded_variables_never_reach_values() {
    let fx = Fixture::new();
    fx.descriptor(
        "app1.yaml",
        &app(
            "app1",
            "https://repo.example/charts",
            "demo",
            Some("token: #KUBERNETES_SERVICE_HOST#\nname: #ARGOCD_APP_NAME#"),
        ),
    );
    let ctx = context(&[
        ("KUBERNETES_SERVICE_HOST", "10.0.0.1"),
        ("ARGOCD_APP_NAME", "internal"),
    ]);

    let (_client, report) = fx.run(FakeHelm::default(), &ctx, fx.options(), &key()).await;
    assert!(report.unwrap().is_success());

    let out = &collect_manifests(&fx.store, &key()).unwrap()[0].content;
    assert!(out.contains("#KUBERNETES_SERVICE_HOST#"));
    assert!(out.contains("#ARGOCD_APP_NAME#"));
    assert!(!out.contains("10.0.0.1"));
}

#[tokio::test]
async fn duplicate_application_names_are_skipped() {
    let fx = Fixture::new();
    fx.descriptor("a.yaml", &app("same", "https://repo.example/charts", "demo", None));
    fx.descriptor("b.yaml", &app("same", "https://repo.example/charts", "other", None));

    let (_client, report) = fx
        .run(FakeHelm::default(), &context(&[]), fx.options(), &key())
        .await;
    let report = report.unwrap();

    assert_eq!(report.staged().count(), 1);
    assert!(matches!(
        &report.outcomes[1],
        ApplicationOutcome::Skipped {
            reason: SkipReason::DuplicateName { .. },
            ..
        }
    ));
}

#[tokio::test]
async fn rebuild_replaces_previous_pass() {
    let fx = Fixture::new();
    fx.descriptor("a.yaml", &app("first", "https://repo.example/charts", "demo", None));

    let (_c, report) = fx
        .run(FakeHelm::default(), &context(&[]), fx.options(), &key())
        .await;
    assert!(report.unwrap().is_success());

    std::fs::remove_file(fx.source.join("a.yaml")).unwrap();
    fx.descriptor("b.yaml", &app("second", "https://repo.example/charts", "demo", None));
    let (_c, report) = fx
        .run(FakeHelm::default(), &context(&[]), fx.options(), &key())
        .await;
    assert!(report.unwrap().is_success());

    let manifests = collect_manifests(&fx.store, &key()).unwrap();
    assert_eq!(manifests.len(), 1);
    assert!(manifests[0].content.contains("name: second"));
}

#[tokio::test]
async fn render_under_other_revision_sees_nothing() {
    let fx = Fixture::new();
    fx.descriptor("a.yaml", &app("web", "https://repo.example/charts", "demo", None));

    let (_c, report) = fx
        .run(FakeHelm::default(), &context(&[]), fx.options(), &key())
        .await;
    assert!(report.unwrap().is_success());

    let other = RevisionKey::new("app1", "rev999");
    assert!(collect_manifests(&fx.store, &other).is_err());
    assert_eq!(collect_manifests(&fx.store, &key()).unwrap().len(), 1);
}

#[tokio::test]
async fn missing_source_directory_aborts_run() {
    let fx = Fixture::new();
    let options = BuildOptions {
        source_dir: fx.source.join("does-not-exist"),
        ..fx.options()
    };

    let (_c, report) = fx.run(FakeHelm::default(), &context(&[]), options, &key()).await;

    assert!(matches!(report, Err(PipelineError::SourceRead { .. })));
    assert!(!fx.store.revision_dir(&key()).exists());
}

fn failed_step<'r>(report: &'r BuildReport, app: &str) -> &'r StepError {
    report
        .failed()
        .find_map(|o| match o {
            ApplicationOutcome::Failed { name, error, .. } if name == app => Some(error),
            _ => None,
        })
        .unwrap_or_else(|| panic!("{app} did not fail: {:?}", report.outcomes))
}

#[tokio::test]
async fn failed_template_leaves_no_artifact_and_run_continues() {
    let fx = Fixture::new();
    fx.descriptor("a.yaml", &app("broken", "https://repo.example/charts", "demo", None));
    fx.descriptor("b.yaml", &app("works", "https://repo.example/charts", "demo", None));
    let helm = FakeHelm {
        failing_templates: HashSet::from(["broken".to_owned()]),
        ..FakeHelm::default()
    };

    let (_client, report) = fx.run(helm, &context(&[]), fx.options(), &key()).await;
    let report = report.unwrap();

    assert!(!report.is_success());
    assert!(matches!(
        failed_step(&report, "broken"),
        StepError::Template {
            source: HelmError::CommandFailed { .. }
        }
    ));
    assert!(!fx.store.artifact_path(&key(), "broken").exists());
    assert!(fx.store.artifact_path(&key(), "works").exists());
    assert_eq!(collect_manifests(&fx.store, &key()).unwrap().len(), 1);
}

#[tokio::test]
async fn failed_dependency_build_stops_only_that_application() {
    let fx = Fixture::new();
    fx.descriptor("a.yaml", &app("umbrella", "https://repo.example/charts", "platform", None));
    fx.descriptor("b.yaml", &app("works", "https://repo.example/charts", "demo", None));
    let helm = FakeHelm {
        charts_with_dependencies: HashSet::from(["platform".to_owned()]),
        failing_dependency_builds: HashSet::from(["platform".to_owned()]),
        ..FakeHelm::default()
    };

    let (client, report) = fx.run(helm, &context(&[]), fx.options(), &key()).await;
    let report = report.unwrap();

    assert!(matches!(
        failed_step(&report, "umbrella"),
        StepError::DependencyBuild { .. }
    ));
    assert!(!fx.store.artifact_path(&key(), "umbrella").exists());
    assert!(fx.store.artifact_path(&key(), "works").exists());
    // Template never runs for the failed application.
    let templates = client.executor().calls_for("template");
    assert_eq!(templates.len(), 1);
    assert_eq!(templates[0].args[1], "works");
}

#[tokio::test]
async fn unreadable_credentials_fail_the_application() {
    let fx = Fixture::new();
    fx.descriptor("a.yaml", &app("umbrella", "https://repo.example/charts", "platform", None));
    let helm = FakeHelm {
        charts_with_dependencies: HashSet::from(["platform".to_owned()]),
        ..FakeHelm::default()
    };
    let credentials = FileCredentialResolver::new(
        fx.repos.join("missing/repositories.yaml"),
        vec!["https://charts.bitnami.com".to_owned()],
    );

    let (client, report) = fx
        .run_with(helm, &credentials, &context(&[]), fx.options(), &key())
        .await;
    let report = report.unwrap();

    assert!(matches!(
        failed_step(&report, "umbrella"),
        StepError::Credentials { .. }
    ));
    assert!(client.executor().calls_for("dependency").is_empty());
    assert!(!fx.store.artifact_path(&key(), "umbrella").exists());
}

#[tokio::test]
async fn unwritable_values_file_fails_the_application() {
    let fx = Fixture::new();
    fx.descriptor(
        "a.yaml",
        &app("app1", "https://repo.example/charts", "demo", Some("env: #ENVIRONMENT#")),
    );
    let helm = FakeHelm {
        blocked_values: HashSet::from(["demo".to_owned()]),
        ..FakeHelm::default()
    };

    let (client, report) = fx.run(helm, &context(&[]), fx.options(), &key()).await;
    let report = report.unwrap();

    assert!(matches!(
        failed_step(&report, "app1"),
        StepError::ValuesWrite { .. }
    ));
    assert!(client.executor().calls_for("template").is_empty());
}

#[tokio::test]
async fn chart_name_outside_staging_dir_is_skipped() {
    let fx = Fixture::new();
    fx.descriptor("a.yaml", &app("escape", "https://repo.example/charts", "../x", None));

    let (client, report) = fx
        .run(FakeHelm::default(), &context(&[]), fx.options(), &key())
        .await;
    let report = report.unwrap();

    assert!(report.is_success());
    assert!(matches!(
        &report.outcomes[0],
        ApplicationOutcome::Skipped {
            reason: SkipReason::InvalidChartName { chart },
            ..
        } if chart == "../x"
    ));
    assert!(client.executor().calls().is_empty());
    assert!(!fx.store.application_dir(&key(), "escape").exists());
}
