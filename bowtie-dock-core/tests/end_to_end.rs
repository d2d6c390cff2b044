use bowtie_dock_core::engine::fake::EngineCall;
use bowtie_dock_core::*;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn touch(dir: &Path, names: &[&str]) {
    fs::create_dir_all(dir).expect("create dir");
    for name in names {
        fs::write(dir.join(name), b"").expect("write file");
    }
}

fn orchestrator(engine: &Arc<FakeEngine>) -> Arc<JobOrchestrator<FakeEngine>> {
    let lifecycle = LifecycleManager::new(engine.clone(), ImageRef::default()).with_poll_settings(PollSettings {
        interval: Duration::from_millis(1),
        max_wait: None,
    });
    Arc::new(JobOrchestrator::new(lifecycle, CommandBuilder::new(ContainerLayout::default())))
}

async fn collect(mut handle: JobHandle) -> (Vec<JobEvent>, JobResult) {
    let mut events = Vec::new();
    while let Some(event) = handle.next_event().await {
        events.push(event);
    }
    (events, handle.wait().await)
}

#[tokio::test]
async fn paired_job_with_image_present() {
    let tmp = TempDir::new().unwrap();
    let reads = tmp.path().join("reads");
    let index = tmp.path().join("index");
    touch(&reads, &["sampleA_R1.fq.gz", "sampleA_R2.fq.gz"]);
    touch(&index, &["idx.1.bt2", "idx.2.bt2"]);
    let reads = fs::canonicalize(&reads).unwrap();
    let index = fs::canonicalize(&index).unwrap();

    let engine = Arc::new(FakeEngine::new().with_image(&ImageRef::default()).with_run_polls(2));
    let handle = orchestrator(&engine).spawn(JobInputs::new(&reads, &index));
    let (events, result) = collect(handle).await;

    match &result {
        JobResult::Succeeded { output_dir, result_file, exit_code } => {
            assert_eq!(output_dir, &reads);
            assert_eq!(result_file, &index.join("result_test.sam"));
            assert_eq!(*exit_code, Some(0));
        }
        JobResult::Failed { reason } => panic!("job failed: {reason}"),
    }

    let commands = engine.created_commands();
    assert_eq!(commands.len(), 1);
    assert_eq!(
        commands[0],
        vec![
            "bash".to_string(),
            "-c".to_string(),
            "bowtie2 -x /data/index/idx -1 /data/fastq/sampleA_R1.fq.gz \
             -2 /data/fastq/sampleA_R2.fq.gz -S /data/index/result_test.sam"
                .to_string(),
        ]
    );

    let calls = engine.calls();
    let binds = calls.iter().find_map(|c| match c {
        EngineCall::Create { binds, .. } => Some(binds.clone()),
        _ => None,
    });
    assert_eq!(
        binds,
        Some(vec![
            format!("{}:/data/fastq", reads.display()),
            format!("{}:/data/index", index.display()),
        ])
    );
    assert_eq!(engine.count(|c| matches!(c, EngineCall::Pull(_))), 0);
    assert_eq!(engine.count(|c| matches!(c, EngineCall::Start(_))), 1);
    assert_eq!(engine.count(|c| matches!(c, EngineCall::Status(_))), 3);
    assert_eq!(engine.count(|c| matches!(c, EngineCall::Remove(_))), 1);
    assert!(engine.live_containers().is_empty());

    let states: Vec<JobState> = events
        .iter()
        .filter_map(|e| match e {
            JobEvent::State(s) => Some(*s),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        vec![
            JobState::Idle,
            JobState::ResolvingInputs,
            JobState::Running,
            JobState::Cleaning,
            JobState::Done,
        ]
    );
    assert!(events.iter().any(|e| matches!(e, JobEvent::ContainerStarted(_))));
}

#[tokio::test]
async fn missing_image_is_pulled_first() {
    let tmp = TempDir::new().unwrap();
    let reads = tmp.path().join("reads");
    let index = tmp.path().join("index");
    touch(&reads, &["a.fq", "b.fq"]);
    touch(&index, &["genome.1.bt2", "genome.rev.1.bt2"]);

    let engine = Arc::new(FakeEngine::new().with_pull_steps(vec![30, 60, 100]));
    let (events, result) = collect(orchestrator(&engine).spawn(JobInputs::new(&reads, &index))).await;
    assert!(result.is_success());

    let progress: Vec<u8> = events
        .iter()
        .filter_map(|e| match e {
            JobEvent::PullProgress(p) => Some(*p),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![30, 60, 100]);
    assert!(events.contains(&JobEvent::State(JobState::EnsuringImage)));

    // Pull completes before the container is created
    let calls = engine.calls();
    let pull = calls.iter().position(|c| matches!(c, EngineCall::Pull(_))).unwrap();
    let create = calls.iter().position(|c| matches!(c, EngineCall::Create { .. })).unwrap();
    assert!(pull < create);

    let cmd = &engine.created_commands()[0][2];
    assert!(cmd.contains("-U /data/fastq/a.fq,/data/fastq/b.fq"));
    assert!(cmd.contains("-x /data/index/genome"));
    assert!(!cmd.contains("-1 "));
}

#[tokio::test]
async fn unbalanced_pairs_never_touch_the_engine() {
    let tmp = TempDir::new().unwrap();
    let reads = tmp.path().join("reads");
    let index = tmp.path().join("index");
    touch(&reads, &["a_R1.fq", "b_R1.fq", "c_R1.fq", "a_R2.fq", "b_R2.fq"]);
    touch(&index, &["idx.1.bt2"]);

    let engine = Arc::new(FakeEngine::new().with_image(&ImageRef::default()));
    let (events, result) = collect(orchestrator(&engine).spawn(JobInputs::new(&reads, &index))).await;

    assert!(matches!(
        result.failure(),
        Some(JobError::Input(InputError::UnbalancedPairs { mate1: 3, mate2: 2 }))
    ));
    assert!(engine.calls().is_empty());
    assert!(!events.contains(&JobEvent::State(JobState::Cleaning)));
    assert_eq!(events.last(), Some(&JobEvent::State(JobState::Done)));
}

#[tokio::test]
async fn pull_failure_creates_no_container() {
    let tmp = TempDir::new().unwrap();
    let reads = tmp.path().join("reads");
    let index = tmp.path().join("index");
    touch(&reads, &["x_R1.fq", "x_R2.fq"]);
    touch(&index, &["idx.1.bt2"]);

    let engine = Arc::new(FakeEngine::new().with_pull_failure("manifest unknown"));
    let (_, result) = collect(orchestrator(&engine).spawn(JobInputs::new(&reads, &index))).await;

    assert!(matches!(
        result.failure(),
        Some(JobError::Lifecycle(LifecycleError::PullFailed { .. }))
    ));
    assert_eq!(engine.count(|c| matches!(c, EngineCall::Create { .. })), 0);
}

#[tokio::test]
async fn nonzero_exit_fails_but_still_cleans_up() {
    let tmp = TempDir::new().unwrap();
    let reads = tmp.path().join("reads");
    let index = tmp.path().join("index");
    touch(&reads, &["x_R1.fq", "x_R2.fq"]);
    touch(&index, &["idx.1.bt2"]);

    let engine = Arc::new(FakeEngine::new().with_image(&ImageRef::default()).with_exit_code(137));
    let (events, result) = collect(orchestrator(&engine).spawn(JobInputs::new(&reads, &index))).await;

    assert!(matches!(
        result.failure(),
        Some(JobError::Lifecycle(LifecycleError::NonZeroExit(137)))
    ));
    assert!(events.contains(&JobEvent::State(JobState::Cleaning)));
    assert!(engine.live_containers().is_empty());
}

#[tokio::test]
async fn creation_warning_fails_job() {
    let tmp = TempDir::new().unwrap();
    let reads = tmp.path().join("reads");
    let index = tmp.path().join("index");
    touch(&reads, &["x_R1.fq", "x_R2.fq"]);
    touch(&index, &["idx.1.bt2"]);

    let engine = Arc::new(
        FakeEngine::new()
            .with_image(&ImageRef::default())
            .with_create_warnings(vec!["kernel does not support swap limit".to_string()]),
    );
    let (_, result) = collect(orchestrator(&engine).spawn(JobInputs::new(&reads, &index))).await;

    assert!(matches!(
        result.failure(),
        Some(JobError::Lifecycle(LifecycleError::CreationWarning(_)))
    ));
    assert_eq!(engine.count(|c| matches!(c, EngineCall::Start(_))), 0);
    assert!(engine.live_containers().is_empty());
}

#[tokio::test]
async fn cancelled_job_removes_container() {
    let tmp = TempDir::new().unwrap();
    let reads = tmp.path().join("reads");
    let index = tmp.path().join("index");
    touch(&reads, &["x_R1.fq", "x_R2.fq"]);
    touch(&index, &["idx.1.bt2"]);

    let engine = Arc::new(FakeEngine::new().with_image(&ImageRef::default()).never_exits());
    let mut handle = orchestrator(&engine).spawn(JobInputs::new(&reads, &index));

    while let Some(event) = handle.next_event().await {
        if matches!(event, JobEvent::ContainerStarted(_)) {
            handle.cancel();
        }
    }
    let result = handle.wait().await;

    assert!(matches!(
        result.failure(),
        Some(JobError::Lifecycle(LifecycleError::Cancelled(_)))
    ));
    assert!(engine.live_containers().is_empty());
}

#[tokio::test]
async fn orchestrator_is_reusable_after_failure() {
    let tmp = TempDir::new().unwrap();
    let reads = tmp.path().join("reads");
    let index = tmp.path().join("index");
    touch(&reads, &[]);
    touch(&index, &["idx.1.bt2"]);

    let engine = Arc::new(FakeEngine::new().with_image(&ImageRef::default()));
    let orchestrator = orchestrator(&engine);
    let cancel = CancellationToken::new();

    let first = orchestrator.run_job(&JobInputs::new(&reads, &index), &EventSink::none(), &cancel).await;
    assert!(matches!(first.failure(), Some(JobError::Input(InputError::EmptyInput(_)))));

    touch(&reads, &["late_R1.fq", "late_R2.fq"]);
    let second = orchestrator.run_job(&JobInputs::new(&reads, &index), &EventSink::none(), &cancel).await;
    assert!(second.is_success());
}

#[tokio::test]
async fn relative_directories_are_bound_by_absolute_path() {
    let tmp = TempDir::new_in(".").unwrap();
    let relative = Path::new(".").join(tmp.path().file_name().unwrap());
    let reads = relative.join("reads");
    let index = relative.join("index");
    touch(&reads, &["s_R1.fq", "s_R2.fq"]);
    touch(&index, &["idx.1.bt2"]);

    let engine = Arc::new(FakeEngine::new().with_image(&ImageRef::default()));
    let (_, result) = collect(orchestrator(&engine).spawn(JobInputs::new(&reads, &index))).await;

    let output_dir = result.output_dir().expect("job succeeded");
    assert!(output_dir.is_absolute());
    assert_eq!(output_dir, fs::canonicalize(&reads).unwrap().as_path());

    let binds: Vec<String> = engine
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            EngineCall::Create { binds, .. } => Some(binds),
            _ => None,
        })
        .flatten()
        .collect();
    assert_eq!(binds.len(), 2);
    for bind in &binds {
        assert!(bind.starts_with('/'), "host path is not absolute: {bind}");
    }
}

#[tokio::test]
async fn cancel_during_pull_creates_no_container() {
    let tmp = TempDir::new().unwrap();
    let reads = tmp.path().join("reads");
    let index = tmp.path().join("index");
    touch(&reads, &["x_R1.fq", "x_R2.fq"]);
    touch(&index, &["idx.1.bt2"]);

    let engine = Arc::new(FakeEngine::new());
    let cancel = CancellationToken::new();
    let events = EventSink::none();
    let pulling = orchestrator(&engine);
    let job = JobInputs::new(&reads, &index);
    cancel.cancel();

    let result = pulling.run_job(&job, &events, &cancel).await;

    assert!(matches!(
        result.failure(),
        Some(JobError::Lifecycle(LifecycleError::CancelledBeforeStart))
    ));
    assert_eq!(engine.count(|c| matches!(c, EngineCall::Pull(_))), 1);
    assert_eq!(engine.count(|c| matches!(c, EngineCall::Create { .. })), 0);
}
