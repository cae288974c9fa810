//! Stress test orchestration
//!
//! Resolves the generator, brute and solve programs once, then drives a
//! fixed pool of workers. Each worker claims the next test number, runs
//! generator → brute → solve, compares the outputs and reports. The first
//! mismatch or pipeline error stops the whole pool; only that worker prints
//! its failure and, for a mismatch, saves the generated input.
//!
//! Every command runs in the request's base directory. After-scripts run
//! from [`PreparedRun::cleanup`], which also works for a cancelled run.
//!
//! All shared state (next test number, stop flag, console) sits behind one
//! mutex. Test numbers are claimed in order, but tests finish and report in
//! whatever order their processes complete.

use std::ops::RangeFrom;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::config::{CodeTemplate, Config};
use crate::console::Console;
use crate::constants::{FINISHED_BANNER, RANDOM_TOKEN_LENGTH};
use crate::error::{AppError, AppResult};
use crate::resolver::{self, ProgramDescriptor};
use crate::runner::{PipelineError, ProcessRunner, Role};
use crate::template::{substitute_task, substitute_test, ResolvedCommand, TemplateContext};
use crate::utils::{format_elapsed, generate_token};
use crate::verdict::{compare, Verdict};

/// What to stress test
#[derive(Debug, Clone)]
pub struct StressRequest {
    /// Task identifier substituted into the naming patterns
    pub task: String,
    /// Solve file pattern overriding the configured naming
    pub solve: Option<String>,
    /// Brute file pattern overriding the configured naming
    pub brute: Option<String>,
    /// Generator file pattern overriding the configured naming
    pub generator: Option<String>,
    /// Pool size overriding the configured one
    pub workers: Option<usize>,
    /// Directory patterns and the saved input are relative to
    pub base_dir: PathBuf,
}

impl StressRequest {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            solve: None,
            brute: None,
            generator: None,
            workers: None,
            base_dir: PathBuf::from("."),
        }
    }

    fn override_for(&self, role: Role) -> Option<&str> {
        match role {
            Role::Solve => self.solve.as_deref(),
            Role::Brute => self.brute.as_deref(),
            Role::Generator => self.generator.as_deref(),
        }
    }
}

/// How a stress run ended
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Brute and solve disagreed on the input saved at `input_path`.
    /// `input_path` is `None` when saving the input failed.
    Counterexample {
        test_id: u64,
        input_path: Option<PathBuf>,
    },
    /// A program could not be run or exited unsuccessfully
    PipelineFailure(PipelineError),
    /// A worker died without reporting
    Aborted(String),
}

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Tests whose outputs matched before the stop
    pub tests_passed: u64,
    pub elapsed: Duration,
}

/// A resolved program: its source file, template and run command
#[derive(Debug, Clone)]
struct Program {
    descriptor: ProgramDescriptor,
    template: CodeTemplate,
    context: TemplateContext,
    command: ResolvedCommand,
}

/// Run commands shared read-only by every worker
#[derive(Debug)]
struct Pipeline {
    generator: ResolvedCommand,
    brute: ResolvedCommand,
    solve: ResolvedCommand,
    /// Test-input naming with the task already substituted
    test_input_pattern: PathBuf,
}

impl Pipeline {
    fn input_path(&self, test_id: u64) -> PathBuf {
        PathBuf::from(substitute_test(
            &self.test_input_pattern.to_string_lossy(),
            test_id,
        ))
    }
}

/// State shared by all workers, guarded by a single mutex
pub(crate) struct RunState {
    ids: RangeFrom<u64>,
    stopped: bool,
    passed: u64,
    outcome: Option<RunOutcome>,
    console: Console,
}

impl RunState {
    pub(crate) fn new(console: Console) -> Self {
        Self {
            ids: 1..,
            stopped: false,
            passed: 0,
            outcome: None,
            console,
        }
    }

    /// Claim the next test number, or `None` once the run is stopped
    pub(crate) fn claim(&mut self) -> Option<u64> {
        if self.stopped {
            return None;
        }
        self.ids.next()
    }

    /// Flip the stop flag. Only the first caller gets `true`.
    pub(crate) fn commit_stop(&mut self) -> bool {
        if self.stopped {
            return false;
        }
        self.stopped = true;
        true
    }

    fn print_ok(&mut self, message: &str) {
        if let Err(e) = self.console.green(message) {
            tracing::warn!(error = %e, "Failed to write to console");
        }
    }

    fn print_failure(&mut self, message: &str) {
        if let Err(e) = self.console.red(message) {
            tracing::warn!(error = %e, "Failed to write to console");
        }
    }
}

/// Differential stress tester
pub struct StressTester {
    config: Config,
    request: StressRequest,
    runner: Arc<dyn ProcessRunner>,
}

impl StressTester {
    /// Create a new stress tester
    pub fn new(config: Config, request: StressRequest, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            config,
            request,
            runner,
        }
    }

    /// Resolve the three programs and run their before-scripts.
    ///
    /// Configuration, resolution and before-script problems are returned
    /// here, before any worker starts.
    pub async fn prepare(self, console: &mut Console) -> AppResult<PreparedRun> {
        self.config.validate()?;
        let workers = self.request.workers.unwrap_or(self.config.workers);
        if workers == 0 {
            return Err(AppError::Configuration(
                "the worker pool needs at least one worker".to_string(),
            ));
        }

        let random_token = generate_token(RANDOM_TOKEN_LENGTH);
        let programs = self.resolve_programs(&random_token).await?;

        for program in &programs {
            self.run_before_script(program, console).await?;
        }

        let pipeline = Arc::new(self.build_pipeline(&programs)?);

        Ok(PreparedRun {
            programs,
            pipeline,
            runner: self.runner,
            workers,
            task: self.request.task,
            base_dir: self.request.base_dir,
        })
    }

    /// Prepare, test until the first counterexample or pipeline failure,
    /// then run the after-scripts.
    ///
    /// Test generation is unbounded, so a run that never fails only ends by
    /// dropping the returned future; after-scripts are skipped then. Use
    /// [`StressTester::prepare`] and [`PreparedRun::cleanup`] when the run
    /// may be cancelled.
    pub async fn run(self, mut console: Console) -> AppResult<RunReport> {
        let prepared = self.prepare(&mut console).await?;
        let report = prepared.execute(console).await;
        prepared.cleanup().await;
        Ok(report)
    }

    /// Resolve solve, brute and generator, in that order
    async fn resolve_programs(&self, random_token: &str) -> AppResult<Vec<Program>> {
        let mut programs = Vec::with_capacity(Role::ALL.len());

        for role in Role::ALL {
            let pattern = match self.request.override_for(role) {
                Some(pattern) => pattern.to_string(),
                None => substitute_task(self.config.default_naming.for_role(role), &self.request.task),
            };
            let (path, template_index) =
                resolver::resolve(&pattern, &self.config.templates, &self.request.base_dir).await?;
            let descriptor = ProgramDescriptor::from_path(role, path, template_index)?;
            let template = self.config.templates[template_index].clone();
            let context = descriptor.template_context(&self.request.task, random_token);

            let command = ResolvedCommand::build(&template.script, &context)?
                .map(|command| command.in_dir(&self.request.base_dir))
                .ok_or_else(|| {
                    AppError::Configuration(format!(
                        "script of template `{}` is empty for {} ({}); check the config",
                        template.alias,
                        role,
                        descriptor.path.display()
                    ))
                })?;

            tracing::debug!(
                role = %role,
                file = %descriptor.path.display(),
                template = %template.alias,
                "Resolved program"
            );
            programs.push(Program {
                descriptor,
                template,
                context,
                command,
            });
        }

        Ok(programs)
    }

    fn build_pipeline(&self, programs: &[Program]) -> AppResult<Pipeline> {
        let command = |role: Role| {
            programs
                .iter()
                .find(|p| p.descriptor.role == role)
                .map(|p| p.command.clone())
                .ok_or_else(|| AppError::Configuration(format!("no program resolved for {}", role)))
        };
        let pattern = substitute_task(&self.config.default_naming.test_in, &self.request.task);

        Ok(Pipeline {
            generator: command(Role::Generator)?,
            brute: command(Role::Brute)?,
            solve: command(Role::Solve)?,
            test_input_pattern: self.request.base_dir.join(pattern),
        })
    }

    async fn run_before_script(&self, program: &Program, console: &mut Console) -> AppResult<()> {
        let Some(command) = ResolvedCommand::build(&program.template.before_script, &program.context)?
        else {
            return Ok(());
        };
        let command = command.in_dir(&self.request.base_dir);

        if let Err(e) = console.plain(command.line()) {
            tracing::warn!(error = %e, "Failed to write to console");
        }
        run_script(&command).await.map_err(|reason| AppError::BeforeScript {
            command: command.line().to_string(),
            reason,
        })
    }
}

/// Programs resolved and built, ready to be stress tested.
///
/// [`PreparedRun::cleanup`] must be called once testing is over, including
/// when [`PreparedRun::execute`] was cancelled.
pub struct PreparedRun {
    programs: Vec<Program>,
    pipeline: Arc<Pipeline>,
    runner: Arc<dyn ProcessRunner>,
    workers: usize,
    task: String,
    base_dir: PathBuf,
}

impl PreparedRun {
    /// Drive the worker pool until the first counterexample or pipeline failure
    pub async fn execute(&self, console: Console) -> RunReport {
        tracing::info!(
            task = %self.task,
            workers = self.workers,
            generator = %self.pipeline.generator,
            brute = %self.pipeline.brute,
            solve = %self.pipeline.solve,
            "Starting stress test"
        );

        let started = Instant::now();
        let state = Arc::new(Mutex::new(RunState::new(console)));

        let mut pool = JoinSet::new();
        for worker_id in 1..=self.workers {
            pool.spawn(worker(
                worker_id,
                self.pipeline.clone(),
                self.runner.clone(),
                state.clone(),
            ));
        }

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Stress worker terminated abnormally");
                let mut state = state.lock().await;
                if state.commit_stop() {
                    state.outcome = Some(RunOutcome::Aborted(e.to_string()));
                }
            }
        }
        let elapsed = started.elapsed();

        let mut state = state.lock().await;
        let tests_passed = state.passed;
        let summary = format!("{} tests passed in {}", tests_passed, format_elapsed(elapsed));
        if let Err(e) = state.console.plain(&summary) {
            tracing::warn!(error = %e, "Failed to write to console");
        }
        if let Err(e) = state.console.blue(FINISHED_BANNER) {
            tracing::warn!(error = %e, "Failed to write to console");
        }

        let outcome = state
            .outcome
            .take()
            .unwrap_or_else(|| RunOutcome::Aborted("workers stopped without a report".to_string()));
        tracing::info!(tests_passed, elapsed = %format_elapsed(elapsed), "Stress test finished");

        RunReport {
            outcome,
            tests_passed,
            elapsed,
        }
    }

    /// Run every after-script once, best-effort; failures are only logged
    pub async fn cleanup(&self) {
        for program in &self.programs {
            let command =
                match ResolvedCommand::build(&program.template.after_script, &program.context) {
                    Ok(Some(command)) => command.in_dir(&self.base_dir),
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::warn!(role = %program.descriptor.role, error = %e, "Invalid after script");
                        continue;
                    }
                };

            if let Err(reason) = run_script(&command).await {
                tracing::warn!(
                    role = %program.descriptor.role,
                    command = %command,
                    reason = %reason,
                    "After script failed"
                );
            }
        }
    }
}

/// Run a before/after script to completion with inherited stdio
async fn run_script(command: &ResolvedCommand) -> Result<(), String> {
    let mut process = Command::new(command.program());
    if let Some(dir) = command.dir() {
        process.current_dir(dir);
    }
    let status = process
        .args(command.args())
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .status()
        .await
        .map_err(|e| format!("failed to spawn process: {}", e))?;

    if status.success() {
        Ok(())
    } else {
        Err(crate::runner::ExitInfo::from_status(status).to_string())
    }
}

/// Generate one input and judge solve against brute on it.
///
/// Returns the generated input together with the verdict.
async fn run_test(
    pipeline: &Pipeline,
    runner: &dyn ProcessRunner,
    test_id: u64,
) -> Result<(Vec<u8>, Verdict), PipelineError> {
    let seed = test_id.to_string();
    let generated = runner
        .run(Role::Generator, test_id, &pipeline.generator, seed.as_bytes())
        .await?;
    let brute = runner
        .run(Role::Brute, test_id, &pipeline.brute, &generated.output)
        .await?;
    let solve = runner
        .run(Role::Solve, test_id, &pipeline.solve, &generated.output)
        .await?;

    let verdict = compare(test_id, &brute.output, &solve);
    Ok((generated.output, verdict))
}

async fn worker(
    worker_id: usize,
    pipeline: Arc<Pipeline>,
    runner: Arc<dyn ProcessRunner>,
    state: Arc<Mutex<RunState>>,
) {
    loop {
        let Some(test_id) = state.lock().await.claim() else {
            break;
        };

        match run_test(&pipeline, runner.as_ref(), test_id).await {
            Ok((_, verdict)) if verdict.correct => {
                let mut state = state.lock().await;
                if state.stopped {
                    tracing::debug!(worker_id, test_id, "Discarding result after stop");
                    break;
                }
                state.passed += 1;
                state.print_ok(&verdict.message);
            }
            Ok((input, verdict)) => {
                let mut state = state.lock().await;
                if !state.commit_stop() {
                    tracing::debug!(worker_id, test_id, "Discarding mismatch after stop");
                    break;
                }
                state.print_failure(&verdict.message);

                let path = pipeline.input_path(test_id);
                let saved = match tokio::fs::write(&path, &input).await {
                    Ok(()) => {
                        tracing::info!(test_id, path = %path.display(), "Saved counterexample input");
                        Some(path)
                    }
                    Err(e) => {
                        state.print_failure(&format!(
                            "Cannot save test input to {}: {}",
                            path.display(),
                            e
                        ));
                        None
                    }
                };
                state.outcome = Some(RunOutcome::Counterexample {
                    test_id,
                    input_path: saved,
                });
                break;
            }
            Err(e) => {
                let mut state = state.lock().await;
                if !state.commit_stop() {
                    tracing::debug!(worker_id, test_id, error = %e, "Discarding error after stop");
                    break;
                }
                tracing::error!(worker_id, test_id, role = %e.role, "Pipeline failed");
                state.print_failure(&e.to_string());
                state.outcome = Some(RunOutcome::PipelineFailure(e));
                break;
            }
        }
    }

    tracing::debug!(worker_id, "Worker finished");
}
