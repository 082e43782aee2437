//! Strategies over the Jenkins client

use async_trait::async_trait;
use opskit_clients::jenkins::HealthReport;
use opskit_clients::JenkinsClient;
use opskit_core::{OpsError, OpsResult, Strategy, StrategyArgs, StrategyOutput};
use serde_json::json;
use std::path::PathBuf;
use tracing::{info, warn};

use super::{boxed, Built, Descriptor};
use crate::console_parser;
use crate::context::{Reporter, StrategyContext};

pub(crate) fn descriptors() -> Vec<Descriptor> {
    vec![
        Descriptor {
            name: "WhoAmI",
            summary: "Get info for the user executing the tool, handy to check Jenkins credentials",
            params: &[],
            build: build_whoami,
        },
        Descriptor {
            name: "ViewHealthReport",
            summary: "Get the health report of every job in view_name",
            params: &["view_name"],
            build: build_view_health_report,
        },
        Descriptor {
            name: "AllJobsInView",
            summary: "Get all jobs in view_name",
            params: &["view_name"],
            build: build_all_jobs_in_view,
        },
        Descriptor {
            name: "CloneJob",
            summary: "Clone job_name to cloned_name",
            params: &["job_name", "cloned_name"],
            build: build_clone_job,
        },
        Descriptor {
            name: "BuildJob",
            summary: "Build job_name",
            params: &["job_name"],
            build: build_build_job,
        },
        Descriptor {
            name: "JobInfo",
            summary: "Get job_name info",
            params: &["job_name"],
            build: build_job_info,
        },
        Descriptor {
            name: "JobHealthReport",
            summary: "Get job_name health report",
            params: &["job_name"],
            build: build_job_health_report,
        },
        Descriptor {
            name: "LastBuildConsoleOutput",
            summary: "Get the console output of the last build of job_name",
            params: &["job_name"],
            build: build_last_build_console,
        },
        Descriptor {
            name: "PullBuildArtifactsAndRobotReports",
            summary: "Find the artifact_job build triggered by job_name #build_number, download its \
                      artifacts and the upstream robot log and report into the output folder",
            params: &["job_name", "build_number", "artifact_job"],
            build: build_pull_artifacts_and_reports,
        },
        Descriptor {
            name: "PullBuildArtifacts",
            summary: "Download the artifacts, robot log and robot report of job_name #build_number",
            params: &["job_name", "build_number"],
            build: build_pull_artifacts,
        },
    ]
}

/// Health reports of the named jobs, skipping jobs without one
pub(crate) async fn jobs_health(jenkins: &JenkinsClient, jobs: &[String]) -> OpsResult<Vec<HealthReport>> {
    let mut reports = Vec::new();
    for name in jobs {
        match jenkins.health_report(name).await? {
            Some(report) => reports.push(report),
            None => info!(job = %name, "Job has no health report"),
        }
    }
    Ok(reports)
}

pub(crate) fn job_names(jobs: &[serde_json::Value]) -> Vec<String> {
    jobs.iter()
        .filter_map(|j| j.get("name").and_then(|n| n.as_str()))
        .map(str::to_string)
        .collect()
}

// ============================================================================
// WhoAmI
// ============================================================================

pub struct WhoAmI {
    jenkins: JenkinsClient,
}

#[async_trait]
impl Strategy for WhoAmI {
    async fn execute(&self) -> OpsResult<StrategyOutput> {
        StrategyOutput::json(&self.jenkins.user_details().await?)
    }
}

fn build_whoami(args: StrategyArgs, ctx: StrategyContext) -> Built {
    Box::pin(async move {
        args.finish()?;
        let jenkins = ctx.clients().jenkins().await?;
        boxed(WhoAmI { jenkins })
    })
}

// ============================================================================
// Views
// ============================================================================

pub struct ViewHealthReport {
    jenkins: JenkinsClient,
    view_name: String,
}

#[async_trait]
impl Strategy for ViewHealthReport {
    async fn execute(&self) -> OpsResult<StrategyOutput> {
        let jobs = job_names(&self.jenkins.jobs_in_view(&self.view_name).await?);
        StrategyOutput::json(&jobs_health(&self.jenkins, &jobs).await?)
    }
}

fn build_view_health_report(mut args: StrategyArgs, ctx: StrategyContext) -> Built {
    Box::pin(async move {
        let view_name = args.required("view_name")?;
        args.finish()?;
        let jenkins = ctx.clients().jenkins().await?;
        boxed(ViewHealthReport { jenkins, view_name })
    })
}

pub struct AllJobsInView {
    jenkins: JenkinsClient,
    view_name: String,
}

#[async_trait]
impl Strategy for AllJobsInView {
    async fn execute(&self) -> OpsResult<StrategyOutput> {
        StrategyOutput::json(&self.jenkins.jobs_in_view(&self.view_name).await?)
    }
}

fn build_all_jobs_in_view(mut args: StrategyArgs, ctx: StrategyContext) -> Built {
    Box::pin(async move {
        let view_name = args.required("view_name")?;
        args.finish()?;
        let jenkins = ctx.clients().jenkins().await?;
        boxed(AllJobsInView { jenkins, view_name })
    })
}

// ============================================================================
// Jobs
// ============================================================================

pub struct CloneJob {
    jenkins: JenkinsClient,
    job_name: String,
    cloned_name: String,
}

#[async_trait]
impl Strategy for CloneJob {
    async fn execute(&self) -> OpsResult<StrategyOutput> {
        self.jenkins.copy_job(&self.job_name, &self.cloned_name).await?;
        info!(from = %self.job_name, to = %self.cloned_name, "Job cloned");
        Ok(StrategyOutput::None)
    }
}

fn build_clone_job(mut args: StrategyArgs, ctx: StrategyContext) -> Built {
    Box::pin(async move {
        let job_name = args.required("job_name")?;
        let cloned_name = args.required("cloned_name")?;
        args.finish()?;
        let jenkins = ctx.clients().jenkins().await?;
        boxed(CloneJob {
            jenkins,
            job_name,
            cloned_name,
        })
    })
}

pub struct BuildJob {
    jenkins: JenkinsClient,
    job_name: String,
}

#[async_trait]
impl Strategy for BuildJob {
    async fn execute(&self) -> OpsResult<StrategyOutput> {
        let queue = self.jenkins.trigger_build(&self.job_name).await?;
        Ok(StrategyOutput::Json(json!({
            "job": self.job_name,
            "queue": queue,
        })))
    }
}

fn build_build_job(mut args: StrategyArgs, ctx: StrategyContext) -> Built {
    Box::pin(async move {
        let job_name = args.required("job_name")?;
        args.finish()?;
        let jenkins = ctx.clients().jenkins().await?;
        boxed(BuildJob { jenkins, job_name })
    })
}

pub struct JobInfo {
    jenkins: JenkinsClient,
    job_name: String,
}

#[async_trait]
impl Strategy for JobInfo {
    async fn execute(&self) -> OpsResult<StrategyOutput> {
        Ok(StrategyOutput::Json(self.jenkins.job_info(&self.job_name).await?))
    }
}

fn build_job_info(mut args: StrategyArgs, ctx: StrategyContext) -> Built {
    Box::pin(async move {
        let job_name = args.required("job_name")?;
        args.finish()?;
        let jenkins = ctx.clients().jenkins().await?;
        boxed(JobInfo { jenkins, job_name })
    })
}

pub struct JobHealthReport {
    jenkins: JenkinsClient,
    job_name: String,
}

#[async_trait]
impl Strategy for JobHealthReport {
    async fn execute(&self) -> OpsResult<StrategyOutput> {
        StrategyOutput::json(&self.jenkins.health_report(&self.job_name).await?)
    }
}

fn build_job_health_report(mut args: StrategyArgs, ctx: StrategyContext) -> Built {
    Box::pin(async move {
        let job_name = args.required("job_name")?;
        args.finish()?;
        let jenkins = ctx.clients().jenkins().await?;
        boxed(JobHealthReport { jenkins, job_name })
    })
}

// ============================================================================
// Builds
// ============================================================================

pub struct LastBuildConsoleOutput {
    jenkins: JenkinsClient,
    job_name: String,
}

#[async_trait]
impl Strategy for LastBuildConsoleOutput {
    async fn execute(&self) -> OpsResult<StrategyOutput> {
        let number = self.jenkins.last_build_number(&self.job_name).await?;
        let console = self.jenkins.console_output(&self.job_name, number).await?;
        Ok(StrategyOutput::text(console))
    }
}

fn build_last_build_console(mut args: StrategyArgs, ctx: StrategyContext) -> Built {
    Box::pin(async move {
        let job_name = args.required("job_name")?;
        args.finish()?;
        let jenkins = ctx.clients().jenkins().await?;
        boxed(LastBuildConsoleOutput { jenkins, job_name })
    })
}

/// Upstream job whose console names the downstream build holding the artifacts
pub struct PullBuildArtifactsAndRobotReports {
    jenkins: JenkinsClient,
    reporter: Reporter,
    job_name: String,
    build_number: u64,
    artifact_job: String,
}

#[async_trait]
impl Strategy for PullBuildArtifactsAndRobotReports {
    async fn execute(&self) -> OpsResult<StrategyOutput> {
        let console = self
            .jenkins
            .console_output(&self.job_name, self.build_number)
            .await?;
        let downstream = console_parser::find_build(&console).ok_or_else(|| {
            OpsError::parse(
                "jenkins",
                format!(
                    "no downstream build reference in console of {} #{}",
                    self.job_name, self.build_number
                ),
            )
        })?;
        info!(job = %self.artifact_job, build = downstream, "Found downstream build");

        let archive = self
            .jenkins
            .download_full_archive(&self.artifact_job, downstream)
            .await?;
        let log = self
            .jenkins
            .download_robot_log(&self.job_name, self.build_number, None)
            .await?;
        let report = self
            .jenkins
            .download_robot_report(&self.job_name, self.build_number, None)
            .await?;

        (self.reporter)(&format!("Robot log: {}", log.display()));
        (self.reporter)(&format!("Robot report: {}", report.display()));

        Ok(StrategyOutput::Json(json!({
            "artifact_build": downstream,
            "archive": archive,
            "log": log,
            "report": report,
        })))
    }
}

fn build_pull_artifacts_and_reports(mut args: StrategyArgs, ctx: StrategyContext) -> Built {
    Box::pin(async move {
        let job_name = args.required("job_name")?;
        let build_number = args.required("build_number")?;
        let artifact_job = args.required("artifact_job")?;
        args.finish()?;
        let jenkins = ctx.clients().jenkins().await?;
        boxed(PullBuildArtifactsAndRobotReports {
            jenkins,
            reporter: ctx.reporter(),
            job_name,
            build_number,
            artifact_job,
        })
    })
}

pub struct PullBuildArtifacts {
    jenkins: JenkinsClient,
    reporter: Reporter,
    job_name: String,
    build_number: u64,
}

#[async_trait]
impl Strategy for PullBuildArtifacts {
    async fn execute(&self) -> OpsResult<StrategyOutput> {
        let (job, n) = (&self.job_name, self.build_number);
        let archive = self.jenkins.download_full_archive(job, n).await?;
        let log = self
            .jenkins
            .download_robot_log(job, n, Some(format!("log-{}.html", n).as_str()))
            .await?;
        let report = self
            .jenkins
            .download_robot_report(job, n, Some(format!("report-{}.html", n).as_str()))
            .await?;

        let (log, report) = (absolute(log), absolute(report));
        (self.reporter)(&format!("Robot log: {}", log.display()));
        (self.reporter)(&format!("Robot report: {}", report.display()));

        Ok(StrategyOutput::Json(json!({
            "archive": archive,
            "log": log,
            "report": report,
        })))
    }
}

fn absolute(path: PathBuf) -> PathBuf {
    std::fs::canonicalize(&path).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "Could not resolve absolute path");
        path
    })
}

fn build_pull_artifacts(mut args: StrategyArgs, ctx: StrategyContext) -> Built {
    Box::pin(async move {
        let job_name = args.required("job_name")?;
        let build_number = args.required("build_number")?;
        args.finish()?;
        let jenkins = ctx.clients().jenkins().await?;
        boxed(PullBuildArtifacts {
            jenkins,
            reporter: ctx.reporter(),
            job_name,
            build_number,
        })
    })
}
