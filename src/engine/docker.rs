//! Docker CLI engine.
//!
//! Drives any Docker-compatible command line (`docker`, `podman`, ...)
//! through a [`CommandRunner`].

use super::progress::{parse_line, ProgressEvent};
use super::runner::{CommandOptions, CommandResult, CommandRunner, SystemRunner};
use super::{BuildRequest, ContainerEngine, ContainerId, ContainerSpec, Credentials, ImageId, ProgressSink};
use crate::error::{Error, Result};
use std::cell::RefCell;
use std::fs;
use tracing::debug;

/// Container engine backed by an external CLI program.
pub struct DockerCli {
    program: String,
    runner: Box<dyn CommandRunner>,
}

impl DockerCli {
    /// Engine using `program` and real processes.
    pub fn new(program: &str) -> Self {
        Self::with_runner(program, Box::new(SystemRunner))
    }

    pub fn with_runner(program: &str, runner: Box<dyn CommandRunner>) -> Self {
        Self {
            program: program.to_string(),
            runner,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn invoke(&self, operation: &str, args: Vec<String>, options: &CommandOptions) -> Result<CommandResult> {
        debug!("{} {}", self.program, args.join(" "));
        let result = self
            .runner
            .run(&self.program, &args, options)
            .map_err(|e| Error::engine(operation, format!("{e:#}")))?;
        if !result.success {
            return Err(Error::engine(operation, result.message()));
        }
        Ok(result)
    }

    fn run(&self, operation: &str, args: Vec<String>) -> Result<CommandResult> {
        self.invoke(operation, args, &CommandOptions::default())
    }

    /// Run with output parsed as progress events. An engine-reported
    /// error event fails the operation even if the process exits zero.
    fn stream(&self, operation: &str, args: Vec<String>, progress: ProgressSink<'_>) -> Result<CommandResult> {
        debug!("{} {}", self.program, args.join(" "));
        let engine_error = RefCell::new(None);
        let result = self
            .runner
            .run_streaming(&self.program, &args, &CommandOptions::default(), &|line| {
                let event = parse_line(line.text());
                if let ProgressEvent::Error(message) = &event {
                    *engine_error.borrow_mut() = Some(message.clone());
                }
                progress(&event);
            })
            .map_err(|e| Error::engine(operation, format!("{e:#}")))?;

        if let Some(message) = engine_error.into_inner() {
            return Err(Error::engine(operation, message));
        }
        if !result.success {
            return Err(Error::engine(operation, result.message()));
        }
        Ok(result)
    }
}

fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl ContainerEngine for DockerCli {
    fn build_image(&self, request: &BuildRequest, progress: ProgressSink<'_>) -> Result<ImageId> {
        let iidfile = tempfile::NamedTempFile::new()?;
        let mut build = args(&["build", "--iidfile"]);
        build.push(iidfile.path().display().to_string());
        build.push(request.context.display().to_string());

        self.stream("build", build, progress)?;

        let id = fs::read_to_string(iidfile.path())?.trim().to_string();
        if id.is_empty() {
            return Err(Error::engine("build", "engine did not report an image id"));
        }
        Ok(ImageId(id))
    }

    fn tag_image(&self, image: &ImageId, repository: &str, tag: &str, _force: bool) -> Result<()> {
        // `docker tag` always moves an existing tag.
        self.run(
            "tag",
            vec!["tag".into(), image.to_string(), format!("{repository}:{tag}")],
        )?;
        Ok(())
    }

    fn push_image(&self, reference: &str, progress: ProgressSink<'_>) -> Result<()> {
        self.stream("push", args(&["push", reference]), progress)?;
        Ok(())
    }

    fn delete_image(&self, image: &ImageId, force: bool) -> Result<()> {
        let mut rmi = args(&["rmi"]);
        if force {
            rmi.push("--force".into());
        }
        rmi.push(image.to_string());
        self.run("rmi", rmi)?;
        Ok(())
    }

    fn find_image(&self, reference: &str) -> Result<Option<ImageId>> {
        let inspect = args(&["image", "inspect", "--format", "{{.Id}}", reference]);
        let result = self
            .runner
            .run(&self.program, &inspect, &CommandOptions::default())
            .map_err(|e| Error::engine("inspect", format!("{e:#}")))?;
        if !result.success {
            return Ok(None);
        }
        let id = result.stdout.trim();
        Ok((!id.is_empty()).then(|| ImageId(id.to_string())))
    }

    fn login(&self, credentials: &Credentials) -> Result<()> {
        let options = CommandOptions {
            stdin: Some(credentials.password.clone()),
            ..Default::default()
        };
        self.invoke(
            "login",
            args(&[
                "login",
                "--username",
                credentials.username.as_str(),
                "--password-stdin",
                credentials.server.as_str(),
            ]),
            &options,
        )?;
        Ok(())
    }

    fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerId> {
        let mut create = args(&["create"]);
        for (key, value) in &spec.env {
            create.push("--env".into());
            create.push(format!("{key}={value}"));
        }
        for mount in &spec.mounts {
            create.push("--volume".into());
            create.push(format!("{0}:{0}", mount.display()));
        }
        create.push(spec.image.to_string());

        let result = self.run("create", create)?;
        let id = result.stdout.trim();
        if id.is_empty() {
            return Err(Error::engine("create", "engine did not report a container id"));
        }
        Ok(ContainerId(id.to_string()))
    }

    fn start_container(&self, id: &ContainerId) -> Result<()> {
        self.run("start", args(&["start", id.as_str()]))?;
        Ok(())
    }

    fn follow_logs(&self, id: &ContainerId, progress: ProgressSink<'_>) -> Result<()> {
        self.runner
            .run_streaming(
                &self.program,
                &args(&["logs", "--follow", id.as_str()]),
                &CommandOptions::default(),
                &|line| progress(&ProgressEvent::Plain(line.text().to_string())),
            )
            .map_err(|e| Error::engine("logs", format!("{e:#}")))?;
        Ok(())
    }

    fn wait_container(&self, id: &ContainerId) -> Result<i64> {
        let result = self.run("wait", args(&["wait", id.as_str()]))?;
        result
            .stdout
            .trim()
            .parse()
            .map_err(|_| Error::engine("wait", format!("unexpected output: {}", result.stdout.trim())))
    }

    fn stop_container(&self, id: &ContainerId) -> Result<()> {
        self.run("stop", args(&["stop", id.as_str()]))?;
        Ok(())
    }

    fn delete_container(&self, id: &ContainerId, force: bool) -> Result<()> {
        let mut rm = args(&["rm"]);
        if force {
            rm.push("--force".into());
        }
        rm.push(id.to_string());
        self.run("rm", rm)?;
        Ok(())
    }
}
