use std::convert::Infallible;
use std::ffi;
use std::ffi::CString;
use std::fs;
use std::io;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;

use nix::sys::wait::waitpid;
use nix::unistd::{self, ForkResult, Pid};
use thiserror::Error;
use tracing::{debug, trace};

use crate::channel::Channel;
use crate::types::{Pipeline, RedirectMode, Stage};

/// Parent-side failures: no child is affected, but the remaining stages of
/// the pipeline are not constructed.
#[derive(Debug, Error)]
pub enum EvalError {
	#[error("cannot create pipe: {0}")]
	Channel(nix::Error),
	#[error("cannot fork: {0}")]
	Fork(nix::Error),
}

// Child-side exit codes, observable through wait. Must stay mutually
// distinct; 127 for exec failure follows shell convention.
const EXIT_REDIRECT: i32 = 1;
const EXIT_REBIND: i32 = 2;
const EXIT_EXEC: i32 = 127;

#[derive(Debug, Error)]
enum StageError {
	#[error("cannot open {path}: {source}")]
	Redirect { path: String, source: io::Error },
	#[error("cannot rebind stream: {0}")]
	Rebind(nix::Error),
	#[error("invalid program name: {0}")]
	BadName(ffi::NulError),
	#[error("cannot exec {name}: {source}")]
	Exec { name: String, source: nix::Error },
}

impl StageError {
	fn exit_code(&self) -> i32 {
		match *self {
			StageError::Redirect { .. } => EXIT_REDIRECT,
			StageError::Rebind(_) => EXIT_REBIND,
			StageError::BadName(_) | StageError::Exec { .. } => EXIT_EXEC,
		}
	}
}

/// Runs one pipeline to completion: forks every stage, wiring adjacent
/// stages through freshly allocated channels, then waits for each process
/// that was actually spawned. Channels are allocated just before the stage
/// that writes into them, so the parent holds at most one pipe open at a
/// time regardless of pipeline length.
pub fn run(pipeline: &Pipeline) -> Result<(), EvalError> {
	let stages = &pipeline.stages;
	let mut children: Vec<Pid> = Vec::with_capacity(stages.len());
	let mut prev_read: Option<OwnedFd> = None;
	let mut failure: Option<EvalError> = None;

	for (i, stage) in stages.iter().enumerate() {
		let channel = if i + 1 < stages.len() {
			match Channel::open() {
				Ok(c) => Some(c),
				Err(e) => {
					failure = Some(EvalError::Channel(e));
					break;
				}
			}
		} else {
			None
		};
		let (next_read, write_end) = match channel {
			Some(c) => (Some(c.read), Some(c.write)),
			None => (None, None),
		};
		let input = prev_read.take();

		match spawn_stage(stage, input.as_ref(), write_end.as_ref()) {
			Ok(pid) => {
				trace!(stage = stage.name, pid = pid.as_raw(), "spawned");
				children.push(pid);
			}
			Err(e) => {
				failure = Some(e);
				break;
			}
		}
		// The child owns both forwarded endpoints now. Dropping them here is
		// what lets the downstream reader see EOF once the writer exits.
		drop(input);
		drop(write_end);
		prev_read = next_read;
	}
	// On an aborted construction this releases the dangling read end, so
	// already-spawned consumers are not left blocked on a silent pipe.
	drop(prev_read);

	debug!(spawned = children.len(), "waiting for pipeline");
	for pid in children {
		let _ = waitpid(pid, None);
	}
	match failure {
		Some(e) => Err(e),
		None => Ok(()),
	}
}

fn spawn_stage(stage: &Stage, input: Option<&OwnedFd>, output: Option<&OwnedFd>) -> Result<Pid, EvalError> {
	match unsafe { unistd::fork() }.map_err(EvalError::Fork)? {
		ForkResult::Parent { child } => Ok(child),
		ForkResult::Child => exec_stage(stage, input, output),
	}
}

fn exec_stage(stage: &Stage, input: Option<&OwnedFd>, output: Option<&OwnedFd>) -> ! {
	let e = match do_exec_stage(stage, input, output) {
		Err(e) => e,
		Ok(never) => match never {},
	};
	eprintln!("pish: {}", e);
	// _exit, not exit: the forked child must not flush the parent's stdio
	// buffers or run atexit handlers.
	unsafe { libc::_exit(e.exit_code()) }
}

fn do_exec_stage(stage: &Stage, input: Option<&OwnedFd>, output: Option<&OwnedFd>) -> Result<Infallible, StageError> {
	if let Some(fd) = output {
		rebind(fd.as_raw_fd(), libc::STDOUT_FILENO)?;
	}
	if let Some(fd) = input {
		rebind(fd.as_raw_fd(), libc::STDIN_FILENO)?;
	}

	// Explicit file redirections override the pipe wiring for their
	// direction. Each File is dropped right after dup2, closing the
	// original descriptor.
	if let Some(path) = stage.input {
		let file = fs::OpenOptions::new()
			.read(true)
			.open(path)
			.map_err(|e| StageError::Redirect { path: path.to_owned(), source: e })?;
		rebind(file.as_raw_fd(), libc::STDIN_FILENO)?;
	}
	if let Some(ref out) = stage.output {
		let mut oopt = fs::OpenOptions::new();
		let _ = match out.mode {
			RedirectMode::Truncate => oopt.write(true).create(true).truncate(true),
			RedirectMode::Append => oopt.append(true).create(true),
		};
		let file = oopt
			.mode(0o644)
			.open(out.path)
			.map_err(|e| StageError::Redirect { path: out.path.to_owned(), source: e })?;
		rebind(file.as_raw_fd(), libc::STDOUT_FILENO)?;
	}

	let name = CString::new(stage.name).map_err(StageError::BadName)?;
	let mut argv: Vec<CString> = Vec::with_capacity(stage.args.len() + 1);
	argv.push(name.clone());
	for &arg in &stage.args {
		argv.push(CString::new(arg).map_err(StageError::BadName)?);
	}
	match unistd::execvp(&name, &argv) {
		Ok(never) => match never {},
		Err(e) => Err(StageError::Exec { name: stage.name.to_owned(), source: e }),
	}
}

fn rebind(from: RawFd, to: RawFd) -> Result<(), StageError> {
	unistd::dup2(from, to).map_err(StageError::Rebind)?;
	Ok(())
}
