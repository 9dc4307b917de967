/*!
 * Process Spawning
 * Fork-based spawn primitives for program stages and in-process actions
 *
 * Everything the child needs (argument vectors, descriptor numbers) is
 * prepared before fork. Between fork and exec the child only calls
 * async-signal-safe functions: dup2, close, execvp, write, _exit.
 */

use super::fd::pipe_above_stdio;
use super::types::{ProcessError, ProcessResult};
use crate::core::limits::{EXEC_STATUS_REPORT_LEN, TASK_PANIC_EXIT_CODE, TASK_SUCCESS_EXIT_CODE};
use log::debug;
use nix::errno::Errno;
use nix::libc::{STDIN_FILENO, STDOUT_FILENO};
use nix::unistd::{close, dup2, execvp, fork, ForkResult, Pid};
use std::ffi::{CStr, CString};
use std::fs::File;
use std::io::{Read, Write};
use std::os::fd::{AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::panic::{self, AssertUnwindSafe};

/// A program and its argument vector, converted for exec ahead of fork
#[derive(Debug, Clone)]
pub struct ExecCommand {
    program: CString,
    argv: Vec<CString>,
}

impl ExecCommand {
    /// Prepare `program` with `argv` (argument zero included)
    pub fn new<S: AsRef<str>>(program: &str, argv: &[S]) -> ProcessResult<Self> {
        if program.is_empty() {
            return Err(ProcessError::InvalidArgument("empty program name".into()));
        }
        if argv.is_empty() {
            return Err(ProcessError::InvalidArgument(format!(
                "empty argument vector for '{}'",
                program
            )));
        }

        let program_c = CString::new(program).map_err(|_| {
            ProcessError::InvalidArgument(format!("program name contains a NUL byte: {:?}", program))
        })?;

        let argv_c = argv
            .iter()
            .map(|arg| {
                CString::new(arg.as_ref()).map_err(|_| {
                    ProcessError::InvalidArgument(format!(
                        "argument contains a NUL byte: {:?}",
                        arg.as_ref()
                    ))
                })
            })
            .collect::<ProcessResult<Vec<_>>>()?;

        Ok(Self {
            program: program_c,
            argv: argv_c,
        })
    }

    pub fn program(&self) -> &CStr {
        &self.program
    }

    /// Replace the current process image, searching PATH for the program
    ///
    /// Only returns if exec failed.
    pub fn exec(&self) -> Errno {
        match execvp(&self.program, &self.argv) {
            Ok(never) => match never {},
            Err(errno) => errno,
        }
    }
}

/// Descriptor plan applied in the child before exec
///
/// `stdin`/`stdout` are moved onto descriptors 0/1 and their originals
/// closed. Every descriptor in `close` is closed outright.
#[derive(Debug, Clone, Default)]
pub struct StdioPlan {
    pub stdin: Option<RawFd>,
    pub stdout: Option<RawFd>,
    pub close: Vec<RawFd>,
}

/// A freshly forked program
#[derive(Debug, Clone, Copy)]
pub struct SpawnedProgram {
    pub pid: Pid,
    /// Set when the child could not exec the program
    pub exec_errno: Option<Errno>,
}

/// Fork a child that rewires its stdio per `plan` and execs `command`
///
/// If exec fails the child reports its errno over a close-on-exec status
/// pipe and exits with `exec_failure_code`. The parent blocks only until
/// the child has either exec'd or given up.
pub fn spawn_program(
    command: &ExecCommand,
    plan: &StdioPlan,
    exec_failure_code: i32,
) -> ProcessResult<SpawnedProgram> {
    let (status_read, status_write) = pipe_above_stdio()?;
    let status_fd = status_write.as_raw_fd();

    // SAFETY: the child calls only async-signal-safe functions until exec or _exit
    match unsafe { fork() } {
        Ok(ForkResult::Child) => exec_child(command, plan, status_fd, exec_failure_code),
        Ok(ForkResult::Parent { child }) => {
            drop(status_write);
            let exec_errno = read_exec_status(status_read);
            debug!(
                "Spawned {:?} (OS PID: {}, exec_errno: {:?})",
                command.program(),
                child,
                exec_errno
            );
            Ok(SpawnedProgram {
                pid: child,
                exec_errno,
            })
        }
        Err(errno) => Err(ProcessError::Fork(errno)),
    }
}

/// Fork a child that runs `action` and exits
///
/// The child exits 0 when `action` returns and `TASK_PANIC_EXIT_CODE` when it
/// panics; a panic never unwinds into the caller's frames in the child.
pub fn spawn_action<F: FnOnce()>(action: F) -> ProcessResult<Pid> {
    // SAFETY: the child runs `action` and terminates via _exit without returning
    match unsafe { fork() } {
        Ok(ForkResult::Child) => run_action(action),
        Ok(ForkResult::Parent { child }) => {
            debug!("Spawned action (OS PID: {})", child);
            Ok(child)
        }
        Err(errno) => Err(ProcessError::Fork(errno)),
    }
}

fn exec_child(command: &ExecCommand, plan: &StdioPlan, status_fd: RawFd, code: i32) -> ! {
    if let Err(errno) = apply_plan(plan) {
        report_exec_failure(status_fd, errno, code);
    }
    let errno = command.exec();
    report_exec_failure(status_fd, errno, code)
}

fn apply_plan(plan: &StdioPlan) -> Result<(), Errno> {
    if let Some(fd) = plan.stdin {
        redirect(fd, STDIN_FILENO)?;
    }
    if let Some(fd) = plan.stdout {
        redirect(fd, STDOUT_FILENO)?;
    }
    for &fd in &plan.close {
        let _ = close(fd);
    }
    Ok(())
}

fn redirect(fd: RawFd, target: RawFd) -> Result<(), Errno> {
    if fd != target {
        dup2(fd, target)?;
        let _ = close(fd);
    }
    Ok(())
}

fn report_exec_failure(status_fd: RawFd, errno: Errno, code: i32) -> ! {
    // SAFETY: status_fd stays open in the child until exec or _exit
    let status = unsafe { BorrowedFd::borrow_raw(status_fd) };
    let _ = nix::unistd::write(status, &(errno as i32).to_ne_bytes());
    // SAFETY: _exit is async-signal-safe and skips atexit handlers inherited from the parent
    unsafe { nix::libc::_exit(code) }
}

fn read_exec_status(status: OwnedFd) -> Option<Errno> {
    let mut buf = [0u8; EXEC_STATUS_REPORT_LEN];
    match File::from(status).read_exact(&mut buf) {
        Ok(()) => Some(Errno::from_raw(i32::from_ne_bytes(buf))),
        // EOF: close-on-exec fired, the program is running
        Err(_) => None,
    }
}

fn run_action<F: FnOnce()>(action: F) -> ! {
    let code = match panic::catch_unwind(AssertUnwindSafe(action)) {
        Ok(()) => TASK_SUCCESS_EXIT_CODE,
        Err(_) => TASK_PANIC_EXIT_CODE,
    };
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();
    // SAFETY: the child ends here without returning into the caller's frames
    unsafe { nix::libc::_exit(code) }
}
