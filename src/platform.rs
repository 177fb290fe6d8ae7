//! The platform adapter: a thin, testable boundary over process
//! and filesystem primitives. Everything above this module talks to a
//! `&dyn Platform`, never directly to `nix`/`libc`/`glob`, so the process
//! / pipeline executor can be exercised without actually forking.

use std::os::fd::RawFd;
use std::path::{Path, PathBuf};

use nix::sys::signal::{self, SigHandler, Signal};
use nix::sys::wait::{self, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};

use crate::error::{Result, ShellError};

/// Outcome of [`Platform::fork`]: either we are the parent and learned the
/// child's pid, or we are the child and must go on to `exec` or `exit`.
pub enum Forked {
    Parent(i32),
    Child,
}

/// Process and filesystem primitives the core subsystems are built on.
/// `fork` is split from `exec` rather than taking a closure to run in
/// the child, since Rust can't safely run arbitrary code between `fork`
/// and `exec` (async-signal-safety). This keeps the child-side work
/// limited to calls that are safe post-fork.
pub trait Platform {
    fn fork(&self) -> Result<Forked>;

    /// Replaces the calling process's image. Only returns on failure.
    fn exec(&self, path: &Path, argv: &[String]) -> Result<()>;

    fn pipe(&self) -> Result<(RawFd, RawFd)>;
    fn dup2(&self, src: RawFd, dst: RawFd) -> Result<()>;
    fn close(&self, fd: RawFd);

    /// Writes `data` to `fd`, looping over short writes.
    fn write(&self, fd: RawFd, data: &[u8]) -> Result<()>;
    /// Reads up to `max` bytes from `fd` in one call (may return fewer,
    /// including zero at EOF).
    fn read(&self, fd: RawFd, max: usize) -> Result<Vec<u8>>;

    fn chdir(&self, path: &Path) -> Result<()>;
    fn getcwd(&self) -> Result<PathBuf>;

    /// Waits for a specific child and returns its exit status (or 128+sig
    /// if it died from a signal, the conventional shell encoding).
    fn wait(&self, pid: i32) -> Result<i32>;

    fn realpath(&self, path: &Path) -> Result<PathBuf>;

    /// Expands a glob pattern against the filesystem, sorted.
    fn glob(&self, pattern: &str) -> Vec<PathBuf>;

    fn getenv(&self, name: &str) -> Option<String>;
    fn setenv(&self, name: &str, value: &str);
    fn unsetenv(&self, name: &str);

    fn tcsetpgrp(&self, pgid: i32) -> Result<()>;
    fn setpgid(&self, pid: i32, pgid: i32) -> Result<()>;

    /// Ignores `SIGTTIN`/`SIGTTOU`/`SIGTSTP` in the interactive parent so
    /// background terminal operations don't suspend the shell.
    fn ignore_terminal_signals(&self);
    /// Restores default handling, done in a forked child before `exec`.
    fn restore_terminal_signals(&self);
}

/// The real Unix implementation, backed by `nix` and the `glob` crate.
pub struct UnixPlatform;

impl Platform for UnixPlatform {
    fn fork(&self) -> Result<Forked> {
        match unsafe { unistd::fork() }? {
            ForkResult::Parent { child } => Ok(Forked::Parent(child.as_raw())),
            ForkResult::Child => Ok(Forked::Child),
        }
    }

    fn exec(&self, path: &Path, argv: &[String]) -> Result<()> {
        use std::ffi::CString;
        let c_path = CString::new(path.as_os_str().as_encoded_bytes())
            .map_err(|e| ShellError::Io(e.to_string()))?;
        let c_argv: Vec<CString> = argv
            .iter()
            .map(|a| CString::new(a.as_str()).unwrap_or_default())
            .collect();
        match unistd::execv(&c_path, &c_argv) {
            Ok(_) => unreachable!("execv only returns on error"),
            Err(e) => Err(e.into()),
        }
    }

    fn pipe(&self) -> Result<(RawFd, RawFd)> {
        let (r, w) = unistd::pipe()?;
        use std::os::fd::IntoRawFd;
        Ok((r.into_raw_fd(), w.into_raw_fd()))
    }

    fn dup2(&self, src: RawFd, dst: RawFd) -> Result<()> {
        unistd::dup2(src, dst)?;
        Ok(())
    }

    fn close(&self, fd: RawFd) {
        let _ = unistd::close(fd);
    }

    fn write(&self, fd: RawFd, data: &[u8]) -> Result<()> {
        let mut written = 0;
        while written < data.len() {
            written += unistd::write(
                unsafe { std::os::fd::BorrowedFd::borrow_raw(fd) },
                &data[written..],
            )?;
        }
        Ok(())
    }

    fn read(&self, fd: RawFd, max: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; max];
        let n = unistd::read(fd, &mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    fn chdir(&self, path: &Path) -> Result<()> {
        unistd::chdir(path)?;
        Ok(())
    }

    fn getcwd(&self) -> Result<PathBuf> {
        Ok(unistd::getcwd()?)
    }

    fn wait(&self, pid: i32) -> Result<i32> {
        match wait::waitpid(Pid::from_raw(pid), None)? {
            WaitStatus::Exited(_, code) => Ok(code),
            WaitStatus::Signaled(_, sig, _) => Ok(128 + sig as i32),
            _ => Ok(0),
        }
    }

    fn realpath(&self, path: &Path) -> Result<PathBuf> {
        std::fs::canonicalize(path).map_err(|e| {
            let errno = e
                .raw_os_error()
                .map(nix::errno::Errno::from_raw)
                .unwrap_or(nix::errno::Errno::UnknownErrno);
            ShellError::Io(errno.to_string())
        })
    }

    fn glob(&self, pattern: &str) -> Vec<PathBuf> {
        let mut matches: Vec<PathBuf> = glob::glob(pattern)
            .map(|paths| paths.filter_map(std::result::Result::ok).collect())
            .unwrap_or_default();
        matches.sort();
        matches
    }

    fn getenv(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn setenv(&self, name: &str, value: &str) {
        unsafe {
            std::env::set_var(name, value);
        }
    }

    fn unsetenv(&self, name: &str) {
        unsafe {
            std::env::remove_var(name);
        }
    }

    fn tcsetpgrp(&self, pgid: i32) -> Result<()> {
        unistd::tcsetpgrp(std::io::stdin(), Pid::from_raw(pgid))?;
        Ok(())
    }

    fn setpgid(&self, pid: i32, pgid: i32) -> Result<()> {
        unistd::setpgid(Pid::from_raw(pid), Pid::from_raw(pgid))?;
        Ok(())
    }

    fn ignore_terminal_signals(&self) {
        unsafe {
            let _ = signal::signal(Signal::SIGTTIN, SigHandler::SigIgn);
            let _ = signal::signal(Signal::SIGTTOU, SigHandler::SigIgn);
            let _ = signal::signal(Signal::SIGTSTP, SigHandler::SigIgn);
        }
    }

    fn restore_terminal_signals(&self) {
        unsafe {
            let _ = signal::signal(Signal::SIGTTIN, SigHandler::SigDfl);
            let _ = signal::signal(Signal::SIGTTOU, SigHandler::SigDfl);
            let _ = signal::signal(Signal::SIGTSTP, SigHandler::SigDfl);
        }
    }
}

/// True if `word` contains a glob metacharacter:
/// `*`, `?`, or a one-character bracket expression `[x]`.
pub fn looks_like_glob(word: &str) -> bool {
    let bytes = word.as_bytes();
    if word.contains('*') || word.contains('?') {
        return true;
    }
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'[' {
            if let Some(close) = word[i..].find(']') {
                if close >= 2 {
                    return true;
                }
            }
        }
        i += 1;
    }
    false
}
