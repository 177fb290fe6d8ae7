//! Command / pipeline executor and command-chain executor:
//! wiring pipes between forked children, dispatching
//! builtins in the parent, and composing `|`, `&&`, `||` chains with the
//! right short-circuit semantics.

use std::os::fd::RawFd;
use std::path::{Path, PathBuf};

use crate::builtins;
use crate::error::{Result, ShellError};
use crate::expand;
use crate::lexer::{Op, Token};
use crate::state::Shell;

const DEFAULT_PATH: &str = "/bin:/sbin:/usr/bin";

/// One command plus the operator that follows it in the chain (`None`
/// for the final element).
struct ChainElement {
    words: Vec<String>,
    next_op: Option<Op>,
}

fn op_text(op: Op) -> &'static str {
    match op {
        Op::Pipe => "|",
        Op::And => "&&",
        Op::Or => "||",
    }
}

/// Splits a flat token sequence (no control-flow keywords) into chain
/// elements. An operator immediately following an empty
/// element is a parse error.
fn split_chain(tokens: &[Token]) -> Result<Vec<ChainElement>> {
    let mut elements = Vec::new();
    let mut words = Vec::new();

    for tok in tokens {
        if let Token::Op(op) = tok {
            if words.is_empty() {
                return Err(ShellError::Parse(format!("unexpected '{}'", op_text(*op))));
            }
            elements.push(ChainElement {
                words: std::mem::take(&mut words),
                next_op: Some(*op),
            });
        } else {
            words.push(tok.text());
        }
    }
    elements.push(ChainElement {
        words,
        next_op: None,
    });
    Ok(elements)
}

/// Runs a command chain. When `capture` is set, the last element's
/// stdout is redirected into a pipe that is drained and returned
/// alongside the chain's exit status ("output capture").
pub fn run_chain(shell: &mut Shell, tokens: &[Token], capture: bool) -> Result<(i32, String)> {
    let elements = split_chain(tokens)?;
    if elements.iter().all(|e| e.words.is_empty()) {
        return Ok((0, String::new()));
    }

    let mut status = 0;
    let mut carry_input: Option<RawFd> = None;
    let mut captured = String::new();

    for (i, element) in elements.iter().enumerate() {
        let is_last = i + 1 == elements.len();
        let should_run = match element_gate(&elements, i, status) {
            Some(gate) => gate,
            None => true,
        };

        if !should_run {
            continue;
        }

        let input_fd = carry_input.take();
        let mut output_fd = None;
        let mut pipe_read_for_next = None;

        if element.next_op == Some(Op::Pipe) {
            let (r, w) = shell.platform.pipe()?;
            output_fd = Some(w);
            pipe_read_for_next = Some(r);
        }

        let mut capture_read = None;
        if is_last && capture {
            let (r, w) = shell.platform.pipe()?;
            output_fd = Some(w);
            capture_read = Some(r);
        }

        let argv = expand::expand_words(shell, element.words.clone());
        if argv.is_empty() {
            if let Some(fd) = input_fd {
                shell.platform.close(fd);
            }
            if let Some(fd) = output_fd {
                shell.platform.close(fd);
            }
            if let Some(fd) = pipe_read_for_next {
                shell.platform.close(fd);
            }
            if let Some(fd) = capture_read {
                shell.platform.close(fd);
            }
            continue;
        }

        status = run_command(shell, &argv, input_fd, output_fd)?;
        shell.last_status = status;

        if let Some(fd) = input_fd {
            shell.platform.close(fd);
        }
        if let Some(fd) = output_fd {
            shell.platform.close(fd);
        }

        if let Some(r) = pipe_read_for_next {
            carry_input = Some(r);
        }

        if let Some(r) = capture_read {
            captured = drain_pipe(shell, r);
            shell.platform.close(r);
        }
    }

    Ok((status, captured))
}

/// Decides whether the element at `idx` should run, given the status
/// carried from whatever ran before it. `None` from `next_op` on the
/// *previous* element means this is the chain's first element, which
/// always runs. `&&`/`||` can skip an element without aborting the rest
/// of the chain: a later `||` must still see the carried-forward
/// status ("a && b || c evaluates c only if both a and b
/// fail").
fn element_gate(elements: &[ChainElement], idx: usize, carried_status: i32) -> Option<bool> {
    if idx == 0 {
        return Some(true);
    }
    match elements[idx - 1].next_op {
        Some(Op::And) => Some(carried_status == 0),
        Some(Op::Or) => Some(carried_status != 0),
        Some(Op::Pipe) | None => Some(true),
    }
}

/// Drains a capture pipe's read end to EOF in 2048-byte chunks.
/// The caller closes `fd` once done.
fn drain_pipe(shell: &Shell, fd: RawFd) -> String {
    const CHUNK: usize = 2048;
    let mut buf = Vec::new();
    loop {
        match shell.platform.read(fd, CHUNK) {
            Ok(chunk) if chunk.is_empty() => break,
            Ok(chunk) => buf.extend_from_slice(&chunk),
            Err(_) => break,
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Command executor: dispatches one expanded argv to a
/// builtin or a forked child.
pub fn run_command(
    shell: &mut Shell,
    argv: &[String],
    input_fd: Option<RawFd>,
    output_fd: Option<RawFd>,
) -> Result<i32> {
    if shell.options.showcommands {
        eprintln!("+ '{} '", argv.join(" "));
    }

    if let Some(result) = builtins::dispatch(shell, argv, output_fd) {
        return result;
    }

    let path = find_command(shell, &argv[0])?;
    spawn_and_wait(shell, &path, argv, input_fd, output_fd)
}

/// `findCommand`: verbatim if the name contains `/`, else a
/// `$PATH` search, cached when `cachepaths` is set.
fn find_command(shell: &mut Shell, name: &str) -> Result<PathBuf> {
    if name.contains('/') {
        return Ok(PathBuf::from(name));
    }

    if let Some(cached) = shell.path_cache.get(name) {
        return Ok(cached.clone());
    }

    let path_var = shell
        .env
        .get("PATH")
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_PATH.to_string());

    for dir in path_var.split(':') {
        let candidate = Path::new(dir).join(name);
        if candidate.is_file() {
            if shell.options.cachepaths {
                shell.path_cache.insert(name.to_string(), candidate.clone());
            }
            return Ok(candidate);
        }
    }

    Err(ShellError::Resolution(name.to_string()))
}

fn spawn_and_wait(
    shell: &mut Shell,
    path: &Path,
    argv: &[String],
    input_fd: Option<RawFd>,
    output_fd: Option<RawFd>,
) -> Result<i32> {
    use crate::platform::Forked;

    match shell.platform.fork()? {
        Forked::Parent(child_pid) => {
            if shell.interactive {
                let _ = shell.platform.setpgid(child_pid, child_pid);
                let _ = shell.platform.tcsetpgrp(child_pid);
            }
            let status = shell.platform.wait(child_pid)?;
            if shell.interactive {
                let _ = shell.platform.tcsetpgrp(shell.pid);
            }
            Ok(status)
        }
        Forked::Child => {
            if let Some(fd) = input_fd {
                let _ = shell.platform.dup2(fd, 0);
            }
            if let Some(fd) = output_fd {
                let _ = shell.platform.dup2(fd, 1);
            }
            if shell.interactive {
                let pid = std::process::id() as i32;
                let _ = shell.platform.setpgid(pid, pid);
                let _ = shell.platform.tcsetpgrp(pid);
            }
            shell.platform.restore_terminal_signals();

            let err = shell.platform.exec(path, argv);
            if let Err(e) = err {
                eprintln!("vbls: {}: {}", path.display(), e);
            }
            std::process::exit(127);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    #[test]
    fn split_chain_rejects_leading_pipe() {
        let toks = tokenize("| echo a").unwrap();
        let err = split_chain(&toks).unwrap_err();
        assert!(matches!(err, ShellError::Parse(_)));
    }

    #[test]
    fn split_chain_builds_elements() {
        let toks = tokenize("echo a | wc -l && echo done").unwrap();
        let elements = split_chain(&toks).unwrap();
        assert_eq!(elements.len(), 3);
        assert_eq!(elements[0].words, vec!["echo", "a"]);
        assert_eq!(elements[0].next_op, Some(Op::Pipe));
        assert_eq!(elements[1].words, vec!["wc", "-l"]);
        assert_eq!(elements[1].next_op, Some(Op::And));
        assert_eq!(elements[2].words, vec!["echo", "done"]);
        assert_eq!(elements[2].next_op, None);
    }

    #[test]
    fn or_runs_only_after_failure() {
        let toks = tokenize("a && b || c").unwrap();
        let elements = split_chain(&toks).unwrap();
        // a fails (nonzero): b is gated off by &&, c is gated on by ||
        assert_eq!(element_gate(&elements, 1, 1), Some(false));
        assert_eq!(element_gate(&elements, 2, 1), Some(true));
    }
}
