//! vbls's command-line entry point. Parses the shell's own
//! options, sources startup files, and either evaluates `-c STRING` /
//! a script file once, or drives an interactive `rustyline` loop.
//!
//! Everything here is "external collaborator" territory:
//! option parsing, line editing, and history persistence sit outside
//! the core three subsystems and are handled with whatever the
//! ecosystem already provides.

use std::path::{Path, PathBuf};

use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use vbls::error;
use vbls::eval;
use vbls::platform::UnixPlatform;
use vbls::prompt;
use vbls::state::Shell;

#[derive(Parser)]
#[command(
    name = "vbls",
    about = "A small POSIX-style, Plan 9 rc-flavored command interpreter",
    disable_version_flag = true
)]
struct Cli {
    /// Evaluate STRING and exit.
    #[arg(short = 'c', value_name = "STRING")]
    command: Option<String>,

    /// Treat this invocation as a login shell.
    #[arg(long)]
    login: bool,

    /// Set the errexit option from startup.
    #[arg(short = 'e')]
    errexit: bool,

    /// Set the showcommands option from startup.
    #[arg(short = 'x')]
    showcommands: bool,

    /// Print the version and exit.
    #[arg(short = 'v', long = "version")]
    version: bool,

    /// A script to run, followed by its positional arguments.
    #[arg(trailing_var_arg = true)]
    rest: Vec<String>,
}

fn main() {
    let cli = Cli::parse();

    if cli.version {
        println!("vbls {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let interactive = cli.command.is_none() && cli.rest.is_empty();
    let mut shell = Shell::new(Box::new(UnixPlatform), interactive);
    shell.options.errexit = cli.errexit;
    shell.options.showcommands = cli.showcommands;

    setup_environment(&mut shell, cli.login, &cli.rest);

    if let Some(command) = cli.command {
        let (_, _) = eval::eval_chunk(&mut shell, &command, false);
        std::process::exit(shell.last_status);
    }

    if let Some(script) = cli.rest.first() {
        match std::fs::read_to_string(script) {
            Ok(contents) => {
                let (_, _) = eval::eval_chunk(&mut shell, &contents, false);
                std::process::exit(shell.last_status);
            }
            Err(e) => {
                eprintln!("vbls: {script}: {e}");
                std::process::exit(1);
            }
        }
    }

    run_interactive(shell, cli.login);
}

/// Sets `HOME`, `SHLVL`, `VBLS_VERSION`, and the positional parameters
/// (the shell's environment contract).
fn setup_environment(shell: &mut Shell, login: bool, rest: &[String]) {
    let platform = shell.platform.as_ref();

    if shell.env.get("HOME").is_none() || login {
        if let Some(home) = home_from_user_database() {
            shell.env.set(platform, "HOME", &home);
        } else if shell.env.get("HOME").is_none() {
            shell.env.set(platform, "HOME", "/");
        }
    }

    let shlvl = shell
        .env
        .get("SHLVL")
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(0)
        + 1;
    shell.env.set(platform, "SHLVL", &shlvl.to_string());
    shell
        .env
        .set(platform, "VBLS_VERSION", env!("CARGO_PKG_VERSION"));

    let program_name = "vbls".to_string();
    let arg0 = rest.first().cloned().unwrap_or(program_name);
    shell.env.set(platform, "0", &arg0);
    for (idx, arg) in rest.iter().skip(1).enumerate() {
        shell.env.set(platform, &(idx + 1).to_string(), arg);
    }
}

/// Looks up the invoking user's home directory via the passwd database,
/// used on `--login`.
fn home_from_user_database() -> Option<String> {
    let user = nix::unistd::User::from_uid(nix::unistd::Uid::current()).ok()??;
    user.dir.to_str().map(str::to_string)
}

fn source_if_present(shell: &mut Shell, path: &Path) {
    if let Ok(contents) = std::fs::read_to_string(path) {
        let (ok, _) = eval::eval_chunk(shell, &contents, false);
        if !ok {
            eprintln!("vbls: errors sourcing {}", path.display());
        }
    }
}

fn run_interactive(mut shell: Shell, login: bool) {
    shell.platform.ignore_terminal_signals();

    source_if_present(&mut shell, Path::new("/etc/profile"));
    if let Some(home) = shell.env.get("HOME").map(str::to_string) {
        if login {
            source_if_present(&mut shell, &Path::new(&home).join(".profile"));
        } else {
            source_if_present(&mut shell, &Path::new(&home).join(".vblsrc"));
        }
    }

    let history_path = shell
        .env
        .get("HOME")
        .map(|h| PathBuf::from(h).join(".vbls_history"));

    let mut editor = match DefaultEditor::new() {
        Ok(e) => e,
        Err(e) => {
            eprintln!("vbls: could not start the line editor: {e}");
            std::process::exit(1);
        }
    };

    if let Some(lines) = history_path.as_deref().and_then(|p| std::fs::read_to_string(p).ok()) {
        for line in lines.lines() {
            shell.history.push(line.to_string());
            let _ = editor.add_history_entry(line);
        }
    }

    loop {
        let prompt = prompt::render(&shell);
        match editor.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim_end_matches('\n');
                if !trimmed.is_empty() {
                    shell.history.push(trimmed.to_string());
                    let _ = editor.add_history_entry(trimmed);
                }
                let (ok, _) = eval::eval_chunk(&mut shell, trimmed, false);
                let _ = ok;
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                error::report(&vbls::error::ShellError::Io(e.to_string()));
                break;
            }
        }
    }

    if let Some(path) = history_path {
        let _ = std::fs::write(path, shell.history.to_file_contents());
    }
}
