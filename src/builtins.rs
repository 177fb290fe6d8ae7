//! Builtin commands. Every builtin takes `(argv, input_fd?,
//! output_fd?)` and returns an integer status; they run in the parent
//! process rather than forking.

use std::os::fd::RawFd;

use crate::error::{Result, ShellError};
use crate::eval;
use crate::state::Shell;

const NAMES: &[&str] = &[
    "alias", "unalias", "cd", "set", "printf", "echo", "echo_nl", "umask", "builtins", "exit",
    "source", ".", ":", "equals",
];

/// Dispatches a builtin by name. Returns `None` if `argv[0]` is not a
/// recognized builtin, so the caller falls through to `findCommand`.
pub fn dispatch(shell: &mut Shell, argv: &[String], output_fd: Option<RawFd>) -> Option<Result<i32>> {
    let tail = &argv[1..];
    let result = match argv[0].as_str() {
        "alias" => alias_builtin(shell, tail, output_fd),
        "unalias" => unalias_builtin(shell, tail),
        "cd" => cd_builtin(shell, tail),
        "set" => set_builtin(shell, tail, output_fd),
        "printf" => printf_builtin(shell, tail, output_fd),
        "echo" => echo_builtin(shell, tail, output_fd, " "),
        "echo_nl" => echo_builtin(shell, tail, output_fd, "\n"),
        "umask" => umask_builtin(shell, tail, output_fd),
        "builtins" => builtins_builtin(shell, output_fd),
        "exit" => exit_builtin(tail),
        "source" | "." => source_builtin(shell, tail, output_fd),
        ":" => Ok(0),
        "equals" => equals_builtin(tail),
        _ => return None,
    };
    Some(result)
}

fn write_out(shell: &Shell, output_fd: Option<RawFd>, text: &str) {
    let _ = shell.platform.write(output_fd.unwrap_or(1), text.as_bytes());
}

fn alias_builtin(shell: &mut Shell, args: &[String], output_fd: Option<RawFd>) -> Result<i32> {
    match args.len() {
        0 => {
            let mut lines: Vec<String> = shell
                .aliases
                .iter()
                .map(|(k, v)| format!("{k}='{v}'\n"))
                .collect();
            lines.sort();
            write_out(shell, output_fd, &lines.concat());
            Ok(0)
        }
        1 => {
            match shell.aliases.get(&args[0]) {
                Some(v) => write_out(shell, output_fd, &format!("{}='{}'\n", args[0], v)),
                None => write_out(shell, output_fd, &format!("{}\n", args[0])),
            }
            Ok(0)
        }
        2 => {
            shell.aliases.set(&args[0], &args[1]);
            Ok(0)
        }
        _ => Err(ShellError::BuiltinUsage("alias: usage: alias [NAME [VALUE]]".into())),
    }
}

fn unalias_builtin(shell: &mut Shell, args: &[String]) -> Result<i32> {
    match args.first() {
        Some(name) => {
            shell.aliases.remove(name);
            Ok(0)
        }
        None => Err(ShellError::BuiltinUsage("unalias: usage: unalias NAME".into())),
    }
}

fn cd_builtin(shell: &mut Shell, args: &[String]) -> Result<i32> {
    let requested = match args.first().map(String::as_str) {
        None | Some("") => shell.env.get("HOME").unwrap_or("/").to_string(),
        Some("-") => shell.env.get("OLDPWD").unwrap_or("/").to_string(),
        Some(other) => other.to_string(),
    };

    let resolved = match shell.platform.realpath(std::path::Path::new(&requested)) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("vbls: cd: {requested}: {e}");
            return Ok(1);
        }
    };

    if let Err(e) = shell.platform.chdir(&resolved) {
        eprintln!("vbls: cd: {requested}: {e}");
        return Ok(1);
    }

    let old_pwd = shell.env.get("PWD").map(str::to_string);
    let platform = shell.platform.as_ref();
    if let Some(old) = old_pwd {
        shell.env.set(platform, "OLDPWD", &old);
    }
    shell.env.set(platform, "PWD", &resolved.display().to_string());
    Ok(0)
}

/// Renders a control character the way `set`'s environment dump does:
/// the commonly escaped ones get their conventional letter, the rest of
/// the 1-26 range gets `\` + `(code + 96) as char`.
fn render_control_char(c: char, out: &mut String) {
    match c {
        '\n' => out.push_str("\\n"),
        '\t' => out.push_str("\\t"),
        '\u{1b}' => out.push_str("\\e"),
        '\u{07}' => out.push_str("\\a"),
        c if (c as u32) >= 1 && (c as u32) <= 26 => {
            out.push('\\');
            out.push(char::from_u32(c as u32 + 96).unwrap_or('?'));
        }
        c => out.push(c),
    }
}

fn render_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_control() {
            render_control_char(c, &mut out);
        } else {
            out.push(c);
        }
    }
    out
}

fn set_builtin(shell: &mut Shell, args: &[String], output_fd: Option<RawFd>) -> Result<i32> {
    if args.is_empty() {
        let mut lines: Vec<String> = shell
            .env
            .iter()
            .map(|(k, v)| format!("{k}={}\n", render_value(v)))
            .collect();
        lines.sort();
        write_out(shell, output_fd, &lines.concat());
        return Ok(0);
    }

    let invert = args.iter().any(|a| a == "-n");
    let mut positional: Vec<&String> = Vec::new();
    for arg in args {
        match arg.as_str() {
            "-n" => {}
            "-e" | "--errexit" => shell.options.errexit = !invert,
            "-x" | "--showcommand" | "--showcommands" => shell.options.showcommands = !invert,
            "--cachepaths" => shell.options.cachepaths = !invert,
            _ => positional.push(arg),
        }
    }

    if positional.len() >= 2 {
        let name = positional[0].clone();
        let value = positional[1..]
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let platform = shell.platform.as_ref();
        shell.env.set(platform, &name, &value);
    }

    Ok(0)
}

fn echo_builtin(shell: &Shell, args: &[String], output_fd: Option<RawFd>, sep: &str) -> Result<i32> {
    let mut text = args.join(sep);
    text.push('\n');
    write_out(shell, output_fd, &text);
    Ok(0)
}

/// Minimal C-style `printf`: `%s`, `%d`, `%%`, literal text. Extra format
/// specifiers beyond the supplied arguments render as empty/zero.
fn printf_builtin(shell: &Shell, args: &[String], output_fd: Option<RawFd>) -> Result<i32> {
    let fmt = match args.first() {
        Some(f) => f,
        None => return Err(ShellError::BuiltinUsage("printf: usage: printf FMT [ARGS...]".into())),
    };
    let rest = &args[1..];
    let mut out = String::new();
    let mut arg_idx = 0;
    let mut chars = fmt.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some('s') => {
                out.push_str(rest.get(arg_idx).map(String::as_str).unwrap_or(""));
                arg_idx += 1;
            }
            Some('d') => {
                let n: i64 = rest
                    .get(arg_idx)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0);
                out.push_str(&n.to_string());
                arg_idx += 1;
            }
            Some(other) => {
                return Err(ShellError::BuiltinUsage(format!(
                    "printf: unsupported format specifier '%{other}'"
                )));
            }
            None => return Err(ShellError::BuiltinUsage("printf: trailing '%'".into())),
        }
    }

    write_out(shell, output_fd, &out);
    Ok(0)
}

fn umask_builtin(shell: &mut Shell, args: &[String], output_fd: Option<RawFd>) -> Result<i32> {
    use nix::sys::stat::{umask, Mode};

    let print_numeric = args.first().map(String::as_str) == Some("-s");
    let mask_arg = if print_numeric { args.get(1) } else { args.first() };

    let new_mask = match mask_arg {
        Some(s) => match u32::from_str_radix(s, 8) {
            Ok(m) => m,
            Err(_) => {
                return Err(ShellError::BuiltinUsage(format!("umask: invalid mask: {s}")));
            }
        },
        None => {
            let current = umask(Mode::empty());
            umask(current);
            if print_numeric {
                write_out(shell, output_fd, &format!("{:04o}\n", current.bits()));
            }
            return Ok(0);
        }
    };

    let mode = Mode::from_bits_truncate(new_mask);
    umask(mode);
    if print_numeric {
        write_out(shell, output_fd, &format!("{new_mask:04o}\n"));
    }
    Ok(0)
}

fn builtins_builtin(shell: &Shell, output_fd: Option<RawFd>) -> Result<i32> {
    let text = NAMES
        .iter()
        .map(|n| format!("{n}\n"))
        .collect::<Vec<_>>()
        .concat();
    write_out(shell, output_fd, &text);
    Ok(0)
}

fn exit_builtin(args: &[String]) -> Result<i32> {
    let status: i32 = args.first().and_then(|s| s.parse().ok()).unwrap_or(0);
    std::process::exit(status);
}

fn source_builtin(shell: &mut Shell, args: &[String], output_fd: Option<RawFd>) -> Result<i32> {
    let path = match args.first() {
        Some(p) => p,
        None => return Err(ShellError::BuiltinUsage("source: usage: source FILE".into())),
    };
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("vbls: source: {path}: {e}");
            return Ok(1);
        }
    };
    let (ok, captured) = eval::eval_chunk(shell, &contents, output_fd.is_some());
    if !captured.is_empty() {
        write_out(shell, output_fd, &captured);
    }
    Ok(if ok { 0 } else { 1 })
}

fn equals_builtin(args: &[String]) -> Result<i32> {
    if args.len() != 2 {
        return Err(ShellError::BuiltinUsage("equals: usage: equals A B".into()));
    }
    Ok(if args[0] == args[1] { 0 } else { 1 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::UnixPlatform;

    fn shell() -> Shell {
        Shell::new(Box::new(UnixPlatform), false)
    }

    #[test]
    fn equals_compares_strings() {
        assert_eq!(equals_builtin(&["a".into(), "a".into()]).unwrap(), 0);
        assert_eq!(equals_builtin(&["a".into(), "b".into()]).unwrap(), 1);
    }

    #[test]
    fn colon_is_a_noop() {
        let mut s = shell();
        assert_eq!(dispatch(&mut s, &[":".into()], None).unwrap().unwrap(), 0);
    }

    #[test]
    fn alias_set_then_get_round_trips() {
        let mut s = shell();
        alias_builtin(&mut s, &["ll".into(), "ls -la".into()], None).unwrap();
        assert_eq!(s.aliases.get("ll"), Some("ls -la"));
    }

    #[test]
    fn render_value_escapes_control_chars() {
        assert_eq!(render_value("a\nb"), "a\\nb");
        assert_eq!(render_value("x\u{1b}y"), "x\\ey");
    }

    #[test]
    fn printf_handles_percent_s_and_d() {
        // can't easily capture raw-fd writes in a unit test without a pipe;
        // exercised at the formatting layer instead via a direct call whose
        // panics would surface format-string bugs.
        let s = shell();
        assert!(printf_builtin(&s, &["%s-%d".into(), "x".into(), "3".into()], None).is_ok());
    }
}
