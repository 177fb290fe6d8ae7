//! Prompt construction. `PS1` (default `"% "`) is expanded
//! left to right, substituting a small set of backslash escapes; there
//! is no powerline/segment machinery here, only plain text.

use crate::state::Shell;

const DEFAULT_PS1: &str = "% ";

/// Expands `PS1` against the shell's current state.
pub fn render(shell: &Shell) -> String {
    let template = shell.env.get("PS1").unwrap_or(DEFAULT_PS1).to_string();
    let home = shell.env.get("HOME").map(str::to_string);
    let cwd = shell
        .platform
        .getcwd()
        .map(|p| p.display().to_string())
        .unwrap_or_default();

    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('W') => out.push_str(&basename(&abbreviate_home(&cwd, home.as_deref()))),
            Some('w') => out.push_str(&abbreviate_home(&cwd, home.as_deref())),
            Some('h') => out.push_str(&hostname()),
            Some('v') => out.push_str(env!("CARGO_PKG_VERSION")),
            Some('s') => out.push_str("vbls"),
            Some('u') => out.push_str(shell.env.get("USER").unwrap_or("")),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Replaces a leading `$HOME` in `path` with `~`.
fn abbreviate_home(path: &str, home: Option<&str>) -> String {
    match home {
        Some(home) if !home.is_empty() && path == home => "~".to_string(),
        Some(home) if !home.is_empty() && path.starts_with(&format!("{home}/")) => {
            format!("~{}", &path[home.len()..])
        }
        _ => path.to_string(),
    }
}

fn basename(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

/// `\h`. `nix` gates `gethostname` behind a feature this crate
/// doesn't otherwise need, so this reads the environment the same way a
/// POSIX shell's `uname -n` fallback would.
fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::UnixPlatform;

    fn shell() -> Shell {
        Shell::new(Box::new(UnixPlatform), true)
    }

    #[test]
    fn default_prompt_is_percent() {
        let s = shell();
        assert_eq!(render(&s), "% ");
    }

    #[test]
    fn custom_ps1_expands_literal_and_shell_escape() {
        let mut s = shell();
        let platform = UnixPlatform;
        s.env.set(&platform, "PS1", "\\s> ");
        assert_eq!(render(&s), "vbls> ");
    }

    #[test]
    fn home_is_abbreviated_with_tilde() {
        assert_eq!(abbreviate_home("/home/alice/proj", Some("/home/alice")), "~/proj");
        assert_eq!(abbreviate_home("/home/alice", Some("/home/alice")), "~");
        assert_eq!(abbreviate_home("/etc", Some("/home/alice")), "/etc");
    }

    #[test]
    fn basename_takes_final_component() {
        assert_eq!(basename("~/proj/src"), "src");
        assert_eq!(basename("/"), "");
    }
}
