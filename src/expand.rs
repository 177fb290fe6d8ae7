//! Substitution & glob engine. Applied to each command word,
//! left to right, in a fixed priority: command substitution, then the
//! bare `;` cleanup, then globbing, then parameter expansion. Each word
//! takes exactly one of these branches: parameter expansion never runs
//! on a word that command substitution or globbing already produced.

use crate::eval;
use crate::platform::looks_like_glob;
use crate::state::Shell;

/// Expands one command's word list into its final argv, running command
/// substitution (which recursively re-enters the evaluator) as needed.
pub fn expand_words(shell: &mut Shell, words: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(words.len());
    for word in words {
        if let Some(inner) = strip_command_substitution(&word) {
            let captured = eval::eval_capture(shell, inner).unwrap_or_default();
            if !captured.is_empty() {
                let mut lines: Vec<&str> = captured.split('\n').collect();
                if lines.last() == Some(&"") {
                    lines.pop();
                }
                out.extend(lines.into_iter().map(str::to_string));
            }
            continue;
        }

        if word == ";" {
            continue;
        }

        if looks_like_glob(&word) {
            let matches = shell.platform.glob(&word);
            if !matches.is_empty() {
                out.extend(matches.into_iter().map(|p| p.display().to_string()));
                continue;
            }
            out.push(word);
            continue;
        }

        out.push(expand_parameters(&word, shell));
    }
    out
}

fn strip_command_substitution(word: &str) -> Option<&str> {
    if word.starts_with("$(") && word.ends_with(')') && word.len() >= 3 {
        Some(&word[2..word.len() - 1])
    } else {
        None
    }
}

/// Expands `$NAME`, `${NAME}`, `$?`, and `$$` inside `word`.
fn expand_parameters(word: &str, shell: &Shell) -> String {
    let mut out = String::with_capacity(word.len());
    let mut chars = word.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        match chars.peek() {
            Some('?') => {
                chars.next();
                out.push_str(&shell.last_status.to_string());
            }
            Some('$') => {
                chars.next();
                out.push_str(&shell.pid.to_string());
            }
            Some('{') => {
                chars.next();
                let mut name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    name.push(c);
                }
                out.push_str(shell.env.get(&name).unwrap_or(""));
            }
            Some(c) if c.is_ascii_alphanumeric() || *c == '_' => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(shell.env.get(&name).unwrap_or(""));
            }
            _ => out.push('$'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::UnixPlatform;

    fn shell() -> Shell {
        Shell::new(Box::new(UnixPlatform), false)
    }

    #[test]
    fn expands_braced_and_bare_names() {
        let mut s = shell();
        let platform = UnixPlatform;
        s.env.set(&platform, "GREETING", "hi");
        assert_eq!(expand_parameters("${GREETING}!", &s), "hi!");
        assert_eq!(expand_parameters("$GREETING!", &s), "hi!");
    }

    #[test]
    fn unset_variable_expands_empty() {
        let s = shell();
        assert_eq!(expand_parameters("[$NO_SUCH_VAR_XYZ]", &s), "[]");
    }

    #[test]
    fn exit_status_and_pid() {
        let mut s = shell();
        s.last_status = 7;
        assert_eq!(expand_parameters("$?", &s), "7");
        assert_eq!(expand_parameters("$$", &s), s.pid.to_string());
    }

    #[test]
    fn command_substitution_is_detected() {
        assert_eq!(strip_command_substitution("$(echo hi)"), Some("echo hi"));
        assert_eq!(strip_command_substitution("$()"), Some(""));
        assert_eq!(strip_command_substitution("echo"), None);
    }
}
