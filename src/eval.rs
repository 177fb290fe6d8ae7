//! Evaluator / control flow: a recursive interpreter over
//! the token stream. Implements `if/elseif/else/end`, `for/in/do/end`,
//! command-chain dispatch, `errexit`, and captured output, all threaded
//! through one `Shell` value rather than globals.

use crate::alias;
use crate::error::{self, Result, ShellError};
use crate::exec;
use crate::lexer::{self, Keyword, Token};
use crate::state::Shell;

/// Evaluates one chunk of input: strip leading spaces, lex,
/// and evaluate the resulting tokens. Lex errors are reported and treated
/// as a clean (if unsuccessful) return: they abort only the current
/// chunk, never the shell.
pub fn eval_chunk(shell: &mut Shell, chunk: &str, capture: bool) -> (bool, String) {
    let trimmed = chunk.trim_start_matches([' ', '\t']);
    if trimmed.is_empty() {
        return (true, String::new());
    }

    match lexer::tokenize(trimmed) {
        Ok(tokens) => eval_tokens(shell, &tokens, capture),
        Err(e) => {
            error::report(&e);
            (false, String::new())
        }
    }
}

/// Convenience entry point for command substitution:
/// evaluate `chunk` with capture enabled and return just the captured
/// text. Never fails outright: lex/parse/runtime errors are reported to
/// stderr and simply yield an empty capture, same as a real subshell
/// whose command failed producing no output.
pub fn eval_capture(shell: &mut Shell, chunk: &str) -> Result<String> {
    let (_, captured) = eval_chunk(shell, chunk, true);
    Ok(captured)
}

/// The main loop: walks a flat token slice (already lexed,
/// possibly containing nested control-flow keywords) and executes it.
fn eval_tokens(shell: &mut Shell, tokens: &[Token], capture: bool) -> (bool, String) {
    let mut i = 0;
    let mut current: Vec<Token> = Vec::new();
    let mut captured = String::new();
    let mut ok = true;

    while i < tokens.len() {
        let is_last = i + 1 == tokens.len();

        match &tokens[i] {
            Token::Keyword(Keyword::If) | Token::Keyword(Keyword::Elseif) => {
                match eval_if(shell, tokens, i, capture) {
                    Ok((next_i, block_ok, block_cap)) => {
                        captured.push_str(&block_cap);
                        ok = ok && block_ok;
                        i = next_i;
                        continue;
                    }
                    Err(e) => {
                        error::report(&e);
                        ok = false;
                        break;
                    }
                }
            }
            Token::Keyword(Keyword::For) => match eval_for(shell, tokens, i, capture) {
                Ok((next_i, block_ok, block_cap)) => {
                    captured.push_str(&block_cap);
                    ok = ok && block_ok;
                    i = next_i;
                    continue;
                }
                Err(e) => {
                    error::report(&e);
                    ok = false;
                    break;
                }
            },
            Token::Keyword(Keyword::While) => {
                error::report(&ShellError::Parse(
                    "'while' is reserved but not implemented".into(),
                ));
                ok = false;
                break;
            }
            Token::Keyword(Keyword::Else) => {
                error::report(&ShellError::Parse("unexpected 'else'".into()));
                ok = false;
                break;
            }
            Token::Keyword(Keyword::End) => {
                error::report(&ShellError::Parse("unexpected 'end'".into()));
                ok = false;
                break;
            }
            Token::Keyword(kw @ (Keyword::Then | Keyword::Do | Keyword::In)) => {
                error::report(&ShellError::Parse(format!(
                    "unexpected '{}'",
                    Token::Keyword(*kw).text()
                )));
                ok = false;
                break;
            }
            Token::Sep(sep) => {
                if current.is_empty() {
                    if *sep == ';' {
                        error::report(&ShellError::Parse("unexpected ';'".into()));
                        ok = false;
                        break;
                    }
                } else {
                    let (status, out) = run_chain(shell, &current, capture);
                    current.clear();
                    captured.push_str(&out);
                    if status != 0 {
                        ok = false;
                        if shell.options.errexit {
                            std::process::exit(1);
                        }
                        break;
                    }
                }
            }
            word_or_op => {
                append_to_command(shell, &mut current, word_or_op.clone(), &mut ok);
                if !ok {
                    break;
                }

                if is_last {
                    let (status, out) = run_chain(shell, &current, capture);
                    current.clear();
                    captured.push_str(&out);
                    if status != 0 {
                        ok = false;
                        if shell.options.errexit {
                            std::process::exit(1);
                        }
                    }
                }
            }
        }

        i += 1;
    }

    (ok, captured)
}

/// Appends a token to the in-progress command buffer, alias-expanding it
/// first if it is the first word of a fresh command.
fn append_to_command(shell: &Shell, current: &mut Vec<Token>, tok: Token, ok: &mut bool) {
    if current.is_empty() {
        if let Token::Word(word) = &tok {
            if let Some(expansion) = alias::expand_first_word(word, &shell.aliases) {
                match expansion {
                    Ok(expanded) => {
                        current.extend(expanded);
                        return;
                    }
                    Err(e) => {
                        error::report(&e);
                        *ok = false;
                        return;
                    }
                }
            }
        }
    }
    current.push(tok);
}

/// Runs a finished command buffer as a chain, reporting and normalizing
/// any executor error into a nonzero status rather than propagating it.
fn run_chain(shell: &mut Shell, chain: &[Token], capture: bool) -> (i32, String) {
    match exec::run_chain(shell, chain, capture) {
        Ok((status, out)) => {
            shell.last_status = status;
            (status, out)
        }
        Err(e) => {
            error::report(&e);
            shell.last_status = 1;
            (1, String::new())
        }
    }
}

/// Advances from `start`, collecting tokens up to (not including) the
/// first occurrence of `target` (the "read-to" helper).
fn read_to(tokens: &[Token], start: usize, target: Keyword) -> Result<(usize, Vec<Token>)> {
    let mut buf = Vec::new();
    let mut i = start;
    while i < tokens.len() {
        if let Token::Keyword(k) = &tokens[i] {
            if *k == target {
                return Ok((i, buf));
            }
        }
        buf.push(tokens[i].clone());
        i += 1;
    }
    Err(ShellError::Parse(format!(
        "missing '{}'",
        Token::Keyword(target).text()
    )))
}

/// The block-balancing helper: scans from `start`, treating the
/// caller as already one level deep inside an open block. Nested
/// `if`/`for`/`while` push the level up; `end` pulls it back down, and
/// reaching level 0 means we found THIS block's own closing `end`. That
/// always wins over `targets`, which are only honored at level 1 (i.e.
/// a sibling `else`/`elseif` directly inside our block, not a nested
/// one's).
fn balanced_seek(
    tokens: &[Token],
    start: usize,
    targets: &[Keyword],
) -> Result<(usize, Vec<Token>)> {
    let mut level: i32 = 1;
    let mut buf = Vec::new();
    let mut i = start;
    while i < tokens.len() {
        match &tokens[i] {
            Token::Keyword(Keyword::If) | Token::Keyword(Keyword::For) | Token::Keyword(Keyword::While) => {
                level += 1;
                buf.push(tokens[i].clone());
            }
            Token::Keyword(Keyword::End) => {
                level -= 1;
                if level == 0 {
                    return Ok((i, buf));
                }
                buf.push(tokens[i].clone());
            }
            Token::Keyword(k) if level == 1 && targets.contains(k) => {
                return Ok((i, buf));
            }
            other => buf.push(other.clone()),
        }
        i += 1;
    }
    Err(ShellError::Parse("unbalanced block".into()))
}

/// Evaluates an `if`/`elseif` chain starting at token index `i` (which
/// holds the `if`/`elseif` keyword itself). Returns the index just past
/// the chain's matching `end`, whether the taken branch succeeded, and
/// its captured output.
fn eval_if(
    shell: &mut Shell,
    tokens: &[Token],
    i: usize,
    capture: bool,
) -> Result<(usize, bool, String)> {
    let (then_idx, cond_tokens) = read_to(tokens, i + 1, Keyword::Then)?;
    // A trailing ';' before `then` is the ordinary command terminator.
    let cond_tokens: Vec<Token> = cond_tokens
        .into_iter()
        .filter(|t| !matches!(t, Token::Sep(_)))
        .collect();
    let (cond_status, _) = run_chain(shell, &cond_tokens, true);

    let block_start = then_idx + 1;
    let (stop_idx, block_tokens) =
        balanced_seek(tokens, block_start, &[Keyword::Else, Keyword::Elseif])?;

    if cond_status == 0 {
        let (block_ok, block_cap) = eval_tokens(shell, &block_tokens, capture);
        let next_i = skip_rest_of_if(tokens, stop_idx)?;
        Ok((next_i, block_ok, block_cap))
    } else {
        match tokens.get(stop_idx) {
            Some(Token::Keyword(Keyword::Else)) => {
                let (end_idx, else_tokens) = balanced_seek(tokens, stop_idx + 1, &[])?;
                let (block_ok, block_cap) = eval_tokens(shell, &else_tokens, capture);
                Ok((end_idx + 1, block_ok, block_cap))
            }
            Some(Token::Keyword(Keyword::Elseif)) => {
                eval_if(shell, tokens, stop_idx, capture)
            }
            Some(Token::Keyword(Keyword::End)) => Ok((stop_idx + 1, true, String::new())),
            _ => Err(ShellError::Parse("unbalanced block".into())),
        }
    }
}

/// Skips over any remaining `elseif`/`else` clauses following a taken
/// `if`/`elseif` branch, without evaluating them, returning the index
/// just past the whole chain's matching `end`.
fn skip_rest_of_if(tokens: &[Token], idx: usize) -> Result<usize> {
    match tokens.get(idx) {
        Some(Token::Keyword(Keyword::End)) => Ok(idx + 1),
        Some(Token::Keyword(Keyword::Else)) => {
            let (end_idx, _) = balanced_seek(tokens, idx + 1, &[])?;
            Ok(end_idx + 1)
        }
        Some(Token::Keyword(Keyword::Elseif)) => {
            let (then_idx, _cond) = read_to(tokens, idx + 1, Keyword::Then)?;
            let (stop_idx, _block) =
                balanced_seek(tokens, then_idx + 1, &[Keyword::Else, Keyword::Elseif])?;
            skip_rest_of_if(tokens, stop_idx)
        }
        _ => Err(ShellError::Parse("unbalanced block".into())),
    }
}

/// Evaluates a `for VAR in CHAIN do ... end` loop starting at the `for`
/// keyword. The loop variable's prior value is always restored, even if
/// a body iteration fails.
fn eval_for(
    shell: &mut Shell,
    tokens: &[Token],
    i: usize,
    capture: bool,
) -> Result<(usize, bool, String)> {
    let (do_idx, header) = read_to(tokens, i + 1, Keyword::Do)?;

    let mut header_iter = header.into_iter();
    let var_name = match header_iter.next() {
        Some(Token::Word(w)) => w,
        _ => return Err(ShellError::Parse("malformed 'for' header".into())),
    };
    match header_iter.next() {
        Some(Token::Keyword(Keyword::In)) => {}
        _ => return Err(ShellError::Parse("expected 'in' in 'for' header".into())),
    }
    // A trailing ';' before `do` (as in "for x in a b; do ... end") is the
    // ordinary command terminator, not part of the iterated chain.
    let chain_tokens: Vec<Token> = header_iter
        .take_while(|t| !matches!(t, Token::Sep(_)))
        .collect();

    let (end_idx, body_tokens) = balanced_seek(tokens, do_idx + 1, &[])?;

    // `echo_nl CHAIN`: the header's own first word plays the
    // role of a nominal list-producing command name and is discarded;
    // `echo_nl` takes over as the actual command, so "in echo one two
    // three" iterates over "one", "two", "three".
    let mut chain_iter = chain_tokens.into_iter();
    chain_iter.next();
    let mut echo_tokens = vec![Token::Word("echo_nl".to_string())];
    echo_tokens.extend(chain_iter);
    let (_status, list_output) = run_chain(shell, &echo_tokens, true);

    let prior = shell.env.get(&var_name).map(str::to_string);
    let mut loop_ok = true;
    let mut loop_cap = String::new();

    for line in split_captured_lines(&list_output) {
        shell.env.set(shell.platform.as_ref(), &var_name, &line);
        let (body_ok, body_cap) = eval_tokens(shell, &body_tokens, capture);
        loop_cap.push_str(&body_cap);
        if !body_ok {
            loop_ok = false;
            break;
        }
    }

    match prior {
        Some(v) => shell.env.set(shell.platform.as_ref(), &var_name, &v),
        None => shell.env.unset(shell.platform.as_ref(), &var_name),
    }

    Ok((end_idx + 1, loop_ok, loop_cap))
}

/// Splits captured stdout into lines, dropping only the single trailing
/// empty artifact produced by a final newline ("for each
/// LF-delimited line").
fn split_captured_lines(captured: &str) -> Vec<String> {
    if captured.is_empty() {
        return Vec::new();
    }
    let mut lines: Vec<&str> = captured.split('\n').collect();
    if lines.last() == Some(&"") {
        lines.pop();
    }
    lines.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::UnixPlatform;

    fn shell() -> Shell {
        Shell::new(Box::new(UnixPlatform), false)
    }

    #[test]
    fn sequential_statements_both_run() {
        let mut s = shell();
        let (ok, _) = eval_chunk(&mut s, "echo a; echo b", false);
        assert!(ok);
    }

    #[test]
    fn bare_else_is_an_error() {
        let mut s = shell();
        let (ok, _) = eval_chunk(&mut s, "else", false);
        assert!(!ok);
    }

    #[test]
    fn bare_end_is_an_error() {
        let mut s = shell();
        let (ok, _) = eval_chunk(&mut s, "end", false);
        assert!(!ok);
    }

    #[test]
    fn if_true_branch_skips_else() {
        let mut s = shell();
        let (ok, out) = eval_chunk(&mut s, "if echo_nl x; then echo yes; else echo no; end", true);
        assert!(ok);
        assert!(out.contains("yes"));
        assert!(!out.contains("no"));
    }

    #[test]
    fn for_loop_restores_prior_variable() {
        let mut s = shell();
        let platform = UnixPlatform;
        s.env.set(&platform, "x", "outer");
        let (ok, _) = eval_chunk(&mut s, "for x in echo one two; do echo $x; end", true);
        assert!(ok);
        assert_eq!(s.env.get("x"), Some("outer"));
    }

    #[test]
    fn split_captured_lines_drops_only_trailing_newline() {
        assert_eq!(
            split_captured_lines("a\n\nb\n"),
            vec!["a".to_string(), "".to_string(), "b".to_string()]
        );
        assert_eq!(split_captured_lines(""), Vec::<String>::new());
    }
}
