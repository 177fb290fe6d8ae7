//! End-to-end scenarios, exercised directly against `eval::eval_chunk`
//! rather than spawning the `vbls` binary, since the core's contract is
//! defined in terms of (chunk in) -> (status, captured output) out.

use std::io::Write;

use vbls::eval;
use vbls::platform::UnixPlatform;
use vbls::state::Shell;

fn shell() -> Shell {
    Shell::new(Box::new(UnixPlatform), false)
}

#[test]
fn echo_joins_args_with_spaces() {
    let mut s = shell();
    let (ok, out) = eval::eval_chunk(&mut s, "echo hello world", true);
    assert!(ok);
    assert_eq!(out, "hello world\n");
}

#[test]
fn sequential_statements_accumulate_capture_in_order() {
    let mut s = shell();
    let (ok, out) = eval::eval_chunk(&mut s, "echo a; echo b", true);
    assert!(ok);
    assert_eq!(out, "a\nb\n");
}

#[test]
fn doubled_single_quote_is_a_literal_quote() {
    let mut s = shell();
    let (ok, out) = eval::eval_chunk(&mut s, "echo 'it''s fine'", true);
    assert!(ok);
    assert_eq!(out, "it's fine\n");
}

#[test]
fn for_loop_over_a_bare_word_list() {
    let mut s = shell();
    let (ok, out) = eval::eval_chunk(
        &mut s,
        "for x in echo one two three; do echo $x; end",
        true,
    );
    assert!(ok);
    assert_eq!(out, "one\ntwo\nthree\n");
}

#[test]
fn if_then_else_takes_the_true_branch() {
    let mut s = shell();
    let (ok, out) = eval::eval_chunk(
        &mut s,
        "if equals a a; then echo yes; else echo no; end",
        true,
    );
    assert!(ok);
    assert_eq!(out, "yes\n");
}

#[test]
fn if_then_else_takes_the_false_branch() {
    let mut s = shell();
    let (ok, out) = eval::eval_chunk(
        &mut s,
        "if equals a b; then echo yes; else echo no; end",
        true,
    );
    assert!(ok);
    assert_eq!(out, "no\n");
}

#[test]
fn command_substitution_splices_into_surrounding_words() {
    let mut s = shell();
    let (ok, out) = eval::eval_chunk(&mut s, "echo $(echo inner) tail", true);
    assert!(ok);
    assert_eq!(out, "inner tail\n");
}

#[test]
fn cd_to_a_missing_directory_leaves_pwd_unchanged() {
    let mut s = shell();
    let platform = UnixPlatform;
    s.env.set(&platform, "PWD", "/original");
    let (ok, _) = eval::eval_chunk(&mut s, "cd /no/such/vbls/test/dir", false);
    assert!(!ok, "a failing cd's nonzero status ends the chunk's evaluation");
    assert_eq!(s.env.get("PWD"), Some("/original"));
}

#[test]
fn and_or_chain_runs_the_or_branch_only_after_both_prior_stages_fail() {
    let mut s = shell();
    let (ok, out) = eval::eval_chunk(
        &mut s,
        "equals a b && echo unreached || echo fallback",
        true,
    );
    assert!(ok, "a chain whose final element succeeds is ok overall");
    assert_eq!(out, "fallback\n");
}

#[test]
fn leading_pipe_is_a_parse_error() {
    let mut s = shell();
    let (ok, _) = eval::eval_chunk(&mut s, "| echo a", false);
    assert!(!ok);
}

#[test]
fn empty_command_substitution_drops_the_argument() {
    let mut s = shell();
    let (ok, out) = eval::eval_chunk(&mut s, "echo_nl a $(:) b", true);
    assert!(ok);
    assert_eq!(out, "a\nb\n");
}

#[test]
fn an_element_whose_words_all_vanish_does_not_leak_its_pipe() {
    // `$(:)` captures nothing and is spliced away entirely, leaving the
    // first chain element with zero words; the chain must still close the
    // pipe it pre-allocated for the `|` and run the second element.
    let mut s = shell();
    let (ok, out) = eval::eval_chunk(&mut s, "$(:) | echo tail", true);
    assert!(ok);
    assert_eq!(out, "tail\n");
}

#[test]
fn set_then_echo_round_trips_a_variable() {
    let mut s = shell();
    let (ok, _) = eval::eval_chunk(&mut s, "set GREETING hello there", false);
    assert!(ok);
    let (ok, out) = eval::eval_chunk(&mut s, "echo ${GREETING}", true);
    assert!(ok);
    assert_eq!(out, "hello there\n");
}

#[test]
fn source_evaluates_a_real_file_in_the_caller_state() {
    let mut file = tempfile::NamedTempFile::new().expect("create temp script");
    writeln!(file, "set SOURCED yes").unwrap();
    writeln!(file, "echo from script").unwrap();
    file.flush().unwrap();

    let mut s = shell();
    let (ok, out) = eval::eval_chunk(&mut s, &format!("source {}", file.path().display()), true);
    assert!(ok);
    assert_eq!(out, "from script\n");
    assert_eq!(s.env.get("SOURCED"), Some("yes"));
}
