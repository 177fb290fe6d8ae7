//! Tokenizer for a chunk of shell input.
//!
//! `tokenize` is a pure function over a `&str`: no access to the shell
//! state, the environment, or the filesystem. Quoting is Plan 9 rc style:
//! `'` delimits strings, `''` inside a string is a literal quote, `#`
//! starts a line comment, and `$(...)` spans are carried through as a
//! single token for the evaluator to re-enter.

use crate::error::ShellError;

/// A lexical token. Separators, operators, and keywords are distinct
/// variants rather than magic strings, so the evaluator need not
/// string-compare them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Word(String),
    Sep(char),
    Op(Op),
    Keyword(Keyword),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Pipe,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    If,
    Elseif,
    Else,
    Then,
    For,
    In,
    Do,
    End,
    While,
}

impl Keyword {
    fn from_word(word: &str) -> Option<Keyword> {
        Some(match word {
            "if" => Keyword::If,
            "elseif" => Keyword::Elseif,
            "else" => Keyword::Else,
            "then" => Keyword::Then,
            "for" => Keyword::For,
            "in" => Keyword::In,
            "do" => Keyword::Do,
            "end" => Keyword::End,
            "while" => Keyword::While,
            _ => return None,
        })
    }
}

impl Op {
    fn from_word(word: &str) -> Option<Op> {
        Some(match word {
            "|" => Op::Pipe,
            "&&" => Op::And,
            "||" => Op::Or,
            _ => return None,
        })
    }
}

impl Token {
    /// Classifies a finished word into `Keyword`, `Op`, or plain `Word`.
    fn classify(word: String) -> Token {
        if let Some(kw) = Keyword::from_word(&word) {
            Token::Keyword(kw)
        } else if let Some(op) = Op::from_word(&word) {
            Token::Op(op)
        } else {
            Token::Word(word)
        }
    }

    /// The literal text that produced this token, used by command
    /// substitution re-entry and by error messages.
    pub fn text(&self) -> String {
        match self {
            Token::Word(w) => w.clone(),
            Token::Sep(c) => c.to_string(),
            Token::Op(Op::Pipe) => "|".to_string(),
            Token::Op(Op::And) => "&&".to_string(),
            Token::Op(Op::Or) => "||".to_string(),
            Token::Keyword(k) => format!("{k:?}").to_lowercase(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    InString,
    InComment,
    InSubst,
}

struct Lexer {
    tokens: Vec<Token>,
    acc: String,
    /// True once the in-progress word has been "opened" explicitly (a
    /// character was appended, or a quote was entered). Distinguishes a
    /// genuinely empty token (`''`) from no token at all.
    word_active: bool,
    state: State,
    subst_depth: u32,
    /// Last character consumed, used for the `''` literal-quote rule.
    prev_char: Option<char>,
    /// Set after a `\` inside a string; the next character is an escape
    /// code rather than ordinary content.
    pending_escape: bool,
}

impl Lexer {
    fn new() -> Self {
        Lexer {
            tokens: Vec::new(),
            acc: String::new(),
            word_active: false,
            state: State::Normal,
            subst_depth: 0,
            prev_char: None,
            pending_escape: false,
        }
    }

    fn flush_word(&mut self) {
        if self.word_active {
            let word = std::mem::take(&mut self.acc);
            self.tokens.push(Token::classify(word));
            self.word_active = false;
        }
    }

    fn push_sep(&mut self, c: char) {
        self.flush_word();
        self.tokens.push(Token::Sep(c));
    }

    fn append(&mut self, c: char) {
        self.acc.push(c);
        self.word_active = true;
    }

    fn run(mut self, chunk: &str) -> Result<Vec<Token>, ShellError> {
        for c in chunk.chars() {
            match self.state {
                State::Normal => self.step_normal(c)?,
                State::InString => self.step_in_string(c),
                State::InComment => self.step_in_comment(c),
                State::InSubst => self.step_in_subst(c),
            }
            self.prev_char = Some(c);
        }

        match self.state {
            State::InString => {
                return Err(ShellError::Lex(format!(
                    "unterminated string: '{}",
                    self.acc
                )));
            }
            State::InSubst => {
                return Err(ShellError::Lex(format!(
                    "unterminated substitution: {}",
                    self.acc
                )));
            }
            State::InComment | State::Normal => {}
        }

        self.flush_word();
        Ok(self.tokens)
    }

    fn step_normal(&mut self, c: char) -> Result<(), ShellError> {
        match c {
            '#' => {
                self.flush_word();
                self.state = State::InComment;
            }
            '\'' => {
                if self.prev_char == Some('\'') {
                    // `''` inside an already-closed string: a literal quote
                    // that continues into a new quoted segment.
                    self.append('\'');
                }
                self.word_active = true;
                self.state = State::InString;
            }
            '(' if self.acc.ends_with('$') && self.acc.len() == 1 => {
                self.acc.push('(');
                self.subst_depth = 1;
                self.state = State::InSubst;
            }
            ';' | '\n' => self.push_sep(c),
            ' ' | '\t' => self.flush_word(),
            '\\' => { /* meaningful only inside strings; deferred here */ }
            _ => self.append(c),
        }
        Ok(())
    }

    fn step_in_string(&mut self, c: char) {
        if self.pending_escape {
            self.pending_escape = false;
            match c {
                '\\' => self.append('\\'),
                'n' => self.append('\n'),
                't' => self.append('\t'),
                'e' => self.append('\u{1b}'),
                'a' => self.append('\u{07}'),
                other => {
                    self.append('\\');
                    self.append(other);
                }
            }
            return;
        }

        match c {
            '\\' => self.pending_escape = true,
            '\'' => self.state = State::Normal,
            _ => self.append(c),
        }
    }

    fn step_in_comment(&mut self, c: char) {
        if c == '\n' {
            self.state = State::Normal;
            self.push_sep(c);
        }
        // every other character inside a comment is discarded
    }

    fn step_in_subst(&mut self, c: char) {
        match c {
            '(' => {
                if self.prev_char == Some('$') {
                    self.subst_depth += 1;
                }
                self.append(c);
            }
            ')' => {
                self.subst_depth -= 1;
                self.append(c);
                if self.subst_depth == 0 {
                    self.state = State::Normal;
                }
            }
            _ => self.append(c),
        }
    }
}

/// Tokenizes one chunk of shell input. Pure and deterministic: the same
/// input always produces the same token sequence or the same error.
pub fn tokenize(chunk: &str) -> Result<Vec<Token>, ShellError> {
    Lexer::new().run(chunk)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(tokens: &[Token]) -> Vec<String> {
        tokens
            .iter()
            .filter_map(|t| match t {
                Token::Word(w) => Some(w.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn simple_words() {
        let toks = tokenize("echo hello world").unwrap();
        assert_eq!(words(&toks), vec!["echo", "hello", "world"]);
    }

    #[test]
    fn semicolon_separates_and_is_its_own_token() {
        let toks = tokenize("echo a; echo b").unwrap();
        assert_eq!(
            toks,
            vec![
                Token::Word("echo".into()),
                Token::Word("a".into()),
                Token::Sep(';'),
                Token::Word("echo".into()),
                Token::Word("b".into()),
            ]
        );
    }

    #[test]
    fn doubled_single_quote_is_literal() {
        let toks = tokenize("'it''s fine'").unwrap();
        assert_eq!(toks, vec![Token::Word("it's fine".into())]);
    }

    #[test]
    fn empty_quoted_string_is_an_empty_word() {
        let toks = tokenize("''").unwrap();
        assert_eq!(toks, vec![Token::Word(String::new())]);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = tokenize("'abc").unwrap_err();
        assert!(matches!(err, ShellError::Lex(_)));
    }

    #[test]
    fn command_substitution_is_one_token() {
        let toks = tokenize("echo $(echo inner) tail").unwrap();
        assert_eq!(
            toks,
            vec![
                Token::Word("echo".into()),
                Token::Word("$(echo inner)".into()),
                Token::Word("tail".into()),
            ]
        );
    }

    #[test]
    fn nested_command_substitution() {
        let toks = tokenize("$(echo $(echo x))").unwrap();
        assert_eq!(toks, vec![Token::Word("$(echo $(echo x))".into())]);
    }

    #[test]
    fn bare_paren_inside_substitution_does_not_deepen_it() {
        // Only a `(` immediately preceded by `$` deepens a substitution
        // span; a bare `(` leaves depth unchanged, so its matching `)`
        // closes the span early.
        let toks = tokenize("$(echo (a) b)").unwrap();
        assert_eq!(
            toks,
            vec![Token::Word("$(echo (a)".into()), Token::Word("b)".into())]
        );
    }

    #[test]
    fn unterminated_substitution_is_an_error() {
        let err = tokenize("$(echo x").unwrap_err();
        assert!(matches!(err, ShellError::Lex(_)));
    }

    #[test]
    fn comment_is_stripped_to_end_of_line() {
        let toks = tokenize("echo hi # trailing comment\necho bye").unwrap();
        assert_eq!(words(&toks), vec!["echo", "hi", "echo", "bye"]);
    }

    #[test]
    fn comment_inside_quotes_is_literal() {
        let toks = tokenize("'a # b'").unwrap();
        assert_eq!(toks, vec![Token::Word("a # b".into())]);
    }

    #[test]
    fn escapes_inside_strings() {
        let toks = tokenize(r"'a\tb\nc\\d\e\a'").unwrap();
        assert_eq!(
            toks,
            vec![Token::Word("a\tb\nc\\d\u{1b}\u{07}".into())]
        );
    }

    #[test]
    fn unknown_escape_keeps_backslash() {
        let toks = tokenize(r"'a\zb'").unwrap();
        assert_eq!(toks, vec![Token::Word(r"a\zb".into())]);
    }

    #[test]
    fn keywords_and_operators_are_classified() {
        let toks = tokenize("if a then b else c end").unwrap();
        assert_eq!(
            toks,
            vec![
                Token::Keyword(Keyword::If),
                Token::Word("a".into()),
                Token::Keyword(Keyword::Then),
                Token::Word("b".into()),
                Token::Keyword(Keyword::Else),
                Token::Word("c".into()),
                Token::Keyword(Keyword::End),
            ]
        );

        let toks = tokenize("a | b && c || d").unwrap();
        assert_eq!(
            toks,
            vec![
                Token::Word("a".into()),
                Token::Op(Op::Pipe),
                Token::Word("b".into()),
                Token::Op(Op::And),
                Token::Word("c".into()),
                Token::Op(Op::Or),
                Token::Word("d".into()),
            ]
        );
    }

    #[test]
    fn backslash_outside_string_is_dropped() {
        let toks = tokenize(r"a\b").unwrap();
        assert_eq!(words(&toks), vec!["ab"]);
    }
}
