//! Alias expansion: applies only to the first word of a
//! fresh command, and the replacement is re-tokenized but never
//! recursively re-expanded.

use crate::error::Result;
use crate::lexer::{self, Token};
use crate::state::AliasTable;

/// Given the first word of a command, returns its alias expansion as a
/// freshly tokenized sequence, or `None` if the word isn't an alias.
pub fn expand_first_word(word: &str, aliases: &AliasTable) -> Option<Result<Vec<Token>>> {
    aliases
        .get(word)
        .map(|replacement| lexer::tokenize(replacement))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_only_known_aliases() {
        let mut table = AliasTable::default();
        table.set("ll", "ls -la");
        assert!(expand_first_word("ll", &table).is_some());
        assert!(expand_first_word("ls", &table).is_none());
    }

    #[test]
    fn replacement_is_tokenized() {
        let mut table = AliasTable::default();
        table.set("greet", "echo hello world");
        let toks = expand_first_word("greet", &table).unwrap().unwrap();
        assert_eq!(toks.len(), 3);
    }
}
