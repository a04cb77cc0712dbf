//! Lexical analysis (tokenization) of a single command line into argument words.

use thiserror::Error;

/// Quoting dialect used when splitting a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuoteStyle {
    /// Single quotes, double quotes and backslash escapes as in a POSIX shell.
    #[default]
    Posix,
    /// Only double quotes group words; `\"` and `\\` are the only escapes and
    /// are recognized inside double quotes only.
    Windows,
}

impl QuoteStyle {
    /// Characters a backslash may escape inside double quotes.
    fn escapes_in_double_quotes(self, ch: char) -> bool {
        match self {
            QuoteStyle::Posix => matches!(ch, '"' | '\\' | '$' | '`'),
            QuoteStyle::Windows => matches!(ch, '"' | '\\'),
        }
    }
}

/// Errors that can occur during the lexical analysis process.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LexingError {
    /// A closing quote (single or double) was not found.
    #[error("unexpected end of line while looking for matching `{0}`")]
    UnfinishedQuote(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingSingleQuote,
    ReadingDoubleQuote,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    style: QuoteStyle,
    buffer: String,
    // set once the current word has a character or an opened quote
    word_started: bool,
    dangling_backslash: bool,
}

impl LexingFSM {
    /// Creates a new instance of the lexical analysis Finite State Machine.
    fn new(line: &str, style: QuoteStyle) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Start,
            style,
            buffer: String::new(),
            word_started: false,
            dangling_backslash: false,
        }
    }

    /// Runs the machine over the whole line and returns the collected words.
    ///
    /// A word is emitted when the machine leaves `ReadingWord` on whitespace or
    /// at the end of input, provided it received a character or a quote. That
    /// is how `""` turns into an empty argument while whitespace and line
    /// continuations never do.
    fn make_tokens(&mut self) -> Result<Vec<String>, LexingError> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Start => self.handle_start(ch, &mut out),
                LexingState::ReadingWord => self.handle_word(ch, &mut out),
                LexingState::ReadingSingleQuote => self.handle_single_quote(ch),
                LexingState::ReadingDoubleQuote => self.handle_double_quote(ch),
            }
        }

        match self.state {
            LexingState::ReadingSingleQuote => return Err(LexingError::UnfinishedQuote('\'')),
            LexingState::ReadingDoubleQuote => return Err(LexingError::UnfinishedQuote('"')),
            LexingState::ReadingWord => self.finish_word(&mut out),
            LexingState::Start => {}
        }

        Ok(out)
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn finish_word(&mut self, out: &mut Vec<String>) {
        if self.word_started {
            out.push(std::mem::take(&mut self.buffer));
            self.word_started = false;
        }
        self.state = LexingState::Start;
    }

    fn push_char(&mut self, ch: char) {
        self.buffer.push(ch);
        self.word_started = true;
    }

    fn open_quote(&mut self, state: LexingState) {
        self.state = state;
        self.word_started = true;
    }

    fn handle_start(&mut self, ch: char, out: &mut Vec<String>) {
        match ch {
            ' ' | '\t' => {}
            c => {
                self.state = LexingState::ReadingWord;
                self.handle_word(c, out);
            }
        }
    }

    fn handle_word(&mut self, ch: char, out: &mut Vec<String>) {
        match (ch, self.style) {
            (' ' | '\t', _) => self.finish_word(out),
            ('"', _) => self.open_quote(LexingState::ReadingDoubleQuote),
            ('\'', QuoteStyle::Posix) => self.open_quote(LexingState::ReadingSingleQuote),
            ('\\', QuoteStyle::Posix) => match self.read_char() {
                // line continuation
                Some('\n') => {}
                Some(escaped) => self.push_char(escaped),
                None => {
                    self.dangling_backslash = true;
                    self.push_char('\\');
                }
            },
            (c, _) => self.push_char(c),
        }
    }

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => self.state = LexingState::ReadingWord,
            c => self.buffer.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) {
        match ch {
            '"' => self.state = LexingState::ReadingWord,
            '\\' => match self.peek_char() {
                Some(next) if self.style.escapes_in_double_quotes(next) => {
                    self.read_char();
                    self.buffer.push(next);
                }
                _ => self.buffer.push('\\'),
            },
            c => self.buffer.push(c),
        }
    }
}

/// The main entry point function to perform lexical analysis.
///
/// Splits `line` into argument words following the quoting rules of `style`.
/// An unclosed quote is reported as [`LexingError::UnfinishedQuote`]; callers
/// should abort the command instead of running a partial one.
pub fn split_into_tokens(line: &str, style: QuoteStyle) -> Result<Vec<String>, LexingError> {
    let mut lexer = LexingFSM::new(line, style);
    lexer.make_tokens()
}

/// Whether `line` ends in a backslash that escapes nothing, outside quotes.
///
/// Such a line continues on the next physical line: joining the two with a
/// `\n` lets the backslash-newline pair vanish during tokenization.
pub fn needs_continuation(line: &str, style: QuoteStyle) -> bool {
    let mut lexer = LexingFSM::new(line, style);
    lexer.make_tokens().is_ok() && lexer.dangling_backslash
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posix(line: &str) -> Result<Vec<String>, LexingError> {
        split_into_tokens(line, QuoteStyle::Posix)
    }

    fn windows(line: &str) -> Result<Vec<String>, LexingError> {
        split_into_tokens(line, QuoteStyle::Windows)
    }

    #[test]
    fn test_whitespace_runs_collapse() {
        assert_eq!(
            posix("echo  hello   world").unwrap(),
            vec!["echo", "hello", "world"]
        );
        assert_eq!(posix(" \t ls\t-l  ").unwrap(), vec!["ls", "-l"]);
        assert!(posix("   ").unwrap().is_empty());
        assert!(posix("").unwrap().is_empty());
    }

    #[test]
    fn test_single_quotes_are_literal() {
        assert_eq!(posix("echo 'a  b'").unwrap(), vec!["echo", "a  b"]);
        assert_eq!(posix(r"echo 'a\nb\'").unwrap(), vec!["echo", r"a\nb\"]);
        assert_eq!(posix(r#"echo '"x"'"#).unwrap(), vec!["echo", r#""x""#]);
    }

    #[test]
    fn test_double_quote_escapes() {
        assert_eq!(posix(r#"echo "a\"b""#).unwrap(), vec!["echo", "a\"b"]);
        assert_eq!(
            posix(r#"echo "\\ \$ \` \n""#).unwrap(),
            vec!["echo", r"\ $ ` \n"]
        );
        assert_eq!(posix(r#"echo "it's""#).unwrap(), vec!["echo", "it's"]);
    }

    #[test]
    fn test_empty_quotes_make_empty_token() {
        assert_eq!(posix(r#"echo """#).unwrap(), vec!["echo", ""]);
        assert_eq!(posix("echo '' x").unwrap(), vec!["echo", "", "x"]);
    }

    #[test]
    fn test_adjacent_quotes_join() {
        assert_eq!(posix(r#"a"b c"'d e'f"#).unwrap(), vec!["ab cd ef"]);
    }

    #[test]
    fn test_backslash_outside_quotes() {
        assert_eq!(posix(r"echo a\ b").unwrap(), vec!["echo", "a b"]);
        assert_eq!(posix(r"echo \'x\'").unwrap(), vec!["echo", "'x'"]);
        assert_eq!(posix(r"echo \n").unwrap(), vec!["echo", "n"]);
        assert_eq!(posix("echo ab\\\ncd").unwrap(), vec!["echo", "abcd"]);
        assert_eq!(posix(r"echo a\").unwrap(), vec!["echo", r"a\"]);
        assert_eq!(posix("echo a \\\n b").unwrap(), vec!["echo", "a", "b"]);
        assert_eq!(posix("echo \\\n").unwrap(), vec!["echo"]);
        assert_eq!(posix("\\\n''").unwrap(), vec![""]);
    }

    #[test]
    fn test_trailing_backslash_needs_continuation() {
        assert!(needs_continuation(r"echo a\", QuoteStyle::Posix));
        assert!(needs_continuation(r"\", QuoteStyle::Posix));
        assert!(!needs_continuation(r"echo a\\", QuoteStyle::Posix));
        assert!(!needs_continuation(r"echo 'a\'", QuoteStyle::Posix));
        assert!(!needs_continuation(r"echo 'a\", QuoteStyle::Posix));
        assert!(!needs_continuation("echo a\\\nb", QuoteStyle::Posix));
        assert!(!needs_continuation(r"echo a\", QuoteStyle::Windows));
    }

    #[test]
    fn test_unclosed_quote_errors() {
        assert_eq!(
            posix("echo 'unterminated"),
            Err(LexingError::UnfinishedQuote('\''))
        );
        assert_eq!(posix(r#"echo "abc"#), Err(LexingError::UnfinishedQuote('"')));
        assert_eq!(
            posix(r#"echo "a\"#),
            Err(LexingError::UnfinishedQuote('"'))
        );
    }

    #[test]
    fn test_windows_style_quoting() {
        assert_eq!(
            windows(r#"dir "C:\Program Files""#).unwrap(),
            vec!["dir", r"C:\Program Files"]
        );
        assert_eq!(windows(r"copy a\b c\d").unwrap(), vec!["copy", r"a\b", r"c\d"]);
        assert_eq!(windows("echo 'a b'").unwrap(), vec!["echo", "'a", "b'"]);
        assert_eq!(
            windows(r#"echo "say \"hi\" \\ \n""#).unwrap(),
            vec!["echo", r#"say "hi" \ \n"#]
        );
        assert_eq!(windows("echo 'x"), Ok(vec!["echo".to_string(), "'x".to_string()]));
        assert_eq!(windows(r#"echo "x"#), Err(LexingError::UnfinishedQuote('"')));
    }
}
