//! Surface tokenizer for raw input text.

/// One token with character and byte boundaries (both end-exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub begin: usize,
    pub end: usize,
    pub byte_begin: usize,
    pub byte_end: usize,
}

impl Token {
    /// The token's text within the string it was produced from.
    pub fn text<'t>(&self, source: &'t str) -> &'t str {
        &source[self.byte_begin..self.byte_end]
    }
}

/// Split `text` into tokens.
///
/// Maximal runs of alphanumeric characters form one token. Any other
/// non-whitespace character (including `_`) is a token by itself.
/// Whitespace only separates.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    // (byte offset, char offset) of the open alphanumeric run
    let mut run: Option<(usize, usize)> = None;
    let mut char_count = 0;

    for (char_pos, (byte_pos, c)) in text.char_indices().enumerate() {
        char_count = char_pos + 1;

        if c.is_alphanumeric() {
            run.get_or_insert((byte_pos, char_pos));
            continue;
        }

        if let Some((byte_begin, begin)) = run.take() {
            tokens.push(Token {
                begin,
                end: char_pos,
                byte_begin,
                byte_end: byte_pos,
            });
        }

        if !c.is_whitespace() {
            tokens.push(Token {
                begin: char_pos,
                end: char_pos + 1,
                byte_begin: byte_pos,
                byte_end: byte_pos + c.len_utf8(),
            });
        }
    }

    if let Some((byte_begin, begin)) = run {
        tokens.push(Token {
            begin,
            end: char_count,
            byte_begin,
            byte_end: text.len(),
        });
    }

    tokens
}
