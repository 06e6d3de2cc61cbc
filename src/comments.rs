//! Attribution of comments to tokens.
//!
//! Comments group into paragraphs which are donated to a neighbouring
//! non-skippable token as leading, trailing or detached-leading text. The
//! tracker runs once over the token stream when lowering begins; the
//! descriptor emitter reads the resulting map when building
//! `SourceCodeInfo`.

use std::collections::HashMap;

use crate::ast::{Token, TokenId, TokenKind};

/// Comments attributed to a single non-skippable token.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct TokenComments {
    pub(crate) leading: Option<String>,
    pub(crate) trailing: Option<String>,
    pub(crate) detached: Vec<String>,
}

#[derive(Debug, Default)]
pub(crate) struct CommentMap {
    map: HashMap<TokenId, TokenComments>,
}

impl CommentMap {
    pub(crate) fn get(&self, token: TokenId) -> Option<&TokenComments> {
        self.map.get(&token)
    }
}

/// One paragraph of comments under construction.
#[derive(Debug)]
struct Paragraph {
    /// Rendered comment bodies, one entry per comment token.
    parts: Vec<String>,
    /// Newlines between the previous significant token or paragraph and
    /// this paragraph's first comment.
    gap_before: u32,
}

impl Paragraph {
    fn render(&self) -> String {
        self.parts.concat()
    }
}

#[derive(Debug, Default)]
struct Tracker {
    map: HashMap<TokenId, TokenComments>,
    prev: Option<TokenId>,
    paragraphs: Vec<Paragraph>,
    current: Option<Paragraph>,
    /// Newlines seen since the last comment or non-skippable token.
    pending_newlines: u32,
    /// Newlines seen since the last non-skippable token.
    newlines_since_token: u32,
}

/// Builds the comment map for a token stream.
pub(crate) fn track(tokens: &[Token]) -> CommentMap {
    let mut tracker = Tracker::default();
    for (id, token) in tokens.iter().enumerate() {
        let id = id as TokenId;
        match token.kind {
            TokenKind::Whitespace => tracker.whitespace(&token.text),
            TokenKind::LineComment => tracker.line_comment(&token.text),
            TokenKind::BlockComment => tracker.block_comment(&token.text),
            _ => tracker.token(id, &token.text),
        }
    }
    tracker.finish();
    CommentMap { map: tracker.map }
}

impl Tracker {
    fn whitespace(&mut self, text: &str) {
        let newlines = text.bytes().filter(|&b| b == b'\n').count() as u32;
        if newlines == 0 {
            return;
        }
        self.pending_newlines += newlines;
        self.newlines_since_token = self.newlines_since_token.saturating_add(newlines);
        // A blank line terminates the open paragraph.
        if self.current.is_some() && self.pending_newlines >= 2 {
            self.close_current();
        }
    }

    fn line_comment(&mut self, text: &str) {
        if self.current.is_none() {
            self.current = Some(Paragraph {
                parts: Vec::new(),
                gap_before: self.pending_newlines,
            });
        }
        self.current
            .as_mut()
            .unwrap()
            .parts
            .push(render_line_comment(text));
        // A comment that shares the previous token's line stays a paragraph
        // of its own, so a comment on the next line starts fresh.
        if self.prev.is_some() && self.paragraphs.is_empty() && self.newlines_since_token == 0 {
            self.close_current();
        }
        self.pending_newlines = 0;
    }

    fn block_comment(&mut self, text: &str) {
        self.close_current();
        self.current = Some(Paragraph {
            parts: vec![render_block_comment(text)],
            gap_before: self.pending_newlines,
        });
        self.close_current();
        self.pending_newlines = 0;
    }

    fn token(&mut self, id: TokenId, text: &str) {
        self.close_current();
        self.donate(Some(id), is_opener(text));
        self.prev = Some(id);
        self.pending_newlines = 0;
        self.newlines_since_token = 0;
    }

    fn finish(&mut self) {
        self.close_current();
        self.donate(None, false);
    }

    fn close_current(&mut self) {
        if let Some(paragraph) = self.current.take() {
            self.paragraphs.push(paragraph);
        }
    }

    /// Distributes the accumulated paragraphs between the previous token
    /// (trailing) and the current one (leading / detached).
    fn donate(&mut self, current: Option<TokenId>, current_is_opener: bool) {
        if self.paragraphs.is_empty() {
            return;
        }
        let paragraphs = std::mem::take(&mut self.paragraphs);
        let gap_after_last = self.pending_newlines;

        let mut rest = &paragraphs[..];
        if let Some(prev) = self.prev {
            let first = &paragraphs[0];
            let gap_after_first = paragraphs
                .get(1)
                .map(|next| next.gap_before)
                .unwrap_or(gap_after_last);
            let trailing = first.gap_before == 0
                || (first.gap_before < 2
                    && (paragraphs.len() > 1 || current_is_opener || gap_after_first > 1));
            if trailing {
                self.map.entry(prev).or_default().trailing = Some(first.render());
                rest = &paragraphs[1..];
            }
        }

        let current = match current {
            Some(current) => current,
            None => return,
        };
        if rest.is_empty() {
            return;
        }

        let comments = self.map.entry(current).or_default();
        let (detached, leading) = if gap_after_last <= 1 {
            (&rest[..rest.len() - 1], Some(&rest[rest.len() - 1]))
        } else {
            (rest, None)
        };
        for paragraph in detached {
            comments.detached.push(paragraph.render());
        }
        if let Some(leading) = leading {
            comments.leading = Some(leading.render());
        }
    }
}

fn is_opener(text: &str) -> bool {
    matches!(text, "(" | "[" | "{")
}

/// Strips the `//` delimiter; the line's text, newline included, is kept
/// verbatim.
fn render_line_comment(text: &str) -> String {
    let body = text.strip_prefix("//").unwrap_or(text);
    let mut out = String::with_capacity(body.len() + 1);
    out.push_str(body.trim_end_matches(['\r', '\n']));
    out.push('\n');
    out
}

/// Strips `/*` and `*/` plus one decorative `*` per interior line.
fn render_block_comment(text: &str) -> String {
    let body = text
        .strip_prefix("/*")
        .unwrap_or(text)
        .strip_suffix("*/")
        .unwrap_or(text);
    let mut out = String::new();
    let line_count = body.lines().count();
    for (i, line) in body.lines().enumerate() {
        let line = if i == 0 {
            line
        } else {
            let trimmed = line.trim_start();
            match trimmed.strip_prefix('*') {
                Some(rest) => rest,
                None => line,
            }
        };
        out.push_str(line);
        if i + 1 < line_count {
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Span;

    fn tokens(spec: &[(&str, TokenKind)]) -> Vec<Token> {
        spec.iter()
            .map(|&(text, kind)| Token {
                kind,
                text: text.into(),
                span: Span::default(),
            })
            .collect()
    }

    use TokenKind::*;

    #[test]
    fn leading_comment_attaches_to_next_token() {
        let stream = tokens(&[
            ("// a doc", LineComment),
            ("\n", Whitespace),
            ("message", Ident),
        ]);
        let map = track(&stream);
        let comments = map.get(2).unwrap();
        assert_eq!(comments.leading.as_deref(), Some(" a doc\n"));
        assert!(comments.detached.is_empty());
        assert!(comments.trailing.is_none());
    }

    #[test]
    fn same_line_comment_trails_the_previous_token() {
        let stream = tokens(&[
            (";", Punct),
            (" ", Whitespace),
            ("// after", LineComment),
            ("\n", Whitespace),
            ("\n", Whitespace),
            ("message", Ident),
        ]);
        let map = track(&stream);
        assert_eq!(map.get(0).unwrap().trailing.as_deref(), Some(" after\n"));
        assert!(map.get(5).is_none());
    }

    #[test]
    fn blank_line_detaches_a_paragraph() {
        let stream = tokens(&[
            (";", Punct),
            ("\n", Whitespace),
            ("\n", Whitespace),
            ("// detached", LineComment),
            ("\n", Whitespace),
            ("\n", Whitespace),
            ("// leading", LineComment),
            ("\n", Whitespace),
            ("message", Ident),
        ]);
        let map = track(&stream);
        assert!(map.get(0).is_none());
        let comments = map.get(8).unwrap();
        assert_eq!(comments.detached, vec![" detached\n".to_owned()]);
        assert_eq!(comments.leading.as_deref(), Some(" leading\n"));
    }

    #[test]
    fn consecutive_lines_form_one_paragraph() {
        let stream = tokens(&[
            ("// one", LineComment),
            ("\n", Whitespace),
            ("// two", LineComment),
            ("\n", Whitespace),
            ("enum", Ident),
        ]);
        let map = track(&stream);
        assert_eq!(map.get(4).unwrap().leading.as_deref(), Some(" one\n two\n"));
    }

    #[test]
    fn block_comment_is_its_own_paragraph() {
        let stream = tokens(&[
            ("/* one\n * two\n */", BlockComment),
            ("\n", Whitespace),
            ("enum", Ident),
        ]);
        let map = track(&stream);
        assert_eq!(map.get(2).unwrap().leading.as_deref(), Some(" one\n two\n "));
    }

    #[test]
    fn close_paragraph_donates_trailing_before_opener() {
        // A single paragraph one line above an opening brace trails the
        // previous token.
        let stream = tokens(&[
            ("M", Ident),
            ("\n", Whitespace),
            ("// note", LineComment),
            ("\n", Whitespace),
            ("\n", Whitespace),
            ("{", Punct),
        ]);
        let map = track(&stream);
        assert_eq!(map.get(0).unwrap().trailing.as_deref(), Some(" note\n"));
    }

    #[test]
    fn trailing_at_end_of_stream() {
        let stream = tokens(&[(";", Punct), (" ", Whitespace), ("// bye", LineComment)]);
        let map = track(&stream);
        assert_eq!(map.get(0).unwrap().trailing.as_deref(), Some(" bye\n"));
    }
}
