/// Lossless syntax tree for the MSTS text shape format
///
/// The format is a tree of `keyword [label] ( ... )` blocks holding bare
/// words and quoted strings. Every token keeps the whitespace that preceded
/// it, so writing an unmodified tree reproduces the input byte for byte.
use nom::{
    branch::alt,
    bytes::complete::{tag, take_till1, take_while},
    character::complete::{anychar, char, none_of},
    combinator::recognize,
    multi::{many0, many0_count},
    sequence::{delimited, pair, preceded},
    IResult,
};
use std::fmt;

use crate::error::{Error, Result};

/// Keywords that take a name between the keyword and the opening parenthesis
const LABELLED_KEYWORDS: &[&str] = &["matrix", "prim_state", "anim_node"];

/// A word, quoted string or parenthesis with its leading whitespace
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Token {
    pub trivia: String,
    pub text: String,
    /// 1-based source line, 0 for tokens created by the editor
    pub line: usize,
}

impl Token {
    pub fn new(trivia: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            trivia: trivia.into(),
            text: text.into(),
            line: 0,
        }
    }

    /// Text with surrounding double quotes removed
    pub fn unquoted(&self) -> &str {
        self.text
            .strip_prefix('"')
            .and_then(|t| t.strip_suffix('"'))
            .unwrap_or(&self.text)
    }

    fn write_to(&self, out: &mut String) {
        out.push_str(&self.trivia);
        out.push_str(&self.text);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Atom(Token),
    Block(Block),
}

impl Item {
    fn write_to(&self, out: &mut String) {
        match self {
            Item::Atom(token) => token.write_to(out),
            Item::Block(block) => block.write_to(out),
        }
    }
}

/// A `keyword [label] ( items )` group
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub keyword: Token,
    pub label: Option<Token>,
    pub open: Token,
    pub items: Vec<Item>,
    pub close: Token,
}

impl Block {
    /// Build a single-line block such as `point ( 1 2 3 )`
    pub fn inline(trivia: impl Into<String>, keyword: &str, values: &[String]) -> Self {
        Self {
            keyword: Token::new(trivia, keyword),
            label: None,
            open: Token::new(" ", "("),
            items: values
                .iter()
                .map(|v| Item::Atom(Token::new(" ", v.as_str())))
                .collect(),
            close: Token::new(" ", ")"),
        }
    }

    pub fn name(&self) -> &str {
        &self.keyword.text
    }

    /// Case-insensitive keyword comparison
    pub fn is(&self, keyword: &str) -> bool {
        self.keyword.text.eq_ignore_ascii_case(keyword)
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_ref().map(|t| t.unquoted())
    }

    pub fn line(&self) -> usize {
        self.keyword.line
    }

    /// Indentation of the keyword's own line
    pub fn indent(&self) -> &str {
        let trivia = &self.keyword.trivia;
        match trivia.rfind('\n') {
            Some(pos) => &trivia[pos + 1..],
            None => "",
        }
    }

    pub fn atoms(&self) -> impl Iterator<Item = &Token> {
        self.items.iter().filter_map(|item| match item {
            Item::Atom(token) => Some(token),
            Item::Block(_) => None,
        })
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.items.iter().filter_map(|item| match item {
            Item::Block(block) => Some(block),
            Item::Atom(_) => None,
        })
    }

    pub fn blocks_mut(&mut self) -> impl Iterator<Item = &mut Block> {
        self.items.iter_mut().filter_map(|item| match item {
            Item::Block(block) => Some(block),
            Item::Atom(_) => None,
        })
    }

    /// First child block with the given keyword and its position in `items`
    pub fn find(&self, keyword: &str) -> Option<(usize, &Block)> {
        self.items.iter().enumerate().find_map(|(i, item)| match item {
            Item::Block(block) if block.is(keyword) => Some((i, block)),
            _ => None,
        })
    }

    pub fn child(&self, keyword: &str) -> Option<&Block> {
        self.find(keyword).map(|(_, block)| block)
    }

    pub fn child_mut(&mut self, keyword: &str) -> Option<&mut Block> {
        self.blocks_mut().find(|block| block.is(keyword))
    }

    fn write_to(&self, out: &mut String) {
        self.keyword.write_to(out);
        if let Some(label) = &self.label {
            label.write_to(out);
        }
        self.open.write_to(out);
        for item in &self.items {
            item.write_to(out);
        }
        self.close.write_to(out);
    }
}

/// Top-level items of a shape file plus whitespace after the last token
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyntaxTree {
    pub items: Vec<Item>,
    pub trailing: String,
}

impl SyntaxTree {
    /// Resolve a path of `items` positions to a block
    pub fn block(&self, path: &[usize]) -> Option<&Block> {
        let (first, rest) = path.split_first()?;
        let mut block = match self.items.get(*first)? {
            Item::Block(block) => block,
            Item::Atom(_) => return None,
        };
        for &i in rest {
            block = match block.items.get(i)? {
                Item::Block(child) => child,
                Item::Atom(_) => return None,
            };
        }
        Some(block)
    }

    pub fn block_mut(&mut self, path: &[usize]) -> Option<&mut Block> {
        let (first, rest) = path.split_first()?;
        let mut block = match self.items.get_mut(*first)? {
            Item::Block(block) => block,
            Item::Atom(_) => return None,
        };
        for &i in rest {
            block = match block.items.get_mut(i)? {
                Item::Block(child) => child,
                Item::Atom(_) => return None,
            };
        }
        Some(block)
    }

    pub fn write_to(&self, out: &mut String) {
        for item in &self.items {
            item.write_to(out);
        }
        out.push_str(&self.trailing);
    }
}

impl fmt::Display for SyntaxTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write_to(&mut out);
        f.write_str(&out)
    }
}

fn whitespace(input: &str) -> IResult<&str, &str> {
    take_while(char::is_whitespace)(input)
}

fn quoted(input: &str) -> IResult<&str, &str> {
    recognize(delimited(
        char('"'),
        many0_count(alt((
            recognize(preceded(char('\\'), anychar)),
            recognize(none_of("\\\"")),
        ))),
        char('"'),
    ))(input)
}

fn word(input: &str) -> IResult<&str, &str> {
    take_till1(|c: char| c.is_whitespace() || c == '(' || c == ')' || c == '"')(input)
}

fn lexeme(input: &str) -> IResult<&str, (&str, &str)> {
    pair(whitespace, alt((tag("("), tag(")"), quoted, word)))(input)
}

fn lex(input: &str) -> IResult<&str, (Vec<(&str, &str)>, &str)> {
    pair(many0(lexeme), whitespace)(input)
}

fn count_lines(text: &str) -> usize {
    text.bytes().filter(|&b| b == b'\n').count()
}

fn open_items<'a>(stack: &'a mut [Block], top: &'a mut Vec<Item>) -> &'a mut Vec<Item> {
    match stack.last_mut() {
        Some(block) => &mut block.items,
        None => top,
    }
}

/// Parse shape text into a lossless tree
pub fn parse(input: &str) -> Result<SyntaxTree> {
    let (rest, (lexemes, trailing)) =
        lex(input).map_err(|e| Error::format(1, format!("tokenizer failed: {e}")))?;
    if !rest.is_empty() {
        let line = 1 + count_lines(&input[..input.len() - rest.len()]);
        return Err(Error::format(line, "unterminated quoted string"));
    }

    let mut line = 1;
    let mut stack: Vec<Block> = Vec::new();
    let mut top: Vec<Item> = Vec::new();

    for (trivia, text) in lexemes {
        line += count_lines(trivia);
        let token = Token {
            trivia: trivia.to_string(),
            text: text.to_string(),
            line,
        };
        line += count_lines(text);

        match text {
            "(" => {
                let items = open_items(&mut stack, &mut top);
                let name = match items.pop() {
                    Some(Item::Atom(name)) => name,
                    Some(other) => {
                        items.push(other);
                        return Err(Error::format(token.line, "'(' without a block name"));
                    }
                    None => return Err(Error::format(token.line, "'(' without a block name")),
                };
                let labelled = matches!(
                    items.last(),
                    Some(Item::Atom(prev))
                        if LABELLED_KEYWORDS.iter().any(|k| prev.text.eq_ignore_ascii_case(k))
                );
                let (keyword, label) = if labelled {
                    match items.pop() {
                        Some(Item::Atom(keyword)) => (keyword, Some(name)),
                        _ => (name, None),
                    }
                } else {
                    (name, None)
                };
                stack.push(Block {
                    keyword,
                    label,
                    open: token,
                    items: Vec::new(),
                    close: Token::default(),
                });
            }
            ")" => {
                let Some(mut block) = stack.pop() else {
                    return Err(Error::format(token.line, "unbalanced ')'"));
                };
                block.close = token;
                open_items(&mut stack, &mut top).push(Item::Block(block));
            }
            _ => open_items(&mut stack, &mut top).push(Item::Atom(token)),
        }
    }

    if let Some(open) = stack.last() {
        return Err(Error::format(
            open.line(),
            format!("block '{}' is never closed", open.name()),
        ));
    }

    Ok(SyntaxTree {
        items: top,
        trailing: trailing.to_string(),
    })
}
