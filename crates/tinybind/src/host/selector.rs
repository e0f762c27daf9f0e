//! A small CSS selector engine.
//!
//! Supports selector lists (`a, b`), descendant (`a b`) and child (`a > b`)
//! combinators, and compound selectors made of a type or `*`, `#id`,
//! `.class`, `[attr]` and `[attr=value]`.

use alloc::{string::String, vec::Vec};

use super::document::{Document, NodeId};
use crate::HostError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Simple {
    Tag(String),
    Id(String),
    Class(String),
    Attr(String, Option<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound(Vec<Simple>);

/// A parsed selector list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    /// Each alternative as compounds, rightmost first, with the combinator
    /// joining a compound to the one on its left
    alternatives: Vec<Vec<(Compound, Option<Combinator>)>>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self, HostError> {
        let invalid = || HostError::syntax(alloc::format!("'{input}' is not a valid selector"));

        let mut alternatives = Vec::new();
        for part in input.split(',') {
            let mut compounds: Vec<(Compound, Option<Combinator>)> = Vec::new();
            let mut pending = None;
            for token in tokenize(part).ok_or_else(invalid)? {
                match token {
                    Token::Child => {
                        if compounds.is_empty() || pending.is_some() {
                            return Err(invalid());
                        }
                        pending = Some(Combinator::Child);
                    }
                    Token::Compound(compound) => {
                        let combinator = match compounds.is_empty() {
                            true => None,
                            false => Some(pending.take().unwrap_or(Combinator::Descendant)),
                        };
                        compounds.push((compound, combinator));
                    }
                }
            }

            if compounds.is_empty() || pending.is_some() {
                return Err(invalid());
            }

            // matching walks from the rightmost compound towards the root
            alternatives.push(compounds.into_iter().rev().collect());
        }

        Ok(Self { alternatives })
    }

    /// Whether `node` matches any alternative
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.alternatives.iter().any(|compounds| matches_from(doc, node, compounds))
    }
}

fn matches_from(doc: &Document, node: NodeId, compounds: &[(Compound, Option<Combinator>)]) -> bool {
    let Some(((compound, combinator), rest)) = compounds.split_first() else {
        return true;
    };

    if !matches_compound(doc, node, compound) {
        return false;
    }

    match combinator {
        None => true,
        Some(Combinator::Child) => doc.parent(node).is_some_and(|parent| matches_from(doc, parent, rest)),
        Some(Combinator::Descendant) => {
            let mut current = doc.parent(node);
            while let Some(ancestor) = current {
                if matches_from(doc, ancestor, rest) {
                    return true;
                }
                current = doc.parent(ancestor);
            }
            false
        }
    }
}

fn matches_compound(doc: &Document, node: NodeId, compound: &Compound) -> bool {
    let Some(tag) = doc.tag_name(node) else {
        return false;
    };

    compound.0.iter().all(|simple| match simple {
        Simple::Tag(name) => name == "*" || name.eq_ignore_ascii_case(tag),
        Simple::Id(id) => doc.get_attribute(node, "id") == Some(id.as_str()),
        Simple::Class(class) => doc.class_contains(node, class),
        Simple::Attr(name, None) => doc.get_attribute(node, name).is_some(),
        Simple::Attr(name, Some(value)) => doc.get_attribute(node, name) == Some(value.as_str()),
    })
}

enum Token {
    Compound(Compound),
    Child,
}

fn is_ident(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn tokenize(input: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    let mut current = Compound::default();

    let ident = |chars: &mut core::iter::Peekable<core::str::Chars<'_>>| -> Option<String> {
        let mut out = String::new();
        while let Some(&c) = chars.peek() {
            if !is_ident(c) {
                break;
            }
            out.push(c);
            chars.next();
        }
        (!out.is_empty()).then_some(out)
    };

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '>' => {
                if !current.0.is_empty() {
                    tokens.push(Token::Compound(core::mem::take(&mut current)));
                }
                chars.next();
                if c == '>' {
                    tokens.push(Token::Child);
                }
            }
            '*' => {
                chars.next();
                current.0.push(Simple::Tag("*".into()));
            }
            '#' => {
                chars.next();
                current.0.push(Simple::Id(ident(&mut chars)?));
            }
            '.' => {
                chars.next();
                current.0.push(Simple::Class(ident(&mut chars)?));
            }
            '[' => {
                chars.next();
                let name = ident(&mut chars)?;
                let value = match chars.next()? {
                    ']' => None,
                    '=' => {
                        let mut value = String::new();
                        let quote = chars.peek().copied().filter(|c| *c == '"' || *c == '\'');
                        if quote.is_some() {
                            chars.next();
                        }
                        loop {
                            let c = chars.next()?;
                            if Some(c) == quote || (quote.is_none() && c == ']') {
                                break;
                            }
                            value.push(c);
                        }
                        if quote.is_some() && chars.next()? != ']' {
                            return None;
                        }
                        Some(value)
                    }
                    _ => return None,
                };
                current.0.push(Simple::Attr(name, value));
            }
            c if is_ident(c) => {
                if !current.0.is_empty() {
                    return None;
                }
                current.0.push(Simple::Tag(ident(&mut chars)?));
            }
            _ => return None,
        }
    }

    if !current.0.is_empty() {
        tokens.push(Token::Compound(current));
    }
    Some(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new();
        let body = doc.body();
        let nav = doc.create_element("nav").unwrap();
        doc.set_attribute(nav, "id", "menu").unwrap();
        doc.append_child(body, nav).unwrap();
        let link = doc.create_element("a").unwrap();
        doc.set_attribute(link, "class", "item active").unwrap();
        doc.set_attribute(link, "href", "/docs").unwrap();
        doc.append_child(nav, link).unwrap();
        (doc, body, nav, link)
    }

    #[test]
    fn compound_selectors() {
        let (doc, _, nav, link) = doc();
        assert!(Selector::parse("#menu").unwrap().matches(&doc, nav));
        assert!(Selector::parse("a.item.active").unwrap().matches(&doc, link));
        assert!(!Selector::parse("a.missing").unwrap().matches(&doc, link));
        assert!(Selector::parse("[href]").unwrap().matches(&doc, link));
        assert!(Selector::parse("a[href=\"/docs\"]").unwrap().matches(&doc, link));
        assert!(Selector::parse("*").unwrap().matches(&doc, nav));
    }

    #[test]
    fn combinators() {
        let (doc, _, nav, link) = doc();
        assert!(Selector::parse("body a").unwrap().matches(&doc, link));
        assert!(Selector::parse("nav > a").unwrap().matches(&doc, link));
        assert!(!Selector::parse("body > a").unwrap().matches(&doc, link));
        assert!(Selector::parse("p, #menu").unwrap().matches(&doc, nav));
    }

    #[test]
    fn invalid_selectors_are_syntax_errors() {
        for input in ["", "a >", "> a", "#", "a[", "a..b", "a!"] {
            let err = Selector::parse(input).unwrap_err();
            assert_eq!(err.name(), "SyntaxError", "{input}");
        }
    }
}
