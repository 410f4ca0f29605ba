//! Small helpers over the roxmltree node API.

use std::str::FromStr;
use xir_core::internal::*;

pub type XmlNode<'a, 'i> = roxmltree::Node<'a, 'i>;

pub fn child<'a, 'i>(node: XmlNode<'a, 'i>, name: &str) -> Option<XmlNode<'a, 'i>> {
    node.children().find(|c| c.has_tag_name(name))
}

/// Same-named element children, in document order.
pub fn children<'a, 'i>(node: XmlNode<'a, 'i>, name: &str) -> Vec<XmlNode<'a, 'i>> {
    node.children().filter(|c| c.has_tag_name(name)).collect()
}

pub fn attr_str<'a>(node: XmlNode<'a, '_>, name: &str) -> Option<&'a str> {
    node.attribute(name)
}

pub fn require_attr<'a>(node: XmlNode<'a, '_>, name: &str) -> XirResult<&'a str> {
    node.attribute(name).ok_or_else(|| {
        IrError::MalformedXml(format!("missing attribute \"{}\" on <{}>", name, node.tag_name().name()))
            .into()
    })
}

pub fn attr_parse<T: FromStr>(node: XmlNode, name: &str) -> XirResult<T> {
    parse(require_attr(node, name)?, name)
}

/// Optional attribute with a default.
pub fn attr_opt_parse<T: FromStr>(node: XmlNode, name: &str, default: T) -> XirResult<T> {
    match node.attribute(name) {
        None => Ok(default),
        Some(s) => parse(s, name),
    }
}

fn parse<T: FromStr>(s: &str, name: &str) -> XirResult<T> {
    s.trim()
        .parse::<T>()
        .map_err(|_| IrError::MalformedXml(format!("cannot parse \"{s}\" for \"{name}\"")).into())
}

/// Comma-separated scalar list. An empty field is a hard error.
pub fn split_list<T: FromStr>(s: &str, name: &str) -> XirResult<Vec<T>> {
    if s.trim().is_empty() {
        return Ok(vec![]);
    }
    s.split(',')
        .map(|tok| {
            if tok.trim().is_empty() {
                bail!(IrError::MalformedXml(format!("empty field in list attribute \"{name}\"")));
            }
            parse(tok, name)
        })
        .collect()
}

/// Comma-separated tensor names, where `\,` escapes a literal comma.
/// Tokens ending in a lone backslash are re-joined with the next token.
pub fn split_names(s: &str) -> Vec<String> {
    let tokens: Vec<&str> = s.split(',').collect();
    let mut names = vec![];
    let mut ix = 0;
    while ix < tokens.len() {
        let mut name = tokens[ix].to_string();
        while name.ends_with('\\') && ix + 1 < tokens.len() {
            name.pop();
            name.push(',');
            ix += 1;
            name.push_str(tokens[ix]);
        }
        if !name.is_empty() {
            names.push(name);
        }
        ix += 1;
    }
    names
}

/// A signed dimension. `-1` is dynamic; anything below is corrupt.
pub fn parse_dim(s: &str) -> XirResult<i64> {
    let dim: i64 = s
        .trim()
        .parse()
        .map_err(|_| IrError::InvalidDimension(format!("cannot parse dimension \"{s}\"")))?;
    if dim < -1 {
        bail!(IrError::InvalidDimension(format!("dimension {dim} must be greater or equal to -1")));
    }
    Ok(dim)
}
