//! Storefront markup parsing
//!
//! Parses well-formed HTML fragments (the shape storefront sections render
//! as) into a [`Document`]. Lenient where browsers are lenient: unknown tags
//! are fine, stray closing tags are ignored, unclosed elements close at end
//! of input. Structurally broken input (an unterminated tag) is an error.

use super::{Document, NodeId, VOID_TAGS};
use anyhow::{Result, anyhow, bail};

/// Parse a full page body plus its location path.
pub fn parse_document(input: &str, path: &str) -> Result<Document> {
    let mut doc = Document::new();
    doc.set_path(path);
    let body = doc.body();
    parse_fragment(&mut doc, body, input)?;
    Ok(doc)
}

/// Parse markup into children of `parent`.
pub fn parse_fragment(doc: &mut Document, parent: NodeId, input: &str) -> Result<()> {
    let mut stack: Vec<NodeId> = vec![parent];
    let mut pos = 0;

    while pos < input.len() {
        let rest = &input[pos..];
        let Some(lt) = rest.find('<') else {
            append_text(doc, &stack, rest);
            break;
        };

        if lt > 0 {
            append_text(doc, &stack, &rest[..lt]);
        }
        pos += lt;
        let tag_rest = &input[pos..];

        if let Some(comment) = tag_rest.strip_prefix("<!--") {
            let end = comment
                .find("-->")
                .ok_or_else(|| anyhow!("Unterminated comment at byte {pos}"))?;
            pos += 4 + end + 3;
            continue;
        }

        if let Some(closing) = tag_rest.strip_prefix("</") {
            let end = closing
                .find('>')
                .ok_or_else(|| anyhow!("Unterminated closing tag at byte {pos}"))?;
            let name = closing[..end].trim().to_ascii_lowercase();
            // Close the nearest matching open element; ignore stray closers
            // and never pop the fragment root.
            if let Some(found) = stack
                .iter()
                .rposition(|&id| doc.element(id).is_some_and(|el| el.tag == name))
            {
                if found > 0 {
                    stack.truncate(found);
                }
            }
            pos += 2 + end + 1;
            continue;
        }

        let end = tag_rest
            .find('>')
            .ok_or_else(|| anyhow!("Unterminated tag at byte {pos}"))?;
        let raw = &tag_rest[1..end];
        let self_closing = raw.ends_with('/');
        let raw = raw.strip_suffix('/').unwrap_or(raw);

        let name_end = raw
            .find(char::is_whitespace)
            .unwrap_or(raw.len());
        let tag_name = raw[..name_end].to_ascii_lowercase();
        if tag_name.is_empty()
            || !tag_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            bail!("Malformed tag at byte {pos}: '<{raw}>'");
        }

        let el = doc.create_element(&tag_name);
        parse_attrs(doc, el, &raw[name_end..])?;
        let top = *stack.last().expect("fragment root always on stack");
        doc.append_child(top, el);

        if !self_closing && !VOID_TAGS.contains(&tag_name.as_str()) {
            stack.push(el);
        }
        pos += end + 1;
    }

    Ok(())
}

fn append_text(doc: &mut Document, stack: &[NodeId], text: &str) {
    let node = doc.create_text(text);
    let top = *stack.last().expect("fragment root always on stack");
    doc.append_child(top, node);
}

fn parse_attrs(doc: &mut Document, el: NodeId, input: &str) -> Result<()> {
    let mut rest = input.trim_start();

    while !rest.is_empty() {
        let name_end = rest
            .find(|c: char| c == '=' || c.is_whitespace())
            .unwrap_or(rest.len());
        let name = rest[..name_end].to_ascii_lowercase();
        if name.is_empty() {
            bail!("Malformed attribute near '{rest}'");
        }
        rest = rest[name_end..].trim_start();

        let value = if let Some(after_eq) = rest.strip_prefix('=') {
            let after_eq = after_eq.trim_start();
            if let Some(quoted) = after_eq.strip_prefix('"') {
                let close = quoted
                    .find('"')
                    .ok_or_else(|| anyhow!("Unterminated attribute value for '{name}'"))?;
                rest = &quoted[close + 1..];
                quoted[..close].to_string()
            } else if let Some(quoted) = after_eq.strip_prefix('\'') {
                let close = quoted
                    .find('\'')
                    .ok_or_else(|| anyhow!("Unterminated attribute value for '{name}'"))?;
                rest = &quoted[close + 1..];
                quoted[..close].to_string()
            } else {
                let end = after_eq.find(char::is_whitespace).unwrap_or(after_eq.len());
                let value = after_eq[..end].to_string();
                rest = &after_eq[end..];
                value
            }
        } else {
            // Boolean attribute, e.g. data-cart-drawer
            String::new()
        };
        rest = rest.trim_start();

        if name == "class" {
            for class in value.split_whitespace() {
                doc.add_class(el, class);
            }
        } else {
            doc.set_attr(el, &name, &value);
        }
    }

    Ok(())
}
