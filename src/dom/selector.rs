use super::{Document, DomError, NodeId};

/// Compiled CSS selector covering the subset server templates rely on:
/// type, `#id` and `.class` compounds joined by descendant or `>`
/// combinators, with `,` separated alternatives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selector {
    source: String,
    alternatives: Vec<Vec<Step>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Step {
    combinator: Combinator,
    compound: Compound,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, DomError> {
        let err = |message: &str| DomError::Selector {
            selector: source.to_string(),
            message: message.to_string(),
        };

        let mut alternatives = Vec::new();
        for group in source.split(',') {
            let steps = parse_chain(group).map_err(|m| err(&m))?;
            if steps.is_empty() {
                return Err(err("empty selector"));
            }
            alternatives.push(steps);
        }
        Ok(Self {
            source: source.trim().to_string(),
            alternatives,
        })
    }

    /// Selector for a single class name.
    pub fn class(name: &str) -> Result<Self, DomError> {
        check_name(name, '.')?;
        Ok(Self::single(Compound {
            classes: vec![name.to_string()],
            ..Compound::default()
        }))
    }

    /// Selector for an element id.
    pub fn id(name: &str) -> Result<Self, DomError> {
        check_name(name, '#')?;
        Ok(Self::single(Compound {
            id: Some(name.to_string()),
            ..Compound::default()
        }))
    }

    /// Class selector for a name known at compile time to be a valid identifier.
    pub(crate) fn for_class(name: &'static str) -> Self {
        Self::single(Compound {
            classes: vec![name.to_string()],
            ..Compound::default()
        })
    }

    fn single(compound: Compound) -> Self {
        let source = match (&compound.id, compound.classes.first()) {
            (Some(id), _) => format!("#{id}"),
            (None, Some(class)) => format!(".{class}"),
            (None, None) => "*".to_string(),
        };
        Self {
            source,
            alternatives: vec![vec![Step {
                combinator: Combinator::Descendant,
                compound,
            }]],
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub(crate) fn matches(&self, doc: &Document, node: NodeId) -> bool {
        if !doc.is_element(node) {
            return false;
        }
        self.alternatives
            .iter()
            .any(|steps| match_step(doc, node, steps, steps.len() - 1))
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

fn match_step(doc: &Document, node: NodeId, steps: &[Step], idx: usize) -> bool {
    let step = &steps[idx];
    if !step.compound.matches(doc, node) {
        return false;
    }
    if idx == 0 {
        return true;
    }
    match step.combinator {
        Combinator::Child => doc
            .parent_element(node)
            .map(|p| match_step(doc, p, steps, idx - 1))
            .unwrap_or(false),
        Combinator::Descendant => {
            let mut cursor = doc.parent_element(node);
            while let Some(ancestor) = cursor {
                if match_step(doc, ancestor, steps, idx - 1) {
                    return true;
                }
                cursor = doc.parent_element(ancestor);
            }
            false
        }
    }
}

impl Compound {
    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        if let Some(tag) = self.tag.as_deref() {
            if doc.tag_name(node) != Some(tag) {
                return false;
            }
        }
        if let Some(id) = self.id.as_deref() {
            if doc.attr(node, "id") != Some(id) {
                return false;
            }
        }
        self.classes.iter().all(|c| doc.has_class(node, c))
    }

    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty()
    }
}

fn parse_chain(group: &str) -> Result<Vec<Step>, String> {
    let chars: Vec<char> = group.trim().chars().collect();
    let mut steps = Vec::new();
    let mut combinator = Combinator::Descendant;
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '>' {
            if steps.is_empty() || combinator == Combinator::Child {
                return Err("dangling '>' combinator".to_string());
            }
            combinator = Combinator::Child;
            i += 1;
            continue;
        }

        let mut compound = Compound::default();
        if c == '*' {
            i += 1;
        } else if is_ident_char(c) {
            let name = take_ident(&chars, &mut i);
            compound.tag = Some(name.to_ascii_lowercase());
        }
        while i < chars.len() && (chars[i] == '.' || chars[i] == '#') {
            let marker = chars[i];
            i += 1;
            let name = take_ident(&chars, &mut i);
            if name.is_empty() {
                return Err(format!("expected a name after '{marker}'"));
            }
            if marker == '.' {
                compound.classes.push(name);
            } else {
                compound.id = Some(name);
            }
        }
        if i < chars.len() && !chars[i].is_whitespace() && chars[i] != '>' {
            return Err(format!("unsupported token '{}'", chars[i]));
        }
        if compound.is_empty() && c != '*' {
            return Err("empty compound selector".to_string());
        }

        steps.push(Step {
            combinator,
            compound,
        });
        combinator = Combinator::Descendant;
    }

    if combinator == Combinator::Child {
        return Err("dangling '>' combinator".to_string());
    }
    Ok(steps)
}

fn check_name(name: &str, marker: char) -> Result<(), DomError> {
    if name.is_empty() || !name.chars().all(is_ident_char) {
        return Err(DomError::Selector {
            selector: format!("{marker}{name}"),
            message: "expected a single identifier".to_string(),
        });
    }
    Ok(())
}

fn take_ident(chars: &[char], i: &mut usize) -> String {
    let start = *i;
    while *i < chars.len() && is_ident_char(chars[*i]) {
        *i += 1;
    }
    chars[start..*i].iter().collect()
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}
