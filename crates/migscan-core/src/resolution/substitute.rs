//! Bounded fixed-point `${name}` substitution.

use std::collections::HashMap;

use regex::Captures;

use crate::extract::lineage::{placeholder_names, PLACEHOLDER_RE};

/// Name → raw replacement value.
pub type Lookup = HashMap<String, String>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Substitution {
    pub value: String,
    /// Variable names whose tokens remain in `value`, first-seen order.
    pub leftover: Vec<String>,
}

impl Substitution {
    pub fn is_complete(&self) -> bool {
        self.leftover.is_empty()
    }
}

/// Replace `${name}` tokens found in `lookup`, repeating until a pass makes
/// no replacement or `max_iterations` passes have run.
pub fn substitute(text: &str, lookup: &Lookup, max_iterations: usize) -> Substitution {
    let mut current = text.to_string();
    for _ in 0..max_iterations {
        if !PLACEHOLDER_RE.is_match(&current) {
            break;
        }
        let mut changed = false;
        current = PLACEHOLDER_RE
            .replace_all(&current, |caps: &Captures<'_>| match lookup.get(caps[1].trim()) {
                Some(value) => {
                    changed = true;
                    value.clone()
                }
                None => caps[0].to_string(),
            })
            .into_owned();
        if !changed {
            break;
        }
    }
    let leftover = placeholder_names(&current);
    Substitution {
        value: current,
        leftover,
    }
}
