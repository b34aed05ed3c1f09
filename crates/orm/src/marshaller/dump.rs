use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::error::RecordId;
use crate::model::{Cached, Record};

/// Dump options
///
/// `include` and `exclude` name relationships or fields; both, like the
/// `fields` allow-list, apply to the root record only. Nested records are
/// emitted with all their dumpable attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpOptions {
    /// When non-empty, only these resolved relationships are expanded at the root
    pub include: HashSet<String>,
    pub exclude: HashSet<String>,
    /// Attribute allow-list for the root record
    pub fields: Option<HashSet<String>>,
    /// Levels of relationship expansion; 0 dumps attributes only
    pub depth_limit: usize,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            include: HashSet::new(),
            exclude: HashSet::new(),
            fields: None,
            depth_limit: 1,
        }
    }
}

impl DumpOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn only<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn depth(mut self, depth_limit: usize) -> Self {
        self.depth_limit = depth_limit;
        self
    }

    fn keeps_attribute(&self, name: &str) -> bool {
        !self.exclude.contains(name) && self.fields.as_ref().map_or(true, |fields| fields.contains(name))
    }

    fn expands(&self, name: &str) -> bool {
        !self.exclude.contains(name) && (self.include.is_empty() || self.include.contains(name))
    }
}

type Ancestor<'a> = (&'a str, RecordId);

impl Record {
    /// Serialize attributes plus cached relationships. Never resolves anything.
    ///
    /// A record already on the path from the root (same type and identity) is
    /// emitted with its attributes only, so cycles in a resolved graph end
    /// there whatever the depth limit.
    pub fn dump(&self, options: &DumpOptions) -> Value {
        let mut path = Vec::new();
        Value::Object(dump_record(self, options, 0, &mut path))
    }
}

fn dump_record<'a>(
    record: &'a Record,
    options: &DumpOptions,
    depth: usize,
    path: &mut Vec<Ancestor<'a>>,
) -> Map<String, Value> {
    let root = depth == 0;
    let mut out = dump_attributes(record, |name| !root || options.keeps_attribute(name));

    if depth >= options.depth_limit {
        return out;
    }

    path.push((record.type_name(), record.identity()));
    for spec in record.entity().relationships() {
        let name = spec.name();
        if root && !options.expands(name) {
            continue;
        }
        let Some(cached) = record.relations.get(name) else {
            continue;
        };

        let value = match cached {
            Cached::One(None) => Value::Null,
            Cached::One(Some(child)) => dump_child(child, options, depth + 1, path),
            Cached::Many(children) => Value::Array(
                children
                    .iter()
                    .map(|child| dump_child(child, options, depth + 1, path))
                    .collect(),
            ),
        };
        out.insert(name.to_string(), value);
    }
    path.pop();

    out
}

fn dump_child<'a>(
    child: &'a Record,
    options: &DumpOptions,
    depth: usize,
    path: &mut Vec<Ancestor<'a>>,
) -> Value {
    if is_ancestor(path, child) {
        Value::Object(dump_attributes(child, |_| true))
    } else {
        Value::Object(dump_record(child, options, depth, path))
    }
}

fn dump_attributes<F>(record: &Record, keep: F) -> Map<String, Value>
where
    F: Fn(&str) -> bool,
{
    let entity = record.entity();
    record
        .attributes
        .iter()
        .filter(|(name, _)| entity.field_kind(name).map_or(true, |kind| kind.is_dumped()))
        .filter(|(name, _)| keep(name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

fn is_ancestor(path: &[Ancestor<'_>], record: &Record) -> bool {
    let identity = record.identity();
    path.iter()
        .any(|(type_name, id)| *type_name == record.type_name() && *id == identity)
}
