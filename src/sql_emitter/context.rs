//! The mutable emission context threaded through one query translation:
//! table references and their join conditions, free WHERE conjuncts, select
//! items, alias allocation, variable targets and the ordered parameter map.

use std::collections::HashMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Ordered name → placeholder-position map. Positions are 1-based and
/// allocated in first-seen order; a repeated name reuses its position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterMap {
    entries: Vec<String>,
}

impl ParameterMap {
    pub fn new() -> Self {
        ParameterMap::default()
    }

    /// Position for `name`, allocating the next placeholder if unseen.
    pub fn position(&mut self, name: &str) -> usize {
        if let Some(i) = self.entries.iter().position(|e| e == name) {
            return i + 1;
        }
        self.entries.push(name.to_string());
        self.entries.len()
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e == name).map(|i| i + 1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i + 1))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for ParameterMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, pos) in self.iter() {
            map.serialize_entry(name, &pos)?;
        }
        map.end()
    }
}

/// Make a Cypher name (possibly backtick-quoted, so arbitrary text) safe
/// as an unquoted SQL identifier.
pub fn sanitize_identifier(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// First FROM entry; its conditions go to the global WHERE.
    Base,
    Inner,
    Left,
    CrossLateral,
}

#[derive(Debug, Clone)]
pub struct FromEntry {
    /// Rendered table reference, e.g. `pgraf.nodes AS u_0`.
    pub sql: String,
    pub kind: JoinKind,
    pub on: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SelectItem {
    pub sql: String,
    pub alias: Option<String>,
    pub aggregate: bool,
}

#[derive(Debug, Clone)]
pub struct Cte {
    pub name: String,
    pub recursive: bool,
    pub body: String,
}

/// Where a bound variable lives in the SQL being assembled.
#[derive(Debug, Clone)]
pub enum VarTarget {
    /// Directly over the nodes or edges table.
    Table { alias: String },
    /// An entity carried through a WITH barrier: `<prefix>_id`,
    /// `<prefix>_labels`, `<prefix>_properties` columns of a CTE.
    CteEntity { from_alias: String, prefix: String },
    /// A scalar column of a CTE or lateral set.
    CteScalar { from_alias: String, column: String },
    /// A variable-length traversal: `start_id`/`end_id`/`depth`/`path`
    /// columns of a recursive CTE.
    PathCte { alias: String },
}

#[derive(Debug, Default)]
pub struct EmissionContext {
    pub ctes: Vec<Cte>,
    pub from: Vec<FromEntry>,
    pub where_conjuncts: Vec<String>,
    pub select: Vec<SelectItem>,
    pub distinct: bool,
    pub group_by: Vec<String>,
    pub order_by: Vec<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub vars: HashMap<String, VarTarget>,
    pub params: ParameterMap,
    alias_counters: HashMap<String, u32>,
    cte_counter: u32,
}

impl EmissionContext {
    pub fn new() -> Self {
        EmissionContext::default()
    }

    /// Stable alias for a variable occurrence: the variable name plus a
    /// per-name counter (`u_0`, `u_1`, ...). Counters survive WITH barriers
    /// so a rebound name never collides with an earlier alias.
    pub fn allocate_alias(&mut self, variable: &str) -> String {
        let base = sanitize_identifier(variable);
        let counter = self.alias_counters.entry(base.clone()).or_insert(0);
        let alias = format!("{base}_{counter}");
        *counter += 1;
        alias
    }

    pub fn next_cte_name(&mut self, prefix: &str) -> String {
        let name = format!("{prefix}_{}", self.cte_counter);
        self.cte_counter += 1;
        name
    }

    /// Child context for a correlated subquery: sees the parent's variable
    /// targets, shares alias counters and the parameter map.
    pub fn fork_subquery(&mut self) -> EmissionContext {
        EmissionContext {
            vars: self.vars.clone(),
            params: std::mem::take(&mut self.params),
            alias_counters: std::mem::take(&mut self.alias_counters),
            cte_counter: self.cte_counter,
            ..EmissionContext::default()
        }
    }

    /// Take back the shared state after the subquery is rendered.
    pub fn absorb_subquery(&mut self, child: EmissionContext) {
        self.params = child.params;
        self.alias_counters = child.alias_counters;
        self.cte_counter = child.cte_counter;
    }

    /// Reset the assembly state around a WITH barrier, keeping CTEs,
    /// parameters and alias counters.
    pub fn reset_for_with(&mut self, from: FromEntry, vars: HashMap<String, VarTarget>) {
        self.from = vec![from];
        self.where_conjuncts = Vec::new();
        self.select = Vec::new();
        self.distinct = false;
        self.group_by = Vec::new();
        self.order_by = Vec::new();
        self.limit = None;
        self.offset = None;
        self.vars = vars;
    }
}
