//! The synthetic source tree behind relational selectors.
//!
//! Token matching alone cannot answer `class method` or `#obj > prop`:
//! tokens are flat. This module folds the host's nested symbol outline
//! and the flat token list into one arena tree. Symbols become inner
//! nodes (resolving their name token for kind and modifiers where one
//! exists), and every token not claimed by a symbol is inserted as a
//! leaf at the position its range dictates. Adjacent accessor chains
//! like `owner.field` nest the field under its owner per the language's
//! [`NestingPolicy`].
//!
//! Selectors never touch the tree directly; they are translated into the
//! small query language in [`query`] and evaluated against it.

pub mod query;
pub mod translate;

use std::collections::{HashMap, HashSet};

use crate::tokens::{SymbolInfo, Token, TokenIndex};
use crate::types::geometry::{LineMap, Position, SourceRange, range_identifier};

pub type NodeId = usize;

/// What a node was synthesized from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeOrigin {
    /// The document root sentinel.
    Root,
    /// A symbol-outline entry.
    Declaration,
    /// A loose token inserted by position.
    Token,
}

/// One node of the synthetic tree.
#[derive(Clone, Debug)]
pub struct SynthNode {
    pub origin: NodeOrigin,
    pub name: String,
    /// Semantic kind, doubling as the node's primary class.
    pub kind: String,
    /// Modifier names, doubling as additional classes.
    pub modifiers: Vec<String>,
    /// The span of the node's name, the range a match decorates.
    pub name_range: SourceRange,
    /// The node's full extent including its body.
    pub full_range: SourceRange,
    /// Byte offset of the name start, the node's cascade identity.
    pub offset: u32,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// The extent positional insertion considers "inside" this node. For
    /// collapsable declarations without children this shrinks to the name
    /// range, so initializer tokens land beside them rather than within.
    scope_range: SourceRange,
}

impl SynthNode {
    /// Attribute lookup for query predicates.
    pub(crate) fn attribute(&self, name: &str) -> Option<String> {
        match name {
            "data-name" => Some(self.name.clone()),
            "data-namerange" => Some(range_identifier(&self.name_range)),
            "data-fullrange" => Some(range_identifier(&self.full_range)),
            "data-offset" => Some(self.offset.to_string()),
            "data-mods" => Some(self.modifiers.join(" ")),
            _ => None,
        }
    }

    pub(crate) fn has_class(&self, class: &str) -> bool {
        self.kind == class || self.modifiers.iter().any(|m| m == class)
    }
}

/// Language-dependent rules for how loose tokens nest.
#[derive(Clone, Debug)]
pub struct NestingPolicy {
    /// Accessor spellings that chain a field onto the preceding token.
    pub accessors: Vec<String>,
    /// Symbol kinds that contribute their children but no node of their own.
    pub never_nest: Vec<String>,
    /// Kinds whose instances can own fields.
    pub field_owners: Vec<String>,
    /// Kinds that can be owned as fields.
    pub field_members: Vec<String>,
    /// Kinds whose childless declarations do not enclose trailing tokens.
    pub collapsable: Vec<String>,
}

impl NestingPolicy {
    pub fn for_language(language: &str) -> Self {
        let accessors: &[&str] = match language {
            "typescript" | "typescriptreact" => &[".", "?.", "!."],
            "javascript" | "javascriptreact" => &[".", "?."],
            "lua" => &[".", ":"],
            _ => &["."],
        };
        Self {
            accessors: to_strings(accessors),
            never_nest: to_strings(&["package", "keyword", "other"]),
            field_owners: to_strings(&["class", "property", "variable", "object", "parameter"]),
            field_members: to_strings(&["property", "method"]),
            collapsable: to_strings(&["variable", "constant"]),
        }
    }

    fn never_nests(&self, kind: &str) -> bool {
        self.never_nest.iter().any(|k| k == kind)
    }

    fn owns_fields(&self, kind: &str) -> bool {
        self.field_owners.iter().any(|k| k == kind)
    }

    fn is_field(&self, kind: &str) -> bool {
        self.field_members.iter().any(|k| k == kind)
    }

    fn collapses(&self, kind: &str) -> bool {
        self.collapsable.iter().any(|k| k == kind)
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// The arena tree plus its per-query result cache.
#[derive(Clone, Debug)]
pub struct SynthTree {
    nodes: Vec<SynthNode>,
    pub(crate) query_cache: HashMap<(String, bool), Vec<NodeId>>,
}

impl SynthTree {
    pub const ROOT: NodeId = 0;

    /// Builds the tree for one file snapshot.
    pub fn build(
        symbols: &[SymbolInfo],
        tokens: &TokenIndex,
        text: &str,
        policy: &NestingPolicy,
    ) -> Self {
        let mut builder = Builder {
            nodes: vec![SynthNode {
                origin: NodeOrigin::Root,
                name: String::new(),
                kind: String::new(),
                modifiers: Vec::new(),
                name_range: SourceRange::default(),
                full_range: SourceRange::default(),
                offset: 0,
                parent: None,
                children: Vec::new(),
                scope_range: SourceRange::default(),
            }],
            tokens,
            text,
            policy,
            lines: LineMap::new(text),
            processed: HashSet::new(),
            consumed: HashSet::new(),
            token_nodes: HashMap::new(),
        };

        for symbol in sorted_symbols(symbols) {
            builder.encode_symbol(symbol, Self::ROOT);
        }
        builder.attach_loose_tokens();
        builder.sort_children();

        SynthTree {
            nodes: builder.nodes,
            query_cache: HashMap::new(),
        }
    }

    pub fn node(&self, id: NodeId) -> &SynthNode {
        &self.nodes[id]
    }

    /// Number of nodes, not counting the root sentinel.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Parent id, with the root sentinel treated as "no ancestor".
    pub(crate) fn ancestor_of(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent.filter(|&p| p != Self::ROOT)
    }

    /// All node ids in document order (sorted-children depth first).
    pub(crate) fn document_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.len());
        let mut stack: Vec<NodeId> = self.nodes[Self::ROOT]
            .children
            .iter()
            .rev()
            .copied()
            .collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id].children.iter().rev());
        }
        order
    }
}

struct Builder<'a> {
    nodes: Vec<SynthNode>,
    tokens: &'a TokenIndex,
    text: &'a str,
    policy: &'a NestingPolicy,
    lines: LineMap<'a>,
    /// Name-range identifiers that already own a node.
    processed: HashSet<String>,
    /// Token indices already represented in the tree.
    consumed: HashSet<usize>,
    token_nodes: HashMap<usize, NodeId>,
}

impl Builder<'_> {
    fn push_node(&mut self, node: SynthNode) -> NodeId {
        let id = self.nodes.len();
        if let Some(parent) = node.parent {
            self.nodes[parent].children.push(id);
        }
        self.nodes.push(node);
        id
    }

    fn encode_symbol(&mut self, symbol: &SymbolInfo, parent: NodeId) {
        let ident = range_identifier(&symbol.selection_range);
        if self.processed.contains(&ident) {
            return;
        }
        let token = self.tokens.by_range_identifier(&ident).cloned();
        let kind = token
            .as_ref()
            .map(|t| t.kind.clone())
            .unwrap_or_else(|| symbol.kind.clone());

        // Container-less kinds splice their children into the parent.
        if self.policy.never_nests(&kind) {
            for child in sorted_symbols(&symbol.children) {
                self.encode_symbol(child, parent);
            }
            return;
        }

        let offset = token.as_ref().map_or_else(
            || self.lines.offset_at(symbol.selection_range.start) as u32,
            |t| t.offset,
        );
        let scope_range = if !symbol.children.is_empty() || !self.policy.collapses(&kind) {
            symbol.range
        } else {
            symbol.selection_range
        };
        let id = self.push_node(SynthNode {
            origin: NodeOrigin::Declaration,
            name: symbol.name.clone(),
            kind,
            modifiers: token.as_ref().map(|t| t.modifiers.clone()).unwrap_or_default(),
            name_range: symbol.selection_range,
            full_range: symbol.range,
            offset,
            parent: Some(parent),
            children: Vec::new(),
            scope_range,
        });
        self.processed.insert(ident);
        if let Some(token) = token {
            self.consumed.insert(token.index);
            self.token_nodes.insert(token.index, id);
        }

        for child in sorted_symbols(&symbol.children) {
            self.encode_symbol(child, id);
        }
    }

    /// Inserts every token the outline did not claim as a leaf node.
    fn attach_loose_tokens(&mut self) {
        for i in 0..self.tokens.all.len() {
            let token = self.tokens.all[i].clone();
            if self.consumed.contains(&token.index) {
                continue;
            }
            let ident = range_identifier(&token.range);
            if self.processed.contains(&ident) {
                continue;
            }
            let parent = self
                .chain_anchor(&token)
                .unwrap_or_else(|| self.position_parent(&token.range));
            let id = self.push_node(SynthNode {
                origin: NodeOrigin::Token,
                name: token.name.clone(),
                kind: token.kind.clone(),
                modifiers: token.modifiers.clone(),
                name_range: token.range,
                full_range: token.range,
                offset: token.offset,
                parent: Some(parent),
                children: Vec::new(),
                scope_range: token.range,
            });
            self.processed.insert(ident);
            self.consumed.insert(token.index);
            self.token_nodes.insert(token.index, id);
        }
    }

    /// If the token is a field reached from the previous token through an
    /// accessor (`owner.field`), it nests under that token's node.
    fn chain_anchor(&self, token: &Token) -> Option<NodeId> {
        let previous = token
            .index
            .checked_sub(1)
            .and_then(|i| self.tokens.all.get(i))?;
        let &anchor = self.token_nodes.get(&previous.index)?;
        if !self.policy.is_field(&token.kind) || !self.policy.owns_fields(&self.nodes[anchor].kind)
        {
            return None;
        }
        let gap_start = self.lines.offset_at(previous.range.end);
        let gap_end = self.lines.offset_at(token.range.start);
        if gap_end <= gap_start {
            return None;
        }
        let between = self.text.get(gap_start..gap_end)?.trim();
        self.policy
            .accessors
            .iter()
            .any(|a| a == between)
            .then_some(anchor)
    }

    /// Deepest declaration whose scope encloses the range, or the root.
    fn position_parent(&self, range: &SourceRange) -> NodeId {
        let mut current = SynthTree::ROOT;
        loop {
            let next = self.nodes[current].children.iter().copied().find(|&c| {
                let node = &self.nodes[c];
                node.origin == NodeOrigin::Declaration
                    && node.scope_range.start <= range.start
                    && range.end <= node.scope_range.end
            });
            match next {
                Some(child) => current = child,
                None => return current,
            }
        }
    }

    /// Re-sorts every child list into source order. Loose-token insertion
    /// appends, so field members can arrive after later siblings.
    fn sort_children(&mut self) {
        let starts: Vec<Position> = self.nodes.iter().map(|n| n.name_range.start).collect();
        for node in &mut self.nodes {
            node.children.sort_by_key(|&c| starts[c]);
        }
    }
}

fn sorted_symbols(symbols: &[SymbolInfo]) -> Vec<&SymbolInfo> {
    let mut sorted: Vec<&SymbolInfo> = symbols.iter().collect();
    sorted.sort_by_key(|s| s.range.start);
    sorted
}
