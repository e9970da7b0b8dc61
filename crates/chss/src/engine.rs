//! The CHSS engine.
//!
//! [`ChssEngine`] owns the per-file state a host keeps alive between
//! edits: synthetic trees keyed by file path and version, the resolved
//! relative-color cache and the compiled scope globs. One call to
//! [`ChssEngine::process`] takes a parsed sheet plus the current token
//! index (and, for relational selectors, a [`FileContext`]) and returns
//! the cascaded matches.

use std::collections::{BTreeMap, HashMap};

use regex::Regex;

use crate::matcher::{MatchPair, match_direct};
use crate::parser::cascade::{ChssMatch, MatchCandidate, resolve_cascade};
use crate::parser::selector::{Combinator, MatchMode, ParsedSelector, Pseudo, Specificity, is_compound};
use crate::parser::sheet::Rule;
use crate::tokens::{SymbolInfo, TokenIndex};
use crate::tree::translate::{ChainLink, chain_to_query};
use crate::tree::{NestingPolicy, SynthTree};
use crate::types::geometry::SourceRange;

/// Everything the engine needs to know about the file being decorated
/// beyond its tokens. Only relational selectors and `scope()` rules
/// require one.
#[derive(Clone, Debug, Default)]
pub struct FileContext {
    /// Path the file is known by, also the tree cache key.
    pub path: String,
    /// Language id selecting the [`NestingPolicy`].
    pub language: String,
    /// Snapshot version; a new version discards the cached tree.
    pub version: i64,
    pub text: String,
    pub symbols: Vec<SymbolInfo>,
}

/// Matches of one selector (or one relational chain) of a group.
struct GroupMatch {
    pair: MatchPair,
    specificity: Specificity,
    pseudo: Option<Pseudo>,
}

struct FileTree {
    version: i64,
    tree: SynthTree,
}

/// Matches sharing a style and pseudo tag, ready to decorate as one set.
#[derive(Clone, Debug, PartialEq)]
pub struct DecorationGroup {
    pub style: BTreeMap<String, String>,
    pub pseudo: Option<Pseudo>,
    pub ranges: Vec<SourceRange>,
}

#[derive(Default)]
pub struct ChssEngine {
    case_insensitive: bool,
    /// Resolved relative colors, keyed by base value, action and argument.
    color_cache: HashMap<String, String>,
    /// Compiled scope globs; `None` records a glob that failed to compile.
    scope_cache: HashMap<String, Option<Regex>>,
    trees: HashMap<String, FileTree>,
}

impl ChssEngine {
    pub fn new(case_insensitive: bool) -> Self {
        Self {
            case_insensitive,
            ..Self::default()
        }
    }

    /// Runs a parsed sheet against one file snapshot.
    pub fn process(
        &mut self,
        rules: &[Rule],
        tokens: &TokenIndex,
        context: Option<&FileContext>,
    ) -> Vec<ChssMatch> {
        let mut candidates = Vec::new();

        for rule in rules {
            if let Some(glob) = &rule.scope {
                let in_scope = context.is_some_and(|ctx| self.scope_matches(glob, &ctx.path));
                if !in_scope {
                    continue;
                }
            }
            for group in self.match_group(&rule.selectors, tokens, context) {
                let ranges = group.pair.ranges.into_iter();
                let offsets = group.pair.offsets.into_iter();
                for (range, offset) in ranges.zip(offsets) {
                    candidates.push(MatchCandidate {
                        range,
                        offset,
                        style: rule.style.clone(),
                        color_actions: rule.color_actions.clone(),
                        specificity: group.specificity,
                        pseudo: group.pseudo,
                    });
                }
            }
        }

        resolve_cascade(candidates, &mut self.color_cache)
    }

    /// Drops the cached tree for a file, e.g. when the host closes it.
    pub fn invalidate(&mut self, path: &str) {
        self.trees.remove(path);
    }

    /// Resolves one selector group to its matches.
    ///
    /// Groups containing structural combinators go through the synthetic
    /// tree when a context is available; everything else (including such
    /// groups without a context) matches tokens directly.
    fn match_group(
        &mut self,
        selectors: &[ParsedSelector],
        tokens: &TokenIndex,
        context: Option<&FileContext>,
    ) -> Vec<GroupMatch> {
        if let Some(ctx) = context {
            if is_compound(selectors) {
                return self.match_group_with_tree(selectors, tokens, ctx);
            }
        }

        selectors
            .iter()
            .map(|selector| {
                let negated = self.negated_offsets(selector, tokens, context);
                GroupMatch {
                    pair: match_direct(selector, tokens, self.case_insensitive, &negated),
                    specificity: selector.specificity,
                    pseudo: selector.pseudo,
                }
            })
            .collect()
    }

    /// Offsets matched by a selector's `:not()` groups.
    fn negated_offsets(
        &mut self,
        selector: &ParsedSelector,
        tokens: &TokenIndex,
        context: Option<&FileContext>,
    ) -> Vec<u32> {
        let mut offsets = Vec::new();
        for group in &selector.not_groups {
            for matched in self.match_group(group, tokens, context) {
                offsets.extend(matched.pair.offsets);
            }
        }
        offsets
    }

    fn match_group_with_tree(
        &mut self,
        selectors: &[ParsedSelector],
        tokens: &TokenIndex,
        ctx: &FileContext,
    ) -> Vec<GroupMatch> {
        self.ensure_tree(ctx, tokens);
        let mut results = Vec::new();

        for chain in split_chains(selectors) {
            // Regex filters and :not() groups resolve against the token
            // index up front; the query carries only their results.
            let mut resolved = Vec::new();
            for &selector in &chain {
                let negated = self.negated_offsets(selector, tokens, Some(ctx));
                let regex_ranges = (selector.match_mode == MatchMode::Regex).then(|| {
                    match_direct(selector, tokens, self.case_insensitive, &negated).ranges
                });
                resolved.push((regex_ranges, negated));
            }
            let links: Vec<ChainLink<'_>> = chain
                .iter()
                .zip(&resolved)
                .map(|(&selector, (regex_ranges, negated))| ChainLink {
                    selector,
                    regex_ranges: regex_ranges.clone(),
                    not_offsets: negated.clone(),
                })
                .collect();
            let Some(query) = chain_to_query(&links) else {
                continue;
            };
            let Some(last) = chain.last() else {
                continue;
            };

            let insensitive = self.case_insensitive;
            let Some(entry) = self.trees.get_mut(&ctx.path) else {
                continue;
            };
            let ids = match entry.tree.select(&query, insensitive) {
                Ok(ids) => ids,
                Err(e) => {
                    log::debug!("selector chain produced unusable query: {e}");
                    continue;
                }
            };

            let mut pair = MatchPair::default();
            for id in ids {
                let node = entry.tree.node(id);
                pair.push(node.name_range, node.offset);
            }
            results.push(GroupMatch {
                pair,
                // The chain's accumulated specificity sits on its last link.
                specificity: last.specificity,
                pseudo: last.pseudo,
            });
        }
        results
    }

    fn ensure_tree(&mut self, ctx: &FileContext, tokens: &TokenIndex) {
        let cached = self.trees.get(&ctx.path).map(|t| t.version);
        if cached != Some(ctx.version) {
            log::debug!("building tree for {} at version {}", ctx.path, ctx.version);
            let policy = NestingPolicy::for_language(&ctx.language);
            let tree = SynthTree::build(&ctx.symbols, tokens, &ctx.text, &policy);
            self.trees.insert(
                ctx.path.clone(),
                FileTree {
                    version: ctx.version,
                    tree,
                },
            );
        }
    }

    fn scope_matches(&mut self, glob: &str, path: &str) -> bool {
        let compiled = self
            .scope_cache
            .entry(glob.to_string())
            .or_insert_with(|| compile_glob(glob));
        compiled.as_ref().is_some_and(|re| re.is_match(path))
    }
}

/// Splits a selector group into its comma-separated relational chains.
fn split_chains(selectors: &[ParsedSelector]) -> Vec<Vec<&ParsedSelector>> {
    let mut chains = Vec::new();
    let mut current = Vec::new();
    for selector in selectors {
        current.push(selector);
        if selector.combinator == Some(Combinator::Comma) {
            chains.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chains.push(current);
    }
    chains
}

/// Compiles a scope glob into an anchored path regex.
///
/// `**` crosses separators, `*` and `?` do not. Globs without a leading
/// slash or `**` also match against any path suffix, so `*.ts` behaves
/// the way sheet authors expect.
fn compile_glob(glob: &str) -> Option<Regex> {
    let mut pattern = String::from("^");
    if !glob.starts_with('/') && !glob.starts_with("**") {
        pattern.push_str("(?:.*/)?");
    }

    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    pattern.push_str("(?:.*/)?");
                } else {
                    pattern.push_str(".*");
                }
            }
            '*' => pattern.push_str("[^/]*"),
            '?' => pattern.push_str("[^/]"),
            c => pattern.push_str(&regex::escape(&c.to_string())),
        }
    }
    pattern.push('$');

    match Regex::new(&pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            log::debug!("scope glob {glob:?} does not compile: {e}");
            None
        }
    }
}

/// Buckets matches by style and pseudo tag, in first-match order.
pub fn group_matches(matches: &[ChssMatch]) -> Vec<DecorationGroup> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, DecorationGroup> = HashMap::new();

    for matched in matches {
        let key = format!("{:?}|{:?}", matched.style, matched.pseudo);
        let group = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            DecorationGroup {
                style: matched.style.clone(),
                pseudo: matched.pseudo,
                ranges: Vec::new(),
            }
        });
        group.ranges.push(matched.range);
    }

    order
        .into_iter()
        .filter_map(|key| groups.remove(&key))
        .collect()
}
