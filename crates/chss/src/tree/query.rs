//! The small query language evaluated against the synthetic tree.
//!
//! Queries are what relational selector chains compile down to (see
//! [`super::translate`]). A query is a comma list of complex selectors;
//! each complex selector is a chain of steps joined by descendant
//! (whitespace) or child (`>`) combinators. A step is `*` or one or more
//! predicates:
//!
//! - `.name` — the node's kind or one of its modifiers
//! - `[data-attr]` — attribute existence
//! - `[data-attr="v"]` — equality, plus `^=`, `$=`, `*=` and `!=` forms
//!
//! Evaluation walks candidates rightmost step first, then checks the
//! remaining steps against the candidate's ancestor chain.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace0},
    combinator::{all_consuming, map, opt},
    multi::many1,
    sequence::{delimited, pair, preceded},
};

use super::{NodeId, SynthTree};
use crate::error::ChssError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AttrOp {
    Equals,
    StartsWith,
    EndsWith,
    Includes,
    NotEquals,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Predicate {
    /// `*`, satisfied by every node.
    Any,
    /// `.name`, the node's kind or a modifier.
    Class(String),
    /// `[data-attr]`, attribute existence.
    Has(String),
    /// `[data-attr op "value"]`.
    Attr {
        name: String,
        op: AttrOp,
        value: String,
    },
}

/// How a step relates to the step after it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StepCombinator {
    /// Last step of the chain.
    None,
    Descendant,
    Child,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Step {
    predicates: Vec<Predicate>,
    combinator: StepCombinator,
}

/// A parsed query: alternatives of step chains.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeQuery {
    alternatives: Vec<Vec<Step>>,
}

impl TreeQuery {
    pub fn parse(source: &str) -> Result<Self, ChssError> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(ChssError::InvalidQuery(source.to_string()));
        }
        let comma = delimited(multispace0, char(','), multispace0);
        let (_, alternatives) =
            all_consuming(nom::multi::separated_list1(comma, parse_complex))(trimmed)
                .map_err(|_| ChssError::InvalidQuery(source.to_string()))?;
        Ok(Self { alternatives })
    }

    fn matches(&self, tree: &SynthTree, id: NodeId, insensitive: bool) -> bool {
        self.alternatives
            .iter()
            .any(|steps| complex_matches(tree, id, steps, insensitive))
    }
}

impl SynthTree {
    /// Runs a query, returning matching node ids in document order.
    ///
    /// Results are memoized per query string for the life of the tree.
    pub fn select(&mut self, source: &str, insensitive: bool) -> Result<Vec<NodeId>, ChssError> {
        let key = (source.to_string(), insensitive);
        if let Some(hit) = self.query_cache.get(&key) {
            return Ok(hit.clone());
        }
        let query = TreeQuery::parse(source)?;
        let results: Vec<NodeId> = self
            .document_order()
            .into_iter()
            .filter(|&id| query.matches(self, id, insensitive))
            .collect();
        self.query_cache.insert(key, results.clone());
        Ok(results)
    }
}

fn complex_matches(tree: &SynthTree, id: NodeId, steps: &[Step], insensitive: bool) -> bool {
    let Some((last, rest)) = steps.split_last() else {
        return false;
    };
    step_matches(tree, id, last, insensitive) && ancestors_match(tree, id, rest, insensitive)
}

/// Matches the remaining steps against the ancestor chain of `id`, whose
/// own step already matched. Descendant hops backtrack.
fn ancestors_match(tree: &SynthTree, id: NodeId, steps: &[Step], insensitive: bool) -> bool {
    let Some((step, rest)) = steps.split_last() else {
        return true;
    };
    match step.combinator {
        StepCombinator::Child => tree.ancestor_of(id).is_some_and(|parent| {
            step_matches(tree, parent, step, insensitive)
                && ancestors_match(tree, parent, rest, insensitive)
        }),
        _ => {
            let mut ancestor = tree.ancestor_of(id);
            while let Some(candidate) = ancestor {
                if step_matches(tree, candidate, step, insensitive)
                    && ancestors_match(tree, candidate, rest, insensitive)
                {
                    return true;
                }
                ancestor = tree.ancestor_of(candidate);
            }
            false
        }
    }
}

fn step_matches(tree: &SynthTree, id: NodeId, step: &Step, insensitive: bool) -> bool {
    let node = tree.node(id);
    step.predicates.iter().all(|predicate| match predicate {
        Predicate::Any => true,
        Predicate::Class(class) => node.has_class(class),
        Predicate::Has(name) => node.attribute(name).is_some(),
        Predicate::Attr { name, op, value } => match node.attribute(name) {
            Some(actual) => attr_op_matches(*op, &actual, value, insensitive),
            None => *op == AttrOp::NotEquals,
        },
    })
}

fn attr_op_matches(op: AttrOp, actual: &str, wanted: &str, insensitive: bool) -> bool {
    let (actual, wanted) = if insensitive {
        (actual.to_lowercase(), wanted.to_lowercase())
    } else {
        (actual.to_string(), wanted.to_string())
    };
    match op {
        AttrOp::Equals => actual == wanted,
        AttrOp::NotEquals => actual != wanted,
        AttrOp::StartsWith => actual.starts_with(&wanted),
        AttrOp::EndsWith => actual.ends_with(&wanted),
        AttrOp::Includes => actual.contains(&wanted),
    }
}

fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '-' || c == '_')(input)
}

fn class_predicate(input: &str) -> IResult<&str, Predicate> {
    map(preceded(char('.'), identifier), |name: &str| {
        Predicate::Class(name.to_string())
    })(input)
}

fn attr_value(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('"'), take_while(|c| c != '"'), char('"')),
        take_while1(|c| c != ']'),
    ))(input)
}

fn attr_op(input: &str) -> IResult<&str, AttrOp> {
    alt((
        map(tag("^="), |_| AttrOp::StartsWith),
        map(tag("$="), |_| AttrOp::EndsWith),
        map(tag("*="), |_| AttrOp::Includes),
        map(tag("!="), |_| AttrOp::NotEquals),
        map(tag("="), |_| AttrOp::Equals),
    ))(input)
}

fn attr_predicate(input: &str) -> IResult<&str, Predicate> {
    map(
        delimited(
            char('['),
            pair(identifier, opt(pair(attr_op, attr_value))),
            char(']'),
        ),
        |(name, comparison)| match comparison {
            Some((op, value)) => Predicate::Attr {
                name: name.to_string(),
                op,
                value: value.to_string(),
            },
            None => Predicate::Has(name.to_string()),
        },
    )(input)
}

fn parse_step(input: &str) -> IResult<&str, Vec<Predicate>> {
    alt((
        map(char('*'), |_| vec![Predicate::Any]),
        many1(alt((class_predicate, attr_predicate))),
    ))(input)
}

fn parse_complex(input: &str) -> IResult<&str, Vec<Step>> {
    let (mut remaining, first) = parse_step(input)?;
    let mut steps = vec![Step {
        predicates: first,
        combinator: StepCombinator::None,
    }];

    loop {
        let (after_space, space) = multispace0::<_, nom::error::Error<&str>>(remaining)?;
        let (combinator, after_combinator) = if let Some(rest) = after_space.strip_prefix('>') {
            let (rest, _) = multispace0::<_, nom::error::Error<&str>>(rest)?;
            (StepCombinator::Child, rest)
        } else if !space.is_empty() {
            (StepCombinator::Descendant, after_space)
        } else {
            break;
        };

        match parse_step(after_combinator) {
            Ok((rest, predicates)) => {
                if let Some(previous) = steps.last_mut() {
                    previous.combinator = combinator;
                }
                steps.push(Step {
                    predicates,
                    combinator: StepCombinator::None,
                });
                remaining = rest;
            }
            Err(_) if combinator == StepCombinator::Descendant => break,
            Err(e) => return Err(e),
        }
    }
    Ok((remaining, steps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::{SymbolInfo, Token, TokenIndex};
    use crate::tree::NestingPolicy;
    use crate::types::geometry::SourceRange;

    fn parse(source: &str) -> TreeQuery {
        TreeQuery::parse(source).expect("query parses")
    }

    #[test]
    fn parses_predicates_and_combinators() {
        let query = parse(r#".class > [data-name^="get"].method, *"#);
        assert_eq!(query.alternatives.len(), 2);
        let chain = &query.alternatives[0];
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].combinator, StepCombinator::Child);
        assert_eq!(chain[1].predicates.len(), 2);
        assert_eq!(query.alternatives[1][0].predicates, vec![Predicate::Any]);
    }

    #[test]
    fn parses_empty_quoted_value() {
        let query = parse(r#"[data-mods=""]"#);
        assert_eq!(
            query.alternatives[0][0].predicates,
            vec![Predicate::Attr {
                name: "data-mods".to_string(),
                op: AttrOp::Equals,
                value: String::new(),
            }]
        );
    }

    #[test]
    fn rejects_malformed_queries() {
        assert!(TreeQuery::parse("").is_err());
        assert!(TreeQuery::parse("[unterminated").is_err());
        assert!(TreeQuery::parse("a b").is_err()); // bare words are not steps
        assert!(TreeQuery::parse(".x >").is_err());
    }

    fn token(name: &str, kind: &str, line: u32, character: u32, mods: &[&str]) -> Token {
        Token {
            name: name.to_string(),
            range: SourceRange::of(line, character, line, character + name.len() as u32),
            offset: line * 100 + character,
            kind: kind.to_string(),
            modifiers: mods.iter().map(|m| m.to_string()).collect(),
            index: 0,
        }
    }

    // class App { run() { config.port } }
    fn tree() -> SynthTree {
        let text = "class App {\n  run() {\n    config.port\n  }\n}\n";
        let mut app = SymbolInfo {
            name: "App".to_string(),
            kind: "class".to_string(),
            range: SourceRange::of(0, 0, 4, 1),
            selection_range: SourceRange::of(0, 6, 0, 9),
            children: Vec::new(),
        };
        app.children.push(SymbolInfo {
            name: "run".to_string(),
            kind: "method".to_string(),
            range: SourceRange::of(1, 2, 3, 3),
            selection_range: SourceRange::of(1, 2, 1, 5),
            children: Vec::new(),
        });
        let tokens = TokenIndex::from_tokens(vec![
            token("App", "class", 0, 6, &["readonly"]),
            token("run", "method", 1, 2, &["declaration"]),
            token("config", "variable", 2, 4, &[]),
            token("port", "property", 2, 11, &[]),
        ]);
        SynthTree::build(&[app], &tokens, text, &NestingPolicy::for_language("typescript"))
    }

    fn names(tree: &SynthTree, ids: &[NodeId]) -> Vec<String> {
        ids.iter().map(|&id| tree.node(id).name.clone()).collect()
    }

    #[test]
    fn descendant_and_child_evaluation() {
        let mut tree = tree();
        let ids = tree.select(".class .property", false).expect("query");
        assert_eq!(names(&tree, &ids), vec!["port"]);

        let ids = tree.select(".class > .method", false).expect("query");
        assert_eq!(names(&tree, &ids), vec!["run"]);

        // `port` is a grandchild of `run`, not a child.
        let ids = tree.select(".method > .property", false).expect("query");
        assert!(ids.is_empty());
    }

    #[test]
    fn attribute_operators() {
        let mut tree = tree();
        let ids = tree.select(r#"[data-name^="co"]"#, false).expect("query");
        assert_eq!(names(&tree, &ids), vec!["config"]);

        let ids = tree.select(r#"[data-mods=""]"#, false).expect("query");
        assert_eq!(names(&tree, &ids), vec!["config", "port"]);

        let modified = tree.select(".declaration", false).expect("query");
        assert_eq!(names(&tree, &modified), vec!["run"]);
    }

    #[test]
    fn negated_offset_excludes_one_node() {
        let mut tree = tree();
        let all = tree.select(".variable, .property", false).expect("query");
        assert_eq!(all.len(), 2);
        let config_offset = tree.node(all[0]).offset;

        let query = format!(r#".variable[data-offset!="{config_offset}"], .property"#);
        let ids = tree.select(&query, false).expect("query");
        assert_eq!(names(&tree, &ids), vec!["port"]);
    }

    #[test]
    fn case_folding_applies_to_attribute_values() {
        let mut tree = tree();
        assert!(tree.select(r#"[data-name="APP"]"#, false).expect("query").is_empty());
        let ids = tree.select(r#"[data-name="APP"]"#, true).expect("query");
        assert_eq!(names(&tree, &ids), vec!["App"]);
    }

    #[test]
    fn results_are_memoized_per_query() {
        let mut tree = tree();
        let first = tree.select("*", false).expect("query");
        assert_eq!(first.len(), 4);
        assert!(tree.query_cache.contains_key(&("*".to_string(), false)));
        assert_eq!(tree.select("*", false).expect("query"), first);
    }
}
