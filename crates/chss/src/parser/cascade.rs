//! Cascade resolution.
//!
//! Every rule whose selector matched a token produces one
//! [`MatchCandidate`]; candidates sharing a cascade key (token offset
//! plus pseudo tag) are folded into a single [`ChssMatch`]. Per property
//! the more specific candidate wins, the merged specificity is the
//! component-wise maximum, and relative color actions resolve against
//! the style they are overriding.

use std::collections::{BTreeMap, HashMap};

use crate::parser::selector::{Pseudo, Specificity};
use crate::types::color::{Color, ColorAction};
use crate::types::geometry::SourceRange;

/// One rule match before cascade resolution.
#[derive(Clone, Debug)]
pub struct MatchCandidate {
    pub range: SourceRange,
    pub offset: u32,
    pub style: BTreeMap<String, String>,
    pub color_actions: BTreeMap<String, (ColorAction, Option<String>)>,
    pub specificity: Specificity,
    pub pseudo: Option<Pseudo>,
}

/// A resolved decoration for one token (and pseudo variant).
#[derive(Clone, Debug, PartialEq)]
pub struct ChssMatch {
    pub range: SourceRange,
    pub offset: u32,
    pub style: BTreeMap<String, String>,
    pub specificity: Specificity,
    pub pseudo: Option<Pseudo>,
}

/// Folds candidates into at most one match per cascade key.
///
/// `color_cache` memoizes resolved relative colors across calls, keyed
/// by base value, action and argument.
pub fn resolve_cascade(
    candidates: Vec<MatchCandidate>,
    color_cache: &mut HashMap<String, String>,
) -> Vec<ChssMatch> {
    let mut order: Vec<String> = Vec::new();
    let mut combined: HashMap<String, ChssMatch> = HashMap::new();

    for mut candidate in candidates {
        // Random is absolute, not relative: it needs no base color and
        // resolves the moment the candidate appears.
        for (property, (action, _)) in &candidate.color_actions {
            if *action == ColorAction::Random {
                candidate
                    .style
                    .insert(property.clone(), Color::random().to_hex8_string());
            }
        }

        let key = format!(
            "{}{}",
            candidate.offset,
            candidate.pseudo.map_or("", |p| p.name())
        );
        let Some(existing) = combined.get_mut(&key) else {
            order.push(key.clone());
            combined.insert(
                key,
                ChssMatch {
                    range: candidate.range,
                    offset: candidate.offset,
                    style: candidate.style,
                    specificity: candidate.specificity,
                    pseudo: candidate.pseudo,
                },
            );
            continue;
        };

        let overridden = existing.specificity > candidate.specificity;
        if !overridden {
            // The candidate wins, so its relative actions read their base
            // from the style it is overriding.
            apply_color_actions(
                &candidate.color_actions,
                &existing.style,
                &mut candidate.style,
                color_cache,
            );
        }

        let mut merged = if overridden {
            std::mem::take(&mut candidate.style)
        } else {
            std::mem::take(&mut existing.style)
        };
        merged.extend(if overridden {
            std::mem::take(&mut existing.style)
        } else {
            std::mem::take(&mut candidate.style)
        });
        existing.style = merged;
        existing.range = candidate.range;
        existing.specificity = existing.specificity.max_components(candidate.specificity);
    }

    order
        .into_iter()
        .filter_map(|key| combined.remove(&key))
        .collect()
}

/// Resolves relative color actions against the overridden style.
fn apply_color_actions(
    actions: &BTreeMap<String, (ColorAction, Option<String>)>,
    base_style: &BTreeMap<String, String>,
    style: &mut BTreeMap<String, String>,
    color_cache: &mut HashMap<String, String>,
) {
    for (property, (action, argument)) in actions {
        if *action == ColorAction::Random {
            continue;
        }
        // Without an inherited value there is nothing to act on.
        let Some(base) = base_style.get(property) else {
            continue;
        };
        let cache_key = format!(
            "{base}|{}|{}",
            action.name(),
            argument.as_deref().unwrap_or("")
        );
        if let Some(resolved) = color_cache.get(&cache_key) {
            style.insert(property.clone(), resolved.clone());
            continue;
        }
        let Ok(color) = Color::parse(base) else {
            log::debug!("cannot apply {}() to non-color value {base:?}", action.name());
            continue;
        };
        let amount = argument.as_deref().and_then(|a| a.parse::<f32>().ok());
        let resolved = action.apply(&color, amount).to_hex8_string();
        color_cache.insert(cache_key, resolved.clone());
        style.insert(property.clone(), resolved);
    }
}
