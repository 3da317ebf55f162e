//! Walks two attribute trees and produces a sparse, path-addressable diff.

use std::collections::BTreeMap;

use super::path::Path;
use super::tree::AttributeTree;

/// The classification of a single path between an old and new image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiffTag {
    Added,
    Changed,
    Cleared,
}

/// A sparse map from path to diff tag, covering every leaf path that changed plus all of its
/// ancestors. A path absent from the map is `unchanged` (that's the "sparse" part — storing
/// `Unchanged` entries would make the map as large as the union of both trees for no benefit).
#[derive(Clone, Debug, Default)]
pub struct AttributeDiff {
    tags: BTreeMap<String, DiffTag>,
}

impl AttributeDiff {
    /// Diff `old` against `new`. Either side may be absent (INSERT has no old image, REMOVE has
    /// no new image); both absent yields an empty diff.
    pub fn compute(old: Option<&AttributeTree>, new: Option<&AttributeTree>) -> AttributeDiff {
        let mut tags = BTreeMap::new();
        diff_node(old, new, &Path::root(), &mut tags);
        AttributeDiff { tags }
    }

    /// The diff tag at an exact path, or `None` if that path is unchanged.
    pub fn tag_at(&self, path: &Path) -> Option<DiffTag> {
        self.tags.get(&path.to_key()).copied()
    }

    /// True iff the path carries exactly `tag`. Sibling isolation falls out naturally: a path
    /// that wasn't touched was never inserted, so it reads as "no tag" rather than inheriting a
    /// neighbor's status.
    pub fn matches(&self, path: &Path, tag: DiffTag) -> bool {
        self.tag_at(path) == Some(tag)
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn affected_paths(&self) -> impl Iterator<Item = (&str, DiffTag)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Combine the tags of a node's children into the node's own tag, per the "coarsest
/// non-unchanged label" rule: a homogeneous set of children (all added, or all cleared) keeps
/// that label; anything mixed (some changed, or added next to cleared) collapses to `Changed`.
fn combine_tags(children: impl Iterator<Item = DiffTag>) -> Option<DiffTag> {
    let mut saw_added = false;
    let mut saw_changed = false;
    let mut saw_cleared = false;
    let mut any = false;
    for tag in children {
        any = true;
        match tag {
            DiffTag::Added => saw_added = true,
            DiffTag::Changed => saw_changed = true,
            DiffTag::Cleared => saw_cleared = true,
        }
    }
    if !any {
        None
    } else if saw_changed || (saw_added && saw_cleared) {
        Some(DiffTag::Changed)
    } else if saw_added {
        Some(DiffTag::Added)
    } else {
        Some(DiffTag::Cleared)
    }
}

/// Recursively mark every leaf (and interior) path under `tree`, rooted at `path`, with `tag`.
/// Used when a whole subtree is newly added or entirely removed.
fn mark_subtree(tree: &AttributeTree, path: &Path, tag: DiffTag, out: &mut BTreeMap<String, DiffTag>) {
    match tree {
        AttributeTree::Map(map) => {
            if map.is_empty() {
                out.insert(path.to_key(), tag);
                return;
            }
            for (k, v) in map {
                mark_subtree(v, &path.push_field(k), tag, out);
            }
            out.insert(path.to_key(), tag);
        }
        AttributeTree::List(items) => {
            if items.is_empty() {
                out.insert(path.to_key(), tag);
                return;
            }
            for (i, v) in items.iter().enumerate() {
                mark_subtree(v, &path.push_index(i), tag, out);
            }
            out.insert(path.to_key(), tag);
        }
        _ => {
            out.insert(path.to_key(), tag);
        }
    }
}

fn sets_equal(a: &[super::tree::Scalar], b: &[super::tree::Scalar]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a_sorted = a.to_vec();
    let mut b_sorted = b.to_vec();
    a_sorted.sort();
    b_sorted.sort();
    a_sorted == b_sorted
}

/// Diff one node (root or nested) of the tree. Inserts this node's own entry into `out` when
/// non-unchanged, and returns that tag so the parent can fold it into its own combination.
fn diff_node(
    old: Option<&AttributeTree>,
    new: Option<&AttributeTree>,
    path: &Path,
    out: &mut BTreeMap<String, DiffTag>,
) -> Option<DiffTag> {
    match (old, new) {
        (None, None) => None,
        (None, Some(new_tree)) => {
            mark_subtree(new_tree, path, DiffTag::Added, out);
            Some(DiffTag::Added)
        }
        (Some(old_tree), None) => {
            mark_subtree(old_tree, path, DiffTag::Cleared, out);
            Some(DiffTag::Cleared)
        }
        (Some(old_tree), Some(new_tree)) => {
            if new_tree.is_null() && !old_tree.is_null() {
                // Explicit null-sentinel overwrite: the user cleared the value, as opposed to
                // the key simply being absent from the new image.
                mark_subtree(old_tree, path, DiffTag::Cleared, out);
                return Some(DiffTag::Cleared);
            }
            let tag = match (old_tree, new_tree) {
                (AttributeTree::Map(old_map), AttributeTree::Map(new_map)) => {
                    let mut keys: Vec<&String> = old_map.keys().chain(new_map.keys()).collect();
                    keys.sort();
                    keys.dedup();
                    let child_tags: Vec<DiffTag> = keys
                        .into_iter()
                        .filter_map(|k| {
                            diff_node(old_map.get(k), new_map.get(k), &path.push_field(k), out)
                        })
                        .collect();
                    combine_tags(child_tags.into_iter())
                }
                (AttributeTree::List(old_items), AttributeTree::List(new_items)) => {
                    let max_len = old_items.len().max(new_items.len());
                    let child_tags: Vec<DiffTag> = (0..max_len)
                        .filter_map(|i| {
                            diff_node(old_items.get(i), new_items.get(i), &path.push_index(i), out)
                        })
                        .collect();
                    combine_tags(child_tags.into_iter())
                }
                (AttributeTree::Set(old_set), AttributeTree::Set(new_set)) => {
                    if sets_equal(old_set, new_set) {
                        None
                    } else {
                        Some(DiffTag::Changed)
                    }
                }
                _ => {
                    if old_tree == new_tree {
                        None
                    } else {
                        Some(DiffTag::Changed)
                    }
                }
            };
            if let Some(tag) = tag {
                out.insert(path.to_key(), tag);
            }
            tag
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap as Map;

    fn map(pairs: &[(&str, AttributeTree)]) -> AttributeTree {
        let mut m = Map::new();
        for (k, v) in pairs {
            m.insert(k.to_string(), v.clone());
        }
        AttributeTree::Map(m)
    }

    #[test]
    fn added_attribute_when_absent_in_old() {
        let old = map(&[]);
        let new = map(&[("email", AttributeTree::Str("x".into()))]);
        let diff = AttributeDiff::compute(Some(&old), Some(&new));
        assert!(diff.matches(&Path::parse("email"), DiffTag::Added));
    }

    #[test]
    fn cleared_attribute_on_explicit_null() {
        let old = map(&[("email", AttributeTree::Str("x".into()))]);
        let new = map(&[("email", AttributeTree::Null)]);
        let diff = AttributeDiff::compute(Some(&old), Some(&new));
        assert!(diff.matches(&Path::parse("email"), DiffTag::Cleared));
    }

    #[test]
    fn cleared_attribute_on_removal() {
        let old = map(&[("email", AttributeTree::Str("x".into()))]);
        let new = map(&[]);
        let diff = AttributeDiff::compute(Some(&old), Some(&new));
        assert!(diff.matches(&Path::parse("email"), DiffTag::Cleared));
    }

    #[test]
    fn changed_attribute_on_value_replace() {
        let old = map(&[("email", AttributeTree::Str("x".into()))]);
        let new = map(&[("email", AttributeTree::Str("y".into()))]);
        let diff = AttributeDiff::compute(Some(&old), Some(&new));
        assert!(diff.matches(&Path::parse("email"), DiffTag::Changed));
        assert!(!diff.matches(&Path::parse("email"), DiffTag::Cleared));
    }

    #[test]
    fn sibling_isolation() {
        let old = map(&[
            ("a", map(&[("b", AttributeTree::Str("1".into())), ("c", AttributeTree::Str("z".into()))])),
        ]);
        let new = map(&[
            ("a", map(&[("b", AttributeTree::Str("1".into())), ("c", AttributeTree::Str("changed".into()))])),
        ]);
        let diff = AttributeDiff::compute(Some(&old), Some(&new));
        assert!(diff.matches(&Path::parse("a.c"), DiffTag::Changed));
        assert!(diff.tag_at(&Path::parse("a.b")).is_none());
    }

    #[test]
    fn nested_sibling_theme_then_notifications() {
        let old = map(&[(
            "preferences",
            map(&[
                ("theme", AttributeTree::Str("light".into())),
                ("notifications", AttributeTree::Bool(true)),
            ]),
        )]);
        let new_theme_changed = map(&[(
            "preferences",
            map(&[
                ("theme", AttributeTree::Str("dark".into())),
                ("notifications", AttributeTree::Bool(true)),
            ]),
        )]);
        let diff = AttributeDiff::compute(Some(&old), Some(&new_theme_changed));
        assert!(diff.matches(&Path::parse("preferences.theme"), DiffTag::Changed));
        assert!(diff.matches(&Path::parse("preferences"), DiffTag::Changed));
        assert!(diff.tag_at(&Path::parse("preferences.notifications")).is_none());

        let new_notif_changed = map(&[(
            "preferences",
            map(&[
                ("theme", AttributeTree::Str("light".into())),
                ("notifications", AttributeTree::Bool(false)),
            ]),
        )]);
        let diff2 = AttributeDiff::compute(Some(&old), Some(&new_notif_changed));
        assert!(diff2.matches(&Path::parse("preferences.notifications"), DiffTag::Changed));
        assert!(diff2.matches(&Path::parse("preferences"), DiffTag::Changed));
        assert!(diff2.tag_at(&Path::parse("preferences.theme")).is_none());
    }

    #[test]
    fn unchanged_tree_yields_empty_diff() {
        let old = map(&[("email", AttributeTree::Str("x".into()))]);
        let new = old.clone();
        let diff = AttributeDiff::compute(Some(&old), Some(&new));
        assert!(diff.is_empty());
    }

    #[test]
    fn insert_with_no_old_image_marks_everything_added() {
        let new = map(&[("email", AttributeTree::Str("x".into()))]);
        let diff = AttributeDiff::compute(None, Some(&new));
        assert!(diff.matches(&Path::parse("email"), DiffTag::Added));
    }

    #[test]
    fn remove_with_no_new_image_marks_everything_cleared() {
        let old = map(&[("email", AttributeTree::Str("x".into()))]);
        let diff = AttributeDiff::compute(Some(&old), None);
        assert!(diff.matches(&Path::parse("email"), DiffTag::Cleared));
    }

    #[test]
    fn flat_map_reconstructs_new_from_old_plus_diff() {
        // Property #3: applying `added`/`changed` entries and dropping `cleared` ones
        // reconstructs `new` from `old`, up to decoder equivalence.
        let old = map(&[
            ("a", AttributeTree::Str("keep".into())),
            ("b", AttributeTree::Str("before".into())),
            ("c", AttributeTree::Str("gone".into())),
        ]);
        let new = map(&[
            ("a", AttributeTree::Str("keep".into())),
            ("b", AttributeTree::Str("after".into())),
            ("d", AttributeTree::Str("fresh".into())),
        ]);
        let diff = AttributeDiff::compute(Some(&old), Some(&new));

        let old_map = old.as_map().unwrap().clone();
        let new_map = new.as_map().unwrap();
        let mut reconstructed = old_map;
        for (path, tag) in diff.affected_paths() {
            match tag {
                DiffTag::Added | DiffTag::Changed => {
                    reconstructed.insert(path.to_string(), new_map.get(path).unwrap().clone());
                }
                DiffTag::Cleared => {
                    reconstructed.remove(path);
                }
            }
        }
        assert_eq!(AttributeTree::Map(reconstructed), new);
    }

    #[test]
    fn mixed_added_and_cleared_children_collapse_parent_to_changed() {
        let old = map(&[("a", map(&[("x", AttributeTree::Str("1".into()))]))]);
        let new = map(&[("a", map(&[("y", AttributeTree::Str("2".into()))]))]);
        let diff = AttributeDiff::compute(Some(&old), Some(&new));
        assert!(diff.matches(&Path::parse("a.x"), DiffTag::Cleared));
        assert!(diff.matches(&Path::parse("a.y"), DiffTag::Added));
        assert!(diff.matches(&Path::parse("a"), DiffTag::Changed));
    }
}
