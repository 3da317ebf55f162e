//! The predicate library (§4.2): small tagged-variant interpreter over decoded images and
//! their diff, evaluated by [`Predicate::evaluate`] rather than raw boxed closures at the
//! leaves, so the validation-target logic never needs to know which predicate kind it's
//! running (§9).

use std::sync::Arc;

use serde_json::Value;

use crate::attributes::{AttributeDiff, AttributeTree, DiffTag, Path};
use crate::error::{PredicateError, SchemaError};
use crate::registry::ValidationTarget;

/// The minimal capability an external schema library needs to provide: validate a decoded tree
/// and, on success, hand back whatever parsed/refined representation the handler should see
/// instead of the raw tree. The engine depends only on this trait, never on a concrete schema
/// crate (§9 design note).
pub trait SchemaValidator: Send + Sync {
    fn validate(&self, value: &AttributeTree) -> Result<Value, SchemaError>;
}

/// A `SchemaValidator` backed by a plain closure, for callers who don't want to define a type.
pub struct FnSchemaValidator<F>(pub F)
where
    F: Fn(&AttributeTree) -> Result<Value, SchemaError> + Send + Sync;

impl<F> SchemaValidator for FnSchemaValidator<F>
where
    F: Fn(&AttributeTree) -> Result<Value, SchemaError> + Send + Sync,
{
    fn validate(&self, value: &AttributeTree) -> Result<Value, SchemaError> {
        (self.0)(value)
    }
}

/// A structural predicate applied independently to whichever image(s) the handler's
/// `validationTarget` selects. Fallible: a guard that can't render a verdict (a malformed
/// assumption about the tree's shape, a downstream check that errors out) returns
/// `Err(PredicateError::TypeGuard(..))` rather than panicking or guessing `false` (§8.1 S9).
pub type TypeGuardFn = Arc<dyn Fn(&AttributeTree) -> Result<bool, PredicateError> + Send + Sync>;

/// The predicate language. Constructed via the free functions below (`type_guard`, `schema`,
/// `changed_attribute`, ...) rather than built directly, matching the vocabulary in §4.2.
#[derive(Clone)]
pub enum Predicate {
    TypeGuard(TypeGuardFn),
    Schema(Arc<dyn SchemaValidator>),
    ChangedAttribute(Path),
    FieldCleared(Path),
    AddedAttribute(Path),
    AnyOf(Vec<Predicate>),
    AllOf(Vec<Predicate>),
}

impl Predicate {
    pub fn type_guard(f: impl Fn(&AttributeTree) -> Result<bool, PredicateError> + Send + Sync + 'static) -> Predicate {
        Predicate::TypeGuard(Arc::new(f))
    }

    pub fn schema(validator: impl SchemaValidator + 'static) -> Predicate {
        Predicate::Schema(Arc::new(validator))
    }

    pub fn changed_attribute(path: impl Into<Path>) -> Predicate {
        Predicate::ChangedAttribute(path.into())
    }

    pub fn field_cleared(path: impl Into<Path>) -> Predicate {
        Predicate::FieldCleared(path.into())
    }

    pub fn added_attribute(path: impl Into<Path>) -> Predicate {
        Predicate::AddedAttribute(path.into())
    }

    pub fn any_of(predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
        Predicate::AnyOf(predicates.into_iter().collect())
    }

    pub fn all_of(predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
        Predicate::AllOf(predicates.into_iter().collect())
    }
}

/// Everything a predicate needs to evaluate: the images selected by the handler's validation
/// target, and the record-wide diff (diff-based predicates always read from here, regardless
/// of `target` — §4.4 step 3).
pub struct EvalContext<'a> {
    pub diff: &'a AttributeDiff,
    pub new_image: Option<&'a AttributeTree>,
    pub old_image: Option<&'a AttributeTree>,
    pub target: ValidationTarget,
}

/// The outcome of evaluating a predicate: whether it matched, plus any schema-parsed values
/// produced along the way (§4.2's "on success, retain the parsed value for delivery").
#[derive(Clone, Debug, Default)]
pub struct Evaluation {
    pub matched: bool,
    pub parsed_new: Option<Value>,
    pub parsed_old: Option<Value>,
}

impl Evaluation {
    fn unmatched() -> Evaluation {
        Evaluation::default()
    }

    fn matched_plain() -> Evaluation {
        Evaluation {
            matched: true,
            ..Default::default()
        }
    }

    /// Fold a later predicate's parsed values into this one's, for `all_of`: a schema match
    /// further down the chain still needs to reach the callback.
    fn merge_parsed(mut self, other: &Evaluation) -> Evaluation {
        if other.parsed_new.is_some() {
            self.parsed_new = other.parsed_new.clone();
        }
        if other.parsed_old.is_some() {
            self.parsed_old = other.parsed_old.clone();
        }
        self
    }
}

impl Predicate {
    /// Evaluate this predicate against `ctx`. Errors (a type guard that panics and is caught at
    /// the call site, or a schema validator that rejects a value) are returned rather than
    /// silently treated as `false` here — the dispatch core is the one that downgrades a
    /// `PredicateError` to "skip this handler" per §7.
    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Evaluation, PredicateError> {
        match self {
            Predicate::TypeGuard(f) => eval_on_images(ctx, |tree| f(tree)),
            Predicate::Schema(validator) => eval_schema(ctx, validator.as_ref()),
            Predicate::ChangedAttribute(path) => Ok(eval_diff_tag(ctx, path, DiffTag::Changed)),
            Predicate::FieldCleared(path) => Ok(eval_diff_tag(ctx, path, DiffTag::Cleared)),
            Predicate::AddedAttribute(path) => Ok(eval_diff_tag(ctx, path, DiffTag::Added)),
            Predicate::AnyOf(predicates) => {
                for p in predicates {
                    let eval = p.evaluate(ctx)?;
                    if eval.matched {
                        return Ok(eval);
                    }
                }
                Ok(Evaluation::unmatched())
            }
            Predicate::AllOf(predicates) => {
                let mut acc = Evaluation::matched_plain();
                for p in predicates {
                    let eval = p.evaluate(ctx)?;
                    if !eval.matched {
                        return Ok(Evaluation::unmatched());
                    }
                    acc = acc.merge_parsed(&eval);
                }
                Ok(acc)
            }
        }
    }
}

/// Apply `f` independently to each image the validation target selects, requiring every
/// selected image to satisfy it (§4.4 step 3: "for both, both images must individually satisfy
/// the predicate; for others, the single chosen image must satisfy it").
fn eval_on_images(
    ctx: &EvalContext<'_>,
    f: impl Fn(&AttributeTree) -> Result<bool, PredicateError>,
) -> Result<Evaluation, PredicateError> {
    let check = |image: Option<&AttributeTree>| -> Result<bool, PredicateError> {
        match image {
            Some(tree) => f(tree),
            None => Ok(false),
        }
    };
    let matched = match ctx.target {
        ValidationTarget::NewImage => check(ctx.new_image)?,
        ValidationTarget::OldImage => check(ctx.old_image)?,
        ValidationTarget::Both => check(ctx.new_image)? && check(ctx.old_image)?,
    };
    Ok(if matched {
        Evaluation::matched_plain()
    } else {
        Evaluation::unmatched()
    })
}

fn eval_schema(ctx: &EvalContext<'_>, validator: &dyn SchemaValidator) -> Result<Evaluation, PredicateError> {
    let validate = |image: Option<&AttributeTree>| -> Result<Option<Value>, PredicateError> {
        match image {
            Some(tree) => Ok(Some(validator.validate(tree)?)),
            None => Ok(None),
        }
    };
    match ctx.target {
        ValidationTarget::NewImage => Ok(match validate(ctx.new_image)? {
            Some(parsed) => Evaluation {
                matched: true,
                parsed_new: Some(parsed),
                parsed_old: None,
            },
            None => Evaluation::unmatched(),
        }),
        ValidationTarget::OldImage => Ok(match validate(ctx.old_image)? {
            Some(parsed) => Evaluation {
                matched: true,
                parsed_new: None,
                parsed_old: Some(parsed),
            },
            None => Evaluation::unmatched(),
        }),
        ValidationTarget::Both => {
            // Both images must individually validate; a schema error on either side means this
            // predicate simply doesn't match (propagated as an error so the caller can tell
            // "rejected by schema" apart from "no image present").
            let new_parsed = match ctx.new_image {
                Some(tree) => validator.validate(tree)?,
                None => return Ok(Evaluation::unmatched()),
            };
            let old_parsed = match ctx.old_image {
                Some(tree) => validator.validate(tree)?,
                None => return Ok(Evaluation::unmatched()),
            };
            Ok(Evaluation {
                matched: true,
                parsed_new: Some(new_parsed),
                parsed_old: Some(old_parsed),
            })
        }
    }
}

/// Diff-based predicates always read the record-wide diff, never the resolved image(s) — a
/// `changed_attribute` predicate fires on MODIFY regardless of whether the handler's
/// `validationTarget` is new, old, or both.
fn eval_diff_tag(ctx: &EvalContext<'_>, path: &Path, tag: DiffTag) -> Evaluation {
    if ctx.diff.matches(path, tag) {
        Evaluation::matched_plain()
    } else {
        Evaluation::unmatched()
    }
}
