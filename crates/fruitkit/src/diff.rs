//! Diff computation between live and declared resources
//!
//! Keys are compared property by property over the declared class's
//! `required_props`. A key whose properties are all equal is unchanged and
//! its declared resource adopts the live post-deploy values, so references
//! to it can be resolved and compared by value. Comparison repeats until no
//! more keys can be decided; references that still cannot be resolved make
//! their key changed.

use crate::error::Result;
use crate::planner;
use crate::resource::Resource;
use crate::types::Step;
use crate::value::PropValue;
use indexmap::IndexMap;
use serde_json::Value;

/// Outcome of comparing one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Unchanged,
    Changed,
    /// Depends on a reference whose target is not deployed yet
    Pending,
}

/// Compute the ordered steps turning `before` (live) into `after` (declared)
pub fn steps(
    before: &IndexMap<String, Resource>,
    after: &IndexMap<String, Resource>,
) -> Result<Vec<Step>> {
    let keys: Vec<&String> = before
        .keys()
        .chain(after.keys().filter(|key| !before.contains_key(*key)))
        .collect();

    let mut verdicts: IndexMap<&String, Verdict> =
        keys.iter().map(|key| (*key, Verdict::Pending)).collect();

    loop {
        let mut progressed = false;
        for key in &keys {
            if verdicts[*key] != Verdict::Pending {
                continue;
            }
            let verdict = compare_entries(before.get(*key), after.get(*key));
            if verdict == Verdict::Pending {
                continue;
            }
            if verdict == Verdict::Unchanged
                && let (Some(live), Some(declared)) = (before.get(*key), after.get(*key))
            {
                declared.adopt(live);
            }
            verdicts.insert(*key, verdict);
            progressed = true;
        }
        if !progressed {
            break;
        }
    }

    let mut flat = Vec::new();
    for key in keys {
        match verdicts[key] {
            Verdict::Unchanged => continue,
            Verdict::Pending => log::debug!("\"{key}\" references an undeployed resource"),
            Verdict::Changed => {}
        }
        if let Some(live) = before.get(key) {
            flat.push(Step::undeploy(live.clone()));
        }
        if let Some(declared) = after.get(key) {
            flat.push(Step::deploy(declared.clone()));
        }
    }

    log::debug!("Diff of {} keys produced {} steps", verdicts.len(), flat.len());
    planner::sort(flat)
}

/// Compare the two sides of one key
pub fn compare_entries(live: Option<&Resource>, declared: Option<&Resource>) -> Verdict {
    let (Some(live), Some(declared)) = (live, declared) else {
        return Verdict::Changed;
    };
    if live.class().kind() != declared.class().kind() {
        return Verdict::Changed;
    }

    let class = declared.class();
    let mut verdict = Verdict::Unchanged;
    for prop in class.required_props() {
        let Some(old) = comparable(live.prop(prop)) else {
            return Verdict::Changed;
        };
        let new = match comparable(declared.prop(prop)) {
            Some(new) => new,
            None if is_unresolved_reference(declared.prop(prop).as_ref()) => {
                verdict = Verdict::Pending;
                continue;
            }
            None => return Verdict::Changed,
        };

        let equal = match class.comparator(prop) {
            Some(comparator) => comparator(&old, &new),
            None => old == new,
        };
        if !equal {
            return Verdict::Changed;
        }
    }

    // A live resource that never reported its post-deploy values cannot
    // stand in for the declared one
    if verdict == Verdict::Unchanged && !live.is_deployed() {
        return Verdict::Changed;
    }
    verdict
}

/// Plain value a property compares as, if it has one yet
fn comparable(value: Option<PropValue>) -> Option<Value> {
    match value? {
        PropValue::Literal(value) => Some(value),
        PropValue::Artifact(artifact) => artifact.compiled().map(|c| Value::String(c.to_string())),
        PropValue::Reference(reference) => reference.resolve().ok(),
    }
}

fn is_unresolved_reference(value: Option<&PropValue>) -> bool {
    value
        .and_then(PropValue::as_reference)
        .is_some_and(|reference| !reference.target().is_deployed())
}
