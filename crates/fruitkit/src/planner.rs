//! Dependency sorter - orders steps so references deploy after their targets

use crate::error::{Error, Result};
use crate::types::Step;
use std::collections::BTreeSet;

/// Order steps by post-deploy reference dependencies
///
/// Pure removals come first in their original order. Every other name
/// follows in topological order, each as its undeploy (if any) directly
/// followed by its deploy. Ties go to the name discovered first.
pub fn sort(steps: Vec<Step>) -> Result<Vec<Step>> {
    let deploys: Vec<&Step> = steps.iter().filter(|s| s.is_deploy()).collect();
    let names: Vec<&str> = deploys.iter().map(|s| s.name()).collect();

    // dependents[i] lists the deploy nodes waiting on node i
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); deploys.len()];
    let mut in_degree = vec![0usize; deploys.len()];

    for (index, step) in deploys.iter().enumerate() {
        for (prop, value) in step.config().props() {
            let Some(reference) = value.as_reference() else {
                continue;
            };
            let target = reference.target();

            let Some(provider) = steps.iter().find(|s| s.config().ptr_eq(target)) else {
                if target.is_deployed() {
                    continue;
                }
                return Err(Error::Invariant(format!(
                    "\"{}\".{prop} references \"{}\", which is neither deployed nor part of the plan",
                    step.name(),
                    target.name()
                )));
            };

            let Some(dependency) = names.iter().position(|n| *n == provider.name()) else {
                continue;
            };
            if dependency == index {
                continue;
            }
            if !dependents[dependency].contains(&index) {
                dependents[dependency].push(index);
                in_degree[index] += 1;
            }
        }
    }

    let order = topological_order(&names, &dependents, in_degree)?;

    let mut sorted = Vec::with_capacity(steps.len());
    sorted.extend(
        steps
            .iter()
            .filter(|s| s.is_undeploy() && !names.contains(&s.name()))
            .cloned(),
    );
    for index in order {
        let name = names[index];
        if let Some(undeploy) = steps.iter().find(|s| s.is_undeploy() && s.name() == name) {
            sorted.push(undeploy.clone());
        }
        sorted.push(deploys[index].clone());
    }

    log::debug!("Sorted {} steps", sorted.len());
    Ok(sorted)
}

/// Kahn's algorithm with the ready set ordered by discovery index
fn topological_order(
    names: &[&str],
    dependents: &[Vec<usize>],
    mut in_degree: Vec<usize>,
) -> Result<Vec<usize>> {
    let mut ready: BTreeSet<usize> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(index, _)| index)
        .collect();

    let mut order = Vec::with_capacity(names.len());
    while let Some(index) = ready.pop_first() {
        order.push(index);
        for &dependent in &dependents[index] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() < names.len() {
        let cyclic: Vec<&str> = (0..names.len())
            .filter(|index| !order.contains(index))
            .map(|index| names[index])
            .collect();
        return Err(Error::Invariant(format!(
            "cyclic dependency between {cyclic:?}"
        )));
    }
    Ok(order)
}
