use colored::Colorize;
use fruitkit::{ExecuteSummary, Step, StepKind};

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Whether stdout is an interactive terminal
pub fn is_tty() -> bool {
    console::Term::stdout().is_term()
}

// ============================================================================
// Plan Output
// ============================================================================

/// One plan line, e.g. `⬆ deploy greeting`
///
/// Emoji are only used on a terminal.
pub fn step_line(step: &Step, emoji: bool) -> String {
    let (icon, verb) = match step.kind() {
        StepKind::Deploy => ("⬆", "deploy".green()),
        StepKind::Undeploy => ("💣", "undeploy".red()),
    };
    if emoji {
        format!("{} {verb} {}", icon.dimmed(), step.name())
    } else {
        format!("{verb} {}", step.name())
    }
}

/// Print every step of a plan, or a note that there is nothing to do
pub fn print_plan(steps: &[Step]) {
    if steps.is_empty() {
        success("Nothing to do, live state matches the manifest");
        return;
    }

    let emoji = is_tty();
    for step in steps {
        println!("{}", step_line(step, emoji));
    }
    println!();
    dim(&plan_counts(steps));
}

fn plan_counts(steps: &[Step]) -> String {
    let deploys = steps.iter().filter(|s| s.is_deploy()).count();
    let undeploys = steps.len() - deploys;
    format!("{deploys} to deploy, {undeploys} to undeploy")
}

/// Print final summary
pub fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.skipped > 0 && summary.total_changes() == 0 {
        println!("  {} Nothing was changed", "⚠".yellow().bold());
    } else {
        println!("  {} Reconciled successfully!", "✓".green().bold());
    }

    if summary.deployed > 0 {
        println!("    • {} resources deployed", summary.deployed);
    }
    if summary.undeployed > 0 {
        println!("    • {} resources undeployed", summary.undeployed);
    }
    if summary.skipped > 0 {
        println!("    • {} steps skipped", summary.skipped);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use fruitkit::{LiveResources, Outputs, Resource, ResourceClass, props};

    fn resource(name: &str) -> Resource {
        ResourceClass::builder("note")
            .required_props(["text"])
            .deploy(|_| async { Ok(Outputs::new()) })
            .fetch_currently_deployed(|| async { Ok(LiveResources::new()) })
            .build()
            .unwrap()
            .instantiate(name, props([("text", "x")]))
            .unwrap()
    }

    #[test]
    fn test_step_line() {
        colored::control::set_override(false);
        let deploy = Step::deploy(resource("greeting"));
        let undeploy = Step::undeploy(resource("stale"));

        assert_eq!(step_line(&deploy, true), "⬆ deploy greeting");
        assert_eq!(step_line(&undeploy, true), "💣 undeploy stale");
        assert_eq!(step_line(&deploy, false), "deploy greeting");
        assert_eq!(step_line(&undeploy, false), "undeploy stale");

        colored::control::set_override(true);
        let colored_line = step_line(&deploy, true);
        assert!(colored_line.starts_with(&"⬆".dimmed().to_string()));
        assert!(colored_line.contains(&"deploy".green().to_string()));
        colored::control::unset_override();
    }

    #[test]
    fn test_plan_counts() {
        let steps = vec![
            Step::undeploy(resource("a")),
            Step::deploy(resource("a")),
            Step::deploy(resource("b")),
        ];
        assert_eq!(plan_counts(&steps), "2 to deploy, 1 to undeploy");
    }
}
