// ABOUTME: Presentation and selection of plans before anything is locked.
// ABOUTME: The console presenter prompts on a reader/writer pair so it can be tested.

use std::io::{self, BufRead, Write};

use crate::model::ReleaseKind;
use crate::types::EnvironmentName;

use super::plan::ReleasePlan;

/// What the user is being asked to approve.
#[derive(Debug, Clone, Copy)]
pub struct SelectionContext<'a> {
    pub kind: ReleaseKind,
    pub from: Option<&'a EnvironmentName>,
    pub to: &'a EnvironmentName,
}

impl SelectionContext<'_> {
    fn target(&self) -> String {
        match self.from {
            Some(from) => format!("from `{}` to `{}`", from, self.to),
            None => format!("to `{}`", self.to),
        }
    }
}

/// Shows plans and returns the subset to execute, in the original order.
pub trait PlanPresenter {
    fn select(
        &mut self,
        plans: Vec<ReleasePlan>,
        context: &SelectionContext<'_>,
    ) -> io::Result<Vec<ReleasePlan>>;
}

/// Selects every plan without prompting (`--yes`).
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoApprove;

impl PlanPresenter for AutoApprove {
    fn select(
        &mut self,
        plans: Vec<ReleasePlan>,
        _context: &SelectionContext<'_>,
    ) -> io::Result<Vec<ReleasePlan>> {
        Ok(plans)
    }
}

/// Prints each plan and asks for confirmation.
///
/// A single plan gets a yes/no question; several plans get a numbered list
/// answered with `all`, comma-separated numbers, or nothing.
pub struct ConsolePresenter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> ConsolePresenter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, prompt: &str) -> io::Result<String> {
        write!(self.output, "{prompt} ")?;
        self.output.flush()?;
        let mut line = String::new();
        self.input.read_line(&mut line)?;
        Ok(line.trim().to_string())
    }
}

impl<R: BufRead, W: Write> PlanPresenter for ConsolePresenter<R, W> {
    fn select(
        &mut self,
        plans: Vec<ReleasePlan>,
        context: &SelectionContext<'_>,
    ) -> io::Result<Vec<ReleasePlan>> {
        match plans.len() {
            0 => Ok(plans),
            1 => {
                writeln!(self.output, "{}", plans[0].describe())?;
                let answer = self.ask(&format!(
                    "{} {} {}? [y/N]",
                    capitalize(context.kind.verb()),
                    plans[0].service_ref(),
                    context.target()
                ))?;
                if matches!(answer.to_lowercase().as_str(), "y" | "yes") {
                    Ok(plans)
                } else {
                    Ok(Vec::new())
                }
            }
            count => {
                for (index, plan) in plans.iter().enumerate() {
                    writeln!(self.output, "[{}] {}", index + 1, plan.describe())?;
                }
                let prompt = format!(
                    "Select services to {} {} (all, 1-{} comma-separated, or empty for none):",
                    context.kind.verb(),
                    context.target(),
                    count
                );
                loop {
                    let answer = self.ask(&prompt)?;
                    match parse_selection(&answer, count) {
                        Some(chosen) => {
                            return Ok(plans
                                .into_iter()
                                .enumerate()
                                .filter(|(i, _)| chosen.contains(i))
                                .map(|(_, plan)| plan)
                                .collect());
                        }
                        None => writeln!(self.output, "Invalid selection: {answer}")?,
                    }
                }
            }
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Zero-based indices chosen by `answer`, or `None` if it does not parse.
fn parse_selection(answer: &str, count: usize) -> Option<Vec<usize>> {
    let answer = answer.trim();
    if answer.is_empty() {
        return Some(Vec::new());
    }
    if answer.eq_ignore_ascii_case("all") {
        return Some((0..count).collect());
    }
    let mut chosen = Vec::new();
    for part in answer.split(',') {
        let n: usize = part.trim().parse().ok()?;
        if n == 0 || n > count {
            return None;
        }
        if !chosen.contains(&(n - 1)) {
            chosen.push(n - 1);
        }
    }
    chosen.sort_unstable();
    Some(chosen)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_accepts_all_numbers_and_empty() {
        assert_eq!(parse_selection("all", 3), Some(vec![0, 1, 2]));
        assert_eq!(parse_selection("3, 1", 3), Some(vec![0, 2]));
        assert_eq!(parse_selection("2,2", 3), Some(vec![1]));
        assert_eq!(parse_selection("", 3), Some(vec![]));
    }

    #[test]
    fn selection_rejects_out_of_range_and_garbage() {
        assert_eq!(parse_selection("0", 3), None);
        assert_eq!(parse_selection("4", 3), None);
        assert_eq!(parse_selection("api", 3), None);
    }

    #[test]
    fn capitalizes_verb() {
        assert_eq!(capitalize("deploy"), "Deploy");
    }
}
