//! Line-level progression of code across tutorial steps.
//!
//! Each step is supposed to extend the previous step's code. This module
//! measures how far a script actually follows that: which lines a step adds
//! (so a rendered card can emphasize them) and how many it drops. None of it
//! is enforced; a script that breaks the pattern is still a valid script.

use std::collections::HashMap;

use serde::Serialize;

use crate::model::TutorialScript;

/// What one step changed relative to the step before it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepDelta {
    /// Index into `TutorialScript::steps`.
    pub step: usize,
    /// 1-based line numbers in this step's code that were not in the previous step.
    pub added_lines: Vec<usize>,
    /// Number of previous lines missing from this step.
    pub removed_lines: usize,
}

impl StepDelta {
    pub fn is_cumulative(&self) -> bool {
        self.removed_lines == 0
    }
}

/// A run of equal lines: `before[old..old + len] == after[new..new + len]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Run {
    old: usize,
    new: usize,
    len: usize,
}

/// Longest-common-run matcher over two line sequences.
struct LineMatcher<'a> {
    before: Vec<&'a str>,
    after: Vec<&'a str>,
    after_index: HashMap<&'a str, Vec<usize>>,
}

impl<'a> LineMatcher<'a> {
    fn new(before: &'a str, after: &'a str) -> Self {
        let before: Vec<&str> = code_lines(before);
        let after: Vec<&str> = code_lines(after);
        let mut after_index: HashMap<&str, Vec<usize>> = HashMap::new();
        for (j, line) in after.iter().enumerate() {
            after_index.entry(*line).or_default().push(j);
        }
        Self {
            before,
            after,
            after_index,
        }
    }

    /// Longest run of equal lines inside `before[old_lo..old_hi]` x `after[new_lo..new_hi]`.
    fn longest_run(&self, old_lo: usize, old_hi: usize, new_lo: usize, new_hi: usize) -> Run {
        let mut best = Run {
            old: old_lo,
            new: new_lo,
            len: 0,
        };
        // length of the run ending at after[j], for the previous `before` line
        let mut run_ending: HashMap<usize, usize> = HashMap::new();

        for i in old_lo..old_hi {
            let mut next: HashMap<usize, usize> = HashMap::new();
            let positions = self.after_index.get(self.before[i]).map(Vec::as_slice).unwrap_or(&[]);
            for &j in positions.iter().filter(|&&j| j >= new_lo && j < new_hi) {
                let len = j
                    .checked_sub(1)
                    .and_then(|prev| run_ending.get(&prev))
                    .copied()
                    .unwrap_or(0)
                    + 1;
                next.insert(j, len);
                if len > best.len {
                    best = Run {
                        old: i + 1 - len,
                        new: j + 1 - len,
                        len,
                    };
                }
            }
            run_ending = next;
        }
        best
    }

    /// All matched runs, ordered by position.
    fn runs(&self) -> Vec<Run> {
        let mut pending = vec![(0, self.before.len(), 0, self.after.len())];
        let mut runs = Vec::new();

        while let Some((old_lo, old_hi, new_lo, new_hi)) = pending.pop() {
            let run = self.longest_run(old_lo, old_hi, new_lo, new_hi);
            if run.len == 0 {
                continue;
            }
            runs.push(run);
            if old_lo < run.old && new_lo < run.new {
                pending.push((old_lo, run.old, new_lo, run.new));
            }
            if run.old + run.len < old_hi && run.new + run.len < new_hi {
                pending.push((run.old + run.len, old_hi, run.new + run.len, new_hi));
            }
        }

        runs.sort_by_key(|r| (r.old, r.new));
        runs
    }
}

/// Lines of a code field, ignoring trailing whitespace and trailing blank lines.
fn code_lines(code: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = code.lines().map(str::trim_end).collect();
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

/// Compare two code fields line by line.
///
/// Returns the 1-based numbers of lines in `after` that are new, and the
/// number of lines of `before` that no longer appear.
pub fn line_delta(before: &str, after: &str) -> (Vec<usize>, usize) {
    let matcher = LineMatcher::new(before, after);
    let runs = matcher.runs();

    let mut kept = vec![false; matcher.after.len()];
    let mut matched_before = 0;
    for run in &runs {
        matched_before += run.len;
        for flag in &mut kept[run.new..run.new + run.len] {
            *flag = true;
        }
    }

    let added = kept
        .iter()
        .enumerate()
        .filter_map(|(j, &k)| (!k).then_some(j + 1))
        .collect();
    (added, matcher.before.len() - matched_before)
}

/// Delta of every step against its predecessor; the first step is compared
/// against empty code.
pub fn step_deltas(script: &TutorialScript) -> Vec<StepDelta> {
    let mut previous = "";
    script
        .steps
        .iter()
        .enumerate()
        .map(|(step, s)| {
            let (added_lines, removed_lines) = line_delta(previous, &s.code_so_far);
            previous = &s.code_so_far;
            StepDelta {
                step,
                added_lines,
                removed_lines,
            }
        })
        .collect()
}

/// Indices of steps that drop code shown by the step before them.
pub fn cumulative_violations(script: &TutorialScript) -> Vec<usize> {
    step_deltas(script)
        .into_iter()
        .filter(|d| !d.is_cumulative())
        .map(|d| d.step)
        .collect()
}

/// Whether `full_source` matches the last step's code, ignoring trailing whitespace.
pub fn full_source_matches(script: &TutorialScript) -> bool {
    let last = script.steps.last().map_or("", |s| s.code_so_far.as_str());
    code_lines(last) == code_lines(&script.full_source)
}
