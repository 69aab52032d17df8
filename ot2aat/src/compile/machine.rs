//! Building a state machine that recognizes a set of glyph patterns.
//!
//! Each pattern is a sequence of sets of match classes. A state is the set
//! of partial matches that are still alive after the glyphs read so far;
//! we only create the states that some input can actually reach.
//!
//! AAT has a single mark register, so at most one live partial match may
//! own the marked glyph at a time.

use std::collections::{BTreeSet, HashMap, VecDeque};

/// A sequence of match-class sets to recognize.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Pattern {
    pub(crate) elements: Vec<BTreeSet<usize>>,
    /// The position whose glyph must be remembered in the mark register.
    ///
    /// `None` means the action applies to the glyph that completes the match.
    pub(crate) mark_at: Option<usize>,
}

/// Which actions a machine performs; this decides how marks interact with
/// matches completing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Flavor {
    /// Substitutions: the marked glyph may be replaced and a new glyph
    /// marked in the same step.
    Contextual,
    /// Rearrangement: a completing match uses both the first and last mark,
    /// so nothing else may be marked in that step.
    Rearrangement,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct Item {
    pattern: usize,
    matched: usize,
    holds_mark: bool,
}

/// What happens when a state reads one match class.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Step {
    pub(crate) next: usize,
    /// Mark the current glyph.
    pub(crate) mark: bool,
    /// Patterns matched by this glyph, ascending.
    pub(crate) completed: Vec<usize>,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Automaton {
    /// `steps[state][class]`; state 0 is the start state.
    pub(crate) steps: Vec<Vec<Step>>,
}

/// Returned when the machine would need more than the allowed states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct TooManyStates(pub(crate) usize);

impl Automaton {
    pub(crate) fn n_states(&self) -> usize {
        self.steps.len()
    }
}

impl Pattern {
    fn len(&self) -> usize {
        self.elements.len()
    }

    /// `true` if the match uses the mark register.
    pub(crate) fn uses_mark(&self) -> bool {
        self.mark_at.is_some()
    }
}

/// Build the machine recognizing `patterns` over `n_classes` match classes.
pub(crate) fn build(
    patterns: &[Pattern],
    n_classes: usize,
    flavor: Flavor,
    max_states: usize,
) -> Result<Automaton, TooManyStates> {
    let mut states: Vec<BTreeSet<Item>> = vec![BTreeSet::new()];
    let mut ids: HashMap<BTreeSet<Item>, usize> = HashMap::from([(BTreeSet::new(), 0)]);
    let mut queue = VecDeque::from([0]);
    let mut steps = vec![Vec::new()];

    while let Some(state) = queue.pop_front() {
        let mut row = Vec::with_capacity(n_classes);
        for class in 0..n_classes {
            let (items, mut step) = advance(patterns, &states[state], class, flavor);
            step.next = match ids.get(&items) {
                Some(id) => *id,
                None => {
                    if states.len() >= max_states {
                        return Err(TooManyStates(max_states));
                    }
                    let id = states.len();
                    ids.insert(items.clone(), id);
                    states.push(items);
                    steps.push(Vec::new());
                    queue.push_back(id);
                    id
                }
            };
            row.push(step);
        }
        steps[state] = row;
    }
    Ok(Automaton { steps })
}

/// Read one class in a state; returns the surviving items and the step.
fn advance(
    patterns: &[Pattern],
    state: &BTreeSet<Item>,
    class: usize,
    flavor: Flavor,
) -> (BTreeSet<Item>, Step) {
    let continuing = state.iter().copied();
    let starting = (0..patterns.len()).map(|pattern| Item {
        pattern,
        matched: 0,
        holds_mark: false,
    });
    let mut live = Vec::new();
    let mut completed = BTreeSet::new();
    for item in continuing.chain(starting) {
        let pattern = &patterns[item.pattern];
        if !pattern.elements[item.matched].contains(&class) {
            continue;
        }
        let item = Item {
            matched: item.matched + 1,
            ..item
        };
        if item.matched == pattern.len() {
            completed.insert(item.pattern);
        } else {
            live.push(item);
        }
    }

    let fired_mark = completed.iter().any(|p| patterns[*p].uses_mark());
    let fired_current = completed.iter().any(|p| !patterns[*p].uses_mark());
    if fired_mark {
        // the marked glyph has been acted on
        live.retain(|item| !item.holds_mark);
    }

    let wants_mark = |item: &Item| patterns[item.pattern].mark_at == Some(item.matched - 1);
    let mut mark = false;
    if live.iter().any(wants_mark) {
        let register_free = !live.iter().any(|item| item.holds_mark);
        let allowed = register_free
            && !fired_current
            && !(flavor == Flavor::Rearrangement && fired_mark);
        if allowed {
            mark = true;
            for item in live.iter_mut().filter(|item| wants_mark(item)) {
                item.holds_mark = true;
            }
        } else {
            live.retain(|item| !wants_mark(item));
        }
    }

    let step = Step {
        next: 0,
        mark,
        completed: completed.into_iter().collect(),
    };
    (live.into_iter().collect(), step)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(elements: &[&[usize]], mark_at: Option<usize>) -> Pattern {
        Pattern {
            elements: elements
                .iter()
                .map(|set| set.iter().copied().collect())
                .collect(),
            mark_at,
        }
    }

    /// Run the machine over a class sequence, returning the completions
    /// seen at each position.
    fn run(machine: &Automaton, input: &[usize]) -> Vec<Vec<usize>> {
        let mut state = 0;
        input
            .iter()
            .map(|class| {
                let step = &machine.steps[state][*class];
                state = step.next;
                step.completed.clone()
            })
            .collect()
    }

    #[test]
    fn single_predecessor() {
        // after 0: 1
        let machine = build(&[pattern(&[&[0], &[1]], None)], 3, Flavor::Contextual, 100).unwrap();
        assert_eq!(machine.n_states(), 2);
        assert_eq!(run(&machine, &[1, 0, 1, 1]), [vec![], vec![], vec![0], vec![]]);
        // any other class resets
        assert_eq!(run(&machine, &[0, 2, 1]), [vec![], vec![], vec![]]);
        // a repeated predecessor stays in the same state
        assert_eq!(machine.steps[1][0].next, 1);
    }

    #[test]
    fn dual_role_class_keeps_both_readings() {
        // after 0: 1, and after 1: 2; class 1 is context and target
        let patterns = [
            pattern(&[&[0], &[1]], None),
            pattern(&[&[1], &[2]], None),
        ];
        let machine = build(&patterns, 3, Flavor::Contextual, 100).unwrap();
        assert_eq!(run(&machine, &[0, 1, 2]), [vec![], vec![0], vec![1]]);
    }

    #[test]
    fn marks_lookahead_target() {
        // before 1: 0 (mark the 0, act when the 1 arrives)
        let machine = build(&[pattern(&[&[0], &[1]], Some(0))], 2, Flavor::Contextual, 100).unwrap();
        let first = &machine.steps[0][0];
        assert!(first.mark);
        let second = &machine.steps[first.next][1];
        assert_eq!(second.completed, vec![0]);
        assert!(!second.mark);
        // reading another 0 moves the mark forward
        assert!(machine.steps[first.next][0].mark);
    }

    #[test]
    fn one_mark_register() {
        // between 0 and 2: 1, and before 2 2: 1 (both want to mark the 1)
        // after a 0, the 1 is marked by the first pattern; the second
        // pattern's start on that same 1 shares the mark
        let patterns = [
            pattern(&[&[0], &[1], &[2]], Some(1)),
            pattern(&[&[1], &[2], &[2]], Some(0)),
        ];
        let machine = build(&patterns, 3, Flavor::Contextual, 100).unwrap();
        let mut state = 0;
        let mut marks = Vec::new();
        for class in [0, 1, 2] {
            let step = &machine.steps[state][class];
            marks.push(step.mark);
            state = step.next;
        }
        assert_eq!(marks, [false, true, false]);
    }

    #[test]
    fn completion_clears_mark_holders() {
        // before 1: 0 and before 1 1: 0
        let patterns = [
            pattern(&[&[0], &[1]], Some(0)),
            pattern(&[&[0], &[1], &[1]], Some(0)),
        ];
        let machine = build(&patterns, 2, Flavor::Contextual, 100).unwrap();
        // the first pattern fires on the first 1 and the second one is
        // dropped, because its marked glyph was already replaced
        assert_eq!(run(&machine, &[0, 1, 1]), [vec![], vec![0], vec![]]);
    }

    #[test]
    fn rearrangement_never_marks_on_completion() {
        // 0 1 and 1 0 both reorder
        let patterns = [
            pattern(&[&[0], &[1]], Some(0)),
            pattern(&[&[1], &[0]], Some(0)),
        ];
        let machine = build(&patterns, 2, Flavor::Rearrangement, 100).unwrap();
        let first = &machine.steps[0][0];
        let second = &machine.steps[first.next][1];
        assert_eq!(second.completed, vec![0]);
        assert!(!second.mark);
        assert_eq!(second.next, 0);
    }

    #[test]
    fn state_limit() {
        let patterns = (0..4)
            .map(|i| pattern(&[&[i], &[i], &[i]], None))
            .collect::<Vec<_>>();
        assert_eq!(
            build(&patterns, 4, Flavor::Contextual, 3).unwrap_err(),
            TooManyStates(3)
        );
        assert!(build(&patterns, 4, Flavor::Contextual, 100).is_ok());
    }
}
