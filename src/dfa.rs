//! Deterministic finite automata built from a lenient line-oriented text
//! format.
//!
//! Each non-blank line of the description is tried against the following
//! forms, first match wins:
//!
//! ```text
//! ->S1            start state, the arrow is optional and the first one wins
//! 0: S1 -> S2     colon form   LABEL: SOURCE -> TARGET
//! S1 0-> S2       infix form   SOURCE LABEL -> TARGET
//! +S1 S2 S3       plus form    S1 --0--> S2, S1 --1--> S3
//! ```
//!
//! A `*` anywhere in a state name marks the state accepting, a name of `.`
//! repeats the last source state and the label `*` matches any symbol that
//! has no transition of its own. Lines matching none of the forms are
//! ignored.

use std::{collections::HashMap, fmt::Display, sync::LazyLock};

use regex::Regex;

static START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(->|-|>)?\s*([^ >:+-]+)$").expect("start pattern is valid")
});
static COLON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^ >:+-]+): *([^ >:+-]+) *-?>? *([^ >:+-]+) *$")
        .expect("colon pattern is valid")
});
static INFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^ >:+-]+) +([^ >:+-]+) *(->|-|>| ) *([^ >:+-]+) *$")
        .expect("infix pattern is valid")
});
static PLUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+ *([^ ]+) +([^ ]+) +([^ ]+) *$").expect("plus pattern is valid")
});

/// Name used when `.` is written before any source state was seen.
const UNKNOWN_STATE: &str = "???";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Label {
    Symbol(String),
    /// Matches any symbol without a transition of its own.
    Wildcard,
    /// Bookkeeping entry recording the initial state, never matched.
    Start,
}

impl Label {
    fn parse(label: &str) -> Self {
        if label == "*" {
            Label::Wildcard
        } else {
            Label::Symbol(label.to_string())
        }
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Label::Symbol(symbol) => write!(f, "{symbol}"),
            Label::Wildcard => write!(f, "*"),
            Label::Start => write!(f, "->"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub label: Label,
    /// `None` only for the [`Label::Start`] entry.
    pub from: Option<String>,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    name: String,
    transitions: HashMap<Label, Transition>,
    accepting: bool,
    conflict: bool,
}

impl State {
    fn new(name: &str) -> Self {
        State {
            name: name.to_string(),
            transitions: HashMap::new(),
            accepting: false,
            conflict: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting
    }

    /// Set when two transitions were given for the same label.
    pub fn has_conflict(&self) -> bool {
        self.conflict
    }

    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.values()
    }

    pub fn transition(&self, label: &Label) -> Option<&Transition> {
        self.transitions.get(label)
    }

    fn step(&self, symbol: char) -> Option<&Transition> {
        self.transitions
            .get(&Label::Symbol(symbol.to_string()))
            .or_else(|| self.transitions.get(&Label::Wildcard))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Automaton {
    states: HashMap<String, State>,
    transitions: Vec<Transition>,
    initial: Option<String>,
}

impl Automaton {
    /// Builds an automaton from its text form. Never fails: lines that match
    /// no form are skipped.
    pub fn build(text: &str) -> Self {
        let mut builder = Builder::default();
        for line in text.lines() {
            builder.line(line.trim());
        }
        builder.finish()
    }

    pub fn initial(&self) -> Option<&State> {
        self.initial.as_deref().and_then(|name| self.states.get(name))
    }

    pub fn state(&self, name: &str) -> Option<&State> {
        self.states.get(name)
    }

    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.states.values()
    }

    /// Every transition in the order it was defined, including the start entry
    /// and the synthesized wildcard loops.
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn accepts(&self, input: &str) -> bool {
        let Some(mut active) = self.initial() else {
            return false;
        };
        for symbol in input.chars() {
            let Some(transition) = active.step(symbol) else {
                return false;
            };
            let Some(next) = self.states.get(&transition.to) else {
                return false;
            };
            active = next;
        }
        active.accepting
    }
}

impl Display for Automaton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(initial) = &self.initial {
            writeln!(f, "-> {initial}")?;
        }
        let mut names: Vec<_> = self.states.keys().collect();
        names.sort();
        for name in names {
            let state = &self.states[name];
            write!(f, "{name}")?;
            if state.accepting {
                write!(f, " (accept)")?;
            }
            if state.conflict {
                write!(f, " (conflict)")?;
            }
            writeln!(f)?;
            let mut arcs: Vec<_> = state.transitions.values().collect();
            arcs.sort_by_key(|arc| arc.label.to_string());
            for arc in arcs {
                writeln!(f, "  {} -> {}", arc.label, arc.to)?;
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct Builder {
    dfa: Automaton,
    first_found: Option<String>,
    last_used: Option<String>,
}

impl Builder {
    fn line(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }

        if let Some(caps) = START.captures(line) {
            let name = self.source(&caps[2]);
            self.start(name);
            return;
        }

        if let Some(caps) = COLON.captures(line) {
            let from = self.source(&caps[2]);
            let to = self.state(&caps[3]);
            self.transition(Label::parse(&caps[1]), from, to);
            return;
        }

        if let Some(caps) = INFIX.captures(line) {
            let from = self.source(&caps[1]);
            let to = self.state(&caps[4]);
            self.transition(Label::parse(&caps[2]), from, to);
            return;
        }

        if let Some(caps) = PLUS.captures(line) {
            let from = self.source(&caps[1]);
            let zero = self.state(&caps[2]);
            let one = self.state(&caps[3]);
            self.transition(Label::parse("0"), from.clone(), zero);
            self.transition(Label::parse("1"), from, one);
            return;
        }

        log::debug!("ignoring automaton line {line:?}");
    }

    /// Like [`Builder::state`], additionally remembering the name for `.`.
    fn source(&mut self, raw: &str) -> String {
        let name = self.state(raw);
        self.last_used = Some(name.clone());
        name
    }

    fn state(&mut self, raw: &str) -> String {
        let accepting = raw.contains('*');
        let name = raw.replacen('*', "", 1);
        let name = match name.trim() {
            "." => self
                .last_used
                .clone()
                .unwrap_or_else(|| UNKNOWN_STATE.to_string()),
            name => name.to_string(),
        };

        let state = self
            .dfa
            .states
            .entry(name.clone())
            .or_insert_with(|| State::new(&name));
        if accepting {
            state.accepting = true;
        }
        if self.first_found.is_none() {
            self.first_found = Some(name.clone());
        }
        name
    }

    fn start(&mut self, name: String) {
        if self.dfa.initial.is_some() {
            log::debug!("ignoring additional start state {name:?}");
            return;
        }
        self.dfa.transitions.push(Transition {
            label: Label::Start,
            from: None,
            to: name.clone(),
        });
        self.dfa.initial = Some(name);
    }

    fn transition(&mut self, label: Label, from: String, to: String) {
        let transition = Transition {
            label: label.clone(),
            from: Some(from.clone()),
            to,
        };
        self.dfa.transitions.push(transition.clone());
        let Some(state) = self.dfa.states.get_mut(&from) else {
            return;
        };
        if state.transitions.insert(label, transition).is_some() {
            log::debug!("state {from:?} has conflicting transitions");
            state.conflict = true;
        }
    }

    fn finish(mut self) -> Automaton {
        if self.dfa.initial.is_none() {
            if let Some(first) = self.first_found.take() {
                log::debug!("no start state given, using {first:?}");
                self.start(first);
            }
        }

        let mut lonely: Vec<_> = self
            .dfa
            .states
            .values()
            .filter(|state| {
                state.transitions.len() == 1 && !state.transitions.contains_key(&Label::Wildcard)
            })
            .map(|state| state.name.clone())
            .collect();
        lonely.sort();
        for name in lonely {
            log::debug!("adding wildcard self-loop to {name:?}");
            self.transition(Label::Wildcard, name.clone(), name);
        }

        self.dfa
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn colon_form_with_explicit_start() {
        init_logger();
        let dfa = Automaton::build("->S1\n0: S1 -> S2\n1: S2 -> S1\n*S1");
        assert_eq!(dfa.initial().map(State::name), Some("S1"));
        assert!(dfa.state("S1").unwrap().is_accepting());
        assert!(!dfa.state("S2").unwrap().is_accepting());
        assert!(dfa.accepts("01"));
        assert!(!dfa.accepts("0"));
        assert!(dfa.accepts(""));
    }

    #[test]
    fn first_mentioned_state_is_initial_by_default() {
        init_logger();
        let dfa = Automaton::build("a: B -> C*\nb: C -> B");
        assert_eq!(dfa.initial().map(State::name), Some("B"));
        assert!(dfa.accepts("a"));
        assert!(!dfa.accepts("ab"));
        assert_eq!(
            dfa.transitions()[2],
            Transition {
                label: Label::Start,
                from: None,
                to: "B".to_string(),
            }
        );
    }

    #[test]
    fn first_start_marker_wins() {
        init_logger();
        let dfa = Automaton::build("->A\n->B\nx: A -> B*\nx: B -> A");
        assert_eq!(dfa.initial().map(State::name), Some("A"));
        let starts = dfa
            .transitions()
            .iter()
            .filter(|arc| arc.label == Label::Start)
            .count();
        assert_eq!(starts, 1);
    }

    #[test]
    fn bare_name_is_a_start_marker() {
        init_logger();
        let dfa = Automaton::build("0: A -> B\n1: B -> A\nB*");
        assert_eq!(dfa.initial().map(State::name), Some("B"));
        assert!(dfa.state("B").unwrap().is_accepting());
        assert!(dfa.accepts(""));
        assert!(dfa.accepts("10"));
        assert!(!dfa.accepts("1"));
    }

    #[test]
    fn bare_start_marker_before_arrow_wins() {
        init_logger();
        let dfa = Automaton::build("B\n->A\n0: A -> B*");
        assert_eq!(dfa.initial().map(State::name), Some("B"));
        assert!(dfa.accepts(""));
    }

    #[test]
    fn dot_repeats_last_source() {
        init_logger();
        let dfa = Automaton::build("0: A -> B*\n1: . -> A");
        let a = dfa.state("A").unwrap();
        assert_eq!(a.transitions().count(), 2);
        assert!(dfa.state(".").is_none());
        assert!(dfa.accepts("0"));
        assert!(dfa.accepts("10"));
        assert!(!dfa.accepts("1"));
    }

    #[test]
    fn dot_without_previous_source_is_placeholder() {
        let dfa = Automaton::build("0: . -> A");
        assert!(dfa.state(UNKNOWN_STATE).is_some());
    }

    #[test]
    fn single_transition_gets_wildcard_loop() {
        init_logger();
        let dfa = Automaton::build("a: S -> T*");
        let s = dfa.state("S").unwrap();
        let loop_arc = s.transition(&Label::Wildcard).unwrap();
        assert_eq!(loop_arc.to, "S");
        // T has no transitions at all and gets no loop
        assert_eq!(dfa.state("T").unwrap().transitions().count(), 0);
        assert!(dfa.accepts("xxa"));
        assert!(!dfa.accepts("ax"));
    }

    #[test]
    fn explicit_wildcard_suppresses_loop() {
        let dfa = Automaton::build("*: S -> T*");
        let s = dfa.state("S").unwrap();
        assert_eq!(s.transitions().count(), 1);
        assert!(dfa.accepts("q"));
        assert!(!dfa.accepts(""));
    }

    #[test]
    fn two_transitions_get_no_loop() {
        let dfa = Automaton::build("+S S F*");
        assert_eq!(dfa.state("S").unwrap().transitions().count(), 2);
        assert!(dfa.accepts("0001"));
        assert!(!dfa.accepts("2"));
    }

    #[test]
    fn duplicate_label_flags_conflict_and_last_wins() {
        init_logger();
        let dfa = Automaton::build("0: A -> B\n0: A -> C*\n1: A -> A");
        let a = dfa.state("A").unwrap();
        assert!(a.has_conflict());
        assert_eq!(a.transition(&Label::parse("0")).unwrap().to, "C");
        assert!(dfa.accepts("0"));
    }

    #[test]
    fn unparsable_lines_are_ignored() {
        init_logger();
        let dfa = Automaton::build("this is a comment line\n\n0: A -> B*\n1: B -> A");
        assert_eq!(dfa.initial().map(State::name), Some("A"));
        assert!(dfa.accepts("0"));
    }

    #[test]
    fn empty_description_rejects_everything() {
        let dfa = Automaton::build("");
        assert!(dfa.initial().is_none());
        assert!(!dfa.accepts(""));
        assert!(!dfa.accepts("0"));
    }

    #[test]
    fn listing_shows_states() {
        let dfa = Automaton::build("->S1\n0: S1 -> S2\n+S2 S1 S2*");
        let listing = dfa.to_string();
        assert!(listing.starts_with("-> S1\n"));
        assert!(listing.contains("S2 (accept)\n"));
        assert!(listing.contains("  0 -> S2\n"));
    }
}
