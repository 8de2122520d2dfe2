//! Lexer rule configuration and the build pipeline tying every stage
//! together.

use std::collections::BTreeSet;

use tracing::warn;

use crate::{
    graph::{DeterminizationError, Graph, Input, StateId},
    machine::Automaton,
    pattern::{self, ParseError},
    table::{self, LexerTable},
};

/// Index of a rule within its [`Configuration`]; declaration order doubles as
/// ambiguity priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuleId(pub(crate) u32);

impl RuleId {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize { self.0 as usize }
}

/// An ordered, named `(name, pattern, token type)` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexerRule {
    pub name: String,
    pub pattern: String,
    pub token_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("duplicate rule {name:?}")]
    DuplicateRule { name: String },
    #[error("blank pattern on line {line}")]
    BlankPattern { line: usize },
    #[error("missing '=' on line {line}")]
    MissingDelimiter { line: usize },
    #[error("graph has no reachable states")]
    EmptyGraph,
    #[error("graph has no entry state")]
    NoEntryState,
    #[error("graph has {count} entry states")]
    MultipleEntryStates { count: usize },
    #[error("terminal state {state} has no rule assigned")]
    UnassignedTerminal { state: StateId },
    #[error("no rule is assigned anywhere in the graph")]
    NoRules,
    #[error("state {state} is not deterministic")]
    NotDeterministic { state: StateId },
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid pattern for rule {rule:?}")]
    Rule {
        rule: String,
        #[source]
        source: ParseError,
    },
    #[error(transparent)]
    Determinization(#[from] DeterminizationError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// An ordered set of lexer rules plus build options.
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    rules: Vec<LexerRule>,
    case_insensitive: bool,
}

impl Configuration {
    #[must_use]
    pub fn new(case_insensitive: bool) -> Self {
        Self {
            rules: Vec::new(),
            case_insensitive,
        }
    }

    /// Parses `ruleName=pattern` lines. Blank lines and lines starting with
    /// `#` are skipped; the token type defaults to the rule name.
    ///
    /// # Errors
    /// Returns [`ConfigurationError`] for a missing `=`, a blank pattern, or
    /// a duplicate rule name.
    pub fn parse_str(text: &str, case_insensitive: bool) -> Result<Self, ConfigurationError> {
        let mut config = Self::new(case_insensitive);
        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let Some(eq) = trimmed.find('=') else {
                return Err(ConfigurationError::MissingDelimiter { line });
            };
            let (name, pattern) = trimmed.split_at(eq);
            let pattern = &pattern[1..];
            if pattern.trim().is_empty() {
                return Err(ConfigurationError::BlankPattern { line });
            }

            config.add_rule(name, pattern, name)?;
        }
        Ok(config)
    }

    /// # Errors
    /// Returns [`ConfigurationError::DuplicateRule`] when `name` is already
    /// taken.
    pub fn add_rule(
        &mut self,
        name: impl Into<String>,
        pattern: impl Into<String>,
        token_type: impl Into<String>,
    ) -> Result<RuleId, ConfigurationError> {
        let name = name.into();
        if self.rules.iter().any(|r| r.name == name) {
            return Err(ConfigurationError::DuplicateRule { name });
        }

        let id = RuleId(u32::try_from(self.rules.len()).unwrap_or_else(|_| unreachable!()));
        self.rules.push(LexerRule {
            name,
            pattern: pattern.into(),
            token_type: token_type.into(),
        });
        Ok(id)
    }

    #[must_use]
    pub fn case_insensitive(&self) -> bool { self.case_insensitive }

    #[must_use]
    pub fn rules(&self) -> &[LexerRule] { &self.rules }

    #[must_use]
    pub fn rule(&self, id: RuleId) -> &LexerRule { &self.rules[id.index()] }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&LexerRule> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// Ambiguity policy: the earliest-declared candidate wins; every
    /// ambiguity is logged with all candidate rule names.
    ///
    /// # Panics
    /// Panics when `candidates` is empty.
    #[must_use]
    pub fn resolve_ambiguity(&self, candidates: &BTreeSet<RuleId>) -> RuleId {
        let winner = *candidates
            .first()
            .unwrap_or_else(|| unreachable!("empty candidate set"));
        if candidates.len() > 1 {
            let names: Vec<&str> = candidates
                .iter()
                .map(|&c| self.rule(c).name.as_str())
                .collect();
            warn!(
                candidates = ?names,
                winner = %self.rule(winner).name,
                "ambiguous lexer rules"
            );
        }
        winner
    }

    /// Builds the combined NFA: one fragment per rule in one shared graph,
    /// each rule's terminal states tagged with the rule, all fragment entries
    /// joined under a fresh root by epsilon edges.
    ///
    /// # Errors
    /// Returns [`BuildError::Rule`] naming the offending rule when a pattern
    /// fails to parse, or [`ConfigurationError::NoRules`] for an empty
    /// configuration.
    pub fn build_automaton(&self) -> Result<Automaton, BuildError> {
        if self.rules.is_empty() {
            return Err(ConfigurationError::NoRules.into());
        }

        let mut graph = Graph::new();
        let mut entries = Vec::with_capacity(self.rules.len());

        for (idx, rule) in self.rules.iter().enumerate() {
            let id = RuleId(u32::try_from(idx).unwrap_or_else(|_| unreachable!()));
            let fragment = pattern::parse(&mut graph, &rule.pattern, self.case_insensitive)
                .map_err(|source| BuildError::Rule {
                    rule: rule.name.clone(),
                    source,
                })?;

            for state in graph.reachable(fragment.entry) {
                if graph.is_terminal(state) {
                    graph.set_rule(state, id);
                }
            }
            entries.push(fragment.entry);
        }

        let start = if let &[entry] = entries.as_slice() {
            entry
        } else {
            let root = graph.add_state();
            for entry in entries {
                graph.connect(root, Input::Epsilon, entry);
            }
            root
        };

        Ok(Automaton::from_parts(graph, start))
    }

    /// Runs the whole pipeline: parse every rule, simplify, determinize when
    /// needed, and flatten into a [`LexerTable`].
    ///
    /// # Errors
    /// Returns [`BuildError`] when any stage fails.
    pub fn compile(&self) -> Result<LexerTable, BuildError> {
        let mut nfa = self.build_automaton()?;
        nfa.simplify();

        let dfa = if nfa.is_deterministic() {
            nfa
        } else {
            nfa.determinize(|candidates| self.resolve_ambiguity(candidates))?
        };

        let table = table::compile(dfa.graph(), dfa.start(), |rule| {
            self.rule(rule).token_type.clone()
        })?;
        Ok(table)
    }
}
