//! Menu input dispatch for compiled agents.
//!
//! Matching order: exact numeric index, then exact label, then
//! case-insensitive substring. Multiple substring hits are ambiguous and must
//! be disambiguated by the user; zero hits are reported, never silently
//! ignored.

/// Outcome of matching user input against a menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuMatch {
    /// Input was a 1-based index into the menu
    Index(usize),
    /// Input matched exactly one label
    Single(usize),
    /// Input matched several labels; caller must disambiguate
    Ambiguous(Vec<usize>),
    /// Input matched nothing; caller must report "not recognized"
    NoMatch,
}

fn normalize(label: &str) -> String {
    label.trim().trim_start_matches('*').to_lowercase()
}

/// Match user input against menu labels (labels may carry a `*` trigger
/// prefix, which is ignored for matching)
pub fn match_menu_input<S: AsRef<str>>(input: &str, labels: &[S]) -> MenuMatch {
    let input = input.trim();
    if input.is_empty() {
        return MenuMatch::NoMatch;
    }

    if let Ok(n) = input.parse::<usize>() {
        if n >= 1 && n <= labels.len() {
            return MenuMatch::Index(n - 1);
        }
        return MenuMatch::NoMatch;
    }

    let needle = normalize(input);
    let normalized: Vec<String> = labels.iter().map(|l| normalize(l.as_ref())).collect();

    // Exact label match takes precedence over substring, so "build" picks
    // *build even when *build-all also contains it
    let exact: Vec<usize> = normalized
        .iter()
        .enumerate()
        .filter(|(_, l)| **l == needle)
        .map(|(i, _)| i)
        .collect();
    match exact.as_slice() {
        [only] => return MenuMatch::Single(*only),
        [] => {}
        many => return MenuMatch::Ambiguous(many.to_vec()),
    }

    let matches: Vec<usize> = normalized
        .iter()
        .enumerate()
        .filter(|(_, l)| l.contains(&needle))
        .map(|(i, _)| i)
        .collect();
    match matches.as_slice() {
        [] => MenuMatch::NoMatch,
        [only] => MenuMatch::Single(*only),
        many => MenuMatch::Ambiguous(many.to_vec()),
    }
}
