/// Label fragment injected into names this proxy generates for itself. Seeing it
/// more than once in a query name means the query came back through us.
pub const LOOP_MARKER: &str = ".ne-";

/// Canonical form used for every routing comparison: lowercase, no trailing
/// root separator.
pub fn normalize_domain(domain: &str) -> String {
    domain.trim_end_matches('.').to_ascii_lowercase()
}

pub fn count_loop_markers(domain: &str) -> usize {
    domain.matches(LOOP_MARKER).count()
}

pub fn is_recursive_query(domain: &str) -> bool {
    count_loop_markers(domain) > 1
}
