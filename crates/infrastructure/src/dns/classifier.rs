use base64::{engine::general_purpose::STANDARD, Engine};
use rustc_hash::FxHashMap;
use sieve_dns_application::ports::Classifier;
use sieve_dns_domain::DomainError;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, PartialEq, Eq)]
pub enum ParsedRule {
    Block(String),
    Exception(String),
}

/// Parses one line of an adblock-plus style list. Comments, headers, regex
/// rules and wildcard rules yield `None`.
pub fn parse_rule_line(line: &str) -> Option<ParsedRule> {
    let line = line.trim();

    if line.is_empty() || line.starts_with('!') || line.starts_with('[') {
        return None;
    }

    if let Some(rest) = line.strip_prefix("@@") {
        return parse_pattern(rest).map(ParsedRule::Exception);
    }

    parse_pattern(line).map(ParsedRule::Block)
}

fn parse_pattern(pattern: &str) -> Option<String> {
    if pattern.starts_with('/') && pattern.ends_with('/') {
        return None;
    }
    if pattern.contains('*') {
        return None;
    }

    let host = if let Some(rest) = pattern.strip_prefix("||") {
        rest
    } else if let Some(rest) = pattern.strip_prefix('|') {
        rest.strip_prefix("http://")
            .or_else(|| rest.strip_prefix("https://"))?
    } else if let Some(rest) = pattern.strip_prefix('.') {
        rest
    } else {
        pattern
    };

    let host = host
        .split(['/', '^', '?'])
        .next()
        .unwrap_or_default();
    let host = host.split(':').next().unwrap_or_default();
    let host = host.trim_matches('.').to_ascii_lowercase();

    if host.is_empty() || host.contains(char::is_whitespace) {
        return None;
    }
    Some(host)
}

#[derive(Debug, Default, Clone, Copy)]
struct RuleFlags {
    blocked: bool,
    excepted: bool,
}

/// Suffix classifier over an adblock-plus / gfwlist subset. The longest
/// matching suffix decides; an exception beats a block rule on the same
/// suffix.
#[derive(Debug, Default)]
pub struct AbpClassifier {
    rules: FxHashMap<String, RuleFlags>,
}

impl AbpClassifier {
    pub fn from_rules<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut rules: FxHashMap<String, RuleFlags> = FxHashMap::default();
        for line in lines {
            match parse_rule_line(line.as_ref()) {
                Some(ParsedRule::Block(domain)) => rules.entry(domain).or_default().blocked = true,
                Some(ParsedRule::Exception(domain)) => {
                    rules.entry(domain).or_default().excepted = true
                }
                None => {}
            }
        }
        Self { rules }
    }

    pub fn from_text(text: &str) -> Self {
        Self::from_rules(text.lines())
    }

    /// Loads a rule list, decoding the whole file first when `base64` is set.
    pub fn from_file(path: impl AsRef<Path>, base64: bool) -> Result<Self, DomainError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DomainError::IoError(format!("Failed to read rule list {}: {}", path.display(), e))
        })?;

        let text = if base64 {
            decode_base64(&raw).map_err(|e| {
                DomainError::ConfigError(format!(
                    "Rule list {} is not valid base64: {}",
                    path.display(),
                    e
                ))
            })?
        } else {
            raw
        };

        let classifier = Self::from_text(&text);
        info!(path = %path.display(), rules = classifier.len(), "Rule list loaded");
        Ok(classifier)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn decode_base64(raw: &str) -> Result<String, String> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD.decode(compact).map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|e| e.to_string())
}

impl Classifier for AbpClassifier {
    fn is_blocked(&self, domain: &str) -> Option<bool> {
        let domain = domain.trim_end_matches('.').to_ascii_lowercase();
        let mut suffix = domain.as_str();

        loop {
            if let Some(flags) = self.rules.get(suffix) {
                let blocked = flags.blocked && !flags.excepted;
                debug!(domain = %domain, rule = %suffix, blocked, "Rule matched");
                return Some(blocked);
            }
            match suffix.split_once('.') {
                Some((_, parent)) if !parent.is_empty() => suffix = parent,
                _ => return None,
            }
        }
    }
}
