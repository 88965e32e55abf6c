// lockjar-common/src/model/version.rs
use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Qualifiers that mean "this is the release" and therefore carry no ordering weight.
const RELEASE_QUALIFIERS: &[&str] = &["final", "ga", "release"];

/// Qualifier fragments that mark a build published ahead of its release.
const PRE_RELEASE_QUALIFIERS: &[&str] = &["alpha", "beta", "milestone", "cr", "rc", "snapshot"];

/// `a`, `b` and `m` only count as qualifiers when a number follows (`2.0-b3`).
const PRE_RELEASE_ALIASES: &[&str] = &["a", "b", "m"];

/// Highest minor that the pre-9 JDKs ever shipped under the `1.x` epoch.
const LEGACY_JDK_MAX_MINOR: u64 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Token {
    /// Qualifier text, lowercased.
    Text(String),
    /// Decimal digits without leading zeros, so arbitrarily long numbers compare
    /// without overflow.
    Numeric(String),
}

impl Token {
    fn numeric_value(&self) -> Option<u64> {
        match self {
            Token::Numeric(digits) => digits.parse().ok(),
            Token::Text(_) => None,
        }
    }
}

impl Ord for Token {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Token::Numeric(a), Token::Numeric(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Token::Text(a), Token::Text(b)) => a.cmp(b),
            (Token::Text(_), Token::Numeric(_)) => Ordering::Less,
            (Token::Numeric(_), Token::Text(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Token {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A version string ordered token by token.
///
/// Parsing never fails. The string is split on `.`, `_` and `-` and at
/// digit/letter boundaries; numeric tokens compare numerically, qualifier
/// text compares lexically and sorts below any number. When one version runs
/// out of tokens, a following number makes the longer version greater
/// (`1.8 < 1.8.11`) while a following qualifier makes it smaller
/// (`1.0-rc1 < 1.0`).
///
/// Range syntax (`[A]`, `[A,B]`, `[A,]`, `[,A]`, mixed brackets) is reduced to
/// its representative bound, the lower one when present.
///
/// Equality and hashing use the normalized tokens; `as_str` keeps the input.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    tokens: Vec<Token>,
}

impl Version {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let comparable = match VersionRange::parse(trimmed) {
            Some(range) => range
                .representative()
                .map(|v| v.raw.clone())
                .unwrap_or_default(),
            None => trimmed.to_string(),
        };
        let tokens = strip_legacy_jdk_epoch(&comparable, tokenize(&comparable));
        Self {
            raw: trimmed.to_string(),
            tokens,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True for alpha, beta, milestone, release-candidate and snapshot builds.
    pub fn is_pre_release(&self) -> bool {
        self.tokens.iter().enumerate().any(|(i, token)| match token {
            Token::Text(text) => {
                PRE_RELEASE_QUALIFIERS.iter().any(|q| text.contains(q))
                    || (PRE_RELEASE_ALIASES.contains(&text.as_str())
                        && matches!(self.tokens.get(i + 1), Some(Token::Numeric(_))))
            }
            Token::Numeric(_) => false,
        })
    }
}

/// Named exception for pre-9 JDK version strings such as `1.8.0_262`: the
/// `1.` epoch is dropped so the release compares as `8.0.262` against modern
/// `9.0.4`, `11.0.7` and friends. Only the historical shape
/// `1.<minor 1..=8>.<n>_<update>` qualifies; ordinary `1.x` library versions
/// keep their epoch.
fn strip_legacy_jdk_epoch(raw: &str, tokens: Vec<Token>) -> Vec<Token> {
    let looks_legacy = raw.starts_with("1.")
        && raw.contains('_')
        && tokens.len() >= 3
        && tokens[0].numeric_value() == Some(1)
        && tokens[1]
            .numeric_value()
            .is_some_and(|minor| (1..=LEGACY_JDK_MAX_MINOR).contains(&minor));
    if looks_legacy {
        tokens.into_iter().skip(1).collect()
    } else {
        tokens
    }
}

fn tokenize(raw: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    for chunk in raw.split(['.', '_', '-']) {
        let mut current = String::new();
        let mut current_is_digit = false;
        for ch in chunk.chars() {
            let is_digit = ch.is_ascii_digit();
            if !current.is_empty() && is_digit != current_is_digit {
                push_token(&mut tokens, std::mem::take(&mut current), current_is_digit);
            }
            current_is_digit = is_digit;
            current.push(ch);
        }
        if !current.is_empty() {
            push_token(&mut tokens, current, current_is_digit);
        }
    }
    tokens
}

fn push_token(tokens: &mut Vec<Token>, text: String, is_digit: bool) {
    if is_digit {
        let digits = text.trim_start_matches('0');
        tokens.push(Token::Numeric(if digits.is_empty() {
            "0".to_string()
        } else {
            digits.to_string()
        }));
    } else {
        let lowered = text.to_lowercase();
        if !RELEASE_QUALIFIERS.contains(&lowered.as_str()) {
            tokens.push(Token::Text(lowered));
        }
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let mut left = self.tokens.iter();
        let mut right = other.tokens.iter();
        loop {
            match (left.next(), right.next()) {
                (None, None) => return Ordering::Equal,
                (Some(a), Some(b)) => match a.cmp(b) {
                    Ordering::Equal => continue,
                    unequal => return unequal,
                },
                (Some(Token::Numeric(_)), None) => return Ordering::Greater,
                (Some(Token::Text(_)), None) => return Ordering::Less,
                (None, Some(Token::Numeric(_))) => return Ordering::Less,
                (None, Some(Token::Text(_))) => return Ordering::Greater,
            }
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.tokens == other.tokens
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tokens.hash(state);
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Version {
    type Err = Infallible;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Version::parse(s))
    }
}

impl Serialize for Version {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Version::parse(&s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    pub version: Version,
    pub inclusive: bool,
}

/// A Maven version range such as `[1.0,2.0)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    pub lower: Option<Bound>,
    pub upper: Option<Bound>,
}

impl VersionRange {
    /// Returns `None` when `raw` is a plain version rather than a range.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let open = raw.chars().next()?;
        let close = raw.chars().last()?;
        if !matches!(open, '[' | '(') || !matches!(close, ']' | ')') || raw.len() < 2 {
            return None;
        }
        let inner = &raw[1..raw.len() - 1];
        if inner.contains(['[', ']', '(', ')']) {
            return None;
        }

        let bound = |text: &str, inclusive: bool| {
            let text = text.trim();
            (!text.is_empty()).then(|| Bound {
                version: Version::parse(text),
                inclusive,
            })
        };

        match inner.split_once(',') {
            None => {
                // `[A]` pins exactly; `(A)` is meaningless.
                if open != '[' || close != ']' || inner.trim().is_empty() {
                    return None;
                }
                let exact = bound(inner, true);
                Some(Self {
                    lower: exact.clone(),
                    upper: exact,
                })
            }
            Some((low, high)) => {
                if high.contains(',') {
                    return None;
                }
                Some(Self {
                    lower: bound(low, open == '['),
                    upper: bound(high, close == ']'),
                })
            }
        }
    }

    pub fn representative(&self) -> Option<&Version> {
        self.lower
            .as_ref()
            .or(self.upper.as_ref())
            .map(|b| &b.version)
    }

    pub fn contains(&self, version: &Version) -> bool {
        let above_lower = match &self.lower {
            None => true,
            Some(b) if b.inclusive => version >= &b.version,
            Some(b) => version > &b.version,
        };
        let below_upper = match &self.upper {
            None => true,
            Some(b) if b.inclusive => version <= &b.version,
            Some(b) => version < &b.version,
        };
        above_lower && below_upper
    }

    /// Highest candidate inside the range; ties between equal versions go to
    /// the lexically greater spelling so the choice is stable.
    pub fn highest_satisfying<'a, I>(&self, candidates: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        candidates
            .into_iter()
            .map(|raw| (Version::parse(raw), raw))
            .filter(|(v, _)| self.contains(v))
            .max_by(|(a, a_raw), (b, b_raw)| a.cmp(b).then_with(|| a_raw.cmp(b_raw)))
            .map(|(_, raw)| raw)
    }
}
