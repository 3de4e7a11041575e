//! Single-entry compiled-expression cache.
//!
//! Filter levels are matched against thousands of subtest names, nearly
//! always with the same few patterns in a row, so only the most recently
//! compiled expression is retained. Each [`Matcher`](crate::Matcher) owns its
//! own cache; independent runs never share one.

use regex::Regex;

/// Holds at most one compiled [`Regex`], keyed by its source text.
#[derive(Debug, Default)]
pub struct RegexCache {
    cached: Option<Regex>,
    #[cfg(test)]
    compilations: usize,
}

impl RegexCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Unanchored search of `pattern` in `haystack`.
    ///
    /// Compiles `pattern` only if it differs from the cached source. A
    /// pattern that fails to compile leaves the previous entry in place.
    pub fn is_match(&mut self, pattern: &str, haystack: &str) -> Result<bool, regex::Error> {
        match &self.cached {
            Some(re) if re.as_str() == pattern => Ok(re.is_match(haystack)),
            _ => {
                let re = Regex::new(pattern)?;
                #[cfg(test)]
                {
                    self.compilations += 1;
                }
                let matched = re.is_match(haystack);
                self.cached = Some(re);
                Ok(matched)
            }
        }
    }

    /// Source text of the cached expression, if any.
    #[cfg(test)]
    pub(crate) fn pattern(&self) -> Option<&str> {
        self.cached.as_ref().map(Regex::as_str)
    }

    /// Number of successful compilations so far.
    #[cfg(test)]
    pub(crate) fn compilations(&self) -> usize {
        self.compilations
    }
}
