//! Thread Range Parsing
//!
//! Expands a compact thread-count specification into a sorted set of
//! distinct thread counts.
//!
//! Grammar:
//!
//! ```text
//! Range := Term (',' Term)*
//! Term  := N | N ':' N | N ':' N ':' N
//! N     := non-negative integer literal
//! ```
//!
//! - `N` is the singleton `{N}`
//! - `A:B` is the inclusive range `{A, A+1, ..., B}`
//! - `A:B:S` is the inclusive range from `A` to `B` stepping by `S`
//!
//! A bare `0` is an ordinary term; the orchestrator treats it as the serial
//! baseline. Terms may be separated by whitespace as well as commas. No term
//! may reach above [`MAX_THREAD_COUNT`].

use std::collections::BTreeSet;
use thiserror::Error;

/// Largest thread count a specification may name
pub const MAX_THREAD_COUNT: u32 = 4096;

/// Errors raised while parsing a thread range specification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    /// Character outside the grammar
    #[error("error parsing range '{spec}': unexpected '{found}' at offset {offset}")]
    UnexpectedChar {
        /// Full specification
        spec: String,
        /// Offending character
        found: char,
        /// Byte offset into `spec`
        offset: usize,
    },

    /// A separator where a number belongs
    #[error("error parsing range '{spec}': expected a number at offset {offset}")]
    MissingNumber {
        /// Full specification
        spec: String,
        /// Byte offset into `spec`
        offset: usize,
    },

    /// Term with a fourth number
    #[error("error parsing range '{spec}': more than three numbers in term at offset {offset}")]
    TooManyBounds {
        /// Full specification
        spec: String,
        /// Byte offset of the extra ':'
        offset: usize,
    },

    /// Literal does not fit in a `u32`
    #[error("error parsing range '{spec}': number at offset {offset} is too large")]
    NumberTooLarge {
        /// Full specification
        spec: String,
        /// Byte offset where the literal starts
        offset: usize,
    },

    /// `A:B:0`
    #[error("error parsing range '{spec}': step must be positive at offset {offset}")]
    ZeroStep {
        /// Full specification
        spec: String,
        /// Byte offset where the term ends
        offset: usize,
    },

    /// Term reaches above [`MAX_THREAD_COUNT`]
    #[error(
        "error parsing range '{spec}': term ending at offset {offset} exceeds {limit} threads"
    )]
    TooManyThreads {
        /// Full specification
        spec: String,
        /// Byte offset where the term ends
        offset: usize,
        /// The cap in force
        limit: u32,
    },
}

/// Parse a thread range specification.
///
/// An absent or blank specification expands to `0..=default_max`. Any
/// malformed input is an error; nothing is dropped silently.
pub fn parse_thread_range(
    spec: Option<&str>,
    default_max: u32,
) -> Result<BTreeSet<u32>, RangeError> {
    let spec = spec.map(str::trim).unwrap_or_default();
    if spec.is_empty() {
        return Ok((0..=default_max).collect());
    }
    RangeParser::new(spec).parse()
}

/// Single pass, one character of lookahead.
struct RangeParser<'a> {
    spec: &'a str,
    /// Byte offset where the current number's digits began
    digits_start: Option<usize>,
    /// Numbers closed by ':' in the current term
    bounds: [u32; 2],
    bound_count: usize,
    /// Whitespace ended the last term, so one ',' may follow before the next
    space_closed: bool,
    values: BTreeSet<u32>,
}

impl<'a> RangeParser<'a> {
    fn new(spec: &'a str) -> Self {
        Self {
            spec,
            digits_start: None,
            bounds: [0; 2],
            bound_count: 0,
            space_closed: false,
            values: BTreeSet::new(),
        }
    }

    fn parse(mut self) -> Result<BTreeSet<u32>, RangeError> {
        // End of input acts as one more terminator
        let terminator = std::iter::once((self.spec.len(), None));
        let chars = self.spec.char_indices().map(|(i, c)| (i, Some(c)));

        for (offset, c) in chars.chain(terminator) {
            match c {
                Some(c) if c.is_ascii_digit() => {
                    if self.digits_start.is_none() {
                        self.digits_start = Some(offset);
                    }
                    self.space_closed = false;
                }
                // A trailing separator already closed the last term
                None if self.digits_start.is_none() && self.bound_count == 0 && offset > 0 => {}
                Some(',') if self.space_closed => self.space_closed = false,
                Some(',') | None => self.close_term(offset)?,
                Some(c) if c.is_whitespace() && self.digits_start.is_none() => {}
                Some(c) if c.is_whitespace() => {
                    self.close_term(offset)?;
                    self.space_closed = true;
                }
                Some(':') => self.push_bound(offset)?,
                Some(found) => {
                    return Err(RangeError::UnexpectedChar {
                        spec: self.spec.to_string(),
                        found,
                        offset,
                    });
                }
            }
        }

        Ok(self.values)
    }

    fn take_number(&mut self, end: usize) -> Result<u32, RangeError> {
        let start = self
            .digits_start
            .take()
            .ok_or_else(|| RangeError::MissingNumber {
                spec: self.spec.to_string(),
                offset: end,
            })?;
        self.spec[start..end].parse().map_err(|_| RangeError::NumberTooLarge {
            spec: self.spec.to_string(),
            offset: start,
        })
    }

    fn push_bound(&mut self, offset: usize) -> Result<(), RangeError> {
        if self.bound_count == self.bounds.len() {
            return Err(RangeError::TooManyBounds {
                spec: self.spec.to_string(),
                offset,
            });
        }
        let n = self.take_number(offset)?;
        self.bounds[self.bound_count] = n;
        self.bound_count += 1;
        Ok(())
    }

    fn close_term(&mut self, offset: usize) -> Result<(), RangeError> {
        let last = self.take_number(offset)?;
        let (lo, hi, step) = match self.bound_count {
            0 => (last, last, 1),
            1 => (self.bounds[0], last, 1),
            _ => (self.bounds[0], self.bounds[1], last),
        };
        if step == 0 {
            return Err(RangeError::ZeroStep {
                spec: self.spec.to_string(),
                offset,
            });
        }
        // Descending ranges are empty whatever their bounds
        if lo <= hi && hi > MAX_THREAD_COUNT {
            return Err(RangeError::TooManyThreads {
                spec: self.spec.to_string(),
                offset,
                limit: MAX_THREAD_COUNT,
            });
        }
        self.values.extend((lo..=hi).step_by(step as usize));
        self.bound_count = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(spec: &str) -> Vec<u32> {
        parse_thread_range(Some(spec), 0).unwrap().into_iter().collect()
    }

    #[test]
    fn test_singleton() {
        assert_eq!(parse("5"), vec![5]);
        assert_eq!(parse("0"), vec![0]);
    }

    #[test]
    fn test_inclusive_range() {
        assert_eq!(parse("4:8"), vec![4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_stride_range() {
        assert_eq!(parse("2:6:2"), vec![2, 4, 6]);
        // Last value stops at or below the upper bound
        assert_eq!(parse("1:8:3"), vec![1, 4, 7]);
    }

    #[test]
    fn test_mixed_terms_sorted_and_deduplicated() {
        assert_eq!(parse("1,3,5:7"), vec![1, 3, 5, 6, 7]);
        assert_eq!(parse("8,1,2,4:8,4:16:4"), vec![1, 2, 4, 5, 6, 7, 8, 12, 16]);
    }

    #[test]
    fn test_whitespace_separates_terms() {
        assert_eq!(parse("1 2"), vec![1, 2]);
        assert_eq!(parse("  1,2  "), vec![1, 2]);
        assert_eq!(parse("1, 2"), vec![1, 2]);
        assert_eq!(parse("1 ,2"), vec![1, 2]);
        assert_eq!(parse("1 , 2"), vec![1, 2]);
        assert_eq!(parse("1:3 ,8"), vec![1, 2, 3, 8]);
    }

    #[test]
    fn test_space_then_comma_allows_one_comma() {
        for spec in ["1 ,,2", "1 , ,2"] {
            assert!(matches!(
                parse_thread_range(Some(spec), 4),
                Err(RangeError::MissingNumber { .. })
            ));
        }
    }

    #[test]
    fn test_trailing_separator_tolerated() {
        assert_eq!(parse("1,2,"), vec![1, 2]);
        assert_eq!(parse("2:4,"), vec![2, 3, 4]);
    }

    #[test]
    fn test_empty_uses_default_max() {
        let all: Vec<u32> = parse_thread_range(Some(""), 4).unwrap().into_iter().collect();
        assert_eq!(all, vec![0, 1, 2, 3, 4]);

        let absent: Vec<u32> = parse_thread_range(None, 2).unwrap().into_iter().collect();
        assert_eq!(absent, vec![0, 1, 2]);
    }

    #[test]
    fn test_descending_range_is_empty() {
        assert!(parse("5:3").is_empty());
    }

    #[test]
    fn test_malformed_specs() {
        for spec in ["1:", "a", "1::2:3", "1,,2", ",1", "1:2:3:4", "1-4", "1:,2"] {
            assert!(
                parse_thread_range(Some(spec), 4).is_err(),
                "expected '{}' to be rejected",
                spec
            );
        }
    }

    #[test]
    fn test_error_reports_spec_and_offset() {
        let err = parse_thread_range(Some("1,x"), 4).unwrap_err();
        assert_eq!(
            err,
            RangeError::UnexpectedChar {
                spec: "1,x".to_string(),
                found: 'x',
                offset: 2,
            }
        );
        assert!(err.to_string().contains("1,x"));
    }

    #[test]
    fn test_zero_step_rejected() {
        assert!(matches!(
            parse_thread_range(Some("1:4:0"), 4),
            Err(RangeError::ZeroStep { .. })
        ));
    }

    #[test]
    fn test_huge_range_rejected() {
        for spec in ["0:4294967295", "0:4294967295:1", "1,4097", "4000:5000:7"] {
            assert!(
                matches!(
                    parse_thread_range(Some(spec), 4),
                    Err(RangeError::TooManyThreads { limit: MAX_THREAD_COUNT, .. })
                ),
                "expected '{}' to be capped",
                spec
            );
        }
        assert_eq!(parse("4095:4096").len(), 2);
        // Empty, so nothing to cap
        assert!(parse("9000:3").is_empty());
    }

    #[test]
    fn test_overflow_rejected() {
        assert!(matches!(
            parse_thread_range(Some("99999999999"), 4),
            Err(RangeError::NumberTooLarge { .. })
        ));
    }
}
