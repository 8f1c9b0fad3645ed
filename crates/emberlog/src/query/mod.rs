//! Predicate parsing, selectivity estimation, and search execution.
//!
//! A query is a set of `(field, comparator, value)` predicates plus a time
//! window and limit. At least one predicate must be an indexed equality with
//! a positive cardinality: the engine does no full unindexed scan. Among the
//! qualifying predicates the one with the smallest summed cardinality (the
//! most selective) drives the walk; its posting lists are traversed in
//! descending offset order, newest segment first, so results stream out
//! most-recent-first without any sort step.
//!
//! The comparator is chosen by a prefix on the raw value:
//!
//! | prefix      | comparator |
//! |-------------|------------|
//! | `<value`    | LT         |
//! | `,value`    | LTEQ       |
//! | `>value`    | GT         |
//! | `.value`    | GTEQ       |
//! | `!value`    | NEQ        |
//! | `/pattern/` | REGEX      |
//! | `value`     | EQ         |

use crate::record::{self, Record};
use crate::schema::FieldSchema;
use crate::segment::Segment;
use crate::store::SegmentStore;
use regex::bytes::Regex;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Default maximum number of results per query.
pub const DEFAULT_LIMIT: usize = 1000;

/// Comparison operator of a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    /// Exact byte equality.
    Eq,
    /// Byte inequality.
    Neq,
    /// Lexicographically less than.
    Lt,
    /// Lexicographically less than or equal.
    Lteq,
    /// Lexicographically greater than.
    Gt,
    /// Lexicographically greater than or equal.
    Gteq,
    /// Regular expression match.
    Regex,
}

/// One comparison against a named field.
#[derive(Debug, Clone)]
pub struct Predicate {
    field: String,
    comparator: Comparator,
    value: Vec<u8>,
    /// Compiled pattern for [`Comparator::Regex`]; `None` when the pattern
    /// failed to compile, which degrades the predicate to never-match.
    pattern: Option<Regex>,
    /// Field position resolved against the schema, if the field exists.
    position: Option<usize>,
    /// True iff the field is in the schema's indexed subset.
    indexed: bool,
}

impl Predicate {
    /// Parses a predicate from a field name and an operator-prefixed raw
    /// value, resolving position and indexed-ness against the schema.
    ///
    /// A value opening with `/` but missing a closing `/` falls back to an
    /// equality match against the whole raw value.
    pub fn parse(field: &str, raw_value: &str, schema: &FieldSchema) -> Self {
        let bytes = raw_value.as_bytes();
        let (comparator, value, pattern) = match bytes.first() {
            Some(b'<') => (Comparator::Lt, bytes[1..].to_vec(), None),
            Some(b',') => (Comparator::Lteq, bytes[1..].to_vec(), None),
            Some(b'>') => (Comparator::Gt, bytes[1..].to_vec(), None),
            Some(b'.') => (Comparator::Gteq, bytes[1..].to_vec(), None),
            Some(b'!') => (Comparator::Neq, bytes[1..].to_vec(), None),
            Some(b'/') => match raw_value[1..].rfind('/') {
                Some(end) => {
                    let source = &raw_value[1..1 + end];
                    let pattern = match Regex::new(source) {
                        Ok(re) => Some(re),
                        Err(err) => {
                            warn!(field, pattern = source, %err, "regex failed to compile");
                            None
                        }
                    };
                    (Comparator::Regex, source.as_bytes().to_vec(), pattern)
                }
                None => (Comparator::Eq, bytes.to_vec(), None),
            },
            _ => (Comparator::Eq, bytes.to_vec(), None),
        };

        let position = schema.position(field);
        let indexed = position.map_or(false, |p| schema.is_indexed(p));
        Self {
            field: field.to_string(),
            comparator,
            value,
            pattern,
            position,
            indexed,
        }
    }

    /// The field name this predicate applies to.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// The comparison operator.
    pub fn comparator(&self) -> Comparator {
        self.comparator
    }

    /// The comparison value (for REGEX, the pattern source).
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// True iff the predicate's field is indexed.
    pub fn indexed(&self) -> bool {
        self.indexed
    }
}

/// A predicate set with a result limit and a time window.
///
/// Both window bounds are exclusive: a record matches only when
/// `since < timestamp < before`.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    predicates: Vec<Predicate>,
    limit: usize,
    before: i64,
    since: i64,
}

impl SearchQuery {
    /// An empty query: no predicates, limit 1000, window `(0, now)`.
    pub fn new() -> Self {
        Self {
            predicates: Vec::new(),
            limit: DEFAULT_LIMIT,
            before: now_secs(),
            since: 0,
        }
    }

    /// Builds a query from request parameters.
    ///
    /// Keys starting with `_` are reserved: `_limit`, `_before` and `_since`
    /// override the defaults (parsed with the same permissive leading-integer
    /// rule records use); other reserved keys are ignored. Every remaining
    /// pair becomes a predicate via [`Predicate::parse`].
    pub fn from_params<'a, I>(params: I, schema: &FieldSchema) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut query = Self::new();
        for (key, value) in params {
            match key.strip_prefix('_') {
                Some("limit") => {
                    query.limit = record::parse_i64(value.as_bytes()).max(0) as usize;
                }
                Some("before") => query.before = record::parse_i64(value.as_bytes()),
                Some("since") => query.since = record::parse_i64(value.as_bytes()),
                Some(_) => {}
                None => query.predicates.push(Predicate::parse(key, value, schema)),
            }
        }
        query
    }

    /// Adds a parsed predicate.
    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Sets the maximum number of results.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the exclusive upper timestamp bound.
    pub fn with_before(mut self, before: i64) -> Self {
        self.before = before;
        self
    }

    /// Sets the exclusive lower timestamp bound.
    pub fn with_since(mut self, since: i64) -> Self {
        self.since = since;
        self
    }

    /// The parsed predicates.
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self::new()
    }
}

/// A predicate with its cardinality estimate for one execution.
struct Planned<'a> {
    pred: &'a Predicate,
    selectivity: u64,
}

/// Evaluates the query against the store, streaming up to `limit` matching
/// records most-recent-first.
pub(crate) fn execute(store: &SegmentStore, query: &SearchQuery) -> Vec<Record> {
    if query.predicates.is_empty() {
        return Vec::new();
    }

    // Selectivity: summed index cardinality across segments, EQ only.
    // Non-indexed fields have no postings anywhere, so they stay at 0.
    let mut planned: Vec<Planned> = query
        .predicates
        .iter()
        .map(|pred| {
            let selectivity = if pred.comparator == Comparator::Eq {
                store
                    .segments()
                    .map(|seg| seg.index().cardinality(&pred.field, &pred.value))
                    .sum()
            } else {
                0
            };
            Planned { pred, selectivity }
        })
        .collect();
    planned.sort_by_key(|p| p.selectivity);

    // The engine never scans unindexed: without a bounded equality there is
    // no candidate stream, and the query is unsatisfiable by construction.
    let driver_idx = planned.iter().position(|p| {
        p.pred.comparator == Comparator::Eq && p.pred.indexed && p.selectivity > 0
    });
    let Some(driver_idx) = driver_idx else {
        debug!("no indexed equality predicate with positive cardinality");
        return Vec::new();
    };
    let driver = planned[driver_idx].pred;
    debug!(
        field = %driver.field,
        selectivity = planned[driver_idx].selectivity,
        "selected driving predicate"
    );

    let mut results = Vec::new();
    'segments: for segment in store.segments() {
        let bounds = segment.time_bounds();
        if bounds.oldest < query.since || bounds.youngest > query.before {
            continue;
        }

        for (offset, timestamp) in
            segment
                .index()
                .iter_descending_from(&driver.field, &driver.value, u64::MAX)
        {
            if results.len() >= query.limit {
                break 'segments;
            }
            // Both window bounds are exclusive.
            if timestamp >= query.before || timestamp <= query.since {
                continue;
            }

            let mut decoded: Option<Record> = None;
            let mut matched = true;
            for (i, p) in planned.iter().enumerate() {
                if i == driver_idx {
                    continue;
                }
                if !candidate_matches(segment, p.pred, offset, &mut decoded) {
                    matched = false;
                    break;
                }
            }
            if matched {
                let record = match decoded {
                    Some(record) => Some(record),
                    None => decode_record(segment, offset),
                };
                if let Some(record) = record {
                    results.push(record);
                }
            }
        }
    }
    results
}

/// Evaluates one secondary predicate against a candidate position.
///
/// Indexed EQ/NEQ resolve from the index alone; everything else decodes the
/// record (once, lazily) and compares the actual field value.
fn candidate_matches(
    segment: &Segment,
    pred: &Predicate,
    offset: u64,
    decoded: &mut Option<Record>,
) -> bool {
    if pred.indexed && matches!(pred.comparator, Comparator::Eq | Comparator::Neq) {
        let present = segment.index().contains_at(&pred.field, &pred.value, offset);
        return match pred.comparator {
            Comparator::Eq => present,
            _ => !present,
        };
    }

    // A field outside the schema can never match.
    let Some(position) = pred.position else {
        return false;
    };
    if decoded.is_none() {
        *decoded = decode_record(segment, offset);
    }
    let Some(record) = decoded.as_ref() else {
        return false;
    };
    // Absent trailing fields never match.
    let Some(value) = record.field(position) else {
        return false;
    };

    match pred.comparator {
        Comparator::Regex => pred.pattern.as_ref().map_or(false, |re| re.is_match(value)),
        Comparator::Eq => value == pred.value.as_slice(),
        Comparator::Neq => value != pred.value.as_slice(),
        Comparator::Lt => value < pred.value.as_slice(),
        Comparator::Lteq => value <= pred.value.as_slice(),
        Comparator::Gt => value > pred.value.as_slice(),
        Comparator::Gteq => value >= pred.value.as_slice(),
    }
}

/// Decodes a candidate record, degrading corruption to "no record".
fn decode_record(segment: &Segment, offset: u64) -> Option<Record> {
    match segment.decode_at(offset) {
        Ok(decoded) => Some(decoded.record),
        Err(err) => {
            warn!(offset, %err, "skipping undecodable candidate");
            None
        }
    }
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
