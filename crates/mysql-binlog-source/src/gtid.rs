//! Accumulated GTID set tracking.
//!
//! The source maintains the set of transactions it has fully processed and
//! serializes it into control messages; the stored checkpoint is this set's
//! textual form, e.g. `3e11fa47-71ca-11e1-9e33-c80aa9429562:1-5,...`.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::{bail, Context, Result};

/// Set of executed transaction ids, grouped by server uuid with merged
/// gno intervals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GtidSet {
    /// uuid -> ascending, non-overlapping, inclusive intervals
    intervals: BTreeMap<String, Vec<(u64, u64)>>,
}

impl GtidSet {
    /// Parse the textual form. Empty input yields an empty set.
    pub fn parse(s: &str) -> Result<GtidSet> {
        let mut set = GtidSet::default();
        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let mut segments = part.split(':');
            let uuid = segments
                .next()
                .context("gtid entry missing uuid")?
                .to_ascii_lowercase();
            if uuid.len() != 36 {
                bail!("malformed gtid uuid: {uuid}");
            }
            let entry = set.intervals.entry(uuid).or_default();
            let mut any = false;
            for segment in segments {
                any = true;
                let (start, end) = match segment.split_once('-') {
                    Some((a, b)) => (
                        a.parse::<u64>().with_context(|| format!("bad gno in {part}"))?,
                        b.parse::<u64>().with_context(|| format!("bad gno in {part}"))?,
                    ),
                    None => {
                        let n = segment
                            .parse::<u64>()
                            .with_context(|| format!("bad gno in {part}"))?;
                        (n, n)
                    }
                };
                if start == 0 || end < start {
                    bail!("invalid gno interval in {part}");
                }
                entry.push((start, end));
            }
            if !any {
                bail!("gtid entry {part} has no intervals");
            }
            normalize(entry);
        }
        Ok(set)
    }

    /// Merge one executed transaction into the set.
    pub fn add(&mut self, uuid: &str, gno: u64) {
        let entry = self
            .intervals
            .entry(uuid.to_ascii_lowercase())
            .or_default();
        entry.push((gno, gno));
        normalize(entry);
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// One `uuid:ivl[:ivl...]` string per server uuid, the per-sid form the
    /// replication handshake consumes.
    pub fn sid_strings(&self) -> Vec<String> {
        self.intervals
            .iter()
            .map(|(uuid, intervals)| {
                let mut out = uuid.clone();
                for (start, end) in intervals {
                    out.push(':');
                    out.push_str(&format_interval(*start, *end));
                }
                out
            })
            .collect()
    }
}

impl fmt::Display for GtidSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sid_strings().join(","))
    }
}

fn format_interval(start: u64, end: u64) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{start}-{end}")
    }
}

/// Sort and coalesce adjacent or overlapping intervals.
fn normalize(intervals: &mut Vec<(u64, u64)>) {
    intervals.sort_unstable();
    let mut merged: Vec<(u64, u64)> = Vec::with_capacity(intervals.len());
    for &(start, end) in intervals.iter() {
        match merged.last_mut() {
            Some((_, last_end)) if start <= last_end.saturating_add(1) => {
                *last_end = (*last_end).max(end);
            }
            _ => merged.push((start, end)),
        }
    }
    *intervals = merged;
}

#[cfg(test)]
mod tests {
    use super::*;

    const UUID_A: &str = "3e11fa47-71ca-11e1-9e33-c80aa9429562";
    const UUID_B: &str = "aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee";

    #[test]
    fn test_parse_and_display_roundtrip() {
        let text = format!("{UUID_A}:1-5:8,{UUID_B}:3");
        let set = GtidSet::parse(&text).unwrap();
        assert_eq!(set.to_string(), text);
    }

    #[test]
    fn test_empty_input_is_empty_set() {
        let set = GtidSet::parse("").unwrap();
        assert!(set.is_empty());
        assert_eq!(set.to_string(), "");
    }

    #[test]
    fn test_add_extends_adjacent_interval() {
        let mut set = GtidSet::parse(&format!("{UUID_A}:1-5")).unwrap();
        set.add(UUID_A, 6);
        assert_eq!(set.to_string(), format!("{UUID_A}:1-6"));
    }

    #[test]
    fn test_add_gap_creates_second_interval_then_bridges() {
        let mut set = GtidSet::parse(&format!("{UUID_A}:1-5")).unwrap();
        set.add(UUID_A, 8);
        assert_eq!(set.to_string(), format!("{UUID_A}:1-5:8"));
        set.add(UUID_A, 7);
        set.add(UUID_A, 6);
        assert_eq!(set.to_string(), format!("{UUID_A}:1-8"));
    }

    #[test]
    fn test_add_new_uuid() {
        let mut set = GtidSet::default();
        set.add(UUID_B, 1);
        set.add(UUID_A, 1);
        // BTreeMap keeps uuid order deterministic
        assert_eq!(set.to_string(), format!("{UUID_A}:1,{UUID_B}:1"));
    }

    #[test]
    fn test_duplicate_add_is_idempotent() {
        let mut set = GtidSet::parse(&format!("{UUID_A}:1-5")).unwrap();
        set.add(UUID_A, 3);
        assert_eq!(set.to_string(), format!("{UUID_A}:1-5"));
    }

    #[test]
    fn test_sid_strings_split_per_uuid() {
        let set = GtidSet::parse(&format!("{UUID_A}:1-5,{UUID_B}:2:9-11")).unwrap();
        assert_eq!(
            set.sid_strings(),
            vec![format!("{UUID_A}:1-5"), format!("{UUID_B}:2:9-11")]
        );
    }

    #[test]
    fn test_malformed_inputs_rejected() {
        assert!(GtidSet::parse("not-a-uuid:1-5").is_err());
        assert!(GtidSet::parse(&format!("{UUID_A}")).is_err());
        assert!(GtidSet::parse(&format!("{UUID_A}:5-3")).is_err());
        assert!(GtidSet::parse(&format!("{UUID_A}:0")).is_err());
    }
}
