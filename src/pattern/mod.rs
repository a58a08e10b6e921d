//! Site patterns: the branch table and its text representation.

mod branchtab;

pub use branchtab::BranchTab;

use crate::base::LabelIndex;
use crate::errors::InputError;
use std::io::{self, BufRead, Write};

/// Write a table as site-pattern lines in canonical (ascending bitmask)
/// order, preceded by the header.
///
/// ```text
/// #       SitePat       Prob
///         x.0:y.0  0.1250000
/// ```
pub fn write_table<W: Write>(
    w: &mut W,
    tab: &BranchTab,
    labels: &LabelIndex,
) -> io::Result<()> {
    writeln!(w, "#{:>14} {:>10}", "SitePat", "Prob")?;
    let (pats, vals) = tab.to_arrays();
    for (pat, val) in pats.iter().zip(vals.iter()) {
        writeln!(w, "{:>15} {:>10.7}", labels.pattern_label(*pat), val)?;
    }
    Ok(())
}

/// Sorted `(label, value)` pairs, for machine-readable output.
pub fn labeled_entries(tab: &BranchTab, labels: &LabelIndex) -> Vec<(String, f64)> {
    let (pats, vals) = tab.to_arrays();
    pats.into_iter()
        .map(|p| labels.pattern_label(p))
        .zip(vals)
        .collect()
}

/// Read an observed site-pattern frequency table.
///
/// The format is the one `write_table` produces: a header line beginning
/// `# SitePat`, then one `label:...:label frequency` pair per line. Label
/// order within a pattern is unspecified. Patterns absent from the file
/// are treated as zero. Unknown labels are errors.
pub fn read_observed<R: BufRead>(r: R, labels: &LabelIndex) -> Result<BranchTab, InputError> {
    let mut tab = BranchTab::new();
    for (lineno, line) in r.lines().enumerate() {
        let line = line?;
        let lineno = lineno + 1;
        let line = match line.find('#') {
            Some(pos) => &line[..pos],
            None => &line[..],
        };
        let mut fields = line.split_whitespace();
        let (pattern, freq) = match (fields.next(), fields.next()) {
            (None, _) => continue, // blank or comment-only line
            (Some(p), Some(f)) => (p, f),
            (Some(_), None) => {
                return Err(InputError::Syntax {
                    line: lineno,
                    msg: "expected '<pattern> <frequency>'".to_string(),
                })
            }
        };
        if fields.next().is_some() {
            return Err(InputError::Syntax {
                line: lineno,
                msg: "trailing fields after frequency".to_string(),
            });
        }
        let pat = labels
            .parse_pattern(pattern)
            .map_err(|msg| InputError::Syntax { line: lineno, msg })?;
        let freq: f64 = freq.parse().map_err(|_| InputError::Syntax {
            line: lineno,
            msg: format!("bad frequency '{freq}'"),
        })?;
        tab.add(pat, freq);
    }
    Ok(tab)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> LabelIndex {
        let mut lx = LabelIndex::new();
        lx.add("x.0").unwrap();
        lx.add("y.0").unwrap();
        lx
    }

    #[test]
    fn test_write_table_canonical_order() {
        let lx = labels();
        let mut tab = BranchTab::new();
        tab.add(0b10, 0.75);
        tab.add(0b01, 0.25);
        let mut out = Vec::new();
        write_table(&mut out, &tab, &lx).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].contains("SitePat"));
        assert!(lines[1].contains("x.0"));
        assert!(lines[2].contains("y.0"));
    }

    #[test]
    fn test_read_observed_round_trip() {
        let lx = labels();
        let mut tab = BranchTab::new();
        tab.add(0b01, 0.25);
        tab.add(0b10, 0.75);
        let mut out = Vec::new();
        write_table(&mut out, &tab, &lx).unwrap();
        let parsed = read_observed(&out[..], &lx).unwrap();
        assert_eq!(parsed, tab);
    }

    #[test]
    fn test_read_observed_label_order_irrelevant() {
        let lx = labels();
        let text = "# SitePat Prob\ny.0:x.0 1.0\n";
        let parsed = read_observed(text.as_bytes(), &lx).unwrap();
        assert_eq!(parsed.get(0b11), 1.0);
    }

    #[test]
    fn test_read_observed_unknown_label() {
        let lx = labels();
        let text = "z.9 1.0\n";
        let err = read_observed(text.as_bytes(), &lx).unwrap_err();
        assert!(matches!(err, InputError::Syntax { line: 1, .. }));
    }

    #[test]
    fn test_read_observed_malformed_line() {
        let lx = labels();
        let err = read_observed("x.0\n".as_bytes(), &lx).unwrap_err();
        assert!(matches!(err, InputError::Syntax { .. }));
    }

    #[test]
    fn test_labeled_entries() {
        let lx = labels();
        let mut tab = BranchTab::new();
        tab.add(0b01, 0.5);
        tab.add(0b11, 0.5);
        let entries = labeled_entries(&tab, &lx);
        assert_eq!(entries[0].0, "x.0");
        assert_eq!(entries[1].0, "x.0:y.0");
    }
}
