//! Parser for population-description files.
//!
//! The format is line oriented; `#` begins a comment. Parameters are
//! declared before the segments that use them, and constraint expressions
//! may reference only previously declared names:
//!
//! ```text
//! time      {fixed|free|constrained} <name> = <expr>
//! twoN      {fixed|free|constrained} <name> = <expr>
//! mixFrac   {fixed|free|constrained} <name> = <expr>
//! segment   <name>  t=<tname> twoN=<nname> [samples=<k>]
//! mix       <child> from <native> + <mname> * <introgressor>
//! derive    <child> from <parent>
//! ```
//!
//! Sample tips are labeled `<segment>.<k>` in declaration order.

use crate::base::LabelIndex;
use crate::errors::InputError;
use crate::network::{PopNet, SegId};
use crate::params::{Bounds, ParamId, ParamKind, ParamStore};
use std::collections::HashMap;

/// Everything a population-description file defines.
#[derive(Debug)]
pub struct ParsedNetwork {
    pub store: ParamStore,
    pub net: PopNet,
    pub labels: LabelIndex,
    /// For tip `i`, the segment it is sampled from.
    pub tips: Vec<SegId>,
}

struct NetParser<'a> {
    bounds: &'a Bounds,
    store: ParamStore,
    net: PopNet,
    labels: LabelIndex,
    tips: Vec<SegId>,
    segs_by_name: HashMap<String, SegId>,
}

/// Parse population-description text into its parameter store, network,
/// and label index. Errors carry the 1-based line number.
pub fn parse_network_file(text: &str, bounds: &Bounds) -> Result<ParsedNetwork, InputError> {
    let mut p = NetParser {
        bounds,
        store: ParamStore::new(),
        net: PopNet::new(),
        labels: LabelIndex::new(),
        tips: Vec::new(),
        segs_by_name: HashMap::new(),
    };

    for (lineno, raw) in text.lines().enumerate() {
        let lineno = lineno + 1;
        let line = match raw.find('#') {
            Some(pos) => &raw[..pos],
            None => raw,
        };
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }
        let result = match tokens[0] {
            "time" => p.parse_param(&tokens, ParamKind::Time),
            "twoN" => p.parse_param(&tokens, ParamKind::TwoN),
            "mixFrac" => p.parse_param(&tokens, ParamKind::MixFrac),
            "segment" => p.parse_segment(&tokens),
            "mix" => p.parse_mix(&tokens),
            "derive" => p.parse_derive(&tokens),
            other => Err(format!("unknown keyword '{other}'")),
        };
        if let Err(msg) = result {
            return Err(InputError::Syntax { line: lineno, msg });
        }
    }

    Ok(ParsedNetwork {
        store: p.store,
        net: p.net,
        labels: p.labels,
        tips: p.tips,
    })
}

impl NetParser<'_> {
    // time|twoN|mixFrac {fixed|free|constrained} <name> = <expr>
    fn parse_param(&mut self, tokens: &[&str], kind: ParamKind) -> Result<(), String> {
        if tokens.len() < 3 {
            return Err(format!(
                "expected '{} {{fixed|free|constrained}} <name>=<value>'",
                tokens[0]
            ));
        }
        let status = tokens[1];
        // the remainder is NAME=EXPR, possibly with spaces around '='
        let rest = tokens[2..].join(" ");
        let (name, rhs) = rest
            .split_once('=')
            .ok_or_else(|| format!("expected '=' in '{rest}'"))?;
        let name = name.trim();
        let rhs = rhs.trim();
        if name.is_empty() || rhs.is_empty() {
            return Err(format!("expected '<name>=<value>' in '{rest}'"));
        }
        let (low, high) = self.bounds.for_kind(kind);
        match status {
            "fixed" | "free" => {
                let value: f64 = rhs
                    .parse()
                    .map_err(|_| format!("bad numeric value '{rhs}' for parameter '{name}'"))?;
                let added = if status == "fixed" {
                    self.store.add_fixed(name, value, low, high, kind)
                } else {
                    self.store.add_free(name, value, low, high, kind)
                };
                added.map_err(|e| e.to_string())?;
            }
            "constrained" => {
                self.store
                    .add_constrained(name, rhs, kind)
                    .map_err(|e| e.to_string())?;
            }
            other => {
                return Err(format!(
                    "expected 'fixed', 'free', or 'constrained', got '{other}'"
                ))
            }
        }
        Ok(())
    }

    // segment <name> t=<tname> twoN=<nname> [samples=<k>]
    fn parse_segment(&mut self, tokens: &[&str]) -> Result<(), String> {
        if tokens.len() < 4 {
            return Err("expected 'segment <name> t=<time> twoN=<size> [samples=<k>]'".to_string());
        }
        let name = tokens[1];
        if self.segs_by_name.contains_key(name) {
            return Err(format!("duplicate segment name '{name}'"));
        }
        let mut start: Option<ParamId> = None;
        let mut two_n: Option<ParamId> = None;
        let mut samples: u32 = 0;
        for field in &tokens[2..] {
            let (key, value) = field
                .split_once('=')
                .ok_or_else(|| format!("expected 'key=value', got '{field}'"))?;
            match key {
                "t" => start = Some(self.param(value, ParamKind::Time)?),
                "twoN" => two_n = Some(self.param(value, ParamKind::TwoN)?),
                "samples" => {
                    samples = value
                        .parse()
                        .map_err(|_| format!("bad sample count '{value}'"))?;
                }
                other => return Err(format!("unknown segment field '{other}'")),
            }
        }
        let start = start.ok_or_else(|| format!("segment '{name}' lacks t=<time>"))?;
        let two_n = two_n.ok_or_else(|| format!("segment '{name}' lacks twoN=<size>"))?;
        let seg = self.net.add_segment(name, two_n, start, samples);
        self.segs_by_name.insert(name.to_string(), seg);
        for k in 0..samples {
            self.labels
                .add(format!("{name}.{k}"))
                .map_err(|e| e.to_string())?;
            self.tips.push(seg);
        }
        Ok(())
    }

    // mix <child> from <native> + <mname> * <introgressor>
    fn parse_mix(&mut self, tokens: &[&str]) -> Result<(), String> {
        if tokens.len() != 8 || tokens[2] != "from" || tokens[4] != "+" || tokens[6] != "*" {
            return Err(
                "expected 'mix <child> from <native> + <mixFrac> * <introgressor>'".to_string(),
            );
        }
        let child = self.segment(tokens[1])?;
        let native = self.segment(tokens[3])?;
        let mix = self.param(tokens[5], ParamKind::MixFrac)?;
        let introgressor = self.segment(tokens[7])?;
        self.net
            .mix(child, mix, introgressor, native)
            .map_err(|e| e.to_string())
    }

    // derive <child> from <parent>
    fn parse_derive(&mut self, tokens: &[&str]) -> Result<(), String> {
        if tokens.len() != 4 || tokens[2] != "from" {
            return Err("expected 'derive <child> from <parent>'".to_string());
        }
        let child = self.segment(tokens[1])?;
        let parent = self.segment(tokens[3])?;
        self.net
            .add_child(&self.store, parent, child)
            .map_err(|e| e.to_string())
    }

    fn segment(&self, name: &str) -> Result<SegId, String> {
        self.segs_by_name
            .get(name)
            .copied()
            .ok_or_else(|| format!("unknown segment '{name}'"))
    }

    fn param(&self, name: &str, kind: ParamKind) -> Result<ParamId, String> {
        let id = self
            .store
            .lookup(name)
            .ok_or_else(|| format!("unknown parameter '{name}'"))?;
        if self.store.param(id).kind() != kind {
            return Err(format!("parameter '{name}' has the wrong type"));
        }
        Ok(id)
    }
}
