use std::fmt;

use crate::atoms::Structure;
use crate::error::{FitError, Result};

/// Residue number standing in for "first/last residue present".
pub const WHOLE: i32 = -999;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneMode {
    /// Endpoints are (chain, resnum, insert) triples from the input file.
    Resnum,
    /// Endpoints are 1-based ordinal positions in input order, continuous
    /// across chain breaks.
    Sequential,
}

impl fmt::Display for ZoneMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneMode::Resnum => write!(f, "Residue numbering"),
            ZoneMode::Sequential => write!(f, "Sequential numbering"),
        }
    }
}

/// A pair of equivalenced residue ranges across two structures.
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub chain1: String,
    pub start1: i32,
    pub startinsert1: char,
    pub stop1: i32,
    pub stopinsert1: char,
    pub chain2: String,
    pub start2: i32,
    pub startinsert2: char,
    pub stop2: i32,
    pub stopinsert2: char,
    pub mode: ZoneMode,
}

impl Zone {
    /// A zone covering every residue of both structures.
    pub fn whole(mode: ZoneMode) -> Zone {
        Zone {
            chain1: String::new(),
            start1: WHOLE,
            startinsert1: ' ',
            stop1: WHOLE,
            stopinsert1: ' ',
            chain2: String::new(),
            start2: WHOLE,
            startinsert2: ' ',
            stop2: WHOLE,
            stopinsert2: ' ',
            mode,
        }
    }

    /// A one-residue sequential zone at ordinals (r, m).
    pub fn single(r: i32, m: i32) -> Zone {
        Zone {
            chain1: String::new(),
            start1: r,
            startinsert1: ' ',
            stop1: r,
            stopinsert1: ' ',
            chain2: String::new(),
            start2: m,
            startinsert2: ' ',
            stop2: m,
            stopinsert2: ' ',
            mode: ZoneMode::Sequential,
        }
    }

    /// A sequential zone over explicit ordinal ranges.
    pub fn sequential(start1: i32, stop1: i32, start2: i32, stop2: i32) -> Zone {
        Zone {
            chain1: String::new(),
            start1,
            startinsert1: ' ',
            stop1,
            stopinsert1: ' ',
            chain2: String::new(),
            start2,
            startinsert2: ' ',
            stop2,
            stopinsert2: ' ',
            mode: ZoneMode::Sequential,
        }
    }

    fn format_half(chain: &str, start: i32, si: char, stop: i32, pi: char) -> String {
        let chain = chain.trim();
        if start == WHOLE && stop == WHOLE {
            if chain.is_empty() {
                "*".to_string()
            } else {
                format!("{}*", chain)
            }
        } else {
            let si = if si == ' ' { String::new() } else { si.to_string() };
            let pi = if pi == ' ' { String::new() } else { pi.to_string() };
            format!("{}{}{}-{}{}{}", chain, start, si, chain, stop, pi)
        }
    }

    pub fn half1(&self) -> String {
        Zone::format_half(
            &self.chain1,
            self.start1,
            self.startinsert1,
            self.stop1,
            self.stopinsert1,
        )
    }

    pub fn half2(&self) -> String {
        Zone::format_half(
            &self.chain2,
            self.start2,
            self.startinsert2,
            self.stop2,
            self.stopinsert2,
        )
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<16} with {:<16} ({})",
            self.half1(),
            self.half2(),
            self.mode
        )
    }
}

/// Split `[chain[.]]num[insert]` into its parts. The chain may be
/// multi-character; a dot separates it from the residue number and is
/// mandatory when the chain itself is numeric. Backslashes escape, so a
/// negative residue number is written `\-5`. A blank spec means the whole
/// structure.
pub fn parse_res_spec(spec: &str) -> Result<(String, i32, char)> {
    // Drop escapes, keep what they protected
    let cleaned: String = spec.trim().chars().filter(|&c| c != '\\').collect();

    if cleaned.is_empty() {
        return Ok((String::new(), WHOLE, ' '));
    }

    let mut chain = String::new();
    let mut rest = cleaned.as_str();

    if let Some(dot) = cleaned.find('.') {
        chain = cleaned[..dot].to_string();
        rest = &cleaned[dot + 1..];
    } else {
        let lead: usize = cleaned
            .chars()
            .take_while(|c| !c.is_ascii_digit() && *c != '-')
            .count();
        if lead > 0 {
            chain = cleaned[..lead].to_string();
            rest = &cleaned[lead..];
        }
    }

    // Trailing alphabetic character is the insert code
    let mut insert = ' ';
    let mut numpart = rest;
    if let Some(last) = rest.chars().last() {
        if !last.is_ascii_digit() && rest.len() > 1 {
            insert = last;
            numpart = &rest[..rest.len() - 1];
        }
    }

    let resnum: i32 = numpart
        .parse()
        .map_err(|_| FitError::Parse(format!("bad residue specification: {}", spec)))?;

    Ok((chain, resnum, insert))
}

/// Locate the dash separating a range, skipping `\-` escapes.
fn find_dash(spec: &str) -> Option<usize> {
    let bytes = spec.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'-' && (i == 0 || bytes[i - 1] != b'\\') {
            return Some(i);
        }
    }
    None
}

/// Locate `spec` as a sequence fragment `SEQ[,len][/occurrence]` in a
/// one-letter sequence, returning 1-based start/stop ordinals.
pub fn find_seq(spec: &str, sequence: &str) -> Option<(i32, i32)> {
    let mut fragment = spec;
    let mut length = None;
    let mut occurrence = 1usize;

    if let Some(slash) = fragment.find('/') {
        occurrence = fragment[slash + 1..].trim().parse().ok()?;
        fragment = &fragment[..slash];
    }
    if let Some(comma) = fragment.find(',') {
        length = Some(fragment[comma + 1..].trim().parse::<usize>().ok()?);
        fragment = &fragment[..comma];
    }
    let length = length.unwrap_or(fragment.len());

    let seq: Vec<char> = sequence.chars().collect();
    let frag: Vec<char> = fragment.chars().collect();
    if frag.is_empty() || frag.len() > seq.len() {
        return None;
    }

    let mut found = 0;
    for j in 0..=(seq.len() - frag.len()) {
        if seq[j..j + frag.len()] == frag[..] {
            found += 1;
            if found == occurrence {
                return Some((j as i32 + 1, (j + length) as i32));
            }
        }
    }
    None
}

struct Half {
    chain: String,
    start: i32,
    startinsert: char,
    stop: i32,
    stopinsert: char,
    seq_zone: bool,
}

fn parse_half(text: &str, sequence: Option<&str>) -> Result<Half> {
    // Case is only significant when a dot separator is present
    let text = if text.contains('.') {
        text.to_string()
    } else {
        text.to_uppercase()
    };
    let text = text.trim();

    if let Some(star) = text.find('*') {
        let chain = text[..star].trim_end_matches('.').to_string();
        return Ok(Half {
            chain,
            start: WHOLE,
            startinsert: ' ',
            stop: WHOLE,
            stopinsert: ' ',
            seq_zone: false,
        });
    }

    if let Some(dash) = find_dash(text) {
        let (chain, start, startinsert) = parse_res_spec(&text[..dash])?;
        let (chain2, stop, stopinsert) = parse_res_spec(&text[dash + 1..])?;
        let chain = if chain.is_empty() { chain2 } else { chain };
        return Ok(Half {
            chain,
            start,
            startinsert,
            stop,
            stopinsert,
            seq_zone: false,
        });
    }

    // A bare word is a sequence-specified zone
    let sequence = sequence.ok_or_else(|| {
        FitError::Parse(format!("sequence zone specification not found: {}", text))
    })?;
    let (start, stop) = find_seq(text, sequence).ok_or_else(|| {
        FitError::Parse(format!("sequence zone specification not found: {}", text))
    })?;
    Ok(Half {
        chain: String::new(),
        start,
        startinsert: ' ',
        stop,
        stopinsert: ' ',
        seq_zone: true,
    })
}

/// Parse a full zone specification `spec1[:spec2]`. When the second spec
/// is absent the zone is symmetric. Per-structure (`:`) zones are refused
/// in multi-structure mode. Sequence-fragment halves are resolved against
/// the supplied one-letter sequences and force SEQUENTIAL mode.
pub fn parse_zone(
    spec: &str,
    ref_seq: Option<&str>,
    mob_seq: Option<&str>,
    multi: bool,
    current_mode: ZoneMode,
) -> Result<Zone> {
    let spec = spec.trim();
    let (text1, text2) = match spec.find(':') {
        Some(colon) => {
            if multi {
                return Err(FitError::Parse(
                    "per-structure zones cannot be used in multi-structure mode".to_string(),
                ));
            }
            (&spec[..colon], Some(spec[colon + 1..].trim()))
        }
        None => (spec, None),
    };

    let h1 = parse_half(text1, ref_seq)?;
    let h2 = match text2 {
        Some(t) => parse_half(t, mob_seq)?,
        None if h1.seq_zone => parse_half(text1, mob_seq)?,
        None => Half {
            chain: h1.chain.clone(),
            start: h1.start,
            startinsert: h1.startinsert,
            stop: h1.stop,
            stopinsert: h1.stopinsert,
            seq_zone: false,
        },
    };

    let mode = if h1.seq_zone || h2.seq_zone {
        ZoneMode::Sequential
    } else {
        current_mode
    };

    Ok(Zone {
        chain1: h1.chain,
        start1: h1.start,
        startinsert1: h1.startinsert,
        stop1: h1.stop,
        stopinsert1: h1.stopinsert,
        chain2: h2.chain,
        start2: h2.start,
        startinsert2: h2.startinsert,
        stop2: h2.stop,
        stopinsert2: h2.stopinsert,
        mode,
    })
}

fn chain_matches(zone_chain: &str, atom_chain: &str) -> bool {
    let zc = zone_chain.trim();
    zc.is_empty() || zc == atom_chain.trim()
}

/// Resolve one half of a zone to an atom index range `[start, stop)` in a
/// structure. Residue-numbered lookups honour chain labels and insertion
/// codes; sequential lookups count residue boundaries across the whole
/// structure.
pub fn find_zone_range(
    s: &Structure,
    chain: &str,
    start: i32,
    startinsert: char,
    stop: i32,
    stopinsert: char,
    mode: ZoneMode,
) -> Option<(usize, usize)> {
    let n = s.natoms();
    if n == 0 {
        return None;
    }

    // Whole structure or whole chain
    if start == WHOLE && stop == WHOLE {
        if chain.trim().is_empty() {
            return Some((0, n));
        }
        let mut from = None;
        for (i, atom) in s.atoms.iter().enumerate() {
            if chain_matches(chain, &atom.chain) {
                if from.is_none() {
                    from = Some(i);
                }
            } else if let Some(f) = from {
                return Some((f, i));
            }
        }
        return from.map(|f| (f, n));
    }

    let mut zstart = if start == WHOLE { Some(0) } else { None };
    let mut zstop: Option<usize> = None;

    match mode {
        ZoneMode::Resnum => {
            let mut in_stop = false;
            let mut found_chain = false;
            for (i, atom) in s.atoms.iter().enumerate() {
                if chain_matches(chain, &atom.chain) {
                    found_chain = true;
                    if zstart.is_none() && atom.resnum == start && atom.insert == startinsert {
                        zstart = Some(i);
                    }
                    if zstop.is_none() && stop != WHOLE {
                        if in_stop && (atom.resnum != stop || atom.insert != stopinsert) {
                            zstop = Some(i);
                            break;
                        }
                        if atom.resnum == stop && atom.insert == stopinsert {
                            in_stop = true;
                        }
                    }
                } else if in_stop || (stop == WHOLE && found_chain) {
                    // Zone (or chain) ended exactly at a chain boundary
                    zstop = Some(i);
                    break;
                }
            }
        }
        ZoneMode::Sequential => {
            let mut rescount = 1usize;
            let mut in_stop = false;
            for (i, atom) in s.atoms.iter().enumerate() {
                if i > 0 && !atom.same_residue(&s.atoms[i - 1]) {
                    rescount += 1;
                }
                if zstart.is_none() && rescount == start as usize {
                    zstart = Some(i);
                }
                if zstop.is_none() && stop != WHOLE {
                    if in_stop && rescount != stop as usize {
                        zstop = Some(i);
                    }
                    if rescount == stop as usize {
                        in_stop = true;
                    }
                }
                if zstart.is_some() && zstop.is_some() {
                    break;
                }
            }
        }
    }

    zstart.map(|from| (from, zstop.unwrap_or(n)))
}

/// Resolve both halves of a zone against the reference and mobile
/// structures, with a Reference error naming the zone on failure.
pub fn find_zone_pair(
    zone: &Zone,
    reference: &Structure,
    mobile: &Structure,
) -> Result<((usize, usize), (usize, usize))> {
    let r = find_zone_range(
        reference,
        &zone.chain1,
        zone.start1,
        zone.startinsert1,
        zone.stop1,
        zone.stopinsert1,
        zone.mode,
    )
    .ok_or_else(|| FitError::Reference(format!("reference structure zone not found: {}", zone)))?;
    let m = find_zone_range(
        mobile,
        &zone.chain2,
        zone.start2,
        zone.startinsert2,
        zone.stop2,
        zone.stopinsert2,
        zone.mode,
    )
    .ok_or_else(|| FitError::Reference(format!("mobile structure zone not found: {}", zone)))?;
    Ok((r, m))
}

struct ResidueKey<'a> {
    chain: &'a str,
    resnum: i32,
    insert: char,
}

fn residue_keys(s: &Structure) -> Vec<ResidueKey<'_>> {
    s.residues()
        .into_iter()
        .map(|r| {
            let a = &s.atoms[r.start];
            ResidueKey {
                chain: &a.chain,
                resnum: a.resnum,
                insert: a.insert,
            }
        })
        .collect()
}

fn seq_position(
    keys: &[ResidueKey<'_>],
    chain: &str,
    resnum: i32,
    insert: char,
    want_start: bool,
) -> Option<i32> {
    if resnum == WHOLE {
        if want_start {
            // First residue of the matching chain
            for (i, k) in keys.iter().enumerate() {
                if chain_matches(chain, k.chain) {
                    return Some(i as i32 + 1);
                }
            }
            return None;
        }
        // Last residue of the matching chain
        let mut last = None;
        for (i, k) in keys.iter().enumerate() {
            if chain_matches(chain, k.chain) {
                last = Some(i as i32 + 1);
            }
        }
        return last;
    }
    for (i, k) in keys.iter().enumerate() {
        if chain_matches(chain, k.chain) && k.resnum == resnum && k.insert == insert {
            return Some(i as i32 + 1);
        }
    }
    None
}

/// Convert a RESNUM zone to SEQUENTIAL by counting residue boundaries.
pub fn residue_to_sequential(
    zone: &Zone,
    reference: &Structure,
    mobile: &Structure,
) -> Result<Zone> {
    if zone.mode == ZoneMode::Sequential {
        return Ok(zone.clone());
    }
    let rkeys = residue_keys(reference);
    let mkeys = residue_keys(mobile);

    let start1 = seq_position(&rkeys, &zone.chain1, zone.start1, zone.startinsert1, true);
    let stop1 = seq_position(&rkeys, &zone.chain1, zone.stop1, zone.stopinsert1, false);
    let start2 = seq_position(&mkeys, &zone.chain2, zone.start2, zone.startinsert2, true);
    let stop2 = seq_position(&mkeys, &zone.chain2, zone.stop2, zone.stopinsert2, false);

    match (start1, stop1, start2, stop2) {
        (Some(s1), Some(p1), Some(s2), Some(p2)) => Ok(Zone::sequential(s1, p1, s2, p2)),
        _ => Err(FitError::Reference(format!("zone not found: {}", zone))),
    }
}

/// Convert a SEQUENTIAL zone back to RESNUM form. The result fragments at
/// chain boundaries, so a zone spanning a chain break becomes several
/// zones whose residue union is unchanged.
pub fn sequential_to_residue(
    zone: &Zone,
    reference: &Structure,
    mobile: &Structure,
) -> Result<Vec<Zone>> {
    if zone.mode == ZoneMode::Resnum {
        return Ok(vec![zone.clone()]);
    }
    let rkeys = residue_keys(reference);
    let mkeys = residue_keys(mobile);

    let ref_start = if zone.start1 == WHOLE {
        1usize
    } else {
        zone.start1.max(0) as usize
    };
    let ref_stop = if zone.stop1 == WHOLE {
        rkeys.len()
    } else {
        zone.stop1.max(0) as usize
    };
    let mob_start = if zone.start2 == WHOLE {
        1usize
    } else {
        zone.start2.max(0) as usize
    };
    let mob_stop = if zone.stop2 == WHOLE {
        mkeys.len()
    } else {
        zone.stop2.max(0) as usize
    };

    if ref_start == 0 || ref_start > ref_stop || ref_stop > rkeys.len() {
        return Err(FitError::Reference(format!(
            "reference start residue not found: {}",
            zone
        )));
    }
    if mob_start == 0 || mob_start > mob_stop || mob_stop > mkeys.len() {
        return Err(FitError::Reference(format!(
            "mobile start residue not found: {}",
            zone
        )));
    }
    if ref_stop + mob_start != mob_stop + ref_start {
        return Err(FitError::Mismatch(format!(
            "number of residues in zone does not match: {} (reference {}, mobile {})",
            zone,
            ref_stop + 1 - ref_start,
            mob_stop + 1 - mob_start
        )));
    }

    let mut out: Vec<Zone> = Vec::new();
    for offset in 0..=(ref_stop - ref_start) {
        let rk = &rkeys[ref_start - 1 + offset];
        let mk = &mkeys[mob_start - 1 + offset];
        let extend = match out.last() {
            Some(last) => last.chain1 == rk.chain && last.chain2 == mk.chain,
            None => false,
        };
        if extend {
            let last = out.last_mut().unwrap();
            last.stop1 = rk.resnum;
            last.stopinsert1 = rk.insert;
            last.stop2 = mk.resnum;
            last.stopinsert2 = mk.insert;
        } else {
            out.push(Zone {
                chain1: rk.chain.to_string(),
                start1: rk.resnum,
                startinsert1: rk.insert,
                stop1: rk.resnum,
                stopinsert1: rk.insert,
                chain2: mk.chain.to_string(),
                start2: mk.resnum,
                startinsert2: mk.insert,
                stop2: mk.resnum,
                stopinsert2: mk.insert,
                mode: ZoneMode::Resnum,
            });
        }
    }
    Ok(out)
}

/// Convert every zone in a list to the requested mode. Zones that cannot
/// be converted are left unchanged; the failure count is returned so the
/// caller can abort.
pub fn convert_zone_list(
    zones: &mut Vec<Zone>,
    reference: &Structure,
    mobile: &Structure,
    mode: ZoneMode,
) -> usize {
    let mut failures = 0;
    let mut out: Vec<Zone> = Vec::with_capacity(zones.len());
    for zone in zones.iter() {
        if zone.mode == mode {
            out.push(zone.clone());
            continue;
        }
        match mode {
            ZoneMode::Sequential => match residue_to_sequential(zone, reference, mobile) {
                Ok(z) => out.push(z),
                Err(_) => {
                    failures += 1;
                    out.push(zone.clone());
                }
            },
            ZoneMode::Resnum => match sequential_to_residue(zone, reference, mobile) {
                Ok(mut zs) => out.append(&mut zs),
                Err(_) => {
                    failures += 1;
                    out.push(zone.clone());
                }
            },
        }
    }
    *zones = out;
    failures
}

/// Sort SEQUENTIAL zones by reference start; unconverted RESNUM zones
/// keep their relative order at the tail.
pub fn sort_zone_list(zones: &mut Vec<Zone>) {
    let mut seq: Vec<Zone> = Vec::new();
    let mut tail: Vec<Zone> = Vec::new();
    for z in zones.drain(..) {
        match z.mode {
            ZoneMode::Sequential => seq.push(z),
            ZoneMode::Resnum => tail.push(z),
        }
    }
    seq.sort_by_key(|z| z.start1);
    seq.append(&mut tail);
    *zones = seq;
}

/// Fuse adjacent SEQUENTIAL zones whose ranges advance by exactly one on
/// both structures, repeating until a fixed point.
pub fn merge_zones(zones: &mut Vec<Zone>) {
    loop {
        let mut merged = false;
        let mut i = 0;
        while i + 1 < zones.len() {
            let fuse = zones[i].mode == ZoneMode::Sequential
                && zones[i + 1].mode == ZoneMode::Sequential
                && zones[i + 1].start1 == zones[i].stop1 + 1
                && zones[i + 1].start2 == zones[i].stop2 + 1;
            if fuse {
                zones[i].stop1 = zones[i + 1].stop1;
                zones[i].stop2 = zones[i + 1].stop2;
                zones.remove(i + 1);
                merged = true;
            } else {
                i += 1;
            }
        }
        if !merged {
            break;
        }
    }
}

fn ranges_overlap(a_start: i32, a_stop: i32, b_start: i32, b_stop: i32) -> bool {
    (a_start <= b_start && a_stop >= b_start) || (b_start <= a_start && b_stop >= a_start)
}

/// Count zones in `list` whose sequential range overlaps `test` on either
/// structure. Both the test zone and the list entries are converted to
/// SEQUENTIAL for comparison; `None` when the test zone cannot be
/// converted.
pub fn count_overlaps(
    test: &Zone,
    list: &[Zone],
    reference: &Structure,
    mobile: &Structure,
) -> Option<usize> {
    let za = residue_to_sequential(test, reference, mobile).ok()?;
    let mut overlap = 0;
    for zc in list {
        let zb = match residue_to_sequential(zc, reference, mobile) {
            Ok(z) => z,
            Err(_) => continue,
        };
        if ranges_overlap(za.start1, za.stop1, zb.start1, zb.stop1)
            || ranges_overlap(za.start2, za.stop2, zb.start2, zb.stop2)
        {
            overlap += 1;
        }
    }
    Some(overlap)
}

/// Reference-side intersection of two SEQUENTIAL zone lists. Only the
/// structure-1 ranges of the output are meaningful.
pub fn overlapping_zones(a: &[Zone], b: &[Zone]) -> Vec<Zone> {
    let mut out = Vec::new();
    for za in a {
        for zb in b {
            if za.mode != ZoneMode::Sequential || zb.mode != ZoneMode::Sequential {
                continue;
            }
            if ranges_overlap(za.start1, za.stop1, zb.start1, zb.stop1) {
                let start = za.start1.max(zb.start1);
                let stop = za.stop1.min(zb.stop1);
                out.push(Zone::sequential(start, stop, 0, 0));
            }
        }
    }
    out
}

/// Trim a mobile zone list to the reference ranges in `overlap`,
/// offsetting the mobile residues to keep the correspondence.
pub fn renumber_zones(input: &[Zone], overlap: &[Zone]) -> Vec<Zone> {
    let mut out = Vec::new();
    for zi in input {
        for zo in overlap {
            if zi.mode != ZoneMode::Sequential || zo.mode != ZoneMode::Sequential {
                continue;
            }
            if ranges_overlap(zi.start1, zi.stop1, zo.start1, zo.stop1) {
                out.push(Zone::sequential(
                    zo.start1,
                    zo.stop1,
                    zi.start2 + (zo.start1 - zi.start1),
                    zi.stop2 - (zi.stop1 - zo.stop1),
                ));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::testutil::structure;

    fn two_chain_structure() -> Structure {
        structure(&[
            ("A", 10, ' ', "GLY", &[(" N  ", 0., 0., 0.), (" CA ", 1., 0., 0.)]),
            ("A", 11, ' ', "ALA", &[(" CA ", 2., 0., 0.)]),
            ("A", 12, ' ', "SER", &[(" CA ", 3., 0., 0.)]),
            ("B", 1, ' ', "TYR", &[(" CA ", 4., 0., 0.)]),
            ("B", 2, ' ', "TRP", &[(" CA ", 5., 0., 0.)]),
        ])
    }

    #[test]
    fn parse_res_spec_forms() {
        assert_eq!(parse_res_spec("A10").unwrap(), ("A".to_string(), 10, ' '));
        assert_eq!(parse_res_spec("10").unwrap(), (String::new(), 10, ' '));
        assert_eq!(parse_res_spec("A.10B").unwrap(), ("A".to_string(), 10, 'B'));
        assert_eq!(parse_res_spec("1.100").unwrap(), ("1".to_string(), 100, ' '));
        assert_eq!(
            parse_res_spec("L\\-5").unwrap(),
            ("L".to_string(), -5, ' ')
        );
        assert_eq!(parse_res_spec("").unwrap(), (String::new(), WHOLE, ' '));
        assert!(parse_res_spec("A.").is_err());
    }

    #[test]
    fn parse_zone_two_sided() {
        let z = parse_zone("A.10-A.20:B.5-B.15", None, None, false, ZoneMode::Resnum).unwrap();
        assert_eq!(z.chain1, "A");
        assert_eq!(z.start1, 10);
        assert_eq!(z.stop1, 20);
        assert_eq!(z.chain2, "B");
        assert_eq!(z.start2, 5);
        assert_eq!(z.stop2, 15);
        assert_eq!(z.mode, ZoneMode::Resnum);
    }

    #[test]
    fn parse_zone_rejected_in_multi() {
        let err = parse_zone("A.10-A.20:B.5-B.15", None, None, true, ZoneMode::Resnum);
        assert!(err.is_err());
    }

    #[test]
    fn parse_zone_symmetric_and_whole() {
        let z = parse_zone("10-20", None, None, false, ZoneMode::Resnum).unwrap();
        assert_eq!((z.start1, z.stop1, z.start2, z.stop2), (10, 20, 10, 20));

        let z = parse_zone("*", None, None, false, ZoneMode::Resnum).unwrap();
        assert_eq!((z.start1, z.stop1), (WHOLE, WHOLE));
        assert!(z.chain1.is_empty());

        let z = parse_zone("A*", None, None, false, ZoneMode::Resnum).unwrap();
        assert_eq!(z.chain1, "A");
        assert_eq!((z.start1, z.stop1), (WHOLE, WHOLE));
    }

    #[test]
    fn parse_zone_sequence_fragment() {
        let z = parse_zone(
            "GAS",
            Some("GASTYW"),
            Some("WGASTY"),
            false,
            ZoneMode::Resnum,
        )
        .unwrap();
        assert_eq!(z.mode, ZoneMode::Sequential);
        assert_eq!((z.start1, z.stop1), (1, 3));
        assert_eq!((z.start2, z.stop2), (2, 4));
    }

    #[test]
    fn find_seq_length_and_occurrence() {
        assert_eq!(find_seq("AB", "ABCABC"), Some((1, 2)));
        assert_eq!(find_seq("AB/2", "ABCABC"), Some((4, 5)));
        assert_eq!(find_seq("AB,3", "ABCABC"), Some((1, 3)));
        assert_eq!(find_seq("ZZ", "ABCABC"), None);
    }

    #[test]
    fn find_zone_range_resnum() {
        let s = two_chain_structure();
        let (from, to) = find_zone_range(&s, "A", 11, ' ', 12, ' ', ZoneMode::Resnum).unwrap();
        assert_eq!((from, to), (2, 4));

        // Whole chain B
        let (from, to) = find_zone_range(&s, "B", WHOLE, ' ', WHOLE, ' ', ZoneMode::Resnum).unwrap();
        assert_eq!((from, to), (4, 6));

        // Stop at the end of chain A
        let (from, to) = find_zone_range(&s, "A", 12, ' ', 12, ' ', ZoneMode::Resnum).unwrap();
        assert_eq!((from, to), (3, 4));

        assert!(find_zone_range(&s, "A", 99, ' ', 99, ' ', ZoneMode::Resnum).is_none());
    }

    #[test]
    fn find_zone_range_sequential_crosses_chains() {
        let s = two_chain_structure();
        let (from, to) = find_zone_range(&s, "", 2, ' ', 4, ' ', ZoneMode::Sequential).unwrap();
        // Residues 2..4 are A11, A12 and B1
        assert_eq!((from, to), (2, 5));
    }

    #[test]
    fn numbering_round_trip_without_break_is_identity() {
        let s = two_chain_structure();
        let zone = parse_zone("A.10-A.12", None, None, false, ZoneMode::Resnum).unwrap();
        let seq = residue_to_sequential(&zone, &s, &s).unwrap();
        assert_eq!((seq.start1, seq.stop1), (1, 3));
        let back = sequential_to_residue(&seq, &s, &s).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].chain1, "A");
        assert_eq!((back[0].start1, back[0].stop1), (10, 12));
        assert_eq!(back[0].mode, ZoneMode::Resnum);
    }

    #[test]
    fn numbering_round_trip_fragments_at_chain_break() {
        let s = two_chain_structure();
        // Sequential 2..5 covers A11,A12,B1,B2
        let zone = Zone::sequential(2, 5, 2, 5);
        let back = sequential_to_residue(&zone, &s, &s).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!((back[0].chain1.as_str(), back[0].start1, back[0].stop1), ("A", 11, 12));
        assert_eq!((back[1].chain1.as_str(), back[1].start1, back[1].stop1), ("B", 1, 2));
    }

    #[test]
    fn merge_fuses_contiguous_zones() {
        let mut zones = vec![
            Zone::sequential(1, 3, 1, 3),
            Zone::sequential(4, 4, 4, 4),
            Zone::sequential(5, 7, 5, 7),
        ];
        merge_zones(&mut zones);
        assert_eq!(zones, vec![Zone::sequential(1, 7, 1, 7)]);
    }

    #[test]
    fn merge_is_idempotent_and_offset_aware() {
        let mut zones = vec![Zone::sequential(1, 3, 2, 4), Zone::sequential(5, 6, 5, 6)];
        merge_zones(&mut zones);
        let snapshot = zones.clone();
        merge_zones(&mut zones);
        assert_eq!(zones, snapshot);
        assert_eq!(zones.len(), 2);
    }

    #[test]
    fn sort_is_stable_and_keeps_resnum_at_tail() {
        let mut resnum_zone = Zone::whole(ZoneMode::Resnum);
        resnum_zone.start1 = 1;
        resnum_zone.stop1 = 2;
        let mut zones = vec![
            Zone::sequential(5, 6, 5, 6),
            resnum_zone.clone(),
            Zone::sequential(1, 2, 1, 2),
        ];
        sort_zone_list(&mut zones);
        assert_eq!(zones[0], Zone::sequential(1, 2, 1, 2));
        assert_eq!(zones[1], Zone::sequential(5, 6, 5, 6));
        assert_eq!(zones[2], resnum_zone);

        let snapshot = zones.clone();
        sort_zone_list(&mut zones);
        assert_eq!(zones, snapshot);
    }

    #[test]
    fn overlap_counting() {
        let s = two_chain_structure();
        let z1 = Zone::sequential(1, 3, 1, 3);
        let z2 = Zone::sequential(3, 5, 3, 5);
        let z3 = Zone::sequential(4, 5, 4, 5);
        assert_eq!(count_overlaps(&z1, &[z2.clone()], &s, &s), Some(1));
        assert_eq!(count_overlaps(&z1, &[z3.clone()], &s, &s), Some(0));
        assert_eq!(count_overlaps(&z1, &[z1.clone(), z3], &s, &s), Some(1));
    }

    #[test]
    fn trim_intersection_and_renumber() {
        // Mobile a covers reference 1..10, mobile b covers 3..8
        let a = vec![Zone::sequential(1, 10, 1, 10)];
        let b = vec![Zone::sequential(3, 8, 1, 6)];
        let common = overlapping_zones(&a, &b);
        assert_eq!(common.len(), 1);
        assert_eq!((common[0].start1, common[0].stop1), (3, 8));

        let ra = renumber_zones(&a, &common);
        assert_eq!(ra, vec![Zone::sequential(3, 8, 3, 8)]);
        let rb = renumber_zones(&b, &common);
        assert_eq!(rb, vec![Zone::sequential(3, 8, 1, 6)]);
    }

    #[test]
    fn zone_display() {
        let z = parse_zone("A.10-A.20:B.5-B.15", None, None, false, ZoneMode::Resnum).unwrap();
        assert_eq!(
            format!("{}", z),
            format!("{:<16} with {:<16} (Residue numbering)", "A10-A20", "B5-B15")
        );
    }
}
