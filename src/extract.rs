use log::warn;

use crate::atoms::Structure;
use crate::error::{FitError, Result};
use crate::fitting::centroid;
use crate::zones::{find_zone_pair, Zone};

/// Maximum number of atom-name tokens in a selector.
const MAX_ATOM_SPECS: usize = 50;
/// Maximum length of a single atom spec.
const MAX_ATOM_SPEC_LEN: usize = 8;

/// B-value gating policy. A negative threshold inverts the comparison,
/// keeping atoms whose B-value magnitude is above the cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BValGate {
    Off,
    Both,
    RefOnly,
    MobOnly,
}

/// An atom-name selector: a list of specs matched against raw atom
/// names. `*` matches everything, `?` or `%` match one character, a
/// trailing `*` matches the rest, `\*` is a literal star and a leading
/// `~` or `^` on the selector inverts it.
#[derive(Debug, Clone)]
pub struct AtomSelector {
    specs: Vec<String>,
    negate: bool,
}

impl Default for AtomSelector {
    fn default() -> Self {
        AtomSelector {
            specs: vec!["*".to_string()],
            negate: false,
        }
    }
}

impl AtomSelector {
    /// Parse a comma- or whitespace-separated list of atom specs.
    pub fn parse(text: &str) -> Result<AtomSelector> {
        let mut text = text.trim();
        let mut negate = false;
        if text.starts_with('~') || text.starts_with('^') {
            negate = true;
            text = text[1..].trim_start();
        }

        let mut specs = Vec::new();
        for token in text.split(|c: char| c == ',' || c.is_whitespace()) {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            if token.len() > MAX_ATOM_SPEC_LEN {
                return Err(FitError::Capacity(format!(
                    "atom spec too long: {}",
                    token
                )));
            }
            legal_atom_spec(token)?;
            specs.push(token.to_uppercase());
        }
        if specs.is_empty() {
            return Err(FitError::Parse("no atom names given".to_string()));
        }
        if specs.len() > MAX_ATOM_SPECS {
            return Err(FitError::Capacity(format!(
                "too many atom specs ({}, maximum {})",
                specs.len(),
                MAX_ATOM_SPECS
            )));
        }
        Ok(AtomSelector { specs, negate })
    }

    pub fn is_all(&self) -> bool {
        !self.negate && self.specs.first().map(String::as_str) == Some("*")
    }

    pub fn negated(&self) -> bool {
        self.negate
    }

    pub fn specs(&self) -> &[String] {
        &self.specs
    }

    /// Test a raw atom name against the selector.
    pub fn matches_raw(&self, raw: &str) -> bool {
        if self.specs.first().map(String::as_str) == Some("*") {
            return true;
        }
        for spec in &self.specs {
            if atom_name_raw_match(raw, spec) {
                return !self.negate;
            }
        }
        self.negate
    }
}

fn legal_atom_spec(spec: &str) -> Result<()> {
    let chars: Vec<char> = spec.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '*' => {
                if i + 1 < chars.len() {
                    return Err(FitError::Parse(format!(
                        "error in atom wildcard: {}",
                        spec
                    )));
                }
            }
            _ => {}
        }
        i += 1;
    }
    Ok(())
}

/// Match an atom name against a spec. `?` and `%` match one character,
/// `*` matches any trailing characters, backslash escapes.
fn atom_name_match(atnam: &str, spec: &str) -> bool {
    let name: Vec<char> = atnam.chars().collect();
    let pattern: Vec<char> = spec.chars().collect();
    let mut si = 0;
    let mut ai = 0;

    while si < pattern.len() {
        let mut pc = pattern[si];
        match pc {
            '\\' => {
                si += 1;
                if si >= pattern.len() {
                    break;
                }
                pc = pattern[si];
            }
            '?' | '%' => {
                if ai >= name.len() {
                    return false;
                }
                si += 1;
                ai += 1;
                continue;
            }
            '*' => return true,
            _ => {}
        }

        let ac = name.get(ai).copied().unwrap_or(' ');
        if pc != ac {
            return false;
        }
        if pc == ' ' {
            return true;
        }
        si += 1;
        ai += 1;
    }

    // Spec exhausted: the name must also have ended
    match name.get(ai) {
        None => true,
        Some(' ') => true,
        Some(_) => false,
    }
}

/// Raw-name variant: specs normally match from the second column of the
/// raw name (so `CA` means C-alpha, not calcium); a leading `<` anchors
/// the spec at the first column.
pub fn atom_name_raw_match(raw: &str, spec: &str) -> bool {
    if let Some(stripped) = spec.strip_prefix('<') {
        atom_name_match(raw, stripped)
    } else {
        let from_second: String = raw.chars().skip(1).collect();
        atom_name_match(&from_second, spec)
    }
}

/// One interchangeable atom pair within a residue type.
#[derive(Debug, Clone)]
pub struct SymPair {
    pub resnam: &'static str,
    pub atom_a: &'static str,
    pub atom_b: &'static str,
    pub enabled: bool,
}

/// The symmetric-atom table: charged and aromatic pairs are matched by
/// default; amide N/O and prochiral methyls are off until requested.
pub fn default_symmetric_pairs() -> Vec<SymPair> {
    vec![
        SymPair { resnam: "ARG ", atom_a: " NH1", atom_b: " NH2", enabled: true },
        SymPair { resnam: "ASP ", atom_a: " OD1", atom_b: " OD2", enabled: true },
        SymPair { resnam: "GLU ", atom_a: " OE1", atom_b: " OE2", enabled: true },
        SymPair { resnam: "PHE ", atom_a: " CD1", atom_b: " CD2", enabled: true },
        SymPair { resnam: "PHE ", atom_a: " CE1", atom_b: " CE2", enabled: true },
        SymPair { resnam: "TYR ", atom_a: " CD1", atom_b: " CD2", enabled: true },
        SymPair { resnam: "TYR ", atom_a: " CE1", atom_b: " CE2", enabled: true },
        SymPair { resnam: "ASN ", atom_a: " OD1", atom_b: " ND2", enabled: false },
        SymPair { resnam: "GLN ", atom_a: " OE1", atom_b: " NE2", enabled: false },
        SymPair { resnam: "VAL ", atom_a: " CG1", atom_b: " CG2", enabled: false },
        SymPair { resnam: "LEU ", atom_a: " CD1", atom_b: " CD2", enabled: false },
    ]
}

/// An equivalenced atom pair, as indices into the two structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchedPair {
    pub ref_i: usize,
    pub mob_i: usize,
}

fn bval_passes(bval: f64, threshold: f64) -> bool {
    if threshold >= 0.0 {
        bval <= threshold
    } else {
        -bval <= threshold
    }
}

/// Walk a zone list over two structures and produce the equivalenced
/// atom pairs: residues are paired positionally within each zone, atoms
/// are matched by raw name within each residue pair, undefined positions
/// are dropped, B-value gates applied, and configured symmetric pairs
/// swapped when the swapped arrangement is closer.
pub fn match_zone_atoms(
    reference: &Structure,
    mobile: &Structure,
    zones: &[Zone],
    selector: &AtomSelector,
    gate: BValGate,
    bvalue: f64,
    ignore_missing: bool,
    sym_pairs: Option<&[SymPair]>,
) -> Result<Vec<MatchedPair>> {
    let mut pairs: Vec<MatchedPair> = Vec::new();

    for zone in zones {
        let ((ref_from, ref_to), (mob_from, mob_to)) = find_zone_pair(zone, reference, mobile)?;

        let ref_res: Vec<std::ops::Range<usize>> = residues_in(reference, ref_from, ref_to);
        let mob_res: Vec<std::ops::Range<usize>> = residues_in(mobile, mob_from, mob_to);

        if ref_res.len() != mob_res.len() {
            return Err(FitError::Mismatch(format!(
                "number of residues in zone does not match: {} (reference {}, mobile {})",
                zone,
                ref_res.len(),
                mob_res.len()
            )));
        }

        for (rr, mr) in ref_res.iter().zip(mob_res.iter()) {
            let mut ri = rr.start;
            while ri < rr.end {
                let r = &reference.atoms[ri];
                if !selector.matches_raw(&r.atnam_raw) {
                    ri += 1;
                    continue;
                }
                if r.is_undefined() {
                    warn!(
                        "undefined atom in reference set ignored: {} {} {}",
                        r.resnam.trim(),
                        r.res_id(),
                        r.atnam_raw
                    );
                    ri += 1;
                    continue;
                }
                if matches!(gate, BValGate::Both | BValGate::RefOnly)
                    && !bval_passes(r.bval, bvalue)
                {
                    ri += 1;
                    continue;
                }

                // Search the mobile residue for the same raw atom name
                let mut found = false;
                let mut matched: Option<usize> = None;
                for mi in mr.clone() {
                    let m = &mobile.atoms[mi];
                    if m.atnam_raw != r.atnam_raw {
                        continue;
                    }
                    found = true;
                    if m.is_undefined() {
                        warn!(
                            "undefined atom in mobile set ignored: {} {} {}",
                            m.resnam.trim(),
                            m.res_id(),
                            m.atnam_raw
                        );
                        continue;
                    }
                    if matches!(gate, BValGate::Both | BValGate::MobOnly)
                        && !bval_passes(m.bval, bvalue)
                    {
                        continue;
                    }
                    matched = Some(mi);
                    break;
                }

                if let Some(mi) = matched {
                    // Symmetric-atom pairing: when this atom and the next
                    // form a configured pair on both sides, keep the
                    // arrangement with the smaller summed square distance
                    let mut swapped = false;
                    if let Some(table) = sym_pairs {
                        if ri + 1 < rr.end && mi + 1 < mr.end {
                            let rn = &reference.atoms[ri + 1];
                            let mn = &mobile.atoms[mi + 1];
                            let m = &mobile.atoms[mi];
                            for pair in table.iter().filter(|p| p.enabled) {
                                if pair.resnam == r.resnam
                                    && pair.atom_a == r.atnam_raw
                                    && pair.atom_b == rn.atnam_raw
                                    && pair.resnam == m.resnam
                                    && pair.atom_a == m.atnam_raw
                                    && pair.atom_b == mn.atnam_raw
                                {
                                    let unswapped = r.dist_sq(m) + rn.dist_sq(mn);
                                    let crossed = r.dist_sq(mn) + rn.dist_sq(m);
                                    if unswapped > crossed {
                                        pairs.push(MatchedPair {
                                            ref_i: ri,
                                            mob_i: mi + 1,
                                        });
                                        pairs.push(MatchedPair {
                                            ref_i: ri + 1,
                                            mob_i: mi,
                                        });
                                        swapped = true;
                                    }
                                    break;
                                }
                            }
                        }
                    }
                    if swapped {
                        ri += 2;
                        continue;
                    }
                    pairs.push(MatchedPair {
                        ref_i: ri,
                        mob_i: mi,
                    });
                } else if found {
                    // Name present but every copy undefined or gated
                } else if ignore_missing {
                    warn!(
                        "ignored reference atom {} not found in mobile ({} {})",
                        r.atnam_raw,
                        r.resnam.trim(),
                        r.res_id()
                    );
                } else {
                    return Err(FitError::Mismatch(format!(
                        "atoms do not match in residue {} {}: unable to find reference atom {} in mobile",
                        r.resnam.trim(),
                        r.res_id(),
                        r.atnam_raw
                    )));
                }
                ri += 1;
            }
        }
    }

    Ok(pairs)
}

fn residues_in(s: &Structure, from: usize, to: usize) -> Vec<std::ops::Range<usize>> {
    let mut out = Vec::new();
    let mut start = from;
    for i in (from + 1)..to {
        if !s.atoms[i].same_residue(&s.atoms[start]) {
            out.push(start..i);
            start = i;
        }
    }
    if from < to {
        out.push(start..to);
    }
    out
}

/// The parallel coordinate arrays handed to the superposer, already
/// centred on their centroids.
#[derive(Debug, Clone)]
pub struct FitArrays {
    pub ref_coords: Vec<[f64; 3]>,
    pub mob_coords: Vec<[f64; 3]>,
    pub weights: Vec<f64>,
    pub ref_centroid: [f64; 3],
    pub mob_centroid: [f64; 3],
}

impl FitArrays {
    pub fn len(&self) -> usize {
        self.ref_coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ref_coords.is_empty()
    }
}

/// Build the coordinate arrays for a fit. The stored weight of each pair
/// is the mean of the two B-values regardless of weighting mode; the
/// caller decides whether and how to use it. If centre-of-rotation zones
/// are given, the two centroids are recomputed from the atoms those
/// zones select, overriding the fit-zone centroids.
pub fn create_fit_arrays(
    reference: &Structure,
    mobile: &Structure,
    zones: &[Zone],
    selector: &AtomSelector,
    gate: BValGate,
    bvalue: f64,
    ignore_missing: bool,
    sym_pairs: Option<&[SymPair]>,
    centre_zones: Option<&[Zone]>,
) -> Result<FitArrays> {
    let pairs = match_zone_atoms(
        reference,
        mobile,
        zones,
        selector,
        gate,
        bvalue,
        ignore_missing,
        sym_pairs,
    )?;

    if pairs.is_empty() {
        return Err(FitError::Degenerate(
            "no atoms in specified zones".to_string(),
        ));
    }

    let mut ref_coords: Vec<[f64; 3]> = Vec::with_capacity(pairs.len());
    let mut mob_coords: Vec<[f64; 3]> = Vec::with_capacity(pairs.len());
    let mut weights: Vec<f64> = Vec::with_capacity(pairs.len());
    for pair in &pairs {
        let r = &reference.atoms[pair.ref_i];
        let m = &mobile.atoms[pair.mob_i];
        ref_coords.push(r.xyz());
        mob_coords.push(m.xyz());
        weights.push((r.bval + m.bval) / 2.0);
    }

    let (ref_centroid, mob_centroid) = match centre_zones {
        None => (centroid(&ref_coords), centroid(&mob_coords)),
        Some(czones) => {
            let cpairs = match_zone_atoms(
                reference,
                mobile,
                czones,
                selector,
                gate,
                bvalue,
                ignore_missing,
                sym_pairs,
            )?;
            if cpairs.is_empty() {
                return Err(FitError::Degenerate(
                    "no centre residues matched".to_string(),
                ));
            }
            let rc: Vec<[f64; 3]> = cpairs
                .iter()
                .map(|p| reference.atoms[p.ref_i].xyz())
                .collect();
            let mc: Vec<[f64; 3]> = cpairs
                .iter()
                .map(|p| mobile.atoms[p.mob_i].xyz())
                .collect();
            (centroid(&rc), centroid(&mc))
        }
    };

    for p in &mut ref_coords {
        p[0] -= ref_centroid[0];
        p[1] -= ref_centroid[1];
        p[2] -= ref_centroid[2];
    }
    for p in &mut mob_coords {
        p[0] -= mob_centroid[0];
        p[1] -= mob_centroid[1];
        p[2] -= mob_centroid[2];
    }

    Ok(FitArrays {
        ref_coords,
        mob_coords,
        weights,
        ref_centroid,
        mob_centroid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::testutil::structure;
    use crate::zones::ZoneMode;

    #[test]
    fn selector_distinguishes_calcium_from_c_alpha() {
        let sel = AtomSelector::parse("CA").unwrap();
        assert!(sel.matches_raw(" CA "));
        assert!(!sel.matches_raw("CA  "));

        let anchored = AtomSelector::parse("<CA").unwrap();
        assert!(anchored.matches_raw("CA  "));
        assert!(!anchored.matches_raw(" CA "));
    }

    #[test]
    fn selector_wildcards() {
        let all = AtomSelector::parse("*").unwrap();
        assert!(all.matches_raw(" CA "));
        assert!(all.is_all());

        let carbons = AtomSelector::parse("C*").unwrap();
        assert!(carbons.matches_raw(" CA "));
        assert!(carbons.matches_raw(" CB "));
        assert!(!carbons.matches_raw(" N  "));

        let beta = AtomSelector::parse("?B*").unwrap();
        assert!(beta.matches_raw(" CB "));
        assert!(beta.matches_raw(" OB1"));
        assert!(!beta.matches_raw(" CA "));

        let single = AtomSelector::parse("C%").unwrap();
        assert!(single.matches_raw(" CA "));
        assert!(!single.matches_raw(" CD1"));

        assert!(AtomSelector::parse("*B*").is_err());
        assert!(AtomSelector::parse("C*2").is_err());
    }

    #[test]
    fn selector_negation() {
        let not_backbone = AtomSelector::parse("~N,CA,C,O").unwrap();
        assert!(not_backbone.negated());
        assert!(!not_backbone.matches_raw(" CA "));
        assert!(not_backbone.matches_raw(" CB "));
    }

    #[test]
    fn selector_multiple_names() {
        let sel = AtomSelector::parse("N,CA,C,O").unwrap();
        assert!(sel.matches_raw(" N  "));
        assert!(sel.matches_raw(" CA "));
        assert!(sel.matches_raw(" C  "));
        assert!(sel.matches_raw(" O  "));
        assert!(!sel.matches_raw(" CB "));
    }

    fn simple_pair() -> (Structure, Structure) {
        let reference = structure(&[
            (
                "A",
                1,
                ' ',
                "GLY",
                &[(" N  ", 0., 0., 0.), (" CA ", 1., 0., 0.), (" C  ", 2., 0., 0.)],
            ),
            ("A", 2, ' ', "ALA", &[(" CA ", 3., 0., 0.)]),
        ]);
        let mobile = structure(&[
            (
                "A",
                10,
                ' ',
                "GLY",
                &[(" N  ", 0., 1., 0.), (" CA ", 1., 1., 0.), (" C  ", 2., 1., 0.)],
            ),
            ("A", 11, ' ', "ALA", &[(" CA ", 3., 1., 0.)]),
        ]);
        (reference, mobile)
    }

    #[test]
    fn pairs_match_by_raw_name_across_numbering() {
        let (reference, mobile) = simple_pair();
        let zones = [Zone::whole(ZoneMode::Resnum)];
        let sel = AtomSelector::default();
        let pairs = match_zone_atoms(
            &reference, &mobile, &zones, &sel, BValGate::Off, 10000.0, false, None,
        )
        .unwrap();
        assert_eq!(pairs.len(), 4);
        assert_eq!(pairs[0], MatchedPair { ref_i: 0, mob_i: 0 });
        assert_eq!(pairs[3], MatchedPair { ref_i: 3, mob_i: 3 });
    }

    #[test]
    fn missing_atom_is_an_error_unless_ignored() {
        let (reference, _) = simple_pair();
        let mobile = structure(&[
            ("A", 10, ' ', "GLY", &[(" N  ", 0., 1., 0.), (" C  ", 2., 1., 0.)]),
            ("A", 11, ' ', "ALA", &[(" CA ", 3., 1., 0.)]),
        ]);
        let zones = [Zone::whole(ZoneMode::Resnum)];
        let sel = AtomSelector::default();

        let err = match_zone_atoms(
            &reference, &mobile, &zones, &sel, BValGate::Off, 10000.0, false, None,
        );
        assert!(matches!(err, Err(FitError::Mismatch(_))));

        let pairs = match_zone_atoms(
            &reference, &mobile, &zones, &sel, BValGate::Off, 10000.0, true, None,
        )
        .unwrap();
        assert_eq!(pairs.len(), 3);
    }

    #[test]
    fn residue_count_mismatch_is_an_error() {
        let (reference, _) = simple_pair();
        let mobile = structure(&[("A", 10, ' ', "GLY", &[(" CA ", 1., 1., 0.)])]);
        let zones = [Zone::whole(ZoneMode::Resnum)];
        let sel = AtomSelector::default();
        let err = match_zone_atoms(
            &reference, &mobile, &zones, &sel, BValGate::Off, 10000.0, false, None,
        );
        assert!(matches!(err, Err(FitError::Mismatch(_))));
    }

    #[test]
    fn bvalue_gate_filters_pairs() {
        let (mut reference, mobile) = simple_pair();
        reference.atoms[1].bval = 80.0;
        let zones = [Zone::whole(ZoneMode::Resnum)];
        let sel = AtomSelector::default();

        let pairs = match_zone_atoms(
            &reference, &mobile, &zones, &sel, BValGate::RefOnly, 50.0, false, None,
        )
        .unwrap();
        assert_eq!(pairs.len(), 3);

        // Negative threshold inverts: keep only high-B atoms
        let pairs = match_zone_atoms(
            &reference, &mobile, &zones, &sel, BValGate::RefOnly, -50.0, false, None,
        )
        .unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].ref_i, 1);
    }

    #[test]
    fn undefined_positions_are_dropped() {
        let (mut reference, mobile) = simple_pair();
        reference.atoms[0].set_xyz([9999.0, 9999.0, 9999.0]);
        let zones = [Zone::whole(ZoneMode::Resnum)];
        let sel = AtomSelector::default();
        let pairs = match_zone_atoms(
            &reference, &mobile, &zones, &sel, BValGate::Off, 10000.0, false, None,
        )
        .unwrap();
        assert_eq!(pairs.len(), 3);
    }

    fn tyr_pair(swap_mobile_ring: bool) -> (Structure, Structure) {
        let reference = structure(&[(
            "A",
            1,
            ' ',
            "TYR",
            &[
                (" CA ", 0., 0., 0.),
                (" CD1", 1., 1., 0.),
                (" CD2", -1., 1., 0.),
            ],
        )]);
        let (d1, d2) = if swap_mobile_ring {
            ((-1., 1., 0.), (1., 1., 0.))
        } else {
            ((1., 1., 0.), (-1., 1., 0.))
        };
        let mobile = structure(&[(
            "A",
            1,
            ' ',
            "TYR",
            &[
                (" CA ", 0., 0., 0.),
                (" CD1", d1.0, d1.1, d1.2),
                (" CD2", d2.0, d2.1, d2.2),
            ],
        )]);
        (reference, mobile)
    }

    #[test]
    fn symmetric_atoms_swap_when_closer() {
        let (reference, mobile) = tyr_pair(true);
        let zones = [Zone::whole(ZoneMode::Resnum)];
        let sel = AtomSelector::default();
        let table = default_symmetric_pairs();

        let pairs = match_zone_atoms(
            &reference,
            &mobile,
            &zones,
            &sel,
            BValGate::Off,
            10000.0,
            false,
            Some(&table),
        )
        .unwrap();
        // CA pairs directly; CD1/CD2 pair crossed
        assert_eq!(pairs.len(), 3);
        assert!(pairs.contains(&MatchedPair { ref_i: 1, mob_i: 2 }));
        assert!(pairs.contains(&MatchedPair { ref_i: 2, mob_i: 1 }));

        // Without the table the labels pair directly
        let plain = match_zone_atoms(
            &reference, &mobile, &zones, &sel, BValGate::Off, 10000.0, false, None,
        )
        .unwrap();
        assert!(plain.contains(&MatchedPair { ref_i: 1, mob_i: 1 }));
    }

    #[test]
    fn symmetric_atoms_untouched_when_already_aligned() {
        let (reference, mobile) = tyr_pair(false);
        let zones = [Zone::whole(ZoneMode::Resnum)];
        let sel = AtomSelector::default();
        let table = default_symmetric_pairs();
        let pairs = match_zone_atoms(
            &reference,
            &mobile,
            &zones,
            &sel,
            BValGate::Off,
            10000.0,
            false,
            Some(&table),
        )
        .unwrap();
        assert!(pairs.contains(&MatchedPair { ref_i: 1, mob_i: 1 }));
        assert!(pairs.contains(&MatchedPair { ref_i: 2, mob_i: 2 }));
    }

    #[test]
    fn fit_arrays_are_centred_and_weighted() {
        let (reference, mobile) = simple_pair();
        let zones = [Zone::whole(ZoneMode::Resnum)];
        let sel = AtomSelector::default();
        let arrays = create_fit_arrays(
            &reference, &mobile, &zones, &sel, BValGate::Off, 10000.0, false, None, None,
        )
        .unwrap();

        assert_eq!(arrays.len(), 4);
        assert_eq!(arrays.ref_centroid, [1.5, 0.0, 0.0]);
        assert_eq!(arrays.mob_centroid, [1.5, 1.0, 0.0]);
        assert_eq!(arrays.ref_coords[0], [-1.5, 0.0, 0.0]);
        assert_eq!(arrays.mob_coords[0], [-1.5, 0.0, 0.0]);
        // Both test structures carry B = 20
        assert!(arrays.weights.iter().all(|&w| w == 20.0));
    }

    #[test]
    fn centre_zone_overrides_centroids() {
        let (reference, mobile) = simple_pair();
        let zones = [Zone::whole(ZoneMode::Resnum)];
        // Centre on residue A2 / A11 (single CA at x=3)
        let czone = Zone {
            chain1: "A".to_string(),
            start1: 2,
            startinsert1: ' ',
            stop1: 2,
            stopinsert1: ' ',
            chain2: "A".to_string(),
            start2: 11,
            startinsert2: ' ',
            stop2: 11,
            stopinsert2: ' ',
            mode: ZoneMode::Resnum,
        };
        let sel = AtomSelector::default();
        let arrays = create_fit_arrays(
            &reference,
            &mobile,
            &zones,
            &sel,
            BValGate::Off,
            10000.0,
            false,
            None,
            Some(std::slice::from_ref(&czone)),
        )
        .unwrap();
        assert_eq!(arrays.ref_centroid, [3.0, 0.0, 0.0]);
        assert_eq!(arrays.mob_centroid, [3.0, 1.0, 0.0]);
    }
}
