use std::io::Write;

use crate::atoms::Structure;
use crate::error::{FitError, Result};
use crate::extract::{match_zone_atoms, AtomSelector, BValGate, MatchedPair, SymPair};
use crate::zones::Zone;

/// How the reference coordinates are folded towards the mobile during
/// multi-structure averaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// Pairwise arithmetic mean of reference and mobile.
    Arithmetic,
    /// Incremental weighted mean `r <- ((n-1)r + m) / n` over n mobiles.
    Weighted { count: usize },
}

/// Gates and selections shared by every deviation calculation.
#[derive(Debug, Clone, Copy)]
pub struct RmsOptions<'a> {
    pub selector: &'a AtomSelector,
    pub gate: BValGate,
    pub bvalue: f64,
    pub ignore_missing: bool,
    pub sym_pairs: Option<&'a [SymPair]>,
    /// Pairs further apart than this are excluded from overall sums and
    /// flagged in per-residue/per-atom output.
    pub dist_cutoff: Option<f64>,
}

/// Result of an overall RMS calculation, with any deferred reference
/// updates for the multi-structure averaging loop.
#[derive(Debug, Clone)]
pub struct RmsReport {
    pub rms: f64,
    pub count: usize,
    pub updates: Vec<(usize, [f64; 3])>,
}

fn matched(
    ref_side: &Structure,
    fitted: &Structure,
    zones: &[Zone],
    opts: &RmsOptions<'_>,
) -> Result<Vec<MatchedPair>> {
    match_zone_atoms(
        ref_side,
        fitted,
        zones,
        opts.selector,
        opts.gate,
        opts.bvalue,
        opts.ignore_missing,
        opts.sym_pairs,
    )
}

fn updated_coord(policy: UpdatePolicy, r: [f64; 3], m: [f64; 3]) -> [f64; 3] {
    match policy {
        UpdatePolicy::Arithmetic => {
            [(r[0] + m[0]) / 2.0, (r[1] + m[1]) / 2.0, (r[2] + m[2]) / 2.0]
        }
        UpdatePolicy::Weighted { count } => {
            let n = count as f64;
            [
                ((n - 1.0) * r[0] + m[0]) / n,
                ((n - 1.0) * r[1] + m[1]) / n,
                ((n - 1.0) * r[2] + m[2]) / n,
            ]
        }
    }
}

/// Overall RMS deviation over the zone list. Pairs outside the distance
/// cutoff are excluded from the sum. When an update policy is supplied,
/// the new reference coordinate of every matched pair is returned for
/// the caller to apply; each pair is visited once, so deferred
/// application is equivalent to updating in place.
pub fn calc_rms(
    ref_side: &Structure,
    fitted: &Structure,
    zones: &[Zone],
    opts: &RmsOptions<'_>,
    update: Option<UpdatePolicy>,
) -> Result<RmsReport> {
    let pairs = matched(ref_side, fitted, zones, opts)?;

    let mut sum_sq = 0.0;
    let mut count = 0usize;
    let mut updates = Vec::new();

    for pair in &pairs {
        let r = &ref_side.atoms[pair.ref_i];
        let m = &fitted.atoms[pair.mob_i];
        let d_sq = r.dist_sq(m);

        let outside = opts
            .dist_cutoff
            .map(|cutoff| d_sq > cutoff * cutoff)
            .unwrap_or(false);
        if !outside {
            sum_sq += d_sq;
            count += 1;
        }

        if let Some(policy) = update {
            updates.push((pair.ref_i, updated_coord(policy, r.xyz(), m.xyz())));
        }
    }

    if count == 0 {
        return Err(FitError::Degenerate(
            "no atoms in specified zones".to_string(),
        ));
    }

    Ok(RmsReport {
        rms: (sum_sq / count as f64).sqrt(),
        count,
        updates,
    })
}

/// Per-residue RMS deviation, written one line per reference residue.
/// With a distance cutoff, pairs outside it still contribute but the
/// residue is flagged `*` (partially outside) or `**` (fully outside).
pub fn residue_rms(
    ref_side: &Structure,
    fitted: &Structure,
    zones: &[Zone],
    opts: &RmsOptions<'_>,
    w: &mut dyn Write,
) -> Result<()> {
    let pairs = matched(ref_side, fitted, zones, opts)?;

    let mut i = 0;
    while i < pairs.len() {
        // Collect the run of pairs within one reference residue
        let first = &ref_side.atoms[pairs[i].ref_i];
        let mut j = i;
        let mut sum_sq = 0.0;
        let mut outside = 0usize;
        while j < pairs.len() && ref_side.atoms[pairs[j].ref_i].same_residue(first) {
            let r = &ref_side.atoms[pairs[j].ref_i];
            let m = &fitted.atoms[pairs[j].mob_i];
            let d_sq = r.dist_sq(m);
            if let Some(cutoff) = opts.dist_cutoff {
                if d_sq > cutoff * cutoff {
                    outside += 1;
                }
            }
            sum_sq += d_sq;
            j += 1;
        }
        let n = j - i;
        let rms = (sum_sq / n as f64).sqrt();
        let mob_atom = &fitted.atoms[pairs[i].mob_i];
        write!(
            w,
            "{:>8} {} : {:>8} {}   RMS: {:.3}",
            first.res_id(),
            first.resnam.trim(),
            mob_atom.res_id(),
            mob_atom.resnam.trim(),
            rms
        )?;
        if opts.dist_cutoff.is_some() && outside > 0 {
            if outside < n {
                writeln!(w, " *")?;
            } else {
                writeln!(w, " **")?;
            }
        } else {
            writeln!(w)?;
        }
        i = j;
    }

    if opts.dist_cutoff.is_some() {
        writeln!(w, "   {:28} *  Partially outside distance cutoff", "")?;
        writeln!(w, "   {:28} ** Fully outside distance cutoff", "")?;
    }
    Ok(())
}

/// Per-atom-pair distances. Pairs outside the distance cutoff are
/// annotated but never excluded.
pub fn pair_distances(
    ref_side: &Structure,
    fitted: &Structure,
    zones: &[Zone],
    opts: &RmsOptions<'_>,
    w: &mut dyn Write,
) -> Result<()> {
    let pairs = matched(ref_side, fitted, zones, opts)?;

    for pair in &pairs {
        let r = &ref_side.atoms[pair.ref_i];
        let m = &fitted.atoms[pair.mob_i];
        let dist = r.dist(m);
        write!(
            w,
            "{:>8} {:>4} {} :{:>8} {:>4} {} Dist: {:.3}",
            r.res_id(),
            r.resnam.trim(),
            r.atnam_raw,
            m.res_id(),
            m.resnam.trim(),
            m.atnam_raw,
            dist
        )?;
        if let Some(cutoff) = opts.dist_cutoff {
            if dist > cutoff {
                write!(w, " *")?;
            }
        }
        writeln!(w)?;
    }
    if opts.dist_cutoff.is_some() {
        writeln!(w, "   {:35} * Outside distance cutoff", "")?;
    }
    Ok(())
}

/// Apply deferred reference updates produced by `calc_rms`.
pub fn apply_updates(reference: &mut Structure, updates: &[(usize, [f64; 3])]) {
    for (idx, coord) in updates {
        reference.atoms[*idx].set_xyz(*coord);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::testutil::{ca_chain, structure};
    use crate::zones::ZoneMode;

    fn opts(sel: &AtomSelector) -> RmsOptions<'_> {
        RmsOptions {
            selector: sel,
            gate: BValGate::Off,
            bvalue: 10000.0,
            ignore_missing: false,
            sym_pairs: None,
            dist_cutoff: None,
        }
    }

    #[test]
    fn rms_of_unit_shift_is_one() {
        let reference = ca_chain("A", 1, &[[0., 0., 0.], [1., 0., 0.], [2., 0., 0.]]);
        let fitted = ca_chain("A", 1, &[[0., 1., 0.], [1., 1., 0.], [2., 1., 0.]]);
        let zones = [Zone::whole(ZoneMode::Resnum)];
        let sel = AtomSelector::default();

        let report = calc_rms(&reference, &fitted, &zones, &opts(&sel), None).unwrap();
        assert_eq!(report.count, 3);
        assert!((report.rms - 1.0).abs() < 1e-12);
    }

    #[test]
    fn identical_structures_have_zero_rms() {
        let reference = ca_chain("A", 1, &[[0., 0., 0.], [1., 0., 0.], [2., 0., 0.]]);
        let zones = [Zone::whole(ZoneMode::Resnum)];
        let sel = AtomSelector::default();
        let report = calc_rms(&reference, &reference, &zones, &opts(&sel), None).unwrap();
        assert_eq!(report.rms, 0.0);
    }

    #[test]
    fn distance_cutoff_excludes_outliers_from_overall() {
        let reference = ca_chain("A", 1, &[[0., 0., 0.], [1., 0., 0.], [2., 0., 0.]]);
        let fitted = ca_chain("A", 1, &[[0., 0., 0.], [1., 0., 0.], [2., 9., 0.]]);
        let zones = [Zone::whole(ZoneMode::Resnum)];
        let sel = AtomSelector::default();

        let mut o = opts(&sel);
        let all = calc_rms(&reference, &fitted, &zones, &o, None).unwrap();
        assert!(all.rms > 1.0);

        o.dist_cutoff = Some(3.0);
        let gated = calc_rms(&reference, &fitted, &zones, &o, None).unwrap();
        assert_eq!(gated.count, 2);
        assert_eq!(gated.rms, 0.0);
    }

    #[test]
    fn per_residue_output_flags_cutoff() {
        let reference = structure(&[
            ("A", 1, ' ', "GLY", &[(" N  ", 0., 0., 0.), (" CA ", 1., 0., 0.)]),
            ("A", 2, ' ', "ALA", &[(" CA ", 2., 0., 0.)]),
        ]);
        let fitted = structure(&[
            ("A", 1, ' ', "GLY", &[(" N  ", 0., 0., 0.), (" CA ", 1., 9., 0.)]),
            ("A", 2, ' ', "ALA", &[(" CA ", 2., 9., 0.)]),
        ]);
        let zones = [Zone::whole(ZoneMode::Resnum)];
        let sel = AtomSelector::default();
        let mut o = opts(&sel);
        o.dist_cutoff = Some(3.0);

        let mut out = Vec::new();
        residue_rms(&reference, &fitted, &zones, &o, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        // Residue 1: one pair in, one out -> partial flag
        assert!(lines[0].ends_with(" *"), "line was: {}", lines[0]);
        // Residue 2: single pair out -> full flag
        assert!(lines[1].ends_with(" **"), "line was: {}", lines[1]);
    }

    #[test]
    fn pair_distances_annotate_but_keep_everything() {
        let reference = ca_chain("A", 1, &[[0., 0., 0.], [1., 0., 0.]]);
        let fitted = ca_chain("A", 1, &[[0., 0., 0.], [1., 5., 0.]]);
        let zones = [Zone::whole(ZoneMode::Resnum)];
        let sel = AtomSelector::default();
        let mut o = opts(&sel);
        o.dist_cutoff = Some(3.0);

        let mut out = Vec::new();
        pair_distances(&reference, &fitted, &zones, &o, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].contains("Dist: 0.000"));
        assert!(!lines[0].ends_with('*'));
        assert!(lines[1].contains("Dist: 5.000"));
        assert!(lines[1].ends_with('*'));
    }

    #[test]
    fn arithmetic_update_moves_reference_halfway() {
        let mut reference = ca_chain("A", 1, &[[0., 0., 0.], [1., 0., 0.], [2., 0., 0.]]);
        let fitted = ca_chain("A", 1, &[[0., 2., 0.], [1., 2., 0.], [2., 2., 0.]]);
        let zones = [Zone::whole(ZoneMode::Resnum)];
        let sel = AtomSelector::default();

        let report = calc_rms(
            &reference,
            &fitted,
            &zones,
            &opts(&sel),
            Some(UpdatePolicy::Arithmetic),
        )
        .unwrap();
        apply_updates(&mut reference, &report.updates);
        assert_eq!(reference.atoms[0].xyz(), [0.0, 1.0, 0.0]);
    }

    #[test]
    fn weighted_update_uses_structure_count() {
        let mut reference = ca_chain("A", 1, &[[0., 0., 0.], [1., 0., 0.], [2., 0., 0.]]);
        let fitted = ca_chain("A", 1, &[[0., 4., 0.], [1., 4., 0.], [2., 4., 0.]]);
        let zones = [Zone::whole(ZoneMode::Resnum)];
        let sel = AtomSelector::default();

        let report = calc_rms(
            &reference,
            &fitted,
            &zones,
            &opts(&sel),
            Some(UpdatePolicy::Weighted { count: 4 }),
        )
        .unwrap();
        apply_updates(&mut reference, &report.updates);
        // r <- (3 * 0 + 4) / 4 = 1
        assert_eq!(reference.atoms[0].xyz(), [0.0, 1.0, 0.0]);
    }

    #[test]
    fn symmetric_swap_restores_rms() {
        use crate::extract::default_symmetric_pairs;
        let reference = structure(&[(
            "A",
            1,
            ' ',
            "TYR",
            &[
                (" CA ", 0., 0., 0.),
                (" CD1", 1., 1., 0.),
                (" CD2", -1., 1., 0.),
                (" CE1", 2., 2., 0.),
                (" CE2", -2., 2., 0.),
            ],
        )]);
        // Ring flipped: CD and CE labels exchanged
        let flipped = structure(&[(
            "A",
            1,
            ' ',
            "TYR",
            &[
                (" CA ", 0., 0., 0.),
                (" CD1", -1., 1., 0.),
                (" CD2", 1., 1., 0.),
                (" CE1", -2., 2., 0.),
                (" CE2", 2., 2., 0.),
            ],
        )]);
        let zones = [Zone::whole(ZoneMode::Resnum)];
        let sel = AtomSelector::default();
        let table = default_symmetric_pairs();

        let mut o = opts(&sel);
        let plain = calc_rms(&reference, &flipped, &zones, &o, None).unwrap();
        assert!(plain.rms > 1.0);

        o.sym_pairs = Some(&table);
        let matched = calc_rms(&reference, &flipped, &zones, &o, None).unwrap();
        assert_eq!(matched.rms, 0.0);
    }
}
