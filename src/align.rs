use std::fs;
use std::io::Write;
use std::path::Path;

use log::warn;

use crate::atoms::{throne, Atom};
use crate::constants::{SEQ_LINE_WIDTH, TINY_DISTANCE};
use crate::error::{FitError, Result};
use crate::mdm::SubstMatrix;
use crate::zones::{merge_zones, Zone, ZoneMode};

/// Result of a pairwise alignment: two equal-length strings over the
/// one-letter alphabet plus `-`.
#[derive(Debug, Clone)]
pub struct Alignment {
    pub ref_aligned: String,
    pub mob_aligned: String,
    pub score: i32,
}

const NEG_INF: i32 = i32::MIN / 4;

#[derive(Clone, Copy, PartialEq)]
enum Layer {
    Match,
    GapMob,
    GapRef,
    Start,
}

/// Needleman-Wunsch with affine gaps. End gaps are free: the DP borders
/// cost nothing and the traceback starts from the best cell on the last
/// row or column. Gap cost is `gap_open + (len - 1) * gap_ext`. The DP
/// state is held in single contiguous buffers of (L1+1)*(L2+1) cells.
pub fn affine_align(
    seq1: &str,
    seq2: &str,
    matrix: &dyn SubstMatrix,
    gap_open: i32,
    gap_ext: i32,
) -> Alignment {
    let a: Vec<char> = seq1.chars().collect();
    let b: Vec<char> = seq2.chars().collect();
    let l1 = a.len();
    let l2 = b.len();
    let cols = l2 + 1;
    let idx = |i: usize, j: usize| i * cols + j;

    let mut m = vec![NEG_INF; (l1 + 1) * cols];
    let mut x = vec![NEG_INF; (l1 + 1) * cols]; // gap in seq2, consuming seq1
    let mut y = vec![NEG_INF; (l1 + 1) * cols]; // gap in seq1, consuming seq2
    let mut tb_m = vec![Layer::Start; (l1 + 1) * cols];
    let mut tb_x = vec![Layer::Start; (l1 + 1) * cols];
    let mut tb_y = vec![Layer::Start; (l1 + 1) * cols];

    for i in 0..=l1 {
        m[idx(i, 0)] = 0;
    }
    for j in 0..=l2 {
        m[idx(0, j)] = 0;
    }

    for i in 1..=l1 {
        for j in 1..=l2 {
            let diag = idx(i - 1, j - 1);
            let best_prev = m[diag].max(x[diag]).max(y[diag]);
            m[idx(i, j)] = best_prev + matrix.score(a[i - 1], b[j - 1]);
            tb_m[idx(i, j)] = if best_prev == m[diag] {
                Layer::Match
            } else if best_prev == x[diag] {
                Layer::GapMob
            } else {
                Layer::GapRef
            };

            let up = idx(i - 1, j);
            let open = m[up] - gap_open;
            let extend = x[up] - gap_ext;
            if open >= extend {
                x[idx(i, j)] = open;
                tb_x[idx(i, j)] = Layer::Match;
            } else {
                x[idx(i, j)] = extend;
                tb_x[idx(i, j)] = Layer::GapMob;
            }

            let left = idx(i, j - 1);
            let open = m[left] - gap_open;
            let extend = y[left] - gap_ext;
            if open >= extend {
                y[idx(i, j)] = open;
                tb_y[idx(i, j)] = Layer::Match;
            } else {
                y[idx(i, j)] = extend;
                tb_y[idx(i, j)] = Layer::GapRef;
            }
        }
    }

    // Outside edge search: best match cell on the last row or column
    let mut best = (l1, l2, m[idx(l1, l2)]);
    for i in 1..=l1 {
        if m[idx(i, l2)] > best.2 {
            best = (i, l2, m[idx(i, l2)]);
        }
    }
    for j in 1..=l2 {
        if m[idx(l1, j)] > best.2 {
            best = (l1, j, m[idx(l1, j)]);
        }
    }
    let (bi, bj, score) = best;

    // Unaligned tails against gaps
    let mut rev1: Vec<char> = Vec::new();
    let mut rev2: Vec<char> = Vec::new();
    for k in (bi..l1).rev() {
        rev1.push(a[k]);
        rev2.push('-');
    }
    for k in (bj..l2).rev() {
        rev1.push('-');
        rev2.push(b[k]);
    }

    // Trace back from the best cell
    let mut i = bi;
    let mut j = bj;
    let mut layer = Layer::Match;
    while i > 0 && j > 0 {
        match layer {
            Layer::Match => {
                rev1.push(a[i - 1]);
                rev2.push(b[j - 1]);
                layer = tb_m[idx(i, j)];
                i -= 1;
                j -= 1;
            }
            Layer::GapMob => {
                rev1.push(a[i - 1]);
                rev2.push('-');
                layer = tb_x[idx(i, j)];
                i -= 1;
            }
            Layer::GapRef => {
                rev1.push('-');
                rev2.push(b[j - 1]);
                layer = tb_y[idx(i, j)];
                j -= 1;
            }
            Layer::Start => break,
        }
    }
    // Leading residues of whichever sequence is left
    while i > 0 {
        rev1.push(a[i - 1]);
        rev2.push('-');
        i -= 1;
    }
    while j > 0 {
        rev1.push('-');
        rev2.push(b[j - 1]);
        j -= 1;
    }

    Alignment {
        ref_aligned: rev1.iter().rev().collect(),
        mob_aligned: rev2.iter().rev().collect(),
        score,
    }
}

fn inv_dist(p: &Atom, q: &Atom) -> f64 {
    let dist = p.dist(q).max(TINY_DISTANCE);
    1.0 / dist
}

/// Distance-driven variant used by the iterative refitter: residue pairs
/// score 1/distance, gap penalties are zero, and each cell may inherit
/// from any off-diagonal cell in its row or column, giving an O(L^3)
/// fill. The matrices run over indexed C-alpha atoms of the reference
/// and the currently fitted mobile.
pub fn align_on_distances(ref_ca: &[&Atom], mob_ca: &[&Atom]) -> Option<Alignment> {
    let l1 = ref_ca.len();
    let l2 = mob_ca.len();
    if l1 == 0 || l2 == 0 {
        return None;
    }

    let mut matrix = vec![0.0f64; l1 * l2];
    let mut dirn = vec![(-1i64, -1i64); l1 * l2];
    let at = |i: usize, j: usize| i * l2 + j;

    // Scores up the right hand side and along the bottom row
    for j in 0..l2 {
        matrix[at(l1 - 1, j)] = inv_dist(ref_ca[l1 - 1], mob_ca[j]);
    }
    for i in 0..l1 {
        matrix[at(i, l2 - 1)] = inv_dist(ref_ca[i], mob_ca[l2 - 1]);
    }

    // Move back along the diagonal filling a row and a column at a time
    let mut i = l1 - 1;
    let mut j = l2 - 1;
    while i > 0 && j > 0 {
        i -= 1;
        j -= 1;

        for i1 in (0..=i).rev() {
            fill_cell(&mut matrix, &mut dirn, ref_ca, mob_ca, l1, l2, i1, j);
        }
        for j1 in (0..=j).rev() {
            fill_cell(&mut matrix, &mut dirn, ref_ca, mob_ca, l1, l2, i, j1);
        }
    }

    Some(traceback_dist(&matrix, &dirn, ref_ca, mob_ca, l1, l2))
}

fn fill_cell(
    matrix: &mut [f64],
    dirn: &mut [(i64, i64)],
    ref_ca: &[&Atom],
    mob_ca: &[&Atom],
    l1: usize,
    l2: usize,
    i: usize,
    j: usize,
) {
    let at = |i: usize, j: usize| i * l2 + j;
    let dia = matrix[at(i + 1, j + 1)];

    // Highest score to the right of the diagonal
    let mut right = 0.0;
    let mut rcell = i + 2;
    for k in (i + 2)..l1 {
        if matrix[at(k, j + 1)] > right || k == i + 2 {
            right = matrix[at(k, j + 1)];
            rcell = k;
        }
    }

    // Highest score below the diagonal
    let mut down = 0.0;
    let mut dcell = j + 2;
    for l in (j + 2)..l2 {
        if matrix[at(i + 1, l)] > down || l == j + 2 {
            down = matrix[at(i + 1, l)];
            dcell = l;
        }
    }

    let maxoff = right.max(down);
    if dia >= maxoff {
        matrix[at(i, j)] = dia;
        dirn[at(i, j)] = (i as i64 + 1, j as i64 + 1);
    } else if right > down {
        matrix[at(i, j)] = right;
        dirn[at(i, j)] = (rcell as i64, j as i64 + 1);
    } else {
        matrix[at(i, j)] = down;
        dirn[at(i, j)] = (i as i64 + 1, dcell as i64);
    }

    matrix[at(i, j)] += inv_dist(ref_ca[i], mob_ca[j]);
}

fn traceback_dist(
    matrix: &[f64],
    dirn: &[(i64, i64)],
    ref_ca: &[&Atom],
    mob_ca: &[&Atom],
    l1: usize,
    l2: usize,
) -> Alignment {
    let at = |i: usize, j: usize| i * l2 + j;
    let mut align1 = String::new();
    let mut align2 = String::new();

    // Search the outside of the matrix for the highest scoring start
    let mut besti = 0;
    for i in 1..l1 {
        if matrix[at(i, 0)] > matrix[at(besti, 0)] {
            besti = i;
        }
    }
    let mut bestj = 0;
    for j in 1..l2 {
        if matrix[at(0, j)] > matrix[at(0, bestj)] {
            bestj = j;
        }
    }
    let (mut i, mut j) = if matrix[at(besti, 0)] > matrix[at(0, bestj)] {
        for k in 0..besti {
            align1.push(throne(&ref_ca[k].resnam));
            align2.push('-');
        }
        (besti, 0)
    } else {
        for k in 0..bestj {
            align1.push('-');
            align2.push(throne(&mob_ca[k].resnam));
        }
        (0, bestj)
    };
    let score = matrix[at(i, j)];

    align1.push(throne(&ref_ca[i].resnam));
    align2.push(throne(&mob_ca[j].resnam));

    while i < l1 - 1 && j < l2 - 1 {
        let (nx, ny) = dirn[at(i, j)];
        let nx = nx as usize;
        let ny = ny as usize;
        if nx == i + 1 && ny == j + 1 {
            i += 1;
            j += 1;
        } else if ny == j + 1 {
            // Inheriting from off-diagonal: gap in the mobile
            i += 1;
            j += 1;
            while i < nx && i < l1 - 1 {
                align1.push(throne(&ref_ca[i].resnam));
                align2.push('-');
                i += 1;
            }
        } else {
            // Gap in the reference
            i += 1;
            j += 1;
            while j < ny && j < l2 - 1 {
                align1.push('-');
                align2.push(throne(&mob_ca[j].resnam));
                j += 1;
            }
        }
        align1.push(throne(&ref_ca[i].resnam));
        align2.push(throne(&mob_ca[j].resnam));
    }

    // If one sequence finished first, pad the other against gaps
    if i < l1 - 1 {
        for k in i + 1..l1 {
            align1.push(throne(&ref_ca[k].resnam));
            align2.push('-');
        }
    } else if j < l2 - 1 {
        for k in j + 1..l2 {
            align1.push('-');
            align2.push(throne(&mob_ca[k].resnam));
        }
    }

    Alignment {
        ref_aligned: align1,
        mob_aligned: align2,
        score: score as i32,
    }
}

/// Walk two aligned strings and emit one-residue SEQUENTIAL zones for the
/// columns where neither side is a gap, then merge adjacent zones.
/// Residue counters start at `ref_start`/`mob_start`. When indexed atoms
/// and a squared-distance ceiling are supplied, pairs further apart than
/// the ceiling are skipped. `limit` restricts processing to a 1-based
/// inclusive column window.
pub fn zones_from_alignment(
    ref_align: &str,
    mob_align: &str,
    ref_start: i32,
    mob_start: i32,
    gate: Option<(&[&Atom], &[&Atom], f64)>,
    limit: Option<(usize, usize)>,
) -> Vec<Zone> {
    let a: Vec<char> = ref_align.chars().collect();
    let b: Vec<char> = mob_align.chars().collect();
    let len = a.len().min(b.len());

    let (start, stop) = match limit {
        Some((lo, hi)) => ((lo.saturating_sub(1)).min(len), hi.min(len)),
        None => (0, len),
    };

    let mut ref_count = 0i32;
    let mut mob_count = 0i32;
    for i in 0..start {
        if a[i] != '-' {
            ref_count += 1;
        }
        if b[i] != '-' {
            mob_count += 1;
        }
    }

    let mut zones: Vec<Zone> = Vec::new();
    for i in start..stop {
        if a[i] != '-' {
            ref_count += 1;
        }
        if b[i] != '-' {
            mob_count += 1;
        }
        if a[i] == '-' || b[i] == '-' {
            continue;
        }
        if let Some((ref_idx, mob_idx, max_dist_sq)) = gate {
            let r = ref_idx[(ref_count - 1) as usize];
            let m = mob_idx[(mob_count - 1) as usize];
            if r.dist_sq(m) > max_dist_sq {
                continue;
            }
        }
        zones.push(Zone::single(
            ref_count - 1 + ref_start,
            mob_count - 1 + mob_start,
        ));
    }

    merge_zones(&mut zones);
    zones
}

/// Strip columns deleted in both sequences. These appear when the two
/// records came from a wider multiple alignment.
pub fn remove_double_deletions(seqa: &str, seqb: &str) -> (String, String) {
    let a: Vec<char> = seqa.chars().collect();
    let b: Vec<char> = seqb.chars().collect();
    let mut outa = String::new();
    let mut outb = String::new();
    for i in 0..a.len().max(b.len()) {
        let ca = a.get(i).copied();
        let cb = b.get(i).copied();
        if ca == Some('-') && cb == Some('-') {
            continue;
        }
        if let Some(c) = ca {
            outa.push(c);
        }
        if let Some(c) = cb {
            outb.push(c);
        }
    }
    (outa, outb)
}

/// Compare an alignment-file sequence against a structure sequence,
/// ignoring gap characters in the file sequence.
pub fn verify_sequence(file_seq: &str, struct_seq: &str) -> bool {
    let a: Vec<char> = file_seq.chars().filter(|&c| c != '-').collect();
    let b: Vec<char> = struct_seq.chars().collect();
    a == b
}

/// One record of a PIR alignment file. Chains are joined with `*`
/// markers, matching the sequences extracted from structures.
#[derive(Debug, Clone)]
pub struct PirEntry {
    pub code: String,
    pub sequence: String,
}

/// Read every record of a PIR file. Records start `>P1;code`, the next
/// line is a free-text title, and the sequence follows until the `*`
/// terminator (internal `*` separate chains).
pub fn read_pir(path: &Path) -> Result<Vec<PirEntry>> {
    let text = fs::read_to_string(path).map_err(|e| FitError::PdbRead {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let mut entries = Vec::new();
    let mut lines = text.lines().peekable();
    while let Some(line) = lines.next() {
        let line = line.trim();
        if !line.starts_with('>') {
            continue;
        }
        let code = line
            .trim_start_matches('>')
            .trim_start_matches("P1;")
            .trim()
            .to_string();
        // Title line
        let _ = lines.next();
        let mut seq = String::new();
        while let Some(peek) = lines.peek() {
            if peek.trim_start().starts_with('>') {
                break;
            }
            let row = lines.next().unwrap();
            for c in row.chars() {
                if !c.is_whitespace() {
                    seq.push(c);
                }
            }
        }
        // Trailing * terminates the record; internal * are chain breaks
        while seq.ends_with('*') {
            seq.pop();
        }
        entries.push(PirEntry {
            code,
            sequence: seq,
        });
    }
    if entries.is_empty() {
        return Err(FitError::Parse(format!(
            "no sequences read from alignment file {}",
            path.display()
        )));
    }
    Ok(entries)
}

/// True when a zone list is SEQUENTIAL, non-overlapping and strictly
/// advancing on both structures, i.e. renderable as an alignment.
pub fn sequential_zones(zones: &[Zone]) -> bool {
    let mut prev: Option<&Zone> = None;
    for z in zones {
        if z.mode != ZoneMode::Sequential {
            return false;
        }
        if let Some(p) = prev {
            if z.start1 <= p.stop1 || z.start2 <= p.stop2 {
                return false;
            }
        }
        prev = Some(z);
    }
    true
}

/// Rebuild a pairwise alignment from a sorted SEQUENTIAL zone list.
/// Residues outside any zone are rendered against gaps; zoned runs are
/// rendered column-aligned.
pub fn alignment_from_zones(
    ref_seq: &str,
    mob_seq: &str,
    zones: &[Zone],
) -> Result<(String, String)> {
    if !sequential_zones(zones) {
        return Err(FitError::State(
            "zones must not overlap and must be in sequence along the chain".to_string(),
        ));
    }
    let a: Vec<char> = ref_seq.chars().collect();
    let b: Vec<char> = mob_seq.chars().collect();
    if let (Some(first), Some(last)) = (zones.first(), zones.last()) {
        if first.start1 < 1
            || first.start2 < 1
            || last.stop1 as usize > a.len()
            || last.stop2 as usize > b.len()
        {
            return Err(FitError::Reference(
                "zone extends beyond the end of a sequence".to_string(),
            ));
        }
    }
    let mut outa = String::new();
    let mut outb = String::new();
    let mut r = 1usize;
    let mut m = 1usize;

    let emit_unzoned = |outa: &mut String, outb: &mut String, r: &mut usize, m: &mut usize, rstop: usize, mstop: usize| {
        while *r < rstop {
            outa.push(a[*r - 1]);
            outb.push('-');
            *r += 1;
        }
        while *m < mstop {
            outa.push('-');
            outb.push(b[*m - 1]);
            *m += 1;
        }
    };

    for z in zones {
        emit_unzoned(&mut outa, &mut outb, &mut r, &mut m, z.start1 as usize, z.start2 as usize);
        while r <= z.stop1 as usize && m <= z.stop2 as usize {
            outa.push(a[r - 1]);
            outb.push(b[m - 1]);
            r += 1;
            m += 1;
        }
    }
    emit_unzoned(&mut outa, &mut outb, &mut r, &mut m, a.len() + 1, b.len() + 1);

    Ok((outa, outb))
}

/// Print a pair of aligned strings as 60-column blocks.
pub fn print_nice_alignment(w: &mut dyn Write, ref_align: &str, mob_align: &str) -> Result<()> {
    let a: Vec<char> = ref_align.chars().collect();
    let b: Vec<char> = mob_align.chars().collect();
    let mut offset = 0;
    while offset < a.len().max(b.len()) {
        let end = (offset + SEQ_LINE_WIDTH).min(a.len().max(b.len()));
        let slice_a: String = a[offset.min(a.len())..end.min(a.len())].iter().collect();
        let slice_b: String = b[offset.min(b.len())..end.min(b.len())].iter().collect();
        writeln!(w, "   {}", slice_a)?;
        writeln!(w, "   {}", slice_b)?;
        writeln!(w)?;
        offset = end;
    }
    Ok(())
}

/// Print a sequence in 60-column blocks with a leading margin.
pub fn print_sequence(w: &mut dyn Write, seq: &str) -> Result<()> {
    let chars: Vec<char> = seq.chars().collect();
    for chunk in chars.chunks(SEQ_LINE_WIDTH) {
        let line: String = chunk.iter().collect();
        writeln!(w, "   {}", line)?;
    }
    Ok(())
}

/// Print one PIR record: `>P1;code`, a title line, then the sequence in
/// fixed-width rows finished with the `*` terminator.
pub fn print_sequence_pir(w: &mut dyn Write, code: &str, title: &str, seq: &str) -> Result<()> {
    writeln!(w, ">P1;{}", code)?;
    writeln!(w, "{}", title)?;
    let chars: Vec<char> = seq.chars().collect();
    for chunk in chars.chunks(SEQ_LINE_WIDTH) {
        let line: String = chunk.iter().collect();
        writeln!(w, "{}", line)?;
    }
    writeln!(w, "*")?;
    Ok(())
}

/// Warn unless the sequences read from an alignment file match the
/// loaded structures.
pub fn check_alignment_sequence(name: &str, file_seq: &str, struct_seq: &str) {
    if !verify_sequence(file_seq, struct_seq) {
        warn!(
            "{} sequence in alignment file does not match the loaded structure",
            name
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::testutil::ca_chain;
    use crate::mdm::Mdm78;

    #[test]
    fn identical_sequences_align_without_gaps() {
        let aln = affine_align("ACDEFGHIKL", "ACDEFGHIKL", &Mdm78, 10, 2);
        assert_eq!(aln.ref_aligned, "ACDEFGHIKL");
        assert_eq!(aln.mob_aligned, "ACDEFGHIKL");
        // Sum of PAM250 identities: A2 C12 D4 E4 F9 G5 H6 I5 K5 L6
        assert_eq!(aln.score, 58);
    }

    #[test]
    fn single_deletion_opens_one_gap() {
        let aln = affine_align("ACDEFGHIKL", "ACDEFHIKL", &Mdm78, 10, 2);
        assert_eq!(aln.ref_aligned, "ACDEFGHIKL");
        assert_eq!(aln.mob_aligned, "ACDEF-HIKL");
    }

    #[test]
    fn end_gaps_are_free() {
        let aln = affine_align("ACDEFGHIKL", "DEFGHI", &Mdm78, 10, 2);
        assert_eq!(aln.ref_aligned, "ACDEFGHIKL");
        assert_eq!(aln.mob_aligned, "--DEFGHI--");
    }

    #[test]
    fn distance_alignment_pairs_nearest_atoms() {
        let reference = ca_chain("A", 1, &[[0., 0., 0.], [4., 0., 0.], [8., 0., 0.], [12., 0., 0.]]);
        let mobile = ca_chain("A", 1, &[[4.1, 0., 0.], [8.1, 0., 0.], [12.1, 0., 0.]]);
        let ref_ca: Vec<&Atom> = reference.atoms.iter().collect();
        let mob_ca: Vec<&Atom> = mobile.atoms.iter().collect();

        let aln = align_on_distances(&ref_ca, &mob_ca).unwrap();
        assert_eq!(aln.ref_aligned, "AAAA");
        assert_eq!(aln.mob_aligned, "-AAA");

        let zones = zones_from_alignment(
            &aln.ref_aligned,
            &aln.mob_aligned,
            1,
            1,
            Some((&ref_ca, &mob_ca, 9.0)),
            None,
        );
        assert_eq!(zones, vec![Zone::sequential(2, 4, 1, 3)]);
    }

    #[test]
    fn zones_from_alignment_counts_residues() {
        let zones = zones_from_alignment("AB-CD", "A-BCD", 1, 1, None, None);
        assert_eq!(
            zones,
            vec![Zone::sequential(1, 1, 1, 1), Zone::sequential(3, 4, 3, 4)]
        );
    }

    #[test]
    fn zones_from_alignment_respects_limit() {
        let zones = zones_from_alignment("ABCD", "ABCD", 1, 1, None, Some((2, 3)));
        assert_eq!(zones, vec![Zone::sequential(2, 3, 2, 3)]);
    }

    #[test]
    fn double_deletions_are_removed() {
        let (a, b) = remove_double_deletions("AB--CD", "AE--FG");
        assert_eq!(a, "ABCD");
        assert_eq!(b, "AEFG");
    }

    #[test]
    fn sequence_verification_ignores_gaps() {
        assert!(verify_sequence("A-BC-D", "ABCD"));
        assert!(!verify_sequence("A-BC-E", "ABCD"));
        assert!(verify_sequence("AB*CD", "AB*CD"));
    }

    #[test]
    fn alignment_round_trips_through_zones() {
        let zones = vec![Zone::sequential(1, 1, 1, 1), Zone::sequential(3, 4, 3, 4)];
        let (a, b) = alignment_from_zones("ABCD", "AEFG", &zones).unwrap();
        // Residue 2 of each is unzoned, rendered against gaps
        assert_eq!(a, "AB-CD");
        assert_eq!(b, "A-EFG");
        let back = zones_from_alignment(&a, &b, 1, 1, None, None);
        assert_eq!(back, zones);
    }

    #[test]
    fn nonsequential_zones_are_rejected() {
        let zones = vec![Zone::sequential(3, 4, 3, 4), Zone::sequential(1, 1, 1, 1)];
        assert!(alignment_from_zones("ABCD", "AEFG", &zones).is_err());
    }

    #[test]
    fn pir_round_trip() {
        let dir = std::env::temp_dir().join("superpose_pir_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("test.pir");
        let mut out = Vec::new();
        print_sequence_pir(&mut out, "ref", "Reference structure", "ACDEF*GHIKL").unwrap();
        print_sequence_pir(&mut out, "mob", "Mobile structure", "ACD-F*GHIKL").unwrap();
        std::fs::write(&path, &out).unwrap();

        let entries = read_pir(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].code, "ref");
        assert_eq!(entries[0].sequence, "ACDEF*GHIKL");
        assert_eq!(entries[1].sequence, "ACD-F*GHIKL");
    }
}
