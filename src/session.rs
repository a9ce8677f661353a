use std::io::Write;
use std::path::Path;

use log::{info, warn};

use crate::align::{
    affine_align, align_on_distances, alignment_from_zones, check_alignment_sequence,
    print_nice_alignment, print_sequence, print_sequence_pir, read_pir, remove_double_deletions,
    sequential_zones, zones_from_alignment,
};
use crate::atoms::{chain_breaks_to_gaps, strip_chain_breaks, truncate_seq, Atom, Structure};
use crate::constants::{
    DEF_BVALUE, DEF_GAP_EXTEND, DEF_GAP_OPEN, DEF_MAX_EQUIV_DIST_SQ, ITER_STOP, MAX_ITER,
    MAX_MULTI_ITER, MAX_STRUCTURES, MULTI_ITER_STOP,
};
use crate::error::{FitError, Result};
use crate::extract::{
    create_fit_arrays, default_symmetric_pairs, AtomSelector, BValGate, FitArrays, SymPair,
};
use crate::fitting::{apply_transform, fit, mat_mult33, transpose33, RotMat, IDENTITY};
use crate::mdm::Mdm78;
use crate::pdb::{read_structure, write_structure_file, LoadOptions};
use crate::report::{apply_updates, calc_rms, pair_distances, residue_rms, RmsOptions, UpdatePolicy};
use crate::zones::{
    convert_zone_list, count_overlaps, merge_zones, overlapping_zones, parse_zone, renumber_zones,
    sort_zone_list, Zone, ZoneMode,
};

/// B-value weighting schemes for the superposition objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightMode {
    None,
    BVal,
    InvBVal,
}

/// One loaded mobile structure with its zone lists and rotation state.
#[derive(Debug, Clone, Default)]
pub struct MobileSlot {
    pub filename: String,
    pub structure: Structure,
    pub fitted: Option<Structure>,
    pub zones: Vec<Zone>,
    pub rzones: Vec<Zone>,
    pub czones: Vec<Zone>,
    pub rotmat: RotMat,
    pub centroid: [f64; 3],
}

impl MobileSlot {
    fn new(filename: String, structure: Structure) -> Self {
        MobileSlot {
            filename,
            structure,
            fitted: None,
            zones: Vec::new(),
            rzones: Vec::new(),
            czones: Vec::new(),
            rotmat: IDENTITY,
            centroid: [0.0; 3],
        }
    }
}

/// The whole interactive state: structures, zone lists, selectors, gates
/// and modes. Every operation of the fitting core runs against this
/// record; nothing lives in globals.
pub struct Session {
    pub reference: Option<Structure>,
    pub ref_filename: String,
    pub ref_centroid: [f64; 3],
    pub mobiles: Vec<MobileSlot>,

    pub fit_selector: AtomSelector,
    pub rms_selector: AtomSelector,
    pub user_rms_atoms: bool,
    pub user_fit_zone: bool,
    pub user_rms_zone: bool,

    pub current_mode: ZoneMode,
    pub fitted: bool,
    pub n_fitted: usize,

    pub het_atoms: bool,
    pub occ_rank: usize,
    pub read_header: bool,

    pub iterate: bool,
    pub max_equiv_dist_sq: f64,

    pub weight_mode: WeightMode,
    pub gap_open: i32,
    pub gap_ext: i32,
    pub bval_gate: BValGate,
    pub bvalue: f64,
    pub ignore_missing: bool,
    pub dist_cutoff: Option<f64>,
    pub centre_on_origin: bool,
    pub limit: Option<(usize, usize)>,

    pub match_sym_atoms: bool,
    pub sym_pairs: Vec<SymPair>,

    pub multi_vs_ref: bool,
    pub wt_average: bool,
    pub multi_ref: usize,

    pub matrix: Mdm78,
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Session {
            reference: None,
            ref_filename: String::new(),
            ref_centroid: [0.0; 3],
            mobiles: Vec::new(),
            fit_selector: AtomSelector::default(),
            rms_selector: AtomSelector::default(),
            user_rms_atoms: false,
            user_fit_zone: false,
            user_rms_zone: false,
            current_mode: ZoneMode::Resnum,
            fitted: false,
            n_fitted: 0,
            het_atoms: false,
            occ_rank: 1,
            read_header: false,
            iterate: false,
            max_equiv_dist_sq: DEF_MAX_EQUIV_DIST_SQ,
            weight_mode: WeightMode::None,
            gap_open: DEF_GAP_OPEN,
            gap_ext: DEF_GAP_EXTEND,
            bval_gate: BValGate::Off,
            bvalue: DEF_BVALUE,
            ignore_missing: false,
            dist_cutoff: None,
            centre_on_origin: false,
            limit: None,
            match_sym_atoms: false,
            sym_pairs: default_symmetric_pairs(),
            multi_vs_ref: false,
            wt_average: true,
            multi_ref: 0,
            matrix: Mdm78,
        }
    }

    pub fn multi_count(&self) -> usize {
        self.mobiles.len()
    }

    pub fn is_multi(&self) -> bool {
        self.mobiles.len() > 1
    }

    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            het_atoms: self.het_atoms,
            occ_rank: self.occ_rank,
        }
    }

    fn sym_table(&self) -> Option<&[SymPair]> {
        if self.match_sym_atoms {
            Some(&self.sym_pairs)
        } else {
            None
        }
    }

    fn reference_checked(&self) -> Result<&Structure> {
        self.reference
            .as_ref()
            .ok_or_else(|| FitError::State("reference structure undefined".to_string()))
    }

    fn mobile_checked(&self, s: usize) -> Result<&MobileSlot> {
        self.mobiles
            .get(s)
            .ok_or_else(|| FitError::State("mobile structure undefined".to_string()))
    }

    // ----- loading ------------------------------------------------------

    pub fn load_reference(&mut self, path: &Path) -> Result<()> {
        info!("reading reference structure {}", path.display());
        let structure = read_structure(path, &self.load_options())?;
        if structure.has_inserts() {
            warn!("reference protein contains insertions");
        }
        self.reference = Some(structure);
        self.ref_filename = path.display().to_string();
        // A fresh structure invalidates everything derived from it
        self.mobiles.truncate(1);
        self.invalidate();
        Ok(())
    }

    pub fn load_mobile(&mut self, path: &Path) -> Result<()> {
        info!("reading mobile structure {}", path.display());
        let structure = read_structure(path, &self.load_options())?;
        if structure.has_inserts() {
            warn!("mobile protein contains insertions");
        }
        let slot = MobileSlot::new(path.display().to_string(), structure);
        self.mobiles = vec![slot];
        self.multi_ref = 0;
        self.invalidate();
        Ok(())
    }

    /// Load a list of structures for multi-structure fitting: each line
    /// of the file is a path, and the first structure doubles as the
    /// initial reference.
    pub fn load_multi(&mut self, listfile: &Path) -> Result<()> {
        let text = std::fs::read_to_string(listfile)?;
        let paths: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .collect();
        if paths.is_empty() {
            return Err(FitError::Parse(format!(
                "no structures listed in {}",
                listfile.display()
            )));
        }
        if paths.len() > MAX_STRUCTURES {
            return Err(FitError::Capacity(format!(
                "too many structures ({}, maximum {})",
                paths.len(),
                MAX_STRUCTURES
            )));
        }

        let mut slots = Vec::with_capacity(paths.len());
        for p in &paths {
            let path = Path::new(p);
            info!("reading mobile structure {}", path.display());
            let structure = read_structure(path, &self.load_options())?;
            slots.push(MobileSlot::new(p.to_string(), structure));
        }

        self.reference = Some(slots[0].structure.clone());
        self.ref_filename = slots[0].filename.clone();
        self.mobiles = slots;
        self.multi_ref = 0;
        self.invalidate();
        Ok(())
    }

    fn invalidate(&mut self) {
        self.fitted = false;
        self.n_fitted = 0;
        self.user_rms_atoms = false;
        self.user_rms_zone = false;
        for slot in &mut self.mobiles {
            slot.fitted = None;
        }
    }

    // ----- selectors and zones -----------------------------------------

    pub fn set_fit_atoms(&mut self, spec: &str) -> Result<()> {
        if self.iterate {
            warn!("atom selection cannot change while ITERATE is set; command ignored");
            return Ok(());
        }
        self.fit_selector = AtomSelector::parse(spec)?;
        self.fitted = false;
        Ok(())
    }

    pub fn set_rms_atoms(&mut self, spec: &str) -> Result<()> {
        self.rms_selector = AtomSelector::parse(spec)?;
        self.user_rms_atoms = true;
        Ok(())
    }

    fn parse_zone_for(&self, spec: &str, s: usize) -> Result<Zone> {
        let ref_seq = self.reference.as_ref().map(|r| r.sequence());
        let mob_seq = self.mobiles.get(s).map(|m| m.structure.sequence());
        parse_zone(
            spec,
            ref_seq.as_deref(),
            mob_seq.as_deref(),
            self.is_multi(),
            self.current_mode,
        )
    }

    /// Append a fit zone to every structure (or clear them all).
    pub fn set_fit_zone(&mut self, spec: &str) -> Result<()> {
        let spec = spec.trim();
        if !self.user_fit_zone || spec.eq_ignore_ascii_case("CLEAR") || spec == "*" {
            for slot in &mut self.mobiles {
                slot.zones.clear();
            }
            self.user_fit_zone = false;
            if spec.eq_ignore_ascii_case("CLEAR") || spec == "*" {
                self.fitted = false;
                return Ok(());
            }
        }

        for s in 0..self.mobiles.len() {
            let zone = self.parse_zone_for(spec, s)?;
            let reference = self.reference_checked()?;
            let overlap = count_overlaps(
                &zone,
                &self.mobiles[s].zones,
                reference,
                &self.mobiles[s].structure,
            );
            match overlap {
                Some(n) if n > 0 => warn!("new zone overlaps an existing zone"),
                None => warn!("failed to locate new zone in the structures"),
                _ => {}
            }
            self.mobiles[s].zones.push(zone);
        }
        self.fitted = false;
        self.user_fit_zone = true;
        Ok(())
    }

    /// Append an RMS-only zone to every structure (or clear them all).
    pub fn set_rms_zone(&mut self, spec: &str) -> Result<()> {
        let spec = spec.trim();
        if spec.eq_ignore_ascii_case("CLEAR") || spec == "*" {
            for slot in &mut self.mobiles {
                slot.rzones.clear();
            }
            self.user_rms_zone = false;
            return Ok(());
        }
        for s in 0..self.mobiles.len() {
            let zone = self.parse_zone_for(spec, s)?;
            self.mobiles[s].rzones.push(zone);
        }
        self.user_rms_zone = true;
        Ok(())
    }

    /// Remove a fit zone matching the spec exactly; `ALL` clears.
    pub fn del_fit_zone(&mut self, spec: &str) -> Result<()> {
        let spec = spec.trim();
        if spec.eq_ignore_ascii_case("ALL") || spec == "*" {
            for slot in &mut self.mobiles {
                slot.zones.clear();
            }
            self.user_fit_zone = false;
            self.fitted = false;
            return Ok(());
        }
        let mut found = false;
        for s in 0..self.mobiles.len() {
            let zone = self.parse_zone_for(spec, s)?;
            let list = &mut self.mobiles[s].zones;
            if let Some(pos) = list.iter().position(|z| *z == zone) {
                list.remove(pos);
                found = true;
            }
        }
        if found {
            self.fitted = false;
            self.user_fit_zone = self.mobiles.iter().any(|m| !m.zones.is_empty());
            Ok(())
        } else {
            Err(FitError::Reference("no matching zone found".to_string()))
        }
    }

    /// Remove an RMS zone matching the spec exactly; `ALL` clears.
    pub fn del_rms_zone(&mut self, spec: &str) -> Result<()> {
        let spec = spec.trim();
        if spec.eq_ignore_ascii_case("ALL") || spec == "*" {
            for slot in &mut self.mobiles {
                slot.rzones.clear();
            }
            self.user_rms_zone = false;
            return Ok(());
        }
        let mut found = false;
        for s in 0..self.mobiles.len() {
            let zone = self.parse_zone_for(spec, s)?;
            let list = &mut self.mobiles[s].rzones;
            if let Some(pos) = list.iter().position(|z| *z == zone) {
                list.remove(pos);
                found = true;
            }
        }
        if found {
            Ok(())
        } else {
            Err(FitError::Reference("no matching zone found".to_string()))
        }
    }

    /// Set the centre-of-rotation residue from a residue spec (a single
    /// residue per structure, or `CLEAR` to drop the override).
    pub fn set_centre(&mut self, spec: &str) -> Result<()> {
        let spec = spec.trim();
        if spec.eq_ignore_ascii_case("CLEAR") || spec == "*" {
            for slot in &mut self.mobiles {
                slot.czones.clear();
            }
            self.fitted = false;
            return Ok(());
        }

        // Expand `res[:res]` to the zone form `res-res[:res-res]`
        let zone_spec = match spec.find(':') {
            Some(colon) => {
                let (a, b) = (spec[..colon].trim(), spec[colon + 1..].trim());
                format!("{}-{}:{}-{}", a, a, b, b)
            }
            None => format!("{}-{}", spec, spec),
        };

        for s in 0..self.mobiles.len() {
            let zone = self.parse_zone_for(&zone_spec, s)?;
            self.mobiles[s].czones = vec![zone];
        }
        self.fitted = false;
        Ok(())
    }

    pub fn set_mode(&mut self, mode: ZoneMode) {
        self.current_mode = mode;
    }

    pub fn set_iterate(&mut self, on: bool, cutoff: Option<f64>) -> Result<()> {
        if !on {
            self.iterate = false;
            return Ok(());
        }
        if let Some(c) = cutoff {
            self.max_equiv_dist_sq = c * c;
        }
        self.iterate = true;
        self.fit_selector = AtomSelector::parse("CA")?;
        info!("atom selection set to CA only");
        Ok(())
    }

    // ----- fitting ------------------------------------------------------

    fn ensure_default_zones(&mut self) {
        for slot in &mut self.mobiles {
            if slot.zones.is_empty() {
                slot.zones.push(Zone::whole(self.current_mode));
            }
        }
    }

    /// RMS zones and atoms track the fit set at every fit.
    fn copy_fit_to_rms(&mut self) {
        for slot in &mut self.mobiles {
            slot.rzones = slot.zones.clone();
        }
        self.rms_selector = self.fit_selector.clone();
    }

    fn extract_for(&self, s: usize) -> Result<FitArrays> {
        let reference = self.reference_checked()?;
        let slot = self.mobile_checked(s)?;
        let czones = if slot.czones.is_empty() {
            None
        } else {
            Some(slot.czones.as_slice())
        };
        create_fit_arrays(
            reference,
            &slot.structure,
            &slot.zones,
            &self.fit_selector,
            self.bval_gate,
            self.bvalue,
            self.ignore_missing,
            self.sym_table(),
            czones,
        )
    }

    fn do_fit(&mut self, s: usize, arrays: &FitArrays) -> Result<()> {
        let weights: Option<Vec<f64>> = match self.weight_mode {
            WeightMode::None => None,
            WeightMode::BVal => Some(arrays.weights.clone()),
            WeightMode::InvBVal => Some(
                arrays
                    .weights
                    .iter()
                    .map(|&w| 1.0 / w.max(1e-10))
                    .collect(),
            ),
        };
        let rotmat = fit(&arrays.ref_coords, &arrays.mob_coords, weights.as_deref())?;

        let slot = &mut self.mobiles[s];
        slot.rotmat = rotmat;
        slot.centroid = arrays.mob_centroid;
        slot.fitted = Some(apply_transform(
            &slot.structure,
            &rotmat,
            arrays.mob_centroid,
            arrays.ref_centroid,
        ));
        self.ref_centroid = arrays.ref_centroid;
        self.fitted = true;
        self.n_fitted = arrays.len();
        Ok(())
    }

    fn rms_options(&self) -> RmsOptions<'_> {
        RmsOptions {
            selector: &self.rms_selector,
            gate: self.bval_gate,
            bvalue: self.bvalue,
            ignore_missing: self.ignore_missing,
            sym_pairs: self.sym_table(),
            dist_cutoff: self.dist_cutoff,
        }
    }

    /// Overall RMSD of mobile `s`. With `update` set, the reference
    /// coordinates are folded towards the fitted mobile (the averaging
    /// step of the multi-structure driver).
    fn rms_for(&mut self, s: usize, update: bool) -> Result<f64> {
        let policy = if update {
            Some(if self.wt_average {
                UpdatePolicy::Weighted {
                    count: self.mobiles.len(),
                }
            } else {
                UpdatePolicy::Arithmetic
            })
        } else {
            None
        };

        let opts = self.rms_options();
        let slot = self.mobile_checked(s)?;
        let fitted = slot
            .fitted
            .as_ref()
            .ok_or_else(|| FitError::State("structures have not been fitted".to_string()))?;
        let zones = &slot.rzones;

        let report = if update || !self.is_multi() || self.multi_vs_ref {
            let reference = self.reference_checked()?;
            calc_rms(reference, fitted, zones, &opts, policy)?
        } else {
            // Plain multi-structure metrics compare against the fitted
            // copy of the designated reference mobile, falling back to
            // the reference until that mobile has been fitted
            match self.mobiles[self.multi_ref].fitted.as_ref() {
                Some(ref_side) => calc_rms(ref_side, fitted, zones, &opts, None)?,
                None => calc_rms(self.reference_checked()?, fitted, zones, &opts, None)?,
            }
        };

        if update {
            if let Some(reference) = self.reference.as_mut() {
                apply_updates(reference, &report.updates);
            }
        }
        Ok(report.rms)
    }

    /// Iterative zone updating: re-equivalence C-alpha atoms of the
    /// reference and the fitted mobile by spatial proximity, rebuild the
    /// zones and re-extract.
    fn update_fit_arrays(&mut self, s: usize) -> Result<FitArrays> {
        info!("updating fitting zones");
        let reference = self.reference_checked()?;
        let slot = self.mobile_checked(s)?;
        let fitted = slot
            .fitted
            .as_ref()
            .ok_or_else(|| FitError::State("structure has not been fitted".to_string()))?;

        let ref_ca: Vec<&Atom> = reference
            .select_raw(" CA ")
            .into_iter()
            .map(|i| &reference.atoms[i])
            .collect();
        let mob_ca: Vec<&Atom> = fitted
            .select_raw(" CA ")
            .into_iter()
            .map(|i| &fitted.atoms[i])
            .collect();

        let aln = align_on_distances(&ref_ca, &mob_ca)
            .ok_or_else(|| FitError::State("unable to perform alignment".to_string()))?;
        let zones = zones_from_alignment(
            &aln.ref_aligned,
            &aln.mob_aligned,
            1,
            1,
            Some((&ref_ca, &mob_ca, self.max_equiv_dist_sq)),
            self.limit,
        );
        if zones.is_empty() {
            return Err(FitError::Degenerate(
                "no equivalences within distance cutoff".to_string(),
            ));
        }
        self.mobiles[s].zones = zones;
        self.user_fit_zone = true;
        self.extract_for(s)
    }

    /// Fit one structure, running the iterative refinement loop when
    /// ITERATE is on. Returns the final RMSD (without reference update).
    fn fit_one(&mut self, s: usize) -> Result<f64> {
        let arrays = self.extract_for(s)?;
        self.do_fit(s, &arrays)?;

        if self.iterate {
            let mut last_rms: Option<f64> = None;
            for _iter in 0..MAX_ITER {
                let arrays = self.update_fit_arrays(s)?;
                self.do_fit(s, &arrays)?;
                let rms = self.rms_for(s, false)?;
                if let Some(last) = last_rms {
                    if (rms - last).abs() < ITER_STOP {
                        break;
                    }
                    if rms > last + ITER_STOP {
                        // Guard against oscillation; keep the new zones
                        // but stop refining
                        warn!("iterative refinement stopped after RMSD increase");
                        break;
                    }
                }
                last_rms = Some(rms);
            }
        }
        self.rms_for(s, false)
    }

    /// The FIT command: single-structure fit, or the multi-structure
    /// driver with its iteratively averaged reference.
    pub fn fit_structures(&mut self, w: &mut dyn Write) -> Result<()> {
        self.reference_checked()?;
        if self.mobiles.is_empty() {
            return Err(FitError::State("mobile structure undefined".to_string()));
        }
        info!("fitting structures");
        self.fitted = false;
        self.ensure_default_zones();
        self.copy_fit_to_rms();

        if self.is_multi() {
            self.multi_fit_loop(None, w)?;
        } else {
            let rms = self.fit_one(0)?;
            writeln!(w, "   RMS: {:.3}", rms)?;
        }
        Ok(())
    }

    /// Core of the multi-structure driver: repeatedly fit every mobile
    /// onto the averaged reference, folding the reference towards each
    /// fitted mobile, until the total RMSD converges; then one final
    /// pass with updates disabled.
    fn multi_fit_loop(&mut self, order: Option<&[usize]>, w: &mut dyn Write) -> Result<()> {
        let indices: Vec<usize> = match order {
            Some(o) => o.to_vec(),
            None => (0..self.mobiles.len()).collect(),
        };

        let mut rms_prev = -100.0f64;
        let mut final_pass = false;
        for niter in 0.. {
            info!("multi-structure fit iteration {}", niter);
            let mut rms_total = 0.0;
            for &s in &indices {
                let arrays = self.extract_for(s)?;
                self.do_fit(s, &arrays)?;
                if self.iterate && !final_pass {
                    let mut last_rms: Option<f64> = None;
                    for _ in 0..MAX_ITER {
                        let arrays = self.update_fit_arrays(s)?;
                        self.do_fit(s, &arrays)?;
                        let rms = self.rms_for(s, false)?;
                        if let Some(last) = last_rms {
                            if (rms - last).abs() < ITER_STOP {
                                break;
                            }
                        }
                        last_rms = Some(rms);
                    }
                }
                // Fold the reference towards this mobile except on the
                // final pass
                let rms = self.rms_for(s, !final_pass)?;
                rms_total += rms;
            }

            if final_pass {
                for &s in &indices {
                    let rms = self.rms_for(s, false)?;
                    writeln!(w, "   Structure {:2}  RMS: {:.3}", s + 1, rms)?;
                }
                break;
            }

            let delta = rms_total - rms_prev;
            rms_prev = rms_total;
            if delta.abs() < MULTI_ITER_STOP || niter > MAX_MULTI_ITER {
                final_pass = true;
            }
        }
        Ok(())
    }

    /// The NOFIT command: mark everything fitted with the identity
    /// transform so RMS and friends work without a superposition.
    pub fn nofit_structures(&mut self) -> Result<()> {
        self.reference_checked()?;
        if self.mobiles.is_empty() {
            return Err(FitError::State("mobile structure undefined".to_string()));
        }
        self.ensure_default_zones();
        self.copy_fit_to_rms();
        for slot in &mut self.mobiles {
            if slot.fitted.is_none() {
                slot.fitted = Some(slot.structure.clone());
            }
            slot.rotmat = IDENTITY;
        }
        self.fitted = true;
        Ok(())
    }

    /// Fit a single structure once (optionally with the full multi
    /// convergence loop) and return its RMSD; used by the all-vs-all and
    /// order-fit machinery.
    fn fit_single_structure(&mut self, s: usize, single_iteration: bool) -> Result<f64> {
        self.ensure_default_zones();
        self.copy_fit_to_rms();
        if !self.is_multi() || single_iteration {
            return self.fit_one(s);
        }
        let mut rms_prev = -100.0f64;
        for _ in 0..=MAX_MULTI_ITER {
            let arrays = self.extract_for(s)?;
            self.do_fit(s, &arrays)?;
            let rms = self.rms_for(s, true)?;
            let delta = rms - rms_prev;
            rms_prev = rms;
            if delta.abs() < MULTI_ITER_STOP {
                break;
            }
        }
        self.rms_for(s, false)
    }

    // ----- reporting ----------------------------------------------------

    fn require_fitted(&self) -> Result<()> {
        if self.fitted {
            Ok(())
        } else {
            Err(FitError::State(
                "structures have not been fitted".to_string(),
            ))
        }
    }

    pub fn show_rms(&mut self, w: &mut dyn Write) -> Result<()> {
        self.require_fitted()?;
        for s in 0..self.mobiles.len() {
            let rms = self.rms_for(s, false)?;
            if self.is_multi() {
                writeln!(w, "   Structure {:2}  RMS: {:.3}", s + 1, rms)?;
            } else {
                writeln!(w, "   RMS: {:.3}", rms)?;
            }
        }
        Ok(())
    }

    fn report_ref_side(&self, _s: usize) -> Result<&Structure> {
        if self.is_multi() && !self.multi_vs_ref {
            self.mobiles[self.multi_ref]
                .fitted
                .as_ref()
                .ok_or_else(|| FitError::State("structures have not been fitted".to_string()))
        } else {
            self.reference_checked()
        }
    }

    pub fn show_residue_rms(&self, w: &mut dyn Write) -> Result<()> {
        self.require_fitted()?;
        for (s, slot) in self.mobiles.iter().enumerate() {
            let fitted = slot
                .fitted
                .as_ref()
                .ok_or_else(|| FitError::State("structures have not been fitted".to_string()))?;
            if self.is_multi() {
                writeln!(w, "\n   Mobile Structure: {}", s + 1)?;
            }
            residue_rms(
                self.report_ref_side(s)?,
                fitted,
                &slot.rzones,
                &self.rms_options(),
                w,
            )?;
        }
        Ok(())
    }

    pub fn show_pair_distances(&self, w: &mut dyn Write) -> Result<()> {
        self.require_fitted()?;
        for (s, slot) in self.mobiles.iter().enumerate() {
            let fitted = slot
                .fitted
                .as_ref()
                .ok_or_else(|| FitError::State("structures have not been fitted".to_string()))?;
            if self.is_multi() {
                writeln!(w, "\n   Mobile Structure: {}", s + 1)?;
            }
            pair_distances(
                self.report_ref_side(s)?,
                fitted,
                &slot.rzones,
                &self.rms_options(),
                w,
            )?;
        }
        Ok(())
    }

    pub fn show_nfitted(&self, w: &mut dyn Write) -> Result<()> {
        if self.fitted && self.n_fitted > 0 {
            writeln!(w, "   Number of fitted atoms: {}", self.n_fitted)?;
        } else {
            writeln!(w, "   Structures have not been fitted")?;
        }
        Ok(())
    }

    /// Print centroids, rotation matrices and translation vectors.
    pub fn show_matrix(&self, w: &mut dyn Write) -> Result<()> {
        if !self.fitted {
            warn!("structures have not yet been fitted");
        }
        if !self.is_multi() {
            let slot = self.mobile_checked(0)?;
            writeln!(w, "   Reference CofG...")?;
            let rc = self.ref_centroid;
            writeln!(w, "   {:8.4} {:8.4} {:8.4}", rc[0], rc[1], rc[2])?;
            writeln!(w, "   Mobile CofG...")?;
            let mc = slot.centroid;
            writeln!(w, "   {:8.4} {:8.4} {:8.4}", mc[0], mc[1], mc[2])?;
            writeln!(w, "   Rotation matrix...")?;
            for row in &slot.rotmat {
                writeln!(w, "   {:8.4} {:8.4} {:8.4}", row[0], row[1], row[2])?;
            }
            writeln!(w, "   Translation vector (between CofGs)...")?;
            writeln!(
                w,
                "   {:8.4} {:8.4} {:8.4}",
                rc[0] - mc[0],
                rc[1] - mc[1],
                rc[2] - mc[2]
            )?;
            return Ok(());
        }

        // Multi mode: express everything relative to the designated
        // reference mobile unless comparing against the averaged
        // reference
        let inv_ref = transpose33(&self.mobiles[self.multi_ref].rotmat);
        for (s, slot) in self.mobiles.iter().enumerate() {
            writeln!(w, "   Structure {} CofG...", s + 1)?;
            let mc = slot.centroid;
            writeln!(w, "   {:8.4} {:8.4} {:8.4}", mc[0], mc[1], mc[2])?;
        }
        writeln!(w, "   Rotation matrix...")?;
        for (s, slot) in self.mobiles.iter().enumerate() {
            writeln!(w, "   Structure {}:", s + 1)?;
            let m = if self.multi_vs_ref {
                slot.rotmat
            } else {
                mat_mult33(&slot.rotmat, &inv_ref)
            };
            for row in &m {
                writeln!(w, "   {:8.4} {:8.4} {:8.4}", row[0], row[1], row[2])?;
            }
        }
        writeln!(w, "   Translation vector (between CofGs)...")?;
        let origin = if self.multi_vs_ref {
            self.ref_centroid
        } else {
            self.mobiles[self.multi_ref].centroid
        };
        for (s, slot) in self.mobiles.iter().enumerate() {
            writeln!(w, "   Structure {}:", s + 1)?;
            let mc = slot.centroid;
            writeln!(
                w,
                "   {:8.4} {:8.4} {:8.4}",
                origin[0] - mc[0],
                origin[1] - mc[1],
                origin[2] - mc[2]
            )?;
        }
        Ok(())
    }

    // ----- output -------------------------------------------------------

    /// Write fitted coordinates of mobile `s`, or the reference when `s`
    /// is `None`. With CENTRE on, coordinates are shifted so the fit
    /// centroid sits at the origin.
    pub fn write_coordinates(&self, path: &Path, s: Option<usize>) -> Result<()> {
        self.require_fitted()?;
        let source: &Structure = match s {
            None => self.reference_checked()?,
            Some(s) => self
                .mobile_checked(s)?
                .fitted
                .as_ref()
                .ok_or_else(|| FitError::State("fitting has not been performed".to_string()))?,
        };

        info!("writing coordinates to {}", path.display());
        if self.centre_on_origin {
            let mut copy = source.clone();
            for atom in &mut copy.atoms {
                if atom.is_undefined() {
                    continue;
                }
                atom.x -= self.ref_centroid[0];
                atom.y -= self.ref_centroid[1];
                atom.z -= self.ref_centroid[2];
            }
            write_structure_file(path, &copy, self.read_header)
        } else {
            write_structure_file(path, source, self.read_header)
        }
    }

    /// Write every fitted mobile to `<stem>.<ext>`.
    pub fn write_multi(&self, ext: &str) -> Result<()> {
        for (s, slot) in self.mobiles.iter().enumerate() {
            let stem = slot
                .filename
                .rsplit_once('.')
                .map(|(stem, _)| stem)
                .unwrap_or(&slot.filename);
            let path = format!("{}.{}", stem, ext);
            self.write_coordinates(Path::new(&path), Some(s))?;
        }
        Ok(())
    }

    // ----- alignment-derived zones --------------------------------------

    fn set_zones_replacing(&mut self, s: usize, zones: Vec<Zone>, append: bool) {
        let slot = &mut self.mobiles[s];
        if append && !slot.zones.is_empty() {
            slot.zones.extend(zones);
        } else {
            slot.zones = zones;
        }
        self.user_fit_zone = self.mobiles.iter().any(|m| !m.zones.is_empty());
        self.fitted = false;
    }

    /// Chain-by-chain pairwise alignment (the ALIGN default).
    fn align_chains(&mut self, s: usize, w: &mut dyn Write) -> Result<()> {
        let reference = self.reference_checked()?;
        let slot = self.mobile_checked(s)?;
        writeln!(w, "\n   Mobile Structure: {:2}", s + 1)?;

        let ref_seq_all = strip_chain_breaks(&reference.sequence());
        let mob_seq_all = strip_chain_breaks(&slot.structure.sequence());
        let ref_chains = reference.chain_spans();
        let mob_chains = slot.structure.chain_spans();
        if ref_chains.len() != mob_chains.len() {
            warn!("number of chains does not match");
        }

        let ref_file = self.ref_filename.clone();
        let mob_file = slot.filename.clone();
        let mut all_zones: Vec<Zone> = Vec::new();
        for (rc, mc) in ref_chains.iter().zip(mob_chains.iter()) {
            let ref_seq = truncate_seq(&ref_seq_all, rc.start, rc.stop);
            let mob_seq = truncate_seq(&mob_seq_all, mc.start, mc.stop);
            let aln = affine_align(&ref_seq, &mob_seq, &self.matrix, self.gap_open, self.gap_ext);

            writeln!(w, "   {} Chain '{}'", ref_file, rc.label)?;
            writeln!(w, "   {} Chain '{}'", mob_file, mc.label)?;
            writeln!(
                w,
                "   Score: {} Normalised score: {:.2}",
                aln.score,
                aln.score as f64 / ref_seq.len().min(mob_seq.len()).max(1) as f64
            )?;
            print_nice_alignment(w, &aln.ref_aligned, &aln.mob_aligned)?;

            all_zones.extend(zones_from_alignment(
                &aln.ref_aligned,
                &aln.mob_aligned,
                rc.start as i32,
                mc.start as i32,
                None,
                None,
            ));
        }
        self.set_zones_replacing(s, all_zones, false);
        Ok(())
    }

    /// Whole-sequence alignment across chain breaks; the resulting zones
    /// are round-tripped through residue numbering so they fragment at
    /// chain boundaries.
    fn align_whole(&mut self, s: usize, w: &mut dyn Write) -> Result<()> {
        let reference = self.reference_checked()?;
        let slot = self.mobile_checked(s)?;

        let ref_seq = strip_chain_breaks(&reference.sequence());
        let mob_seq = strip_chain_breaks(&slot.structure.sequence());
        let aln = affine_align(&ref_seq, &mob_seq, &self.matrix, self.gap_open, self.gap_ext);

        writeln!(w, "   Mobile Structure: {:2}", s + 1)?;
        writeln!(w, "   {} vs {}", self.ref_filename, slot.filename)?;
        writeln!(
            w,
            "   Score: {} Normalised score: {:.2}",
            aln.score,
            aln.score as f64 / ref_seq.len().min(mob_seq.len()).max(1) as f64
        )?;
        print_nice_alignment(w, &aln.ref_aligned, &aln.mob_aligned)?;

        let mut zones =
            zones_from_alignment(&aln.ref_aligned, &aln.mob_aligned, 1, 1, None, self.limit);
        let reference = self.reference_checked()?;
        let mobile = &self.mobiles[s].structure;
        convert_zone_list(&mut zones, reference, mobile, ZoneMode::Resnum);
        convert_zone_list(&mut zones, reference, mobile, ZoneMode::Sequential);
        merge_zones(&mut zones);
        self.set_zones_replacing(s, zones, false);
        Ok(())
    }

    /// Pairwise alignment restricted to one zone.
    fn align_zone(&mut self, s: usize, spec: &str, append: bool, w: &mut dyn Write) -> Result<()> {
        let zone = self.parse_zone_for(spec, s)?;
        let reference = self.reference_checked()?;
        let slot = self.mobile_checked(s)?;
        let zone = crate::zones::residue_to_sequential(&zone, reference, &slot.structure)?;

        let ref_seq = strip_chain_breaks(&reference.sequence());
        let mob_seq = strip_chain_breaks(&slot.structure.sequence());
        let ref_part = truncate_seq(&ref_seq, zone.start1 as usize, zone.stop1 as usize);
        let mob_part = truncate_seq(&mob_seq, zone.start2 as usize, zone.stop2 as usize);

        let aln = affine_align(&ref_part, &mob_part, &self.matrix, self.gap_open, self.gap_ext);
        writeln!(w, "\n   Mobile Structure: {:2}", s + 1)?;
        writeln!(
            w,
            "   {}-{} vs {}-{} (Sequential numbering)",
            zone.start1, zone.stop1, zone.start2, zone.stop2
        )?;
        writeln!(
            w,
            "   Score: {} Normalised score: {:.2}",
            aln.score,
            aln.score as f64 / ref_part.len().min(mob_part.len()).max(1) as f64
        )?;
        print_nice_alignment(w, &aln.ref_aligned, &aln.mob_aligned)?;

        let zones = zones_from_alignment(
            &aln.ref_aligned,
            &aln.mob_aligned,
            zone.start1,
            zone.start2,
            None,
            None,
        );
        if zones.is_empty() {
            warn!("no matching zones found");
        }
        self.set_zones_replacing(s, zones, append);
        Ok(())
    }

    /// The ALIGN command: chain-by-chain by default, `WHOLE`/`*` for one
    /// alignment across breaks, or a zone spec (with optional APPEND).
    pub fn align(&mut self, argument: Option<&str>, append: bool, w: &mut dyn Write) -> Result<()> {
        self.reference_checked()?;
        if self.mobiles.is_empty() {
            return Err(FitError::State("structures have not been read".to_string()));
        }
        for s in 0..self.mobiles.len() {
            match argument {
                None => self.align_chains(s, w)?,
                Some(a) if a.eq_ignore_ascii_case("WHOLE") || a == "*" => self.align_whole(s, w)?,
                Some(spec) => self.align_zone(s, spec, append, w)?,
            }
        }
        self.fitted = false;
        Ok(())
    }

    /// READALIGNMENT: derive zones from a PIR file whose first record is
    /// the reference.
    pub fn read_alignment(&mut self, path: &Path) -> Result<()> {
        let entries = read_pir(path)?;
        let reference = self.reference_checked()?;
        check_alignment_sequence("reference", &entries[0].sequence, &reference.sequence());
        let ref_string = chain_breaks_to_gaps(&entries[0].sequence);

        if entries.len() < self.mobiles.len() + 1 {
            warn!("insufficient sequences in alignment file; fitting may fail");
        }
        if entries.len() > self.mobiles.len() + 1 {
            warn!("alignment file contains more sequences than there are structures");
        }

        for (s, entry) in entries.iter().skip(1).enumerate() {
            if s >= self.mobiles.len() {
                break;
            }
            check_alignment_sequence(
                "mobile",
                &entry.sequence,
                &self.mobiles[s].structure.sequence(),
            );
            let mob_string = chain_breaks_to_gaps(&entry.sequence);
            let (ref_dedup, mob_dedup) = remove_double_deletions(&ref_string, &mob_string);
            let zones = zones_from_alignment(&ref_dedup, &mob_dedup, 1, 1, None, self.limit);
            self.set_zones_replacing(s, zones, false);
        }

        // Round-trip the numbering so zones fragment at chain breaks
        self.convert_all_zones(ZoneMode::Resnum)?;
        self.convert_all_zones(ZoneMode::Sequential)?;
        Ok(())
    }

    /// PRINTALIGN: render the fit zones as an alignment (plain text,
    /// pseudo-FASTA or PIR).
    pub fn print_align(&mut self, format: PrintAlignFormat, w: &mut dyn Write) -> Result<()> {
        if !self.user_fit_zone {
            return Err(FitError::State("no user-defined zones found".to_string()));
        }
        self.convert_all_zones(ZoneMode::Sequential)?;
        self.sort_all_zones();

        let reference = self.reference_checked()?;
        let ref_seq = strip_chain_breaks(&reference.sequence());
        let ref_breaks: Vec<usize> = reference
            .chain_spans()
            .iter()
            .map(|c| c.stop)
            .collect();
        let ref_file = self.ref_filename.clone();

        for (s, slot) in self.mobiles.iter().enumerate() {
            writeln!(w, "\n   Mobile Structure: {:2}", s + 1)?;
            let mob_seq = strip_chain_breaks(&slot.structure.sequence());
            if !sequential_zones(&slot.zones) {
                writeln!(w, "   Error: could not convert zones to alignment.")?;
                writeln!(w, "          Zones must not overlap and must be in")?;
                writeln!(w, "          sequence along the chain.")?;
                continue;
            }
            let (ref_aln, mob_aln) = alignment_from_zones(&ref_seq, &mob_seq, &slot.zones)?;
            match format {
                PrintAlignFormat::Text => {
                    writeln!(w, "   {}", ref_file)?;
                    writeln!(w, "   {}", slot.filename)?;
                    print_nice_alignment(w, &ref_aln, &mob_aln)?;
                }
                PrintAlignFormat::Fasta => {
                    writeln!(w, "   >{}", ref_file)?;
                    print_sequence(w, &ref_aln)?;
                    writeln!(w, "   >{}", slot.filename)?;
                    print_sequence(w, &mob_aln)?;
                    writeln!(w)?;
                }
                PrintAlignFormat::Pir => {
                    let mob_breaks: Vec<usize> =
                        slot.structure.chain_spans().iter().map(|c| c.stop).collect();
                    let ref_marked = reinsert_breaks(&ref_aln, &ref_breaks);
                    let mob_marked = reinsert_breaks(&mob_aln, &mob_breaks);
                    print_sequence_pir(w, "reference", &ref_file, &ref_marked)?;
                    print_sequence_pir(w, &format!("mobile{}", s + 1), &slot.filename, &mob_marked)?;
                }
            }
        }
        Ok(())
    }

    // ----- zone bookkeeping across structures ---------------------------

    pub fn convert_all_zones(&mut self, mode: ZoneMode) -> Result<()> {
        let reference = match self.reference.as_ref() {
            Some(r) => r.clone(),
            None => return Ok(()),
        };
        let mut failures = 0;
        for slot in &mut self.mobiles {
            failures += convert_zone_list(&mut slot.zones, &reference, &slot.structure, mode);
            failures += convert_zone_list(&mut slot.rzones, &reference, &slot.structure, mode);
            failures += convert_zone_list(&mut slot.czones, &reference, &slot.structure, mode);
        }
        if failures > 0 {
            return Err(FitError::Reference(format!(
                "could not convert {} zone(s)",
                failures
            )));
        }
        Ok(())
    }

    pub fn sort_all_zones(&mut self) {
        for slot in &mut self.mobiles {
            sort_zone_list(&mut slot.zones);
            sort_zone_list(&mut slot.rzones);
        }
    }

    /// TRIMZONES: restrict every mobile's fit zones to the reference
    /// ranges covered by all mobiles, renumbering correspondingly.
    pub fn trim_zones(&mut self) -> Result<()> {
        if !self.user_fit_zone {
            return Err(FitError::State("no user-defined zones found".to_string()));
        }
        info!("finding common zones");
        // Round-trip so sequential numbering fragments at chain breaks
        self.convert_all_zones(ZoneMode::Resnum)?;
        self.convert_all_zones(ZoneMode::Sequential)?;

        let mut overlap: Option<Vec<Zone>> = None;
        for slot in &self.mobiles {
            overlap = Some(match overlap {
                None => slot.zones.clone(),
                Some(acc) => overlapping_zones(&acc, &slot.zones),
            });
        }
        let overlap = overlap.unwrap_or_default();
        if overlap.is_empty() {
            return Err(FitError::State("no common zones found".to_string()));
        }

        for slot in &mut self.mobiles {
            slot.zones = renumber_zones(&slot.zones, &overlap);
        }
        self.fitted = false;
        self.user_fit_zone = true;
        Ok(())
    }

    /// Promote mobile `n` to reference: the reference coordinates are
    /// replaced by a duplicate (never an alias) of that mobile, and the
    /// reference side of every zone is renumbered from its zones.
    pub fn set_mobile_as_reference(&mut self, n: usize) -> Result<()> {
        let slot = self.mobile_checked(n)?;
        let new_reference = slot.structure.clone();
        let new_ref_filename = slot.filename.clone();
        self.reference = Some(new_reference);
        self.ref_filename = new_ref_filename;

        if self.user_fit_zone {
            let source_zones = self.mobiles[n].zones.clone();
            let source_rzones = self.mobiles[n].rzones.clone();
            let source_czones = self.mobiles[n].czones.clone();
            for slot in &mut self.mobiles {
                renumber_ref_side(&mut slot.zones, &source_zones);
                renumber_ref_side(&mut slot.rzones, &source_rzones);
                renumber_ref_side(&mut slot.czones, &source_czones);
            }
        }
        Ok(())
    }

    /// SETREF n: designate a mobile as the comparison reference.
    pub fn set_reference(&mut self, n: usize) -> Result<()> {
        if !self.is_multi() {
            return Err(FitError::State(
                "SETREF can only be used with MULTI".to_string(),
            ));
        }
        if n >= self.mobiles.len() {
            return Err(FitError::Parse(format!(
                "structure number must be between 1 and {}",
                self.mobiles.len()
            )));
        }
        self.set_mobile_as_reference(n)?;
        self.multi_ref = n;
        info!("reference set to mobile {}", n + 1);
        Ok(())
    }

    /// All-vs-all RMSD matrix: each mobile is promoted to reference in
    /// turn and every other mobile fitted onto it in a single
    /// non-updating pass. Optionally writes the tab-separated matrix and
    /// optionally selects the most central mobile as reference.
    pub fn all_vs_all(
        &mut self,
        w: Option<&mut dyn Write>,
        set_ref: bool,
    ) -> Result<Vec<Vec<f64>>> {
        if !self.is_multi() {
            return Err(FitError::State(
                "all vs all comparison can only be used with MULTI".to_string(),
            ));
        }
        if self.iterate {
            return Err(FitError::State(
                "all vs all comparison cannot be used with iterative zones".to_string(),
            ));
        }

        let n = self.mobiles.len();
        let saved_multi_vs_ref = self.multi_vs_ref;
        self.multi_vs_ref = true;

        if self.user_fit_zone {
            self.trim_zones()?;
        }

        let mut all_rms = vec![vec![0.0f64; n]; n];
        for i in 0..n - 1 {
            self.set_mobile_as_reference(i)?;
            for j in i + 1..n {
                let rms = self.fit_single_structure(j, true)?;
                all_rms[i][j] = rms;
                all_rms[j][i] = rms;
            }
        }

        if let Some(w) = w {
            for i in 0..n {
                write!(w, "\t{}", i + 1)?;
            }
            writeln!(w)?;
            for i in 0..n {
                write!(w, "{}", i + 1)?;
                for j in 0..n {
                    write!(w, "\t{:.3}", all_rms[i][j])?;
                }
                writeln!(w)?;
            }
        }

        if set_ref {
            let mut best = 0;
            let mut best_sum = f64::MAX;
            for (i, row) in all_rms.iter().enumerate() {
                let sum: f64 = row.iter().sum();
                if sum < best_sum {
                    best_sum = sum;
                    best = i;
                }
            }
            self.set_mobile_as_reference(best)?;
            self.multi_ref = best;
            info!("mobile structure {} used as reference", best + 1);
        } else {
            self.set_mobile_as_reference(self.multi_ref)?;
        }

        self.multi_vs_ref = saved_multi_vs_ref;
        Ok(all_rms)
    }

    /// ORDERFIT: fit mobiles in ascending order of their pairwise RMSD
    /// to the reference.
    pub fn order_fit(&mut self, w: &mut dyn Write) -> Result<()> {
        if !self.is_multi() {
            return Err(FitError::State(
                "ORDERFIT can only be used with multiple structures".to_string(),
            ));
        }
        info!("setting fit order");
        let saved_iterate = self.iterate;
        self.iterate = false;
        let mut scores: Vec<(usize, f64)> = Vec::with_capacity(self.mobiles.len());
        for s in 0..self.mobiles.len() {
            let rms = self.fit_single_structure(s, true)?;
            scores.push((s, rms));
        }
        self.iterate = saved_iterate;

        scores.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        let order: Vec<usize> = scores.iter().map(|(s, _)| *s).collect();

        self.fitted = false;
        self.ensure_default_zones();
        self.copy_fit_to_rms();
        self.multi_fit_loop(Some(&order), w)
    }

    // ----- status -------------------------------------------------------

    pub fn show_status(&self, w: &mut dyn Write) -> Result<()> {
        writeln!(w, "   Reference structure: {}", self.ref_filename)?;
        for (s, slot) in self.mobiles.iter().enumerate() {
            let marker = if self.is_multi() && s == self.multi_ref {
                " (reference)"
            } else {
                ""
            };
            writeln!(w, "   Mobile structure {}: {}{}", s + 1, slot.filename, marker)?;
        }
        writeln!(w, "   Numbering mode: {}", self.current_mode)?;
        writeln!(w, "   Fitted: {}", if self.fitted { "yes" } else { "no" })?;

        let fmt_selector = |sel: &AtomSelector| {
            let names = sel.specs().join(", ");
            if sel.negated() {
                format!("NOT {}", names)
            } else {
                names
            }
        };
        writeln!(w, "   Fit atoms: {}", fmt_selector(&self.fit_selector))?;
        writeln!(w, "   RMS atoms: {}", fmt_selector(&self.rms_selector))?;

        for (s, slot) in self.mobiles.iter().enumerate() {
            writeln!(w, "   Fit zones for structure {}:", s + 1)?;
            if slot.zones.is_empty() {
                writeln!(w, "      All residues")?;
            }
            for z in &slot.zones {
                writeln!(w, "      {}", z)?;
            }
            if !slot.czones.is_empty() {
                for z in &slot.czones {
                    writeln!(w, "      Centred on {}", z)?;
                }
            }
        }

        writeln!(
            w,
            "   Weighting: {}",
            match self.weight_mode {
                WeightMode::None => "none",
                WeightMode::BVal => "B-values",
                WeightMode::InvBVal => "inverse B-values",
            }
        )?;
        match self.bval_gate {
            BValGate::Off => writeln!(w, "   B-value cutoff: off")?,
            BValGate::Both => writeln!(w, "   B-value cutoff: {} (both)", self.bvalue)?,
            BValGate::RefOnly => writeln!(w, "   B-value cutoff: {} (reference)", self.bvalue)?,
            BValGate::MobOnly => writeln!(w, "   B-value cutoff: {} (mobile)", self.bvalue)?,
        }
        match self.dist_cutoff {
            Some(c) => writeln!(w, "   Distance cutoff: {:.2}", c)?,
            None => writeln!(w, "   Distance cutoff: off")?,
        }
        writeln!(
            w,
            "   Gap penalties: open {} extend {}",
            self.gap_open, self.gap_ext
        )?;
        writeln!(
            w,
            "   Iterative zone updating: {}",
            if self.iterate { "on" } else { "off" }
        )?;
        writeln!(
            w,
            "   Ignore missing atoms: {}",
            if self.ignore_missing { "yes" } else { "no" }
        )?;
        writeln!(
            w,
            "   HETATM records: {}",
            if self.het_atoms { "read" } else { "ignored" }
        )?;
        writeln!(w, "   Occupancy rank: {}", self.occ_rank)?;
        writeln!(
            w,
            "   Match symmetric atoms: {}",
            if self.match_sym_atoms { "on" } else { "off" }
        )?;
        for pair in &self.sym_pairs {
            writeln!(
                w,
                "     {}{} -{}  {}",
                pair.resnam,
                pair.atom_a,
                pair.atom_b,
                if pair.enabled { "ON" } else { "OFF" }
            )?;
        }
        writeln!(
            w,
            "   Reference update: {}",
            if self.wt_average {
                "weighted average"
            } else {
                "arithmetic mean"
            }
        )?;
        Ok(())
    }

    /// SYMMATOMS: toggle matching globally, per residue type, or list
    /// the table.
    pub fn set_symmatoms(&mut self, args: &[&str], w: &mut dyn Write) -> Result<()> {
        if !args.is_empty() {
            let first = args[0].to_uppercase();
            let second = args.get(1).map(|s| s.to_uppercase());
            match first.as_str() {
                "ON" => self.match_sym_atoms = true,
                "OFF" => self.match_sym_atoms = false,
                "ALL" => {
                    let enable = second.as_deref() != Some("OFF");
                    self.match_sym_atoms = enable || self.match_sym_atoms;
                    if second.as_deref() == Some("OFF") {
                        self.match_sym_atoms = false;
                    }
                    for pair in &mut self.sym_pairs {
                        pair.enabled = enable;
                    }
                }
                res => {
                    let enable = second.as_deref() != Some("OFF");
                    let mut known = false;
                    for pair in &mut self.sym_pairs {
                        if pair.resnam.trim() == res {
                            pair.enabled = enable;
                            known = true;
                        }
                    }
                    if !known {
                        return Err(FitError::Parse(format!(
                            "unknown residue type: {}",
                            args[0]
                        )));
                    }
                    if second.as_deref() == Some("ON") || second.is_none() {
                        self.match_sym_atoms = true;
                    }
                }
            }
        }

        writeln!(
            w,
            "   Match symmetric atoms is {}",
            if self.match_sym_atoms { "ON" } else { "OFF" }
        )?;
        writeln!(w, "   Atom pairs matched:")?;
        for pair in &self.sym_pairs {
            writeln!(
                w,
                "     {}{} -{}  {}",
                pair.resnam,
                pair.atom_a,
                pair.atom_b,
                if pair.enabled { " ON" } else { "OFF" }
            )?;
        }
        Ok(())
    }
}

/// Replace the reference half of each zone with the mobile half of the
/// promoted structure's corresponding zone.
fn renumber_ref_side(zones: &mut [Zone], source: &[Zone]) {
    for (za, zb) in zones.iter_mut().zip(source.iter()) {
        za.chain1 = zb.chain2.clone();
        za.start1 = zb.start2;
        za.startinsert1 = zb.startinsert2;
        za.stop1 = zb.stop2;
        za.stopinsert1 = zb.stopinsert2;
    }
}

/// Re-insert chain-break markers into an aligned string after the given
/// residue ordinals (the last residue of each chain but the final one).
fn reinsert_breaks(aligned: &str, chain_stops: &[usize]) -> String {
    let mut out = String::new();
    let mut count = 0usize;
    let stops: Vec<usize> = chain_stops
        .iter()
        .copied()
        .take(chain_stops.len().saturating_sub(1))
        .collect();
    for c in aligned.chars() {
        out.push(c);
        if c != '-' {
            count += 1;
            if stops.contains(&count) {
                out.push('*');
            }
        }
    }
    out
}

/// Output format for PRINTALIGN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintAlignFormat {
    Text,
    Fasta,
    Pir,
}
