use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use log::warn;

use crate::atoms::{pad4, raw_name, Atom, Structure};
use crate::error::{FitError, Result};

/// Options applied while flattening a parsed file into the atom model.
#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    /// Keep HETATM records.
    pub het_atoms: bool,
    /// Which occupancy rank to keep for multi-occupancy atoms (1-based).
    pub occ_rank: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            het_atoms: false,
            occ_rank: 1,
        }
    }
}

// Elements whose two-letter symbol starts an atom name in column 13.
const TWO_LETTER_IONS: &[&str] = &[
    "NA", "MG", "CL", "CA", "MN", "FE", "CO", "NI", "CU", "ZN", "SE", "BR", "CD", "HG",
];

/// Guess the element-symbol width of an atom name. PDB names of
/// single-letter elements start in column 14, so the guess decides the
/// raw name; metal ions (atom name equal to the residue name on a
/// HETATM) get the two-letter form, which keeps calcium (`CA  `)
/// distinct from C-alpha (` CA `).
fn element_width(name: &str, het: bool, resnam: &str) -> usize {
    let name = name.trim();
    if name.len() >= 4 {
        return 1;
    }
    if name.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        // Digit-led hydrogen names occupy the full four columns
        return 2;
    }
    if het {
        let lead: String = name.chars().take(2).collect::<String>().to_uppercase();
        if TWO_LETTER_IONS.contains(&lead.as_str()) && name.eq_ignore_ascii_case(resnam.trim()) {
            return 2;
        }
    }
    1
}

/// Read a PDB file into the flat atom model. The pdbtbx hierarchy is
/// walked in input order; HETATM filtering, occupancy-rank selection and
/// the ILE CD fix are applied during flattening, and raw header/trailer
/// records are captured for later writing.
pub fn read_structure(path: &Path, opts: &LoadOptions) -> Result<Structure> {
    let pathstr = path.display().to_string();
    let (pdb, _errors) = pdbtbx::open(&pathstr, pdbtbx::StrictnessLevel::Medium).map_err(
        |errors| FitError::PdbRead {
            path: pathstr.clone(),
            message: errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; "),
        },
    )?;

    let model = pdb.models().next().ok_or_else(|| FitError::PdbRead {
        path: pathstr.clone(),
        message: "no models in file".to_string(),
    })?;

    let mut atoms: Vec<Atom> = Vec::new();
    let mut partial_occ = false;
    let mut atomnum = 0i32;

    for chain in model.chains() {
        for residue in chain.residues() {
            let conformers: Vec<_> = residue.conformers().collect();
            if conformers.is_empty() {
                continue;
            }
            let resnam = pad4(conformers[0].name());
            let resnum = residue.serial_number() as i32;
            let insert = residue
                .insertion_code()
                .and_then(|s| s.chars().next())
                .unwrap_or(' ');

            // Collect alternate locations per atom name, keeping the
            // order of first appearance
            let mut order: Vec<String> = Vec::new();
            let mut variants: HashMap<String, Vec<&pdbtbx::Atom>> = HashMap::new();
            for conformer in &conformers {
                for atom in conformer.atoms() {
                    let key = atom.name().to_string();
                    let entry = variants.entry(key.clone()).or_default();
                    if entry.is_empty() {
                        order.push(key);
                    }
                    entry.push(atom);
                }
            }

            let mut picked: Vec<&pdbtbx::Atom> = Vec::with_capacity(order.len());
            for name in &order {
                let candidates = &variants[name];
                if candidates.len() > 1 {
                    partial_occ = true;
                }
                let mut ranked: Vec<&pdbtbx::Atom> = candidates.clone();
                ranked.sort_by(|a, b| {
                    b.occupancy()
                        .partial_cmp(&a.occupancy())
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                picked.push(ranked[opts.occ_rank.clamp(1, ranked.len()) - 1]);
            }
            // Conformer grouping loses file order; serial numbers restore it
            picked.sort_by_key(|a| a.serial_number());

            for pick in picked {
                if pick.hetero() && !opts.het_atoms {
                    continue;
                }

                atomnum += 1;
                let raw = raw_name(pick.name(), element_width(pick.name(), pick.hetero(), &resnam));
                atoms.push(Atom {
                    atomnum,
                    atnam: pad4(pick.name()),
                    atnam_raw: raw,
                    resnam: resnam.clone(),
                    chain: chain.id().trim().to_string(),
                    resnum,
                    insert,
                    x: pick.x(),
                    y: pick.y(),
                    z: pick.z(),
                    occ: pick.occupancy(),
                    bval: pick.b_factor(),
                    het: pick.hetero(),
                });
            }
        }
    }

    if atoms.is_empty() {
        return Err(FitError::PdbRead {
            path: pathstr,
            message: "no atoms read from file".to_string(),
        });
    }

    if partial_occ {
        warn!(
            "{} contains multiple occupancy atoms; occupancy rank {} used",
            pathstr, opts.occ_rank
        );
    }

    let mut structure = Structure::new(atoms);
    let (header, trailer) = capture_header_trailer(path)?;
    structure.header = header;
    structure.trailer = trailer;
    structure.fix_ile_cd();
    Ok(structure)
}

/// Keep the raw records before the first and after the last coordinate
/// record, so WRITE can reproduce them on request.
fn capture_header_trailer(path: &Path) -> Result<(Vec<String>, Vec<String>)> {
    let text = fs::read_to_string(path)?;
    let lines: Vec<&str> = text.lines().collect();
    let is_coord = |line: &str| {
        line.starts_with("ATOM")
            || line.starts_with("HETATM")
            || line.starts_with("MODEL")
            || line.starts_with("ENDMDL")
            || line.starts_with("ANISOU")
            || line.starts_with("TER")
    };

    let first = lines.iter().position(|l| is_coord(l));
    let last = lines.iter().rposition(|l| is_coord(l));

    let header = match first {
        Some(first) => lines[..first].iter().map(|l| l.to_string()).collect(),
        None => Vec::new(),
    };
    let trailer = match last {
        Some(last) => lines[last + 1..]
            .iter()
            .filter(|l| l.trim() != "END")
            .map(|l| l.to_string())
            .collect(),
        None => Vec::new(),
    };
    Ok((header, trailer))
}

fn element_field(raw: &str) -> String {
    let mut chars = raw.chars();
    match chars.next() {
        Some(' ') => format!(" {}", chars.next().unwrap_or(' ')),
        Some(c) if c.is_ascii_digit() => format!(" {}", chars.next().unwrap_or(' ')),
        Some(c) => format!("{}{}", c, chars.next().unwrap_or(' ')),
        None => "  ".to_string(),
    }
}

/// Write the structure as fixed-column ATOM/HETATM records, with TER at
/// each chain end. Captured header/trailer records are reproduced when
/// requested.
pub fn write_structure(w: &mut dyn Write, s: &Structure, with_header: bool) -> Result<()> {
    if with_header {
        for line in &s.header {
            writeln!(w, "{}", line)?;
        }
    }

    for (i, atom) in s.atoms.iter().enumerate() {
        let record = if atom.het { "HETATM" } else { "ATOM  " };
        let chain = atom.chain.chars().next().unwrap_or(' ');
        writeln!(
            w,
            "{}{:>5} {:<4} {:<3} {}{:>4}{}   {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}          {:>2}",
            record,
            atom.atomnum,
            atom.atnam_raw,
            atom.resnam.trim(),
            chain,
            atom.resnum,
            atom.insert,
            atom.x,
            atom.y,
            atom.z,
            atom.occ,
            atom.bval,
            element_field(&atom.atnam_raw).trim(),
        )?;

        let chain_ends = match s.atoms.get(i + 1) {
            Some(next) => next.chain != atom.chain,
            None => true,
        };
        if chain_ends && !atom.het {
            writeln!(
                w,
                "TER   {:>5}      {:<3} {}{:>4}{}",
                atom.atomnum + 1,
                atom.resnam.trim(),
                chain,
                atom.resnum,
                atom.insert
            )?;
        }
    }

    if with_header {
        for line in &s.trailer {
            writeln!(w, "{}", line)?;
        }
    }
    writeln!(w, "END")?;
    Ok(())
}

/// Write a structure to a file path.
pub fn write_structure_file(path: &Path, s: &Structure, with_header: bool) -> Result<()> {
    let mut file = fs::File::create(path)?;
    write_structure(&mut file, s, with_header)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmpfile(name: &str, content: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join("superpose_pdb_tests");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    const SMALL_PDB: &str = "\
HEADER    TEST PROTEIN                            01-JAN-90   1TST
ATOM      1  N   GLY A   1       0.000   0.000   0.000  1.00 10.00           N
ATOM      2  CA  GLY A   1       1.000   0.000   0.000  1.00 12.00           C
ATOM      3  C   GLY A   1       2.000   0.000   0.000  1.00 14.00           C
ATOM      4  N   ALA A   2       3.000   0.000   0.000  1.00 10.00           N
ATOM      5  CA  ALA A   2       4.000   0.000   0.000  1.00 12.00           C
TER       6      ALA A   2
HETATM    7 CA    CA A 101       9.000   9.000   9.000  1.00 30.00          CA
CONECT    1    2
END
";

    #[test]
    fn reads_atoms_in_order_without_hetatms() {
        let path = tmpfile("small.pdb", SMALL_PDB);
        let s = read_structure(&path, &LoadOptions::default()).unwrap();
        assert_eq!(s.natoms(), 5);
        assert_eq!(s.atoms[0].atnam_raw, " N  ");
        assert_eq!(s.atoms[1].atnam_raw, " CA ");
        assert_eq!(s.atoms[1].bval, 12.0);
        assert_eq!(s.atoms[3].resnum, 2);
        assert_eq!(s.atoms[0].chain, "A");
        assert_eq!(s.residue_count(), 2);
    }

    #[test]
    fn hetatms_are_kept_on_request_with_raw_ion_names() {
        let path = tmpfile("small_het.pdb", SMALL_PDB);
        let s = read_structure(
            &path,
            &LoadOptions {
                het_atoms: true,
                occ_rank: 1,
            },
        )
        .unwrap();
        assert_eq!(s.natoms(), 6);
        let calcium = &s.atoms[5];
        assert!(calcium.het);
        // Calcium ion, not C-alpha
        assert_eq!(calcium.atnam_raw, "CA  ");
    }

    #[test]
    fn header_and_trailer_are_captured() {
        let path = tmpfile("small_hdr.pdb", SMALL_PDB);
        let s = read_structure(&path, &LoadOptions::default()).unwrap();
        assert_eq!(s.header.len(), 1);
        assert!(s.header[0].starts_with("HEADER"));
        assert_eq!(s.trailer, vec!["CONECT    1    2".to_string()]);
    }

    const ALTLOC_PDB: &str = "\
ATOM      1  N   ALA A   1       0.000   0.000   0.000  1.00 10.00           N
ATOM      2  CA AALA A   1       1.000   0.000   0.000  0.70 12.00           C
ATOM      3  CA BALA A   1       1.500   0.000   0.000  0.30 12.00           C
ATOM      4  C   ALA A   1       2.000   0.000   0.000  1.00 14.00           C
END
";

    #[test]
    fn occupancy_rank_selects_alternate_locations() {
        let path = tmpfile("altloc.pdb", ALTLOC_PDB);

        let first = read_structure(&path, &LoadOptions::default()).unwrap();
        assert_eq!(first.natoms(), 3);
        let ca = first.atoms.iter().find(|a| a.atnam_raw == " CA ").unwrap();
        assert_eq!(ca.x, 1.0);

        let second = read_structure(
            &path,
            &LoadOptions {
                het_atoms: false,
                occ_rank: 2,
            },
        )
        .unwrap();
        let ca = second.atoms.iter().find(|a| a.atnam_raw == " CA ").unwrap();
        assert_eq!(ca.x, 1.5);
    }

    const ILE_PDB: &str = "\
ATOM      1  N   ILE A   1       0.000   0.000   0.000  1.00 10.00           N
ATOM      2  CA  ILE A   1       1.000   0.000   0.000  1.00 12.00           C
ATOM      3  CD  ILE A   1       2.000   0.000   0.000  1.00 14.00           C
END
";

    #[test]
    fn ile_cd_is_renamed_on_ingest() {
        let path = tmpfile("ile.pdb", ILE_PDB);
        let s = read_structure(&path, &LoadOptions::default()).unwrap();
        let cd = &s.atoms[2];
        assert_eq!(cd.atnam, "CD1 ");
        assert_eq!(cd.atnam_raw, " CD1");
    }

    #[test]
    fn written_structures_read_back() {
        let path = tmpfile("roundtrip_in.pdb", SMALL_PDB);
        let s = read_structure(&path, &LoadOptions::default()).unwrap();

        let mut out = Vec::new();
        write_structure(&mut out, &s, false).unwrap();
        let text = String::from_utf8(out).unwrap();
        let out_path = tmpfile("roundtrip_out.pdb", &text);

        let back = read_structure(&out_path, &LoadOptions::default()).unwrap();
        assert_eq!(back.natoms(), s.natoms());
        for (a, b) in s.atoms.iter().zip(back.atoms.iter()) {
            assert_eq!(a.atnam_raw, b.atnam_raw);
            assert_eq!(a.resnum, b.resnum);
            assert!((a.x - b.x).abs() < 1e-6);
        }
    }
}
