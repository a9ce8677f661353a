use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::Command as ShellCommand;

use log::{info, LevelFilter};

use crate::error::{FitError, Result};
use crate::extract::BValGate;
use crate::session::{PrintAlignFormat, Session, WeightMode};
use crate::zones::ZoneMode;

/// Whether the command loop should keep reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Quit,
}

fn parse_f64(token: &str) -> Result<f64> {
    token
        .parse()
        .map_err(|_| FitError::Parse(format!("bad numeric parameter: {}", token)))
}

fn parse_usize(token: &str) -> Result<usize> {
    token
        .parse()
        .map_err(|_| FitError::Parse(format!("bad numeric parameter: {}", token)))
}

fn arg<'a>(tokens: &[&'a str], i: usize, what: &str) -> Result<&'a str> {
    tokens
        .get(i)
        .copied()
        .ok_or_else(|| FitError::Parse(format!("missing parameter: {}", what)))
}

fn is_on(token: &str) -> bool {
    token.eq_ignore_ascii_case("ON")
}

fn is_off(token: &str) -> bool {
    token.eq_ignore_ascii_case("OFF")
}

/// Run a closure against either stdout-ish output or a freshly created
/// file, depending on whether a filename was supplied.
fn with_output<F>(file: Option<&str>, w: &mut dyn Write, f: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    match file {
        Some(path) => {
            let mut out = fs::File::create(path)?;
            f(&mut out)
        }
        None => f(w),
    }
}

/// Execute one command line against the session. Lines starting `$` are
/// handed to the shell, lines starting `#` are echoed comments. Errors
/// are returned to the caller; they never corrupt unrelated state.
pub fn execute_line(session: &mut Session, line: &str, w: &mut dyn Write) -> Result<Outcome> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Outcome::Continue);
    }

    if let Some(shell) = line.strip_prefix('$') {
        let status = ShellCommand::new("sh").arg("-c").arg(shell).status();
        if let Err(e) = status {
            return Err(FitError::State(format!("shell command failed: {}", e)));
        }
        return Ok(Outcome::Continue);
    }

    if line.starts_with('#') {
        info!("{}", line);
        return Ok(Outcome::Continue);
    }

    let tokens: Vec<&str> = line.split_whitespace().collect();
    let keyword = tokens[0].to_uppercase();
    let args = &tokens[1..];

    match keyword.as_str() {
        "REFERENCE" => {
            let path = arg(args, 0, "reference filename")?;
            session.load_reference(Path::new(path))?;
        }
        "MOBILE" => {
            let path = arg(args, 0, "mobile filename")?;
            session.load_mobile(Path::new(path))?;
        }
        "MULTI" => {
            let path = arg(args, 0, "structure list filename")?;
            session.load_multi(Path::new(path))?;
        }
        "ATOMS" => {
            session.set_fit_atoms(&args.join(","))?;
        }
        "RATOMS" => {
            session.set_rms_atoms(&args.join(","))?;
        }
        "ZONE" => {
            session.set_fit_zone(arg(args, 0, "zone specification")?)?;
        }
        "RZONE" => {
            session.set_rms_zone(arg(args, 0, "zone specification")?)?;
        }
        "DELZONE" => {
            session.del_fit_zone(arg(args, 0, "zone specification")?)?;
        }
        "DELRZONE" => {
            session.del_rms_zone(arg(args, 0, "zone specification")?)?;
        }
        "SETCENTRE" | "SETCENTER" => {
            session.set_centre(arg(args, 0, "residue specification")?)?;
        }
        "NUMBER" => {
            let mode = arg(args, 0, "numbering mode")?;
            match mode.to_uppercase().chars().next() {
                Some('R') => session.set_mode(ZoneMode::Resnum),
                Some('S') => session.set_mode(ZoneMode::Sequential),
                _ => {
                    return Err(FitError::Parse(
                        "numbering mode must be RESIDUE or SEQUENTIAL".to_string(),
                    ))
                }
            }
        }
        "FIT" => {
            session.fit_structures(w)?;
        }
        "NOFIT" => {
            session.nofit_structures()?;
        }
        "RMS" => {
            session.show_rms(w)?;
        }
        "RESIDUE" => {
            with_output(args.first().copied(), w, |out| {
                session.show_residue_rms(out)
            })?;
        }
        "PAIRDIST" => {
            with_output(args.first().copied(), w, |out| {
                session.show_pair_distances(out)
            })?;
        }
        "NFITTED" => {
            session.show_nfitted(w)?;
        }
        "MATRIX" => {
            session.show_matrix(w)?;
        }
        "ALIGN" => {
            let argument = args.first().copied();
            let append = args
                .get(1)
                .map(|t| t.eq_ignore_ascii_case("APPEND"))
                .unwrap_or(false);
            session.align(argument, append, w)?;
        }
        "READALIGNMENT" => {
            session.read_alignment(Path::new(arg(args, 0, "alignment filename")?))?;
        }
        "PRINTALIGN" => {
            let (format, file) = match args.first() {
                Some(t) if t.eq_ignore_ascii_case("FASTA") => {
                    (PrintAlignFormat::Fasta, args.get(1).copied())
                }
                Some(t) if t.eq_ignore_ascii_case("PIR") => {
                    (PrintAlignFormat::Pir, args.get(1).copied())
                }
                other => (PrintAlignFormat::Text, other.copied()),
            };
            with_output(file, w, |out| session.print_align(format, out))?;
        }
        "WRITE" => {
            if args.len() >= 2 {
                let qualifier = args[0].to_uppercase();
                if !qualifier.starts_with("REF") {
                    return Err(FitError::Parse(format!(
                        "invalid qualifier for WRITE: {}",
                        args[0]
                    )));
                }
                session.write_coordinates(Path::new(args[1]), None)?;
            } else {
                session.write_coordinates(Path::new(arg(args, 0, "output filename")?), Some(0))?;
            }
        }
        "MWRITE" => {
            session.write_multi(args.first().copied().unwrap_or("fit"))?;
        }
        "ITERATE" => match args.first() {
            Some(t) if is_off(t) => session.set_iterate(false, None)?,
            Some(t) if is_on(t) => session.set_iterate(true, None)?,
            Some(t) => session.set_iterate(true, Some(parse_f64(t)?))?,
            None => session.set_iterate(true, None)?,
        },
        "GAPPEN" => {
            session.gap_open = parse_f64(arg(args, 0, "gap penalty")?)? as i32;
            if let Some(ext) = args.get(1) {
                session.gap_ext = parse_f64(ext)? as i32;
            }
        }
        "BVALUE" => {
            let first = arg(args, 0, "B-value cutoff")?;
            if first.parse::<f64>().is_err() {
                session.bval_gate = BValGate::Off;
                writeln!(w, "   Atoms will be included regardless of B-value")?;
            } else {
                session.bvalue = parse_f64(first)?;
                session.bval_gate = match args.get(1).map(|t| t.to_uppercase()) {
                    None => BValGate::Both,
                    Some(q) if q.starts_with("REF") => BValGate::RefOnly,
                    Some(q) if q.starts_with("MOB") => BValGate::MobOnly,
                    Some(q) => {
                        return Err(FitError::Parse(format!(
                            "{} is not a valid parameter to BVALUE",
                            q
                        )))
                    }
                };
            }
        }
        "WEIGHT" => {
            session.weight_mode = WeightMode::BVal;
        }
        "NOWEIGHT" => {
            session.weight_mode = WeightMode::None;
        }
        "BWEIGHT" => {
            session.weight_mode = WeightMode::InvBVal;
        }
        "DISTCUTOFF" => match args.first() {
            Some(t) if is_off(t) => session.dist_cutoff = None,
            Some(t) if is_on(t) => {
                session.dist_cutoff = Some(session.dist_cutoff.unwrap_or(0.0));
            }
            Some(t) => session.dist_cutoff = Some(parse_f64(t)?),
            None => return Err(FitError::Parse("missing distance cutoff".to_string())),
        },
        "IGNOREMISSING" => {
            session.ignore_missing = true;
        }
        "NOIGNOREMISSING" => {
            session.ignore_missing = false;
        }
        "HETATOMS" => {
            session.het_atoms = true;
            writeln!(
                w,
                "   Hetatoms will be read with future MOBILE or REFERENCE commands"
            )?;
        }
        "NOHETATOMS" => {
            session.het_atoms = false;
            writeln!(
                w,
                "   Hetatoms will be ignored with future MOBILE or REFERENCE commands"
            )?;
        }
        "OCCRANK" => {
            let rank = parse_usize(arg(args, 0, "occupancy rank")?)?;
            if rank < 1 {
                return Err(FitError::Parse(
                    "occupancy rank must be >= 1".to_string(),
                ));
            }
            session.occ_rank = rank;
        }
        "SYMMATOMS" => {
            session.set_symmatoms(args, w)?;
        }
        "CENTRE" | "CENTER" => {
            session.centre_on_origin = !args.first().map(|t| is_off(t)).unwrap_or(false);
        }
        "SETREF" => match args.first() {
            Some(t) => {
                let n = parse_usize(t)?;
                if n < 1 {
                    return Err(FitError::Parse(format!(
                        "structure number must be between 1 and {}",
                        session.multi_count()
                    )));
                }
                session.set_reference(n - 1)?;
            }
            None => {
                session.all_vs_all(None, true)?;
            }
        },
        "MULTREF" => match args.first() {
            Some(t) if is_off(t) => {
                session.multi_vs_ref = false;
                let n = session.multi_ref;
                session.set_mobile_as_reference(n)?;
                writeln!(
                    w,
                    "   Multi: RMS, RESIDUE, PAIRDIST and MATRIX compare with mobile structure {}",
                    n + 1
                )?;
            }
            _ => {
                session.multi_vs_ref = true;
                writeln!(
                    w,
                    "   Multi: RMS, RESIDUE, PAIRDIST and MATRIX compare with the averaged reference"
                )?;
            }
        },
        "ALLVSALL" => {
            with_output(args.first().copied(), w, |out| {
                session.all_vs_all(Some(out), false).map(|_| ())
            })?;
        }
        "ORDERFIT" => {
            session.order_fit(w)?;
        }
        "TRIMZONES" => {
            session.trim_zones()?;
        }
        "WTAVERAGE" => {
            session.wt_average = !args.first().map(|t| is_off(t)).unwrap_or(false);
        }
        "STATUS" => {
            with_output(args.first().copied(), w, |out| session.show_status(out))?;
        }
        "QUIET" => {
            if args.first().map(|t| is_off(t)).unwrap_or(false) {
                log::set_max_level(LevelFilter::Trace);
            } else {
                log::set_max_level(LevelFilter::Error);
            }
        }
        "LIMIT" => match args.first() {
            Some(t) if is_off(t) => session.limit = None,
            Some(lo) => {
                let hi = arg(args, 1, "limit stop")?;
                session.limit = Some((parse_usize(lo)?, parse_usize(hi)?));
            }
            None => return Err(FitError::Parse("missing limit range".to_string())),
        },
        "HEADER" => {
            session.read_header = !args.first().map(|t| is_off(t)).unwrap_or(false);
        }
        "SCRIPT" => {
            let path = arg(args, 0, "script filename")?;
            if run_script(session, Path::new(path), w)? == Outcome::Quit {
                return Ok(Outcome::Quit);
            }
        }
        "HELP" => {
            print_help(w)?;
        }
        "QUIT" | "EXIT" => {
            return Ok(Outcome::Quit);
        }
        _ => {
            return Err(FitError::Parse(format!(
                "unrecognised keyword: {}",
                tokens[0]
            )));
        }
    }

    Ok(Outcome::Continue)
}

/// Run a command script: one command per line, same semantics as the
/// interactive loop. A failing command is reported and the script
/// continues, matching the transaction-per-command policy.
pub fn run_script(session: &mut Session, path: &Path, w: &mut dyn Write) -> Result<Outcome> {
    let text = fs::read_to_string(path)?;
    for line in text.lines() {
        match execute_line(session, line, w) {
            Ok(Outcome::Quit) => return Ok(Outcome::Quit),
            Ok(Outcome::Continue) => {}
            Err(e) => writeln!(w, "   Error==> {}", e)?,
        }
    }
    Ok(Outcome::Continue)
}

fn print_help(w: &mut dyn Write) -> Result<()> {
    writeln!(w, "   Commands:")?;
    for line in [
        "REFERENCE file        MOBILE file           MULTI listfile",
        "ATOMS spec            RATOMS spec           ZONE spec|CLEAR",
        "RZONE spec|CLEAR      DELZONE spec|ALL      DELRZONE spec|ALL",
        "SETCENTRE spec|CLEAR  NUMBER R|S            FIT",
        "NOFIT                 RMS                   RESIDUE [file]",
        "PAIRDIST [file]       NFITTED               MATRIX",
        "ALIGN [WHOLE|spec [APPEND]]                 READALIGNMENT file",
        "PRINTALIGN [FASTA|PIR] [file]               WRITE [REF] file",
        "MWRITE [ext]          ITERATE [ON|OFF|cut]  GAPPEN open [ext]",
        "BVALUE val [REF|MOB]  WEIGHT|NOWEIGHT|BWEIGHT",
        "DISTCUTOFF val|OFF    IGNOREMISSING|NOIGNOREMISSING",
        "HETATOMS|NOHETATOMS   OCCRANK n             SYMMATOMS [res ON|OFF]",
        "CENTRE ON|OFF         SETREF [n]            MULTREF ON|OFF",
        "ALLVSALL [file]       ORDERFIT              TRIMZONES",
        "WTAVERAGE ON|OFF      STATUS [file]         QUIET ON|OFF",
        "LIMIT lo hi|OFF       HEADER ON|OFF         SCRIPT file",
        "QUIT",
    ] {
        writeln!(w, "   {}", line)?;
    }
    Ok(())
}
