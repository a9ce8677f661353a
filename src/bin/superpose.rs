use std::env;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process::exit;

use superpose::commands::{execute_line, run_script, Outcome};
use superpose::Session;

fn logo() {
    println!();
    println!("   superpose - least squares fitting of protein structures");
    println!("   Type HELP for a command summary, QUIT to leave");
    println!();
}

fn usage_and_exit() -> ! {
    eprintln!();
    eprintln!("Syntax: superpose [-h] [-x] [-f <scriptfile>] [<reference.pdb> <mobile.pdb>]");
    eprintln!("        -h Include HETATM records when reading PDB files");
    eprintln!("        -x Read XMAS format files");
    eprintln!("        -f Run a command script and exit");
    eprintln!();
    exit(1);
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut het_atoms = false;
    let mut script: Option<String> = None;
    let mut positional: Vec<String> = Vec::new();

    let mut args = env::args().skip(1);
    while let Some(argument) = args.next() {
        match argument.as_str() {
            "-h" => het_atoms = true,
            "-x" => {
                eprintln!("Error: XMAS support not available in this build");
                exit(1);
            }
            "-f" => match args.next() {
                Some(path) if script.is_none() => script = Some(path),
                _ => usage_and_exit(),
            },
            _ if argument.starts_with('-') => usage_and_exit(),
            _ => positional.push(argument),
        }
    }
    if !positional.is_empty() && positional.len() != 2 {
        usage_and_exit();
    }

    let mut session = Session::new();
    session.het_atoms = het_atoms;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if positional.len() == 2 {
        if let Err(e) = session.load_reference(Path::new(&positional[0])) {
            eprintln!("   Error==> {}", e);
        }
        if let Err(e) = session.load_mobile(Path::new(&positional[1])) {
            eprintln!("   Error==> {}", e);
        }
    }

    if let Some(path) = script {
        match run_script(&mut session, Path::new(&path), &mut out) {
            Ok(_) => exit(0),
            Err(e) => {
                eprintln!("   Error==> {}", e);
                exit(1);
            }
        }
    }

    logo();

    let stdin = io::stdin();
    loop {
        print!("superpose> ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("   Error==> {}", e);
                break;
            }
        }

        match execute_line(&mut session, &line, &mut out) {
            Ok(Outcome::Quit) => break,
            Ok(Outcome::Continue) => {}
            Err(e) => println!("   Error==> {}", e),
        }
    }

    exit(0);
}
