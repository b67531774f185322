use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use camcut::desc::parse_job_json;
use camcut::gcode::generate_document;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(job_path) = args.next() else {
        eprintln!("usage: camcut <job.json> [out.gcode]");
        return ExitCode::FAILURE;
    };
    let out_path = args.next();

    let json = match std::fs::read_to_string(&job_path) {
        Ok(json) => json,
        Err(err) => {
            eprintln!("failed to read {job_path}: {err}");
            return ExitCode::FAILURE;
        }
    };

    let job = match parse_job_json(&json) {
        Ok(job) => job,
        Err(err) => {
            eprintln!("failed to parse {job_path}: {err}");
            return ExitCode::FAILURE;
        }
    };

    let gcode = match generate_document(&job) {
        Ok(gcode) => gcode,
        Err(err) => {
            eprintln!("failed to generate G-code: {err}");
            return ExitCode::FAILURE;
        }
    };

    match out_path {
        Some(path) => {
            if let Err(err) = std::fs::write(&path, &gcode) {
                eprintln!("failed to write {path}: {err}");
                return ExitCode::FAILURE;
            }
        }
        None => print!("{gcode}"),
    }
    ExitCode::SUCCESS
}
