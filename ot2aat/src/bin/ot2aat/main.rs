//! Compile a rule file into AAT morx (MIF) and kerx (ATIF) text

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    process::ExitCode,
};

use clap::Parser;
use ot2aat::{Compiler, Opts};

mod args;
mod error;

use args::Args;
use error::Error;

fn main() -> ExitCode {
    env_logger::builder()
        .format(|buf, record| {
            let ts = buf.timestamp_micros();
            writeln!(
                buf,
                "{}: {:?}: {}: {}",
                ts,
                std::thread::current().id(),
                record.level(),
                record.args()
            )
        })
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ot2aat: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Error> {
    let opts = Opts::new()
        .compile_morx(args.table.includes_morx())
        .compile_kerx(args.table.includes_kerx())
        .scripts(args.scripts.iter().map(String::as_str))
        .max_error_messages(args.max_errors)
        .parallel(true);
    let compilation = Compiler::from_path(&args.input)
        .with_opts(opts)
        .compile()?;

    if !compilation.diagnostics.is_empty() {
        eprint!("{}", compilation.diagnostics.display());
    }
    if let Some(path) = &args.emit_ir {
        let file = create(path)?;
        serde_yaml::to_writer(BufWriter::new(file), &compilation.source)?;
    }
    compilation.require_output()?;

    let mut write_target: Box<dyn Write> = match args.out.as_ref() {
        Some(path) => Box::new(BufWriter::new(create(path)?)),
        None => Box::new(std::io::stdout()),
    };
    if args.table.includes_morx() && !compilation.morx.is_empty() {
        write!(write_target, "{}", compilation.morx_text())?;
    }
    if args.table.includes_kerx() && compilation.kerx.is_some() {
        write!(write_target, "{}", compilation.kerx_text())?;
    }
    write_target.flush()?;
    log::info!(
        "{} diagnostics, {} errors",
        compilation.diagnostics.len(),
        compilation.diagnostics.iter().filter(|d| d.is_error()).count()
    );
    Ok(())
}

fn create(path: &Path) -> Result<File, Error> {
    File::create(path).map_err(|inner| Error::FileWrite {
        path: path.to_owned(),
        inner,
    })
}
