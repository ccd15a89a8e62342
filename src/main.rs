use anyhow::{bail, Result};
use env_logger::Env;
use log::info;
use pagedb::dbfile::DbFile;
use pagedb::parse::parse_statement;
use pagedb::stream::ByteStream;
use pagedb::token::{tokenize, ParseErrorKind};
use std::io::{self, BufRead, Write};

// REPL driver over the expression front end. With a path argument the
// database file is opened (or formatted) first, so the storage side gets
// exercised from the same binary.
fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = std::env::args().collect::<Vec<_>>();
    match args.len() {
        1 => {}
        2 => open_database(&args[1])?,
        _ => bail!("usage: {} [database-file]", args[0]),
    }

    repl()
}

fn open_database(path: &str) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)?;

    let db = if file.is_empty()? {
        info!("formatting a fresh database at {path}");
        DbFile::new_empty(file)?
    } else {
        DbFile::construct_from(file)?
    };

    let tbl = db.table();
    info!(
        "opened {path}: table {:?}, {} columns, key {:?}",
        tbl.name(),
        tbl.columns().count(),
        tbl.key()
    );
    Ok(())
}

fn repl() -> Result<()> {
    let stdin = io::stdin();
    let mut pending = String::new();

    prompt("> ")?;
    for line in stdin.lock().lines() {
        let line = line?;
        if pending.is_empty() && matches!(line.trim(), "exit" | "quit") {
            break;
        }
        pending.push_str(&line);
        pending.push(' ');
        if pending.trim().is_empty() {
            pending.clear();
            prompt("> ")?;
            continue;
        }

        match tokenize(&pending) {
            // the statement just isn't finished yet; keep reading
            Err(err) if err.kind == ParseErrorKind::UnendedStmt => {
                prompt(".. ")?;
                continue;
            }
            Err(err) => println!("error: {err}"),
            Ok(tokens) => {
                let mut rest = &tokens[..];
                while !rest.is_empty() {
                    match parse_statement(rest) {
                        Ok((ast, consumed)) => {
                            match ast.eval() {
                                Ok(value) => println!("{value}"),
                                Err(err) => println!("error: {err}"),
                            }
                            rest = &rest[consumed..];
                        }
                        Err(err) => {
                            println!("error: {err}");
                            break;
                        }
                    }
                }
            }
        }
        pending.clear();
        prompt("> ")?;
    }
    Ok(())
}

fn prompt(text: &str) -> Result<()> {
    print!("{text}");
    io::stdout().flush()?;
    Ok(())
}
