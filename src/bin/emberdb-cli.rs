//! Interactive shell for EmberDB.
//!
//! Reads one line at a time, parses it into statements, and executes each
//! against an in-memory engine. SELECT results render as a text table;
//! execution errors are printed per statement so the rest of the batch
//! keeps running.

use anyhow::Result;
use clap::Parser;
use emberdb::{parse, Cell, ColumnType, EmberDB, Results};
use rustyline::error::ReadlineError;
use rustyline::Editor;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter;
use tracing_subscriber::prelude::*;

/// EmberDB: a small in-memory SQL database.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// SQL file to execute instead of starting the interactive shell.
    #[arg(short, long)]
    file: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let fmt_layer = tracing_subscriber::fmt::layer().compact();
    let filter_layer =
        filter::EnvFilter::from_default_env().add_directive(LevelFilter::WARN.into());
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    let mut db = EmberDB::new();

    if let Some(file) = args.file {
        let source = std::fs::read_to_string(file)?;
        run_source(&mut db, &source);
    } else {
        interactive(&mut db)?;
    }

    Ok(())
}

fn interactive(db: &mut EmberDB) -> Result<()> {
    let mut rl = Editor::<()>::new()?;

    loop {
        match rl.readline("emberdb> ") {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                if matches!(input, "exit" | "quit" | "\\q") {
                    break;
                }
                rl.add_history_entry(input);
                run_source(db, input);
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("error: {err:?}");
                break;
            }
        }
    }

    Ok(())
}

fn run_source(db: &mut EmberDB, source: &str) {
    let statements = match parse(source) {
        Ok(statements) => statements,
        Err(err) => {
            println!("{err}");
            return;
        }
    };

    for statement in &statements {
        match db.execute(statement) {
            Ok(Some(results)) => print_results(&results),
            Ok(None) => println!("ok"),
            Err(err) => println!("{err}"),
        }
    }
}

fn print_results(results: &Results) {
    if results.rows.is_empty() {
        println!("(no results)");
        return;
    }

    let rendered: Vec<Vec<String>> = results
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .zip(&results.columns)
                .map(|(cell, column)| render_cell(cell, column.column_type))
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = results.columns.iter().map(|c| c.name.len()).collect();
    for row in &rendered {
        for (i, value) in row.iter().enumerate() {
            widths[i] = widths[i].max(value.len());
        }
    }

    print!("|");
    for (column, width) in results.columns.iter().zip(&widths) {
        print!(" {:width$} |", column.name, width = width);
    }
    println!();

    print!("|");
    for width in &widths {
        print!("{}|", "-".repeat(width + 2));
    }
    println!();

    for row in &rendered {
        print!("|");
        for (value, width) in row.iter().zip(&widths) {
            print!(" {:width$} |", value, width = width);
        }
        println!();
    }

    if results.rows.len() == 1 {
        println!("(1 result)");
    } else {
        println!("({} results)", results.rows.len());
    }
}

fn render_cell(cell: &Cell, column_type: ColumnType) -> String {
    match column_type {
        ColumnType::Bool => cell.as_bool().to_string(),
        _ if cell.is_null() => String::new(),
        ColumnType::Int => cell.as_int().to_string(),
        ColumnType::Text => cell.as_text(),
    }
}
