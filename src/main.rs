mod channel;
mod eval;
mod parser;
mod types;

use std::io;
use std::io::{BufRead, Write};
use std::process;

use tracing_subscriber::EnvFilter;

use crate::types::Line;

const PROMPT: &str = "pish> ";

fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env())
		.with_writer(io::stderr)
		.init();

	let stdin = io::stdin();
	let mut stdin = stdin.lock();
	let mut stdout = io::stdout();
	let mut line = String::new();
	loop {
		let _ = stdout.write_all(PROMPT.as_bytes());
		let _ = stdout.flush();
		line.clear();
		match stdin.read_line(&mut line) {
			Ok(0) | Err(_) => break,
			Ok(_) => {}
		}
		match parser::parse(&line) {
			Ok(Line::Empty) => continue,
			Ok(Line::Exit) => process::exit(0),
			Ok(Line::Pipeline(pipeline)) => {
				if let Err(e) = eval::run(&pipeline) {
					eprintln!("pish: {}", e);
				}
			}
			Err(e) => eprintln!("pish: {}", e),
		}
	}
}
