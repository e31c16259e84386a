use thiserror::Error;

use crate::types::{Line, OutputRedirect, Pipeline, RedirectMode, Stage};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
	#[error("syntax error: empty stage near '|'")]
	EmptyStage,
	#[error("syntax error: '{0}' expects a file name")]
	MissingRedirectTarget(&'static str),
}

/// Splits a raw line into pipeline stages. The delimiters `|`, `<`, `>` and
/// `>>` are only recognized as whole whitespace-separated tokens, so `a|b` is
/// a single plain token. An `exit` token anywhere on the line wins over
/// everything else, including malformed stages.
pub fn parse(line: &str) -> Result<Line<'_>, ParseError> {
	let tokens: Vec<&str> = line.split_ascii_whitespace().collect();
	if tokens.iter().any(|&t| t == "exit") {
		return Ok(Line::Exit);
	}
	if tokens.is_empty() {
		return Ok(Line::Empty);
	}
	let mut stages = Vec::new();
	for segment in tokens.split(|&t| t == "|") {
		stages.push(parse_stage(segment)?);
	}
	Ok(Line::Pipeline(Pipeline { stages }))
}

fn parse_stage<'a>(tokens: &[&'a str]) -> Result<Stage<'a>, ParseError> {
	let mut iter = tokens.iter();
	let name = *iter.next().ok_or(ParseError::EmptyStage)?;
	let mut stage = Stage { name, args: Vec::new(), input: None, output: None };
	while let Some(&token) = iter.next() {
		match token {
			"<" => stage.input = Some(target(&mut iter, "<")?),
			">" => {
				stage.output = Some(OutputRedirect {
					path: target(&mut iter, ">")?,
					mode: RedirectMode::Truncate,
				})
			}
			">>" => {
				stage.output = Some(OutputRedirect {
					path: target(&mut iter, ">>")?,
					mode: RedirectMode::Append,
				})
			}
			arg => stage.args.push(arg),
		}
	}
	Ok(stage)
}

fn target<'a>(iter: &mut std::slice::Iter<'_, &'a str>, op: &'static str) -> Result<&'a str, ParseError> {
	iter.next().copied().ok_or(ParseError::MissingRedirectTarget(op))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn stages(line: &str) -> Vec<Stage<'_>> {
		match parse(line) {
			Ok(Line::Pipeline(p)) => p.stages,
			other => panic!("expected pipeline, got {:?}", other),
		}
	}

	#[test]
	fn empty_and_blank_lines() {
		assert_eq!(parse(""), Ok(Line::Empty));
		assert_eq!(parse("\n"), Ok(Line::Empty));
		assert_eq!(parse("   \t \n"), Ok(Line::Empty));
	}

	#[test]
	fn single_stage() {
		let s = stages("ls -l /tmp\n");
		assert_eq!(s.len(), 1);
		assert_eq!(s[0].name, "ls");
		assert_eq!(s[0].args, vec!["-l", "/tmp"]);
		assert_eq!(s[0].input, None);
		assert_eq!(s[0].output, None);
	}

	#[test]
	fn stage_count_matches_pipe_count() {
		assert_eq!(stages("a").len(), 1);
		assert_eq!(stages("a | b").len(), 2);
		assert_eq!(stages("echo hello | tr a-z A-Z | wc -c\n").len(), 3);
	}

	#[test]
	fn pipe_needs_surrounding_whitespace() {
		let s = stages("echo a|b\n");
		assert_eq!(s.len(), 1);
		assert_eq!(s[0].args, vec!["a|b"]);
	}

	#[test]
	fn redirect_ops_need_surrounding_whitespace() {
		let s = stages("echo >out");
		assert_eq!(s[0].output, None);
		assert_eq!(s[0].args, vec![">out"]);
	}

	#[test]
	fn input_redirect() {
		let s = stages("cat < in.txt");
		assert_eq!(s[0].input, Some("in.txt"));
		assert!(s[0].args.is_empty());
	}

	#[test]
	fn output_redirect_modes() {
		let s = stages("echo hi > out.txt\n");
		assert_eq!(s[0].output, Some(OutputRedirect { path: "out.txt", mode: RedirectMode::Truncate }));
		let s = stages("echo hi >> log.txt");
		assert_eq!(s[0].output, Some(OutputRedirect { path: "log.txt", mode: RedirectMode::Append }));
	}

	#[test]
	fn both_redirects_with_args() {
		let s = stages("tr a-z A-Z < in.txt > out.txt");
		assert_eq!(s[0].name, "tr");
		assert_eq!(s[0].args, vec!["a-z", "A-Z"]);
		assert_eq!(s[0].input, Some("in.txt"));
		assert_eq!(s[0].output, Some(OutputRedirect { path: "out.txt", mode: RedirectMode::Truncate }));
	}

	#[test]
	fn dangling_redirect_is_rejected() {
		assert_eq!(parse("echo hi >"), Err(ParseError::MissingRedirectTarget(">")));
		assert_eq!(parse("echo hi >>\n"), Err(ParseError::MissingRedirectTarget(">>")));
		assert_eq!(parse("cat <"), Err(ParseError::MissingRedirectTarget("<")));
	}

	#[test]
	fn empty_stages_are_rejected() {
		assert_eq!(parse("a | | b"), Err(ParseError::EmptyStage));
		assert_eq!(parse("| a"), Err(ParseError::EmptyStage));
		assert_eq!(parse("a |\n"), Err(ParseError::EmptyStage));
	}

	#[test]
	fn exit_anywhere_terminates() {
		assert_eq!(parse("exit"), Ok(Line::Exit));
		assert_eq!(parse("exit\n"), Ok(Line::Exit));
		assert_eq!(parse("echo hi | exit"), Ok(Line::Exit));
		assert_eq!(parse("echo exit | wc"), Ok(Line::Exit));
		// exit wins even over a line that would otherwise be malformed
		assert_eq!(parse("echo > | exit"), Ok(Line::Exit));
	}

	#[test]
	fn exit_must_be_a_whole_token() {
		let s = stages("echo exiting");
		assert_eq!(s[0].args, vec!["exiting"]);
	}
}
