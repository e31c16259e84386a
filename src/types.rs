#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RedirectMode { Truncate, Append }

#[derive(Debug, PartialEq, Eq)]
pub struct OutputRedirect<'a> {
	pub path: &'a str,
	pub mode: RedirectMode,
}

/// One program invocation within a pipeline. Tokens borrow from the input line;
/// the name becomes argv[0] at exec time.
#[derive(Debug, PartialEq, Eq)]
pub struct Stage<'a> {
	pub name: &'a str,
	pub args: Vec<&'a str>,
	pub input: Option<&'a str>,
	pub output: Option<OutputRedirect<'a>>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Pipeline<'a> {
	pub stages: Vec<Stage<'a>>,
}

/// What one raw input line amounts to.
#[derive(Debug, PartialEq, Eq)]
pub enum Line<'a> {
	Empty,
	Exit,
	Pipeline(Pipeline<'a>),
}
