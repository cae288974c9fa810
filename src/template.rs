//! Script templating
//!
//! Code templates carry before/run/after scripts containing `$%name%$`
//! placeholders. A script is expanded once per program and then split into
//! the executable and its arguments.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::constants::placeholders;
use crate::error::{AppError, AppResult};

/// Values substituted into a script for one program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateContext {
    /// Directory of the source file, including the trailing separator (may be empty)
    pub path_dir: String,
    /// File name with extension
    pub full_name: String,
    /// File name without extension
    pub file_stem: String,
    /// Task identifier
    pub task: String,
    /// Per-run random token
    pub random_token: String,
}

/// Expand every recognized placeholder in `template`.
///
/// Substitution is literal and happens in a fixed order: rand, path, full,
/// file, task. Unknown placeholders are left untouched.
pub fn expand(template: &str, ctx: &TemplateContext) -> String {
    template
        .replace(placeholders::RAND, &ctx.random_token)
        .replace(placeholders::PATH, &ctx.path_dir)
        .replace(placeholders::FULL, &ctx.full_name)
        .replace(placeholders::FILE, &ctx.file_stem)
        .replace(placeholders::TASK, &ctx.task)
}

/// Substitute the task identifier into a naming pattern
pub fn substitute_task(pattern: &str, task: &str) -> String {
    pattern.replace(placeholders::TASK, task)
}

/// Substitute a test identifier into the test-input naming pattern
pub fn substitute_test(pattern: &str, test_id: u64) -> String {
    pattern.replace(placeholders::TEST, &test_id.to_string())
}

/// Split a command line into tokens.
///
/// Whitespace runs separate tokens. Text inside `'...'` or `"..."` is kept
/// verbatim, whitespace included, and a quoted segment glued to unquoted
/// text joins the same token. `""` yields an empty argument.
pub fn split_command(line: &str) -> AppResult<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_token = true;
            }
            None if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            None => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if let Some(q) = quote {
        return Err(AppError::Configuration(format!(
            "unterminated {q} quote in command `{line}`"
        )));
    }
    if in_token {
        tokens.push(current);
    }

    Ok(tokens)
}

/// A fully expanded command, ready to spawn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    line: String,
    program: String,
    args: Vec<String>,
    /// Working directory; the caller's when unset
    dir: Option<PathBuf>,
}

impl ResolvedCommand {
    /// Expand `template` and parse the result.
    ///
    /// Returns `Ok(None)` when the expansion is blank, which callers treat as
    /// "nothing to run".
    pub fn build(template: &str, ctx: &TemplateContext) -> AppResult<Option<Self>> {
        Self::parse(&expand(template, ctx))
    }

    /// Parse an already expanded command line
    pub fn parse(line: &str) -> AppResult<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let mut tokens = split_command(line)?.into_iter();
        let program = match tokens.next() {
            Some(program) if !program.is_empty() => program,
            _ => {
                return Err(AppError::Configuration(format!(
                    "command `{line}` has no executable"
                )));
            }
        };

        Ok(Some(Self {
            line: line.to_string(),
            program,
            args: tokens.collect(),
            dir: None,
        }))
    }

    /// Run this command from `dir`
    pub fn in_dir(mut self, dir: &Path) -> Self {
        self.dir = Some(dir.to_path_buf());
        self
    }

    /// The expanded command line as written in the template
    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }
}

impl fmt::Display for ResolvedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> TemplateContext {
        TemplateContext {
            path_dir: "/work/".to_string(),
            full_name: "A.cpp".to_string(),
            file_stem: "A".to_string(),
            task: "A".to_string(),
            random_token: "x1y2z3w4".to_string(),
        }
    }

    #[test]
    fn test_expand_all_placeholders() {
        let script = "g++ $%path%$$%full%$ -o $%path%$$%file%$-$%rand%$ # task $%task%$";
        assert_eq!(
            expand(script, &ctx()),
            "g++ /work/A.cpp -o /work/A-x1y2z3w4 # task A"
        );
    }

    #[test]
    fn test_unknown_placeholder_is_verbatim() {
        assert_eq!(expand("run $%lang%$ $%file%$", &ctx()), "run $%lang%$ A");
    }

    #[test]
    fn test_substitute_task_and_test() {
        let pattern = substitute_task("$%task%$GenTest$%test%$.in", "B");
        assert_eq!(pattern, "BGenTest$%test%$.in");
        assert_eq!(substitute_test(&pattern, 42), "BGenTest42.in");
    }

    #[test]
    fn test_split_plain() {
        assert_eq!(
            split_command("  ./a.out   --fast\tx ").unwrap(),
            vec!["./a.out", "--fast", "x"]
        );
    }

    #[test]
    fn test_split_quotes() {
        assert_eq!(
            split_command(r#"sh -c "cat | tr a b" 'it"s' """#).unwrap(),
            vec!["sh", "-c", "cat | tr a b", "it\"s", ""]
        );
        assert_eq!(
            split_command(r#"--out="my file""#).unwrap(),
            vec!["--out=my file"]
        );
    }

    #[test]
    fn test_split_unterminated_quote() {
        assert!(split_command("echo 'oops").is_err());
    }

    #[test]
    fn test_blank_expansion_is_noop() {
        assert_eq!(ResolvedCommand::build("", &ctx()).unwrap(), None);
        assert_eq!(ResolvedCommand::build("   ", &ctx()).unwrap(), None);
    }

    #[test]
    fn test_build_command() {
        let cmd = ResolvedCommand::build("$%path%$$%file%$ --seed $%rand%$", &ctx())
            .unwrap()
            .unwrap();
        assert_eq!(cmd.program(), "/work/A");
        assert_eq!(cmd.args(), ["--seed".to_string(), "x1y2z3w4".to_string()]);
        assert_eq!(cmd.to_string(), "/work/A --seed x1y2z3w4");
        assert_eq!(cmd.dir(), None);

        let cmd = cmd.in_dir(Path::new("/work"));
        assert_eq!(cmd.dir(), Some(Path::new("/work")));
    }

    #[test]
    fn test_empty_program_is_error() {
        assert!(ResolvedCommand::parse(r#""" arg"#).is_err());
    }
}
