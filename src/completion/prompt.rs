//! Prompt assembly from the shell session

/// Stylistic header that primes the model for a Python script
pub const PROMPT_HEADER: &str = "\n#!/usr/bin/env python3\n# -*- coding: utf-8 -*-";

/// Stop at the end of the current line
pub const STOP_LINE: &str = "\n";
/// Comments continue onto following lines until a blank line
pub const STOP_BLANK_LINE: &str = "\n\n";

/// A prompt ready to be sent to the completion backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub text: String,
    /// The current line is a comment; the suggestion starts on a new line
    pub is_comment: bool,
    pub stop: Vec<String>,
}

/// Builds prompts from session history and the line being edited
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build the prompt for `current_line`.
    ///
    /// Session entries starting with `%` or `!` are magics and shell
    /// escapes, not Python, and are left out.
    pub fn build_prompt<S: AsRef<str>>(&self, session_lines: &[S], current_line: &str) -> Prompt {
        let session = session_lines
            .iter()
            .map(AsRef::as_ref)
            .filter(|line| !is_shell_only(line))
            .collect::<Vec<_>>()
            .join("\n");

        let is_comment = current_line.starts_with('#');
        let (line, stop) = if is_comment {
            (format!("{current_line}\n"), STOP_BLANK_LINE)
        } else {
            (current_line.to_string(), STOP_LINE)
        };

        Prompt {
            text: format!("{PROMPT_HEADER}\n{session}\n{line}"),
            is_comment,
            stop: vec![stop.to_string()],
        }
    }
}

fn is_shell_only(line: &str) -> bool {
    line.starts_with('%') || line.starts_with('!')
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_comment_framing() {
        let prompt = PromptBuilder::new().build_prompt::<&str>(&[], "# hello");
        assert!(prompt.is_comment);
        assert_eq!(prompt.stop, vec!["\n\n"]);
        assert!(prompt.text.ends_with("# hello\n"));
    }

    #[test]
    fn test_code_framing() {
        let prompt = PromptBuilder::new().build_prompt::<&str>(&[], "x = 1");
        assert!(!prompt.is_comment);
        assert_eq!(prompt.stop, vec!["\n"]);
        assert!(prompt.text.ends_with("x = 1"));
    }

    #[test]
    fn test_magics_and_shell_escapes_dropped() {
        let session = ["import os", "!ls", "%timeit f()", "x = 1"];
        let prompt = PromptBuilder::new().build_prompt(&session, "y = ");

        assert_eq!(
            prompt.text,
            "\n#!/usr/bin/env python3\n# -*- coding: utf-8 -*-\nimport os\nx = 1\ny = "
        );
    }

    #[test]
    fn test_empty_session() {
        let prompt = PromptBuilder::new().build_prompt::<String>(&[], "import ");
        assert_eq!(
            prompt.text,
            "\n#!/usr/bin/env python3\n# -*- coding: utf-8 -*-\n\nimport "
        );
    }

    proptest! {
        #[test]
        fn prop_prompt_ends_with_current_line(
            session in proptest::collection::vec("[a-z %!=#0-9]{0,12}", 0..8),
            line in "[a-z =(0-9][a-z =()0-9]{0,20}",
        ) {
            let prompt = PromptBuilder::new().build_prompt(&session, &line);
            prop_assert!(prompt.text.starts_with(PROMPT_HEADER));
            prop_assert!(prompt.text.ends_with(&line));
            prop_assert!(!prompt.is_comment);
        }

        #[test]
        fn prop_no_shell_lines_in_prompt(
            session in proptest::collection::vec("[%!]?[a-z]{1,8}", 0..8),
        ) {
            let prompt = PromptBuilder::new().build_prompt(&session, "x");
            for line in prompt.text.lines() {
                prop_assert!(!line.starts_with('%'));
                prop_assert!(!line.starts_with('!'));
            }
        }
    }
}
