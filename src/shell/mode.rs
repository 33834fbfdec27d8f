pub const BACKGROUND_MARKER: &str = "&";
pub const PIPE_MARKER: &str = "|";
pub const REDIRECT_MARKER: &str = ">";

/// Execution mode of one command line. Exactly one applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Trailing `&`.
    Background,
    /// A standalone `|` at index `split`.
    Pipe { split: usize },
    /// `>` as the second-to-last word; the last word names the target.
    Redirect,
    Plain,
}

impl Mode {
    pub fn is_foreground(&self) -> bool {
        !matches!(self, Mode::Background)
    }
}

/// Selects the mode of a tokenized command. Checks run in a fixed order:
/// background, then pipe, then redirect.
pub fn classify<S: AsRef<str>>(words: &[S]) -> Mode {
    let words: Vec<&str> = words.iter().map(AsRef::as_ref).collect();
    match words.as_slice() {
        [.., last] if *last == BACKGROUND_MARKER => Mode::Background,
        _ => match words.iter().position(|w| *w == PIPE_MARKER) {
            Some(split) => Mode::Pipe { split },
            None => match words.as_slice() {
                [.., marker, _] if *marker == REDIRECT_MARKER => Mode::Redirect,
                _ => Mode::Plain,
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_ampersand_is_background() {
        assert_eq!(classify(&["ls", "-l", "&"]), Mode::Background);
    }

    #[test]
    fn background_wins_over_pipe_and_redirect() {
        assert_eq!(classify(&["a", "|", "b", "&"]), Mode::Background);
        assert_eq!(classify(&["a", ">", "f", "&"]), Mode::Background);
    }

    #[test]
    fn ampersand_not_last_is_an_ordinary_word() {
        assert_eq!(classify(&["echo", "&", "x"]), Mode::Plain);
    }

    #[test]
    fn pipe_reports_first_marker_index() {
        assert_eq!(classify(&["echo", "a", "|", "wc", "-l"]), Mode::Pipe { split: 2 });
        assert_eq!(classify(&["a", "|", "b", "|", "c"]), Mode::Pipe { split: 1 });
    }

    #[test]
    fn pipe_wins_over_redirect() {
        assert_eq!(classify(&["a", "|", "b", ">", "f"]), Mode::Pipe { split: 1 });
    }

    #[test]
    fn leading_pipe_is_still_classified_as_pipe() {
        assert_eq!(classify(&["|", "wc"]), Mode::Pipe { split: 0 });
    }

    #[test]
    fn second_to_last_chevron_is_redirect() {
        assert_eq!(classify(&["echo", "hi", ">", "out.txt"]), Mode::Redirect);
        assert_eq!(classify(&[">", "out.txt"]), Mode::Redirect);
    }

    #[test]
    fn chevron_elsewhere_is_plain() {
        assert_eq!(classify(&["echo", ">"]), Mode::Plain);
        assert_eq!(classify(&["echo", ">", "a", "b"]), Mode::Plain);
    }

    #[test]
    fn markers_need_exact_equality() {
        assert_eq!(classify(&["echo", "a&"]), Mode::Plain);
        assert_eq!(classify(&["echo", "a|b"]), Mode::Plain);
        assert_eq!(classify(&["echo", ">>", "f"]), Mode::Plain);
    }

    #[test]
    fn single_word_is_plain() {
        assert_eq!(classify(&["ls"]), Mode::Plain);
    }

    #[test]
    fn works_on_owned_words() {
        let words: Vec<String> = vec!["sleep".into(), "1".into(), "&".into()];
        assert_eq!(classify(&words), Mode::Background);
        assert!(!classify(&words).is_foreground());
    }
}
