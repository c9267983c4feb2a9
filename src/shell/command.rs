/// A single parsed console command: one verb plus up to two arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Mkdir { name: String },
    Touch { name: String, content: String },
    Ls,
    Cd { path: String },
    Format,
    Exit,
    /// Blank input line.
    Nothing,
    /// Known verb, missing a required argument.
    Malformed { usage: &'static str },
    Unknown { verb: String },
}

impl Command {
    /// Tokenizes one console line.
    ///
    /// `mkdir` and `cd` take a single whitespace-delimited argument; extra
    /// tokens are ignored. The content argument of `touch` is the remainder
    /// of the line, so it may contain spaces.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let Some(verb) = line.split_whitespace().next() else {
            return Command::Nothing;
        };
        let rest = line[verb.len()..].trim_start();

        match verb {
            "mkdir" => match first_token(rest) {
                Some(name) => Command::Mkdir { name },
                None => Command::Malformed {
                    usage: "mkdir <name>",
                },
            },
            "touch" => match first_token(rest) {
                Some(name) => {
                    let content = rest[name.len()..].trim().to_string();
                    Command::Touch { name, content }
                }
                None => Command::Malformed {
                    usage: "touch <name> [content]",
                },
            },
            "ls" => Command::Ls,
            "cd" => match first_token(rest) {
                Some(path) => Command::Cd { path },
                None => Command::Malformed { usage: "cd <path>" },
            },
            "format" => Command::Format,
            "exit" | "quit" => Command::Exit,
            _ => Command::Unknown {
                verb: verb.to_string(),
            },
        }
    }
}

fn first_token(rest: &str) -> Option<String> {
    rest.split_whitespace().next().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    #[rstest]
    #[case("ls", Command::Ls)]
    #[case("  ls  ", Command::Ls)]
    #[case("format", Command::Format)]
    #[case("exit", Command::Exit)]
    #[case("quit", Command::Exit)]
    #[case("", Command::Nothing)]
    #[case("   ", Command::Nothing)]
    #[case("mkdir docs", Command::Mkdir { name: "docs".into() })]
    #[case("cd ../a/b", Command::Cd { path: "../a/b".into() })]
    #[case("touch note", Command::Touch { name: "note".into(), content: String::new() })]
    #[case(
        "touch note hello world",
        Command::Touch { name: "note".into(), content: "hello world".into() }
    )]
    fn parse_table(#[case] line: &str, #[case] expected: Command) {
        assert_eq!(Command::parse(line), expected);
    }

    #[rstest]
    #[case("mkdir")]
    #[case("touch")]
    #[case("cd")]
    fn missing_argument_is_malformed(#[case] line: &str) {
        assert!(matches!(
            Command::parse(line),
            Command::Malformed { .. }
        ));
    }

    #[test]
    fn unknown_verb_is_reported_as_such() {
        assert_eq!(
            Command::parse("rmdir docs"),
            Command::Unknown {
                verb: "rmdir".into()
            }
        );
    }

    #[test]
    fn extra_tokens_after_mkdir_are_ignored() {
        assert_eq!(
            Command::parse("mkdir a b c"),
            Command::Mkdir { name: "a".into() }
        );
    }
}
