//! Line commands understood by the terminal client.

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    /// Start a new conversation.
    New,
    /// Regenerate the answer of turn N (one-based).
    Regenerate(usize),
    /// Read the answer of turn N aloud.
    Speak(usize),
    /// Stop speech playback or capture.
    Stop,
    /// Capture a spoken question.
    Listen,
    History,
    Quit,
    /// Anything else is a question.
    Ask(String),
    /// Blank line.
    Empty,
    /// A slash command that could not be understood.
    Invalid(String),
}

pub const HELP_TEXT: &str = "\
Commands:
  /help       show this help
  /new        start a new conversation
  /regen N    get a fresh answer for question N
  /speak N    read answer N aloud
  /stop       stop speaking or listening
  /listen     ask a question by voice
  /history    show the whole conversation
  /quit       exit
Anything else is sent as a question.";

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Command::Ask(line.to_string());
        };

        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default().to_lowercase();
        let arg = parts.next();
        match (name.as_str(), arg) {
            ("help" | "h" | "?", None) => Command::Help,
            ("new" | "clear", None) => Command::New,
            ("stop", None) => Command::Stop,
            ("listen" | "mic", None) => Command::Listen,
            ("history", None) => Command::History,
            ("quit" | "exit" | "q", None) => Command::Quit,
            ("regen" | "regenerate", Some(n)) => parse_number(n).map_or_else(
                || Command::Invalid(format!("not a question number: {n}")),
                Command::Regenerate,
            ),
            ("speak", Some(n)) => parse_number(n).map_or_else(
                || Command::Invalid(format!("not a question number: {n}")),
                Command::Speak,
            ),
            ("regen" | "regenerate" | "speak", None) => {
                Command::Invalid(format!("/{name} needs a question number"))
            }
            _ => Command::Invalid(format!("unknown command: /{rest}")),
        }
    }
}

fn parse_number(s: &str) -> Option<usize> {
    s.parse::<usize>().ok().filter(|n| *n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_a_question() {
        assert_eq!(
            Command::parse("  What is a noun?  "),
            Command::Ask("What is a noun?".to_string())
        );
        assert_eq!(Command::parse("   "), Command::Empty);
    }

    #[test]
    fn test_commands() {
        assert_eq!(Command::parse("/help"), Command::Help);
        assert_eq!(Command::parse("/NEW"), Command::New);
        assert_eq!(Command::parse("/regen 2"), Command::Regenerate(2));
        assert_eq!(Command::parse("/speak 1"), Command::Speak(1));
        assert_eq!(Command::parse("/stop"), Command::Stop);
        assert_eq!(Command::parse("/listen"), Command::Listen);
        assert_eq!(Command::parse("/history"), Command::History);
        assert_eq!(Command::parse("/quit"), Command::Quit);
    }

    #[test]
    fn test_bad_numbers() {
        assert!(matches!(Command::parse("/regen 0"), Command::Invalid(_)));
        assert!(matches!(Command::parse("/regen two"), Command::Invalid(_)));
        assert!(matches!(Command::parse("/speak"), Command::Invalid(_)));
        assert!(matches!(Command::parse("/dance"), Command::Invalid(_)));
    }
}
