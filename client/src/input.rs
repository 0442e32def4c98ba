//! Terminal command parsing for players and the controller

use shared::ClientMessage;

pub const HELP: &str = "commands: vote <n> | clear | start | next | resolve | status | help | quit";

/// One line typed at the prompt
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Vote(usize),
    Clear,
    Start,
    Next,
    Resolve,
    Status,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        let Some(word) = words.next() else {
            return Err("empty command".to_string());
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "vote" | "v" => {
                let Some(arg) = words.next() else {
                    return Err("usage: vote <option number>".to_string());
                };
                let option = arg
                    .parse::<usize>()
                    .map_err(|_| format!("'{}' is not an option number", arg))?;
                Command::Vote(option)
            }
            "clear" => Command::Clear,
            "start" => Command::Start,
            "next" => Command::Next,
            "resolve" => Command::Resolve,
            "status" | "s" => Command::Status,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => return Err(format!("unknown command '{}'", other)),
        };

        if words.next().is_some() {
            return Err(format!("too many arguments for '{}'", word));
        }
        Ok(command)
    }

    /// The message to send for this command; None for local commands
    pub fn to_message(self) -> Option<ClientMessage> {
        match self {
            Command::Vote(option) => Some(ClientMessage::RoundOptionSelected(Some(option as f64))),
            Command::Clear => Some(ClientMessage::RoundOptionSelected(None)),
            Command::Start => Some(ClientMessage::StartGame),
            Command::Next => Some(ClientMessage::NextRound),
            Command::Resolve => Some(ClientMessage::ResolveRound),
            Command::Status | Command::Help | Command::Quit => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("vote 2"), Ok(Command::Vote(2)));
        assert_eq!(Command::parse("  V 0 "), Ok(Command::Vote(0)));
        assert_eq!(Command::parse("clear"), Ok(Command::Clear));
        assert_eq!(Command::parse("START"), Ok(Command::Start));
        assert_eq!(Command::parse("next"), Ok(Command::Next));
        assert_eq!(Command::parse("resolve"), Ok(Command::Resolve));
        assert_eq!(Command::parse("q"), Ok(Command::Quit));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Command::parse("").is_err());
        assert!(Command::parse("vote").is_err());
        assert!(Command::parse("vote -1").is_err());
        assert!(Command::parse("vote x").is_err());
        assert!(Command::parse("next now").is_err());
        assert!(Command::parse("dance").is_err());
    }

    #[test]
    fn test_commands_to_messages() {
        assert_eq!(
            Command::Vote(1).to_message(),
            Some(ClientMessage::RoundOptionSelected(Some(1.0)))
        );
        assert_eq!(
            Command::Clear.to_message(),
            Some(ClientMessage::RoundOptionSelected(None))
        );
        assert_eq!(Command::Start.to_message(), Some(ClientMessage::StartGame));
        assert_eq!(Command::Status.to_message(), None);
        assert_eq!(Command::Quit.to_message(), None);
    }
}
