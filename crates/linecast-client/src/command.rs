//! Interactive command parsing.
//!
//! ```text
//! subscribe <topic>
//! unsubscribe <topic>
//! broadcast <topic> <message...>
//! exit
//! ```

use linecast_protocol::{sanitize, Event};
use thiserror::Error;

/// A parsed user command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send an event to the server.
    Send(Event),
    /// Close the connection and quit.
    Exit,
}

/// Command parse errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// Nothing was typed.
    #[error("Empty command")]
    Empty,

    /// The first word is not a known command.
    #[error("Unknown command: {0}")]
    Unknown(String),

    /// The command needs a topic argument.
    #[error("Missing topic for {0}")]
    MissingTopic(&'static str),
}

/// Parse one line of user input.
///
/// Arguments are split on whitespace; a broadcast message is the remaining
/// words joined by single spaces.
///
/// # Errors
///
/// Returns an error for empty input, unknown commands, or a missing topic.
pub fn parse(line: &str) -> Result<Command, CommandError> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Err(CommandError::Empty);
    };

    match name {
        "exit" => Ok(Command::Exit),
        "subscribe" => {
            let topic = words.next().ok_or(CommandError::MissingTopic("subscribe"))?;
            Ok(Command::Send(Event::subscribe(sanitize(topic))))
        }
        "unsubscribe" => {
            let topic = words.next().ok_or(CommandError::MissingTopic("unsubscribe"))?;
            Ok(Command::Send(Event::unsubscribe(sanitize(topic))))
        }
        "broadcast" => {
            let topic = words.next().ok_or(CommandError::MissingTopic("broadcast"))?;
            let message = words.collect::<Vec<_>>().join(" ");
            Ok(Command::Send(Event::broadcast(
                sanitize(topic),
                sanitize(&message),
            )))
        }
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subscribe() {
        assert_eq!(
            parse("subscribe news\n"),
            Ok(Command::Send(Event::subscribe("news")))
        );
        assert_eq!(
            parse("unsubscribe news"),
            Ok(Command::Send(Event::unsubscribe("news")))
        );
    }

    #[test]
    fn test_parse_broadcast_joins_words() {
        assert_eq!(
            parse("broadcast news hello   there world"),
            Ok(Command::Send(Event::broadcast("news", "hello there world")))
        );
        assert_eq!(
            parse("broadcast news"),
            Ok(Command::Send(Event::broadcast("news", "")))
        );
    }

    #[test]
    fn test_parse_exit() {
        assert_eq!(parse("exit"), Ok(Command::Exit));
        assert_eq!(parse("  exit  \n"), Ok(Command::Exit));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse("   "), Err(CommandError::Empty));
        assert_eq!(parse("hello"), Err(CommandError::Unknown("hello".into())));
        assert_eq!(
            parse("subscribe"),
            Err(CommandError::MissingTopic("subscribe"))
        );
        assert_eq!(
            parse("broadcast"),
            Err(CommandError::MissingTopic("broadcast"))
        );
    }
}
