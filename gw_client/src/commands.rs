use serde_json::Value;
use std::fmt;

/// One line of shell input.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Login { email: String, password: String },
    Register {
        email: String,
        password: String,
        name: String,
    },
    Heartbeat,
    Logout,
    /// Send an arbitrary opcode with an optional JSON body.
    Raw { opcode: u16, body: Option<Value> },
    State,
    Help,
    Quit,
}

/// Errors that can occur during command parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Command is missing required arguments.
    MissingArguments(&'static str),
    /// Opcode is not a decimal or `0x` hex 16-bit number.
    InvalidOpcode(String),
    /// Raw body is not valid JSON.
    InvalidJson(String),
    /// Unrecognized command.
    UnrecognizedCommand(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingArguments(usage) => write!(f, "Missing arguments. Usage: {usage}"),
            Self::InvalidOpcode(value) => write!(
                f,
                "Invalid opcode '{value}'. Use a decimal or hex number (e.g., '200' or '0x0200')"
            ),
            Self::InvalidJson(reason) => write!(f, "Invalid JSON body: {reason}"),
            Self::UnrecognizedCommand(cmd) => write!(
                f,
                "Unrecognized command '{cmd}'. Type 'help' to see available commands"
            ),
        }
    }
}

impl std::error::Error for ParseError {}

pub const USAGE: &str = "\
  login EMAIL PASSWORD             Log in and store the session token
  register EMAIL PASSWORD NAME     Create an account
  heartbeat                        Measure round-trip time
  logout                           End the session
  raw OPCODE [JSON]                Send any opcode, e.g. 'raw 0x0200 {\"name\":\"r1\"}'
  state                            Show connection state
  help                             Show this help
  quit                             Close the connection and exit";

/// Parse a command string.
///
/// # Examples
///
/// ```
/// use gw_client::commands::{Command, parse_command};
///
/// assert_eq!(parse_command("heartbeat"), Ok(Command::Heartbeat));
/// assert_eq!(
///     parse_command("raw 0x0208"),
///     Ok(Command::Raw { opcode: 0x0208, body: None })
/// );
/// ```
pub fn parse_command(input: &str) -> Result<Command, ParseError> {
    let trimmed = input.trim();

    match trimmed {
        "heartbeat" | "ping" => return Ok(Command::Heartbeat),
        "logout" => return Ok(Command::Logout),
        "state" => return Ok(Command::State),
        "help" | "?" => return Ok(Command::Help),
        "quit" | "exit" => return Ok(Command::Quit),
        _ => {}
    }

    let (head, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (trimmed, ""),
    };
    match head {
        "login" => parse_login(rest),
        "register" => parse_register(rest),
        "raw" => parse_raw(rest),
        _ => Err(ParseError::UnrecognizedCommand(trimmed.to_string())),
    }
}

/// "login EMAIL PASSWORD"
fn parse_login(rest: &str) -> Result<Command, ParseError> {
    let parts: Vec<&str> = rest.split_ascii_whitespace().collect();
    match parts.as_slice() {
        [email, password] => Ok(Command::Login {
            email: email.to_string(),
            password: password.to_string(),
        }),
        _ => Err(ParseError::MissingArguments("login EMAIL PASSWORD")),
    }
}

/// "register EMAIL PASSWORD NAME"; the name may contain spaces.
fn parse_register(rest: &str) -> Result<Command, ParseError> {
    let mut parts = rest.splitn(3, char::is_whitespace);
    match (parts.next(), parts.next(), parts.next().map(str::trim)) {
        (Some(email), Some(password), Some(name)) if !email.is_empty() && !name.is_empty() => {
            Ok(Command::Register {
                email: email.to_string(),
                password: password.to_string(),
                name: name.to_string(),
            })
        }
        _ => Err(ParseError::MissingArguments("register EMAIL PASSWORD NAME")),
    }
}

/// "raw OPCODE [JSON]"
fn parse_raw(rest: &str) -> Result<Command, ParseError> {
    let (op, body) = match rest.split_once(char::is_whitespace) {
        Some((op, body)) => (op, body.trim()),
        None => (rest, ""),
    };
    if op.is_empty() {
        return Err(ParseError::MissingArguments("raw OPCODE [JSON]"));
    }

    let opcode = parse_opcode(op).ok_or_else(|| ParseError::InvalidOpcode(op.to_string()))?;
    let body = if body.is_empty() {
        None
    } else {
        Some(serde_json::from_str(body).map_err(|e| ParseError::InvalidJson(e.to_string()))?)
    };
    Ok(Command::Raw { opcode, body })
}

fn parse_opcode(value: &str) -> Option<u16> {
    match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u16::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse_command("heartbeat"), Ok(Command::Heartbeat));
        assert_eq!(parse_command("ping"), Ok(Command::Heartbeat));
        assert_eq!(parse_command("logout"), Ok(Command::Logout));
        assert_eq!(parse_command("quit"), Ok(Command::Quit));
    }

    #[test]
    fn test_parse_with_surrounding_whitespace() {
        assert_eq!(parse_command("  state  "), Ok(Command::State));
    }

    #[test]
    fn test_parse_login() {
        assert_eq!(
            parse_command("login a@b.com hunter2"),
            Ok(Command::Login {
                email: "a@b.com".to_string(),
                password: "hunter2".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_login_missing_password() {
        assert!(matches!(
            parse_command("login a@b.com"),
            Err(ParseError::MissingArguments(_))
        ));
    }

    #[test]
    fn test_parse_register_name_with_spaces() {
        assert_eq!(
            parse_command("register a@b.com pw Ada Lovelace"),
            Ok(Command::Register {
                email: "a@b.com".to_string(),
                password: "pw".to_string(),
                name: "Ada Lovelace".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_register_missing_name() {
        assert!(matches!(
            parse_command("register a@b.com pw"),
            Err(ParseError::MissingArguments(_))
        ));
    }

    #[test]
    fn test_parse_raw_hex_and_decimal() {
        assert_eq!(
            parse_command("raw 0x0200"),
            Ok(Command::Raw {
                opcode: 0x0200,
                body: None
            })
        );
        assert_eq!(
            parse_command("raw 1"),
            Ok(Command::Raw {
                opcode: 1,
                body: None
            })
        );
    }

    #[test]
    fn test_parse_raw_with_body() {
        assert_eq!(
            parse_command(r#"raw 0x0500 {"message": "hi all"}"#),
            Ok(Command::Raw {
                opcode: 0x0500,
                body: Some(json!({ "message": "hi all" })),
            })
        );
    }

    #[test]
    fn test_parse_raw_invalid_opcode() {
        assert!(matches!(
            parse_command("raw 0x10000"),
            Err(ParseError::InvalidOpcode(_))
        ));
        assert!(matches!(
            parse_command("raw room"),
            Err(ParseError::InvalidOpcode(_))
        ));
    }

    #[test]
    fn test_parse_raw_invalid_json() {
        assert!(matches!(
            parse_command("raw 200 {not json"),
            Err(ParseError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_parse_unrecognized() {
        let result = parse_command("dance");
        assert!(matches!(result, Err(ParseError::UnrecognizedCommand(ref cmd)) if cmd == "dance"));
    }

    #[test]
    fn test_parse_error_display() {
        let msg = ParseError::UnrecognizedCommand("dance".to_string()).to_string();
        assert!(msg.contains("dance"));
        assert!(msg.contains("help"));
    }
}
