//! STOMP frame model.
//!
//! Wire layout of a frame:
//!
//! ```text
//! COMMAND\n
//! header-name:header-value\n
//! ...\n
//! \n
//! body\0
//! ```
//!
//! A bare EOL between frames is a heartbeat.

/// STOMP command strings.
pub mod command {
    pub const CONNECT: &str = "CONNECT";
    pub const CONNECTED: &str = "CONNECTED";
    pub const SUBSCRIBE: &str = "SUBSCRIBE";
    pub const SEND: &str = "SEND";
    pub const MESSAGE: &str = "MESSAGE";
    pub const ERROR: &str = "ERROR";
    pub const DISCONNECT: &str = "DISCONNECT";
}

/// A complete STOMP frame.
///
/// Headers keep their wire order; lookups take the first match, which is also
/// what ActiveMQ does for repeated header names.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub command: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    /// First header with the given name, if any.
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// CONNECT frame with credentials and symmetric heartbeat negotiation.
    pub fn connect(login: &str, passcode: &str, heartbeat_ms: u64) -> Self {
        let heartbeat = format!("{heartbeat_ms},{heartbeat_ms}");
        Frame::new(command::CONNECT)
            .header("accept-version", "1.1,1.2")
            .header("login", login)
            .header("passcode", passcode)
            .header("heart-beat", &heartbeat)
    }

    pub fn subscribe(destination: &str, id: &str, ack: &str) -> Self {
        Frame::new(command::SUBSCRIBE)
            .header("destination", destination)
            .header("id", id)
            .header("ack", ack)
    }

    pub fn send(destination: &str, body: &str) -> Self {
        Frame::new(command::SEND)
            .header("destination", destination)
            .body(body)
    }

    pub fn disconnect() -> Self {
        Frame::new(command::DISCONNECT)
    }
}

/// Outbound wire item: a full frame or a single-EOL heartbeat.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    Frame(Frame),
    Heartbeat,
}

impl From<Frame> for OutboundFrame {
    fn from(frame: Frame) -> Self {
        OutboundFrame::Frame(frame)
    }
}
