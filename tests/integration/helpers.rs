//! Test helpers: a scripted in-process STOMP broker and config builders.

use std::sync::Arc;
use std::time::Duration;

use activemq_exporter::config::{BrokerEndpoint, Config, Credentials};
use activemq_exporter::discovery::DiscoveryTiming;
use activemq_exporter::stomp::{Frame, StompCodec, command};
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;

/// Shrunken protocol timing so a cycle finishes in well under a second.
pub fn fast_timing() -> DiscoveryTiming {
    DiscoveryTiming {
        reply_timeout: Duration::from_millis(300),
        poll_tick: Duration::from_millis(20),
        quiet_period: Duration::from_millis(40),
    }
}

pub fn test_config(port: u16) -> Config {
    Config {
        endpoints: vec![BrokerEndpoint {
            host: "127.0.0.1".to_string(),
            port,
        }],
        credentials: Credentials {
            user: "monitor".to_string(),
            password: "monitor".to_string(),
        },
        use_tls: false,
        scrape_interval_secs: 3600,
        http_port: 0,
    }
}

/// XML attribute-map body for one destination statistics reply.
pub fn destination_reply(destination: &str, pairs: &[(&str, &str)]) -> String {
    let mut entries = format!(
        "<entry><string>destinationName</string><string>{destination}</string></entry>"
    );
    for (name, value) in pairs {
        entries.push_str(&format!(
            "<entry><string>{name}</string><long>{value}</long></entry>"
        ));
    }
    format!("<map>{entries}</map>")
}

/// XML attribute-map body for a broker-level statistics reply.
pub fn broker_reply(broker_name: &str) -> String {
    format!(
        "<map><entry><string>brokerName</string><string>{broker_name}</string></entry></map>"
    )
}

/// A scripted STOMP broker bound to a random local port.
///
/// It answers the CONNECT handshake, accepts subscriptions, and for every
/// SEND to a statistics target streams back whatever reply bodies the
/// supplied script produces, addressed to the request's `reply-to`
/// destination.
pub struct MockBroker {
    pub port: u16,
}

impl MockBroker {
    pub async fn start<F>(replies_for_target: F) -> Self
    where
        F: Fn(&str) -> Vec<String> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let script = Arc::new(replies_for_target);

        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    break;
                };
                let script = script.clone();
                tokio::spawn(serve_connection(socket, script));
            }
        });

        Self { port }
    }
}

async fn serve_connection<F>(socket: TcpStream, script: Arc<F>)
where
    F: Fn(&str) -> Vec<String> + Send + Sync + 'static,
{
    let mut framed = Framed::new(socket, StompCodec::new());
    let mut message_id = 0;

    while let Some(Ok(frame)) = framed.next().await {
        match frame.command.as_str() {
            command::CONNECT => {
                let connected = Frame::new(command::CONNECTED)
                    .header("version", "1.2")
                    .header("heart-beat", "10000,10000");
                framed.send(connected.into()).await.unwrap();
            }
            command::SUBSCRIBE => {}
            command::SEND => {
                let target = frame.get_header("destination").unwrap_or("").to_string();
                let Some(reply_to) = frame.get_header("reply-to").map(str::to_string) else {
                    continue;
                };
                for body in script(&target) {
                    message_id += 1;
                    let message = Frame::new(command::MESSAGE)
                        .header("destination", &reply_to)
                        .header("subscription", "1")
                        .header("message-id", &format!("msg-{message_id}"))
                        .body(&body);
                    framed.send(message.into()).await.unwrap();
                }
            }
            command::DISCONNECT => break,
            _ => {}
        }
    }
}
