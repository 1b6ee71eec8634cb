//! Socket.IO client over tokio-tungstenite.

use super::codec::{self, EnginePacket, Handshake, SocketPacket};
use super::{ChannelError, ChannelResult, inbound_event};
use crate::types::{ChannelEvent, ConnectionStatus, OutboundEvent};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep, sleep_until, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use url::Url;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Writer = SplitSink<Socket, Message>;

const RECONNECT_BASE: Duration = Duration::from_millis(500);
const RECONNECT_MAX: Duration = Duration::from_secs(30);

/// Keep the channel up until `shutdown` fires, reconnecting with backoff
/// whenever the socket fails. Queued outbound events survive reconnects.
pub(super) async fn run(
    endpoint: Url,
    connect_timeout: Duration,
    mut outgoing: mpsc::UnboundedReceiver<OutboundEvent>,
    events: mpsc::UnboundedSender<ChannelEvent>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut attempt: u32 = 0;

    loop {
        if events.is_closed() {
            debug!("no one is listening for channel events");
            return;
        }
        let _ = events.send(ChannelEvent::Status(ConnectionStatus::Connecting));
        info!(endpoint = %endpoint, attempt, "connecting realtime channel");

        let connected = tokio::select! {
            _ = &mut shutdown => {
                debug!("channel closed before connecting");
                return;
            }
            result = connect(&endpoint, connect_timeout) => result,
        };

        let reason = match connected {
            Ok((socket, handshake)) => {
                attempt = 0;
                info!(sid = %handshake.sid, "realtime channel connected");
                let _ = events.send(ChannelEvent::Status(ConnectionStatus::Connected));

                match pump(socket, &handshake, &mut outgoing, &events, &mut shutdown).await {
                    Ok(()) => {
                        info!("realtime channel closed");
                        let _ = events.send(ChannelEvent::Status(ConnectionStatus::Disconnected(
                            "closed".to_string(),
                        )));
                        return;
                    }
                    Err(err) => {
                        warn!(error = %err, "realtime channel dropped");
                        err.to_string()
                    }
                }
            }
            Err(err) => {
                warn!(endpoint = %endpoint, error = %err, "realtime channel unavailable");
                err.to_string()
            }
        };
        let _ = events.send(ChannelEvent::Status(ConnectionStatus::Disconnected(reason)));

        attempt = attempt.saturating_add(1);
        let delay = reconnect_delay(attempt);
        debug!(attempt, delay_ms = delay.as_millis() as u64, "reconnecting realtime channel");
        tokio::select! {
            _ = &mut shutdown => {
                debug!("channel closed while waiting to reconnect");
                return;
            }
            _ = sleep(delay) => {}
        }
    }
}

/// Doubling delay before reconnect `attempt` (1-based), capped.
fn reconnect_delay(attempt: u32) -> Duration {
    let factor = 1u32 << attempt.saturating_sub(1).min(16);
    RECONNECT_BASE.saturating_mul(factor).min(RECONNECT_MAX)
}

async fn connect(endpoint: &Url, limit: Duration) -> ChannelResult<(Socket, Handshake)> {
    let (mut socket, _response) = timeout(limit, connect_async(endpoint.as_str()))
        .await
        .map_err(|_| ChannelError::Timeout)?
        .map_err(|e| ChannelError::Connect(e.to_string()))?;

    let handshake = timeout(limit, handshake(&mut socket))
        .await
        .map_err(|_| ChannelError::Timeout)??;
    Ok((socket, handshake))
}

/// Wait for the Engine.IO open packet, then join the default namespace.
async fn handshake(socket: &mut Socket) -> ChannelResult<Handshake> {
    let opened = loop {
        match next_packet(socket).await? {
            Some(EnginePacket::Open(handshake)) => break handshake,
            Some(other) => debug!(?other, "ignoring packet before open"),
            None => return Err(ChannelError::Connect("socket closed during handshake".into())),
        }
    };

    let connect = codec::encode(&EnginePacket::Message(SocketPacket::connect()));
    socket
        .send(Message::Text(connect))
        .await
        .map_err(|e| ChannelError::Connect(e.to_string()))?;

    loop {
        match next_packet(socket).await? {
            Some(EnginePacket::Message(SocketPacket::Connect { .. })) => return Ok(opened),
            Some(EnginePacket::Message(SocketPacket::ConnectError { data, .. })) => {
                let reason = data
                    .as_ref()
                    .and_then(|d| d.get("message"))
                    .and_then(|m| m.as_str())
                    .unwrap_or("connect error")
                    .to_string();
                return Err(ChannelError::Refused(reason));
            }
            Some(EnginePacket::Ping(data)) => {
                socket
                    .send(Message::Text(codec::encode(&EnginePacket::Pong(data))))
                    .await
                    .map_err(|e| ChannelError::Connect(e.to_string()))?;
            }
            Some(other) => debug!(?other, "ignoring packet during namespace connect"),
            None => return Err(ChannelError::Connect("socket closed during handshake".into())),
        }
    }
}

async fn next_packet(socket: &mut Socket) -> ChannelResult<Option<EnginePacket>> {
    while let Some(message) = socket.next().await {
        match message.map_err(|e| ChannelError::Connect(e.to_string()))? {
            Message::Text(text) => return Ok(Some(codec::decode(&text)?)),
            Message::Close(_) => return Ok(None),
            _ => continue,
        }
    }
    Ok(None)
}

async fn pump(
    socket: Socket,
    handshake: &Handshake,
    outgoing: &mut mpsc::UnboundedReceiver<OutboundEvent>,
    events: &mpsc::UnboundedSender<ChannelEvent>,
    shutdown: &mut oneshot::Receiver<()>,
) -> ChannelResult<()> {
    let (mut writer, mut reader) = socket.split();
    let liveness = Duration::from_millis(handshake.ping_interval + handshake.ping_timeout);
    let mut deadline = Instant::now() + liveness;

    loop {
        tokio::select! {
            _ = &mut *shutdown => {
                disconnect(&mut writer).await;
                return Ok(());
            }
            outbound = outgoing.recv() => {
                let Some(event) = outbound else {
                    disconnect(&mut writer).await;
                    return Ok(());
                };
                let packet = EnginePacket::Message(SocketPacket::event(event.name(), event.payload()));
                send(&mut writer, &packet).await?;
            }
            inbound = reader.next() => {
                match read(inbound, &mut writer, events).await? {
                    Read::Alive => deadline = Instant::now() + liveness,
                    Read::Continue => {}
                    Read::Stop(reason) => return Err(ChannelError::Dropped(reason)),
                }
            }
            _ = sleep_until(deadline) => {
                return Err(ChannelError::Dropped(format!(
                    "no ping from server in {} ms",
                    liveness.as_millis()
                )));
            }
        }
    }
}

enum Read {
    /// A ping arrived; the server is still there.
    Alive,
    Continue,
    Stop(String),
}

async fn read(
    inbound: Option<Result<Message, tokio_tungstenite::tungstenite::Error>>,
    writer: &mut Writer,
    events: &mpsc::UnboundedSender<ChannelEvent>,
) -> ChannelResult<Read> {
    let message = match inbound {
        Some(Ok(message)) => message,
        Some(Err(err)) => return Ok(Read::Stop(format!("read failed: {err}"))),
        None => return Ok(Read::Stop("server closed the connection".into())),
    };

    let text = match message {
        Message::Text(text) => text,
        Message::Close(_) => return Ok(Read::Stop("server closed the connection".into())),
        Message::Binary(_) => {
            warn!("dropping binary frame");
            return Ok(Read::Continue);
        }
        _ => return Ok(Read::Continue),
    };

    let packet = match codec::decode(&text) {
        Ok(packet) => packet,
        Err(err) => {
            warn!(error = %err, "dropping undecodable frame");
            return Ok(Read::Continue);
        }
    };

    match packet {
        EnginePacket::Ping(data) => {
            send(writer, &EnginePacket::Pong(data)).await?;
            Ok(Read::Alive)
        }
        EnginePacket::Close => Ok(Read::Stop("server closed the session".into())),
        EnginePacket::Message(SocketPacket::Disconnect { namespace }) if namespace == "/" => {
            Ok(Read::Stop("server disconnected the namespace".into()))
        }
        EnginePacket::Message(SocketPacket::Event { namespace, .. }) if namespace != "/" => {
            debug!(%namespace, "ignoring event outside the default namespace");
            Ok(Read::Continue)
        }
        EnginePacket::Message(SocketPacket::Event { name, args, .. }) => {
            match inbound_event(&name, &args) {
                Some(event) => {
                    debug!(event = %name, "received");
                    let _ = events.send(event);
                }
                None => debug!(event = %name, "ignoring unhandled event"),
            }
            Ok(Read::Continue)
        }
        other => {
            debug!(?other, "ignoring packet");
            Ok(Read::Continue)
        }
    }
}

async fn send(writer: &mut Writer, packet: &EnginePacket) -> ChannelResult<()> {
    writer
        .send(Message::Text(codec::encode(packet)))
        .await
        .map_err(|e| ChannelError::Dropped(format!("write failed: {e}")))
}

async fn disconnect(writer: &mut Writer) {
    let leave = EnginePacket::Message(SocketPacket::Disconnect {
        namespace: "/".to_string(),
    });
    if let Err(err) = send(writer, &leave).await {
        debug!(error = %err, "disconnect packet not delivered");
    }
    let _ = writer.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconnect_delay_doubles_up_to_cap() {
        assert_eq!(reconnect_delay(1), Duration::from_millis(500));
        assert_eq!(reconnect_delay(2), Duration::from_secs(1));
        assert_eq!(reconnect_delay(4), Duration::from_secs(4));
        assert_eq!(reconnect_delay(7), RECONNECT_MAX);
        assert_eq!(reconnect_delay(u32::MAX), RECONNECT_MAX);
    }
}
