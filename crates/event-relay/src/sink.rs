//! Event sinks
//!
//! Delivery is at-most-once: a sink either hands the message off right away
//! or reports a failure. Nothing is queued for retry.

use std::future::Future;
use std::time::Duration;

use rumqttc::{AsyncClient, ConnectionError, Event, MqttOptions, QoS};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::message::ControlMessage;
use crate::RelayError;

/// Destination for relayed gesture messages
pub trait EventSink {
    /// Hand one message to the transport
    fn send(
        &mut self,
        message: &ControlMessage,
    ) -> impl Future<Output = Result<(), RelayError>> + Send;
}

/// MQTT broker settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker host name
    pub host: String,
    /// Broker port
    pub port: u16,
    /// Client id; a random one is generated when empty
    pub client_id: String,
    /// Keep-alive interval (seconds)
    pub keep_alive_secs: u64,
    /// Outgoing request buffer between the client and its event loop
    pub capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: String::new(),
            keep_alive_secs: 30,
            capacity: 64,
        }
    }
}

/// Publishes to `rooms/{room}/control-object` at QoS 0
///
/// The background event-loop task ends when the sink is closed or dropped.
pub struct MqttSink {
    client: AsyncClient,
    host: String,
    stop: oneshot::Sender<()>,
    poller: JoinHandle<()>,
}

impl MqttSink {
    /// Create the client and start polling its event loop in the background
    pub fn connect(config: &MqttConfig) -> Result<Self, RelayError> {
        if config.host.is_empty() {
            return Err(RelayError::Connection("broker host is empty".to_string()));
        }

        let client_id = if config.client_id.is_empty() {
            format!("gesture-{}", Uuid::new_v4().simple())
        } else {
            config.client_id.clone()
        };

        let mut options = MqttOptions::new(client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)));

        let (client, mut eventloop) = AsyncClient::new(options, config.capacity.max(1));

        let (stop, mut stopped) = oneshot::channel::<()>();

        let poller = tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = &mut stopped => break,
                    event = eventloop.poll() => event,
                };
                match event {
                    Ok(Event::Incoming(incoming)) => {
                        debug!("MQTT incoming: {:?}", incoming);
                    }
                    Ok(_) => {}
                    Err(ConnectionError::RequestsDone) => break,
                    Err(e) => {
                        error!("MQTT error: {}", e);
                        tokio::select! {
                            _ = &mut stopped => break,
                            _ = tokio::time::sleep(Duration::from_secs(5)) => {}
                        }
                    }
                }
            }
            debug!("MQTT event loop stopped");
        });

        info!("MQTT sink connecting to {}:{}", config.host, config.port);
        Ok(Self {
            client,
            host: config.host.clone(),
            stop,
            poller,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Disconnect and wait for the event loop to finish
    pub async fn close(self) {
        let MqttSink {
            client,
            stop,
            poller,
            ..
        } = self;
        if let Err(e) = client.try_disconnect() {
            debug!("MQTT disconnect not queued: {}", e);
        }
        let _ = stop.send(());
        if let Err(e) = poller.await {
            warn!("MQTT event loop task failed: {}", e);
        }
        info!("MQTT sink closed");
    }
}

impl EventSink for MqttSink {
    async fn send(&mut self, message: &ControlMessage) -> Result<(), RelayError> {
        let payload = serde_json::to_vec(message)?;
        let topic = message.room.control_topic();

        // Never wait on a full request buffer; drop instead
        self.client
            .try_publish(&topic, QoS::AtMostOnce, false, payload)
            .map_err(|e| RelayError::Publish(e.to_string()))
    }
}

/// In-process room: every subscriber receives every message
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: broadcast::Sender<ControlMessage>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Join the room as a listener
    pub fn subscribe(&self) -> broadcast::Receiver<ControlMessage> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl EventSink for ChannelSink {
    async fn send(&mut self, message: &ControlMessage) -> Result<(), RelayError> {
        // An empty room is not an error: there is simply nobody to relay to
        match self.tx.send(message.clone()) {
            Ok(receivers) => debug!("Relayed {} to {} subscribers", message.event.kind(), receivers),
            Err(_) => debug!("No subscribers in room {}", message.room),
        }
        Ok(())
    }
}

/// Writes one JSON message per line
pub struct WriterSink<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl WriterSink<Stdout> {
    /// Print messages to standard output
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W: AsyncWrite + Unpin + Send> EventSink for WriterSink<W> {
    async fn send(&mut self, message: &ControlMessage) -> Result<(), RelayError> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::RoomCode;
    use gesture::{Direction, GestureEvent};

    fn message(event: GestureEvent) -> ControlMessage {
        ControlMessage::new(RoomCode::new("48213").unwrap(), event)
    }

    #[tokio::test]
    async fn test_channel_sink_fans_out() {
        let mut sink = ChannelSink::new(16);
        let mut first = sink.subscribe();
        let mut second = sink.subscribe();
        assert_eq!(sink.subscriber_count(), 2);

        let sent = message(GestureEvent::PinchMove {
            direction: Direction::Left,
        });
        sink.send(&sent).await.unwrap();

        assert_eq!(first.recv().await.unwrap(), sent);
        assert_eq!(second.recv().await.unwrap(), sent);
    }

    #[tokio::test]
    async fn test_channel_sink_empty_room() {
        let mut sink = ChannelSink::new(4);
        assert!(sink.send(&message(GestureEvent::Open)).await.is_ok());
    }

    #[tokio::test]
    async fn test_writer_sink_json_lines() {
        let mut sink = WriterSink::new(Vec::new());
        sink.send(&message(GestureEvent::Open)).await.unwrap();
        sink.send(&message(GestureEvent::LockToggle { is_locked: true }))
            .await
            .unwrap();

        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["type"], "system_lock");
        assert_eq!(second["isLocked"], true);
    }

    #[test]
    fn test_mqtt_config_defaults() {
        let config: MqttConfig = serde_json::from_str(r#"{"host":"broker.local"}"#).unwrap();
        assert_eq!(config.host, "broker.local");
        assert_eq!(config.port, 1883);
        assert!(config.client_id.is_empty());
    }

    fn unreachable_broker() -> MqttConfig {
        MqttConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            ..Default::default()
        }
    }

    /// Drop the sink but keep its event-loop task
    fn detach(sink: MqttSink) -> JoinHandle<()> {
        sink.poller
    }

    #[tokio::test]
    async fn test_mqtt_close_stops_event_loop() {
        let sink = MqttSink::connect(&unreachable_broker()).unwrap();
        let closed = tokio::time::timeout(Duration::from_secs(2), sink.close()).await;
        assert!(closed.is_ok());
    }

    #[tokio::test]
    async fn test_mqtt_event_loop_ends_on_drop() {
        let sink = MqttSink::connect(&unreachable_broker()).unwrap();
        let poller = detach(sink);
        let finished = tokio::time::timeout(Duration::from_secs(2), poller).await;
        assert!(matches!(finished, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_mqtt_sink_rejects_empty_host() {
        let config = MqttConfig {
            host: String::new(),
            ..Default::default()
        };
        assert!(matches!(
            MqttSink::connect(&config),
            Err(RelayError::Connection(_))
        ));
    }
}
