use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::error::RotctldError;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 4533;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

const RECV_BUFFER_SIZE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Outcome of a command whose reply is an `RPRT <code>` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    pub success: bool,
    pub response: String,
}

/// Maps an azimuth into the [-180, 180) range rotctld expects.
pub fn normalize_azimuth(az: f64) -> f64 {
    (az + 180.0).rem_euclid(360.0) - 180.0
}

/// Clamps an elevation to [0, 90].
pub fn normalize_elevation(el: f64) -> f64 {
    el.clamp(0.0, 90.0)
}

/// Client for hamlib's rotctld.
///
/// See <https://www.mankier.com/1/rotctl#Commands-Rotator_Commands> for the
/// protocol. Every command is a single line; the reply is read with a single
/// receive of at most 1024 bytes, so a reply split across TCP segments is
/// truncated.
pub struct Rotctld {
    host: String,
    port: u16,
    timeout: Duration,
    stream: Option<TcpStream>,
}

impl Rotctld {
    /// Does not touch the network; call [`Rotctld::connect`] before sending commands.
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Result<Self, RotctldError> {
        if port == 0 {
            return Err(RotctldError::InvalidPort(port));
        }
        Ok(Self {
            host: host.into(),
            port,
            timeout,
            stream: None,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn state(&self) -> ConnectionState {
        if self.stream.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Opens the connection and asks for the rotator model, which is returned.
    ///
    /// The client only becomes connected once the model query was answered.
    pub async fn connect(&mut self) -> Result<String, RotctldError> {
        if self.stream.is_some() {
            return Err(RotctldError::AlreadyConnected);
        }

        let addr = self.address();
        let mut stream = timeout(self.timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| RotctldError::Timeout(self.timeout))?
            .map_err(|source| RotctldError::Connect {
                addr: addr.clone(),
                source,
            })?;

        // Dropping the stream on error closes the socket again.
        let model = exchange(&mut stream, "_", self.timeout).await?;
        let model = model.trim().to_string();
        log::info!("Connected to rotctld at {}, rotator model reported as {}", addr, model);

        self.stream = Some(stream);
        Ok(model)
    }

    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            log::debug!("Closed connection to rotctld at {}", self.address());
        }
    }

    /// Sends one command and returns the reply with trailing whitespace removed.
    pub async fn send_command(&mut self, cmd: &str) -> Result<String, RotctldError> {
        let limit = self.timeout;
        let stream = self.stream.as_mut().ok_or(RotctldError::NotConnected)?;
        let resp = match exchange(stream, cmd, limit).await {
            Ok(resp) => resp,
            Err(e) => {
                // A late reply would otherwise be read as the answer to the next command.
                log::warn!("Command [{}] failed: {}", cmd.trim_end(), e);
                self.close();
                return Err(e);
            }
        };
        log::debug!(
            "Sent command [{}], received response [{}]",
            cmd.trim_end(),
            resp.replace('\n', " ")
        );
        Ok(resp)
    }

    pub async fn get_model(&mut self) -> Result<String, RotctldError> {
        let model = self.send_command("_").await?;
        Ok(model.trim().to_string())
    }

    /// Current antenna azimuth and elevation.
    ///
    /// A reply that does not parse is logged and reported as `None`; only
    /// transport failures are errors.
    pub async fn get_pos(&mut self) -> Result<Option<(f64, f64)>, RotctldError> {
        let resp = self.send_command("p").await?;
        let pos = parse_position(&resp);
        if pos.is_none() {
            log::error!("Could not parse position: [{}]", resp.replace('\n', " "));
        }
        Ok(pos)
    }

    /// Commands the rotator to a position.
    ///
    /// The reply arrives right away while the antenna keeps moving for a while;
    /// use [`Rotctld::get_pos`] to see where it actually is.
    pub async fn set_pos(&mut self, azimuth: f64, elevation: f64) -> Result<CommandReply, RotctldError> {
        let command = format!(
            "P {:3.1} {:2.1}",
            normalize_azimuth(azimuth),
            normalize_elevation(elevation)
        );
        log::debug!("Setting position to {}", command);
        let response = self.send_command(&command).await?;
        Ok(CommandReply {
            success: response.contains("RPRT 0"),
            response,
        })
    }

    /// Stops the rotator immediately.
    pub async fn stop(&mut self) -> Result<String, RotctldError> {
        self.send_command("S").await
    }

    /// Not every backend supports parking.
    pub async fn park(&mut self) -> Result<String, RotctldError> {
        self.send_command("K").await
    }

    /// Backend specific capability dump.
    pub async fn capabilities(&mut self) -> Result<String, RotctldError> {
        self.send_command("1").await
    }
}

async fn exchange(stream: &mut TcpStream, cmd: &str, limit: Duration) -> Result<String, RotctldError> {
    let mut line = cmd.to_string();
    if !line.ends_with('\n') {
        line.push('\n');
    }

    timeout(limit, stream.write_all(line.as_bytes()))
        .await
        .map_err(|_| RotctldError::Timeout(limit))??;

    let mut buf = [0u8; RECV_BUFFER_SIZE];
    let n = timeout(limit, stream.read(&mut buf))
        .await
        .map_err(|_| RotctldError::Timeout(limit))??;
    if n == 0 {
        return Err(RotctldError::ConnectionClosed);
    }

    Ok(String::from_utf8_lossy(&buf[..n]).trim_end().to_string())
}

fn parse_position(resp: &str) -> Option<(f64, f64)> {
    let fields: Vec<&str> = resp.lines().map(str::trim).collect();
    match fields.as_slice() {
        [az, el] => Some((az.parse().ok()?, el.parse().ok()?)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    const TEST_TIMEOUT: Duration = Duration::from_millis(500);

    /// Accepts one connection and answers each received line with the next
    /// scripted reply. Lines received after the script ran out get no answer.
    /// Returns the received lines once the client hangs up.
    async fn fake_rotctld(replies: &[&str]) -> (u16, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let replies: Vec<String> = replies.iter().map(|r| r.to_string()).collect();

        let handle = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = socket.into_split();
            let mut lines = BufReader::new(reader).lines();
            let mut replies = replies.into_iter();
            let mut received = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                received.push(line);
                if let Some(reply) = replies.next() {
                    writer.write_all(reply.as_bytes()).await.unwrap();
                }
            }
            received
        });
        (port, handle)
    }

    #[test]
    fn azimuth_normalization() {
        for x in (-200..=200).step_by(10) {
            let az = normalize_azimuth(x as f64);
            assert!((-180.0..=180.0).contains(&az), "{x} -> {az}");
        }
        assert_eq!(normalize_azimuth(200.0), -160.0);
        assert_eq!(normalize_azimuth(-190.0), 170.0);
        assert_eq!(normalize_azimuth(90.0), 90.0);
        assert_eq!(normalize_azimuth(359.0), -1.0);
    }

    #[test]
    fn elevation_normalization() {
        for x in (-200..=200).step_by(10) {
            let el = normalize_elevation(x as f64);
            assert!((0.0..=90.0).contains(&el), "{x} -> {el}");
        }
        assert_eq!(normalize_elevation(95.0), 90.0);
        assert_eq!(normalize_elevation(-3.0), 0.0);
        assert_eq!(normalize_elevation(45.5), 45.5);
    }

    #[test]
    fn position_parsing() {
        assert_eq!(parse_position("180.000000\n45.000000"), Some((180.0, 45.0)));
        assert_eq!(parse_position("-12.5\n0.0"), Some((-12.5, 0.0)));
        assert_eq!(parse_position("RPRT -1"), None);
        assert_eq!(parse_position("1.0\nfoo"), None);
        assert_eq!(parse_position("1.0\n2.0\n3.0"), None);
        assert_eq!(parse_position(""), None);
    }

    #[test]
    fn rejects_port_zero() {
        assert!(matches!(
            Rotctld::new(DEFAULT_HOST, 0, TEST_TIMEOUT),
            Err(RotctldError::InvalidPort(0))
        ));
    }

    #[tokio::test]
    async fn commands_require_connection() {
        let mut client = Rotctld::new(DEFAULT_HOST, DEFAULT_PORT, TEST_TIMEOUT).unwrap();
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(matches!(client.get_pos().await, Err(RotctldError::NotConnected)));
        assert!(matches!(
            client.set_pos(10.0, 10.0).await,
            Err(RotctldError::NotConnected)
        ));
        assert!(matches!(client.park().await, Err(RotctldError::NotConnected)));
    }

    #[tokio::test]
    async fn connect_and_close_track_state() {
        let (port, server) = fake_rotctld(&["Dummy\n"]).await;
        let mut client = Rotctld::new(DEFAULT_HOST, port, TEST_TIMEOUT).unwrap();
        assert!(!client.is_connected());

        let model = client.connect().await.unwrap();
        assert_eq!(model, "Dummy");
        assert_eq!(client.state(), ConnectionState::Connected);
        assert!(matches!(
            client.connect().await,
            Err(RotctldError::AlreadyConnected)
        ));

        client.close();
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert_eq!(server.await.unwrap(), vec!["_"]);
    }

    #[tokio::test]
    async fn set_pos_normalizes_before_sending() {
        let (port, server) = fake_rotctld(&["Dummy\n", "RPRT 0\n"]).await;
        let mut client = Rotctld::new(DEFAULT_HOST, port, TEST_TIMEOUT).unwrap();
        client.connect().await.unwrap();

        let reply = client.set_pos(200.0, 95.0).await.unwrap();
        assert!(reply.success);
        assert_eq!(reply.response, "RPRT 0");

        client.close();
        assert_eq!(server.await.unwrap(), vec!["_", "P -160.0 90.0"]);
    }

    #[tokio::test]
    async fn set_pos_reports_rejection() {
        let (port, _server) = fake_rotctld(&["Dummy\n", "RPRT -1\n"]).await;
        let mut client = Rotctld::new(DEFAULT_HOST, port, TEST_TIMEOUT).unwrap();
        client.connect().await.unwrap();

        let reply = client.set_pos(20.0, 10.0).await.unwrap();
        assert!(!reply.success);
        assert_eq!(reply.response, "RPRT -1");
    }

    #[tokio::test]
    async fn get_pos_parses_or_yields_none() {
        let replies = ["Dummy\n", "180.000000\n45.000000\n", "RPRT -1\n"];
        let (port, server) = fake_rotctld(&replies).await;
        let mut client = Rotctld::new(DEFAULT_HOST, port, TEST_TIMEOUT).unwrap();
        client.connect().await.unwrap();

        assert_eq!(client.get_pos().await.unwrap(), Some((180.0, 45.0)));
        assert_eq!(client.get_pos().await.unwrap(), None);
        assert!(client.is_connected());

        client.close();
        assert_eq!(server.await.unwrap(), vec!["_", "p", "p"]);
    }

    #[tokio::test]
    async fn auxiliary_commands_return_raw_replies() {
        let replies = [
            "Dummy\n",
            "RPRT 0\n",
            "RPRT 0\n",
            "Caps dump for model: 1\nModel name:\tDummy\n",
            "Dummy\n",
        ];
        let (port, server) = fake_rotctld(&replies).await;
        let mut client = Rotctld::new(DEFAULT_HOST, port, TEST_TIMEOUT).unwrap();
        client.connect().await.unwrap();

        assert_eq!(client.stop().await.unwrap(), "RPRT 0");
        assert_eq!(client.park().await.unwrap(), "RPRT 0");
        assert_eq!(
            client.capabilities().await.unwrap(),
            "Caps dump for model: 1\nModel name:\tDummy"
        );
        assert_eq!(client.get_model().await.unwrap(), "Dummy");

        client.close();
        assert_eq!(server.await.unwrap(), vec!["_", "S", "K", "1", "_"]);
    }

    #[tokio::test]
    async fn silent_daemon_times_out() {
        let (port, server) = fake_rotctld(&[]).await;
        let mut client = Rotctld::new(DEFAULT_HOST, port, Duration::from_millis(200)).unwrap();

        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, RotctldError::Timeout(_)), "{err}");
        assert!(!client.is_connected());
        assert_eq!(server.await.unwrap(), vec!["_"]);
    }

    #[tokio::test]
    async fn refused_connection_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut client = Rotctld::new(DEFAULT_HOST, port, TEST_TIMEOUT).unwrap();
        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, RotctldError::Connect { .. }), "{err}");
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn daemon_hanging_up_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = socket.into_split();
            let mut lines = BufReader::new(reader).lines();
            lines.next_line().await.unwrap();
            writer.write_all(b"Dummy\n").await.unwrap();
            // both halves dropped here
        });

        let mut client = Rotctld::new(DEFAULT_HOST, port, TEST_TIMEOUT).unwrap();
        client.connect().await.unwrap();
        let err = client.get_pos().await.unwrap_err();
        assert!(
            matches!(err, RotctldError::ConnectionClosed | RotctldError::Io(_)),
            "{err}"
        );
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn unanswered_command_drops_the_connection() {
        let (port, server) = fake_rotctld(&["Dummy\n"]).await;
        let mut client = Rotctld::new(DEFAULT_HOST, port, Duration::from_millis(200)).unwrap();
        client.connect().await.unwrap();

        let err = client.get_pos().await.unwrap_err();
        assert!(matches!(err, RotctldError::Timeout(_)), "{err}");
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(matches!(
            client.get_pos().await,
            Err(RotctldError::NotConnected)
        ));
        assert_eq!(server.await.unwrap(), vec!["_", "p"]);
    }
}
