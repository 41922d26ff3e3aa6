use super::protocol::{parse_reply, quote, NutError};
use super::{UpsDaemon, UpsDescriptor, VariableSet};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

/// Longest reply line accepted from the daemon, newline included.
pub const MAX_REPLY_LINE: usize = 64 * 1024;

/// One `upsd` session. Requests are strictly sequential on the stream.
pub struct NutClient<S = TcpStream> {
    stream: BufReader<S>,
    line: String,
    reply_timeout: Duration,
}

impl NutClient<TcpStream> {
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, NutError> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| NutError::Timeout(timeout))??;
        stream.set_nodelay(true)?;
        debug!(%host, port, "tcp session to upsd established");
        Ok(Self::new(stream, timeout))
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> NutClient<S> {
    /// Every reply line must arrive within `reply_timeout`.
    pub fn new(stream: S, reply_timeout: Duration) -> Self {
        Self {
            stream: BufReader::new(stream),
            line: String::new(),
            reply_timeout,
        }
    }

    async fn send(&mut self, request: &str) -> Result<(), NutError> {
        self.stream.write_all(request.as_bytes()).await?;
        self.stream.write_all(b"\n").await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn read_reply(&mut self) -> Result<Vec<String>, NutError> {
        self.line.clear();
        let limit = self.reply_timeout;
        let mut capped = (&mut self.stream).take(MAX_REPLY_LINE as u64);
        let read = tokio::time::timeout(limit, capped.read_line(&mut self.line))
            .await
            .map_err(|_| NutError::Timeout(limit))??;
        if read == 0 {
            return Err(NutError::Closed);
        }
        if read >= MAX_REPLY_LINE && !self.line.ends_with('\n') {
            return Err(NutError::Protocol(format!("reply line longer than {MAX_REPLY_LINE} bytes")));
        }
        parse_reply(&self.line)
    }

    /// Run `LIST <query>` and return each item line with the query words
    /// stripped off the front.
    async fn list(&mut self, query: &[&str]) -> Result<Vec<Vec<String>>, NutError> {
        let args: Vec<String> = query.iter().map(|a| quote(a)).collect();
        self.send(&format!("LIST {}", args.join(" "))).await?;

        let begin = self.read_reply().await?;
        if !is_list_marker(&begin, "BEGIN", query) {
            return Err(NutError::Protocol(format!("expected BEGIN LIST, got {begin:?}")));
        }
        let mut items = Vec::new();
        loop {
            let words = self.read_reply().await?;
            if is_list_marker(&words, "END", query) {
                return Ok(items);
            }
            if words.len() <= query.len() || words.iter().zip(query).any(|(w, q)| w != q) {
                return Err(NutError::Protocol(format!("unexpected list item {words:?}")));
            }
            items.push(words[query.len()..].to_vec());
        }
    }
}

fn is_list_marker(words: &[String], marker: &str, query: &[&str]) -> bool {
    words.len() == query.len() + 2
        && words[0] == marker
        && words[1] == "LIST"
        && words[2..].iter().zip(query).all(|(w, q)| w == q)
}

impl<S: AsyncRead + AsyncWrite + Unpin> UpsDaemon for NutClient<S> {
    async fn list_ups(&mut self) -> Result<Vec<UpsDescriptor>, NutError> {
        let items = self.list(&["UPS"]).await?;
        Ok(items
            .into_iter()
            .map(|mut item| {
                let description = if item.len() > 1 { item.remove(1) } else { String::new() };
                UpsDescriptor {
                    name: item.swap_remove(0),
                    description,
                }
            })
            .collect())
    }

    async fn list_vars(&mut self, ups: &str) -> Result<VariableSet, NutError> {
        let items = self.list(&["VAR", ups]).await?;
        let mut vars = VariableSet::new();
        for mut item in items {
            if item.len() != 2 {
                return Err(NutError::Protocol(format!("malformed VAR line for {ups}: {item:?}")));
            }
            let value = item.pop().unwrap_or_default();
            let name = item.pop().unwrap_or_default();
            vars.insert(name, value);
        }
        Ok(vars)
    }

    async fn logout(&mut self) -> Result<(), NutError> {
        self.send("LOGOUT").await?;
        // upsd answers "OK Goodbye" and closes; either outcome is fine here.
        let _ = self.read_reply().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader};

    const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

    /// Serve canned replies keyed by request line, then hang up.
    async fn scripted_daemon(script: Vec<(&'static str, &'static str)>) -> NutClient<tokio::io::DuplexStream> {
        let (client, server) = duplex(8 * 1024);
        tokio::spawn(async move {
            let mut server = BufReader::new(server);
            for (expected, reply) in script {
                let mut line = String::new();
                if server.read_line(&mut line).await.unwrap_or(0) == 0 {
                    return;
                }
                assert_eq!(line.trim_end(), expected);
                server.write_all(reply.as_bytes()).await.unwrap();
            }
        });
        NutClient::new(client, REPLY_TIMEOUT)
    }

    #[tokio::test]
    async fn lists_units_in_daemon_order() {
        let mut client = scripted_daemon(vec![(
            "LIST UPS",
            "BEGIN LIST UPS\nUPS rack \"Rack UPS\"\nUPS desk \"Desk, \\\"small\\\"\"\nEND LIST UPS\n",
        )])
        .await;
        let units = client.list_ups().await.unwrap();
        let names: Vec<_> = units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["rack", "desk"]);
        assert_eq!(units[1].description, "Desk, \"small\"");
    }

    #[tokio::test]
    async fn lists_variables_for_one_unit() {
        let mut client = scripted_daemon(vec![(
            "LIST VAR rack",
            "BEGIN LIST VAR rack\nVAR rack ups.load \"45\"\nVAR rack ups.status \"OL CHRG\"\nEND LIST VAR rack\n",
        )])
        .await;
        let vars = client.list_vars("rack").await.unwrap();
        assert_eq!(vars.len(), 2);
        assert_eq!(vars["ups.load"], "45");
        assert_eq!(vars["ups.status"], "OL CHRG");
    }

    #[tokio::test]
    async fn surfaces_stale_data_distinctly() {
        let mut client = scripted_daemon(vec![("LIST UPS", "ERR DATA-STALE\n")]).await;
        assert!(client.list_ups().await.unwrap_err().is_stale());
    }

    #[tokio::test]
    async fn err_reply_keeps_session_usable() {
        let mut client = scripted_daemon(vec![
            ("LIST VAR ghost", "ERR UNKNOWN-UPS\n"),
            ("LIST UPS", "BEGIN LIST UPS\nEND LIST UPS\n"),
        ])
        .await;
        let err = client.list_vars("ghost").await.unwrap_err();
        assert!(matches!(err, NutError::Daemon(ref code) if code == "UNKNOWN-UPS"));
        assert!(client.list_ups().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn hangup_mid_list_is_closed() {
        let mut client = scripted_daemon(vec![("LIST UPS", "BEGIN LIST UPS\nUPS rack \"x\"\n")]).await;
        let err = client.list_ups().await.unwrap_err();
        assert!(matches!(err, NutError::Closed));
        assert!(err.breaks_session());
    }

    #[tokio::test]
    async fn mismatched_list_header_is_protocol_error() {
        let mut client = scripted_daemon(vec![("LIST VAR rack", "BEGIN LIST VAR desk\n")]).await;
        assert!(matches!(client.list_vars("rack").await, Err(NutError::Protocol(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_daemon_times_out_and_breaks_session() {
        let (client, server) = duplex(8 * 1024);
        // Keep the peer open but never answer.
        let _server = server;
        let mut client = NutClient::new(client, REPLY_TIMEOUT);
        let err = client.list_ups().await.unwrap_err();
        assert!(matches!(err, NutError::Timeout(d) if d == REPLY_TIMEOUT), "{err:?}");
        assert!(err.breaks_session());
    }

    #[tokio::test]
    async fn overlong_reply_line_is_protocol_error() {
        let (client, server) = duplex(8 * 1024);
        tokio::spawn(async move {
            let mut server = BufReader::new(server);
            let mut line = String::new();
            server.read_line(&mut line).await.unwrap();
            let flood = vec![b'x'; MAX_REPLY_LINE + 16];
            let _ = server.write_all(&flood).await;
        });
        let mut client = NutClient::new(client, REPLY_TIMEOUT);
        let err = client.list_ups().await.unwrap_err();
        assert!(matches!(err, NutError::Protocol(ref why) if why.contains("longer than")), "{err:?}");
        assert!(err.breaks_session());
    }

    #[tokio::test(start_paused = true)]
    async fn connect_to_unanswered_address_times_out() {
        let timeout = Duration::from_millis(250);
        // TEST-NET-1 is never routed, so the SYN goes unanswered.
        let result = NutClient::connect("192.0.2.1", 3493, timeout).await;
        match result {
            Err(NutError::Timeout(d)) => assert_eq!(d, timeout),
            // Hosts without a default route refuse immediately.
            Err(NutError::Io(_)) => {}
            Err(other) => panic!("unexpected {other:?}"),
            Ok(_) => panic!("connected to a documentation address"),
        }
    }
}
