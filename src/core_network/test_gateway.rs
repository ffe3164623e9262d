// End-to-end gateway scenarios against the in-memory remote transport

use crate::config::Config;
use crate::core_pool::AdmissionSemaphore;
use crate::core_transport::memory::MemoryFactory;
use crate::server::{self, GatewayHandle};
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

struct FtpClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl FtpClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, writer) = stream.into_split();
        let mut client = Self {
            reader: BufReader::new(read_half),
            writer,
        };
        let banner = client.read_reply().await;
        assert!(banner.starts_with("220 "), "{}", banner);
        client
    }

    /// Reads one reply; multi-line replies are joined with '\n'.
    async fn read_reply(&mut self) -> String {
        let mut reply = String::new();
        loop {
            let mut line = String::new();
            let n = tokio::time::timeout(Duration::from_secs(10), self.reader.read_line(&mut line))
                .await
                .expect("reply timed out")
                .unwrap();
            if n == 0 {
                return reply;
            }
            let line = line.trim_end().to_string();
            let done = line.len() >= 4 && line.as_bytes()[3] == b' ';
            if !reply.is_empty() {
                reply.push('\n');
            }
            reply.push_str(&line);
            if done {
                return reply;
            }
        }
    }

    async fn send(&mut self, command: &str) {
        self.writer
            .write_all(format!("{}\r\n", command).as_bytes())
            .await
            .unwrap();
    }

    async fn cmd(&mut self, command: &str) -> String {
        self.send(command).await;
        self.read_reply().await
    }

    async fn login(&mut self) {
        assert!(self.cmd("USER a").await.starts_with("331"));
        assert!(self.cmd("PASS b").await.starts_with("230"));
    }

    async fn pasv(&mut self) -> u16 {
        let reply = self.cmd("PASV").await;
        assert!(reply.starts_with("227 "), "{}", reply);
        let inner = &reply[reply.find('(').unwrap() + 1..reply.find(')').unwrap()];
        let parts: Vec<u16> = inner.split(',').map(|p| p.parse().unwrap()).collect();
        parts[4] * 256 + parts[5]
    }

    async fn open_data(&mut self) -> TcpStream {
        let port = self.pasv().await;
        TcpStream::connect(("127.0.0.1", port)).await.unwrap()
    }
}

fn test_config(pasv_base: u16) -> Config {
    let mut config = Config::default();
    config.server.listen_port = 0;
    config.server.pasv_port_min = pasv_base;
    config.server.pasv_port_max = pasv_base + 9;
    config.pool.keep_warm = false;
    config.pool.retry_delay_ms = 1;
    config.remote.max_connections = 2;
    config
}

async fn start_gateway(config: Config) -> (GatewayHandle, Arc<MemoryFactory>) {
    let factory = Arc::new(MemoryFactory::new("nas"));
    let admission = Arc::new(AdmissionSemaphore::new());
    let gateway = server::start(Arc::new(config), factory.clone(), admission)
        .await
        .unwrap();
    (gateway, factory)
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 253) as u8).collect()
}

async fn read_all(mut data: TcpStream) -> Vec<u8> {
    let mut received = Vec::new();
    data.read_to_end(&mut received).await.unwrap();
    received
}

#[tokio::test]
async fn test_login_pwd_and_cwd() {
    let (gateway, factory) = start_gateway(test_config(62000)).await;
    factory.state.add_dir("/sub");
    let mut client = FtpClient::connect(gateway.local_addr()).await;

    client.login().await;
    assert_eq!(client.cmd("PWD").await, "257 \"/\" is current directory");
    assert_eq!(client.cmd("CWD sub").await, "250 Directory changed to /sub");
    assert_eq!(client.cmd("CWD missing").await, "550 Directory not found");
    assert_eq!(client.cmd("PWD").await, "257 \"/sub\" is current directory");
    assert!(client.cmd("CDUP").await.starts_with("250"));
    assert_eq!(client.cmd("PWD").await, "257 \"/\" is current directory");
    assert_eq!(client.cmd("SYST").await, "215 UNIX Type: L8");

    gateway.stop().await;
}

#[tokio::test]
async fn test_second_pasv_closes_first_listener() {
    let (gateway, _factory) = start_gateway(test_config(62010)).await;
    let mut client = FtpClient::connect(gateway.local_addr()).await;
    client.login().await;

    let first = client.pasv().await;
    let second = client.pasv().await;
    assert_ne!(first, second);
    assert!(TcpStream::connect(("127.0.0.1", first)).await.is_err());

    let epsv = client.cmd("EPSV").await;
    assert!(epsv.starts_with("229 Entering Extended Passive Mode (|||"), "{}", epsv);
    assert_eq!(client.cmd("EPSV ALL").await, "200 EPSV ALL command successful");

    gateway.stop().await;
}

#[tokio::test]
async fn test_list_directory() {
    let (gateway, factory) = start_gateway(test_config(62020)).await;
    factory.state.add_file("/movies/a.mkv", vec![0; 42]);
    factory.state.add_dir("/movies/extras");
    let mut client = FtpClient::connect(gateway.local_addr()).await;
    client.login().await;

    let data = client.open_data().await;
    assert_eq!(
        client.cmd("LIST /movies").await,
        "150 Opening data connection for directory listing"
    );
    let listing = String::from_utf8(read_all(data).await).unwrap();
    assert_eq!(client.read_reply().await, "226 Directory send OK");

    let lines: Vec<&str> = listing.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().any(|l| l.starts_with('d') && l.ends_with(" extras")));
    assert!(lines.iter().any(|l| l.starts_with('-') && l.ends_with(" a.mkv")));

    gateway.stop().await;
}

#[tokio::test]
async fn test_rest_offset_is_consumed_once() {
    let (gateway, factory) = start_gateway(test_config(62030)).await;
    let content = pattern(5_000);
    factory.state.add_file("/file.bin", content.clone());
    let mut client = FtpClient::connect(gateway.local_addr()).await;
    client.login().await;

    assert_eq!(
        client.cmd("REST 1200").await,
        "350 Restarting at 1200. Send RETR to initiate transfer."
    );
    let data = client.open_data().await;
    assert!(client.cmd("RETR /file.bin").await.starts_with("150"));
    assert_eq!(read_all(data).await, content[1200..].to_vec());
    assert_eq!(client.read_reply().await, "226 Transfer complete");

    let data = client.open_data().await;
    assert!(client.cmd("RETR file.bin").await.starts_with("150"));
    assert_eq!(read_all(data).await, content);
    assert_eq!(client.read_reply().await, "226 Transfer complete");

    assert_eq!(client.cmd("REST abc").await, "501 Invalid REST parameter");
    assert_eq!(client.cmd("REST -5").await, "501 Invalid REST parameter");

    gateway.stop().await;
}

#[tokio::test]
async fn test_rename_sequence() {
    let (gateway, factory) = start_gateway(test_config(62040)).await;
    factory.state.add_file("/old.txt", b"x".to_vec());
    let mut client = FtpClient::connect(gateway.local_addr()).await;
    client.login().await;

    assert_eq!(client.cmd("RNTO /new.txt").await, "503 Bad sequence of commands");
    assert_eq!(client.cmd("RNFR old.txt").await, "350 Ready for destination name");
    assert_eq!(client.cmd("RNTO new.txt").await, "250 Rename successful");
    assert!(factory.state.file("/new.txt").is_some());
    assert!(factory.state.file("/old.txt").is_none());

    // A failed rename still clears the staged source.
    assert!(client.cmd("RNFR /missing").await.starts_with("350"));
    assert!(client.cmd("RNTO /other").await.starts_with("550"));
    assert_eq!(client.cmd("RNTO /other").await, "503 Bad sequence of commands");

    gateway.stop().await;
}

#[tokio::test]
async fn test_stor_large_upload() {
    let scratch = tempfile::tempdir().unwrap();
    let mut config = test_config(62050);
    config.server.scratch_dir = Some(scratch.path().to_string_lossy().into_owned());
    let (gateway, factory) = start_gateway(config).await;
    let mut client = FtpClient::connect(gateway.local_addr()).await;
    client.login().await;

    let payload = pattern(10 * 1024 * 1024);
    let mut data = client.open_data().await;
    assert_eq!(
        client.cmd("STOR /file.bin").await,
        "150 Opening data connection for file upload"
    );
    data.write_all(&payload).await.unwrap();
    data.shutdown().await.unwrap();
    drop(data);

    assert_eq!(client.read_reply().await, "226 Transfer complete");
    let stored = factory.state.file("/file.bin").unwrap();
    assert_eq!(stored.len(), payload.len());
    assert!(stored == payload);
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    assert_eq!(factory.state.open_files.load(Ordering::SeqCst), 0);

    gateway.stop().await;
}

#[tokio::test]
async fn test_failed_upload_removes_scratch_file() {
    let scratch = tempfile::tempdir().unwrap();
    let mut config = test_config(62060);
    config.server.scratch_dir = Some(scratch.path().to_string_lossy().into_owned());
    let (gateway, factory) = start_gateway(config).await;
    factory.state.fail_writes.store(true, Ordering::SeqCst);
    let mut client = FtpClient::connect(gateway.local_addr()).await;
    client.login().await;

    let mut data = client.open_data().await;
    assert!(client.cmd("STOR /file.bin").await.starts_with("150"));
    data.write_all(&pattern(300_000)).await.unwrap();
    drop(data);

    let reply = client.read_reply().await;
    assert!(reply.starts_with("550"), "{}", reply);
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    assert_eq!(factory.state.open_files.load(Ordering::SeqCst), 0);

    gateway.stop().await;
}

#[tokio::test]
async fn test_abor_releases_transport() {
    let mut config = test_config(62070);
    config.remote.max_connections = 1;
    let (gateway, factory) = start_gateway(config).await;
    factory.state.add_file("/big.bin", pattern(4 * 1024 * 1024));
    factory.state.set_read_delay(Duration::from_millis(10));
    let mut client = FtpClient::connect(gateway.local_addr()).await;
    client.login().await;

    let data = client.open_data().await;
    assert!(client.cmd("RETR /big.bin").await.starts_with("150"));
    tokio::time::sleep(Duration::from_millis(100)).await;

    client.send("ABOR").await;
    let aborted = client.read_reply().await;
    assert!(aborted.starts_with("426"), "{}", aborted);
    assert_eq!(client.read_reply().await, "226 ABOR command successful");
    drop(data);

    // The single transport is back in the pool, open and usable.
    assert_eq!(factory.state.open_files.load(Ordering::SeqCst), 0);
    let size = tokio::time::timeout(Duration::from_secs(2), client.cmd("SIZE /big.bin"))
        .await
        .unwrap();
    assert_eq!(size, format!("213 {}", 4 * 1024 * 1024));
    assert_eq!(factory.state.open_transports.load(Ordering::SeqCst), 1);

    gateway.stop().await;
}

#[tokio::test]
async fn test_disconnect_during_retr_releases_transport() {
    let mut config = test_config(62150);
    config.remote.max_connections = 1;
    let (gateway, factory) = start_gateway(config).await;
    factory.state.add_file("/big.bin", pattern(8 * 1024 * 1024));
    factory.state.set_read_delay(Duration::from_millis(5));
    let mut client = FtpClient::connect(gateway.local_addr()).await;
    client.login().await;

    // The data channel is never read, so the transfer stalls on a full socket.
    let data = client.open_data().await;
    assert!(client.cmd("RETR /big.bin").await.starts_with("150"));
    client.send("NOOP").await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(factory.state.open_files.load(Ordering::SeqCst), 1);
    drop(client);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while factory.state.open_files.load(Ordering::SeqCst) != 0
        || gateway.pool().idle_count() != 1
    {
        assert!(tokio::time::Instant::now() < deadline, "transfer still running");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    drop(data);
    assert_eq!(factory.state.open_transports.load(Ordering::SeqCst), 1);

    // The only slot is free again for the next client.
    let mut next = FtpClient::connect(gateway.local_addr()).await;
    next.login().await;
    let size = tokio::time::timeout(Duration::from_secs(2), next.cmd("SIZE /big.bin"))
        .await
        .unwrap();
    assert_eq!(size, format!("213 {}", 8 * 1024 * 1024));

    gateway.stop().await;
}

#[tokio::test]
async fn test_abor_during_stor_removes_scratch_file() {
    let scratch = tempfile::tempdir().unwrap();
    let mut config = test_config(62160);
    config.remote.max_connections = 1;
    config.server.scratch_dir = Some(scratch.path().to_string_lossy().into_owned());
    let (gateway, factory) = start_gateway(config).await;
    let mut client = FtpClient::connect(gateway.local_addr()).await;
    client.login().await;

    let mut data = client.open_data().await;
    assert!(client.cmd("STOR /partial.bin").await.starts_with("150"));
    data.write_all(&pattern(200_000)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    client.send("ABOR").await;
    let aborted = client.read_reply().await;
    assert!(aborted.starts_with("426"), "{}", aborted);
    assert_eq!(client.read_reply().await, "226 ABOR command successful");
    drop(data);

    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    assert!(factory.state.file("/partial.bin").is_none());
    assert_eq!(factory.state.open_files.load(Ordering::SeqCst), 0);
    assert_eq!(client.cmd("NOOP").await, "200 Command OK");

    gateway.stop().await;
}

#[tokio::test]
async fn test_commands_during_transfer_are_answered_after_it() {
    let (gateway, factory) = start_gateway(test_config(62170)).await;
    factory.state.add_file("/f.bin", pattern(1024 * 1024));
    factory.state.set_read_delay(Duration::from_millis(10));
    let mut client = FtpClient::connect(gateway.local_addr()).await;
    client.login().await;

    let data = client.open_data().await;
    assert!(client.cmd("RETR /f.bin").await.starts_with("150"));
    client.send("NOOP").await;
    client.send("PWD").await;

    assert_eq!(read_all(data).await.len(), 1024 * 1024);
    let done = client.read_reply().await;
    assert!(done.starts_with("226"), "{}", done);
    assert_eq!(client.read_reply().await, "200 Command OK");
    assert!(client.read_reply().await.starts_with("257"));

    gateway.stop().await;
}

#[tokio::test]
async fn test_data_connection_timeout() {
    let mut config = test_config(62080);
    config.server.data_connection_timeout_secs = 1;
    config.remote.max_connections = 1;
    let (gateway, factory) = start_gateway(config).await;
    factory.state.add_file("/f.bin", pattern(100));
    let mut client = FtpClient::connect(gateway.local_addr()).await;
    client.login().await;

    client.pasv().await;
    assert!(client.cmd("RETR /f.bin").await.starts_with("150"));
    assert_eq!(
        client.read_reply().await,
        "425 No data connection established within timeout"
    );
    assert_eq!(client.cmd("SIZE /f.bin").await, "213 100");

    gateway.stop().await;
}

#[tokio::test]
async fn test_transfer_requires_data_mode() {
    let (gateway, factory) = start_gateway(test_config(62090)).await;
    factory.state.add_file("/f.bin", pattern(10));
    let mut client = FtpClient::connect(gateway.local_addr()).await;
    client.login().await;

    assert_eq!(client.cmd("RETR /f.bin").await, "425 Use PORT or PASV first");
    assert_eq!(client.cmd("LIST").await, "425 Use PORT or PASV first");

    gateway.stop().await;
}

#[tokio::test]
async fn test_active_mode_listing() {
    let (gateway, factory) = start_gateway(test_config(62100)).await;
    factory.state.add_file("/a.txt", b"abc".to_vec());
    let mut client = FtpClient::connect(gateway.local_addr()).await;
    client.login().await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let reply = client
        .cmd(&format!("PORT 127,0,0,1,{},{}", port / 256, port % 256))
        .await;
    assert_eq!(reply, "200 PORT command successful");
    assert_eq!(client.cmd("PORT 1,2,3").await, "501 Invalid PORT command");

    let reply = client
        .cmd(&format!("PORT 127,0,0,1,{},{}", port / 256, port % 256))
        .await;
    assert!(reply.starts_with("200"));
    assert!(client.cmd("LIST").await.starts_with("150"));
    let (data, _) = listener.accept().await.unwrap();
    let listing = String::from_utf8(read_all(data).await).unwrap();
    assert!(listing.contains("a.txt"));
    assert_eq!(client.read_reply().await, "226 Directory send OK");

    gateway.stop().await;
}

#[tokio::test]
async fn test_concurrent_sessions_respect_connection_limit() {
    let (gateway, factory) = start_gateway(test_config(62110)).await;
    factory.state.add_file("/f.bin", pattern(7));
    factory.state.set_op_delay(Duration::from_millis(150));
    let addr = gateway.local_addr();

    let mut tasks = Vec::new();
    for _ in 0..3 {
        tasks.push(tokio::spawn(async move {
            let mut client = FtpClient::connect(addr).await;
            client.login().await;
            client.cmd("SIZE /f.bin").await
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap(), "213 7");
    }
    assert!(factory.state.peak_transports.load(Ordering::SeqCst) <= 2);

    gateway.stop().await;
}

#[tokio::test]
async fn test_misc_commands() {
    let (gateway, factory) = start_gateway(test_config(62120)).await;
    factory.state.add_file("/f.bin", pattern(3));
    let mut client = FtpClient::connect(gateway.local_addr()).await;
    client.login().await;

    assert_eq!(client.cmd("TYPE I").await, "200 Type set to I");
    assert_eq!(client.cmd("NOOP").await, "200 Command OK");
    assert_eq!(client.cmd("OPTS UTF8 ON").await, "200 Command OK");
    assert_eq!(client.cmd("SITE CHMOD 777 x").await, "502 Command not implemented");
    assert_eq!(client.cmd("SIZE /nope").await, "550 File not found");
    assert_eq!(client.cmd("MDTM /f.bin").await, "213 20231114221320");

    let feat = client.cmd("FEAT").await;
    assert!(feat.starts_with("211-"));
    assert!(feat.contains(" MDTM"));
    assert!(feat.ends_with("211 End"));

    assert!(client.cmd("MKD /new").await.starts_with("257"));
    assert!(factory.state.has_dir("/new"));
    assert_eq!(client.cmd("RMD /new").await, "250 Directory removed");
    assert_eq!(client.cmd("DELE /f.bin").await, "250 File deleted");
    assert!(client.cmd("DELE /f.bin").await.starts_with("550"));

    assert_eq!(client.cmd("QUIT").await, "221 Goodbye");
    assert_eq!(client.read_reply().await, "");

    gateway.stop().await;
}

#[tokio::test]
async fn test_idle_control_connection_is_closed() {
    let mut config = test_config(62130);
    config.server.control_idle_timeout_secs = 1;
    let (gateway, _factory) = start_gateway(config).await;
    let mut client = FtpClient::connect(gateway.local_addr()).await;

    let reply = client.read_reply().await;
    assert!(reply.starts_with("421"), "{}", reply);

    gateway.stop().await;
}

#[tokio::test]
async fn test_stop_ends_sessions_and_closes_transports() {
    let mut config = test_config(62140);
    config.pool.keep_warm = true;
    let (gateway, factory) = start_gateway(config).await;
    let addr = gateway.local_addr();
    let mut client = FtpClient::connect(addr).await;
    client.login().await;
    assert!(client.cmd("CWD /").await.starts_with("250"));

    gateway.stop().await;
    let reply = client.read_reply().await;
    assert!(reply.is_empty() || reply.starts_with("421"), "{}", reply);
    assert!(TcpStream::connect(addr).await.is_err());
    assert_eq!(factory.state.open_transports.load(Ordering::SeqCst), 0);
}
