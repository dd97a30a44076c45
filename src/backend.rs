//! Capture backend: drives tshark and serves the rows, counts, and
//! per-frame detail the session polls for.
//!
//! Live captures run a single tshark process that both streams PDML to
//! stdout and writes the raw packets to a temp file. Detail lookups
//! re-dissect that same file filtered to one frame, so the frame numbers
//! in the stream and in the file always agree.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::devices::{self, Device};
use crate::layers::LayerNode;
use crate::pdml::{self, PdmlCollector};
use crate::store::PacketRow;

const CAPTURE_FILE_NAME: &str = "capture.pcapng";
const SPAWN_PROBE_DELAY: Duration = Duration::from_millis(200);

/// What to capture from: a live interface or a saved capture file.
#[derive(Debug, Clone)]
pub enum CaptureTarget {
    Live { device: String },
    File { path: PathBuf },
}

/// Fully dissected view of one packet. `layers` is `None` when the
/// dissector produced no decode for the frame.
#[derive(Debug, Clone)]
pub struct PacketDetail {
    pub layers: Option<LayerNode>,
    pub hex_dump: String,
}

/// Seam between the session and whatever produces packets. The session
/// owns its backend exclusively, so methods take `&mut self` and in-flight
/// calls never overlap.
pub trait CaptureBackend {
    fn list_devices(&self) -> Vec<Device>;
    async fn start_capture(&mut self, target: &CaptureTarget) -> Result<()>;
    async fn stop_capture(&mut self);
    async fn packet_count(&mut self) -> Result<usize>;
    async fn packet_page(&mut self, offset: usize, limit: usize) -> Result<Vec<PacketRow>>;
    async fn packet_detail(&mut self, frame_number: u64) -> Result<PacketDetail>;
    async fn clear(&mut self);
}

pub struct TsharkBackend {
    tshark_bin: PathBuf,
    rows: Arc<Mutex<Vec<PacketRow>>>,
    child: Option<Child>,
    reader: Option<JoinHandle<()>>,
    stderr_drain: Option<JoinHandle<()>>,
    capture_file: Option<PathBuf>,
    temp_dir: Option<TempDir>,
}

impl TsharkBackend {
    pub fn new() -> Self {
        TsharkBackend::with_binary("tshark")
    }

    fn with_binary(tshark_bin: impl Into<PathBuf>) -> Self {
        TsharkBackend {
            tshark_bin: tshark_bin.into(),
            rows: Arc::new(Mutex::new(Vec::new())),
            child: None,
            reader: None,
            stderr_drain: None,
            capture_file: None,
            temp_dir: None,
        }
    }
}

impl CaptureBackend for TsharkBackend {
    fn list_devices(&self) -> Vec<Device> {
        devices::available_devices()
    }

    async fn start_capture(&mut self, target: &CaptureTarget) -> Result<()> {
        self.stop_capture().await;
        self.rows.lock().await.clear();
        self.temp_dir = None;
        self.capture_file = None;

        let mut command = Command::new(&self.tshark_bin);
        match target {
            CaptureTarget::Live { device } => {
                let dir = TempDir::new().context("create capture directory")?;
                let path = dir.path().join(CAPTURE_FILE_NAME);
                command
                    .arg("-i")
                    .arg(device)
                    .arg("-l")
                    .arg("-n")
                    .arg("-T")
                    .arg("pdml")
                    .arg("-w")
                    .arg(&path);
                self.capture_file = Some(path);
                self.temp_dir = Some(dir);
            }
            CaptureTarget::File { path } => {
                command
                    .arg("-r")
                    .arg(path)
                    .arg("-l")
                    .arg("-n")
                    .arg("-T")
                    .arg("pdml");
                self.capture_file = Some(path.clone());
            }
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().context("spawn tshark")?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("tshark stdout unavailable"))?;
        let mut stderr = child.stderr.take();

        // tshark reports bad interfaces and missing capture permission by
        // exiting almost immediately. Probe for that here so start fails
        // loudly instead of leaving a silent empty capture behind. A clean
        // early exit is not a failure: a short file replay can finish
        // before the check fires, with its stream still in the pipe.
        tokio::time::sleep(SPAWN_PROBE_DELAY).await;
        let early_exit = child.try_wait().context("probe tshark")?;
        if let Some(status) = early_exit {
            if !status.success() {
                let mut message = format!("tshark exited at startup ({status})");
                if let Some(stderr) = stderr.take() {
                    let lines = collect_stream_lines(BufReader::new(stderr)).await;
                    if !lines.is_empty() {
                        message = format!("{message}: {}", lines.join(" | "));
                    }
                }
                self.temp_dir = None;
                self.capture_file = None;
                bail!(message);
            }
            debug!(%status, "capture process finished at startup");
        }

        self.reader = Some(tokio::spawn(collect_packets(
            BufReader::new(stdout),
            Arc::clone(&self.rows),
        )));
        if let Some(stderr) = stderr.take() {
            self.stderr_drain = Some(tokio::spawn(drain_stream(BufReader::new(stderr))));
        }
        if early_exit.is_none() {
            self.child = Some(child);
        }
        Ok(())
    }

    /// Kills the capture process. Captured rows and the capture file stay
    /// around so already-listed packets can still be inspected.
    async fn stop_capture(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(err) = child.start_kill() {
                warn!(error = %err, "failed to signal capture process");
            }
            if let Err(err) = child.wait().await {
                warn!(error = %err, "failed to await capture process");
            }
        }
        if let Some(task) = self.reader.take() {
            let _ = task.await;
        }
        if let Some(task) = self.stderr_drain.take() {
            let _ = task.await;
        }
    }

    async fn packet_count(&mut self) -> Result<usize> {
        Ok(self.rows.lock().await.len())
    }

    async fn packet_page(&mut self, offset: usize, limit: usize) -> Result<Vec<PacketRow>> {
        let rows = self.rows.lock().await;
        let start = offset.min(rows.len());
        let end = start.saturating_add(limit).min(rows.len());
        Ok(rows[start..end].to_vec())
    }

    async fn packet_detail(&mut self, frame_number: u64) -> Result<PacketDetail> {
        let path = self
            .capture_file
            .clone()
            .ok_or_else(|| anyhow!("no capture to inspect"))?;
        let filter = format!("frame.number == {frame_number}");

        let pdml_text = run_tshark_once(&self.tshark_bin, &path, &filter, &["-T", "pdml"]).await?;
        let mut collector = PdmlCollector::new();
        let mut layers = None;
        for line in pdml_text.lines() {
            if let Some(body) = collector.push_line(line) {
                layers = pdml::parse_packet(&body);
                break;
            }
        }

        let hex_dump = run_tshark_once(&self.tshark_bin, &path, &filter, &["-x"]).await?;
        Ok(PacketDetail { layers, hex_dump })
    }

    async fn clear(&mut self) {
        self.rows.lock().await.clear();
    }
}

async fn run_tshark_once(program: &Path, path: &Path, filter: &str, extra: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .arg("-r")
        .arg(path)
        .arg("-n")
        .arg("-Y")
        .arg(filter)
        .args(extra)
        .stdin(Stdio::null())
        .output()
        .await
        .context("run tshark")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("tshark failed ({}): {}", output.status, stderr.trim());
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Reads the streamed PDML, carving packets out line by line and pushing
/// one row per packet. Ends when the capture process closes its stdout.
async fn collect_packets<R>(mut reader: BufReader<R>, rows: Arc<Mutex<Vec<PacketRow>>>)
where
    R: AsyncRead + Unpin,
{
    let mut collector = PdmlCollector::new();
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let trimmed = line.trim_end_matches(['\n', '\r']);
                if let Some(body) = collector.push_line(trimmed) {
                    let row = match pdml::parse_packet(&body) {
                        Some(root) => PacketRow::from_layers(root),
                        None => PacketRow::undecoded(),
                    };
                    rows.lock().await.push(row);
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to read dissection stream");
                break;
            }
        }
    }
    debug!("dissection stream closed");
}

async fn collect_stream_lines<R>(mut reader: BufReader<R>) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let mut buf = String::new();
    let mut lines = Vec::new();
    loop {
        buf.clear();
        match reader.read_line(&mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let trimmed = buf.trim_end_matches(['\n', '\r']);
                if !trimmed.is_empty() {
                    lines.push(trimmed.to_string());
                }
            }
            Err(_) => break,
        }
    }
    lines
}

/// Keeps the capture process's stderr drained so it never blocks on a full
/// pipe; lines surface at debug level.
async fn drain_stream<R>(mut reader: BufReader<R>)
where
    R: AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let trimmed = line.trim_end_matches(['\n', '\r']);
                if !trimmed.is_empty() {
                    debug!(line = trimmed, "capture process stderr");
                }
            }
            Err(_) => break,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    const STREAM: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
<pdml version=\"0\" creator=\"wireshark/4.2.2\">\n\
<packet>\n\
  <proto name=\"frame\" showname=\"Frame 1\" size=\"60\" pos=\"0\">\n\
    <field name=\"frame.number\" showname=\"Frame Number: 1\" size=\"0\" pos=\"0\" show=\"1\"/>\n\
    <field name=\"frame.len\" showname=\"Frame Length: 60\" size=\"0\" pos=\"0\" show=\"60\"/>\n\
  </proto>\n\
  <proto name=\"ip\" showname=\"Internet Protocol Version 4\" size=\"20\" pos=\"14\">\n\
    <field name=\"ip.src\" showname=\"Source Address: 10.0.0.1\" size=\"4\" pos=\"26\" show=\"10.0.0.1\"/>\n\
    <field name=\"ip.dst\" showname=\"Destination Address: 10.0.0.2\" size=\"4\" pos=\"30\" show=\"10.0.0.2\"/>\n\
  </proto>\n\
</packet>\n\
<packet>\n\
  <proto name=\"frame\" showname=\"Frame 2\" size=\"42\" pos=\"0\">\n\
    <field name=\"frame.number\" showname=\"Frame Number: 2\" size=\"0\" pos=\"0\" show=\"2\"/>\n\
  </proto>\n\
</packet>\n\
</pdml>\n";

    #[tokio::test]
    async fn test_collect_packets_builds_rows_from_stream() {
        let rows = Arc::new(Mutex::new(Vec::new()));
        collect_packets(BufReader::new(STREAM.as_bytes()), Arc::clone(&rows)).await;

        let rows = rows.lock().await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].source, "10.0.0.1");
        assert_eq!(rows[0].destination, "10.0.0.2");
        assert_eq!(rows[0].frame_number(), Some(1));
        assert_eq!(rows[1].frame_number(), Some(2));
    }

    #[tokio::test]
    async fn test_collect_packets_ignores_truncated_tail() {
        let truncated = "<packet>\n  <proto name=\"frame\" size=\"1\" pos=\"0\">\n";
        let rows = Arc::new(Mutex::new(Vec::new()));
        collect_packets(BufReader::new(truncated.as_bytes()), Arc::clone(&rows)).await;
        assert!(rows.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_collect_stream_lines_drops_blanks() {
        let input = "tshark: arp is not a valid capture device\n\n";
        let lines = collect_stream_lines(BufReader::new(input.as_bytes())).await;
        assert_eq!(lines, vec!["tshark: arp is not a valid capture device"]);
    }

    // A replay small enough to dissect within the startup delay exits
    // cleanly before the reader is spawned; its stream must still be read
    // and the capture file kept for detail lookups.
    #[cfg(unix)]
    #[tokio::test]
    async fn test_replay_that_finishes_at_startup_serves_its_rows() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let shim = dir.path().join("tshark");
        std::fs::write(&shim, format!("#!/bin/sh\ncat <<'EOF'\n{STREAM}EOF\n")).unwrap();
        std::fs::set_permissions(&shim, std::fs::Permissions::from_mode(0o755)).unwrap();

        let sample = dir.path().join("sample.pcapng");
        let mut backend = TsharkBackend::with_binary(&shim);
        backend
            .start_capture(&CaptureTarget::File {
                path: sample.clone(),
            })
            .await
            .expect("clean replay exit is not a start failure");

        let reader = backend.reader.take().expect("dissection reader spawned");
        reader.await.unwrap();

        assert_eq!(backend.packet_count().await.unwrap(), 2);
        let rows = backend.packet_page(0, 10).await.unwrap();
        assert_eq!(rows[0].frame_number(), Some(1));
        assert_eq!(backend.capture_file.as_deref(), Some(sample.as_path()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_startup_surfaces_stderr_in_the_error() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let shim = dir.path().join("tshark");
        std::fs::write(
            &shim,
            "#!/bin/sh\necho 'tshark: permission denied' >&2\nexit 2\n",
        )
        .unwrap();
        std::fs::set_permissions(&shim, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut backend = TsharkBackend::with_binary(&shim);
        let err = backend
            .start_capture(&CaptureTarget::Live {
                device: "eth0".to_string(),
            })
            .await
            .expect_err("failing spawn must not start");

        assert!(err.to_string().contains("permission denied"));
        assert!(backend.capture_file.is_none());
    }
}
