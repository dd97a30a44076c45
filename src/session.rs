//! Inspection session: owns the row store, the current packet detail, and
//! the byte selection, and mediates every backend call.
//!
//! Polling is an explicit method rather than an internal timer so the
//! event loop decides the cadence and tests can drive ticks directly. The
//! session holds its backend by value; a poll can therefore never overlap
//! an earlier one, and a tick that fires mid-poll is skipped by the
//! caller's interval, not queued.

use tracing::{debug, info, warn};

use crate::backend::{CaptureBackend, CaptureTarget, PacketDetail};
use crate::devices::Device;
use crate::hexgrid::ByteGrid;
use crate::layers::TreeRow;
use crate::selection::Selection;
use crate::store::RowStore;

/// Everything the detail panes render for the selected packet. Replaced
/// wholesale on each selection, never patched.
pub struct DetailView {
    pub frame_number: u64,
    pub tree: Vec<TreeRow>,
    pub grid: ByteGrid,
}

impl DetailView {
    fn build(frame_number: u64, detail: &PacketDetail) -> Self {
        DetailView {
            frame_number,
            tree: detail
                .layers
                .as_ref()
                .map(|root| root.flatten())
                .unwrap_or_default(),
            grid: ByteGrid::from_text(&detail.hex_dump),
        }
    }
}

pub struct Session<B> {
    backend: B,
    pub store: RowStore,
    pub capturing: bool,
    pub detail: Option<DetailView>,
    pub selection: Selection,
    pub selected_row: Option<usize>,
    pub status: String,
    pub status_error: bool,
}

impl<B: CaptureBackend> Session<B> {
    pub fn new(backend: B) -> Self {
        Session {
            backend,
            store: RowStore::new(),
            capturing: false,
            detail: None,
            selection: Selection::new(),
            selected_row: None,
            status: String::new(),
            status_error: false,
        }
    }

    pub fn devices(&self) -> Vec<Device> {
        self.backend.list_devices()
    }

    #[cfg(test)]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Starts a fresh capture. Rows, detail, and selection from the
    /// previous capture are discarded first so row numbering and frame
    /// numbers restart together. On failure the capturing flag stays
    /// down and the error lands in the status line.
    pub async fn start(&mut self, target: CaptureTarget) {
        self.store.clear();
        self.detail = None;
        self.selection.clear();
        self.selected_row = None;
        self.backend.clear().await;

        match self.backend.start_capture(&target).await {
            Ok(()) => {
                info!(target = ?target, "capture started");
                self.capturing = true;
                self.status_error = false;
                self.status = match &target {
                    CaptureTarget::Live { device } => format!("Capturing on {device}"),
                    CaptureTarget::File { path } => {
                        format!("Reading {}", path.display())
                    }
                };
            }
            Err(err) => {
                warn!(error = %err, "capture start failed");
                self.capturing = false;
                self.status_error = true;
                self.status = format!("Capture failed: {err:#}");
            }
        }
    }

    /// Stops the capture process. Rows already fetched stay inspectable.
    pub async fn stop(&mut self) {
        self.backend.stop_capture().await;
        info!("capture stopped");
        self.capturing = false;
        self.status_error = false;
        self.status = "Capture stopped".to_string();
    }

    /// One polling tick: refresh the total and fetch only the rows beyond
    /// what the store already holds.
    pub async fn poll(&mut self) {
        let count = match self.backend.packet_count().await {
            Ok(count) => count,
            Err(err) => {
                warn!(error = %err, "packet count failed");
                self.status_error = true;
                self.status = format!("Count fetch failed: {err:#}");
                return;
            }
        };
        self.store.set_total(count);

        let missing = self.store.missing();
        if missing == 0 {
            return;
        }
        let offset = self.store.len();
        match self.backend.packet_page(offset, missing).await {
            Ok(page) => {
                debug!(fetched = page.len(), total = count, "applied page delta");
                self.store.append_page(page);
            }
            Err(err) => {
                warn!(error = %err, "page fetch failed");
                self.status_error = true;
                self.status = format!("Row fetch failed: {err:#}");
            }
        }
    }

    /// Fetches the full decode for the row at `index`. Rows whose decoded
    /// summary lacks a frame number cannot be joined back to the capture,
    /// so clicking them does nothing at all.
    pub async fn select_row(&mut self, index: usize) {
        let Some(row) = self.store.get(index) else {
            return;
        };
        let Some(frame_number) = row.frame_number() else {
            return;
        };
        self.selected_row = Some(index);

        match self.backend.packet_detail(frame_number).await {
            Ok(detail) => {
                debug!(frame_number, "detail loaded");
                self.detail = Some(DetailView::build(frame_number, &detail));
                self.selection.clear();
            }
            Err(err) => {
                warn!(error = %err, frame_number, "detail fetch failed");
                self.status_error = true;
                self.status = format!("Detail fetch failed: {err:#}");
            }
        }
    }

    /// Drops every captured row, on both sides of the backend seam.
    pub async fn clear(&mut self) {
        self.backend.clear().await;
        self.store.clear();
        self.detail = None;
        self.selection.clear();
        self.selected_row = None;
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::backend::testing::FakeBackend;
    use crate::layers::{LayerField, LayerNode, chain};
    use crate::store::PacketRow;

    fn decoded_row(frame_number: u64) -> PacketRow {
        let mut frame = LayerNode::new("frame");
        frame.fields.push(LayerField {
            name: "frame.number".to_string(),
            value: frame_number.to_string(),
            offset: "0".to_string(),
            length: "0".to_string(),
        });
        let mut ip = LayerNode::new("ip");
        ip.fields.push(LayerField {
            name: "ip.src".to_string(),
            value: "10.0.0.1".to_string(),
            offset: "26".to_string(),
            length: "4".to_string(),
        });
        let root = chain(vec![frame, ip]).unwrap();
        PacketRow::from_layers(root)
    }

    fn detail_for(frame_number: u64) -> PacketDetail {
        let mut frame = LayerNode::new("frame");
        frame.fields.push(LayerField {
            name: "frame.number".to_string(),
            value: frame_number.to_string(),
            offset: "0".to_string(),
            length: "0".to_string(),
        });
        PacketDetail {
            layers: chain(vec![frame]),
            hex_dump: "0000  41 42 43                                   ABC".to_string(),
        }
    }

    fn session_with_rows(rows: Vec<PacketRow>) -> Session<FakeBackend> {
        let backend = FakeBackend {
            rows,
            ..FakeBackend::default()
        };
        Session::new(backend)
    }

    #[tokio::test]
    async fn test_poll_fetches_only_missing_rows() {
        let mut session = session_with_rows(vec![
            decoded_row(1),
            decoded_row(2),
            decoded_row(3),
        ]);

        session.poll().await;
        assert_eq!(session.store.len(), 3);
        assert_eq!(session.store.total(), 3);
        assert_eq!(session.backend_mut().page_calls, vec![(0, 3)]);

        // No new packets: the next tick must not refetch rows 0..3.
        session.poll().await;
        assert_eq!(session.store.len(), 3);
        assert_eq!(session.backend_mut().page_calls, vec![(0, 3)]);
        assert_eq!(session.backend_mut().count_calls, 2);

        session.backend_mut().rows.push(decoded_row(4));
        session.backend_mut().rows.push(decoded_row(5));
        session.poll().await;
        assert_eq!(session.store.len(), 5);
        assert_eq!(session.backend_mut().page_calls, vec![(0, 3), (3, 2)]);
    }

    #[tokio::test]
    async fn test_start_clears_previous_capture() {
        let mut session = session_with_rows(vec![decoded_row(1), decoded_row(2)]);
        session.poll().await;
        assert_eq!(session.store.len(), 2);

        session
            .start(CaptureTarget::Live {
                device: "eth0".to_string(),
            })
            .await;
        assert!(session.capturing);
        assert!(session.store.is_empty());
        assert_eq!(session.store.total(), 0);
        assert!(session.backend_mut().rows.is_empty());
        assert_eq!(session.status, "Capturing on eth0");
        assert!(!session.status_error);
    }

    #[tokio::test]
    async fn test_start_failure_reverts_capturing_flag() {
        let backend = FakeBackend {
            fail_start: true,
            ..FakeBackend::default()
        };
        let mut session = Session::new(backend);

        session
            .start(CaptureTarget::Live {
                device: "eth0".to_string(),
            })
            .await;
        assert!(!session.capturing);
        assert!(session.status.contains("permission"));
        assert!(session.status_error);
        assert_eq!(session.backend_mut().starts.len(), 1);
    }

    #[tokio::test]
    async fn test_start_reports_file_targets() {
        let mut session = session_with_rows(Vec::new());
        session
            .start(CaptureTarget::File {
                path: PathBuf::from("/tmp/session.pcapng"),
            })
            .await;
        assert!(session.capturing);
        assert_eq!(session.status, "Reading /tmp/session.pcapng");
    }

    #[tokio::test]
    async fn test_stop_keeps_rows() {
        let mut session = session_with_rows(vec![decoded_row(1), decoded_row(2)]);
        session.poll().await;

        session.stop().await;
        assert!(!session.capturing);
        assert_eq!(session.store.len(), 2);
        assert_eq!(session.backend_mut().stops, 1);
    }

    #[tokio::test]
    async fn test_select_row_joins_on_frame_number() {
        let mut session = session_with_rows(vec![decoded_row(7), decoded_row(8)]);
        session.backend_mut().details.insert(8, detail_for(8));
        session.poll().await;

        session.select_row(1).await;
        assert_eq!(session.backend_mut().detail_calls, vec![8]);
        assert_eq!(session.selected_row, Some(1));

        let detail = session.detail.as_ref().unwrap();
        assert_eq!(detail.frame_number, 8);
        assert!(!detail.tree.is_empty());
        assert_eq!(detail.grid.lines().len(), 1);
        assert_eq!(detail.grid.total_bytes(), 3);
    }

    #[tokio::test]
    async fn test_select_row_without_frame_number_is_a_no_op() {
        let mut session = session_with_rows(vec![PacketRow::undecoded()]);
        session.poll().await;

        session.select_row(0).await;
        assert!(session.backend_mut().detail_calls.is_empty());
        assert!(session.detail.is_none());
        assert!(session.selected_row.is_none());
        assert!(session.status.is_empty());
    }

    #[tokio::test]
    async fn test_select_row_out_of_range_is_a_no_op() {
        let mut session = session_with_rows(vec![decoded_row(1)]);
        session.poll().await;

        session.select_row(9).await;
        assert!(session.backend_mut().detail_calls.is_empty());
        assert!(session.detail.is_none());
    }

    #[tokio::test]
    async fn test_new_detail_resets_selection() {
        let mut session = session_with_rows(vec![decoded_row(1), decoded_row(2)]);
        session.backend_mut().details.insert(1, detail_for(1));
        session.backend_mut().details.insert(2, detail_for(2));
        session.poll().await;

        session.select_row(0).await;
        session.selection.select_field(0, 2);
        assert!(session.selection.range().is_some());

        session.select_row(1).await;
        assert!(session.selection.range().is_none());
        assert_eq!(session.detail.as_ref().unwrap().frame_number, 2);
    }

    #[tokio::test]
    async fn test_detail_fetch_failure_surfaces_in_status() {
        let mut session = session_with_rows(vec![decoded_row(3)]);
        session.poll().await;

        session.select_row(0).await;
        assert!(session.detail.is_none());
        assert!(session.status.contains("Detail fetch failed"));
        assert!(session.status.contains("frame 3"));
        assert!(session.status_error);
    }

    #[tokio::test]
    async fn test_clear_empties_both_sides() {
        let mut session = session_with_rows(vec![decoded_row(1)]);
        session.backend_mut().details.insert(1, detail_for(1));
        session.poll().await;
        session.select_row(0).await;

        session.clear().await;
        assert!(session.store.is_empty());
        assert!(session.backend_mut().rows.is_empty());
        assert!(session.detail.is_none());
        assert!(session.selected_row.is_none());
    }
}
