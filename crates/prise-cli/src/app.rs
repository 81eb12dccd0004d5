use std::io::Write as _;
use std::time::{Duration, Instant};

use crossterm::event::{DisableMouseCapture, EnableMouseCapture, Event};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use prise_client::layout::{Child, Constraints, LayoutNode, Widget, layout};
use prise_client::{InputRouter, Renderer, RouterAction, RpcClient, SessionDocument, SurfaceTable};
use prise_protocol::message::Message;
use prise_protocol::wire_types::{ExitStatus, KeyDesc, MouseDesc, PtyId, RedrawEvent, ResizePtyParams, SpawnPtyParams};
use rmpv::ext::from_value;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::errors::CliError;

/// A terminal device guard: enables raw mode and mouse capture on
/// construction, restores both on drop. Deliberately does not clear the
/// screen or leave an alternate buffer on exit, so the last painted frame
/// stays visible (§7 "client exits cleanly with the last rendered frame
/// preserved").
struct TerminalGuard;

impl TerminalGuard {
    fn enable() -> Result<Self, CliError> {
        enable_raw_mode().map_err(|e| CliError::Terminal(e.to_string()))?;
        crossterm::execute!(std::io::stdout(), EnableMouseCapture).map_err(|e| CliError::Terminal(e.to_string()))?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = crossterm::execute!(std::io::stdout(), DisableMouseCapture);
        let _ = disable_raw_mode();
    }
}

/// Bridges the local terminal device into the loop from a dedicated OS
/// thread (§4.2, §9: "cannot be made non-blocking portably" — "this is the
/// only multi-threaded path in the client"). Forwards parsed events rather
/// than raw bytes since `crossterm` owns the read side of this terminal.
fn spawn_input_reader() -> mpsc::UnboundedReceiver<Event> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        loop {
            match crossterm::event::read() {
                Ok(event) => {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(event = "client.input.read_failed", error = %e);
                    break;
                }
            }
        }
    });
    rx
}

/// Builds the minimal default widget tree standing in for the external
/// declarative UI (§1 "out of scope... treated as a pure `update(event) →
/// view_tree` function"): a single surface, or an evenly/ratio-split row of
/// surfaces when more than one pane is attached.
fn build_widget(panes: &[PtyId], ratios: &[f32]) -> Widget {
    if panes.len() <= 1 {
        return Widget::surface(panes.first().copied().unwrap_or(PtyId(0)));
    }
    let children = panes
        .iter()
        .zip(ratios.iter())
        .map(|(id, ratio)| Child::ratio(Widget::surface(*id), *ratio))
        .collect();
    Widget::Row {
        id: Some(1),
        children,
        cross_align: prise_client::layout::Align::Stretch,
    }
}

fn compute_layout(panes: &[PtyId], ratios: &[f32], cols: u16, rows: u16) -> LayoutNode {
    layout(&build_widget(panes, ratios), Constraints::tight(cols, rows), 0, 0)
}

/// Recovers each pane's ratio from a restored session tree's top-level
/// `"ratio"` array (§4.8), falling back to an even split when absent or
/// mismatched in length — the persistence format doesn't guarantee one was
/// ever saved (e.g. a single-pane session has no row node at all).
fn extract_ratios(tree: &serde_json::Value, pane_count: usize) -> Vec<f32> {
    if pane_count == 0 {
        return Vec::new();
    }
    let from_tree = tree
        .get("ratio")
        .and_then(|v| v.as_array())
        .filter(|arr| arr.len() == pane_count)
        .map(|arr| arr.iter().filter_map(|v| v.as_f64()).map(|v| v as f32).collect::<Vec<_>>())
        .filter(|v| v.len() == pane_count);
    from_tree.unwrap_or_else(|| vec![1.0 / pane_count as f32; pane_count])
}

fn build_session_tree(panes: &[PtyId], ratios: &[f32]) -> serde_json::Value {
    if panes.len() <= 1 {
        return json!({ "type": "pane", "pty_id": panes.first().map(|p| p.0).unwrap_or(0) });
    }
    json!({
        "type": "row",
        "ratio": ratios,
        "children": panes.iter().map(|id| json!({ "type": "pane", "pty_id": id.0 })).collect::<Vec<_>>(),
    })
}

/// Runs the client: connects, attaches or spawns panes, then drives the
/// render/input loop until the user detaches, the server closes the
/// connection, or every pane has exited (§4.6-§4.8).
pub async fn run_client(paths: prise_paths::PrisePaths, attach: Option<String>) -> Result<(), CliError> {
    crate::daemon_launch::ensure_daemon_running(&paths).await?;

    let socket_path = paths.socket_path();
    let mut rpc = RpcClient::connect(&socket_path).await?;
    let (cols, rows) = crossterm::terminal::size().map_err(|e| CliError::Terminal(e.to_string()))?;

    let session_name;
    let mut panes: Vec<PtyId>;
    let mut ratios: Vec<f32>;

    if let Some(name) = attach {
        let doc = SessionDocument::load(&name, &paths.session_file(&name))?;
        let candidates = doc.pane_pty_ids();
        panes = Vec::with_capacity(candidates.len());
        for pty_id in &candidates {
            match rpc.request::<String>("attach_pty", (*pty_id,)).await {
                Ok(_) => panes.push(*pty_id),
                Err(e) => warn!(event = "cli.session.pane_missing", pty_id = pty_id.0, error = %e),
            }
        }
        if panes.is_empty() {
            return Err(CliError::Client(prise_client::ClientError::NoSession { name }));
        }
        ratios = extract_ratios(doc.tree(), panes.len());
        session_name = name;
    } else {
        let pty_id: PtyId = rpc
            .request(
                "spawn_pty",
                SpawnPtyParams {
                    rows,
                    cols,
                    attach: true,
                    cwd: None,
                },
            )
            .await?;
        panes = vec![pty_id];
        ratios = vec![1.0];
        session_name = "default".to_string();
    }

    let _terminal_guard = TerminalGuard::enable()?;
    let mut input_rx = spawn_input_reader();

    let mut surfaces = SurfaceTable::new();
    let mut layout_root = compute_layout(&panes, &ratios, cols, rows);
    for (pty_id, prows, pcols) in prise_client::input::surface_sizes(&layout_root) {
        surfaces.insert(pty_id, prows, pcols);
        let _: Result<String, _> = rpc
            .request(
                "resize_pty",
                ResizePtyParams {
                    pty_id,
                    rows: prows,
                    cols: pcols,
                    width_px: 0,
                    height_px: 0,
                },
            )
            .await;
    }

    let mut router = InputRouter::new();
    let mut renderer = Renderer::default();
    let mut focused = panes.first().copied();
    let mut exited: std::collections::HashSet<PtyId> = std::collections::HashSet::new();
    let mut armed_deadline: Option<tokio::time::Instant> = None;
    let mut stdout = std::io::stdout();

    repaint(&mut stdout, &renderer, &layout_root, &surfaces, focused)?;

    loop {
        let sleep_deadline = armed_deadline.unwrap_or_else(|| tokio::time::Instant::now() + Duration::from_secs(3600));
        tokio::select! {
            notif = rpc.recv_notification() => {
                match notif {
                    Some(message) => {
                        match handle_notification(message, &mut surfaces, &mut exited, &panes, &mut renderer)? {
                            NotifAction::Quit => break,
                            NotifAction::PaintNow => {
                                armed_deadline = None;
                                repaint(&mut stdout, &renderer, &layout_root, &surfaces, focused)?;
                            }
                            NotifAction::Coalesced => {
                                if let Some(at) = renderer.armed_until() {
                                    armed_deadline = Some(tokio::time::Instant::from_std(at));
                                }
                            }
                            NotifAction::None => {}
                        }
                    }
                    None => {
                        info!(event = "cli.client.connection_closed");
                        break;
                    }
                }
            }
            maybe_event = input_rx.recv() => {
                match maybe_event {
                    Some(event) => {
                        let action = handle_input(
                            event,
                            &mut router,
                            &layout_root,
                            &panes,
                            &mut ratios,
                            &mut focused,
                            &rpc,
                            &session_name,
                            &mut surfaces,
                            cols,
                            rows,
                        ).await?;
                        match action {
                            LoopAction::Exit => break,
                            LoopAction::Relayout => {
                                layout_root = compute_layout(&panes, &ratios, cols, rows);
                                repaint(&mut stdout, &renderer, &layout_root, &surfaces, focused)?;
                            }
                            LoopAction::None => {}
                        }
                    }
                    None => break,
                }
            }
            _ = tokio::time::sleep_until(sleep_deadline), if armed_deadline.is_some() => {
                renderer.on_timer(Instant::now());
                armed_deadline = None;
                repaint(&mut stdout, &renderer, &layout_root, &surfaces, focused)?;
            }
        }
    }

    Ok(())
}

/// What the main loop should do after one notification was applied.
enum NotifAction {
    None,
    PaintNow,
    Coalesced,
    Quit,
}

fn handle_notification(
    message: Message,
    surfaces: &mut SurfaceTable,
    exited: &mut std::collections::HashSet<PtyId>,
    panes: &[PtyId],
    renderer: &mut Renderer,
) -> Result<NotifAction, CliError> {
    let Message::Notification { method, params } = message else {
        return Ok(NotifAction::None);
    };
    match method.as_str() {
        "redraw" => {
            let (pty_id, events): (PtyId, Vec<RedrawEvent>) = from_value(params).map_err(|e| CliError::Terminal(e.to_string()))?;
            let flushed = events.iter().any(|e| matches!(e, RedrawEvent::Flush));
            surfaces.apply_redraw(pty_id, &events);
            if !flushed {
                return Ok(NotifAction::None);
            }
            if renderer.on_flush(Instant::now()) {
                Ok(NotifAction::PaintNow)
            } else {
                Ok(NotifAction::Coalesced)
            }
        }
        "pty_exited" => {
            let (pty_id, status): (PtyId, ExitStatus) = from_value(params).map_err(|e| CliError::Terminal(e.to_string()))?;
            info!(event = "cli.pty.exited", pty_id = pty_id.0, code = ?status.code, signal = ?status.signal);
            exited.insert(pty_id);
            if panes.iter().all(|p| exited.contains(p)) {
                return Ok(NotifAction::Quit);
            }
            Ok(NotifAction::None)
        }
        other => {
            warn!(event = "cli.client.unknown_notification", method = other);
            Ok(NotifAction::None)
        }
    }
}

enum LoopAction {
    None,
    Relayout,
    Exit,
}

#[allow(clippy::too_many_arguments)]
async fn handle_input(
    event: Event,
    router: &mut InputRouter,
    layout_root: &LayoutNode,
    panes: &[PtyId],
    ratios: &mut [f32],
    focused: &mut Option<PtyId>,
    rpc: &RpcClient,
    session_name: &str,
    surfaces: &mut SurfaceTable,
    cols: u16,
    rows: u16,
) -> Result<LoopAction, CliError> {
    match event {
        Event::Key(key) => {
            use crossterm::event::{KeyCode, KeyModifiers};
            if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
                detach_and_save(rpc, session_name, panes, &*ratios).await?;
                return Ok(LoopAction::Exit);
            }
            if let RouterAction::Key(desc) = router.handle_key(key) {
                if let Some(pty_id) = *focused {
                    forward_key(rpc, pty_id, desc);
                }
            }
            Ok(LoopAction::None)
        }
        Event::Mouse(mouse) => match router.handle_mouse(mouse, layout_root) {
            RouterAction::Mouse { pty_id, desc } => {
                *focused = Some(pty_id);
                forward_mouse(rpc, pty_id, desc);
                Ok(LoopAction::None)
            }
            RouterAction::SplitRatio { child_index, ratio, .. } => {
                if let Some(slot) = ratios.get_mut(child_index) {
                    *slot = ratio;
                }
                Ok(LoopAction::Relayout)
            }
            RouterAction::Key(_) | RouterAction::Ignored => Ok(LoopAction::None),
        },
        Event::Resize(new_cols, new_rows) => {
            let before = prise_client::input::surface_sizes(layout_root);
            let new_layout = compute_layout(panes, ratios, new_cols, new_rows);
            let after = prise_client::input::surface_sizes(&new_layout);
            for (pty_id, prows, pcols) in prise_client::input::resized_surfaces(&before, &after) {
                if let Some(surface) = surfaces.get_mut(pty_id) {
                    surface.resize(prows, pcols);
                }
                let _: Result<String, _> = rpc
                    .request(
                        "resize_pty",
                        ResizePtyParams {
                            pty_id,
                            rows: prows,
                            cols: pcols,
                            width_px: 0,
                            height_px: 0,
                        },
                    )
                    .await;
            }
            let _ = (cols, rows);
            Ok(LoopAction::Relayout)
        }
        _ => Ok(LoopAction::None),
    }
}

fn forward_key(rpc: &RpcClient, pty_id: PtyId, desc: KeyDesc) {
    if let Err(e) = rpc.notify("key_input", (pty_id, desc)) {
        warn!(event = "cli.client.key_forward_failed", error = %e);
    }
}

fn forward_mouse(rpc: &RpcClient, pty_id: PtyId, desc: MouseDesc) {
    if let Err(e) = rpc.notify("mouse_input", (pty_id, desc)) {
        warn!(event = "cli.client.mouse_forward_failed", error = %e);
    }
}

async fn detach_and_save(rpc: &RpcClient, session_name: &str, panes: &[PtyId], ratios: &[f32]) -> Result<(), CliError> {
    let tree = build_session_tree(panes, ratios);
    let doc = SessionDocument::new(session_name, tree);
    let paths = prise_paths::PrisePaths::resolve()?;
    doc.save(&paths.session_file(session_name))?;
    let _: Result<String, _> = rpc.request("detach_ptys", (panes.to_vec(), 0u64)).await;
    info!(event = "cli.client.detached", session = session_name, panes = panes.len());
    Ok(())
}

fn repaint(out: &mut impl std::io::Write, renderer: &Renderer, root: &LayoutNode, surfaces: &SurfaceTable, focused: Option<PtyId>) -> Result<(), CliError> {
    renderer.paint(out, root, surfaces, focused)?;
    out.flush().map_err(CliError::Io)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_widget_single_pane_is_a_bare_surface() {
        let widget = build_widget(&[PtyId(7)], &[1.0]);
        assert!(matches!(widget, Widget::Surface { pty_id: PtyId(7) }));
    }

    #[test]
    fn build_widget_multiple_panes_is_a_ratio_row() {
        let widget = build_widget(&[PtyId(1), PtyId(2)], &[0.25, 0.75]);
        match widget {
            Widget::Row { children, .. } => assert_eq!(children.len(), 2),
            other => panic!("expected a row, got {other:?}"),
        }
    }

    #[test]
    fn compute_layout_single_pane_fills_the_screen() {
        let root = compute_layout(&[PtyId(1)], &[1.0], 80, 24);
        assert_eq!(root.rect.w, 80);
        assert_eq!(root.rect.h, 24);
    }

    #[test]
    fn extract_ratios_falls_back_to_even_split_when_absent() {
        let tree = json!({ "type": "pane", "pty_id": 1 });
        assert_eq!(extract_ratios(&tree, 2), vec![0.5, 0.5]);
    }

    #[test]
    fn extract_ratios_reads_saved_ratio_array() {
        let tree = json!({ "type": "row", "ratio": [0.3, 0.7], "children": [] });
        assert_eq!(extract_ratios(&tree, 2), vec![0.3, 0.7]);
    }

    #[test]
    fn extract_ratios_ignores_mismatched_length() {
        let tree = json!({ "type": "row", "ratio": [0.3, 0.3, 0.4], "children": [] });
        assert_eq!(extract_ratios(&tree, 2), vec![0.5, 0.5]);
    }

    #[test]
    fn build_session_tree_single_pane_is_a_bare_pane_node() {
        let tree = build_session_tree(&[PtyId(9)], &[1.0]);
        assert_eq!(tree, json!({ "type": "pane", "pty_id": 9 }));
    }

    #[test]
    fn build_session_tree_multiple_panes_round_trips_through_extract_ratios() {
        let panes = [PtyId(1), PtyId(2), PtyId(3)];
        let ratios = vec![0.2, 0.3, 0.5];
        let tree = build_session_tree(&panes, &ratios);
        assert_eq!(extract_ratios(&tree, panes.len()), ratios);
    }
}
