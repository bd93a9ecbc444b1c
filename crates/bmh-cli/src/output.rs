use bmh_reconciler::Change;

/// Render a list of changes as human-readable text.
pub fn render_changes(changes: &[Change]) -> String {
    if changes.is_empty() {
        return "No changes.".to_string();
    }
    let mut out = String::new();
    for change in changes {
        let line = match change {
            Change::HostReserved { nar_id, node_id, host } => {
                format!("+ host {} reserved for node {} (nar {})", host, node_id, nar_id)
            }
            Change::NodeConfigInProgress { node_id, reason } => {
                format!("~ node {} config in progress ({:?})", node_id, reason)
            }
            Change::NodeConfigured { node_id } => format!("= node {} configured", node_id),
            Change::NodeFailed { node_id, message } => format!("! node {} failed: {}", node_id, message),
            Change::NodeDeallocated { node_id } => format!("- node {} deallocated", node_id),
        };
        out.push_str(&line);
        out.push('\n');
    }
    out
}
