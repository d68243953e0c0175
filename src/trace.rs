/// Emits a structured `tracing` event for one step of an orchestrator node.
///
/// Every orchestrator task (C6/C7) brackets its work with a `status: "start"`
/// (or `"invoked"`) trace and a closing `status: "success"` / `"error"`
/// trace, so a single `RUST_LOG=journey_planner=debug` run reconstructs the
/// whole fan-out/fan-in shape of a pipeline from the log alone.
///
/// ```ignore
/// crate::tool_trace!(agent: "poi", tool: "validate_hit", status: "start");
/// crate::tool_trace!(agent: "poi", tool: "validate_hit", status: "error", details: format!("{err}"));
/// ```
#[macro_export]
macro_rules! tool_trace {
	(agent: $agent:expr, tool: $tool:expr, status: $status:expr) => {
		tracing::info!(target: "tool_trace", agent = $agent, tool = $tool, status = $status);
	};
	(agent: $agent:expr, tool: $tool:expr, status: $status:expr, details: $details:expr) => {
		tracing::info!(
			target: "tool_trace",
			agent = $agent,
			tool = $tool,
			status = $status,
			details = %$details,
		);
	};
}
