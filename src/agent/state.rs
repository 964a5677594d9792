//! Per-run agent state. Owned by the loop and only ever appended to.

use crate::models::Step;

#[derive(Debug, Clone)]
pub struct AgentState {
    problem: String,
    max_calls: usize,
    history: Vec<Step>,
    terminated: bool,
    stop_reason: Option<String>,
}

impl AgentState {
    pub fn new(problem: impl Into<String>, max_calls: usize) -> Self {
        Self {
            problem: problem.into(),
            max_calls,
            history: Vec::new(),
            terminated: false,
            stop_reason: None,
        }
    }

    pub fn problem(&self) -> &str {
        &self.problem
    }

    /// Number of tool calls made so far. Always equal to the history length.
    pub fn call_count(&self) -> usize {
        self.history.len()
    }

    pub fn remaining_calls(&self) -> usize {
        self.max_calls.saturating_sub(self.call_count())
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// True while another tool call is allowed.
    pub fn can_continue(&self) -> bool {
        !self.terminated && self.call_count() < self.max_calls
    }

    /// 1-based index the next step will get.
    pub fn next_index(&self) -> usize {
        self.history.len() + 1
    }

    /// Record a step. Returns false (and drops the step) once the run is
    /// terminated or the budget is spent.
    pub fn push_step(&mut self, step: Step) -> bool {
        if !self.can_continue() {
            return false;
        }
        self.history.push(step);
        true
    }

    pub fn terminate(&mut self, reason: Option<String>) {
        self.terminated = true;
        self.stop_reason = reason;
    }

    pub fn stop_reason(&self) -> Option<&str> {
        self.stop_reason.as_deref()
    }

    /// Every step so far, oldest first.
    pub fn steps(&self) -> &[Step] {
        &self.history
    }

    /// The last `window` steps, oldest first.
    pub fn recent(&self, window: usize) -> &[Step] {
        let start = self.history.len().saturating_sub(window);
        &self.history[start..]
    }

    pub fn into_history(self) -> Vec<Step> {
        self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ToolResult;
    use chrono::Utc;

    fn step(index: usize) -> Step {
        Step {
            index,
            call: None,
            tool_kind: None,
            result: ToolResult::failure("x"),
            timestamp: Utc::now(),
            duration_ms: 0,
        }
    }

    #[test]
    fn test_budget_is_enforced() {
        let mut state = AgentState::new("p", 2);
        assert!(state.push_step(step(1)));
        assert!(state.push_step(step(2)));
        assert!(!state.push_step(step(3)));
        assert_eq!(state.call_count(), 2);
        assert_eq!(state.remaining_calls(), 0);
        assert!(!state.can_continue());
    }

    #[test]
    fn test_no_steps_after_termination() {
        let mut state = AgentState::new("p", 5);
        state.terminate(Some("done".to_string()));
        assert!(!state.push_step(step(1)));
        assert_eq!(state.call_count(), 0);
        assert_eq!(state.stop_reason(), Some("done"));
    }

    #[test]
    fn test_recent_window() {
        let mut state = AgentState::new("p", 10);
        for i in 1..=4 {
            state.push_step(step(i));
        }
        let recent: Vec<usize> = state.recent(2).iter().map(|s| s.index).collect();
        assert_eq!(recent, vec![3, 4]);
        assert_eq!(state.recent(10).len(), 4);
        assert_eq!(state.next_index(), 5);
    }
}
