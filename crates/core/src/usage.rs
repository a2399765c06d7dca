use serde::Serialize;
use std::fmt;

/// Per-session counters, summarized and logged on shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageSummary {
    pub turns: u64,
    pub llm_calls: u64,
    pub tool_calls: u64,
    pub tool_errors: u64,
}

impl fmt::Display for UsageSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "turns={} llm_calls={} tool_calls={} tool_errors={}",
            self.turns, self.llm_calls, self.tool_calls, self.tool_errors
        )
    }
}

#[derive(Debug, Default)]
pub struct UsageCollector {
    summary: UsageSummary,
}

impl UsageCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_turn(&mut self) {
        self.summary.turns += 1;
    }

    pub fn record_llm_call(&mut self) {
        self.summary.llm_calls += 1;
    }

    pub fn record_tool_call(&mut self, ok: bool) {
        self.summary.tool_calls += 1;
        if !ok {
            self.summary.tool_errors += 1;
        }
    }

    pub fn summary(&self) -> UsageSummary {
        self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_accumulate() {
        let mut usage = UsageCollector::new();
        usage.record_turn();
        usage.record_llm_call();
        usage.record_llm_call();
        usage.record_tool_call(true);
        usage.record_tool_call(false);

        let summary = usage.summary();
        assert_eq!(summary.turns, 1);
        assert_eq!(summary.llm_calls, 2);
        assert_eq!(summary.tool_calls, 2);
        assert_eq!(summary.tool_errors, 1);
        assert_eq!(
            summary.to_string(),
            "turns=1 llm_calls=2 tool_calls=2 tool_errors=1"
        );
    }
}
