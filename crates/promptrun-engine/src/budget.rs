use std::time::{Duration, Instant};

use promptrun_utils::error::BudgetError;

/// Call-count and wall-clock budget of one execution attempt.
#[derive(Debug, Clone)]
pub struct CallBudget {
    max_llm_calls: u32,
    max_tool_calls: u32,
    max_total: Option<Duration>,
    llm_calls: u32,
    tool_calls: u32,
    started: Instant,
}

impl CallBudget {
    #[must_use]
    pub fn new(max_llm_calls: u32, max_tool_calls: u32, max_total: Option<Duration>) -> Self {
        Self {
            max_llm_calls,
            max_tool_calls,
            max_total,
            llm_calls: 0,
            tool_calls: 0,
            started: Instant::now(),
        }
    }

    /// Claim the next LLM call. Checked before the call is made.
    ///
    /// # Errors
    ///
    /// `TotalTimeExceeded` once the wall-clock budget is spent, otherwise
    /// `MaxLlmCallsExceeded` when this call would go past the cap.
    pub fn begin_llm_call(&mut self) -> Result<(), BudgetError> {
        if let Some(limit) = self.max_total {
            let elapsed = self.started.elapsed();
            if elapsed > limit {
                return Err(BudgetError::TotalTimeExceeded {
                    limit_ms: limit.as_millis() as u64,
                    elapsed_ms: elapsed.as_millis() as u64,
                });
            }
        }

        let attempted = self.llm_calls + 1;
        if attempted > self.max_llm_calls {
            return Err(BudgetError::MaxLlmCallsExceeded {
                limit: self.max_llm_calls,
                attempted,
            });
        }
        self.llm_calls = attempted;
        Ok(())
    }

    /// Claim `count` tool calls for the next batch.
    ///
    /// # Errors
    ///
    /// `MaxToolCallsExceeded` when the cumulative count would go past the cap.
    pub fn reserve_tool_calls(&mut self, count: usize) -> Result<(), BudgetError> {
        let attempted = self
            .tool_calls
            .saturating_add(u32::try_from(count).unwrap_or(u32::MAX));
        if attempted > self.max_tool_calls {
            return Err(BudgetError::MaxToolCallsExceeded {
                limit: self.max_tool_calls,
                attempted,
            });
        }
        self.tool_calls = attempted;
        Ok(())
    }

    #[must_use]
    pub fn llm_calls(&self) -> u32 {
        self.llm_calls
    }

    #[must_use]
    pub fn tool_calls(&self) -> u32 {
        self.tool_calls
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_third_call_fails_with_limit_two() {
        let mut budget = CallBudget::new(2, 5, None);
        assert!(budget.begin_llm_call().is_ok());
        assert!(budget.begin_llm_call().is_ok());
        assert_eq!(
            budget.begin_llm_call(),
            Err(BudgetError::MaxLlmCallsExceeded {
                limit: 2,
                attempted: 3
            })
        );
        assert_eq!(budget.llm_calls(), 2);
    }

    #[test]
    fn test_tool_calls_are_cumulative() {
        let mut budget = CallBudget::new(5, 5, None);
        budget.reserve_tool_calls(3).unwrap();
        assert_eq!(
            budget.reserve_tool_calls(3),
            Err(BudgetError::MaxToolCallsExceeded {
                limit: 5,
                attempted: 6
            })
        );
        budget.reserve_tool_calls(2).unwrap();
        assert_eq!(budget.tool_calls(), 5);
    }

    #[test]
    fn test_wall_clock_checked_first() {
        let mut budget = CallBudget::new(5, 5, Some(Duration::from_millis(5)));
        budget.begin_llm_call().unwrap();
        std::thread::sleep(Duration::from_millis(15));
        assert!(matches!(
            budget.begin_llm_call(),
            Err(BudgetError::TotalTimeExceeded { limit_ms: 5, .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_llm_cap_trips_exactly_past_limit(limit in 1u32..20) {
            let mut budget = CallBudget::new(limit, 1, None);
            for _ in 0..limit {
                prop_assert!(budget.begin_llm_call().is_ok());
            }
            prop_assert!(budget.begin_llm_call().is_err());
            prop_assert_eq!(budget.llm_calls(), limit);
        }
    }
}
