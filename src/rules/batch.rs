/// Parallel parsing of independent rule strings
use super::parser::RuleParser;
use super::rule::Rule;
use crate::error::{Result, RuleError};
use tracing::{info, warn};

impl RuleParser {
    /// Number of worker threads `parse_all` will use
    pub fn worker_threads(&self) -> usize {
        if self.worker_threads == 0 {
            num_cpus::get().max(1)
        } else {
            self.worker_threads
        }
    }

    /// Parse many rules in parallel.
    ///
    /// Returns one result per input, in input order. A rule that fails to
    /// parse only affects its own slot.
    pub fn parse_all<S: AsRef<str> + Sync>(&self, rules: &[S]) -> Vec<Result<Rule>> {
        if rules.is_empty() {
            return Vec::new();
        }

        let workers = self.worker_threads().min(rules.len());
        let chunk_size = rules.len().div_ceil(workers);

        let outcome = crossbeam::thread::scope(|scope| {
            let handles: Vec<_> = rules
                .chunks(chunk_size)
                .map(|chunk| {
                    let handle = scope.spawn(move |_| {
                        chunk
                            .iter()
                            .map(|rule| self.parse(rule.as_ref()))
                            .collect::<Vec<_>>()
                    });
                    (chunk.len(), handle)
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|(len, handle)| {
                    handle
                        .join()
                        .unwrap_or_else(|_| worker_panicked(len))
                })
                .collect::<Vec<_>>()
        });

        let results = outcome.unwrap_or_else(|_| worker_panicked(rules.len()));

        let mut failed = 0;
        for (i, result) in results.iter().enumerate() {
            if let Err(e) = result {
                warn!("Failed to parse rule {}: {}", i + 1, e);
                failed += 1;
            }
        }
        info!(
            "Parsed {} rules ({} failed) with {} workers",
            results.len() - failed,
            failed,
            workers
        );

        results
    }
}

fn worker_panicked(len: usize) -> Vec<Result<Rule>> {
    (0..len)
        .map(|_| Err(RuleError::ThreadError("parser worker panicked".to_string())))
        .collect()
}
