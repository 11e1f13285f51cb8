use serde::Serialize;

use crate::error::MigrateError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub item: String,
    pub error: String,
}

/// Tally of a multi-item operation. `succeeded + failed` is the number of
/// items attempted; `dropped` counts items cut by the batch limit, which
/// were never attempted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<ItemFailure>,
    pub dropped: usize,
}

impl BatchOutcome {
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    fn record_failure(&mut self, item: String, error: &MigrateError) {
        self.failed += 1;
        self.failures.push(ItemFailure {
            item,
            error: error.detail(),
        });
    }
}

/// Runs `op` over every item in input order and keeps the successful
/// values with their labels. Every failure, including a lost connection, is
/// recorded against its item and the fold moves on to the next one.
pub fn collect_batch<I, T, V, L, F>(
    items: I,
    mut label: L,
    mut op: F,
) -> (Vec<(String, V)>, BatchOutcome)
where
    I: IntoIterator<Item = T>,
    L: FnMut(&T) -> String,
    F: FnMut(T) -> Result<V, MigrateError>,
{
    items.into_iter().fold(
        (Vec::new(), BatchOutcome::default()),
        |(mut values, mut outcome), item| {
            let name = label(&item);
            match op(item) {
                Ok(value) => {
                    outcome.succeeded += 1;
                    values.push((name, value));
                }
                Err(err) => outcome.record_failure(name, &err),
            }
            (values, outcome)
        },
    )
}

/// [`collect_batch`] for operations whose only result is success.
pub fn run_batch<I, T, L, F>(items: I, label: L, op: F) -> BatchOutcome
where
    I: IntoIterator<Item = T>,
    L: FnMut(&T) -> String,
    F: FnMut(T) -> Result<(), MigrateError>,
{
    collect_batch(items, label, op).1
}
