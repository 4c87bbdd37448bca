use crate::db::ResultSet;
use crate::error::CayenneResult;
use crate::query::Query;

/// Error an observer may raise from a callback. Actions wrap it into a
/// [`crate::error::CayenneError`], keeping ours untouched.
pub type ObserverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Receives the results of executed queries.
pub trait OperationObserver {
    fn next_rows(&mut self, query: &Query, result: ResultSet) -> Result<(), ObserverError>;

    fn next_count(&mut self, query: &Query, count: u64) -> Result<(), ObserverError>;

    /// Per-row counts of a batch.
    fn next_batch_count(&mut self, query: &Query, counts: &[u64]) -> Result<(), ObserverError>;

    /// Called after every query ran and before the transaction commits.
    /// An error rolls the transaction back.
    fn verify(&self) -> CayenneResult<()> {
        Ok(())
    }
}

/// What a [`CollectingObserver`] saw for one query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Rows(ResultSet),
    Count(u64),
    BatchCounts(Vec<u64>),
}

/// Keeps every result in execution order.
#[derive(Debug, Default)]
pub struct CollectingObserver {
    pub outcomes: Vec<(&'static str, QueryOutcome)>,
}

impl CollectingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Result sets, in order.
    pub fn result_sets(&self) -> impl Iterator<Item = &ResultSet> {
        self.outcomes.iter().filter_map(|(_, o)| match o {
            QueryOutcome::Rows(rs) => Some(rs),
            _ => None,
        })
    }

    /// Single counts and batch counts flattened, in order.
    pub fn counts(&self) -> Vec<u64> {
        self.outcomes
            .iter()
            .flat_map(|(_, o)| match o {
                QueryOutcome::Count(n) => vec![*n],
                QueryOutcome::BatchCounts(c) => c.clone(),
                QueryOutcome::Rows(_) => Vec::new(),
            })
            .collect()
    }
}

impl OperationObserver for CollectingObserver {
    fn next_rows(&mut self, query: &Query, result: ResultSet) -> Result<(), ObserverError> {
        self.outcomes.push((query.kind(), QueryOutcome::Rows(result)));
        Ok(())
    }

    fn next_count(&mut self, query: &Query, count: u64) -> Result<(), ObserverError> {
        self.outcomes.push((query.kind(), QueryOutcome::Count(count)));
        Ok(())
    }

    fn next_batch_count(&mut self, query: &Query, counts: &[u64]) -> Result<(), ObserverError> {
        self.outcomes
            .push((query.kind(), QueryOutcome::BatchCounts(counts.to_vec())));
        Ok(())
    }
}
