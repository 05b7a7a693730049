//! Fixed-size batching of `INSERT` statements and progress arithmetic.

use std::num::NonZeroUsize;

/// A contiguous run of statements sent as one atomic unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch<'a, T = String> {
    /// Zero-based position of this batch.
    pub index: usize,
    /// The statements, in original order.
    pub statements: &'a [T],
}

/// Splits `statements` into consecutive batches of at most `batch_size`.
///
/// Produces `ceil(len / batch_size)` batches whose concatenation is
/// exactly `statements`.
#[must_use]
pub fn plan<T>(statements: &[T], batch_size: NonZeroUsize) -> Vec<Batch<'_, T>> {
    statements
        .chunks(batch_size.get())
        .enumerate()
        .map(|(index, statements)| Batch { index, statements })
        .collect()
}

/// Percent of statements sent once batch `batch_index` is acknowledged:
/// `floor(100 * completed / total)`, capped at 99.
///
/// Only the caller reports 100, once the whole job has succeeded.
#[must_use]
pub fn progress_after(batch_index: usize, total_statements: usize, batch_size: NonZeroUsize) -> u8 {
    if total_statements == 0 {
        return 0;
    }
    let completed = batch_index
        .saturating_add(1)
        .saturating_mul(batch_size.get())
        .min(total_statements);
    let percent = completed.saturating_mul(100) / total_statements;
    u8::try_from(percent.min(99)).unwrap_or(99)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn statements(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("INSERT {i}")).collect()
    }

    #[test]
    fn twenty_five_by_ten() {
        let statements = statements(25);
        let batches = plan(&statements, size(10));
        let sizes: Vec<usize> = batches.iter().map(|b| b.statements.len()).collect();
        assert_eq!(sizes, [10, 10, 5]);
        assert_eq!(
            batches.iter().map(|b| b.index).collect::<Vec<_>>(),
            [0, 1, 2]
        );
    }

    #[test]
    fn partition_reconstructs_input() {
        for len in 1..=40 {
            for batch_size in 1..=12 {
                let statements = statements(len);
                let batches = plan(&statements, size(batch_size));
                assert_eq!(batches.len(), len.div_ceil(batch_size));
                let rebuilt: Vec<String> = batches
                    .iter()
                    .flat_map(|b| b.statements.iter().cloned())
                    .collect();
                assert_eq!(rebuilt, statements, "len={len} batch_size={batch_size}");
            }
        }
    }

    #[test]
    fn empty_input_has_no_batches() {
        assert!(plan::<String>(&[], size(10)).is_empty());
    }

    #[test]
    fn progress_is_floor_of_completed_fraction() {
        assert_eq!(progress_after(0, 25, size(10)), 40);
        assert_eq!(progress_after(1, 25, size(10)), 80);
        assert_eq!(progress_after(0, 3, size(1)), 33);
    }

    #[test]
    fn progress_never_reports_completion() {
        assert_eq!(progress_after(2, 25, size(10)), 99);
        assert_eq!(progress_after(0, 5, size(10)), 99);
    }

    #[test]
    fn progress_is_monotonic() {
        let total: usize = 97;
        let batch_size = size(7);
        let batch_count = total.div_ceil(batch_size.get());
        let mut last = 0;
        for index in 0..batch_count {
            let percent = progress_after(index, total, batch_size);
            assert!(percent >= last);
            last = percent;
        }
    }
}
