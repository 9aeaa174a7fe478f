/// Statistics of a table, supplied by the storage adapter behind a scan.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Statistics {
    /// Total number of rows.
    ///
    /// This maybe an estimated value.
    row_count: f64,
}

impl Statistics {
    pub fn new(row_count: f64) -> Self {
        Self { row_count }
    }

    pub fn row_count(&self) -> f64 {
        self.row_count
    }
}
