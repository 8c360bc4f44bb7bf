//! Stream records and per-record submission results.

/// One record submitted to the stream transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    /// Records sharing a key keep their relative order downstream
    pub partition_key: String,
    pub payload: Vec<u8>,
}

impl StreamRecord {
    pub fn new(partition_key: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            partition_key: partition_key.into(),
            payload,
        }
    }

    /// Bytes this record counts against a batch limit.
    pub fn size(&self) -> usize {
        self.partition_key.len() + self.payload.len()
    }
}

/// Transport response to a batch submission.
///
/// `error_codes[i]` is `Some` when record `i` of the submitted batch failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutRecordsOutput {
    pub error_codes: Vec<Option<String>>,
}

impl PutRecordsOutput {
    /// Response for a batch where every record succeeded.
    pub fn success(len: usize) -> Self {
        Self {
            error_codes: vec![None; len],
        }
    }

    pub fn failed_count(&self) -> usize {
        self.error_codes.iter().filter(|c| c.is_some()).count()
    }

    /// The records of `submitted` that failed, in their original order.
    ///
    /// A record with no matching result slot counts as failed.
    pub fn failed_subset(&self, submitted: &[StreamRecord]) -> Vec<StreamRecord> {
        submitted
            .iter()
            .enumerate()
            .filter(|(i, _)| self.error_codes.get(*i).map_or(true, Option::is_some))
            .map(|(_, r)| r.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &str) -> StreamRecord {
        StreamRecord::new(key, b"{}".to_vec())
    }

    #[test]
    fn test_size_counts_key_and_payload() {
        assert_eq!(StreamRecord::new("image", vec![0; 10]).size(), 15);
    }

    #[test]
    fn test_failed_subset_keeps_order_and_keys() {
        let submitted = vec![record("a"), record("b"), record("c")];
        let output = PutRecordsOutput {
            error_codes: vec![Some("Throttled".to_string()), None, Some("Internal".to_string())],
        };
        assert_eq!(output.failed_count(), 2);
        assert_eq!(output.failed_subset(&submitted), vec![record("a"), record("c")]);
    }

    #[test]
    fn test_short_response_counts_missing_as_failed() {
        let submitted = vec![record("a"), record("b")];
        let output = PutRecordsOutput::success(1);
        assert_eq!(output.failed_subset(&submitted), vec![record("b")]);
    }
}
