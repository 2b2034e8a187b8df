//! CSV decoding of allocation-window batches.
//!
//! A batch is a CSV file with a header row naming at least `node_id`,
//! `start_at`, `stop_at`, `invoice_amount` and `compute_class`; any other
//! columns are ignored. Timestamps are epoch milliseconds or RFC 3339.
//!
//! The upstream allocation export names its columns positionally; those
//! headers are accepted as aliases:
//!
//! | field            | export column |
//! |------------------|---------------|
//! | `node_id`        | `key.1`       |
//! | `start_at`       | `value.0`     |
//! | `stop_at`        | `value.1`     |
//! | `invoice_amount` | `value.2`     |
//! | `compute_class`  | `value.5`     |

use std::{io::Read, path::Path};

use jiff::Timestamp;
use serde::Deserialize;

use crate::{
    error::{LeaseError, Result},
    models::AllocationWindow,
};

#[derive(Debug, Deserialize)]
struct WindowRecord {
    #[serde(alias = "key.1")]
    node_id: String,
    #[serde(alias = "value.0")]
    start_at: String,
    #[serde(alias = "value.1")]
    stop_at: String,
    #[serde(alias = "value.2")]
    invoice_amount: f64,
    #[serde(alias = "value.5")]
    compute_class: String,
}

/// Decodes every record of a batch, failing on the first malformed one.
pub fn parse_windows<R: Read>(reader: R, path: &Path) -> Result<Vec<AllocationWindow>> {
    let malformed = |reason: String| LeaseError::MalformedBatch {
        path: path.to_path_buf(),
        reason,
    };

    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut windows = Vec::new();
    for (index, record) in csv_reader.deserialize::<WindowRecord>().enumerate() {
        let record = record.map_err(|e| malformed(e.to_string()))?;
        let line = index + 2;

        if record.node_id.is_empty() {
            return Err(malformed(format!("line {line}: empty node_id")));
        }
        if !record.invoice_amount.is_finite() {
            return Err(malformed(format!("line {line}: invoice_amount is not finite")));
        }

        let start_at = parse_timestamp(&record.start_at)
            .map_err(|reason| malformed(format!("line {line}: start_at {reason}")))?;
        let stop_at = parse_timestamp(&record.stop_at)
            .map_err(|reason| malformed(format!("line {line}: stop_at {reason}")))?;
        if stop_at < start_at {
            return Err(malformed(format!(
                "line {line}: stop_at {stop_at} is before start_at {start_at}"
            )));
        }

        windows.push(AllocationWindow {
            node_id: record.node_id,
            start_at,
            stop_at,
            invoice_amount: record.invoice_amount,
            compute_class: record.compute_class,
        });
    }

    Ok(windows)
}

/// Accepts epoch milliseconds or an RFC 3339 timestamp.
fn parse_timestamp(text: &str) -> std::result::Result<Timestamp, String> {
    match text.parse::<i64>() {
        Ok(millis) => Timestamp::from_millisecond(millis).map_err(|e| e.to_string()),
        Err(_) => text
            .parse::<Timestamp>()
            .map_err(|e| format!("'{text}' is not a timestamp: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Vec<AllocationWindow>> {
        parse_windows(text.as_bytes(), Path::new("batch.csv"))
    }

    #[test]
    fn test_parse_millisecond_and_rfc3339_timestamps() {
        let windows = parse(
            "node_id,start_at,stop_at,invoice_amount,compute_class\n\
             node-a,0,9000000,1.5,gpu\n\
             node-b, 2025-10-25T00:00:00Z , 2025-10-25T02:30:00Z ,2.25,cpu\n",
        )
        .expect("Failed to parse batch");

        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].node_id, "node-a");
        assert_eq!(windows[0].stop_at.as_millisecond(), 9_000_000);
        assert_eq!(windows[1].start_at, "2025-10-25T00:00:00Z".parse::<Timestamp>().unwrap());
        assert_eq!(windows[1].total_duration().as_mins(), 150);
        assert_eq!(windows[1].compute_class, "cpu");
    }

    #[test]
    fn test_parse_ignores_extra_columns() {
        let windows = parse(
            "region,node_id,start_at,stop_at,invoice_amount,compute_class,notes\n\
             eu,node-a,0,60000,1.0,gpu,spare\n",
        )
        .expect("Failed to parse batch");
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].invoice_amount, 1.0);
    }

    #[test]
    fn test_parse_upstream_export_columns() {
        let windows = parse(
            "key.0,key.1,value.0,value.1,value.2,value.3,value.4,value.5\n\
             acct-7,node-a,1709251200000,1709260200000,150.0,x,y,gpu-small\n",
        )
        .expect("Failed to parse export batch");

        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].node_id, "node-a");
        assert_eq!(windows[0].start_at.as_millisecond(), 1_709_251_200_000);
        assert_eq!(windows[0].total_duration().as_mins(), 150);
        assert_eq!(windows[0].invoice_amount, 150.0);
        assert_eq!(windows[0].compute_class, "gpu-small");
    }

    #[test]
    fn test_parse_rejects_inverted_window() {
        let err = parse(
            "node_id,start_at,stop_at,invoice_amount,compute_class\n\
             node-a,60000,0,1.0,gpu\n",
        )
        .unwrap_err();
        assert!(matches!(err, LeaseError::MalformedBatch { ref reason, .. } if reason.contains("line 2")));
    }

    #[test]
    fn test_parse_rejects_missing_column() {
        let err = parse("node_id,start_at,stop_at,compute_class\nnode-a,0,1,gpu\n").unwrap_err();
        assert!(matches!(err, LeaseError::MalformedBatch { .. }));
    }

    #[test]
    fn test_parse_rejects_bad_timestamp() {
        let err = parse(
            "node_id,start_at,stop_at,invoice_amount,compute_class\n\
             node-a,yesterday,0,1.0,gpu\n",
        )
        .unwrap_err();
        assert!(matches!(err, LeaseError::MalformedBatch { ref reason, .. } if reason.contains("start_at")));
    }

    #[test]
    fn test_parse_empty_batch() {
        let windows = parse("node_id,start_at,stop_at,invoice_amount,compute_class\n")
            .expect("Failed to parse batch");
        assert!(windows.is_empty());
    }
}
