use csv::StringRecord;

use crate::pipeline::PipelineError;

/// Header lookup shared by the CSV sources. Column names match
/// case-insensitively after trimming.
#[derive(Debug, Clone)]
pub struct Columns {
    headers: StringRecord,
}

impl Columns {
    pub fn new(headers: StringRecord) -> Self {
        Self { headers }
    }

    pub fn index(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    }

    /// Fails when none of `names` is a column.
    pub fn require(&self, names: &[&str]) -> Result<usize, PipelineError> {
        names
            .iter()
            .find_map(|n| self.index(n))
            .ok_or_else(|| PipelineError::Source(format!("missing column '{}' in CSV header", names[0])))
    }
}

pub fn field(record: &StringRecord, idx: Option<usize>) -> &str {
    idx.and_then(|i| record.get(i)).map(str::trim).unwrap_or("")
}

pub fn parse_optional_f64(row: u64, name: &str, s: &str) -> Result<Option<f64>, PipelineError> {
    if s.is_empty() || s.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    s.parse()
        .map(Some)
        .map_err(|e| PipelineError::record(row, format!("invalid {name} '{s}': {e}")))
}

pub fn parse_optional_string(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

pub fn row_of(record: &StringRecord) -> u64 {
    record.position().map_or(0, |p| p.line())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let cols = Columns::new(StringRecord::from(vec!["interval_start", " Interval_kWh "]));
        assert_eq!(cols.index("interval_kwh"), Some(1));
        assert_eq!(cols.require(&["kwh", "interval_kWh"]).unwrap(), 1);
        assert!(matches!(
            cols.require(&["sunrise"]),
            Err(PipelineError::Source(msg)) if msg.contains("sunrise")
        ));
    }

    #[test]
    fn optional_numbers() {
        assert_eq!(parse_optional_f64(3, "temp", "").unwrap(), None);
        assert_eq!(parse_optional_f64(3, "temp", "NaN").unwrap(), None);
        assert_eq!(parse_optional_f64(3, "temp", "21.5").unwrap(), Some(21.5));
        assert!(matches!(
            parse_optional_f64(3, "temp", "warm"),
            Err(PipelineError::Record { row: 3, .. })
        ));
    }
}
