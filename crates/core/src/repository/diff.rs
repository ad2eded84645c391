//! `git diff --name-status` records

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffStatus {
    Added,
    Modified,
}

/// One changed path between two branches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffRecord {
    pub status: DiffStatus,
    pub path: String,
}

impl DiffRecord {
    /// Parse a `status<TAB>path` line.
    ///
    /// Deletions, renames and any line without exactly two fields yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.split('\t');
        let status = fields.next()?.trim();
        let path = fields.next()?;
        if fields.next().is_some() || path.is_empty() {
            return None;
        }

        let status = match status.chars().next()? {
            'A' => DiffStatus::Added,
            'M' => DiffStatus::Modified,
            _ => return None,
        };

        Some(Self {
            status,
            path: path.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_added() {
        let record = DiffRecord::parse("A\tdetections/endpoint/a.yml").unwrap();
        assert_eq!(record.status, DiffStatus::Added);
        assert_eq!(record.path, "detections/endpoint/a.yml");
    }

    #[test]
    fn test_parse_ignored_statuses() {
        assert!(DiffRecord::parse("D\tdetections/endpoint/a.yml").is_none());
        assert!(DiffRecord::parse("R087\ta.yml\tb.yml").is_none());
        assert!(DiffRecord::parse("M").is_none());
        assert!(DiffRecord::parse("").is_none());
    }
}
