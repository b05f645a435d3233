use serde::Serialize;

/// One flattened record per infringing URL.
///
/// Flattener fields are fixed at construction. The enrichment fields start
/// unset and each can be filled exactly once; later writes are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Row {
    pub notice_id: String,
    pub title: String,
    pub sender: String,
    pub principal: String,
    pub recipient: String,
    pub date_sent: String,
    pub description: String,
    pub infringing_url: String,
    pub domain: String,
    ip_address: Option<String>,
    principal_clean: Option<String>,
    root_domain: Option<String>,
}

/// Column order of the exported row table
pub const ROW_COLUMNS: [&str; 10] = [
    "notice_id",
    "title",
    "sender",
    "principal",
    "recipient",
    "date_sent",
    "description",
    "infringing_url",
    "domain",
    "ip_address",
];

impl Row {
    /// A row with the flattener fields set and every enrichment slot empty
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        notice_id: String,
        title: String,
        sender: String,
        principal: String,
        recipient: String,
        date_sent: String,
        description: String,
        infringing_url: String,
        domain: String,
    ) -> Self {
        Self {
            notice_id,
            title,
            sender,
            principal,
            recipient,
            date_sent,
            description,
            infringing_url,
            domain,
            ip_address: None,
            principal_clean: None,
            root_domain: None,
        }
    }

    pub fn ip_address(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }

    pub fn principal_clean(&self) -> Option<&str> {
        self.principal_clean.as_deref()
    }

    pub fn root_domain(&self) -> Option<&str> {
        self.root_domain.as_deref()
    }

    /// Returns false if the address was already set
    pub fn set_ip_address(&mut self, ip: impl Into<String>) -> bool {
        set_once(&mut self.ip_address, ip.into())
    }

    /// Returns false if either normalized field was already set
    pub fn set_normalized(&mut self, principal_clean: String, root_domain: String) -> bool {
        let principal_set = set_once(&mut self.principal_clean, principal_clean);
        let root_set = set_once(&mut self.root_domain, root_domain);
        principal_set && root_set
    }

    /// Values in `ROW_COLUMNS` order; unset enrichment fields are empty
    pub fn to_record(&self) -> [&str; 10] {
        [
            &self.notice_id,
            &self.title,
            &self.sender,
            &self.principal,
            &self.recipient,
            &self.date_sent,
            &self.description,
            &self.infringing_url,
            &self.domain,
            self.ip_address.as_deref().unwrap_or(""),
        ]
    }
}

fn set_once(slot: &mut Option<String>, value: String) -> bool {
    if slot.is_some() {
        return false;
    }
    *slot = Some(value);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enrichment_fields_never_overwritten() {
        let mut row = Row::default();
        assert!(row.set_ip_address("93.184.216.34"));
        assert!(!row.set_ip_address("N/A"));
        assert_eq!(row.ip_address(), Some("93.184.216.34"));

        assert!(row.set_normalized("Acme".to_string(), "example.com".to_string()));
        assert!(!row.set_normalized("Other".to_string(), "other.com".to_string()));
        assert_eq!(row.principal_clean(), Some("Acme"));
        assert_eq!(row.root_domain(), Some("example.com"));
    }

    #[test]
    fn test_new_leaves_enrichment_unset() {
        let row = Row::new(
            "7".to_string(),
            "T".to_string(),
            "S".to_string(),
            "P".to_string(),
            "R".to_string(),
            "2021-01-01".to_string(),
            "D".to_string(),
            "http://a.com/x".to_string(),
            "a.com".to_string(),
        );
        assert_eq!(row.notice_id, "7");
        assert_eq!(row.domain, "a.com");
        assert_eq!(row.ip_address(), None);
        assert_eq!(row.principal_clean(), None);
        assert_eq!(row.root_domain(), None);
        assert_eq!(row.to_record()[9], "");
    }

    #[test]
    fn test_record_order_matches_columns() {
        let mut row = Row {
            notice_id: "1".to_string(),
            domain: "example.com".to_string(),
            ..Default::default()
        };
        row.set_ip_address("N/A");
        let record = row.to_record();
        assert_eq!(record.len(), ROW_COLUMNS.len());
        assert_eq!(record[0], "1");
        assert_eq!(record[8], "example.com");
        assert_eq!(record[9], "N/A");
    }
}
