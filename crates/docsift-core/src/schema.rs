//! Per-document-type extraction schemas.
//!
//! Each supported document type maps to the set of fields worth pulling out
//! of it. Lookups are case-insensitive; a type with no schema (including the
//! classifier's "Unknown") simply has nothing to extract.

use std::collections::BTreeMap;

use lazy_static::lazy_static;

lazy_static! {
    /// Field lists keyed by lowercase document type.
    pub static ref DOCUMENT_SCHEMAS: BTreeMap<&'static str, Vec<&'static str>> = {
        let mut schemas = BTreeMap::new();
        schemas.insert(
            "advertisement",
            vec![
                "product_or_service_name",
                "brand_name",
                "slogan_or_headline",
                "call_to_action",
                "contact_info",
                "offer_or_discount",
            ],
        );
        schemas.insert(
            "budget",
            vec![
                "budget_title",
                "time_period",
                "total_income",
                "total_expenses",
                "net_balance",
            ],
        );
        schemas.insert(
            "email",
            vec![
                "sender_name",
                "sender_email",
                "recipient_name",
                "recipient_email",
                "subject",
                "date_sent",
                "summary",
            ],
        );
        schemas.insert("file_folder", vec!["folder_label"]);
        schemas.insert(
            "form",
            vec!["form_title", "full_name", "date_of_birth", "address"],
        );
        schemas.insert(
            "handwritten",
            vec!["title", "author", "date", "summary_of_content"],
        );
        schemas.insert(
            "invoice",
            vec![
                "invoice_number",
                "vendor_name",
                "customer_name",
                "date",
                "total_amount",
            ],
        );
        schemas.insert(
            "letter",
            vec![
                "sender_name",
                "sender_address",
                "recipient_name",
                "recipient_address",
                "date",
                "salutation",
                "closing",
            ],
        );
        schemas.insert("memo", vec!["to", "from", "date", "subject", "cc"]);
        schemas.insert(
            "news_article",
            vec![
                "headline",
                "author",
                "publication_name",
                "publication_date",
                "summary",
            ],
        );
        schemas.insert(
            "presentation",
            vec![
                "presentation_title",
                "presenter_name",
                "event_or_conference_name",
                "date",
                "key_topics",
            ],
        );
        schemas.insert(
            "questionnaire",
            vec![
                "questionnaire_title",
                "issuing_organization",
                "list_of_questions",
            ],
        );
        schemas.insert(
            "receipt",
            vec!["store_name", "date", "total_amount", "items"],
        );
        schemas.insert(
            "resume",
            vec![
                "candidate_name",
                "contact_email",
                "contact_phone",
                "summary_or_objective",
                "skills",
            ],
        );
        schemas.insert(
            "scientific_publication",
            vec![
                "title",
                "authors",
                "journal_name",
                "publication_date",
                "doi",
                "abstract",
            ],
        );
        schemas.insert(
            "scientific_report",
            vec![
                "report_title",
                "authors",
                "reporting_organization",
                "report_date",
                "report_number",
                "summary",
            ],
        );
        schemas.insert(
            "specification",
            vec![
                "document_title",
                "document_id_or_version",
                "authoring_organization",
                "effective_date",
                "product_or_system_name",
            ],
        );
        schemas
    };
}

/// Fields to extract for a document type, or `None` for unsupported types.
/// The lookup lowercases the type, so classifier labels match regardless of
/// casing.
pub fn fields_for(document_type: &str) -> Option<&'static [&'static str]> {
    DOCUMENT_SCHEMAS
        .get(document_type.to_lowercase().as_str())
        .map(|fields| fields.as_slice())
}

/// All supported document type labels, sorted.
pub fn supported_types() -> Vec<&'static str> {
    DOCUMENT_SCHEMAS.keys().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_all_types_present() {
        assert_eq!(DOCUMENT_SCHEMAS.len(), 17);
        assert!(DOCUMENT_SCHEMAS.contains_key("invoice"));
        assert!(DOCUMENT_SCHEMAS.contains_key("scientific_publication"));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(fields_for("Invoice"), fields_for("invoice"));
        assert!(fields_for("INVOICE").is_some());
    }

    #[test]
    fn test_unknown_type_has_no_schema() {
        assert_eq!(fields_for("Unknown"), None);
        assert_eq!(fields_for("passport"), None);
    }

    #[test]
    fn test_invoice_fields() {
        let fields = fields_for("invoice").unwrap();
        assert_eq!(
            fields,
            [
                "invoice_number",
                "vendor_name",
                "customer_name",
                "date",
                "total_amount"
            ]
        );
    }
}
