// Quote and product record layouts

use super::envelope::{field, EventEnvelope};
use super::{ProjectionError, Result};
use serde_json::{Map, Value};

/// Column names of the `quotes` table, in row order
pub const QUOTE_HEADERS: [&str; 31] = [
    "quoteId",
    "timestamp",
    "userId",
    "paymentType",
    "email",
    "reference",
    "accountReference",
    "sanctionsSearchRecord",
    "source",
    "has_duplicates",
    "sanction_check_passed",
    "safe_sic_code",
    "can_access_portal",
    "isFirstQuote",
    "contact_businessType",
    "contact_businessName",
    "contact_businessNumber",
    "contact_sicCodes",
    "contact_tradingName",
    "contact_turnover",
    "contact_employeeCount",
    "contact_ern",
    "contact_ernExempt",
    "contact_hasActiveInsurance",
    "contact_activeInsuranceRenewalDate",
    "contact_effectiveDate",
    "contact_isValidBusiness",
    "contact_quoteId",
    "contact_premises",
    "eventType",
    "eventCreated",
];

/// Column names of the `quote_items` table, in row order
pub const PRODUCT_HEADERS: [&str; 8] = [
    "quote_id",
    "id",
    "key",
    "name",
    "total",
    "ipt",
    "agencyProduct_guid",
    "agencyProduct_name",
];

/// The 15 contact sub-fields of a quote row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactFields {
    pub business_type: Option<String>,
    pub business_name: Option<String>,
    pub business_number: Option<String>,
    pub sic_codes: Option<String>,
    pub trading_name: Option<String>,
    pub turnover: Option<String>,
    pub employee_count: Option<String>,
    pub ern: Option<String>,
    pub ern_exempt: Option<String>,
    pub has_active_insurance: Option<String>,
    pub active_insurance_renewal_date: Option<String>,
    pub effective_date: Option<String>,
    pub is_valid_business: Option<String>,
    pub quote_id: Option<String>,
    pub premises: Option<String>,
}

impl ContactFields {
    pub fn from_object(object: &Map<String, Value>) -> Self {
        Self {
            business_type: field(object, "businessType"),
            business_name: field(object, "businessName"),
            business_number: field(object, "businessNumber"),
            sic_codes: field(object, "sicCodes"),
            trading_name: field(object, "tradingName"),
            turnover: field(object, "turnover"),
            employee_count: field(object, "employeeCount"),
            ern: field(object, "ern"),
            ern_exempt: field(object, "ernExempt"),
            has_active_insurance: field(object, "hasActiveInsurance"),
            active_insurance_renewal_date: field(object, "activeInsuranceRenewalDate"),
            effective_date: field(object, "effectiveDate"),
            is_valid_business: field(object, "isValidBusiness"),
            quote_id: field(object, "quoteId"),
            premises: field(object, "premises"),
        }
    }

    fn cells(&self) -> [Option<&str>; 15] {
        [
            self.business_type.as_deref(),
            self.business_name.as_deref(),
            self.business_number.as_deref(),
            self.sic_codes.as_deref(),
            self.trading_name.as_deref(),
            self.turnover.as_deref(),
            self.employee_count.as_deref(),
            self.ern.as_deref(),
            self.ern_exempt.as_deref(),
            self.has_active_insurance.as_deref(),
            self.active_insurance_renewal_date.as_deref(),
            self.effective_date.as_deref(),
            self.is_valid_business.as_deref(),
            self.quote_id.as_deref(),
            self.premises.as_deref(),
        ]
    }
}

/// One row of the `quotes` table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuoteRecord {
    pub quote_id: Option<String>,
    pub timestamp: Option<String>,
    pub user_id: Option<String>,
    pub payment_type: Option<String>,
    pub email: Option<String>,
    pub reference: Option<String>,
    pub account_reference: Option<String>,
    pub sanctions_search_record: Option<String>,
    pub source: Option<String>,
    pub has_duplicates: Option<String>,
    pub sanction_check_passed: Option<String>,
    pub safe_sic_code: Option<String>,
    pub can_access_portal: Option<String>,
    pub is_first_quote: Option<String>,
    /// All `None` when the event carries no contact data
    pub contact: ContactFields,
    pub event_type: Option<String>,
    pub event_created: Option<String>,
}

impl QuoteRecord {
    pub fn from_envelope(envelope: &EventEnvelope) -> Self {
        Self {
            quote_id: envelope.get("quoteId"),
            timestamp: envelope.get("timestamp"),
            user_id: envelope.get("userId"),
            payment_type: envelope.get("paymentType"),
            email: envelope.get("email"),
            reference: envelope.get("reference"),
            account_reference: envelope.get("accountReference"),
            sanctions_search_record: envelope.get("sanctionsSearchRecord"),
            source: envelope.get("source"),
            has_duplicates: envelope.get("has_duplicates"),
            sanction_check_passed: envelope.get("sanction_check_passed"),
            safe_sic_code: envelope.get("safe_sic_code"),
            can_access_portal: envelope.get("can_access_portal"),
            is_first_quote: envelope.get("isFirstQuote"),
            contact: envelope
                .contact()
                .map(ContactFields::from_object)
                .unwrap_or_default(),
            event_type: envelope.event_type().map(str::to_string),
            event_created: envelope.event_created().map(str::to_string),
        }
    }

    /// Cells in `QUOTE_HEADERS` order
    pub fn to_row(&self) -> Vec<Option<&str>> {
        let mut row = Vec::with_capacity(QUOTE_HEADERS.len());
        row.extend([
            self.quote_id.as_deref(),
            self.timestamp.as_deref(),
            self.user_id.as_deref(),
            self.payment_type.as_deref(),
            self.email.as_deref(),
            self.reference.as_deref(),
            self.account_reference.as_deref(),
            self.sanctions_search_record.as_deref(),
            self.source.as_deref(),
            self.has_duplicates.as_deref(),
            self.sanction_check_passed.as_deref(),
            self.safe_sic_code.as_deref(),
            self.can_access_portal.as_deref(),
            self.is_first_quote.as_deref(),
        ]);
        row.extend(self.contact.cells());
        row.push(self.event_type.as_deref());
        row.push(self.event_created.as_deref());
        row
    }
}

/// One row of the `quote_items` table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductRecord {
    pub quote_id: String,
    pub id: Option<String>,
    pub key: Option<String>,
    pub name: Option<String>,
    pub total: Option<String>,
    pub ipt: Option<String>,
    pub agency_product_guid: Option<String>,
    pub agency_product_name: Option<String>,
}

impl ProductRecord {
    /// Build a row from one entry of an event's products list
    ///
    /// Fails with `MissingField` when the product has no `agencyProduct` object.
    pub fn from_product(quote_id: &str, product: &Value) -> Result<Self> {
        let agency = product
            .get("agencyProduct")
            .and_then(Value::as_object)
            .ok_or_else(|| ProjectionError::MissingField {
                quote_id: quote_id.to_string(),
                field: "agencyProduct",
            })?;

        Ok(Self {
            agency_product_guid: field(agency, "guid"),
            agency_product_name: field(agency, "name"),
            ..Self::without_agency(quote_id, product)
        })
    }

    /// Same row with the agency product columns left empty
    pub fn without_agency(quote_id: &str, product: &Value) -> Self {
        let attr = |key: &str| product.as_object().and_then(|object| field(object, key));

        Self {
            quote_id: quote_id.to_string(),
            id: attr("id"),
            key: attr("key"),
            name: attr("name"),
            total: attr("total"),
            ipt: attr("ipt"),
            agency_product_guid: None,
            agency_product_name: None,
        }
    }

    /// Cells in `PRODUCT_HEADERS` order
    pub fn to_row(&self) -> Vec<Option<&str>> {
        vec![
            Some(self.quote_id.as_str()),
            self.id.as_deref(),
            self.key.as_deref(),
            self.name.as_deref(),
            self.total.as_deref(),
            self.ipt.as_deref(),
            self.agency_product_guid.as_deref(),
            self.agency_product_name.as_deref(),
        ]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(value: Value) -> EventEnvelope {
        EventEnvelope::parse(value.to_string().as_bytes()).unwrap()
    }

    fn column(name: &str) -> usize {
        QUOTE_HEADERS.iter().position(|h| *h == name).unwrap()
    }

    #[test]
    fn test_quote_row_is_full_width_without_contact() {
        let record = QuoteRecord::from_envelope(&envelope(json!({
            "quoteId": "Q1",
            "streamMetadata": {"eventType": "quote_created", "eventCreated": "2020-01-01"}
        })));

        let row = record.to_row();
        assert_eq!(row.len(), QUOTE_HEADERS.len());
        assert_eq!(row[column("quoteId")], Some("Q1"));
        assert!(row[column("contact_businessType")..=column("contact_premises")]
            .iter()
            .all(Option::is_none));
        assert_eq!(row[column("eventType")], Some("quote_created"));
        assert_eq!(row[column("eventCreated")], Some("2020-01-01"));
    }

    #[test]
    fn test_quote_row_contact_positions() {
        let record = QuoteRecord::from_envelope(&envelope(json!({
            "quoteId": "Q1",
            "isFirstQuote": true,
            "contact": {
                "businessName": "Acme",
                "sicCodes": ["62020"],
                "turnover": 125000,
                "quoteId": "Q1"
            },
            "streamMetadata": {"eventType": "quote_updated"}
        })));

        let row = record.to_row();
        assert_eq!(row.len(), QUOTE_HEADERS.len());
        assert_eq!(row[column("isFirstQuote")], Some("true"));
        assert_eq!(row[column("contact_businessName")], Some("Acme"));
        assert_eq!(row[column("contact_sicCodes")], Some(r#"["62020"]"#));
        assert_eq!(row[column("contact_turnover")], Some("125000"));
        assert_eq!(row[column("contact_quoteId")], Some("Q1"));
        assert_eq!(row[column("eventCreated")], None);
    }

    #[test]
    fn test_product_row() {
        let product = json!({
            "id": "P1",
            "key": "pl",
            "name": "Public Liability",
            "total": 99.5,
            "ipt": 11.94,
            "agencyProduct": {"guid": "G1", "name": "N1"}
        });

        let record = ProductRecord::from_product("Q2", &product).unwrap();
        assert_eq!(
            record.to_row(),
            vec![
                Some("Q2"),
                Some("P1"),
                Some("pl"),
                Some("Public Liability"),
                Some("99.5"),
                Some("11.94"),
                Some("G1"),
                Some("N1"),
            ]
        );
        assert_eq!(record.to_row().len(), PRODUCT_HEADERS.len());
    }

    #[test]
    fn test_product_without_agency_product() {
        for product in [json!({"id": "P1"}), json!({"id": "P1", "agencyProduct": null}), json!("P1")] {
            let err = ProductRecord::from_product("Q2", &product).unwrap_err();
            assert!(matches!(
                err,
                ProjectionError::MissingField { ref quote_id, field: "agencyProduct" } if quote_id == "Q2"
            ));
        }

        let lenient = ProductRecord::without_agency("Q2", &json!({"id": "P1"}));
        assert_eq!(lenient.id.as_deref(), Some("P1"));
        assert_eq!(lenient.agency_product_guid, None);
    }
}
