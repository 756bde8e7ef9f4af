use serde::{Deserialize, Serialize};
use shared::protocol::BuyerForm;

use crate::error::ValidationError;

/// Buyer identity once every field of the product page form is filled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedBuyer {
    pub name: String,
    pub roll_number: String,
    pub email: String,
    pub degree: String,
    pub year: String,
    pub hostel: String,
    pub is_member: bool,
}

impl VerifiedBuyer {
    pub fn from_form(form: &BuyerForm, email_domain: &str) -> Result<Self, ValidationError> {
        let name = required(&form.name, "name")?;
        let roll_number = required(&form.roll_number, "roll_number")?;
        let degree = required(&form.degree, "degree")?;
        let year = required(&form.year, "year")?;
        let hostel = required(&form.hostel, "hostel")?;
        let is_member = form
            .is_member
            .ok_or(ValidationError::MissingBuyerField("is_member"))?;

        Ok(Self {
            email: institutional_email(&roll_number, email_domain),
            name,
            roll_number,
            degree,
            year,
            hostel,
            is_member,
        })
    }
}

/// `21CS01001` -> `21cs01001@<domain>`.
pub fn institutional_email(roll_number: &str, domain: &str) -> String {
    format!(
        "{}@{}",
        roll_number.trim().to_lowercase(),
        domain.trim().trim_start_matches('@')
    )
}

fn required(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::MissingBuyerField(field));
    }
    Ok(value.to_string())
}
