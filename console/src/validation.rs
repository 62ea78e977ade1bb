// console/src/validation.rs
//! Form rules applied before anything reaches the network.

use std::collections::BTreeMap;
use std::fmt;

use common::{DiscountOption, ReportPeriod, FIRST_REPORT_YEAR};
use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

// Characters a password may contain besides ASCII letters and digits
const PASSWORD_SPECIALS: &str = "@$!%*?&";
const PASSWORD_MIN_LEN: usize = 8;

/// Field name to message, in field order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in self.iter() {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", field, message)?;
            first = false;
        }
        Ok(())
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// At least 8 characters from letters, digits and `@$!%*?&`, with one of
/// each: lowercase, uppercase, digit, special.
pub fn is_valid_password(password: &str) -> bool {
    let allowed = password
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || PASSWORD_SPECIALS.contains(c));

    allowed
        && password.chars().count() >= PASSWORD_MIN_LEN
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SPECIALS.contains(c))
}

pub fn validate_login(email: &str, password: &str) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();

    if email.trim().is_empty() {
        errors.add("email", "An email address is required to continue");
    } else if !is_valid_email(email.trim()) {
        errors.add("email", "Enter a valid email address");
    }

    if password.is_empty() {
        errors.add("password", "A password is required to continue");
    } else if !is_valid_password(password) {
        errors.add(
            "password",
            "The password needs at least 8 characters, an uppercase letter, a lowercase letter, a number and a special character",
        );
    }

    errors.into_result()
}

/// Name and email of a client being created or edited
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientForm {
    pub name: String,
    pub email: String,
}

impl ClientForm {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        if self.name.trim().is_empty() {
            errors.add("name", "Required");
        }
        if self.email.trim().is_empty() {
            errors.add("email", "Required");
        } else if !is_valid_email(self.email.trim()) {
            errors.add("email", "Invalid email address");
        }

        errors.into_result()
    }
}

/// Amount and discount chosen in the provisioning form
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionForm {
    pub amount: f64,
    pub discount: DiscountOption,
    /// Percentage typed by the operator; only used with the free discount
    pub custom_percentage: Option<f64>,
}

impl ProvisionForm {
    pub fn new(amount: f64, discount: DiscountOption) -> Self {
        Self {
            amount,
            discount,
            custom_percentage: None,
        }
    }

    pub fn with_percentage(mut self, percentage: f64) -> Self {
        self.custom_percentage = Some(percentage);
        self
    }

    /// Percentage sent to the backend
    pub fn applied_percentage(&self) -> f64 {
        if self.discount.is_free() {
            self.custom_percentage.unwrap_or(self.discount.percentage)
        } else {
            self.discount.percentage
        }
    }

    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        if !self.amount.is_finite() || self.amount < 1.0 {
            errors.add("amount", "Must be greater than 0");
        }

        let percentage = self.applied_percentage();
        if !percentage.is_finite() || percentage < 0.0 {
            errors.add("discount", "Must be 0 or more");
        } else if percentage > 100.0 {
            errors.add("discount", "Must be 100 or less");
        }

        errors.into_result()
    }
}

/// Check a report period against the years reports exist for
pub fn validate_period(period: &ReportPeriod, current_year: i32) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();

    if !(1..=12).contains(&period.month) {
        errors.add("month", "Choose a month between 1 and 12");
    }
    if period.year < FIRST_REPORT_YEAR || period.year > current_year {
        errors.add(
            "year",
            format!("Choose a year between {} and {}", FIRST_REPORT_YEAR, current_year),
        );
    }

    errors.into_result()
}
