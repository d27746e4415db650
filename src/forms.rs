//! Form and JSON payloads accepted by the web layer, with validation.
//!
//! Each form has a `validate` method returning the cleaned values or an
//! [`AppError::InvalidInput`] describing the first problem found.

use crate::error::{AppError, AppResult};
use crate::models::InventoryLocationDto;
use crate::text::{normalize_display_name, slugify};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_DISPLAY_NAME_LEN: usize = 100;
pub const MAX_HOUSEHOLD_NAME_LEN: usize = 150;
pub const MAX_LOCATION_NAME_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 500;

lazy_static! {
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^@\s]+@[^@\s]+$").unwrap();
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_REGEX.is_match(value.trim())
}

fn check_length(field: &str, value: &str, min: usize, max: usize) -> AppResult<()> {
    let len = value.chars().count();
    if len < min || len > max {
        if min > 0 {
            return Err(AppError::invalid_input(format!(
                "{field} must be {min} to {max} characters"
            )));
        }
        return Err(AppError::invalid_input(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

fn check_password(password: &str, confirm: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::invalid_input(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if password != confirm {
        return Err(AppError::invalid_input("Passwords do not match."));
    }
    Ok(())
}

fn blank_to_none(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Posted by the login page
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, rename = "returnUrl")]
    pub return_url: Option<String>,
    #[serde(default, rename = "__RequestVerificationToken")]
    pub antiforgery: Option<String>,
}

impl LoginForm {
    /// Both credentials present
    pub fn has_credentials(&self) -> bool {
        !self.email.trim().is_empty() && !self.password.trim().is_empty()
    }
}

/// Posted by the signup page
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
    #[serde(default, rename = "__RequestVerificationToken")]
    pub antiforgery: Option<String>,
}

impl SignupForm {
    pub fn validate(&self) -> AppResult<()> {
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(AppError::invalid_input("first and last name are required"));
        }
        if !is_valid_email(&self.email) {
            return Err(AppError::invalid_input("a valid email is required"));
        }
        check_password(&self.password, &self.confirm_password)
    }

    /// "First Last", name-cased
    pub fn display_name(&self) -> String {
        normalize_display_name(Some(&format!(
            "{} {}",
            self.first_name.trim(),
            self.last_name.trim()
        )))
    }
}

/// Posted by logout buttons
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogoutForm {
    #[serde(default, rename = "__RequestVerificationToken")]
    pub antiforgery: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileForm {
    pub display_name: String,
    pub email: String,
}

impl ProfileForm {
    pub fn validate(&self) -> AppResult<(String, String)> {
        let display_name = normalize_display_name(Some(&self.display_name));
        check_length("display name", &display_name, 1, MAX_DISPLAY_NAME_LEN)?;
        let email = self.email.trim();
        if !is_valid_email(email) {
            return Err(AppError::invalid_input("a valid email is required"));
        }
        Ok((display_name, email.to_string()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordForm {
    pub new_password: String,
    pub confirm_password: String,
}

impl PasswordForm {
    pub fn validate(&self) -> AppResult<&str> {
        check_password(&self.new_password, &self.confirm_password)?;
        Ok(&self.new_password)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HouseholdForm {
    pub household_name: String,
}

impl HouseholdForm {
    pub fn validate(&self) -> AppResult<String> {
        let name = self.household_name.trim();
        check_length("household name", name, 1, MAX_HOUSEHOLD_NAME_LEN)?;
        Ok(name.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JoinHouseholdForm {
    pub group_id: Uuid,
}

/// Edit of a pantry location's name and notes
#[derive(Debug, Clone, Deserialize)]
pub struct LocationForm {
    pub sub_location: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl LocationForm {
    pub fn validate(&self) -> AppResult<(String, Option<String>)> {
        let name = self.sub_location.trim();
        check_length("location name", name, 1, MAX_LOCATION_NAME_LEN)?;
        let description = blank_to_none(self.description.as_deref());
        if let Some(d) = &description {
            check_length("description", d, 0, MAX_DESCRIPTION_LEN)?;
        }
        Ok((name.to_string(), description))
    }
}

/// New pantry location: the edit form plus the pantry it goes into
#[derive(Debug, Clone, Deserialize)]
pub struct NewLocationForm {
    pub pantry_id: Uuid,
    #[serde(flatten)]
    pub location: LocationForm,
}

/// A single name, used for new pantries and item categories
#[derive(Debug, Clone, Deserialize)]
pub struct NameForm {
    pub name: String,
}

impl NameForm {
    /// `field` names the value in the error message
    pub fn validate(&self, field: &str) -> AppResult<String> {
        let name = self.name.trim();
        check_length(field, name, 1, MAX_LOCATION_NAME_LEN)?;
        Ok(name.to_string())
    }
}

/// Adds either a catalog item or a free-text item to the shopping list
#[derive(Debug, Clone, Deserialize)]
pub struct ListItemAddForm {
    #[serde(default)]
    pub item_id: Option<Uuid>,
    #[serde(default)]
    pub custom_name: Option<String>,
    #[serde(default = "one")]
    pub quantity: f64,
    #[serde(default)]
    pub unit: Option<String>,
}

fn one() -> f64 {
    1.0
}

/// What a validated [`ListItemAddForm`] adds
#[derive(Debug, Clone, PartialEq)]
pub enum NewListItem {
    Catalog(Uuid),
    Custom(String),
}

impl ListItemAddForm {
    pub fn validate(&self) -> AppResult<NewListItem> {
        if let Some(item_id) = self.item_id {
            return Ok(NewListItem::Catalog(item_id));
        }
        match blank_to_none(self.custom_name.as_deref()) {
            Some(name) => Ok(NewListItem::Custom(name)),
            None => Err(AppError::invalid_input("an item or a name is required")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListItemUpdateForm {
    pub quantity: f64,
    #[serde(default)]
    pub unit: Option<String>,
}

/// Validates a scaffold location and fills its id and slug
pub fn validate_inventory_location(mut dto: InventoryLocationDto) -> AppResult<InventoryLocationDto> {
    dto.main_location = dto.main_location.trim().to_string();
    dto.name = dto.name.trim().to_string();
    dto.sub_location = blank_to_none(dto.sub_location.as_deref());
    dto.description = blank_to_none(dto.description.as_deref());

    check_length("main location", &dto.main_location, 1, MAX_LOCATION_NAME_LEN)?;
    check_length("name", &dto.name, 1, MAX_LOCATION_NAME_LEN)?;
    if let Some(sub) = &dto.sub_location {
        check_length("sub location", sub, 0, MAX_LOCATION_NAME_LEN)?;
    }
    if let Some(d) = &dto.description {
        check_length("description", d, 0, MAX_DESCRIPTION_LEN)?;
    }

    if dto.id.trim().is_empty() {
        dto.id = Uuid::new_v4().to_string();
    }
    if dto.slug.trim().is_empty() {
        dto.slug = slugify(&dto.name);
    }
    check_length("slug", &dto.slug, 1, MAX_LOCATION_NAME_LEN)?;
    Ok(dto)
}
