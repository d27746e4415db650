//! Row mappings for the Supabase tables and the view models built from them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A typed row of a PostgREST-exposed table
pub trait Table: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Table name as exposed under `/rest/v1/`
    const NAME: &'static str;

    /// Primary key columns with this row's values, used to address the row
    fn primary_key(&self) -> Vec<(&'static str, String)>;
}

pub const ROLE_OWNER: &str = "owner";
pub const ROLE_MEMBER: &str = "member";
pub const LIST_TYPE_SHOPPING: &str = "shopping";

/// A user profile row (`users`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppUser {
    pub user_id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Table for AppUser {
    const NAME: &'static str = "users";

    fn primary_key(&self) -> Vec<(&'static str, String)> {
        vec![("user_id", self.user_id.to_string())]
    }
}

/// A household (`groups`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Group {
    pub group_id: Uuid,
    #[serde(default)]
    pub name: Option<String>,
    pub created_by_user: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Table for Group {
    const NAME: &'static str = "groups";

    fn primary_key(&self) -> Vec<(&'static str, String)> {
        vec![("group_id", self.group_id.to_string())]
    }
}

/// Membership of a user in a household (`group_members`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupMember {
    pub group_id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<DateTime<Utc>>,
}

impl Table for GroupMember {
    const NAME: &'static str = "group_members";

    fn primary_key(&self) -> Vec<(&'static str, String)> {
        vec![
            ("group_id", self.group_id.to_string()),
            ("user_id", self.user_id.to_string()),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pantry {
    pub pantry_id: Uuid,
    pub group_id: Uuid,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Table for Pantry {
    const NAME: &'static str = "pantries";

    fn primary_key(&self) -> Vec<(&'static str, String)> {
        vec![("pantry_id", self.pantry_id.to_string())]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PantryLocation {
    pub location_id: Uuid,
    pub pantry_id: Uuid,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_by_user: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Table for PantryLocation {
    const NAME: &'static str = "pantry_locations";

    fn primary_key(&self) -> Vec<(&'static str, String)> {
        vec![("location_id", self.location_id.to_string())]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemCategory {
    pub category_id: Uuid,
    pub group_id: Uuid,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub created_by_user: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Table for ItemCategory {
    const NAME: &'static str = "item_categories";

    fn primary_key(&self) -> Vec<(&'static str, String)> {
        vec![("category_id", self.category_id.to_string())]
    }
}

/// A shared product definition (`item_catalog`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogItem {
    pub item_id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default_unit: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub category_id: Option<Uuid>,
}

impl Table for CatalogItem {
    const NAME: &'static str = "item_catalog";

    fn primary_key(&self) -> Vec<(&'static str, String)> {
        vec![("item_id", self.item_id.to_string())]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryItem {
    pub inventory_id: Uuid,
    pub pantry_id: Uuid,
    #[serde(default)]
    pub location_id: Option<Uuid>,
    #[serde(default)]
    pub item_id: Option<Uuid>,
    #[serde(default)]
    pub custom_name: Option<String>,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub expires_on: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_by_user: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Table for InventoryItem {
    const NAME: &'static str = "inventory_items";

    fn primary_key(&self) -> Vec<(&'static str, String)> {
        vec![("inventory_id", self.inventory_id.to_string())]
    }
}

/// A household list (`lists`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListRow {
    pub list_id: Uuid,
    pub group_id: Uuid,
    #[serde(default = "default_list_name")]
    pub name: String,
    #[serde(default = "default_list_type")]
    pub list_type: String,
    pub created_by_user: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
}

fn default_list_name() -> String {
    "Shopping List".to_string()
}

fn default_list_type() -> String {
    LIST_TYPE_SHOPPING.to_string()
}

impl Table for ListRow {
    const NAME: &'static str = "lists";

    fn primary_key(&self) -> Vec<(&'static str, String)> {
        vec![("list_id", self.list_id.to_string())]
    }
}

/// An entry on a list (`list_items`); either a catalog item or a custom name
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListItemRow {
    pub list_item_id: Uuid,
    pub list_id: Uuid,
    #[serde(default)]
    pub item_id: Option<Uuid>,
    #[serde(default)]
    pub custom_name: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub is_checked: bool,
    #[serde(default)]
    pub added_by_user: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_quantity() -> f64 {
    1.0
}

impl Table for ListItemRow {
    const NAME: &'static str = "list_items";

    fn primary_key(&self) -> Vec<(&'static str, String)> {
        vec![("list_item_id", self.list_item_id.to_string())]
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SidebarPantrySection {
    pub pantry_name: String,
    pub locations: Vec<SidebarLocationLink>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SidebarLocationLink {
    pub name: String,
    pub slug: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InventoryEditLocationRow {
    pub location_id: Uuid,
    pub pantry_id: Uuid,
    pub pantry_name: String,
    pub location_name: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InventoryDisplayItem {
    pub id: String,
    pub name: String,
    pub amount: String,
    pub category: String,
    pub description: String,
}

/// Location record kept by the in-memory inventory scaffold
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryLocationDto {
    #[serde(default)]
    pub id: String,
    /// Main category this location belongs to
    pub main_location: String,
    #[serde(default)]
    pub sub_location: Option<String>,
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
}
