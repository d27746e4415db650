//! In-memory store of inventory locations used by the location editor until
//! the editor is backed by the database.

use crate::error::AppResult;
use crate::forms::validate_inventory_location;
use crate::models::InventoryLocationDto;
use log::debug;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

#[derive(Debug)]
pub struct InventoryService {
    locations: RwLock<HashMap<String, InventoryLocationDto>>,
}

impl Default for InventoryService {
    fn default() -> Self {
        InventoryService::new()
    }
}

impl InventoryService {
    /// Store seeded with the two sample home locations
    pub fn new() -> Self {
        let seeds = [
            InventoryLocationDto {
                id: "loc1".to_string(),
                main_location: "Home".to_string(),
                sub_location: Some("Pantry".to_string()),
                name: "Pantry".to_string(),
                slug: "pantry".to_string(),
                description: Some("Home pantry".to_string()),
            },
            InventoryLocationDto {
                id: "loc2".to_string(),
                main_location: "Home".to_string(),
                sub_location: Some("Food Storage".to_string()),
                name: "Food Storage".to_string(),
                slug: "food-storage".to_string(),
                description: Some("Long term".to_string()),
            },
        ];
        InventoryService {
            locations: RwLock::new(seeds.into_iter().map(|l| (l.id.clone(), l)).collect()),
        }
    }

    /// All locations ordered by name
    pub fn locations(&self) -> Vec<InventoryLocationDto> {
        let locations = self.locations.read().unwrap_or_else(PoisonError::into_inner);
        let mut all: Vec<InventoryLocationDto> = locations.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn location(&self, id: &str) -> Option<InventoryLocationDto> {
        self.locations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Inserts or replaces a location; returns it with id and slug filled in
    pub fn save_location(&self, dto: InventoryLocationDto) -> AppResult<InventoryLocationDto> {
        let dto = validate_inventory_location(dto)?;
        debug!("Saving inventory location {}.", dto.id);
        self.locations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(dto.id.clone(), dto.clone());
        Ok(dto)
    }

    /// Removes a location; unknown ids are ignored
    pub fn delete_location(&self, id: &str) -> bool {
        self.locations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some()
    }
}
