//! Field rules applied before any mutation reaches a store.

use crate::{InterfaceUpdate, NewSystem, StoreError, SystemInterface, SystemUpdate};

pub const NAME_LEN: (usize, usize) = (3, 50);
pub const CATEGORY_LEN: (usize, usize) = (3, 50);
pub const CONNECTION_TYPE_LEN: (usize, usize) = (2, 50);

fn check_len(field: &str, value: &str, (min, max): (usize, usize)) -> Result<(), StoreError> {
    let len = value.trim().chars().count();
    if len < min || len > max {
        Err(StoreError::Validation(format!(
            "{field} must be between {min} and {max} characters, got {len}"
        )))
    } else {
        Ok(())
    }
}

pub fn validate_new_system(system: &NewSystem) -> Result<(), StoreError> {
    check_len("name", &system.name, NAME_LEN)?;
    check_len("category", &system.category, CATEGORY_LEN)
}

pub fn validate_system_update(update: &SystemUpdate) -> Result<(), StoreError> {
    if let Some(name) = &update.name {
        check_len("name", name, NAME_LEN)?;
    }
    if let Some(category) = &update.category {
        check_len("category", category, CATEGORY_LEN)?;
    }
    Ok(())
}

pub fn validate_interface(interface: &SystemInterface) -> Result<(), StoreError> {
    check_len("connection type", &interface.connection_type, CONNECTION_TYPE_LEN)
}

pub fn validate_interface_update(update: &InterfaceUpdate) -> Result<(), StoreError> {
    match &update.connection_type {
        Some(connection_type) => check_len("connection type", connection_type, CONNECTION_TYPE_LEN),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Directional;

    fn new_system(name: &str, category: &str) -> NewSystem {
        NewSystem {
            name: name.to_string(),
            category: category.to_string(),
            parent_id: None,
        }
    }

    #[test]
    fn system_names_are_bounded() {
        assert!(validate_new_system(&new_system("Billing", "Service")).is_ok());
        assert!(matches!(
            validate_new_system(&new_system("ab", "Service")),
            Err(StoreError::Validation(_))
        ));
        assert!(validate_new_system(&new_system(&"x".repeat(51), "Service")).is_err());
        assert!(validate_new_system(&new_system("Billing", "  db  ")).is_err());
    }

    #[test]
    fn updates_only_check_present_fields() {
        assert!(validate_system_update(&SystemUpdate::default()).is_ok());
        let update = SystemUpdate {
            name: None,
            category: Some("DB".to_string()),
        };
        assert!(validate_system_update(&update).is_err());
    }

    #[test]
    fn connection_type_allows_two_characters() {
        let iface = SystemInterface {
            source_system_id: 1,
            target_system_id: 2,
            connection_type: "MQ".to_string(),
            directional: Directional::Directed,
        };
        assert!(validate_interface(&iface).is_ok());
        let update = InterfaceUpdate {
            connection_type: Some("x".to_string()),
            directional: None,
        };
        assert!(validate_interface_update(&update).is_err());
    }
}
