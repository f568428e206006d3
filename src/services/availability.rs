use std::collections::HashMap;

use chrono::Utc;

use super::{ensure_self_or_admin, ServiceError, ServiceResult, UserService};
use crate::auth::AuthUser;
use crate::database::models::AvailabilitySlot;
use crate::state::AppState;

/// Sorts slots by (weekday, start) and rejects empty or overlapping ones.
/// Field errors are keyed `slots[i]` by position in the submitted list.
pub fn validate_slots(mut slots: Vec<AvailabilitySlot>) -> ServiceResult<Vec<AvailabilitySlot>> {
    let mut field_errors = HashMap::new();
    for (i, slot) in slots.iter().enumerate() {
        if slot.start >= slot.end {
            field_errors.insert(format!("slots[{}]", i), "start must be before end".to_string());
        }
    }

    let mut order: Vec<usize> = (0..slots.len()).collect();
    order.sort_by_key(|&i| (slots[i].weekday, slots[i].start));
    // Compare each slot with the furthest-reaching earlier slot on the same day
    let mut reach: Option<usize> = None;
    for &i in &order {
        let slot = &slots[i];
        match reach {
            Some(r) if slots[r].weekday == slot.weekday => {
                if slot.start < slots[r].end {
                    field_errors
                        .entry(format!("slots[{}]", i))
                        .or_insert_with(|| format!("overlaps slots[{}]", r));
                }
                if slot.end > slots[r].end {
                    reach = Some(i);
                }
            }
            _ => reach = Some(i),
        }
    }

    if !field_errors.is_empty() {
        return Err(ServiceError::invalid_fields("Invalid availability", field_errors));
    }
    slots.sort_by_key(|s| (s.weekday, s.start));
    Ok(slots)
}

pub struct AvailabilityService<'a> {
    state: &'a AppState,
}

impl<'a> AvailabilityService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn get(&self, creator_id: &str) -> ServiceResult<Vec<AvailabilitySlot>> {
        Ok(UserService::new(self.state).get_creator(creator_id).await?.availability)
    }

    /// Replaces the whole weekly schedule.
    pub async fn replace(
        &self,
        caller: &AuthUser,
        creator_id: &str,
        slots: Vec<AvailabilitySlot>,
    ) -> ServiceResult<Vec<AvailabilitySlot>> {
        ensure_self_or_admin(caller, creator_id)?;
        let slots = validate_slots(slots)?;

        let mut creator = UserService::new(self.state).get_creator(creator_id).await?;
        creator.availability = slots;
        creator.updated_at = Utc::now();
        let creator = self.state.store.update_creator(creator).await?;
        Ok(creator.availability)
    }
}
